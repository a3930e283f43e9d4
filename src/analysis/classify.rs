// src/analysis/classify.rs

//! Semantic byte classes shared by every graph.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteClass {
    Nul,
    /// Space and horizontal tab.
    Whitespace,
    /// C0 controls other than tab, LF and CR.
    Control,
    /// CR and LF.
    LineEnd,
    Digit,
    /// ASCII letters and `_`.
    Identifier,
    /// Printable ASCII symbols.
    Punctuation,
    Del,
    /// 0x80..=0xFF.
    HighBit,
    /// Catch-all. The ranges below cover all 256 values, so `classify` never
    /// yields it; it keeps its palette slot for callers that need a neutral
    /// class.
    Other,
}

impl ByteClass {
    /// Index into [`Palette::graph`](crate::color::Palette), `None` for the
    /// background.
    pub fn graph_slot(self) -> Option<usize> {
        match self {
            ByteClass::Nul => None,
            ByteClass::Whitespace => Some(0),
            ByteClass::Control => Some(1),
            ByteClass::LineEnd => Some(2),
            ByteClass::Digit => Some(3),
            ByteClass::Identifier => Some(4),
            ByteClass::Punctuation => Some(5),
            ByteClass::Other => Some(7),
            ByteClass::Del => Some(8),
            ByteClass::HighBit => Some(9),
        }
    }
}

/// Maps a byte to its class. The match is exhaustive over `u8`, which the
/// compiler checks.
pub fn classify(byte: u8) -> ByteClass {
    match byte {
        0x00 => ByteClass::Nul,
        b' ' | b'\t' => ByteClass::Whitespace,
        0x01..=0x08 | 0x0b | 0x0c | 0x0e..=0x1f => ByteClass::Control,
        b'\r' | b'\n' => ByteClass::LineEnd,
        b'0'..=b'9' => ByteClass::Digit,
        b'A'..=b'Z' | b'a'..=b'z' | b'_' => ByteClass::Identifier,
        b'!'..=b'/' | b':'..=b'@' | b'['..=b'^' | b'`' | b'{'..=b'~' => ByteClass::Punctuation,
        0x7f => ByteClass::Del,
        0x80..=0xff => ByteClass::HighBit,
    }
}
