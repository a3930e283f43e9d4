// src/analysis/mod.rs

//! Streaming analysis models used by the graphs: byte classes, pair
//! frequencies and the adaptive cell layout.

pub mod classify;
pub mod frequency;
pub mod layout;

pub use classify::{classify, ByteClass};
pub use frequency::FrequencyMatrix;
pub use layout::Layout;
