// src/keys.rs

//! Keyboard symbols and the key bindings of a view.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::graph::GraphKind;
use crate::platform::actions::UiAction;

bitflags! {
    /// Keyboard modifiers held during a key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// A key as the window system reports it, reduced to what the viewer binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KeySymbol {
    Char(char),
    Escape,
    Home,
    Left,
    Right,
    PageUp,
    PageDown,
    KeypadPlus,
    KeypadMinus,
    #[default]
    Unknown,
}

/// Digit keys that open another view, in [`GraphKind::ALL`] order.
const SPAWN_KEYS: [char; 3] = ['1', '2', '3'];

/// Maps a key press to the action it triggers, if any.
pub fn binding(symbol: KeySymbol, modifiers: Modifiers) -> Option<UiAction> {
    let action = match symbol {
        KeySymbol::Char('q') | KeySymbol::Escape => UiAction::Quit,
        KeySymbol::Char('a') => UiAction::ToggleAutoscroll,
        KeySymbol::Char('r') | KeySymbol::Home => UiAction::Restart,
        KeySymbol::PageUp | KeySymbol::Left => UiAction::StepBack,
        KeySymbol::Char(' ') | KeySymbol::PageDown | KeySymbol::Right => UiAction::StepForward,
        KeySymbol::Char('+') | KeySymbol::KeypadPlus => UiAction::Grow,
        KeySymbol::Char('-') | KeySymbol::KeypadMinus => UiAction::Shrink,
        KeySymbol::Char(c) => {
            let index = SPAWN_KEYS.iter().position(|k| *k == c)?;
            UiAction::Spawn {
                kind: GraphKind::from_index(index)?,
                detached: modifiers.contains(Modifiers::SHIFT),
            }
        }
        KeySymbol::Unknown => return None,
    };
    Some(action)
}
