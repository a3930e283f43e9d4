// src/platform/actions.rs
//
// Abstract user actions a display reports to its view.

use crate::graph::GraphKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Close the window and let the view wind down.
    Quit,
    /// The window became visible (or was uncovered) and needs repainting.
    Expose,
    StepForward,
    StepBack,
    /// Enlarge the window by one block step.
    Grow,
    Shrink,
    /// Jump back to offset 0.
    Restart,
    ToggleAutoscroll,
    /// Open another view on the same input. A detached view runs in a fresh
    /// process image and does not follow navigation.
    Spawn { kind: GraphKind, detached: bool },
    /// The graph area changed size.
    Resize { width: u32, height: u32 },
}
