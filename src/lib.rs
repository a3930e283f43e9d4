// src/lib.rs

//! rawview: live pixel graphs of a byte stream.
//!
//! A view reads a window of its input in chunks and paints one of several
//! graphs of it. Views of the same input can run side by side in separate
//! processes and follow each other's navigation over pipes.

pub mod analysis;
pub mod color;
pub mod config;
pub mod error;
pub mod graph;
pub mod keys;
pub mod os;
pub mod platform;
pub mod protocol;
pub mod renderer;
pub mod stream;
pub mod view;

pub use error::{ViewError, ViewResult};
pub use graph::{Analyzer, GraphKind};
pub use view::{ViewProcess, ViewRegistry, ViewSettings};
