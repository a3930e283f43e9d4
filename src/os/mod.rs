// src/os/mod.rs

//! Thin wrappers over the POSIX facilities the viewer builds on.

pub mod poll;
pub mod process;
