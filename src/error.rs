// src/error.rs

//! Typed errors for the viewer core.
//!
//! The registry, stream reader and peer protocol report failures through
//! [`ViewError`]; process bring-up in `main` wraps these in `anyhow` with
//! context, as the rest of the application layer does.

use std::io;
use std::os::unix::io::RawFd;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// The descriptor registry has no free slot.
    #[error("descriptor registry is full ({capacity} entries), cannot add fd {fd}")]
    RegistryFull { fd: RawFd, capacity: usize },

    /// The input stream cannot be repositioned.
    #[error("input is not seekable")]
    NotSeekable,

    /// A peer closed its channel in the middle of a command packet.
    #[error("peer channel closed after {received} of {expected} packet bytes")]
    ShortPacket { received: usize, expected: usize },

    /// A command packet carried a kind this build does not understand.
    #[error("unknown command packet kind {0}")]
    UnknownPacketKind(u32),

    /// Forking or executing a new view failed.
    #[error("failed to spawn view: {0}")]
    Spawn(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<nix::Error> for ViewError {
    fn from(err: nix::Error) -> Self {
        ViewError::Io(io::Error::from(err))
    }
}

pub type ViewResult<T> = std::result::Result<T, ViewError>;
