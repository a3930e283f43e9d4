// src/os/poll.rs

//! A small, bounded descriptor registry on top of `poll(2)`.
//!
//! Each registration pairs a raw descriptor with an interest mask and a plain
//! function handler. [`PollRegistry::wait`] snapshots the registered set,
//! blocks in `poll`, and then invokes the handler of every ready descriptor in
//! registration order. Handlers receive the registry itself, so they may add
//! or remove descriptors while a dispatch pass is running.

use bitflags::bitflags;
use log::{debug, trace, warn};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::error::{ViewError, ViewResult};

/// Upper bound on the number of descriptors one process watches.
pub const MAX_POLL_ELEMENTS: usize = 10;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PollFlags: i16 {
        const POLLIN = libc::POLLIN;
        const POLLPRI = libc::POLLPRI;
        const POLLOUT = libc::POLLOUT;
        const POLLERR = libc::POLLERR;
        const POLLHUP = libc::POLLHUP;
        const POLLNVAL = libc::POLLNVAL;
    }
}

/// What `poll` reported for one descriptor during a dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub fd: RawFd,
    pub events: PollFlags,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        self.events.contains(PollFlags::POLLIN)
    }

    /// The peer went away or the descriptor is no longer valid.
    pub fn is_hangup(&self) -> bool {
        self.events
            .intersects(PollFlags::POLLHUP | PollFlags::POLLNVAL)
    }
}

pub type PollHandler<C> = fn(&mut C, &mut PollRegistry<C>, Readiness);

struct Registration<C> {
    fd: RawFd,
    interest: PollFlags,
    revents: PollFlags,
    handler: PollHandler<C>,
}

// Derive would demand `C: Clone`; the handler is a plain fn pointer.
impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<C> Copy for Registration<C> {}

pub struct PollRegistry<C> {
    entries: Vec<Registration<C>>,
    capacity: usize,
    epoch: u64,
}

impl<C> std::fmt::Debug for PollRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRegistry")
            .field("fds", &self.fds())
            .field("capacity", &self.capacity)
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl<C> Default for PollRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PollRegistry<C> {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POLL_ELEMENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            epoch: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free slots left before [`register`](Self::register) starts failing.
    pub fn spare(&self) -> usize {
        self.capacity - self.entries.len()
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.entries.iter().any(|e| e.fd == fd)
    }

    /// Registered descriptors in registration order.
    pub fn fds(&self) -> Vec<RawFd> {
        self.entries.iter().map(|e| e.fd).collect()
    }

    /// Result mask recorded for `fd` by the most recent dispatch pass.
    pub fn last_events(&self, fd: RawFd) -> Option<PollFlags> {
        self.entries.iter().find(|e| e.fd == fd).map(|e| e.revents)
    }

    /// Adds `fd`. Returns `Ok(false)` when it is already registered.
    pub fn register(
        &mut self,
        fd: RawFd,
        interest: PollFlags,
        handler: PollHandler<C>,
    ) -> ViewResult<bool> {
        if self.contains(fd) {
            trace!("PollRegistry: fd {} already registered", fd);
            return Ok(false);
        }
        if self.entries.len() >= self.capacity {
            return Err(ViewError::RegistryFull {
                fd,
                capacity: self.capacity,
            });
        }
        self.entries.push(Registration {
            fd,
            interest,
            revents: PollFlags::empty(),
            handler,
        });
        debug!(
            "PollRegistry: registered fd {} for {:?} ({} of {})",
            fd,
            interest,
            self.entries.len(),
            self.capacity
        );
        Ok(true)
    }

    /// Removes every registration of `fd`, keeping the others in order.
    pub fn unregister(&mut self, fd: RawFd) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.fd != fd);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("PollRegistry: unregistered fd {}", fd);
        }
        removed
    }

    /// Drops every registration and abandons any dispatch pass in progress.
    ///
    /// Used by a freshly forked view that inherits its parent's registry.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Blocks until a registered descriptor is ready or `timeout` elapses,
    /// then runs the handlers of all ready descriptors.
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` only checks. Returns
    /// the number of ready descriptors, `0` on timeout. An interrupted wait
    /// surfaces as an `Interrupted` error.
    pub fn wait(&mut self, ctx: &mut C, timeout: Option<Duration>) -> io::Result<usize> {
        let snapshot: Vec<Registration<C>> = self.entries.clone();
        let mut fds: Vec<libc::pollfd> = snapshot
            .iter()
            .map(|e| libc::pollfd {
                fd: e.fd,
                events: e.interest.bits(),
                revents: 0,
            })
            .collect();
        for entry in &mut self.entries {
            entry.revents = PollFlags::empty();
        }

        let timeout_ms: libc::c_int = match timeout {
            None => -1,
            Some(t) => t.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        };
        trace!(
            "PollRegistry: polling {} fds with timeout {}ms",
            fds.len(),
            timeout_ms
        );

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                warn!("PollRegistry: poll failed: {}", err);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(0);
        }

        let epoch = self.epoch;
        for (entry, pfd) in snapshot.iter().zip(fds.iter()) {
            let events = PollFlags::from_bits_truncate(pfd.revents);
            if events.is_empty() {
                continue;
            }
            // A handler earlier in this pass may have reset the registry or
            // dropped this descriptor; its readiness is stale then.
            if self.epoch != epoch {
                break;
            }
            let Some(live) = self.entries.iter_mut().find(|e| e.fd == entry.fd) else {
                trace!("PollRegistry: fd {} removed during dispatch, skipping", entry.fd);
                continue;
            };
            live.revents = events;
            let handler = live.handler;
            trace!("PollRegistry: dispatching fd {} ({:?})", entry.fd, events);
            handler(ctx, self, Readiness { fd: entry.fd, events });
        }
        Ok(ready as usize)
    }
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
