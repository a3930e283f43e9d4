// src/os/process.rs

//! Process plumbing for multi-view sessions: duplex pipe pairs, `fork`, and
//! reaping of finished view processes.

use log::{debug, trace, warn};
use nix::fcntl::OFlag;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{ForkResult, Pid};
use std::fs::File;
use std::os::unix::io::AsRawFd;

use crate::error::{ViewError, ViewResult};
use crate::protocol::PacketChannel;

/// Outcome of [`fork_view`], seen from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forked {
    Parent { child: Pid },
    Child,
}

fn cloexec_pipe() -> ViewResult<(File, File)> {
    let (r, w) = nix::unistd::pipe2(OFlag::O_CLOEXEC)?;
    Ok((File::from(r), File::from(w)))
}

/// Creates the two pipes linking a spawner with a new view.
///
/// The first channel is the spawner's end, the second the child's: each
/// reads what the other writes. Both ends are close-on-exec, so detached
/// views started later never inherit them.
pub fn channel_pair() -> ViewResult<(PacketChannel, PacketChannel)> {
    let (down_r, down_w) = cloexec_pipe()?;
    let (up_r, up_w) = cloexec_pipe()?;
    trace!(
        "channel_pair: down {}->{} up {}->{}",
        down_w.as_raw_fd(),
        down_r.as_raw_fd(),
        up_w.as_raw_fd(),
        up_r.as_raw_fd(),
    );
    Ok((
        PacketChannel::new(up_r, down_w),
        PacketChannel::new(down_r, up_w),
    ))
}

/// Forks the current (single-threaded) view process.
pub fn fork_view() -> ViewResult<Forked> {
    // Safety: views run a single-threaded event loop, so the child starts
    // from a consistent copy of every lock and allocator state.
    match unsafe { nix::unistd::fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!("fork_view: started child {}", child);
            Ok(Forked::Parent { child })
        }
        Ok(ForkResult::Child) => Ok(Forked::Child),
        Err(errno) => Err(ViewError::Spawn(format!("fork: {}", errno))),
    }
}

/// Collects every child that has exited, without blocking.
pub fn reap_children() -> usize {
    let mut reaped = 0;
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(status) => {
                debug!("reap_children: {:?}", status);
                reaped += 1;
            }
            Err(nix::errno::Errno::ECHILD) => break,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => {
                warn!("reap_children: waitpid failed: {}", e);
                break;
            }
        }
    }
    reaped
}
