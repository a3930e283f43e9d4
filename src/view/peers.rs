// src/view/peers.rs

//! Links between views of one session.
//!
//! Views form a tree rooted at the first view. Every view has at most one
//! spawner (its parent) and any number of clients (children it forked). A
//! packet arriving on one link is applied locally and forwarded on every
//! other link, so a notification from any view reaches all of them. Spawn
//! requests travel up to the root, which is the only view that forks.

use std::os::unix::io::RawFd;
use std::process::Command;

use log::{debug, info, trace, warn};
use nix::unistd::Pid;

use super::{Phase, ViewProcess, ViewRegistry};
use crate::config::{ENV_BLOCK_SIZE, ENV_GRAPH, ENV_OFFSET};
use crate::error::{ViewError, ViewResult};
use crate::graph::GraphKind;
use crate::os::poll::PollFlags;
use crate::os::process::{channel_pair, fork_view, Forked};
use crate::protocol::{CommandPacket, PacketChannel, PacketKind};

/// The spawner's record of a child view.
#[derive(Debug)]
pub struct ClientHandle {
    /// `None` for links not created by `fork`.
    pub pid: Option<Pid>,
    pub channel: PacketChannel,
}

/// Where a packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Spawner,
    /// A client, by the descriptor its packets arrive on.
    Client(RawFd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// This process forked a synchronized child.
    Forked(Pid),
    /// This process is the freshly forked child.
    Child,
    /// A detached view was started.
    Detached,
    /// The request was passed up to the spawner.
    Forwarded,
    /// The request could not be served.
    Dropped,
}

impl ViewProcess {
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn has_spawner(&self) -> bool {
        self.spawner.is_some()
    }

    /// Adds a child link and starts listening on it.
    pub fn attach_client(
        &mut self,
        channel: PacketChannel,
        pid: Option<Pid>,
        reg: &mut ViewRegistry,
    ) -> ViewResult<()> {
        reg.register(channel.reader_fd(), PollFlags::POLLIN, super::handlers::on_peer)?;
        debug!(
            "View {}: client {:?} on fd {}",
            self.kind,
            pid,
            channel.reader_fd()
        );
        self.clients.push(ClientHandle { pid, channel });
        Ok(())
    }

    /// Sets the link to the view that spawned this one.
    pub fn attach_spawner(&mut self, channel: PacketChannel, reg: &mut ViewRegistry) -> ViewResult<()> {
        reg.register(channel.reader_fd(), PollFlags::POLLIN, super::handlers::on_peer)?;
        debug!("View {}: spawner on fd {}", self.kind, channel.reader_fd());
        if let Some(old) = self.spawner.replace(channel) {
            reg.unregister(old.reader_fd());
        }
        Ok(())
    }

    pub(super) fn peer_for_fd(&self, fd: RawFd) -> Option<Peer> {
        if self.spawner.as_ref().map(|s| s.reader_fd()) == Some(fd) {
            return Some(Peer::Spawner);
        }
        self.clients
            .iter()
            .any(|c| c.channel.reader_fd() == fd)
            .then_some(Peer::Client(fd))
    }

    fn channel_mut(&mut self, peer: Peer) -> Option<&mut PacketChannel> {
        match peer {
            Peer::Spawner => self.spawner.as_mut(),
            Peer::Client(fd) => self
                .clients
                .iter_mut()
                .find(|c| c.channel.reader_fd() == fd)
                .map(|c| &mut c.channel),
        }
    }

    fn drop_peer(&mut self, peer: Peer, reg: &mut ViewRegistry) {
        match peer {
            Peer::Spawner => {
                if let Some(spawner) = self.spawner.take() {
                    reg.unregister(spawner.reader_fd());
                    info!("View {}: spawner went away", self.kind);
                }
            }
            Peer::Client(fd) => {
                reg.unregister(fd);
                self.clients.retain(|c| c.channel.reader_fd() != fd);
                info!(
                    "View {}: client on fd {} went away, {} left",
                    self.kind,
                    fd,
                    self.clients.len()
                );
            }
        }
        self.finish_if_quitting(reg);
    }

    /// Reads one packet from `peer` and acts on it.
    pub(super) fn receive_from(&mut self, peer: Peer, reg: &mut ViewRegistry) {
        let Some(channel) = self.channel_mut(peer) else {
            return;
        };
        match channel.recv() {
            Ok(Some(packet)) => self.apply_packet(packet, Some(peer), reg),
            Ok(None) => self.drop_peer(peer, reg),
            Err(ViewError::UnknownPacketKind(kind)) => {
                warn!("View {}: ignoring packet of kind {:#x}", self.kind, kind);
            }
            Err(e) => {
                warn!("View {}: link to {:?} failed: {}", self.kind, peer, e);
                self.drop_peer(peer, reg);
            }
        }
    }

    /// Applies a packet received from `from` and passes it on to the other
    /// links.
    pub fn apply_packet(&mut self, packet: CommandPacket, from: Option<Peer>, reg: &mut ViewRegistry) {
        trace!("View {}: packet {:?} from {:?}", self.kind, packet, from);
        match packet.kind {
            PacketKind::Nop => {}
            PacketKind::NotifyReadAt => {
                if self.phase == Phase::Running {
                    if let Err(e) = self.apply_window(packet.offset, packet.size.max(1), reg) {
                        self.fail(e);
                    }
                }
                self.broadcast(&packet, from);
            }
            PacketKind::Spawn(kind) => {
                let outcome = self.request_spawn(kind, false, reg);
                debug!("View {}: relayed spawn of {} -> {:?}", self.kind, kind, outcome);
            }
        }
    }

    /// Sends `packet` on every link except `except`.
    pub(super) fn broadcast(&mut self, packet: &CommandPacket, except: Option<Peer>) {
        if except != Some(Peer::Spawner) {
            if let Some(spawner) = self.spawner.as_mut() {
                if let Err(e) = spawner.send(packet) {
                    warn!("View {}: cannot reach spawner: {}", self.kind, e);
                }
            }
        }
        for client in &mut self.clients {
            if except == Some(Peer::Client(client.channel.reader_fd())) {
                continue;
            }
            if let Err(e) = client.channel.send(packet) {
                warn!("View {}: cannot reach client {:?}: {}", self.kind, client.pid, e);
            }
        }
    }

    /// Opens a new view of `kind` on the same input.
    pub fn request_spawn(&mut self, kind: GraphKind, detached: bool, reg: &mut ViewRegistry) -> SpawnOutcome {
        if detached {
            return match self.spawn_detached(kind) {
                Ok(()) => SpawnOutcome::Detached,
                Err(e) => {
                    warn!("View {}: {}", self.kind, e);
                    SpawnOutcome::Dropped
                }
            };
        }
        if let Some(spawner) = self.spawner.as_mut() {
            return match spawner.send(&CommandPacket::spawn(kind)) {
                Ok(()) => SpawnOutcome::Forwarded,
                Err(e) => {
                    warn!("View {}: cannot forward spawn request: {}", self.kind, e);
                    SpawnOutcome::Dropped
                }
            };
        }
        if self.clients.len() + 1 >= self.settings.max_views || reg.spare() == 0 {
            warn!(
                "View {}: {} views already open, not spawning {}",
                self.kind,
                self.clients.len() + 1,
                kind
            );
            return SpawnOutcome::Dropped;
        }
        match self.fork_client(kind, reg) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("View {}: {}", self.kind, e);
                SpawnOutcome::Dropped
            }
        }
    }

    fn fork_client(&mut self, kind: GraphKind, reg: &mut ViewRegistry) -> ViewResult<SpawnOutcome> {
        let (ours, theirs) = channel_pair()?;
        match fork_view()? {
            Forked::Parent { child } => {
                drop(theirs);
                self.attach_client(ours, Some(child), reg)?;
                info!("View {}: started {} view as pid {}", self.kind, kind, child);
                Ok(SpawnOutcome::Forked(child))
            }
            Forked::Child => {
                drop(ours);
                self.become_child(kind, theirs, reg);
                Ok(SpawnOutcome::Child)
            }
        }
    }

    /// Turns a freshly forked copy of the spawner into a view of `kind`.
    fn become_child(&mut self, kind: GraphKind, spawner: PacketChannel, reg: &mut ViewRegistry) {
        reg.reset();
        self.clients.clear();
        self.spawner = None;
        if let Some(inherited) = self.display.take() {
            inherited.abandon();
        }
        self.kind = kind;
        self.analyzer = kind.build(&self.settings.appearance.palette);
        self.exposed = false;
        self.autoscroll = false;
        self.phase = Phase::Running;
        self.forked = true;
        debug!("View {}: running in pid {}", kind, std::process::id());

        match (self.display_factory)(&self.settings.display_settings(kind)) {
            Ok(display) => self.display = Some(display),
            Err(e) => {
                self.fail(e.context("Failed to open a display for the new view"));
                return;
            }
        }
        if let Err(e) = self.attach_spawner(spawner, reg) {
            self.fail(e.into());
            return;
        }
        if let Err(e) = self.install(reg) {
            self.fail(e);
            return;
        }
        self.setup_analyzer();
        let offset = self.stream.offset();
        if let Err(e) = self.restart_window(offset, reg) {
            self.fail(e);
        }
    }

    /// Starts a view in a new process image that does not follow this one.
    fn spawn_detached(&self, kind: GraphKind) -> ViewResult<()> {
        let exe = std::env::current_exe()?;
        let mut command = Command::new(exe);
        command
            .env(ENV_GRAPH, kind.name())
            .env(ENV_OFFSET, self.stream.offset().to_string())
            .env(ENV_BLOCK_SIZE, self.stream.window_size().to_string());
        if let Some(path) = &self.settings.input_path {
            command.arg(path);
        }
        let child = command
            .spawn()
            .map_err(|e| ViewError::Spawn(format!("exec: {}", e)))?;
        info!("View {}: detached {} view as pid {}", self.kind, kind, child.id());
        Ok(())
    }
}
