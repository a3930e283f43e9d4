// src/protocol.rs

//! Fixed-size command packets exchanged between sibling views.
//!
//! Every packet is [`PACKET_SIZE`] bytes: a 32-bit kind, four bytes of
//! padding, a signed 64-bit offset and an unsigned 64-bit size, all in native
//! byte order (peers always run on the same host). The size stays well under
//! `PIPE_BUF`, so a single `write` on a pipe is delivered whole.

use log::{debug, trace};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use crate::error::{ViewError, ViewResult};
use crate::graph::GraphKind;

pub const PACKET_SIZE: usize = 24;

const _: () = assert!(PACKET_SIZE <= libc::PIPE_BUF);

const KIND_NOP: u32 = 0;
const KIND_NOTIFY_READ_AT: u32 = 1;
const KIND_SPAWN_BASE: u32 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Nop,
    /// The sender moved its window to `(offset, size)`.
    NotifyReadAt,
    /// Ask the root view to fork a synchronized view of this variant.
    Spawn(GraphKind),
}

impl PacketKind {
    fn code(self) -> u32 {
        match self {
            PacketKind::Nop => KIND_NOP,
            PacketKind::NotifyReadAt => KIND_NOTIFY_READ_AT,
            PacketKind::Spawn(kind) => KIND_SPAWN_BASE + kind.index() as u32,
        }
    }

    fn from_code(code: u32) -> ViewResult<Self> {
        match code {
            KIND_NOP => Ok(PacketKind::Nop),
            KIND_NOTIFY_READ_AT => Ok(PacketKind::NotifyReadAt),
            c if c >= KIND_SPAWN_BASE => GraphKind::from_index((c - KIND_SPAWN_BASE) as usize)
                .map(PacketKind::Spawn)
                .ok_or(ViewError::UnknownPacketKind(code)),
            _ => Err(ViewError::UnknownPacketKind(code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    pub kind: PacketKind,
    pub offset: i64,
    pub size: u64,
}

impl CommandPacket {
    pub fn nop() -> Self {
        Self {
            kind: PacketKind::Nop,
            offset: 0,
            size: 0,
        }
    }

    pub fn notify_read_at(offset: i64, size: u64) -> Self {
        Self {
            kind: PacketKind::NotifyReadAt,
            offset,
            size,
        }
    }

    pub fn spawn(kind: GraphKind) -> Self {
        Self {
            kind: PacketKind::Spawn(kind),
            offset: 0,
            size: 0,
        }
    }

    pub fn encode(&self) -> [u8; PACKET_SIZE] {
        let mut out = [0u8; PACKET_SIZE];
        out[0..4].copy_from_slice(&self.kind.code().to_ne_bytes());
        out[8..16].copy_from_slice(&self.offset.to_ne_bytes());
        out[16..24].copy_from_slice(&self.size.to_ne_bytes());
        out
    }

    pub fn decode(raw: &[u8; PACKET_SIZE]) -> ViewResult<Self> {
        let mut word = [0u8; 4];
        let mut quad = [0u8; 8];
        word.copy_from_slice(&raw[0..4]);
        let kind = PacketKind::from_code(u32::from_ne_bytes(word))?;
        quad.copy_from_slice(&raw[8..16]);
        let offset = i64::from_ne_bytes(quad);
        quad.copy_from_slice(&raw[16..24]);
        let size = u64::from_ne_bytes(quad);
        Ok(Self { kind, offset, size })
    }
}

/// One end of a duplex link to a peer view: a pipe we read packets from and
/// a pipe we write packets to.
#[derive(Debug)]
pub struct PacketChannel {
    reader: File,
    writer: File,
}

impl PacketChannel {
    pub fn new(reader: File, writer: File) -> Self {
        Self { reader, writer }
    }

    /// Descriptor to watch for incoming packets.
    pub fn reader_fd(&self) -> RawFd {
        self.reader.as_raw_fd()
    }

    pub fn writer_fd(&self) -> RawFd {
        self.writer.as_raw_fd()
    }

    pub fn send(&mut self, packet: &CommandPacket) -> ViewResult<()> {
        let raw = packet.encode();
        trace!("PacketChannel: fd {} -> {:?}", self.writer.as_raw_fd(), packet);
        self.writer.write_all(&raw)?;
        Ok(())
    }

    /// Reads one whole packet. `Ok(None)` means the peer closed its end.
    ///
    /// A packet is never dropped on a short read: the remaining bytes are
    /// awaited, and end-of-file inside a packet is reported as
    /// [`ViewError::ShortPacket`].
    pub fn recv(&mut self) -> ViewResult<Option<CommandPacket>> {
        let mut raw = [0u8; PACKET_SIZE];
        let mut filled = 0;
        while filled < PACKET_SIZE {
            match self.reader.read(&mut raw[filled..]) {
                Ok(0) if filled == 0 => {
                    debug!("PacketChannel: fd {} closed by peer", self.reader.as_raw_fd());
                    return Ok(None);
                }
                Ok(0) => {
                    return Err(ViewError::ShortPacket {
                        received: filled,
                        expected: PACKET_SIZE,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let packet = CommandPacket::decode(&raw)?;
        trace!("PacketChannel: fd {} <- {:?}", self.reader.as_raw_fd(), packet);
        Ok(Some(packet))
    }
}
