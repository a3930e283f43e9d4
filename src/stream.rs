// src/stream.rs

//! The input side of a view: the current window `(offset, size)` over the
//! input and the chunked reads that fill it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::os::unix::io::{AsFd, AsRawFd, RawFd};
use std::path::Path;

use anyhow::Result;
use log::{debug, trace, warn};

use crate::config::DEFAULT_BLOCK_SIZE;
use crate::error::{ViewError, ViewResult};
use crate::graph::Analyzer;
use crate::renderer::Surface;

/// How reads reach a given offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Regular file: positional reads, the shared file offset is never moved.
    Positional,
    /// Seekable, but not a regular file: seek then read.
    Seek,
    /// Pipes, terminals and sockets.
    Sequential,
}

#[derive(Debug)]
pub struct Input {
    file: File,
    access: Access,
}

impl Input {
    pub fn new(file: File) -> Self {
        let is_file = file.metadata().map(|m| m.is_file()).unwrap_or(false);
        let access = if is_file {
            Access::Positional
        } else if (&file).stream_position().is_ok() {
            Access::Seek
        } else {
            Access::Sequential
        };
        trace!("Input: fd {} accessed as {:?}", file.as_raw_fd(), access);
        Self { file, access }
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        File::open(path).map(Self::new)
    }

    /// A private duplicate of standard input.
    pub fn stdin() -> io::Result<Self> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self::new(File::from(fd)))
    }

    pub fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Size of the input when it is a non-empty regular file.
    pub fn size_hint(&self) -> Option<u64> {
        match self.file.metadata() {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
            Ok(_) => None,
            Err(e) => {
                warn!("Input: fstat failed: {}", e);
                None
            }
        }
    }

    fn is_seekable(&self) -> bool {
        self.access != Access::Sequential
    }
}

/// Result of one [`StreamReader::read_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes read, the window still has room.
    Partial(usize),
    /// `n` bytes read and the window is now complete.
    Filled(usize),
    /// Nothing to do, the window was already complete.
    Exhausted,
    /// End of input or a read error; the window will not fill any further.
    Ended,
}

impl ReadOutcome {
    /// Whether the reader is done with the current window.
    pub fn is_settled(&self) -> bool {
        !matches!(self, ReadOutcome::Partial(_))
    }
}

#[derive(Debug)]
pub struct StreamReader {
    input: Input,
    base_offset: i64,
    window_size: u64,
    bytes_read: u64,
    max_chunk: usize,
    seekable: bool,
    buf: Vec<u8>,
}

impl StreamReader {
    /// Opens a window of `size` bytes at `offset`. A `size` of 0 picks the
    /// input size, or [`DEFAULT_BLOCK_SIZE`] when that is unknown. When the
    /// input cannot be positioned at a non-zero `offset` (including any
    /// negative one), the reader starts at 0 and stays non-seekable.
    pub fn new(input: Input, offset: i64, size: u64, max_chunk: usize) -> Self {
        let window_size = if size == 0 {
            input.size_hint().unwrap_or(DEFAULT_BLOCK_SIZE)
        } else {
            size
        };
        let max_chunk = max_chunk.max(1);
        let mut reader = Self {
            seekable: input.is_seekable(),
            input,
            base_offset: 0,
            window_size,
            bytes_read: 0,
            max_chunk,
            buf: vec![0; max_chunk],
        };
        if offset != 0 {
            if let Err(e) = reader.restart(offset) {
                warn!("StreamReader: cannot start at {}: {}", offset, e);
                reader.base_offset = 0;
                reader.seekable = false;
            }
        }
        debug!(
            "StreamReader: fd {} window {}+{}, seekable {}",
            reader.fd(),
            reader.base_offset,
            reader.window_size,
            reader.seekable
        );
        reader
    }

    pub fn fd(&self) -> RawFd {
        self.input.fd()
    }

    pub fn offset(&self) -> i64 {
        self.base_offset
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn is_exhausted(&self) -> bool {
        self.bytes_read >= self.window_size
    }

    /// Changes the window size; takes effect for reads after the next
    /// [`restart`](Self::restart).
    pub fn set_window_size(&mut self, size: u64) {
        self.window_size = size.max(1);
    }

    /// Starts a new window at `offset`.
    ///
    /// The window is reset even when the input cannot be repositioned; reads
    /// then simply continue where the input is. That failure is reported as
    /// [`ViewError::NotSeekable`] and is permanent. A negative `offset` is
    /// rejected and the window stays where it was.
    pub fn restart(&mut self, offset: i64) -> ViewResult<()> {
        self.bytes_read = 0;
        let Ok(position) = u64::try_from(offset) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("negative offset {}", offset),
            )
            .into());
        };
        self.base_offset = offset;
        if !self.seekable {
            return Err(ViewError::NotSeekable);
        }
        match self.input.access {
            Access::Positional => Ok(()),
            Access::Seek | Access::Sequential => match self.input.file.seek(SeekFrom::Start(position)) {
                Ok(_) => Ok(()),
                Err(e) if e.raw_os_error() == Some(libc::ESPIPE) => {
                    warn!("StreamReader: input turned out not to be seekable");
                    self.seekable = false;
                    Err(ViewError::NotSeekable)
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Reads the next chunk of the window and hands it to `analyzer`.
    ///
    /// Single-byte reads are counted but not analyzed.
    pub fn read_chunk(
        &mut self,
        analyzer: &mut dyn Analyzer,
        surface: &mut dyn Surface,
    ) -> Result<ReadOutcome> {
        if self.is_exhausted() {
            return Ok(ReadOutcome::Exhausted);
        }
        let remaining = self.window_size - self.bytes_read;
        let want = (self.max_chunk as u64).min(remaining) as usize;
        let buf = &mut self.buf[..want];

        let result = match self.input.access {
            Access::Positional => {
                let at = self.base_offset.max(0) as u64 + self.bytes_read;
                self.input.file.read_at(buf, at)
            }
            Access::Seek | Access::Sequential => self.input.file.read(buf),
        };
        let n = match result {
            Ok(0) => {
                debug!(
                    "StreamReader: end of input after {} of {} bytes",
                    self.bytes_read, self.window_size
                );
                return Ok(ReadOutcome::Ended);
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                return Ok(ReadOutcome::Partial(0));
            }
            Err(e) => {
                warn!("StreamReader: read failed: {}", e);
                return Ok(ReadOutcome::Ended);
            }
        };

        self.bytes_read += n as u64;
        trace!(
            "StreamReader: read {} bytes ({}/{})",
            n,
            self.bytes_read,
            self.window_size
        );
        if n > 1 {
            analyzer.analyze(&self.buf[..n], surface)?;
        }
        Ok(if self.is_exhausted() {
            ReadOutcome::Filled(n)
        } else {
            ReadOutcome::Partial(n)
        })
    }
}
