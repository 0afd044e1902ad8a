//! The socket half of a connection.
//!
//! A [`Channel`] is held only by the worker that owns it: the connection map
//! and, for the length of one service pass, the worker thread itself. Removing
//! it from the map on disconnect therefore releases the descriptor no matter
//! how many [`Connection`](crate::reactor::Connection) handles are still alive.

use crate::error::{ReactorError, Result};
use bytes::BytesMut;
use mio::net::TcpStream;
use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::io::{AsRawFd, RawFd};

/// Result of one non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were appended
    Data(usize),
    /// The socket has nothing more to give right now
    WouldBlock,
}

pub(crate) struct Channel {
    stream: TcpStream,
}

impl Channel {
    pub(crate) fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Perform one non-blocking read of at most `max` bytes, appended to `dst`.
    ///
    /// # Errors
    /// `ConnectionClosed` on end-of-stream, or the underlying I/O error.
    pub(crate) fn read_into(&self, dst: &mut BytesMut, max: usize) -> Result<ReadOutcome> {
        let start = dst.len();
        dst.resize(start + max, 0);
        loop {
            match (&self.stream).read(&mut dst[start..]) {
                Ok(0) => {
                    dst.truncate(start);
                    return Err(ReactorError::ConnectionClosed);
                }
                Ok(n) => {
                    dst.truncate(start + n);
                    return Ok(ReadOutcome::Data(n));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    dst.truncate(start);
                    return Ok(ReadOutcome::WouldBlock);
                }
                Err(e) => {
                    dst.truncate(start);
                    return Err(ReactorError::Io(e));
                }
            }
        }
    }

    /// Shut the socket down in both directions
    pub(crate) fn shutdown(&self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl AsRawFd for Channel {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}
