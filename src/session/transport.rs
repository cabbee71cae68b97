use std::ffi::CString;
use std::io;
use std::net::{self, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, trace, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Decoder;

use super::codec::MessageCodec;
use super::message::Message;
use crate::error::{Error, Result};

pub const BGP_PORT: u16 = 179;
pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte-stream connection to a single peer
#[async_trait]
pub trait Transport: Send {
    fn peer(&self) -> SocketAddr;

    /// Start a non-blocking connect; "in progress" counts as success
    fn connect(&mut self) -> Result<()>;

    /// Wait (bounded) until writable, then make a single write attempt
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Drain whatever has arrived without blocking and decode it
    fn receive(&mut self) -> Result<Vec<Message>>;

    fn is_connected(&self) -> bool;

    /// Release the connection. Safe to repeat.
    fn close(&mut self);
}

/// Host services the speaker depends on
pub trait Platform: Send + Sync {
    fn open(&self, peer: SocketAddr) -> Result<Box<dyn Transport>>;

    /// Resolve an interface name to its index
    fn interface_index(&self, name: &str) -> Option<u32>;
}

#[derive(Debug, Default)]
pub struct TcpPlatform;

impl Platform for TcpPlatform {
    fn open(&self, peer: SocketAddr) -> Result<Box<dyn Transport>> {
        Ok(Box::new(TcpTransport::new(peer)?))
    }

    fn interface_index(&self, name: &str) -> Option<u32> {
        let name = CString::new(name).ok()?;
        // SAFETY: name is a valid NUL-terminated string for the duration of the call
        let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if index == 0 {
            None
        } else {
            Some(index)
        }
    }
}

enum Connection {
    Pending(Socket),
    Stream(TcpStream),
    Closed,
}

pub struct TcpTransport {
    peer: SocketAddr,
    conn: Connection,
    codec: MessageCodec,
    read_buf: BytesMut,
    peer_closed: bool,
}

impl TcpTransport {
    pub fn new(peer: SocketAddr) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| Error::TransportFailure(format!("socket for {}: {}", peer, e)))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            peer,
            conn: Connection::Pending(socket),
            codec: MessageCodec::new(),
            read_buf: BytesMut::with_capacity(4096),
            peer_closed: false,
        })
    }

    fn stream(&self) -> Result<&TcpStream> {
        match &self.conn {
            Connection::Stream(stream) => Ok(stream),
            _ => Err(Error::TransportFailure(format!(
                "{} is not connected",
                self.peer
            ))),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn connect(&mut self) -> Result<()> {
        let socket = match std::mem::replace(&mut self.conn, Connection::Closed) {
            Connection::Pending(socket) => socket,
            other => {
                self.conn = other;
                return Ok(());
            }
        };
        match socket.connect(&SockAddr::from(self.peer)) {
            Ok(()) => (),
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {
                trace!("Connection to {} in progress", self.peer)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => (),
            Err(e) => {
                return Err(Error::TransportFailure(format!(
                    "connect to {}: {}",
                    self.peer, e
                )))
            }
        }
        let stream = TcpStream::from_std(net::TcpStream::from(socket))?;
        self.conn = Connection::Stream(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let peer = self.peer;
        let stream = self.stream()?;
        match timeout(SEND_TIMEOUT, stream.writable()).await {
            Ok(Ok(())) => (),
            Ok(Err(e)) => return Err(Error::SendFailed(format!("{}: {}", peer, e))),
            Err(_) => {
                return Err(Error::SendFailed(format!(
                    "{} not writable after {:?}",
                    peer, SEND_TIMEOUT
                )))
            }
        }
        match stream.try_write(data) {
            Ok(written) if written < data.len() => {
                warn!("Short write to {}: {} of {} bytes", peer, written, data.len());
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(Error::SendFailed(format!("{}: {}", peer, e))),
        }
    }

    fn receive(&mut self) -> Result<Vec<Message>> {
        if let Connection::Stream(stream) = &self.conn {
            loop {
                match stream.try_read_buf(&mut self.read_buf) {
                    Ok(0) => {
                        if !self.peer_closed {
                            debug!("Connection closed by {}", self.peer);
                        }
                        self.peer_closed = true;
                        break;
                    }
                    Ok(read) => trace!("Read {} bytes from {}", read, self.peer),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        self.peer_closed = true;
                        return Err(Error::TransportFailure(format!("{}: {}", self.peer, e)));
                    }
                }
            }
        }
        let mut messages = Vec::new();
        loop {
            match self.codec.decode(&mut self.read_buf) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => break,
                Err(e) => warn!("Dropping malformed message from {}: {}", self.peer, e),
            }
        }
        Ok(messages)
    }

    fn is_connected(&self) -> bool {
        match &self.conn {
            Connection::Stream(stream) => !self.peer_closed && stream.peer_addr().is_ok(),
            _ => false,
        }
    }

    fn close(&mut self) {
        if let Connection::Stream(_) = self.conn {
            trace!("Closing connection to {}", self.peer);
        }
        self.conn = Connection::Closed;
        self.read_buf.clear();
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
