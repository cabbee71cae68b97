//! In-memory transport and platform for driving sessions without sockets

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio_util::codec::Decoder;

use super::codec::MessageCodec;
use super::message::{Message, OpenMessage};
use super::transport::{Platform, Transport};
use crate::error::{Error, Result};

/// Both ends of a simulated connection, shared by every transport opened to a peer
#[derive(Debug, Default)]
pub struct Wire {
    /// Everything the speaker has written, decoded
    pub sent: Vec<Message>,
    /// Messages the speaker will read on its next receive
    pub inbound: VecDeque<Message>,
    /// Answer an OPEN with OPEN + KEEPALIVE from this (asn, router_id)
    pub auto_reply: Option<(u32, Ipv4Addr)>,
    pub fail_send: bool,
    pub disconnected: bool,
    pub opened: usize,
    pub closed: usize,
}

impl Wire {
    pub fn sent_count(&self, predicate: impl Fn(&Message) -> bool) -> usize {
        self.sent.iter().filter(|m| predicate(m)).count()
    }
}

pub type SharedWire = Arc<Mutex<Wire>>;

#[derive(Default)]
pub struct MockPlatform {
    wires: Mutex<HashMap<IpAddr, SharedWire>>,
    refuse: Mutex<HashSet<IpAddr>>,
    interfaces: HashMap<String, u32>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interface(mut self, name: &str, index: u32) -> Self {
        self.interfaces.insert(name.to_owned(), index);
        self
    }

    /// Wire for `addr`, created silent if it does not exist yet
    pub fn wire(&self, addr: Ipv4Addr) -> SharedWire {
        let mut wires = self.wires.lock().unwrap();
        wires.entry(IpAddr::V4(addr)).or_default().clone()
    }

    /// A peer that completes the OPEN exchange on its own
    pub fn responsive_peer(&self, addr: Ipv4Addr, asn: u32, router_id: Ipv4Addr) -> SharedWire {
        let wire = self.wire(addr);
        wire.lock().unwrap().auto_reply = Some((asn, router_id));
        wire
    }

    pub fn refuse(&self, addr: Ipv4Addr) {
        self.refuse.lock().unwrap().insert(IpAddr::V4(addr));
    }
}

impl Platform for MockPlatform {
    fn open(&self, peer: SocketAddr) -> Result<Box<dyn Transport>> {
        if self.refuse.lock().unwrap().contains(&peer.ip()) {
            return Err(Error::TransportFailure(format!("{} refused", peer)));
        }
        let wire = {
            let mut wires = self.wires.lock().unwrap();
            wires.entry(peer.ip()).or_default().clone()
        };
        wire.lock().unwrap().opened += 1;
        Ok(Box::new(MockTransport {
            peer,
            wire,
            closed: false,
        }))
    }

    fn interface_index(&self, name: &str) -> Option<u32> {
        self.interfaces.get(name).copied()
    }
}

pub struct MockTransport {
    peer: SocketAddr,
    wire: SharedWire,
    closed: bool,
}

#[async_trait]
impl Transport for MockTransport {
    fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut wire = self.wire.lock().unwrap();
        if self.closed || wire.fail_send {
            return Err(Error::SendFailed(format!("{} unreachable", self.peer)));
        }
        let mut codec = MessageCodec::new();
        let mut buf = BytesMut::from(data);
        while let Some(message) = codec.decode(&mut buf).unwrap() {
            if let (Message::Open(_), Some((asn, router_id))) = (&message, wire.auto_reply) {
                wire.inbound
                    .push_back(Message::Open(OpenMessage::new(asn, router_id)));
                wire.inbound.push_back(Message::Keepalive);
            }
            wire.sent.push(message);
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Message>> {
        if self.closed {
            return Ok(vec![]);
        }
        Ok(self.wire.lock().unwrap().inbound.drain(..).collect())
    }

    fn is_connected(&self) -> bool {
        !self.closed && !self.wire.lock().unwrap().disconnected
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.wire.lock().unwrap().closed += 1;
        }
    }
}
