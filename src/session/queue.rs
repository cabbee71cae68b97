use std::fmt;

use bytes::Bytes;

use super::message::MessageType;
use crate::error::{Error, Result};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// An encoded message waiting to be written to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub kind: MessageType,
    pub data: Bytes,
}

impl OutboundMessage {
    pub fn new(kind: MessageType, data: Bytes) -> Self {
        Self { kind, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fixed-capacity FIFO ring of outbound messages
///
/// `count` always equals the number of occupied slots, and
/// `tail == (head + count) % capacity` while storage is held.
pub struct OutboundQueue {
    slots: Vec<Option<OutboundMessage>>,
    head: usize,
    tail: usize,
    count: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    pub fn enqueue(&mut self, message: OutboundMessage) -> Result<()> {
        if self.is_full() {
            return Err(Error::QueueFull);
        }
        self.slots[self.tail] = Some(message);
        self.tail = (self.tail + 1) % self.capacity();
        self.count += 1;
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<OutboundMessage> {
        if self.is_empty() {
            return None;
        }
        let message = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.count -= 1;
        message
    }

    /// Drop all queued messages and the storage itself. Safe to repeat.
    pub fn free(&mut self) {
        self.slots = Vec::new();
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

impl fmt::Debug for OutboundQueue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OutboundQueue[{}/{}]", self.count, self.capacity())
    }
}
