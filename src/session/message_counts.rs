use serde::Serialize;

use super::message::MessageType;

/// Messages of one type, by direction
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Counts {
    pub queued: u64,
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MessageCounts {
    pub open: Counts,
    pub update: Counts,
    pub notification: Counts,
    pub keepalive: Counts,
    pub route_refresh: Counts,
}

impl MessageCounts {
    pub fn new() -> Self {
        MessageCounts::default()
    }

    pub fn get(&self, kind: MessageType) -> Counts {
        match kind {
            MessageType::Open => self.open,
            MessageType::Update => self.update,
            MessageType::Notification => self.notification,
            MessageType::Keepalive => self.keepalive,
            MessageType::RouteRefresh => self.route_refresh,
        }
    }

    fn get_mut(&mut self, kind: MessageType) -> &mut Counts {
        match kind {
            MessageType::Open => &mut self.open,
            MessageType::Update => &mut self.update,
            MessageType::Notification => &mut self.notification,
            MessageType::Keepalive => &mut self.keepalive,
            MessageType::RouteRefresh => &mut self.route_refresh,
        }
    }

    fn all(&self) -> [Counts; 5] {
        [
            self.open,
            self.update,
            self.notification,
            self.keepalive,
            self.route_refresh,
        ]
    }

    pub fn received(&self) -> u64 {
        self.all().iter().map(|c| c.received).sum()
    }
    pub fn increment_received(&mut self, kind: MessageType) {
        self.get_mut(kind).received += 1;
    }

    pub fn sent(&self) -> u64 {
        self.all().iter().map(|c| c.sent).sum()
    }
    pub fn increment_sent(&mut self, kind: MessageType) {
        self.get_mut(kind).sent += 1;
    }

    pub fn increment_queued(&mut self, kind: MessageType) {
        self.get_mut(kind).queued += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_type() {
        let mut counts = MessageCounts::new();
        counts.increment_queued(MessageType::Open);
        counts.increment_sent(MessageType::Open);
        counts.increment_sent(MessageType::Keepalive);
        counts.increment_received(MessageType::Update);
        assert_eq!(counts.get(MessageType::Open).queued, 1);
        assert_eq!(counts.sent(), 2);
        assert_eq!(counts.received(), 1);
        assert_eq!(counts.get(MessageType::Notification), Counts::default());
    }
}
