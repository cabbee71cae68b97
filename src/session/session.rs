use std::cmp;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio::sync::Mutex;
use tokio_util::codec::Encoder;

use super::codec::MessageCodec;
use super::fsm::{self, Action, Observations, Transition};
use super::message::{
    two_byte_asn, Message, MessageType, NotificationMessage, OpenMessage, RouteRefreshMessage,
    BGP_VERSION,
};
use super::message_counts::MessageCounts;
use super::queue::{OutboundMessage, OutboundQueue};
use super::timers::SessionTimers;
use super::transport::{Platform, Transport};
use super::SessionState;
use crate::config::PeerConfig;
use crate::error::{Error, Result};
use crate::rib::session::ExportPolicy;
use crate::store::Store;

/// A configured peer; the session behind it is only touched under its lock
pub struct Neighbor {
    pub addr: Ipv4Addr,
    pub(crate) session: Mutex<Session>,
}

impl Neighbor {
    pub fn new(session: Session) -> Self {
        Self {
            addr: session.addr(),
            session: Mutex::new(session),
        }
    }
}

pub struct Session {
    pub(crate) peer: PeerConfig,
    pub(crate) state: SessionState,
    // Refreshed from the router globals whenever a connection is attempted
    pub(crate) local_as: u32,
    pub(crate) bgp_identifier: Ipv4Addr,
    pub(crate) hold_time: u16,
    pub(crate) keepalive_time: u16,
    // Learned from the peer's OPEN
    pub(crate) remote_id: Option<Ipv4Addr>,
    pub(crate) remote_hold_time: Option<u16>,
    pub(crate) timers: SessionTimers,
    pub(crate) counts: MessageCounts,
    pub(crate) connect_time: Option<DateTime<Utc>>,
    pub(crate) established_time: Option<DateTime<Utc>>,
    pub(crate) last_sent: Option<DateTime<Utc>>,
    pub(crate) last_received: Option<DateTime<Utc>>,
    deconfigured: bool,
    open_delivered: bool,
    queue: OutboundQueue,
    queue_capacity: usize,
    transport: Option<Box<dyn Transport>>,
    inbox: VecDeque<Message>,
    codec: MessageCodec,
    platform: Arc<dyn Platform>,
}

impl Session {
    /// A session in Idle, optionally holding an already opened transport
    pub fn new(
        peer: PeerConfig,
        platform: Arc<dyn Platform>,
        queue_capacity: usize,
        transport: Option<Box<dyn Transport>>,
    ) -> Self {
        Self {
            peer,
            state: SessionState::Idle,
            local_as: 0,
            bgp_identifier: Ipv4Addr::UNSPECIFIED,
            hold_time: 0,
            keepalive_time: 0,
            remote_id: None,
            remote_hold_time: None,
            timers: SessionTimers::default(),
            counts: MessageCounts::new(),
            connect_time: None,
            established_time: None,
            last_sent: None,
            last_received: None,
            deconfigured: false,
            open_delivered: false,
            queue: OutboundQueue::new(queue_capacity),
            queue_capacity,
            transport,
            inbox: VecDeque::new(),
            codec: MessageCodec::new(),
            platform,
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.peer.remote_ip
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(self.peer.remote_ip), self.peer.dest_port)
    }

    pub fn is_ebgp(&self) -> bool {
        self.local_as != self.peer.remote_as
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    #[cfg(test)]
    pub(crate) fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Move to `to`, running the exit actions of the current state and the
    /// entry actions of the new one
    pub async fn change_state(&mut self, to: SessionState, store: &Mutex<Store>) {
        let transition = fsm::change(self.state, to);
        self.apply(transition, store).await;
    }

    /// Manual start event, ignored unless Idle and enabled
    ///
    /// An Idle session that may not start holds no transport.
    pub async fn start(&mut self, store: &Mutex<Store>) {
        if self.state != SessionState::Idle {
            return;
        }
        if self.peer.enabled && !self.deconfigured {
            self.change_state(SessionState::Connect, store).await;
        } else {
            self.release_resources();
        }
    }

    /// One periodic step of the state machine
    pub async fn tick(&mut self, store: &Mutex<Store>) {
        if self.deconfigured {
            return;
        }
        let observations = self.observe(store).await;
        let transition = fsm::step(self.state, &observations);
        self.apply(transition, store).await;
    }

    async fn apply(&mut self, transition: Transition, store: &Mutex<Store>) {
        if transition.changed() {
            debug!(
                "{} went from {} to {}",
                self.addr(),
                transition.from,
                transition.to
            );
        }
        for action in transition.actions {
            self.perform(action, store).await;
        }
        self.state = transition.to;
    }

    async fn perform(&mut self, action: Action, store: &Mutex<Store>) {
        match action {
            Action::ReleaseResources => self.release_resources(),
            Action::AcquireResources => self.acquire_resources(store).await,
            Action::SendOpen => {
                self.open_delivered = false;
                let open = OpenMessage::new(self.local_as, self.bgp_identifier)
                    .with_hold_time(self.hold_time);
                self.enqueue(Message::Open(open));
            }
            Action::SendKeepalive => self.enqueue(Message::Keepalive),
            Action::SendNotification(notification) => {
                self.enqueue(Message::Notification(notification))
            }
            Action::LoadTimers => {
                let hold = cmp::min(
                    self.hold_time,
                    self.remote_hold_time.unwrap_or(self.hold_time),
                );
                self.timers.load(hold, self.keepalive_time);
                self.established_time = Some(Utc::now());
                info!(
                    "Session established with {} [hold={}, keepalive={}]",
                    self.addr(),
                    hold,
                    self.keepalive_time
                );
            }
            Action::ReloadKeepalive => self.timers.reload_keepalive(),
            Action::AdvertiseRoutes => {
                let update = {
                    let policy = ExportPolicy {
                        local_as: self.local_as,
                        remote_as: self.peer.remote_as,
                        filter: self.peer.route_filter.as_deref(),
                    };
                    store.lock().await.rib.next_update(self.addr(), &policy)
                };
                if let Some(update) = update {
                    self.enqueue(Message::Update(update));
                }
            }
            Action::StopRouteExchange => {
                let mut store = store.lock().await;
                store.rib.clear_rib_in(self.addr());
                store.rib.clear_rib_out(self.addr());
                self.established_time = None;
            }
            Action::DrainQueue => self.drain_queue().await,
        }
    }

    /// Read whatever the peer sent and work out what it means for this state
    async fn observe(&mut self, store: &Mutex<Store>) -> Observations {
        let addr = self.addr();
        let mut obs = Observations {
            auto_start: self.peer.enabled,
            open_delivered: self.open_delivered,
            ..Default::default()
        };
        if let Some(transport) = self.transport.as_mut() {
            match transport.receive() {
                Ok(messages) => {
                    for message in messages {
                        trace!("[{}] Incoming: {}", addr, message);
                        self.counts.increment_received(message.kind());
                        self.last_received = Some(Utc::now());
                        self.inbox.push_back(message);
                    }
                }
                Err(err) => warn!("[{}] Receive failed: {}", addr, err),
            }
            obs.connected = transport.is_connected();
        }
        obs.transport_lost = !obs.connected;

        match self.state {
            SessionState::OpenSent => {
                while let Some(message) = self.inbox.pop_front() {
                    match message {
                        Message::Open(open) => {
                            obs.open_received = true;
                            obs.open_rejected = !self.accepts(&open);
                            self.remote_id = Some(open.router_id);
                            self.remote_hold_time = Some(open.hold_time);
                            break;
                        }
                        Message::Notification(notification) => {
                            warn!("[{}] Received {}", addr, notification);
                            obs.notification_received = true;
                            break;
                        }
                        other => debug!("[{}] Ignoring {} in OpenSent", addr, other.kind()),
                    }
                }
            }
            SessionState::OpenConfirm => {
                while let Some(message) = self.inbox.pop_front() {
                    match message {
                        Message::Keepalive => {
                            obs.keepalive_received = true;
                            break;
                        }
                        Message::Notification(notification) => {
                            warn!("[{}] Received {}", addr, notification);
                            obs.notification_received = true;
                            break;
                        }
                        other => debug!("[{}] Ignoring {} in OpenConfirm", addr, other.kind()),
                    }
                }
            }
            SessionState::Established => {
                while let Some(message) = self.inbox.pop_front() {
                    match message {
                        Message::Keepalive => self.timers.received(),
                        Message::Update(update) => {
                            self.timers.received();
                            store.lock().await.rib.apply_update(addr, &update);
                        }
                        Message::RouteRefresh(_) => {
                            debug!("[{}] Route refresh requested", addr);
                            store.lock().await.rib.clear_rib_out(addr);
                        }
                        Message::Notification(notification) => {
                            warn!("[{}] Received {} while Established", addr, notification)
                        }
                        Message::Open(_) => debug!("[{}] Ignoring OPEN in Established", addr),
                    }
                }
                let events = self.timers.tick();
                obs.hold_expired = events.hold_expired;
                obs.keepalive_due = events.keepalive_due;
                if events.hold_expired {
                    warn!(
                        "[{}] Hold time expired after {} seconds",
                        addr, self.timers.hold_interval
                    );
                }
            }
            SessionState::Idle | SessionState::Connect | SessionState::Active => (),
        }
        obs
    }

    fn accepts(&self, open: &OpenMessage) -> bool {
        let expected = two_byte_asn(self.peer.remote_as);
        if open.asn != expected {
            warn!(
                "[{}] Open ASN Mismatch (received={}, expected={})",
                self.addr(),
                open.asn,
                expected
            );
            return false;
        }
        if open.version != BGP_VERSION {
            warn!("[{}] Unsupported BGP version {}", self.addr(), open.version);
            return false;
        }
        true
    }

    async fn acquire_resources(&mut self, store: &Mutex<Store>) {
        {
            let store = store.lock().await;
            let globals = &store.globals;
            self.local_as = globals.local_as;
            self.bgp_identifier = globals.router_id;
            self.hold_time = self.peer.hold_time.unwrap_or(globals.hold_time);
            self.keepalive_time = self.peer.keepalive_time.unwrap_or(globals.keepalive_time);
        }
        if self.queue.capacity() == 0 {
            self.queue = OutboundQueue::new(self.queue_capacity);
        }
        if self.transport.is_none() {
            match self.platform.open(self.socket_addr()) {
                Ok(mut transport) => match transport.connect() {
                    Ok(()) => self.transport = Some(transport),
                    Err(err) => {
                        warn!("[{}] Connect failed: {}", self.addr(), err);
                        transport.close();
                    }
                },
                Err(err) => warn!("[{}] Unable to open transport: {}", self.addr(), err),
            }
        }
        self.connect_time = Some(Utc::now());
    }

    /// Close the transport, free the queue and zero the timers. Safe to repeat.
    fn release_resources(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            trace!("[{}] Releasing transport", self.addr());
            transport.close();
        }
        self.queue.free();
        self.inbox.clear();
        self.timers.clear();
        self.open_delivered = false;
        self.remote_id = None;
        self.remote_hold_time = None;
        self.connect_time = None;
    }

    fn enqueue(&mut self, message: Message) {
        let kind = message.kind();
        let mut buf = BytesMut::new();
        if let Err(err) = self.codec.encode(message, &mut buf) {
            warn!("[{}] Unable to encode {}: {}", self.addr(), kind, err);
            return;
        }
        match self.queue.enqueue(OutboundMessage::new(kind, buf.freeze())) {
            Ok(()) => self.counts.increment_queued(kind),
            Err(err) => warn!("[{}] Dropping {}: {}", self.addr(), kind, err),
        }
    }

    /// Write every queued message, in order, each with its own bounded wait
    async fn drain_queue(&mut self) {
        let addr = self.addr();
        while let Some(message) = self.queue.dequeue() {
            let result = match self.transport.as_mut() {
                Some(transport) => transport.send(&message.data).await,
                None => Err(Error::TransportFailure(format!("no connection to {}", addr))),
            };
            match result {
                Ok(()) => {
                    trace!("[{}] Outgoing: {}", addr, message.kind);
                    self.counts.increment_sent(message.kind);
                    self.last_sent = Some(Utc::now());
                    if message.kind == MessageType::Open {
                        self.open_delivered = true;
                    }
                }
                Err(err) => warn!("[{}] Failed to send {}: {}", addr, message.kind, err),
            }
        }
    }

    /// Ask the peer to resend its routes
    pub async fn send_route_refresh(&mut self) -> Result<()> {
        if self.state != SessionState::Established {
            debug!(
                "[{}] Not sending ROUTE-REFRESH while {}",
                self.addr(),
                self.state
            );
            return Ok(());
        }
        self.enqueue(Message::RouteRefresh(RouteRefreshMessage::ipv4_unicast()));
        self.drain_queue().await;
        Ok(())
    }

    /// Tell the peer why (if it is listening) and go to Idle
    pub async fn stop(&mut self, notification: NotificationMessage, store: &Mutex<Store>) {
        match self.state {
            SessionState::OpenSent | SessionState::OpenConfirm | SessionState::Established => {
                info!("Stopping session with {}: {}", self.addr(), notification);
                self.enqueue(Message::Notification(notification));
                self.drain_queue().await;
            }
            _ => (),
        }
        self.change_state(SessionState::Idle, store).await;
    }

    /// Enable or disable this session administratively
    pub async fn set_enabled(&mut self, enabled: bool, store: &Mutex<Store>) {
        self.peer.enabled = enabled;
        if enabled {
            self.start(store).await;
        } else if self.state != SessionState::Idle {
            self.stop(NotificationMessage::admin_shutdown(), store).await;
        }
    }

    /// Permanently stop; later ticks do nothing
    pub async fn deconfigure(&mut self, store: &Mutex<Store>) {
        self.stop(NotificationMessage::deconfigured(), store).await;
        self.peer.enabled = false;
        self.deconfigured = true;
    }
}
