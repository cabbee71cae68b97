use std::convert::From;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::session::{MessageCounts, Session};
use crate::utils::{format_time_as_elapsed, u32_to_dotted};

#[derive(Debug, Clone, Serialize)]
pub struct PeerSummary {
    pub peer: Ipv4Addr,
    pub enabled: bool,
    pub router_id: Option<Ipv4Addr>,
    pub remote_asn: String,
    pub local_asn: String,
    pub msg_received: u64,
    pub msg_sent: u64,
    pub connect_time: Option<i64>,
    pub uptime: Option<String>,
    pub state: String,
    pub prefixes_received: Option<u64>,
}

impl From<&Session> for PeerSummary {
    fn from(session: &Session) -> PeerSummary {
        PeerSummary {
            peer: session.addr(),
            enabled: session.peer.enabled,
            router_id: session.remote_id,
            remote_asn: u32_to_dotted(session.peer.remote_as, '.'),
            local_asn: u32_to_dotted(session.local_as, '.'),
            msg_received: session.counts.received(),
            msg_sent: session.counts.sent(),
            connect_time: session.connect_time.map(|t| t.timestamp()),
            uptime: session.established_time.map(format_time_as_elapsed),
            state: session.state().to_string(),
            prefixes_received: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerDetail {
    pub summary: PeerSummary,
    pub dest_port: u16,
    pub route_reflector_client: bool,
    pub route_filter: Option<String>,
    // Remaining seconds before the session is torn down
    pub hold_timer: u16,
    // Either the negotiated (if established) or configured hold_time
    pub hold_time: u16,
    pub keepalive_time: u16,
    pub last_received: Option<String>,
    pub last_sent: Option<String>,
    pub message_counts: MessageCounts,
}

impl From<&Session> for PeerDetail {
    fn from(session: &Session) -> PeerDetail {
        let negotiated = session.timers.hold_interval > 0;
        PeerDetail {
            summary: PeerSummary::from(session),
            dest_port: session.peer.dest_port,
            route_reflector_client: session.peer.route_reflector_client,
            route_filter: session.peer.route_filter.clone(),
            hold_timer: session.timers.hold_timer,
            hold_time: if negotiated {
                session.timers.hold_interval
            } else {
                session.hold_time
            },
            keepalive_time: if negotiated {
                session.timers.keepalive_interval
            } else {
                session.keepalive_time
            },
            last_received: session.last_received.map(format_time_as_elapsed),
            last_sent: session.last_sent.map(format_time_as_elapsed),
            message_counts: session.counts.clone(),
        }
    }
}
