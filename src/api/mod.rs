//! Serializable views of the speaker's state for the admin surface
mod peers;
mod routes;

pub use peers::{PeerDetail, PeerSummary};
pub use routes::{AggregateView, LearnedRoute, PrefixListEntryView, PrefixListView};

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::store::Globals;
use crate::utils::u32_to_dotted;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    pub router_id: Ipv4Addr,
    pub local_as: u32,
    pub local_as_dotted: String,
    pub hold_time: u16,
    pub keepalive_time: u16,
    pub cluster_id: u32,
    pub enabled_interfaces: Vec<u32>,
}

impl From<&Globals> for ConfigSnapshot {
    fn from(globals: &Globals) -> ConfigSnapshot {
        ConfigSnapshot {
            router_id: globals.router_id,
            local_as: globals.local_as,
            local_as_dotted: u32_to_dotted(globals.local_as, '.'),
            hold_time: globals.hold_time,
            keepalive_time: globals.keepalive_time,
            cluster_id: globals.cluster_id,
            enabled_interfaces: globals.enabled_interfaces.iter().cloned().collect(),
        }
    }
}
