use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::rib::Rib;
use crate::session::timers::{DEFAULT_HOLD_TIME, DEFAULT_KEEPALIVE_TIME};
use crate::session::Neighbor;

/// Router-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct Globals {
    pub router_id: Ipv4Addr,
    pub local_as: u32,
    pub hold_time: u16,
    pub keepalive_time: u16,
    pub cluster_id: u32,
    /// Indexes of interfaces the protocol is enabled on
    pub enabled_interfaces: BTreeSet<u32>,
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            router_id: Ipv4Addr::UNSPECIFIED,
            local_as: 0,
            hold_time: DEFAULT_HOLD_TIME,
            keepalive_time: DEFAULT_KEEPALIVE_TIME,
            cluster_id: 0,
            enabled_interfaces: BTreeSet::new(),
        }
    }
}

/// Everything guarded by the store-wide lock
///
/// Lock order: a neighbor's lock may be held while this is briefly taken,
/// never the other way around for a neighbor already in `neighbors`.
#[derive(Default)]
pub struct Store {
    pub globals: Globals,
    pub neighbors: HashMap<Ipv4Addr, Arc<Neighbor>>,
    pub rib: Rib,
}

impl Store {
    pub fn new(globals: Globals) -> Self {
        Self {
            globals,
            neighbors: HashMap::new(),
            rib: Rib::new(),
        }
    }

    /// Snapshot of the neighbor handles, so their locks can be taken after this is released
    pub fn neighbors(&self) -> Vec<Arc<Neighbor>> {
        self.neighbors.values().cloned().collect()
    }
}
