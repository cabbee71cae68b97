use std::fs::File;
use std::io::Read;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{self, Deserialize, Serialize};

use crate::error::Result;
use crate::rib::DEFAULT_LOCAL_PREF;
use crate::session::message::Origin;
use crate::session::queue::DEFAULT_QUEUE_CAPACITY;
use crate::session::timers::{DEFAULT_HOLD_TIME, DEFAULT_KEEPALIVE_TIME};
use crate::session::transport::BGP_PORT;

struct Defaults {}

impl Defaults {
    fn enabled() -> bool {
        true
    }

    fn tick_interval() -> u16 {
        1
    }

    fn hold_time() -> u16 {
        DEFAULT_HOLD_TIME
    }

    fn keepalive_time() -> u16 {
        DEFAULT_KEEPALIVE_TIME
    }

    fn queue_capacity() -> usize {
        DEFAULT_QUEUE_CAPACITY
    }

    fn dest_port() -> u16 {
        BGP_PORT
    }

    fn local_pref() -> u32 {
        DEFAULT_LOCAL_PREF
    }
}

/// Config (toml) representation of a neighbor
#[derive(Clone, Debug, Deserialize)]
pub(super) struct PeerConfigSpec {
    pub(super) remote_ip: Ipv4Addr,
    pub(super) remote_as: u32,

    // Peer is configured and allowed to connect
    #[serde(default = "Defaults::enabled")]
    pub(super) enabled: bool,

    // Per-neighbor overrides of the router timers
    pub(super) hold_time: Option<u16>,
    pub(super) keepalive_time: Option<u16>,

    // Destination port used when initiating the connection
    #[serde(default = "Defaults::dest_port")]
    pub(super) dest_port: u16,

    #[serde(default)]
    pub(super) route_reflector_client: bool,
    // Name of the prefix-list applied to advertisements
    pub(super) route_filter: Option<String>,
}

/// Route to add to the route table
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RouteSpec {
    pub prefix: Ipv4Network,
    pub next_hop: Ipv4Addr,
    #[serde(default = "Defaults::local_pref")]
    pub local_pref: u32,
    #[serde(default)]
    pub med: u32,
    #[serde(default)]
    pub as_path: String,
    #[serde(default)]
    pub origin: Origin,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NetworkSpec {
    pub prefix: Ipv4Network,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AggregateSpec {
    pub prefix: Ipv4Network,
    #[serde(default)]
    pub summary_only: bool,
    #[serde(default)]
    pub as_set: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PrefixListEntrySpec {
    pub prefix: Ipv4Network,
    pub permit: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PrefixListSpec {
    pub name: String,
    #[serde(default = "Vec::new")]
    pub entries: Vec<PrefixListEntrySpec>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerConfigSpec {
    pub(super) router_id: Ipv4Addr,
    pub(super) local_as: u32,
    #[serde(default = "Defaults::hold_time")]
    pub(super) hold_time: u16,
    #[serde(default = "Defaults::keepalive_time")]
    pub(super) keepalive_time: u16,
    #[serde(default)]
    pub(super) cluster_id: u32,
    // Seconds between state machine ticks
    #[serde(default = "Defaults::tick_interval")]
    pub(super) tick_interval: u16,
    #[serde(default = "Defaults::queue_capacity")]
    pub(super) queue_capacity: usize,
    // Interfaces to enable the protocol on at startup
    #[serde(default = "Vec::new")]
    pub(super) interfaces: Vec<String>,
    #[serde(default = "Vec::new")]
    pub(super) neighbors: Vec<PeerConfigSpec>,
    #[serde(default = "Vec::new")]
    pub(super) networks: Vec<NetworkSpec>,
    #[serde(default = "Vec::new")]
    pub(super) routes: Vec<RouteSpec>,
    #[serde(default = "Vec::new")]
    pub(super) aggregates: Vec<AggregateSpec>,
    #[serde(default = "Vec::new")]
    pub(super) prefix_lists: Vec<PrefixListSpec>,
}

impl ServerConfigSpec {
    pub(super) fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_str(&contents)
    }

    pub(super) fn from_str(contents: &str) -> Result<Self> {
        let config: ServerConfigSpec = toml::from_str(contents)?;
        Ok(config)
    }
}
