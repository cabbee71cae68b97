mod file;

pub use file::{AggregateSpec, NetworkSpec, PrefixListEntrySpec, PrefixListSpec, RouteSpec};

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::rib::Route;
use crate::session::transport::BGP_PORT;
use crate::store::Globals;

/// Parse a TOML config file and return a ServerConfig
pub fn from_file(path: &str) -> Result<ServerConfig> {
    let spec = file::ServerConfigSpec::from_file(path)?;
    ServerConfig::from_spec(spec)
}

/// Parse TOML config contents
pub fn from_str(contents: &str) -> Result<ServerConfig> {
    let spec = file::ServerConfigSpec::from_str(contents)?;
    ServerConfig::from_spec(spec)
}

#[derive(Debug)]
pub struct ServerConfig {
    pub router_id: Ipv4Addr,
    pub local_as: u32,
    pub hold_time: u16,
    pub keepalive_time: u16,
    pub cluster_id: u32,
    pub tick_interval: Duration,
    pub queue_capacity: usize,
    pub interfaces: Vec<String>,
    pub peers: Vec<PeerConfig>,
    pub networks: Vec<NetworkSpec>,
    pub routes: Vec<RouteSpec>,
    pub aggregates: Vec<AggregateSpec>,
    pub prefix_lists: Vec<PrefixListSpec>,
}

/// In-Memory representation of a neighbor's configuration
#[derive(Clone, Debug, PartialEq)]
pub struct PeerConfig {
    pub remote_ip: Ipv4Addr,
    pub remote_as: u32,
    pub enabled: bool,
    /// Falls back to the router's hold time
    pub hold_time: Option<u16>,
    /// Falls back to the router's keepalive time
    pub keepalive_time: Option<u16>,
    pub dest_port: u16,
    pub route_reflector_client: bool,
    pub route_filter: Option<String>,
}

impl PeerConfig {
    pub fn new(remote_ip: Ipv4Addr, remote_as: u32) -> Self {
        Self {
            remote_ip,
            remote_as,
            enabled: true,
            hold_time: None,
            keepalive_time: None,
            dest_port: BGP_PORT,
            route_reflector_client: false,
            route_filter: None,
        }
    }
}

impl ServerConfig {
    fn from_spec(spec: file::ServerConfigSpec) -> Result<Self> {
        if spec.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        let peers: Vec<_> = spec
            .neighbors
            .iter()
            .map(|p| PeerConfig {
                remote_ip: p.remote_ip,
                remote_as: p.remote_as,
                enabled: p.enabled,
                hold_time: p.hold_time,
                keepalive_time: p.keepalive_time,
                dest_port: p.dest_port,
                route_reflector_client: p.route_reflector_client,
                route_filter: p.route_filter.clone(),
            })
            .collect();

        Ok(Self {
            router_id: spec.router_id,
            local_as: spec.local_as,
            hold_time: spec.hold_time,
            keepalive_time: spec.keepalive_time,
            cluster_id: spec.cluster_id,
            tick_interval: Duration::from_secs(spec.tick_interval.max(1).into()),
            queue_capacity: spec.queue_capacity,
            interfaces: spec.interfaces,
            peers,
            networks: spec.networks,
            routes: spec.routes,
            aggregates: spec.aggregates,
            prefix_lists: spec.prefix_lists,
        })
    }

    /// Router-wide settings; interfaces are resolved when applied
    pub fn globals(&self) -> Globals {
        Globals {
            router_id: self.router_id,
            local_as: self.local_as,
            hold_time: self.hold_time,
            keepalive_time: self.keepalive_time,
            cluster_id: self.cluster_id,
            enabled_interfaces: BTreeSet::new(),
        }
    }
}

impl From<&RouteSpec> for Route {
    fn from(spec: &RouteSpec) -> Route {
        let mut route = Route::new(spec.prefix, spec.next_hop);
        route.local_pref = spec.local_pref;
        route.med = spec.med;
        route.as_path = spec.as_path.clone();
        route.origin = spec.origin;
        route
    }
}
