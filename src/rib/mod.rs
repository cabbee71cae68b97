mod aggregate;
mod prefix_list;
pub mod session;

pub use aggregate::Aggregate;
pub use prefix_list::{PrefixList, PrefixListEntry};
pub use session::AdjRib;

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use ipnetwork::Ipv4Network;
use log::{debug, trace};

use crate::error::{Error, Result};
use crate::session::message::{Origin, PathAttributes, UpdateMessage};
use crate::utils::format_time_as_elapsed;

pub const DEFAULT_LOCAL_PREF: u32 = 100;

/// Zero the host bits, so that 10.0.0.1/24 and 10.0.0.0/24 are the same key
pub fn normalize(prefix: Ipv4Network) -> Ipv4Network {
    Ipv4Network::new(prefix.network(), prefix.prefix()).unwrap_or(prefix)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RouteSource {
    /// Added directly to the route table
    Static,
    /// Advertised network, originated by this router
    Network,
    Peer(Ipv4Addr),
}

impl fmt::Display for RouteSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteSource::Static => write!(f, "Static"),
            RouteSource::Network => write!(f, "Network"),
            RouteSource::Peer(addr) => write!(f, "{}", addr),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub prefix: Ipv4Network,
    pub next_hop: Ipv4Addr,
    pub local_pref: u32,
    /// Space separated ASNs, informational only
    pub as_path: String,
    pub origin: Origin,
    pub med: u32,
    pub source: RouteSource,
    pub(crate) timestamp: DateTime<Utc>,
}

impl Route {
    pub fn new(prefix: Ipv4Network, next_hop: Ipv4Addr) -> Self {
        Self {
            prefix: normalize(prefix),
            next_hop,
            local_pref: DEFAULT_LOCAL_PREF,
            as_path: String::new(),
            origin: Origin::Igp,
            med: 0,
            source: RouteSource::Static,
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: RouteSource) -> Self {
        self.source = source;
        self
    }

    fn from_update(peer: Ipv4Addr, prefix: Ipv4Network, attributes: &PathAttributes) -> Self {
        Self {
            prefix: normalize(prefix),
            next_hop: attributes.next_hop.unwrap_or(Ipv4Addr::UNSPECIFIED),
            local_pref: attributes.local_pref.unwrap_or(DEFAULT_LOCAL_PREF),
            as_path: attributes.as_path_string(),
            origin: attributes.origin,
            med: attributes.med.unwrap_or(0),
            source: RouteSource::Peer(peer),
            timestamp: Utc::now(),
        }
    }

    /// Equal for advertisement purposes (ignores source and age)
    pub fn same_path(&self, other: &Route) -> bool {
        self.prefix == other.prefix
            && self.next_hop == other.next_hop
            && self.local_pref == other.local_pref
            && self.as_path == other.as_path
            && self.origin == other.origin
            && self.med == other.med
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Route {} via {} source={} age={}>",
            self.prefix,
            self.next_hop,
            self.source,
            format_time_as_elapsed(self.timestamp),
        )
    }
}

/// Route table, aggregates, prefix lists and the per-neighbor RIB-in/RIB-out
#[derive(Debug, Default)]
pub struct Rib {
    routes: Vec<Route>,
    aggregates: Vec<Aggregate>,
    prefix_lists: Vec<PrefixList>,
    rib_in: HashMap<Ipv4Addr, AdjRib>,
    rib_out: HashMap<Ipv4Addr, AdjRib>,
    // Bumped whenever the route table or a prefix-list changes
    generation: u64,
    // Neighbors whose RIB-out matched the export set at a given generation
    in_sync: HashMap<Ipv4Addr, session::SyncMark>,
}

impl Rib {
    pub fn new() -> Self {
        Self {
            routes: Vec::with_capacity(64),
            ..Default::default()
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Append to the route table; duplicates are kept
    pub fn add_route(&mut self, route: Route) {
        trace!("Adding {} ({} routes)", route, self.routes.len() + 1);
        self.routes.push(route);
        self.generation += 1;
    }

    /// Remove the first route for `prefix`
    pub fn remove_route(&mut self, prefix: Ipv4Network) -> Result<Route> {
        let prefix = normalize(prefix);
        let index = self
            .routes
            .iter()
            .position(|r| r.prefix == prefix)
            .ok_or_else(|| Error::NotFound(format!("route {}", prefix)))?;
        self.generation += 1;
        Ok(self.routes.remove(index))
    }

    /// Originate `prefix` from this router; one route per prefix
    pub fn advertise_network(&mut self, prefix: Ipv4Network, next_hop: Ipv4Addr) -> Result<()> {
        let prefix = normalize(prefix);
        if self.routes.iter().any(|r| r.prefix == prefix) {
            return Err(Error::Duplicate(format!("network {}", prefix)));
        }
        self.add_route(Route::new(prefix, next_hop).with_source(RouteSource::Network));
        Ok(())
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    pub fn find_or_create_aggregate(&mut self, prefix: Ipv4Network) -> &mut Aggregate {
        let prefix = normalize(prefix);
        match self.aggregates.iter().position(|a| a.prefix == prefix) {
            Some(index) => &mut self.aggregates[index],
            None => {
                self.aggregates.push(Aggregate::new(prefix));
                let last = self.aggregates.len() - 1;
                &mut self.aggregates[last]
            }
        }
    }

    pub fn set_aggregate(&mut self, prefix: Ipv4Network, summary_only: bool, as_set: bool) {
        let aggregate = self.find_or_create_aggregate(prefix);
        aggregate.summary_only = summary_only;
        aggregate.as_set = as_set;
        debug!("Aggregate {}", aggregate);
    }

    pub fn remove_aggregate(&mut self, prefix: Ipv4Network) -> Result<Aggregate> {
        let prefix = normalize(prefix);
        let index = self
            .aggregates
            .iter()
            .position(|a| a.prefix == prefix)
            .ok_or_else(|| Error::NotFound(format!("aggregate {}", prefix)))?;
        Ok(self.aggregates.remove(index))
    }

    pub fn prefix_lists(&self) -> &[PrefixList] {
        &self.prefix_lists
    }

    pub fn prefix_list(&self, name: &str) -> Option<&PrefixList> {
        self.prefix_lists.iter().find(|l| l.name == name)
    }

    fn find_or_create_prefix_list(&mut self, name: &str) -> &mut PrefixList {
        match self.prefix_lists.iter().position(|l| l.name == name) {
            Some(index) => &mut self.prefix_lists[index],
            None => {
                self.prefix_lists.push(PrefixList::new(name));
                let last = self.prefix_lists.len() - 1;
                &mut self.prefix_lists[last]
            }
        }
    }

    /// Append an entry to the named list, creating the list if needed
    pub fn update_prefix_list(&mut self, name: &str, prefix: Ipv4Network, permit: bool) {
        let list = self.find_or_create_prefix_list(name);
        list.push(PrefixListEntry::new(normalize(prefix), permit));
        trace!("Prefix-list {} has {} entries", name, list.entries().len());
        self.generation += 1;
    }

    pub fn rib_in(&self, peer: Ipv4Addr) -> Vec<&Route> {
        self.rib_in
            .get(&peer)
            .map(|rib| rib.routes().collect())
            .unwrap_or_default()
    }

    pub fn rib_out(&self, peer: Ipv4Addr) -> Vec<&Route> {
        self.rib_out
            .get(&peer)
            .map(|rib| rib.routes().collect())
            .unwrap_or_default()
    }

    /// Record what a neighbor announced and withdrew
    pub fn apply_update(&mut self, peer: Ipv4Addr, update: &UpdateMessage) {
        let rib = self.rib_in.entry(peer).or_default();
        for prefix in &update.withdrawn {
            rib.remove(&normalize(*prefix));
        }
        for prefix in &update.nlri {
            rib.insert(Route::from_update(peer, *prefix, &update.attributes));
        }
        trace!("RIB-in for {} has {} routes", peer, rib.len());
    }

    pub fn clear_rib_in(&mut self, peer: Ipv4Addr) {
        if let Some(rib) = self.rib_in.get_mut(&peer) {
            let count = rib.len();
            rib.clear();
            trace!("Removed {} routes from RIB-in for {}", count, peer);
        }
    }

    pub fn clear_rib_out(&mut self, peer: Ipv4Addr) {
        if let Some(rib) = self.rib_out.get_mut(&peer) {
            let count = rib.len();
            rib.clear();
            trace!("Removed {} routes from RIB-out for {}", count, peer);
        }
        self.in_sync.remove(&peer);
    }

    pub fn remove_peer(&mut self, peer: Ipv4Addr) {
        self.rib_in.remove(&peer);
        self.rib_out.remove(&peer);
        self.in_sync.remove(&peer);
    }

    /// Drop every route, aggregate, prefix list and per-neighbor table
    pub fn free_all(&mut self) {
        debug!(
            "Releasing {} routes, {} aggregates, {} prefix-lists",
            self.routes.len(),
            self.aggregates.len(),
            self.prefix_lists.len()
        );
        self.routes.clear();
        self.aggregates.clear();
        self.prefix_lists.clear();
        self.rib_in.clear();
        self.rib_out.clear();
        self.in_sync.clear();
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_route_keeps_duplicates() {
        let mut rib = Rib::new();
        rib.add_route(Route::new(net("10.0.0.0/24"), Ipv4Addr::new(1, 1, 1, 1)));
        rib.add_route(Route::new(net("10.0.0.0/24"), Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(rib.routes().len(), 2);

        rib.remove_route(net("10.0.0.0/24")).unwrap();
        assert_eq!(rib.routes().len(), 1);
        rib.remove_route(net("10.0.0.0/24")).unwrap();
        match rib.remove_route(net("10.0.0.0/24")) {
            Err(Error::NotFound(_)) => (),
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_advertise_network_duplicate() {
        let mut rib = Rib::new();
        let id = Ipv4Addr::new(1, 1, 1, 1);
        rib.advertise_network(net("10.0.0.0/24"), id).unwrap();
        // Host bits are ignored when comparing
        match rib.advertise_network(net("10.0.0.7/24"), id) {
            Err(Error::Duplicate(_)) => (),
            other => panic!("Expected Duplicate, got {:?}", other),
        }
        assert_eq!(rib.routes().len(), 1);
        assert_eq!(rib.routes()[0].source, RouteSource::Network);
    }

    #[test]
    fn test_aggregates_find_or_create() {
        let mut rib = Rib::new();
        rib.set_aggregate(net("10.0.0.0/8"), false, false);
        rib.set_aggregate(net("10.0.0.0/8"), true, true);
        rib.set_aggregate(net("172.16.0.0/12"), false, true);
        assert_eq!(rib.aggregates().len(), 2);
        assert!(rib.aggregates()[0].summary_only);
        assert!(rib.aggregates()[0].as_set);

        rib.remove_aggregate(net("10.0.0.0/8")).unwrap();
        assert!(rib.remove_aggregate(net("10.0.0.0/8")).is_err());
        assert_eq!(rib.aggregates().len(), 1);
    }

    #[test]
    fn test_prefix_lists_append() {
        let mut rib = Rib::new();
        rib.update_prefix_list("EXPORT", net("10.0.0.0/24"), true);
        rib.update_prefix_list("EXPORT", net("10.0.0.0/24"), false);
        rib.update_prefix_list("OTHER", net("0.0.0.0/0"), true);
        assert_eq!(rib.prefix_lists().len(), 2);
        let list = rib.prefix_list("EXPORT").unwrap();
        assert_eq!(list.entries().len(), 2);
        // First match wins
        assert_eq!(list.permits(&net("10.0.0.0/24")), Some(true));
        assert!(rib.prefix_list("MISSING").is_none());
    }

    #[test]
    fn test_apply_update() {
        let mut rib = Rib::new();
        let peer = Ipv4Addr::new(10, 0, 0, 2);
        let mut update = UpdateMessage {
            nlri: vec![net("192.168.0.0/16"), net("192.168.1.0/24")],
            ..Default::default()
        };
        update.attributes.next_hop = Some(peer);
        update.attributes.as_path = vec![65002, 65010];
        rib.apply_update(peer, &update);
        let routes = rib.rib_in(peer);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].as_path, "65002 65010");
        assert_eq!(routes[0].source, RouteSource::Peer(peer));

        let withdraw = UpdateMessage {
            withdrawn: vec![net("192.168.1.0/24")],
            ..Default::default()
        };
        rib.apply_update(peer, &withdraw);
        assert_eq!(rib.rib_in(peer).len(), 1);

        rib.clear_rib_in(peer);
        assert!(rib.rib_in(peer).is_empty());
    }

    #[test]
    fn test_free_all() {
        let mut rib = Rib::new();
        rib.add_route(Route::new(net("10.0.0.0/24"), Ipv4Addr::new(1, 1, 1, 1)));
        rib.set_aggregate(net("10.0.0.0/8"), false, false);
        rib.update_prefix_list("EXPORT", net("10.0.0.0/24"), true);
        rib.free_all();
        assert!(rib.routes().is_empty());
        assert!(rib.aggregates().is_empty());
        assert!(rib.prefix_lists().is_empty());
    }
}
