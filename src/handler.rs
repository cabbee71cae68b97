use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use itertools::Itertools;
use log::{debug, info, trace, warn};
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::api::{
    AggregateView, ConfigSnapshot, LearnedRoute, PeerDetail, PeerSummary, PrefixListView,
};
use crate::config::{PeerConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::rib::Route;
use crate::session::{Platform, SessionManager};
use crate::store::{Globals, Store};

struct Inner {
    store: Mutex<Store>,
    sessions: SessionManager,
}

/// One BGP speaker: router settings, neighbors and the RIB behind a single handle
///
/// Cloning is cheap and every clone drives the same instance.
#[derive(Clone)]
pub struct Speaker {
    inner: Arc<Inner>,
}

impl Speaker {
    pub fn new(platform: Arc<dyn Platform>, globals: Globals, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(Store::new(globals)),
                sessions: SessionManager::new(platform, queue_capacity),
            }),
        }
    }

    /// Build a speaker and apply everything in `config` to it
    pub async fn from_config(platform: Arc<dyn Platform>, config: &ServerConfig) -> Result<Self> {
        let speaker = Self::new(platform, config.globals(), config.queue_capacity);
        speaker.apply_config(config).await?;
        Ok(speaker)
    }

    /// Apply a parsed config through the admin operations
    ///
    /// Neighbors that cannot be added are logged and skipped.
    pub async fn apply_config(&self, config: &ServerConfig) -> Result<()> {
        for name in &config.interfaces {
            self.enable_disable_on_interface(name, true).await?;
        }
        for list in &config.prefix_lists {
            for entry in &list.entries {
                self.update_prefix_list(&list.name, entry.prefix, entry.permit)
                    .await;
            }
        }
        for aggregate in &config.aggregates {
            self.set_aggregate(aggregate.prefix, aggregate.summary_only, aggregate.as_set)
                .await;
        }
        for network in &config.networks {
            if let Err(err) = self.advertise_network(network.prefix).await {
                warn!("Skipping network {}: {}", network.prefix, err);
            }
        }
        for route in &config.routes {
            self.add_route_with(Route::from(route)).await;
        }
        for peer in &config.peers {
            if let Err(err) = self.add_neighbor_with(peer.clone()).await {
                warn!("Skipping neighbor {}: {}", peer.remote_ip, err);
            }
        }
        debug!(
            "Applied config with {} neighbors, {} routes",
            config.peers.len(),
            config.routes.len() + config.networks.len()
        );
        Ok(())
    }

    // Router settings; sessions pick these up the next time they connect

    pub async fn set_router_id(&self, router_id: Ipv4Addr) {
        self.inner.store.lock().await.globals.router_id = router_id;
        info!("Router ID set to {}", router_id);
    }

    pub async fn set_local_as(&self, local_as: u32) {
        self.inner.store.lock().await.globals.local_as = local_as;
        info!("Local AS set to {}", local_as);
    }

    pub async fn set_timers(&self, hold_time: u16, keepalive_time: u16) {
        let mut store = self.inner.store.lock().await;
        store.globals.hold_time = hold_time;
        store.globals.keepalive_time = keepalive_time;
        info!("Timers set to hold={} keepalive={}", hold_time, keepalive_time);
    }

    pub async fn set_cluster_id(&self, cluster_id: u32) {
        self.inner.store.lock().await.globals.cluster_id = cluster_id;
        info!("Cluster ID set to {}", cluster_id);
    }

    // Neighbors

    pub async fn add_neighbor(&self, addr: Ipv4Addr, remote_as: u32) -> Result<()> {
        self.add_neighbor_with(PeerConfig::new(addr, remote_as)).await
    }

    pub async fn add_neighbor_with(&self, peer: PeerConfig) -> Result<()> {
        self.inner
            .sessions
            .add_neighbor(&self.inner.store, peer)
            .await
            .map(|_| ())
    }

    pub async fn remove_neighbor(&self, addr: Ipv4Addr) -> Result<()> {
        self.inner
            .sessions
            .remove_neighbor(&self.inner.store, addr)
            .await
    }

    pub async fn reset_neighbor(&self, addr: Ipv4Addr) -> Result<()> {
        self.inner
            .sessions
            .reset_neighbor(&self.inner.store, addr)
            .await
    }

    pub async fn hard_reset_neighbor(&self, addr: Ipv4Addr) -> Result<()> {
        self.inner
            .sessions
            .hard_reset_neighbor(&self.inner.store, addr)
            .await
            .map(|_| ())
    }

    pub async fn soft_reset_neighbor(&self, addr: Ipv4Addr, inbound: bool) -> Result<()> {
        self.inner
            .sessions
            .soft_reset_neighbor(&self.inner.store, addr, inbound)
            .await
    }

    pub async fn set_route_reflector_client(&self, addr: Ipv4Addr, client: bool) -> Result<()> {
        self.inner
            .sessions
            .set_route_reflector_client(&self.inner.store, addr, client)
            .await
    }

    /// Name the prefix-list filtering advertisements to `addr` (None removes it)
    pub async fn set_route_filter(&self, addr: Ipv4Addr, name: Option<String>) -> Result<()> {
        self.inner
            .sessions
            .set_route_filter(&self.inner.store, addr, name)
            .await
    }

    /// Record the interface as enabled (or not) and start or stop every session
    pub async fn enable_disable_on_interface(&self, name: &str, enable: bool) -> Result<()> {
        let index = self
            .inner
            .sessions
            .platform()
            .interface_index(name)
            .ok_or_else(|| Error::InvalidInterface(name.to_owned()))?;
        {
            let mut store = self.inner.store.lock().await;
            let interfaces = &mut store.globals.enabled_interfaces;
            if enable {
                interfaces.insert(index);
            } else {
                interfaces.remove(&index);
            }
        }
        info!(
            "{} on interface {} ({})",
            if enable { "Enabled" } else { "Disabled" },
            name,
            index
        );
        self.inner
            .sessions
            .set_enabled_all(&self.inner.store, enable)
            .await;
        Ok(())
    }

    // Route table

    pub async fn add_route(&self, prefix: Ipv4Network, next_hop: Ipv4Addr) {
        self.add_route_with(Route::new(prefix, next_hop)).await
    }

    pub async fn add_route_with(&self, route: Route) {
        info!("Adding route {} via {}", route.prefix, route.next_hop);
        self.inner.store.lock().await.rib.add_route(route);
    }

    pub async fn remove_route(&self, prefix: Ipv4Network) -> Result<()> {
        match self.inner.store.lock().await.rib.remove_route(prefix) {
            Ok(route) => {
                info!("Removed route {}", route.prefix);
                Ok(())
            }
            Err(err) => {
                warn!("Unable to remove route: {}", err);
                Err(err)
            }
        }
    }

    /// Originate `prefix` with this router's ID as the next hop
    pub async fn advertise_network(&self, prefix: Ipv4Network) -> Result<()> {
        let mut store = self.inner.store.lock().await;
        let next_hop = store.globals.router_id;
        store.rib.advertise_network(prefix, next_hop)?;
        info!("Advertising network {}", prefix);
        Ok(())
    }

    pub async fn set_aggregate(&self, prefix: Ipv4Network, summary_only: bool, as_set: bool) {
        self.inner
            .store
            .lock()
            .await
            .rib
            .set_aggregate(prefix, summary_only, as_set);
    }

    pub async fn remove_aggregate(&self, prefix: Ipv4Network) -> Result<()> {
        self.inner
            .store
            .lock()
            .await
            .rib
            .remove_aggregate(prefix)
            .map(|aggregate| debug!("Removed aggregate {}", aggregate))
    }

    pub async fn update_prefix_list(&self, name: &str, prefix: Ipv4Network, permit: bool) {
        self.inner
            .store
            .lock()
            .await
            .rib
            .update_prefix_list(name, prefix, permit);
    }

    // Read-only views

    pub async fn config(&self) -> ConfigSnapshot {
        ConfigSnapshot::from(&self.inner.store.lock().await.globals)
    }

    pub async fn neighbors(&self) -> Vec<PeerSummary> {
        let neighbors = self.inner.store.lock().await.neighbors();
        let mut summaries = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            summaries.push(PeerSummary::from(&*neighbor.session.lock().await));
        }
        let store = self.inner.store.lock().await;
        summaries
            .into_iter()
            .map(|mut summary| {
                summary.prefixes_received = Some(store.rib.rib_in(summary.peer).len() as u64);
                summary
            })
            .sorted_by_key(|summary| summary.peer)
            .collect()
    }

    pub async fn neighbor(&self, addr: Ipv4Addr) -> Result<PeerDetail> {
        let neighbor = self.inner.sessions.get(&self.inner.store, addr).await?;
        let mut detail = PeerDetail::from(&*neighbor.session.lock().await);
        detail.summary.prefixes_received =
            Some(self.inner.store.lock().await.rib.rib_in(addr).len() as u64);
        Ok(detail)
    }

    pub async fn routes(&self) -> Vec<LearnedRoute> {
        let store = self.inner.store.lock().await;
        store.rib.routes().iter().map(LearnedRoute::from).collect()
    }

    pub async fn aggregates(&self) -> Vec<AggregateView> {
        let store = self.inner.store.lock().await;
        store.rib.aggregates().iter().map(AggregateView::from).collect()
    }

    pub async fn prefix_lists(&self) -> Vec<PrefixListView> {
        let store = self.inner.store.lock().await;
        store
            .rib
            .prefix_lists()
            .iter()
            .map(PrefixListView::from)
            .collect()
    }

    pub async fn rib_in(&self, addr: Ipv4Addr) -> Result<Vec<LearnedRoute>> {
        self.inner.sessions.get(&self.inner.store, addr).await?;
        let store = self.inner.store.lock().await;
        Ok(store
            .rib
            .rib_in(addr)
            .into_iter()
            .map(LearnedRoute::from)
            .collect())
    }

    pub async fn rib_out(&self, addr: Ipv4Addr) -> Result<Vec<LearnedRoute>> {
        self.inner.sessions.get(&self.inner.store, addr).await?;
        let store = self.inner.store.lock().await;
        Ok(store
            .rib
            .rib_out(addr)
            .into_iter()
            .map(LearnedRoute::from)
            .collect())
    }

    // Driving

    /// Run every session once and wait for all of them
    pub async fn tick(&self) {
        self.inner.sessions.tick_all(&self.inner.store).await;
    }

    /// Tick every neighbor each `period` until `shutdown` is set
    ///
    /// Each neighbor ticks on its own task; a neighbor still busy from an earlier
    /// tick (or an admin operation) skips this one.
    pub async fn serve(&self, period: Duration, shutdown: Arc<AtomicBool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Ticking sessions every {:?}", period);
        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let neighbors = self.inner.store.lock().await.neighbors();
            for neighbor in neighbors {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    match neighbor.session.try_lock() {
                        Ok(mut session) => session.tick(&inner.store).await,
                        Err(_) => trace!("[{}] Busy, skipping tick", neighbor.addr),
                    }
                });
            }
        }
    }

    /// Stop every session, then release the route table, aggregates and prefix-lists
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.inner.sessions.shutdown(&self.inner.store).await;
        self.inner.store.lock().await.rib.free_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::message::{Message, MessageType};
    use crate::session::testing::MockPlatform;

    const PEER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    fn speaker(platform: &Arc<MockPlatform>) -> Speaker {
        Speaker::new(platform.clone(), Globals::default(), 16)
    }

    #[tokio::test]
    async fn test_defaults() {
        let speaker = speaker(&Arc::new(MockPlatform::new()));
        let config = speaker.config().await;
        assert_eq!(config.local_as, 0);
        assert_eq!(config.router_id, Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.hold_time, 180);
        assert_eq!(config.keepalive_time, 60);
        assert!(speaker.neighbors().await.is_empty());
        assert!(speaker.routes().await.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_keepalives() {
        let platform = Arc::new(MockPlatform::new());
        let wire = platform.responsive_peer(PEER, 65002, Ipv4Addr::new(2, 2, 2, 2));
        let speaker = speaker(&platform);
        speaker.set_local_as(65001).await;
        speaker.set_router_id(Ipv4Addr::new(1, 1, 1, 1)).await;
        speaker.set_timers(9, 3).await;
        speaker.add_neighbor(PEER, 65002).await.unwrap();

        for _ in 0..3 {
            speaker.tick().await;
        }
        let detail = speaker.neighbor(PEER).await.unwrap();
        assert_eq!(detail.summary.state, "Established");
        assert!(detail.message_counts.open.queued >= 1);
        assert_eq!(detail.summary.router_id, Some(Ipv4Addr::new(2, 2, 2, 2)));
        assert_eq!(detail.hold_time, 9);
        assert_eq!(detail.keepalive_time, 3);

        let keepalives = || wire.lock().unwrap().sent_count(|m| *m == Message::Keepalive);
        let mut sent_at = vec![];
        let mut last = keepalives();
        for tick in 1..=9 {
            wire.lock().unwrap().inbound.push_back(Message::Keepalive);
            speaker.tick().await;
            let count = keepalives();
            if count > last {
                sent_at.push(tick);
            }
            last = count;
        }
        assert_eq!(sent_at, vec![3, 6, 9]);
        let detail = speaker.neighbor(PEER).await.unwrap();
        assert_eq!(detail.summary.state, "Established");
        assert_eq!(detail.message_counts.get(MessageType::Keepalive).sent, 4);
    }

    #[tokio::test]
    async fn test_advertise_network_uses_router_id() {
        let speaker = speaker(&Arc::new(MockPlatform::new()));
        speaker.set_router_id(Ipv4Addr::new(1, 1, 1, 1)).await;
        speaker.advertise_network(net("10.0.0.0/24")).await.unwrap();
        assert!(matches!(
            speaker.advertise_network(net("10.0.0.0/24")).await,
            Err(Error::Duplicate(_))
        ));
        let routes = speaker.routes().await;
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].next_hop, "1.1.1.1");
        assert_eq!(routes[0].source, "Network");
    }

    #[tokio::test]
    async fn test_route_table_operations() {
        let speaker = speaker(&Arc::new(MockPlatform::new()));
        let next_hop = Ipv4Addr::new(10, 0, 0, 1);
        speaker.add_route(net("172.16.0.0/24"), next_hop).await;
        speaker.add_route(net("172.16.0.0/24"), next_hop).await;
        assert_eq!(speaker.routes().await.len(), 2);
        speaker.remove_route(net("172.16.0.0/24")).await.unwrap();
        speaker.remove_route(net("172.16.0.0/24")).await.unwrap();
        assert!(matches!(
            speaker.remove_route(net("172.16.0.0/24")).await,
            Err(Error::NotFound(_))
        ));

        speaker.set_aggregate(net("172.16.0.0/12"), true, false).await;
        assert!(speaker.aggregates().await[0].summary_only);
        speaker.remove_aggregate(net("172.16.0.0/12")).await.unwrap();
        assert!(speaker.remove_aggregate(net("172.16.0.0/12")).await.is_err());

        speaker.update_prefix_list("EXPORT", net("10.0.0.0/8"), true).await;
        speaker.update_prefix_list("EXPORT", net("10.0.0.0/8"), false).await;
        let lists = speaker.prefix_lists().await;
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].entries.len(), 2);
    }

    #[tokio::test]
    async fn test_enable_disable_on_interface() {
        let platform = Arc::new(MockPlatform::new().with_interface("eth0", 2));
        let speaker = speaker(&platform);
        speaker.add_neighbor(PEER, 65002).await.unwrap();

        assert!(matches!(
            speaker.enable_disable_on_interface("eth9", false).await,
            Err(Error::InvalidInterface(_))
        ));
        assert!(speaker.neighbors().await[0].enabled);

        speaker.enable_disable_on_interface("eth0", false).await.unwrap();
        assert!(speaker.config().await.enabled_interfaces.is_empty());
        let summary = &speaker.neighbors().await[0];
        assert!(!summary.enabled);
        assert_eq!(summary.state, "Idle");
        speaker.tick().await;
        assert_eq!(speaker.neighbors().await[0].state, "Idle");

        speaker.enable_disable_on_interface("eth0", true).await.unwrap();
        assert_eq!(speaker.config().await.enabled_interfaces, vec![2]);
        assert_eq!(speaker.neighbors().await[0].state, "Connect");
    }

    #[tokio::test]
    async fn test_rib_views_and_route_filter() {
        let platform = Arc::new(MockPlatform::new());
        platform.responsive_peer(PEER, 65002, Ipv4Addr::new(2, 2, 2, 2));
        let speaker = speaker(&platform);
        speaker.set_local_as(65001).await;
        speaker.set_router_id(Ipv4Addr::new(1, 1, 1, 1)).await;
        speaker.advertise_network(net("10.1.0.0/16")).await.unwrap();
        speaker.advertise_network(net("10.2.0.0/16")).await.unwrap();
        speaker.update_prefix_list("EXPORT", net("10.1.0.0/16"), true).await;
        speaker.add_neighbor(PEER, 65002).await.unwrap();
        speaker
            .set_route_filter(PEER, Some("EXPORT".to_string()))
            .await
            .unwrap();
        for _ in 0..5 {
            speaker.tick().await;
        }
        let advertised = speaker.rib_out(PEER).await.unwrap();
        assert_eq!(advertised.len(), 1);
        assert_eq!(advertised[0].prefix, "10.1.0.0/16");
        assert!(speaker.rib_in(PEER).await.unwrap().is_empty());
        assert!(matches!(
            speaker.rib_out(Ipv4Addr::new(10, 9, 9, 9)).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything() {
        let platform = Arc::new(MockPlatform::new());
        let wire = platform.responsive_peer(PEER, 65002, Ipv4Addr::new(2, 2, 2, 2));
        let speaker = speaker(&platform);
        speaker.add_neighbor(PEER, 65002).await.unwrap();
        speaker.add_route(net("10.0.0.0/24"), PEER).await;
        speaker.set_aggregate(net("10.0.0.0/8"), false, false).await;
        speaker.update_prefix_list("EXPORT", net("10.0.0.0/24"), true).await;

        speaker.shutdown().await;
        assert!(speaker.neighbors().await.is_empty());
        assert!(speaker.routes().await.is_empty());
        assert!(speaker.aggregates().await.is_empty());
        assert!(speaker.prefix_lists().await.is_empty());
        assert_eq!(wire.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_flag() {
        let platform = Arc::new(MockPlatform::new());
        platform.responsive_peer(PEER, 65002, Ipv4Addr::new(2, 2, 2, 2));
        let speaker = speaker(&platform);
        speaker.add_neighbor(PEER, 65002).await.unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn({
            let speaker = speaker.clone();
            let shutdown = Arc::clone(&shutdown);
            async move { speaker.serve(Duration::from_millis(10), shutdown).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.store(true, Ordering::Relaxed);
        handle.await.unwrap();
        assert_eq!(speaker.neighbors().await[0].state, "Established");
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = crate::config::from_str(
            r#"
            router_id = "1.1.1.1"
            local_as = 65001
            interfaces = ["eth0"]

            [[neighbors]]
            remote_ip = "10.0.0.2"
            remote_as = 65002
            route_filter = "EXPORT"

            [[neighbors]]
            remote_ip = "10.0.0.3"
            remote_as = 65003

            [[networks]]
            prefix = "10.1.0.0/16"

            [[routes]]
            prefix = "172.16.0.0/24"
            next_hop = "10.0.0.1"

            [[prefix_lists]]
            name = "EXPORT"
            entries = [{ prefix = "10.1.0.0/16", permit = true }]
            "#,
        )
        .unwrap();
        let platform = Arc::new(MockPlatform::new().with_interface("eth0", 4));
        platform.refuse(Ipv4Addr::new(10, 0, 0, 3));
        let speaker = Speaker::from_config(platform, &config).await.unwrap();

        assert_eq!(speaker.config().await.enabled_interfaces, vec![4]);
        let neighbors = speaker.neighbors().await;
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].local_asn, "65001");
        let detail = speaker.neighbor(PEER).await.unwrap();
        assert_eq!(detail.route_filter.as_deref(), Some("EXPORT"));
        assert_eq!(speaker.routes().await.len(), 2);
        assert_eq!(speaker.prefix_lists().await[0].entries.len(), 1);
    }
}
