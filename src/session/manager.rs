use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, trace, warn};
use tokio::sync::Mutex;

use super::{Neighbor, Platform, Session, SessionState, Transport};
use crate::config::PeerConfig;
use crate::error::{Error, Result};
use crate::store::Store;

/// Neighbor lifecycle on top of the shared store
///
/// No method waits on a neighbor lock while holding the store lock.
pub struct SessionManager {
    platform: Arc<dyn Platform>,
    queue_capacity: usize,
}

impl SessionManager {
    pub fn new(platform: Arc<dyn Platform>, queue_capacity: usize) -> Self {
        Self {
            platform,
            // A zero-sized queue could never carry the OPEN
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub async fn get(&self, store: &Mutex<Store>, addr: Ipv4Addr) -> Result<Arc<Neighbor>> {
        store
            .lock()
            .await
            .neighbors
            .get(&addr)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("neighbor {}", addr)))
    }

    /// Create a neighbor with a freshly opened transport and start it
    ///
    /// Nothing is stored if the transport cannot be opened. A disabled
    /// neighbor is stored in Idle without a transport.
    pub async fn add_neighbor(
        &self,
        store: &Mutex<Store>,
        peer: PeerConfig,
    ) -> Result<Arc<Neighbor>> {
        let addr = peer.remote_ip;
        let neighbor = {
            let mut store = store.lock().await;
            if store.neighbors.contains_key(&addr) {
                return Err(Error::Duplicate(format!("neighbor {}", addr)));
            }
            let transport = if peer.enabled {
                self.connect(addr, peer.dest_port)?
            } else {
                None
            };
            let session = Session::new(
                peer,
                Arc::clone(&self.platform),
                self.queue_capacity,
                transport,
            );
            let neighbor = Arc::new(Neighbor::new(session));
            store.neighbors.insert(addr, Arc::clone(&neighbor));
            neighbor
        };
        {
            let mut session = neighbor.session.lock().await;
            info!(
                "Added neighbor {} (AS {})",
                addr, session.peer.remote_as
            );
            session.start(store).await;
        }
        Ok(neighbor)
    }

    fn connect(&self, addr: Ipv4Addr, port: u16) -> Result<Option<Box<dyn Transport>>> {
        let socket = SocketAddr::new(IpAddr::V4(addr), port);
        let mut transport = self.platform.open(socket).map_err(|err| {
            warn!("Not adding neighbor {}: {}", addr, err);
            err
        })?;
        match transport.connect() {
            Ok(()) => Ok(Some(transport)),
            Err(err) => {
                // Retried when the session next enters Connect
                warn!("Unable to connect to {}: {}", addr, err);
                transport.close();
                Ok(None)
            }
        }
    }

    pub async fn remove_neighbor(&self, store: &Mutex<Store>, addr: Ipv4Addr) -> Result<()> {
        let neighbor = self.get(store, addr).await?;
        neighbor.session.lock().await.deconfigure(store).await;
        let mut store = store.lock().await;
        // Someone else may have removed and re-added it while we were stopping it
        match store.neighbors.get(&addr) {
            Some(current) if Arc::ptr_eq(current, &neighbor) => {
                store.neighbors.remove(&addr);
                store.rib.remove_peer(addr);
                info!("Removed neighbor {}", addr);
            }
            _ => debug!("Neighbor {} already removed", addr),
        }
        Ok(())
    }

    /// Back to Idle, forget the exchanged routes, then connect again
    pub async fn reset_neighbor(&self, store: &Mutex<Store>, addr: Ipv4Addr) -> Result<()> {
        let neighbor = self.get(store, addr).await?;
        neighbor
            .session
            .lock()
            .await
            .change_state(SessionState::Idle, store)
            .await;
        {
            let mut store = store.lock().await;
            store.rib.clear_rib_in(addr);
            store.rib.clear_rib_out(addr);
        }
        neighbor.session.lock().await.start(store).await;
        info!("Reset neighbor {}", addr);
        Ok(())
    }

    /// Remove and re-add, discarding all per-neighbor settings
    pub async fn hard_reset_neighbor(
        &self,
        store: &Mutex<Store>,
        addr: Ipv4Addr,
    ) -> Result<Arc<Neighbor>> {
        let neighbor = self.get(store, addr).await?;
        let (remote_as, dest_port) = {
            let session = neighbor.session.lock().await;
            (session.peer.remote_as, session.peer.dest_port)
        };
        self.remove_neighbor(store, addr).await?;
        let peer = PeerConfig {
            dest_port,
            ..PeerConfig::new(addr, remote_as)
        };
        self.add_neighbor(store, peer).await
    }

    /// Inbound: drop RIB-in and ask the peer to resend. Outbound: drop RIB-out
    /// so everything is advertised again.
    pub async fn soft_reset_neighbor(
        &self,
        store: &Mutex<Store>,
        addr: Ipv4Addr,
        inbound: bool,
    ) -> Result<()> {
        let neighbor = self.get(store, addr).await?;
        if inbound {
            store.lock().await.rib.clear_rib_in(addr);
            neighbor.session.lock().await.send_route_refresh().await?;
        } else {
            store.lock().await.rib.clear_rib_out(addr);
        }
        info!(
            "Soft reset {} for neighbor {}",
            if inbound { "inbound" } else { "outbound" },
            addr
        );
        Ok(())
    }

    pub async fn set_route_reflector_client(
        &self,
        store: &Mutex<Store>,
        addr: Ipv4Addr,
        client: bool,
    ) -> Result<()> {
        let neighbor = self.get(store, addr).await?;
        neighbor.session.lock().await.peer.route_reflector_client = client;
        debug!("Neighbor {} route-reflector-client={}", addr, client);
        Ok(())
    }

    pub async fn set_route_filter(
        &self,
        store: &Mutex<Store>,
        addr: Ipv4Addr,
        name: Option<String>,
    ) -> Result<()> {
        let neighbor = self.get(store, addr).await?;
        debug!("Neighbor {} route-filter={:?}", addr, name);
        neighbor.session.lock().await.peer.route_filter = name;
        Ok(())
    }

    pub async fn set_enabled_all(&self, store: &Mutex<Store>, enabled: bool) {
        let neighbors = store.lock().await.neighbors();
        for neighbor in neighbors {
            neighbor
                .session
                .lock()
                .await
                .set_enabled(enabled, store)
                .await;
        }
    }

    /// Run one tick on every neighbor, concurrently, and wait for all of them
    pub async fn tick_all(&self, store: &Mutex<Store>) {
        let neighbors = store.lock().await.neighbors();
        join_all(neighbors.iter().map(|neighbor| async move {
            neighbor.session.lock().await.tick(store).await;
        }))
        .await;
    }

    /// Stop and forget every neighbor
    pub async fn shutdown(&self, store: &Mutex<Store>) {
        let neighbors: Vec<_> = {
            let mut store = store.lock().await;
            store.neighbors.drain().map(|(_, n)| n).collect()
        };
        trace!("Shutting down {} sessions", neighbors.len());
        for neighbor in neighbors {
            neighbor.session.lock().await.deconfigure(store).await;
        }
    }
}
