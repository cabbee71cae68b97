use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use log::trace;

use super::{Rib, Route};
use crate::session::message::{
    prefix_len, two_byte_asn, PathAttributes, UpdateMessage, MAX_MESSAGE_LEN,
};

/// Routes exchanged with a single neighbor, one per prefix
#[derive(Debug, Default)]
pub struct AdjRib {
    routes: BTreeMap<Ipv4Network, Route>,
}

impl AdjRib {
    pub fn insert(&mut self, route: Route) -> Option<Route> {
        self.routes.insert(route.prefix, route)
    }

    pub fn remove(&mut self, prefix: &Ipv4Network) -> Option<Route> {
        self.routes.remove(prefix)
    }

    pub fn get(&self, prefix: &Ipv4Network) -> Option<&Route> {
        self.routes.get(prefix)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}

/// How routes are presented to one neighbor
#[derive(Debug, Clone)]
pub struct ExportPolicy<'a> {
    pub local_as: u32,
    pub remote_as: u32,
    /// Prefix-list name; a name with no list behind it filters nothing
    pub filter: Option<&'a str>,
}

impl<'a> ExportPolicy<'a> {
    pub fn is_ebgp(&self) -> bool {
        self.local_as != self.remote_as
    }

    pub fn attributes(&self, route: &Route) -> PathAttributes {
        let mut as_path: Vec<u16> = route
            .as_path
            .split_whitespace()
            .filter_map(|asn| asn.parse::<u32>().ok())
            .map(two_byte_asn)
            .collect();
        if self.is_ebgp() {
            as_path.insert(0, two_byte_asn(self.local_as));
        }
        PathAttributes {
            origin: route.origin,
            as_path,
            next_hop: Some(route.next_hop),
            med: Some(route.med).filter(|med| *med != 0),
            local_pref: if self.is_ebgp() {
                None
            } else {
                Some(route.local_pref)
            },
        }
    }
}

/// Everything an export set depends on besides the route table itself
#[derive(Debug, Clone, PartialEq)]
pub(super) struct SyncMark {
    generation: u64,
    local_as: u32,
    remote_as: u32,
    filter: Option<String>,
}

impl SyncMark {
    fn new(generation: u64, policy: &ExportPolicy) -> Self {
        Self {
            generation,
            local_as: policy.local_as,
            remote_as: policy.remote_as,
            filter: policy.filter.map(str::to_owned),
        }
    }
}

impl Rib {
    /// First route per prefix in the route table that passes `filter`
    pub fn export_set(&self, filter: Option<&str>) -> BTreeMap<Ipv4Network, &Route> {
        let list = filter.and_then(|name| self.prefix_list(name));
        let mut export = BTreeMap::new();
        for route in &self.routes {
            if let Some(list) = list {
                // Unmatched prefixes are denied
                if list.permits(&route.prefix) != Some(true) {
                    continue;
                }
            }
            export.entry(route.prefix).or_insert(route);
        }
        export
    }

    /// Build the next UPDATE toward `peer` and record it in its RIB-out
    ///
    /// Carries every pending withdrawal that fits plus the pending routes
    /// sharing the first one's attributes; the rest wait for a later call.
    pub fn next_update(&mut self, peer: Ipv4Addr, policy: &ExportPolicy) -> Option<UpdateMessage> {
        let mark = SyncMark::new(self.generation, policy);
        if self.in_sync.get(&peer) == Some(&mark) {
            return None;
        }
        let (withdrawn, pending): (Vec<Ipv4Network>, Vec<Route>) = {
            let export = self.export_set(policy.filter);
            let rib_out = self.rib_out.get(&peer);
            let withdrawn = rib_out
                .map(|rib| {
                    rib.routes()
                        .map(|r| r.prefix)
                        .filter(|p| !export.contains_key(p))
                        .collect()
                })
                .unwrap_or_default();
            let pending = export
                .values()
                .filter(|route| match rib_out.and_then(|rib| rib.get(&route.prefix)) {
                    Some(advertised) => !advertised.same_path(route),
                    None => true,
                })
                .map(|route| (*route).clone())
                .collect();
            (withdrawn, pending)
        };
        if withdrawn.is_empty() && pending.is_empty() {
            self.in_sync.insert(peer, mark);
            return None;
        }

        let mut update = UpdateMessage::default();
        let mut size = update.encoded_len();
        for prefix in withdrawn {
            if size + prefix_len(&prefix) > MAX_MESSAGE_LEN {
                break;
            }
            size += prefix_len(&prefix);
            update.withdrawn.push(prefix);
        }

        let mut announced = vec![];
        if let Some(first) = pending.first() {
            update.attributes = policy.attributes(first);
            for route in pending.iter() {
                if policy.attributes(route) != update.attributes {
                    continue;
                }
                if update.nlri.is_empty() {
                    // First NLRI brings the attributes along
                    update.nlri.push(route.prefix);
                    if update.encoded_len() > MAX_MESSAGE_LEN {
                        // Withdrawals filled this one; announce next time
                        update.nlri.clear();
                        update.attributes = PathAttributes::default();
                        break;
                    }
                    size = update.encoded_len();
                } else if size + prefix_len(&route.prefix) <= MAX_MESSAGE_LEN {
                    size += prefix_len(&route.prefix);
                    update.nlri.push(route.prefix);
                } else {
                    break;
                }
                announced.push(route.clone());
            }
        }

        let rib_out = self.rib_out.entry(peer).or_default();
        for prefix in &update.withdrawn {
            rib_out.remove(prefix);
        }
        for route in announced {
            rib_out.insert(route);
        }
        trace!(
            "UPDATE for {}: {} withdrawn, {} announced, {} in RIB-out",
            peer,
            update.withdrawn.len(),
            update.nlri.len(),
            rib_out.len()
        );
        Some(update)
    }
}
