use serde::Serialize;

use crate::rib::{Aggregate, PrefixList, Route};
use crate::utils::format_time_as_elapsed;

#[derive(Debug, Clone, Serialize)]
pub struct LearnedRoute {
    pub source: String,
    pub received_at: i64,
    pub age: String,
    pub prefix: String,
    pub next_hop: String,
    pub origin: String,
    pub as_path: String,
    pub local_pref: u32,
    pub multi_exit_disc: u32,
}

impl From<&Route> for LearnedRoute {
    fn from(route: &Route) -> LearnedRoute {
        LearnedRoute {
            source: route.source.to_string(),
            received_at: route.timestamp().timestamp(),
            age: format_time_as_elapsed(route.timestamp()),
            prefix: route.prefix.to_string(),
            next_hop: route.next_hop.to_string(),
            origin: route.origin.to_string(),
            as_path: route.as_path.clone(),
            local_pref: route.local_pref,
            multi_exit_disc: route.med,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateView {
    pub prefix: String,
    pub summary_only: bool,
    pub as_set: bool,
}

impl From<&Aggregate> for AggregateView {
    fn from(aggregate: &Aggregate) -> AggregateView {
        AggregateView {
            prefix: aggregate.prefix.to_string(),
            summary_only: aggregate.summary_only,
            as_set: aggregate.as_set,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefixListEntryView {
    pub sequence: usize,
    pub prefix: String,
    pub action: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrefixListView {
    pub name: String,
    pub entries: Vec<PrefixListEntryView>,
}

impl From<&PrefixList> for PrefixListView {
    fn from(list: &PrefixList) -> PrefixListView {
        PrefixListView {
            name: list.name.clone(),
            entries: list
                .entries()
                .iter()
                .enumerate()
                .map(|(i, entry)| PrefixListEntryView {
                    sequence: (i + 1) * 5,
                    prefix: entry.prefix.to_string(),
                    action: if entry.permit { "permit" } else { "deny" },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::rib::{PrefixListEntry, RouteSource};

    #[test]
    fn test_learned_route() {
        let mut route = Route::new("10.0.0.7/24".parse().unwrap(), Ipv4Addr::new(1, 1, 1, 1))
            .with_source(RouteSource::Peer(Ipv4Addr::new(10, 0, 0, 2)));
        route.as_path = "65002".to_string();
        let view = LearnedRoute::from(&route);
        assert_eq!(view.prefix, "10.0.0.0/24");
        assert_eq!(view.source, "10.0.0.2");
        assert_eq!(view.origin, "IGP");
        assert_eq!(view.local_pref, 100);
        assert_eq!(view.age, "00:00:00");
    }

    #[test]
    fn test_prefix_list_view() {
        let mut list = PrefixList::new("EXPORT");
        list.push(PrefixListEntry::new("10.0.0.0/8".parse().unwrap(), true));
        list.push(PrefixListEntry::new("0.0.0.0/0".parse().unwrap(), false));
        let view = PrefixListView::from(&list);
        assert_eq!(view.entries.len(), 2);
        assert_eq!(view.entries[1].sequence, 10);
        assert_eq!(view.entries[1].action, "deny");
    }
}
