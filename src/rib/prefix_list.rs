use std::fmt;

use ipnetwork::Ipv4Network;

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixListEntry {
    pub prefix: Ipv4Network,
    pub permit: bool,
}

impl PrefixListEntry {
    pub fn new(prefix: Ipv4Network, permit: bool) -> Self {
        Self { prefix, permit }
    }
}

impl fmt::Display for PrefixListEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let action = if self.permit { "permit" } else { "deny" };
        write!(f, "{} {}", action, self.prefix)
    }
}

/// Named, ordered list of permit/deny entries
#[derive(Clone, Debug, PartialEq)]
pub struct PrefixList {
    pub name: String,
    entries: Vec<PrefixListEntry>,
}

impl PrefixList {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            entries: vec![],
        }
    }

    pub fn entries(&self) -> &[PrefixListEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: PrefixListEntry) {
        self.entries.push(entry);
    }

    /// Action of the first entry with exactly this prefix and mask, if any
    pub fn permits(&self, prefix: &Ipv4Network) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.prefix == *prefix)
            .map(|e| e.permit)
    }
}
