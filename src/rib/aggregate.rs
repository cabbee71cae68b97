use std::fmt;

use ipnetwork::Ipv4Network;

/// Summary route configuration, kept for display and export to collaborators
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub prefix: Ipv4Network,
    pub summary_only: bool,
    pub as_set: bool,
}

impl Aggregate {
    pub fn new(prefix: Ipv4Network) -> Self {
        Self {
            prefix,
            summary_only: false,
            as_set: false,
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if self.summary_only {
            write!(f, " summary-only")?;
        }
        if self.as_set {
            write!(f, " as-set")?;
        }
        Ok(())
    }
}
