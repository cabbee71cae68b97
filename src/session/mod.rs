pub mod codec;
pub mod fsm;
mod manager;
pub mod message;
mod message_counts;
pub mod queue;
#[allow(clippy::module_inception)]
mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod timers;
pub mod transport;

use std::fmt;

pub use manager::SessionManager;
pub use message_counts::{Counts, MessageCounts};
pub use session::{Neighbor, Session};
pub use transport::{Platform, TcpPlatform, Transport};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connect,
    /// Reserved; no transition leads here
    Active,
    OpenSent,
    OpenConfirm,
    Established,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let word = match self {
            SessionState::Connect => "Connect",
            SessionState::Active => "Active",
            SessionState::Idle => "Idle",
            SessionState::OpenSent => "OpenSent",
            SessionState::OpenConfirm => "OpenConfirm",
            SessionState::Established => "Established",
        };
        write!(f, "{}", word)
    }
}
