pub mod api;
pub mod config;
mod error;
mod handler;
pub mod rib;
pub mod session;
pub mod store;
mod utils;

pub use config::{PeerConfig, ServerConfig};
pub use error::{Error, Result};
pub use handler::Speaker;
pub use session::{Platform, SessionState, TcpPlatform, Transport};
pub use store::Globals;
