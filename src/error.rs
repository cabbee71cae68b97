use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Lookup of a neighbor, route or aggregate missed
    #[error("{0} not found")]
    NotFound(String),

    /// Entry with the same key already exists
    #[error("{0} already exists")]
    Duplicate(String),

    /// Buffer shorter than a header, or declared length outside 19..=4096
    #[error("invalid message length {0}")]
    InvalidLength(usize),

    #[error("invalid message marker")]
    InvalidMarker,

    #[error("unknown message type {0}")]
    UnknownType(u8),

    /// Message body too short for its type
    #[error("truncated {0} message")]
    Truncated(&'static str),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("outbound queue full")]
    QueueFull,

    #[error("invalid interface '{0}'")]
    InvalidInterface(String),

    #[error("invalid prefix {0}")]
    InvalidPrefix(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl From<ipnetwork::IpNetworkError> for Error {
    fn from(error: ipnetwork::IpNetworkError) -> Self {
        Error::InvalidPrefix(error.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
