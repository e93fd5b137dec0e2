// Error types for IPv4 network discovery

use thiserror::Error;

/// Main error type returned by the resolver
#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    #[error("Unrecoverable fault: {0}")]
    Unrecoverable(#[from] Fault),

    #[error("Network discovery cancelled")]
    Cancelled,
}

/// OS-level failures seen after discovery already depends on live kernel state.
/// These are never retried internally.
#[derive(Error, Debug)]
pub enum Fault {
    #[error("failed to subscribe to route change events: {0}")]
    Subscribe(String),

    #[error("route change event stream closed")]
    EventStreamClosed,

    #[error("failed to list IPv4 addresses of {link}: {reason}")]
    AddressQuery { link: String, reason: String },
}

/// Result type alias using DiscoverError
pub type DiscoverResult<T> = Result<T, DiscoverError>;

impl DiscoverError {
    /// Convert error to user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            DiscoverError::InvalidNetwork(network) => {
                format!("'{}' is not an IPv4 network in CIDR notation (e.g. 192.168.1.0/24).", network)
            }
            DiscoverError::Unrecoverable(Fault::Subscribe(_)) => {
                "Could not listen for routing table changes. Check netlink permissions.".to_string()
            }
            DiscoverError::Unrecoverable(Fault::EventStreamClosed) => {
                "The routing table event stream ended unexpectedly. Restart the process.".to_string()
            }
            DiscoverError::Unrecoverable(Fault::AddressQuery { link, .. }) => {
                format!("Could not read the addresses of {}.", link)
            }
            DiscoverError::Cancelled => "Stopped waiting for the network.".to_string(),
        }
    }

    /// Whether the embedding process should be restarted rather than continue
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, DiscoverError::Unrecoverable(_))
    }

    /// Process exit status: 2 asks a supervisor to restart, 1 is a caller error
    pub fn exit_code(&self) -> u8 {
        if self.is_unrecoverable() { 2 } else { 1 }
    }
}
