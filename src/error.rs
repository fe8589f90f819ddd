use crate::protocol::ResponseCode;
use thiserror::Error;

/// Result type for MusicCast operations
pub type Result<T> = std::result::Result<T, MusicCastError>;

/// Errors that can occur when talking to a MusicCast receiver
#[derive(Error, Debug)]
pub enum MusicCastError {
    /// Transport failure: connect error, client-side timeout, broken body
    #[error("Communication error: {0}")]
    Communication(#[from] reqwest::Error),

    /// The receiver answered with a non-zero response code
    #[error("Device rejected request: {code}")]
    DeviceRejected {
        /// Vendor response code
        code: ResponseCode,
    },

    /// HTTP 400 or 401
    #[error("{} credentials (HTTP {status})", credentials_kind(.status))]
    Credentials {
        /// HTTP status code
        status: u16,
    },

    /// Any other non-200 HTTP status
    #[error("Unknown HTTP status code {0} returned by the receiver")]
    UnexpectedStatus(u16),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unexpected response from the receiver
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The zone status reported a missing or zero `max_volume`
    #[error("Receiver reported no usable max_volume")]
    InvalidMaxVolume,

    /// An operation needed zone status before any was fetched
    #[error("Zone status has not been fetched yet")]
    StatusUnavailable,

    /// The session was disposed
    #[error("Session disposed")]
    SessionDisposed,

    /// A command value the receiver vocabulary can't express
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Channel receive error
    #[error("Channel error: {0}")]
    ChannelError(String),
}

fn credentials_kind(status: &u16) -> &'static str {
    if *status == 401 {
        "Expired"
    } else {
        "Invalid"
    }
}

impl MusicCastError {
    /// Whether the request never got a usable answer from the receiver
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Communication(_))
    }

    /// Whether this is a client-side request timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Communication(e) if e.is_timeout())
    }

    /// The vendor response code, if the receiver rejected the request
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            Self::DeviceRejected { code } => Some(*code),
            _ => None,
        }
    }

    /// Whether the next poll may reasonably succeed without intervention
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Communication(_) => true,
            Self::DeviceRejected { code } => code.is_transient(),
            _ => false,
        }
    }
}
