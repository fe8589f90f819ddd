use crate::error::{MusicCastError, Result};
use crate::types::{ReceiverAddress, Zone, DEFAULT_CONTROL_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default UDP port push events are delivered to
pub const EVENTS_DEFAULT_PORT: u16 = 41100;

/// Resolved configuration of one receiver session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// DNS name or IPv4 address of the receiver
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub zone: Zone,

    /// Delay between two polls, in seconds
    #[serde(default = "default_refresh_interval", alias = "refresh")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    5
}

impl SessionConfig {
    /// Configuration for `host` with every other value defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            zone: Zone::default(),
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }

    /// Parse a configuration document
    ///
    /// ```
    /// use yamaha_musiccast::SessionConfig;
    ///
    /// let config = SessionConfig::from_json(r#"{"host": "192.168.1.50", "zone": "zone2"}"#).unwrap();
    /// assert_eq!(config.port, 80);
    /// assert_eq!(config.refresh_interval_secs, 10);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the HTTP port of the receiver
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the zone this session controls
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    /// Set the poll interval in seconds
    pub fn with_refresh_interval(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Set the per-request timeout in seconds
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Check that the host is set and both durations are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MusicCastError::Config("host must not be empty".to_string()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(MusicCastError::Config(
                "refresh interval must be at least one second".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(MusicCastError::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Receiver address with surrounding whitespace removed from the host
    pub fn address(&self) -> ReceiverAddress {
        ReceiverAddress::new(self.host.trim(), self.port)
    }

    /// Poll interval
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Configuration of the UDP push-event listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    #[serde(default = "default_event_port")]
    pub port: u16,

    /// Upper bound on how long one receive blocks before the loop checks for shutdown
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_event_port() -> u16 {
    EVENTS_DEFAULT_PORT
}

fn default_receive_timeout() -> u64 {
    10
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_event_port(),
            receive_timeout_secs: default_receive_timeout(),
        }
    }
}

impl ListenerConfig {
    /// Address the event socket binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Receive timeout, at least one second
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs.max(1))
    }
}
