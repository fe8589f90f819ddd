//! Rust library for controlling Yamaha MusicCast network receivers
//!
//! This library provides an async API for polling and controlling MusicCast
//! receivers over their HTTP control API (Yamaha Extended Control). It
//! supports:
//!
//! - Zone power, volume, mute, input, sleep timer and sound program control
//! - Net/USB playback control and now-playing information
//! - Real-time updates from UDP push events, with polling as the fallback
//! - Change notification subscriptions per receiver
//!
//! # Quick Start
//!
//! ```no_run
//! use yamaha_musiccast::{Channel, Command, MusicCast, SessionConfig, VolumeCommand};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let musiccast = MusicCast::new();
//!
//!     // Start polling the receiver; push events are requested automatically
//!     let session = musiccast.add_session(SessionConfig::new("192.168.1.50")).await?;
//!     session.refresh().await?;
//!
//!     println!("Volume: {:?}", session.channel_state(Channel::Volume));
//!
//!     session.handle_command(Command::Volume(VolumeCommand::Percent(30))).await?;
//!     session.handle_command(Command::Mute(false)).await?;
//!
//!     musiccast.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **MusicCast**: Owns the sessions, the event mediator and the UDP receiver
//! - **Session**: Cached state and command handling for one receiver zone
//! - **Receiver / Mediator**: UDP push-event listener and routing by source IP
//! - **Requests**: Zone, system, net/USB and event endpoint builders
//! - **Connection**: HTTP request execution and status classification
//! - **Protocol**: Request structure, response envelope and response codes
//! - **Types**: Domain types and data structures

mod channel;
mod client;
mod config;
mod connection;
mod error;
mod events;
mod mediator;
mod protocol;
mod receiver;
mod requests;
mod session;
mod subscription;
mod types;

// Public exports
pub use channel::{Channel, ChannelState, Command};
pub use client::MusicCast;
pub use config::{ListenerConfig, SessionConfig, EVENTS_DEFAULT_PORT};
pub use connection::{Connection, REQUEST_TIMEOUT};
pub use error::{MusicCastError, Result};
pub use events::{
    CdEvent, ClockEvent, DistEvent, EventPayload, NetUsbEvent, SystemEvent, TunerEvent, ZoneEvent,
};
pub use mediator::EventMediator;
pub use protocol::{decode_envelope, Method, Request, ResponseCode, APP_NAME, ROOT_PATH};
pub use receiver::EventReceiver;
pub use requests::{
    EventRequest, NetUsbRequest, PlaybackCommand, SystemRequest, VolumeCommand, ZoneRequest,
    SLEEP_MINUTES,
};
pub use session::{DeviceSession, SessionState, SessionStatus, ZoneControl};
pub use subscription::{SessionUpdate, UpdateReceiver};
pub use types::{
    is_known_input, percent_to_volume, volume_to_percent, DeviceInfo, PlayInfo, PlaybackAttributes,
    PlaybackState, Power, ReceiverAddress, SessionId, SubscribeAck, Zone, ZoneStatus,
    DEFAULT_ALBUM_ART_PATH, DEFAULT_CONTROL_PORT, KNOWN_INPUTS,
};
