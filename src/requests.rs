//! Per-domain request builders on top of [`Connection`]
//!
//! Each facade knows the fixed path templates and parameter names of one
//! part of the receiver API. None of them keep state.

use crate::connection::Connection;
use crate::error::{MusicCastError, Result};
use crate::protocol::{Request, APP_NAME, HEADER_APP_NAME, HEADER_APP_PORT};
use crate::types::{
    is_known_input, percent_to_volume, Ack, DeviceInfo, PlayInfo, SubscribeAck, Zone, ZoneStatus,
};
use std::sync::Arc;

const SET_POWER_PARAMETER: &str = "power";
const SET_VOLUME_PARAMETER: &str = "volume";
const SET_MUTE_PARAMETER: &str = "enable";
const SET_INPUT_PARAMETER: &str = "input";
const SET_SLEEP_PARAMETER: &str = "sleep";
const SET_SOUND_PROGRAM_PARAMETER: &str = "program";
const PLAYBACK_PARAMETER: &str = "playback";

/// Sleep timer values accepted by `setSleep`, in minutes
pub const SLEEP_MINUTES: [u16; 5] = [0, 30, 60, 90, 120];

/// Volume change requested for a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCommand {
    /// Absolute level, 0-100 percent of the zone's max volume
    Percent(u8),
    Increase,
    Decrease,
}

/// Net/USB transport command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
    /// Toggle between play and pause
    PlayPause,
    Stop,
    Next,
    Previous,
    FastReverseStart,
    FastReverseEnd,
    FastForwardStart,
    FastForwardEnd,
}

impl PlaybackCommand {
    /// Token sent as the `playback` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackCommand::Play => "play",
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::PlayPause => "play_pause",
            PlaybackCommand::Stop => "stop",
            PlaybackCommand::Next => "next",
            PlaybackCommand::Previous => "previous",
            PlaybackCommand::FastReverseStart => "fast_reverse_start",
            PlaybackCommand::FastReverseEnd => "fast_reverse_end",
            PlaybackCommand::FastForwardStart => "fast_forward_start",
            PlaybackCommand::FastForwardEnd => "fast_forward_end",
        }
    }
}

/// `/{zone}/...` endpoints
#[derive(Debug, Clone)]
pub struct ZoneRequest {
    connection: Arc<Connection>,
}

impl ZoneRequest {
    /// Endpoints of every zone over one shared connection
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    fn path(zone: Zone, method: &str) -> Request {
        Request::api(&format!("/{}/{}", zone, method))
    }

    /// Current status of `zone`
    pub async fn get_status(&self, zone: Zone) -> Result<ZoneStatus> {
        self.connection.execute(Self::path(zone, "getStatus")).await
    }

    /// Switch `zone` on or to standby
    pub async fn set_power(&self, zone: Zone, on: bool) -> Result<()> {
        let power = if on { "on" } else { "standby" };
        self.send(Self::path(zone, "setPower").with_query(SET_POWER_PARAMETER, power))
            .await
    }

    /// Let the receiver flip the power state of `zone`
    pub async fn set_power_toggle(&self, zone: Zone) -> Result<()> {
        self.send(Self::path(zone, "setPower").with_query(SET_POWER_PARAMETER, "toggle"))
            .await
    }

    /// Change the volume of `zone`
    ///
    /// Increase/decrease are sent as `up`/`down`. An absolute percentage is
    /// converted to device units using `max_volume`, which must be the most
    /// recently fetched value for this zone.
    pub async fn set_volume(
        &self,
        zone: Zone,
        volume: VolumeCommand,
        max_volume: Option<i32>,
    ) -> Result<()> {
        let value = match volume {
            VolumeCommand::Increase => "up".to_string(),
            VolumeCommand::Decrease => "down".to_string(),
            VolumeCommand::Percent(percent) => {
                percent_to_volume(percent, max_volume)?.to_string()
            }
        };
        self.send(Self::path(zone, "setVolume").with_query(SET_VOLUME_PARAMETER, value))
            .await
    }

    /// Mute or unmute `zone`
    pub async fn set_mute(&self, zone: Zone, mute: bool) -> Result<()> {
        self.send(Self::path(zone, "setMute").with_query(SET_MUTE_PARAMETER, mute))
            .await
    }

    /// Select the input of `zone`
    ///
    /// Ids outside [`KNOWN_INPUTS`](crate::KNOWN_INPUTS) are logged and sent
    /// anyway. An empty id is rejected without a request.
    pub async fn set_input(&self, zone: Zone, input: &str) -> Result<()> {
        if input.is_empty() {
            return Err(MusicCastError::InvalidCommand("empty input id".to_string()));
        }
        if !is_known_input(input) {
            tracing::warn!("Input '{}' is not in the known vocabulary, sending anyway", input);
        }
        self.send(Self::path(zone, "setInput").with_query(SET_INPUT_PARAMETER, input))
            .await
    }

    /// Arm the sleep timer; `minutes` must be one of [`SLEEP_MINUTES`]
    pub async fn set_sleep(&self, zone: Zone, minutes: u16) -> Result<()> {
        if !SLEEP_MINUTES.contains(&minutes) {
            return Err(MusicCastError::InvalidCommand(format!(
                "sleep must be one of {:?} minutes, got {}",
                SLEEP_MINUTES, minutes
            )));
        }
        self.send(Self::path(zone, "setSleep").with_query(SET_SLEEP_PARAMETER, minutes))
            .await
    }

    /// Select a DSP sound program such as `straight` or `stereo`
    pub async fn set_sound_program(&self, zone: Zone, program: &str) -> Result<()> {
        self.send(
            Self::path(zone, "setSoundProgram").with_query(SET_SOUND_PROGRAM_PARAMETER, program),
        )
        .await
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.connection.execute::<Ack>(request).await?;
        Ok(())
    }
}

/// `/system/...` endpoints
#[derive(Debug, Clone)]
pub struct SystemRequest {
    connection: Arc<Connection>,
}

impl SystemRequest {
    /// System endpoints over `connection`
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    /// Device information; constant for the lifetime of a connection
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        self.connection
            .execute(Request::api("/system/getDeviceInfo"))
            .await
    }
}

/// `/netusb/...` endpoints
#[derive(Debug, Clone)]
pub struct NetUsbRequest {
    connection: Arc<Connection>,
}

impl NetUsbRequest {
    /// Net/USB endpoints over `connection`
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    /// What the net/USB source is playing
    pub async fn get_play_info(&self) -> Result<PlayInfo> {
        self.connection
            .execute(Request::api("/netusb/getPlayInfo"))
            .await
    }

    /// Send a transport command to the net/USB source
    pub async fn set_playback(&self, command: PlaybackCommand) -> Result<()> {
        let request =
            Request::api("/netusb/setPlayback").with_query(PLAYBACK_PARAMETER, command.as_str());
        self.connection.execute::<Ack>(request).await?;
        Ok(())
    }
}

/// Push-event subscription
#[derive(Debug, Clone)]
pub struct EventRequest {
    connection: Arc<Connection>,
    app_port: u16,
}

impl EventRequest {
    /// `app_port` is the local UDP port push events should be sent to
    pub fn new(connection: Arc<Connection>, app_port: u16) -> Self {
        Self {
            connection,
            app_port,
        }
    }

    /// Register this process with the receiver
    ///
    /// Subscriptions lapse on the receiver side, so this has to be repeated
    /// on every poll.
    pub async fn subscribe_to_events(&self) -> Result<SubscribeAck> {
        let request = Request::api("")
            .with_header(HEADER_APP_NAME, APP_NAME)
            .with_header(HEADER_APP_PORT, self.app_port);
        self.connection.execute(request).await
    }
}
