use crate::requests::{PlaybackCommand, VolumeCommand};
use crate::types::Zone;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical channel exposed to the host framework
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Zone,
    Power,
    Volume,
    Mute,
    Input,
    Playback,
    Artist,
    Album,
    Track,
    AlbumArtUrl,
}

impl Channel {
    /// Every channel, in display order
    pub const ALL: [Channel; 10] = [
        Channel::Zone,
        Channel::Power,
        Channel::Volume,
        Channel::Mute,
        Channel::Input,
        Channel::Playback,
        Channel::Artist,
        Channel::Album,
        Channel::Track,
        Channel::AlbumArtUrl,
    ];

    /// Channels derived from play info
    pub const PLAY_INFO: [Channel; 5] = [
        Channel::Playback,
        Channel::Artist,
        Channel::Album,
        Channel::Track,
        Channel::AlbumArtUrl,
    ];

    /// Channels derived from zone status
    pub const ZONE_STATUS: [Channel; 4] =
        [Channel::Power, Channel::Volume, Channel::Mute, Channel::Input];

    /// Stable identifier of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Zone => "zone",
            Channel::Power => "power",
            Channel::Volume => "volume",
            Channel::Mute => "mute",
            Channel::Input => "input",
            Channel::Playback => "playback",
            Channel::Artist => "artist",
            Channel::Album => "album",
            Channel::Track => "track",
            Channel::AlbumArtUrl => "album_art_url",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached value of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ChannelState {
    Text(String),
    OnOff(bool),
    Percent(u8),
}

/// Command received from the host framework for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectZone(Zone),
    Power(bool),
    Mute(bool),
    Input(String),
    Volume(VolumeCommand),
    Playback(PlaybackCommand),
    /// Re-fetch everything now instead of waiting for the next poll
    Refresh,
}

impl Command {
    /// The channel this command targets; `None` for [`Command::Refresh`]
    pub fn channel(&self) -> Option<Channel> {
        match self {
            Command::SelectZone(_) => Some(Channel::Zone),
            Command::Power(_) => Some(Channel::Power),
            Command::Mute(_) => Some(Channel::Mute),
            Command::Input(_) => Some(Channel::Input),
            Command::Volume(_) => Some(Channel::Volume),
            Command::Playback(_) => Some(Channel::Playback),
            Command::Refresh => None,
        }
    }
}
