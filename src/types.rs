use crate::error::{MusicCastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Session identifier
pub type SessionId = Uuid;

/// Default HTTP control port of a receiver
pub const DEFAULT_CONTROL_PORT: u16 = 80;

/// Album art shown when the receiver reports no album art URL
///
/// Observed on receivers but undocumented by the vendor; unverified.
pub const DEFAULT_ALBUM_ART_PATH: &str = ":49154/Icons/120x120.jpg";

/// Where a receiver's control API can be reached
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiverAddress {
    pub host: String,
    pub port: u16,
}

impl ReceiverAddress {
    /// Address of a receiver at `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `http://host:port`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ReceiverAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Independently controllable output group of a receiver
///
/// The names are part of the protocol. Every receiver has `main`; the
/// others depend on the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    #[default]
    Main,
    Zone2,
    Zone3,
    Zone4,
}

impl Zone {
    /// Every zone a receiver can have
    pub const ALL: [Zone; 4] = [Zone::Main, Zone::Zone2, Zone::Zone3, Zone::Zone4];

    /// Path segment of the zone
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Main => "main",
            Zone::Zone2 => "zone2",
            Zone::Zone3 => "zone3",
            Zone::Zone4 => "zone4",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = MusicCastError;

    fn from_str(s: &str) -> Result<Self> {
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| MusicCastError::InvalidCommand(format!("Unknown zone: {}", s)))
    }
}

/// Zone power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Standby,
}

impl Power {
    /// Whether the zone is powered on
    pub fn is_on(&self) -> bool {
        *self == Power::On
    }

    /// Wire value of the power state
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::On => "on",
            Power::Standby => "standby",
        }
    }
}

/// Net/USB playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Play,
    #[default]
    Stop,
    Pause,
    FastReverse,
    FastForward,
    #[serde(other)]
    Unknown,
}

impl PlaybackState {
    /// Wire value of the playback state
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Play => "play",
            PlaybackState::Stop => "stop",
            PlaybackState::Pause => "pause",
            PlaybackState::FastReverse => "fast_reverse",
            PlaybackState::FastForward => "fast_forward",
            PlaybackState::Unknown => "unknown",
        }
    }
}

/// Input ids known to the receiver vocabulary
pub const KNOWN_INPUTS: &[&str] = &[
    "cd", "tuner", "multi_ch", "phono", "hdmi1", "hdmi2", "hdmi3", "hdmi4", "hdmi5", "hdmi6",
    "hdmi7", "hdmi8", "hdmi", "av1", "av2", "av3", "av4", "av5", "av6", "av7", "v_aux", "aux1",
    "aux2", "aux", "audio1", "audio2", "audio3", "audio4", "audio_cd", "audio", "optical1",
    "optical2", "optical", "coaxial1", "coaxial2", "coaxial", "digital1", "digital2", "digital",
    "line1", "line2", "line3", "line_cd", "analog", "tv", "bd_dvd", "usb_dac", "usb", "bluetooth",
    "server", "net_radio", "rhapsody", "napster", "pandora", "siriusxm", "spotify", "juke",
    "airplay", "radiko", "qobuz", "mc_link", "main_sync", "none",
];

/// Whether `input` is one of [`KNOWN_INPUTS`]
pub fn is_known_input(input: &str) -> bool {
    KNOWN_INPUTS.contains(&input)
}

/// Convert a device-native volume into a 0-100 percentage
pub fn volume_to_percent(volume: i32, max_volume: Option<i32>) -> Result<u8> {
    let max_volume = match max_volume {
        Some(max) if max > 0 => max,
        _ => return Err(MusicCastError::InvalidMaxVolume),
    };
    let percent = i64::from(volume) * 100 / i64::from(max_volume);
    Ok(percent.clamp(0, 100) as u8)
}

/// Convert a 0-100 percentage into device-native volume units
pub fn percent_to_volume(percent: u8, max_volume: Option<i32>) -> Result<i32> {
    let max_volume = match max_volume {
        Some(max) if max > 0 => max,
        _ => return Err(MusicCastError::InvalidMaxVolume),
    };
    let percent = i64::from(percent.min(100));
    let volume = (percent * i64::from(max_volume) + 50) / 100;
    Ok(volume as i32)
}

/// Basic information about a receiver (`/system/getDeviceInfo`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub response_code: i64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub system_version: f64,
    #[serde(default)]
    pub api_version: f64,
    #[serde(default)]
    pub netmodule_version: String,
}

/// Status of one zone (`/{zone}/getStatus`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneStatus {
    #[serde(default)]
    pub response_code: i64,
    pub power: Power,
    pub volume: i32,
    /// Device-native volume ceiling; `None` or 0 is a protocol error
    #[serde(default)]
    pub max_volume: Option<i32>,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub sound_program: Option<String>,
    #[serde(default)]
    pub clear_voice: Option<bool>,
    #[serde(default)]
    pub subwoofer_volume: Option<i32>,
    #[serde(default)]
    pub distribution_enable: Option<bool>,
    #[serde(default)]
    pub link_control: Option<String>,
    #[serde(default)]
    pub link_audio_delay: Option<String>,
    #[serde(default)]
    pub link_audio_quality: Option<String>,
    #[serde(default)]
    pub disable_flags: Option<i64>,
}

impl ZoneStatus {
    /// Volume as a 0-100 percentage of `max_volume`
    pub fn volume_percent(&self) -> Result<u8> {
        volume_to_percent(self.volume, self.max_volume)
    }
}

/// Net/USB playback information (`/netusb/getPlayInfo`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayInfo {
    #[serde(default)]
    pub response_code: i64,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub play_queue_type: Option<String>,
    #[serde(default)]
    pub playback: PlaybackState,
    #[serde(default)]
    pub repeat: Option<String>,
    #[serde(default)]
    pub shuffle: Option<String>,
    /// Seconds; -60000 when invalid
    #[serde(default)]
    pub play_time: Option<i32>,
    #[serde(default)]
    pub total_time: Option<i32>,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub track: String,
    /// Relative to the receiver host; empty means no album art
    #[serde(default)]
    pub albumart_url: String,
    #[serde(default)]
    pub albumart_id: Option<i32>,
    #[serde(default)]
    pub usb_devicetype: Option<String>,
    #[serde(default)]
    pub auto_stopped: Option<bool>,
    #[serde(default)]
    pub attribute: u32,
}

impl PlayInfo {
    /// Decoded capability bits of `attribute`
    pub fn attributes(&self) -> PlaybackAttributes {
        PlaybackAttributes(self.attribute)
    }

    /// Absolute album art URL on `host`, or the built-in default icon
    pub fn album_art_url(&self, host: &str) -> String {
        if self.albumart_url.is_empty() {
            format!("http://{}{}", host, DEFAULT_ALBUM_ART_PATH)
        } else if self.albumart_url.starts_with('/') {
            format!("http://{}{}", host, self.albumart_url)
        } else {
            format!("http://{}/{}", host, self.albumart_url)
        }
    }
}

/// Playback capability bit field of [`PlayInfo::attribute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackAttributes(pub u32);

impl PlaybackAttributes {
    /// Bit flags as reported by the receiver
    pub const PLAYABLE: u32 = 1 << 0;
    pub const STOP: u32 = 1 << 1;
    pub const PAUSE: u32 = 1 << 2;
    pub const PREV_SKIP: u32 = 1 << 3;
    pub const NEXT_SKIP: u32 = 1 << 4;
    pub const FAST_REVERSE: u32 = 1 << 5;
    pub const FAST_FORWARD: u32 = 1 << 6;
    pub const REPEAT: u32 = 1 << 7;
    pub const SHUFFLE: u32 = 1 << 8;

    /// Whether every bit of `flag` is set
    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Whether the source can be played at all
    pub fn is_playable(&self) -> bool {
        self.contains(Self::PLAYABLE)
    }

    /// Whether stop is supported
    pub fn can_stop(&self) -> bool {
        self.contains(Self::STOP)
    }

    /// Whether pause is supported
    pub fn can_pause(&self) -> bool {
        self.contains(Self::PAUSE)
    }

    /// Whether both previous and next skip are supported
    pub fn can_skip(&self) -> bool {
        self.contains(Self::PREV_SKIP | Self::NEXT_SKIP)
    }
}

/// Acknowledgement of an event subscription
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscribeAck {
    #[serde(default)]
    pub response_code: i64,
}

/// Acknowledgement of a setter call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub response_code: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_percent_scenario() {
        assert_eq!(volume_to_percent(40, Some(80)).unwrap(), 50);
        assert_eq!(volume_to_percent(60, Some(80)).unwrap(), 75);
        assert_eq!(percent_to_volume(50, Some(80)).unwrap(), 40);
    }

    #[test]
    fn test_zero_or_missing_max_volume_is_error() {
        assert!(matches!(
            volume_to_percent(10, Some(0)),
            Err(MusicCastError::InvalidMaxVolume)
        ));
        assert!(matches!(
            volume_to_percent(10, None),
            Err(MusicCastError::InvalidMaxVolume)
        ));
        assert!(matches!(
            percent_to_volume(10, Some(0)),
            Err(MusicCastError::InvalidMaxVolume)
        ));
    }

    #[test]
    fn test_percent_stays_in_range() {
        for max in [1, 7, 80, 161, 200] {
            for volume in 0..=max {
                let percent = volume_to_percent(volume, Some(max)).unwrap();
                assert!(percent <= 100);
                let back = percent_to_volume(percent, Some(max)).unwrap();
                // one percent step is at most max/100 device units wide
                assert!((back - volume).abs() <= max / 100 + 1, "{} -> {} -> {}", volume, percent, back);
            }
        }
    }

    #[test]
    fn test_zone_parse() {
        assert_eq!("zone3".parse::<Zone>().unwrap(), Zone::Zone3);
        assert!("kitchen".parse::<Zone>().is_err());
        assert_eq!(Zone::default().to_string(), "main");
    }

    #[test]
    fn test_status_decodes_secondary_fields() {
        let status: ZoneStatus = serde_json::from_str(
            r#"{"response_code":0,"power":"standby","volume":33,"mute":true,"max_volume":161,
                "input":"net_radio","sound_program":"straight","link_control":"standard","extra":1}"#,
        )
        .unwrap();
        assert_eq!(status.power, Power::Standby);
        assert!(status.mute);
        assert_eq!(status.sound_program.as_deref(), Some("straight"));
        assert_eq!(status.volume_percent().unwrap(), 20);
    }

    #[test]
    fn test_album_art_url_fallback() {
        let mut info = PlayInfo::default();
        assert_eq!(
            info.album_art_url("192.168.1.50"),
            "http://192.168.1.50:49154/Icons/120x120.jpg"
        );
        info.albumart_url = "/YamahaRemoteControl/AlbumART/AlbumART.jpg".to_string();
        assert_eq!(
            info.album_art_url("192.168.1.50"),
            "http://192.168.1.50/YamahaRemoteControl/AlbumART/AlbumART.jpg"
        );
    }

    #[test]
    fn test_playback_state_and_attributes() {
        let info: PlayInfo =
            serde_json::from_str(r#"{"playback":"fast_forward","attribute":31}"#).unwrap();
        assert_eq!(info.playback, PlaybackState::FastForward);
        let attributes = info.attributes();
        assert!(attributes.is_playable());
        assert!(attributes.can_pause());
        assert!(attributes.can_skip());
        assert!(!attributes.contains(PlaybackAttributes::SHUFFLE));

        let odd: PlayInfo = serde_json::from_str(r#"{"playback":"seeking"}"#).unwrap();
        assert_eq!(odd.playback, PlaybackState::Unknown);
    }

    #[test]
    fn test_known_inputs() {
        assert!(is_known_input("spotify"));
        assert!(!is_known_input("gramophone"));
    }
}
