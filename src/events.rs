//! Push-event payloads
//!
//! Receivers send sparse JSON datagrams. Every key is optional and most
//! `*_updated` flags only mean "fetch the real value again". Zone power,
//! input, volume and mute are the exception: they arrive inline.

use crate::error::{MusicCastError, Result};
use crate::types::{Power, Zone};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `system` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemEvent {
    pub bluetooth_info_updated: bool,
    pub func_status_updated: bool,
    pub speaker_settings_updated: bool,
    pub name_text_updated: bool,
    pub tag_updated: bool,
    pub location_info_updated: bool,
    pub stereo_pair_info_updated: bool,
}

/// One zone sub-object (`main`, `zone2`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneEvent {
    pub power: Option<Power>,
    pub input: Option<String>,
    pub volume: Option<i32>,
    pub mute: Option<bool>,
    pub status_updated: bool,
    pub signal_info_updated: bool,
}

impl ZoneEvent {
    /// Whether any field carries a value that can be applied without a fetch
    pub fn has_inline_values(&self) -> bool {
        self.power.is_some() || self.input.is_some() || self.volume.is_some() || self.mute.is_some()
    }
}

/// `netusb` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetUsbEvent {
    pub play_error: Option<i32>,
    pub multiple_play_errors: Option<i32>,
    pub play_message: Option<String>,
    pub account_updated: bool,
    /// Elapsed seconds of the current track
    pub play_time: Option<i32>,
    pub preset_info_updated: bool,
    pub recent_info_updated: bool,
    pub play_info_updated: bool,
    pub list_info_updated: bool,
}

/// `tuner` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerEvent {
    pub play_info_updated: bool,
    pub preset_info_updated: bool,
}

/// `cd` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdEvent {
    pub device_status: Option<String>,
    pub play_time: Option<i32>,
    pub play_info_updated: bool,
}

/// `clock` sub-object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockEvent {
    pub settings_updated: bool,
}

/// `dist` sub-object (MusicCast link distribution)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistEvent {
    pub dist_info_updated: bool,
}

/// A decoded push-event datagram
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPayload {
    pub device_id: Option<String>,
    pub system: Option<SystemEvent>,
    pub netusb: Option<NetUsbEvent>,
    pub tuner: Option<TunerEvent>,
    pub cd: Option<CdEvent>,
    pub clock: Option<ClockEvent>,
    pub dist: Option<DistEvent>,
    pub zones: Vec<(Zone, ZoneEvent)>,
}

impl EventPayload {
    /// Decode a datagram
    ///
    /// Only a body that is not a JSON object is an error. A sub-object that
    /// fails to decode is logged and treated as absent, so one bad field
    /// never hides the rest of the packet.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(MusicCastError::InvalidResponse(
                "Event payload is not a JSON object".to_string(),
            ));
        };

        let zones = Zone::ALL
            .into_iter()
            .filter_map(|zone| section::<ZoneEvent>(&mut object, zone.as_str()).map(|e| (zone, e)))
            .collect();

        Ok(Self {
            device_id: object
                .remove("device_id")
                .and_then(|v| v.as_str().map(str::to_string)),
            system: section(&mut object, "system"),
            netusb: section(&mut object, "netusb"),
            tuner: section(&mut object, "tuner"),
            cd: section(&mut object, "cd"),
            clock: section(&mut object, "clock"),
            dist: section(&mut object, "dist"),
            zones,
        })
    }

    /// The event for `zone`, if the payload carries one
    pub fn zone(&self, zone: Zone) -> Option<&ZoneEvent> {
        self.zones
            .iter()
            .find(|(z, _)| *z == zone)
            .map(|(_, event)| event)
    }

    /// Whether the datagram carried no known section
    pub fn is_empty(&self) -> bool {
        self.system.is_none()
            && self.netusb.is_none()
            && self.tuner.is_none()
            && self.cd.is_none()
            && self.clock.is_none()
            && self.dist.is_none()
            && self.zones.is_empty()
    }
}

fn section<T: DeserializeOwned>(object: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = object.remove(key)?;
    match serde_json::from_value(value) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!("Ignoring malformed '{}' event section: {}", key, e);
            None
        }
    }
}
