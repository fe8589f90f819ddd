//! Shared fixtures for integration tests
//!
//! A `mockito` server stands in for the receiver's HTTP control API.

#![allow(dead_code)]

use mockito::{Matcher, Mock, ServerGuard};
use std::time::Duration;
use yamaha_musiccast::SessionConfig;

pub const API: &str = "/YamahaExtendedControl/v2";

pub const DEVICE_INFO: &str = r#"{
    "response_code": 0,
    "model_name": "RX-V681",
    "destination": "BG",
    "device_id": "00A0DEDC44A1",
    "system_version": 1.7,
    "api_version": 1.17,
    "netmodule_version": "1672"
}"#;

pub const STATUS_ON_40_OF_80: &str = r#"{
    "response_code": 0,
    "power": "on",
    "sleep": 0,
    "volume": 40,
    "mute": false,
    "max_volume": 80,
    "input": "net_radio",
    "distribution_enable": true,
    "sound_program": "straight",
    "link_control": "standard",
    "disable_flags": 0
}"#;

pub const PLAY_INFO: &str = r#"{
    "response_code": 0,
    "input": "net_radio",
    "playback": "play",
    "repeat": "off",
    "shuffle": "off",
    "play_time": 12,
    "total_time": 0,
    "artist": "Radio Paradise",
    "album": "",
    "track": "Some Song",
    "albumart_url": "/YamahaRemoteControl/AlbumART/AlbumART3929.jpg",
    "albumart_id": 3929,
    "usb_devicetype": "unknown",
    "attribute": 1
}"#;

pub const OK: &str = r#"{"response_code":0}"#;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Session configuration pointing at the mock server
pub fn config_for(server: &ServerGuard) -> SessionConfig {
    let host_with_port = server.host_with_port();
    let (host, port) = host_with_port
        .rsplit_once(':')
        .expect("mock server address has a port");
    SessionConfig::new(host)
        .with_port(port.parse().expect("numeric port"))
        .with_refresh_interval(3600)
}

/// Mock `path` below the API root to answer 200 with `body`
pub async fn mock_api(server: &mut ServerGuard, path: &str, body: &str) -> Mock {
    server
        .mock("GET", format!("{}{}", API, path).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

/// Mocks for one complete refresh cycle, each expected `times` times
pub struct RefreshMocks {
    pub device_info: Mock,
    pub status: Mock,
    pub play_info: Mock,
    pub subscribe: Mock,
}

pub async fn mock_refresh(server: &mut ServerGuard, status_hits: usize, play_info_hits: usize) -> RefreshMocks {
    let device_info = server
        .mock("GET", format!("{}/system/getDeviceInfo", API).as_str())
        .with_status(200)
        .with_body(DEVICE_INFO)
        .expect(1)
        .create_async()
        .await;
    let status = server
        .mock("GET", format!("{}/main/getStatus", API).as_str())
        .with_status(200)
        .with_body(STATUS_ON_40_OF_80)
        .expect(status_hits)
        .create_async()
        .await;
    let play_info = server
        .mock("GET", format!("{}/netusb/getPlayInfo", API).as_str())
        .with_status(200)
        .with_body(PLAY_INFO)
        .expect(play_info_hits)
        .create_async()
        .await;
    let subscribe = server
        .mock("GET", API)
        .match_header("X-AppName", "MusicCast/2")
        .match_header("X-AppPort", Matcher::Regex(r"^\d+$".to_string()))
        .with_status(200)
        .with_body(OK)
        .create_async()
        .await;

    RefreshMocks {
        device_info,
        status,
        play_info,
        subscribe,
    }
}

/// Poll `condition` every 20ms until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
