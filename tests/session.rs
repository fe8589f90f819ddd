//! Device session tests against a mocked receiver HTTP API

mod helpers;

use helpers::*;
use mockito::{Matcher, Server};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use yamaha_musiccast::{
    Channel, ChannelState, Command, DeviceSession, MusicCastError, PlaybackCommand, Power,
    ResponseCode, SessionConfig, SessionStatus, SessionUpdate, VolumeCommand, Zone, ZoneControl,
};

#[tokio::test]
async fn test_refresh_populates_cache() {
    init_tracing();
    let mut server = Server::new_async().await;
    let mocks = mock_refresh(&mut server, 1, 1).await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    let mut updates = session.subscribe_updates();
    assert_eq!(session.status(), SessionStatus::Uninitialized);

    let changed = session.refresh().await.unwrap();

    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.is_online(), Some(true));
    assert!(changed.contains(&Channel::Volume));
    assert!(changed.contains(&Channel::Track));

    let status = session.zone_status().unwrap();
    assert_eq!(status.power, Power::On);
    assert_eq!(status.sound_program.as_deref(), Some("straight"));
    assert_eq!(
        session.channel_state(Channel::Volume),
        Some(ChannelState::Percent(50))
    );
    assert_eq!(
        session.channel_state(Channel::Power),
        Some(ChannelState::OnOff(true))
    );
    assert_eq!(
        session.channel_state(Channel::Track),
        Some(ChannelState::Text("Some Song".to_string()))
    );
    assert_eq!(
        session.device_info().unwrap().model_name,
        "RX-V681".to_string()
    );

    let host = session.host().to_string();
    assert_eq!(
        session.album_art_url(),
        Some(format!(
            "http://{}/YamahaRemoteControl/AlbumART/AlbumART3929.jpg",
            host
        ))
    );

    assert!(matches!(
        updates.recv().await.unwrap(),
        SessionUpdate::ChannelsChanged(_, _)
    ));
    assert_eq!(
        updates.recv().await.unwrap(),
        SessionUpdate::Online(session.id())
    );

    mocks.device_info.assert_async().await;
    mocks.subscribe.assert_async().await;
}

#[tokio::test]
async fn test_device_info_fetched_once() {
    let mut server = Server::new_async().await;
    let mocks = mock_refresh(&mut server, 2, 2).await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    session.refresh().await.unwrap();
    let changed = session.refresh().await.unwrap();

    // identical answers the second time round
    assert!(changed.is_empty());
    mocks.device_info.assert_async().await;
    mocks.status.assert_async().await;
    mocks.play_info.assert_async().await;
}

#[tokio::test]
async fn test_set_volume_percent_uses_cached_max_volume() {
    let mut server = Server::new_async().await;
    let _mocks = mock_refresh(&mut server, 1, 1).await;
    let set_volume = server
        .mock("GET", format!("{}/main/setVolume", API).as_str())
        .match_query(Matcher::UrlEncoded("volume".into(), "40".into()))
        .with_status(200)
        .with_body(OK)
        .expect(1)
        .create_async()
        .await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    session.refresh().await.unwrap();
    session
        .handle_command(Command::Volume(VolumeCommand::Percent(50)))
        .await
        .unwrap();

    set_volume.assert_async().await;
}

#[tokio::test]
async fn test_relative_volume_and_setters() {
    let mut server = Server::new_async().await;
    let volume_up = server
        .mock("GET", format!("{}/zone2/setVolume", API).as_str())
        .match_query(Matcher::UrlEncoded("volume".into(), "up".into()))
        .with_status(200)
        .with_body(OK)
        .expect(1)
        .create_async()
        .await;
    let power = server
        .mock("GET", format!("{}/zone2/setPower", API).as_str())
        .match_query(Matcher::UrlEncoded("power".into(), "standby".into()))
        .with_status(200)
        .with_body(OK)
        .expect(1)
        .create_async()
        .await;
    let mute = server
        .mock("GET", format!("{}/zone2/setMute", API).as_str())
        .match_query(Matcher::UrlEncoded("enable".into(), "true".into()))
        .with_status(200)
        .with_body(OK)
        .expect(1)
        .create_async()
        .await;
    let pause = server
        .mock("GET", format!("{}/netusb/setPlayback", API).as_str())
        .match_query(Matcher::UrlEncoded("playback".into(), "pause".into()))
        .with_status(200)
        .with_body(OK)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(&server).with_zone(Zone::Zone2);
    let session = DeviceSession::new(config, 41100).unwrap();

    // relative steps need no cached status
    session
        .handle_command(Command::Volume(VolumeCommand::Increase))
        .await
        .unwrap();
    session.handle_command(Command::Power(false)).await.unwrap();
    session.set_mute(true).await.unwrap();
    session
        .handle_command(Command::Playback(PlaybackCommand::Pause))
        .await
        .unwrap();

    volume_up.assert_async().await;
    power.assert_async().await;
    mute.assert_async().await;
    pause.assert_async().await;
}

#[tokio::test]
async fn test_invalid_parameter_response_code() {
    let mut server = Server::new_async().await;
    let _input = server
        .mock("GET", format!("{}/main/setInput", API).as_str())
        .match_query(Matcher::UrlEncoded("input".into(), "hdmi9".into()))
        .with_status(200)
        .with_body(r#"{"response_code":4}"#)
        .create_async()
        .await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    let err = session
        .handle_command(Command::Input("hdmi9".to_string()))
        .await
        .unwrap_err();

    assert_eq!(err.response_code(), Some(ResponseCode::InvalidParameter));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_expired_credentials() {
    let mut server = Server::new_async().await;
    let _info = server
        .mock("GET", format!("{}/system/getDeviceInfo", API).as_str())
        .with_status(401)
        .create_async()
        .await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    let mut updates = session.subscribe_updates();
    let err = session.refresh().await.unwrap_err();

    assert!(matches!(err, MusicCastError::Credentials { status: 401 }));
    assert_eq!(session.status(), SessionStatus::Uninitialized);
    assert_eq!(session.is_online(), Some(false));
    assert!(matches!(
        updates.try_recv().unwrap(),
        Some(SessionUpdate::Offline(_, _))
    ));
}

#[tokio::test]
async fn test_partial_refresh_keeps_earlier_results() {
    let mut server = Server::new_async().await;
    let _info = mock_api(&mut server, "/system/getDeviceInfo", DEVICE_INFO).await;
    let _status = mock_api(&mut server, "/main/getStatus", STATUS_ON_40_OF_80).await;
    let _play_info = server
        .mock("GET", format!("{}/netusb/getPlayInfo", API).as_str())
        .with_status(500)
        .create_async()
        .await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    let err = session.refresh().await.unwrap_err();

    assert!(matches!(err, MusicCastError::UnexpectedStatus(500)));
    assert!(session.device_info().is_some());
    assert_eq!(session.zone_status().unwrap().volume, 40);
    assert!(session.play_info().is_none());
}

#[tokio::test]
async fn test_zero_max_volume_keeps_cached_status() {
    let mut server = Server::new_async().await;
    let mocks = mock_refresh(&mut server, 1, 1).await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    session.refresh().await.unwrap();
    assert_eq!(
        session.channel_state(Channel::Volume),
        Some(ChannelState::Percent(50))
    );

    mocks.status.remove_async().await;
    let _broken = mock_api(
        &mut server,
        "/main/getStatus",
        r#"{"response_code":0,"power":"on","volume":12,"max_volume":0}"#,
    )
    .await;

    let err = session.refresh().await.unwrap_err();

    assert!(matches!(err, MusicCastError::InvalidMaxVolume));
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.is_online(), Some(false));
    let cached = session.zone_status().unwrap();
    assert_eq!(cached.volume, 40);
    assert_eq!(cached.max_volume, Some(80));
    assert_eq!(
        session.channel_state(Channel::Volume),
        Some(ChannelState::Percent(50))
    );

    // same rule when a push event asks for a fresh status
    let err = session
        .handle_event(r#"{"main":{"status_updated":true}}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, MusicCastError::InvalidMaxVolume));
    assert_eq!(session.zone_status().unwrap().max_volume, Some(80));
}

#[tokio::test]
async fn test_select_zone_refetches_status() {
    let mut server = Server::new_async().await;
    let _mocks = mock_refresh(&mut server, 1, 2).await;
    let zone2 = mock_api(
        &mut server,
        "/zone2/getStatus",
        r#"{"response_code":0,"power":"standby","volume":10,"max_volume":100,"mute":true,"input":"tuner"}"#,
    )
    .await;

    let session = DeviceSession::new(config_for(&server), 41100).unwrap();
    session.refresh().await.unwrap();
    session
        .handle_command(Command::SelectZone(Zone::Zone2))
        .await
        .unwrap();

    assert_eq!(session.zone(), Zone::Zone2);
    assert_eq!(
        session.channel_state(Channel::Input),
        Some(ChannelState::Text("tuner".to_string()))
    );
    assert_eq!(
        session.channel_state(Channel::Volume),
        Some(ChannelState::Percent(10))
    );
    zone2.assert_async().await;
}

/// Fake receiver answering canned bodies, or holding every request open
/// once `hang` is set
async fn spawn_fake_receiver(hang: Arc<AtomicBool>) -> SessionConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let hang = hang.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => read += n,
                    }
                }
                if hang.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    return;
                }

                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or_default();
                let body = if path.ends_with("/system/getDeviceInfo") {
                    DEVICE_INFO
                } else if path.ends_with("/main/getStatus") {
                    STATUS_ON_40_OF_80
                } else if path.ends_with("/netusb/getPlayInfo") {
                    PLAY_INFO
                } else {
                    OK
                };
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    SessionConfig::new("127.0.0.1")
        .with_port(port)
        .with_request_timeout(1)
}

#[tokio::test]
async fn test_timeout_keeps_cached_state() {
    let hang = Arc::new(AtomicBool::new(false));
    let config = spawn_fake_receiver(hang.clone()).await;

    let session = DeviceSession::new(config, 41100).unwrap();
    session.refresh().await.unwrap();
    let before = session.zone_status().unwrap();

    hang.store(true, Ordering::SeqCst);
    let err = session.refresh().await.unwrap_err();

    assert!(err.is_transport());
    assert!(err.is_timeout());
    assert!(err.is_transient());
    assert_eq!(session.status(), SessionStatus::Active);
    assert_eq!(session.is_online(), Some(false));

    let after = session.zone_status().unwrap();
    assert_eq!(after.volume, before.volume);
    assert_eq!(after.power, before.power);
    assert_eq!(session.play_info().unwrap().track, "Some Song");
    assert_eq!(
        session.channel_state(Channel::Volume),
        Some(ChannelState::Percent(50))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_and_events_never_tear_status() {
    let mut server = Server::new_async().await;
    let _info = mock_api(&mut server, "/system/getDeviceInfo", DEVICE_INFO).await;
    let _status = mock_api(&mut server, "/main/getStatus", STATUS_ON_40_OF_80).await;
    let _play_info = mock_api(&mut server, "/netusb/getPlayInfo", PLAY_INFO).await;
    let _subscribe = mock_api(&mut server, "", OK).await;

    let session = Arc::new(DeviceSession::new(config_for(&server), 41100).unwrap());
    session.refresh().await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let observer = {
        let session = session.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut seen = 0usize;
            while !done.load(Ordering::SeqCst) {
                let snapshot = session.snapshot();
                let status = snapshot.zone_status.expect("status stays cached");
                match (status.volume, status.mute, status.input.as_str()) {
                    (40, false, "net_radio") | (60, true, "spotify") => {}
                    other => panic!("mixed status {:?}", other),
                }
                assert_eq!(status.max_volume, Some(80));
                seen += 1;
                tokio::task::yield_now().await;
            }
            seen
        })
    };
    let poller = {
        let session = session.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                session.refresh().await.unwrap();
            }
        })
    };
    let pusher = {
        let session = session.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                session
                    .handle_event(r#"{"main":{"volume":60,"mute":true,"input":"spotify"}}"#)
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        })
    };

    poller.await.unwrap();
    pusher.await.unwrap();
    done.store(true, Ordering::SeqCst);
    assert!(observer.await.unwrap() > 0);

    let volume = session.channel_state(Channel::Volume);
    assert!(
        volume == Some(ChannelState::Percent(50)) || volume == Some(ChannelState::Percent(75))
    );
}
