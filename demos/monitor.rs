//! Print the state of a MusicCast receiver and every change to it
//!
//! ```text
//! RUST_LOG=yamaha_musiccast=debug cargo run --example monitor -- 192.168.1.50 [zone]
//! ```

use yamaha_musiccast::{
    Channel, DeviceSession, MusicCast, MusicCastError, SessionConfig, SessionUpdate, Zone,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(host) = args.next() else {
        eprintln!("usage: monitor <host> [main|zone2|zone3|zone4]");
        std::process::exit(2);
    };
    let zone: Zone = match args.next() {
        Some(zone) => zone.parse()?,
        None => Zone::Main,
    };

    let musiccast = MusicCast::new();
    let session = musiccast
        .add_session(SessionConfig::new(host).with_zone(zone))
        .await?;
    let mut updates = session.subscribe_updates();

    match musiccast.event_listener_addr().await {
        Some(addr) => println!("Listening for push events on {}", addr),
        None => println!("Push events unavailable, polling only"),
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(SessionUpdate::ChannelsChanged(_, channels)) => print_channels(&session, &channels),
                Ok(SessionUpdate::Online(_)) => {
                    if let Some(info) = session.device_info() {
                        println!("Online: {} ({})", info.model_name, info.device_id);
                    }
                    print_channels(&session, &Channel::ALL);
                }
                Ok(SessionUpdate::Offline(_, reason)) => println!("Offline: {}", reason),
                Err(MusicCastError::ChannelError(e)) => eprintln!("{}", e),
                Err(e) => {
                    eprintln!("{}", e);
                    break;
                }
            },
        }
    }

    musiccast.shutdown().await;
    Ok(())
}

fn print_channels(session: &DeviceSession, channels: &[Channel]) {
    for channel in channels {
        if let Some(state) = session.channel_state(*channel) {
            println!("  {:<14} {:?}", channel.as_str(), state);
        }
    }
}
