use crate::channel::{Channel, ChannelState, Command};
use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::error::{MusicCastError, Result};
use crate::events::{EventPayload, ZoneEvent};
use crate::requests::{
    EventRequest, NetUsbRequest, PlaybackCommand, SystemRequest, VolumeCommand, ZoneRequest,
};
use crate::subscription::{SessionUpdate, UpdateReceiver};
use crate::types::{DeviceInfo, PlayInfo, ReceiverAddress, SessionId, Zone, ZoneStatus};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of a [`DeviceSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// No refresh has succeeded yet
    #[default]
    Uninitialized,
    /// At least one refresh succeeded; cached state is available
    Active,
    /// Polling stopped; no further requests are issued
    Disposed,
}

/// Cached receiver state of one session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    /// Selected zone
    pub zone: Zone,
    pub device_info: Option<DeviceInfo>,
    /// Status of the selected zone
    pub zone_status: Option<ZoneStatus>,
    pub play_info: Option<PlayInfo>,
    /// Result of the last poll; `None` until the first one finished
    pub online: Option<bool>,
}

/// Narrow control surface of a receiver zone
///
/// Features built on top of a session (streaming sinks, scenes) depend on
/// this trait instead of the session type.
#[async_trait]
pub trait ZoneControl: Send + Sync {
    /// Fetch the current status of the selected zone from the receiver
    async fn get_status(&self) -> Result<ZoneStatus>;
    /// Switch the zone on or to standby
    async fn set_power(&self, on: bool) -> Result<()>;
    /// Change the volume, absolutely or by one step
    async fn set_volume(&self, volume: VolumeCommand) -> Result<()>;
    /// Mute or unmute the zone
    async fn set_mute(&self, mute: bool) -> Result<()>;
    /// Select the input of the zone
    async fn set_input(&self, input: &str) -> Result<()>;
    /// Send a transport command to the net/USB source
    async fn set_playback(&self, command: PlaybackCommand) -> Result<()>;
}

/// One configured receiver/zone binding
///
/// Holds the cached device info, zone status and play info, and updates
/// them from two independent triggers: the polling task driving
/// [`refresh`](Self::refresh) and push events delivered to
/// [`handle_event`](Self::handle_event). Polling stays the source of truth;
/// push events only shorten the delay until a change shows up.
pub struct DeviceSession {
    id: SessionId,
    config: SessionConfig,
    address: ReceiverAddress,
    connection: Arc<Connection>,
    zone_api: ZoneRequest,
    system_api: SystemRequest,
    netusb_api: NetUsbRequest,
    event_api: EventRequest,
    state: Mutex<SessionState>,
    refresh_lock: tokio::sync::Mutex<()>,
    updates: broadcast::Sender<SessionUpdate>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    /// Create a session; push events will be requested on `event_port`
    pub fn new(config: SessionConfig, event_port: u16) -> Result<Self> {
        config.validate()?;
        let address = config.address();
        let connection = Arc::new(Connection::with_timeout(
            address.clone(),
            config.request_timeout(),
        )?);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Ok(Self {
            id: Uuid::new_v4(),
            address,
            zone_api: ZoneRequest::new(connection.clone()),
            system_api: SystemRequest::new(connection.clone()),
            netusb_api: NetUsbRequest::new(connection.clone()),
            event_api: EventRequest::new(connection.clone(), event_port),
            connection,
            state: Mutex::new(SessionState {
                zone: config.zone,
                ..SessionState::default()
            }),
            config,
            refresh_lock: tokio::sync::Mutex::new(()),
            updates,
            poll_task: Mutex::new(None),
        })
    }

    /// Unique id of this session
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration the session was created with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// HTTP address of the receiver
    pub fn address(&self) -> &ReceiverAddress {
        &self.address
    }

    /// Host push events are correlated by
    pub fn host(&self) -> &str {
        &self.address.host
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    /// Whether [`dispose`](Self::dispose) was called
    pub fn is_disposed(&self) -> bool {
        self.status() == SessionStatus::Disposed
    }

    /// Whether the last poll succeeded; `None` before the first poll finished
    pub fn is_online(&self) -> Option<bool> {
        self.lock().online
    }

    /// Zone currently selected
    pub fn zone(&self) -> Zone {
        self.lock().zone
    }

    /// Cached device info, fetched once per session
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.lock().device_info.clone()
    }

    /// Cached status of the selected zone
    pub fn zone_status(&self) -> Option<ZoneStatus> {
        self.lock().zone_status.clone()
    }

    /// Cached net/USB play info
    pub fn play_info(&self) -> Option<PlayInfo> {
        self.lock().play_info.clone()
    }

    /// Consistent copy of the whole cached state
    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// Subscribe to change notifications of this session
    pub fn subscribe_updates(&self) -> UpdateReceiver {
        UpdateReceiver::new(self.updates.subscribe())
    }

    /// Poll the receiver once
    ///
    /// Fetches device info (only while none is cached), the selected zone's
    /// status and play info, then renews the event subscription. The first
    /// failure aborts the remaining steps; whatever was fetched before it is
    /// kept. Returns the channels whose cached value changed.
    pub async fn refresh(&self) -> Result<Vec<Channel>> {
        let _guard = self.refresh_lock.lock().await;
        if self.is_disposed() {
            return Err(MusicCastError::SessionDisposed);
        }

        let mut changed = Vec::new();
        let result = self.refresh_steps(&mut changed).await;
        self.notify(&changed);
        self.record_health(&result);
        result.map(|()| changed)
    }

    async fn refresh_steps(&self, changed: &mut Vec<Channel>) -> Result<()> {
        if self.lock().device_info.is_none() {
            let info = self.system_api.get_device_info().await?;
            tracing::info!(
                "Connected to {} ({}), API version {}",
                info.model_name,
                self.address,
                info.api_version
            );
            self.update(|state| state.device_info = Some(info))?;
        }

        let zone = self.zone();
        let status = self.zone_api.get_status(zone).await?;
        changed.extend(self.store_status(zone, status)?);

        let info = self.netusb_api.get_play_info().await?;
        changed.extend(self.store_play_info(info)?);

        self.event_api.subscribe_to_events().await?;

        self.update(|state| state.status = SessionStatus::Active)
    }

    fn record_health(&self, result: &Result<()>) {
        let update = {
            let mut state = self.lock();
            match result {
                Ok(_) if state.online != Some(true) => {
                    state.online = Some(true);
                    Some(SessionUpdate::Online(self.id))
                }
                Err(MusicCastError::SessionDisposed) => None,
                Err(e) if state.online != Some(false) => {
                    state.online = Some(false);
                    Some(SessionUpdate::Offline(self.id, e.to_string()))
                }
                _ => None,
            }
        };
        if let Some(update) = update {
            tracing::info!("Receiver {} is now {:?}", self.address, update);
            let _ = self.updates.send(update);
        }
    }

    /// Apply a push-event datagram addressed to this receiver
    ///
    /// Inline zone values are written to the cached status of the selected
    /// zone. `status_updated` and netusb `play_info_updated` trigger a fetch
    /// of the corresponding state. Returns the channels that changed.
    pub async fn handle_event(&self, text: &str) -> Result<Vec<Channel>> {
        if self.is_disposed() {
            return Err(MusicCastError::SessionDisposed);
        }
        let payload = EventPayload::parse(text)?;
        tracing::trace!("Event for {}: {:?}", self.address, payload);

        let zone = self.zone();
        let mut changed = Vec::new();
        let mut refetch_status = false;

        for (event_zone, event) in &payload.zones {
            if *event_zone != zone {
                tracing::trace!("Ignoring event for unselected zone {}", event_zone);
                continue;
            }
            changed.extend(self.apply_zone_event(event)?);
            refetch_status |= event.status_updated;
        }

        if let Some(system) = &payload.system {
            tracing::debug!("System event from {}: {:?}", self.address, system);
        }
        if let Some(tuner) = &payload.tuner {
            tracing::debug!("Tuner event from {}: {:?}", self.address, tuner);
        }
        if let Some(cd) = &payload.cd {
            tracing::debug!("CD event from {}: {:?}", self.address, cd);
        }
        if let Some(clock) = &payload.clock {
            tracing::debug!("Clock event from {}: {:?}", self.address, clock);
        }
        if let Some(dist) = &payload.dist {
            tracing::debug!("Distribution event from {}: {:?}", self.address, dist);
        }

        if refetch_status {
            let status = self.zone_api.get_status(zone).await?;
            changed.extend(self.store_status(zone, status)?);
        }

        if let Some(netusb) = &payload.netusb {
            if let Some(play_time) = netusb.play_time {
                self.update(|state| {
                    if let Some(info) = state.play_info.as_mut() {
                        info.play_time = Some(play_time);
                    }
                })?;
            }
            if let Some(message) = &netusb.play_message {
                tracing::info!("Receiver {} says: {}", self.address, message);
            }
            if netusb.play_info_updated {
                let info = self.netusb_api.get_play_info().await?;
                self.store_play_info(info)?;
                for channel in Channel::PLAY_INFO {
                    if !changed.contains(&channel) {
                        changed.push(channel);
                    }
                }
            }
        }

        self.notify(&changed);
        Ok(changed)
    }

    fn apply_zone_event(&self, event: &ZoneEvent) -> Result<Vec<Channel>> {
        self.update(|state| {
            let Some(status) = state.zone_status.as_mut() else {
                if event.has_inline_values() {
                    tracing::debug!("Zone event before first status fetch, waiting for next poll");
                }
                return Vec::new();
            };

            let mut changed = Vec::new();
            if let Some(power) = event.power {
                status.power = power;
                changed.push(Channel::Power);
            }
            if let Some(volume) = event.volume {
                status.volume = volume;
                changed.push(Channel::Volume);
            }
            if let Some(mute) = event.mute {
                status.mute = mute;
                changed.push(Channel::Mute);
            }
            if let Some(input) = &event.input {
                status.input = input.clone();
                changed.push(Channel::Input);
            }
            changed
        })
    }

    /// Execute a command from the host framework
    pub async fn handle_command(&self, command: Command) -> Result<()> {
        if self.is_disposed() {
            return Err(MusicCastError::SessionDisposed);
        }
        tracing::debug!("Command for {}: {:?}", self.address, command);

        match command {
            Command::SelectZone(zone) => {
                let previous = self.update(|state| {
                    let previous = state.zone;
                    if previous != zone {
                        state.zone = zone;
                        state.zone_status = None;
                    }
                    previous
                })?;
                if previous != zone {
                    self.notify(&[Channel::Zone]);
                    self.refresh().await?;
                }
                Ok(())
            }
            Command::Power(on) => self.set_power(on).await,
            Command::Mute(mute) => self.set_mute(mute).await,
            Command::Input(input) => self.set_input(&input).await,
            Command::Volume(volume) => self.set_volume(volume).await,
            Command::Playback(playback) => self.set_playback(playback).await,
            Command::Refresh => self.refresh().await.map(|_| ()),
        }
    }

    /// Cached value of every channel that currently has one
    pub fn channel_states(&self) -> Vec<(Channel, ChannelState)> {
        let state = self.lock();
        Channel::ALL
            .into_iter()
            .filter_map(|channel| {
                channel_state(&state, channel, &self.address.host).map(|value| (channel, value))
            })
            .collect()
    }

    /// Cached value of one channel
    pub fn channel_state(&self, channel: Channel) -> Option<ChannelState> {
        channel_state(&self.lock(), channel, &self.address.host)
    }

    /// Absolute album art URL of the current track
    pub fn album_art_url(&self) -> Option<String> {
        self.lock()
            .play_info
            .as_ref()
            .map(|info| info.album_art_url(&self.address.host))
    }

    /// Download the album art of the current track
    pub async fn fetch_album_art(&self) -> Result<Vec<u8>> {
        let url = self
            .album_art_url()
            .unwrap_or_else(|| PlayInfo::default().album_art_url(&self.address.host));
        self.connection.fetch_bytes(&url).await
    }

    /// Start the background polling task
    ///
    /// The first poll runs immediately, later ones after the configured
    /// interval. The task holds only a weak reference and ends once the
    /// session is disposed or dropped.
    pub fn start_polling(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let interval = self.config.refresh_interval();
        let address = self.address.clone();

        let handle = tokio::spawn(async move {
            tracing::debug!("Polling {} every {:?}", address, interval);
            loop {
                let Some(session) = weak.upgrade() else { break };
                if session.is_disposed() {
                    break;
                }
                if let Err(e) = session.refresh().await {
                    tracing::warn!("Refresh of {} failed: {}", address, e);
                }
                drop(session);
                tokio::time::sleep(interval).await;
            }
            tracing::debug!("Polling of {} stopped", address);
        });

        let previous = self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop polling and reject further requests
    ///
    /// A refresh already in flight may finish its current request, but its
    /// result is discarded and no new one starts.
    pub fn dispose(&self) {
        self.lock().status = SessionStatus::Disposed;
        let task = self
            .poll_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
        tracing::debug!("Session for {} disposed", self.address);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the cached state under the session lock unless disposed
    fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Result<R> {
        let mut state = self.lock();
        if state.status == SessionStatus::Disposed {
            return Err(MusicCastError::SessionDisposed);
        }
        Ok(f(&mut state))
    }

    /// Replace the cached status unless it lacks a usable `max_volume`
    fn store_status(&self, zone: Zone, status: ZoneStatus) -> Result<Vec<Channel>> {
        if let Err(e) = status.volume_percent() {
            tracing::warn!("Rejecting status of zone {} from {}: {}", zone, self.address, e);
            return Err(e);
        }
        self.update(|state| {
            if state.zone != zone {
                tracing::debug!("Discarding status of {}, zone changed meanwhile", zone);
                return Vec::new();
            }
            let changed = status_changes(state.zone_status.as_ref(), &status);
            state.zone_status = Some(status);
            changed
        })
    }

    #[cfg(test)]
    pub(crate) fn seed_status(&self, status: ZoneStatus) {
        self.lock().zone_status = Some(status);
    }

    fn store_play_info(&self, info: PlayInfo) -> Result<Vec<Channel>> {
        self.update(|state| {
            let changed = play_info_changes(state.play_info.as_ref(), &info);
            state.play_info = Some(info);
            changed
        })
    }

    fn notify(&self, changed: &[Channel]) {
        if !changed.is_empty() {
            let _ = self
                .updates
                .send(SessionUpdate::ChannelsChanged(self.id, changed.to_vec()));
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        let task = self
            .poll_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[async_trait]
impl ZoneControl for DeviceSession {
    async fn get_status(&self) -> Result<ZoneStatus> {
        self.zone_api.get_status(self.zone()).await
    }

    async fn set_power(&self, on: bool) -> Result<()> {
        self.zone_api.set_power(self.zone(), on).await
    }

    /// Absolute levels are converted with the cached `max_volume`
    async fn set_volume(&self, volume: VolumeCommand) -> Result<()> {
        let (zone, max_volume) = {
            let state = self.lock();
            (state.zone, state.zone_status.as_ref().map(|s| s.max_volume))
        };
        let max_volume = match (volume, max_volume) {
            (VolumeCommand::Percent(_), None) => return Err(MusicCastError::StatusUnavailable),
            (_, max_volume) => max_volume.flatten(),
        };
        self.zone_api.set_volume(zone, volume, max_volume).await
    }

    async fn set_mute(&self, mute: bool) -> Result<()> {
        self.zone_api.set_mute(self.zone(), mute).await
    }

    async fn set_input(&self, input: &str) -> Result<()> {
        self.zone_api.set_input(self.zone(), input).await
    }

    async fn set_playback(&self, command: PlaybackCommand) -> Result<()> {
        self.netusb_api.set_playback(command).await
    }
}

fn channel_state(state: &SessionState, channel: Channel, host: &str) -> Option<ChannelState> {
    let status = state.zone_status.as_ref();
    let info = state.play_info.as_ref();
    match channel {
        Channel::Zone => Some(ChannelState::Text(state.zone.to_string())),
        Channel::Power => status.map(|s| ChannelState::OnOff(s.power.is_on())),
        Channel::Volume => status
            .and_then(|s| s.volume_percent().ok())
            .map(ChannelState::Percent),
        Channel::Mute => status.map(|s| ChannelState::OnOff(s.mute)),
        Channel::Input => status.map(|s| ChannelState::Text(s.input.clone())),
        Channel::Playback => info.map(|i| ChannelState::Text(i.playback.as_str().to_string())),
        Channel::Artist => info.map(|i| ChannelState::Text(i.artist.clone())),
        Channel::Album => info.map(|i| ChannelState::Text(i.album.clone())),
        Channel::Track => info.map(|i| ChannelState::Text(i.track.clone())),
        Channel::AlbumArtUrl => info.map(|i| ChannelState::Text(i.album_art_url(host))),
    }
}

fn status_changes(old: Option<&ZoneStatus>, new: &ZoneStatus) -> Vec<Channel> {
    let Some(old) = old else {
        return Channel::ZONE_STATUS.to_vec();
    };
    let mut changed = Vec::new();
    if old.power != new.power {
        changed.push(Channel::Power);
    }
    if old.volume != new.volume || old.max_volume != new.max_volume {
        changed.push(Channel::Volume);
    }
    if old.mute != new.mute {
        changed.push(Channel::Mute);
    }
    if old.input != new.input {
        changed.push(Channel::Input);
    }
    changed
}

fn play_info_changes(old: Option<&PlayInfo>, new: &PlayInfo) -> Vec<Channel> {
    let Some(old) = old else {
        return Channel::PLAY_INFO.to_vec();
    };
    let mut changed = Vec::new();
    if old.playback != new.playback {
        changed.push(Channel::Playback);
    }
    if old.artist != new.artist {
        changed.push(Channel::Artist);
    }
    if old.album != new.album {
        changed.push(Channel::Album);
    }
    if old.track != new.track {
        changed.push(Channel::Track);
    }
    if old.albumart_url != new.albumart_url {
        changed.push(Channel::AlbumArtUrl);
    }
    changed
}
