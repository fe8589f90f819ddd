use crate::config::{ListenerConfig, SessionConfig};
use crate::error::Result;
use crate::mediator::EventMediator;
use crate::receiver::EventReceiver;
use crate::session::DeviceSession;
use crate::types::SessionId;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry point for controlling MusicCast receivers
///
/// `MusicCast` owns the event mediator and the one UDP event receiver shared
/// by all sessions. The receiver is started with the first session and
/// restarted by a later `add_session` if its task has ended.
///
/// # Example
///
/// ```no_run
/// use yamaha_musiccast::{MusicCast, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let musiccast = MusicCast::new();
///     let session = musiccast.add_session(SessionConfig::new("192.168.1.50")).await?;
///
///     let mut updates = session.subscribe_updates();
///     while let Ok(update) = updates.recv().await {
///         println!("{:?}", update);
///     }
///
///     musiccast.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct MusicCast {
    listener_config: ListenerConfig,
    mediator: Arc<EventMediator>,
    receiver: Mutex<Option<EventReceiver>>,
}

impl MusicCast {
    /// Create a facade listening for events on the default port 41100
    pub fn new() -> Self {
        Self::with_listener(ListenerConfig::default())
    }

    /// Create a facade with a custom event listener configuration
    ///
    /// The listener is only bound once the first session is added.
    pub fn with_listener(listener_config: ListenerConfig) -> Self {
        Self {
            listener_config,
            mediator: Arc::new(EventMediator::new()),
            receiver: Mutex::new(None),
        }
    }

    /// Registry that routes push events to sessions
    pub fn mediator(&self) -> &Arc<EventMediator> {
        &self.mediator
    }

    /// Create a session for a receiver and start polling it
    ///
    /// If the event port can't be bound the session still works, but only
    /// through polling; the failure is logged and binding is retried with
    /// the next session.
    pub async fn add_session(&self, config: SessionConfig) -> Result<Arc<DeviceSession>> {
        config.validate()?;
        let event_port = self
            .ensure_receiver()
            .await
            .map(|addr| addr.port())
            .unwrap_or(self.listener_config.port);

        let session = Arc::new(DeviceSession::new(config, event_port)?);
        self.mediator.register(session.clone()).await;
        session.start_polling();

        tracing::info!(
            "Added session {} for {} ({})",
            session.id(),
            session.address(),
            session.zone()
        );
        Ok(session)
    }

    /// Dispose a session and stop routing events to it
    pub async fn remove_session(&self, id: SessionId) -> bool {
        match self.mediator.unregister(id).await {
            Some(session) => {
                session.dispose();
                true
            }
            None => false,
        }
    }

    /// Look up a session by id
    pub async fn session(&self, id: SessionId) -> Option<Arc<DeviceSession>> {
        self.mediator.get(id).await
    }

    /// All sessions currently registered
    pub async fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.mediator.sessions().await
    }

    /// Bound address of the event receiver, if it is running
    pub async fn event_listener_addr(&self) -> Option<SocketAddr> {
        self.receiver
            .lock()
            .await
            .as_ref()
            .filter(|receiver| receiver.is_running())
            .map(EventReceiver::local_addr)
    }

    /// Dispose every session and stop the event receiver
    pub async fn shutdown(&self) {
        for session in self.mediator.sessions().await {
            self.mediator.unregister(session.id()).await;
            session.dispose();
        }
        if let Some(mut receiver) = self.receiver.lock().await.take() {
            receiver.shutdown().await;
        }
    }

    async fn ensure_receiver(&self) -> Option<SocketAddr> {
        let mut receiver = self.receiver.lock().await;
        if let Some(running) = receiver.as_ref().filter(|r| r.is_running()) {
            return Some(running.local_addr());
        }

        match EventReceiver::bind(&self.listener_config, self.mediator.clone()).await {
            Ok(started) => {
                let addr = started.local_addr();
                *receiver = Some(started);
                Some(addr)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to bind event receiver on {}: {}",
                    self.listener_config.socket_addr(),
                    e
                );
                None
            }
        }
    }
}

impl Default for MusicCast {
    fn default() -> Self {
        Self::new()
    }
}
