use crate::channel::Channel;
use crate::error::{MusicCastError, Result};
use crate::types::SessionId;
use tokio::sync::broadcast;

/// Change notification from a device session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Cached state behind these channels changed
    ChannelsChanged(SessionId, Vec<Channel>),

    /// A poll succeeded after the session was offline or uninitialized
    Online(SessionId),

    /// A poll failed; the reason is the error message
    Offline(SessionId, String),
}

impl SessionUpdate {
    /// Session the update belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionUpdate::ChannelsChanged(id, _)
            | SessionUpdate::Online(id)
            | SessionUpdate::Offline(id, _) => *id,
        }
    }
}

/// Receiver for session updates
pub struct UpdateReceiver {
    rx: broadcast::Receiver<SessionUpdate>,
}

impl UpdateReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<SessionUpdate>) -> Self {
        Self { rx }
    }

    /// Receive the next update
    ///
    /// Fails with [`MusicCastError::SessionDisposed`] once the session is gone.
    pub async fn recv(&mut self) -> Result<SessionUpdate> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => MusicCastError::SessionDisposed,
            broadcast::error::RecvError::Lagged(n) => {
                MusicCastError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an update without blocking
    ///
    /// Returns `None` if no update is available.
    pub fn try_recv(&mut self) -> Result<Option<SessionUpdate>> {
        match self.rx.try_recv() {
            Ok(update) => Ok(Some(update)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(MusicCastError::SessionDisposed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(MusicCastError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
