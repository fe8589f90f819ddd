//! Routing of push events to device sessions
//!
//! Datagrams carry no session or zone identifier, so the source IP is the
//! only correlation key. A packet from a host no session is registered for
//! is dropped.

use crate::session::DeviceSession;
use crate::types::SessionId;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of live sessions, shared by the sessions' owner and the event receiver
#[derive(Default)]
pub struct EventMediator {
    sessions: RwLock<HashMap<SessionId, Arc<DeviceSession>>>,
}

impl EventMediator {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for event delivery
    ///
    /// Registering the same session twice has no further effect.
    pub async fn register(&self, session: Arc<DeviceSession>) {
        let mut sessions = self.sessions.write().await;
        if sessions.insert(session.id(), session.clone()).is_none() {
            tracing::debug!("Registered session {} for {}", session.id(), session.host());
        }
    }

    /// Remove a session; unknown ids are ignored
    pub async fn unregister(&self, id: SessionId) -> Option<Arc<DeviceSession>> {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(session) = &removed {
            tracing::debug!("Unregistered session {} for {}", id, session.host());
        }
        removed
    }

    /// Session registered under `id`
    pub async fn get(&self, id: SessionId) -> Option<Arc<DeviceSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// All registered sessions, in no particular order
    pub async fn sessions(&self) -> Vec<Arc<DeviceSession>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Sessions whose configured host is exactly `host`
    ///
    /// Host names are not resolved; a session configured by DNS name never
    /// matches a source IP.
    pub async fn find_by_host(&self, host: &str) -> Vec<Arc<DeviceSession>> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|session| session.host() == host)
            .cloned()
            .collect()
    }

    /// Deliver a datagram from `source` to the matching session
    ///
    /// Returns `false` if no session is registered for the source address.
    /// Errors from the session are logged and never propagate to the caller.
    pub async fn dispatch(&self, source: IpAddr, payload: &str) -> bool {
        let host = source.to_canonical().to_string();
        let targets = self.find_by_host(&host).await;
        if targets.is_empty() {
            tracing::trace!("Dropping event from unregistered host {}", host);
            return false;
        }

        for session in targets {
            match session.handle_event(payload).await {
                Ok(changed) => {
                    tracing::debug!("Event from {} changed {:?}", host, changed);
                }
                Err(e) => {
                    tracing::warn!("Failed to handle event from {}: {}", host, e);
                }
            }
        }
        true
    }
}
