use crate::config::ListenerConfig;
use crate::error::Result;
use crate::mediator::EventMediator;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Largest datagram accepted; longer ones are truncated by the socket
const MAX_DATAGRAM_SIZE: usize = 4096;

/// Extra time granted to the loop on shutdown beyond one receive timeout
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Signals from the owning [`EventReceiver`] to its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Stop,
    Reset,
}

/// UDP listener for receiver push events
///
/// Runs one background task that receives datagrams with a bounded
/// timeout and forwards them to the [`EventMediator`]. If the socket fails
/// it is dropped and bound again on the same port at the top of the next
/// iteration, so the listener survives transient socket errors on its own.
///
/// Datagrams are handled one at a time in arrival order. While a dispatch
/// waits on a refetch (bounded by the session's request timeout) later
/// datagrams queue in the socket buffer, and a stop request is only seen
/// once the dispatch returns. [`shutdown`](Self::shutdown) aborts the task
/// if that takes longer than one receive timeout.
pub struct EventReceiver {
    local_addr: SocketAddr,
    receive_timeout: Duration,
    control_tx: broadcast::Sender<Control>,
    task_handle: Option<JoinHandle<()>>,
}

impl EventReceiver {
    /// Bind the socket and start the receive loop
    ///
    /// Binding happens before the task is spawned so that an unavailable
    /// port is reported to the caller.
    pub async fn bind(config: &ListenerConfig, mediator: Arc<EventMediator>) -> Result<Self> {
        let socket = UdpSocket::bind(config.socket_addr()).await?;
        let local_addr = socket.local_addr()?;
        let receive_timeout = config.receive_timeout();
        tracing::info!("Listening for push events on {}", local_addr);

        let (control_tx, _) = broadcast::channel(4);
        let control_rx = control_tx.subscribe();
        let handle = tokio::spawn(receive_loop(
            socket,
            local_addr,
            receive_timeout,
            mediator,
            control_rx,
        ));

        Ok(Self {
            local_addr,
            receive_timeout,
            control_tx,
            task_handle: Some(handle),
        })
    }

    /// Address the socket is bound to, with the actual port if 0 was configured
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the receive loop is still alive
    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the socket and bind a new one on the same address
    ///
    /// Handled by the loop exactly like a socket error, e.g. after the
    /// host's network interface went away and came back.
    pub fn reset(&self) {
        let _ = self.control_tx.send(Control::Reset);
    }

    /// Stop the loop and wait for it to close the socket
    ///
    /// Waits at most one receive timeout; the task is aborted if it has not
    /// finished by then.
    pub async fn shutdown(&mut self) {
        let _ = self.control_tx.send(Control::Stop);
        if let Some(mut handle) = self.task_handle.take() {
            let wait = self.receive_timeout + SHUTDOWN_GRACE;
            if tokio::time::timeout(wait, &mut handle).await.is_err() {
                tracing::warn!("Event receiver did not stop within {:?}, aborting", wait);
                handle.abort();
            }
        }
        tracing::info!("Event receiver on {} shut down", self.local_addr);
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

async fn receive_loop(
    socket: UdpSocket,
    local_addr: SocketAddr,
    receive_timeout: Duration,
    mediator: Arc<EventMediator>,
    mut control_rx: broadcast::Receiver<Control>,
) {
    let mut socket = Some(socket);
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        let Some(current) = socket.as_ref() else {
            match UdpSocket::bind(local_addr).await {
                Ok(recreated) => {
                    tracing::info!("Recreated event socket on {}", local_addr);
                    socket = Some(recreated);
                }
                Err(e) => {
                    tracing::warn!("Failed to recreate event socket on {}: {}", local_addr, e);
                    tokio::select! {
                        control = control_rx.recv() => {
                            if is_stop(&control) {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(receive_timeout) => {}
                    }
                }
            }
            continue;
        };

        let outcome = tokio::select! {
            biased;
            control = control_rx.recv() => {
                if is_stop(&control) {
                    break;
                }
                Ok(Err(io::Error::other("socket reset requested")))
            }
            result = tokio::time::timeout(receive_timeout, current.recv_from(&mut buf)) => result,
        };

        match outcome {
            Err(_) => {
                tracing::trace!("No push event within {:?}", receive_timeout);
            }
            Ok(Ok((len, source))) => match std::str::from_utf8(&buf[..len]) {
                Ok(text) => {
                    tracing::debug!("<< {} bytes from {}: {}", len, source, text);
                    mediator.dispatch(source.ip(), text).await;
                }
                Err(e) => {
                    tracing::warn!("Dropping non UTF-8 datagram from {}: {}", source, e);
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("Event socket error on {}: {}", local_addr, e);
                socket = None;
            }
        }
    }

    tracing::debug!("Event receive loop on {} stopped", local_addr);
}

/// A closed channel means the owner is gone; a lagged one only lost resets
fn is_stop(control: &std::result::Result<Control, broadcast::error::RecvError>) -> bool {
    matches!(
        control,
        Ok(Control::Stop) | Err(broadcast::error::RecvError::Closed)
    )
}
