//! Event-stream adapters over the coordinator core.
//!
//! Both adapters are thin: they spawn the same mode-agnostic drivers the
//! call/return API uses and forward their output through a channel. Streams
//! are cold (nothing runs until first poll) and single-subscription (the
//! stream object is the subscription). Dropping a stream before its
//! terminal item aborts the driving task; for a connect attempt that
//! removes the peer's reservation and releases the channel, so no session
//! is ever left connecting or authenticating indefinitely.

use crate::coordinator::{Coordinator, SessionHandle};
use crate::error::Result;
use crate::identity::PeerId;
use crate::session::SessionState;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cold device-discovery stream; emits each discovered peer.
///
/// Returned by
/// [`Coordinator::search_devices_stream`](crate::Coordinator::search_devices_stream).
pub struct DeviceDiscovery {
    state: DiscoveryState,
}

enum DiscoveryState {
    Idle(Option<Coordinator>),
    Running {
        rx: mpsc::UnboundedReceiver<Result<PeerId>>,
        task: JoinHandle<()>,
    },
    Done,
}

impl DeviceDiscovery {
    pub(crate) fn new(coordinator: Coordinator) -> Self {
        Self {
            state: DiscoveryState::Idle(Some(coordinator)),
        }
    }
}

impl Stream for DeviceDiscovery {
    type Item = Result<PeerId>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match &mut self.state {
                DiscoveryState::Idle(coordinator) => {
                    let Some(coordinator) = coordinator.take() else {
                        self.state = DiscoveryState::Done;
                        continue;
                    };
                    let (tx, rx) = mpsc::unbounded_channel();
                    let task = tokio::spawn(async move {
                        coordinator.drive_discovery(tx).await;
                    });
                    self.state = DiscoveryState::Running { rx, task };
                }
                DiscoveryState::Running { rx, .. } => {
                    return match rx.poll_recv(cx) {
                        Poll::Ready(None) => {
                            self.state = DiscoveryState::Done;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                DiscoveryState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for DeviceDiscovery {
    fn drop(&mut self) {
        if let DiscoveryState::Running { task, .. } = &self.state {
            task.abort();
        }
    }
}

/// Item emitted by a [`SecureConnect`] stream.
#[derive(Debug, Clone)]
pub enum ConnectUpdate {
    /// The session entered a new lifecycle state.
    State(SessionState),
    /// Terminal: the session is secured and ready for send/receive.
    Secured(SessionHandle),
}

/// Cold secure-connect stream; emits lifecycle transitions and terminates
/// with the secured handle or the error.
///
/// Returned by
/// [`Coordinator::secure_connect_stream`](crate::Coordinator::secure_connect_stream).
pub struct SecureConnect {
    state: ConnectState,
}

enum ConnectState {
    Idle(Option<(Coordinator, PeerId)>),
    Running {
        rx: mpsc::UnboundedReceiver<Result<ConnectUpdate>>,
        task: JoinHandle<()>,
    },
    Done,
}

impl SecureConnect {
    pub(crate) fn new(coordinator: Coordinator, peer: PeerId) -> Self {
        Self {
            state: ConnectState::Idle(Some((coordinator, peer))),
        }
    }
}

impl Stream for SecureConnect {
    type Item = Result<ConnectUpdate>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match &mut self.state {
                ConnectState::Idle(start) => {
                    let Some((coordinator, peer)) = start.take() else {
                        self.state = ConnectState::Done;
                        continue;
                    };
                    let (tx, rx) = mpsc::unbounded_channel();
                    let task = tokio::spawn(drive_connect_events(coordinator, peer, tx));
                    self.state = ConnectState::Running { rx, task };
                }
                ConnectState::Running { rx, .. } => {
                    return match rx.poll_recv(cx) {
                        Poll::Ready(None) => {
                            self.state = ConnectState::Done;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                ConnectState::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for SecureConnect {
    fn drop(&mut self) {
        if let ConnectState::Running { task, .. } = &self.state {
            // Aborting unwinds the connect driver; its reservation guard
            // removes the peer's map entry and dropping the channel
            // releases the transport resources.
            task.abort();
        }
    }
}

/// Runs the shared connect driver, interleaving its state transitions with
/// the terminal result on one event channel.
async fn drive_connect_events(
    coordinator: Coordinator,
    peer: PeerId,
    tx: mpsc::UnboundedSender<Result<ConnectUpdate>>,
) {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let driver = coordinator.drive_connect(peer, Some(progress_tx));
    tokio::pin!(driver);

    loop {
        tokio::select! {
            update = progress_rx.recv() => {
                if let Some(state) = update {
                    let _ = tx.send(Ok(ConnectUpdate::State(state)));
                }
            }
            result = &mut driver => {
                // The driver owns the progress sender; flush anything it
                // emitted right before finishing.
                while let Ok(state) = progress_rx.try_recv() {
                    let _ = tx.send(Ok(ConnectUpdate::State(state)));
                }
                let _ = match result {
                    Ok(handle) => tx.send(Ok(ConnectUpdate::Secured(handle))),
                    Err(e) => tx.send(Err(e)),
                };
                return;
            }
        }
    }
}
