//! Lifecycle event sink.
//!
//! The coordinator emits a structured event for every lifecycle transition
//! it drives. Callers supply an [`EventSink`] at construction time;
//! [`TracingSink`] forwards events to `tracing` and is the default.

use crate::error::Stage;
use crate::identity::PeerId;
use crate::session::{CipherMode, SessionState};

/// Structured lifecycle events emitted by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The coordinator was (re-)initialized with a plugin registry.
    Initialized {
        /// Transport protocol identifier.
        transport: String,
        /// Number of configured cryptographic plugins.
        crypto_plugins: usize,
        /// Number of configured authentication plugins.
        auth_plugins: usize,
    },
    /// A device scan started.
    DiscoveryStarted,
    /// The scan reported a peer.
    PeerDiscovered(PeerId),
    /// The scan completed.
    DiscoveryFinished {
        /// Number of peers the scan produced.
        peers: usize,
    },
    /// A session moved between lifecycle states.
    StateChanged {
        /// Peer the session belongs to.
        peer: PeerId,
        /// State before the transition.
        from: SessionState,
        /// State after the transition.
        to: SessionState,
    },
    /// An authentication scheme succeeded for the peer.
    AuthAccepted {
        /// Peer that accepted the scheme.
        peer: PeerId,
        /// Identifier of the winning scheme.
        scheme: String,
    },
    /// A cipher (or declared pass-through) was activated.
    CipherActivated {
        /// Peer the cipher protects.
        peer: PeerId,
        /// The activated mode.
        mode: CipherMode,
    },
    /// The session reached `Secured` and accepts send/receive.
    SessionSecured {
        /// Peer the session is established with.
        peer: PeerId,
        /// Payload protection mode of the session.
        mode: CipherMode,
    },
    /// The session closed (explicit close or transport disconnect).
    SessionClosed {
        /// Peer whose session closed.
        peer: PeerId,
    },
    /// The session failed terminally and was removed.
    SessionFailed {
        /// Peer whose session failed.
        peer: PeerId,
        /// Stage the failure occurred at.
        stage: Stage,
    },
}

/// Caller-supplied observer for coordinator lifecycle events.
pub trait EventSink: Send + Sync {
    /// Observe one event. Must not block.
    fn emit(&self, event: &LifecycleEvent);
}

/// Sink that discards all events.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LifecycleEvent) {}
}

/// Sink forwarding events to `tracing` at debug level (failures at warn).
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::SessionFailed { peer, stage } => {
                tracing::warn!(peer = %peer, stage = %stage, "session failed");
            }
            LifecycleEvent::SessionSecured { peer, mode } => {
                tracing::info!(peer = %peer, mode = %mode, "session secured");
            }
            other => {
                tracing::debug!(event = ?other, "lifecycle event");
            }
        }
    }
}
