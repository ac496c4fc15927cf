//! Coordinator error taxonomy.
//!
//! Plugin implementations report failures with their own error types
//! ([`TransportError`](crate::plugin::TransportError),
//! [`AuthError`](crate::plugin::AuthError),
//! [`CryptoError`](crate::plugin::CryptoError)). The coordinator translates
//! those at its boundary into this taxonomy, so callers never see plugin
//! vocabulary. Every failure reports the lifecycle [`Stage`] it occurred at,
//! which is how a caller tells "peer unreachable" from "peer rejected
//! credentials" from "stream corrupted".

use crate::identity::PeerId;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Lifecycle stage at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Device discovery (transport scan).
    Discovery,
    /// Transport channel establishment.
    Connect,
    /// Authentication exchange.
    Authenticate,
    /// Cipher selection and activation.
    Secure,
    /// Send/receive on an established session.
    Runtime,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovery => "discovery",
            Stage::Connect => "connect",
            Stage::Authenticate => "authenticate",
            Stage::Secure => "secure",
            Stage::Runtime => "runtime",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the coordinator's public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Required plugin or identity missing at initialization.
    #[error("configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// Transport scan failed.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Transport channel could not be opened (unreachable peer, timeout,
    /// disconnect during establishment).
    #[error("connection to {peer} failed: {reason}")]
    Connection {
        /// Peer the connection was attempted with.
        peer: PeerId,
        /// Transport-level reason.
        reason: String,
    },

    /// Every configured authentication scheme was rejected or failed.
    #[error("authentication with {peer} failed: all {schemes_tried} scheme(s) exhausted")]
    Authentication {
        /// Peer that refused authentication.
        peer: PeerId,
        /// Number of schemes tried before giving up.
        schemes_tried: usize,
    },

    /// Cipher integrity or format failure while receiving.
    #[error("decryption failed on session with {peer}: {reason}")]
    Decryption {
        /// Peer whose session produced undecryptable data.
        peer: PeerId,
        /// Cipher-level reason.
        reason: String,
    },

    /// Send/receive failure on an already-secured channel.
    #[error("transport failure on session with {peer}: {reason}")]
    Transport {
        /// Peer whose session failed.
        peer: PeerId,
        /// Transport-level reason.
        reason: String,
    },

    /// A connect attempt for this peer is already in flight.
    #[error("connection attempt already in progress for {0}")]
    ConnectInProgress(PeerId),

    /// No live session exists for the peer.
    #[error("no live session for {0}")]
    SessionNotFound(PeerId),

    /// Internal state machine violation. Indicates a coordinator bug, not
    /// a recoverable condition.
    #[error("invalid session state transition: {0}")]
    InvalidState(String),
}

impl Error {
    /// The lifecycle stage this error belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Error::Configuration(_) => Stage::Connect,
            Error::Discovery(_) => Stage::Discovery,
            Error::Connection { .. } | Error::ConnectInProgress(_) => Stage::Connect,
            Error::Authentication { .. } => Stage::Authenticate,
            Error::Decryption { .. } => Stage::Runtime,
            Error::Transport { .. }
            | Error::SessionNotFound(_)
            | Error::InvalidState(_) => Stage::Runtime,
        }
    }

    /// Create a configuration error with static context (zero allocation).
    #[must_use]
    pub const fn configuration(context: &'static str) -> Self {
        Error::Configuration(Cow::Borrowed(context))
    }

    /// True when a fresh `secure_connect` for the same peer may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Discovery(_) | Error::Transport { .. }
        )
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_assignment() {
        let peer = PeerId::from("P1");
        assert_eq!(Error::configuration("no transport").stage(), Stage::Connect);
        assert_eq!(Error::Discovery("radio off".into()).stage(), Stage::Discovery);
        assert_eq!(
            Error::Connection {
                peer: peer.clone(),
                reason: "timeout".into()
            }
            .stage(),
            Stage::Connect
        );
        assert_eq!(
            Error::Authentication {
                peer: peer.clone(),
                schemes_tried: 2
            }
            .stage(),
            Stage::Authenticate
        );
        assert_eq!(
            Error::Decryption {
                peer: peer.clone(),
                reason: "bad tag".into()
            }
            .stage(),
            Stage::Runtime
        );
        assert_eq!(
            Error::Transport {
                peer,
                reason: "link lost".into()
            }
            .stage(),
            Stage::Runtime
        );
    }

    #[test]
    fn test_display_names_peer_and_stage() {
        let err = Error::Authentication {
            peer: PeerId::from("AA:BB"),
            schemes_tried: 3,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("AA:BB"));
        assert!(rendered.contains('3'));
    }

    #[test]
    fn test_retriable_classification() {
        let peer = PeerId::from("P1");
        assert!(
            Error::Connection {
                peer: peer.clone(),
                reason: "timeout".into()
            }
            .is_retriable()
        );
        assert!(
            Error::Transport {
                peer: peer.clone(),
                reason: "link lost".into()
            }
            .is_retriable()
        );
        assert!(!Error::configuration("x").is_retriable());
        assert!(!Error::ConnectInProgress(peer.clone()).is_retriable());
        assert!(
            !Error::Authentication {
                peer,
                schemes_tried: 1
            }
            .is_retriable()
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Authenticate.to_string(), "authenticate");
        assert_eq!(Stage::Runtime.to_string(), "runtime");
    }
}
