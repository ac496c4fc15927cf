//! Per-peer session state machine.
//!
//! A [`Session`] tracks one peer through the
//! `Connecting -> Authenticating -> Securing -> Secured -> Closed`
//! lifecycle, holding the transport channel, the negotiated plugin choice,
//! and the derived key material. Sessions are owned exclusively by the
//! coordinator; callers interact through
//! [`SessionHandle`](crate::SessionHandle).

use crate::error::{Error, Result};
use crate::identity::{PeerId, SessionKey};
use crate::plugin::{CryptographicPlugin, PeerChannel, TransportError};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Session lifecycle states.
///
/// `Failed` is reachable from any non-terminal state. The authentication
/// and securing stages are skippable: with an empty auth plugin list a
/// session moves `Connecting -> Securing` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport channel being opened.
    Connecting,
    /// Authentication plugins being tried in registration order.
    Authenticating,
    /// Cipher selection and activation.
    Securing,
    /// Ready for encrypted send/receive.
    Secured,
    /// Explicitly closed or transport-reported disconnect. Terminal.
    Closed,
    /// Unrecoverable failure. Terminal; the session is removed from the
    /// live-session map and a fresh connect starts over.
    Failed,
}

impl SessionState {
    /// True for states no transition leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Securing => "securing",
            SessionState::Secured => "secured",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How payloads on a secured session are protected.
///
/// Pass-through is the declared, observable result of configuring no
/// cryptographic plugins; it is never entered silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherMode {
    /// Payloads run through the named cipher plugin.
    Cipher(String),
    /// Payloads pass unmodified (empty crypto plugin list).
    PassThrough,
}

impl fmt::Display for CipherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherMode::Cipher(id) => write!(f, "cipher:{id}"),
            CipherMode::PassThrough => f.write_str("pass-through"),
        }
    }
}

/// Runtime state for one peer session.
pub(crate) struct Session {
    peer: PeerId,
    state: SessionState,
    channel: Box<dyn PeerChannel>,
    auth_scheme: Option<String>,
    cipher: Option<Arc<dyn CryptographicPlugin>>,
    key: SessionKey,
    secured_at: Option<Instant>,
}

impl Session {
    /// Create a session in `Connecting` over a freshly opened channel.
    pub(crate) fn new(peer: PeerId, channel: Box<dyn PeerChannel>) -> Self {
        Self {
            peer,
            state: SessionState::Connecting,
            channel,
            auth_scheme: None,
            cipher: None,
            key: SessionKey::empty(),
            secured_at: None,
        }
    }

    pub(crate) fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Check if a state transition is valid.
    #[must_use]
    pub(crate) fn can_transition(&self, to: SessionState) -> bool {
        match (self.state, to) {
            // Failed is reachable from any non-terminal state
            (from, SessionState::Failed) if !from.is_terminal() => true,

            // Securing directly from Connecting when auth is skipped
            (SessionState::Connecting, SessionState::Authenticating | SessionState::Securing) => {
                true
            }

            (SessionState::Authenticating, SessionState::Securing) => true,
            (SessionState::Securing, SessionState::Secured) => true,
            (SessionState::Secured, SessionState::Closed) => true,

            _ => false,
        }
    }

    /// Transition to a new state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the transition is not allowed
    /// from the current state.
    pub(crate) fn transition_to(&mut self, new_state: SessionState) -> Result<()> {
        if !self.can_transition(new_state) {
            return Err(Error::InvalidState(format!(
                "{} -> {} for peer {}",
                self.state, new_state, self.peer
            )));
        }

        let old_state = self.state;
        self.state = new_state;

        match new_state {
            SessionState::Secured => {
                self.secured_at = Some(Instant::now());
            }
            SessionState::Closed | SessionState::Failed => {
                // Key material must not outlive the session
                self.key = SessionKey::empty();
            }
            _ => {}
        }

        tracing::debug!(
            peer = %self.peer,
            "session state transition: {} -> {}",
            old_state,
            new_state
        );

        Ok(())
    }

    /// Bind the winning authentication scheme and its derived key.
    pub(crate) fn bind_auth(&mut self, scheme: &str, key: SessionKey) {
        self.auth_scheme = Some(scheme.to_owned());
        self.key = key;
    }

    /// Activate the selected cipher, or declared pass-through when `None`.
    pub(crate) fn activate_cipher(&mut self, cipher: Option<Arc<dyn CryptographicPlugin>>) {
        self.cipher = cipher;
    }

    pub(crate) fn auth_scheme(&self) -> Option<&str> {
        self.auth_scheme.as_deref()
    }

    /// The declared payload protection mode.
    pub(crate) fn cipher_mode(&self) -> CipherMode {
        match &self.cipher {
            Some(plugin) => CipherMode::Cipher(plugin.cipher_id().to_owned()),
            None => CipherMode::PassThrough,
        }
    }

    /// Mutable access to the channel for the authentication exchange.
    pub(crate) fn channel_mut(&mut self) -> &mut dyn PeerChannel {
        self.channel.as_mut()
    }

    /// Encrypt (or pass through) and send one payload.
    pub(crate) async fn send_plaintext(&mut self, plaintext: &[u8]) -> Result<()> {
        if self.state != SessionState::Secured {
            return Err(Error::SessionNotFound(self.peer.clone()));
        }
        let frame = match &self.cipher {
            Some(plugin) => plugin.encrypt(plaintext, &self.key),
            None => plaintext.to_vec(),
        };
        self.channel
            .send(&frame)
            .await
            .map_err(|e| self.transport_error(e))
    }

    /// Receive and decrypt (or pass through) one payload.
    pub(crate) async fn recv_plaintext(&mut self) -> Result<Vec<u8>> {
        if self.state != SessionState::Secured {
            return Err(Error::SessionNotFound(self.peer.clone()));
        }
        let frame = self
            .channel
            .recv()
            .await
            .map_err(|e| self.transport_error(e))?;
        match &self.cipher {
            Some(plugin) => plugin.decrypt(&frame, &self.key).map_err(|e| {
                Error::Decryption {
                    peer: self.peer.clone(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(frame),
        }
    }

    /// Close the channel and discard key material.
    pub(crate) async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.channel.close().await {
            tracing::debug!(peer = %self.peer, "channel close reported: {e}");
        }
        if !self.state.is_terminal() {
            let target = if self.state == SessionState::Secured {
                SessionState::Closed
            } else {
                SessionState::Failed
            };
            self.transition_to(target)?;
        }
        Ok(())
    }

    /// Terminate the session after an unrecoverable runtime failure:
    /// close the channel (best effort) and enter `Failed`.
    pub(crate) async fn abort(&mut self) {
        if let Err(e) = self.channel.close().await {
            tracing::debug!(peer = %self.peer, "channel close reported: {e}");
        }
        if !self.state.is_terminal() {
            let _ = self.transition_to(SessionState::Failed);
        }
    }

    fn transport_error(&self, err: TransportError) -> Error {
        Error::Transport {
            peer: self.peer.clone(),
            reason: err.to_string(),
        }
    }
}
