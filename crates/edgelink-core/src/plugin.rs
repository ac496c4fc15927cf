//! Plugin contracts.
//!
//! The coordinator is polymorphic over three capability sets, supplied as
//! trait objects at initialization time:
//!
//! - [`TransportPlugin`] - device discovery and point-to-point byte channels
//! - [`CryptographicPlugin`] - symmetric payload protection
//! - [`AuthenticationPlugin`] - challenge/response identity verification and
//!   key derivation
//!
//! Implementations are mutually unaware; the only shared currency is the
//! identifier each plugin exposes for negotiation. Error types here belong
//! to the plugin boundary and are translated into the public
//! [`Error`](crate::Error) taxonomy by the coordinator.

use crate::identity::{GatewayId, PeerId, SessionKey};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Failures reported by transport plugins.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Device scan could not run or aborted.
    #[error("scan failed: {0}")]
    ScanFailed(String),

    /// Peer could not be reached or refused the channel.
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The channel is closed; no further operations are possible.
    #[error("channel closed")]
    Closed,

    /// Send/receive failure on an open channel.
    #[error("channel I/O failure: {0}")]
    Io(String),
}

/// Failures reported by cryptographic plugins.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Ciphertext failed integrity or format checks.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Key material does not fit the cipher.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Length the cipher requires.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
}

/// Failures reported by authentication plugins.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The peer explicitly refused this scheme or these credentials.
    /// The coordinator moves on to the next configured plugin and never
    /// retries a rejected scheme within the same connect attempt.
    #[error("credentials rejected by peer")]
    Rejected,

    /// The channel failed mid-exchange.
    #[error("channel failure during exchange: {0}")]
    Channel(#[from] TransportError),

    /// The peer's messages did not follow the scheme's exchange format.
    #[error("malformed exchange: {0}")]
    Protocol(String),
}

/// Lazy, finite sequence of peers produced by one discovery invocation.
pub type Discovery = BoxStream<'static, Result<PeerId, TransportError>>;

/// Byte-stream channel to a single peer, produced by
/// [`TransportPlugin::connect`].
///
/// Framing on the channel is a contract between the transport and the
/// peers on both ends; the core treats frames as opaque byte vectors.
/// Dropping a channel must release the underlying transport resources,
/// whether or not [`close`](PeerChannel::close) was called first.
#[async_trait]
pub trait PeerChannel: Send {
    /// Send one frame to the peer.
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Receive one frame from the peer.
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Close the channel and release transport resources.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Physical/link-layer channel abstraction: discovery plus point-to-point
/// connection. One instance is configured per registry.
#[async_trait]
pub trait TransportPlugin: Send + Sync {
    /// Identifier of the transport protocol, used in events and logs.
    fn transport_id(&self) -> &str;

    /// Scan for compatible nearby devices.
    ///
    /// The returned sequence is finite for this invocation and the scan is
    /// restartable: calling `discover` again starts a fresh scan. The scan
    /// duration is owned by the transport; the coordinator does not impose
    /// a timeout here.
    async fn discover(&self) -> Result<Discovery, TransportError>;

    /// Open a byte-stream channel to the given peer.
    async fn connect(&self, peer: &PeerId) -> Result<Box<dyn PeerChannel>, TransportError>;
}

/// Symmetric cipher strategy protecting session payloads once a key is
/// established.
pub trait CryptographicPlugin: Send + Sync {
    /// Capability identifier used during negotiation (e.g. a suite name).
    fn cipher_id(&self) -> &str;

    /// Encrypt a payload under the session key.
    fn encrypt(&self, plaintext: &[u8], key: &SessionKey) -> Vec<u8>;

    /// Decrypt a payload under the session key.
    fn decrypt(&self, ciphertext: &[u8], key: &SessionKey) -> Result<Vec<u8>, CryptoError>;
}

/// Result of a successful authentication exchange.
#[derive(Debug)]
pub struct AuthOutcome {
    /// Key material both sides derived during the exchange.
    pub session_key: SessionKey,
    /// Cipher suite the exchange negotiated, if the scheme models
    /// negotiation at all. Matched against
    /// [`CryptographicPlugin::cipher_id`]; `None` falls back to the first
    /// registered cipher.
    pub cipher_suite: Option<String>,
}

/// Challenge/response or keyed-hash scheme verifying identity and deriving
/// a shared secret over an already-open channel.
///
/// Implementations must be idempotent-safe to run again on a fresh channel
/// after a transient failure, but the coordinator never re-invokes a scheme
/// that returned [`AuthError::Rejected`] within the same connect attempt.
#[async_trait]
pub trait AuthenticationPlugin: Send + Sync {
    /// Identifier of the authentication scheme, used in events and logs.
    fn scheme_id(&self) -> &str;

    /// Run the full exchange over the open channel.
    async fn authenticate(
        &self,
        gateway: &GatewayId,
        channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError>;
}
