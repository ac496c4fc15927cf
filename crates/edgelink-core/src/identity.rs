//! Identifier and key-material types.
//!
//! Peer and gateway identifiers are opaque to the core: the transport
//! plugin decides what they mean (MAC address, service UUID, overlay
//! address). The core only compares, clones, and logs them.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque identifier for a peer device, as produced by transport discovery.
///
/// Stable for the lifetime of a discovery result set and used as the key
/// for connection requests and the live-session map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Create a peer identifier from its transport-level representation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity this coordinator presents to peers during authentication.
///
/// Immutable after [`initialize`](crate::Coordinator::initialize); a
/// re-initialization replaces it together with the plugin registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayId(Vec<u8>);

impl GatewayId {
    /// Create a gateway identity from raw bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The identity bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True when the identity carries no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for GatewayId {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Key material derived by a successful authentication exchange.
///
/// Zeroized on drop. An empty key is the declared result of running with
/// no authentication plugins configured.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    /// Wrap derived key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The empty key used when authentication is skipped.
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the skipped-authentication empty key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Key bytes never appear in logs or error messages.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({} bytes)", self.0.len())
    }
}
