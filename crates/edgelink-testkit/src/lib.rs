//! In-memory plugin implementations for exercising the coordinator without
//! real radios or hardware.
//!
//! Everything here runs the genuine plugin contracts end to end: the
//! transport hands out loopback channels backed by scripted virtual
//! devices, the authentication plugin runs a real blake3 challenge and
//! response against the device's shared secret, and the ciphers transform
//! payloads for real. Integration tests drive the coordinator exactly the
//! way production callers do.

#![warn(clippy::all)]

pub mod auth;
pub mod crypto;
pub mod sink;
pub mod transport;

pub use auth::{RejectingAuth, SharedSecretAuth};
pub use crypto::{Blake3StreamCipher, IdentityCipher};
pub use sink::RecordingSink;
pub use transport::{InMemoryTransport, VirtualDevice};
