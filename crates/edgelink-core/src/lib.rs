//! # EdgeLink Core
//!
//! Gateway-side coordinator for establishing secure sessions with nearby
//! peer devices over pluggable strategies.
//!
//! This crate provides:
//! - Plugin contracts for transport, cryptography, and authentication
//! - The plugin registry (one transport, ordered crypto/auth lists)
//! - The per-peer session state machine
//! - The session coordinator with dual call/return and event-stream APIs
//! - The error taxonomy and lifecycle event sink
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Coordinator                              │
//! │  (registry, live-session map, dual blocking/stream surface)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                         Sessions                                │
//! │  (per-peer state machine, negotiated plugins, key material)    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │     Transport      │    Authentication    │    Cryptography    │
//! │     (plugins supplied by the caller at initialization)         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use edgelink_core::{Coordinator, GatewayId, PluginRegistry};
//! # use std::sync::Arc;
//! # async fn example(transport: Arc<dyn edgelink_core::TransportPlugin>)
//! # -> edgelink_core::Result<()> {
//! let coordinator = Coordinator::new();
//! coordinator.initialize(
//!     GatewayId::from("gateway-01"),
//!     PluginRegistry::new().with_transport(transport),
//! )?;
//!
//! for peer in coordinator.search_devices().await? {
//!     let session = coordinator.secure_connect(&peer).await?;
//!     session.send(b"hello").await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod identity;
pub mod plugin;
pub mod registry;
pub mod session;
pub mod stream;

#[cfg(test)]
pub(crate) mod stubs;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, SessionHandle};
pub use error::{Error, Result, Stage};
pub use events::{EventSink, LifecycleEvent, NullSink, TracingSink};
pub use identity::{GatewayId, PeerId, SessionKey};
pub use plugin::{
    AuthError, AuthOutcome, AuthenticationPlugin, CryptoError, CryptographicPlugin, Discovery,
    PeerChannel, TransportError, TransportPlugin,
};
pub use registry::PluginRegistry;
pub use session::{CipherMode, SessionState};
pub use stream::{ConnectUpdate, DeviceDiscovery, SecureConnect};
