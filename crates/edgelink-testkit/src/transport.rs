//! Loopback transport over scripted virtual devices.

use crate::auth::{CHALLENGE_TAG, NONCE_LEN, challenge_response};
use async_trait::async_trait;
use edgelink_core::{Discovery, PeerChannel, PeerId, TransportError, TransportPlugin};
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted device on the virtual network.
#[derive(Clone)]
pub struct VirtualDevice {
    id: PeerId,
    secret: Vec<u8>,
    reachable: bool,
}

impl VirtualDevice {
    /// A reachable device holding the given pre-shared secret.
    pub fn new(id: &str, secret: &[u8]) -> Self {
        Self {
            id: PeerId::from(id),
            secret: secret.to_vec(),
            reachable: true,
        }
    }

    /// A device that advertises itself but refuses every channel.
    pub fn unreachable(id: &str) -> Self {
        Self {
            id: PeerId::from(id),
            secret: Vec::new(),
            reachable: false,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }
}

/// Transport plugin backed by a fixed set of [`VirtualDevice`]s.
///
/// Discovery advertises every device; `connect` opens a [`LoopbackChannel`]
/// that answers authentication challenges with the device's secret and
/// echoes every other frame.
pub struct InMemoryTransport {
    devices: Vec<VirtualDevice>,
    connect_delay: Option<Duration>,
}

impl InMemoryTransport {
    pub fn new(devices: Vec<VirtualDevice>) -> Self {
        Self {
            devices,
            connect_delay: None,
        }
    }

    /// Delay every `connect` call, to keep an attempt observably in flight.
    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }
}

#[async_trait]
impl TransportPlugin for InMemoryTransport {
    fn transport_id(&self) -> &str {
        "in-memory"
    }

    async fn discover(&self) -> Result<Discovery, TransportError> {
        let ids: Vec<PeerId> = self.devices.iter().map(|d| d.id.clone()).collect();
        Ok(futures::stream::iter(ids.into_iter().map(Ok)).boxed())
    }

    async fn connect(&self, peer: &PeerId) -> Result<Box<dyn PeerChannel>, TransportError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let device = self
            .devices
            .iter()
            .find(|d| &d.id == peer)
            .filter(|d| d.reachable)
            .ok_or_else(|| TransportError::Unreachable(format!("no route to {peer}")))?;
        Ok(Box::new(LoopbackChannel::new(device.secret.clone())))
    }
}

/// Channel whose far end is simulated in-process.
///
/// Challenge frames (tag plus nonce) are answered the way the device would;
/// everything else is echoed back verbatim.
pub struct LoopbackChannel {
    secret: Vec<u8>,
    inbox: VecDeque<Vec<u8>>,
    closed: bool,
}

impl LoopbackChannel {
    fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            inbox: VecDeque::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl PeerChannel for LoopbackChannel {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        let reply = match frame.split_at_checked(CHALLENGE_TAG.len()) {
            Some((tag, nonce)) if tag == CHALLENGE_TAG && nonce.len() == NONCE_LEN => {
                challenge_response(&self.secret, nonce).as_bytes().to_vec()
            }
            _ => frame.to_vec(),
        };
        self.inbox.push_back(reply);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.inbox
            .pop_front()
            .ok_or_else(|| TransportError::Io("nothing queued from peer".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.inbox.clear();
        Ok(())
    }
}
