//! In-crate plugin stubs for unit tests.
//!
//! The full-featured in-memory plugins live in `edgelink-testkit`; these
//! are the minimal versions the core's own unit tests need.

use crate::events::{EventSink, LifecycleEvent};
use crate::identity::{GatewayId, PeerId, SessionKey};
use crate::plugin::{
    AuthError, AuthOutcome, AuthenticationPlugin, CryptoError, CryptographicPlugin, Discovery,
    PeerChannel, TransportError, TransportPlugin,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Transport with a scripted peer list whose channels loop every sent
/// frame back to the receiver.
pub(crate) struct EchoTransport {
    peers: Vec<PeerId>,
    reachable: bool,
}

impl EchoTransport {
    pub(crate) fn new(peers: &[&str]) -> Self {
        Self {
            peers: peers.iter().map(|p| PeerId::from(*p)).collect(),
            reachable: true,
        }
    }

    /// Same peer list, but every connect fails.
    pub(crate) fn unreachable(peers: &[&str]) -> Self {
        Self {
            reachable: false,
            ..Self::new(peers)
        }
    }
}

#[async_trait]
impl TransportPlugin for EchoTransport {
    fn transport_id(&self) -> &str {
        "echo"
    }

    async fn discover(&self) -> Result<Discovery, TransportError> {
        let peers = self.peers.clone();
        Ok(futures::stream::iter(peers.into_iter().map(Ok)).boxed())
    }

    async fn connect(&self, peer: &PeerId) -> Result<Box<dyn PeerChannel>, TransportError> {
        if !self.reachable {
            return Err(TransportError::Unreachable(format!("{peer} is down")));
        }
        if !self.peers.contains(peer) {
            return Err(TransportError::Unreachable(format!("{peer} not discovered")));
        }
        Ok(Box::new(EchoChannel::default()))
    }
}

#[derive(Default)]
pub(crate) struct EchoChannel {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
}

#[async_trait]
impl PeerChannel for EchoChannel {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.frames.push_back(frame.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.frames
            .pop_front()
            .ok_or_else(|| TransportError::Io("no frame queued".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}

/// Repeating-XOR cipher; enough to make ciphertext differ from plaintext.
pub(crate) struct XorCipher {
    id: &'static str,
}

impl XorCipher {
    pub(crate) fn new(id: &'static str) -> Self {
        Self { id }
    }

    fn apply(data: &[u8], key: &SessionKey) -> Vec<u8> {
        if key.is_empty() {
            return data.to_vec();
        }
        let key = key.as_bytes();
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()])
            .collect()
    }
}

impl CryptographicPlugin for XorCipher {
    fn cipher_id(&self) -> &str {
        self.id
    }

    fn encrypt(&self, plaintext: &[u8], key: &SessionKey) -> Vec<u8> {
        Self::apply(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
        Ok(Self::apply(ciphertext, key))
    }
}

/// Authentication that always succeeds with a fixed key.
pub(crate) struct StaticKeyAuth {
    id: &'static str,
    key: Vec<u8>,
}

impl StaticKeyAuth {
    pub(crate) fn new(id: &'static str, key: &[u8]) -> Self {
        Self {
            id,
            key: key.to_vec(),
        }
    }
}

#[async_trait]
impl AuthenticationPlugin for StaticKeyAuth {
    fn scheme_id(&self) -> &str {
        self.id
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        _channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        Ok(AuthOutcome {
            session_key: SessionKey::new(self.key.clone()),
            cipher_suite: None,
        })
    }
}

/// Authentication that always rejects.
pub(crate) struct FailingAuth {
    id: &'static str,
}

impl FailingAuth {
    pub(crate) fn new(id: &'static str) -> Self {
        Self { id }
    }
}

#[async_trait]
impl AuthenticationPlugin for FailingAuth {
    fn scheme_id(&self) -> &str {
        self.id
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        _channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        Err(AuthError::Rejected)
    }
}

/// Succeeding authentication that counts its invocations.
pub(crate) struct CountingAuth {
    id: &'static str,
    key: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingAuth {
    pub(crate) fn new(id: &'static str, key: &[u8]) -> Self {
        Self {
            id,
            key: key.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn invocations(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthenticationPlugin for CountingAuth {
    fn scheme_id(&self) -> &str {
        self.id
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        _channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AuthOutcome {
            session_key: SessionKey::new(self.key.clone()),
            cipher_suite: None,
        })
    }
}

/// Authentication that sleeps before succeeding; used to exercise
/// cancellation while an attempt is in flight.
pub(crate) struct SlowAuth {
    id: &'static str,
    delay: Duration,
}

impl SlowAuth {
    pub(crate) fn new(id: &'static str, delay: Duration) -> Self {
        Self { id, delay }
    }
}

#[async_trait]
impl AuthenticationPlugin for SlowAuth {
    fn scheme_id(&self) -> &str {
        self.id
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        _channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        tokio::time::sleep(self.delay).await;
        Ok(AuthOutcome {
            session_key: SessionKey::new(vec![1u8; 8]),
            cipher_suite: None,
        })
    }
}

/// Sink recording every event for assertions.
pub(crate) struct RecordingSink(pub(crate) Mutex<Vec<LifecycleEvent>>);

impl EventSink for RecordingSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}
