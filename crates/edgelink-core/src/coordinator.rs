//! Session coordinator.
//!
//! Owns the validated plugin registry and the live-session map, and drives
//! the discover -> connect -> authenticate -> secure lifecycle for each
//! peer. The driving core here is mode-agnostic: the async methods on
//! [`Coordinator`] are the blocking-style call/return surface, and the
//! adapters in [`stream`](crate::stream) drive the identical code through a
//! task/channel pair for event-stream consumers.
//!
//! # Concurrency
//!
//! Operations against different peers run in parallel. Operations against
//! the same peer are serialized: a `secure_connect` while another attempt
//! for that peer is in flight fails fast with
//! [`Error::ConnectInProgress`], and a connect for an already-secured peer
//! returns the existing handle rather than creating a second session.

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result, Stage};
use crate::events::{EventSink, LifecycleEvent, TracingSink};
use crate::identity::{GatewayId, PeerId};
use crate::registry::{ActiveRegistry, PluginRegistry};
use crate::session::{CipherMode, Session, SessionState};
use crate::stream::{DeviceDiscovery, SecureConnect};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::StreamExt;
use std::sync::{Arc, RwLock};
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

/// Entry in the live-session map.
///
/// `Pending` reserves the peer while a connect attempt is in flight;
/// `Live` holds a secured session. At most one entry exists per peer.
pub(crate) enum PeerSlot {
    Pending,
    Live(Arc<Mutex<Session>>),
}

pub(crate) struct Inner {
    config: CoordinatorConfig,
    sink: Arc<dyn EventSink>,
    configured: RwLock<Option<(GatewayId, Arc<ActiveRegistry>)>>,
    pub(crate) sessions: DashMap<PeerId, PeerSlot>,
}

/// Gateway-side session coordinator.
///
/// Cheap to clone; clones share the registry and live-session map.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<Inner>,
}

impl Coordinator {
    /// Create a coordinator with default configuration and the tracing
    /// event sink.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Create a coordinator with custom timeouts.
    #[must_use]
    pub fn with_config(config: CoordinatorConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a coordinator with custom timeouts and event sink.
    #[must_use]
    pub fn with_sink(config: CoordinatorConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sink,
                configured: RwLock::new(None),
                sessions: DashMap::new(),
            }),
        }
    }

    /// Configure the coordinator with a gateway identity and plugin set,
    /// moving it from unconfigured to ready.
    ///
    /// Re-initialization while ready is permitted and replaces the registry
    /// atomically; sessions already established keep the plugin instances
    /// they negotiated with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the gateway identity is empty
    /// or the registry carries no transport plugin.
    pub fn initialize(&self, gateway: GatewayId, registry: PluginRegistry) -> Result<()> {
        if gateway.is_empty() {
            return Err(Error::configuration("gateway identity must not be empty"));
        }
        let active = registry.activate()?;

        let event = LifecycleEvent::Initialized {
            transport: active.transport.transport_id().to_owned(),
            crypto_plugins: active.crypto.len(),
            auth_plugins: active.auth.len(),
        };
        tracing::info!(
            gateway = %gateway,
            transport = active.transport.transport_id(),
            "coordinator initialized"
        );

        {
            let mut guard = self
                .inner
                .configured
                .write()
                .expect("registry lock poisoned");
            *guard = Some((gateway, Arc::new(active)));
        }
        self.inner.sink.emit(&event);
        Ok(())
    }

    /// Scan for nearby compatible devices and return the full result set.
    ///
    /// Does not touch any session. The scan duration is owned by the
    /// transport plugin; results are a read-only snapshot that may be
    /// consumed concurrently with other operations.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] before initialization,
    /// [`Error::Discovery`] when the transport scan fails.
    pub async fn search_devices(&self) -> Result<Vec<PeerId>> {
        let mut scan = self.search_devices_stream();
        let mut peers = Vec::new();
        while let Some(next) = scan.next().await {
            peers.push(next?);
        }
        Ok(peers)
    }

    /// Scan for devices, surfacing each peer as it is found.
    ///
    /// The returned stream is cold: the scan starts on first poll. Dropping
    /// the stream cancels the scan.
    #[must_use]
    pub fn search_devices_stream(&self) -> DeviceDiscovery {
        DeviceDiscovery::new(self.clone())
    }

    /// Connect to a discovered peer and establish a secured session,
    /// returning when the session is ready for send/receive.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] when the channel cannot be opened (including
    /// timeout), [`Error::Authentication`] when every configured scheme is
    /// exhausted, [`Error::ConnectInProgress`] when another attempt for the
    /// same peer is in flight. Failure never leaks a half-established
    /// session: the channel is closed and the peer's map entry removed.
    pub async fn secure_connect(&self, peer: &PeerId) -> Result<SessionHandle> {
        self.drive_connect(peer.clone(), None).await
    }

    /// Stream-mode variant of [`secure_connect`](Self::secure_connect).
    ///
    /// Cold and single-subscription: the attempt starts on first poll, state
    /// transitions are emitted as they happen, and the terminal item is the
    /// secured handle or the error. Dropping the stream before the terminal
    /// item aborts the attempt and removes the peer's session.
    #[must_use]
    pub fn secure_connect_stream(&self, peer: &PeerId) -> SecureConnect {
        SecureConnect::new(self.clone(), peer.clone())
    }

    /// Close the live session for a peer, releasing its channel.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] when no live session exists.
    pub async fn close_session(&self, peer: &PeerId) -> Result<()> {
        close_live(&self.inner, peer).await
    }

    /// Close every live session. Used at shutdown.
    pub async fn close_all(&self) {
        let peers: Vec<PeerId> = self
            .inner
            .sessions
            .iter()
            .filter(|e| matches!(e.value(), PeerSlot::Live(_)))
            .map(|e| e.key().clone())
            .collect();
        for peer in peers {
            if let Err(e) = close_live(&self.inner, &peer).await {
                tracing::debug!(peer = %peer, "close during shutdown: {e}");
            }
        }
    }

    /// True when a live (secured) session exists for the peer.
    #[must_use]
    pub fn has_session(&self, peer: &PeerId) -> bool {
        self.inner
            .sessions
            .get(peer)
            .is_some_and(|e| matches!(e.value(), PeerSlot::Live(_)))
    }

    /// Peers with live sessions.
    #[must_use]
    pub fn live_peers(&self) -> Vec<PeerId> {
        self.inner
            .sessions
            .iter()
            .filter(|e| matches!(e.value(), PeerSlot::Live(_)))
            .map(|e| e.key().clone())
            .collect()
    }

    fn registry(&self) -> Result<(GatewayId, Arc<ActiveRegistry>)> {
        let guard = self.inner.configured.read().expect("registry lock poisoned");
        match guard.as_ref() {
            Some((gateway, registry)) => Ok((gateway.clone(), Arc::clone(registry))),
            None => Err(Error::configuration("coordinator not initialized")),
        }
    }

    /// Mode-agnostic discovery driver shared by both API surfaces: runs one
    /// transport scan and forwards each peer (or the failure) into `tx`.
    pub(crate) async fn drive_discovery(&self, tx: mpsc::UnboundedSender<Result<PeerId>>) {
        let registry = match self.registry() {
            Ok((_gateway, registry)) => registry,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        };
        self.inner.sink.emit(&LifecycleEvent::DiscoveryStarted);

        let mut scan = match registry.transport.discover().await {
            Ok(scan) => scan,
            Err(e) => {
                let _ = tx.send(Err(Error::Discovery(e.to_string())));
                return;
            }
        };

        let mut count = 0usize;
        while let Some(next) = scan.next().await {
            match next {
                Ok(peer) => {
                    self.inner
                        .sink
                        .emit(&LifecycleEvent::PeerDiscovered(peer.clone()));
                    count += 1;
                    if tx.send(Ok(peer)).is_err() {
                        // Subscriber went away; stop scanning.
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(Error::Discovery(e.to_string())));
                    return;
                }
            }
        }
        self.inner
            .sink
            .emit(&LifecycleEvent::DiscoveryFinished { peers: count });
    }

    /// Mode-agnostic connect driver shared by the call/return and stream
    /// surfaces. `progress` receives each state the session enters.
    pub(crate) async fn drive_connect(
        &self,
        peer: PeerId,
        progress: Option<mpsc::UnboundedSender<SessionState>>,
    ) -> Result<SessionHandle> {
        let (gateway, registry) = self.registry()?;

        // Reserve the peer or resolve against an existing entry. The map
        // entry guard must not be held across an await point.
        let existing = match self.inner.sessions.entry(peer.clone()) {
            Entry::Occupied(occupied) => match occupied.get() {
                PeerSlot::Pending => return Err(Error::ConnectInProgress(peer)),
                PeerSlot::Live(session) => Some(Arc::clone(session)),
            },
            Entry::Vacant(vacant) => {
                vacant.insert(PeerSlot::Pending);
                None
            }
        };
        if let Some(session) = existing {
            // Reuse policy: a connect for an already-secured peer returns
            // the existing session instead of superseding it.
            let mode = session.lock().await.cipher_mode();
            tracing::debug!(peer = %peer, "reusing existing secured session");
            return Ok(SessionHandle {
                peer,
                mode,
                inner: Arc::clone(&self.inner),
            });
        }

        // From here on the reservation must be cleaned up on every exit
        // path, including task abort from stream-mode cancellation.
        let mut guard = PendingGuard {
            inner: Arc::clone(&self.inner),
            peer: peer.clone(),
            stage: Stage::Connect,
            armed: true,
        };

        let channel = match timeout(
            self.inner.config.connect_timeout,
            registry.transport.connect(&peer),
        )
        .await
        {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                return Err(Error::Connection {
                    peer,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(Error::Connection {
                    peer,
                    reason: "timed out opening channel".into(),
                });
            }
        };

        let mut session = Session::new(peer.clone(), channel);
        if let Some(tx) = &progress {
            let _ = tx.send(SessionState::Connecting);
        }

        // Authentication: first-success over the configured schemes, in
        // registration order. An empty list is the declared unauthenticated
        // mode and skips straight to securing.
        let suite = if registry.auth.is_empty() {
            tracing::debug!(peer = %peer, "no authentication plugins; session runs unauthenticated");
            None
        } else {
            guard.stage = Stage::Authenticate;
            self.advance(&mut session, SessionState::Authenticating, &progress)?;

            let mut accepted: Option<Option<String>> = None;
            for plugin in &registry.auth {
                let attempt = timeout(
                    self.inner.config.auth_timeout,
                    plugin.authenticate(&gateway, session.channel_mut()),
                )
                .await;
                match attempt {
                    Ok(Ok(outcome)) => {
                        self.inner.sink.emit(&LifecycleEvent::AuthAccepted {
                            peer: peer.clone(),
                            scheme: plugin.scheme_id().to_owned(),
                        });
                        session.bind_auth(plugin.scheme_id(), outcome.session_key);
                        accepted = Some(outcome.cipher_suite);
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(
                            peer = %peer,
                            scheme = plugin.scheme_id(),
                            "authentication scheme failed: {e}"
                        );
                    }
                    Err(_) => {
                        tracing::debug!(
                            peer = %peer,
                            scheme = plugin.scheme_id(),
                            "authentication scheme timed out"
                        );
                    }
                }
            }

            match accepted {
                Some(suite) => suite,
                None => {
                    // No leaked connections on the failure path.
                    let _ = session.close().await;
                    return Err(Error::Authentication {
                        peer,
                        schemes_tried: registry.auth.len(),
                    });
                }
            }
        };

        guard.stage = Stage::Secure;
        self.advance(&mut session, SessionState::Securing, &progress)?;

        let cipher = registry.select_cipher(suite.as_deref());
        session.activate_cipher(cipher);
        let mode = session.cipher_mode();
        self.inner.sink.emit(&LifecycleEvent::CipherActivated {
            peer: peer.clone(),
            mode: mode.clone(),
        });

        self.advance(&mut session, SessionState::Secured, &progress)?;
        self.inner.sink.emit(&LifecycleEvent::SessionSecured {
            peer: peer.clone(),
            mode: mode.clone(),
        });

        // No await points between disarming and publishing the session, so
        // stream-mode cancellation cannot strand the reservation.
        guard.disarm();
        self.inner.sessions.insert(
            peer.clone(),
            PeerSlot::Live(Arc::new(Mutex::new(session))),
        );

        Ok(SessionHandle {
            peer,
            mode,
            inner: Arc::clone(&self.inner),
        })
    }

    fn advance(
        &self,
        session: &mut Session,
        to: SessionState,
        progress: &Option<mpsc::UnboundedSender<SessionState>>,
    ) -> Result<()> {
        let from = session.state();
        session.transition_to(to)?;
        self.inner.sink.emit(&LifecycleEvent::StateChanged {
            peer: session.peer().clone(),
            from,
            to,
        });
        if let Some(tx) = progress {
            let _ = tx.send(to);
        }
        Ok(())
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the peer's reservation if the connect attempt unwinds before
/// publishing a live session. Covers both error returns and stream-mode
/// task aborts; the channel itself is owned by the unwinding future, so its
/// drop releases the transport resources.
struct PendingGuard {
    inner: Arc<Inner>,
    peer: PeerId,
    stage: Stage,
    armed: bool,
}

impl PendingGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner
                .sessions
                .remove_if(&self.peer, |_, slot| matches!(slot, PeerSlot::Pending));
            self.inner.sink.emit(&LifecycleEvent::SessionFailed {
                peer: self.peer.clone(),
                stage: self.stage,
            });
        }
    }
}

async fn close_live(inner: &Arc<Inner>, peer: &PeerId) -> Result<()> {
    let removed = inner
        .sessions
        .remove_if(peer, |_, slot| matches!(slot, PeerSlot::Live(_)));
    let Some((_, PeerSlot::Live(session))) = removed else {
        return Err(Error::SessionNotFound(peer.clone()));
    };
    session.lock().await.close().await?;
    inner
        .sink
        .emit(&LifecycleEvent::SessionClosed { peer: peer.clone() });
    Ok(())
}

/// Caller-facing reference to a secured session.
///
/// The session itself stays owned by the coordinator; the handle carries
/// only the peer identifier and the declared cipher mode. Clones refer to
/// the same session.
#[derive(Clone)]
pub struct SessionHandle {
    peer: PeerId,
    mode: CipherMode,
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("peer", &self.peer)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// The peer this session is established with.
    #[must_use]
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// The declared payload protection mode ([`CipherMode::PassThrough`]
    /// when no cryptographic plugins were configured).
    #[must_use]
    pub fn cipher_mode(&self) -> &CipherMode {
        &self.mode
    }

    /// Encrypt and send a payload to the peer.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on channel failure; the session is terminated
    /// and removed, requiring a fresh connect.
    pub async fn send(&self, plaintext: &[u8]) -> Result<()> {
        let session = self.live()?;
        let mut session = session.lock().await;
        let result = session.send_plaintext(plaintext).await;
        if let Err(e) = &result {
            self.teardown(&mut session, e).await;
        }
        result
    }

    /// Receive and decrypt a payload from the peer.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`] on channel failure, [`Error::Decryption`] on
    /// cipher integrity failure; either terminates the session.
    pub async fn receive(&self) -> Result<Vec<u8>> {
        let session = self.live()?;
        let mut session = session.lock().await;
        let result = session.recv_plaintext().await;
        if let Err(e) = &result {
            self.teardown(&mut session, e).await;
        }
        result
    }

    /// Close the session, releasing the channel and discarding key material.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] when the session was already closed or
    /// terminated.
    pub async fn close(&self) -> Result<()> {
        close_live(&self.inner, &self.peer).await
    }

    fn live(&self) -> Result<Arc<Mutex<Session>>> {
        match self.inner.sessions.get(&self.peer).map(|e| match e.value() {
            PeerSlot::Live(session) => Some(Arc::clone(session)),
            PeerSlot::Pending => None,
        }) {
            Some(Some(session)) => Ok(session),
            _ => Err(Error::SessionNotFound(self.peer.clone())),
        }
    }

    async fn teardown(&self, session: &mut Session, failure: &Error) {
        session.abort().await;
        self.inner
            .sessions
            .remove_if(&self.peer, |_, slot| matches!(slot, PeerSlot::Live(_)));
        self.inner.sink.emit(&LifecycleEvent::SessionFailed {
            peer: self.peer.clone(),
            stage: failure.stage(),
        });
    }
}
