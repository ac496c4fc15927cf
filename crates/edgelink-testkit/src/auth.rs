//! Shared-secret challenge/response authentication.
//!
//! The gateway sends a tagged random nonce; the device answers with a
//! keyed blake3 hash of the nonce under the pre-shared secret. Both sides
//! then derive the session key from the secret and the nonce, so a fresh
//! key comes out of every exchange.

use async_trait::async_trait;
use edgelink_core::{
    AuthError, AuthOutcome, AuthenticationPlugin, GatewayId, PeerChannel, SessionKey,
};

pub(crate) const CHALLENGE_TAG: &[u8; 8] = b"EL-CHAL.";
pub(crate) const NONCE_LEN: usize = 16;

const SESSION_KEY_CONTEXT: &str = "edgelink-testkit 2025 session key";

/// The device-side answer to a challenge nonce.
pub(crate) fn challenge_response(secret: &[u8], nonce: &[u8]) -> blake3::Hash {
    blake3::keyed_hash(blake3::hash(secret).as_bytes(), nonce)
}

fn derive_session_key(secret: &[u8], nonce: &[u8]) -> SessionKey {
    let mut ikm = secret.to_vec();
    ikm.extend_from_slice(nonce);
    SessionKey::new(blake3::derive_key(SESSION_KEY_CONTEXT, &ikm).to_vec())
}

/// Pre-shared-key scheme over blake3 challenge/response.
pub struct SharedSecretAuth {
    scheme: String,
    secret: Vec<u8>,
    cipher_suite: Option<String>,
}

impl SharedSecretAuth {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            scheme: "blake3-psk".to_owned(),
            secret: secret.to_vec(),
            cipher_suite: None,
        }
    }

    /// Use a distinct scheme identifier, for registering several instances.
    #[must_use]
    pub fn named(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_owned();
        self
    }

    /// Report the given suite in the outcome, as a scheme with in-band
    /// cipher negotiation would.
    #[must_use]
    pub fn with_cipher_suite(mut self, suite: &str) -> Self {
        self.cipher_suite = Some(suite.to_owned());
        self
    }
}

#[async_trait]
impl AuthenticationPlugin for SharedSecretAuth {
    fn scheme_id(&self) -> &str {
        &self.scheme
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut frame = Vec::with_capacity(CHALLENGE_TAG.len() + NONCE_LEN);
        frame.extend_from_slice(CHALLENGE_TAG);
        frame.extend_from_slice(&nonce);
        channel.send(&frame).await?;

        let reply = channel.recv().await?;
        let reply: [u8; 32] = reply
            .try_into()
            .map_err(|bad: Vec<u8>| AuthError::Protocol(format!("{}-byte response", bad.len())))?;
        if blake3::Hash::from_bytes(reply) != challenge_response(&self.secret, &nonce) {
            return Err(AuthError::Rejected);
        }

        Ok(AuthOutcome {
            session_key: derive_session_key(&self.secret, &nonce),
            cipher_suite: self.cipher_suite.clone(),
        })
    }
}

/// Scheme that refuses every peer. Useful for exercising fallback order.
pub struct RejectingAuth {
    scheme: String,
}

impl RejectingAuth {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_owned(),
        }
    }
}

#[async_trait]
impl AuthenticationPlugin for RejectingAuth {
    fn scheme_id(&self) -> &str {
        &self.scheme
    }

    async fn authenticate(
        &self,
        _gateway: &GatewayId,
        _channel: &mut dyn PeerChannel,
    ) -> Result<AuthOutcome, AuthError> {
        Err(AuthError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{InMemoryTransport, VirtualDevice};
    use edgelink_core::{PeerId, TransportPlugin};

    const SECRET: &[u8] = b"orchard-gate-7";

    #[test]
    fn test_challenge_response_is_deterministic() {
        let a = challenge_response(SECRET, &[9u8; NONCE_LEN]);
        let b = challenge_response(SECRET, &[9u8; NONCE_LEN]);
        assert_eq!(a, b);
        assert_ne!(a, challenge_response(b"other", &[9u8; NONCE_LEN]));
    }

    #[test]
    fn test_session_key_binds_nonce() {
        let k1 = derive_session_key(SECRET, &[1u8; NONCE_LEN]);
        let k2 = derive_session_key(SECRET, &[2u8; NONCE_LEN]);
        assert_ne!(k1.as_bytes(), k2.as_bytes());
        assert_eq!(k1.len(), 32);
    }

    #[tokio::test]
    async fn test_exchange_succeeds_against_matching_device() {
        let transport =
            InMemoryTransport::new(vec![VirtualDevice::new("sensor-1", SECRET)]);
        let mut channel = transport.connect(&PeerId::from("sensor-1")).await.unwrap();

        let outcome = SharedSecretAuth::new(SECRET)
            .authenticate(&GatewayId::from("gw"), channel.as_mut())
            .await
            .unwrap();
        assert_eq!(outcome.session_key.len(), 32);
        assert!(outcome.cipher_suite.is_none());
    }

    #[tokio::test]
    async fn test_exchange_rejected_on_wrong_secret() {
        let transport =
            InMemoryTransport::new(vec![VirtualDevice::new("sensor-1", SECRET)]);
        let mut channel = transport.connect(&PeerId::from("sensor-1")).await.unwrap();

        let result = SharedSecretAuth::new(b"wrong")
            .authenticate(&GatewayId::from("gw"), channel.as_mut())
            .await;
        assert!(matches!(result, Err(AuthError::Rejected)));
    }
}
