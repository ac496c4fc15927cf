//! Plugin registry.
//!
//! Holds the configured transport instance and the ordered cryptographic
//! and authentication plugin lists. Order matters: authentication follows a
//! first-success policy in registration order, and cipher selection falls
//! back to the first registered plugin when no suite was negotiated.

use crate::error::{Error, Result};
use crate::plugin::{AuthenticationPlugin, CryptographicPlugin, TransportPlugin};
use std::sync::Arc;

/// Plugin set supplied to [`Coordinator::initialize`](crate::Coordinator::initialize).
///
/// Crypto and auth lists may be empty; sessions then run in declared
/// pass-through / unauthenticated mode. A transport must be present before
/// initialization succeeds.
#[derive(Default)]
pub struct PluginRegistry {
    transport: Option<Arc<dyn TransportPlugin>>,
    crypto: Vec<Arc<dyn CryptographicPlugin>>,
    auth: Vec<Arc<dyn AuthenticationPlugin>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transport plugin.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn TransportPlugin>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Append a cryptographic plugin. Registration order is selection order.
    #[must_use]
    pub fn with_crypto(mut self, plugin: Arc<dyn CryptographicPlugin>) -> Self {
        self.crypto.push(plugin);
        self
    }

    /// Append an authentication plugin. Registration order is trial order.
    #[must_use]
    pub fn with_auth(mut self, plugin: Arc<dyn AuthenticationPlugin>) -> Self {
        self.auth.push(plugin);
        self
    }

    /// Validate the registry into its active form.
    pub(crate) fn activate(self) -> Result<ActiveRegistry> {
        let transport = self
            .transport
            .ok_or_else(|| Error::configuration("transport plugin is required"))?;
        Ok(ActiveRegistry {
            transport,
            crypto: self.crypto,
            auth: self.auth,
        })
    }
}

/// Validated registry held by an initialized coordinator.
pub(crate) struct ActiveRegistry {
    pub(crate) transport: Arc<dyn TransportPlugin>,
    pub(crate) crypto: Vec<Arc<dyn CryptographicPlugin>>,
    pub(crate) auth: Vec<Arc<dyn AuthenticationPlugin>>,
}

impl ActiveRegistry {
    /// Pick the cipher for a session: first plugin whose identifier matches
    /// the negotiated suite, else the first registered plugin, else `None`
    /// (declared pass-through).
    pub(crate) fn select_cipher(
        &self,
        suite: Option<&str>,
    ) -> Option<Arc<dyn CryptographicPlugin>> {
        suite
            .and_then(|wanted| self.crypto.iter().find(|p| p.cipher_id() == wanted))
            .or_else(|| self.crypto.first())
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionKey;
    use crate::plugin::CryptoError;

    struct NamedCipher(&'static str);

    impl CryptographicPlugin for NamedCipher {
        fn cipher_id(&self) -> &str {
            self.0
        }
        fn encrypt(&self, plaintext: &[u8], _key: &SessionKey) -> Vec<u8> {
            plaintext.to_vec()
        }
        fn decrypt(
            &self,
            ciphertext: &[u8],
            _key: &SessionKey,
        ) -> std::result::Result<Vec<u8>, CryptoError> {
            Ok(ciphertext.to_vec())
        }
    }

    #[test]
    fn test_activate_requires_transport() {
        let result = PluginRegistry::new().activate();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_cipher_selection_by_suite() {
        let registry = ActiveRegistry {
            transport: unreachable_transport(),
            crypto: vec![Arc::new(NamedCipher("rc4")), Arc::new(NamedCipher("xor"))],
            auth: Vec::new(),
        };

        let picked = registry.select_cipher(Some("xor")).unwrap();
        assert_eq!(picked.cipher_id(), "xor");
    }

    #[test]
    fn test_cipher_selection_falls_back_to_first() {
        let registry = ActiveRegistry {
            transport: unreachable_transport(),
            crypto: vec![Arc::new(NamedCipher("rc4")), Arc::new(NamedCipher("xor"))],
            auth: Vec::new(),
        };

        // Unknown suite and no suite both land on the first registered plugin
        assert_eq!(
            registry.select_cipher(Some("aes")).unwrap().cipher_id(),
            "rc4"
        );
        assert_eq!(registry.select_cipher(None).unwrap().cipher_id(), "rc4");
    }

    #[test]
    fn test_empty_crypto_list_selects_nothing() {
        let registry = ActiveRegistry {
            transport: unreachable_transport(),
            crypto: Vec::new(),
            auth: Vec::new(),
        };
        assert!(registry.select_cipher(None).is_none());
    }

    fn unreachable_transport() -> Arc<dyn TransportPlugin> {
        use crate::identity::PeerId;
        use crate::plugin::{Discovery, PeerChannel, TransportError};
        use async_trait::async_trait;

        struct NoTransport;

        #[async_trait]
        impl TransportPlugin for NoTransport {
            fn transport_id(&self) -> &str {
                "none"
            }
            async fn discover(&self) -> std::result::Result<Discovery, TransportError> {
                Err(TransportError::ScanFailed("not a real transport".into()))
            }
            async fn connect(
                &self,
                _peer: &PeerId,
            ) -> std::result::Result<Box<dyn PeerChannel>, TransportError> {
                Err(TransportError::Unreachable("not a real transport".into()))
            }
        }

        Arc::new(NoTransport)
    }
}
