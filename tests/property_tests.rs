//! Property-based tests for the testkit cipher plugins.

use edgelink_core::{CryptographicPlugin, SessionKey};
use edgelink_testkit::Blake3StreamCipher;
use proptest::prelude::*;

proptest! {
    /// Decrypting an encrypted payload under the same key restores it,
    /// for any payload and any key material.
    #[test]
    fn prop_stream_cipher_roundtrip(
        payload in proptest::collection::vec(any::<u8>(), 0..512),
        key_bytes in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let cipher = Blake3StreamCipher;
        let key = SessionKey::new(key_bytes);
        let frame = cipher.encrypt(&payload, &key);
        prop_assert_eq!(cipher.decrypt(&frame, &key).unwrap(), payload);
    }

    /// Flipping any single bit of the frame is detected on decrypt.
    #[test]
    fn prop_tampered_frame_rejected(
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        key_bytes in proptest::collection::vec(any::<u8>(), 1..64),
        flip in any::<proptest::sample::Index>(),
        bit in 0u8..8,
    ) {
        let cipher = Blake3StreamCipher;
        let key = SessionKey::new(key_bytes);
        let mut frame = cipher.encrypt(&payload, &key);
        let index = flip.index(frame.len());
        frame[index] ^= 1 << bit;
        prop_assert!(cipher.decrypt(&frame, &key).is_err());
    }

    /// A frame never decrypts under a different key.
    #[test]
    fn prop_wrong_key_rejected(
        payload in proptest::collection::vec(any::<u8>(), 0..256),
        key_a in proptest::collection::vec(any::<u8>(), 1..64),
        key_b in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        prop_assume!(key_a != key_b);
        let cipher = Blake3StreamCipher;
        let frame = cipher.encrypt(&payload, &SessionKey::new(key_a));
        prop_assert!(cipher.decrypt(&frame, &SessionKey::new(key_b)).is_err());
    }
}
