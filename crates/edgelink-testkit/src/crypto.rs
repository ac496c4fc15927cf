//! Cipher plugins: a pass-through identity cipher and a real stream cipher
//! built from the blake3 XOF with an appended integrity tag.

use edgelink_core::{CryptoError, CryptographicPlugin, SessionKey};

/// Cipher that returns payloads unchanged. Distinct from configuring no
/// ciphers at all: sessions using it report a named cipher, not
/// pass-through mode.
pub struct IdentityCipher;

impl CryptographicPlugin for IdentityCipher {
    fn cipher_id(&self) -> &str {
        "identity"
    }

    fn encrypt(&self, plaintext: &[u8], _key: &SessionKey) -> Vec<u8> {
        plaintext.to_vec()
    }

    fn decrypt(&self, ciphertext: &[u8], _key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
        Ok(ciphertext.to_vec())
    }
}

const TAG_LEN: usize = 16;
const MAC_CONTEXT: &str = "edgelink-testkit 2025 frame mac key";

/// Stream cipher over the blake3 extendable output, with a keyed-hash tag
/// so tampered ciphertext is detected on decrypt.
pub struct Blake3StreamCipher;

impl Blake3StreamCipher {
    fn stream_key(key: &SessionKey) -> [u8; 32] {
        *blake3::hash(key.as_bytes()).as_bytes()
    }

    fn mac_key(key: &SessionKey) -> [u8; 32] {
        blake3::derive_key(MAC_CONTEXT, key.as_bytes())
    }

    fn apply_keystream(data: &[u8], key: &SessionKey) -> Vec<u8> {
        let mut keystream = vec![0u8; data.len()];
        blake3::Hasher::new_keyed(&Self::stream_key(key))
            .finalize_xof()
            .fill(&mut keystream);
        data.iter().zip(&keystream).map(|(b, k)| b ^ k).collect()
    }

    fn tag(body: &[u8], key: &SessionKey) -> [u8; TAG_LEN] {
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&blake3::keyed_hash(&Self::mac_key(key), body).as_bytes()[..TAG_LEN]);
        tag
    }
}

impl CryptographicPlugin for Blake3StreamCipher {
    fn cipher_id(&self) -> &str {
        "blake3-stream"
    }

    fn encrypt(&self, plaintext: &[u8], key: &SessionKey) -> Vec<u8> {
        let mut frame = Self::apply_keystream(plaintext, key);
        frame.extend_from_slice(&Self::tag(&frame, key));
        frame
    }

    fn decrypt(&self, ciphertext: &[u8], key: &SessionKey) -> Result<Vec<u8>, CryptoError> {
        let Some((body, tag)) = ciphertext.split_at_checked(ciphertext.len().wrapping_sub(TAG_LEN))
        else {
            return Err(CryptoError::DecryptionFailed(
                "frame shorter than its tag".into(),
            ));
        };
        if tag != Self::tag(body, key) {
            return Err(CryptoError::DecryptionFailed("tag mismatch".into()));
        }
        Ok(Self::apply_keystream(body, key))
    }
}
