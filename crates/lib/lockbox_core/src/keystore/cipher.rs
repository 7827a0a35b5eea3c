//! AES-256-GCM-SIV under a caller-supplied key and IV.
//!
//! Trade-off: the IV is the identity's fixed IV, not a per-message nonce.
//! GCM-SIV derives its keystream from the message itself, so reusing the IV
//! only reveals whether two fields of one identity hold the same plaintext.
//! Callers must not rely on these ciphertexts hiding equality.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use rand::RngCore;

use crate::auth::AuthError;
use crate::models::keys::{IV_SIZE, KEY_SIZE};

/// Authentication tag size (16 bytes).
const TAG_SIZE: usize = 16;

/// Generate a random 32-byte key.
pub fn generate_key() -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Generate a random 12-byte IV.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Encrypt `plaintext`, returning `ciphertext || tag`.
pub fn encrypt(
    plaintext: &[u8],
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> Result<Vec<u8>, AuthError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|e| AuthError::Encryption(format!("Key init failed: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| AuthError::Encryption(format!("Encryption failed: {e}")))
}

/// Decrypt `ciphertext || tag`. Fails on a wrong key/IV or tampered data.
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; KEY_SIZE],
    iv: &[u8; IV_SIZE],
) -> Result<Vec<u8>, AuthError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(AuthError::Encryption("Ciphertext too short".into()));
    }
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|e| AuthError::Encryption(format!("Key init failed: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|e| AuthError::Encryption(format!("Decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = generate_key();
        let iv = generate_iv();
        let messages: [&[u8]; 4] = [b"", b"a", b"correct horse battery staple", &[0xFF; 1024]];
        for message in messages {
            let sealed = encrypt(message, &key, &iv).unwrap();
            assert_eq!(sealed.len(), message.len() + TAG_SIZE);
            assert_eq!(decrypt(&sealed, &key, &iv).unwrap(), message);
        }
    }

    #[test]
    fn fixed_iv_is_deterministic() {
        let key = generate_key();
        let iv = generate_iv();
        let a = encrypt(b"same", &key, &iv).unwrap();
        let b = encrypt(b"same", &key, &iv).unwrap();
        assert_eq!(a, b);
    }

    fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
        a.iter().zip(b).map(|(x, y)| x ^ y).collect()
    }

    #[test]
    fn shared_iv_does_not_share_keystream() {
        let key = generate_key();
        let iv = generate_iv();
        let known = b"alice@example.com";
        let secret = b"S3cr3t-bank-pw!!!";
        let c1 = encrypt(known, &key, &iv).unwrap();
        let c2 = encrypt(secret, &key, &iv).unwrap();

        // Compare the ciphertext bodies only; the tags follow them.
        let body = known.len();
        assert_ne!(xor(&c1[..body], &c2[..body]), xor(known, secret));
        let recovered = xor(&xor(&c1[..body], &c2[..body]), known);
        assert_ne!(recovered.as_slice(), secret.as_slice());
    }

    #[test]
    fn wrong_key_or_iv_fails() {
        let key = generate_key();
        let iv = generate_iv();
        let sealed = encrypt(b"secret", &key, &iv).unwrap();
        assert!(decrypt(&sealed, &generate_key(), &iv).is_err());
        assert!(decrypt(&sealed, &key, &generate_iv()).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_key();
        let iv = generate_iv();
        let mut sealed = encrypt(b"do not tamper", &key, &iv).unwrap();
        sealed[0] ^= 0x01;
        assert!(decrypt(&sealed, &key, &iv).is_err());
    }

    #[test]
    fn short_ciphertext_fails() {
        let err = decrypt(&[0u8; 4], &generate_key(), &generate_iv()).unwrap_err();
        assert!(matches!(err, AuthError::Encryption(_)));
    }
}
