//! Custodial signing-key encryption.
//!
//! Signing keys are generated here and immediately sealed under the
//! process-wide AES-256-GCM master key. The plaintext key exists only
//! inside [`KeyCustody::decrypt`] callers for the duration of a signing
//! call; it is never logged, persisted, or handed to other components.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use secrecy::{ExposeSecret, SecretBox};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};

use crate::config::CustodyConfig;
use crate::error::CustodyError;

const NONCE_LEN: usize = 12;
const KEYPAIR_LEN: usize = 64;

/// Encrypted signing key at rest: `nonce || ciphertext`.
///
/// The layout is self-describing enough for decryption; the nonce is fresh
/// per encryption and carries no secret value.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedKey(Vec<u8>);

impl EncryptedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedKey({} bytes)", self.0.len())
    }
}

/// Owns the symmetric master key for the whole process lifetime.
pub struct KeyCustody {
    cipher: Aes256Gcm,
}

impl KeyCustody {
    /// Build the custody cipher from configuration.
    ///
    /// Fails with [`CustodyError::Unavailable`] when the master key is
    /// absent or malformed; callers treat that as fatal at startup.
    pub fn new(config: &CustodyConfig) -> Result<Self, CustodyError> {
        let key_bytes = hex::decode(config.master_key_hex.expose_secret())
            .map_err(|_| CustodyError::Unavailable("master key is not valid hex".to_string()))?;
        if key_bytes.len() != 32 {
            return Err(CustodyError::Unavailable(format!(
                "master key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Ok(Self { cipher })
    }

    /// Generate a fresh signing key and return its public address together
    /// with the sealed private key. The plaintext never leaves this call.
    pub fn generate(&self) -> Result<(Pubkey, EncryptedKey), CustodyError> {
        let keypair = Keypair::new();
        let address = keypair.pubkey();
        let plaintext = SecretBox::new(Box::new(keypair.to_bytes()));
        let encrypted = self.encrypt(plaintext.expose_secret())?;
        Ok((address, encrypted))
    }

    fn encrypt(&self, plaintext: &[u8; KEYPAIR_LEN]) -> Result<EncryptedKey, CustodyError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CustodyError::Unavailable("sealing the signing key failed".to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(EncryptedKey(out))
    }

    /// Decrypt a sealed signing key for one signing call.
    ///
    /// Authentication failure and malformed input are indistinguishable to
    /// callers: both are [`CustodyError::DecryptionFailed`].
    pub fn decrypt(&self, encrypted: &EncryptedKey) -> Result<Keypair, CustodyError> {
        if encrypted.0.len() <= NONCE_LEN {
            return Err(CustodyError::DecryptionFailed);
        }
        let (nonce, ciphertext) = encrypted.0.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CustodyError::DecryptionFailed)?;
        if plaintext.len() != KEYPAIR_LEN {
            return Err(CustodyError::DecryptionFailed);
        }
        let plaintext = SecretBox::new(plaintext.into_boxed_slice());
        Keypair::from_bytes(plaintext.expose_secret()).map_err(|_| CustodyError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_custody() -> KeyCustody {
        let config = CustodyConfig {
            master_key_hex: SecretString::from(
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            ),
        };
        KeyCustody::new(&config).unwrap()
    }

    #[test]
    fn rejects_malformed_master_key() {
        let config = CustodyConfig {
            master_key_hex: SecretString::from("not-hex"),
        };
        assert!(matches!(
            KeyCustody::new(&config),
            Err(CustodyError::Unavailable(_))
        ));

        let config = CustodyConfig {
            master_key_hex: SecretString::from("aabb"),
        };
        assert!(matches!(
            KeyCustody::new(&config),
            Err(CustodyError::Unavailable(_))
        ));
    }

    #[test]
    fn generated_key_round_trips() {
        let custody = test_custody();
        let (address, encrypted) = custody.generate().unwrap();
        let keypair = custody.decrypt(&encrypted).unwrap();
        assert_eq!(keypair.pubkey(), address);
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let custody = test_custody();
        let keypair = Keypair::new();
        let a = custody.encrypt(&keypair.to_bytes()).unwrap();
        let b = custody.encrypt(&keypair.to_bytes()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_ne!(&a.as_bytes()[..NONCE_LEN], &b.as_bytes()[..NONCE_LEN]);
    }

    #[test]
    fn tampered_ciphertext_never_yields_a_key() {
        let custody = test_custody();
        let (_, encrypted) = custody.generate().unwrap();

        for bit in [0usize, 7, 64] {
            let mut bytes = encrypted.as_bytes().to_vec();
            let idx = bytes.len() - 1 - bit / 8;
            bytes[idx] ^= 1 << (bit % 8);
            let tampered = EncryptedKey::from_bytes(bytes);
            assert!(matches!(
                custody.decrypt(&tampered),
                Err(CustodyError::DecryptionFailed)
            ));
        }
    }

    #[test]
    fn truncated_input_fails_closed() {
        let custody = test_custody();
        let short = EncryptedKey::from_bytes(vec![0u8; NONCE_LEN]);
        assert!(matches!(
            custody.decrypt(&short),
            Err(CustodyError::DecryptionFailed)
        ));
    }

    #[test]
    fn different_master_key_cannot_decrypt() {
        let custody_a = test_custody();
        let (_, encrypted) = custody_a.generate().unwrap();

        let config = CustodyConfig {
            master_key_hex: SecretString::from(
                "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100",
            ),
        };
        let custody_b = KeyCustody::new(&config).unwrap();
        assert!(matches!(
            custody_b.decrypt(&encrypted),
            Err(CustodyError::DecryptionFailed)
        ));
    }
}
