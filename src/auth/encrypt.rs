//! Account password encryption for the login endpoint.
//!
//! The login endpoint does not accept the password in clear. It expects
//! `"{epoch_ms}:{password}"` encrypted with RSA PKCS#1 v1.5 against the
//! service's public key, base64 encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};

use crate::error::YuqueError;

/// Turns a clear-text password into the value the login endpoint expects.
pub trait PasswordEncryptor: Send + Sync {
    /// Encrypts `password`.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::Encryption`] when encryption fails.
    fn encrypt(&self, password: &str) -> Result<String, YuqueError>;
}

/// RSA PKCS#1 v1.5 encryptor over a PEM public key.
#[derive(Debug, Clone)]
pub struct RsaPasswordEncryptor {
    key: RsaPublicKey,
}

impl RsaPasswordEncryptor {
    /// Parses an SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) PEM.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] when the PEM is not an RSA public key.
    pub fn from_public_key_pem(pem: &str) -> Result<Self, YuqueError> {
        let pem = pem.trim();
        RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map(|key| Self { key })
            .map_err(|error| {
                YuqueError::missing_config(format!("invalid login public key: {error}"))
            })
    }

    /// Encrypts `password` stamped with the given epoch milliseconds.
    fn encrypt_at(&self, password: &str, now_ms: i64) -> Result<String, YuqueError> {
        let payload = format!("{now_ms}:{password}");
        let mut rng = rand::thread_rng();
        let cipher = self
            .key
            .encrypt(&mut rng, Pkcs1v15Encrypt, payload.as_bytes())
            .map_err(|error| YuqueError::Encryption {
                reason: error.to_string(),
            })?;
        Ok(STANDARD.encode(cipher))
    }
}

impl PasswordEncryptor for RsaPasswordEncryptor {
    fn encrypt(&self, password: &str) -> Result<String, YuqueError> {
        self.encrypt_at(password, Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};

    use super::*;

    fn keypair() -> (RsaPrivateKey, String) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        (private, pem)
    }

    #[test]
    fn test_encrypt_round_trips_with_private_key() {
        let (private, pem) = keypair();
        let encryptor = RsaPasswordEncryptor::from_public_key_pem(&pem).unwrap();

        let encoded = encryptor.encrypt_at("hunter2", 1_700_000_000_000).unwrap();
        let cipher = STANDARD.decode(encoded).unwrap();
        let plain = private.decrypt(Pkcs1v15Encrypt, &cipher).unwrap();
        assert_eq!(plain, b"1700000000000:hunter2");
    }

    #[test]
    fn test_encrypt_output_is_randomized() {
        let (_, pem) = keypair();
        let encryptor = RsaPasswordEncryptor::from_public_key_pem(&pem).unwrap();
        let first = encryptor.encrypt_at("pw", 1).unwrap();
        let second = encryptor.encrypt_at("pw", 1).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_invalid_pem_is_config_error() {
        let err = RsaPasswordEncryptor::from_public_key_pem("not a key").unwrap_err();
        assert!(matches!(err, YuqueError::MissingConfig { .. }));
    }
}
