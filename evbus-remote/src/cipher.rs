//! 负载加解密（Cipher）
//!
//! `AesGcmCipher` 以口令的 SHA-256 摘要作为 AES-256-GCM 密钥，每条消息随机 96 位 nonce，
//! 线上格式为 `v1:<base64(nonce || ciphertext)>`。
//!
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use evbus_domain::error::{BusError, BusResult};
use rand::RngCore;
use sha2::{Digest, Sha256};

const VERSION_PREFIX: &str = "v1:";
const NONCE_LEN: usize = 12;

/// 负载加解密能力
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> BusResult<String>;
    fn decrypt(&self, ciphertext: &str) -> BusResult<String>;
}

#[derive(Clone)]
pub struct AesGcmCipher {
    cipher: Aes256Gcm,
}

impl AesGcmCipher {
    pub fn from_passphrase(passphrase: &str) -> BusResult<Self> {
        if passphrase.is_empty() {
            return Err(BusError::config("passphrase is required when encryption is enabled"));
        }

        let key = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|e| BusError::cipher(e.to_string()))?;
        Ok(Self { cipher })
    }
}

impl Cipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &str) -> BusResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|e| BusError::cipher(format!("encrypt: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(format!("{VERSION_PREFIX}{}", STANDARD.encode(out)))
    }

    fn decrypt(&self, ciphertext: &str) -> BusResult<String> {
        let encoded = ciphertext
            .strip_prefix(VERSION_PREFIX)
            .ok_or_else(|| BusError::cipher("unsupported ciphertext version"))?;
        let data = STANDARD
            .decode(encoded)
            .map_err(|e| BusError::cipher(format!("base64: {e}")))?;

        if data.len() < NONCE_LEN {
            return Err(BusError::cipher("ciphertext too short (missing nonce)"));
        }
        let (nonce_bytes, body) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|e| BusError::cipher(format!("decrypt: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| BusError::cipher(format!("utf8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypts_what_it_encrypts() {
        let cipher = AesGcmCipher::from_passphrase("a passphrase").unwrap();
        let sealed = cipher.encrypt(r#"{"hello":"world"}"#).unwrap();

        assert!(sealed.starts_with("v1:"));
        assert_eq!(cipher.decrypt(&sealed).unwrap(), r#"{"hello":"world"}"#);
    }

    #[test]
    fn nonce_differs_per_message() {
        let cipher = AesGcmCipher::from_passphrase("a passphrase").unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn wrong_passphrase_fails() {
        let sealed = AesGcmCipher::from_passphrase("right")
            .unwrap()
            .encrypt("secret")
            .unwrap();
        let err = AesGcmCipher::from_passphrase("wrong")
            .unwrap()
            .decrypt(&sealed)
            .unwrap_err();
        assert!(matches!(err, BusError::Cipher { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        let cipher = AesGcmCipher::from_passphrase("p").unwrap();
        assert!(cipher.decrypt("not encrypted").is_err());
        assert!(cipher.decrypt("v1:%%%").is_err());
        assert!(cipher.decrypt("v1:AAAA").is_err());
    }

    #[test]
    fn empty_passphrase_is_rejected() {
        assert!(matches!(
            AesGcmCipher::from_passphrase("").err().unwrap(),
            BusError::Config { .. }
        ));
    }
}
