//! Hybrid RSA/AES request envelopes.
//!
//! Every request body is encrypted under a fresh random passphrase
//! ([cipher]), the passphrase itself under the backend's RSA key with
//! PKCS#1 v1.5 padding. The two ciphertexts travel together as
//! `hex(rsa) "::" aes` in the `data` field of an [Envelope].
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::cipher;
use crate::definitions::Payload;

/// SubjectPublicKeyInfo (DER, base64) of the backend key.
const BACKEND_PUBLIC_KEY: &str = "\
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEA4sDTEJhYgx1UlP7nzQte\
P/nGyNyPfge4t83kBXEJTkxAYRBJ7Q3tICQscZ1FFIaFrnCaYPtcqSiXADAlrGvr\
rISJaK6eKQn6hOhpSwaDAJ99Rj5wIB6FSC23UW0m0C1cieBPMpagUYOdtqnLtJOr\
ZYDRIXesvbsbgo02IYmVikaRY6dL/fjcipBY2aCvX5DKeuesx3weMp6/SRq2eCWK\
3L70FXRfKBNirVqI4cSGrOX6d6ieKGDRpde4s8pRUyg5YttuDAAnHm8wBMSPfRC6\
cJC49vGN+lAW7U/ecqhHgPdfiCqW2IEn/SJzHiFcD+YDS8eqBtnYAZ2C82GMn4Nk\
sQIDAQAB";

/// Random bytes behind every passphrase, before base64 encoding.
pub const PASSPHRASE_ENTROPY: usize = 100;

const SEPARATOR: &str = "::";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("payload could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Cipher(#[from] cipher::Error),
    #[error("rsa operation failed: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("invalid public key: {0}")]
    PublicKey(#[from] rsa::pkcs8::spki::Error),
    #[error("invalid private key: {0}")]
    PrivateKey(#[from] rsa::pkcs8::Error),
    #[error("invalid base64 in key: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("envelope data is malformed")]
    Malformed,
}

/// The JSON body posted to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: String,
    pub key: String,
}

/// Seals request payloads for one backend public key.
#[derive(Debug, Clone)]
pub struct Sealer {
    public_key: RsaPublicKey,
}

impl Sealer {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }

    /// Sealer for the production backend key.
    pub fn backend() -> Result<Self, Error> {
        let der = base64::decode(BACKEND_PUBLIC_KEY)?;
        Ok(Self::new(RsaPublicKey::from_public_key_der(&der)?))
    }

    pub fn from_public_key_pem(pem: &str) -> Result<Self, Error> {
        Ok(Self::new(RsaPublicKey::from_public_key_pem(pem)?))
    }

    pub fn seal(&self, payload: &Payload, session_key: &str) -> Result<Envelope, Error> {
        let json = Zeroizing::new(serde_json::to_vec(payload)?);
        Ok(Envelope {
            data: self.seal_bytes(&json)?,
            key: session_key.to_string(),
        })
    }

    fn seal_bytes(&self, plaintext: &[u8]) -> Result<String, Error> {
        let passphrase = generate_passphrase();
        let encrypted_key = self.public_key.encrypt(
            &mut rand::thread_rng(),
            Pkcs1v15Encrypt,
            passphrase.as_bytes(),
        )?;
        let encrypted_body = cipher::encrypt(plaintext, passphrase.as_bytes())?;
        Ok(format!(
            "{}{SEPARATOR}{encrypted_body}",
            hex::encode(encrypted_key)
        ))
    }
}

/// The backend side of [Sealer], used to inspect envelopes.
pub struct Opener {
    private_key: RsaPrivateKey,
}

impl Opener {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, Error> {
        Ok(Self::new(RsaPrivateKey::from_pkcs8_pem(pem)?))
    }

    /// Recovers the serialized payload from an envelope.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, Error> {
        let (encrypted_key, encrypted_body) = envelope
            .data
            .split_once(SEPARATOR)
            .ok_or(Error::Malformed)?;
        let encrypted_key = hex::decode(encrypted_key).map_err(|_| Error::Malformed)?;
        let passphrase = Zeroizing::new(self.private_key.decrypt(Pkcs1v15Encrypt, &encrypted_key)?);
        Ok(cipher::decrypt(encrypted_body, &passphrase)?)
    }
}

fn generate_passphrase() -> Zeroizing<String> {
    let mut entropy = Zeroizing::new([0u8; PASSPHRASE_ENTROPY]);
    rand::thread_rng().fill_bytes(&mut entropy[..]);
    Zeroizing::new(base64::encode(&entropy[..]))
}

#[cfg(test)]
mod test {
    use super::*;

    static PRIVATE_KEY: &str = include_str!("../../tests/data/test_rsa_private.pem");
    static PUBLIC_KEY: &str = include_str!("../../tests/data/test_rsa_public.pem");

    #[test]
    fn backend_key_parses() {
        Sealer::backend().unwrap();
    }

    #[test]
    fn passphrase_is_long_enough() {
        let passphrase = generate_passphrase();
        assert_eq!(base64::decode(passphrase.as_bytes()).unwrap().len(), 100);
        assert_ne!(*passphrase, *generate_passphrase());
    }

    #[test]
    fn seal_and_open() {
        let payload = Payload::new()
            .with("action", "submit")
            .with("USER_NAME", "jane")
            .with("USER_PIN", "12345");

        let sealer = Sealer::from_public_key_pem(PUBLIC_KEY).unwrap();
        let envelope = sealer.seal(&payload, "session-key").unwrap();
        assert_eq!(envelope.key, "session-key");

        let (key_hex, _) = envelope.data.split_once("::").unwrap();
        // 2048 bit modulus.
        assert_eq!(hex::decode(key_hex).unwrap().len(), 256);

        let opened = Opener::from_pkcs8_pem(PRIVATE_KEY)
            .unwrap()
            .open(&envelope)
            .unwrap();
        assert_eq!(opened, serde_json::to_vec(&payload).unwrap());
    }

    #[test]
    fn envelopes_differ_per_request() {
        let sealer = Sealer::from_public_key_pem(PUBLIC_KEY).unwrap();
        let payload = Payload::new().with("action", "back");
        let first = sealer.seal(&payload, "k").unwrap();
        let second = sealer.seal(&payload, "k").unwrap();
        assert_ne!(first.data, second.data);
    }

    #[test]
    fn malformed_envelope() {
        let opener = Opener::from_pkcs8_pem(PRIVATE_KEY).unwrap();
        let envelope = Envelope {
            data: "no separator".into(),
            key: "k".into(),
        };
        assert!(matches!(opener.open(&envelope), Err(Error::Malformed)));
    }
}
