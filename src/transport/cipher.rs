//! Passphrase based AES-256-CBC in the OpenSSL `Salted__` format.
//!
//! The key and IV are derived from the passphrase and a random 8 byte salt
//! with `EVP_BytesToKey` (one MD5 round). The output is
//! `base64("Salted__" || salt || ciphertext)`, which the backend decrypts
//! with the same derivation.
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use rand::RngCore;
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const MAGIC: &[u8; 8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext does not start with the salted header")]
    MissingSalt,
    #[error("invalid key or iv length")]
    InvalidLength,
    #[error("decryption failed")]
    Unpad,
}

/// Encrypts `plaintext` under `passphrase` with a fresh random salt.
pub fn encrypt(plaintext: &[u8], passphrase: &[u8]) -> Result<String, Error> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encrypt_with_salt(plaintext, passphrase, &salt)
}

pub(crate) fn encrypt_with_salt(
    plaintext: &[u8],
    passphrase: &[u8],
    salt: &[u8; SALT_LEN],
) -> Result<String, Error> {
    let (key, iv) = derive_key_iv(passphrase, salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(&key[..], &iv[..])
        .map_err(|_| Error::InvalidLength)?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&ciphertext);
    Ok(base64::encode(out))
}

/// Reverses [encrypt].
pub fn decrypt(ciphertext: &str, passphrase: &[u8]) -> Result<Vec<u8>, Error> {
    let raw = base64::decode(ciphertext.trim())?;
    let body = raw.strip_prefix(MAGIC.as_slice()).ok_or(Error::MissingSalt)?;
    if body.len() < SALT_LEN {
        return Err(Error::MissingSalt);
    }
    let (salt, body) = body.split_at(SALT_LEN);

    let (key, iv) = derive_key_iv(passphrase, salt);
    Aes256CbcDec::new_from_slices(&key[..], &iv[..])
        .map_err(|_| Error::InvalidLength)?
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| Error::Unpad)
}

/// `EVP_BytesToKey` with MD5 and a single iteration.
fn derive_key_iv(
    passphrase: &[u8],
    salt: &[u8],
) -> (Zeroizing<[u8; KEY_LEN]>, Zeroizing<[u8; IV_LEN]>) {
    let mut material = Zeroizing::new(Vec::with_capacity(KEY_LEN + IV_LEN + 16));
    let mut previous: Vec<u8> = Vec::new();
    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    let mut iv = Zeroizing::new([0u8; IV_LEN]);
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}
