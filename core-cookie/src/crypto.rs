//! CryptoJS-compatible AES-256-CBC.
//!
//! CookieCloud encrypts with `CryptoJS.AES.encrypt(text, password)`: the
//! output is base64 of `"Salted__" || salt(8) || ciphertext`, with key and IV
//! derived by OpenSSL's `EVP_BytesToKey` (MD5, one round).

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use md5::{Digest, Md5};

use crate::error::{CookieError, Result};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

const SALT_MAGIC: &[u8] = b"Salted__";
const SALT_LEN: usize = 8;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// `md5hex(uuid + "-" + key)[..16]`
pub fn derive_password(uuid: &str, key: &str) -> String {
    let digest = Md5::digest(format!("{}-{}", uuid, key).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(16);
    hex
}

/// OpenSSL `EVP_BytesToKey` with MD5: `D_i = MD5(D_{i-1} || password || salt)`.
pub fn evp_bytes_to_key(password: &[u8], salt: &[u8]) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut material = Vec::with_capacity(KEY_LEN + IV_LEN);
    let mut previous: Vec<u8> = Vec::new();

    while material.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(password);
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        material.extend_from_slice(&previous);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&material[..KEY_LEN]);
    iv.copy_from_slice(&material[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

/// Decrypt a base64 `Salted__` blob with `password`.
///
/// A wrong password almost always fails the PKCS#7 check; callers that need
/// certainty validate the plaintext shape as well.
pub fn decrypt(encrypted_b64: &str, password: &str) -> Result<Vec<u8>> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(encrypted_b64.trim())
        .map_err(|e| CookieError::Decrypt(format!("invalid base64: {}", e)))?;

    if raw.len() < SALT_MAGIC.len() + SALT_LEN || !raw.starts_with(SALT_MAGIC) {
        return Err(CookieError::Decrypt("missing Salted__ header".to_string()));
    }

    let salt = &raw[SALT_MAGIC.len()..SALT_MAGIC.len() + SALT_LEN];
    let ciphertext = &raw[SALT_MAGIC.len() + SALT_LEN..];
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CookieError::Decrypt(format!(
            "ciphertext length {} is not a block multiple",
            ciphertext.len()
        )));
    }

    let (key, iv) = evp_bytes_to_key(password.as_bytes(), salt);
    Aes256CbcDec::new_from_slices(&key, &iv)
        .map_err(|e| CookieError::Decrypt(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CookieError::Decrypt("bad padding (wrong key?)".to_string()))
}

/// Inverse of [`decrypt`] for a caller-chosen salt.
pub fn encrypt(plaintext: &[u8], password: &str, salt: [u8; SALT_LEN]) -> Result<String> {
    let (key, iv) = evp_bytes_to_key(password.as_bytes(), &salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .map_err(|e| CookieError::Decrypt(e.to_string()))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut raw = Vec::with_capacity(SALT_MAGIC.len() + SALT_LEN + ciphertext.len());
    raw.extend_from_slice(SALT_MAGIC);
    raw.extend_from_slice(&salt);
    raw.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(raw))
}
