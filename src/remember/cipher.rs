// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, Iv, IvSizeUser, Key, KeyIvInit, Unsigned};
use once_cell::sync::Lazy;
use rand::Rng;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{
    error::{self, Result},
    rng,
};

pub const KEY_BYTES: usize = 32;

const MAC_BYTES: usize = 32;

#[derive(Clone)]
struct KeyMaterial([u8; KEY_BYTES]);

impl secrecy::Zeroize for KeyMaterial {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl secrecy::CloneableSecret for KeyMaterial {}

/// The symmetric key used both to seal and to unseal remembered-identity
/// records. The cipher is symmetric, so a single key always serves as the
/// whole encryption/decryption pair.
#[derive(Clone)]
pub struct CipherKey(Secret<KeyMaterial>);

impl CipherKey {
    pub fn from_bytes(bytes: [u8; KEY_BYTES]) -> Self {
        Self(Secret::new(KeyMaterial(bytes)))
    }

    /// Parses a base64-encoded key, as produced by encoding the output of
    /// [`CipherKey::random`].
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::decode(encoded).map_err(error::Crypto::KeyEncoding)?;
        let bytes: [u8; KEY_BYTES] = bytes.try_into().map_err(|rejected: Vec<u8>| {
            error::Crypto::KeyLength(KEY_BYTES, rejected.len())
        })?;

        Ok(Self::from_bytes(bytes))
    }

    pub fn random() -> Self {
        Self::from_bytes(rng::map(|rng| rng.gen()))
    }

    fn expose(&self) -> &[u8; KEY_BYTES] {
        &self.0.expose_secret().0
    }
}

/// The key every remember-me manager starts out with.
///
/// This key ships in public source code, so anyone can reconstruct it and
/// unseal records produced with it. Configure your own key with
/// [`CipherKey::random`] (persisting the base64 encoding in your application
/// configuration) before any production use.
pub static DEFAULT_CIPHER_KEY: Lazy<CipherKey> =
    Lazy::new(|| CipherKey::from_bytes(*b"palisade.insecure.default.key.00"));

fn compute_mac<KeyT, PayloadT, IvT>(key: KeyT, payload: PayloadT, iv: IvT) -> [u8; MAC_BYTES]
where
    KeyT: AsRef<[u8]>,
    PayloadT: AsRef<[u8]>,
    IvT: AsRef<[u8]>,
{
    Sha256::new_with_prefix(Sha256::digest(key))
        .chain_update(payload)
        .chain_update(iv)
        .finalize()
        .into()
}

/// The self-describing sealed form of a record: the IV and authentication
/// tag travel with the ciphertext, so unsealing needs nothing but the key,
/// and a wrong key or tampered payload fails deterministically.
#[serde_as]
#[derive(Deserialize, Serialize)]
struct SealedRecord {
    #[serde_as(as = "Base64")]
    iv: [u8; <cbc::Encryptor<aes::Aes256> as IvSizeUser>::IvSize::USIZE],
    #[serde_as(as = "Base64")]
    mac: [u8; MAC_BYTES],
    #[serde_as(as = "Base64")]
    message: Vec<u8>,
}

pub fn encrypt(key: &CipherKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut iv = Iv::<cbc::Encryptor<aes::Aes256>>::default();
    rng::map(|rng| rng.fill(&mut *iv));

    let encryptor = cbc::Encryptor::<aes::Aes256>::new(
        Key::<cbc::Encryptor<aes::Aes256>>::from_slice(key.expose()),
        &iv,
    );
    let message = encryptor.encrypt_padded_vec_mut::<block_padding::Pkcs7>(plaintext);

    let mac = compute_mac(key.expose(), &message, &iv);

    let record = SealedRecord {
        iv: iv.into(),
        mac,
        message,
    };
    serde_json::to_vec(&record).map_err(|err| error::Crypto::Malformed(err).into())
}

pub fn decrypt(key: &CipherKey, sealed: &[u8]) -> Result<Vec<u8>> {
    let record: SealedRecord =
        serde_json::from_slice(sealed).map_err(error::Crypto::Malformed)?;

    let mac = compute_mac(key.expose(), &record.message, &record.iv);
    if mac.ct_eq(&record.mac).unwrap_u8() != 1 {
        return Err(error::Crypto::MessageAuthenticationFailure.into());
    }

    let decryptor = cbc::Decryptor::<aes::Aes256>::new(
        Key::<cbc::Decryptor<aes::Aes256>>::from_slice(key.expose()),
        Iv::<cbc::Decryptor<aes::Aes256>>::from_slice(&record.iv),
    );
    let plaintext = decryptor
        .decrypt_padded_vec_mut::<block_padding::Pkcs7>(&record.message)
        .map_err(error::Crypto::from)?;

    Ok(plaintext)
}
