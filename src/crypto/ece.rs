//! Web Push payload encryption (`aes128gcm` content coding).
//!
//! Produces a single self-describing record:
//!
//! ```text
//! salt (16) | record size (4, BE) | key id len (1) | ephemeral public key (65) | ciphertext + tag
//! ```
//!
//! A fresh salt and ephemeral key pair are drawn for every message, so no
//! key/nonce pair is ever reused. Two key schedules are supported, both
//! producing the same record layout:
//!
//! - [`KeySchedule::Contextual`]: PRK from `"Content-Encoding: auth\0"`, CEK
//!   and nonce labels suffixed with the `"P-256\0"` key-agreement context.
//! - [`KeySchedule::Rfc8291`]: IKM from `"WebPush: info\0" || ua_public || as_public`,
//!   bare CEK and nonce labels.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use p256::SecretKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::ecdh::{compute_shared_secret, encode_public_key, generate_ephemeral_key_pair, EphemeralKeyPair};
use super::kdf::derive_array;
use super::random::{SecureRandom, SystemRandom};
use crate::constants::{
    AUTH_INFO, AUTH_SECRET_LEN, CEK_INFO, CEK_LEN, CURVE_LABEL, HEADER_LEN, LAST_RECORD_DELIMITER,
    MAX_RECORD_PLAINTEXT_LEN, NONCE_INFO, NONCE_LEN, PRK_LEN, PUBLIC_KEY_LEN, RECORD_SIZE,
    SALT_LEN, TAG_LEN, WEBPUSH_INFO,
};
use crate::error::{PushError, PushResult};

/// How the content-encryption key and nonce are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySchedule {
    /// Auth-labelled PRK plus `P-256` context in the CEK/nonce labels.
    #[default]
    Contextual,
    /// RFC 8291 `WebPush: info` key schedule.
    Rfc8291,
}

impl std::str::FromStr for KeySchedule {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contextual" => Ok(Self::Contextual),
            "rfc8291" => Ok(Self::Rfc8291),
            other => Err(PushError::input(format!("Unknown key schedule '{other}'"))),
        }
    }
}

/// Encrypted request body. Immutable once produced.
#[derive(Clone, PartialEq, Eq)]
pub struct PushRecord {
    bytes: Vec<u8>,
}

impl PushRecord {
    /// Whole record (header + ciphertext).
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume into the raw body bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Total record length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the record is empty (never true for a produced record).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Header bytes (86 for a P-256 key id).
    pub fn header(&self) -> &[u8] {
        &self.bytes[..HEADER_LEN]
    }

    /// Per-message salt.
    pub fn salt(&self) -> &[u8] {
        &self.bytes[..SALT_LEN]
    }

    /// Advertised record size.
    pub fn record_size(&self) -> u32 {
        let mut rs = [0u8; 4];
        rs.copy_from_slice(&self.bytes[SALT_LEN..SALT_LEN + 4]);
        u32::from_be_bytes(rs)
    }

    /// Ephemeral public key carried as the key id.
    pub fn ephemeral_public_key(&self) -> &[u8] {
        &self.bytes[SALT_LEN + 5..HEADER_LEN]
    }

    /// Ciphertext with the appended 16-byte tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }
}

impl std::fmt::Debug for PushRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRecord")
            .field("len", &self.bytes.len())
            .field("record_size", &self.record_size())
            .finish_non_exhaustive()
    }
}

/// Per-message content key and nonce.
struct ContentKeys {
    cek: Zeroizing<[u8; CEK_LEN]>,
    nonce: Zeroizing<[u8; NONCE_LEN]>,
}

/// Encrypts payloads for push subscriptions.
///
/// Cheap to clone; holds only the key schedule and the randomness source.
#[derive(Clone)]
pub struct PayloadEncryptor {
    schedule: KeySchedule,
    rng: Arc<dyn SecureRandom>,
}

impl std::fmt::Debug for PayloadEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadEncryptor")
            .field("schedule", &self.schedule)
            .finish_non_exhaustive()
    }
}

impl Default for PayloadEncryptor {
    fn default() -> Self {
        Self::new(KeySchedule::default())
    }
}

impl PayloadEncryptor {
    /// Encryptor using OS randomness.
    pub fn new(schedule: KeySchedule) -> Self {
        Self {
            schedule,
            rng: Arc::new(SystemRandom),
        }
    }

    /// Replace the randomness source.
    pub fn with_rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.rng = rng;
        self
    }

    /// Key schedule in use.
    pub fn schedule(&self) -> KeySchedule {
        self.schedule
    }

    /// Encrypt `plaintext` for the subscriber into a single record.
    ///
    /// Rejects payloads whose ciphertext would not fit the advertised
    /// record size rather than truncating them.
    pub fn encrypt(
        &self,
        subscriber_public_key: &[u8],
        auth_secret: &[u8; AUTH_SECRET_LEN],
        plaintext: &[u8],
    ) -> PushResult<PushRecord> {
        let mut salt = [0u8; SALT_LEN];
        self.rng.fill_bytes(&mut salt);
        let ephemeral = generate_ephemeral_key_pair(self.rng.as_ref());

        seal(
            self.schedule,
            salt,
            &ephemeral,
            subscriber_public_key,
            auth_secret,
            plaintext,
        )
    }
}

/// Encrypt with OS randomness and the default key schedule.
pub fn encrypt(
    subscriber_public_key: &[u8],
    auth_secret: &[u8; AUTH_SECRET_LEN],
    plaintext: &[u8],
) -> PushResult<PushRecord> {
    PayloadEncryptor::default().encrypt(subscriber_public_key, auth_secret, plaintext)
}

fn seal(
    schedule: KeySchedule,
    salt: [u8; SALT_LEN],
    ephemeral: &EphemeralKeyPair,
    subscriber_public_key: &[u8],
    auth_secret: &[u8; AUTH_SECRET_LEN],
    plaintext: &[u8],
) -> PushResult<PushRecord> {
    if plaintext.len() > MAX_RECORD_PLAINTEXT_LEN {
        return Err(PushError::input(format!(
            "Payload of {} bytes does not fit a single {RECORD_SIZE}-byte record",
            plaintext.len()
        )));
    }

    let shared = compute_shared_secret(ephemeral.secret_key(), subscriber_public_key)?;
    let keys = derive_content_keys(
        schedule,
        shared.as_slice(),
        auth_secret,
        &salt,
        subscriber_public_key,
        ephemeral.public_bytes(),
    )?;

    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len() + 1));
    padded.extend_from_slice(plaintext);
    padded.push(LAST_RECORD_DELIMITER);

    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(keys.cek.as_slice()));
    let sealed = cipher
        .encrypt(Nonce::from_slice(keys.nonce.as_slice()), padded.as_slice())
        .map_err(|e| PushError::crypto(format!("AES-128-GCM encryption failed: {e}")))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + sealed.len());
    bytes.extend_from_slice(&salt);
    bytes.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    bytes.push(PUBLIC_KEY_LEN as u8);
    bytes.extend_from_slice(ephemeral.public_bytes());
    bytes.extend_from_slice(&sealed);

    Ok(PushRecord { bytes })
}

/// Decrypt a single-record body with the subscriber's private key.
pub fn decrypt(
    record: &[u8],
    subscriber_secret: &SecretKey,
    auth_secret: &[u8; AUTH_SECRET_LEN],
    schedule: KeySchedule,
) -> PushResult<Vec<u8>> {
    if record.len() < SALT_LEN + 5 {
        return Err(PushError::input("Record is shorter than its header"));
    }
    let salt = &record[..SALT_LEN];
    let mut rs = [0u8; 4];
    rs.copy_from_slice(&record[SALT_LEN..SALT_LEN + 4]);
    let record_size = u32::from_be_bytes(rs) as usize;
    let key_id_len = usize::from(record[SALT_LEN + 4]);
    let body_start = SALT_LEN + 5 + key_id_len;

    if record.len() < body_start + TAG_LEN + 1 {
        return Err(PushError::input("Record is too short for its key id and tag"));
    }
    let key_id = &record[SALT_LEN + 5..body_start];
    let ciphertext = &record[body_start..];
    if ciphertext.len() > record_size {
        return Err(PushError::input(format!(
            "Ciphertext of {} bytes exceeds record size {record_size}",
            ciphertext.len()
        )));
    }

    let shared = compute_shared_secret(subscriber_secret, key_id)?;
    let ua_public = encode_public_key(&subscriber_secret.public_key());
    let keys = derive_content_keys(
        schedule,
        shared.as_slice(),
        auth_secret,
        salt,
        &ua_public,
        key_id,
    )?;

    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(keys.cek.as_slice()));
    let padded = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(keys.nonce.as_slice()), ciphertext)
            .map_err(|e| PushError::crypto(format!("AES-128-GCM decryption failed: {e}")))?,
    );

    let delimiter_at = padded
        .iter()
        .rposition(|&b| b != 0)
        .ok_or_else(|| PushError::crypto("Record has no padding delimiter"))?;
    if padded[delimiter_at] != LAST_RECORD_DELIMITER {
        return Err(PushError::crypto("Record is not marked as the last record"));
    }
    Ok(padded[..delimiter_at].to_vec())
}

fn derive_content_keys(
    schedule: KeySchedule,
    shared_secret: &[u8],
    auth_secret: &[u8],
    salt: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
) -> PushResult<ContentKeys> {
    match schedule {
        KeySchedule::Contextual => {
            let prk = derive_array::<PRK_LEN>(shared_secret, auth_secret, AUTH_INFO)?;
            let context = key_context(ua_public, as_public)?;
            Ok(ContentKeys {
                cek: derive_array(prk.as_slice(), salt, &[CEK_INFO, context.as_slice()].concat())?,
                nonce: derive_array(prk.as_slice(), salt, &[NONCE_INFO, context.as_slice()].concat())?,
            })
        }
        KeySchedule::Rfc8291 => {
            let info = [WEBPUSH_INFO, ua_public, as_public].concat();
            let ikm = derive_array::<PRK_LEN>(shared_secret, auth_secret, &info)?;
            Ok(ContentKeys {
                cek: derive_array(ikm.as_slice(), salt, CEK_INFO)?,
                nonce: derive_array(ikm.as_slice(), salt, NONCE_INFO)?,
            })
        }
    }
}

/// `"P-256\0" || len(ua) || ua_public || len(as) || as_public`, lengths as u16 BE.
fn key_context(ua_public: &[u8], as_public: &[u8]) -> PushResult<Vec<u8>> {
    let mut context = Vec::with_capacity(CURVE_LABEL.len() + 4 + ua_public.len() + as_public.len());
    context.extend_from_slice(CURVE_LABEL);
    for key in [ua_public, as_public] {
        let len = u16::try_from(key.len())
            .map_err(|e| PushError::InvalidKey(format!("key too long for context: {e}")))?;
        context.extend_from_slice(&len.to_be_bytes());
        context.extend_from_slice(key);
    }
    Ok(context)
}
