//! Protocol constants and defaults for webpush-relay.
//!
//! Centralizes the fixed sizes and labels of the Web Push encryption
//! record (RFC 8188 / RFC 8291) and the VAPID assertion (RFC 8292),
//! plus the defaults used by configuration.
//!
//! # Categories
//!
//! - **Key material**: sizes of keys, secrets and salts
//! - **Record format**: header layout and padding
//! - **Derivation labels**: HKDF info strings
//! - **Delivery**: TTL, token lifetime and payload limits

use std::time::Duration;

// ============================================================================
// Key material
// ============================================================================

/// Uncompressed SEC1 P-256 point length (`0x04 || x || y`).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Raw P-256 private scalar length.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Subscriber auth secret length.
pub const AUTH_SECRET_LEN: usize = 16;

/// Per-message random salt length.
pub const SALT_LEN: usize = 16;

/// ECDH shared secret length for P-256.
pub const SHARED_SECRET_LEN: usize = 32;

/// Pseudorandom key length produced by the first derivation step.
pub const PRK_LEN: usize = 32;

/// AES-128-GCM content-encryption key length.
pub const CEK_LEN: usize = 16;

/// AES-GCM nonce length.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length.
pub const TAG_LEN: usize = 16;

// ============================================================================
// Record format
// ============================================================================

/// Record size advertised in the record header.
pub const RECORD_SIZE: u32 = 4096;

/// Header length: salt (16) + record size (4) + key id length (1) + key id (65).
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// Padding delimiter for the final (and only) record.
pub const LAST_RECORD_DELIMITER: u8 = 0x02;

/// Content-Encoding token for the record format.
pub const CONTENT_ENCODING: &str = "aes128gcm";

/// Default Content-Type of the request body.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Derivation labels
// ============================================================================

/// Info label for the pseudorandom key (contextual schedule).
pub const AUTH_INFO: &[u8] = b"Content-Encoding: auth\0";

/// Info label prefix for the content-encryption key.
pub const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";

/// Info label prefix for the nonce.
pub const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Info label prefix for the input keying material (RFC 8291 schedule).
pub const WEBPUSH_INFO: &[u8] = b"WebPush: info\0";

/// Curve label opening the key-agreement context.
pub const CURVE_LABEL: &[u8] = b"P-256\0";

// ============================================================================
// Delivery
// ============================================================================

/// Largest plaintext one record carries (record size minus delimiter and tag).
pub const MAX_RECORD_PLAINTEXT_LEN: usize = RECORD_SIZE as usize - 1 - TAG_LEN;

/// Maximum serialized payload size accepted from callers. Notifications are
/// capped at 4096 bytes, and a single record holds slightly less.
pub const MAX_PAYLOAD_BYTES: usize = MAX_RECORD_PLAINTEXT_LEN;

/// Default push message time-to-live (24 hours).
pub const DEFAULT_TTL_SECS: u32 = 86_400;

/// Longest TTL accepted by configuration (28 days).
pub const MAX_TTL_SECS: u32 = 28 * 86_400;

/// Default VAPID token lifetime (12 hours).
pub const DEFAULT_TOKEN_LIFETIME_SECS: u32 = 12 * 60 * 60;

/// Hard ceiling on VAPID token lifetime (24 hours).
pub const MAX_TOKEN_LIFETIME_SECS: u32 = 24 * 60 * 60;

/// Push service request timeout.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest `Topic` header value accepted by push services.
pub const MAX_TOPIC_LEN: usize = 32;
