//! HKDF-SHA-256 key derivation (RFC 5869).
//!
//! Extract condenses the input keying material and salt into a 32-byte
//! pseudorandom key; expand stretches it under an `info` label to the
//! requested length.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{PushError, PushResult};

/// Longest output HKDF-SHA-256 can expand to (255 hash blocks).
pub const MAX_OUTPUT_LEN: usize = 255 * 32;

/// Derive `output_len` bytes from `ikm` and `salt` under the `info` label.
///
/// Deterministic. Fails only if `output_len` exceeds [`MAX_OUTPUT_LEN`].
pub fn derive(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    output_len: usize,
) -> PushResult<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm).map_err(|e| {
        PushError::crypto(format!("HKDF cannot expand to {output_len} bytes: {e}"))
    })?;
    Ok(okm)
}

/// Derive exactly `N` bytes into a fixed array.
pub(crate) fn derive_array<const N: usize>(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
) -> PushResult<Zeroizing<[u8; N]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; N]);
    hk.expand(info, okm.as_mut())
        .map_err(|e| PushError::crypto(format!("HKDF cannot expand to {N} bytes: {e}")))?;
    Ok(okm)
}
