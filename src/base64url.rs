//! Unpadded base64url codec used for keys, secrets and tokens.
//!
//! Browsers hand out subscription keys without padding, but some key
//! generators append `=`; decoding accepts both.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};

use crate::error::{PushError, PushResult};

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64URL.encode(bytes)
}

/// Decode base64url, tolerating trailing `=` padding.
///
/// `what` names the field in the error message; the input itself is
/// never echoed back since it may be secret.
pub fn decode(input: &str, what: &str) -> PushResult<Vec<u8>> {
    BASE64URL
        .decode(input.trim().trim_end_matches('='))
        .map_err(|e| PushError::input(format!("Invalid base64url for {what}: {e}")))
}

/// Decode base64url into a fixed-length array.
pub fn decode_array<const N: usize>(input: &str, what: &str) -> PushResult<[u8; N]> {
    let bytes = decode(input, what)?;
    if bytes.len() != N {
        return Err(PushError::input(format!(
            "{what} must be {N} bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
