//! P-256 ephemeral key agreement.
//!
//! Every message gets a fresh key pair; the shared secret is computed
//! against the subscriber's uncompressed public point.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{ecdh, PublicKey, SecretKey};
use zeroize::Zeroizing;

use super::random::{CurveRng, SecureRandom};
use crate::constants::{PUBLIC_KEY_LEN, SHARED_SECRET_LEN};
use crate::error::{PushError, PushResult};

/// SEC1 tag for an uncompressed point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Single-use P-256 key pair.
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: [u8; PUBLIC_KEY_LEN],
}

impl EphemeralKeyPair {
    /// Wrap an existing scalar (fixed test vectors).
    pub(crate) fn from_secret(secret: SecretKey) -> Self {
        let public = encode_public_key(&secret.public_key());
        Self { secret, public }
    }

    /// Uncompressed public point (65 bytes).
    pub fn public_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    /// Private scalar.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &crate::base64url::encode(self.public))
            .finish_non_exhaustive()
    }
}

/// Generate a fresh key pair from `rng`.
pub fn generate_ephemeral_key_pair(rng: &dyn SecureRandom) -> EphemeralKeyPair {
    EphemeralKeyPair::from_secret(SecretKey::random(&mut CurveRng(rng)))
}

/// Encode a public key as an uncompressed SEC1 point.
pub fn encode_public_key(public: &PublicKey) -> [u8; PUBLIC_KEY_LEN] {
    let point = public.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Parse an uncompressed P-256 point, rejecting anything off the curve.
pub fn parse_public_key(bytes: &[u8]) -> PushResult<PublicKey> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(PushError::InvalidKey(format!(
            "expected {PUBLIC_KEY_LEN}-byte uncompressed point, got {} bytes",
            bytes.len()
        )));
    }
    if bytes[0] != UNCOMPRESSED_TAG {
        return Err(PushError::InvalidKey(
            "public key is not an uncompressed point".to_string(),
        ));
    }
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|e| PushError::InvalidKey(format!("public key is not on P-256: {e}")))
}

/// Compute the 32-byte ECDH shared secret (x-coordinate of the shared point).
pub fn compute_shared_secret(
    secret: &SecretKey,
    counterpart: &[u8],
) -> PushResult<Zeroizing<[u8; SHARED_SECRET_LEN]>> {
    let public = parse_public_key(counterpart)?;
    let shared = ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    let mut out = Zeroizing::new([0u8; SHARED_SECRET_LEN]);
    out.copy_from_slice(shared.raw_secret_bytes());
    Ok(out)
}
