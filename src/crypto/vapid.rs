//! VAPID application keys and signed assertions (RFC 8292).
//!
//! The application server proves control of its P-256 key pair with a
//! short-lived ES256 JWT scoped to the push service origin. The token and
//! the public key travel together in the `Authorization` header.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::random::{CurveRng, SecureRandom, SystemRandom};
use crate::base64url;
use crate::constants::{MAX_TOKEN_LIFETIME_SECS, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN};
use crate::error::{PushError, PushResult};

/// JOSE header segment: `{"typ":"JWT","alg":"ES256"}`.
#[derive(Serialize)]
struct JwtHeader<'a> {
    typ: &'a str,
    alg: &'a str,
}

/// Claims carried in a VAPID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    /// Push service origin (`scheme://host[:port]`).
    pub aud: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Application contact (`mailto:` or `https:` URI).
    pub sub: String,
}

/// VAPID application key pair with its contact subject.
///
/// The private key is held as a P-256 signing key and only leaves this
/// type through the explicit export methods.
#[derive(Clone)]
pub struct VapidKeys {
    subject: String,
    public_key: [u8; PUBLIC_KEY_LEN],
    signing_key: SigningKey,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("subject", &self.subject)
            .field("public_key", &self.public_key_base64url())
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Generate a fresh key pair.
    pub fn generate(subject: impl Into<String>, rng: &dyn SecureRandom) -> Self {
        let signing_key = SigningKey::random(&mut CurveRng(rng));
        let public_key = public_key_of(&signing_key);
        Self {
            subject: subject.into(),
            public_key,
            signing_key,
        }
    }

    /// Reconstruct from base64url-encoded keys.
    ///
    /// The public key must be a 65-byte uncompressed point. The private key
    /// may be the raw 32-byte scalar, SEC1 DER or PKCS#8 DER. Whether the two
    /// halves belong together is checked when signing, not here.
    pub fn from_base64url(
        subject: impl Into<String>,
        public_key_b64: &str,
        private_key_b64: &str,
    ) -> PushResult<Self> {
        let public_key: [u8; PUBLIC_KEY_LEN] =
            base64url::decode_array(public_key_b64, "VAPID public key")?;
        if public_key[0] != 0x04 {
            return Err(PushError::input(
                "VAPID public key must be 65-byte uncompressed P-256 point",
            ));
        }

        let private_bytes = zeroize::Zeroizing::new(base64url::decode(
            private_key_b64,
            "VAPID private key",
        )?);
        let signing_key = decode_private_key(&private_bytes)?;

        Ok(Self {
            subject: subject.into(),
            public_key,
            signing_key,
        })
    }

    /// Contact subject (`mailto:` / `https:` URI).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Uncompressed public key bytes (65 bytes).
    pub fn public_key_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// Base64url-encoded public key, the browser's `applicationServerKey`.
    pub fn public_key_base64url(&self) -> String {
        base64url::encode(self.public_key)
    }

    /// Base64url-encoded raw 32-byte private scalar.
    pub fn private_key_base64url(&self) -> String {
        base64url::encode(self.signing_key.to_bytes())
    }

    /// Base64url-encoded PKCS#8 DER private key.
    pub fn private_key_pkcs8_base64url(&self) -> PushResult<String> {
        let der = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| PushError::crypto(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(base64url::encode(der.as_bytes()))
    }

    fn signing_key(&self) -> PushResult<&SigningKey> {
        if public_key_of(&self.signing_key) != self.public_key {
            return Err(PushError::crypto(
                "VAPID public key does not match the private key",
            ));
        }
        Ok(&self.signing_key)
    }
}

fn public_key_of(signing_key: &SigningKey) -> [u8; PUBLIC_KEY_LEN] {
    // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
    let point = signing_key.verifying_key().to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Accept a raw scalar, SEC1 DER or PKCS#8 DER private key.
fn decode_private_key(bytes: &[u8]) -> PushResult<SigningKey> {
    if bytes.len() == PRIVATE_KEY_LEN {
        return SigningKey::from_slice(bytes)
            .map_err(|e| PushError::input(format!("VAPID private key is not a valid P-256 scalar: {e}")));
    }

    if let Ok(secret) = p256::SecretKey::from_sec1_der(bytes) {
        log::debug!("[WebPush] Accepted SEC1 DER VAPID private key ({} bytes)", bytes.len());
        return Ok(SigningKey::from(secret));
    }

    let signing_key = SigningKey::from_pkcs8_der(bytes).map_err(|e| {
        PushError::input(format!(
            "VAPID private key is not a 32-byte scalar, SEC1 DER, or PKCS#8 DER: {e}"
        ))
    })?;
    log::debug!("[WebPush] Accepted PKCS#8 DER VAPID private key ({} bytes)", bytes.len());
    Ok(signing_key)
}

/// How the assertion is presented to the push service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: vapid t=<token>, k=<key>`.
    #[default]
    Vapid,
    /// Deprecated split form: `Authorization: WebPush <token>` plus
    /// `Crypto-Key: p256ecdsa=<key>`.
    WebPush,
}

impl std::str::FromStr for AuthScheme {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vapid" => Ok(Self::Vapid),
            "webpush" => Ok(Self::WebPush),
            other => Err(PushError::input(format!("Unknown auth scheme '{other}'"))),
        }
    }
}

/// Signed VAPID token bound to an application public key.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthAssertion {
    token: String,
    public_key: String,
    audience: String,
    expires_at: i64,
}

impl std::fmt::Debug for AuthAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthAssertion")
            .field("public_key", &self.public_key)
            .field("audience", &self.audience)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl AuthAssertion {
    /// Compact JWS (`header.claims.signature`).
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Base64url application public key.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Origin the token is scoped to.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Expiry, seconds since the Unix epoch.
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the token has expired at `now` (seconds since the Unix epoch).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Headers carrying the credential under `scheme`.
    pub fn headers(&self, scheme: AuthScheme) -> Vec<(&'static str, String)> {
        match scheme {
            AuthScheme::Vapid => vec![(
                "Authorization",
                format!("vapid t={}, k={}", self.token, self.public_key),
            )],
            AuthScheme::WebPush => vec![
                ("Authorization", format!("WebPush {}", self.token)),
                ("Crypto-Key", format!("p256ecdsa={}", self.public_key)),
            ],
        }
    }
}

/// Builds assertions with an injected randomness source and clock.
#[derive(Clone)]
pub struct TokenBuilder {
    rng: Arc<dyn SecureRandom>,
    clock: fn() -> i64,
}

impl std::fmt::Debug for TokenBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBuilder").finish_non_exhaustive()
    }
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self {
            rng: Arc::new(SystemRandom),
            clock: || chrono::Utc::now().timestamp(),
        }
    }
}

impl TokenBuilder {
    /// Replace the randomness source used for ECDSA signing.
    pub fn with_rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.rng = rng;
        self
    }

    /// Replace the clock (seconds since the Unix epoch).
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Sign a token for `audience_origin` valid for `expiry_seconds`.
    ///
    /// Lifetimes of zero or above 24 hours are rejected, never clamped.
    pub fn build(
        &self,
        keys: &VapidKeys,
        audience_origin: &str,
        expiry_seconds: u32,
    ) -> PushResult<AuthAssertion> {
        if expiry_seconds == 0 || expiry_seconds > MAX_TOKEN_LIFETIME_SECS {
            return Err(PushError::input(format!(
                "VAPID token lifetime must be between 1 and {MAX_TOKEN_LIFETIME_SECS} seconds, got {expiry_seconds}"
            )));
        }
        ensure_origin(audience_origin)?;

        let signing_key = keys.signing_key()?;
        let claims = VapidClaims {
            aud: audience_origin.to_string(),
            exp: (self.clock)() + i64::from(expiry_seconds),
            sub: keys.subject().to_string(),
        };

        let header = JwtHeader {
            typ: "JWT",
            alg: "ES256",
        };
        let signing_input = format!(
            "{}.{}",
            base64url::encode(to_json(&header)?),
            base64url::encode(to_json(&claims)?)
        );

        let signature: Signature = signing_key
            .try_sign_with_rng(&mut CurveRng(self.rng.as_ref()), signing_input.as_bytes())
            .map_err(|e| PushError::crypto(format!("ES256 signing failed: {e}")))?;

        Ok(AuthAssertion {
            token: format!("{signing_input}.{}", base64url::encode(signature.to_bytes())),
            public_key: keys.public_key_base64url(),
            audience: claims.aud,
            expires_at: claims.exp,
        })
    }
}

/// Sign an assertion with OS randomness and the system clock.
pub fn build_assertion(
    keys: &VapidKeys,
    audience_origin: &str,
    expiry_seconds: u32,
) -> PushResult<AuthAssertion> {
    TokenBuilder::default().build(keys, audience_origin, expiry_seconds)
}

/// Verify a token's ES256 signature and return its claims.
pub fn verify_token(token: &str, public_key: &[u8]) -> PushResult<VapidClaims> {
    let mut parts = token.split('.');
    let (Some(header), Some(claims), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PushError::input("VAPID token must have three segments"));
    };

    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| PushError::InvalidKey(format!("VAPID public key is not on P-256: {e}")))?;
    let signature = Signature::from_slice(&base64url::decode(signature, "token signature")?)
        .map_err(|e| PushError::input(format!("Malformed ES256 signature: {e}")))?;
    verifying_key
        .verify(format!("{header}.{claims}").as_bytes(), &signature)
        .map_err(|e| PushError::crypto(format!("VAPID signature does not verify: {e}")))?;

    serde_json::from_slice(&base64url::decode(claims, "token claims")?)
        .map_err(|e| PushError::input(format!("Malformed VAPID claims: {e}")))
}

/// Origin (`scheme://host[:port]`) of a push endpoint, used as the audience.
pub fn audience_for(endpoint: &str) -> PushResult<String> {
    let url = Url::parse(endpoint)
        .map_err(|e| PushError::input(format!("Invalid push endpoint URL: {e}")))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(PushError::input(format!(
            "Push endpoint scheme must be https, got '{}'",
            url.scheme()
        )));
    }
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(PushError::input("Push endpoint has no origin"));
    }
    Ok(origin.ascii_serialization())
}

fn ensure_origin(audience: &str) -> PushResult<()> {
    if audience_for(audience)? != audience {
        return Err(PushError::input(format!(
            "VAPID audience must be a bare origin, got '{audience}'"
        )));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> PushResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PushError::crypto(format!("JWT serialization failed: {e}")))
}
