//! Browser push subscriptions.
//!
//! [`PushSubscription`] is the JSON shape browsers produce from
//! `PushSubscription.toJSON()`. [`Subscription`] is the decoded form the
//! push pipeline works with: a parsed endpoint plus raw key bytes.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::base64url;
use crate::constants::{AUTH_SECRET_LEN, PUBLIC_KEY_LEN};
use crate::crypto::ecdh::parse_public_key;
use crate::crypto::vapid::audience_for;
use crate::error::{PushError, PushResult};

/// Subscriber keys as sent by the browser (base64url).
///
/// Absent fields deserialize as empty strings so validation can name them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionKeys {
    /// Subscriber P-256 ECDH public key.
    pub p256dh: String,
    /// Shared auth secret.
    pub auth: String,
}

impl std::fmt::Debug for SubscriptionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionKeys")
            .field("p256dh", &self.p256dh)
            .field("auth", &"<redacted>")
            .finish()
    }
}

/// A browser's push subscription in its wire (JSON) form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Subscriber keys.
    pub keys: SubscriptionKeys,
}

/// Decoded subscription, immutable for the duration of one send.
#[derive(Clone)]
pub struct Subscription {
    endpoint: Url,
    public_key: [u8; PUBLIC_KEY_LEN],
    auth_secret: Zeroizing<[u8; AUTH_SECRET_LEN]>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// Build from raw parts. The endpoint must be an absolute http(s) URL
    /// and the public key a point on P-256.
    pub fn new(
        endpoint: &str,
        public_key: [u8; PUBLIC_KEY_LEN],
        auth_secret: [u8; AUTH_SECRET_LEN],
    ) -> PushResult<Self> {
        audience_for(endpoint)?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PushError::input(format!("Invalid push endpoint URL: {e}")))?;
        parse_public_key(&public_key)?;

        Ok(Self {
            endpoint,
            public_key,
            auth_secret: Zeroizing::new(auth_secret),
        })
    }

    /// Push service endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Subscriber public key (65-byte uncompressed point).
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public_key
    }

    /// Subscriber auth secret.
    pub fn auth_secret(&self) -> &[u8; AUTH_SECRET_LEN] {
        &self.auth_secret
    }

    /// VAPID audience: the endpoint's origin.
    pub fn audience(&self) -> String {
        self.endpoint.origin().ascii_serialization()
    }
}

impl TryFrom<&PushSubscription> for Subscription {
    type Error = PushError;

    fn try_from(sub: &PushSubscription) -> PushResult<Self> {
        let public_key = base64url::decode_array(&sub.keys.p256dh, "subscription keys.p256dh")?;
        let auth_secret = base64url::decode_array(&sub.keys.auth, "subscription keys.auth")?;
        Self::new(&sub.endpoint, public_key, auth_secret)
    }
}
