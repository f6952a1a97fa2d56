//! Field-level checks on caller-supplied send requests.
//!
//! These run before any cryptography so a malformed request fails with a
//! message that names the offending field. Every failure is
//! [`PushError::Input`].

use serde_json::Value;

use crate::base64url;
use crate::constants::{AUTH_SECRET_LEN, MAX_PAYLOAD_BYTES, PUBLIC_KEY_LEN};
use crate::error::{PushError, PushResult};
use crate::sender::VapidCredentials;
use crate::subscription::PushSubscription;

/// Whether `site_key` is admitted by `allowed`. An empty list admits all.
pub fn validate_site_key(site_key: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|k| k == site_key)
}

/// Check the VAPID subject and key encodings.
pub fn validate_vapid(vapid: &VapidCredentials) -> PushResult<()> {
    if vapid.subject.is_empty() {
        return Err(PushError::input(
            "VAPID subject is required (e.g., mailto:admin@example.com)",
        ));
    }
    if !vapid.subject.starts_with("mailto:") && !vapid.subject.starts_with("https://") {
        return Err(PushError::input(
            "VAPID subject must start with mailto: or https://",
        ));
    }
    if vapid.public_key.is_empty() {
        return Err(PushError::input("VAPID public_key is required and must be a string"));
    }
    if vapid.private_key.is_empty() {
        return Err(PushError::input("VAPID private_key is required and must be a string"));
    }

    let Ok(public_key) = base64url::decode(&vapid.public_key, "VAPID public key") else {
        return Err(PushError::input("Invalid VAPID public key format"));
    };
    if public_key.len() != PUBLIC_KEY_LEN {
        return Err(PushError::input("Invalid VAPID public key length"));
    }
    if base64url::decode(&vapid.private_key, "VAPID private key").is_err() {
        return Err(PushError::input("Invalid VAPID private key format"));
    }

    Ok(())
}

/// Check the subscription endpoint scheme and key encodings.
pub fn validate_subscription(subscription: &PushSubscription) -> PushResult<()> {
    if subscription.endpoint.is_empty() {
        return Err(PushError::input("Subscription endpoint is required"));
    }
    if !subscription.endpoint.starts_with("https://") {
        return Err(PushError::input("Subscription endpoint must use HTTPS"));
    }
    if subscription.keys.p256dh.is_empty() {
        return Err(PushError::input("Subscription keys.p256dh is required"));
    }
    if subscription.keys.auth.is_empty() {
        return Err(PushError::input("Subscription keys.auth is required"));
    }

    let Ok(p256dh) = base64url::decode(&subscription.keys.p256dh, "subscription keys.p256dh") else {
        return Err(PushError::input("Invalid subscription keys.p256dh format"));
    };
    let Ok(auth) = base64url::decode(&subscription.keys.auth, "subscription keys.auth") else {
        return Err(PushError::input("Invalid subscription keys.auth format"));
    };

    if p256dh.len() != PUBLIC_KEY_LEN {
        return Err(PushError::input(format!(
            "Subscription keys.p256dh must be {PUBLIC_KEY_LEN} bytes, got {}",
            p256dh.len()
        )));
    }
    if auth.len() != AUTH_SECRET_LEN {
        return Err(PushError::input(format!(
            "Subscription keys.auth must be {AUTH_SECRET_LEN} bytes, got {}",
            auth.len()
        )));
    }

    Ok(())
}

/// Check the notification payload and return its serialized bytes.
///
/// Objects must carry a non-empty `title` or `body`.
pub fn validate_payload(payload: &Value) -> PushResult<Vec<u8>> {
    match payload {
        Value::Null => return Err(PushError::input("Payload is required")),
        Value::Object(map) => {
            let present = |key: &str| map.get(key).is_some_and(is_truthy);
            if !present("title") && !present("body") {
                return Err(PushError::input("Payload must contain at least title or body"));
            }
        }
        Value::Array(_) => {
            return Err(PushError::input("Payload must contain at least title or body"));
        }
        _ => {}
    }

    let bytes = serde_json::to_vec(payload)
        .map_err(|e| PushError::input(format!("Payload is not serializable: {e}")))?;
    if bytes.len() > MAX_PAYLOAD_BYTES {
        return Err(PushError::input(format!(
            "Payload size ({} bytes) exceeds maximum allowed ({MAX_PAYLOAD_BYTES} bytes)",
            bytes.len()
        )));
    }
    Ok(bytes)
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
