//! End-to-end tests for the encryption and authentication pipelines.
//!
//! These exercise the public API the way a caller would: decode a browser
//! subscription, seal a payload, sign an assertion, and check what a push
//! service and the subscribing browser would each see.

use webpush_relay::base64url;
use webpush_relay::crypto::ecdh::generate_ephemeral_key_pair;
use webpush_relay::crypto::{ece, vapid, DeterministicRandom, SystemRandom};
use webpush_relay::subscription::SubscriptionKeys;
use webpush_relay::{
    ErrorKind, KeySchedule, PayloadEncryptor, PushSubscription, Subscription, TokenBuilder,
    VapidKeys,
};

use std::sync::Arc;

fn browser_subscription(endpoint: &str) -> (PushSubscription, webpush_relay::crypto::ecdh::EphemeralKeyPair) {
    let pair = generate_ephemeral_key_pair(&SystemRandom);
    let wire = PushSubscription {
        endpoint: endpoint.to_string(),
        keys: SubscriptionKeys {
            p256dh: base64url::encode(pair.public_bytes()),
            auth: base64url::encode([0x42u8; 16]),
        },
    };
    (wire, pair)
}

#[test]
fn test_thirteen_byte_payload_makes_116_byte_record() {
    let (wire, _) = browser_subscription("https://fcm.googleapis.com/fcm/send/abc");
    let sub = Subscription::try_from(&wire).unwrap();

    let payload = br#"{"title":"H"}"#;
    assert_eq!(payload.len(), 13);

    let record = ece::encrypt(sub.public_key(), sub.auth_secret(), payload).unwrap();
    assert_eq!(record.len(), 116);
    assert_eq!(record.record_size(), 4096);
    assert_eq!(record.as_bytes()[20], 65);
    assert_eq!(record.ephemeral_public_key()[0], 0x04);
}

#[test]
fn test_browser_recovers_payload() {
    let (wire, browser) = browser_subscription("https://updates.push.services.mozilla.com/wpush/v2/x");
    let sub = Subscription::try_from(&wire).unwrap();
    let payload = br#"{"title":"Deploy","body":"Production is live"}"#;

    for schedule in [KeySchedule::Contextual, KeySchedule::Rfc8291] {
        let record = PayloadEncryptor::new(schedule)
            .encrypt(sub.public_key(), sub.auth_secret(), payload)
            .unwrap();
        let opened = ece::decrypt(record.as_bytes(), browser.secret_key(), &[0x42u8; 16], schedule)
            .unwrap();
        assert_eq!(opened, payload);
    }
}

#[test]
fn test_every_record_is_fresh() {
    let (wire, _) = browser_subscription("https://fcm.googleapis.com/fcm/send/abc");
    let sub = Subscription::try_from(&wire).unwrap();

    let a = ece::encrypt(sub.public_key(), sub.auth_secret(), b"same").unwrap();
    let b = ece::encrypt(sub.public_key(), sub.auth_secret(), b"same").unwrap();
    assert_ne!(a.salt(), b.salt());
    assert_ne!(a.ephemeral_public_key(), b.ephemeral_public_key());
    assert_ne!(a.ciphertext(), b.ciphertext());
}

#[test]
fn test_seeded_randomness_reproduces_record() {
    let (wire, _) = browser_subscription("https://fcm.googleapis.com/fcm/send/abc");
    let sub = Subscription::try_from(&wire).unwrap();

    let seal = || {
        PayloadEncryptor::default()
            .with_rng(Arc::new(DeterministicRandom::new(99)))
            .encrypt(sub.public_key(), sub.auth_secret(), b"reproducible")
            .unwrap()
    };
    assert_eq!(seal(), seal());
}

#[test]
fn test_assertion_scoped_to_endpoint_origin() {
    let (wire, _) = browser_subscription("https://fcm.googleapis.com/fcm/send/abc");
    let sub = Subscription::try_from(&wire).unwrap();
    let keys = VapidKeys::generate("mailto:ops@example.com", &SystemRandom);

    let now = chrono::Utc::now().timestamp();
    let assertion = TokenBuilder::default()
        .build(&keys, &sub.audience(), 12 * 3600)
        .unwrap();

    let claims = vapid::verify_token(assertion.token(), keys.public_key_bytes()).unwrap();
    assert_eq!(claims.aud, "https://fcm.googleapis.com");
    assert_eq!(claims.sub, "mailto:ops@example.com");
    assert!(claims.exp > now);
    assert!(claims.exp <= now + 24 * 3600 + 5);
    assert_eq!(assertion.public_key(), keys.public_key_base64url());
}

#[test]
fn test_keys_survive_base64url_transport() {
    let keys = VapidKeys::generate("https://example.com/contact", &SystemRandom);
    let raw = VapidKeys::from_base64url(
        keys.subject(),
        &keys.public_key_base64url(),
        &keys.private_key_base64url(),
    )
    .unwrap();
    let pkcs8 = VapidKeys::from_base64url(
        keys.subject(),
        &keys.public_key_base64url(),
        &keys.private_key_pkcs8_base64url().unwrap(),
    )
    .unwrap();
    assert_eq!(raw.private_key_base64url(), keys.private_key_base64url());
    assert_eq!(pkcs8.private_key_base64url(), keys.private_key_base64url());

    let assertion = TokenBuilder::default()
        .build(&pkcs8, "https://push.example.net", 60)
        .unwrap();
    assert!(vapid::verify_token(assertion.token(), keys.public_key_bytes()).is_ok());
}

#[test]
fn test_malformed_subscription_key_fails_before_encryption() {
    let (mut wire, _) = browser_subscription("https://fcm.googleapis.com/fcm/send/abc");
    wire.keys.p256dh = base64url::encode([0u8; 65]);
    let err = Subscription::try_from(&wire).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Crypto);
}
