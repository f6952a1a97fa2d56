//! Send request handling: validate, encrypt, sign, dispatch.
//!
//! [`PushSender`] takes a caller's [`SendRequest`] envelope through the whole
//! pipeline and reports the result as a [`SendResponse`] envelope. Each call
//! is independent; the sender holds configuration and capabilities only.
//!
//! ```text
//! SendRequest ─► validation ─► Subscription + VapidKeys
//!                                  │            │
//!                  PayloadEncryptor│            │TokenBuilder
//!                                  ▼            ▼
//!                             PushRecord   AuthAssertion
//!                                  └─────┬──────┘
//!                                    Dispatcher ─► DeliveryOutcome ─► SendResponse
//! ```

// Rust guideline compliant 2026-02

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::constants::MAX_TTL_SECS;
use crate::crypto::{PayloadEncryptor, SecureRandom, TokenBuilder, VapidKeys};
use crate::dispatch::{
    DeliveryOutcome, Dispatcher, PushOptions, PushTransport, ReqwestTransport, Urgency,
};
use crate::error::{PushError, PushResult};
use crate::subscription::{PushSubscription, Subscription};
use crate::validation;

/// Application server VAPID credentials as supplied by the caller.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VapidCredentials {
    /// Contact URI (`mailto:` or `https://`).
    pub subject: String,
    /// Base64url uncompressed P-256 public key.
    pub public_key: String,
    /// Base64url private key (raw scalar, SEC1 or PKCS#8).
    pub private_key: String,
}

impl std::fmt::Debug for VapidCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidCredentials")
            .field("subject", &self.subject)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// One push notification to send.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SendRequest {
    /// Caller identity checked against the allow-list.
    pub site_key: Option<String>,
    /// Application server credentials.
    pub vapid: Option<VapidCredentials>,
    /// Target browser subscription.
    pub subscription: Option<PushSubscription>,
    /// Notification payload, serialized as JSON before encryption.
    pub payload: Option<Value>,
    /// Message TTL in seconds; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    /// Delivery urgency hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// Replacement topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Result envelope returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    /// Whether the push service accepted the message.
    pub success: bool,
    /// Success message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure detail (push service response body, validation context).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// HTTP-style status for the caller.
    pub status: u16,
}

impl SendResponse {
    fn delivered() -> Self {
        Self {
            success: true,
            message: Some("Push notification sent successfully".to_string()),
            error: None,
            details: None,
            status: 200,
        }
    }

    fn failure(status: u16, error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            details: details.filter(|d| !d.is_empty()),
            status,
        }
    }

    fn from_outcome(outcome: DeliveryOutcome) -> Self {
        match outcome {
            DeliveryOutcome::Delivered { .. } => Self::delivered(),
            DeliveryOutcome::Rejected { reason, status } => {
                Self::failure(status, format!("Push service error: {status}"), Some(reason))
            }
            DeliveryOutcome::Gone { status } => Self::failure(
                status,
                format!("Push service error: {status}"),
                Some("Subscription has expired or is no longer valid".to_string()),
            ),
            DeliveryOutcome::TransientFailure {
                reason,
                status: Some(status),
            } => Self::failure(status, format!("Push service error: {status}"), Some(reason)),
            DeliveryOutcome::TransientFailure {
                reason,
                status: None,
            } => Self::failure(504, "Push service unavailable", Some(reason)),
        }
    }

    fn from_error(err: SendError) -> Self {
        match err {
            SendError::SiteKeyNotAllowed => Self::failure(403, "Invalid site key", None),
            SendError::Push(PushError::Input(msg)) => Self::failure(400, msg, None),
            SendError::Push(err @ PushError::InvalidKey(_)) => {
                Self::failure(400, err.to_string(), None)
            }
            SendError::Push(err @ PushError::Crypto(_)) => {
                Self::failure(500, "Internal server error", Some(err.to_string()))
            }
            SendError::Push(err @ PushError::Upstream(_)) => {
                Self::failure(502, "Push service unavailable", Some(err.to_string()))
            }
        }
    }
}

/// Reasons a request never reached the push service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Site key is not on the allow-list.
    #[error("Invalid site key")]
    SiteKeyNotAllowed,
    /// Validation, key or crypto failure.
    #[error(transparent)]
    Push(#[from] PushError),
}

/// Runs send requests through the push pipeline.
#[derive(Clone, Debug)]
pub struct PushSender {
    config: Config,
    encryptor: PayloadEncryptor,
    tokens: TokenBuilder,
    dispatcher: Dispatcher,
}

impl PushSender {
    /// Sender that posts over HTTPS with the configured timeout.
    pub fn new(config: Config) -> PushResult<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Sender over a caller-supplied transport.
    pub fn with_transport(config: Config, transport: Arc<dyn PushTransport>) -> Self {
        let dispatcher = Dispatcher::new(transport)
            .with_auth_scheme(config.auth_scheme)
            .with_content_type(config.content_type.clone());
        Self {
            encryptor: PayloadEncryptor::new(config.key_schedule),
            tokens: TokenBuilder::default(),
            dispatcher,
            config,
        }
    }

    /// Replace the randomness source for both encryption and signing.
    pub fn with_rng(mut self, rng: Arc<dyn SecureRandom>) -> Self {
        self.encryptor = self.encryptor.with_rng(Arc::clone(&rng));
        self.tokens = self.tokens.with_rng(rng);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send and report the result as a response envelope.
    pub async fn send(&self, request: &SendRequest) -> SendResponse {
        match self.deliver(request).await {
            Ok(outcome) => SendResponse::from_outcome(outcome),
            Err(err) => {
                log::warn!("[WebPush] Send failed before dispatch: {err}");
                SendResponse::from_error(err)
            }
        }
    }

    /// Validate, encrypt, sign and dispatch one request.
    ///
    /// Returns an error only when nothing was sent; every push service
    /// response is an `Ok` outcome.
    pub async fn deliver(&self, request: &SendRequest) -> Result<DeliveryOutcome, SendError> {
        let (site_key, vapid, wire_subscription, payload) = match (
            request.site_key.as_deref().filter(|k| !k.is_empty()),
            request.vapid.as_ref(),
            request.subscription.as_ref(),
            request.payload.as_ref().filter(|p| validation::is_truthy(p)),
        ) {
            (Some(site_key), Some(vapid), Some(subscription), Some(payload)) => {
                (site_key, vapid, subscription, payload)
            }
            _ => {
                return Err(PushError::input(
                    "Missing required fields: site_key, vapid, subscription, payload",
                )
                .into())
            }
        };

        if !self.config.is_site_key_allowed(site_key) {
            return Err(SendError::SiteKeyNotAllowed);
        }

        validation::validate_vapid(vapid)?;
        validation::validate_subscription(wire_subscription)?;
        let plaintext = validation::validate_payload(payload)?;
        let options = self.options_for(request)?;

        let subscription = Subscription::try_from(wire_subscription)?;
        let keys = VapidKeys::from_base64url(&vapid.subject, &vapid.public_key, &vapid.private_key)?;

        let record = self.encryptor.encrypt(
            subscription.public_key(),
            subscription.auth_secret(),
            &plaintext,
        )?;
        let assertion = self.tokens.build(
            &keys,
            &subscription.audience(),
            self.config.token_lifetime_seconds,
        )?;

        Ok(self
            .dispatcher
            .send(&subscription, record, &assertion, &options)
            .await?)
    }

    fn options_for(&self, request: &SendRequest) -> PushResult<PushOptions> {
        let ttl = request.ttl.unwrap_or(self.config.ttl_seconds);
        if ttl > MAX_TTL_SECS {
            return Err(PushError::input(format!(
                "TTL must be at most {MAX_TTL_SECS} seconds, got {ttl}"
            )));
        }

        let mut options = PushOptions::new(ttl);
        if let Some(urgency) = request.urgency {
            options = options.with_urgency(urgency);
        }
        if let Some(topic) = &request.topic {
            options = options.with_topic(topic.as_str())?;
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base64url;
    use crate::crypto::ecdh::{generate_ephemeral_key_pair, EphemeralKeyPair};
    use crate::crypto::{ece, vapid, KeySchedule, SystemRandom};
    use crate::dispatch::{OutboundRequest, TransportError, TransportResponse};
    use crate::subscription::SubscriptionKeys;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingTransport {
        status: u16,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl RecordingTransport {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> OutboundRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse {
                status: self.status,
                body: "push service says no".into(),
            })
        }
    }

    struct Fixture {
        subscriber: EphemeralKeyPair,
        auth: [u8; 16],
        vapid: VapidKeys,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                subscriber: generate_ephemeral_key_pair(&SystemRandom),
                auth: [5u8; 16],
                vapid: VapidKeys::generate("mailto:ops@example.com", &SystemRandom),
            }
        }

        fn request(&self) -> SendRequest {
            SendRequest {
                site_key: Some("site-a".into()),
                vapid: Some(VapidCredentials {
                    subject: self.vapid.subject().to_string(),
                    public_key: self.vapid.public_key_base64url(),
                    private_key: self.vapid.private_key_base64url(),
                }),
                subscription: Some(PushSubscription {
                    endpoint: "https://fcm.googleapis.com/fcm/send/abc".into(),
                    keys: SubscriptionKeys {
                        p256dh: base64url::encode(self.subscriber.public_bytes()),
                        auth: base64url::encode(self.auth),
                    },
                }),
                payload: Some(json!({"title": "Build finished", "body": "All green"})),
                ..SendRequest::default()
            }
        }
    }

    #[tokio::test]
    async fn test_successful_send_end_to_end() {
        let fx = Fixture::new();
        let transport = RecordingTransport::new(201);
        let sender = PushSender::with_transport(Config::default(), transport.clone());

        let response = sender.send(&fx.request()).await;
        assert_eq!(response, SendResponse::delivered());

        let request = transport.last();
        assert_eq!(request.header("TTL"), Some("86400"));
        let plaintext = ece::decrypt(
            &request.body,
            fx.subscriber.secret_key(),
            &fx.auth,
            KeySchedule::Contextual,
        )
        .unwrap();
        assert_eq!(
            plaintext,
            serde_json::to_vec(&json!({"title": "Build finished", "body": "All green"})).unwrap()
        );

        let auth = request.header("Authorization").unwrap();
        let token = auth
            .strip_prefix("vapid t=")
            .and_then(|rest| rest.split(", k=").next())
            .unwrap();
        let claims = vapid::verify_token(token, fx.vapid.public_key_bytes()).unwrap();
        assert_eq!(claims.aud, "https://fcm.googleapis.com");
        assert_eq!(claims.sub, "mailto:ops@example.com");
    }

    #[tokio::test]
    async fn test_configured_schedule_and_options() {
        let fx = Fixture::new();
        let transport = RecordingTransport::new(201);
        let config = Config {
            key_schedule: KeySchedule::Rfc8291,
            ..Config::default()
        };
        let sender = PushSender::with_transport(config, transport.clone());

        let mut request = fx.request();
        request.ttl = Some(60);
        request.urgency = Some(Urgency::Low);
        request.topic = Some("builds".into());
        assert!(sender.send(&request).await.success);

        let sent = transport.last();
        assert_eq!(sent.header("TTL"), Some("60"));
        assert_eq!(sent.header("Urgency"), Some("low"));
        assert_eq!(sent.header("Topic"), Some("builds"));
        assert!(ece::decrypt(&sent.body, fx.subscriber.secret_key(), &fx.auth, KeySchedule::Rfc8291).is_ok());
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let fx = Fixture::new();
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(201));

        let mut request = fx.request();
        request.payload = None;
        let response = sender.send(&request).await;
        assert_eq!(response.status, 400);
        assert_eq!(
            response.error.as_deref(),
            Some("Missing required fields: site_key, vapid, subscription, payload")
        );
    }

    #[tokio::test]
    async fn test_falsy_payload_counts_as_missing() {
        let fx = Fixture::new();
        let transport = RecordingTransport::new(201);
        let sender = PushSender::with_transport(Config::default(), transport.clone());

        for payload in [json!(false), json!(""), json!(0)] {
            let mut request = fx.request();
            request.payload = Some(payload.clone());
            let response = sender.send(&request).await;
            assert_eq!(response.status, 400, "payload {payload}");
            assert_eq!(
                response.error.as_deref(),
                Some("Missing required fields: site_key, vapid, subscription, payload")
            );
        }
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payload_over_record_capacity_fails_validation() {
        let fx = Fixture::new();
        let transport = RecordingTransport::new(201);
        let sender = PushSender::with_transport(Config::default(), transport.clone());

        // 4090 bytes serialized: under 4096 but more than one record holds
        let mut request = fx.request();
        request.payload = Some(json!({"title": "a".repeat(4078)}));
        let response = sender.send(&request).await;
        assert_eq!(response.status, 400);
        assert_eq!(
            response.error.as_deref(),
            Some("Payload size (4090 bytes) exceeds maximum allowed (4079 bytes)")
        );
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_site_key_not_allowed() {
        let fx = Fixture::new();
        let transport = RecordingTransport::new(201);
        let config = Config {
            allowed_site_keys: vec!["site-b".into()],
            ..Config::default()
        };
        let sender = PushSender::with_transport(config, transport.clone());

        let response = sender.send(&fx.request()).await;
        assert_eq!(response.status, 403);
        assert_eq!(response.error.as_deref(), Some("Invalid site key"));
        assert!(transport.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validation_message_passed_through() {
        let fx = Fixture::new();
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(201));

        let mut request = fx.request();
        request.payload = Some(json!({"icon": "bell.png"}));
        let response = sender.send(&request).await;
        assert_eq!(response.status, 400);
        assert_eq!(
            response.error.as_deref(),
            Some("Payload must contain at least title or body")
        );
    }

    #[tokio::test]
    async fn test_upstream_rejection_envelope() {
        let fx = Fixture::new();
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(403));

        let response = sender.send(&fx.request()).await;
        assert!(!response.success);
        assert_eq!(response.status, 403);
        assert_eq!(response.error.as_deref(), Some("Push service error: 403"));
        assert_eq!(response.details.as_deref(), Some("push service says no"));
    }

    #[tokio::test]
    async fn test_gone_is_reported_with_status() {
        let fx = Fixture::new();
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(410));

        let outcome = sender.deliver(&fx.request()).await.unwrap();
        assert!(outcome.should_drop_subscription());
    }

    #[tokio::test]
    async fn test_mismatched_vapid_pair_is_internal_error() {
        let fx = Fixture::new();
        let other = VapidKeys::generate("mailto:ops@example.com", &SystemRandom);
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(201));

        let mut request = fx.request();
        if let Some(vapid) = request.vapid.as_mut() {
            vapid.private_key = other.private_key_base64url();
        }
        let response = sender.send(&request).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.error.as_deref(), Some("Internal server error"));
        let details = response.details.unwrap();
        assert!(!details.contains(&other.private_key_base64url()));
    }

    #[tokio::test]
    async fn test_ttl_ceiling() {
        let fx = Fixture::new();
        let sender = PushSender::with_transport(Config::default(), RecordingTransport::new(201));

        let mut request = fx.request();
        request.ttl = Some(MAX_TTL_SECS + 1);
        assert_eq!(sender.send(&request).await.status, 400);
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "site_key": "site-a",
            "vapid": {"subject": "mailto:a@b.c", "public_key": "pk", "private_key": "sk"},
            "subscription": {"endpoint": "https://push.example.com/1", "keys": {"p256dh": "p", "auth": "a"}},
            "payload": {"title": "Hi"},
            "urgency": "very-low"
        }"#;
        let request: SendRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.site_key.as_deref(), Some("site-a"));
        assert_eq!(request.urgency, Some(Urgency::VeryLow));
        assert!(request.ttl.is_none());
        assert!(!format!("{request:?}").contains("\"sk\""));
    }

    #[test]
    fn test_response_json_shape() {
        let ok = serde_json::to_value(SendResponse::delivered()).unwrap();
        assert_eq!(
            ok,
            json!({"success": true, "message": "Push notification sent successfully", "status": 200})
        );

        let timeout = SendResponse::from_outcome(DeliveryOutcome::TransientFailure {
            reason: "Push request timed out".into(),
            status: None,
        });
        assert_eq!(timeout.status, 504);
    }
}
