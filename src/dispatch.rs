//! Outbound push request assembly and response classification.
//!
//! The dispatcher merges an encrypted [`PushRecord`] and a signed
//! [`AuthAssertion`] into a single POST to the subscription endpoint
//! (RFC 8030), then maps the push service's status onto a
//! [`DeliveryOutcome`]. It never retries; retry policy belongs to the caller.
//!
//! # Classification
//!
//! | Status | Outcome |
//! |---|---|
//! | 2xx | `Delivered` |
//! | 404, 410 | `Gone` (drop the subscription) |
//! | 429, 5xx, timeout, unreachable | `TransientFailure` (retry with backoff) |
//! | other 4xx | `Rejected` |

// Rust guideline compliant 2026-02

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{CONTENT_ENCODING, DEFAULT_CONTENT_TYPE, MAX_TOPIC_LEN};
use crate::crypto::{AuthAssertion, AuthScheme, PushRecord};
use crate::error::{PushError, PushResult};
use crate::subscription::Subscription;

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Push service accepted the message.
    Delivered {
        /// Upstream status (2xx).
        status: u16,
    },
    /// Push service refused the message; retrying the same request won't help.
    Rejected {
        /// Response body text.
        reason: String,
        /// Upstream status.
        status: u16,
    },
    /// Subscription is permanently invalid; stop sending to it.
    Gone {
        /// Upstream status (404 or 410).
        status: u16,
    },
    /// Rate limited, server error, timeout or unreachable; eligible for retry.
    TransientFailure {
        /// What went wrong.
        reason: String,
        /// Upstream status, if a response arrived.
        status: Option<u16>,
    },
}

impl DeliveryOutcome {
    /// Whether the message was accepted.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    /// Whether the caller should drop the subscription.
    pub fn should_drop_subscription(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }

    /// Whether an external retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }

    /// Upstream status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Delivered { status } | Self::Rejected { status, .. } | Self::Gone { status } => {
                Some(*status)
            }
            Self::TransientFailure { status, .. } => *status,
        }
    }
}

/// Map a push service response onto an outcome.
pub fn classify(status: u16, body: String) -> DeliveryOutcome {
    match status {
        200..=299 => DeliveryOutcome::Delivered { status },
        404 | 410 => DeliveryOutcome::Gone { status },
        429 | 500..=599 => DeliveryOutcome::TransientFailure {
            reason: if body.is_empty() {
                format!("Push service returned {status}")
            } else {
                body
            },
            status: Some(status),
        },
        _ => DeliveryOutcome::Rejected {
            reason: body,
            status,
        },
    }
}

/// Message urgency hint (RFC 8030 §5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// Deliver only on power and Wi-Fi.
    VeryLow,
    /// Deliver on power or Wi-Fi.
    Low,
    /// Default delivery.
    Normal,
    /// Deliver immediately, even on low battery.
    High,
}

impl Urgency {
    /// Header value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-message delivery options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOptions {
    ttl: u32,
    urgency: Option<Urgency>,
    topic: Option<String>,
}

impl PushOptions {
    /// Options with the given TTL in seconds.
    pub fn new(ttl: u32) -> Self {
        Self {
            ttl,
            urgency: None,
            topic: None,
        }
    }

    /// Attach an urgency hint.
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = Some(urgency);
        self
    }

    /// Attach a replacement topic (≤ 32 base64url characters).
    pub fn with_topic(mut self, topic: impl Into<String>) -> PushResult<Self> {
        let topic = topic.into();
        let valid_chars = topic
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if topic.is_empty() || topic.len() > MAX_TOPIC_LEN || !valid_chars {
            return Err(PushError::input(format!(
                "Topic must be 1-{MAX_TOPIC_LEN} base64url characters"
            )));
        }
        self.topic = Some(topic);
        Ok(self)
    }

    /// Time-to-live in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Urgency hint, if set.
    pub fn urgency(&self) -> Option<Urgency> {
        self.urgency
    }

    /// Topic, if set.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

/// Fully assembled POST to a push endpoint.
#[derive(Clone)]
pub struct OutboundRequest {
    /// Subscription endpoint.
    pub endpoint: Url,
    /// Request headers in send order.
    pub headers: Vec<(&'static str, String)>,
    /// Encrypted record.
    pub body: Vec<u8>,
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("endpoint", &self.endpoint.as_str())
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl OutboundRequest {
    /// First header value named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Push service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: u16,
    /// Response body text (may be empty).
    pub body: String,
}

/// Failure to obtain any response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Request exceeded the configured timeout.
    #[error("Push request timed out")]
    Timeout,
    /// Connection could not be established or was interrupted.
    #[error("Push service unreachable: {0}")]
    Unreachable(String),
}

/// "Send bytes and headers, receive a status" capability.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// POST `request` and return the response status and body.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Timeout` when the configured timeout elapses,
    /// or `TransportError::Unreachable` when no response was received.
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// [`PushTransport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the given request timeout.
    pub fn new(timeout: Duration) -> PushResult<Self> {
        // Redirects come back as statuses for classify
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PushError::Upstream(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (connection pooling across sends).
    ///
    /// The client should not follow redirects, or a 3xx turns the push POST
    /// into a bodyless GET.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushTransport for ReqwestTransport {
    async fn post(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self.client.post(request.endpoint);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Unreachable(e.without_url().to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("[WebPush] Failed to read push service response body ({status}): {e}");
                String::new()
            }
        };
        Ok(TransportResponse { status, body })
    }
}

/// Assembles push requests and classifies their outcome.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn PushTransport>,
    auth_scheme: AuthScheme,
    content_type: String,
    clock: fn() -> i64,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("auth_scheme", &self.auth_scheme)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher over `transport` with the combined `vapid` credential header.
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            transport,
            auth_scheme: AuthScheme::default(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            clock: || chrono::Utc::now().timestamp(),
        }
    }

    /// Choose how the credential is presented.
    pub fn with_auth_scheme(mut self, scheme: AuthScheme) -> Self {
        self.auth_scheme = scheme;
        self
    }

    /// Override the request Content-Type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Replace the clock used for assertion expiry checks.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Assemble the outbound request without sending it.
    pub fn build_request(
        &self,
        subscription: &Subscription,
        record: PushRecord,
        assertion: &AuthAssertion,
        options: &PushOptions,
    ) -> OutboundRequest {
        let mut headers = vec![
            ("Content-Type", self.content_type.clone()),
            ("Content-Encoding", CONTENT_ENCODING.to_string()),
            ("TTL", options.ttl().to_string()),
        ];
        headers.extend(assertion.headers(self.auth_scheme));
        if let Some(urgency) = options.urgency() {
            headers.push(("Urgency", urgency.to_string()));
        }
        if let Some(topic) = options.topic() {
            headers.push(("Topic", topic.to_string()));
        }

        OutboundRequest {
            endpoint: subscription.endpoint().clone(),
            headers,
            body: record.into_bytes(),
        }
    }

    /// Send `record` to the subscription and classify the response.
    ///
    /// Fails with an input error, before any network I/O, if the assertion
    /// was scoped to a different origin or has already expired.
    pub async fn send(
        &self,
        subscription: &Subscription,
        record: PushRecord,
        assertion: &AuthAssertion,
        options: &PushOptions,
    ) -> PushResult<DeliveryOutcome> {
        let origin = subscription.audience();
        if assertion.audience() != origin {
            return Err(PushError::input(format!(
                "Assertion audience {} does not match endpoint origin {origin}",
                assertion.audience()
            )));
        }
        if assertion.is_expired_at((self.clock)()) {
            return Err(PushError::input("Assertion has expired; sign a new one"));
        }

        let request = self.build_request(subscription, record, assertion, options);
        log::debug!(
            "[WebPush] POST {} ({} bytes, TTL {})",
            origin,
            request.body.len(),
            options.ttl()
        );

        let outcome = match self.transport.post(request).await {
            Ok(response) => classify(response.status, response.body),
            Err(e) => DeliveryOutcome::TransientFailure {
                reason: e.to_string(),
                status: None,
            },
        };

        match &outcome {
            DeliveryOutcome::Delivered { status } => {
                log::info!("[WebPush] Delivered to {origin} ({status})");
            }
            DeliveryOutcome::Gone { status } => {
                log::info!("[WebPush] Subscription expired at {origin} ({status})");
            }
            DeliveryOutcome::TransientFailure { status, .. } => {
                log::warn!("[WebPush] Transient failure at {origin} ({status:?})");
            }
            DeliveryOutcome::Rejected { status, .. } => {
                log::warn!("[WebPush] Rejected by {origin} ({status})");
            }
        }

        Ok(outcome)
    }
}
