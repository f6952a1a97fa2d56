//! WebPush Relay - encrypted Web Push delivery with VAPID authentication.
//!
//! Takes a notification payload, a browser push subscription and an
//! application server key pair, and produces the single HTTP POST a push
//! service (FCM, Mozilla autopush, APNs web push) accepts.
//!
//! # Architecture
//!
//! - **Encryption** - payload sealed into one `aes128gcm` record (RFC 8188/8291)
//! - **Authentication** - ES256 VAPID token scoped to the endpoint origin (RFC 8292)
//! - **Dispatch** - request assembly and response classification (RFC 8030)
//! - **Sender** - request envelope validation and end-to-end orchestration
//!
//! # Modules
//!
//! - [`crypto`] - key agreement, key derivation, payload encryption, VAPID tokens
//! - [`dispatch`] - outbound request and delivery outcome
//! - [`sender`] - request/response envelopes and the send pipeline
//! - [`config`] - configuration loading/saving

pub mod base64url;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod sender;
pub mod subscription;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use crypto::{
    AuthAssertion, AuthScheme, KeySchedule, PayloadEncryptor, PushRecord, SecureRandom,
    TokenBuilder, VapidKeys,
};
pub use dispatch::{DeliveryOutcome, Dispatcher, PushOptions, PushTransport, Urgency};
pub use error::{ErrorKind, PushError, PushResult};
pub use sender::{PushSender, SendRequest, SendResponse};
pub use subscription::{PushSubscription, Subscription};
