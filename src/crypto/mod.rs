//! Web Push message cryptography.
//!
//! Two independent pipelines prepare every push message:
//!
//! ```text
//! plaintext ──► ece::PayloadEncryptor ──► PushRecord (request body)
//!                 ├── ecdh  (ephemeral P-256 agreement)
//!                 └── kdf   (HKDF-SHA-256 key/nonce derivation)
//!
//! VapidKeys ──► vapid::TokenBuilder ──► AuthAssertion (Authorization header)
//! ```
//!
//! Both draw randomness from an injected [`random::SecureRandom`].

pub mod ece;
pub mod ecdh;
pub mod kdf;
pub mod random;
pub mod vapid;

pub use ece::{KeySchedule, PayloadEncryptor, PushRecord};
pub use random::{DeterministicRandom, SecureRandom, SystemRandom};
pub use vapid::{AuthAssertion, AuthScheme, TokenBuilder, VapidClaims, VapidKeys};
