//! Injected secure-randomness capability.
//!
//! Salt generation, ephemeral key generation and ECDSA signing all draw
//! from a [`SecureRandom`] passed in by the caller instead of reaching for
//! a global RNG, so tests can substitute [`DeterministicRandom`] and get
//! reproducible records.

use std::sync::atomic::{AtomicU64, Ordering};

use p256::elliptic_curve::rand_core;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Source of cryptographically secure random bytes.
///
/// Implementations must be safe for concurrent use without external
/// synchronization.
pub trait SecureRandom: Send + Sync {
    /// Fill `dest` entirely with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating-system backed randomness (thread-local CSPRNG seeded from the OS).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl SecureRandom for SystemRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rng().fill_bytes(dest);
    }
}

/// Reproducible byte stream for test vectors. NOT secure.
///
/// Each call to `fill_bytes` hashes `seed || counter` with SHA-256 and
/// advances the counter, so two instances with the same seed produce the
/// same sequence.
#[derive(Debug)]
pub struct DeterministicRandom {
    seed: u64,
    counter: AtomicU64,
}

impl DeterministicRandom {
    /// Create a stream from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
        }
    }
}

impl SecureRandom for DeterministicRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(32) {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let block = Sha256::new()
                .chain_update(self.seed.to_be_bytes())
                .chain_update(n.to_be_bytes())
                .finalize();
            chunk.copy_from_slice(&block[..chunk.len()]);
        }
    }
}

/// Bridges a [`SecureRandom`] into the `rand_core` traits the curve crate expects.
pub(crate) struct CurveRng<'a>(pub(crate) &'a dyn SecureRandom);

impl rand_core::RngCore for CurveRng<'_> {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.0.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.0.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.0.fill_bytes(dest);
        Ok(())
    }
}

impl rand_core::CryptoRng for CurveRng<'_> {}
