//! Security access seed/key handshake (UDS 0x27)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

/// Default session key XORed with the seed to derive the expected key
pub const DEFAULT_SESSION_KEY: [u8; 2] = [0x35, 0x30];

/// Security access state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityState {
    #[default]
    Locked,
    /// A seed is pending; valid for exactly one key attempt
    SeedIssued([u8; 2]),
    Unlocked,
}

/// Key submission failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum KeyRejected {
    #[error("No seed was requested before the key")]
    NoSeed,

    #[error("Key does not match the issued seed")]
    InvalidKey,
}

/// Seed generator and key verifier
#[derive(Debug)]
pub struct SecurityAccessGuard {
    state: SecurityState,
    session_key: [u8; 2],
    rng: StdRng,
}

impl SecurityAccessGuard {
    pub fn new(session_key: [u8; 2], rng: StdRng) -> Self {
        Self {
            state: SecurityState::Locked,
            session_key,
            rng,
        }
    }

    /// Guard with the default key and an entropy-seeded generator
    pub fn from_entropy() -> Self {
        Self::new(DEFAULT_SESSION_KEY, StdRng::from_entropy())
    }

    pub fn state(&self) -> SecurityState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == SecurityState::Unlocked
    }

    /// Issue a fresh seed, replacing any pending one
    pub fn request_seed(&mut self) -> [u8; 2] {
        let seed = [self.rng.gen_range(0..255u8), self.rng.gen_range(0..255u8)];
        debug!(
            seed = format!("{:02X}{:02X}", seed[0], seed[1]),
            "Security seed issued"
        );
        self.state = SecurityState::SeedIssued(seed);
        seed
    }

    /// Verify a key against the pending seed, consuming it either way
    pub fn submit_key(&mut self, key: [u8; 2]) -> Result<(), KeyRejected> {
        let SecurityState::SeedIssued(seed) = self.state else {
            return Err(KeyRejected::NoSeed);
        };

        if key == self.expected_key(seed) {
            info!("Security access granted");
            self.state = SecurityState::Unlocked;
            Ok(())
        } else {
            debug!("Security key rejected, seed discarded");
            self.state = SecurityState::Locked;
            Err(KeyRejected::InvalidKey)
        }
    }

    /// Key that unlocks the given seed
    pub fn expected_key(&self, seed: [u8; 2]) -> [u8; 2] {
        [seed[0] ^ self.session_key[0], seed[1] ^ self.session_key[1]]
    }

    /// Drop back to locked, discarding any pending seed
    pub fn lock(&mut self) {
        self.state = SecurityState::Locked;
    }
}
