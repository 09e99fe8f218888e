//! Proof-of-work solver for registration challenges.
//!
//! Searches `i = 0, 1, 2, ...` for the first value where
//! `hex(SHA-256(nonce ++ decimal(i)))` starts with `difficulty` zero nibbles.
//! The search order is fixed, so a nonce always yields the same solution.

use crate::error::{PexbotError, PexbotResult};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Leading zero hex digits the backend currently requires.
pub const DEFAULT_DIFFICULTY: usize = 4;

/// Hex length of a SHA-256 digest; no solution exists above this difficulty.
pub const MAX_DIFFICULTY: usize = 64;

/// Solve at the default difficulty with no attempt cap.
pub fn solve(nonce: &str) -> String {
    let solver = Solver::default();
    let mut i: u64 = 0;
    loop {
        if solver.check(nonce, i) {
            return i.to_string();
        }
        i += 1;
    }
}

/// Configurable solver. `max_attempts = None` searches until a solution is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solver {
    pub difficulty: usize,
    pub max_attempts: Option<u64>,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            max_attempts: None,
        }
    }
}

impl Solver {
    pub fn new(difficulty: usize, max_attempts: Option<u64>) -> Self {
        Self {
            difficulty,
            max_attempts,
        }
    }

    /// Find the smallest solution for `nonce`.
    ///
    /// CPU-bound; in async contexts run it under `tokio::task::spawn_blocking`.
    pub fn solve(&self, nonce: &str) -> PexbotResult<String> {
        if self.difficulty > MAX_DIFFICULTY {
            warn!(difficulty = self.difficulty, "Challenge difficulty is unsolvable");
            return Err(PexbotError::PowExhausted { attempts: 0 });
        }
        let mut i: u64 = 0;
        loop {
            if let Some(max) = self.max_attempts {
                if i >= max {
                    return Err(PexbotError::PowExhausted { attempts: max });
                }
            }
            if self.check(nonce, i) {
                debug!(attempts = i + 1, difficulty = self.difficulty, "Proof-of-work solved");
                return Ok(i.to_string());
            }
            i += 1;
        }
    }

    /// Whether `candidate` solves `nonce` at this solver's difficulty.
    pub fn verify(&self, nonce: &str, candidate: &str) -> bool {
        meets_difficulty(&digest_hex(nonce, candidate), self.difficulty)
    }

    fn check(&self, nonce: &str, i: u64) -> bool {
        meets_difficulty(&digest_hex(nonce, &i.to_string()), self.difficulty)
    }
}

/// Lowercase hex SHA-256 of `nonce ++ solution`.
pub fn digest_hex(nonce: &str, solution: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(solution.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a hex digest starts with `difficulty` '0' characters.
pub fn meets_difficulty(digest_hex: &str, difficulty: usize) -> bool {
    digest_hex.len() >= difficulty && digest_hex.bytes().take(difficulty).all(|b| b == b'0')
}
