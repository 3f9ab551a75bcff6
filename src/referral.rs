//! Collision-free referral code allocation.

use rand::Rng;
use rand::rngs::OsRng;

use crate::error::{Result, ServerError};
use crate::user::UserRepository;

pub const CODE_LENGTH: usize = 8;
/// Retry cap bounding worst-case latency when the code space degenerates.
pub const MAX_ATTEMPTS: usize = 10;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Allocates referral codes against the persisted user set.
///
/// The existence probe is an optimization, not the correctness guarantee:
/// the unique constraint on `users.referral_code` remains the final arbiter
/// at insert time.
#[derive(Clone)]
pub struct CodeAllocator {
    repo: UserRepository,
}

impl CodeAllocator {
    /// Create a new [`CodeAllocator`].
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    /// Draw one candidate uniformly from the code alphabet.
    pub fn candidate() -> String {
        let mut rng = OsRng;

        (0..CODE_LENGTH)
            .map(|_| {
                char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())])
            })
            .collect()
    }

    /// Return a code unused at the instant of the probe, or
    /// [`ServerError::ExhaustedAllocationSpace`] once the retry cap is hit.
    pub async fn allocate(&self) -> Result<String> {
        for _ in 0..MAX_ATTEMPTS {
            let code = Self::candidate();
            if !self.repo.code_exists(&code).await? {
                return Ok(code);
            }
        }

        Err(ServerError::ExhaustedAllocationSpace)
    }
}
