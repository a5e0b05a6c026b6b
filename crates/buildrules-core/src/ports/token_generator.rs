//! TokenGenerator port - conflict token minting.
//!
//! Tokens are ULIDs: the millisecond prefix comes from the injected clock and
//! the 80-bit suffix is random, so two tokens minted in the same instant still
//! differ.

use ulid::Ulid;

use crate::domain::ConflictToken;
use crate::ports::Clock;

/// Mints a fresh token for every accepted write. Every token a generator
/// returns must differ from all tokens it returned before.
pub trait TokenGenerator: Send + Sync {
    fn next_token(&self) -> ConflictToken;
}

/// ULID-based [`TokenGenerator`].
///
/// # Thread Safety
/// Holds only the clock; `rand::random` draws from a thread-local RNG, so a
/// shared generator needs no lock.
pub struct UlidTokenGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidTokenGenerator<C> {
    /// Create a generator whose timestamps come from `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> TokenGenerator for UlidTokenGenerator<C> {
    fn next_token(&self) -> ConflictToken {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        ConflictToken::from_bytes(ulid.to_bytes())
    }
}
