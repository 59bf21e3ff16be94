//! Per-connection inbound byte-rate limiting for the WebSocket transport.
//! A single `governor`-backed `GCRA` cell per connection rather than a
//! shared multi-tenant manager.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter, state::{InMemoryState, NotKeyed}, clock::DefaultClock};

/// Tracks bytes received on one WebSocket connection against a
/// bytes/second quota, using governor's cell-based GCRA limiter.
pub struct ByteRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ByteRateLimiter {
    pub fn new(bytes_per_second: u64) -> Self {
        let cells = NonZeroU32::new(bytes_per_second.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(NonZeroU32::new(1).unwrap());

        Self { limiter: RateLimiter::direct(Quota::per_second(cells)) }
    }

    /// Checks whether `len` more bytes fit the current quota. Returns
    /// `false` once the connection has exceeded its bytes/second budget;
    /// the caller closes with `1008` on that signal.
    pub fn admit(&self, len: usize) -> bool {
        let Ok(n) = u32::try_from(len) else { return false };
        let Some(n) = NonZeroU32::new(n.max(1)) else { return true };
        self.limiter.check_n(n).is_ok_and(|result| result.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_within_quota() {
        let limiter = ByteRateLimiter::new(1000);
        assert!(limiter.admit(100));
    }

    #[test]
    fn rejects_once_quota_exhausted() {
        let limiter = ByteRateLimiter::new(10);
        assert!(!limiter.admit(1_000_000));
    }
}
