//! Manual refresh gate (token bucket)
//!
//! Guards user-initiated refreshes so a pull-to-refresh storm cannot hammer
//! the remote endpoint. Lock-free: state lives in a single packed `AtomicU64`.

use crate::config::ManualRefreshConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

const MILLI: u64 = 1000;

/// Token bucket with per-minute refill
pub struct RefreshGate {
    // Upper 32 bits: tokens * 1000 (fixed-point)
    // Lower 32 bits: last refill, ms since creation (wrapping)
    packed: AtomicU64,
    created_at: Instant,
    burst: u32,
    refill_per_minute: u32,
}

impl RefreshGate {
    /// Start with a full bucket of `burst` tokens.
    pub fn new(burst: u32, refill_per_minute: u32) -> Self {
        let milli_tokens = burst as u64 * MILLI;
        Self {
            packed: AtomicU64::new(milli_tokens << 32),
            created_at: Instant::now(),
            burst,
            refill_per_minute,
        }
    }

    pub fn from_config(config: &ManualRefreshConfig) -> Self {
        Self::new(config.burst, config.refill_per_minute)
    }

    /// Consume one token if available.
    pub fn try_acquire(&self) -> bool {
        let now_ms = self.elapsed_ms();
        let max_milli = self.burst as u64 * MILLI;

        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let (milli_tokens, refilled) = self.refill(packed, now_ms, max_milli);

            let (next_tokens, allowed) = if milli_tokens >= MILLI {
                (milli_tokens - MILLI, true)
            } else {
                (milli_tokens, false)
            };
            let next = (next_tokens << 32) | refilled as u64;

            match self
                .packed
                .compare_exchange(packed, next, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return allowed,
                Err(_) => continue,
            }
        }
    }

    /// Whole tokens currently available (monitoring)
    pub fn available(&self) -> u32 {
        let packed = self.packed.load(Ordering::Acquire);
        let (milli_tokens, _) = self.refill(packed, self.elapsed_ms(), self.burst as u64 * MILLI);
        (milli_tokens / MILLI) as u32
    }

    /// Returns refilled milli-tokens and the new refill timestamp.
    ///
    /// The timestamp only advances when at least one milli-token was added,
    /// so frequent polling never starves a slow refill rate.
    fn refill(&self, packed: u64, now_ms: u32, max_milli: u64) -> (u64, u32) {
        let milli_tokens = packed >> 32;
        let last_ms = (packed & 0xFFFF_FFFF) as u32;
        let delta_ms = now_ms.wrapping_sub(last_ms) as u64;

        // tokens/min -> milli-tokens/ms: rate * 1000 / 60_000
        let added = delta_ms * self.refill_per_minute as u64 / 60;
        if added == 0 {
            return (milli_tokens, last_ms);
        }
        ((milli_tokens + added).min(max_milli), now_ms)
    }

    fn elapsed_ms(&self) -> u32 {
        self.created_at.elapsed().as_millis() as u32
    }
}
