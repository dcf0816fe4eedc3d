//! Deterministic xorshift32 generator and injectable clock

use chrono::Utc;

/// Replacement for a zero seed, which would make xorshift emit zeros forever
pub const ZERO_SEED_REPLACEMENT: u32 = 0x9E37_79B9;

/// Marsaglia xorshift32 (shifts 13, 17, 5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let state = if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed };
        Self { state }
    }

    /// Seed from wall-clock time, the profile salt and a per-item seed
    #[must_use]
    pub fn from_parts(time_ms: u64, salt: u32, seed: u32) -> Self {
        Self::new((time_ms as u32) ^ salt ^ seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1_u32 << 24) as f32
    }

    /// Fair coin
    pub fn coin(&mut self) -> bool {
        self.next_f32() < 0.5
    }

    /// Uniform pick from a slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.next_u32() as usize % items.len();
        items.get(index)
    }
}

/// Source of the wall-clock component of generator seeds
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}
