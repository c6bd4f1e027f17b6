// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It is used only for activity noise and reproducible tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ZERO_STATE_REPLACEMENT: u64 = 0x9E3779B97F4A7C15;

static ENTROPY_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { ZERO_STATE_REPLACEMENT } else { seed };
        Self { state: seed }
    }

    /// Seeds from the wall clock mixed with a process-wide counter, so two
    /// generators created in the same nanosecond still diverge.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let count = ENTROPY_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::new(splitmix64(nanos ^ splitmix64(count)))
    }

    /// Derives an independent generator; advances `self` by one draw.
    pub fn fork(&mut self) -> Self {
        Self::new(splitmix64(self.next_u64()))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        // Marsaglia / Vigna family. Simple, fast, decent for simulation noise.
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    #[inline]
    pub fn next_f32_01(&mut self) -> f32 {
        // Convert to [0,1). 24 bits keep the result exactly representable.
        let x = self.next_u32() >> 8;
        (x as f32) / ((1u32 << 24) as f32)
    }

    /// Uniform in (0,1]: never returns exactly zero.
    #[inline]
    pub fn next_f32_open01(&mut self) -> f32 {
        1.0 - self.next_f32_01()
    }

    /// Uniform in `[low, high)`; returns `low` for an empty range.
    #[inline]
    pub fn gen_range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        let span = (high - low) as u64;
        let v = self.next_u64() % span;
        low + v as usize
    }

    /// Uniform in `[low, high]`.
    #[inline]
    pub fn gen_inclusive_usize(&mut self, low: usize, high: usize) -> usize {
        self.gen_range_usize(low, high.saturating_add(1))
    }
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
