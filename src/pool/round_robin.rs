use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free cyclic index generator.
///
/// The counter only grows; the modulus is applied on read, so concurrent
/// callers observe the sequence `0, 1, .., m-1, 0, ..` in the order their
/// `fetch_add` lands.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Next index in `[0, modulus)`. `modulus` must be non-zero.
    #[inline]
    pub fn next(&self, modulus: usize) -> usize {
        debug_assert!(modulus > 0, "round robin modulus must be positive");
        let ticket = self.counter.fetch_add(1, Ordering::Relaxed);
        (ticket % modulus as u64) as usize
    }

    /// Number of indices handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}
