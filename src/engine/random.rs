//! Thread-local pseudo-random number generation.
//!
//! A minimal, lock-free **xorshift64\*** generator with one independent
//! state per thread. Used wherever the engine needs cheap randomness that
//! must not contend (sink selection during pool rebalancing, randomized
//! test churn). Deterministic per thread: the state is seeded with a fixed
//! non-zero constant, so a single-threaded call sequence always reproduces.
//!
//! Not cryptographically secure; for statistically rigorous randomness use
//! a dedicated generator instead.

use std::cell::Cell;


thread_local! {
    static TL_RNG: Cell<u64> = const { Cell::new(0x9E37_79B9_7F4A_7C15) };
}

/// Returns a thread-local pseudo-random `u64`.
#[inline]
pub fn tl_rand_u64() -> u64 {
    TL_RNG.with(|cell| {
        let mut x = cell.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        cell.set(x);
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    })
}

/// Returns a thread-local pseudo-random index in `[0, bound)`.
///
/// ## Panics
/// Panics if `bound` is zero.
#[inline]
pub fn tl_rand_index(bound: usize) -> usize {
    assert!(bound > 0, "bound must be non-zero");
    (tl_rand_u64() % bound as u64) as usize
}

/// Returns a thread-local pseudo-random boolean.
#[inline]
pub fn tl_rand_bool() -> bool {
    tl_rand_u64() & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_stays_in_bounds() {
        for bound in 1..32usize {
            for _ in 0..64 {
                assert!(tl_rand_index(bound) < bound);
            }
        }
    }
}
