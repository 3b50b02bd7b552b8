//! Randomization of computed backoff delays.
//!
//! A fleet of daemons retrying in lockstep hits the server in waves; jitter
//! spreads them out. Server-provided `Retry-After` hints are never jittered
//! (the server asked for an exact wait), and the standard retrying policy
//! defaults to [`Jitter::None`] so its backoff stays deterministic.

use rand::Rng;
use std::time::Duration;

/// Jitter strategy applied to computed delays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Use the computed delay as-is.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay / 2, delay]`, keeping a floor under the wait.
    Equal,
}

impl Jitter {
    /// Randomize `delay` with the thread-local RNG.
    pub fn apply(self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        self.apply_with_rng(delay, &mut rng)
    }

    /// Randomize `delay` with a caller-supplied RNG, for deterministic tests.
    pub fn apply_with_rng<R: Rng>(self, delay: Duration, rng: &mut R) -> Duration {
        // Millisecond precision; saturate absurdly large delays.
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Duration::ZERO;
        }
        match self {
            Jitter::None => delay,
            Jitter::Full => Duration::from_millis(rng.random_range(0..=millis)),
            Jitter::Equal => Duration::from_millis(rng.random_range(millis / 2..=millis)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn none_passes_the_delay_through() {
        assert_eq!(Jitter::None.apply(Duration::from_millis(250)), Duration::from_millis(250));
    }

    #[test]
    fn full_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let jittered = Jitter::Full.apply_with_rng(Duration::from_millis(400), &mut rng);
            assert!(jittered <= Duration::from_millis(400));
        }
    }

    #[test]
    fn equal_keeps_half_the_delay_as_floor() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let jittered = Jitter::Equal.apply_with_rng(Duration::from_millis(400), &mut rng);
            assert!(jittered >= Duration::from_millis(200));
            assert!(jittered <= Duration::from_millis(400));
        }
    }

    #[test]
    fn zero_delay_is_left_alone() {
        assert_eq!(Jitter::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
