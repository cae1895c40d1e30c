//! Core data types: sizes, splittable seeds and run configuration.

use crate::error::{LockstepError, Result};
use std::fmt;
use std::time::Duration;

/// Size parameter for controlling test data generation.
///
/// Size typically ranges from 0 to 100, where larger values
/// generate larger collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub usize);

impl Size {
    /// Create a new size value.
    pub fn new(value: usize) -> Self {
        Size(value)
    }

    /// Get the inner size value.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Scale a length bound by this size, treating 100 as "full range".
    pub fn scale_len(&self, min: usize, max: usize) -> usize {
        let span = max.saturating_sub(min);
        min + (span * self.0.min(100)) / 100
    }
}

impl From<usize> for Size {
    fn from(value: usize) -> Self {
        Size(value)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size({})", self.0)
    }
}

/// Splittable random seed for deterministic generation.
///
/// Seeds can be split to create independent random streams,
/// which is what makes every trial replayable from a single `u64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(pub u64, pub u64);

impl Seed {
    /// Create a new seed from a single value.
    pub fn from_u64(value: u64) -> Self {
        let state = splitmix64_mix(value);
        let gamma = mix_gamma(state);
        Seed(state, gamma)
    }

    /// Split a seed into two independent seeds.
    /// Uses SplitMix64 splitting strategy for independence.
    pub fn split(self) -> (Self, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        let new_gamma = mix_gamma(output);

        (Seed(new_state, gamma), Seed(output, new_gamma))
    }

    /// Generate the next random value and advance the seed.
    pub fn next_u64(self) -> (u64, Self) {
        let Seed(state, gamma) = self;
        let new_state = state.wrapping_add(gamma);
        let output = splitmix64_mix(new_state);
        (output, Seed(new_state, gamma))
    }

    /// Generate a bounded random value in `[0, bound)`.
    pub fn next_bounded(self, bound: u64) -> (u64, Self) {
        let (value, new_seed) = self.next_u64();
        (((value as u128 * bound as u128) >> 64) as u64, new_seed)
    }

    /// Generate a random bool.
    pub fn next_bool(self) -> (bool, Self) {
        let (value, new_seed) = self.next_u64();
        (value & 1 == 1, new_seed)
    }

    /// Pick a fresh run seed from the thread-local RNG.
    pub fn fresh_u64() -> u64 {
        use rand::Rng;
        rand::thread_rng().gen()
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({}, {})", self.0, self.1)
    }
}

/// Configuration for a model-based test run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of trials (generated sequences) to run.
    pub test_limit: usize,

    /// Target number of commands per generated sequence.
    pub sequence_length: usize,

    /// Maximum number of candidate replays while shrinking.
    pub shrink_limit: usize,

    /// Size handed to argument generators.
    pub size: Size,

    /// Consecutive rejected draws before a sequence is cut short.
    pub retry_limit: usize,

    /// Exhausted trials tolerated before the run gives up.
    pub discard_limit: usize,

    /// Worker threads for trials; `0` uses one per CPU.
    pub thread_count: usize,

    /// Wall-clock budget after which no new trial is started.
    pub time_budget: Option<Duration>,

    /// Run seed; a fresh one is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test_limit: 100,
            sequence_length: 50,
            shrink_limit: 1000,
            size: Size(30),
            retry_limit: 100,
            discard_limit: 100,
            thread_count: 1,
            time_budget: None,
            seed: None,
        }
    }
}

impl Config {
    /// Set the number of trials.
    pub fn with_tests(mut self, tests: usize) -> Self {
        self.test_limit = tests;
        self
    }

    /// Set the target sequence length.
    pub fn with_sequence_length(mut self, length: usize) -> Self {
        self.sequence_length = length;
        self
    }

    /// Set the shrink replay limit.
    pub fn with_shrinks(mut self, shrinks: usize) -> Self {
        self.shrink_limit = shrinks;
        self
    }

    /// Set the generation size.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Size(size);
        self
    }

    /// Set the consecutive rejection bound used by the sequence builder.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retry_limit = retries;
        self
    }

    /// Set the number of exhausted trials tolerated.
    pub fn with_discards(mut self, discards: usize) -> Self {
        self.discard_limit = discards;
        self
    }

    /// Set the number of worker threads (`0` = one per CPU).
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    /// Stop starting trials once `budget` has elapsed.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// Fix the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Default configuration overridden by `LOCKSTEP_SEED`, `LOCKSTEP_TESTS`
    /// and `LOCKSTEP_THREADS` when they are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        if let Some(seed) = env_number("LOCKSTEP_SEED")? {
            config.seed = Some(seed);
        }
        if let Some(tests) = env_number("LOCKSTEP_TESTS")? {
            config.test_limit = tests as usize;
        }
        if let Some(threads) = env_number("LOCKSTEP_THREADS")? {
            config.thread_count = threads as usize;
        }
        Ok(config)
    }

    /// Reject configurations the engine cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        if self.retry_limit == 0 {
            return Err(LockstepError::InvalidConfig {
                message: "retry_limit must be at least 1".to_string(),
            });
        }
        if self.size.get() > 100 {
            return Err(LockstepError::InvalidConfig {
                message: format!("size must be at most 100, got {}", self.size.get()),
            });
        }
        Ok(())
    }

    /// Number of worker threads after resolving `0` to the CPU count.
    pub fn effective_threads(&self) -> usize {
        match self.thread_count {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            n => n,
        }
    }
}

fn env_number(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| LockstepError::InvalidConfig {
                message: format!("{name}={raw:?} is not a number: {err}"),
            }),
        Err(_) => Ok(None),
    }
}

/// SplitMix64 mixing function for high-quality output.
fn splitmix64_mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Generate a good gamma value for SplitMix64 splitting.
fn mix_gamma(mut z: u64) -> u64 {
    z = splitmix64_mix(z);
    // Odd gamma keeps the full period
    (z | 1).wrapping_mul(0x9e3779b97f4a7c15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_deterministic() {
        let a = Seed::from_u64(7);
        let b = Seed::from_u64(7);
        assert_eq!(a, b);
        assert_eq!(a.next_u64().0, b.next_u64().0);
    }

    #[test]
    fn test_split_streams_differ() {
        let (left, right) = Seed::from_u64(42).split();
        assert_ne!(left.next_u64().0, right.next_u64().0);
    }

    #[test]
    fn test_next_bounded_stays_in_range() {
        let mut seed = Seed::from_u64(1);
        for _ in 0..1000 {
            let (value, next) = seed.next_bounded(7);
            assert!(value < 7);
            seed = next;
        }
    }

    #[test]
    fn test_scale_len() {
        assert_eq!(Size(0).scale_len(1, 10), 1);
        assert_eq!(Size(100).scale_len(1, 10), 10);
        assert_eq!(Size(50).scale_len(0, 10), 5);
        assert_eq!(Size(500).scale_len(0, 10), 10);
    }

    #[test]
    fn test_config_builders() {
        let config = Config::default()
            .with_tests(10)
            .with_sequence_length(5)
            .with_shrinks(3)
            .with_threads(2)
            .with_seed(9);
        assert_eq!(config.test_limit, 10);
        assert_eq!(config.sequence_length, 5);
        assert_eq!(config.shrink_limit, 3);
        assert_eq!(config.effective_threads(), 2);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = Config::default().with_retries(0);
        assert!(matches!(
            config.validate(),
            Err(LockstepError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_zero_threads_means_all_cores() {
        let config = Config::default().with_threads(0);
        assert!(config.effective_threads() >= 1);
    }
}
