//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the realm produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! A realm episode must be exactly reproducible from its seed and action
//! sequence. Sources of non-determinism include:
//!
//! - **Floating-point math**: Danger and damage multipliers use
//!   fixed-point arithmetic via [`realm_core::math::Fixed`].
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities iterate in insertion order and tile sets are `BTreeSet`s.
//!
//! - **System randomness**: The engine never constructs an RNG. Every
//!   random choice draws from the `&mut impl Rng` passed to reset and step.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual components (map, combat, spawn rules)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full episodes are reproducible tick for tick
//! 4. **Parallel tests**: Running N episodes in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use tracing::debug;

use crate::fixtures::Episode;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic realm).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the realm was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Realm is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use realm_test_utils::determinism::verify_determinism;
/// use realm_test_utils::fixtures::Episode;
///
/// let result = verify_determinism(
///     3,  // Run 3 times
///     20, // 20 ticks each
///     || Episode::standard(42),
///     |episode| {
///         episode.step();
///     },
///     |episode| episode.realm.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run an episode twice and compare final state hashes.
#[must_use]
pub fn verify_realm_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Episode,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |episode| {
            episode.step();
        },
        |episode| episode.realm.state_hash(),
    )
    .is_deterministic
}

/// Result of parallel realm runs.
#[derive(Debug, Clone)]
pub struct ParallelRunResult {
    /// Final state hash from each realm.
    pub hashes: Vec<u64>,
    /// Number of ticks each realm ran.
    pub ticks: u64,
    /// Number of realms run.
    pub num_realms: usize,
}

impl ParallelRunResult {
    /// Check if all realms produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all realms matched.
    ///
    /// # Panics
    ///
    /// Panics if the realms produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel realms diverged!\n\
                 Realms: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_realms,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run N episodes on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_realms<F>(setup_fn: F, num_realms: usize, num_ticks: u64) -> ParallelRunResult
where
    F: Fn() -> Episode + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_realms)
            .map(|_| {
                s.spawn(|| {
                    let mut episode = setup_fn();
                    for _ in 0..num_ticks {
                        episode.step();
                    }
                    episode.realm.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("realm thread panicked"))
            .collect()
    });

    ParallelRunResult {
        hashes,
        ticks: num_ticks,
        num_realms,
    }
}

/// Compare two runs tick by tick, finding the first divergence.
///
/// Hashes, snapshots and event logs are all compared at every tick.
///
/// # Returns
///
/// `None` if the runs match throughout, `Some(tick)` at the first tick
/// where they differ.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Episode,
{
    let mut a = setup_fn();
    let mut b = setup_fn();

    if !same_state(&a, &b) {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let culled_a: Vec<_> = a.step().ids().collect();
        let culled_b: Vec<_> = b.step().ids().collect();

        if culled_a != culled_b || !same_state(&a, &b) {
            debug!(tick, "Runs diverged");
            return Some(tick);
        }
    }

    None
}

fn same_state(a: &Episode, b: &Episode) -> bool {
    a.realm.state_hash() == b.realm.state_hash() && a.realm.snapshot() == b.realm.snapshot()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
