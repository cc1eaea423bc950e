//! Headless episode runner for determinism verification and batch
//! rollouts.
//!
//! Runs realm episodes without any agent attached: players idle while
//! NPCs, resources and respawns play out. This enables:
//!
//! - **CI verification**: the same seed must give the same final hash
//! - **Profiling**: wall-clock cost of `Realm::step` at full population
//! - **Replay capture**: bincode world dumps for external renderers
//!
//! # Example
//!
//! ```bash
//! # Run an episode and print a JSON summary
//! cargo run -p realm_headless -- run --preset small --ticks 500
//!
//! # Verify determinism across 8 parallel runs
//! cargo run -p realm_headless -- verify --config scenario.ron --runs 8
//! ```

pub mod error;
pub mod runner;
pub mod scenario;

pub use error::{HeadlessError, Result};
pub use runner::{bench, run_episode, verify_determinism, BenchReport, EpisodeRunner, EpisodeSummary, VerifyReport};
pub use scenario::{Scenario, TerrainLayout};
