//! # Realm Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Terrain and realm fixtures with seeded RNGs
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
