//! Error types for the realm simulation.

use thiserror::Error;

use crate::entity::EntityId;

/// Result type alias using [`RealmError`].
pub type Result<T> = std::result::Result<T, RealmError>;

/// Top-level error type for all realm simulation errors.
///
/// Each invariant is raised by the component that owns it. The realm
/// propagates these unchanged and abandons the current tick.
#[derive(Debug, Error)]
pub enum RealmError {
    /// Configuration is internally inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load a configuration file.
    #[error("Failed to load config '{path}': {message}")]
    ConfigLoad {
        /// Path to the file that failed to load.
        path: String,
        /// Error message.
        message: String,
    },

    /// Terrain grid does not match the configured map size.
    #[error("Terrain is {rows}x{cols}, expected {expected}x{expected}")]
    TerrainShape {
        /// Expected side length.
        expected: usize,
        /// Number of rows supplied.
        rows: usize,
        /// Number of columns in the first mismatching row.
        cols: usize,
    },

    /// Map coordinates outside the grid.
    #[error("Position ({row}, {col}) is outside the map")]
    InvalidPosition {
        /// Row index.
        row: i32,
        /// Column index.
        col: i32,
    },

    /// Event payload does not match the shape required by its code.
    #[error("Malformed event {code}: {reason}")]
    MalformedEvent {
        /// Name of the event code.
        code: &'static str,
        /// What was wrong with the payload.
        reason: String,
    },

    /// An entity id was spawned twice.
    #[error("Entity {0} is already spawned")]
    DuplicateSpawn(EntityId),

    /// A culled set was consumed outside the tick that produced it.
    #[error("Culled set from tick {produced} consumed at tick {current}")]
    StaleCulledSet {
        /// Tick that produced the set.
        produced: u64,
        /// Current realm tick.
        current: u64,
    },

    /// Step called before reset.
    #[error("Realm has not been reset")]
    NotReset,

    /// Serialization or deserialization failure.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
