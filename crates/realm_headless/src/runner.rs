//! Episode runner.
//!
//! Runs a scenario for a fixed number of ticks with idle players and
//! reports what happened. Players stand still, so the episode exercises
//! NPC behavior, resource upkeep, culls and respawns.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use realm_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{HeadlessError, Result};
use crate::scenario::Scenario;

/// Outcome of one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Scenario name.
    pub scenario: String,
    /// Episode seed.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Final state hash.
    pub state_hash: u64,
    /// Players alive at the end.
    pub players_alive: usize,
    /// NPCs alive at the end.
    pub npcs_alive: usize,
    /// Players culled during the episode.
    pub players_culled: usize,
    /// NPCs culled during the episode.
    pub npcs_culled: usize,
    /// Event counts by event name.
    pub events: BTreeMap<String, usize>,
}

impl EpisodeSummary {
    /// Pretty JSON.
    ///
    /// # Errors
    /// JSON encoding errors.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A reset realm with its episode RNG.
pub struct EpisodeRunner {
    scenario: Scenario,
    seed: u64,
    realm: Realm,
    rng: StdRng,
    players_culled: usize,
    npcs_culled: usize,
}

impl EpisodeRunner {
    /// Build and reset the realm for `scenario`.
    ///
    /// # Errors
    /// Configuration or terrain errors from the engine.
    pub fn new(scenario: Scenario, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut realm = Realm::new(scenario.config.clone())?;
        realm.reset(&scenario.terrain(), &mut rng)?;
        Ok(Self {
            scenario,
            seed,
            realm,
            rng,
            players_culled: 0,
            npcs_culled: 0,
        })
    }

    /// The realm being run.
    #[must_use]
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Advance one tick with idle players.
    ///
    /// # Errors
    /// Propagates step errors.
    pub fn step(&mut self) -> Result<()> {
        let culled = self.realm.step(&BTreeMap::new(), &mut self.rng)?;
        self.realm.check_culled(&culled)?;
        for id in culled.ids() {
            if id > 0 {
                self.players_culled += 1;
            } else {
                self.npcs_culled += 1;
            }
        }
        Ok(())
    }

    /// Advance `ticks` ticks.
    ///
    /// # Errors
    /// Propagates step errors.
    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Summarize the episode so far.
    #[must_use]
    pub fn summary(&self) -> EpisodeSummary {
        let log = self.realm.event_log();
        let events = EventCode::ALL
            .iter()
            .map(|&code| (code.name().to_string(), log.get_data(Some(code), None).len()))
            .filter(|&(_, count)| count > 0)
            .collect();
        EpisodeSummary {
            scenario: self.scenario.name.clone(),
            seed: self.seed,
            ticks: self.realm.tick(),
            state_hash: self.realm.state_hash(),
            players_alive: self.realm.players().len(),
            npcs_alive: self.realm.npcs().len(),
            players_culled: self.players_culled,
            npcs_culled: self.npcs_culled,
            events,
        }
    }

    /// Write a bincode world dump.
    ///
    /// # Errors
    /// Encoding or IO errors.
    pub fn write_dump(&self, path: &Path) -> Result<()> {
        let bytes = self.realm.dump().to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| HeadlessError::io(path, e))?;
        debug!(path = %path.display(), "Wrote world dump");
        Ok(())
    }
}

/// Run one episode to completion.
///
/// # Errors
/// Engine errors.
pub fn run_episode(scenario: &Scenario, seed: u64, ticks: u64) -> Result<EpisodeSummary> {
    let mut runner = EpisodeRunner::new(scenario.clone(), seed)?;
    runner.run(ticks)?;
    let summary = runner.summary();
    info!(
        scenario = %summary.scenario,
        seed,
        ticks,
        state_hash = summary.state_hash,
        "Episode finished"
    );
    Ok(summary)
}

/// Hashes from repeated runs of the same episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Seed used for every run.
    pub seed: u64,
    /// Ticks per run.
    pub ticks: u64,
    /// Final hash of each run.
    pub hashes: Vec<u64>,
}

impl VerifyReport {
    /// Every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run the same episode `runs` times in parallel and collect final hashes.
///
/// # Errors
/// [`HeadlessError::NoRuns`] for zero runs; engine errors otherwise.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32, ticks: u64) -> Result<VerifyReport> {
    if runs == 0 {
        return Err(HeadlessError::NoRuns);
    }
    let hashes = (0..runs)
        .into_par_iter()
        .map(|_| run_episode(scenario, seed, ticks).map(|summary| summary.state_hash))
        .collect::<Result<Vec<u64>>>()?;
    Ok(VerifyReport { seed, ticks, hashes })
}

/// Step timing for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchReport {
    /// Ticks simulated.
    pub ticks: u64,
    /// Wall-clock time for all ticks, in seconds.
    pub total_seconds: f64,
    /// Mean ticks per second.
    pub ticks_per_second: f64,
}

/// Time `ticks` steps of one episode. Reset is not timed.
///
/// # Errors
/// Engine errors.
pub fn bench(scenario: &Scenario, seed: u64, ticks: u64) -> Result<BenchReport> {
    let mut runner = EpisodeRunner::new(scenario.clone(), seed)?;
    let start = Instant::now();
    runner.run(ticks)?;
    let total_seconds = start.elapsed().as_secs_f64();
    let ticks_per_second = if total_seconds > 0.0 {
        ticks as f64 / total_seconds
    } else {
        0.0
    };
    Ok(BenchReport {
        ticks,
        total_seconds,
        ticks_per_second,
    })
}
