//! Deep-search continuous loop (§4.8): chains fixed-budget optimizer
//! invocations, carrying the elite archive across chunks, until the caller
//! stops it or it plateaus. Shaped after the teacher's `GameLoop` state
//! machine — `run_chunk` is one accumulator tick, not the whole run.

use std::time::Instant;

use crate::config::OptimizerConfig;
use crate::grid::GridState;
use crate::optimizer::{run_optimizer_with_stop, OptimizerResult};
use crate::scoring::Score;

/// Plateau window (§4.8): consecutive chunks with no score improvement
/// before the loop calls itself done.
const DEFAULT_PLATEAU_CHUNKS: u32 = 5;

/// Current state of a [`DeepSearchLoop`] (§4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeepSearchState {
    RunningChunk,
    BetweenChunks,
    StopRequested,
    AutoPlateauStop,
    Done,
}

/// Drives a chain of time-boxed `run_optimizer_with_stop` calls, each
/// seeded from the previous chunk's layout and elite archive (§4.8, §6).
pub struct DeepSearchLoop {
    grid: GridState,
    cfg: OptimizerConfig,
    best_score: Option<Score>,
    state: DeepSearchState,
    total_iterations: u64,
    stagnant_chunks: u32,
    plateau_chunks: u32,
}

impl DeepSearchLoop {
    pub fn new(start: &GridState, cfg: OptimizerConfig) -> Self {
        let mut cfg = cfg;
        cfg.mode = crate::config::OptimizerMode::Deep;
        cfg.persist_elite_archive = true;
        Self {
            grid: start.clone(),
            cfg,
            best_score: None,
            state: DeepSearchState::BetweenChunks,
            total_iterations: 0,
            stagnant_chunks: 0,
            plateau_chunks: DEFAULT_PLATEAU_CHUNKS,
        }
    }

    pub fn state(&self) -> DeepSearchState {
        self.state
    }

    /// Caller-facing cancellation (§5 `shouldStop`): takes effect at the
    /// next chunk boundary, not mid-chunk.
    pub fn request_stop(&mut self) {
        if !matches!(self.state, DeepSearchState::Done) {
            self.state = DeepSearchState::StopRequested;
        }
    }

    /// Run one time-boxed chunk (`cfg.time_budget_ms`), feeding the
    /// previous chunk's elite archive in and carrying the new one out.
    /// Returns the loop's state after the chunk completes.
    pub fn run_chunk(&mut self) -> DeepSearchState {
        if matches!(self.state, DeepSearchState::StopRequested | DeepSearchState::AutoPlateauStop | DeepSearchState::Done) {
            self.state = DeepSearchState::Done;
            return self.state;
        }

        self.state = DeepSearchState::RunningChunk;
        let deadline = Instant::now() + std::time::Duration::from_millis(self.cfg.time_budget_ms);

        let result = run_optimizer_with_stop(&self.grid, &self.cfg, |_, _| {}, || Instant::now() >= deadline);

        self.total_iterations += result.iterations;
        self.cfg.incoming_elite_archive = result.elite_archive.as_ref().map(|a| a.entries().to_vec());

        let improved = match self.best_score {
            Some(best) => result.score.total < best.total,
            None => true,
        };
        if improved {
            self.stagnant_chunks = 0;
            self.best_score = Some(result.score);
        } else {
            self.stagnant_chunks += 1;
        }
        self.grid = result.grid;

        self.state = if self.stagnant_chunks >= self.plateau_chunks {
            DeepSearchState::AutoPlateauStop
        } else {
            DeepSearchState::BetweenChunks
        };
        self.state
    }

    /// Collapse the loop into a final [`OptimizerResult`], carrying along
    /// the elite archive for a follow-up invocation (§6 archive continuity).
    pub fn finish(self) -> OptimizerResult {
        let score = self.best_score.unwrap_or(Score { total_belts: 0.0, area: 0.0, corners: 0.0, total: 0.0 });
        let elite_archive = self.cfg.incoming_elite_archive.map(crate::sa::archive::EliteArchive::from_entries);
        OptimizerResult { grid: self.grid, score, iterations: self.total_iterations, elite_archive }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Connection;
    use crate::geometry::Orientation;
    use crate::ids::ConnectionId;
    use crate::machine::MachineType;

    fn simple_problem() -> GridState {
        let mut grid = GridState::new(30, 30);
        let a = grid.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        let b = grid.place_machine(MachineType::Composer, 15, 15, Orientation::North).unwrap();
        grid.connections.insert(
            ConnectionId(0),
            Connection { id: ConnectionId(0), source_machine: a, source_port: 1, target_machine: b, target_port: 1 },
        );
        grid
    }

    fn tiny_cfg() -> OptimizerConfig {
        OptimizerConfig { time_budget_ms: 50, phase1_restarts: 1, phase2_attempts: 1, batch_size: 2, iter_per_temp: 3, seed: Some(7), ..OptimizerConfig::deep_default() }
    }

    #[test]
    fn run_chunk_honors_time_budget_roughly() {
        let grid = simple_problem();
        let mut loop_ = DeepSearchLoop::new(&grid, tiny_cfg());
        let start = Instant::now();
        loop_.run_chunk();
        assert!(start.elapsed() < std::time::Duration::from_millis(500));
    }

    #[test]
    fn request_stop_ends_the_loop_at_next_boundary() {
        let grid = simple_problem();
        let mut loop_ = DeepSearchLoop::new(&grid, tiny_cfg());
        loop_.run_chunk();
        loop_.request_stop();
        let state = loop_.run_chunk();
        assert_eq!(state, DeepSearchState::Done);
    }

    #[test]
    fn finish_preserves_machine_and_connection_counts() {
        let grid = simple_problem();
        let mut loop_ = DeepSearchLoop::new(&grid, tiny_cfg());
        loop_.run_chunk();
        let result = loop_.finish();
        assert_eq!(result.grid.machines.len(), grid.machines.len());
        assert_eq!(result.grid.connections.len(), grid.connections.len());
    }

    #[test]
    fn plateau_stop_triggers_after_repeated_stagnant_chunks() {
        let grid = simple_problem();
        let mut cfg = tiny_cfg();
        cfg.time_budget_ms = 5;
        let mut loop_ = DeepSearchLoop::new(&grid, cfg);
        loop_.plateau_chunks = 2;
        let mut final_state = DeepSearchState::BetweenChunks;
        for _ in 0..10 {
            final_state = loop_.run_chunk();
            if final_state == DeepSearchState::AutoPlateauStop {
                break;
            }
        }
        assert_eq!(final_state, DeepSearchState::AutoPlateauStop);
    }

    #[test]
    fn archive_carries_across_chunks() {
        let grid = simple_problem();
        let mut loop_ = DeepSearchLoop::new(&grid, tiny_cfg());
        loop_.run_chunk();
        assert!(loop_.cfg.incoming_elite_archive.is_some());
    }
}
