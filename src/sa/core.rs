//! The simulated-annealing temperature schedule: batches, reheat after
//! stagnant batches, Metropolis acceptance, and elite-archive-biased
//! restarts (§4.5). Shaped after the teacher's `GameLoop` accumulator/batch
//! loop rather than a textbook single-iteration SA.

use crate::config::OptimizerConfig;
use crate::connection::Connection;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::rng::Lcg;
use crate::scoring::{apply_penalty, evaluate_grid, fast_score, unroutable_penalty, Score};

use super::adaptive::{pick_weighted, OperatorDispatch};
use super::archive::{fingerprint, EliteArchive, EliteEntry};
use super::operators::apply_operator;

/// Base unroutable penalty and coefficients (§4.5). Large enough that any
/// unroutable candidate always scores worse than any routable one at the
/// problem sizes this optimizer targets.
const UNROUTABLE_BASE: f64 = 1000.0;
const K1: f64 = 50.0;
const K2: f64 = 20.0;

/// Number of consecutive stagnant batches that triggers a reheat (§4.5).
const REHEAT_AFTER_STAGNANT_BATCHES: u32 = 5;
const REHEAT_FACTOR: f64 = 3.0;

/// Result of one `run_phase` call.
pub struct SaOutcome {
    pub grid: GridState,
    pub score: Score,
    pub iterations: u64,
}

/// Score a candidate grid. When `routed` is true, re-route every connection
/// first and fall back to the fast score plus an unroutability penalty if
/// routing fails; when false, use the fast Manhattan-proxy score directly
/// (Phase 1 never routes — it's exploring placement topology only).
fn score_candidate(grid: &mut GridState, routed: bool) -> Score {
    if !routed {
        return fast_score(grid, &crate::scoring::connection_endpoints(grid));
    }
    let connections: Vec<Connection> = grid.connections.values().copied().collect();
    if crate::routing::reroute_all(grid, &connections) {
        evaluate_grid(grid)
    } else {
        let endpoints = crate::scoring::connection_endpoints(grid);
        let fast = fast_score(grid, &endpoints);
        let penalty = unroutable_penalty(connections.len(), grid.machines.len(), K1, K2, UNROUTABLE_BASE);
        apply_penalty(fast, penalty)
    }
}

/// Metropolis acceptance: always accept an improvement, accept a regression
/// with probability `exp(-delta / temp)` (§4.5).
fn accept(current: f64, candidate: f64, temp: f64, rng: &mut Lcg) -> bool {
    let delta = candidate - current;
    if delta <= 0.0 {
        return true;
    }
    if temp <= 0.0 {
        return false;
    }
    rng.next_f64() < (-delta / temp).exp()
}

/// Build a fresh starting point for one restart: the elite archive biased
/// toward its better entries if one is available and non-empty, otherwise
/// the caller-supplied seed grid.
fn restart_seed(seed: &GridState, archive: Option<&EliteArchive>, rng: &mut Lcg) -> GridState {
    if let Some(archive) = archive {
        if let Some(entry) = archive.sample_biased(rng.next_f64()) {
            let mut grid = GridState::new(seed.width, seed.height);
            grid.ids = seed.ids;
            for m in entry.machines.values() {
                grid.place(m.clone());
            }
            grid.connections = entry.connections.clone();
            return grid;
        }
    }
    seed.clone()
}

fn admit_to_archive(archive: &mut EliteArchive, grid: &GridState, score: Score, cfg: &OptimizerConfig) {
    let entry = EliteEntry {
        fingerprint: fingerprint(&grid.machines),
        machines: grid.machines.clone(),
        connections: grid.connections.clone(),
        score,
    };
    archive.try_admit(entry, cfg.elite_pool_size, cfg.elite_min_distance);
}

/// Run one SA phase: `restarts` independent runs from `start_grid` (each
/// subsequent restart reseeded from the elite archive when available),
/// keeping whichever final candidate scores best. `routed` selects fast
/// (Phase 1) vs. routed (Phase 2) scoring. `should_stop` is polled once per
/// batch so deep-search chunking can interrupt a run early.
#[allow(clippy::too_many_arguments)]
pub fn run_phase(
    start_grid: &GridState,
    cfg: &OptimizerConfig,
    rng: &mut Lcg,
    restarts: u32,
    routed: bool,
    archive: &mut Option<EliteArchive>,
    mut on_progress: impl FnMut(u64, f64),
    mut should_stop: impl FnMut() -> bool,
) -> SaOutcome {
    let mut best_grid = start_grid.clone();
    let mut best_score = {
        let mut probe = best_grid.clone();
        score_candidate(&mut probe, routed)
    };
    let mut total_iterations: u64 = 0;

    for restart in 0..restarts.max(1) {
        if should_stop() {
            break;
        }
        let mut sub_rng = rng.spawn_substream(restart as u64);
        let seed = if restart == 0 { start_grid.clone() } else { restart_seed(start_grid, archive.as_ref(), &mut sub_rng) };

        let outcome = run_single_chain(&seed, cfg, &mut sub_rng, routed, archive, &mut on_progress, &mut should_stop, total_iterations);
        total_iterations += outcome.iterations;

        if outcome.score.total < best_score.total {
            best_score = outcome.score;
            best_grid = outcome.grid;
        }
        if let Some(archive) = archive.as_mut() {
            admit_to_archive(archive, &outcome.grid, outcome.score, cfg);
        }
    }

    SaOutcome { grid: best_grid, score: best_score, iterations: total_iterations }
}

fn run_single_chain(
    seed: &GridState,
    cfg: &OptimizerConfig,
    rng: &mut Lcg,
    routed: bool,
    archive: &mut Option<EliteArchive>,
    on_progress: &mut impl FnMut(u64, f64),
    should_stop: &mut impl FnMut() -> bool,
    iteration_offset: u64,
) -> SaOutcome {
    let mut current = seed.clone();
    let mut current_score = score_candidate(&mut current, routed);
    let mut best = current.clone();
    let mut best_score = current_score;

    let mut dispatch = OperatorDispatch::new(cfg);
    let mut temp = cfg.initial_temp;
    let mut iterations_since_best: u64 = 0;
    let mut stagnant_batches: u32 = 0;
    let mut iteration: u64 = 0;

    while temp > cfg.min_temp {
        if should_stop() {
            break;
        }
        let mut improved_this_batch = false;

        for _ in 0..cfg.batch_size {
            for _ in 0..cfg.iter_per_temp {
                iteration += 1;
                let large_rate = dispatch.large_move_rate(temp, cfg, iterations_since_best);
                let op = if rng.next_f64() < large_rate {
                    if rng.next_f64() < cfg.critical_net_rate {
                        super::adaptive::OperatorId::CriticalNetFocus
                    } else {
                        super::adaptive::OperatorId::ClusterDestroyRepair
                    }
                } else {
                    let probs = dispatch.small_op_probabilities(iteration_offset + iteration, iterations_since_best);
                    pick_weighted(&probs, rng)
                };

                let mut candidate = current.clone();
                if !apply_operator(op, &mut candidate, rng, cfg) {
                    continue;
                }
                let candidate_score = score_candidate(&mut candidate, routed);

                if accept(current_score.total, candidate_score.total, temp, rng) {
                    let gain = current_score.total - candidate_score.total;
                    dispatch.record_gain(op, gain);
                    current = candidate;
                    current_score = candidate_score;

                    if current_score.total < best_score.total {
                        let relative_gain = (best_score.total - current_score.total) / best_score.total.max(1e-9);
                        best = current.clone();
                        best_score = current_score;
                        iterations_since_best = 0;
                        if relative_gain >= cfg.improvement_threshold_fraction {
                            improved_this_batch = true;
                            dispatch.trigger_cooldown(cfg);
                        }
                    }
                }
            }
            on_progress(iteration_offset + iteration, best_score.total);
        }

        if improved_this_batch {
            stagnant_batches = 0;
        } else {
            stagnant_batches += 1;
            iterations_since_best += (cfg.batch_size * cfg.iter_per_temp) as u64;
        }

        if stagnant_batches >= REHEAT_AFTER_STAGNANT_BATCHES {
            temp = (temp * REHEAT_FACTOR).min(cfg.initial_temp / 2.0);
            stagnant_batches = 0;
            current = best.clone();
            current_score = best_score;
            if let Some(archive) = archive.as_mut() {
                admit_to_archive(archive, &best, best_score, cfg);
            }
        } else {
            temp *= cfg.cooling_rate;
        }
    }

    SaOutcome { grid: best, score: best_score, iterations: iteration }
}

/// Every machine id present in `grid` that isn't an anchor — used by callers
/// that need to know what the SA phase is free to move.
pub fn movable_machine_ids(grid: &GridState) -> Vec<MachineId> {
    let mut ids: Vec<MachineId> = grid.machines.values().filter(|m| !m.machine_type.is_anchor()).map(|m| m.id).collect();
    ids.sort_by_key(|id| id.0);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;
    use crate::ids::ConnectionId;
    use crate::machine::MachineType;

    fn sample_grid() -> GridState {
        let mut grid = GridState::new(30, 30);
        let a = grid.place_machine(MachineType::Composer, 0, 0, Orientation::North).unwrap();
        let b = grid.place_machine(MachineType::Composer, 15, 15, Orientation::North).unwrap();
        grid.connections.insert(
            ConnectionId(0),
            Connection { id: ConnectionId(0), source_machine: a, source_port: 1, target_machine: b, target_port: 1 },
        );
        grid
    }

    #[test]
    fn run_phase_never_returns_worse_than_start() {
        let grid = sample_grid();
        let mut start = grid.clone();
        let start_score = score_candidate(&mut start, true);
        let cfg = OptimizerConfig { batch_size: 3, iter_per_temp: 5, phase2_attempts: 1, ..OptimizerConfig::default() };
        let mut rng = Lcg::new(123);
        let mut archive = Some(EliteArchive::new());
        let outcome = run_phase(&grid, &cfg, &mut rng, 1, true, &mut archive, |_, _| {}, || false);
        assert!(outcome.score.total <= start_score.total + 1e-6);
    }

    #[test]
    fn run_phase_respects_should_stop() {
        let grid = sample_grid();
        let cfg = OptimizerConfig::default();
        let mut rng = Lcg::new(7);
        let mut archive = None;
        let mut calls = 0;
        let outcome = run_phase(&grid, &cfg, &mut rng, 3, true, &mut archive, |_, _| {}, || {
            calls += 1;
            calls > 2
        });
        assert!(outcome.iterations < (cfg.batch_size * cfg.iter_per_temp * 100) as u64);
    }

    #[test]
    fn determinism_same_seed_same_outcome() {
        let grid = sample_grid();
        let cfg = OptimizerConfig { batch_size: 2, iter_per_temp: 4, ..OptimizerConfig::default() };
        let mut archive_a = Some(EliteArchive::new());
        let mut archive_b = Some(EliteArchive::new());
        let mut rng_a = Lcg::new(99);
        let mut rng_b = Lcg::new(99);
        let a = run_phase(&grid, &cfg, &mut rng_a, 2, true, &mut archive_a, |_, _| {}, || false);
        let b = run_phase(&grid, &cfg, &mut rng_b, 2, true, &mut archive_b, |_, _| {}, || false);
        assert_eq!(a.score.total, b.score.total);
    }

    #[test]
    fn movable_machine_ids_excludes_anchors() {
        let mut grid = sample_grid();
        let anchor = grid.place_machine(MachineType::Beacon, 20, 20, Orientation::North).unwrap();
        let ids = movable_machine_ids(&grid);
        assert!(!ids.contains(&anchor));
    }
}
