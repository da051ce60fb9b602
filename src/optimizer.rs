//! Phase orchestration (§4, §4.8): seeds → fast SA → routed SA → polish,
//! with a baseline guarantee that the optimizer never hands back a layout
//! worse than what it was given. Shaped after the teacher's `GameLoop`
//! cooperative-batch structure (a progress callback instead of a render
//! frame, a `should_stop` poll instead of a window-close event).

use crate::config::OptimizerConfig;
use crate::connection::Connection;
use crate::grid::GridState;
use crate::ids::MachineId;
use crate::machine::MachineType;
use crate::polish::run_phase3_and_4;
use crate::rng::Lcg;
use crate::sa::archive::EliteArchive;
use crate::sa::core::run_phase;
use crate::scoring::{evaluate_grid, Score};
use crate::seeds::{generate_all, MachineSpec};

/// Everything the optimizer produced: the best layout found, its routed
/// score, total SA iterations spent, and (if requested) the elite archive
/// for continuity into a later invocation (§4.8, §6).
pub struct OptimizerResult {
    pub grid: GridState,
    pub score: Score,
    pub iterations: u64,
    pub elite_archive: Option<EliteArchive>,
}

/// Build the per-machine spec list `seeds::generate_all` expects, from an
/// already-placed grid: anchors keep their pose fixed, everything else is
/// free for the seed generators to place.
pub fn extract_specs(grid: &GridState) -> Vec<MachineSpec> {
    let mut ids: Vec<MachineId> = grid.machines.keys().copied().collect();
    ids.sort_by_key(|id| id.0);
    ids.into_iter()
        .map(|id| {
            let m = &grid.machines[&id];
            let fixed = if m.machine_type.is_anchor() { Some((m.x, m.y, m.orientation)) } else { None };
            MachineSpec { id, machine_type: m.machine_type, fixed }
        })
        .collect()
}

/// Re-route every connection and return the routed score, or `None` if
/// anything fails to route.
fn route_and_score(grid: &mut GridState) -> Option<Score> {
    let connections: Vec<Connection> = grid.connections.values().copied().collect();
    if crate::routing::reroute_all(grid, &connections) {
        Some(evaluate_grid(grid))
    } else {
        None
    }
}

fn rng_from_config(cfg: &OptimizerConfig) -> Lcg {
    match cfg.seed {
        Some(seed) => Lcg::new(seed),
        None => Lcg::from_system_time(),
    }
}

/// Run the full optimizer pipeline against `start`, with no external stop
/// signal (always runs to completion of its configured budgets).
pub fn run_optimizer(start: &GridState, cfg: &OptimizerConfig) -> OptimizerResult {
    run_optimizer_with_stop(start, cfg, |_, _| {}, || false)
}

/// Full pipeline with a progress callback (`iteration, best_score`) and a
/// stop predicate polled once per SA batch — the hook deep-search chunking
/// uses to interrupt between time-budget checks (§4.8).
pub fn run_optimizer_with_stop(
    start: &GridState,
    cfg: &OptimizerConfig,
    mut on_progress: impl FnMut(u64, f64),
    mut should_stop: impl FnMut() -> bool,
) -> OptimizerResult {
    let mut cfg = cfg.clone();
    cfg.validate();

    let mut rng = rng_from_config(&cfg);
    log::info!("optimizer: starting with {} machines, {} connections", start.machines.len(), start.connections.len());

    let mut archive = cfg.incoming_elite_archive.take().map(EliteArchive::from_entries).or(Some(EliteArchive::new()));

    let mut baseline = start.clone();
    let baseline_score = route_and_score(&mut baseline);

    if start.connections.is_empty() {
        log::info!("optimizer: no connections to route, returning input unchanged");
        return OptimizerResult {
            grid: start.clone(),
            score: baseline_score.unwrap_or(Score { total_belts: 0.0, area: 0.0, corners: 0.0, total: 0.0 }),
            iterations: 0,
            elite_archive: if cfg.persist_elite_archive { archive } else { None },
        };
    }

    // Phase 0: generate seed layouts, pick the best by fast score.
    let specs = extract_specs(start);
    let connections: Vec<Connection> = start.connections.values().copied().collect();
    let mut candidates = generate_all(start.width, start.height, &specs, &connections);
    if cfg.use_exploration_seeds {
        // Exploration seeds reuse the same generators from alternate RNG-perturbed
        // orderings by shuffling machine spec order before regenerating; cheap
        // diversity without a fifth generator module.
        let mut shuffled_specs = specs.clone();
        shuffle(&mut shuffled_specs, &mut rng);
        candidates.extend(generate_all(start.width, start.height, &shuffled_specs, &connections));
    }
    for c in &mut candidates {
        c.connections = start.connections.clone();
    }

    let mut best_seed = candidates.into_iter().min_by(|a, b| {
        let sa = crate::scoring::fast_score(a, &crate::scoring::connection_endpoints(a));
        let sb = crate::scoring::fast_score(b, &crate::scoring::connection_endpoints(b));
        sa.total.partial_cmp(&sb.total).unwrap_or(std::cmp::Ordering::Equal)
    });

    let Some(seed_grid) = best_seed.take() else {
        log::warn!("optimizer: no seed generator could place every machine, falling back to input layout");
        let score = baseline_score.unwrap_or_else(|| crate::scoring::fast_score(start, &crate::scoring::connection_endpoints(start)));
        return OptimizerResult { grid: baseline, score, iterations: 0, elite_archive: None };
    };

    // Phase 1: fast (unrouted) SA over placement topology.
    let phase1 = run_phase(&seed_grid, &cfg, &mut rng, cfg.phase1_restarts, false, &mut archive, &mut on_progress, &mut should_stop);
    log::info!("optimizer: phase 1 done, fast score {:.1} over {} iterations", phase1.score.total, phase1.iterations);

    // Phase 2: routed SA refinement.
    let phase2 = run_phase(&phase1.grid, &cfg, &mut rng, cfg.phase2_attempts, true, &mut archive, &mut on_progress, &mut should_stop);
    log::info!("optimizer: phase 2 done, routed score {:.1} over {} iterations", phase2.score.total, phase2.iterations);

    // Phase 3/4: deterministic polish.
    let polished = run_phase3_and_4(&phase2.grid, cfg.local_polish_passes);
    let polished_score = route_and_score(&mut polished.clone());

    let mut best_grid = phase2.grid;
    let mut best_score = phase2.score;
    if let Some(score) = polished_score {
        if score.total <= best_score.total {
            best_grid = polished;
            best_score = score;
        }
    }

    // Never regress below the input layout, if the input was itself routable.
    if let Some(baseline_score) = baseline_score {
        if baseline_score.total < best_score.total {
            log::info!("optimizer: optimized layout ({:.1}) did not beat input ({:.1}), keeping input", best_score.total, baseline_score.total);
            best_grid = baseline;
            best_score = baseline_score;
        }
    }

    let total_iterations = phase1.iterations + phase2.iterations;
    OptimizerResult {
        grid: best_grid,
        score: best_score,
        iterations: total_iterations,
        elite_archive: if cfg.persist_elite_archive { archive } else { None },
    }
}

/// Fisher-Yates shuffle using the optimizer's own LCG, so exploration-seed
/// diversity stays within the deterministic reproducibility guarantee (§5).
fn shuffle(items: &mut [MachineSpec], rng: &mut Lcg) {
    for i in (1..items.len()).rev() {
        let j = rng.next_range((i + 1) as i32) as usize;
        items.swap(i, j);
    }
}
