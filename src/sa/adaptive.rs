//! Adaptive operator-weight dispatch (§4.5): a rolling decayed-mean reward
//! per operator feeds a capped, floored probability distribution, flattened
//! back toward the base distribution under long stagnation.

use std::collections::{HashMap, VecDeque};

use crate::config::OptimizerConfig;
use crate::rng::Lcg;

/// One of the ten move operators (§4.5). The two large moves are dispatched
/// separately, gated by the temperature-scaled large-move rate rather than
/// mixed into the adaptive distribution over the other eight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperatorId {
    MoveTowardNeighbor,
    MoveToSource,
    PortFacingJump,
    TryDifferentPort,
    RandomShift,
    SwapPositions,
    RotateBest,
    JointMoveRotate,
    ClusterDestroyRepair,
    CriticalNetFocus,
}

impl OperatorId {
    pub const ALL: [OperatorId; 10] = [
        OperatorId::MoveTowardNeighbor,
        OperatorId::MoveToSource,
        OperatorId::PortFacingJump,
        OperatorId::TryDifferentPort,
        OperatorId::RandomShift,
        OperatorId::SwapPositions,
        OperatorId::RotateBest,
        OperatorId::JointMoveRotate,
        OperatorId::ClusterDestroyRepair,
        OperatorId::CriticalNetFocus,
    ];

    pub const SMALL: [OperatorId; 8] = [
        OperatorId::MoveTowardNeighbor,
        OperatorId::MoveToSource,
        OperatorId::PortFacingJump,
        OperatorId::TryDifferentPort,
        OperatorId::RandomShift,
        OperatorId::SwapPositions,
        OperatorId::RotateBest,
        OperatorId::JointMoveRotate,
    ];

    pub fn is_large_move(self) -> bool {
        matches!(self, OperatorId::ClusterDestroyRepair | OperatorId::CriticalNetFocus)
    }

    fn base_weight(self) -> f64 {
        match self {
            OperatorId::MoveTowardNeighbor => 1.4,
            OperatorId::MoveToSource => 1.2,
            OperatorId::PortFacingJump => 1.0,
            OperatorId::TryDifferentPort => 0.8,
            OperatorId::RandomShift => 1.0,
            OperatorId::SwapPositions => 0.7,
            OperatorId::RotateBest => 1.1,
            OperatorId::JointMoveRotate => 0.9,
            OperatorId::ClusterDestroyRepair | OperatorId::CriticalNetFocus => 0.0,
        }
    }
}

/// Rolling window of positive gains plus an exponentially decayed mean, per
/// operator (§4.5).
struct AdaptiveStats {
    window: VecDeque<f64>,
    window_size: usize,
    decayed_mean: f64,
}

impl AdaptiveStats {
    fn new(window_size: usize) -> Self {
        Self { window: VecDeque::new(), window_size: window_size.max(1), decayed_mean: 0.0 }
    }

    fn record_gain(&mut self, gain: f64) {
        if gain <= 0.0 {
            return;
        }
        self.window.push_back(gain);
        if self.window.len() > self.window_size {
            self.window.pop_front();
        }
        self.decayed_mean = 0.9 * self.decayed_mean + 0.1 * gain;
    }

    fn weight_multiplier(&self) -> f64 {
        1.0 + (1.0 + self.decayed_mean).ln()
    }
}

/// Distribute `remaining` proportionally to `weights` among `ops`, capping
/// each at `max_prob` above its existing floor and re-offering any capped
/// remainder to the operators still below cap.
fn distribute_with_cap(ops: &[OperatorId], weights: &HashMap<OperatorId, f64>, floor: f64, max_prob: f64) -> HashMap<OperatorId, f64> {
    let mut probs: HashMap<OperatorId, f64> = ops.iter().map(|&o| (o, floor)).collect();
    let mut remaining = (1.0 - floor * ops.len() as f64).max(0.0);
    let mut free: Vec<OperatorId> = ops.to_vec();

    while remaining > 1e-9 && !free.is_empty() {
        let weight_sum: f64 = free.iter().map(|o| weights[o]).sum();
        if weight_sum <= 0.0 {
            let share = remaining / free.len() as f64;
            for &o in &free {
                *probs.get_mut(&o).unwrap() += share;
            }
            break;
        }
        let mut next_free = Vec::new();
        let mut distributed = 0.0;
        for &o in &free {
            let share = remaining * weights[&o] / weight_sum;
            let room = (max_prob - probs[&o]).max(0.0);
            if share >= room {
                *probs.get_mut(&o).unwrap() += room;
                distributed += room;
            } else {
                next_free.push(o);
            }
        }
        if next_free.len() == free.len() {
            for &o in &free {
                let share = remaining * weights[&o] / weight_sum;
                *probs.get_mut(&o).unwrap() += share;
            }
            break;
        }
        remaining -= distributed;
        free = next_free;
    }
    probs
}

/// Holds per-operator reward statistics across one SA phase run.
pub struct OperatorDispatch {
    stats: HashMap<OperatorId, AdaptiveStats>,
    adaptive_enabled: bool,
    max_prob: f64,
    stagnation_reset_window: u64,
    flatten_factor: f64,
    warmup_iterations: u64,
    /// Iterations remaining with the large-move budget forced to zero,
    /// counting down from `cfg.large_move_cooldown_after_improve` each time
    /// a major improvement triggers it (§4.5).
    cooldown_remaining: u32,
}

impl OperatorDispatch {
    pub fn new(cfg: &OptimizerConfig) -> Self {
        let stats = OperatorId::SMALL.into_iter().map(|o| (o, AdaptiveStats::new(cfg.adaptive_window))).collect();
        Self {
            stats,
            adaptive_enabled: cfg.adaptive_ops,
            max_prob: cfg.adaptive_max_operator_prob,
            stagnation_reset_window: cfg.adaptive_stagnation_reset_window,
            flatten_factor: cfg.adaptive_flatten_factor,
            warmup_iterations: cfg.adaptive_warmup_iterations,
            cooldown_remaining: 0,
        }
    }

    /// Install the large-move cooldown window after a major improvement
    /// (§4.5, spec.md:108/123).
    pub fn trigger_cooldown(&mut self, cfg: &OptimizerConfig) {
        self.cooldown_remaining = cfg.large_move_cooldown_after_improve;
    }

    pub fn record_gain(&mut self, op: OperatorId, gain: f64) {
        if let Some(stats) = self.stats.get_mut(&op) {
            stats.record_gain(gain);
        }
    }

    /// Probability distribution over the eight small operators. Does not
    /// account for the large-move budget — callers reserve that mass
    /// separately before sampling from this distribution.
    pub fn small_op_probabilities(&self, iteration: u64, iterations_since_best: u64) -> HashMap<OperatorId, f64> {
        let ops = OperatorId::SMALL;
        let mut weights: HashMap<OperatorId, f64> = ops.iter().map(|&o| (o, o.base_weight())).collect();
        let use_adaptive = self.adaptive_enabled && iteration >= self.warmup_iterations;
        if use_adaptive {
            for &o in &ops {
                let mult = self.stats.get(&o).map(|s| s.weight_multiplier()).unwrap_or(1.0);
                *weights.get_mut(&o).unwrap() *= mult;
            }
        }

        let floor = 1.0 / (ops.len() as f64 * 4.0);
        let mut probs = distribute_with_cap(&ops, &weights, floor, self.max_prob);

        if iterations_since_best >= self.stagnation_reset_window {
            let base_total: f64 = ops.iter().map(|o| o.base_weight()).sum();
            for &o in &ops {
                let base = floor + (1.0 - floor * ops.len() as f64) * (o.base_weight() / base_total);
                let current = probs[&o];
                probs.insert(o, current * (1.0 - self.flatten_factor) + base * self.flatten_factor);
            }
        }
        probs
    }

    /// Large-move share of the operator budget at the current temperature
    /// (§4.5): high while hot (favor `large_move_rate_early`), lower once
    /// cool, escalated back up under long stagnation. Forced to zero while
    /// a post-improvement cooldown is active.
    pub fn large_move_rate(&mut self, temp: f64, cfg: &OptimizerConfig, iterations_since_best: u64) -> f64 {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return 0.0;
        }
        let denom = (cfg.initial_temp - cfg.min_temp).max(1e-9);
        let hot_fraction = ((temp - cfg.min_temp) / denom).clamp(0.0, 1.0);
        let mut rate = if hot_fraction >= 0.45 { cfg.large_move_rate_early } else { cfg.large_move_rate_late };
        if iterations_since_best as f64 > 0.6 * cfg.adaptive_stagnation_reset_window as f64 {
            rate = rate.max(cfg.large_move_rate_early);
        }
        rate.clamp(0.0, 1.0)
    }
}

/// Sample one operator from a probability map via cumulative weight.
pub fn pick_weighted(probs: &HashMap<OperatorId, f64>, rng: &mut Lcg) -> OperatorId {
    let total: f64 = probs.values().sum();
    let mut ops: Vec<OperatorId> = probs.keys().copied().collect();
    ops.sort_by_key(|o| OperatorId::ALL.iter().position(|x| x == o).unwrap_or(usize::MAX));
    let r = rng.next_f64() * total.max(1e-9);
    let mut acc = 0.0;
    for op in &ops {
        acc += probs[op];
        if r <= acc {
            return *op;
        }
    }
    *ops.last().expect("non-empty probability map")
}
