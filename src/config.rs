//! Optimizer configuration: per-mode defaults and field-level coercion
//! (§4.11, §6, §7). Mirrors the teacher's `GameConfig` (`serde` + per-field
//! defaults + a `validate` coercion pass that logs what it fixed) rather
//! than panicking on an out-of-range knob.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sa::archive::EliteEntry;

/// Which preset of defaults and stopping behavior the optimizer runs under
/// (§4.8, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerMode {
    Normal,
    Deep,
}

impl Default for OptimizerMode {
    fn default() -> Self {
        OptimizerMode::Normal
    }
}

/// Every tunable the optimizer reads (§6). `#[serde(default)]` means a
/// partially-specified document (e.g. a hand-edited TOML override) still
/// deserializes, filling in the rest from [`OptimizerConfig::default`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub mode: OptimizerMode,
    /// Deep mode only: wall-clock budget per chunk (§4.8).
    pub time_budget_ms: u64,

    pub phase1_restarts: u32,
    pub phase2_attempts: u32,
    pub local_polish_passes: u32,
    pub use_exploration_seeds: bool,

    pub elite_pool_size: usize,
    pub elite_diversity_hash: bool,
    pub elite_min_distance: f64,

    pub large_move_rate_early: f64,
    pub large_move_rate_late: f64,
    pub large_move_cooldown_after_improve: u32,
    /// Share of the large-move budget spent on critical-net-focus vs.
    /// cluster-destroy-repair.
    pub critical_net_rate: f64,

    pub cluster_move_min_size: usize,
    pub cluster_move_max_size: usize,

    pub adaptive_ops: bool,
    pub adaptive_window: usize,
    pub adaptive_warmup_iterations: u64,
    pub adaptive_max_operator_prob: f64,
    pub adaptive_stagnation_reset_window: u64,
    pub adaptive_flatten_factor: f64,

    pub repair_beam_width: usize,

    pub persist_elite_archive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incoming_elite_archive: Option<Vec<EliteEntry>>,

    pub seed: Option<u32>,

    pub initial_temp: f64,
    pub min_temp: f64,
    pub cooling_rate: f64,
    pub batch_size: u32,
    pub iter_per_temp: u32,

    /// Fraction of the current best score an improvement must clear before
    /// it triggers the large-move cooldown (§4.5).
    pub improvement_threshold_fraction: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            mode: OptimizerMode::Normal,
            time_budget_ms: 5_000,

            phase1_restarts: 2,
            phase2_attempts: 2,
            local_polish_passes: 2,
            use_exploration_seeds: true,

            elite_pool_size: 12,
            elite_diversity_hash: true,
            elite_min_distance: 3.0,

            large_move_rate_early: 0.3,
            large_move_rate_late: 0.1,
            large_move_cooldown_after_improve: 3,
            critical_net_rate: 0.4,

            cluster_move_min_size: 2,
            cluster_move_max_size: 6,

            adaptive_ops: true,
            adaptive_window: 20,
            adaptive_warmup_iterations: 50,
            adaptive_max_operator_prob: 0.35,
            adaptive_stagnation_reset_window: 200,
            adaptive_flatten_factor: 0.5,

            repair_beam_width: 3,

            persist_elite_archive: false,
            incoming_elite_archive: None,

            seed: None,

            initial_temp: 100.0,
            min_temp: 0.5,
            cooling_rate: 0.9,
            batch_size: 10,
            iter_per_temp: 20,

            improvement_threshold_fraction: 0.02,
        }
    }
}

impl OptimizerConfig {
    /// Defaults for deep mode (§4.8): larger restart/attempt counts, a wider
    /// repair beam, and an actual time budget.
    pub fn deep_default() -> Self {
        Self {
            mode: OptimizerMode::Deep,
            time_budget_ms: 30_000,
            phase1_restarts: 5,
            phase2_attempts: 5,
            local_polish_passes: 4,
            elite_pool_size: 24,
            repair_beam_width: 5,
            initial_temp: 150.0,
            batch_size: 20,
            iter_per_temp: 30,
            ..Self::default()
        }
    }

    /// Coerce out-of-range knobs into a usable shape, logging each fix.
    /// Never panics — a malformed config degrades to something runnable
    /// rather than aborting the optimizer (§4.11).
    pub fn validate(&mut self) {
        let clamp01 = |label: &str, v: &mut f64| {
            let clamped = v.clamp(0.0, 1.0);
            if (clamped - *v).abs() > f64::EPSILON {
                log::warn!("config: {label}={v} out of [0,1], clamped to {clamped}");
                *v = clamped;
            }
        };
        clamp01("large_move_rate_early", &mut self.large_move_rate_early);
        clamp01("large_move_rate_late", &mut self.large_move_rate_late);
        clamp01("critical_net_rate", &mut self.critical_net_rate);
        clamp01("adaptive_max_operator_prob", &mut self.adaptive_max_operator_prob);
        clamp01("adaptive_flatten_factor", &mut self.adaptive_flatten_factor);
        clamp01("improvement_threshold_fraction", &mut self.improvement_threshold_fraction);

        if self.elite_pool_size == 0 {
            log::warn!("config: elite_pool_size=0, coerced to 1");
            self.elite_pool_size = 1;
        }
        if self.cluster_move_max_size < self.cluster_move_min_size {
            log::warn!(
                "config: cluster_move_max_size ({}) < cluster_move_min_size ({}), coerced equal",
                self.cluster_move_max_size,
                self.cluster_move_min_size
            );
            self.cluster_move_max_size = self.cluster_move_min_size;
        }
        if self.cluster_move_min_size == 0 {
            log::warn!("config: cluster_move_min_size=0, coerced to 1");
            self.cluster_move_min_size = 1;
            self.cluster_move_max_size = self.cluster_move_max_size.max(1);
        }
        if self.batch_size == 0 {
            log::warn!("config: batch_size=0, coerced to 1");
            self.batch_size = 1;
        }
        if self.iter_per_temp == 0 {
            log::warn!("config: iter_per_temp=0, coerced to 1");
            self.iter_per_temp = 1;
        }
        if !(0.0..1.0).contains(&self.cooling_rate) {
            log::warn!("config: cooling_rate={} out of (0,1), coerced to 0.9", self.cooling_rate);
            self.cooling_rate = 0.9;
        }
        if self.min_temp <= 0.0 {
            log::warn!("config: min_temp={} <= 0, coerced to 0.01", self.min_temp);
            self.min_temp = 0.01;
        }
        if self.initial_temp <= self.min_temp {
            log::warn!(
                "config: initial_temp ({}) <= min_temp ({}), coerced to min_temp * 10",
                self.initial_temp,
                self.min_temp
            );
            self.initial_temp = self.min_temp * 10.0;
        }
        if self.repair_beam_width == 0 {
            log::warn!("config: repair_beam_width=0, coerced to 1");
            self.repair_beam_width = 1;
        }
    }

    /// Load a host application's saved preset, falling back to
    /// [`OptimizerConfig::default`] when none exists or it fails to parse
    /// (§4.11 — a malformed preset degrades rather than aborting startup).
    pub fn load_preset() -> Self {
        let Some(path) = preset_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("config: failed to parse preset at {path:?}: {e}, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Persist this config as the host application's preset (§4.11).
    pub fn save_preset(&self) {
        let Some(path) = preset_path() else {
            log::warn!("config: could not determine a preset directory");
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("config: failed to create preset directory: {e}");
                return;
            }
        }
        match toml::to_string_pretty(self) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(&path, contents) {
                    log::warn!("config: failed to write preset at {path:?}: {e}");
                }
            }
            Err(e) => log::warn!("config: failed to serialize preset: {e}"),
        }
    }
}

fn preset_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "portweave").map(|dirs| dirs.config_dir().join("optimizer.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_default_is_well_formed() {
        let mut cfg = OptimizerConfig::default();
        let before = cfg.clone();
        cfg.validate();
        assert_eq!(cfg.large_move_rate_early, before.large_move_rate_early);
        assert_eq!(cfg.mode, OptimizerMode::Normal);
    }

    #[test]
    fn deep_default_has_larger_budgets() {
        let deep = OptimizerConfig::deep_default();
        let normal = OptimizerConfig::default();
        assert!(deep.time_budget_ms > normal.time_budget_ms);
        assert!(deep.phase1_restarts > normal.phase1_restarts);
        assert_eq!(deep.mode, OptimizerMode::Deep);
    }

    #[test]
    fn validate_clamps_out_of_range_rate() {
        let mut cfg = OptimizerConfig { large_move_rate_early: 5.0, ..OptimizerConfig::default() };
        cfg.validate();
        assert_eq!(cfg.large_move_rate_early, 1.0);
    }

    #[test]
    fn validate_fixes_inverted_cluster_bounds() {
        let mut cfg = OptimizerConfig { cluster_move_min_size: 8, cluster_move_max_size: 3, ..OptimizerConfig::default() };
        cfg.validate();
        assert_eq!(cfg.cluster_move_max_size, cfg.cluster_move_min_size);
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut cfg = OptimizerConfig { batch_size: 0, ..OptimizerConfig::default() };
        cfg.validate();
        assert_eq!(cfg.batch_size, 1);
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = OptimizerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: OptimizerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.elite_pool_size, cfg.elite_pool_size);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let cfg = OptimizerConfig::default();
        let serialized = toml::to_string_pretty(&cfg).expect("serialize");
        let back: OptimizerConfig = toml::from_str(&serialized).expect("deserialize");
        assert_eq!(back.elite_pool_size, cfg.elite_pool_size);
        assert_eq!(back.initial_temp, cfg.initial_temp);
        assert_eq!(back.mode, cfg.mode);
    }

    #[test]
    fn save_preset_then_read_back_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimizer.toml");
        let cfg = OptimizerConfig { elite_pool_size: 7, ..OptimizerConfig::default() };
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let back: OptimizerConfig = toml::from_str(&contents).unwrap();
        assert_eq!(back.elite_pool_size, 7);
    }
}
