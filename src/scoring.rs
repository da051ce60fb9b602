//! Objective evaluation: routed score, fast (Manhattan-proxy) score, and
//! lexicographic comparison (§4.3).

use serde::{Deserialize, Serialize};

use crate::geometry::manhattan;
use crate::grid::GridState;
use crate::machine::{machine_ports, Port};

pub const WEIGHT_BELTS: f64 = 1.0;
pub const WEIGHT_AREA: f64 = 0.5;
pub const WEIGHT_CORNERS: f64 = 0.3;
const LEX_EPSILON: f64 = 1e-6;

/// A (belts, area, corners) triple plus the weighted scalar used to drive SA
/// acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub total_belts: f64,
    pub area: f64,
    pub corners: f64,
    pub total: f64,
}

impl Score {
    fn new(total_belts: f64, area: f64, corners: f64) -> Self {
        let total = WEIGHT_BELTS * total_belts + WEIGHT_AREA * area + WEIGHT_CORNERS * corners;
        Self { total_belts, area, corners, total }
    }
}

/// Order two scores by (belts, area, corners) within an epsilon tolerance —
/// used to break SA acceptance ties and to decide priority regressions,
/// never to drive acceptance probability itself (§4.3).
pub fn lexicographic_compare(a: &Score, b: &Score) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    let cmp_dim = |x: f64, y: f64| -> Ordering {
        if (x - y).abs() < LEX_EPSILON {
            Ordering::Equal
        } else {
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    };
    cmp_dim(a.total_belts, b.total_belts)
        .then_with(|| cmp_dim(a.area, b.area))
        .then_with(|| cmp_dim(a.corners, b.corners))
}

/// The exact routed score: sum of every belt path's tile count, the
/// bounding box of all occupied cells, and the count of corner segments.
pub fn evaluate_grid(grid: &GridState) -> Score {
    let total_belts: f64 = grid.belt_paths.values().map(|p| p.len() as f64).sum();
    let corners: f64 = grid.belt_paths.values().map(|p| p.corner_count() as f64).sum();
    let area = match grid.bounding_box() {
        Some((min_x, min_y, max_x, max_y)) => ((max_x - min_x + 1) * (max_y - min_y + 1)) as f64,
        None => 0.0,
    };
    Score::new(total_belts, area, corners)
}

/// Cheap Manhattan-proxy score used by Phase 1 seed selection and as the SA
/// penalty fallback when a candidate doesn't fully route (§4.3, §4.5).
pub fn fast_score(grid: &GridState, endpoints: &[(Port, Port)]) -> Score {
    let total_belts: f64 = endpoints
        .iter()
        .map(|(src, tgt)| manhattan(src.external_tile(), tgt.external_tile()) as f64)
        .sum();
    let corners: f64 = endpoints
        .iter()
        .filter(|(src, tgt)| {
            let (sx, sy) = src.external_tile();
            let (tx, ty) = tgt.external_tile();
            (tx - sx).abs() > 0 && (ty - sy).abs() > 0
        })
        .count() as f64;

    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    let mut any = false;
    for m in grid.machines.values() {
        let r = m.rect();
        any = true;
        min_x = min_x.min(r.x);
        min_y = min_y.min(r.y);
        max_x = max_x.max(r.x + r.w - 1);
        max_y = max_y.max(r.y + r.h - 1);
    }
    for (src, tgt) in endpoints {
        for (px, py) in [src.external_tile(), tgt.external_tile()] {
            any = true;
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
    }
    let area = if any { ((max_x - min_x + 1) * (max_y - min_y + 1)) as f64 } else { 0.0 };
    Score::new(total_belts, area, corners)
}

/// Penalty added to the fast score when routing fails entirely, keeping the
/// SA search from collapsing into permanently unroutable regions (§4.5).
pub fn unroutable_penalty(edge_count: usize, machine_count: usize, k1: f64, k2: f64, base: f64) -> f64 {
    base + k1 * edge_count as f64 + k2 * machine_count as f64
}

/// Add a flat penalty to a score's scalar total, leaving the breakdown
/// dimensions untouched — used when a candidate layout doesn't fully route
/// (§4.3, §4.5).
pub fn apply_penalty(score: Score, penalty: f64) -> Score {
    Score { total: score.total + penalty, ..score }
}

/// Gather every connection's (source, target) port pair for fast scoring.
pub fn connection_endpoints(grid: &GridState) -> Vec<(Port, Port)> {
    grid.connections
        .values()
        .filter_map(|c| {
            let source_machine = grid.machine(c.source_machine)?;
            let target_machine = grid.machine(c.target_machine)?;
            let (_, outputs) = machine_ports(source_machine);
            let (inputs, _) = machine_ports(target_machine);
            let source = outputs.get(c.source_port).copied()?;
            let target = inputs.get(c.target_port).copied()?;
            Some((source, target))
        })
        .collect()
}
