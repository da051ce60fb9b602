//! Elite archive: a size-capped pool of diverse high-quality layouts used to
//! seed SA restarts and to carry continuity across optimizer invocations
//! (§4.5, §6). Grounded on the teacher's `GameConfig::load`/`save` pattern
//! for the serde shape, not its content.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::ids::{ConnectionId, MachineId};
use crate::machine::Machine;
use crate::scoring::Score;

/// One archived layout: enough to rebuild a [`crate::grid::GridState`]'s
/// machines and connections, plus its score and a position fingerprint for
/// cheap diversity comparisons.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EliteEntry {
    pub machines: HashMap<MachineId, Machine>,
    pub connections: HashMap<ConnectionId, Connection>,
    pub score: Score,
    pub fingerprint: String,
}

/// Sorted `id:x,y,orientation|...` concatenation of every machine's pose —
/// a cheap stand-in for a full layout hash (§4.5).
pub fn fingerprint(machines: &HashMap<MachineId, Machine>) -> String {
    let mut parts: Vec<String> = machines
        .values()
        .map(|m| format!("{}:{},{},{:?}", m.id.0, m.x, m.y, m.orientation))
        .collect();
    parts.sort();
    parts.join("|")
}

/// Mean of (L1 position distance + 0/1 orientation mismatch) over machine
/// ids present in both layouts (§4.5).
pub fn diversity_distance(a: &HashMap<MachineId, Machine>, b: &HashMap<MachineId, Machine>) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (id, ma) in a {
        if let Some(mb) = b.get(id) {
            let pos = ((ma.x - mb.x).abs() + (ma.y - mb.y).abs()) as f64;
            let orient = if ma.orientation == mb.orientation { 0.0 } else { 1.0 };
            total += pos + orient;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EliteArchive {
    entries: Vec<EliteEntry>,
}

impl EliteArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<EliteEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[EliteEntry] {
        &self.entries
    }

    /// Admit `candidate` unless a near-duplicate (within `min_distance`)
    /// already beats it, then evict down to `capacity`, worst first.
    pub fn try_admit(&mut self, candidate: EliteEntry, capacity: usize, min_distance: f64) -> bool {
        if capacity == 0 {
            return false;
        }
        for existing in &self.entries {
            if diversity_distance(&existing.machines, &candidate.machines) < min_distance
                && existing.score.total <= candidate.score.total
            {
                return false;
            }
        }
        self.entries.retain(|e| {
            !(diversity_distance(&e.machines, &candidate.machines) < min_distance && e.score.total > candidate.score.total)
        });
        self.entries.push(candidate);
        self.entries.sort_by(|a, b| a.score.total.partial_cmp(&b.score.total).unwrap_or(std::cmp::Ordering::Equal));
        self.entries.truncate(capacity);
        true
    }

    /// Sample an entry biased toward the front of the pool (the better
    /// scores, since entries are kept sorted ascending by score):
    /// `index = floor(r^1.6 * len)` (§4.5 restart bias).
    pub fn sample_biased(&self, r: f64) -> Option<&EliteEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = (r.clamp(0.0, 1.0).powf(1.6) * self.entries.len() as f64).floor() as usize;
        self.entries.get(idx.min(self.entries.len() - 1))
    }
}
