use crate::sim_params::SimulationParameters;
use serde::{Deserialize, Serialize};

/// Summary statistics over one pair of U/V fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldStats {
    pub mean_u: f32,
    pub mean_v: f32,
    pub min_v: f32,
    pub max_v: f32,
}

/// A record of the run at a specific tick. Only derived metrics are kept here;
/// the grid itself is never written out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed steps since the last init/reset.
    pub tick: u64,
    /// Simulated time, the sum of `dt` over completed steps.
    pub time: f64,
    /// Parameters in effect when the snapshot was taken.
    pub params: SimulationParameters,
    pub stats: FieldStats,
}
