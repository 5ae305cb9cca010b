use crate::sim_params::SimulationParameters;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Preset id used by front ends for "parameters edited by hand". It is never a
/// catalog entry.
pub const CUSTOM_PRESET_ID: i32 = -1;

/// Returned when a preset id or name is not in the catalog.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown preset '{0}'")]
pub struct UnknownPreset(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetId {
    Spots,
    Maze,
    Worms,
}

impl PresetId {
    pub const ALL: [PresetId; 3] = [PresetId::Spots, PresetId::Maze, PresetId::Worms];

    pub fn id(self) -> i32 {
        match self {
            PresetId::Spots => 0,
            PresetId::Maze => 1,
            PresetId::Worms => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PresetId::Spots => "spots",
            PresetId::Maze => "maze",
            PresetId::Worms => "worms",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Result<Self, UnknownPreset> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| UnknownPreset(name.to_string()))
    }
}

impl TryFrom<i32> for PresetId {
    type Error = UnknownPreset;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == value)
            .ok_or_else(|| UnknownPreset(value.to_string()))
    }
}

/// One row of the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetEntry {
    pub id: PresetId,
    pub params: SimulationParameters,
}

/// Fixed table of named Gray-Scott regimes. Only feed and kill differ per
/// entry; diffusion rates and dt come from `SimulationParameters::default()`.
pub struct PresetCatalog;

impl PresetCatalog {
    fn feed_kill(id: PresetId) -> (f32, f32) {
        match id {
            PresetId::Spots => (0.035, 0.065),
            PresetId::Maze => (0.030, 0.055),
            PresetId::Worms => (0.022, 0.051),
        }
    }

    pub fn params_for(id: PresetId) -> SimulationParameters {
        let (feed, kill) = Self::feed_kill(id);
        SimulationParameters::with_feed_kill(feed, kill)
    }

    /// Returns the parameters for a numeric preset id, by value.
    pub fn lookup(id: i32) -> Result<SimulationParameters, UnknownPreset> {
        PresetId::try_from(id).map(Self::params_for)
    }

    pub fn lookup_name(name: &str) -> Result<SimulationParameters, UnknownPreset> {
        PresetId::from_name(name).map(Self::params_for)
    }

    pub fn entries() -> impl Iterator<Item = PresetEntry> {
        PresetId::ALL.into_iter().map(|id| PresetEntry { id, params: Self::params_for(id) })
    }
}
