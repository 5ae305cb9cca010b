use crate::presets::PresetCatalog;
use crate::sim_params::SimulationParameters;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Grid resolution, fixed for the lifetime of an engine instance
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    #[serde(default = "default_grid_dim")]
    pub width: usize,
    #[serde(default = "default_grid_dim")]
    pub height: usize,
}

/// Reaction parameters. A named preset supplies feed/kill; any explicit field
/// overrides the preset (or the defaults when no preset is named).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ParamsConfig {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub du: Option<f32>,
    #[serde(default)]
    pub dv: Option<f32>,
    #[serde(default)]
    pub feed: Option<f32>,
    #[serde(default)]
    pub kill: Option<f32>,
    #[serde(default)]
    pub dt: Option<f32>,
}

// Initial seed pattern written by init/reset
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SeedConfig {
    /// The seeded square has half-extent `max(1, min(w, h) / half_extent_divisor)`.
    #[serde(default = "default_half_extent_divisor")]
    pub half_extent_divisor: usize,
    /// V inside the seeded square; U there is `1 - seed_v`.
    #[serde(default = "default_seed_v")]
    pub seed_v: f32,
    /// Additional squares scattered by a seeded RNG.
    #[serde(default)]
    pub extra_spots: u32,
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct DeviceConfig {
    /// Worker threads for the compute pool (0 = one per core).
    #[serde(default)]
    pub threads: usize,
    /// Optional device memory budget in MiB.
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColorMapKind {
    Grayscale,
    TwoChannel,
    #[default]
    Spectral,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RenderConfig {
    #[serde(default)]
    pub color_map: ColorMapKind,
}

// Length of a headless run and how often to record
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    #[serde(default = "default_total_ticks")]
    pub total_ticks: u64,
    #[serde(default = "default_record_interval")]
    pub record_interval_ticks: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Bincode,
    Messagepack,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_base_filename")]
    pub base_filename: String,
    #[serde(default)]
    pub save_stats: bool,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub save_summary_csv: bool,
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub params: ParamsConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { width: default_grid_dim(), height: default_grid_dim() }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            half_extent_divisor: default_half_extent_divisor(),
            seed_v: default_seed_v(),
            extra_spots: 0,
            rng_seed: default_rng_seed(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            total_ticks: default_total_ticks(),
            record_interval_ticks: default_record_interval(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: default_base_filename(),
            save_stats: false,
            format: OutputFormat::Json,
            save_summary_csv: false,
        }
    }
}

impl EngineConfig {
    /// Loads the engine configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            anyhow::bail!("grid width and height must be greater than 0.");
        }
        if self.seed.half_extent_divisor == 0 {
            anyhow::bail!("seed.half_extent_divisor must be greater than 0.");
        }
        if !(0.0..=1.0).contains(&self.seed.seed_v) {
            anyhow::bail!("seed.seed_v must lie in [0, 1].");
        }
        if self.run.record_interval_ticks == 0 {
            anyhow::bail!("run.record_interval_ticks must be greater than 0.");
        }
        self.initial_params()?
            .check_ranges()
            .map_err(|msg| anyhow::anyhow!("params: {}", msg))?;
        Ok(())
    }

    /// Resolves the `[params]` section into the parameters an engine starts with.
    pub fn initial_params(&self) -> Result<SimulationParameters> {
        let base = match &self.params.preset {
            Some(name) => PresetCatalog::lookup_name(name)?,
            None => SimulationParameters::default(),
        };
        Ok(SimulationParameters {
            du: self.params.du.unwrap_or(base.du),
            dv: self.params.dv.unwrap_or(base.dv),
            feed: self.params.feed.unwrap_or(base.feed),
            kill: self.params.kill.unwrap_or(base.kill),
            dt: self.params.dt.unwrap_or(base.dt),
        })
    }

    pub fn memory_limit_bytes(&self) -> Option<usize> {
        self.device.memory_limit_mb.map(|mb| (mb as usize).saturating_mul(1024 * 1024))
    }
}

fn default_grid_dim() -> usize {
    1024
}

fn default_half_extent_divisor() -> usize {
    16
}

fn default_seed_v() -> f32 {
    0.25
}

fn default_rng_seed() -> u64 {
    0x5EED
}

fn default_total_ticks() -> u64 {
    2000
}

fn default_record_interval() -> u64 {
    100
}

fn default_base_filename() -> String {
    "gray_scott".to_string()
}
