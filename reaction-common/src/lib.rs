pub mod config;
pub mod presets;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{ColorMapKind, DeviceConfig, EngineConfig, GridConfig, OutputConfig, OutputFormat, ParamsConfig, RenderConfig, RunConfig, SeedConfig};
pub use presets::{PresetCatalog, PresetEntry, PresetId, UnknownPreset, CUSTOM_PRESET_ID};
pub use sim_params::SimulationParameters;
pub use snapshot::{FieldStats, Snapshot};
