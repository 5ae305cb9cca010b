use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use image::RgbaImage;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn, LevelFilter};
use rayon::prelude::*;
use reaction_common::{ColorMapKind, EngineConfig, PresetId};
use reaction_engine::{
    ComputeDevice, DeviceOptions, EngineOptions, PixelBuffer, PixelBufferHandle, SimulationEngine,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Command-line arguments for the visualizer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional path to a config.toml (grid size, parameters, seed, device)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Grid width in cells (overrides the config)
    #[arg(long)]
    width: Option<usize>,

    /// Grid height in cells (defaults to the width when a width is given)
    #[arg(long)]
    height: Option<usize>,

    /// Preset name: spots, maze or worms
    #[arg(short, long)]
    preset: Option<String>,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 2000)]
    ticks: u64,

    /// Save a frame every N ticks
    #[arg(long, default_value_t = 50)]
    frame_every: u64,

    /// Switch to the next preset every N ticks (0 = never)
    #[arg(long, default_value_t = 0)]
    cycle_presets_every: u64,

    /// Color map: grayscale, two_channel or spectral
    #[arg(long)]
    color_map: Option<String>,

    /// Output directory for PNG frames
    #[arg(short, long, default_value = "frames")]
    output_dir: PathBuf,

    /// Frames buffered before they are encoded in parallel
    #[arg(long, default_value_t = 10)]
    chunk_size: usize,

    /// Compute threads (0 = one per core)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

// Consecutive interop failures tolerated before giving up on the run.
const MAX_CONSECUTIVE_MAP_FAILURES: u32 = 3;

// A copied frame waiting to be encoded
struct Frame {
    index: u64,
    image: RgbaImage,
}

/// Per-tick driver: steps the engine, cycles presets and captures frames,
/// all keyed on the engine's own tick counter.
struct TickDriver {
    frame_every: u64,
    cycle_presets_every: u64,
    preset_index: usize,
    map_failures: u32,
}

impl TickDriver {
    /// Attempts one tick. Returns the captured frame when the completed tick
    /// is a capture tick. A tick the renderer blocked is skipped (the engine
    /// does not advance) until the failure limit is hit.
    fn advance(&mut self, engine: &mut SimulationEngine, buffer: &PixelBufferHandle) -> Result<Option<Frame>> {
        match engine.step_and_render_to_surface() {
            Ok(()) => self.map_failures = 0,
            Err(e) if e.is_interop() && self.map_failures < MAX_CONSECUTIVE_MAP_FAILURES => {
                self.map_failures += 1;
                warn!("Tick {} not rendered: {}", engine.tick() + 1, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        let tick = engine.tick();

        if self.cycle_presets_every > 0 && tick % self.cycle_presets_every == 0 {
            self.preset_index = (self.preset_index + 1) % PresetId::ALL.len();
            let next = PresetId::ALL[self.preset_index];
            engine.set_preset(next.id())?;
            debug!("Switched to preset '{}' at tick {}", next.name(), tick);
        }

        if tick % self.frame_every != 0 {
            return Ok(None);
        }
        let (width, height) = engine.dimensions();
        let pixels = buffer.read()?.to_vec();
        let image = RgbaImage::from_raw(width as u32, height as u32, pixels)
            .context("Transfer buffer does not match the grid size")?;
        Ok(Some(Frame { index: tick, image }))
    }
}

/// Parse a color map name
fn parse_color_map(name: &str) -> Result<ColorMapKind> {
    match name.to_ascii_lowercase().as_str() {
        "grayscale" | "gray" => Ok(ColorMapKind::Grayscale),
        "two_channel" | "two-channel" => Ok(ColorMapKind::TwoChannel),
        "spectral" => Ok(ColorMapKind::Spectral),
        other => anyhow::bail!("Unknown color map '{}'", other),
    }
}

/// Encode a chunk of frames to PNG in parallel
fn write_frames(frames: &mut Vec<Frame>, output_dir: &std::path::Path) -> Result<usize> {
    let written = frames
        .par_iter()
        .map(|frame| {
            let path = output_dir.join(format!("frame_{:06}.png", frame.index));
            frame
                .image
                .save(&path)
                .with_context(|| format!("Failed to write frame {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?
        .len();
    frames.clear();
    Ok(written)
}

fn main() -> Result<()> {
    // Initialize logger
    Builder::from_default_env().filter(None, LevelFilter::Info).init();

    // Parse command line arguments
    let args = Args::parse();

    run_with_args(args).map(|_| ())
}

/// Runs the simulation and returns the number of frames written.
fn run_with_args(args: Args) -> Result<usize> {
    info!("Starting Reaction-Diffusion Visualizer...");

    // --- Resolve Configuration ---
    let config = match &args.config {
        Some(path) => {
            let config = EngineConfig::load(path)?;
            info!("Loaded configuration from {}", path.display());
            config
        }
        None => EngineConfig::default(),
    };
    let width = args.width.unwrap_or(config.grid.width);
    let height = args.height.or(args.width).unwrap_or(config.grid.height);
    let color_map = match &args.color_map {
        Some(name) => parse_color_map(name)?,
        None => config.render.color_map,
    };
    if args.frame_every == 0 {
        anyhow::bail!("--frame-every must be greater than 0");
    }

    info!("Grid: {}x{} | Ticks: {} | Frame every {} ticks", width, height, args.ticks, args.frame_every);
    info!("Color map: {:?}", color_map);

    // --- Set up Engine ---
    let device = ComputeDevice::new(DeviceOptions {
        threads: if args.threads > 0 { args.threads } else { config.device.threads },
        memory_limit_bytes: config.memory_limit_bytes(),
    })?;
    let mut engine = SimulationEngine::new(device, EngineOptions { seed: config.seed.clone(), color_map });
    engine.init(width, height, config.initial_params()?)?;

    let mut preset_index = PresetId::ALL.len() - 1;
    if let Some(name) = &args.preset {
        let preset = PresetId::from_name(name)?;
        preset_index = PresetId::ALL.iter().position(|p| *p == preset).unwrap_or(0);
        engine.set_preset(preset.id())?;
        info!("Using preset '{}': {:?}", preset.name(), engine.params());
    }

    // The visualizer owns the transfer buffer, as a renderer would.
    let frame_buffer = PixelBuffer::for_image(1, width, height);
    engine.register_interop_target(Arc::clone(&frame_buffer))?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory {}", args.output_dir.display()))?;

    // --- Run ---
    let progress_bar = ProgressBar::new(args.ticks);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ticks ({percent}%) [{eta}]")?
            .progress_chars("#>-"),
    );

    let chunk_size = args.chunk_size.max(1);
    let mut pending: Vec<Frame> = Vec::with_capacity(chunk_size);
    let mut frames_written = 0usize;
    let mut driver = TickDriver {
        frame_every: args.frame_every,
        cycle_presets_every: args.cycle_presets_every,
        preset_index,
        map_failures: 0,
    };
    let start_time = Instant::now();

    while engine.tick() < args.ticks {
        let before = engine.tick();
        let frame = driver.advance(&mut engine, &frame_buffer)?;
        progress_bar.inc(engine.tick() - before);

        if let Some(frame) = frame {
            pending.push(frame);
            if pending.len() >= chunk_size {
                frames_written += write_frames(&mut pending, &args.output_dir)?;
            }
        }
    }
    frames_written += write_frames(&mut pending, &args.output_dir)?;
    progress_bar.finish_with_message("Done");

    // Unregister before the renderer releases its buffer.
    engine.shutdown();
    frame_buffer.destroy();

    let elapsed = start_time.elapsed().as_secs_f64();
    info!(
        "Rendered {} ticks in {:.2} s ({:.1} ticks/s), {} frames written to {}",
        args.ticks,
        elapsed,
        args.ticks as f64 / elapsed.max(1e-9),
        frames_written,
        args.output_dir.display()
    );

    Ok(frames_written)
}
