use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use reaction_common::{EngineConfig, OutputFormat, Snapshot};
use reaction_engine::{ComputeDevice, DeviceOptions, EngineOptions, PixelBuffer, SimulationEngine};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

// Consecutive interop failures tolerated before giving up on the run.
const MAX_CONSECUTIVE_MAP_FAILURES: u32 = 3;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Gray-Scott Engine (headless)...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        EngineConfig::load(&config_path)?
    } else {
        warn!("Config file '{}' not found, using built-in defaults.", config_path);
        EngineConfig::default()
    };
    let params = config.initial_params()?;
    debug!("Configuration: {:#?}", config);

    // --- Initialize Device and Engine ---
    let device = ComputeDevice::new(DeviceOptions {
        threads: config.device.threads,
        memory_limit_bytes: config.memory_limit_bytes(),
    })?;
    info!("Using {} compute threads.", device.threads());

    let mut engine = SimulationEngine::new(
        device,
        EngineOptions { seed: config.seed.clone(), color_map: config.render.color_map },
    );
    let (width, height) = (config.grid.width, config.grid.height);
    engine
        .init(width, height, params)
        .with_context(|| format!("Failed to initialize a {}x{} grid", width, height))?;

    // Headless runs own the transfer buffer themselves, in place of a renderer.
    let frame_buffer = PixelBuffer::for_image(1, width, height);
    engine.register_interop_target(Arc::clone(&frame_buffer))?;

    // --- Simulation Loop ---
    let total_ticks = config.run.total_ticks;
    let record_interval = config.run.record_interval_ticks;
    info!("Running {} ticks, recording every {} ticks.", total_ticks, record_interval);

    let mut snapshots: Vec<Snapshot> = vec![engine.snapshot()?];
    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let mut ticks_since_print = 0u64;
    let mut map_failures = 0u32;

    while engine.tick() < total_ticks {
        let step_start_time = Instant::now();
        match engine.step_and_render_to_surface() {
            Ok(()) => map_failures = 0,
            Err(e) if e.is_interop() && map_failures < MAX_CONSECUTIVE_MAP_FAILURES => {
                map_failures += 1;
                warn!("Tick {} skipped: {}", engine.tick() + 1, e);
                continue;
            }
            Err(e) => {
                error!("Error during tick {}: {}", engine.tick() + 1, e);
                anyhow::bail!("Simulation step failed.");
            }
        }
        ticks_since_print += 1;
        let tick = engine.tick();
        let step_duration = step_start_time.elapsed();

        let now = Instant::now();
        let since_print = now.duration_since(previous_print_time).as_secs_f64();
        let is_record_tick = tick % record_interval == 0;
        let is_last_tick = tick == total_ticks;

        if since_print >= 5.0 || is_last_tick {
            info!(
                "Tick [{}/{}] (t = {:.1}) | {:.1} ticks/s | Step Time: {:6.2} ms | Frame #{}",
                tick,
                total_ticks,
                engine.time(),
                ticks_since_print as f64 / since_print.max(1e-9),
                step_duration.as_secs_f64() * 1000.0,
                frame_buffer.generation()
            );
            previous_print_time = now;
            ticks_since_print = 0;
        } else {
            trace!("Tick [{}/{}] completed in {:.2} ms", tick, total_ticks, step_duration.as_secs_f64() * 1000.0);
        }

        if is_record_tick || is_last_tick {
            let snapshot = engine.snapshot()?;
            debug!("Recorded snapshot at tick {}: {:?}", tick, snapshot.stats);
            snapshots.push(snapshot);
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({:.1} ticks/s).",
        total_duration.as_secs_f64(),
        engine.tick() as f64 / total_duration.as_secs_f64().max(1e-9)
    );

    // Unregister before the buffer goes away.
    engine.shutdown();
    frame_buffer.destroy();

    // --- Save Recorded Data ---
    if config.output.save_stats {
        save_snapshots(&config, &snapshots)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }
    if config.output.save_summary_csv {
        save_summary_csv(&config, &snapshots)?;
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(config: &EngineConfig, snapshots: &[Snapshot]) -> Result<()> {
    let base = &config.output.base_filename;
    let filename = match config.output.format {
        OutputFormat::Json => format!("{}_snapshots.json", base),
        OutputFormat::Bincode => format!("{}_snapshots.bin", base),
        OutputFormat::Messagepack => format!("{}_snapshots.msgpack", base),
    };
    let file = File::create(&filename).with_context(|| format!("Error creating snapshot file '{}'", filename))?;
    let mut writer = BufWriter::new(file);

    match config.output.format {
        OutputFormat::Json => serde_json::to_writer(&mut writer, snapshots)
            .context("Error serializing snapshots to JSON")?,
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, snapshots)
            .context("Error serializing snapshots to bincode")?,
        OutputFormat::Messagepack => rmp_serde::encode::write(&mut writer, snapshots)
            .context("Error serializing snapshots to MessagePack")?,
    }
    writer.flush()?;
    info!("{} snapshots saved to {} ({:?} format)", snapshots.len(), filename, config.output.format);
    Ok(())
}

fn save_summary_csv(config: &EngineConfig, snapshots: &[Snapshot]) -> Result<()> {
    let filename = format!("{}_summary.csv", config.output.base_filename);
    let mut writer = csv::Writer::from_path(&filename)
        .with_context(|| format!("Error creating CSV file '{}'", filename))?;
    writer.write_record(["tick", "time", "feed", "kill", "mean_u", "mean_v", "min_v", "max_v"])?;
    for s in snapshots {
        writer.write_record(&[
            s.tick.to_string(),
            format!("{:.3}", s.time),
            format!("{:.4}", s.params.feed),
            format!("{:.4}", s.params.kill),
            format!("{:.6}", s.stats.mean_u),
            format!("{:.6}", s.stats.mean_v),
            format!("{:.6}", s.stats.min_v),
            format!("{:.6}", s.stats.max_v),
        ])?;
    }
    writer.flush()?;
    info!("Summary saved to {}", filename);
    Ok(())
}
