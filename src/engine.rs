//! The simulation engine: lifecycle, stepping and the per-tick frame handoff.

use crate::colormap::{ColorMap, Rgba8};
use crate::device::ComputeDevice;
use crate::error::{EngineError, Result};
use crate::grid::{FieldPair, GridBuffers};
use crate::interop::{InteropSurface, PixelBufferHandle, SurfaceStatus};
use crate::kernel::ReactionDiffusionStep;
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use reaction_common::{ColorMapKind, FieldStats, PresetCatalog, SeedConfig, SimulationParameters, Snapshot};

/// Construction-time options that stay fixed across init/reset/resize.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub seed: SeedConfig,
    pub color_map: ColorMapKind,
}

/// Owns the device fields and drives the Gray-Scott step and its handoff to the renderer.
pub struct SimulationEngine {
    device: ComputeDevice,
    seed: SeedConfig,
    color_map: ColorMap,
    params: SimulationParameters,
    grid: GridBuffers,
    surface: InteropSurface,
    /// Completed steps since the last init/reset.
    tick: u64,
    /// Sum of `dt` over completed steps.
    time: f64,
}

impl SimulationEngine {
    /// Creates an engine with no grid allocated. Call `init` before stepping.
    pub fn new(device: ComputeDevice, options: EngineOptions) -> Self {
        Self {
            device,
            seed: options.seed,
            color_map: ColorMap::new(options.color_map),
            params: SimulationParameters::default(),
            grid: GridBuffers::new(),
            surface: InteropSurface::new(),
            tick: 0,
            time: 0.0,
        }
    }

    /// Allocates a `width` x `height` grid, stores `params` and seeds the grid.
    ///
    /// On an initialized engine this reallocates: the bound buffer (sized for
    /// the old grid) is unregistered. If the new grid cannot be allocated the
    /// old size is restored and the old buffer bound again.
    pub fn init(&mut self, width: usize, height: usize, params: SimulationParameters) -> Result<()> {
        if self.grid.is_allocated() {
            self.reallocate(width, height)?;
        } else {
            self.grid.allocate(&self.device, width, height)?;
        }
        self.params = params;
        self.reseed();
        info!(
            "Initialized {}x{} grid ({} bytes on device). Params: {:?}",
            width,
            height,
            self.device.allocated_bytes(),
            params
        );
        Ok(())
    }

    /// Unregisters any pixel buffer and frees the grid. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if !self.grid.is_allocated() && self.surface.status() == SurfaceStatus::Unregistered {
            return;
        }
        self.surface.unregister();
        self.grid.release();
        self.tick = 0;
        self.time = 0.0;
        info!("Simulation engine shut down.");
    }

    /// Replaces the parameters; the next step uses them. Grid content is untouched.
    pub fn set_params(&mut self, params: SimulationParameters) {
        debug!("Parameters set to {:?}", params);
        self.params = params;
    }

    pub fn params(&self) -> SimulationParameters {
        self.params
    }

    /// Applies a catalog preset. Unknown ids leave the parameters unchanged.
    pub fn set_preset(&mut self, id: i32) -> Result<()> {
        let params = PresetCatalog::lookup(id).map_err(|_| EngineError::UnknownPreset(id))?;
        debug!("Applying preset {}.", id);
        self.set_params(params);
        Ok(())
    }

    /// Writes the initial pattern again without reallocating or touching parameters.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.reseed();
        debug!("Grid reseeded.");
        Ok(())
    }

    /// Binds a renderer-owned buffer of `width * height * 4` bytes.
    pub fn register_interop_target(&mut self, buffer: PixelBufferHandle) -> Result<()> {
        if !self.grid.is_allocated() {
            return Err(EngineError::registration("engine is not initialized"));
        }
        let expected = self.grid.len() * Rgba8::BYTES;
        if buffer.size_bytes() != expected {
            return Err(EngineError::registration(format!(
                "pixel buffer {} holds {} bytes, grid {}x{} needs {}",
                buffer.id(),
                buffer.size_bytes(),
                self.grid.width(),
                self.grid.height(),
                expected
            )));
        }
        self.surface.register(buffer)
    }

    pub fn unregister_interop_target(&mut self) {
        self.surface.unregister();
    }

    pub fn surface_status(&self) -> SurfaceStatus {
        self.surface.status()
    }

    /// Advances one step and publishes the new state into the registered buffer.
    ///
    /// Order: kernel into scratch, map, shade scratch, unmap, swap. Any failure
    /// returns before the swap, so the active fields still hold the previous
    /// state and the call can simply be retried on the next tick.
    pub fn step_and_render_to_surface(&mut self) -> Result<()> {
        self.run_kernel()?;

        if let Err(e) = self.surface.map_for_write() {
            warn!("Step {} not published: {}", self.tick + 1, e);
            return Err(e);
        }
        let rendered = {
            let scratch = self.grid.scratch_pair();
            match self.surface.mapped_pixels() {
                Ok(pixels) => self.color_map.render(&self.device, &scratch.u, &scratch.v, pixels),
                Err(e) => Err(e),
            }
        };
        // Never leave the buffer mapped, even if shading failed.
        let unmapped = self.surface.unmap();
        rendered?;
        unmapped?;

        self.commit_step();
        Ok(())
    }

    /// Advances one step without rendering.
    pub fn step(&mut self) -> Result<()> {
        self.run_kernel()?;
        self.commit_step();
        Ok(())
    }

    /// Reallocates the grid at a new size: unregister, release, allocate, reseed.
    /// The caller registers a buffer of the new size afterwards. Invalid sizes
    /// are rejected without touching the grid. If the new size cannot be
    /// allocated the previous size is restored (reseeded) and its buffer bound again.
    pub fn resize(&mut self, width: usize, height: usize) -> Result<()> {
        self.ensure_initialized()?;
        let (old_width, old_height) = (self.grid.width(), self.grid.height());
        self.reallocate(width, height)?;
        self.reseed();
        info!("Resized grid from {}x{} to {}x{}.", old_width, old_height, width, height);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.grid.is_allocated()
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.grid.width(), self.grid.height())
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn device(&self) -> &ComputeDevice {
        &self.device
    }

    /// Read-only view of the active U and V fields.
    pub fn fields(&self) -> Result<(&[f32], &[f32])> {
        self.ensure_initialized()?;
        let active = self.grid.active_pair();
        Ok((&active.u, &active.v))
    }

    /// Mean of U and V plus the range of V over the active fields.
    pub fn stats(&self) -> Result<FieldStats> {
        let (u, v) = self.fields()?;
        let n = u.len() as f64;
        let (sum_u, sum_v, min_v, max_v) = self.device.install(|| {
            u.par_iter()
                .zip(v.par_iter())
                .fold(
                    || (0.0f64, 0.0f64, f32::INFINITY, f32::NEG_INFINITY),
                    |acc, (&u, &v)| (acc.0 + u as f64, acc.1 + v as f64, acc.2.min(v), acc.3.max(v)),
                )
                .reduce(
                    || (0.0f64, 0.0f64, f32::INFINITY, f32::NEG_INFINITY),
                    |a, b| (a.0 + b.0, a.1 + b.1, a.2.min(b.2), a.3.max(b.3)),
                )
        });
        Ok(FieldStats { mean_u: (sum_u / n) as f32, mean_v: (sum_v / n) as f32, min_v, max_v })
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot { tick: self.tick, time: self.time, params: self.params, stats: self.stats()? })
    }

    // Swaps the allocated grid for one of a new size. Leaves the new fields
    // unseeded on success.
    fn reallocate(&mut self, width: usize, height: usize) -> Result<()> {
        GridBuffers::check_dimensions(width, height)?;
        let (old_width, old_height) = (self.grid.width(), self.grid.height());
        let bound = self.surface.buffer().cloned();
        self.surface.unregister();
        self.grid.release();

        let Err(e) = self.grid.allocate(&self.device, width, height) else {
            return Ok(());
        };
        warn!("Allocating {}x{} failed ({}); restoring {}x{}.", width, height, e, old_width, old_height);
        if self.grid.allocate(&self.device, old_width, old_height).is_ok() {
            self.reseed();
            if let Some(buffer) = bound {
                if let Err(re) = self.surface.register(buffer) {
                    warn!("Could not rebind the previous pixel buffer: {}", re);
                }
            }
        }
        Err(e)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.grid.is_allocated() {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    fn run_kernel(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let (width, height) = (self.grid.width(), self.grid.height());
        let (src, dst) = self.grid.pairs_mut();
        ReactionDiffusionStep::run(&self.device, &self.params, width, height, src, dst)
    }

    fn commit_step(&mut self) {
        self.grid.swap();
        self.tick += 1;
        self.time += self.params.dt as f64;
        trace!("Step {} complete (t = {:.3}).", self.tick, self.time);
    }

    fn reseed(&mut self) {
        let (width, height) = (self.grid.width(), self.grid.height());
        seed_pattern(self.grid.active_pair_mut(), width, height, &self.seed);
        self.tick = 0;
        self.time = 0.0;
    }
}

/// Writes the initial pattern: U=1, V=0 everywhere, then a centered square
/// (plus `extra_spots` RNG-placed squares) with V=seed_v and U=1-seed_v.
/// The RNG is re-seeded on every call, so the result depends only on the
/// grid size and `seed`.
fn seed_pattern(pair: &mut FieldPair, width: usize, height: usize, seed: &SeedConfig) {
    pair.u.fill(1.0);
    pair.v.fill(0.0);

    let half = (width.min(height) / seed.half_extent_divisor.max(1)).max(1);
    let seed_u = 1.0 - seed.seed_v;
    let mut paint = |cx: usize, cy: usize| {
        for y in cy.saturating_sub(half)..(cy + half).min(height) {
            let row = y * width;
            for x in cx.saturating_sub(half)..(cx + half).min(width) {
                pair.u[row + x] = seed_u;
                pair.v[row + x] = seed.seed_v;
            }
        }
    };

    paint(width / 2, height / 2);

    let mut rng = StdRng::seed_from_u64(seed.rng_seed);
    for _ in 0..seed.extra_spots {
        let cx = rng.random_range(0..width);
        let cy = rng.random_range(0..height);
        paint(cx, cy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceOptions;
    use crate::interop::PixelBuffer;
    use crate::kernel::{laplacian_5pt, react};
    use std::sync::Arc;

    fn engine_with(options: EngineOptions) -> SimulationEngine {
        let device = ComputeDevice::new(DeviceOptions { threads: 2, memory_limit_bytes: None }).unwrap();
        SimulationEngine::new(device, options)
    }

    fn engine() -> SimulationEngine {
        engine_with(EngineOptions::default())
    }

    fn reference_params() -> SimulationParameters {
        SimulationParameters::new(0.16, 0.08, 0.06, 0.062, 1.0)
    }

    fn copy_fields(engine: &SimulationEngine) -> (Vec<f32>, Vec<f32>) {
        let (u, v) = engine.fields().unwrap();
        (u.to_vec(), v.to_vec())
    }

    #[test]
    fn test_operations_before_init_fail() {
        let mut e = engine();
        assert_eq!(e.reset(), Err(EngineError::NotInitialized));
        assert_eq!(e.step(), Err(EngineError::NotInitialized));
        assert_eq!(e.step_and_render_to_surface(), Err(EngineError::NotInitialized));
        assert_eq!(e.resize(4, 4), Err(EngineError::NotInitialized));
        assert!(e.fields().is_err());
        assert!(matches!(
            e.register_interop_target(PixelBuffer::for_image(1, 4, 4)),
            Err(EngineError::InteropRegistrationFailed(_))
        ));
    }

    #[test]
    fn test_seed_pattern_on_4x4_is_center_block() {
        let mut e = engine();
        e.init(4, 4, reference_params()).unwrap();
        let (u, v) = e.fields().unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let i = y * 4 + x;
                let seeded = (1..3).contains(&x) && (1..3).contains(&y);
                if seeded {
                    assert_eq!((u[i], v[i]), (0.75, 0.25), "cell ({}, {}) should be seeded", x, y);
                } else {
                    assert_eq!((u[i], v[i]), (1.0, 0.0), "cell ({}, {}) should be background", x, y);
                }
            }
        }
    }

    #[test]
    fn test_reset_after_init_is_identical() {
        let options = EngineOptions {
            seed: SeedConfig { extra_spots: 5, ..SeedConfig::default() },
            color_map: ColorMapKind::Spectral,
        };
        let mut e = engine_with(options);
        e.init(64, 48, reference_params()).unwrap();
        let after_init = copy_fields(&e);
        for _ in 0..3 {
            e.step().unwrap();
        }
        assert_ne!(copy_fields(&e), after_init);
        e.reset().unwrap();
        assert_eq!(copy_fields(&e), after_init);
        assert_eq!(e.tick(), 0);
        assert_eq!(e.params(), reference_params(), "reset must not touch parameters");
    }

    #[test]
    fn test_scenario_seed_survives_one_step() {
        let mut e = engine();
        e.init(4, 4, reference_params()).unwrap();
        e.step().unwrap();
        let (_, v) = e.fields().unwrap();
        for &i in &[5usize, 6, 9, 10] {
            assert!(v[i] > 0.0, "seeded cell {} lost its V: {}", i, v[i]);
        }
    }

    #[test]
    fn test_zero_parameters_conserve_fields() {
        let params = SimulationParameters::new(0.0, 0.0, 0.0, 0.0, 1.0);
        let mut e = engine();
        e.init(16, 16, params).unwrap();
        let (u0, v0) = copy_fields(&e);
        for _ in 0..25 {
            e.step().unwrap();
        }
        let (u, v) = e.fields().unwrap();
        for i in 0..u.len() {
            if v0[i] == 0.0 {
                assert_eq!((u[i], v[i]), (u0[i], v0[i]), "unseeded cell {} changed", i);
            } else {
                // Only the U*V^2 exchange term remains, which moves mass from U to V.
                assert!((u[i] + v[i] - (u0[i] + v0[i])).abs() < 1e-5, "U+V drifted at cell {}", i);
            }
        }

        // With U=0 inside the seed the exchange term vanishes too.
        let options = EngineOptions { seed: SeedConfig { seed_v: 1.0, ..SeedConfig::default() }, ..Default::default() };
        let mut e = engine_with(options);
        e.init(16, 16, params).unwrap();
        let before = copy_fields(&e);
        for _ in 0..25 {
            e.step().unwrap();
        }
        assert_eq!(copy_fields(&e), before);
    }

    #[test]
    fn test_step_and_render_matches_reference_steps() {
        let (w, h) = (24, 16);
        let params = SimulationParameters::new(0.2, 0.1, 0.035, 0.065, 0.9);
        let mut e = engine();
        e.init(w, h, params).unwrap();
        let buffer = PixelBuffer::for_image(1, w, h);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();

        let (mut u, mut v) = copy_fields(&e);
        let mut u_next = vec![0.0f32; w * h];
        let mut v_next = vec![0.0f32; w * h];
        let steps = 12;
        for _ in 0..steps {
            e.step_and_render_to_surface().unwrap();
            for y in 0..h {
                for x in 0..w {
                    let i = y * w + x;
                    let lu = laplacian_5pt(&u, w, h, x, y);
                    let lv = laplacian_5pt(&v, w, h, x, y);
                    (u_next[i], v_next[i]) = react(u[i], v[i], lu, lv, &params);
                }
            }
            std::mem::swap(&mut u, &mut u_next);
            std::mem::swap(&mut v, &mut v_next);
        }
        assert_eq!(copy_fields(&e), (u, v));
        assert_eq!(e.tick(), steps);
        assert_eq!(buffer.generation(), steps);
    }

    #[test]
    fn test_rendered_frame_shows_new_state() {
        let mut e = engine_with(EngineOptions { color_map: ColorMapKind::TwoChannel, ..Default::default() });
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(2, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        e.step_and_render_to_surface().unwrap();

        let map = ColorMap::new(ColorMapKind::TwoChannel);
        let (u, v) = e.fields().unwrap();
        let frame = buffer.read().unwrap();
        for i in 0..u.len() {
            let px = map.shade(u[i], v[i]);
            assert_eq!(&frame[i * 4..i * 4 + 4], &[px.r, px.g, px.b, px.a], "pixel {} mismatch", i);
        }
    }

    #[test]
    fn test_map_failure_keeps_previous_state() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let before = copy_fields(&e);

        // Nothing registered.
        assert!(matches!(e.step_and_render_to_surface(), Err(EngineError::MapFailed(_))));
        assert_eq!(copy_fields(&e), before);

        // Renderer holding the buffer.
        let buffer = PixelBuffer::for_image(3, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        let guard = buffer.read().unwrap();
        assert!(matches!(e.step_and_render_to_surface(), Err(EngineError::MapFailed(_))));
        assert_eq!(copy_fields(&e), before);
        assert_eq!(e.tick(), 0);
        assert_eq!(e.surface_status(), SurfaceStatus::Registered);
        drop(guard);

        // Retry on the next tick gives the same result as an undisturbed step.
        e.step_and_render_to_surface().unwrap();
        let mut reference = engine();
        reference.init(8, 8, reference_params()).unwrap();
        reference.step().unwrap();
        assert_eq!(copy_fields(&e), copy_fields(&reference));
    }

    #[test]
    fn test_register_rejects_wrong_size() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let err = e.register_interop_target(PixelBuffer::for_image(4, 8, 4)).unwrap_err();
        assert!(matches!(err, EngineError::InteropRegistrationFailed(_)));
        assert_eq!(e.surface_status(), SurfaceStatus::Unregistered);
    }

    #[test]
    fn test_set_preset_and_params() {
        let mut e = engine();
        e.init(4, 4, reference_params()).unwrap();
        let (u_before, v_before) = copy_fields(&e);

        e.set_preset(1).unwrap();
        assert_eq!((e.params().feed, e.params().kill), (0.030, 0.055));
        assert_eq!(e.set_preset(99), Err(EngineError::UnknownPreset(99)));
        assert_eq!((e.params().feed, e.params().kill), (0.030, 0.055), "failed preset must not change params");

        let custom = SimulationParameters::new(0.3, 0.1, 0.01, 0.02, 0.5);
        e.set_params(custom);
        assert_eq!(e.params(), custom);
        assert_eq!(copy_fields(&e), (u_before, v_before), "parameter changes must not touch the grid");
    }

    #[test]
    fn test_resize_sequence() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let old = PixelBuffer::for_image(5, 8, 8);
        e.register_interop_target(Arc::clone(&old)).unwrap();
        e.step().unwrap();

        e.resize(16, 4).unwrap();
        assert_eq!(e.dimensions(), (16, 4));
        assert_eq!(e.surface_status(), SurfaceStatus::Unregistered);
        assert!(!old.is_registered(), "old buffer must be released before reallocation");
        assert_eq!(e.tick(), 0);

        let new = PixelBuffer::for_image(6, 16, 4);
        e.register_interop_target(Arc::clone(&new)).unwrap();
        e.step_and_render_to_surface().unwrap();
        assert_eq!(new.generation(), 1);
    }

    #[test]
    fn test_resize_failure_restores_previous_size() {
        let device = ComputeDevice::new(DeviceOptions { threads: 1, memory_limit_bytes: Some(4 * 64 * 4) }).unwrap();
        let mut e = SimulationEngine::new(device, EngineOptions::default());
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(8, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        let before = copy_fields(&e);
        assert!(matches!(e.resize(16, 16), Err(EngineError::OutOfMemory { .. })));
        assert!(e.is_initialized());
        assert_eq!(e.dimensions(), (8, 8));
        assert_eq!(copy_fields(&e), before);
        assert_eq!(e.surface_status(), SurfaceStatus::Registered, "previous buffer should be bound again");
        e.step_and_render_to_surface().expect("restored engine should render into the old buffer");
        assert_eq!(buffer.generation(), 1);
    }

    #[test]
    fn test_invalid_resize_keeps_running_state() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(9, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        for _ in 0..5 {
            e.step_and_render_to_surface().unwrap();
        }
        let before = copy_fields(&e);

        assert_eq!(e.resize(0, 8), Err(EngineError::InvalidDimensions { width: 0, height: 8 }));
        assert_eq!(e.tick(), 5, "tick counter must survive a rejected resize");
        assert_eq!(e.dimensions(), (8, 8));
        assert_eq!(copy_fields(&e), before, "fields must survive a rejected resize");
        assert_eq!(e.surface_status(), SurfaceStatus::Registered);
        assert!(buffer.is_registered());
    }

    #[test]
    fn test_invalid_reinit_keeps_binding() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(10, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        e.step_and_render_to_surface().unwrap();
        let before = copy_fields(&e);

        let other = SimulationParameters::new(0.3, 0.1, 0.01, 0.02, 0.5);
        assert_eq!(e.init(0, 0, other), Err(EngineError::InvalidDimensions { width: 0, height: 0 }));
        assert!(e.is_initialized());
        assert_eq!(e.surface_status(), SurfaceStatus::Registered);
        assert_eq!(e.params(), reference_params(), "failed init must not store new parameters");
        assert_eq!(e.tick(), 1);
        assert_eq!(copy_fields(&e), before);
    }

    #[test]
    fn test_reinit_with_new_size_unbinds_old_buffer() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(11, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        e.init(4, 4, reference_params()).unwrap();
        assert_eq!(e.dimensions(), (4, 4));
        assert_eq!(e.surface_status(), SurfaceStatus::Unregistered);
        assert!(!buffer.is_registered());
    }

    #[test]
    fn test_init_out_of_memory() {
        let device = ComputeDevice::new(DeviceOptions { threads: 1, memory_limit_bytes: Some(1024) }).unwrap();
        let mut e = SimulationEngine::new(device, EngineOptions::default());
        assert!(matches!(e.init(64, 64, reference_params()), Err(EngineError::OutOfMemory { .. })));
        assert!(!e.is_initialized());
        assert_eq!(e.device().allocated_bytes(), 0);
        e.init(8, 8, reference_params()).expect("a smaller grid should fit");
    }

    #[test]
    fn test_shutdown_is_idempotent_and_releases_everything() {
        let mut e = engine();
        e.init(8, 8, reference_params()).unwrap();
        let buffer = PixelBuffer::for_image(7, 8, 8);
        e.register_interop_target(Arc::clone(&buffer)).unwrap();
        e.shutdown();
        e.shutdown();
        assert!(!e.is_initialized());
        assert!(!buffer.is_registered());
        assert_eq!(e.device().allocated_bytes(), 0);
        assert_eq!(e.reset(), Err(EngineError::NotInitialized));
    }

    #[test]
    fn test_stats_of_seeded_grid() {
        let mut e = engine();
        e.init(4, 4, reference_params()).unwrap();
        let stats = e.stats().unwrap();
        assert_eq!(stats.min_v, 0.0);
        assert_eq!(stats.max_v, 0.25);
        assert!((stats.mean_v - 0.25 * 4.0 / 16.0).abs() < 1e-6);
        assert!((stats.mean_u - (12.0 + 0.75 * 4.0) / 16.0).abs() < 1e-6);

        e.step().unwrap();
        let snap = e.snapshot().unwrap();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.time, 1.0);
    }
}
