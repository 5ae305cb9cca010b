//! Shading of the U/V fields into RGBA8 pixels.

use crate::device::ComputeDevice;
use crate::error::{EngineError, Result};
use palette::{FromColor, Hsv, Srgb};
use rayon::prelude::*;
use reaction_common::ColorMapKind;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// One RGBA8 pixel as laid out in the transfer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BYTES: usize = 4;

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

const LUT_SIZE: usize = 256;

// V rarely exceeds ~0.5 in the Gray-Scott regimes of interest.
const SPECTRAL_V_SCALE: f32 = 2.0;

#[inline(always)]
fn quantize(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Deterministic mapping from (U, V) to a pixel.
#[derive(Debug, Clone)]
pub struct ColorMap {
    kind: ColorMapKind,
    lut: Vec<Rgba8>,
}

impl ColorMap {
    pub fn new(kind: ColorMapKind) -> Self {
        let lut = match kind {
            ColorMapKind::Spectral => spectral_lut(),
            ColorMapKind::Grayscale | ColorMapKind::TwoChannel => Vec::new(),
        };
        Self { kind, lut }
    }

    pub fn kind(&self) -> ColorMapKind {
        self.kind
    }

    #[inline(always)]
    pub fn shade(&self, u: f32, v: f32) -> Rgba8 {
        match self.kind {
            ColorMapKind::Grayscale => {
                let g = quantize(u);
                Rgba8::new(g, g, g, 255)
            }
            ColorMapKind::TwoChannel => Rgba8::new(quantize(u), quantize(v), 0, 255),
            ColorMapKind::Spectral => {
                let t = (v * SPECTRAL_V_SCALE).clamp(0.0, 1.0);
                // NaN falls through to index 0.
                let idx = (t * (LUT_SIZE - 1) as f32).round() as usize;
                self.lut[idx.min(LUT_SIZE - 1)]
            }
        }
    }

    /// Shades every cell into `out`, in parallel on the device.
    pub fn render(&self, device: &ComputeDevice, u: &[f32], v: &[f32], out: &mut [Rgba8]) -> Result<()> {
        if u.len() != out.len() || v.len() != out.len() {
            return Err(EngineError::map_failed(format!(
                "pixel region holds {} pixels, field has {} cells",
                out.len(),
                u.len()
            )));
        }
        device.install(|| {
            out.par_iter_mut()
                .zip(u.par_iter().zip(v.par_iter()))
                .for_each(|(px, (&u, &v))| *px = self.shade(u, v));
        });
        Ok(())
    }
}

/// Blue (low V) to red (high V) ramp, brightening as V grows.
fn spectral_lut() -> Vec<Rgba8> {
    (0..LUT_SIZE)
        .map(|i| {
            let t = i as f32 / (LUT_SIZE - 1) as f32;
            let hsv = Hsv::new(240.0 * (1.0 - t), 0.85, 0.15 + 0.85 * t);
            let rgb = Srgb::from_color(hsv);
            Rgba8::new(quantize(rgb.red), quantize(rgb.green), quantize(rgb.blue), 255)
        })
        .collect()
}
