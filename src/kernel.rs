//! Gray-Scott integration step.
//!
//! Explicit Euler update with a 5-point Laplacian (unit grid spacing) on a
//! toroidal grid:
//!
//! ```text
//! lap(f)  = f[x-1,y] + f[x+1,y] + f[x,y-1] + f[x,y+1] - 4 f[x,y]
//! U'      = U + dt * (Du * lap(U) - U*V*V + F*(1 - U))
//! V'      = V + dt * (Dv * lap(V) + U*V*V - (F + k)*V)
//! ```
//!
//! Values are not clamped.

use crate::device::ComputeDevice;
use crate::error::{EngineError, Result};
use crate::grid::FieldPair;
use rayon::prelude::*;
use reaction_common::SimulationParameters;

/// Wrapped 5-point Laplacian at (x, y).
#[inline(always)]
pub fn laplacian_5pt(field: &[f32], width: usize, height: usize, x: usize, y: usize) -> f32 {
    let xm = if x == 0 { width - 1 } else { x - 1 };
    let xp = if x + 1 == width { 0 } else { x + 1 };
    let ym = if y == 0 { height - 1 } else { y - 1 };
    let yp = if y + 1 == height { 0 } else { y + 1 };

    let row = y * width;
    let center = field[row + x];
    field[row + xm] + field[row + xp] + field[ym * width + x] + field[yp * width + x] - 4.0 * center
}

/// New (U, V) for one cell given its current values and Laplacians.
#[inline(always)]
pub fn react(u: f32, v: f32, lap_u: f32, lap_v: f32, p: &SimulationParameters) -> (f32, f32) {
    let uvv = u * v * v;
    let reaction_u = -uvv + p.feed * (1.0 - u);
    let reaction_v = uvv - (p.feed + p.kill) * v;
    (
        u + p.dt * (p.du * lap_u + reaction_u),
        v + p.dt * (p.dv * lap_v + reaction_v),
    )
}

/// Advances the field pair by one time step.
pub struct ReactionDiffusionStep;

impl ReactionDiffusionStep {
    /// Reads `src`, writes the next state into `dst`. Rows are processed in
    /// parallel on the device; every write lands in `dst`, so no cell sees a
    /// neighbor's update from the same step. Returns after all rows are done.
    pub fn run(
        device: &ComputeDevice,
        params: &SimulationParameters,
        width: usize,
        height: usize,
        src: &FieldPair,
        dst: &mut FieldPair,
    ) -> Result<()> {
        let len = width * height;
        if len == 0 {
            return Err(EngineError::NotInitialized);
        }
        if src.u.len() != len || src.v.len() != len || dst.u.len() != len || dst.v.len() != len {
            return Err(EngineError::Internal(format!(
                "field length mismatch for {}x{} grid (src {}/{}, dst {}/{})",
                width,
                height,
                src.u.len(),
                src.v.len(),
                dst.u.len(),
                dst.v.len()
            )));
        }

        let u_in: &[f32] = &src.u;
        let v_in: &[f32] = &src.v;
        let p = *params;

        device.install(|| {
            dst.u
                .par_chunks_mut(width)
                .zip(dst.v.par_chunks_mut(width))
                .enumerate()
                .for_each(|(y, (u_row, v_row))| {
                    for x in 0..width {
                        let idx = y * width + x;
                        let lap_u = laplacian_5pt(u_in, width, height, x, y);
                        let lap_v = laplacian_5pt(v_in, width, height, x, y);
                        let (u_next, v_next) = react(u_in[idx], v_in[idx], lap_u, lap_v, &p);
                        u_row[x] = u_next;
                        v_row[x] = v_next;
                    }
                });
        });
        Ok(())
    }
}
