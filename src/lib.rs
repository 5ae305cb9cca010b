//! Gray-Scott reaction-diffusion engine.
//!
//! The engine keeps two species double-buffered on a compute device, advances
//! them with a toroidal 5-point stencil, and publishes a color-mapped frame
//! into a renderer-owned pixel buffer after every step.

pub mod colormap;
pub mod device;
pub mod engine;
pub mod error;
pub mod grid;
pub mod interop;
pub mod kernel;

pub use colormap::{ColorMap, Rgba8};
pub use device::{ComputeDevice, DeviceField, DeviceOptions};
pub use engine::{EngineOptions, SimulationEngine};
pub use error::{EngineError, Result};
pub use grid::{FieldPair, GridBuffers};
pub use interop::{InteropSurface, PixelBuffer, PixelBufferHandle, PixelReadGuard, SurfaceStatus};
pub use kernel::ReactionDiffusionStep;
