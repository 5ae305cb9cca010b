//! Ping-pong storage for the U and V fields.

use crate::device::{ComputeDevice, DeviceField};
use crate::error::{EngineError, Result};
use log::debug;

/// One (U, V) pair of fields. `slot` is the fixed identity of the pair (0 or 1)
/// and never changes while the buffers are allocated.
#[derive(Debug, Default)]
pub struct FieldPair {
    slot: usize,
    pub u: DeviceField,
    pub v: DeviceField,
}

impl FieldPair {
    fn empty(slot: usize) -> Self {
        Self { slot, u: DeviceField::empty(), v: DeviceField::empty() }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.u.len()
    }

    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }
}

/// Holds the four device fields of the simulation.
#[derive(Debug)]
pub struct GridBuffers {
    width: usize,
    height: usize,

    // --- Ping-Pong Slots ---
    // `slots[active]` is the current state, the other slot is written by the next step.
    slots: [FieldPair; 2],
    active: usize,
}

impl Default for GridBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl GridBuffers {
    /// Creates released (empty) buffers.
    pub fn new() -> Self {
        Self { width: 0, height: 0, slots: [FieldPair::empty(0), FieldPair::empty(1)], active: 0 }
    }

    /// Allocates four zero-filled fields of `width * height` scalars.
    /// Any previous allocation is released first; on failure the buffers stay released.
    pub fn allocate(&mut self, device: &ComputeDevice, width: usize, height: usize) -> Result<()> {
        Self::check_dimensions(width, height)?;
        self.release();

        let len = width
            .checked_mul(height)
            .ok_or_else(|| EngineError::out_of_memory(usize::MAX, "grid size overflow"))?;

        // Fields allocated before a failure are dropped here and return their bytes.
        let u0 = device.alloc_zeroed(len)?;
        let v0 = device.alloc_zeroed(len)?;
        let u1 = device.alloc_zeroed(len)?;
        let v1 = device.alloc_zeroed(len)?;

        self.slots = [FieldPair { slot: 0, u: u0, v: v0 }, FieldPair { slot: 1, u: u1, v: v1 }];
        self.active = 0;
        self.width = width;
        self.height = height;
        debug!("Allocated grid buffers {}x{} ({} scalars per field).", width, height, len);
        Ok(())
    }

    /// Rejects grids with a zero-length side.
    pub fn check_dimensions(width: usize, height: usize) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidDimensions { width, height });
        }
        Ok(())
    }

    /// Frees all four fields. Calling it on released buffers does nothing.
    pub fn release(&mut self) {
        if !self.is_allocated() {
            return;
        }
        self.slots = [FieldPair::empty(0), FieldPair::empty(1)];
        self.active = 0;
        self.width = 0;
        self.height = 0;
        debug!("Released grid buffers.");
    }

    pub fn is_allocated(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells per field.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pair holding the current state.
    pub fn active_pair(&self) -> &FieldPair {
        &self.slots[self.active]
    }

    /// The pair the next step writes into.
    pub fn scratch_pair(&self) -> &FieldPair {
        &self.slots[1 - self.active]
    }

    pub fn active_pair_mut(&mut self) -> &mut FieldPair {
        &mut self.slots[self.active]
    }

    /// Borrows the active pair for reading and the scratch pair for writing at the same time.
    pub fn pairs_mut(&mut self) -> (&FieldPair, &mut FieldPair) {
        let (first, second) = self.slots.split_at_mut(1);
        if self.active == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Makes the scratch pair the active one. No data moves.
    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceOptions;

    fn device(limit: Option<usize>) -> ComputeDevice {
        ComputeDevice::new(DeviceOptions { threads: 1, memory_limit_bytes: limit }).unwrap()
    }

    #[test]
    fn test_allocate_zero_fills_four_fields() {
        let dev = device(None);
        let mut grid = GridBuffers::new();
        grid.allocate(&dev, 8, 4).expect("allocation should succeed");
        assert_eq!(grid.len(), 32);
        for pair in [grid.active_pair(), grid.scratch_pair()] {
            assert_eq!(pair.u.len(), 32);
            assert_eq!(pair.v.len(), 32);
            assert!(pair.u.iter().chain(pair.v.iter()).all(|&x| x == 0.0));
        }
        assert_eq!(dev.allocated_bytes(), 4 * 32 * 4);
    }

    #[test]
    fn test_swap_twice_restores_identity() {
        let dev = device(None);
        let mut grid = GridBuffers::new();
        grid.allocate(&dev, 4, 4).unwrap();
        let before = grid.active_pair().slot();
        let before_ptr = grid.active_pair().u.as_ptr();
        grid.swap();
        assert_ne!(grid.active_pair().slot(), before);
        assert_eq!(grid.scratch_pair().slot(), before);
        grid.swap();
        assert_eq!(grid.active_pair().slot(), before);
        assert_eq!(grid.active_pair().u.as_ptr(), before_ptr, "swap must not move data");
    }

    #[test]
    fn test_pairs_mut_follows_active_slot() {
        let dev = device(None);
        let mut grid = GridBuffers::new();
        grid.allocate(&dev, 2, 2).unwrap();
        grid.swap();
        let (src, dst) = grid.pairs_mut();
        assert_eq!(src.slot(), 1);
        assert_eq!(dst.slot(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let dev = device(None);
        let mut grid = GridBuffers::new();
        grid.release();
        grid.allocate(&dev, 4, 4).unwrap();
        grid.release();
        grid.release();
        assert!(!grid.is_allocated());
        assert!(grid.active_pair().is_empty());
        assert_eq!(dev.allocated_bytes(), 0);
    }

    #[test]
    fn test_allocate_rejects_zero_dimensions() {
        let dev = device(None);
        let mut grid = GridBuffers::new();
        assert_eq!(grid.allocate(&dev, 0, 4), Err(EngineError::InvalidDimensions { width: 0, height: 4 }));
    }

    #[test]
    fn test_out_of_memory_leaves_buffers_released() {
        // Room for three 16-cell fields but not the fourth.
        let dev = device(Some(3 * 16 * 4));
        let mut grid = GridBuffers::new();
        let err = grid.allocate(&dev, 4, 4).unwrap_err();
        assert!(matches!(err, EngineError::OutOfMemory { .. }), "got {:?}", err);
        assert!(!grid.is_allocated());
        assert_eq!(dev.allocated_bytes(), 0);
    }

    #[test]
    fn test_reallocate_releases_previous_first() {
        // Budget fits exactly one 4x4 grid: reallocation only works if the old one is freed first.
        let dev = device(Some(4 * 16 * 4));
        let mut grid = GridBuffers::new();
        grid.allocate(&dev, 4, 4).unwrap();
        grid.allocate(&dev, 2, 8).expect("previous allocation should be released first");
        assert_eq!((grid.width(), grid.height()), (2, 8));
    }
}
