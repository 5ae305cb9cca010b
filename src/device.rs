//! Compute device: a dedicated worker pool plus an allocation ledger.
//!
//! Field memory is accounted against an optional byte budget so that an
//! oversized grid fails with `OutOfMemory` instead of taking the process down.

use crate::error::{EngineError, Result};
use log::{debug, info};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Options used to create a `ComputeDevice`.
#[derive(Debug, Clone, Default)]
pub struct DeviceOptions {
    /// Worker threads; 0 lets rayon pick one per core.
    pub threads: usize,
    /// Upper bound on bytes held by live fields.
    pub memory_limit_bytes: Option<usize>,
}

#[derive(Debug, Default)]
struct AllocationLedger {
    allocated: AtomicUsize,
    limit: Option<usize>,
}

impl AllocationLedger {
    fn reserve(&self, bytes: usize) -> Result<()> {
        let mut current = self.allocated.load(Ordering::Relaxed);
        loop {
            let next = current
                .checked_add(bytes)
                .ok_or_else(|| EngineError::out_of_memory(bytes, "allocation size overflow"))?;
            if let Some(limit) = self.limit {
                if next > limit {
                    return Err(EngineError::out_of_memory(
                        bytes,
                        format!("device budget of {} bytes exceeded, {} already in use", limit, current),
                    ));
                }
            }
            match self.allocated.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.allocated.fetch_sub(bytes, Ordering::AcqRel);
    }
}

/// Data-parallel execution context that owns field memory accounting.
#[derive(Debug)]
pub struct ComputeDevice {
    pool: ThreadPool,
    ledger: Arc<AllocationLedger>,
}

impl ComputeDevice {
    pub fn new(options: DeviceOptions) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("rd-device-{}", i))
            .build()
            .map_err(|e| EngineError::Internal(format!("failed to build compute pool: {}", e)))?;
        info!(
            "Compute device ready: {} threads, memory limit {}",
            pool.current_num_threads(),
            options
                .memory_limit_bytes
                .map_or_else(|| "none".to_string(), |b| format!("{} bytes", b))
        );
        Ok(Self {
            pool,
            ledger: Arc::new(AllocationLedger { allocated: AtomicUsize::new(0), limit: options.memory_limit_bytes }),
        })
    }

    /// Allocates a zero-filled field of `len` scalars.
    pub fn alloc_zeroed(&self, len: usize) -> Result<DeviceField> {
        let bytes = len
            .checked_mul(std::mem::size_of::<f32>())
            .ok_or_else(|| EngineError::out_of_memory(usize::MAX, "allocation size overflow"))?;
        self.ledger.reserve(bytes)?;

        let mut data: Vec<f32> = Vec::new();
        if let Err(e) = data.try_reserve_exact(len) {
            self.ledger.release(bytes);
            return Err(EngineError::out_of_memory(bytes, e.to_string()));
        }
        data.resize(len, 0.0);
        debug!("Allocated device field of {} scalars ({} bytes).", len, bytes);

        Ok(DeviceField { data, bytes, ledger: Some(Arc::clone(&self.ledger)) })
    }

    /// Runs `op` inside the device pool; parallel iterators used by `op` run on
    /// the device workers. Returns once all of that work has finished.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn allocated_bytes(&self) -> usize {
        self.ledger.allocated.load(Ordering::Acquire)
    }

    pub fn memory_limit_bytes(&self) -> Option<usize> {
        self.ledger.limit
    }
}

/// One device-resident scalar field. Its bytes go back to the ledger on drop.
#[derive(Debug, Default)]
pub struct DeviceField {
    data: Vec<f32>,
    bytes: usize,
    ledger: Option<Arc<AllocationLedger>>,
}

impl DeviceField {
    /// A field holding no memory, used for released slots.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Deref for DeviceField {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for DeviceField {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl Drop for DeviceField {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.take() {
            ledger.release(self.bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(limit: Option<usize>) -> ComputeDevice {
        ComputeDevice::new(DeviceOptions { threads: 2, memory_limit_bytes: limit }).expect("pool should build")
    }

    #[test]
    fn test_alloc_is_zeroed_and_accounted() {
        let dev = device(None);
        let field = dev.alloc_zeroed(64).expect("allocation should succeed");
        assert_eq!(field.len(), 64);
        assert!(field.iter().all(|&x| x == 0.0));
        assert_eq!(dev.allocated_bytes(), 64 * 4);
        drop(field);
        assert_eq!(dev.allocated_bytes(), 0, "dropping a field must return its bytes");
    }

    #[test]
    fn test_budget_exceeded_is_out_of_memory() {
        let dev = device(Some(100 * 4));
        let first = dev.alloc_zeroed(60).expect("fits in budget");
        match dev.alloc_zeroed(60) {
            Err(EngineError::OutOfMemory { requested_bytes, .. }) => assert_eq!(requested_bytes, 240),
            other => panic!("expected OutOfMemory, got {:?}", other),
        }
        assert_eq!(dev.allocated_bytes(), 240, "failed allocation must not leak ledger bytes");
        drop(first);
        assert!(dev.alloc_zeroed(100).is_ok());
    }

    #[test]
    fn test_install_runs_on_device_pool() {
        let dev = device(None);
        assert_eq!(dev.threads(), 2);
        let name = dev.install(|| std::thread::current().name().map(str::to_string));
        assert!(name.unwrap_or_default().starts_with("rd-device-"));
    }

    #[test]
    fn test_empty_field_releases_nothing() {
        let field = DeviceField::empty();
        assert!(field.is_empty());
    }
}
