//! Binding between the engine and a renderer-owned pixel transfer buffer.
//!
//! The renderer creates and destroys `PixelBuffer`s. The engine registers one,
//! maps it for writing (the buffer's byte storage moves into the surface, no
//! pixel data is copied), writes pixels, and unmaps it (storage moves back and
//! the frame generation advances). The renderer may only read between an unmap
//! and the next map.

use crate::colormap::Rgba8;
use crate::error::{EngineError, Result};
use log::{debug, warn};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use zerocopy::FromBytes;

pub type PixelBufferHandle = Arc<PixelBuffer>;

/// Renderer-owned RGBA8 transfer buffer.
#[derive(Debug)]
pub struct PixelBuffer {
    id: u32,
    size_bytes: usize,
    /// `None` while the engine holds the storage mapped, or after `destroy`.
    storage: Mutex<Option<Vec<u8>>>,
    claimed: AtomicBool,
    destroyed: AtomicBool,
    generation: AtomicU64,
}

impl PixelBuffer {
    /// Creates a zeroed buffer of `size_bytes`.
    pub fn create(id: u32, size_bytes: usize) -> PixelBufferHandle {
        Arc::new(Self {
            id,
            size_bytes,
            storage: Mutex::new(Some(vec![0u8; size_bytes])),
            claimed: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    /// Creates a buffer sized for a `width` x `height` RGBA8 image.
    pub fn for_image(id: u32, width: usize, height: usize) -> PixelBufferHandle {
        Self::create(id, width * height * Rgba8::BYTES)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Number of frames published by `unmap` so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_registered(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Frees the storage. Owners must have the engine unregister first; a
    /// still-registered buffer fails every later map.
    pub fn destroy(&self) {
        if self.is_registered() {
            warn!("Pixel buffer {} destroyed while still registered.", self.id);
        }
        self.destroyed.store(true, Ordering::Release);
        *self.lock_storage() = None;
    }

    /// Read access for the renderer. Fails while the engine has the buffer mapped.
    pub fn read(&self) -> Result<PixelReadGuard<'_>> {
        if self.is_destroyed() {
            return Err(EngineError::map_failed(format!("pixel buffer {} was destroyed", self.id)));
        }
        let guard = self.lock_storage();
        if guard.is_none() {
            return Err(EngineError::map_failed(format!("pixel buffer {} is mapped for writing", self.id)));
        }
        Ok(PixelReadGuard { guard })
    }

    fn lock_storage(&self) -> MutexGuard<'_, Option<Vec<u8>>> {
        self.storage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn claim(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(EngineError::registration(format!("pixel buffer {} was destroyed", self.id)));
        }
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| EngineError::registration(format!("pixel buffer {} is already registered", self.id)))
    }

    fn release_claim(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    fn take_storage(&self) -> Result<Vec<u8>> {
        if self.is_destroyed() {
            return Err(EngineError::map_failed(format!("pixel buffer {} was destroyed", self.id)));
        }
        let mut guard = match self.storage.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(EngineError::map_failed(format!("pixel buffer {} is busy", self.id)));
            }
        };
        guard
            .take()
            .ok_or_else(|| EngineError::map_failed(format!("pixel buffer {} is already mapped", self.id)))
    }

    fn return_storage(&self, storage: Vec<u8>) {
        let mut guard = self.lock_storage();
        if self.is_destroyed() {
            return;
        }
        *guard = Some(storage);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Shared view of the last published frame; holding it keeps the engine from mapping.
pub struct PixelReadGuard<'a> {
    guard: MutexGuard<'a, Option<Vec<u8>>>,
}

impl Deref for PixelReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.guard.as_deref().unwrap_or(&[])
    }
}

/// Observable state of an `InteropSurface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    Unregistered,
    Registered,
    Mapped,
}

#[derive(Debug)]
enum SurfaceState {
    Unregistered,
    Registered(PixelBufferHandle),
    Mapped { buffer: PixelBufferHandle, storage: Vec<u8> },
}

/// Engine-side registration/mapping of one pixel buffer.
#[derive(Debug)]
pub struct InteropSurface {
    state: SurfaceState,
}

impl Default for InteropSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl InteropSurface {
    pub fn new() -> Self {
        Self { state: SurfaceState::Unregistered }
    }

    pub fn status(&self) -> SurfaceStatus {
        match self.state {
            SurfaceState::Unregistered => SurfaceStatus::Unregistered,
            SurfaceState::Registered(_) => SurfaceStatus::Registered,
            SurfaceState::Mapped { .. } => SurfaceStatus::Mapped,
        }
    }

    /// The bound buffer, if any.
    pub fn buffer(&self) -> Option<&PixelBufferHandle> {
        match &self.state {
            SurfaceState::Unregistered => None,
            SurfaceState::Registered(buffer) | SurfaceState::Mapped { buffer, .. } => Some(buffer),
        }
    }

    /// Binds `buffer`. A previous binding is released only once the new one is
    /// claimed, so a failed registration leaves the surface untouched.
    pub fn register(&mut self, buffer: PixelBufferHandle) -> Result<()> {
        if let Some(current) = self.buffer() {
            if Arc::ptr_eq(current, &buffer) {
                return Ok(());
            }
        }
        buffer.claim()?;
        self.unregister();
        debug!("Registered pixel buffer {} ({} bytes).", buffer.id(), buffer.size_bytes());
        self.state = SurfaceState::Registered(buffer);
        Ok(())
    }

    /// Takes the buffer's storage for writing until `unmap`.
    pub fn map_for_write(&mut self) -> Result<()> {
        let buffer = match &self.state {
            SurfaceState::Unregistered => {
                return Err(EngineError::map_failed("no pixel buffer registered"));
            }
            SurfaceState::Mapped { buffer, .. } => {
                return Err(EngineError::map_failed(format!("pixel buffer {} is already mapped", buffer.id())));
            }
            SurfaceState::Registered(buffer) => Arc::clone(buffer),
        };
        let storage = buffer.take_storage()?;
        self.state = SurfaceState::Mapped { buffer, storage };
        Ok(())
    }

    /// Writable pixel view of the mapped storage.
    pub fn mapped_pixels(&mut self) -> Result<&mut [Rgba8]> {
        match &mut self.state {
            SurfaceState::Mapped { storage, .. } => <[Rgba8]>::mut_from_bytes(storage.as_mut_slice())
                .map_err(|_| EngineError::map_failed("mapped storage is not a whole number of RGBA8 pixels")),
            _ => Err(EngineError::map_failed("pixel buffer is not mapped")),
        }
    }

    /// Hands the storage back to the buffer and publishes the frame.
    pub fn unmap(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, SurfaceState::Unregistered) {
            SurfaceState::Mapped { buffer, storage } => {
                buffer.return_storage(storage);
                self.state = SurfaceState::Registered(buffer);
                Ok(())
            }
            other => {
                self.state = other;
                Err(EngineError::map_failed("pixel buffer is not mapped"))
            }
        }
    }

    /// Releases the binding without destroying the buffer. Unmaps first if needed.
    pub fn unregister(&mut self) {
        match std::mem::replace(&mut self.state, SurfaceState::Unregistered) {
            SurfaceState::Unregistered => {}
            SurfaceState::Registered(buffer) => {
                buffer.release_claim();
                debug!("Unregistered pixel buffer {}.", buffer.id());
            }
            SurfaceState::Mapped { buffer, storage } => {
                warn!("Unregistering pixel buffer {} while mapped; unmapping first.", buffer.id());
                buffer.return_storage(storage);
                buffer.release_claim();
            }
        }
    }
}

impl Drop for InteropSurface {
    fn drop(&mut self) {
        self.unregister();
    }
}
