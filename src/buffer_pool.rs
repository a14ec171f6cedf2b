// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Output buffers handed to the renderer.
//!
//! An [`OutputBuffer`] wraps a decoded surface with the metadata the renderer needs. It is
//! reference counted: clones can be held by the renderer and the decode pipeline at the same
//! time, and the buffer slot returns to its [`OutputBufferPool`] once the last clone is dropped.
//!
//! Returning a slot does not free the surface. The buffer keeps a private reference to the
//! decoded frame, and dropping that reference only gives the surface back to the codec library.
//! The [`SurfaceRegistry`] decides when the surface is actually free.

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use crate::device::ViewHandle;
use crate::pipeline::DecodedFrame;
use crate::surface::SurfaceRegistry;
use crate::OutputFormat;

#[derive(Default)]
struct PoolInner {
    /// Bumped on every reset so buffers of a previous life cannot return their slot.
    generation: u64,
    num_slots: usize,
    free: VecDeque<usize>,
    in_use: BTreeSet<usize>,
}

impl PoolInner {
    fn return_slot(&mut self, id: usize, generation: u64) {
        if generation != self.generation {
            log::debug!("ignoring return of buffer {} from a previous pool", id);
            return;
        }

        if self.in_use.remove(&id) {
            self.free.push_back(id);
        }
    }
}

struct BufferInner {
    id: usize,
    generation: u64,
    surface: ViewHandle,
    ticket: u64,
    format: OutputFormat,
    width: u32,
    height: u32,
    frame: DecodedFrame,
    registry: SurfaceRegistry,
    pool: Weak<Mutex<PoolInner>>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        self.registry.unpin_output(self.surface, self.ticket);
        self.frame.unref();

        if let Some(pool) = self.pool.upgrade() {
            pool.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .return_slot(self.id, self.generation);
        }
    }
}

/// A decoded picture ready for rendering. Cloning it adds a reference.
#[derive(Clone)]
pub struct OutputBuffer(Arc<BufferInner>);

impl OutputBuffer {
    /// Index of the pool slot this buffer occupies.
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn surface(&self) -> ViewHandle {
        self.0.surface
    }

    pub fn format(&self) -> OutputFormat {
        self.0.format
    }

    /// Aligned width of the surface.
    pub fn width(&self) -> u32 {
        self.0.width
    }

    /// Aligned height of the surface.
    pub fn height(&self) -> u32 {
        self.0.height
    }

    pub fn timestamp(&self) -> i64 {
        self.0.frame.timestamp
    }

    /// Whether the surface behind this buffer can still be rendered. Turns false once the pool
    /// that issued it has been reset.
    pub fn is_valid(&self) -> bool {
        let live_pool = match self.0.pool.upgrade() {
            Some(pool) => {
                pool.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .generation
                    == self.0.generation
            }
            None => false,
        };

        live_pool && self.0.registry.is_valid(self.0.surface)
    }

    /// Number of clones of this buffer currently alive.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("id", &self.0.id)
            .field("surface", &self.0.surface)
            .field("format", &self.0.format)
            .field("width", &self.0.width)
            .field("height", &self.0.height)
            .finish()
    }
}

/// Allocates [`OutputBuffer`]s backed by the surfaces of one registry.
///
/// Slots are allocated on demand and never shrink until the pool is reset.
pub struct OutputBufferPool {
    inner: Arc<Mutex<PoolInner>>,
    registry: SurfaceRegistry,
}

impl OutputBufferPool {
    pub fn new(registry: SurfaceRegistry) -> Self {
        Self {
            inner: Default::default(),
            registry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Wraps the surface `frame` was decoded into.
    ///
    /// Returns `None` if `frame` does not reference a surface currently lent out by our registry.
    pub fn get(
        &self,
        frame: &DecodedFrame,
        format: OutputFormat,
        width: u32,
        height: u32,
    ) -> Option<OutputBuffer> {
        let surface = frame.surface()?;
        let ticket = self.registry.pin_output(surface)?;

        let mut inner = self.lock();
        let id = match inner.free.pop_front() {
            Some(id) => id,
            None => {
                inner.num_slots += 1;
                inner.num_slots - 1
            }
        };
        inner.in_use.insert(id);
        let generation = inner.generation;
        drop(inner);

        Some(OutputBuffer(Arc::new(BufferInner {
            id,
            generation,
            surface,
            ticket,
            format,
            width,
            height,
            frame: frame.clone(),
            registry: self.registry.clone(),
            pool: Arc::downgrade(&self.inner),
        })))
    }

    /// Whether the codec library holds surfaces that no output buffer wraps. If so, its buffers
    /// must be flushed before the decoder is torn down.
    pub fn has_refs(&self) -> bool {
        self.registry.has_outstanding()
    }

    pub fn num_slots(&self) -> usize {
        self.lock().num_slots
    }

    pub fn num_free_slots(&self) -> usize {
        self.lock().free.len()
    }

    /// Invalidates every slot and destroys the surface registry.
    ///
    /// The caller must make sure no decode operation is in flight.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.num_slots = 0;
        inner.free.clear();
        inner.in_use.clear();
        drop(inner);

        self.registry.destroy();
    }
}
