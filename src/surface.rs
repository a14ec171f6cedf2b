// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Registry of the decode surfaces of a session.
//!
//! A [`SurfaceRegistry`] is created from one [`SurfaceArray`] and never grows: if a stream needs
//! different dimensions or more surfaces, the registry is destroyed and a new one is created.
//!
//! The registry is the single authority on whether a surface can be handed to the decoder again.
//! Surfaces are lent to the codec library as [`SurfaceLease`]s and come back when the lease is
//! dropped. Output buffers pin a surface while they wrap it. A surface released while pinned is
//! freed by the last unpin.
//!
//! Once [destroyed](SurfaceRegistry::destroy), a registry stays around as a tombstone for as long
//! as someone references it: every handle it issued reads as invalid, and late releases are
//! ignored.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use crate::context::CreationError;
use crate::context::DecodeContext;
use crate::device::DecoderDesc;
use crate::device::TextureHandle;
use crate::device::VideoDevice;
use crate::device::ViewHandle;
use crate::OutputFormat;
use crate::Resolution;

/// Surfaces freshly created by the device, all slices of the same texture array.
#[derive(Debug)]
pub struct SurfaceArray {
    pub texture: TextureHandle,
    pub views: Vec<ViewHandle>,
    pub format: OutputFormat,
    /// Aligned resolution of every surface.
    pub resolution: Resolution,
}

/// Who is currently using a surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Free,
    /// Lent to the codec library, which uses it as a decode target or reference.
    Decoder,
    /// Wrapped by this many output buffers.
    Output(u32),
}

struct Slot {
    view: ViewHandle,
    state: SurfaceState,
    /// Identifies the current acquisition of the surface.
    ticket: u64,
    /// Released while pinned by output buffers. The last unpin frees the surface.
    release_pending: bool,
}

struct RegistryInner {
    device: Arc<dyn VideoDevice>,
    texture: Option<TextureHandle>,
    format: OutputFormat,
    resolution: Resolution,
    slots: Vec<Slot>,
    free: VecDeque<usize>,
    next_ticket: u64,
    destroyed: bool,
}

impl RegistryInner {
    fn position(&self, view: ViewHandle) -> Option<usize> {
        self.slots.iter().position(|s| s.view == view)
    }

    fn release(&mut self, view: ViewHandle) {
        let Some(idx) = self.position(view) else {
            log::warn!("return of invalid surface {:?}", view);
            return;
        };

        let slot = &mut self.slots[idx];
        match slot.state {
            SurfaceState::Free => {
                log::debug!("surface {:?} is already free", view);
                return;
            }
            SurfaceState::Output(refs) => {
                log::debug!(
                    "surface {:?} released while wrapped by {} output buffers",
                    view,
                    refs
                );
                slot.release_pending = true;
                return;
            }
            SurfaceState::Decoder => (),
        }

        slot.state = SurfaceState::Free;
        self.free.push_back(idx);
    }

    fn release_ticket(&mut self, view: ViewHandle, ticket: u64) {
        match self.position(view) {
            Some(idx) if self.slots[idx].ticket == ticket => self.release(view),
            _ => log::debug!("dropping stale lease on surface {:?}", view),
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }

        let outstanding = self
            .slots
            .iter()
            .filter(|s| s.state != SurfaceState::Free)
            .count();
        if outstanding > 0 {
            log::debug!(
                "destroying surface registry with {} surfaces still in use",
                outstanding
            );
        }

        for slot in self.slots.drain(..) {
            self.device.release_view(slot.view);
        }
        if let Some(texture) = self.texture.take() {
            self.device.release_texture(texture);
        }
        self.free.clear();
        self.destroyed = true;
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// A decode surface lent to the codec library.
///
/// The surface returns to its registry when the lease is dropped, provided the registry still
/// exists and the surface has not been released through another path since.
pub struct SurfaceLease {
    view: ViewHandle,
    ticket: u64,
    registry: Weak<Mutex<RegistryInner>>,
}

impl SurfaceLease {
    pub fn view(&self) -> ViewHandle {
        self.view
    }
}

impl fmt::Debug for SurfaceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceLease")
            .field("view", &self.view)
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl Drop for SurfaceLease {
    fn drop(&mut self) {
        match self.registry.upgrade() {
            Some(registry) => registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .release_ticket(self.view, self.ticket),
            None => log::debug!("dropping lease on surface {:?} of a dead registry", self.view),
        }
    }
}

/// Fixed set of decode surfaces, see the module documentation.
#[derive(Clone)]
pub struct SurfaceRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl SurfaceRegistry {
    /// Creates `count` surfaces for `desc` through `context`.
    pub fn create(
        context: &DecodeContext,
        desc: &DecoderDesc,
        count: u32,
        alignment: u32,
    ) -> Result<Self, CreationError> {
        let array = context.create_surfaces(desc, count, alignment)?;
        Ok(Self::from_array(Arc::clone(context.device()), array))
    }

    /// Takes ownership of the surfaces of `array`, all initially free.
    pub(crate) fn from_array(device: Arc<dyn VideoDevice>, array: SurfaceArray) -> Self {
        let slots: Vec<Slot> = array
            .views
            .into_iter()
            .map(|view| Slot {
                view,
                state: SurfaceState::Free,
                ticket: 0,
                release_pending: false,
            })
            .collect();
        let free = (0..slots.len()).collect();

        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                device,
                texture: Some(array.texture),
                format: array.format,
                resolution: array.resolution,
                slots,
                free,
                next_ticket: 1,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lends a free surface to the decoder, or returns `None` if all surfaces are in use.
    pub fn acquire_free(&self) -> Option<SurfaceLease> {
        let mut inner = self.lock();
        let idx = inner.free.pop_front()?;
        let ticket = inner.next_ticket;
        inner.next_ticket += 1;

        let slot = &mut inner.slots[idx];
        debug_assert_eq!(slot.state, SurfaceState::Free);
        slot.state = SurfaceState::Decoder;
        slot.ticket = ticket;
        slot.release_pending = false;

        Some(SurfaceLease {
            view: slot.view,
            ticket,
            registry: Arc::downgrade(&self.inner),
        })
    }

    /// Returns `view` to the free list.
    ///
    /// A surface wrapped by output buffers stays pinned and is freed when the last of them goes
    /// away. Releasing an unknown or already free surface does nothing, as asynchronous release
    /// callbacks may race with a reset of the registry.
    pub fn release(&self, view: ViewHandle) {
        self.lock().release(view)
    }

    /// Whether `view` is one of the surfaces of this registry.
    pub fn is_valid(&self, view: ViewHandle) -> bool {
        self.lock().position(view).is_some()
    }

    pub fn state(&self, view: ViewHandle) -> Option<SurfaceState> {
        let inner = self.lock();
        inner.position(view).map(|idx| inner.slots[idx].state)
    }

    /// Whether the decoder holds surfaces that are not wrapped by any output buffer.
    pub fn has_outstanding(&self) -> bool {
        self.lock()
            .slots
            .iter()
            .any(|s| s.state == SurfaceState::Decoder)
    }

    /// Total number of surfaces managed by this registry.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_free(&self) -> usize {
        self.lock().free.len()
    }

    pub fn views(&self) -> Vec<ViewHandle> {
        self.lock().slots.iter().map(|s| s.view).collect()
    }

    pub fn format(&self) -> OutputFormat {
        self.lock().format
    }

    pub fn resolution(&self) -> Resolution {
        self.lock().resolution
    }

    /// Pins `view` for an output buffer. Returns the acquisition ticket to pass to
    /// [`SurfaceRegistry::unpin_output`], or `None` if the surface is not lent out.
    pub(crate) fn pin_output(&self, view: ViewHandle) -> Option<u64> {
        let mut inner = self.lock();
        let idx = inner.position(view)?;
        let slot = &mut inner.slots[idx];
        slot.state = match slot.state {
            SurfaceState::Free => return None,
            SurfaceState::Decoder => SurfaceState::Output(1),
            SurfaceState::Output(refs) => SurfaceState::Output(refs + 1),
        };
        Some(slot.ticket)
    }

    pub(crate) fn unpin_output(&self, view: ViewHandle, ticket: u64) {
        let mut inner = self.lock();
        let Some(idx) = inner.position(view) else {
            return;
        };
        let slot = &mut inner.slots[idx];
        if slot.ticket != ticket {
            return;
        }
        let state = slot.state;
        match state {
            SurfaceState::Output(1) if slot.release_pending => {
                slot.state = SurfaceState::Free;
                slot.release_pending = false;
                inner.free.push_back(idx);
            }
            SurfaceState::Output(1) => slot.state = SurfaceState::Decoder,
            SurfaceState::Output(refs) => slot.state = SurfaceState::Output(refs - 1),
            _ => (),
        }
    }

    /// Releases every surface back to the device. The registry keeps answering queries, with
    /// every handle invalid.
    pub fn destroy(&self) {
        self.lock().destroy()
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }
}

impl fmt::Debug for SurfaceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SurfaceRegistry")
            .field("surfaces", &inner.slots.len())
            .field("free", &inner.free.len())
            .field("destroyed", &inner.destroyed)
            .finish()
    }
}
