// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interfaces of the render/present and windowing layers.

/// Occupancy of the render queue.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderBufferCounts {
    pub queued: u32,
    pub discard: u32,
    pub free: u32,
}

/// Deinterlacing methods a decoder can advertise to the renderer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeinterlaceMethod {
    None,
    /// Let the video processor of the GPU pick the method.
    HardwareAuto,
}

/// Render/present collaborator of a decoder session.
pub trait RenderCollaborator: Send + Sync {
    /// Returns the current occupancy of the render queue.
    fn render_buffers(&self) -> RenderBufferCounts;

    /// Asks the compositor for more decode-ahead time, the render queue has room.
    fn request_decoding_time(&self);

    /// Gives decode-ahead time back to the compositor.
    fn release_decoding_time(&self);

    /// Advertises the deinterlacing methods usable with the decoded surfaces.
    fn update_deinterlacing_methods(
        &self,
        _methods: &[DeinterlaceMethod],
        _default: DeinterlaceMethod,
    ) {
    }
}

/// Receives device state transitions from the windowing layer.
///
/// The windowing layer calls these from its own thread, concurrently with decoding.
pub trait DeviceResourceListener: Send + Sync {
    /// The device became unusable.
    fn on_device_lost(&self);

    /// The device has been destroyed. `fatal` is set if it will not be recreated.
    fn on_device_destroyed(&self, fatal: bool);

    /// The device is usable again after a loss.
    fn on_device_reset(&self);

    /// A new device has been created.
    fn on_device_created(&self);
}
