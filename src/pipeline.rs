// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Contract with the software codec library.
//!
//! The codec library parses the bitstream and drives the hardware decoder. Whenever it needs a
//! surface to decode into, it calls [`BufferAllocator::get_buffer`] on the allocator a
//! [`DecoderSession`](crate::session::DecoderSession) installed into it, and keeps the returned
//! [`DecodedFrame`] for as long as the picture is needed for reference or output. Dropping the
//! last clone of the frame is the release callback of the surface.

use std::sync::Arc;

use thiserror::Error;

use crate::buffer_pool::OutputBuffer;
use crate::device::DecoderConfig;
use crate::device::DecoderHandle;
use crate::device::ViewHandle;
use crate::surface::SurfaceLease;
use crate::Codec;
use crate::CodecProfile;

/// Pixel formats negotiated between the codec library and its clients.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PipelineFormat {
    /// Opaque hardware decode surfaces.
    HwSurface,
    #[default]
    Yuv420p,
    Yuv420p10,
    Nv12,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ColorMatrix {
    #[default]
    Unspecified,
    Bt709,
    Bt470bg,
    Smpte170m,
    Bt2020Ncl,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ColorPrimaries {
    #[default]
    Unspecified,
    Bt709,
    Bt470bg,
    Smpte170m,
    Bt2020,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TransferCharacteristic {
    #[default]
    Unspecified,
    Bt709,
    Gamma22,
    Gamma28,
    Smpte2084,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorProperties {
    pub matrix: ColorMatrix,
    pub primaries: ColorPrimaries,
    pub transfer: TransferCharacteristic,
}

/// Stream parameters as parsed by the codec library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecParams {
    pub codec: Codec,
    pub profile: CodecProfile,
    pub coded_width: u32,
    pub coded_height: u32,
    pub width: u32,
    pub height: u32,
    /// Number of reference frames the stream requires.
    pub refs: u32,
    /// Software pixel format the stream would decode to.
    pub sw_format: PipelineFormat,
    pub color: ColorProperties,
    /// Number of frame-level decoding threads, 0 if frame threading is off.
    pub frame_threads: u32,
}

impl CodecParams {
    pub fn new(codec: Codec, width: u32, height: u32) -> Self {
        Self {
            codec,
            profile: CodecProfile::Unknown,
            coded_width: width,
            coded_height: height,
            width,
            height,
            refs: 1,
            sw_format: PipelineFormat::Yuv420p,
            color: Default::default(),
            frame_threads: 0,
        }
    }

    /// Whether the stream carries more than 8 bits per sample.
    pub fn is_high_bit_depth(&self) -> bool {
        let ten_bit = self.sw_format == PipelineFormat::Yuv420p10;
        match self.codec {
            Codec::Hevc => ten_bit || self.profile == CodecProfile::HevcMain10,
            Codec::Vp9 => ten_bit || self.profile == CodecProfile::Vp9Profile2,
            _ => false,
        }
    }
}

/// A picture of the codec library.
///
/// Clones share the same surface reference. The surface goes back to its registry once the last
/// clone referencing it is dropped or [unref'd](DecodedFrame::unref).
#[derive(Clone, Debug, Default)]
pub struct DecodedFrame {
    pub timestamp: i64,
    surface: Option<ViewHandle>,
    buffer: Option<Arc<SurfaceLease>>,
}

impl DecodedFrame {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    /// Creates a frame pointing to `surface` without holding any reference on it. Used by
    /// pipelines that allocate surfaces on their own.
    pub fn from_surface(surface: ViewHandle, timestamp: i64) -> Self {
        Self {
            timestamp,
            surface: Some(surface),
            buffer: None,
        }
    }

    /// Returns the surface this frame was decoded into, if any.
    pub fn surface(&self) -> Option<ViewHandle> {
        self.surface
    }

    /// Makes the frame reference the surface of `lease`.
    pub(crate) fn attach(&mut self, lease: SurfaceLease) {
        self.surface = Some(lease.view());
        self.buffer = Some(Arc::new(lease));
    }

    /// Drops this frame's reference to its surface.
    pub fn unref(&mut self) {
        self.surface = None;
        self.buffer = None;
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GetBufferError {
    #[error("no hardware decoder is open")]
    NoDecoder,
    #[error("no decode surface available")]
    ResourceExhausted,
    #[error("the device is lost or being reset")]
    DeviceLost,
    #[error("the decoder session has been dropped")]
    SessionGone,
}

/// Buffer allocation callback installed into the codec library.
///
/// Called from the decode thread.
pub trait BufferAllocator: Send + Sync {
    /// Attaches a free decode surface to `frame`.
    fn get_buffer(&self, params: &CodecParams, frame: &mut DecodedFrame)
        -> Result<(), GetBufferError>;
}

/// Vendor specific behaviors the codec library must enable.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Workarounds {
    /// The Intel ClearVideo H.264 decoder expects its own slice layout.
    pub intel_clear_video: bool,
    /// The hardware expects scaling lists in a different zigzag order.
    pub scaling_list_zigzag: bool,
}

/// Everything the codec library needs to drive the hardware decoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HwAccelContext {
    pub decoder: DecoderHandle,
    pub config: DecoderConfig,
    pub surfaces: Vec<ViewHandle>,
    pub workarounds: Workarounds,
}

/// Codec library side of a hardware accelerated stream.
pub trait CodecPipeline {
    /// Routes future buffer allocations to `allocator` and decodes with `context`.
    fn install_hw_accel(&mut self, allocator: Arc<dyn BufferAllocator>, context: HwAccelContext);

    /// Drops every picture the codec library holds.
    fn flush_buffers(&mut self);
}

/// Output slot filled by [`DecoderSession::get_picture`](crate::session::DecoderSession::get_picture).
#[derive(Debug, Default)]
pub struct VideoPicture {
    pub buffer: Option<OutputBuffer>,
}
