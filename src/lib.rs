// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware-accelerated decode integration layer.
//!
//! This crate sits between a software codec library and a platform GPU decode API. It negotiates
//! decoder formats with the device, owns the pools of GPU decode surfaces the codec decodes into,
//! hands decoded surfaces to the renderer as reference-counted output buffers, and survives
//! device loss.
//!
//! The main entry point is [`session::DecoderSession`], created per stream from a
//! [`session::SessionEnv`] that carries the per-device [`context::ContextManager`].

pub mod buffer_pool;
pub mod compat;
pub mod context;
pub mod device;
pub mod mode;
pub mod pipeline;
pub mod provider;
pub mod render;
pub mod session;
pub mod settings;
pub mod surface;
pub mod utils;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Whether `self` can contain `other`.
    pub fn can_contain(&self, other: Self) -> bool {
        self.width >= other.width && self.height >= other.height
    }

    /// Returns `self` with both dimensions rounded up to `alignment`.
    pub fn align(&self, alignment: u32) -> Self {
        Self {
            width: utils::align_up(self.width, alignment),
            height: utils::align_up(self.height, alignment),
        }
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

/// Codecs the codec library may ask us to accelerate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Mpeg2,
    H264,
    Vc1,
    Wmv3,
    Hevc,
    Vp9,
    Other,
}

/// Codec profiles as reported by the codec library.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodecProfile {
    #[default]
    Unknown,
    Mpeg2Simple,
    Mpeg2Main,
    Mpeg2High,
    H264Baseline,
    H264ConstrainedBaseline,
    H264Main,
    H264High,
    H264High10,
    H264High422,
    HevcMain,
    HevcMain10,
    HevcRext,
    Vp9Profile0,
    Vp9Profile1,
    Vp9Profile2,
    Vp9Profile3,
}

/// Pixel format of the decode surfaces, numbered like the platform API does.
///
/// The numbering is meaningful: formats are ordered by capacity, so any format comparing lower
/// than [`OutputFormat::P010`] cannot hold 10-bit content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, enumn::N)]
#[repr(u32)]
pub enum OutputFormat {
    Unknown = 0,
    Nv12 = 103,
    P010 = 104,
    P016 = 105,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Unknown => write!(f, "unknown"),
            OutputFormat::Nv12 => write!(f, "NV12"),
            OutputFormat::P010 => write!(f, "P010"),
            OutputFormat::P016 => write!(f, "P016"),
        }
    }
}
