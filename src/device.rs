// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Platform GPU decode API.
//!
//! The [`VideoDevice`] trait is the only way this crate talks to the GPU. Device and context
//! creation belong to the host graphics layer; this crate is handed an already created device
//! and only uses the decode-related entry points listed here.

#[cfg(test)]
pub(crate) mod dummy;

use thiserror::Error;

use crate::mode::ProfileGuid;
use crate::Codec;
use crate::OutputFormat;

pub const PCI_VENDOR_ATI: u32 = 0x1002;
pub const PCI_VENDOR_NVIDIA: u32 = 0x10de;
pub const PCI_VENDOR_INTEL: u32 = 0x8086;

/// Error returned by [`VideoDevice`] methods.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("{call} failed with code {code:#010x}")]
    Failed { call: &'static str, code: u32 },
    #[error("the device has been removed")]
    DeviceRemoved,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Handle to a texture array owned by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a decoder output view, i.e. one decode surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewHandle(pub u64);

/// Handle to a hardware decoder object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecoderHandle(pub u64);

/// Family of the platform the device runs on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PlatformFamily {
    #[default]
    Desktop,
    Xbox,
}

/// Identification of the GPU adapter behind a device.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterInfo {
    pub vendor_id: u32,
    pub device_id: u32,
    /// Renderer string as reported by the windowing layer, e.g. "AMD Radeon HD 3400 Series".
    pub renderer: String,
    pub platform: PlatformFamily,
}

/// Negotiated decoder description.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecoderDesc {
    pub profile: ProfileGuid,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Decoder configuration as enumerated by the device for a [`DecoderDesc`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Raw bitstream packaging mode. 0 means the configuration does not accept raw bitstreams.
    pub bitstream_raw: u32,
    pub encryption: ProfileGuid,
}

/// Severity of a decode error, as reported by the status registers of the hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
pub enum DecodeStatusCode {
    Ok = 0,
    MinorProblem = 1,
    SignificantProblem = 2,
    SevereProblem = 3,
    OtherProblem = 4,
}

/// Raw contents of the decode status registers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeStatusReport {
    pub status: u8,
    pub buffer_type: u8,
}

/// Decode entry points of a platform GPU device.
///
/// Every method may be called from any thread.
pub trait VideoDevice: Send + Sync {
    /// Returns the adapter the device was created on.
    fn adapter_info(&self) -> AdapterInfo;

    /// Returns the decode profiles supported by the device.
    fn decoder_profiles(&self) -> DeviceResult<Vec<ProfileGuid>>;

    /// Whether the device can decode `profile` into surfaces of `format`.
    fn check_decoder_format(&self, profile: &ProfileGuid, format: OutputFormat)
        -> DeviceResult<bool>;

    /// Returns the configurations available for decoders of `desc`.
    fn decoder_configs(&self, desc: &DecoderDesc) -> DeviceResult<Vec<DecoderConfig>>;

    /// Whether surfaces of `format` can also be sampled from shaders.
    fn supports_shader_sample(&self, format: OutputFormat) -> bool;

    /// Creates an array of `count` textures of `width`x`height` usable as decoder targets.
    fn create_texture_array(
        &self,
        format: OutputFormat,
        width: u32,
        height: u32,
        count: u32,
        shader_sample: bool,
    ) -> DeviceResult<TextureHandle>;

    /// Creates a decoder output view on slice `slice` of `texture`.
    fn create_output_view(
        &self,
        texture: TextureHandle,
        profile: &ProfileGuid,
        slice: u32,
    ) -> DeviceResult<ViewHandle>;

    /// Clears `view` to black.
    fn clear_view(&self, view: ViewHandle);

    fn release_view(&self, view: ViewHandle);

    fn release_texture(&self, texture: TextureHandle);

    fn create_decoder(
        &self,
        desc: &DecoderDesc,
        config: &DecoderConfig,
    ) -> DeviceResult<DecoderHandle>;

    fn destroy_decoder(&self, decoder: DecoderHandle);

    /// Reads the decode status registers of `decoder`. Only meaningful for H.264 and VC-1.
    fn query_decode_status(
        &self,
        decoder: DecoderHandle,
        codec: Codec,
    ) -> DeviceResult<DecodeStatusReport>;
}
