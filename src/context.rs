// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-device decode context.
//!
//! A [`DecodeContext`] holds everything that depends on the device but not on a particular stream:
//! the list of decode profiles the device supports, vendor limitations, and the negotiation of
//! decoder formats and configurations. It is shared by all the sessions decoding on the same
//! device and is reference counted through the [`ContextManager`] of that device.

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use thiserror::Error;

use crate::device::AdapterInfo;
use crate::device::DecoderConfig;
use crate::device::DecoderDesc;
use crate::device::DecoderHandle;
use crate::device::DeviceError;
use crate::device::DeviceResult;
use crate::device::VideoDevice;
use crate::mode;
use crate::mode::DecodeMode;
use crate::mode::ProfileGuid;
use crate::mode::DECODE_MODES;
use crate::mode::RENDER_TARGETS;
use crate::pipeline::CodecParams;
use crate::surface::SurfaceArray;
use crate::Codec;
use crate::OutputFormat;
use crate::Resolution;

/// Raw bitstream mode picked over any other when the device offers it. Required by some Intel
/// hardware and handles frame skipping better on NVIDIA.
pub const PREFERRED_BITSTREAM_RAW: u32 = 2;

/// Renderer strings of devices that can only run one decoder at a time.
const SINGLE_DECODER_RENDERERS: [&str; 4] =
    ["Radeon HD 2", "Radeon HD 3", "Radeon HD 4", "Radeon HD 5"];

/// Identifies a session attached to a context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something holding a hardware decoder that the context may ask to let it go.
pub trait DecoderOwner: Send + Sync {
    /// Destroys the hardware decoder object only, leaving surfaces and context attachment alone.
    fn close_decoder(&self);
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("no decoder configuration possible for {width}x{height} ({format})")]
    NoConfig {
        width: u32,
        height: u32,
        format: OutputFormat,
    },
    #[error("no decoder configuration takes a raw bitstream")]
    NoRawBitstream,
    #[error("no input/output format combination for {0:?}")]
    NoFormat(Codec),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Error, Debug)]
pub enum CreationError {
    #[error("failed to create the decoder texture array: {0}")]
    Texture(DeviceError),
    #[error("failed to create decode surface {slice}: {source}")]
    OutputView { slice: u32, source: DeviceError },
    #[error("failed to create the decoder: {0}")]
    Decoder(DeviceError),
}

#[derive(Default)]
struct Attachments {
    refcount: usize,
    owners: Vec<(SessionId, Weak<dyn DecoderOwner>)>,
}

pub struct DecodeContext {
    device: Arc<dyn VideoDevice>,
    adapter: AdapterInfo,
    profiles: Vec<ProfileGuid>,
    single_decoder: bool,
    attachments: Mutex<Attachments>,
    closed: AtomicBool,
}

impl DecodeContext {
    fn new(device: Arc<dyn VideoDevice>) -> DeviceResult<Self> {
        let adapter = device.adapter_info();
        let profiles = device.decoder_profiles()?;

        for guid in &profiles {
            match mode::find_mode(guid) {
                Some(mode) => log::debug!("supports '{}'", mode.name),
                None => log::debug!("supports {}", guid),
            }
        }

        let single_decoder = SINGLE_DECODER_RENDERERS
            .iter()
            .any(|r| adapter.renderer.contains(r));
        if single_decoder {
            log::info!(
                "'{}' can only run one decoder at a time",
                adapter.renderer
            );
        }

        Ok(Self {
            device,
            adapter,
            profiles,
            single_decoder,
            attachments: Default::default(),
            closed: AtomicBool::new(false),
        })
    }

    fn attachments(&self) -> MutexGuard<'_, Attachments> {
        self.attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn attach(&self, id: SessionId, owner: Weak<dyn DecoderOwner>) {
        let mut attachments = self.attachments();
        attachments.refcount += 1;
        if !attachments.owners.iter().any(|(o, _)| *o == id) {
            attachments.owners.push((id, owner));
        }
    }

    /// Returns the remaining number of references.
    fn detach(&self, id: SessionId) -> usize {
        let mut attachments = self.attachments();
        attachments.owners.retain(|(o, _)| *o != id);
        attachments.refcount = attachments.refcount.saturating_sub(1);
        attachments.refcount
    }

    pub fn device(&self) -> &Arc<dyn VideoDevice> {
        &self.device
    }

    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// Decode profiles the device reported when the context was created.
    pub fn profiles(&self) -> &[ProfileGuid] {
        &self.profiles
    }

    pub fn is_single_decoder(&self) -> bool {
        self.single_decoder
    }

    pub fn refcount(&self) -> usize {
        self.attachments().refcount
    }

    /// Whether the last session detached from this context.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Picks the decode mode, output format and configuration for `params`.
    ///
    /// Modes are tried in the order of [`DECODE_MODES`] and output formats in the order of
    /// [`RENDER_TARGETS`]. The first combination the device fully supports wins.
    pub fn negotiate_format(
        &self,
        params: &CodecParams,
    ) -> Result<(DecoderDesc, DecoderConfig, &'static DecodeMode), NegotiationError> {
        let high_bit_depth = params.is_high_bit_depth();

        for mode in DECODE_MODES {
            if mode.codec != Some(params.codec) || !self.profiles.contains(&mode.guid) {
                continue;
            }

            if !mode.profiles.accepts(params.profile) {
                log::debug!("unsupported profile {:?} for {}", params.profile, mode.name);
                continue;
            }

            log::debug!("trying '{}'", mode.name);
            for format in RENDER_TARGETS {
                if high_bit_depth && format < OutputFormat::P010 {
                    continue;
                }

                match self.device.check_decoder_format(&mode.guid, format) {
                    Ok(true) => (),
                    Ok(false) => {
                        log::info!("output format {} is not supported by '{}'", format, mode.name);
                        continue;
                    }
                    Err(e) => {
                        log::info!("failed to check output format {} of '{}': {}", format, mode.name, e);
                        continue;
                    }
                }

                let desc = DecoderDesc {
                    profile: mode.guid,
                    format,
                    width: params.coded_width,
                    height: params.coded_height,
                };

                match self.negotiate_config(&desc) {
                    Ok(config) => return Ok((desc, config, mode)),
                    Err(e) => log::debug!("'{}' with {}: {}", mode.name, format, e),
                }
            }
        }

        Err(NegotiationError::NoFormat(params.codec))
    }

    /// Picks the configuration to create decoders of `desc` with.
    ///
    /// The first configuration accepting a raw bitstream is used, unless one uses
    /// [`PREFERRED_BITSTREAM_RAW`].
    pub fn negotiate_config(&self, desc: &DecoderDesc) -> Result<DecoderConfig, NegotiationError> {
        let configs = self.device.decoder_configs(desc)?;
        if configs.is_empty() {
            return Err(NegotiationError::NoConfig {
                width: desc.width,
                height: desc.height,
                format: desc.format,
            });
        }

        let mut selected = DecoderConfig::default();
        for (i, config) in configs.iter().enumerate() {
            log::debug!(
                "config {}: bitstream type {}{}",
                i,
                config.bitstream_raw,
                if config.encryption == mode::guids::NO_ENCRYPT {
                    ""
                } else {
                    ", encrypted"
                }
            );

            if selected.bitstream_raw == 0 && config.bitstream_raw != 0 {
                selected = *config;
            }
            if selected.bitstream_raw != PREFERRED_BITSTREAM_RAW
                && config.bitstream_raw == PREFERRED_BITSTREAM_RAW
            {
                selected = *config;
            }
        }

        if selected.bitstream_raw == 0 {
            return Err(NegotiationError::NoRawBitstream);
        }

        Ok(selected)
    }

    /// Creates `count` decode surfaces for `desc`, with dimensions aligned to `alignment`.
    ///
    /// Either all surfaces are created or none: on failure every view created so far is released
    /// along with the texture array.
    pub fn create_surfaces(
        &self,
        desc: &DecoderDesc,
        count: u32,
        alignment: u32,
    ) -> Result<SurfaceArray, CreationError> {
        let resolution = Resolution::from((desc.width, desc.height)).align(alignment);
        let shader_sample = self.device.supports_shader_sample(desc.format);

        log::debug!(
            "allocating {} surfaces of {}x{} with format {}",
            count,
            resolution.width,
            resolution.height,
            desc.format
        );

        let texture = self
            .device
            .create_texture_array(
                desc.format,
                resolution.width,
                resolution.height,
                count,
                shader_sample,
            )
            .map_err(CreationError::Texture)?;

        let mut views = Vec::with_capacity(count as usize);
        for slice in 0..count {
            match self.device.create_output_view(texture, &desc.profile, slice) {
                Ok(view) => {
                    self.device.clear_view(view);
                    views.push(view);
                }
                Err(source) => {
                    log::error!("failed creating surfaces: {}", source);
                    for view in views {
                        self.device.release_view(view);
                    }
                    self.device.release_texture(texture);
                    return Err(CreationError::OutputView { slice, source });
                }
            }
        }

        Ok(SurfaceArray {
            texture,
            views,
            format: desc.format,
            resolution,
        })
    }

    /// Creates a decoder for the session `caller`.
    ///
    /// On a device limited to a single decoder, a failed attempt makes every other attached
    /// session give up its decoder, after which creation is retried once.
    pub fn create_decoder(
        &self,
        desc: &DecoderDesc,
        config: &DecoderConfig,
        caller: SessionId,
    ) -> Result<DecoderHandle, CreationError> {
        let err = match self.device.create_decoder(desc, config) {
            Ok(decoder) => return Ok(decoder),
            Err(e) => e,
        };

        if !self.single_decoder {
            log::error!("failed creating decoder: {}", err);
            return Err(CreationError::Decoder(err));
        }

        log::info!(
            "hw may not support multiple decoders, releasing existing ones ({})",
            err
        );
        // Evicted sessions take their own decoder lock, so the list is not held while calling
        // them.
        let owners: Vec<Arc<dyn DecoderOwner>> = self
            .attachments()
            .owners
            .iter()
            .filter(|(id, _)| *id != caller)
            .filter_map(|(_, owner)| owner.upgrade())
            .collect();
        for owner in owners {
            owner.close_decoder();
        }

        self.device.create_decoder(desc, config).map_err(|e| {
            log::error!("failed creating decoder: {}", e);
            CreationError::Decoder(e)
        })
    }
}

impl fmt::Debug for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeContext")
            .field("adapter", &self.adapter)
            .field("profiles", &self.profiles.len())
            .field("single_decoder", &self.single_decoder)
            .finish()
    }
}

/// Owner of the decode context of one device.
///
/// Sessions attach to the context when they open and detach when they close. The context is
/// created by the first attachment and forgotten with the last detachment.
pub struct ContextManager {
    device: Arc<dyn VideoDevice>,
    current: Mutex<Option<Arc<DecodeContext>>>,
}

impl ContextManager {
    pub fn new(device: Arc<dyn VideoDevice>) -> Self {
        Self {
            device,
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<DecodeContext>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn device(&self) -> &Arc<dyn VideoDevice> {
        &self.device
    }

    /// Attaches session `id` to the live context, creating it first if needed.
    pub fn ensure(
        &self,
        id: SessionId,
        owner: Weak<dyn DecoderOwner>,
    ) -> Result<Arc<DecodeContext>, DeviceError> {
        let mut current = self.lock();

        let context = match current.as_ref() {
            Some(context) => Arc::clone(context),
            None => {
                let context = Arc::new(DecodeContext::new(Arc::clone(&self.device))?);
                *current = Some(Arc::clone(&context));
                context
            }
        };

        context.attach(id, owner);
        Ok(context)
    }

    /// Detaches session `id` from `context`. The last detachment closes the context.
    pub fn release(&self, context: &Arc<DecodeContext>, id: SessionId) {
        let mut current = self.lock();
        if context.detach(id) > 0 {
            return;
        }

        log::info!("closing decoder context");
        context.closed.store(true, Ordering::Release);
        if current
            .as_ref()
            .map(|c| Arc::ptr_eq(c, context))
            .unwrap_or(false)
        {
            *current = None;
        }
    }

    /// Returns the live context, if any session is attached.
    pub fn current(&self) -> Option<Arc<DecodeContext>> {
        self.lock().clone()
    }
}
