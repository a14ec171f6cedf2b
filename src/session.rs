// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Hardware decoder session of one stream.
//!
//! A [`DecoderSession`] attaches to the decode context of its device, negotiates a decoder for the
//! stream, allocates the decode surfaces and installs itself into the codec pipeline as buffer
//! allocator. It then turns every decoded frame into an [`OutputBuffer`] for the renderer.
//!
//! The session follows device state changes reported through its
//! [`DeviceResourceListener`]:
//!
//! * `Open`: decoding normally.
//! * `Lost`: the device went away, or the decoder ran out of surfaces. The next
//!   [`check`](DecoderSession::check) closes the decoder and waits for the device to come back.
//! * `Reset`: the device is usable again. The next check reopens the decoder with the new device.

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;

use thiserror::Error;

use crate::buffer_pool::OutputBuffer;
use crate::buffer_pool::OutputBufferPool;
use crate::compat::is_l41_limited_ati;
use crate::compat::CompatibilityPolicy;
use crate::compat::CompatibilityRejected;
use crate::compat::HardwareCaps;
use crate::context::ContextManager;
use crate::context::CreationError;
use crate::context::DecodeContext;
use crate::context::DecoderOwner;
use crate::context::NegotiationError;
use crate::context::SessionId;
use crate::device::DecodeStatusCode;
use crate::device::DecoderDesc;
use crate::device::DecoderHandle;
use crate::device::DeviceError;
use crate::device::VideoDevice;
use crate::device::PCI_VENDOR_ATI;
use crate::device::PCI_VENDOR_INTEL;
use crate::mode::guids;
use crate::pipeline::BufferAllocator;
use crate::pipeline::CodecParams;
use crate::pipeline::CodecPipeline;
use crate::pipeline::DecodedFrame;
use crate::pipeline::GetBufferError;
use crate::pipeline::HwAccelContext;
use crate::pipeline::VideoPicture;
use crate::pipeline::Workarounds;
use crate::render::DeinterlaceMethod;
use crate::render::DeviceResourceListener;
use crate::render::RenderCollaborator;
use crate::settings::Settings;
use crate::surface::SurfaceRegistry;
use crate::Codec;

/// Deinterlacing methods usable on our surfaces, the last one being the default.
const DEINTERLACE_METHODS: [DeinterlaceMethod; 2] =
    [DeinterlaceMethod::None, DeinterlaceMethod::HardwareAuto];

/// Collaborators and settings shared by all the sessions of a device.
#[derive(Clone)]
pub struct SessionEnv {
    pub contexts: Arc<ContextManager>,
    pub policy: Arc<CompatibilityPolicy>,
    pub render: Arc<dyn RenderCollaborator>,
    pub settings: Settings,
}

impl SessionEnv {
    /// Creates the environment of `device`, with the default compatibility rules.
    pub fn new(
        device: Arc<dyn VideoDevice>,
        render: Arc<dyn RenderCollaborator>,
        settings: Settings,
    ) -> Self {
        Self {
            contexts: Arc::new(ContextManager::new(device)),
            policy: Arc::new(CompatibilityPolicy::with_default_rules(&settings)),
            render,
            settings,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Open,
    Lost,
    Reset,
}

/// Outcome of a decode step, as reported to the codec pipeline.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VideoCodecStatus {
    /// Nothing to report, decoding can go on.
    Continue,
    NeedMoreData,
    /// A picture is ready to be fetched with [`DecoderSession::get_picture`].
    PictureReady,
    /// The decoder has been recreated, the pipeline must flush and resubmit.
    Flushed,
    /// Hardware decoding cannot continue for this stream.
    Error,
}

#[derive(Error, Debug)]
pub enum OpenError {
    #[error(transparent)]
    CompatibilityRejected(#[from] CompatibilityRejected),
    #[error("the device is lost")]
    DeviceLost,
    #[error("no decode context available: {0}")]
    ContextUnavailable(DeviceError),
    #[error(transparent)]
    NegotiationFailed(#[from] NegotiationError),
    #[error("too many references {refs} for selected decoder '{mode}'")]
    TooManyReferences { refs: u32, mode: &'static str },
    #[error("{count} surfaces exceed the limit of {max}")]
    TooManySurfaces { count: u32, max: u32 },
    #[error(transparent)]
    CreationFailed(#[from] CreationError),
}

/// Returns the number of reference surfaces and the surface alignment a stream needs.
fn reference_budget(params: &CodecParams) -> (u32, u32) {
    // One surface being decoded plus one for safety.
    let mut refs: u32 = 2;
    let mut alignment = 16;

    match params.codec {
        Codec::Mpeg2 => {
            // Some Intel GPUs need this for MPEG-2, but it breaks H.264 on some AMD GPUs.
            alignment = 32;
            refs += 4;
        }
        Codec::Hevc => {
            alignment = 128;
            refs += 16;
        }
        Codec::H264 => refs += 16,
        Codec::Vp9 => refs += 4,
        _ => refs += 2,
    }

    refs = refs.saturating_add(params.frame_threads);

    (refs.max(params.refs.saturating_add(2)), alignment)
}

struct SessionInner {
    state: SessionState,
    /// Cleared when the device is lost, set again once it has been reset.
    recovered: bool,
    context: Option<Arc<DecodeContext>>,
    /// Negotiated decoder, `None` while the session is closed.
    desc: Option<DecoderDesc>,
    refs: u32,
    pool: Option<Arc<OutputBufferPool>>,
    /// Last decoded picture, waiting to be fetched.
    held: Option<OutputBuffer>,
    workarounds: Workarounds,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            state: Default::default(),
            recovered: true,
            context: None,
            desc: None,
            refs: 0,
            pool: None,
            held: None,
            workarounds: Default::default(),
        }
    }
}

struct SessionShared {
    id: SessionId,
    env: SessionEnv,
    inner: Mutex<SessionInner>,
    recovery: Condvar,
    /// Kept apart from `inner` so the decoder can be evicted by other sessions. Always locked
    /// after `inner`.
    decoder: Mutex<Option<DecoderHandle>>,
    weak_self: Weak<SessionShared>,
}

impl SessionShared {
    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decoder_slot(&self) -> MutexGuard<'_, Option<DecoderHandle>> {
        self.decoder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decoder(&self) -> Option<DecoderHandle> {
        *self.decoder_slot()
    }

    fn device(&self) -> &Arc<dyn VideoDevice> {
        self.env.contexts.device()
    }

    fn destroy_decoder(&self) {
        let decoder = self.decoder_slot().take();
        if let Some(decoder) = decoder {
            self.device().destroy_decoder(decoder);
        }
    }

    fn close_locked(&self, inner: &mut SessionInner) {
        self.destroy_decoder();
        inner.held = None;
        inner.desc = None;

        if let Some(pool) = inner.pool.take() {
            pool.reset();
        }

        if let Some(context) = inner.context.take() {
            log::info!("closing decoder");
            self.env.contexts.release(&context, self.id);
        }
    }

    fn open_locked(
        &self,
        inner: &mut SessionInner,
        params: &CodecParams,
        pipeline: &mut dyn CodecPipeline,
    ) -> Result<(), OpenError> {
        let hw = HardwareCaps::from(&self.device().adapter_info());
        self.env.policy.check(&hw, params)?;

        self.close_locked(inner);

        if inner.state == SessionState::Lost {
            log::debug!("device is in lost state, we can't start");
            return Err(OpenError::DeviceLost);
        }

        log::debug!("open decoder");
        let owner: Weak<dyn DecoderOwner> = self.weak_self.clone();
        let context = self
            .env
            .contexts
            .ensure(self.id, owner)
            .map_err(OpenError::ContextUnavailable)?;
        inner.context = Some(Arc::clone(&context));

        let res = self.setup_decoder(inner, &context, params, pipeline);
        if res.is_err() {
            self.close_locked(inner);
        }
        res
    }

    fn setup_decoder(
        &self,
        inner: &mut SessionInner,
        context: &DecodeContext,
        params: &CodecParams,
        pipeline: &mut dyn CodecPipeline,
    ) -> Result<(), OpenError> {
        let (desc, config, mode) = context.negotiate_format(params).map_err(|e| {
            log::debug!("unable to find an input/output format combination: {}", e);
            e
        })?;

        log::debug!("selected output format {}", desc.format);
        log::debug!("source requires {} references", params.refs);
        if let Some(max_refs) = mode.max_refs {
            if params.refs > max_refs {
                log::warn!(
                    "too many references {} for selected decoder '{}'",
                    params.refs,
                    mode.name
                );
                return Err(OpenError::TooManyReferences {
                    refs: params.refs,
                    mode: mode.name,
                });
            }
        }

        let (refs, alignment) = reference_budget(params);
        let count = refs.saturating_add(self.env.settings.shared_surfaces);
        if count > self.env.settings.max_surfaces {
            return Err(OpenError::TooManySurfaces {
                count,
                max: self.env.settings.max_surfaces,
            });
        }

        let registry = SurfaceRegistry::create(context, &desc, count, alignment)?;
        let surfaces = registry.views();
        inner.pool = Some(Arc::new(OutputBufferPool::new(registry)));

        let decoder = context.create_decoder(&desc, &config, self.id)?;
        *self.decoder_slot() = Some(decoder);

        let workarounds = Self::workarounds_for(context, &desc);
        self.env
            .render
            .update_deinterlacing_methods(&DEINTERLACE_METHODS, DeinterlaceMethod::HardwareAuto);

        let allocator: Arc<dyn BufferAllocator> = Arc::new(SessionAllocator {
            session: self.weak_self.clone(),
        });
        pipeline.install_hw_accel(
            allocator,
            HwAccelContext {
                decoder,
                config,
                surfaces,
                workarounds,
            },
        );

        inner.desc = Some(desc);
        inner.refs = refs;
        inner.workarounds = workarounds;
        inner.state = SessionState::Open;

        Ok(())
    }

    fn workarounds_for(context: &DecodeContext, desc: &DecoderDesc) -> Workarounds {
        let adapter = context.adapter();
        let mut workarounds = Workarounds::default();

        if adapter.vendor_id == PCI_VENDOR_INTEL && desc.profile == guids::INTEL_H264_E {
            workarounds.intel_clear_video = true;
        } else if adapter.vendor_id == PCI_VENDOR_ATI
            && is_l41_limited_ati(&HardwareCaps::from(adapter))
        {
            workarounds.scaling_list_zigzag = true;
        }

        workarounds
    }

    fn check_locked<'a>(
        &'a self,
        mut inner: MutexGuard<'a, SessionInner>,
        params: &CodecParams,
        pipeline: &mut dyn CodecPipeline,
    ) -> (MutexGuard<'a, SessionInner>, VideoCodecStatus) {
        // Devices limited to one decoder may have given ours to another stream.
        if self.decoder().is_none() {
            return (inner, VideoCodecStatus::NeedMoreData);
        }

        if inner.state == SessionState::Reset {
            self.close_locked(&mut inner);
        }

        if inner.state == SessionState::Lost {
            self.close_locked(&mut inner);
            let (guard, _) = self
                .recovery
                .wait_timeout_while(inner, self.env.settings.recovery_timeout, |inner| {
                    !inner.recovered
                })
                .unwrap_or_else(PoisonError::into_inner);
            inner = guard;

            if inner.state == SessionState::Lost {
                log::error!("device didn't reset in reasonable time");
                return (inner, VideoCodecStatus::Error);
            }
        }

        if inner.desc.is_none() {
            if let Err(e) = self.open_locked(&mut inner, params, pipeline) {
                log::error!("decoder was not able to reset: {}", e);
                self.close_locked(&mut inner);
                return (inner, VideoCodecStatus::Error);
            }
            return (inner, VideoCodecStatus::Flushed);
        }

        if params.refs > inner.refs {
            log::warn!("number of required reference frames increased, recreating decoder");
            self.close_locked(&mut inner);
            return (inner, VideoCodecStatus::Flushed);
        }

        // Status reports are only available for H.264 and VC-1.
        if !matches!(params.codec, Codec::H264 | Codec::Vc1 | Codec::Wmv3) {
            return (inner, VideoCodecStatus::Continue);
        }

        let Some(decoder) = self.decoder() else {
            return (inner, VideoCodecStatus::Continue);
        };

        match self.device().query_decode_status(decoder, params.codec) {
            Ok(report) => {
                if report.status != 0 {
                    log::warn!(
                        "decoder problem of status {} ({:?}) with {}",
                        report.status,
                        DecodeStatusCode::n(report.status),
                        report.buffer_type
                    );
                }
                (inner, VideoCodecStatus::Continue)
            }
            Err(e) => {
                log::warn!("failed to get decoder status: {}", e);
                (inner, VideoCodecStatus::Error)
            }
        }
    }

    fn get_buffer(&self, frame: &mut DecodedFrame) -> Result<(), GetBufferError> {
        let mut inner = self.lock();
        if self.decoder().is_none() {
            return Err(GetBufferError::NoDecoder);
        }
        if inner.state != SessionState::Open {
            log::debug!("refusing surface while session is {:?}", inner.state);
            return Err(GetBufferError::DeviceLost);
        }

        let lease = match inner.pool.as_ref() {
            Some(pool) => pool.registry().acquire_free(),
            None => return Err(GetBufferError::NoDecoder),
        };

        match lease {
            Some(lease) => {
                frame.attach(lease);
                Ok(())
            }
            None => {
                log::error!("no surface available");
                inner.state = SessionState::Lost;
                Err(GetBufferError::ResourceExhausted)
            }
        }
    }
}

impl DecoderOwner for SessionShared {
    fn close_decoder(&self) {
        log::debug!("releasing decoder of session {:?}", self.id);
        self.destroy_decoder();
    }
}

impl DeviceResourceListener for SessionShared {
    fn on_device_lost(&self) {
        let mut inner = self.lock();
        inner.state = SessionState::Lost;
        inner.recovered = false;
    }

    fn on_device_destroyed(&self, fatal: bool) {
        log::debug!("device destroyed (fatal: {})", fatal);
        self.on_device_lost();
    }

    fn on_device_reset(&self) {
        let mut inner = self.lock();
        inner.state = SessionState::Reset;
        inner.recovered = true;
        self.recovery.notify_all();
    }

    fn on_device_created(&self) {
        self.on_device_reset();
    }
}

/// Buffer allocator installed into the codec pipeline.
struct SessionAllocator {
    session: Weak<SessionShared>,
}

impl BufferAllocator for SessionAllocator {
    fn get_buffer(
        &self,
        _params: &CodecParams,
        frame: &mut DecodedFrame,
    ) -> Result<(), GetBufferError> {
        match self.session.upgrade() {
            Some(session) => session.get_buffer(frame),
            None => Err(GetBufferError::SessionGone),
        }
    }
}

/// Hardware decoder of one stream. See the module documentation.
pub struct DecoderSession {
    shared: Arc<SessionShared>,
}

impl DecoderSession {
    pub fn new(env: SessionEnv) -> Self {
        let shared = Arc::new_cyclic(|weak_self| SessionShared {
            id: SessionId::new(),
            env,
            inner: Mutex::new(Default::default()),
            recovery: Condvar::new(),
            decoder: Mutex::new(None),
            weak_self: weak_self.clone(),
        });

        Self { shared }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    /// Opens a hardware decoder for `params` and installs it into `pipeline`.
    ///
    /// Any decoder previously opened by this session is closed first.
    pub fn open(
        &self,
        params: &CodecParams,
        pipeline: &mut dyn CodecPipeline,
    ) -> Result<(), OpenError> {
        let mut inner = self.shared.lock();
        self.shared.open_locked(&mut inner, params, pipeline)
    }

    /// Turns `frame`, freshly decoded by the codec pipeline, into the picture to fetch next.
    ///
    /// Frames that are not decoded into one of our surfaces are ignored.
    pub fn decode(
        &self,
        params: &CodecParams,
        frame: Option<&DecodedFrame>,
        pipeline: &mut dyn CodecPipeline,
    ) -> VideoCodecStatus {
        let inner = self.shared.lock();
        let (mut inner, status) = self.shared.check_locked(inner, params, pipeline);
        if status != VideoCodecStatus::Continue {
            return status;
        }

        let (Some(frame), Some(pool)) = (frame, inner.pool.clone()) else {
            return VideoCodecStatus::NeedMoreData;
        };

        let registry = pool.registry();
        if !frame.surface().map(|s| registry.is_valid(s)).unwrap_or(false) {
            log::warn!("ignoring invalid surface");
            return VideoCodecStatus::NeedMoreData;
        }

        inner.held = None;
        let resolution = registry.resolution();
        match pool.get(frame, registry.format(), resolution.width, resolution.height) {
            Some(buffer) => {
                inner.held = Some(buffer);
                VideoCodecStatus::PictureReady
            }
            None => {
                log::warn!("ignoring surface not lent to the decoder");
                VideoCodecStatus::NeedMoreData
            }
        }
    }

    /// Makes sure the decoder is usable for `params`, recreating it if needed.
    ///
    /// May block for up to the recovery timeout of the settings if the device was lost. The
    /// session lock is released while waiting.
    pub fn check(
        &self,
        params: &CodecParams,
        pipeline: &mut dyn CodecPipeline,
    ) -> VideoCodecStatus {
        let inner = self.shared.lock();
        self.shared.check_locked(inner, params, pipeline).1
    }

    /// Moves the last decoded picture into `picture`, dropping whatever buffer it held.
    pub fn get_picture(&self, picture: &mut VideoPicture) -> bool {
        picture.buffer = None;
        picture.buffer = self.shared.lock().held.take();

        let render = &self.shared.env.render;
        if render.render_buffers().free > 1 {
            render.request_decoding_time();
        } else {
            render.release_decoding_time();
        }

        true
    }

    /// Drops the picture waiting to be fetched, if any.
    pub fn reset(&self) {
        self.shared.lock().held = None;
    }

    /// Destroys the decoder and its surfaces, and detaches from the decode context.
    ///
    /// Output buffers still held by the renderer become invalid.
    pub fn close(&self) {
        let mut inner = self.shared.lock();
        self.shared.close_locked(&mut inner);
    }

    /// Flushes the pictures of `pipeline` if it still references our surfaces. Must be called
    /// before giving the session up.
    pub fn prepare_release(&self, pipeline: &mut dyn CodecPipeline) {
        let pool = self.shared.lock().pool.clone();
        if pool.map(|p| p.has_refs()).unwrap_or(false) {
            pipeline.flush_buffers();
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn workarounds(&self) -> Workarounds {
        self.shared.lock().workarounds
    }

    /// Number of surfaces reserved for the renderer on top of the decoder references.
    pub fn allowed_references(&self) -> u32 {
        self.shared.env.settings.shared_surfaces
    }

    /// Number of reference frames the open decoder was sized for.
    pub fn references(&self) -> u32 {
        self.shared.lock().refs
    }

    /// Number of decode surfaces of the open decoder, 0 if closed.
    pub fn surface_count(&self) -> usize {
        self.shared
            .lock()
            .pool
            .as_ref()
            .map(|p| p.registry().len())
            .unwrap_or(0)
    }

    /// Number of decode surfaces that can be handed to the codec library right now.
    pub fn free_surface_count(&self) -> usize {
        self.shared
            .lock()
            .pool
            .as_ref()
            .map(|p| p.registry().num_free())
            .unwrap_or(0)
    }

    pub fn has_decoder(&self) -> bool {
        self.shared.decoder().is_some()
    }

    /// Returns the listener the windowing layer must notify of device state changes.
    pub fn device_listener(&self) -> Arc<dyn DeviceResourceListener> {
        self.shared.clone()
    }
}

impl Drop for DecoderSession {
    fn drop(&mut self) {
        log::debug!("destructing decoder session {:?}", self.shared.id);
        self.close();
    }
}
