// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This file contains a dummy device, codec pipeline and renderer whose only purpose is to let
//! the decode layer run so we can test it in isolation.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use crate::device::AdapterInfo;
use crate::device::DecodeStatusReport;
use crate::device::DecoderConfig;
use crate::device::DecoderDesc;
use crate::device::DecoderHandle;
use crate::device::DeviceError;
use crate::device::DeviceResult;
use crate::device::TextureHandle;
use crate::device::VideoDevice;
use crate::device::ViewHandle;
use crate::mode::guids;
use crate::mode::ProfileGuid;
use crate::pipeline::BufferAllocator;
use crate::pipeline::CodecPipeline;
use crate::pipeline::HwAccelContext;
use crate::render::DeinterlaceMethod;
use crate::render::RenderBufferCounts;
use crate::render::RenderCollaborator;
use crate::Codec;
use crate::OutputFormat;

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Capabilities and failure points of a [`DummyDevice`].
#[derive(Clone, Debug)]
pub(crate) struct DummyCaps {
    pub adapter: AdapterInfo,
    pub profiles: Vec<ProfileGuid>,
    pub fail_profiles: bool,
    pub formats: Vec<OutputFormat>,
    pub configs: Vec<DecoderConfig>,
    pub shader_sample: bool,
    /// Creating the output view of this slice fails.
    pub fail_view_at: Option<u32>,
    pub fail_textures: bool,
    /// Decoder creation fails while this many decoders are alive.
    pub max_decoders: Option<usize>,
    pub fail_decoders: bool,
    pub status: DecodeStatusReport,
    pub fail_status_query: bool,
}

impl Default for DummyCaps {
    fn default() -> Self {
        Self {
            adapter: AdapterInfo {
                vendor_id: 0x1234,
                device_id: 0x5678,
                renderer: String::from("Dummy GPU"),
                platform: Default::default(),
            },
            profiles: vec![
                guids::MPEG2_VLD,
                guids::H264_VLD_NOFGT,
                guids::VC1_VLD,
                guids::HEVC_VLD_MAIN,
                guids::HEVC_VLD_MAIN10,
                guids::VP9_VLD_PROFILE0,
                guids::VP9_VLD_10BIT_PROFILE2,
            ],
            fail_profiles: false,
            formats: vec![OutputFormat::Nv12, OutputFormat::P010, OutputFormat::P016],
            configs: vec![
                DecoderConfig {
                    bitstream_raw: 1,
                    encryption: guids::NO_ENCRYPT,
                },
                DecoderConfig {
                    bitstream_raw: 2,
                    encryption: guids::NO_ENCRYPT,
                },
            ],
            shader_sample: true,
            fail_view_at: None,
            fail_textures: false,
            max_decoders: None,
            fail_decoders: false,
            status: Default::default(),
            fail_status_query: false,
        }
    }
}

#[derive(Default)]
struct DummyState {
    next_handle: u64,
    live_views: BTreeSet<u64>,
    live_textures: BTreeSet<u64>,
    live_decoders: BTreeSet<u64>,
    cleared_views: usize,
    decoder_attempts: usize,
    profile_queries: usize,
    last_texture: Option<(OutputFormat, u32, u32, u32, bool)>,
}

impl DummyState {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub(crate) struct DummyDevice {
    caps: Mutex<DummyCaps>,
    state: Mutex<DummyState>,
}

impl DummyDevice {
    pub(crate) fn new(caps: DummyCaps) -> Arc<Self> {
        Arc::new(Self {
            caps: Mutex::new(caps),
            state: Default::default(),
        })
    }

    pub(crate) fn update_caps(&self, f: impl FnOnce(&mut DummyCaps)) {
        f(&mut self.caps.lock().unwrap())
    }

    fn caps(&self) -> DummyCaps {
        self.caps.lock().unwrap().clone()
    }

    pub(crate) fn live_views(&self) -> usize {
        self.state.lock().unwrap().live_views.len()
    }

    pub(crate) fn live_textures(&self) -> usize {
        self.state.lock().unwrap().live_textures.len()
    }

    pub(crate) fn live_decoders(&self) -> usize {
        self.state.lock().unwrap().live_decoders.len()
    }

    pub(crate) fn cleared_views(&self) -> usize {
        self.state.lock().unwrap().cleared_views
    }

    pub(crate) fn decoder_attempts(&self) -> usize {
        self.state.lock().unwrap().decoder_attempts
    }

    pub(crate) fn profile_queries(&self) -> usize {
        self.state.lock().unwrap().profile_queries
    }

    /// Format, width, height, count and shader-sample flag of the last texture array created.
    pub(crate) fn last_texture(&self) -> Option<(OutputFormat, u32, u32, u32, bool)> {
        self.state.lock().unwrap().last_texture
    }
}

impl VideoDevice for DummyDevice {
    fn adapter_info(&self) -> AdapterInfo {
        self.caps().adapter
    }

    fn decoder_profiles(&self) -> DeviceResult<Vec<ProfileGuid>> {
        self.state.lock().unwrap().profile_queries += 1;
        let caps = self.caps();
        if caps.fail_profiles {
            return Err(DeviceError::Failed {
                call: "decoder_profiles",
                code: 0x887a0005,
            });
        }
        Ok(caps.profiles)
    }

    fn check_decoder_format(
        &self,
        profile: &ProfileGuid,
        format: OutputFormat,
    ) -> DeviceResult<bool> {
        let caps = self.caps();
        Ok(caps.profiles.contains(profile) && caps.formats.contains(&format))
    }

    fn decoder_configs(&self, _desc: &DecoderDesc) -> DeviceResult<Vec<DecoderConfig>> {
        Ok(self.caps().configs)
    }

    fn supports_shader_sample(&self, _format: OutputFormat) -> bool {
        self.caps().shader_sample
    }

    fn create_texture_array(
        &self,
        format: OutputFormat,
        width: u32,
        height: u32,
        count: u32,
        shader_sample: bool,
    ) -> DeviceResult<TextureHandle> {
        if self.caps().fail_textures {
            return Err(DeviceError::Failed {
                call: "create_texture_array",
                code: 0x8007000e,
            });
        }

        let mut state = self.state.lock().unwrap();
        let handle = state.next();
        state.live_textures.insert(handle);
        state.last_texture = Some((format, width, height, count, shader_sample));
        Ok(TextureHandle(handle))
    }

    fn create_output_view(
        &self,
        texture: TextureHandle,
        _profile: &ProfileGuid,
        slice: u32,
    ) -> DeviceResult<ViewHandle> {
        if self.caps().fail_view_at == Some(slice) {
            return Err(DeviceError::Failed {
                call: "create_output_view",
                code: 0x80070057,
            });
        }

        let mut state = self.state.lock().unwrap();
        if !state.live_textures.contains(&texture.0) {
            return Err(anyhow::anyhow!("unknown texture {:?}", texture).into());
        }
        let handle = state.next();
        state.live_views.insert(handle);
        Ok(ViewHandle(handle))
    }

    fn clear_view(&self, _view: ViewHandle) {
        self.state.lock().unwrap().cleared_views += 1;
    }

    fn release_view(&self, view: ViewHandle) {
        let removed = self.state.lock().unwrap().live_views.remove(&view.0);
        assert!(removed, "view {:?} released twice", view);
    }

    fn release_texture(&self, texture: TextureHandle) {
        let removed = self.state.lock().unwrap().live_textures.remove(&texture.0);
        assert!(removed, "texture {:?} released twice", texture);
    }

    fn create_decoder(
        &self,
        _desc: &DecoderDesc,
        _config: &DecoderConfig,
    ) -> DeviceResult<DecoderHandle> {
        let caps = self.caps();
        let mut state = self.state.lock().unwrap();
        state.decoder_attempts += 1;

        let limit_reached = caps
            .max_decoders
            .map(|max| state.live_decoders.len() >= max)
            .unwrap_or(false);
        if caps.fail_decoders || limit_reached {
            return Err(DeviceError::Failed {
                call: "create_decoder",
                code: 0x80004005,
            });
        }

        let handle = state.next();
        state.live_decoders.insert(handle);
        Ok(DecoderHandle(handle))
    }

    fn destroy_decoder(&self, decoder: DecoderHandle) {
        let removed = self.state.lock().unwrap().live_decoders.remove(&decoder.0);
        assert!(removed, "decoder {:?} destroyed twice", decoder);
    }

    fn query_decode_status(
        &self,
        _decoder: DecoderHandle,
        _codec: Codec,
    ) -> DeviceResult<DecodeStatusReport> {
        let caps = self.caps();
        if caps.fail_status_query {
            return Err(DeviceError::DeviceRemoved);
        }
        Ok(caps.status)
    }
}

/// Codec pipeline that only remembers what was installed into it.
#[derive(Default)]
pub(crate) struct DummyPipeline {
    pub allocator: Option<Arc<dyn BufferAllocator>>,
    pub context: Option<HwAccelContext>,
    pub flushes: usize,
}

impl CodecPipeline for DummyPipeline {
    fn install_hw_accel(&mut self, allocator: Arc<dyn BufferAllocator>, context: HwAccelContext) {
        self.allocator = Some(allocator);
        self.context = Some(context);
    }

    fn flush_buffers(&mut self) {
        self.flushes += 1;
    }
}

#[derive(Default)]
struct DummyRenderState {
    counts: RenderBufferCounts,
    requests: usize,
    releases: usize,
    deinterlacing: Vec<DeinterlaceMethod>,
    default_deinterlacing: Option<DeinterlaceMethod>,
}

#[derive(Default)]
pub(crate) struct DummyRender {
    state: Mutex<DummyRenderState>,
}

impl DummyRender {
    pub(crate) fn set_counts(&self, counts: RenderBufferCounts) {
        self.state.lock().unwrap().counts = counts;
    }

    pub(crate) fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub(crate) fn releases(&self) -> usize {
        self.state.lock().unwrap().releases
    }

    pub(crate) fn deinterlacing(&self) -> (Vec<DeinterlaceMethod>, Option<DeinterlaceMethod>) {
        let state = self.state.lock().unwrap();
        (state.deinterlacing.clone(), state.default_deinterlacing)
    }
}

impl RenderCollaborator for DummyRender {
    fn render_buffers(&self) -> RenderBufferCounts {
        self.state.lock().unwrap().counts
    }

    fn request_decoding_time(&self) {
        self.state.lock().unwrap().requests += 1;
    }

    fn release_decoding_time(&self) {
        self.state.lock().unwrap().releases += 1;
    }

    fn update_deinterlacing_methods(
        &self,
        methods: &[DeinterlaceMethod],
        default: DeinterlaceMethod,
    ) {
        let mut state = self.state.lock().unwrap();
        state.deinterlacing = methods.to_vec();
        state.default_deinterlacing = Some(default);
    }
}
