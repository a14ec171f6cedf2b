// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Registration of the hardware decoder with the host codec factory.

use std::collections::BTreeMap;

use crate::pipeline::PipelineFormat;
use crate::session::DecoderSession;
use crate::session::SessionEnv;

/// Key the decoder is registered under.
pub const HWACCEL_NAME: &str = "dxva";

/// Creates a hardware decoder for streams negotiated to a pixel format, if possible.
pub type HwAccelFactory = fn(&SessionEnv, PipelineFormat) -> Option<DecoderSession>;

/// Whether a provider can decode into a given pixel format.
pub type HwAccelPredicate = fn(PipelineFormat) -> bool;

#[derive(Copy, Clone)]
struct Provider {
    supports: HwAccelPredicate,
    create: HwAccelFactory,
}

/// Hardware decoder providers known to the host codec factory, by name.
#[derive(Default)]
pub struct HwAccelRegistry {
    providers: BTreeMap<&'static str, Provider>,
}

impl HwAccelRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a provider under `name`, replacing any previous one.
    pub fn register(
        &mut self,
        name: &'static str,
        supports: HwAccelPredicate,
        create: HwAccelFactory,
    ) {
        if self
            .providers
            .insert(name, Provider { supports, create })
            .is_some()
        {
            log::warn!("replacing hardware decoder provider '{}'", name);
        }
    }

    /// Whether provider `name` exists and can decode into `format`.
    pub fn supports(&self, name: &str, format: PipelineFormat) -> bool {
        self.providers
            .get(name)
            .map(|p| (p.supports)(format))
            .unwrap_or(false)
    }

    pub fn create(
        &self,
        name: &str,
        env: &SessionEnv,
        format: PipelineFormat,
    ) -> Option<DecoderSession> {
        let provider = self.providers.get(name)?;
        if !(provider.supports)(format) {
            return None;
        }

        (provider.create)(env, format)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}

/// Only opaque hardware surfaces can be decoded into.
pub fn supports(format: PipelineFormat) -> bool {
    format == PipelineFormat::HwSurface
}

/// Creates a session, unless hardware decoding has been disabled by the user.
pub fn create(env: &SessionEnv, format: PipelineFormat) -> Option<DecoderSession> {
    if !env.settings.enabled {
        log::debug!("hardware decoding is disabled");
        return None;
    }

    if !supports(format) {
        return None;
    }

    Some(DecoderSession::new(env.clone()))
}

pub fn register(registry: &mut HwAccelRegistry) {
    registry.register(HWACCEL_NAME, supports, create);
}
