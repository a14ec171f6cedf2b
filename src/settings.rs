// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::time::Duration;

/// User and advanced settings of the hardware decode layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Whether hardware decoding may be used at all.
    pub enabled: bool,
    /// Forces the H.264 level 4.1 compatibility check on or off. When `None`, the check is enabled
    /// only on hardware known to be limited to level 4.1.
    pub check_compatibility: Option<bool>,
    /// How long a session waits for the device to come back after a loss.
    pub recovery_timeout: Duration,
    /// Number of surfaces reserved for the video processor and the present queue, on top of the
    /// reference frames.
    pub shared_surfaces: u32,
    /// Maximum number of surfaces a session may allocate.
    pub max_surfaces: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            check_compatibility: None,
            recovery_timeout: Duration::from_millis(2000),
            shared_surfaces: 7,
            max_surfaces: 64,
        }
    }
}
