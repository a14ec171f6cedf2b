// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Deny-list of streams known to misbehave on specific hardware.
//!
//! A [`CompatibilityPolicy`] is an ordered list of [`CompatibilityRule`]s, each of which may veto
//! hardware decoding of a stream on a given [`HardwareCaps`]. A vetoed stream is decoded in
//! software by the caller.

use thiserror::Error;

use crate::device::AdapterInfo;
use crate::device::PlatformFamily;
use crate::device::PCI_VENDOR_ATI;
use crate::device::PCI_VENDOR_NVIDIA;
use crate::pipeline::CodecParams;
use crate::pipeline::ColorMatrix;
use crate::pipeline::ColorPrimaries;
use crate::pipeline::TransferCharacteristic;
use crate::settings::Settings;
use crate::utils;
use crate::Codec;
use crate::CodecProfile;

/// PCI device IDs of ATI cards with a UVD or UVD+ decoding block, limited to H.264 level 4.1.
pub const UVD_DEVICE_IDS: [u32; 12] = [
    0x95c0, // Radeon HD 3400 Series (and others)
    0x95c5, // Radeon HD 3400 Series (and others)
    0x95c4, // Radeon HD 3400 Series (and others)
    0x94c3, // Radeon HD 3410
    0x9589, // Radeon HD 3600 Series (and others)
    0x9598, // Radeon HD 3600 Series (and others)
    0x9591, // Radeon HD 3600 Series (and others)
    0x9501, // Radeon HD 3800 Series (and others)
    0x9505, // Radeon HD 3800 Series (and others)
    0x9507, // Radeon HD 3830
    0x9513, // Radeon HD 3850 X2
    0x950f, // Radeon HD 3850 X2
];

/// PCI device IDs of NVIDIA cards with the VP3 macroblock width issue.
pub const VP3_DEVICE_IDS: [u32; 45] = [
    0x06e0, // GeForce 9300 GE
    0x06e1, // GeForce 9300 GS
    0x06e2, // GeForce 8400
    0x06e4, // GeForce 8400 GS
    0x06e5, // GeForce 9300M GS
    0x06e6, // GeForce G100
    0x06e8, // GeForce 9200M GS
    0x06e9, // GeForce 9300M GS
    0x06ec, // GeForce G 105M
    0x06ef, // GeForce G 103M
    0x06f1, // GeForce G105M
    0x0844, // GeForce 9100M G
    0x0845, // GeForce 8200M G
    0x0846, // GeForce 9200
    0x0847, // GeForce 9100
    0x0848, // GeForce 8300
    0x0849, // GeForce 8200
    0x084a, // nForce 730a
    0x084b, // GeForce 9200
    0x084c, // nForce 980a/780a SLI
    0x084d, // nForce 750a SLI
    0x0860, // GeForce 9400
    0x0861, // GeForce 9400
    0x0862, // GeForce 9400M G
    0x0863, // GeForce 9400M
    0x0864, // GeForce 9300
    0x0865, // ION
    0x0866, // GeForce 9400M G
    0x0867, // GeForce 9400
    0x0868, // nForce 760i SLI
    0x086a, // GeForce 9400
    0x086c, // GeForce 9300 / nForce 730i
    0x086d, // GeForce 9200
    0x086e, // GeForce 9100M G
    0x086f, // GeForce 8200M G
    0x0870, // GeForce 9400M
    0x0871, // GeForce 9200
    0x0872, // GeForce G102M
    0x0873, // GeForce G102M
    0x0874, // ION
    0x0876, // ION
    0x087a, // GeForce 9400
    0x087d, // ION
    0x087e, // ION LE
    0x087f, // ION LE
];

/// Decoded picture buffer capacity of H.264 level 4.1, in macroblocks.
const L41_MAX_DPB_MBS: u32 = 32768;

/// What the rules know about the hardware.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HardwareCaps {
    pub vendor_id: u32,
    pub device_id: u32,
    pub platform: PlatformFamily,
    pub renderer: String,
}

impl From<&AdapterInfo> for HardwareCaps {
    fn from(adapter: &AdapterInfo) -> Self {
        Self {
            vendor_id: adapter.vendor_id,
            device_id: adapter.device_id,
            platform: adapter.platform,
            renderer: adapter.renderer.clone(),
        }
    }
}

/// Whether `hw` is an ATI card whose UVD block cannot decode H.264 beyond level 4.1.
pub fn is_l41_limited_ati(hw: &HardwareCaps) -> bool {
    hw.vendor_id == PCI_VENDOR_ATI && UVD_DEVICE_IDS.contains(&hw.device_id)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rule}: {reason}")]
pub struct CompatibilityRejected {
    pub rule: &'static str,
    pub reason: String,
}

pub trait CompatibilityRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns why `params` must not be decoded on `hw`, or `None` if it may.
    fn veto(&self, hw: &HardwareCaps, params: &CodecParams) -> Option<String>;
}

/// UHD HEVC Main10 crashes Xbox One S/X.
pub struct XboxUhdHevcMain10;

impl CompatibilityRule for XboxUhdHevcMain10 {
    fn name(&self) -> &'static str {
        "xbox-uhd-hevc-main10"
    }

    fn veto(&self, hw: &HardwareCaps, params: &CodecParams) -> Option<String> {
        if hw.platform != PlatformFamily::Xbox
            || params.codec != Codec::Hevc
            || params.profile != CodecProfile::HevcMain10
            || params.height <= 1080
            || params.width <= 1920
        {
            return None;
        }

        Some(String::from("UHD HEVC Main10 is not supported on Xbox"))
    }
}

/// AMD/ATI cards choke on some SD MPEG-2 content of a particular colorimetry.
pub struct AtiMpeg2Sd;

impl CompatibilityRule for AtiMpeg2Sd {
    fn name(&self) -> &'static str {
        "ati-mpeg2-sd"
    }

    fn veto(&self, hw: &HardwareCaps, params: &CodecParams) -> Option<String> {
        let color = &params.color;
        let affected = hw.vendor_id == PCI_VENDOR_ATI
            && params.codec == Codec::Mpeg2
            && params.height <= 576
            && color.matrix == ColorMatrix::Bt470bg
            && color.primaries == ColorPrimaries::Bt470bg
            && color.transfer == TransferCharacteristic::Gamma28;

        affected.then(|| String::from("BT.470BG SD MPEG-2 is broken on AMD/ATI hardware"))
    }
}

pub struct NvidiaVp3Width;

impl CompatibilityRule for NvidiaVp3Width {
    fn name(&self) -> &'static str {
        "nvidia-vp3-width"
    }

    fn veto(&self, hw: &HardwareCaps, params: &CodecParams) -> Option<String> {
        if params.codec != Codec::H264
            || hw.vendor_id != PCI_VENDOR_NVIDIA
            || utils::is_vp3_compatible_width(params.coded_width)
            || !VP3_DEVICE_IDS.contains(&hw.device_id)
        {
            return None;
        }

        Some(format!(
            "width {} is not supported with NVIDIA VP3 hardware",
            params.coded_width
        ))
    }
}

/// Hardware limited to H.264 level 4.1, i.e. Blu-ray streams.
pub struct H264Level41 {
    /// Forces the check on or off. When `None` it only runs on known limited hardware.
    pub check: Option<bool>,
}

impl CompatibilityRule for H264Level41 {
    fn name(&self) -> &'static str {
        "h264-level-4.1"
    }

    fn veto(&self, hw: &HardwareCaps, params: &CodecParams) -> Option<String> {
        if params.codec != Codec::H264 {
            return None;
        }

        let enabled = self.check.unwrap_or_else(|| is_l41_limited_ati(hw));
        if !enabled {
            return None;
        }

        let width_mbs = utils::macroblocks(params.coded_width);
        let height_mbs = utils::macroblocks(params.coded_height);
        let dpb_mbs = u64::from(params.refs) * u64::from(width_mbs) * u64::from(height_mbs);
        if dpb_mbs <= u64::from(L41_MAX_DPB_MBS) {
            return None;
        }

        Some(format!(
            "{} references at {}x{} exceed level 4.1",
            params.refs, params.coded_width, params.coded_height
        ))
    }
}

/// Ordered list of rules, the first veto wins.
#[derive(Default)]
pub struct CompatibilityPolicy {
    rules: Vec<Box<dyn CompatibilityRule>>,
}

impl CompatibilityPolicy {
    /// Creates a policy without any rule, which accepts every stream.
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_default_rules(settings: &Settings) -> Self {
        let mut policy = Self::new();
        policy.push(XboxUhdHevcMain10);
        policy.push(AtiMpeg2Sd);
        policy.push(NvidiaVp3Width);
        policy.push(H264Level41 {
            check: settings.check_compatibility,
        });
        policy
    }

    pub fn push(&mut self, rule: impl CompatibilityRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn check(&self, hw: &HardwareCaps, params: &CodecParams) -> Result<(), CompatibilityRejected> {
        for rule in &self.rules {
            if let Some(reason) = rule.veto(hw, params) {
                log::warn!("{}. Hardware decoding will not be used.", reason);
                return Err(CompatibilityRejected {
                    rule: rule.name(),
                    reason,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ColorProperties;

    fn hw(vendor_id: u32, device_id: u32) -> HardwareCaps {
        HardwareCaps {
            vendor_id,
            device_id,
            ..Default::default()
        }
    }

    fn policy() -> CompatibilityPolicy {
        CompatibilityPolicy::with_default_rules(&Settings::default())
    }

    fn rejected_by(result: Result<(), CompatibilityRejected>) -> Option<&'static str> {
        result.err().map(|e| e.rule)
    }

    #[test]
    fn test_xbox_uhd_hevc_main10() {
        let mut params = CodecParams::new(Codec::Hevc, 3840, 2160);
        params.profile = CodecProfile::HevcMain10;
        let xbox = HardwareCaps {
            platform: PlatformFamily::Xbox,
            ..hw(0x1002, 0x1234)
        };

        assert_eq!(
            rejected_by(policy().check(&xbox, &params)),
            Some("xbox-uhd-hevc-main10")
        );
        assert!(policy().check(&hw(0x1002, 0x1234), &params).is_ok());

        params.width = 1920;
        assert!(policy().check(&xbox, &params).is_ok());
        params.width = 3840;
        params.profile = CodecProfile::HevcMain;
        assert!(policy().check(&xbox, &params).is_ok());
    }

    #[test]
    fn test_ati_mpeg2_sd() {
        let mut params = CodecParams::new(Codec::Mpeg2, 720, 576);
        params.color = ColorProperties {
            matrix: ColorMatrix::Bt470bg,
            primaries: ColorPrimaries::Bt470bg,
            transfer: TransferCharacteristic::Gamma28,
        };

        assert_eq!(
            rejected_by(policy().check(&hw(PCI_VENDOR_ATI, 0x6798), &params)),
            Some("ati-mpeg2-sd")
        );
        assert!(policy().check(&hw(PCI_VENDOR_NVIDIA, 0x6798), &params).is_ok());

        params.color.transfer = TransferCharacteristic::Bt709;
        assert!(policy().check(&hw(PCI_VENDOR_ATI, 0x6798), &params).is_ok());

        params.color.transfer = TransferCharacteristic::Gamma28;
        params.height = 720;
        assert!(policy().check(&hw(PCI_VENDOR_ATI, 0x6798), &params).is_ok());
    }

    #[test]
    fn test_nvidia_vp3_width() {
        let ion = hw(PCI_VENDOR_NVIDIA, 0x0865);
        let params = CodecParams::new(Codec::H264, 1024, 576);

        assert_eq!(
            rejected_by(policy().check(&ion, &params)),
            Some("nvidia-vp3-width")
        );
        assert!(policy()
            .check(&ion, &CodecParams::new(Codec::H264, 1280, 720))
            .is_ok());
        assert!(policy()
            .check(&hw(PCI_VENDOR_NVIDIA, 0x1b80), &params)
            .is_ok());
        assert!(policy()
            .check(&ion, &CodecParams::new(Codec::Mpeg2, 1024, 576))
            .is_ok());
    }

    #[test]
    fn test_h264_level_41() {
        let uvd = hw(PCI_VENDOR_ATI, 0x95c4);
        assert!(is_l41_limited_ati(&uvd));

        // 1920x1088 is 8160 macroblocks, level 4.1 holds 4 such frames.
        let mut params = CodecParams::new(Codec::H264, 1920, 1080);
        params.coded_height = 1088;
        params.refs = 4;
        assert!(policy().check(&uvd, &params).is_ok());

        params.refs = 5;
        assert_eq!(
            rejected_by(policy().check(&uvd, &params)),
            Some("h264-level-4.1")
        );

        // Not autodetected on other hardware...
        let other = hw(PCI_VENDOR_ATI, 0x6798);
        assert!(!is_l41_limited_ati(&other));
        assert!(policy().check(&other, &params).is_ok());

        // ... unless forced by the user, who can also turn it off.
        let forced = Settings {
            check_compatibility: Some(true),
            ..Default::default()
        };
        assert!(CompatibilityPolicy::with_default_rules(&forced)
            .check(&other, &params)
            .is_err());
        let disabled = Settings {
            check_compatibility: Some(false),
            ..Default::default()
        };
        assert!(CompatibilityPolicy::with_default_rules(&disabled)
            .check(&uvd, &params)
            .is_ok());
    }

    struct RejectAll;

    impl CompatibilityRule for RejectAll {
        fn name(&self) -> &'static str {
            "reject-all"
        }

        fn veto(&self, _hw: &HardwareCaps, _params: &CodecParams) -> Option<String> {
            Some(String::from("rejected"))
        }
    }

    #[test]
    fn test_rules_run_in_order() {
        let mut policy = CompatibilityPolicy::new();
        assert!(policy.is_empty());
        assert!(policy
            .check(&hw(0, 0), &CodecParams::new(Codec::H264, 1024, 576))
            .is_ok());

        policy.push(NvidiaVp3Width);
        policy.push(RejectAll);
        assert_eq!(policy.len(), 2);

        let params = CodecParams::new(Codec::H264, 1024, 576);
        assert_eq!(
            rejected_by(policy.check(&hw(PCI_VENDOR_NVIDIA, 0x0865), &params)),
            Some("nvidia-vp3-width")
        );
        assert_eq!(
            rejected_by(policy.check(&hw(0, 0), &params)),
            Some("reject-all")
        );
    }
}
