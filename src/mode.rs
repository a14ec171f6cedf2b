// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Static description of the decode modes this crate knows about.
//!
//! [`DECODE_MODES`] lists every decode profile the platform may advertise. Entries that carry a
//! codec can be used for decoding, the others only exist so that capability enumeration can print
//! a human readable name. The table is ordered by preference: negotiation picks the first entry
//! that works.

use std::fmt;

use crate::Codec;
use crate::CodecProfile;
use crate::OutputFormat;

/// 128-bit identifier of a decode profile or of an encryption scheme.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProfileGuid(pub u128);

impl ProfileGuid {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProfileGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08X}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

impl fmt::Debug for ProfileGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

pub mod guids {
    use super::ProfileGuid;

    pub const MPEG2_MOCOMP: ProfileGuid =
        ProfileGuid::from_u128(0xe6a9f44b_61b0_4563_9ea4_63d2a3c6fe66);
    pub const MPEG2_IDCT: ProfileGuid =
        ProfileGuid::from_u128(0xbf22ad00_03ea_4690_8077_473346209b7e);
    pub const MPEG2_VLD: ProfileGuid =
        ProfileGuid::from_u128(0xee27417f_5e28_4e65_beea_1d26b508adc9);
    pub const MPEG1_VLD: ProfileGuid =
        ProfileGuid::from_u128(0x6f3ec719_3735_42cc_8063_65cc3cb36616);
    pub const MPEG2_AND_1_VLD: ProfileGuid =
        ProfileGuid::from_u128(0x86695f12_340e_4f04_9fd3_9253dd327460);

    pub const H264_MOCOMP_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be64_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_MOCOMP_FGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be65_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_IDCT_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be66_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_IDCT_FGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be67_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_VLD_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be68_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_VLD_FGT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be69_a0c7_11d3_b984_00c04f2e73c5);
    pub const H264_VLD_WITHFMOASO_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0xd5f04ff9_3418_45d8_9561_32a76aae2ddd);
    pub const H264_VLD_STEREO_PROGRESSIVE_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0xd79be8da_0cf1_4c81_b82a_69a4e236f43d);
    pub const H264_VLD_STEREO_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0xf9aaccbb_c2b6_4cfc_8779_5707b1760552);
    pub const H264_VLD_MULTIVIEW_NOFGT: ProfileGuid =
        ProfileGuid::from_u128(0x705b9d82_76cf_49d6_b7e6_ac8872db013c);
    pub const H264_VLD_NOFGT_FLASH: ProfileGuid =
        ProfileGuid::from_u128(0x4245f676_2bbc_4166_a0bb_54e7b849c380);

    pub const INTEL_H264_A: ProfileGuid =
        ProfileGuid::from_u128(0x604f8e64_4951_4c54_88fe_abd25c15b3d6);
    pub const INTEL_H264_C: ProfileGuid =
        ProfileGuid::from_u128(0x604f8e66_4951_4c54_88fe_abd25c15b3d6);
    /// Intel ClearVideo H.264 decoder.
    pub const INTEL_H264_E: ProfileGuid =
        ProfileGuid::from_u128(0x604f8e68_4951_4c54_88fe_abd25c15b3d6);
    pub const INTEL_VC1_E: ProfileGuid =
        ProfileGuid::from_u128(0xbcc5db6d_a2b6_4af0_ace4_adb1f787bc89);
    pub const INTEL_VC1_CLEARVIDEO_2: ProfileGuid =
        ProfileGuid::from_u128(0xe07ec519_e651_4cd6_ac84_1370cceec851);

    pub const WMV8_POSTPROC: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be80_a0c7_11d3_b984_00c04f2e73c5);
    pub const WMV8_MOCOMP: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be81_a0c7_11d3_b984_00c04f2e73c5);
    pub const WMV9_POSTPROC: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be90_a0c7_11d3_b984_00c04f2e73c5);
    pub const WMV9_MOCOMP: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be91_a0c7_11d3_b984_00c04f2e73c5);
    pub const WMV9_IDCT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81be94_a0c7_11d3_b984_00c04f2e73c5);

    pub const VC1_POSTPROC: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bea0_a0c7_11d3_b984_00c04f2e73c5);
    pub const VC1_MOCOMP: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bea1_a0c7_11d3_b984_00c04f2e73c5);
    pub const VC1_IDCT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bea2_a0c7_11d3_b984_00c04f2e73c5);
    pub const VC1_VLD: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bea3_a0c7_11d3_b984_00c04f2e73c5);
    pub const VC1_D2010: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bea4_a0c7_11d3_b984_00c04f2e73c5);

    pub const HEVC_VLD_MAIN: ProfileGuid =
        ProfileGuid::from_u128(0x5b11d51b_2f4c_4452_bcc3_09f2a1160cc0);
    pub const HEVC_VLD_MAIN10: ProfileGuid =
        ProfileGuid::from_u128(0x107af0e0_ef1a_4d19_aba8_67a163073d13);

    pub const VP9_VLD_PROFILE0: ProfileGuid =
        ProfileGuid::from_u128(0x463707f8_a1d0_4585_876d_83aa6d60b89e);
    pub const VP9_VLD_10BIT_PROFILE2: ProfileGuid =
        ProfileGuid::from_u128(0xa4c749ef_6ecf_48aa_8448_50a7a1165ff7);

    /// Encryption GUID of unencrypted bitstreams.
    pub const NO_ENCRYPT: ProfileGuid =
        ProfileGuid::from_u128(0x1b81bed0_a0c7_11d3_b984_00c04f2e73c5);
}

/// Codec profiles a decode mode accepts.
#[derive(Copy, Clone, Debug)]
pub enum ProfileSet {
    Any,
    Only(&'static [CodecProfile]),
}

impl ProfileSet {
    /// Whether a stream of `profile` can use this mode. Streams of unknown profile are accepted by
    /// every mode.
    pub fn accepts(&self, profile: CodecProfile) -> bool {
        match self {
            ProfileSet::Any => true,
            ProfileSet::Only(_) if profile == CodecProfile::Unknown => true,
            ProfileSet::Only(profiles) => profiles.contains(&profile),
        }
    }
}

/// A decode profile of the platform API, and which streams it can decode.
#[derive(Debug)]
pub struct DecodeMode {
    pub name: &'static str,
    pub guid: ProfileGuid,
    /// Codec this mode decodes, `None` for modes that are only named in logs.
    pub codec: Option<Codec>,
    pub profiles: ProfileSet,
    /// Maximum number of reference frames the mode is known to handle.
    pub max_refs: Option<u32>,
}

const fn mode(
    name: &'static str,
    guid: ProfileGuid,
    codec: Option<Codec>,
    profiles: ProfileSet,
) -> DecodeMode {
    DecodeMode {
        name,
        guid,
        codec,
        profiles,
        max_refs: None,
    }
}

const fn named(name: &'static str, guid: ProfileGuid) -> DecodeMode {
    mode(name, guid, None, ProfileSet::Any)
}

const PROFILES_MPEG2_MAIN: ProfileSet =
    ProfileSet::Only(&[CodecProfile::Mpeg2Simple, CodecProfile::Mpeg2Main]);
const PROFILES_H264_HIGH: ProfileSet = ProfileSet::Only(&[
    CodecProfile::H264Baseline,
    CodecProfile::H264ConstrainedBaseline,
    CodecProfile::H264Main,
    CodecProfile::H264High,
]);
const PROFILES_HEVC_MAIN: ProfileSet = ProfileSet::Only(&[CodecProfile::HevcMain]);
const PROFILES_HEVC_MAIN10: ProfileSet =
    ProfileSet::Only(&[CodecProfile::HevcMain, CodecProfile::HevcMain10]);
const PROFILES_VP9_0: ProfileSet = ProfileSet::Only(&[CodecProfile::Vp9Profile0]);
const PROFILES_VP9_10_2: ProfileSet = ProfileSet::Only(&[CodecProfile::Vp9Profile2]);

/// Known decode modes, preferred modes first.
pub static DECODE_MODES: &[DecodeMode] = &[
    mode(
        "MPEG2 variable-length decoder",
        guids::MPEG2_VLD,
        Some(Codec::Mpeg2),
        PROFILES_MPEG2_MAIN,
    ),
    mode(
        "MPEG1/2 variable-length decoder",
        guids::MPEG2_AND_1_VLD,
        Some(Codec::Mpeg2),
        PROFILES_MPEG2_MAIN,
    ),
    named("MPEG2 motion compensation", guids::MPEG2_MOCOMP),
    named("MPEG2 inverse discrete cosine transform", guids::MPEG2_IDCT),
    named("MPEG-1 variable-length decoder", guids::MPEG1_VLD),
    mode(
        "H.264 variable-length decoder, film grain technology",
        guids::H264_VLD_FGT,
        Some(Codec::H264),
        PROFILES_H264_HIGH,
    ),
    DecodeMode {
        name: "H.264 variable-length decoder, no film grain technology (Intel ClearVideo)",
        guid: guids::INTEL_H264_E,
        codec: Some(Codec::H264),
        profiles: PROFILES_H264_HIGH,
        max_refs: Some(11),
    },
    mode(
        "H.264 variable-length decoder, no film grain technology",
        guids::H264_VLD_NOFGT,
        Some(Codec::H264),
        PROFILES_H264_HIGH,
    ),
    mode(
        "H.264 variable-length decoder, no film grain technology, FMO/ASO",
        guids::H264_VLD_WITHFMOASO_NOFGT,
        Some(Codec::H264),
        PROFILES_H264_HIGH,
    ),
    mode(
        "H.264 variable-length decoder, no film grain technology, Flash",
        guids::H264_VLD_NOFGT_FLASH,
        Some(Codec::H264),
        PROFILES_H264_HIGH,
    ),
    named(
        "H.264 inverse discrete cosine transform, film grain technology",
        guids::H264_IDCT_FGT,
    ),
    named(
        "H.264 inverse discrete cosine transform, no film grain technology",
        guids::H264_IDCT_NOFGT,
    ),
    named(
        "H.264 inverse discrete cosine transform, no film grain technology (Intel)",
        guids::INTEL_H264_C,
    ),
    named(
        "H.264 motion compensation, film grain technology",
        guids::H264_MOCOMP_FGT,
    ),
    named(
        "H.264 motion compensation, no film grain technology",
        guids::H264_MOCOMP_NOFGT,
    ),
    named(
        "H.264 motion compensation, no film grain technology (Intel)",
        guids::INTEL_H264_A,
    ),
    named(
        "H.264 stereo high profile, mbs flag set",
        guids::H264_VLD_STEREO_PROGRESSIVE_NOFGT,
    ),
    named("H.264 stereo high profile", guids::H264_VLD_STEREO_NOFGT),
    named("H.264 multiview high profile", guids::H264_VLD_MULTIVIEW_NOFGT),
    named("Windows Media Video 8 motion compensation", guids::WMV8_MOCOMP),
    named("Windows Media Video 8 post processing", guids::WMV8_POSTPROC),
    named(
        "Windows Media Video 9 inverse discrete cosine transform",
        guids::WMV9_IDCT,
    ),
    named("Windows Media Video 9 motion compensation", guids::WMV9_MOCOMP),
    named("Windows Media Video 9 post processing", guids::WMV9_POSTPROC),
    mode(
        "VC-1 variable-length decoder",
        guids::VC1_VLD,
        Some(Codec::Vc1),
        ProfileSet::Any,
    ),
    mode(
        "VC-1 variable-length decoder",
        guids::VC1_VLD,
        Some(Codec::Wmv3),
        ProfileSet::Any,
    ),
    mode(
        "VC-1 variable-length decoder 2010",
        guids::VC1_D2010,
        Some(Codec::Vc1),
        ProfileSet::Any,
    ),
    mode(
        "VC-1 variable-length decoder 2010",
        guids::VC1_D2010,
        Some(Codec::Wmv3),
        ProfileSet::Any,
    ),
    named(
        "VC-1 variable-length decoder 2 (Intel)",
        guids::INTEL_VC1_CLEARVIDEO_2,
    ),
    named("VC-1 variable-length decoder (Intel)", guids::INTEL_VC1_E),
    named("VC-1 inverse discrete cosine transform", guids::VC1_IDCT),
    named("VC-1 motion compensation", guids::VC1_MOCOMP),
    named("VC-1 post processing", guids::VC1_POSTPROC),
    mode(
        "HEVC variable-length decoder, main",
        guids::HEVC_VLD_MAIN,
        Some(Codec::Hevc),
        PROFILES_HEVC_MAIN,
    ),
    mode(
        "HEVC variable-length decoder, main10",
        guids::HEVC_VLD_MAIN10,
        Some(Codec::Hevc),
        PROFILES_HEVC_MAIN10,
    ),
    mode(
        "VP9 variable-length decoder, Profile 0",
        guids::VP9_VLD_PROFILE0,
        Some(Codec::Vp9),
        PROFILES_VP9_0,
    ),
    mode(
        "VP9 variable-length decoder, 10bit, profile 2",
        guids::VP9_VLD_10BIT_PROFILE2,
        Some(Codec::Vp9),
        PROFILES_VP9_10_2,
    ),
];

/// Output formats we can render from, preferred formats first.
pub const RENDER_TARGETS: [OutputFormat; 3] =
    [OutputFormat::Nv12, OutputFormat::P010, OutputFormat::P016];

/// Looks up the first decode mode identified by `guid`.
pub fn find_mode(guid: &ProfileGuid) -> Option<&'static DecodeMode> {
    DECODE_MODES.iter().find(|m| m.guid == *guid)
}
