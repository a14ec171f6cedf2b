// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Utility functions used by several parts of this crate.
//!
//! This module is for anything that doesn't fit into the other top-level modules. Try not to add
//! new code here unless it really doesn't belong anywhere else.

/// Rounds `value` up to the next multiple of `alignment`. An `alignment` of 0 or 1 leaves `value`
/// unchanged.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }

    value.div_ceil(alignment) * alignment
}

/// Size in 16x16 macroblocks of a dimension expressed in pixels.
pub fn macroblocks(pixels: u32) -> u32 {
    pixels.div_ceil(16)
}

/// Whether `width` can be decoded by third generation PureVideo (VP3) hardware.
///
/// These chips cannot decode H.264 at horizontal resolutions of 769-784, 849-864, 929-944,
/// 1009-1024, 1793-1808, 1873-1888, 1953-1968 and 2033-2048 pixels, which map to the macroblock
/// widths below.
pub fn is_vp3_compatible_width(width: u32) -> bool {
    const UNSUPPORTED_MB_WIDTHS: [u32; 8] = [49, 54, 59, 64, 113, 118, 123, 128];

    !UNSUPPORTED_MB_WIDTHS.contains(&macroblocks(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(1080, 16), 1088);
        assert_eq!(align_up(1088, 16), 1088);
        assert_eq!(align_up(720, 128), 768);
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(33, 0), 33);
    }

    #[test]
    fn test_vp3_widths() {
        assert!(is_vp3_compatible_width(1920));
        assert!(is_vp3_compatible_width(768));
        assert!(!is_vp3_compatible_width(769));
        assert!(!is_vp3_compatible_width(784));
        assert!(is_vp3_compatible_width(785));
        assert!(!is_vp3_compatible_width(2048));
    }
}
