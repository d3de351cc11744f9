// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - pixelbuffer.rs
 *
 * Copyright (C) 2022-2024 Hubert Figuière
 *
 * This library is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This library is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this library.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! The owned 16-bit mosaic pixel buffer this crate operates on.

use crate::blackarea::BlackArea;
use crate::geometry::{Point, Size};
use crate::lookup::LookupTable;

/// An owned, row-major buffer of unsigned 16-bit sensor samples,
/// together with the metadata the post-processing pipeline needs:
/// cropped/uncropped geometry, CFA phase offset, black/white levels,
/// black-area strips, a bad-pixel bitmap and an optional lookup table.
#[derive(Debug, Default)]
pub struct PixelBuffer {
    /// Cropped, visible dimensions in pixels.
    pub(crate) dim: Size,
    /// Full sensor dimensions, including masked borders.
    pub(crate) uncropped_dim: Size,
    /// Components per pixel: 1 for Bayer/monochrome, >1 for already
    /// demosaicked or multi-plane data.
    pub(crate) cpp: u32,
    /// Bytes between consecutive rows. Always `>= uncropped_dim.width * cpp * 2`.
    pub(crate) pitch: u32,
    /// Origin of the visible area inside the uncropped buffer; also fixes
    /// CFA phase parity.
    pub(crate) offset: Point,
    /// Whether the image obeys a 2x2 mosaic phase structure.
    pub(crate) is_cfa: bool,
    /// Row-major sample storage, `uncropped_dim.height` rows of `pitch / 2`
    /// u16 samples each.
    pub(crate) data: Vec<u16>,
    /// Scalar black level. `-1` means unset/estimate.
    pub(crate) black_level: i32,
    /// Per-CFA-phase black level, scan order (TL, TR, BL, BR). Any entry
    /// `< 0` means unset.
    pub(crate) black_level_separate: [i32; 4],
    /// Saturation point. `>= 65536` means "estimate".
    pub(crate) white_point: u32,
    /// Masked strips used to measure black.
    pub(crate) black_areas: Vec<BlackArea>,
    /// Bad-pixel bitmap: one bit per uncropped pixel, packed LSB-first,
    /// row stride `bad_pixel_map_pitch`.
    pub(crate) bad_pixel_map: Vec<u8>,
    pub(crate) bad_pixel_map_pitch: u32,
    /// Whether the scaler should dither.
    pub(crate) dither: bool,
    /// Optional value lookup table applied by `do_lookup`.
    pub(crate) table: Option<LookupTable>,
}

impl PixelBuffer {
    /// Create a new buffer of `dim` cropped pixels (equal to the uncropped
    /// dimensions, no masked border) with `cpp` components per pixel, zero
    /// filled, tightly packed and with unset black/white levels.
    pub fn new_u16(dim: Size, cpp: u32) -> Self {
        let pitch = dim.width * cpp * 2;
        let data_len = (pitch / 2 * dim.height) as usize;
        let bad_pixel_map_pitch = (dim.width + 7) / 8;
        PixelBuffer {
            dim,
            uncropped_dim: dim,
            cpp,
            pitch,
            offset: Point::default(),
            is_cfa: cpp == 1,
            data: vec![0; data_len],
            black_level: -1,
            black_level_separate: [-1; 4],
            white_point: 65536,
            black_areas: Vec::new(),
            bad_pixel_map: vec![0; (bad_pixel_map_pitch * dim.height) as usize],
            bad_pixel_map_pitch,
            dither: false,
            table: None,
        }
    }

    /// Create a new buffer like [`Self::new_u16`] but with an explicit row
    /// `pitch` in bytes, for callers whose storage is padded wider than the
    /// tightly-packed default (e.g. to keep the SIMD kernel's 16-byte loads
    /// aligned when `dim.width` isn't a multiple of 8 samples).
    ///
    /// `pitch` must be at least `dim.width * cpp * 2`.
    pub fn with_pitch(dim: Size, cpp: u32, pitch: u32) -> Self {
        assert!(
            pitch >= dim.width * cpp * 2,
            "pitch {pitch} too small for {} samples of {cpp} components",
            dim.width
        );
        let mut buf = Self::new_u16(dim, cpp);
        buf.pitch = pitch;
        let data_len = (buf.row_stride() * dim.height) as usize;
        buf.data = vec![0; data_len];
        buf
    }

    /// Cropped, visible dimensions.
    pub fn dim(&self) -> Size {
        self.dim
    }

    /// Full sensor dimensions.
    pub fn uncropped_dim(&self) -> Size {
        self.uncropped_dim
    }

    /// Components per pixel.
    pub fn cpp(&self) -> u32 {
        self.cpp
    }

    /// Origin of the cropped area inside the uncropped buffer.
    pub fn offset(&self) -> Point {
        self.offset
    }

    /// Row pitch, in u16 samples (not bytes).
    pub fn row_stride(&self) -> u32 {
        self.pitch / 2
    }

    pub fn is_cfa(&self) -> bool {
        self.is_cfa
    }

    pub fn set_is_cfa(&mut self, is_cfa: bool) {
        self.is_cfa = is_cfa;
    }

    pub fn black_level(&self) -> i32 {
        self.black_level
    }

    pub fn set_black_level(&mut self, black_level: i32) {
        self.black_level = black_level;
    }

    pub fn black_level_separate(&self) -> [i32; 4] {
        self.black_level_separate
    }

    pub fn set_black_level_separate(&mut self, levels: [i32; 4]) {
        self.black_level_separate = levels;
    }

    pub fn white_point(&self) -> u32 {
        self.white_point
    }

    pub fn set_white_point(&mut self, white_point: u32) {
        self.white_point = white_point;
    }

    pub fn black_areas(&self) -> &[BlackArea] {
        &self.black_areas
    }

    pub fn set_black_areas(&mut self, areas: Vec<BlackArea>) {
        self.black_areas = areas;
    }

    pub fn dither(&self) -> bool {
        self.dither
    }

    pub fn set_dither(&mut self, dither: bool) {
        self.dither = dither;
    }

    pub fn table(&self) -> Option<&LookupTable> {
        self.table.as_ref()
    }

    pub fn set_table(&mut self, table: Option<LookupTable>) {
        self.table = table;
    }

    /// Set the offset of the cropped area inside the uncropped buffer and
    /// grow the uncropped dimensions / storage to fit.
    ///
    /// Used when a decoder reports the sensor's masked border separately
    /// from the visible crop.
    pub fn set_uncropped(&mut self, uncropped_dim: Size, offset: Point) {
        self.uncropped_dim = uncropped_dim;
        self.offset = offset;
        self.pitch = uncropped_dim.width * self.cpp * 2;
        let data_len = (self.row_stride() * uncropped_dim.height) as usize;
        self.data.resize(data_len, 0);
        let map_pitch = (uncropped_dim.width + 7) / 8;
        self.bad_pixel_map_pitch = map_pitch;
        self.bad_pixel_map
            .resize((map_pitch * uncropped_dim.height) as usize, 0);
    }

    /// Raw sample storage, row-major, `uncropped_dim.height` rows of
    /// `row_stride()` samples.
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    /// Index of the first sample of uncropped row `y`.
    #[inline]
    pub(crate) fn uncropped_row_offset(&self, y: u32) -> usize {
        (y * self.row_stride()) as usize
    }

    /// Fetch the samples (one per component) at uncropped coordinates `(x, y)`.
    #[inline]
    pub(crate) fn uncropped_pixel(&self, x: u32, y: u32) -> &[u16] {
        let start = self.uncropped_row_offset(y) + (x * self.cpp) as usize;
        &self.data[start..start + self.cpp as usize]
    }

    #[inline]
    pub(crate) fn uncropped_pixel_mut(&mut self, x: u32, y: u32) -> &mut [u16] {
        let start = self.uncropped_row_offset(y) + (x * self.cpp) as usize;
        &mut self.data[start..start + self.cpp as usize]
    }

    /// Mark uncropped pixel `(x, y)` as bad (or good) in the defect bitmap.
    pub fn set_bad_pixel(&mut self, x: u32, y: u32, bad: bool) {
        let idx = (y * self.bad_pixel_map_pitch + (x >> 3)) as usize;
        let bit = 1u8 << (x & 7);
        if bad {
            self.bad_pixel_map[idx] |= bit;
        } else {
            self.bad_pixel_map[idx] &= !bit;
        }
    }

    /// Whether uncropped pixel `(x, y)` is flagged defective.
    #[inline]
    pub(crate) fn is_bad_pixel(&self, x: u32, y: u32) -> bool {
        let idx = (y * self.bad_pixel_map_pitch + (x >> 3)) as usize;
        (self.bad_pixel_map[idx] >> (x & 7)) & 1 != 0
    }
}

#[cfg(test)]
mod test {
    use super::PixelBuffer;
    use crate::geometry::Size;

    #[test]
    fn test_new_u16_is_zeroed_and_unset() {
        let buf = PixelBuffer::new_u16(
            Size {
                width: 4,
                height: 3,
            },
            1,
        );
        assert_eq!(buf.dim().width, 4);
        assert_eq!(buf.dim().height, 3);
        assert_eq!(buf.data().len(), 12);
        assert!(buf.data().iter().all(|&v| v == 0));
        assert_eq!(buf.black_level(), -1);
        assert_eq!(buf.black_level_separate(), [-1; 4]);
        assert_eq!(buf.white_point(), 65536);
    }

    #[test]
    fn test_with_pitch_pads_row_stride() {
        let buf = PixelBuffer::with_pitch(
            Size {
                width: 5,
                height: 2,
            },
            1,
            32,
        );
        assert_eq!(buf.row_stride(), 16);
        assert_eq!(buf.data().len(), 32);
    }

    #[test]
    #[should_panic]
    fn test_with_pitch_rejects_too_narrow_pitch() {
        PixelBuffer::with_pitch(
            Size {
                width: 5,
                height: 2,
            },
            1,
            4,
        );
    }

    #[test]
    fn test_bad_pixel_roundtrip() {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 16,
                height: 4,
            },
            1,
        );
        assert!(!buf.is_bad_pixel(5, 2));
        buf.set_bad_pixel(5, 2, true);
        assert!(buf.is_bad_pixel(5, 2));
        buf.set_bad_pixel(5, 2, false);
        assert!(!buf.is_bad_pixel(5, 2));
    }
}
