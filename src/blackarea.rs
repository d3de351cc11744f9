// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - blackarea.rs
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

//! Masked sensor strips used to measure black levels per CFA phase.

use crate::{Error, PixelBuffer, Result};

/// A masked strip of the uncropped sensor, used to measure black level.
///
/// A horizontal strip spans the full width at rows `[offset, offset+size)`;
/// a vertical strip spans the full height at columns `[offset, offset+size)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlackArea {
    pub is_vertical: bool,
    pub offset: u32,
    pub size: u32,
}

impl BlackArea {
    pub fn new(is_vertical: bool, offset: u32, size: u32) -> Self {
        BlackArea {
            is_vertical,
            offset,
            size,
        }
    }
}

impl PixelBuffer {
    /// Compute `black_level_separate`, one value per 2x2 CFA phase, from
    /// the configured black areas.
    ///
    /// With no black areas, falls back to the scalar `black_level` for all
    /// four phases. Otherwise takes, per phase, the value at the rank
    /// `total_pixels / 8` of that phase's histogram (a quarter of the
    /// samples contributed, `/4`, then the median of that quarter, `/2` —
    /// this exact rank is the reference implementation's, not an
    /// approximation).
    pub fn calculate_black_areas(&mut self) -> Result<()> {
        let mut histogram = vec![[0u32; 65536]; 4];
        let mut total_pixels: u64 = 0;

        let uncropped = self.uncropped_dim();

        for area in self.black_areas.clone() {
            // Round the strip down to an even size so each phase gets an
            // equal share of samples.
            let size = area.size & !1;
            if size == 0 {
                continue;
            }

            if !area.is_vertical {
                if area.offset + size > uncropped.height {
                    return Err(Error::InvalidBlackArea);
                }
                for y in area.offset..area.offset + size {
                    for x in 0..uncropped.width {
                        let phase = ((x & 1) | ((y & 1) << 1)) as usize;
                        let value = self.uncropped_pixel(x, y)[0];
                        histogram[phase][value as usize] += 1;
                    }
                }
                total_pixels += size as u64 * uncropped.width as u64;
            } else {
                if area.offset + size > uncropped.width {
                    return Err(Error::InvalidBlackArea);
                }
                for y in 0..uncropped.height {
                    for x in area.offset..area.offset + size {
                        let phase = ((x & 1) | ((y & 1) << 1)) as usize;
                        let value = self.uncropped_pixel(x, y)[0];
                        histogram[phase][value as usize] += 1;
                    }
                }
                total_pixels += size as u64 * uncropped.height as u64;
            }
        }

        if total_pixels == 0 {
            self.black_level_separate = [self.black_level; 4];
            return Ok(());
        }

        let target_rank = total_pixels / 8;
        for phase in 0..4 {
            let mut acc: u64 = 0;
            let mut value: i32 = 0;
            loop {
                acc += histogram[phase][value as usize] as u64;
                if acc > target_rank || value == 65535 {
                    break;
                }
                value += 1;
            }
            self.black_level_separate[phase] = value;
        }

        if !self.is_cfa {
            let total: i32 = self.black_level_separate.iter().sum();
            let mean = (total + 2) >> 2;
            self.black_level_separate = [mean; 4];
        }

        Ok(())
    }
}
