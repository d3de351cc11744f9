// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - lookup.rs
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

//! Sensor-specific value lookup tables applied by `PixelBuffer::do_lookup`.

use crate::utils::lcg_step_lookup;
use crate::{clamp16, Error, PixelBuffer, Result};

/// A value lookup table descriptor.
///
/// Only a single table (`ntables == 1`) is supported; constructing with
/// more is legal (so callers can describe what the decoder actually gave
/// them) but `do_lookup` rejects it with [`Error::Unimplemented`].
#[derive(Debug, Clone)]
pub enum LookupTable {
    /// Plain `u16 -> u16` tables: `tables[i][sample]` replaces `sample`.
    Direct(Vec<Vec<u16>>),
    /// Dithered tables: each `u32` entry packs `base` (low 16 bits) and
    /// `delta` (high 16 bits), linearly interpolated with a triangular
    /// per-pixel dither.
    Dithered(Vec<Vec<u32>>),
}

impl LookupTable {
    pub fn ntables(&self) -> usize {
        match self {
            LookupTable::Direct(t) => t.len(),
            LookupTable::Dithered(t) => t.len(),
        }
    }

    pub fn dither(&self) -> bool {
        matches!(self, LookupTable::Dithered(_))
    }
}

impl PixelBuffer {
    /// Apply the attached lookup table to uncropped rows `[y0, y1)`, over
    /// the full uncropped row width `uncropped_dim.width * cpp`.
    ///
    /// With no table attached this is a no-op. A table with `ntables != 1`
    /// fails with [`Error::Unimplemented`].
    pub fn do_lookup(&mut self, y0: u32, y1: u32) -> Result<()> {
        let Some(table) = self.table.clone() else {
            return Ok(());
        };
        if table.ntables() != 1 {
            return Err(Error::Unimplemented);
        }

        let gw = self.uncropped_dim.width * self.cpp;
        let stride = self.row_stride();

        match table {
            LookupTable::Direct(tables) => {
                let t = &tables[0];
                for y in y0..y1 {
                    let row_start = (y * stride) as usize;
                    let row = &mut self.data[row_start..row_start + gw as usize];
                    for p in row.iter_mut() {
                        *p = t[*p as usize];
                    }
                }
            }
            LookupTable::Dithered(tables) => {
                let t = &tables[0];
                for y in y0..y1 {
                    let mut v = (self.uncropped_dim.width.wrapping_add(y.wrapping_mul(13)))
                        ^ 0x4569_4584;
                    let row_start = (y * stride) as usize;
                    let row = &mut self.data[row_start..row_start + gw as usize];
                    for p in row.iter_mut() {
                        let lookup = t[*p as usize];
                        let base = lookup & 0xffff;
                        let delta = lookup >> 16;
                        v = lcg_step_lookup(v);
                        let frac = (v & 2047) as i64;
                        let out = base as i64 + ((delta as i64 * frac + 1024) >> 12);
                        *p = clamp16(out);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::LookupTable;
    use crate::geometry::Size;
    use crate::{Error, PixelBuffer};

    #[test]
    fn test_direct_lookup_remaps_samples() {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 2,
                height: 1,
            },
            1,
        );
        buf.uncropped_pixel_mut(0, 0)[0] = 10;
        buf.uncropped_pixel_mut(1, 0)[0] = 20;
        let mut table = vec![0u16; 65536];
        table[10] = 111;
        table[20] = 222;
        buf.set_table(Some(LookupTable::Direct(vec![table])));
        buf.do_lookup(0, 1).unwrap();
        assert_eq!(buf.uncropped_pixel(0, 0)[0], 111);
        assert_eq!(buf.uncropped_pixel(1, 0)[0], 222);
    }

    #[test]
    fn test_direct_lookup_is_idempotent_for_fixed_point() {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 1,
                height: 1,
            },
            1,
        );
        buf.uncropped_pixel_mut(0, 0)[0] = 42;
        let mut table: Vec<u16> = (0..65536u32).map(|v| v as u16).collect();
        table[42] = 42; // fixed point: t[t[p]] == t[p]
        buf.set_table(Some(LookupTable::Direct(vec![table])));
        buf.do_lookup(0, 1).unwrap();
        let first = buf.uncropped_pixel(0, 0)[0];
        buf.do_lookup(0, 1).unwrap();
        assert_eq!(buf.uncropped_pixel(0, 0)[0], first);
    }

    #[test]
    fn test_dithered_lookup_matches_reference_recurrence() {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 1,
                height: 1,
            },
            1,
        );
        buf.uncropped_pixel_mut(0, 0)[0] = 0x1234;
        let mut table = vec![0u32; 65536];
        table[0x1234] = 0x0010_4000; // base = 0x4000, delta = 0x0010
        buf.set_table(Some(LookupTable::Dithered(vec![table])));
        buf.do_lookup(0, 1).unwrap();

        let mut v: u32 = (1u32 ^ 0x4569_4584) | 0; // uncropped width=1, y=0
        v = 15700u32.wrapping_mul(v & 0xffff).wrapping_add(v >> 16);
        let expected = 0x4000 + (((0x10u32 as i64) * (v & 2047) as i64 + 1024) >> 12) as u32;
        assert_eq!(buf.uncropped_pixel(0, 0)[0] as u32, expected);
    }

    #[test]
    fn test_multi_table_is_unimplemented() {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 1,
                height: 1,
            },
            1,
        );
        buf.set_table(Some(LookupTable::Direct(vec![
            vec![0u16; 65536],
            vec![0u16; 65536],
        ])));
        assert_eq!(buf.do_lookup(0, 1), Err(Error::Unimplemented));
    }
}
