// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - scale.rs
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

//! Linear black/white rescaling of the cropped region into the full
//! 16-bit range, with optional triangular dither.
//!
//! `scale_values` is the row-range kernel the worker dispatches; a
//! hand-vectorized SSE2 body handles the (common, non-dithered) case
//! where the reference fixed-point rounding is cheap to replicate
//! exactly, and falls back to the scalar kernel otherwise.

use crate::utils::lcg_step_scale;
use crate::{clamp16, PixelBuffer, Result, Worker};

impl PixelBuffer {
    /// Orchestrate black/white scaling: estimate black/white if needed,
    /// skip entirely if there's nothing to do, run the black-area
    /// analyzer if separate black levels aren't set, then dispatch
    /// `scale_values` over `[0, dim.height)` through `worker`.
    pub fn scale_black_white(&mut self, worker: &dyn Worker) -> Result<()> {
        const SKIP_BORDER: u32 = 250;

        let needs_estimate = (self.black_areas.is_empty()
            && self.black_level_separate[0] < 0
            && self.black_level < 0)
            || self.white_point >= 65536;

        if needs_estimate {
            let dim = self.dim;
            let cpp = self.cpp;
            let gw = if dim.width > SKIP_BORDER {
                (dim.width - SKIP_BORDER) * cpp
            } else {
                0
            };
            let mut black = 65536i64;
            let mut white = 0i64;
            let mut scanned = false;
            if dim.height > 2 * SKIP_BORDER {
                for row in SKIP_BORDER..dim.height - SKIP_BORDER {
                    // NB: indexes at `skip_border + col`, which on top of the
                    // loop already starting at `col = skip_border` skips the
                    // left border twice and narrows the scanned region more
                    // than the 250-pixel margin alone would. Preserved
                    // verbatim: it is part of the estimator's contract.
                    let row_start = self.uncropped_row_offset(self.offset.y + row);
                    for col in SKIP_BORDER..gw {
                        // `col` is already a sample column (it was built from
                        // `(dim.width - SKIP_BORDER) * cpp`), so index the
                        // sample directly rather than through
                        // `uncropped_pixel`, which would multiply by `cpp`
                        // again and run past the row for `cpp > 1`.
                        let pixel = self.data[row_start + (self.offset.x * cpp + SKIP_BORDER + col) as usize];
                        black = black.min(pixel as i64);
                        white = white.max(pixel as i64);
                        scanned = true;
                    }
                }
            }
            // An empty interior (e.g. `dim.x <= 500`) leaves nothing to
            // measure; fall back to the same "no scaling needed" defaults
            // the skip-path check below uses, rather than propagating the
            // unset sentinels (which would divide by zero downstream).
            if self.black_level < 0 {
                self.black_level = if scanned { black as i32 } else { 0 };
            }
            if self.white_point >= 65536 {
                self.white_point = if scanned { white as u32 } else { 65535 };
            }
            log::info!(
                "Estimated black:{}, Estimated white: {}",
                self.black_level,
                self.white_point
            );
        }

        let skip = (self.black_areas.is_empty()
            && self.black_level == 0
            && self.white_point == 65535
            && self.black_level_separate[0] < 0)
            || self.dim.area() == 0;
        if skip {
            return Ok(());
        }

        if self.black_level_separate[0] < 0 {
            self.calculate_black_areas()?;
        }

        let height = self.dim.height;
        // `scale_values` takes `&mut self` but the worker wants a `Fn` it can
        // call from multiple threads. `Worker` guarantees disjoint row
        // ranges, so concurrent calls never touch the same rows; `SyncPtr`
        // just tells the compiler what that contract already promises.
        let ptr = SyncPtr(self as *mut PixelBuffer);
        worker.dispatch(height, &move |y0, y1| {
            // SAFETY: `worker` guarantees disjoint, non-overlapping [y0, y1)
            // row ranges covering [0, height) exactly once, and `scale_values`
            // only ever touches rows in its own range.
            unsafe { (*ptr.0).scale_values(y0, y1) };
        });

        Ok(())
    }

    /// Row-range kernel: rescale cropped rows `[y0, y1)` from
    /// `[black, white]` into `[0, 65535]`, with optional dither.
    pub fn scale_values(&mut self, y0: u32, y1: u32) {
        let depth = self.white_point as i64 - self.black_level_separate[0] as i64;
        let app_scale = 65535.0_f64 / depth as f64;

        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if !self.dither && app_scale < 63.0 && is_x86_feature_detected!("sse2") {
                // SAFETY: feature checked above.
                unsafe { self.scale_values_sse2(y0, y1) };
                return;
            }
        }

        self.scale_values_scalar(y0, y1);
    }

    fn phase_tables(&self) -> ([i64; 4], [i64; 4]) {
        let ox = self.offset.x;
        let oy = self.offset.y;
        let mut mul = [0i64; 4];
        let mut sub = [0i64; 4];
        for (i, (m, s)) in mul.iter_mut().zip(sub.iter_mut()).enumerate() {
            let mut v = i;
            if ox & 1 != 0 {
                v ^= 1;
            }
            if oy & 1 != 0 {
                v ^= 2;
            }
            let black = self.black_level_separate[v] as i64;
            let depth = self.white_point as i64 - black;
            *m = (16384.0_f64 * 65535.0_f64 / depth as f64).floor() as i64;
            *s = black;
        }
        (mul, sub)
    }

    /// The normative scalar kernel. See module docs and the data model
    /// invariants: every cropped sample ends up in `[0, 65535]`.
    fn scale_values_scalar(&mut self, y0: u32, y1: u32) {
        let depth = self.white_point as i64 - self.black_level_separate[0] as i64;
        let app_scale = 65535.0_f64 / depth as f64;
        let full_scale_fp = (app_scale * 4.0).floor() as i64;
        let half_scale_fp = (app_scale * 4095.0).floor() as i64;

        let (mul, sub) = self.phase_tables();
        let gw = self.dim.width * self.cpp;
        let stride = self.row_stride();
        let ox = self.offset.x;
        let oy = self.offset.y;
        let dither = self.dither;
        let w = self.dim.width;

        for y in y0..y1 {
            let mut v: u32 = w.wrapping_add(y.wrapping_mul(36969));
            let row_start = ((y + oy) * stride + ox * self.cpp) as usize;
            let row = &mut self.data[row_start..row_start + gw as usize];
            let phase_row = ((y & 1) * 2) as usize;
            for (x, p) in row.iter_mut().enumerate() {
                let phase = phase_row + (x as u32 & 1) as usize;
                let rand = if dither {
                    v = lcg_step_scale(v);
                    half_scale_fp - full_scale_fp * (v & 2047) as i64
                } else {
                    0
                };
                let value = ((*p as i64 - sub[phase]) * mul[phase] + 8192 + rand) >> 14;
                *p = clamp16(value);
            }
        }
    }

    /// SSE2 kernel for the non-dithered case: 8 u16 samples per 128-bit
    /// register. Only called when `!self.dither`; dithered scaling always
    /// takes the scalar path (the SIMD PRNG in the reference implementation
    /// is a genuinely different, vectorized random stream, not a bit-exact
    /// parallelization of the scalar LCG, so there is nothing for this
    /// kernel to match bit-for-bit there).
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[target_feature(enable = "sse2")]
    unsafe fn scale_values_sse2(&mut self, y0: u32, y1: u32) {
        #[cfg(target_arch = "x86")]
        use std::arch::x86::*;
        #[cfg(target_arch = "x86_64")]
        use std::arch::x86_64::*;

        debug_assert!(!self.dither);

        let ox = self.offset.x;
        let oy = self.offset.y;

        // 64-byte scratch: sub/mul packed two-u16-per-u32 for even and odd
        // lines, 4 identical copies each so a 16-byte aligned load broadcasts
        // the value across all four 32-bit lanes.
        let mut scratch = AlignedScratch([0u32; 16]);

        let mul_at = |black: i64| -> u32 {
            let depth = self.white_point as i64 - black;
            (1024.0_f64 * 65535.0_f64 / depth as f64) as u32
        };

        let sub_even = self.black_level_separate[(ox & 1) as usize] as u32
            | (self.black_level_separate[((ox + 1) & 1) as usize] as u32) << 16;
        let mul_even = mul_at(self.black_level_separate[(ox & 1) as usize] as i64)
            | mul_at(self.black_level_separate[((ox + 1) & 1) as usize] as i64) << 16;
        let sub_odd = self.black_level_separate[(2 + (ox & 1)) as usize] as u32
            | (self.black_level_separate[(2 + ((ox + 1) & 1)) as usize] as u32) << 16;
        let mul_odd = mul_at(self.black_level_separate[(2 + (ox & 1)) as usize] as i64)
            | mul_at(self.black_level_separate[(2 + ((ox + 1) & 1)) as usize] as i64) << 16;

        for i in 0..4 {
            scratch.0[i] = sub_even;
            scratch.0[4 + i] = mul_even;
            scratch.0[8 + i] = sub_odd;
            scratch.0[12 + i] = mul_odd;
        }

        let sseround = _mm_set1_epi32(512);
        let ssesub2 = _mm_set1_epi32(32768);
        let ssesign = _mm_set1_epi32(0x8000_8000u32 as i32);

        let gw = self.dim.width * self.cpp;
        let stride = self.row_stride();
        let lanes = (gw / 8) * 8;

        for y in y0..y1 {
            let row_start = ((y + oy) * stride + ox * self.cpp) as usize;

            let (ssesub, ssescale) = if (y + oy) & 1 == 0 {
                (
                    _mm_load_si128(scratch.0.as_ptr() as *const __m128i),
                    _mm_load_si128(scratch.0.as_ptr().add(4) as *const __m128i),
                )
            } else {
                (
                    _mm_load_si128(scratch.0.as_ptr().add(8) as *const __m128i),
                    _mm_load_si128(scratch.0.as_ptr().add(12) as *const __m128i),
                )
            };

            let mut x = 0u32;
            while x < lanes {
                let ptr = self.data.as_mut_ptr().add(row_start + x as usize) as *mut __m128i;
                let mut pix_low = _mm_loadu_si128(ptr);
                pix_low = _mm_subs_epu16(pix_low, ssesub);
                let pix_high = _mm_mulhi_epu16(pix_low, ssescale);
                let temp = _mm_mullo_epi16(pix_low, ssescale);
                let mut lo32 = _mm_unpacklo_epi16(temp, pix_high);
                let mut hi32 = _mm_unpackhi_epi16(temp, pix_high);
                lo32 = _mm_add_epi32(lo32, sseround);
                hi32 = _mm_add_epi32(hi32, sseround);
                lo32 = _mm_srai_epi32(lo32, 10);
                hi32 = _mm_srai_epi32(hi32, 10);
                lo32 = _mm_sub_epi32(lo32, ssesub2);
                hi32 = _mm_sub_epi32(hi32, ssesub2);
                let mut packed = _mm_packs_epi32(lo32, hi32);
                packed = _mm_xor_si128(packed, ssesign);
                _mm_storeu_si128(ptr, packed);
                x += 8;
            }
        }

        if lanes < gw {
            self.scale_values_tail_scalar(y0, y1, lanes, gw);
        }
    }

    /// Scalar cleanup for the `gw % 8 != 0` remainder of a row the SSE2
    /// kernel can't fill with a full 128-bit load.
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    fn scale_values_tail_scalar(&mut self, y0: u32, y1: u32, from: u32, gw: u32) {
        let (mul, sub) = self.phase_tables();
        let stride = self.row_stride();
        let ox = self.offset.x;
        let oy = self.offset.y;

        for y in y0..y1 {
            let row_start = ((y + oy) * stride + ox * self.cpp) as usize;
            let phase_row = ((y & 1) * 2) as usize;
            for x in from..gw {
                let phase = phase_row + (x & 1) as usize;
                let p = &mut self.data[row_start + x as usize];
                let value = ((*p as i64 - sub[phase]) * mul[phase] + 8192) >> 14;
                *p = clamp16(value);
            }
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[repr(align(16))]
struct AlignedScratch([u32; 16]);

/// Lets a raw pointer cross the `Worker::dispatch` task boundary. Sound only
/// because `Worker` implementations guarantee disjoint row ranges: no two
/// concurrently-running tasks ever dereference it over the same rows.
#[derive(Clone, Copy)]
struct SyncPtr(*mut PixelBuffer);

unsafe impl Send for SyncPtr {}
unsafe impl Sync for SyncPtr {}
