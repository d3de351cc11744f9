// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - defect.rs
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

//! Defective pixel repair: replace pixels flagged in the bad-pixel bitmap
//! with a distance-weighted average of their nearest good neighbours.

use crate::{clamp16, PixelBuffer, Result, Worker};

impl PixelBuffer {
    /// Walk every uncropped row and repair any pixel flagged in the bad
    /// pixel bitmap, dispatched over `worker`.
    pub fn fix_bad_pixels(&mut self, worker: &dyn Worker) -> Result<()> {
        let height = self.uncropped_dim.height;
        let ptr = SyncPtr(self as *mut PixelBuffer);
        worker.dispatch(height, &move |y0, y1| {
            // SAFETY: disjoint row ranges per the `Worker` contract.
            unsafe { (*ptr.0).fix_bad_pixels_range(y0, y1) };
        });
        Ok(())
    }

    fn fix_bad_pixels_range(&mut self, y0: u32, y1: u32) {
        let width = self.uncropped_dim.width;
        for y in y0..y1 {
            for x in 0..width {
                if self.is_bad_pixel(x, y) {
                    self.fix_bad_pixel(x, y, 0);
                }
            }
        }
    }

    /// Replace uncropped sample `(x, y, component)` with a distance-weighted
    /// average of the nearest good neighbour in each of the 4 cardinal
    /// directions. Directions where every pixel out to the border is also
    /// flagged contribute nothing; a pixel with no good neighbour in any
    /// direction is set to 0.
    ///
    /// The search step is 2 when the image obeys a CFA phase pattern (so
    /// neighbours are the same colour) and 1 otherwise. Weights are an
    /// 8-bit fraction per axis (`256` split between the two sides in
    /// inverse proportion to distance) summed and shifted down by
    /// `7 + (1 per axis that contributed)`; these exact constants are part
    /// of the contract, not an approximation.
    ///
    /// If `cpp > 1` and `component == 0`, also repairs components
    /// `1..cpp` at the same `(x, y)`, recomputing weights from scratch for
    /// each one — the reference recurses for this; the iterative form here
    /// is bounded by `cpp <= 3` so it can't grow unbounded stack depth.
    pub fn fix_bad_pixel(&mut self, x: u32, y: u32, component: usize) {
        self.fix_bad_pixel_component(x, y, component);
        if component == 0 && self.cpp > 1 {
            for extra in 1..self.cpp as usize {
                self.fix_bad_pixel_component(x, y, extra);
            }
        }
    }

    fn fix_bad_pixel_component(&mut self, x: u32, y: u32, component: usize) {
        let step: i64 = if self.is_cfa { 2 } else { 1 };
        let width = self.uncropped_dim.width as i64;
        let height = self.uncropped_dim.height as i64;
        let xi = x as i64;
        let yi = y as i64;

        // -1 means "not found", matching the sentinel the reference uses.
        let mut values = [-1i64; 4];
        let mut dist = [0i64; 4];

        // Left.
        let mut xf = xi - step;
        while xf >= 0 && values[0] < 0 {
            if !self.is_bad_pixel(xf as u32, y) {
                values[0] = self.uncropped_pixel(xf as u32, y)[component] as i64;
                dist[0] = xi - xf;
            }
            xf -= step;
        }

        // Right.
        xf = xi + step;
        while xf < width && values[1] < 0 {
            if !self.is_bad_pixel(xf as u32, y) {
                values[1] = self.uncropped_pixel(xf as u32, y)[component] as i64;
                dist[1] = xf - xi;
            }
            xf += step;
        }

        // Up.
        let mut yf = yi - step;
        while yf >= 0 && values[2] < 0 {
            if !self.is_bad_pixel(x, yf as u32) {
                values[2] = self.uncropped_pixel(x, yf as u32)[component] as i64;
                dist[2] = yi - yf;
            }
            yf -= step;
        }

        // Down.
        yf = yi + step;
        while yf < height && values[3] < 0 {
            if !self.is_bad_pixel(x, yf as u32) {
                values[3] = self.uncropped_pixel(x, yf as u32)[component] as i64;
                dist[3] = yf - yi;
            }
            yf += step;
        }

        let mut weight = [0i64; 4];
        let mut shifts = 7;

        let total_dist_x = dist[0] + dist[1];
        if total_dist_x != 0 {
            weight[0] = if dist[0] != 0 {
                (total_dist_x - dist[0]) * 256 / total_dist_x
            } else {
                0
            };
            weight[1] = 256 - weight[0];
            shifts += 1;
        }

        let total_dist_y = dist[2] + dist[3];
        if total_dist_y != 0 {
            weight[2] = if dist[2] != 0 {
                (total_dist_y - dist[2]) * 256 / total_dist_y
            } else {
                0
            };
            weight[3] = 256 - weight[2];
            shifts += 1;
        }

        let mut total: i64 = 0;
        for i in 0..4 {
            if values[i] >= 0 {
                total += values[i] * weight[i];
            }
        }
        total >>= shifts;

        self.uncropped_pixel_mut(x, y)[component] = clamp16(total);
    }
}

/// See the identically-named wrapper in `scale.rs`: sound because `Worker`
/// guarantees disjoint row ranges across concurrent task invocations.
#[derive(Clone, Copy)]
struct SyncPtr(*mut PixelBuffer);

unsafe impl Send for SyncPtr {}
unsafe impl Sync for SyncPtr {}

#[cfg(test)]
mod test {
    use crate::geometry::Size;
    use crate::{PixelBuffer, RayonWorker};

    fn make_buffer(w: u32, h: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: w,
                height: h,
            },
            1,
        );
        buf.set_is_cfa(true);
        buf
    }

    #[test]
    fn test_fix_bad_pixel_uses_same_colour_neighbours() {
        let mut buf = make_buffer(8, 8);
        for y in 0..8u32 {
            for x in 0..8u32 {
                buf.uncropped_pixel_mut(x, y)[0] = 1000;
            }
        }
        buf.uncropped_pixel_mut(4, 4)[0] = 60000;
        buf.set_bad_pixel(4, 4, true);
        buf.fix_bad_pixel(4, 4, 0);
        assert_eq!(buf.uncropped_pixel(4, 4)[0], 1000);
    }

    #[test]
    fn test_fix_bad_pixel_with_no_good_neighbour_is_zero() {
        let mut buf = make_buffer(3, 1);
        for x in 0..3u32 {
            buf.set_bad_pixel(x, 0, true);
        }
        buf.fix_bad_pixel(1, 0, 0);
        assert_eq!(buf.uncropped_pixel(1, 0)[0], 0);
    }

    #[test]
    fn test_fix_bad_pixel_weights_nearer_neighbour_more() {
        let mut buf = make_buffer(9, 1);
        buf.set_is_cfa(false);
        buf.uncropped_pixel_mut(3, 0)[0] = 100;
        buf.uncropped_pixel_mut(5, 0)[0] = 1000;
        buf.set_bad_pixel(4, 0, true);
        buf.fix_bad_pixel(4, 0, 0);
        let v = buf.uncropped_pixel(4, 0)[0];
        assert!(v > 100 && v < 1000, "expected weighted blend, got {v}");
    }

    #[test]
    fn test_fix_bad_pixel_asymmetric_distance_exact_weight() {
        // Left neighbour at distance 1, right at distance 3: weight[left] =
        // (4-1)*256/4 = 192, weight[right] = 64, shift = 8.
        let mut buf = make_buffer(9, 1);
        buf.set_is_cfa(false);
        buf.uncropped_pixel_mut(3, 0)[0] = 0;
        buf.uncropped_pixel_mut(7, 0)[0] = 256;
        buf.set_bad_pixel(4, 0, true);
        buf.fix_bad_pixel(4, 0, 0);
        assert_eq!(buf.uncropped_pixel(4, 0)[0], (0 * 192 + 256 * 64) >> 8);
    }

    #[test]
    fn test_fix_bad_pixel_repairs_all_components_via_public_entry_point() {
        // Calling the spec-surface `fix_bad_pixel(x, y, 0)` directly (not
        // through `fix_bad_pixels`) must still repair every component of a
        // multi-component pixel, not just component 0.
        let mut buf = PixelBuffer::new_u16(
            Size {
                width: 8,
                height: 8,
            },
            3,
        );
        buf.set_is_cfa(false);
        for y in 0..8u32 {
            for x in 0..8u32 {
                let px = buf.uncropped_pixel_mut(x, y);
                px[0] = 1000;
                px[1] = 2000;
                px[2] = 3000;
            }
        }
        {
            let px = buf.uncropped_pixel_mut(4, 4);
            px[0] = 60000;
            px[1] = 60000;
            px[2] = 60000;
        }
        buf.set_bad_pixel(4, 4, true);
        buf.fix_bad_pixel(4, 4, 0);
        let px = buf.uncropped_pixel(4, 4);
        assert_eq!(px[0], 1000);
        assert_eq!(px[1], 2000);
        assert_eq!(px[2], 3000);
    }

    #[test]
    fn test_fix_bad_pixels_repairs_every_flagged_pixel() {
        let mut buf = make_buffer(8, 8);
        for y in 0..8u32 {
            for x in 0..8u32 {
                buf.uncropped_pixel_mut(x, y)[0] = 2000;
            }
        }
        buf.uncropped_pixel_mut(2, 2)[0] = 0;
        buf.set_bad_pixel(2, 2, true);
        buf.fix_bad_pixels(&RayonWorker).unwrap();
        assert_eq!(buf.uncropped_pixel(2, 2)[0], 2000);
    }
}
