/*
 * rawpixelpipe - utils.rs
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

//! Various utilities

/// Advance the scaler's per-row PRNG: `v = 18000 * (v & 0xFFFF) + (v >> 16)`.
///
/// Wrapping on 32 bits is part of the contract; a different wrap behaviour
/// would desynchronize the dither pattern from the reference implementation.
#[inline]
pub(crate) fn lcg_step_scale(v: u32) -> u32 {
    (18000u32.wrapping_mul(v & 0xffff)).wrapping_add(v >> 16)
}

/// Advance the lookup's per-row PRNG: `v = 15700 * (v & 0xFFFF) + (v >> 16)`.
#[inline]
pub(crate) fn lcg_step_lookup(v: u32) -> u32 {
    (15700u32.wrapping_mul(v & 0xffff)).wrapping_add(v >> 16)
}

#[cfg(test)]
mod test {
    use super::{lcg_step_lookup, lcg_step_scale};

    #[test]
    fn test_lcg_step_scale_wraps() {
        let v = lcg_step_scale(0xffff_ffff);
        assert_eq!(v, (18000u32.wrapping_mul(0xffff)).wrapping_add(0xffff));
    }

    #[test]
    fn test_lcg_step_lookup_deterministic() {
        let a = lcg_step_lookup(0x45694585);
        let b = lcg_step_lookup(0x45694585);
        assert_eq!(a, b);
    }
}
