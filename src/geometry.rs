// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawpixelpipe - geometry.rs
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

//! Geometry types used to describe the cropped/uncropped layout of a
//! [`crate::PixelBuffer`].

/// Rectangle struct.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a rectangle from a [`Point`] and a [`Size`].
    pub fn new(origin: Point, size: Size) -> Rect {
        Rect {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    /// The origin of the `Rect`.
    pub fn origin(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    /// The size of the `Rect`.
    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Point struct.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// Size struct.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[cfg(test)]
mod test {
    use super::{Point, Rect, Size};

    #[test]
    fn test_rect_from_origin_and_size() {
        let rect = Rect::new(
            Point { x: 4, y: 8 },
            Size {
                width: 12,
                height: 6,
            },
        );
        assert_eq!(rect.origin(), Point { x: 4, y: 8 });
        assert_eq!(
            rect.size(),
            Size {
                width: 12,
                height: 6
            }
        );
        assert_eq!(rect.area(), 72);
    }

    #[test]
    fn test_size_area() {
        let size = Size {
            width: 0,
            height: 10,
        };
        assert_eq!(size.area(), 0);
    }
}
