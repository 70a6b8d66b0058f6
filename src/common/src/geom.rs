//
// Copyright 2018 yvt, all rights reserved.
//
// This source code is a part of Nightingales.
//
use cgmath::Vector2;

/// An axis-aligned rectangle on a discrete 2-D grid.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Rect2D<T> {
    pub min: Vector2<T>,
    pub max: Vector2<T>,
}

impl<T> Rect2D<T> {
    pub fn new(min: Vector2<T>, max: Vector2<T>) -> Self {
        Self { min, max }
    }
}

impl Rect2D<u32> {
    /// Construct a rectangle from an origin and a size.
    pub fn with_size(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(
            Vector2::new(x, y),
            Vector2::new(x + width, y + height),
        )
    }

    pub fn width(&self) -> u32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> u32 {
        self.max.y - self.min.y
    }
}

/// The extents of a 3-D region. Unused dimensions are `1`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Extent3D {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3D {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// A texel offset into a 3-D region. Unused dimensions are `0`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct Offset3D {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Offset3D {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}
