// tessera/geometry/src/line_segment.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Line segments, in float and packed sub-tile forms.

use crate::transform2d::Matrix2x2F;
use crate::util;
use crate::vector::{Vector2F, vec2f};
use std::ops::{Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct LineSegment2F {
    from: Vector2F,
    to: Vector2F,
}

impl LineSegment2F {
    #[inline]
    pub const fn new(from: Vector2F, to: Vector2F) -> LineSegment2F {
        LineSegment2F { from, to }
    }

    #[inline]
    pub fn from(self) -> Vector2F {
        self.from
    }

    #[inline]
    pub fn to(self) -> Vector2F {
        self.to
    }

    #[inline]
    pub fn set_from(&mut self, point: Vector2F) {
        self.from = point
    }

    #[inline]
    pub fn set_to(&mut self, point: Vector2F) {
        self.to = point
    }

    #[inline]
    pub fn from_x(self) -> f32 {
        self.from.x
    }

    #[inline]
    pub fn from_y(self) -> f32 {
        self.from.y
    }

    #[inline]
    pub fn to_x(self) -> f32 {
        self.to.x
    }

    #[inline]
    pub fn to_y(self) -> f32 {
        self.to.y
    }

    #[inline]
    pub fn vector(self) -> Vector2F {
        self.to - self.from
    }

    #[inline]
    pub fn min_x(self) -> f32 {
        self.from.x.min(self.to.x)
    }

    #[inline]
    pub fn max_x(self) -> f32 {
        self.from.x.max(self.to.x)
    }

    #[inline]
    pub fn min_y(self) -> f32 {
        self.from.y.min(self.to.y)
    }

    #[inline]
    pub fn max_y(self) -> f32 {
        self.from.y.max(self.to.y)
    }

    #[inline]
    pub fn square_length(self) -> f32 {
        self.vector().square_length()
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.vector().length()
    }

    #[inline]
    pub fn sample(self, t: f32) -> Vector2F {
        self.from + self.vector().scale(t)
    }

    #[inline]
    pub fn midpoint(self) -> Vector2F {
        self.sample(0.5)
    }

    #[inline]
    pub fn split(self, t: f32) -> (LineSegment2F, LineSegment2F) {
        let midpoint = self.sample(t);
        (LineSegment2F::new(self.from, midpoint), LineSegment2F::new(midpoint, self.to))
    }

    /// Splits at the given y, returning the upper and lower parts.
    pub fn split_at_y(self, y: f32) -> (LineSegment2F, LineSegment2F) {
        let (upper, lower) = self.split(self.solve_t_for_y(y));
        if self.from.y < self.to.y {
            (upper, lower)
        } else {
            (lower, upper)
        }
    }

    #[inline]
    pub fn solve_t_for_x(self, x: f32) -> f32 {
        (x - self.from.x) / (self.to.x - self.from.x)
    }

    #[inline]
    pub fn solve_t_for_y(self, y: f32) -> f32 {
        (y - self.from.y) / (self.to.y - self.from.y)
    }

    #[inline]
    pub fn solve_x_for_y(self, y: f32) -> f32 {
        util::lerp(self.from.x, self.to.x, self.solve_t_for_y(y))
    }

    #[inline]
    pub fn solve_y_for_x(self, x: f32) -> f32 {
        util::lerp(self.from.y, self.to.y, self.solve_t_for_x(x))
    }

    #[inline]
    pub fn reversed(self) -> LineSegment2F {
        LineSegment2F::new(self.to, self.from)
    }

    #[inline]
    pub fn upper_point(self) -> Vector2F {
        if self.from.y < self.to.y {
            self.from
        } else {
            self.to
        }
    }

    #[inline]
    pub fn y_winding(self) -> i32 {
        if self.from.y < self.to.y {
            1
        } else {
            -1
        }
    }

    /// Reverses the segment if the winding is negative, so that it always
    /// points downward.
    #[inline]
    pub fn orient(self, y_winding: i32) -> LineSegment2F {
        if y_winding >= 0 {
            self
        } else {
            self.reversed()
        }
    }

    /// Translates the segment perpendicular to itself by the given distance.
    #[inline]
    pub fn offset(self, distance: f32) -> LineSegment2F {
        if self.square_length() == 0.0 {
            return self;
        }
        let normal = self.vector().yx().scale_xy(vec2f(-1.0, 1.0)).normalize();
        let offset = normal.scale(distance);
        LineSegment2F::new(self.from + offset, self.to + offset)
    }

    /// Finds the parameter along `self` of its intersection with the line
    /// carrying `other`, or `None` if the two are parallel.
    pub fn intersection_t(self, other: LineSegment2F) -> Option<f32> {
        let p0p1 = self.vector();
        let matrix = Matrix2x2F::row_major(other.vector().x, -p0p1.x,
                                           other.vector().y, -p0p1.y);
        if matrix.det().abs() < util::EPSILON {
            return None;
        }
        let rhs = self.from - other.from;
        let solution = matrix.inverse() * rhs;
        Some(solution.y)
    }

    /// The scalar projection of `vector` onto this segment's direction,
    /// normalized by the segment's length.
    #[inline]
    pub fn projection_coefficient(self, vector: Vector2F) -> f32 {
        let direction = self.vector();
        direction.dot(vector) / direction.square_length()
    }
}

impl Sub<Vector2F> for LineSegment2F {
    type Output = LineSegment2F;
    #[inline]
    fn sub(self, vector: Vector2F) -> LineSegment2F {
        LineSegment2F::new(self.from - vector, self.to - vector)
    }
}

impl Mul<Vector2F> for LineSegment2F {
    type Output = LineSegment2F;
    #[inline]
    fn mul(self, factors: Vector2F) -> LineSegment2F {
        LineSegment2F::new(self.from.scale_xy(factors), self.to.scale_xy(factors))
    }
}

/// A line segment packed in unsigned 8.8 fixed point, relative to a tile
/// origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct LineSegmentU16 {
    pub from_x: u16,
    pub from_y: u16,
    pub to_x: u16,
    pub to_y: u16,
}

#[cfg(test)]
mod tests {
    use super::LineSegment2F;
    use crate::vector::vec2f;

    #[test]
    fn test_sample_and_split() {
        let segment = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(4.0, 8.0));
        assert_eq!(segment.sample(0.5), vec2f(2.0, 4.0));
        let (a, b) = segment.split(0.25);
        assert_eq!(a.to(), vec2f(1.0, 2.0));
        assert_eq!(b.from(), vec2f(1.0, 2.0));
    }

    #[test]
    fn test_intersection_t() {
        let a = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(4.0, 4.0));
        let b = LineSegment2F::new(vec2f(0.0, 4.0), vec2f(4.0, 0.0));
        let t = a.intersection_t(b).unwrap();
        assert_eq!(a.sample(t), vec2f(2.0, 2.0));

        let parallel = LineSegment2F::new(vec2f(0.0, 1.0), vec2f(4.0, 5.0));
        assert!(a.intersection_t(parallel).is_none());
    }

    #[test]
    fn test_offset() {
        let segment = LineSegment2F::new(vec2f(0.0, 0.0), vec2f(10.0, 0.0));
        let offset = segment.offset(2.0);
        assert!((offset.from_y() - 2.0).abs() < 1e-6);
        assert!((offset.to_y() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_at_y() {
        let segment = LineSegment2F::new(vec2f(0.0, 10.0), vec2f(10.0, 0.0));
        let (upper, lower) = segment.split_at_y(5.0);
        assert!(upper.min_y() < 5.0 + 1e-6);
        assert!(lower.max_y() > 5.0 - 1e-6);
    }
}
