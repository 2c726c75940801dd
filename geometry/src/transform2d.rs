// tessera/geometry/src/transform2d.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! 2D affine transforms.

use crate::line_segment::LineSegment2F;
use crate::rect::RectF;
use crate::unit_vector::UnitVector;
use crate::vector::{Vector2F, vec2f};
use std::ops::Mul;

/// A 2×2 matrix, row-major.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix2x2F {
    pub m11: f32,
    pub m12: f32,
    pub m21: f32,
    pub m22: f32,
}

impl Default for Matrix2x2F {
    #[inline]
    fn default() -> Matrix2x2F {
        Matrix2x2F { m11: 1.0, m12: 0.0, m21: 0.0, m22: 1.0 }
    }
}

impl Matrix2x2F {
    #[inline]
    pub const fn row_major(m11: f32, m12: f32, m21: f32, m22: f32) -> Matrix2x2F {
        Matrix2x2F { m11, m12, m21, m22 }
    }

    #[inline]
    pub fn from_scale(scale: Vector2F) -> Matrix2x2F {
        Matrix2x2F::row_major(scale.x, 0.0, 0.0, scale.y)
    }

    #[inline]
    pub fn from_rotation(theta: f32) -> Matrix2x2F {
        Matrix2x2F::from_rotation_vector(UnitVector(vec2f(theta.cos(), theta.sin())))
    }

    #[inline]
    pub fn from_rotation_vector(vector: UnitVector) -> Matrix2x2F {
        Matrix2x2F::row_major(vector.0.x, -vector.0.y, vector.0.y, vector.0.x)
    }

    #[inline]
    pub fn det(&self) -> f32 {
        self.m11 * self.m22 - self.m12 * self.m21
    }

    #[inline]
    pub fn adjugate(&self) -> Matrix2x2F {
        Matrix2x2F::row_major(self.m22, -self.m12, -self.m21, self.m11)
    }

    #[inline]
    pub fn inverse(&self) -> Matrix2x2F {
        let adjugate = self.adjugate();
        let inv_det = 1.0 / self.det();
        Matrix2x2F::row_major(adjugate.m11 * inv_det,
                              adjugate.m12 * inv_det,
                              adjugate.m21 * inv_det,
                              adjugate.m22 * inv_det)
    }

    #[inline]
    pub fn scale(&self, factor: f32) -> Matrix2x2F {
        Matrix2x2F::row_major(self.m11 * factor,
                              self.m12 * factor,
                              self.m21 * factor,
                              self.m22 * factor)
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Matrix2x2F::default()
    }
}

impl Mul<Matrix2x2F> for Matrix2x2F {
    type Output = Matrix2x2F;
    #[inline]
    fn mul(self, other: Matrix2x2F) -> Matrix2x2F {
        Matrix2x2F::row_major(self.m11 * other.m11 + self.m12 * other.m21,
                              self.m11 * other.m12 + self.m12 * other.m22,
                              self.m21 * other.m11 + self.m22 * other.m21,
                              self.m21 * other.m12 + self.m22 * other.m22)
    }
}

impl Mul<Vector2F> for Matrix2x2F {
    type Output = Vector2F;
    #[inline]
    fn mul(self, vector: Vector2F) -> Vector2F {
        vec2f(self.m11 * vector.x + self.m12 * vector.y,
              self.m21 * vector.x + self.m22 * vector.y)
    }
}

/// An affine transform: a 2×2 matrix plus a translation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform2F {
    pub matrix: Matrix2x2F,
    pub vector: Vector2F,
}

impl Transform2F {
    #[inline]
    pub fn from_scale(scale: Vector2F) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::from_scale(scale), vector: Vector2F::zero() }
    }

    #[inline]
    pub fn from_uniform_scale(scale: f32) -> Transform2F {
        Transform2F::from_scale(Vector2F::splat(scale))
    }

    #[inline]
    pub fn from_rotation(theta: f32) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::from_rotation(theta), vector: Vector2F::zero() }
    }

    #[inline]
    pub fn from_rotation_vector(vector: UnitVector) -> Transform2F {
        Transform2F {
            matrix: Matrix2x2F::from_rotation_vector(vector),
            vector: Vector2F::zero(),
        }
    }

    #[inline]
    pub fn from_translation(vector: Vector2F) -> Transform2F {
        Transform2F { matrix: Matrix2x2F::default(), vector }
    }

    #[inline]
    pub fn row_major(m11: f32, m12: f32, m21: f32, m22: f32, m31: f32, m32: f32)
                     -> Transform2F {
        Transform2F {
            matrix: Matrix2x2F::row_major(m11, m12, m21, m22),
            vector: vec2f(m31, m32),
        }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.matrix.is_identity() && self.vector.is_zero()
    }

    #[inline]
    pub fn m11(&self) -> f32 {
        self.matrix.m11
    }

    #[inline]
    pub fn m12(&self) -> f32 {
        self.matrix.m12
    }

    #[inline]
    pub fn m21(&self) -> f32 {
        self.matrix.m21
    }

    #[inline]
    pub fn m22(&self) -> f32 {
        self.matrix.m22
    }

    /// Appends a translation: the result translates, then applies `self`.
    #[inline]
    pub fn translate(&self, vector: Vector2F) -> Transform2F {
        Transform2F::from_translation(vector) * *self
    }

    /// Appends a rotation.
    #[inline]
    pub fn rotate(&self, theta: f32) -> Transform2F {
        Transform2F::from_rotation(theta) * *self
    }

    #[inline]
    pub fn scale(&self, factors: Vector2F) -> Transform2F {
        Transform2F::from_scale(factors) * *self
    }

    pub fn inverse(&self) -> Transform2F {
        let matrix_inv = self.matrix.inverse();
        let vector_inv = -(matrix_inv * self.vector);
        Transform2F { matrix: matrix_inv, vector: vector_inv }
    }
}

impl Mul<Transform2F> for Transform2F {
    type Output = Transform2F;
    #[inline]
    fn mul(self, other: Transform2F) -> Transform2F {
        Transform2F {
            matrix: self.matrix * other.matrix,
            vector: self.matrix * other.vector + self.vector,
        }
    }
}

impl Mul<Vector2F> for Transform2F {
    type Output = Vector2F;
    #[inline]
    fn mul(self, vector: Vector2F) -> Vector2F {
        self.matrix * vector + self.vector
    }
}

impl Mul<LineSegment2F> for Transform2F {
    type Output = LineSegment2F;
    #[inline]
    fn mul(self, segment: LineSegment2F) -> LineSegment2F {
        LineSegment2F::new(self * segment.from(), self * segment.to())
    }
}

impl Mul<RectF> for Transform2F {
    type Output = RectF;
    fn mul(self, rect: RectF) -> RectF {
        let (upper_left, upper_right) = (self * rect.origin(), self * rect.upper_right());
        let (lower_left, lower_right) = (self * rect.lower_left(), self * rect.lower_right());
        let min_point = upper_left.min(upper_right).min(lower_left).min(lower_right);
        let max_point = upper_left.max(upper_right).max(lower_left).max(lower_right);
        RectF::from_points(min_point, max_point)
    }
}

#[cfg(test)]
mod tests {
    use super::Transform2F;
    use crate::vector::vec2f;

    #[test]
    fn test_compose_and_apply() {
        let transform = Transform2F::from_uniform_scale(2.0).translate(vec2f(1.0, 1.0));
        assert_eq!(transform * vec2f(1.0, 0.0), vec2f(3.0, 1.0));
    }

    #[test]
    fn test_inverse() {
        let transform = Transform2F::from_rotation(0.7)
            .scale(vec2f(2.0, 3.0))
            .translate(vec2f(-4.0, 5.0));
        let round_trip = transform.inverse() * (transform * vec2f(10.0, -2.0));
        assert!((round_trip - vec2f(10.0, -2.0)).length() < 1e-4);
    }

    #[test]
    fn test_rect_transform_bounds() {
        use crate::rect::RectF;
        let rect = RectF::new(vec2f(0.0, 0.0), vec2f(1.0, 1.0));
        let rotated = Transform2F::from_rotation(std::f32::consts::FRAC_PI_2) * rect;
        assert!((rotated.min_x() - -1.0).abs() < 1e-6);
        assert!((rotated.max_y() - 1.0).abs() < 1e-6);
    }
}
