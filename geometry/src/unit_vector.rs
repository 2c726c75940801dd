// tessera/geometry/src/unit_vector.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Unit vectors, treated as complex numbers for cheap rotation.

use crate::vector::{Vector2F, vec2f};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitVector(pub Vector2F);

impl UnitVector {
    #[inline]
    pub fn from_angle(theta: f32) -> UnitVector {
        UnitVector(vec2f(theta.cos(), theta.sin()))
    }

    /// Angle addition formula.
    #[inline]
    pub fn rotate_by(&self, other: UnitVector) -> UnitVector {
        UnitVector(vec2f(self.0.x * other.0.x - self.0.y * other.0.y,
                         self.0.y * other.0.x + self.0.x * other.0.y))
    }

    /// Angle subtraction formula.
    #[inline]
    pub fn rev_rotate_by(&self, other: UnitVector) -> UnitVector {
        UnitVector(vec2f(self.0.x * other.0.x + self.0.y * other.0.y,
                         self.0.y * other.0.x - self.0.x * other.0.y))
    }

    /// Half-angle formula.
    #[inline]
    pub fn halve_angle(&self) -> UnitVector {
        let term = vec2f(self.0.x, -self.0.x);
        let halved = (Vector2F::splat(0.5) * (Vector2F::splat(1.0) + term)).max(Vector2F::zero());
        UnitVector(vec2f(halved.x.sqrt(), halved.y.sqrt().copysign(self.0.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::UnitVector;

    #[test]
    fn test_rotate_by() {
        let a = UnitVector::from_angle(0.3);
        let b = UnitVector::from_angle(0.4);
        let c = a.rotate_by(b);
        let expected = UnitVector::from_angle(0.7);
        assert!((c.0 - expected.0).length() < 1e-6);
    }

    #[test]
    fn test_halve_angle() {
        let a = UnitVector::from_angle(1.0);
        let half = a.halve_angle();
        let expected = UnitVector::from_angle(0.5);
        assert!((half.0 - expected.0).length() < 1e-6);
    }
}
