// tessera/content/src/gradient.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Gradient effects that paths can be filled with.

use crate::sorted_vector::SortedVector;
use crate::util;
use std::hash::{Hash, Hasher};
use tessera_color::ColorU;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::util as geometry_util;
use tessera_geometry::vector::Vector2F;

/// A gradient, either linear or radial.
#[derive(Clone, PartialEq, Debug)]
pub struct Gradient {
    /// Information specific to the type of gradient (linear or radial).
    pub geometry: GradientGeometry,
    stops: SortedVector<ColorStop>,
    /// What should be rendered upon reaching the end of the color stops.
    pub wrap: GradientWrap,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum GradientGeometry {
    /// A linear gradient that follows a line.
    ///
    /// The line is in scene coordinates, not relative to the bounding box
    /// of the path.
    Linear(LineSegment2F),
    /// A radial gradient that radiates outward from a line connecting the
    /// centers of two circles.
    Radial {
        /// The line that connects the centers of the two circles. It may
        /// have zero length for the common case of a single circle.
        line: LineSegment2F,
        /// The radii of the two circles. The first value may be zero for
        /// the common case of a gradient that starts from a point.
        radii: Vector2F,
        /// Transform from radial gradient space into screen space.
        ///
        /// Like `gradientTransform` in SVG. Note that this is the inverse
        /// of Cairo's gradient transform.
        transform: Transform2F,
    },
}

/// What should be rendered outside the color stops.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum GradientWrap {
    /// The area before the gradient is filled with the color of the first
    /// stop, and the area after the gradient is filled with the color of
    /// the last stop.
    Clamp,
    /// The gradient repeats indefinitely.
    Repeat,
}

/// One color stop of a gradient.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug)]
pub struct ColorStop {
    /// The offset of the stop, in [0, 1].
    pub offset: f32,
    /// The color of the stop.
    pub color: ColorU,
}

impl Eq for Gradient {}

impl Hash for Gradient {
    fn hash<H>(&self, state: &mut H) where H: Hasher {
        match self.geometry {
            GradientGeometry::Linear(line) => {
                (0).hash(state);
                util::hash_line_segment(line, state);
            }
            GradientGeometry::Radial { line, radii, transform } => {
                (1).hash(state);
                util::hash_line_segment(line, state);
                util::hash_vector_2f(radii, state);
                util::hash_transform_2f(transform, state);
            }
        }
        self.stops.hash(state);
    }
}

impl Eq for ColorStop {}

impl Hash for ColorStop {
    #[inline]
    fn hash<H>(&self, state: &mut H) where H: Hasher {
        self.color.hash(state);
        util::hash_f32(self.offset, state);
    }
}

impl Gradient {
    /// Creates a new linear gradient with the given line.
    #[inline]
    pub fn linear(line: LineSegment2F) -> Gradient {
        Gradient {
            geometry: GradientGeometry::Linear(line),
            stops: SortedVector::new(),
            wrap: GradientWrap::Clamp,
        }
    }

    /// Creates a new linear gradient from a pair of points.
    #[inline]
    pub fn linear_from_points(from: Vector2F, to: Vector2F) -> Gradient {
        Gradient::linear(LineSegment2F::new(from, to))
    }

    /// Creates a new radial gradient from a line connecting the centers of
    /// two circles and the radii of the circles.
    #[inline]
    pub fn radial<L>(line: L, radii: Vector2F) -> Gradient where L: RadialGradientLine {
        Gradient {
            geometry: GradientGeometry::Radial {
                line: line.to_line(),
                radii,
                transform: Transform2F::default(),
            },
            stops: SortedVector::new(),
            wrap: GradientWrap::Clamp,
        }
    }

    /// Adds a new color stop to the gradient.
    #[inline]
    pub fn add(&mut self, stop: ColorStop) {
        self.stops.push(stop);
    }

    /// A convenience method to add a color stop.
    #[inline]
    pub fn add_color_stop(&mut self, color: ColorU, offset: f32) {
        debug_assert!(offset >= 0.0 && offset <= 1.0);
        self.add(ColorStop { color, offset })
    }

    /// The list of color stops, sorted by offset.
    #[inline]
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops.array
    }

    /// Sets the wrap mode.
    #[inline]
    pub fn set_wrap(&mut self, wrap: GradientWrap) {
        self.wrap = wrap;
    }

    /// Evaluates the color at offset `t`.
    ///
    /// The upper stop is the first one with offset ≥ t; the result lerps
    /// between it and its predecessor.
    pub fn sample(&self, mut t: f32) -> ColorU {
        if self.stops.is_empty() {
            return ColorU::transparent_black();
        }

        t = geometry_util::clamp(t, 0.0, 1.0);
        let stops = self.stops();

        let mut upper_index = stops.len() - 1;
        for (stop_index, stop) in stops.iter().enumerate() {
            if stop.offset >= t {
                upper_index = stop_index;
                break;
            }
        }
        let lower_index = if upper_index > 0 { upper_index - 1 } else { upper_index };

        let (lower_stop, upper_stop) = (&stops[lower_index], &stops[upper_index]);
        let denom = upper_stop.offset - lower_stop.offset;
        if denom == 0.0 {
            return upper_stop.color;
        }

        let ratio = ((t - lower_stop.offset) / denom).min(1.0);
        lower_stop.color
                  .to_f32()
                  .lerp(upper_stop.color.to_f32(), ratio)
                  .to_u8()
    }

    /// True if all stops are opaque.
    pub fn is_opaque(&self) -> bool {
        self.stops.array.iter().all(|stop| stop.color.is_opaque())
    }

    /// True if all stops are fully transparent.
    pub fn is_fully_transparent(&self) -> bool {
        self.stops.array.iter().all(|stop| stop.color.is_fully_transparent())
    }

    /// Scales the opacity of every stop.
    pub fn apply_opacity(&mut self, alpha: f32) {
        if alpha == 1.0 {
            return;
        }
        for stop in &mut self.stops.array {
            stop.color.a = (stop.color.a as f32 * alpha).round() as u8;
        }
    }

    /// Applies a transform to the gradient geometry.
    pub fn apply_transform(&mut self, new_transform: Transform2F) {
        if new_transform.is_identity() {
            return;
        }

        match self.geometry {
            GradientGeometry::Linear(ref mut line) => *line = new_transform * *line,
            GradientGeometry::Radial { ref mut transform, .. } => {
                *transform = new_transform * *transform
            }
        }
    }
}

/// Allows radial gradients to be created with either a pair of points or a
/// single point.
pub trait RadialGradientLine {
    fn to_line(self) -> LineSegment2F;
}

impl RadialGradientLine for LineSegment2F {
    #[inline]
    fn to_line(self) -> LineSegment2F {
        self
    }
}

impl RadialGradientLine for Vector2F {
    #[inline]
    fn to_line(self) -> LineSegment2F {
        LineSegment2F::new(self, self)
    }
}

#[cfg(test)]
mod tests {
    use super::Gradient;
    use tessera_color::ColorU;
    use tessera_geometry::vector::vec2f;

    fn red_to_blue() -> Gradient {
        let mut gradient = Gradient::linear_from_points(vec2f(0.0, 0.0), vec2f(100.0, 0.0));
        gradient.add_color_stop(ColorU::new(255, 0, 0, 255), 0.0);
        gradient.add_color_stop(ColorU::new(0, 0, 255, 255), 1.0);
        gradient
    }

    #[test]
    fn test_sample_endpoints() {
        let gradient = red_to_blue();
        assert_eq!(gradient.sample(0.0), ColorU::new(255, 0, 0, 255));
        assert_eq!(gradient.sample(1.0), ColorU::new(0, 0, 255, 255));
    }

    #[test]
    fn test_sample_midpoint() {
        let gradient = red_to_blue();
        let mid = gradient.sample(0.5);
        assert!((mid.r as i32 - 128).abs() <= 1, "mid {:?}", mid);
        assert!((mid.b as i32 - 128).abs() <= 1, "mid {:?}", mid);
        assert_eq!(mid.g, 0);
    }

    #[test]
    fn test_sample_is_monotonic() {
        let gradient = red_to_blue();
        let mut last_blue = -1;
        for sample_index in 0..33 {
            let t = sample_index as f32 / 32.0;
            let blue = gradient.sample(t).b as i32;
            assert!(blue >= last_blue, "blue went backward at t {}", t);
            last_blue = blue;
        }
    }

    #[test]
    fn test_sample_multi_stop_upper_bound() {
        let mut gradient = Gradient::linear_from_points(vec2f(0.0, 0.0), vec2f(1.0, 0.0));
        gradient.add_color_stop(ColorU::new(0, 0, 0, 255), 0.0);
        gradient.add_color_stop(ColorU::new(100, 0, 0, 255), 0.25);
        gradient.add_color_stop(ColorU::new(200, 0, 0, 255), 0.75);

        // Between the second and third stops, the interpolation must use
        // those two stops, not the first pair.
        let sample = gradient.sample(0.5);
        assert_eq!(sample.r, 150);

        // Past the last stop we clamp.
        assert_eq!(gradient.sample(1.0).r, 200);
    }

    #[test]
    fn test_repeated_offsets_collapse() {
        let mut gradient = Gradient::linear_from_points(vec2f(0.0, 0.0), vec2f(1.0, 0.0));
        gradient.add_color_stop(ColorU::new(10, 0, 0, 255), 0.5);
        gradient.add_color_stop(ColorU::new(20, 0, 0, 255), 0.5);
        assert_eq!(gradient.sample(0.5).r, 10);
    }
}
