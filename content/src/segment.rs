// tessera/content/src/segment.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Single line or Bézier curve segments, the atoms of contours.

use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::util::{EPSILON, lerp};
use tessera_geometry::vector::{Vector2F, vec2f};

/// A single line or Bézier curve segment.
///
/// The endpoints live in `baseline`; for a quadratic curve `ctrl.from()`
/// holds the control point, and for a cubic both ends of `ctrl` are
/// control points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub baseline: LineSegment2F,
    pub ctrl: LineSegment2F,
    pub kind: SegmentKind,
    pub flags: SegmentFlags,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentKind {
    None,
    Line,
    Quadratic,
    Cubic,
}

bitflags! {
    pub struct SegmentFlags: u8 {
        /// This segment starts a new contour.
        const FIRST_IN_CONTOUR = 0x01;
        /// This segment closes its contour.
        const CLOSES_CONTOUR = 0x02;
    }
}

impl Segment {
    #[inline]
    pub fn none() -> Segment {
        Segment {
            baseline: LineSegment2F::default(),
            ctrl: LineSegment2F::default(),
            kind: SegmentKind::None,
            flags: SegmentFlags::empty(),
        }
    }

    #[inline]
    pub fn line(line: LineSegment2F) -> Segment {
        Segment {
            baseline: line,
            ctrl: LineSegment2F::default(),
            kind: SegmentKind::Line,
            flags: SegmentFlags::empty(),
        }
    }

    #[inline]
    pub fn quadratic(baseline: LineSegment2F, ctrl: Vector2F) -> Segment {
        Segment {
            baseline,
            ctrl: LineSegment2F::new(ctrl, Vector2F::zero()),
            kind: SegmentKind::Quadratic,
            flags: SegmentFlags::empty(),
        }
    }

    #[inline]
    pub fn cubic(baseline: LineSegment2F, ctrl: LineSegment2F) -> Segment {
        Segment { baseline, ctrl, kind: SegmentKind::Cubic, flags: SegmentFlags::empty() }
    }

    /// A 90° arc of the unit circle in the canonical arc frame: centered
    /// on the +x axis, sweeping from −45° to +45°.
    #[inline]
    pub fn quarter_circle_arc() -> Segment {
        Segment::arc_from_cos(0.0)
    }

    /// Approximates an arc of the unit circle with a single cubic curve,
    /// given the cosine of the sweep angle. The arc is centered on the +x
    /// axis, running from −θ/2 to +θ/2.
    ///
    /// The construction is Richard A. DeVeneza, "How to determine the
    /// control points of a Bézier curve that approximates a small circular
    /// arc", 2004 (https://www.tinaja.com/glib/bezcirc2.pdf).
    pub fn arc_from_cos(cos_sweep_angle: f32) -> Segment {
        if cos_sweep_angle >= 1.0 - EPSILON {
            return Segment::line(LineSegment2F::new(vec2f(1.0, 0.0), vec2f(1.0, 0.0)));
        }

        let half_cos = ((1.0 + cos_sweep_angle) * 0.5).sqrt();
        let half_sin = ((1.0 - cos_sweep_angle) * 0.5).sqrt();

        let p0 = vec2f(half_cos, -half_sin);
        let p3 = vec2f(half_cos, half_sin);

        let p1x = (4.0 - half_cos) * (1.0 / 3.0);
        let p1y = (1.0 - half_cos) * (3.0 - half_cos) / (3.0 * half_sin);

        Segment::cubic(LineSegment2F::new(p0, p3),
                       LineSegment2F::new(vec2f(p1x, -p1y), vec2f(p1x, p1y)))
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.kind == SegmentKind::None
    }

    #[inline]
    pub fn is_line(&self) -> bool {
        self.kind == SegmentKind::Line
    }

    #[inline]
    pub fn is_quadratic(&self) -> bool {
        self.kind == SegmentKind::Quadratic
    }

    #[inline]
    pub fn is_cubic(&self) -> bool {
        self.kind == SegmentKind::Cubic
    }

    #[inline]
    pub fn as_line_segment(&self) -> LineSegment2F {
        debug_assert!(self.is_line());
        self.baseline
    }

    /// Degree-elevates a quadratic curve to a cubic. Lines and cubics pass
    /// through unchanged.
    pub fn to_cubic(&self) -> Segment {
        match self.kind {
            SegmentKind::None | SegmentKind::Cubic => *self,
            SegmentKind::Line => {
                let mut segment = *self;
                segment.ctrl = LineSegment2F::new(
                    self.baseline.from().lerp(self.baseline.to(), 1.0 / 3.0),
                    self.baseline.from().lerp(self.baseline.to(), 2.0 / 3.0));
                segment.kind = SegmentKind::Cubic;
                segment
            }
            SegmentKind::Quadratic => {
                let ctrl = self.ctrl.from();
                let ctrl0 = self.baseline.from().lerp(ctrl, 2.0 / 3.0);
                let ctrl1 = self.baseline.to().lerp(ctrl, 2.0 / 3.0);
                let mut segment = *self;
                segment.ctrl = LineSegment2F::new(ctrl0, ctrl1);
                segment.kind = SegmentKind::Cubic;
                segment
            }
        }
    }

    /// The flatness test: true if the cubic deviates from its baseline by
    /// no more than the tolerance.
    pub fn is_flat(&self, tolerance: f32) -> bool {
        debug_assert!(self.is_cubic());
        let baseline_vector = self.baseline.vector();
        let d01 = self.ctrl.from() - self.baseline.from();
        let d23 = self.baseline.to() - self.ctrl.to();
        let uv = vec2f(baseline_vector.det(d01).abs(), baseline_vector.det(d23).abs());
        let error = uv.x.max(uv.y);
        error * error <= tolerance * tolerance * baseline_vector.square_length()
    }

    /// De Casteljau subdivision at parameter `t`.
    pub fn split(&self, t: f32) -> (Segment, Segment) {
        if self.is_line() {
            let (before, after) = self.baseline.split(t);
            return (Segment::line(before), Segment::line(after));
        }

        let cubic = self.to_cubic();
        let (p0, p3) = (cubic.baseline.from(), cubic.baseline.to());
        let (p1, p2) = (cubic.ctrl.from(), cubic.ctrl.to());

        let p01 = p0.lerp(p1, t);
        let p12 = p1.lerp(p2, t);
        let p23 = p2.lerp(p3, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let p0123 = p012.lerp(p123, t);

        (Segment::cubic(LineSegment2F::new(p0, p0123), LineSegment2F::new(p01, p012)),
         Segment::cubic(LineSegment2F::new(p0123, p3), LineSegment2F::new(p123, p23)))
    }

    /// Evaluates the segment at parameter `t`.
    pub fn sample(&self, t: f32) -> Vector2F {
        match self.kind {
            SegmentKind::None | SegmentKind::Line => self.baseline.sample(t),
            SegmentKind::Quadratic => {
                let (p0, p2) = (self.baseline.from(), self.baseline.to());
                let p1 = self.ctrl.from();
                let p01 = p0.lerp(p1, t);
                let p12 = p1.lerp(p2, t);
                p01.lerp(p12, t)
            }
            SegmentKind::Cubic => {
                let (p0, p3) = (self.baseline.from(), self.baseline.to());
                let (p1, p2) = (self.ctrl.from(), self.ctrl.to());
                let p01 = p0.lerp(p1, t);
                let p12 = p1.lerp(p2, t);
                let p23 = p2.lerp(p3, t);
                p01.lerp(p12, t).lerp(p12.lerp(p23, t), t)
            }
        }
    }

    #[inline]
    pub fn reversed(&self) -> Segment {
        Segment {
            baseline: self.baseline.reversed(),
            ctrl: if self.is_quadratic() { self.ctrl } else { self.ctrl.reversed() },
            kind: self.kind,
            flags: SegmentFlags::empty(),
        }
    }

    #[inline]
    pub fn transform(&self, transform: &Transform2F) -> Segment {
        Segment {
            baseline: *transform * self.baseline,
            ctrl: *transform * self.ctrl,
            kind: self.kind,
            flags: self.flags,
        }
    }

    /// Orients the segment downward in y.
    #[inline]
    pub fn orient(&self, y_winding: i32) -> Segment {
        if y_winding >= 0 {
            *self
        } else {
            self.reversed()
        }
    }

    #[inline]
    pub fn is_tiny(&self) -> bool {
        const TINY_EPSILON: f32 = 0.1;
        self.baseline.square_length() < TINY_EPSILON * TINY_EPSILON
    }

    /// The sum of chord lengths of the control polygon, an upper bound on
    /// (and fast approximation of) arc length.
    pub fn arc_length(&self) -> f32 {
        match self.kind {
            SegmentKind::None => 0.0,
            SegmentKind::Line => self.baseline.length(),
            SegmentKind::Quadratic | SegmentKind::Cubic => {
                // Crude approximation via uniform sampling.
                const SAMPLES: usize = 8;
                let mut length = 0.0;
                let mut prev = self.sample(0.0);
                for sample_index in 1..(SAMPLES + 1) {
                    let next = self.sample(sample_index as f32 / SAMPLES as f32);
                    length += (next - prev).length();
                    prev = next;
                }
                length
            }
        }
    }

    /// The parameter at which the arc length from the start reaches `len`.
    pub fn time_for_distance(&self, len: f32) -> f32 {
        let total = self.arc_length();
        if total == 0.0 {
            0.0
        } else {
            lerp(0.0, 1.0, (len / total).max(0.0).min(1.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Segment, SegmentKind};
    use tessera_geometry::line_segment::LineSegment2F;
    use tessera_geometry::vector::vec2f;

    #[test]
    fn test_degree_elevation_is_exact() {
        let quadratic = Segment::quadratic(
            LineSegment2F::new(vec2f(0.0, 0.0), vec2f(10.0, 0.0)), vec2f(5.0, 8.0));
        let cubic = quadratic.to_cubic();
        assert_eq!(cubic.kind, SegmentKind::Cubic);
        for sample_index in 0..17 {
            let t = sample_index as f32 / 16.0;
            let error = (quadratic.sample(t) - cubic.sample(t)).length();
            assert!(error < 1e-4, "error {} at t {}", error, t);
        }
    }

    #[test]
    fn test_split_continuity() {
        let cubic = Segment::cubic(
            LineSegment2F::new(vec2f(0.0, 0.0), vec2f(8.0, 0.0)),
            LineSegment2F::new(vec2f(2.0, 6.0), vec2f(6.0, -6.0)));
        let (before, after) = cubic.split(0.5);
        assert_eq!(before.baseline.to(), after.baseline.from());
        let midpoint = cubic.sample(0.5);
        assert!((before.baseline.to() - midpoint).length() < 1e-5);
    }

    #[test]
    fn test_flatness() {
        let flat = Segment::cubic(
            LineSegment2F::new(vec2f(0.0, 0.0), vec2f(30.0, 0.0)),
            LineSegment2F::new(vec2f(10.0, 0.01), vec2f(20.0, -0.01)));
        assert!(flat.is_flat(0.25));

        let curvy = Segment::cubic(
            LineSegment2F::new(vec2f(0.0, 0.0), vec2f(30.0, 0.0)),
            LineSegment2F::new(vec2f(10.0, 20.0), vec2f(20.0, 20.0)));
        assert!(!curvy.is_flat(0.25));
    }

    #[test]
    fn test_arc_from_cos_endpoints_on_unit_circle() {
        let arc = Segment::arc_from_cos(0.5f32);
        let from_len = arc.baseline.from().length();
        let to_len = arc.baseline.to().length();
        assert!((from_len - 1.0).abs() < 1e-4);
        assert!((to_len - 1.0).abs() < 1e-4);
        // Midpoint of the curve should stay near the circle too.
        let mid_len = arc.sample(0.5).length();
        assert!((mid_len - 1.0).abs() < 1e-2);
    }
}
