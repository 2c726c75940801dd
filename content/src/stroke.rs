// tessera/content/src/stroke.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Converts a stroked outline into a filled outline whose interior, under
//! the even-odd rule, equals the stroke.

use crate::outline::{ArcDirection, Contour, ContourIterFlags, Outline, PushSegmentFlags};
use crate::segment::Segment;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::util::EPSILON;
use tessera_geometry::vector::{Vector2F, vec2f};

/// Accepted deviation of an offset curve from the true parallel curve, in
/// pixels.
const STROKE_TOL: f32 = 0.1;

/// Sample count for the offset acceptance test.
const SAMPLE_COUNT: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub line_width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineCap {
    Butt,
    Square,
    Round,
}

/// The join style. Miter joins carry their limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineJoin {
    Miter(f32),
    Bevel,
    Round,
}

impl Default for StrokeStyle {
    #[inline]
    fn default() -> StrokeStyle {
        StrokeStyle {
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter(10.0),
        }
    }
}

pub struct OutlineStrokeToFill<'a> {
    input: &'a Outline,
    output: Outline,
    style: StrokeStyle,
}

impl<'a> OutlineStrokeToFill<'a> {
    #[inline]
    pub fn new(input: &'a Outline, style: StrokeStyle) -> OutlineStrokeToFill<'a> {
        OutlineStrokeToFill { input, output: Outline::new(), style }
    }

    /// Performs the stroke-to-fill conversion.
    pub fn offset(&mut self) {
        if self.style.line_width <= 0.0 {
            return;
        }

        let radius = self.style.line_width * 0.5;
        let mut new_contours = vec![];

        for input in self.input.contours() {
            let closed = input.is_closed();
            let mut stroker =
                ContourStrokeToFill::new(input, Contour::new(), radius, self.style.line_join);

            // Outer loop.
            stroker.offset_forward();
            if closed {
                self.push_stroked_contour(&mut new_contours, stroker, true);
                stroker = ContourStrokeToFill::new(input,
                                                   Contour::new(),
                                                   radius,
                                                   self.style.line_join);
            } else {
                self.add_cap(&mut stroker.output);
            }

            // Inner loop.
            stroker.offset_backward();
            if !closed {
                self.add_cap(&mut stroker.output);
            }

            self.push_stroked_contour(&mut new_contours, stroker, closed);
        }

        for contour in new_contours {
            self.output.push_contour(contour);
        }
    }

    #[inline]
    pub fn into_outline(self) -> Outline {
        self.output
    }

    fn push_stroked_contour(&mut self,
                            new_contours: &mut Vec<Contour>,
                            mut stroker: ContourStrokeToFill,
                            closed: bool) {
        // Close the seam with a join.
        if closed && stroker.output.might_need_join() && joins_at_all(self.style.line_join) {
            let (p1, p0) = (stroker.output.position_of(1), stroker.output.position_of(0));
            let final_segment = LineSegment2F::new(p1, p0);
            stroker.output.add_join(self.style.line_width * 0.5,
                                    self.style.line_join,
                                    stroker.input.position_of(0),
                                    &final_segment);
        }

        stroker.output.close();
        new_contours.push(stroker.output);
    }

    fn add_cap(&self, contour: &mut Contour) {
        if self.style.line_cap == LineCap::Butt || contour.len() < 2 {
            return;
        }

        let width = self.style.line_width;
        let p1 = contour.position_of_last(1);

        // Walk backward past any coincident points to find the ending
        // direction.
        let mut p0;
        let mut p0_index = contour.len() - 2;
        loop {
            p0 = contour.position_of(p0_index);
            if (p1 - p0).square_length() > EPSILON {
                break;
            }
            if p0_index == 0 {
                return;
            }
            p0_index -= 1;
        }
        let gradient = (p1 - p0).normalize();

        match self.style.line_cap {
            LineCap::Butt => unreachable!(),
            LineCap::Square => {
                let offset = gradient.scale(width * 0.5);
                let p2 = p1 + offset;
                let p3 = p2 + gradient.yx().scale_xy(vec2f(-width, width));
                let p4 = p3 - offset;
                contour.push_endpoint(p2);
                contour.push_endpoint(p3);
                contour.push_endpoint(p4);
            }
            LineCap::Round => {
                let scale = width * 0.5;
                let offset = gradient.yx().scale_xy(vec2f(-1.0, 1.0));
                let translation = p1 + offset.scale(width * 0.5);
                let transform =
                    Transform2F::from_scale(Vector2F::splat(scale)).translate(translation);
                let chord = LineSegment2F::new(-offset, offset);
                contour.push_arc_from_unit_chord(&transform, chord, ArcDirection::CW);
            }
        }
    }
}

struct ContourStrokeToFill<'a> {
    input: &'a Contour,
    output: Contour,
    radius: f32,
    join: LineJoin,
}

impl<'a> ContourStrokeToFill<'a> {
    #[inline]
    fn new(input: &'a Contour, output: Contour, radius: f32, join: LineJoin)
           -> ContourStrokeToFill<'a> {
        ContourStrokeToFill { input, output, radius, join }
    }

    fn offset_forward(&mut self) {
        for (segment_index, segment) in
                self.input.iter(ContourIterFlags::empty()).enumerate() {
            // The radius is negated so that round joins sweep clockwise.
            let join = if segment_index == 0 { LineJoin::Bevel } else { self.join };
            segment.offset_and_push(-self.radius, join, &mut self.output);
        }
    }

    fn offset_backward(&mut self) {
        let mut segments: Vec<_> = self.input
                                       .iter(ContourIterFlags::empty())
                                       .map(|segment| segment.reversed())
                                       .collect();
        segments.reverse();
        for (segment_index, segment) in segments.iter().enumerate() {
            let join = if segment_index == 0 { LineJoin::Bevel } else { self.join };
            segment.offset_and_push(-self.radius, join, &mut self.output);
        }
    }
}

trait Offset {
    fn offset_and_push(&self, distance: f32, join: LineJoin, contour: &mut Contour);
    fn add_to_contour(&self, distance: f32, join: LineJoin, join_point: Vector2F,
                      contour: &mut Contour);
    fn offset_once(&self, distance: f32) -> Self;
    fn error_is_within_tolerance(&self, other: &Segment, distance: f32) -> bool;
}

impl Offset for Segment {
    fn offset_and_push(&self, distance: f32, join: LineJoin, contour: &mut Contour) {
        let join_point = self.baseline.from();
        if self.baseline.square_length() < STROKE_TOL * STROKE_TOL {
            // Degenerate segment; pass it through untouched.
            self.add_to_contour(distance, join, join_point, contour);
            return;
        }

        let candidate = self.offset_once(distance);
        if self.error_is_within_tolerance(&candidate, distance) {
            candidate.add_to_contour(distance, join, join_point, contour);
            return;
        }

        debug!("--- splitting ---");
        let (before, after) = self.split(0.5);
        before.offset_and_push(distance, join, contour);
        after.offset_and_push(distance, join, contour);
    }

    fn add_to_contour(&self,
                      distance: f32,
                      join: LineJoin,
                      join_point: Vector2F,
                      contour: &mut Contour) {
        // Add a join if necessary.
        if contour.might_need_join() && joins_at_all(join) {
            let p3 = self.baseline.from();
            let p4 = if self.is_line() {
                self.baseline.to()
            } else {
                // NB: this depends on the representation of quadratic
                // curves storing their control point in `ctrl.from`.
                self.ctrl.from()
            };

            contour.add_join(distance, join, join_point, &LineSegment2F::new(p4, p3));
        }

        contour.push_segment(self,
                             PushSegmentFlags::UPDATE_BOUNDS |
                             PushSegmentFlags::INCLUDE_FROM_POINT);
    }

    fn offset_once(&self, distance: f32) -> Segment {
        if self.is_line() {
            return Segment::line(self.baseline.offset(distance));
        }

        if self.is_quadratic() {
            let mut segment_0 = LineSegment2F::new(self.baseline.from(), self.ctrl.from());
            let mut segment_1 = LineSegment2F::new(self.ctrl.from(), self.baseline.to());
            segment_0 = segment_0.offset(distance);
            segment_1 = segment_1.offset(distance);
            let ctrl = match segment_0.intersection_t(segment_1) {
                Some(t) => segment_0.sample(t),
                None => segment_0.to().lerp(segment_1.from(), 0.5),
            };
            let baseline = LineSegment2F::new(segment_0.from(), segment_1.to());
            return Segment::quadratic(baseline, ctrl);
        }

        debug_assert!(self.is_cubic());

        if self.baseline.from() == self.ctrl.from() {
            // Degenerate, 3 distinct control points.
            let mut segment_0 = LineSegment2F::new(self.baseline.from(), self.ctrl.to());
            let mut segment_1 = LineSegment2F::new(self.ctrl.to(), self.baseline.to());
            segment_0 = segment_0.offset(distance);
            segment_1 = segment_1.offset(distance);
            let ctrl = match segment_0.intersection_t(segment_1) {
                Some(t) => segment_0.sample(t),
                None => segment_0.to().lerp(segment_1.from(), 0.5),
            };
            let baseline = LineSegment2F::new(segment_0.from(), segment_1.to());
            let ctrl = LineSegment2F::new(segment_0.from(), ctrl);
            return Segment::cubic(baseline, ctrl);
        }

        if self.ctrl.to() == self.baseline.to() {
            // Degenerate, 3 distinct control points.
            let mut segment_0 = LineSegment2F::new(self.baseline.from(), self.ctrl.from());
            let mut segment_1 = LineSegment2F::new(self.ctrl.from(), self.baseline.to());
            segment_0 = segment_0.offset(distance);
            segment_1 = segment_1.offset(distance);
            let ctrl = match segment_0.intersection_t(segment_1) {
                Some(t) => segment_0.sample(t),
                None => segment_0.to().lerp(segment_1.from(), 0.5),
            };
            let baseline = LineSegment2F::new(segment_0.from(), segment_1.to());
            let ctrl = LineSegment2F::new(ctrl, segment_1.to());
            return Segment::cubic(baseline, ctrl);
        }

        let mut segment_0 = LineSegment2F::new(self.baseline.from(), self.ctrl.from());
        let mut segment_1 = LineSegment2F::new(self.ctrl.from(), self.ctrl.to());
        let mut segment_2 = LineSegment2F::new(self.ctrl.to(), self.baseline.to());
        segment_0 = segment_0.offset(distance);
        segment_1 = segment_1.offset(distance);
        segment_2 = segment_2.offset(distance);
        let (ctrl_0, ctrl_1) = match (segment_0.intersection_t(segment_1),
                                      segment_1.intersection_t(segment_2)) {
            (Some(t0), Some(t1)) => (segment_0.sample(t0), segment_1.sample(t1)),
            _ => {
                (segment_0.to().lerp(segment_1.from(), 0.5),
                 segment_1.to().lerp(segment_2.from(), 0.5))
            }
        };
        let baseline = LineSegment2F::new(segment_0.from(), segment_2.to());
        let ctrl = LineSegment2F::new(ctrl_0, ctrl_1);
        Segment::cubic(baseline, ctrl)
    }

    fn error_is_within_tolerance(&self, other: &Segment, distance: f32) -> bool {
        let (mut min, mut max) = (distance.abs() - STROKE_TOL, distance.abs() + STROKE_TOL);
        min = if min <= 0.0 { 0.0 } else { min * min };
        max = if max <= 0.0 { 0.0 } else { max * max };

        for t_num in 0..(SAMPLE_COUNT + 1) {
            let t = t_num as f32 / SAMPLE_COUNT as f32;
            // FIXME: use signed distance!
            let (this_point, other_point) = (self.sample(t), other.sample(t));
            let vector = this_point - other_point;
            let square_distance = vector.square_length();
            debug!("this {:?} other {:?} dist {}",
                   this_point,
                   other_point,
                   square_distance.sqrt());
            if square_distance < min || square_distance > max {
                return false;
            }
        }

        true
    }
}

impl Contour {
    fn add_join(&mut self,
                distance: f32,
                join: LineJoin,
                join_point: Vector2F,
                next_tangent: &LineSegment2F) {
        let (p0, p1) = (self.position_of_last(2), self.position_of_last(1));
        let prev_tangent = LineSegment2F::new(p0, p1);

        if prev_tangent.square_length() < EPSILON || next_tangent.square_length() < EPSILON {
            return;
        }

        match join {
            LineJoin::Bevel => {}
            LineJoin::Miter(miter_limit) => {
                if let Some(prev_tangent_t) = prev_tangent.intersection_t(*next_tangent) {
                    if prev_tangent_t < -EPSILON {
                        return;
                    }
                    let miter_endpoint = prev_tangent.sample(prev_tangent_t);
                    let threshold = miter_limit * distance;
                    if (miter_endpoint - join_point).square_length() > threshold * threshold {
                        return;
                    }
                    self.push_endpoint(miter_endpoint);
                }
            }
            LineJoin::Round => {
                let scale = distance.abs();
                let transform =
                    Transform2F::from_scale(Vector2F::splat(scale)).translate(join_point);
                let chord_from = (prev_tangent.to() - join_point).normalize();
                let chord_to = (next_tangent.to() - join_point).normalize();
                let chord = LineSegment2F::new(chord_from, chord_to);
                self.push_arc_from_unit_chord(&transform, chord, ArcDirection::CW);
            }
        }
    }
}

#[inline]
fn joins_at_all(join: LineJoin) -> bool {
    match join {
        LineJoin::Bevel => false,
        LineJoin::Miter(_) | LineJoin::Round => true,
    }
}

#[cfg(test)]
mod tests {
    use super::{LineCap, LineJoin, OutlineStrokeToFill, StrokeStyle};
    use crate::outline::{Contour, ContourIterFlags, Outline};

    use tessera_geometry::vector::{Vector2F, vec2f};

    fn polygon_area(outline: &Outline) -> f32 {
        // Shoelace formula over flattened contours.
        let mut area = 0.0;
        for contour in outline.contours() {
            let mut points: Vec<Vector2F> = vec![];
            for segment in contour.iter(ContourIterFlags::empty()) {
                for sample_index in 0..16 {
                    points.push(segment.sample(sample_index as f32 / 16.0));
                }
            }
            let point_count = points.len();
            for point_index in 0..point_count {
                let p0 = points[point_index];
                let p1 = points[(point_index + 1) % point_count];
                area += p0.det(p1);
            }
        }
        area.abs() * 0.5
    }

    #[test]
    fn test_straight_line_stroke_area() {
        let (length, width) = (50.0, 8.0);
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(10.0, 20.0));
        contour.push_endpoint(vec2f(10.0 + length, 20.0));
        let mut outline = Outline::new();
        outline.push_contour(contour);

        let style = StrokeStyle {
            line_width: width,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter(10.0),
        };
        let mut stroke_to_fill = OutlineStrokeToFill::new(&outline, style);
        stroke_to_fill.offset();
        let filled = stroke_to_fill.into_outline();

        let area = polygon_area(&filled);
        let expected = length * width;
        assert!((area - expected).abs() <= width / 100.0 * length.max(1.0),
                "area {} expected {}",
                area,
                expected);
    }

    #[test]
    fn test_stroke_bounds_dilation() {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(0.0, 0.0));
        contour.push_endpoint(vec2f(100.0, 0.0));
        let mut outline = Outline::new();
        outline.push_contour(contour);

        let style = StrokeStyle {
            line_width: 10.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Bevel,
        };
        let mut stroke_to_fill = OutlineStrokeToFill::new(&outline, style);
        stroke_to_fill.offset();
        let bounds = stroke_to_fill.into_outline().bounds();

        assert!((bounds.min_y() - -5.0).abs() < 0.01);
        assert!((bounds.max_y() - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_round_join_adds_arc() {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(10.0, 50.0));
        contour.push_endpoint(vec2f(50.0, 10.0));
        contour.push_endpoint(vec2f(90.0, 50.0));
        let mut outline = Outline::new();
        outline.push_contour(contour);

        let style = StrokeStyle {
            line_width: 20.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Round,
        };
        let mut stroke_to_fill = OutlineStrokeToFill::new(&outline, style);
        stroke_to_fill.offset();
        let filled = stroke_to_fill.into_outline();

        // The convex corner at (50, 10) sweeps a disk of radius 10; the
        // topmost point of the stroke outline reaches y = 0.
        assert!(filled.bounds().min_y() < 0.5,
                "min_y {}",
                filled.bounds().min_y());
    }

    #[test]
    fn test_zero_width_stroke_produces_nothing() {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(0.0, 0.0));
        contour.push_endpoint(vec2f(10.0, 0.0));
        let mut outline = Outline::new();
        outline.push_contour(contour);

        let style = StrokeStyle {
            line_width: 0.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Bevel,
        };
        let mut stroke_to_fill = OutlineStrokeToFill::new(&outline, style);
        stroke_to_fill.offset();
        assert!(stroke_to_fill.into_outline().is_empty());
    }
}
