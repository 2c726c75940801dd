// tessera/content/src/outline.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A compressed in-memory representation of paths.

use crate::segment::{Segment, SegmentFlags, SegmentKind};
use std::f32::consts::PI;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::rect::RectF;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::unit_vector::UnitVector;
use tessera_geometry::util::EPSILON;
use tessera_geometry::vector::{Vector2F, vec2f};

/// An ordered list of contours with a cached union bounding rect.
///
/// Contour order is meaningful: it determines winding.
#[derive(Clone, Default)]
pub struct Outline {
    contours: Vec<Contour>,
    bounds: RectF,
}

/// An ordered sequence of on-curve and control points.
#[derive(Clone, Default)]
pub struct Contour {
    points: Vec<Vector2F>,
    flags: Vec<PointFlags>,
    bounds: RectF,
    closed: bool,
}

bitflags! {
    /// Flags that each point can carry.
    pub struct PointFlags: u8 {
        /// This point is the first control point of a curve.
        const CONTROL_POINT_0 = 0x01;
        /// This point is the second control point of a cubic curve.
        const CONTROL_POINT_1 = 0x02;
    }
}

bitflags! {
    pub struct PushSegmentFlags: u8 {
        /// The bounds should be updated.
        const UPDATE_BOUNDS = 0x01;
        /// The "from" point of the segment should be added.
        const INCLUDE_FROM_POINT = 0x02;
    }
}

bitflags! {
    pub struct ContourIterFlags: u8 {
        /// The implicit closing segment of a closed contour is skipped.
        const IGNORE_CLOSE_SEGMENT = 0x01;
    }
}

/// The direction of an arc: clockwise or counterclockwise.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ArcDirection {
    CW,
    CCW,
}

impl Outline {
    #[inline]
    pub fn new() -> Outline {
        Outline { contours: vec![], bounds: RectF::default() }
    }

    /// Builds an outline from an iterator of segments, splitting contours
    /// at FIRST_IN_CONTOUR flags.
    pub fn from_segments<I>(segments: I) -> Outline where I: Iterator<Item = Segment> {
        let mut outline = Outline::new();
        let mut current_contour = Contour::new();

        for segment in segments {
            if segment.flags.contains(SegmentFlags::FIRST_IN_CONTOUR) {
                if !current_contour.is_empty() {
                    outline.push_contour(mem::replace(&mut current_contour, Contour::new()));
                }
                current_contour.push_point(segment.baseline.from(),
                                           PointFlags::empty(),
                                           true);
            }

            if segment.flags.contains(SegmentFlags::CLOSES_CONTOUR) {
                if !current_contour.is_empty() {
                    current_contour.close();
                    outline.push_contour(mem::replace(&mut current_contour, Contour::new()));
                }
                continue;
            }

            if segment.is_none() {
                continue;
            }

            match segment.kind {
                SegmentKind::None => {}
                SegmentKind::Line => {}
                SegmentKind::Quadratic => {
                    current_contour.push_point(segment.ctrl.from(),
                                               PointFlags::CONTROL_POINT_0,
                                               true);
                }
                SegmentKind::Cubic => {
                    current_contour.push_point(segment.ctrl.from(),
                                               PointFlags::CONTROL_POINT_0,
                                               true);
                    current_contour.push_point(segment.ctrl.to(),
                                               PointFlags::CONTROL_POINT_1,
                                               true);
                }
            }

            current_contour.push_point(segment.baseline.to(), PointFlags::empty(), true);
        }

        if !current_contour.is_empty() {
            outline.push_contour(current_contour);
        }

        outline
    }

    #[inline]
    pub fn from_rect(rect: RectF) -> Outline {
        let mut outline = Outline::new();
        outline.push_contour(Contour::from_rect(rect));
        outline
    }

    #[inline]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    #[inline]
    pub fn into_contours(self) -> Vec<Contour> {
        self.contours
    }

    #[inline]
    pub fn bounds(&self) -> RectF {
        self.bounds
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Adds a contour, dropping degenerate ones and folding its bounds
    /// into the outline's.
    pub fn push_contour(&mut self, contour: Contour) {
        if contour.is_empty() {
            return;
        }
        if !contour.bounds.is_finite() {
            warn!("dropping contour with non-finite bounds");
            return;
        }

        if self.contours.is_empty() {
            self.bounds = contour.bounds;
        } else {
            self.bounds = self.bounds.union_rect(contour.bounds);
        }

        self.contours.push(contour);
    }

    #[inline]
    pub fn pop_contour(&mut self) -> Option<Contour> {
        let last_contour = self.contours.pop();
        let mut new_bounds = None;
        for contour in &mut self.contours {
            contour.update_cached_bounds(&mut new_bounds);
        }
        self.bounds = new_bounds.unwrap_or_default();
        last_contour
    }

    pub fn transform(&mut self, transform: &Transform2F) {
        if transform.is_identity() {
            return;
        }

        let mut new_bounds = None;
        for contour in &mut self.contours {
            contour.transform(transform);
            contour.update_cached_bounds(&mut new_bounds);
        }
        self.bounds = new_bounds.unwrap_or_default();
    }

    pub fn close_all_contours(&mut self) {
        self.contours.iter_mut().for_each(|contour| contour.close());
    }
}

impl Debug for Outline {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        for (contour_index, contour) in self.contours.iter().enumerate() {
            if contour_index > 0 {
                write!(formatter, " ")?;
            }
            contour.fmt(formatter)?;
        }
        Ok(())
    }
}

impl Contour {
    #[inline]
    pub fn new() -> Contour {
        Contour { points: vec![], flags: vec![], bounds: RectF::default(), closed: false }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Contour {
        Contour {
            points: Vec::with_capacity(capacity),
            flags: Vec::with_capacity(capacity),
            bounds: RectF::default(),
            closed: false,
        }
    }

    #[inline]
    pub fn from_rect(rect: RectF) -> Contour {
        let mut contour = Contour::with_capacity(4);
        contour.push_point(rect.origin(), PointFlags::empty(), false);
        contour.push_point(rect.upper_right(), PointFlags::empty(), false);
        contour.push_point(rect.lower_right(), PointFlags::empty(), false);
        contour.push_point(rect.lower_left(), PointFlags::empty(), false);
        contour.close();
        contour.bounds = rect;
        contour
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.points.len() as u32
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn bounds(&self) -> RectF {
        self.bounds
    }

    #[inline]
    pub fn points(&self) -> &[Vector2F] {
        &self.points
    }

    #[inline]
    pub fn position_of(&self, index: u32) -> Vector2F {
        self.points[index as usize]
    }

    #[inline]
    pub fn flags_of(&self, index: u32) -> PointFlags {
        self.flags[index as usize]
    }

    #[inline]
    pub fn first_position(&self) -> Option<Vector2F> {
        self.points.first().cloned()
    }

    #[inline]
    pub fn last_position(&self) -> Option<Vector2F> {
        self.points.last().cloned()
    }

    /// The position of the point `index_from_end` points before the end.
    #[inline]
    pub fn position_of_last(&self, index_from_end: u32) -> Vector2F {
        self.points[self.points.len() - index_from_end as usize]
    }

    #[inline]
    pub fn close(&mut self) {
        self.closed = true;
    }

    #[inline]
    pub(crate) fn push_point(&mut self,
                             point: Vector2F,
                             flags: PointFlags,
                             update_bounds: bool) {
        debug_assert!(point.is_finite());

        if update_bounds {
            let first = self.is_empty();
            union_rect(&mut self.bounds, point, first);
        }

        self.points.push(point);
        self.flags.push(flags);
    }

    #[inline]
    pub fn push_endpoint(&mut self, to: Vector2F) {
        self.push_point(to, PointFlags::empty(), true);
    }

    #[inline]
    pub fn push_quadratic(&mut self, ctrl: Vector2F, to: Vector2F) {
        self.push_point(ctrl, PointFlags::CONTROL_POINT_0, true);
        self.push_point(to, PointFlags::empty(), true);
    }

    #[inline]
    pub fn push_cubic(&mut self, ctrl0: Vector2F, ctrl1: Vector2F, to: Vector2F) {
        self.push_point(ctrl0, PointFlags::CONTROL_POINT_0, true);
        self.push_point(ctrl1, PointFlags::CONTROL_POINT_1, true);
        self.push_point(to, PointFlags::empty(), true);
    }

    pub fn push_segment(&mut self, segment: &Segment, flags: PushSegmentFlags) {
        if segment.is_none() {
            return;
        }

        let update_bounds = flags.contains(PushSegmentFlags::UPDATE_BOUNDS);
        if flags.contains(PushSegmentFlags::INCLUDE_FROM_POINT) {
            self.push_point(segment.baseline.from(), PointFlags::empty(), update_bounds);
        }

        if !segment.is_line() {
            self.push_point(segment.ctrl.from(), PointFlags::CONTROL_POINT_0, update_bounds);
            if !segment.is_quadratic() {
                self.push_point(segment.ctrl.to(), PointFlags::CONTROL_POINT_1, update_bounds);
            }
        }

        self.push_point(segment.baseline.to(), PointFlags::empty(), update_bounds);
    }

    /// Adds an arc of the circle defined by `transform` applied to the
    /// unit circle, from `start_angle` to `end_angle`.
    pub fn push_arc(&mut self,
                    transform: &Transform2F,
                    start_angle: f32,
                    end_angle: f32,
                    direction: ArcDirection) {
        if end_angle - start_angle >= PI * 2.0 {
            self.push_ellipse(transform);
        } else {
            let start = vec2f(start_angle.cos(), start_angle.sin());
            let end = vec2f(end_angle.cos(), end_angle.sin());
            self.push_arc_from_unit_chord(transform, LineSegment2F::new(start, end), direction);
        }
    }

    /// Given the endpoints of a unit-circle chord, adds up to four cubic
    /// curves approximating the arc between them, under `transform`.
    pub fn push_arc_from_unit_chord(&mut self,
                                    transform: &Transform2F,
                                    mut chord: LineSegment2F,
                                    direction: ArcDirection) {
        let mut direction_transform = Transform2F::default();
        if direction == ArcDirection::CCW {
            chord = chord * vec2f(1.0, -1.0);
            direction_transform = Transform2F::from_scale(vec2f(1.0, -1.0));
        }

        let (mut vector, end_vector) = (UnitVector(chord.from()), UnitVector(chord.to()));
        for segment_index in 0..4 {
            debug!("push_arc_from_unit_chord(): segment index {}", segment_index);

            let mut sweep_vector = end_vector.rev_rotate_by(vector);
            let last = sweep_vector.0.x >= -EPSILON && sweep_vector.0.y >= -EPSILON;

            let mut segment;
            if !last {
                sweep_vector = UnitVector(vec2f(0.0, 1.0));
                segment = Segment::quarter_circle_arc();
            } else {
                segment = Segment::arc_from_cos(sweep_vector.0.x);
            }

            let half_sweep_vector = sweep_vector.halve_angle();
            let rotation =
                Transform2F::from_rotation_vector(half_sweep_vector.rotate_by(vector));
            segment = segment.transform(&(*transform * direction_transform * rotation));

            let mut push_segment_flags = PushSegmentFlags::UPDATE_BOUNDS;
            if segment_index == 0 {
                push_segment_flags.insert(PushSegmentFlags::INCLUDE_FROM_POINT);
            }
            self.push_segment(&segment, push_segment_flags);

            if last {
                break;
            }

            vector = vector.rotate_by(sweep_vector);
        }
    }

    /// Adds a whole ellipse, the unit circle under `transform`.
    pub fn push_ellipse(&mut self, transform: &Transform2F) {
        let segment = Segment::quarter_circle_arc();
        let mut rotation;
        self.push_segment(&segment.transform(transform),
                          PushSegmentFlags::UPDATE_BOUNDS | PushSegmentFlags::INCLUDE_FROM_POINT);
        rotation = Transform2F::from_rotation_vector(UnitVector(vec2f(0.0, 1.0)));
        self.push_segment(&segment.transform(&(*transform * rotation)),
                          PushSegmentFlags::UPDATE_BOUNDS);
        rotation = Transform2F::from_rotation_vector(UnitVector(vec2f(-1.0, 0.0)));
        self.push_segment(&segment.transform(&(*transform * rotation)),
                          PushSegmentFlags::UPDATE_BOUNDS);
        rotation = Transform2F::from_rotation_vector(UnitVector(vec2f(0.0, -1.0)));
        self.push_segment(&segment.transform(&(*transform * rotation)),
                          PushSegmentFlags::UPDATE_BOUNDS);
        self.close();
    }

    #[inline]
    pub fn iter(&self, flags: ContourIterFlags) -> ContourIter {
        ContourIter { contour: self, index: 1, flags }
    }

    pub fn transform(&mut self, transform: &Transform2F) {
        if transform.is_identity() {
            return;
        }

        for (point_index, point) in self.points.iter_mut().enumerate() {
            *point = *transform * *point;
            union_rect(&mut self.bounds, *point, point_index == 0);
        }
    }

    pub(crate) fn update_cached_bounds(&mut self, outline_bounds: &mut Option<RectF>) {
        let mut bounds = None;
        for &point in &self.points {
            match bounds {
                None => bounds = Some(RectF::new(point, Vector2F::zero())),
                Some(ref mut bounds) => *bounds = bounds.union_point(point),
            }
        }
        self.bounds = bounds.unwrap_or_default();

        *outline_bounds = Some(match *outline_bounds {
            None => self.bounds,
            Some(old_bounds) => old_bounds.union_rect(self.bounds),
        });
    }

    /// True if a join might be needed when appending to this contour.
    #[inline]
    pub(crate) fn might_need_join(&self) -> bool {
        self.points.len() >= 2
    }
}

impl Debug for Contour {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        for (segment_index, segment) in self.iter(ContourIterFlags::empty()).enumerate() {
            if segment_index == 0 {
                write!(formatter,
                       "M {} {}",
                       segment.baseline.from_x(),
                       segment.baseline.from_y())?;
            }

            match segment.kind {
                SegmentKind::None => {}
                SegmentKind::Line => {
                    write!(formatter,
                           " L {} {}",
                           segment.baseline.to_x(),
                           segment.baseline.to_y())?;
                }
                SegmentKind::Quadratic => {
                    write!(formatter,
                           " Q {} {} {} {}",
                           segment.ctrl.from_x(),
                           segment.ctrl.from_y(),
                           segment.baseline.to_x(),
                           segment.baseline.to_y())?;
                }
                SegmentKind::Cubic => {
                    write!(formatter,
                           " C {} {} {} {} {} {}",
                           segment.ctrl.from_x(),
                           segment.ctrl.from_y(),
                           segment.ctrl.to_x(),
                           segment.ctrl.to_y(),
                           segment.baseline.to_x(),
                           segment.baseline.to_y())?;
                }
            }
        }

        if self.closed {
            write!(formatter, " z")?;
        }

        Ok(())
    }
}

/// Iterates over the segments of a contour.
pub struct ContourIter<'a> {
    contour: &'a Contour,
    index: u32,
    flags: ContourIterFlags,
}

impl<'a> Iterator for ContourIter<'a> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let contour = self.contour;

        let include_close_segment = contour.closed &&
            !self.flags.contains(ContourIterFlags::IGNORE_CLOSE_SEGMENT);
        if (self.index == contour.len() && !include_close_segment) ||
                self.index == contour.len() + 1 {
            return None;
        }

        let point0_index = self.index - 1;
        let point0 = contour.position_of(point0_index);
        if self.index == contour.len() {
            let point1 = contour.position_of(0);
            self.index += 1;
            return Some(Segment::line(LineSegment2F::new(point0, point1)));
        }

        let point1_index = self.index;
        self.index += 1;
        let point1 = contour.position_of(point1_index);
        if contour.flags_of(point1_index).is_empty() {
            return Some(Segment::line(LineSegment2F::new(point0, point1)));
        }

        let point2_index = self.index;
        let point2 = contour.position_of(point2_index);
        self.index += 1;
        if contour.flags_of(point2_index).is_empty() {
            return Some(Segment::quadratic(LineSegment2F::new(point0, point2), point1));
        }

        debug_assert!(contour.flags_of(point2_index).contains(PointFlags::CONTROL_POINT_1));
        let point3_index = self.index;
        let point3 = contour.position_of(point3_index);
        self.index += 1;
        debug_assert!(contour.flags_of(point3_index).is_empty());
        Some(Segment::cubic(LineSegment2F::new(point0, point3),
                            LineSegment2F::new(point1, point2)))
    }
}

#[inline]
fn union_rect(bounds: &mut RectF, new_point: Vector2F, first: bool) {
    if first {
        *bounds = RectF::new(new_point, Vector2F::zero());
    } else {
        *bounds = bounds.union_point(new_point)
    }
}

#[cfg(test)]
mod tests {
    use super::{ArcDirection, Contour, ContourIterFlags, Outline};
    use crate::segment::SegmentKind;
    use std::f32::consts::PI;
    use tessera_geometry::rect::RectF;
    use tessera_geometry::transform2d::Transform2F;
    use tessera_geometry::vector::{Vector2F, vec2f};

    #[test]
    fn test_rect_contour_iteration() {
        let contour = Contour::from_rect(RectF::new(vec2f(0.0, 0.0), vec2f(4.0, 4.0)));
        let segments: Vec<_> = contour.iter(ContourIterFlags::empty()).collect();
        assert_eq!(segments.len(), 4);
        assert!(segments.iter().all(|segment| segment.kind == SegmentKind::Line));
        assert_eq!(segments[3].baseline.to(), vec2f(0.0, 0.0));

        let open: Vec<_> = contour.iter(ContourIterFlags::IGNORE_CLOSE_SEGMENT).collect();
        assert_eq!(open.len(), 3);
    }

    #[test]
    fn test_mixed_contour_iteration() {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(0.0, 0.0));
        contour.push_quadratic(vec2f(1.0, 1.0), vec2f(2.0, 0.0));
        contour.push_cubic(vec2f(3.0, 1.0), vec2f(4.0, -1.0), vec2f(5.0, 0.0));
        contour.push_endpoint(vec2f(6.0, 0.0));

        let kinds: Vec<_> =
            contour.iter(ContourIterFlags::empty()).map(|segment| segment.kind).collect();
        assert_eq!(kinds,
                   [SegmentKind::Quadratic, SegmentKind::Cubic, SegmentKind::Line]);
    }

    #[test]
    fn test_bounds_update() {
        let mut outline = Outline::new();
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(-1.0, -2.0));
        contour.push_endpoint(vec2f(4.0, 6.0));
        outline.push_contour(contour);
        assert_eq!(outline.bounds(), RectF::from_points(vec2f(-1.0, -2.0), vec2f(4.0, 6.0)));
    }

    #[test]
    fn test_degenerate_contour_dropped() {
        let mut outline = Outline::new();
        outline.push_contour(Contour::new());
        assert!(outline.is_empty());
    }

    #[test]
    fn test_full_circle_arc_stays_on_circle() {
        let mut contour = Contour::new();
        let transform = Transform2F::from_uniform_scale(10.0);
        contour.push_arc(&transform, 0.0, PI * 2.0, ArcDirection::CW);

        for segment in contour.iter(ContourIterFlags::IGNORE_CLOSE_SEGMENT) {
            for sample_index in 0..9 {
                let point = segment.sample(sample_index as f32 / 8.0);
                let radius = point.length();
                assert!((radius - 10.0).abs() < 0.1, "radius {}", radius);
            }
        }
    }

    #[test]
    fn test_transform_updates_bounds() {
        let mut outline = Outline::from_rect(RectF::new(Vector2F::zero(), vec2f(2.0, 2.0)));
        outline.transform(&Transform2F::from_translation(vec2f(10.0, 0.0)));
        assert_eq!(outline.bounds().origin(), vec2f(10.0, 0.0));
    }
}
