// tessera/content/src/clip.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Line-segment clipping against an axis-aligned rectangle, via
//! Cohen–Sutherland.

use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::rect::RectF;
use tessera_geometry::util::lerp;
use tessera_geometry::vector::{Vector2F, vec2f};

bitflags! {
    struct Outcode: u8 {
        const LEFT   = 0x01;
        const RIGHT  = 0x02;
        const TOP    = 0x04;
        const BOTTOM = 0x08;
    }
}

fn compute_outcode(point: Vector2F, rect: RectF) -> Outcode {
    let mut outcode = Outcode::empty();
    if point.x < rect.min_x() {
        outcode.insert(Outcode::LEFT);
    } else if point.x > rect.max_x() {
        outcode.insert(Outcode::RIGHT);
    }
    if point.y < rect.min_y() {
        outcode.insert(Outcode::TOP);
    } else if point.y > rect.max_y() {
        outcode.insert(Outcode::BOTTOM);
    }
    outcode
}

/// Clips the line segment to the rect, returning `None` if it falls
/// entirely outside.
///
/// Infinite rect edges are supported; the tiler relies on a view box whose
/// top edge is pushed to −∞.
pub fn clip_line_segment_to_rect(mut line_segment: LineSegment2F, rect: RectF)
                                 -> Option<LineSegment2F> {
    let mut outcode_from = compute_outcode(line_segment.from(), rect);
    let mut outcode_to = compute_outcode(line_segment.to(), rect);

    loop {
        if outcode_from.is_empty() && outcode_to.is_empty() {
            return Some(line_segment);
        }
        if !(outcode_from & outcode_to).is_empty() {
            return None;
        }

        let clip_from = outcode_from.bits() > outcode_to.bits();
        let outcode = if clip_from { outcode_from } else { outcode_to };

        let clipped = if outcode.contains(Outcode::LEFT) {
            vec2f(rect.min_x(),
                  lerp(line_segment.from_y(),
                       line_segment.to_y(),
                       (rect.min_x() - line_segment.from_x()) /
                       (line_segment.to_x() - line_segment.from_x())))
        } else if outcode.contains(Outcode::RIGHT) {
            vec2f(rect.max_x(),
                  lerp(line_segment.from_y(),
                       line_segment.to_y(),
                       (rect.max_x() - line_segment.from_x()) /
                       (line_segment.to_x() - line_segment.from_x())))
        } else if outcode.contains(Outcode::TOP) {
            vec2f(lerp(line_segment.from_x(),
                       line_segment.to_x(),
                       (rect.min_y() - line_segment.from_y()) /
                       (line_segment.to_y() - line_segment.from_y())),
                  rect.min_y())
        } else {
            debug_assert!(outcode.contains(Outcode::BOTTOM));
            vec2f(lerp(line_segment.from_x(),
                       line_segment.to_x(),
                       (rect.max_y() - line_segment.from_y()) /
                       (line_segment.to_y() - line_segment.from_y())),
                  rect.max_y())
        };

        if clip_from {
            line_segment.set_from(clipped);
            outcode_from = compute_outcode(clipped, rect);
        } else {
            line_segment.set_to(clipped);
            outcode_to = compute_outcode(clipped, rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::clip_line_segment_to_rect;
    use tessera_geometry::line_segment::LineSegment2F;
    use tessera_geometry::rect::RectF;
    use tessera_geometry::vector::vec2f;

    #[test]
    fn test_fully_inside() {
        let rect = RectF::new(vec2f(0.0, 0.0), vec2f(10.0, 10.0));
        let segment = LineSegment2F::new(vec2f(1.0, 1.0), vec2f(9.0, 9.0));
        assert_eq!(clip_line_segment_to_rect(segment, rect), Some(segment));
    }

    #[test]
    fn test_fully_outside() {
        let rect = RectF::new(vec2f(0.0, 0.0), vec2f(10.0, 10.0));
        let segment = LineSegment2F::new(vec2f(20.0, 0.0), vec2f(20.0, 10.0));
        assert_eq!(clip_line_segment_to_rect(segment, rect), None);
    }

    #[test]
    fn test_straddling() {
        let rect = RectF::new(vec2f(0.0, 0.0), vec2f(10.0, 10.0));
        let segment = LineSegment2F::new(vec2f(-10.0, 5.0), vec2f(30.0, 5.0));
        let clipped = clip_line_segment_to_rect(segment, rect).unwrap();
        assert_eq!(clipped.from(), vec2f(0.0, 5.0));
        assert_eq!(clipped.to(), vec2f(10.0, 5.0));
    }

    #[test]
    fn test_open_top_edge() {
        use std::f32::NEG_INFINITY;
        let rect = RectF::from_points(vec2f(0.0, NEG_INFINITY), vec2f(10.0, 10.0));
        let segment = LineSegment2F::new(vec2f(5.0, -100.0), vec2f(5.0, 5.0));
        let clipped = clip_line_segment_to_rect(segment, rect).unwrap();
        assert_eq!(clipped, segment);
    }
}
