// tessera/renderer/src/tiler.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The CPU tiler: walks each path segment across tile boundaries with
//! Amanatides–Woo voxel traversal and emits fills and backdrop deltas.

use crate::builder::{BuiltPath, ObjectBuilder};
use crate::gpu_data::AlphaTileId;
use crate::tiles::{TILE_HEIGHT, TILE_WIDTH, TilingPathInfo};
use std::sync::atomic::AtomicU32;
use tessera_content::clip::clip_line_segment_to_rect;
use tessera_content::fill::FillRule;
use tessera_content::outline::{ContourIterFlags, Outline};
use tessera_content::segment::Segment;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::rect::RectF;
use tessera_geometry::vector::{Vector2F, Vector2I, vec2f, vec2i};
use std::f32::NEG_INFINITY;

const FLATTENING_TOLERANCE: f32 = 0.25;

pub(crate) struct Tiler<'a> {
    next_alpha_tile_index: &'a AtomicU32,
    pub(crate) object_builder: ObjectBuilder,
    outline: &'a Outline,
    view_box: RectF,
    clip_path: Option<&'a BuiltPath>,
}

impl<'a> Tiler<'a> {
    pub(crate) fn new(next_alpha_tile_index: &'a AtomicU32,
                      path_id: u32,
                      outline: &'a Outline,
                      fill_rule: FillRule,
                      view_box: RectF,
                      clip_path: Option<&'a BuiltPath>,
                      path_info: &TilingPathInfo)
                      -> Tiler<'a> {
        let bounds = outline.bounds().intersection(view_box).unwrap_or(RectF::default());
        let object_builder =
            ObjectBuilder::new(path_id, bounds, view_box, fill_rule, path_info);
        Tiler { next_alpha_tile_index, object_builder, outline, view_box, clip_path }
    }

    pub(crate) fn generate_tiles(&mut self) {
        self.generate_fills();
        self.prepare_tiles();
    }

    fn generate_fills(&mut self) {
        for contour in self.outline.contours() {
            for segment in contour.iter(ContourIterFlags::empty()) {
                process_segment(&segment,
                                self.view_box,
                                self.next_alpha_tile_index,
                                &mut self.object_builder);
            }
        }
    }

    /// Sweeps each tile row left to right, prefix-summing backdrop deltas
    /// into final backdrop values, and applies the clip path if there is
    /// one.
    fn prepare_tiles(&mut self) {
        let built_path = &mut self.object_builder.built_path;
        let (backdrops, tiles, clips) =
            (&mut built_path.backdrops, &mut built_path.tiles, &mut built_path.clip_tiles);

        let tiles_across = tiles.rect.width() as usize;
        for (draw_tile_index, draw_tile) in tiles.data.iter_mut().enumerate() {
            let tile_coords = vec2i(draw_tile.tile_x as i32, draw_tile.tile_y as i32);
            let column = draw_tile_index % tiles_across;
            let delta = draw_tile.backdrop as i32;

            let mut draw_alpha_tile_id = draw_tile.alpha_tile_id;
            let mut draw_tile_backdrop = backdrops[column] as i8;

            if let Some(built_clip_path) = self.clip_path {
                match built_clip_path.tiles.get(tile_coords) {
                    Some(clip_tile) => {
                        if clip_tile.alpha_tile_id.is_valid() &&
                                draw_alpha_tile_id.is_valid() {
                            // Hard case: both the draw tile and the clip
                            // tile carry masks. Add a job to combine them.
                            // The combine step applies the backdrops, so
                            // zero out the draw backdrop to avoid counting
                            // it twice.
                            let clip = clips.as_mut()
                                            .expect("where are the clip tiles?")
                                            .get_mut(tile_coords)
                                            .unwrap();
                            clip.dest_tile_id = draw_alpha_tile_id;
                            clip.dest_backdrop = draw_tile_backdrop as i32;
                            clip.src_tile_id = clip_tile.alpha_tile_id;
                            clip.src_backdrop = clip_tile.backdrop as i32;
                            draw_tile_backdrop = 0;
                        } else if clip_tile.alpha_tile_id.is_valid() &&
                                !draw_alpha_tile_id.is_valid() &&
                                draw_tile_backdrop != 0 {
                            // The draw tile is solid but the clip has a
                            // mask: point the draw tile at the clip mask.
                            draw_alpha_tile_id = clip_tile.alpha_tile_id;
                            draw_tile_backdrop = clip_tile.backdrop;
                        } else if !clip_tile.alpha_tile_id.is_valid() &&
                                clip_tile.backdrop == 0 {
                            // Blank clip tile: cull the draw tile.
                            draw_alpha_tile_id = AlphaTileId::invalid();
                            draw_tile_backdrop = 0;
                        }
                    }
                    None => {
                        // Outside the clip path entirely.
                        draw_alpha_tile_id = AlphaTileId::invalid();
                        draw_tile_backdrop = 0;
                    }
                }
            }

            draw_tile.alpha_tile_id = draw_alpha_tile_id;
            draw_tile.backdrop = draw_tile_backdrop;

            // Add the local winding delta to the running column total.
            backdrops[column] += delta;
        }
    }
}

fn process_segment(segment: &Segment,
                   view_box: RectF,
                   next_alpha_tile_index: &AtomicU32,
                   object_builder: &mut ObjectBuilder) {
    // TODO(tessera): stop degree-elevating.
    if segment.is_quadratic() {
        let cubic = segment.to_cubic();
        return process_segment(&cubic, view_box, next_alpha_tile_index, object_builder);
    }

    if segment.is_line() ||
            (segment.is_cubic() && segment.is_flat(FLATTENING_TOLERANCE)) {
        return process_line_segment(segment.baseline,
                                    view_box,
                                    next_alpha_tile_index,
                                    object_builder);
    }

    let (prev, next) = segment.split(0.5);
    process_segment(&prev, view_box, next_alpha_tile_index, object_builder);
    process_segment(&next, view_box, next_alpha_tile_index, object_builder);
}

/// Steps across tile boundaries with the grid traversal of Amanatides and
/// Woo, "A Fast Voxel Traversal Algorithm for Ray Tracing" 1987.
fn process_line_segment(line_segment: LineSegment2F,
                        view_box: RectF,
                        next_alpha_tile_index: &AtomicU32,
                        object_builder: &mut ObjectBuilder) {
    // Clip to the view box. The top edge is pushed to −∞ because winding
    // is accumulated from above.
    let clip_box = RectF::from_points(vec2f(view_box.min_x(), NEG_INFINITY),
                                      view_box.lower_right());
    let line_segment = match clip_line_segment_to_rect(line_segment, clip_box) {
        None => return,
        Some(line_segment) => line_segment,
    };

    let tile_size = vec2f(TILE_WIDTH as f32, TILE_HEIGHT as f32);

    let from_tile_coords = object_builder.tile_coords(line_segment.from());
    let to_tile_coords = object_builder.tile_coords(line_segment.to());

    let vector = line_segment.vector();

    // The direction to step through the grid.
    let step = vec2i(if vector.x < 0.0 { -1 } else { 1 },
                     if vector.y < 0.0 { -1 } else { 1 });

    // Real coordinates of the first vertical and horizontal tile crossings.
    let first_tile_crossing = (from_tile_coords +
        vec2i(if vector.x >= 0.0 { 1 } else { 0 },
              if vector.y >= 0.0 { 1 } else { 0 })).to_f32().scale_xy(tile_size);

    let mut t_max = (first_tile_crossing - line_segment.from()) / vector;
    let t_delta = (tile_size / vector).abs();

    let mut current_position = line_segment.from();
    let mut tile_coords = from_tile_coords;
    let mut last_step_direction = None;

    loop {
        let next_step_direction = if t_max.x < t_max.y {
            StepDirection::X
        } else if t_max.x > t_max.y {
            StepDirection::Y
        } else {
            // The line's destination is exactly on a corner point between
            // tiles. Step in the positive direction to reach the lower
            // right tile.
            if step.x > 0 {
                StepDirection::X
            } else {
                StepDirection::Y
            }
        };

        let next_t = (if next_step_direction == StepDirection::X {
            t_max.x
        } else {
            t_max.y
        }).min(1.0);

        // If we've reached the end tile, don't step at all.
        let next_step_direction = if tile_coords == to_tile_coords {
            None
        } else {
            Some(next_step_direction)
        };

        let next_position = line_segment.sample(next_t);
        let clipped_line_segment = LineSegment2F::new(current_position, next_position);
        object_builder.add_fill(next_alpha_tile_index, clipped_line_segment, tile_coords);

        // Add an auxiliary fill when the segment crosses a horizontal tile
        // boundary, so the boundary is represented in both tiles.
        if step.y < 0 && next_step_direction == Some(StepDirection::Y) {
            // Leaves through the top boundary.
            let auxiliary_segment =
                LineSegment2F::new(clipped_line_segment.to(),
                                   tile_coords.to_f32().scale_xy(tile_size));
            object_builder.add_fill(next_alpha_tile_index, auxiliary_segment, tile_coords);
        } else if step.y > 0 && last_step_direction == Some(StepDirection::Y) {
            // Enters through the top boundary.
            let auxiliary_segment =
                LineSegment2F::new(tile_coords.to_f32().scale_xy(tile_size),
                                   clipped_line_segment.from());
            object_builder.add_fill(next_alpha_tile_index, auxiliary_segment, tile_coords);
        }

        // Adjust the backdrop on vertical tile-boundary crossings, which
        // propagates winding along the row.
        if step.x < 0 && last_step_direction == Some(StepDirection::X) {
            // Entered through the right boundary.
            object_builder.adjust_alpha_tile_backdrop(tile_coords, 1);
        } else if step.x > 0 && next_step_direction == Some(StepDirection::X) {
            // Leaving through the right boundary.
            object_builder.adjust_alpha_tile_backdrop(tile_coords, -1);
        }

        // Take a step.
        match next_step_direction {
            None => break,
            Some(StepDirection::X) => {
                t_max.x += t_delta.x;
                tile_coords += vec2i(step.x, 0);
            }
            Some(StepDirection::Y) => {
                t_max.y += t_delta.y;
                tile_coords += vec2i(0, step.y);
            }
        }

        current_position = next_position;
        last_step_direction = next_step_direction;
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum StepDirection {
    X,
    Y,
}

#[cfg(test)]
mod tests {
    use super::Tiler;
    use crate::builder::ObjectBuilder;
    use crate::paint::{Paint, PaintId, PaintMetadata};
    use crate::tiles::{DrawTilingPathInfo, TilingPathInfo};
    use std::sync::atomic::AtomicU32;
    use tessera_content::effects::BlendMode;
    use tessera_content::fill::FillRule;
    use tessera_content::outline::{Contour, Outline};
    use tessera_geometry::rect::RectF;
    use tessera_geometry::transform2d::Transform2F;
    use tessera_geometry::vector::{vec2f, vec2i};

    fn opaque_metadata() -> PaintMetadata {
        let mut palette = crate::paint::Palette::new(0);
        palette.push_paint(&Paint::from_color(tessera_color::ColorU::black()));
        let mut info = palette.build_paint_info(Transform2F::default());
        info.paint_metadata.remove(0)
    }

    fn tile_outline(outline: &Outline,
                    fill_rule: FillRule,
                    view_box: RectF,
                    prepare: bool)
                    -> ObjectBuilder {
        let counter = AtomicU32::new(0);
        let metadata = opaque_metadata();
        let path_info = TilingPathInfo::Draw(DrawTilingPathInfo {
            paint_id: PaintId(0),
            paint_metadata: &metadata,
            blend_mode: BlendMode::SrcOver,
            clip_path_id: None,
            fill_rule,
        });
        let mut tiler =
            Tiler::new(&counter, 0, outline, fill_rule, view_box, None, &path_info);
        tiler.generate_fills();
        if prepare {
            tiler.prepare_tiles();
        }
        tiler.object_builder
    }

    fn tile_rect_path(rect: RectF, view_box: RectF, prepare: bool) -> ObjectBuilder {
        let outline = Outline::from_rect(rect);
        tile_outline(&outline, FillRule::Winding, view_box, prepare)
    }

    #[test]
    fn test_winding_closure_down_columns() {
        // Before propagation, the backdrop deltas in any tile column fully
        // crossing a closed contour must sum to zero: the winding below
        // the contour cancels.
        let view_box = RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0));
        let object_builder = tile_rect_path(
            RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)), view_box, false);

        let tiles = &object_builder.built_path.tiles;
        let width = tiles.rect.width() as usize;
        for column in 0..width {
            let sum: i32 = tiles.data
                                .iter()
                                .skip(column)
                                .step_by(width)
                                .map(|tile| tile.backdrop as i32)
                                .sum();
            assert_eq!(sum, 0, "column {} sums to {}", column, sum);
        }
    }

    #[test]
    fn test_tile_bound_containment() {
        let view_box = RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0));
        let object_builder = tile_rect_path(
            RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)), view_box, false);

        let bounds = object_builder.built_path.tile_bounds;
        for tile in &object_builder.built_path.tiles.data {
            let coords = vec2i(tile.tile_x as i32, tile.tile_y as i32);
            assert!(bounds.contains_point(coords));
        }
    }

    #[test]
    fn test_rect_tile_classification() {
        // An 80×80 rect at (10, 10) on the 16-px grid: a 6×6 tile patch
        // whose border ring is alpha and whose 4×4 interior is solid.
        let view_box = RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0));
        let object_builder = tile_rect_path(
            RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)), view_box, true);

        let built_path = &object_builder.built_path;
        assert_eq!(built_path.tile_bounds,
                   tessera_geometry::rect::RectI::from_points(vec2i(0, 0), vec2i(6, 6)));

        let (mut alpha_tiles, mut solid_tiles, mut empty_tiles) = (0, 0, 0);
        for tile in &built_path.tiles.data {
            if tile.alpha_tile_id.is_valid() {
                alpha_tiles += 1;
            } else if tile.backdrop != 0 {
                solid_tiles += 1;
            } else {
                empty_tiles += 1;
            }
        }

        assert_eq!(alpha_tiles, 20);
        assert_eq!(solid_tiles, 16);
        assert_eq!(empty_tiles, 0);

        // The interior tiles are exactly the 4×4 block at (1, 1)..(5, 5).
        for tile in &built_path.tiles.data {
            let coords = vec2i(tile.tile_x as i32, tile.tile_y as i32);
            let interior = coords.x >= 1 && coords.x < 5 && coords.y >= 1 && coords.y < 5;
            assert_eq!(!tile.alpha_tile_id.is_valid(), interior,
                       "tile {:?} misclassified", coords);
        }
    }

    #[test]
    fn test_even_odd_donut_center_is_empty() {
        // Two concentric same-winding circles under even-odd: the center
        // tile's coverage must cancel to empty.
        let mut outline = Outline::new();
        let mut outer = Contour::new();
        outer.push_arc(&Transform2F::from_uniform_scale(80.0)
                            .translate(vec2f(100.0, 100.0)),
                       0.0,
                       std::f32::consts::PI * 2.0,
                       tessera_content::outline::ArcDirection::CW);
        outer.close();
        outline.push_contour(outer);
        let mut inner = Contour::new();
        inner.push_arc(&Transform2F::from_uniform_scale(40.0)
                            .translate(vec2f(100.0, 100.0)),
                       0.0,
                       std::f32::consts::PI * 2.0,
                       tessera_content::outline::ArcDirection::CW);
        inner.close();
        outline.push_contour(inner);

        let view_box = RectF::new(vec2f(0.0, 0.0), vec2f(200.0, 200.0));
        let object_builder = tile_outline(&outline, FillRule::EvenOdd, view_box, true);

        // Pixel (100, 100) is in tile (6, 6): inside both circles, so the
        // winding backdrop is ±2, which the even-odd rule empties.
        let center = object_builder.built_path
                                   .tiles
                                   .get(vec2i(6, 6))
                                   .expect("center tile missing");
        assert!(!center.alpha_tile_id.is_valid());
        assert_eq!(center.backdrop.abs(), 2);

        // Pixel (100, 50) is in tile (6, 3): between the circles, winding
        // backdrop ±1, filled.
        let ring = object_builder.built_path
                                 .tiles
                                 .get(vec2i(6, 3))
                                 .expect("ring tile missing");
        assert!(ring.alpha_tile_id.is_valid() || ring.backdrop.abs() == 1);
    }

    #[test]
    fn test_fills_stay_within_tile_bounds() {
        let view_box = RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0));
        let object_builder = tile_rect_path(
            RectF::from_points(vec2f(3.0, 3.0), vec2f(61.0, 61.0)), view_box, false);
        for fill in &object_builder.fills {
            assert!(fill.line_segment.from_x < 16 * 256);
            assert!(fill.line_segment.from_y < 16 * 256);
            assert!(fill.line_segment.to_x < 16 * 256);
            assert!(fill.line_segment.to_y < 16 * 256);
        }
    }
}
