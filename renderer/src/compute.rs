// tessera/renderer/src/compute.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The compute-backend scene builder: converts the scene into segment
//! streams plus per-path metadata for the GPU compute pipeline.

use crate::gpu_data::{BackdropInfo, DiceMetadata, PROPAGATE_CLIP_PATH_NONE, PathSource,
                      PropagateMetadata, Segments, TileBatchId, TileBatchTexture,
                      TilePathInfo};
use crate::paint::{PaintInfo, PaintMetadata};
use crate::scene::{ClipPathId, DisplayItem, Scene, SceneEpoch};
use crate::tiles;
use fxhash::FxHashMap;
use std::ops::Range;
use tessera_content::effects::PaintFilter;
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectI;
use tessera_geometry::transform2d::Transform2F;

/// Segment streams for the whole scene, plus per-path ranges into them.
pub struct BuiltSegments {
    pub draw_segments: Segments,
    pub clip_segments: Segments,
    pub draw_segment_ranges: Vec<Range<u32>>,
    pub clip_segment_ranges: Vec<Range<u32>>,
}

impl BuiltSegments {
    pub fn from_scene(scene: &Scene) -> BuiltSegments {
        let mut built_segments = BuiltSegments {
            draw_segments: Segments::new(),
            clip_segments: Segments::new(),
            draw_segment_ranges: Vec::with_capacity(scene.draw_paths().len()),
            clip_segment_ranges: Vec::with_capacity(scene.clip_paths().len()),
        };

        for clip_path in scene.clip_paths() {
            let range = built_segments.clip_segments.add_path(clip_path.outline());
            built_segments.clip_segment_ranges.push(range);
        }
        for draw_path in scene.draw_paths() {
            let range = built_segments.draw_segments.add_path(draw_path.outline());
            built_segments.draw_segment_ranges.push(range);
        }

        built_segments
    }
}

/// Everything the propagate, dice, and bound passes need for one batch.
#[derive(Clone, Debug, Default)]
pub struct PrepareTilesInfo {
    /// Initial backdrop values for each tile column, packed together.
    pub backdrops: Vec<BackdropInfo>,
    /// Per-path metadata for propagation, with indices into the tile
    /// buffer.
    pub propagate_metadata: Vec<PropagateMetadata>,
    /// Per-path metadata for dicing.
    pub dice_metadata: Vec<DiceMetadata>,
    /// Sparse information about the allocated tiles.
    pub tile_path_info: Vec<TilePathInfo>,
    /// A transform to apply to the segments.
    pub transform: Transform2F,
}

/// A batch of paths to be prepared on GPU.
#[derive(Clone, Debug)]
pub struct TileBatchData {
    /// The ID of this batch. The renderer must not assume these are
    /// consecutive.
    pub batch_id: TileBatchId,
    pub path_count: u32,
    pub tile_count: u32,
    pub segment_count: u32,
    pub prepare_info: PrepareTilesInfo,
    pub path_source: PathSource,
    pub clipped_path_count: u32,
}

impl TileBatchData {
    fn new(batch_id: TileBatchId, path_source: PathSource) -> TileBatchData {
        TileBatchData {
            batch_id,
            path_count: 0,
            tile_count: 0,
            segment_count: 0,
            prepare_info: PrepareTilesInfo::default(),
            path_source,
            clipped_path_count: 0,
        }
    }

    /// Adds one path, returning its index within the batch.
    fn push(&mut self,
            tile_bounds: RectI,
            metadata_id: u16,
            ctrl: u8,
            occludes: bool,
            clip_path_index: Option<u32>,
            global_path_id: u32,
            segment_range: &Range<u32>)
            -> u32 {
        let batch_path_index = self.path_count;
        self.path_count += 1;

        self.prepare_info.propagate_metadata.push(PropagateMetadata {
            tile_rect: tile_bounds,
            tile_offset: self.tile_count,
            path_index: batch_path_index,
            z_write: occludes as u32,
            clip_path_index: clip_path_index.unwrap_or(PROPAGATE_CLIP_PATH_NONE),
            backdrop_offset: self.prepare_info.backdrops.len() as u32,
            pad0: 0,
            pad1: 0,
            pad2: 0,
        });

        for tile_x_offset in 0..tile_bounds.width().max(0) {
            self.prepare_info.backdrops.push(BackdropInfo {
                initial_backdrop: 0,
                tile_x_offset,
                path_index: batch_path_index,
            });
        }

        self.prepare_info.dice_metadata.push(DiceMetadata {
            global_path_id,
            first_global_segment_index: segment_range.start,
            first_batch_segment_index: self.segment_count,
            pad: 0,
        });

        self.prepare_info.tile_path_info.push(TilePathInfo {
            tile_min_x: tile_bounds.min_x() as i16,
            tile_min_y: tile_bounds.min_y() as i16,
            tile_max_x: tile_bounds.max_x() as i16,
            tile_max_y: tile_bounds.max_y() as i16,
            first_tile_index: self.tile_count,
            metadata_id,
            ctrl,
            backdrop: 0,
        });

        self.tile_count += tile_bounds.area().max(0) as u32;
        self.segment_count += segment_range.end - segment_range.start;

        if clip_path_index.is_some() {
            self.clipped_path_count += 1;
        }

        batch_path_index
    }
}

/// A draw batch plus its draw state.
#[derive(Clone, Debug)]
pub struct DrawTileBatch {
    pub tile_batch_data: TileBatchData,
    pub color_texture: Option<TileBatchTexture>,
    pub filter: PaintFilter,
    pub render_target: Option<RenderTargetId>,
}

/// Remembers what was uploaded for a scene, keyed by id and epoch.
struct LastSceneInfo {
    scene_id: u32,
    scene_epoch: SceneEpoch,
}

/// Builds a scene into segment streams and tile batch data for the
/// compute renderer.
pub struct ComputeSceneBuilder {
    /// The scene's segment streams. Uploaded only when the scene changed.
    pub built_segments: Option<BuiltSegments>,
    /// True if `built_segments` must be (re)uploaded this frame.
    pub segments_are_dirty: bool,
    /// The clip batch, always prepared before the draw batches. Absent
    /// when no path is clipped.
    pub clip_batch: Option<TileBatchData>,
    /// Draw tile batches, in display-list order.
    pub tile_batches: Vec<DrawTileBatch>,
    /// Paint data for the frame.
    pub paint_info: Option<PaintInfo>,
    last_scene: Option<LastSceneInfo>,
    next_batch_id: u32,
}

/// The clip batch always has batch id 0; draw batches start at 1.
pub const CLIP_TILE_BATCH_ID: TileBatchId = TileBatchId(0);

impl ComputeSceneBuilder {
    #[inline]
    pub fn new() -> ComputeSceneBuilder {
        ComputeSceneBuilder {
            built_segments: None,
            segments_are_dirty: true,
            clip_batch: None,
            tile_batches: vec![],
            paint_info: None,
            last_scene: None,
            next_batch_id: 1,
        }
    }

    pub fn build(&mut self, scene: &Scene) {
        debug_assert!(scene.render_target_brackets_are_balanced());

        let scene_unchanged = match self.last_scene {
            Some(LastSceneInfo { scene_id, scene_epoch }) => {
                scene_id == scene.id() && scene_epoch == scene.epoch()
            }
            None => false,
        };

        if !scene_unchanged {
            self.built_segments = Some(BuiltSegments::from_scene(scene));
            self.segments_are_dirty = true;
            self.last_scene = Some(LastSceneInfo {
                scene_id: scene.id(),
                scene_epoch: scene.epoch(),
            });
        }

        let paint_info = scene.palette().build_paint_info(Transform2F::default());

        self.clip_batch = None;
        self.tile_batches.clear();
        self.next_batch_id = 1;

        let built_segments = self.built_segments.take().unwrap();
        self.build_tile_batches(scene, &paint_info.paint_metadata, &built_segments);
        self.built_segments = Some(built_segments);

        self.paint_info = Some(paint_info);
    }

    fn build_tile_batches(&mut self,
                          scene: &Scene,
                          paint_metadata: &[PaintMetadata],
                          built_segments: &BuiltSegments) {
        let mut render_target_stack = vec![];
        let mut clip_id_to_batch_index: FxHashMap<ClipPathId, u32> = FxHashMap::default();

        for display_item in scene.display_list() {
            match *display_item {
                DisplayItem::PushRenderTarget(render_target_id) => {
                    render_target_stack.push(render_target_id);
                }
                DisplayItem::PopRenderTarget => {
                    render_target_stack.pop();
                }
                DisplayItem::DrawPaths(ref range) => {
                    self.build_batches_for_draw_path_range(
                        scene,
                        paint_metadata,
                        built_segments,
                        range.clone(),
                        render_target_stack.last().cloned(),
                        &mut clip_id_to_batch_index);
                }
            }
        }
    }

    fn build_batches_for_draw_path_range(&mut self,
                                         scene: &Scene,
                                         paint_metadata: &[PaintMetadata],
                                         built_segments: &BuiltSegments,
                                         range: Range<u32>,
                                         render_target: Option<RenderTargetId>,
                                         clip_id_to_batch_index: &mut FxHashMap<ClipPathId,
                                                                                u32>) {
        let view_box = scene.view_box();

        let mut current_batch: Option<DrawTileBatch> = None;

        for draw_path_index in range {
            let draw_path = &scene.draw_paths()[draw_path_index as usize];

            let paint = scene.get_paint(draw_path.paint());
            if paint.is_fully_transparent() {
                continue;
            }

            let path_bounds = match draw_path.outline().bounds().intersection(view_box) {
                None => continue,
                Some(intersection) => intersection,
            };

            let metadata = &paint_metadata[draw_path.paint().0 as usize];
            let color_texture = metadata.tile_batch_texture();
            let filter = metadata.filter();

            // Register the clip path in the clip batch if needed.
            let clip_path_index = match draw_path.clip_path() {
                None => None,
                Some(clip_path_id) => {
                    Some(self.clip_batch_index_for(scene,
                                                   built_segments,
                                                   clip_path_id,
                                                   clip_id_to_batch_index))
                }
            };

            // Flush the batch when the color texture or filter changes.
            match current_batch {
                Some(ref batch) if batch.color_texture == color_texture &&
                        batch.filter == filter => {}
                Some(batch) => {
                    self.tile_batches.push(batch);
                    current_batch = None;
                }
                None => {}
            }

            if current_batch.is_none() {
                let batch_id = TileBatchId(self.next_batch_id);
                self.next_batch_id += 1;
                current_batch = Some(DrawTileBatch {
                    tile_batch_data: TileBatchData::new(batch_id, PathSource::Draw),
                    color_texture,
                    filter,
                    render_target,
                });
            }

            let tile_map_bounds = if draw_path.blend_mode().is_destructive() {
                view_box
            } else {
                path_bounds
            };
            let tile_bounds = tiles::round_rect_out_to_tile_bounds(tile_map_bounds);

            let mut ctrl = crate::gpu_data::fill_rule_to_ctrl(draw_path.fill_rule());
            ctrl |= crate::tiles::paint_combine_ctrl(metadata);
            ctrl |= (draw_path.blend_mode().composite_ctrl() as u8) <<
                crate::gpu_data::TILE_CTRL_COMPOSITE_SHIFT;

            let occludes = metadata.is_opaque &&
                draw_path.blend_mode().occludes_backdrop();

            let batch = current_batch.as_mut().unwrap();
            batch.tile_batch_data.push(
                tile_bounds,
                draw_path.paint().0,
                ctrl,
                occludes,
                clip_path_index,
                draw_path_index,
                &built_segments.draw_segment_ranges[draw_path_index as usize]);
        }

        if let Some(batch) = current_batch {
            self.tile_batches.push(batch);
        }
    }

    fn clip_batch_index_for(&mut self,
                            scene: &Scene,
                            built_segments: &BuiltSegments,
                            clip_path_id: ClipPathId,
                            clip_id_to_batch_index: &mut FxHashMap<ClipPathId, u32>)
                            -> u32 {
        if let Some(&batch_index) = clip_id_to_batch_index.get(&clip_path_id) {
            return batch_index;
        }

        let clip_batch = self.clip_batch
                             .get_or_insert_with(|| {
                                 TileBatchData::new(CLIP_TILE_BATCH_ID, PathSource::Clip)
                             });

        let clip_path = scene.get_clip_path(clip_path_id);
        let view_box = scene.view_box();
        let clip_bounds = clip_path.outline()
                                   .bounds()
                                   .intersection(view_box)
                                   .unwrap_or_default();
        let tile_bounds = tiles::round_rect_out_to_tile_bounds(clip_bounds);

        let ctrl = crate::gpu_data::fill_rule_to_ctrl(clip_path.fill_rule());
        let batch_index = clip_batch.push(
            tile_bounds,
            0,
            ctrl,
            true,
            None,
            clip_path_id.0,
            &built_segments.clip_segment_ranges[clip_path_id.0 as usize]);

        clip_id_to_batch_index.insert(clip_path_id, batch_index);
        batch_index
    }
}

impl crate::gpu::renderer::SceneBuilder for ComputeSceneBuilder {
    #[inline]
    fn build(&mut self, scene: &Scene) {
        ComputeSceneBuilder::build(self, scene)
    }
}

#[cfg(test)]
mod tests {
    use super::{BuiltSegments, ComputeSceneBuilder};
    use crate::gpu_data::{CURVE_IS_CUBIC, CURVE_IS_QUADRATIC};
    use crate::paint::Paint;
    use crate::scene::{DrawPath, Scene};
    use tessera_color::ColorU;
    use tessera_content::outline::{Contour, Outline};
    use tessera_geometry::rect::RectF;
    use tessera_geometry::vector::vec2f;

    fn scene_with_rect() -> Scene {
        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));
        let paint_id = scene.push_paint(&Paint::from_color(ColorU::black()));
        scene.push_draw_path(DrawPath::new(
            Outline::from_rect(RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0))),
            paint_id));
        scene
    }

    #[test]
    fn test_segment_stream_flags() {
        let mut contour = Contour::new();
        contour.push_endpoint(vec2f(0.0, 0.0));
        contour.push_quadratic(vec2f(1.0, 1.0), vec2f(2.0, 0.0));
        contour.push_cubic(vec2f(3.0, 1.0), vec2f(4.0, -1.0), vec2f(5.0, 0.0));
        contour.close();
        let mut outline = Outline::new();
        outline.push_contour(contour);

        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(10.0, 10.0)));
        let paint_id = scene.push_paint(&Paint::from_color(ColorU::black()));
        scene.push_draw_path(DrawPath::new(outline, paint_id));

        let built_segments = BuiltSegments::from_scene(&scene);
        let indices = &built_segments.draw_segments.indices;
        // Quadratic, cubic, then the closing line.
        assert_eq!(indices.len(), 3);
        assert_eq!(indices[0].flags, CURVE_IS_QUADRATIC);
        assert_eq!(indices[1].flags, CURVE_IS_CUBIC);
        assert_eq!(indices[2].flags, 0);
        assert_eq!(built_segments.draw_segment_ranges[0], 0..3);
    }

    #[test]
    fn test_batch_accumulates_counts() {
        let scene = scene_with_rect();
        let mut builder = ComputeSceneBuilder::new();
        builder.build(&scene);

        assert!(builder.clip_batch.is_none());
        assert_eq!(builder.tile_batches.len(), 1);
        let batch = &builder.tile_batches[0].tile_batch_data;
        assert_eq!(batch.path_count, 1);
        // 6×6 tile patch.
        assert_eq!(batch.tile_count, 36);
        assert_eq!(batch.prepare_info.backdrops.len(), 6);
        // Four rect edges plus the implicit close: from_rect closes, so 4
        // segments.
        assert_eq!(batch.segment_count, 4);
        assert_eq!(batch.prepare_info.tile_path_info.len(), 1);
        assert_eq!(batch.prepare_info.propagate_metadata.len(), 1);
    }

    #[test]
    fn test_segments_not_rebuilt_when_scene_unchanged() {
        let scene = scene_with_rect();
        let mut builder = ComputeSceneBuilder::new();
        builder.build(&scene);
        assert!(builder.segments_are_dirty);
        builder.segments_are_dirty = false;

        builder.build(&scene);
        assert!(!builder.segments_are_dirty, "unchanged scene was re-uploaded");
    }

    #[test]
    fn test_batch_split_on_texture_change() {
        use tessera_content::gradient::Gradient;

        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));

        let color_id = scene.push_paint(&Paint::from_color(ColorU::black()));
        let mut gradient = Gradient::linear_from_points(vec2f(0.0, 0.0), vec2f(100.0, 0.0));
        gradient.add_color_stop(ColorU::new(255, 0, 0, 255), 0.0);
        gradient.add_color_stop(ColorU::new(0, 0, 255, 255), 1.0);
        let gradient_id = scene.push_paint(&Paint::from_gradient(gradient));

        let rect = RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0));
        scene.push_draw_path(DrawPath::new(Outline::from_rect(rect), color_id));
        scene.push_draw_path(DrawPath::new(Outline::from_rect(rect), gradient_id));
        scene.push_draw_path(DrawPath::new(Outline::from_rect(rect), color_id));

        let mut builder = ComputeSceneBuilder::new();
        builder.build(&scene);

        // Color texture changes twice, so three batches.
        assert_eq!(builder.tile_batches.len(), 3);
        assert_ne!(builder.tile_batches[0].tile_batch_data.batch_id,
                   builder.tile_batches[1].tile_batch_data.batch_id);
    }
}
