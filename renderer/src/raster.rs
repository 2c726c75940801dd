// tessera/renderer/src/raster.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The raster-backend scene builder: tiles paths on the CPU, in parallel,
//! and groups the built tiles into batches for the raster renderer.

use crate::builder::{BuiltDrawPath, BuiltPath};
use crate::gpu_data::{Clip, Fill, TileBatchTexture, TileObjectPrimitive};
use crate::paint::{PaintInfo, PaintMetadata};
use crate::scene::{ClipPathId, DisplayItem, Scene};
use crate::tile_map::DenseTileMap;
use crate::tiler::Tiler;
use crate::tiles::{self, DrawTilingPathInfo, TilingPathInfo};
use rayon::prelude::*;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tessera_content::effects::PaintFilter;
use tessera_content::fill::FillRule;
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectI;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::vec2i;

/// A batch of tiles that share a color texture, a filter, and a render
/// target, in draw order.
pub struct DrawTileBatch {
    pub tiles: Vec<TileObjectPrimitive>,
    /// Mask-combine jobs for clipped alpha tiles in this batch.
    pub clips: Vec<Clip>,
    pub color_texture: Option<TileBatchTexture>,
    pub filter: PaintFilter,
    /// The render target to draw into, or the destination texture if
    /// absent.
    pub render_target: Option<RenderTargetId>,
}

/// Builds a scene into fills and tile batches for the raster renderer.
pub struct RasterSceneBuilder {
    /// Fills generated by the tilers, in no particular order.
    pub pending_fills: Vec<Fill>,
    /// Tile batches, in display-list order.
    pub tile_batches: Vec<DrawTileBatch>,
    /// Paint data for the frame.
    pub paint_info: Option<PaintInfo>,
    /// The number of alpha tiles allocated this frame.
    pub alpha_tile_count: u32,
    next_alpha_tile_index: AtomicU32,
}

impl RasterSceneBuilder {
    #[inline]
    pub fn new() -> RasterSceneBuilder {
        RasterSceneBuilder {
            pending_fills: vec![],
            tile_batches: vec![],
            paint_info: None,
            alpha_tile_count: 0,
            next_alpha_tile_index: AtomicU32::new(0),
        }
    }

    /// Builds the scene: paint metadata, parallel per-path tiling, and
    /// tile batches.
    pub fn build(&mut self, scene: &Scene) {
        self.pending_fills.clear();
        self.tile_batches.clear();
        self.next_alpha_tile_index.store(0, Ordering::Relaxed);

        debug_assert!(scene.render_target_brackets_are_balanced());

        let paint_info = scene.palette().build_paint_info(Transform2F::default());
        let view_box = scene.view_box();

        let pending_fills = Mutex::new(Vec::new());

        // Tile clip paths first; draw paths refer to them.
        let built_clip_paths: Vec<BuiltPath> = scene
            .clip_paths()
            .par_iter()
            .enumerate()
            .map(|(clip_path_index, clip_path)| {
                let mut tiler = Tiler::new(&self.next_alpha_tile_index,
                                           clip_path_index as u32,
                                           clip_path.outline(),
                                           clip_path.fill_rule(),
                                           view_box,
                                           None,
                                           &TilingPathInfo::Clip);
                tiler.generate_tiles();
                if !tiler.object_builder.fills.is_empty() {
                    pending_fills.lock().unwrap().extend_from_slice(&tiler.object_builder
                                                                          .fills);
                }
                tiler.object_builder.built_path
            })
            .collect();

        // Tile draw paths in parallel across the scene.
        let built_draw_paths: Vec<Option<BuiltDrawPath>> = (0..scene.draw_paths().len())
            .into_par_iter()
            .map(|path_index| {
                self.build_draw_path(scene,
                                     path_index as u32,
                                     &paint_info.paint_metadata,
                                     &built_clip_paths,
                                     &pending_fills)
            })
            .collect();

        self.pending_fills = pending_fills.into_inner().unwrap();
        self.alpha_tile_count = self.next_alpha_tile_index.load(Ordering::Relaxed);

        self.build_tile_batches(scene, built_draw_paths);
        self.paint_info = Some(paint_info);
    }

    fn build_draw_path(&self,
                       scene: &Scene,
                       path_index: u32,
                       paint_metadata: &[PaintMetadata],
                       built_clip_paths: &[BuiltPath],
                       pending_fills: &Mutex<Vec<Fill>>)
                       -> Option<BuiltDrawPath> {
        let draw_path = &scene.draw_paths()[path_index as usize];

        // Skip invisible paths.
        let paint = scene.get_paint(draw_path.paint());
        if paint.is_fully_transparent() {
            debug!("skipping fully transparent path {}", path_index);
            return None;
        }
        if !draw_path.outline().bounds().intersects(scene.view_box()) {
            return None;
        }

        let metadata = &paint_metadata[draw_path.paint().0 as usize];
        let built_clip_path = draw_path.clip_path()
                                       .map(|ClipPathId(id)| &built_clip_paths[id as usize]);

        let mut tiler = Tiler::new(&self.next_alpha_tile_index,
                                   path_index,
                                   draw_path.outline(),
                                   draw_path.fill_rule(),
                                   scene.view_box(),
                                   built_clip_path,
                                   &TilingPathInfo::Draw(DrawTilingPathInfo {
                                       paint_id: draw_path.paint(),
                                       paint_metadata: metadata,
                                       blend_mode: draw_path.blend_mode(),
                                       clip_path_id: draw_path.clip_path(),
                                       fill_rule: draw_path.fill_rule(),
                                   }));
        tiler.generate_tiles();

        if !tiler.object_builder.fills.is_empty() {
            pending_fills.lock().unwrap().extend_from_slice(&tiler.object_builder.fills);
        }

        Some(BuiltDrawPath {
            path: tiler.object_builder.built_path,
            blend_mode: draw_path.blend_mode(),
            color_texture: metadata.tile_batch_texture(),
            filter: metadata.filter(),
        })
    }

    fn build_tile_batches(&mut self,
                          scene: &Scene,
                          built_draw_paths: Vec<Option<BuiltDrawPath>>) {
        let scene_tile_rect = tiles::round_rect_out_to_tile_bounds(scene.view_box());
        let mut render_target_stack = vec![];

        for display_item in scene.display_list() {
            match *display_item {
                DisplayItem::PushRenderTarget(render_target_id) => {
                    render_target_stack.push(render_target_id);
                }
                DisplayItem::PopRenderTarget => {
                    render_target_stack.pop();
                }
                DisplayItem::DrawPaths(ref range) => {
                    self.build_tile_batches_for_display_item(
                        scene_tile_rect,
                        render_target_stack.last().cloned(),
                        &built_draw_paths[range.start as usize..range.end as usize]);
                }
            }
        }
    }

    fn build_tile_batches_for_display_item(&mut self,
                                           scene_tile_rect: RectI,
                                           render_target: Option<RenderTargetId>,
                                           built_draw_paths: &[Option<BuiltDrawPath>]) {
        // Group runs of paths that can share a batch.
        let mut run_start = 0;
        while run_start < built_draw_paths.len() {
            let first = match built_draw_paths[run_start] {
                None => {
                    run_start += 1;
                    continue;
                }
                Some(ref built_draw_path) => built_draw_path,
            };

            let mut run_end = run_start + 1;
            while run_end < built_draw_paths.len() {
                match built_draw_paths[run_end] {
                    None => break,
                    Some(ref next) => {
                        if next.color_texture != first.color_texture ||
                                next.filter != first.filter {
                            break;
                        }
                    }
                }
                run_end += 1;
            }

            let batch = self.build_one_tile_batch(
                scene_tile_rect,
                render_target,
                built_draw_paths[run_start..run_end]
                    .iter()
                    .map(|path| path.as_ref().unwrap()));
            self.tile_batches.push(batch);

            run_start = run_end;
        }
    }

    fn build_one_tile_batch<'a, I>(&self,
                                   scene_tile_rect: RectI,
                                   render_target: Option<RenderTargetId>,
                                   paths: I)
                                   -> DrawTileBatch
                                   where I: Iterator<Item = &'a BuiltDrawPath> + Clone {
        let mut batch = DrawTileBatch {
            tiles: vec![],
            clips: vec![],
            color_texture: None,
            filter: PaintFilter::None,
            render_target,
        };

        // First pass: fill the Z-buffer with the topmost opaque solid tile
        // of each position.
        let mut z_buffer = DenseTileMap::from_fill(0u32, scene_tile_rect);
        for built_draw_path in paths.clone() {
            batch.color_texture = built_draw_path.color_texture;
            batch.filter = built_draw_path.filter;

            if !built_draw_path.path.occludes {
                continue;
            }
            for tile in &built_draw_path.path.tiles.data {
                if !tile.is_solid() ||
                        !backdrop_covers(tile.backdrop, built_draw_path.path.fill_rule) {
                    continue;
                }
                let tile_coords = vec2i(tile.tile_x as i32, tile.tile_y as i32);
                if let Some(z_value) = z_buffer.get_mut(tile_coords) {
                    *z_value = (*z_value).max(tile.path_id + 1);
                }
            }
        }

        // Second pass: emit tiles, dropping blank tiles and solid tiles
        // occluded by a later path.
        for built_draw_path in paths {
            for tile in &built_draw_path.path.tiles.data {
                if tile.is_solid() {
                    if !backdrop_covers(tile.backdrop, built_draw_path.path.fill_rule) {
                        continue;
                    }
                    let tile_coords = vec2i(tile.tile_x as i32, tile.tile_y as i32);
                    match z_buffer.get(tile_coords) {
                        Some(&z_value) if z_value > tile.path_id + 1 => continue,
                        _ => {}
                    }
                }
                batch.tiles.push(*tile);
            }

            if let Some(ref clip_tiles) = built_draw_path.path.clip_tiles {
                for clip in &clip_tiles.data {
                    if clip.dest_tile_id.is_valid() {
                        batch.clips.push(*clip);
                    }
                }
            }
        }

        batch
    }
}

impl crate::gpu::renderer::SceneBuilder for RasterSceneBuilder {
    #[inline]
    fn build(&mut self, scene: &Scene) {
        RasterSceneBuilder::build(self, scene)
    }
}

/// True if a solid tile with this backdrop is fully covered under the
/// given fill rule.
fn backdrop_covers(backdrop: i8, fill_rule: FillRule) -> bool {
    match fill_rule {
        FillRule::Winding => backdrop != 0,
        FillRule::EvenOdd => backdrop % 2 != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::RasterSceneBuilder;
    use crate::paint::Paint;
    use crate::scene::{DrawPath, Scene};
    use tessera_color::ColorU;
    use tessera_content::outline::Outline;
    use tessera_geometry::rect::RectF;
    use tessera_geometry::vector::{vec2f, vec2i};

    fn push_rect(scene: &mut Scene, rect: RectF, color: ColorU) {
        let paint_id = scene.push_paint(&Paint::from_color(color));
        scene.push_draw_path(DrawPath::new(Outline::from_rect(rect), paint_id));
    }

    #[test]
    fn test_single_rect_batch() {
        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));
        push_rect(&mut scene,
                  RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)),
                  ColorU::new(255, 0, 0, 255));

        let mut builder = RasterSceneBuilder::new();
        builder.build(&scene);

        assert_eq!(builder.tile_batches.len(), 1);
        let batch = &builder.tile_batches[0];
        let alpha = batch.tiles.iter().filter(|tile| !tile.is_solid()).count();
        let solid = batch.tiles.iter().filter(|tile| tile.is_solid()).count();
        assert_eq!(alpha, 20);
        assert_eq!(solid, 16);
        assert!(batch.color_texture.is_none());
        assert!(!builder.pending_fills.is_empty());
    }

    #[test]
    fn test_overlapping_rects_occlusion() {
        // Red at (10,10)–(60,60), then blue at (40,40)–(90,90), both
        // opaque: red solid tiles inside the blue interior are dropped by
        // the Z-buffer.
        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));
        push_rect(&mut scene,
                  RectF::from_points(vec2f(10.0, 10.0), vec2f(60.0, 60.0)),
                  ColorU::new(255, 0, 0, 255));
        push_rect(&mut scene,
                  RectF::from_points(vec2f(40.0, 40.0), vec2f(90.0, 90.0)),
                  ColorU::new(0, 0, 255, 255));

        let mut builder = RasterSceneBuilder::new();
        builder.build(&scene);
        assert_eq!(builder.tile_batches.len(), 1);
        let batch = &builder.tile_batches[0];

        // Blue's solid interior spans tiles (3,3)..(5,5). Red solid tiles
        // there (from path 0) must have been culled.
        let red_solid_in_blue_interior = batch.tiles.iter().any(|tile| {
            tile.path_id == 0 && tile.is_solid() &&
                tile.tile_x >= 3 && tile.tile_x < 5 &&
                tile.tile_y >= 3 && tile.tile_y < 5
        });
        assert!(!red_solid_in_blue_interior);

        // But blue's solid tiles there survive.
        let blue_solid = batch.tiles.iter().any(|tile| {
            tile.path_id == 1 && tile.is_solid() && tile.tile_x == 3 && tile.tile_y == 3
        });
        assert!(blue_solid);
    }

    #[test]
    fn test_transparent_path_is_skipped() {
        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));
        push_rect(&mut scene,
                  RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)),
                  ColorU::new(0, 0, 0, 0));

        let mut builder = RasterSceneBuilder::new();
        builder.build(&scene);
        assert!(builder.tile_batches.is_empty());
    }

    #[test]
    fn test_clip_then_fill_culls_outside() {
        use crate::scene::ClipPath;
        use tessera_content::outline::{ArcDirection, Contour};
        use tessera_geometry::transform2d::Transform2F;

        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));

        // A circular clip of radius 30 at (50, 50).
        let mut contour = Contour::new();
        contour.push_arc(&Transform2F::from_uniform_scale(30.0).translate(vec2f(50.0, 50.0)),
                         0.0,
                         std::f32::consts::PI * 2.0,
                         ArcDirection::CW);
        contour.close();
        let mut clip_outline = Outline::new();
        clip_outline.push_contour(contour);
        let clip_id = scene.push_clip_path(ClipPath::new(clip_outline));

        let paint_id = scene.push_paint(&Paint::from_color(ColorU::new(255, 0, 0, 255)));
        let mut draw_path = DrawPath::new(
            Outline::from_rect(RectF::from_points(vec2f(25.0, 10.0), vec2f(75.0, 90.0))),
            paint_id);
        draw_path.set_clip_path(Some(clip_id));
        scene.push_draw_path(draw_path);

        let mut builder = RasterSceneBuilder::new();
        builder.build(&scene);

        let batch = &builder.tile_batches[0];
        // The corner tile (0, 0) lies wholly outside the clip disk and
        // must have been culled.
        assert!(!batch.tiles
                      .iter()
                      .any(|tile| tile.tile_x == 0 && tile.tile_y == 0 &&
                           (!tile.is_solid() || tile.backdrop != 0)));
        // The center tile survives as solid.
        assert!(batch.tiles
                     .iter()
                     .any(|tile| tile.tile_x == 3 && tile.tile_y == 3 && tile.backdrop != 0));
        // Mask-combine jobs exist along the clip boundary.
        assert!(!batch.clips.is_empty());
    }
}
