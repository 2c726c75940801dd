// tessera/renderer/src/builder.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-path built state for the CPU tiler.

use crate::gpu_data::{AlphaTileId, Clip, Fill, TileBatchTexture, TileObjectPrimitive};
use crate::paint::PaintId;
use crate::scene::ClipPathId;
use crate::tile_map::DenseTileMap;
use crate::tiles::{self, TILE_HEIGHT, TILE_WIDTH, TilingPathInfo};
use std::sync::atomic::AtomicU32;
use tessera_content::effects::{BlendMode, PaintFilter};
use tessera_content::fill::FillRule;
use tessera_geometry::line_segment::{LineSegment2F, LineSegmentU16};
use tessera_geometry::rect::{RectF, RectI};
use tessera_geometry::util::clamp;
use tessera_geometry::vector::{Vector2F, Vector2I, vec2i};

/// A path tiled on the CPU: its dense tile map, per-column backdrop
/// accumulators, and (when clipped) its mask-combine records.
#[derive(Clone, Debug)]
pub(crate) struct BuiltPath {
    /// Sums of backdrop deltas for tile columns above the tile bounds.
    pub backdrops: Vec<i32>,
    pub tiles: DenseTileMap<TileObjectPrimitive>,
    pub clip_tiles: Option<DenseTileMap<Clip>>,
    pub tile_bounds: RectI,
    pub fill_rule: FillRule,
    pub ctrl_byte: u8,
    pub paint_id: PaintId,
    pub clip_path_id: Option<ClipPathId>,
    /// True if opaque solid tiles of this path may occlude earlier tiles.
    pub occludes: bool,
}

/// A built draw path plus the batch-affecting draw state.
#[derive(Clone, Debug)]
pub(crate) struct BuiltDrawPath {
    pub path: BuiltPath,
    pub blend_mode: BlendMode,
    pub color_texture: Option<TileBatchTexture>,
    pub filter: PaintFilter,
}

impl BuiltPath {
    pub(crate) fn new(path_id: u32,
                      path_bounds: RectF,
                      view_box_bounds: RectF,
                      fill_rule: FillRule,
                      tiling_path_info: &TilingPathInfo)
                      -> BuiltPath {
        let (occludes, paint_id, clip_path_id) = match *tiling_path_info {
            TilingPathInfo::Draw(ref info) => {
                (info.paint_metadata.is_opaque && info.blend_mode.occludes_backdrop(),
                 info.paint_id,
                 info.clip_path_id)
            }
            TilingPathInfo::Clip => (true, PaintId(0), None),
        };

        let ctrl_byte = tiling_path_info.to_ctrl();

        let tile_map_bounds = if tiling_path_info.has_destructive_blend_mode() {
            view_box_bounds
        } else {
            path_bounds
        };
        let tile_bounds = tiles::round_rect_out_to_tile_bounds(tile_map_bounds);

        let metadata_id = paint_id.0;
        let tiles = DenseTileMap::from_builder(|tile_coord| {
            TileObjectPrimitive {
                tile_x: tile_coord.x as i16,
                tile_y: tile_coord.y as i16,
                alpha_tile_id: AlphaTileId::invalid(),
                path_id,
                metadata_id,
                ctrl: ctrl_byte,
                backdrop: 0,
            }
        }, tile_bounds);

        let clip_tiles = match *tiling_path_info {
            TilingPathInfo::Draw(_) if clip_path_id.is_some() => {
                Some(DenseTileMap::from_fill(Clip::default(), tile_bounds))
            }
            _ => None,
        };

        BuiltPath {
            backdrops: vec![0; tile_bounds.width().max(0) as usize],
            tiles,
            clip_tiles,
            tile_bounds,
            fill_rule,
            ctrl_byte,
            paint_id,
            clip_path_id,
            occludes,
        }
    }
}

/// Builds fills and tiles for one path.
#[derive(Debug)]
pub(crate) struct ObjectBuilder {
    pub built_path: BuiltPath,
    pub fills: Vec<Fill>,
    pub bounds: RectF,
}

impl ObjectBuilder {
    pub(crate) fn new(path_id: u32,
                      path_bounds: RectF,
                      view_box_bounds: RectF,
                      fill_rule: FillRule,
                      tiling_path_info: &TilingPathInfo)
                      -> ObjectBuilder {
        let built_path = BuiltPath::new(path_id,
                                        path_bounds,
                                        view_box_bounds,
                                        fill_rule,
                                        tiling_path_info);
        ObjectBuilder { built_path, fills: vec![], bounds: path_bounds }
    }

    /// Quantizes a fill segment to 8.8 fixed point relative to the tile
    /// origin and records it, lazily allocating the tile's alpha tile id.
    pub(crate) fn add_fill(&mut self,
                           next_alpha_tile_index: &AtomicU32,
                           segment: LineSegment2F,
                           tile_coords: Vector2I) {
        debug!("add_fill({:?} ({:?}))", segment, tile_coords);

        // Ensure this fill is in bounds. If not, cull it.
        if self.tile_coords_to_local_index(tile_coords).is_none() {
            return;
        }

        debug_assert_eq!(TILE_WIDTH, TILE_HEIGHT);

        // Compute the upper left corner of the tile and convert to 8.8
        // fixed point.
        let tile_upper_left = tile_coords.to_f32().scale(TILE_WIDTH as f32);
        let fixed_max = (TILE_WIDTH * 256 - 1) as f32;
        let from = (segment.from() - tile_upper_left).scale(256.0);
        let to = (segment.to() - tile_upper_left).scale(256.0);
        let from_x = clamp(from.x, 0.0, fixed_max) as u32;
        let from_y = clamp(from.y, 0.0, fixed_max) as u32;
        let to_x = clamp(to.x, 0.0, fixed_max) as u32;
        let to_y = clamp(to.y, 0.0, fixed_max) as u32;

        // Cull degenerate fills.
        if from_x == to_x {
            debug!("... culling!");
            return;
        }

        // Allocate a global alpha tile if necessary.
        let alpha_tile_id =
            self.get_or_allocate_alpha_tile_index(next_alpha_tile_index, tile_coords);

        self.fills.push(Fill {
            line_segment: LineSegmentU16 {
                from_x: from_x as u16,
                from_y: from_y as u16,
                to_x: to_x as u16,
                to_y: to_y as u16,
            },
            // The compute backend overwrites this with the fill-list link.
            link: alpha_tile_id.0,
        });
    }

    fn get_or_allocate_alpha_tile_index(&mut self,
                                        next_alpha_tile_index: &AtomicU32,
                                        tile_coords: Vector2I)
                                        -> AlphaTileId {
        let local_tile_index =
            self.tile_coords_to_local_index_unchecked(tile_coords) as usize;

        let alpha_tile_id = self.built_path.tiles.data[local_tile_index].alpha_tile_id;
        if alpha_tile_id.is_valid() {
            return alpha_tile_id;
        }

        let alpha_tile_id = AlphaTileId::new(next_alpha_tile_index);
        self.built_path.tiles.data[local_tile_index].alpha_tile_id = alpha_tile_id;
        alpha_tile_id
    }

    #[inline]
    pub(crate) fn tile_coords_to_local_index_unchecked(&self, coords: Vector2I) -> u32 {
        let tile_rect = self.built_path.tile_bounds;
        let offset = coords - tile_rect.origin();
        (offset.x + tile_rect.width() * offset.y) as u32
    }

    #[inline]
    pub(crate) fn tile_coords_to_local_index(&self, coords: Vector2I) -> Option<u32> {
        if self.built_path.tile_bounds.contains_point(coords) {
            Some(self.tile_coords_to_local_index_unchecked(coords))
        } else {
            None
        }
    }

    /// Applies a winding delta to a tile, or to its column accumulator
    /// when the tile lies above the tile bounds.
    pub(crate) fn adjust_alpha_tile_backdrop(&mut self, tile_coords: Vector2I, delta: i8) {
        let (tiles, backdrops) = (&mut self.built_path.tiles, &mut self.built_path.backdrops);

        let tile_offset = tile_coords - tiles.rect.origin();
        if tile_offset.x < 0 || tile_offset.x >= tiles.rect.width() ||
                tile_offset.y >= tiles.rect.height() {
            return;
        }

        if tile_offset.y < 0 {
            backdrops[tile_offset.x as usize] += delta as i32;
            return;
        }

        let local_tile_index = tiles.coords_to_index_unchecked(tile_coords);
        tiles.data[local_tile_index].backdrop += delta;
    }

    #[inline]
    pub(crate) fn tile_coords(&self, point: Vector2F) -> Vector2I {
        vec2i((point.x / TILE_WIDTH as f32).floor() as i32,
              (point.y / TILE_HEIGHT as f32).floor() as i32)
    }
}
