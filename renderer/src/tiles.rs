// tessera/renderer/src/tiles.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tile constants and per-path tiling metadata.

use crate::paint::{PaintId, PaintMetadata};
use crate::scene::ClipPathId;
use tessera_content::effects::BlendMode;
use tessera_content::fill::FillRule;
use tessera_geometry::rect::{RectF, RectI};
use tessera_geometry::vector::{Vector2I, vec2f, vec2i};

pub const TILE_WIDTH: u32 = 16;
pub const TILE_HEIGHT: u32 = 16;

/// Rounds a pixel rect out to the tile grid.
pub fn round_rect_out_to_tile_bounds(rect: RectF) -> RectI {
    rect.scale_xy(vec2f(1.0 / TILE_WIDTH as f32, 1.0 / TILE_HEIGHT as f32))
        .round_out()
        .to_i32()
}

/// Rounds a pixel size up to whole tiles.
#[inline]
pub fn pixel_size_to_tile_size(pixel_size: Vector2I) -> Vector2I {
    let rounded = pixel_size + vec2i(TILE_WIDTH as i32 - 1, TILE_HEIGHT as i32 - 1);
    vec2i(rounded.x / TILE_WIDTH as i32, rounded.y / TILE_HEIGHT as i32)
}

/// What kind of path is being tiled, and the draw-specific info if any.
#[derive(Clone, Copy)]
pub enum TilingPathInfo<'a> {
    Draw(DrawTilingPathInfo<'a>),
    Clip,
}

#[derive(Clone, Copy)]
pub struct DrawTilingPathInfo<'a> {
    pub paint_id: PaintId,
    pub paint_metadata: &'a PaintMetadata,
    pub blend_mode: BlendMode,
    pub clip_path_id: Option<ClipPathId>,
    pub fill_rule: FillRule,
}

impl<'a> TilingPathInfo<'a> {
    /// Packs the fill rule, color-combine op, and composite opcode into
    /// the tile ctrl byte.
    pub fn to_ctrl(&self) -> u8 {
        let fill_rule = match *self {
            TilingPathInfo::Draw(ref info) => info.fill_rule,
            TilingPathInfo::Clip => FillRule::Winding,
        };
        let mut ctrl = crate::gpu_data::fill_rule_to_ctrl(fill_rule);
        if let TilingPathInfo::Draw(ref info) = *self {
            ctrl |= paint_combine_ctrl(info.paint_metadata);
            ctrl |= (info.blend_mode.composite_ctrl() as u8) <<
                crate::gpu_data::TILE_CTRL_COMPOSITE_SHIFT;
        }
        ctrl
    }

    /// True if the path must be tiled over the whole view box because its
    /// blend mode can affect pixels it does not cover.
    pub fn has_destructive_blend_mode(&self) -> bool {
        match *self {
            TilingPathInfo::Draw(ref info) => info.blend_mode.is_destructive(),
            TilingPathInfo::Clip => false,
        }
    }
}

/// The color-combine bits of the ctrl byte for a paint: zero when the
/// paint has no color texture.
pub fn paint_combine_ctrl(metadata: &PaintMetadata) -> u8 {
    use crate::paint::PaintCompositeOp;
    match metadata.color_texture_metadata {
        None => 0,
        Some(ref texture_metadata) => {
            let combine = match texture_metadata.composite_op {
                PaintCompositeOp::SrcIn => crate::gpu_data::TILE_CTRL_COLOR_COMBINE_SRC_IN,
                PaintCompositeOp::DestIn => crate::gpu_data::TILE_CTRL_COLOR_COMBINE_DEST_IN,
            };
            ((combine << crate::gpu_data::TILE_CTRL_COLOR_COMBINE_SHIFT) & 0xff) as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{pixel_size_to_tile_size, round_rect_out_to_tile_bounds};
    use tessera_geometry::rect::{RectF, RectI};
    use tessera_geometry::vector::{vec2f, vec2i};

    #[test]
    fn test_round_rect_out() {
        let rect = RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0));
        let tile_bounds = round_rect_out_to_tile_bounds(rect);
        assert_eq!(tile_bounds, RectI::from_points(vec2i(0, 0), vec2i(6, 6)));

        let negative = RectF::from_points(vec2f(-1.0, -17.0), vec2f(1.0, 1.0));
        assert_eq!(round_rect_out_to_tile_bounds(negative),
                   RectI::from_points(vec2i(-1, -2), vec2i(1, 1)));
    }

    #[test]
    fn test_pixel_size_to_tile_size() {
        assert_eq!(pixel_size_to_tile_size(vec2i(100, 100)), vec2i(7, 7));
        assert_eq!(pixel_size_to_tile_size(vec2i(256, 16)), vec2i(16, 1));
    }
}
