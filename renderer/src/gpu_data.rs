// tessera/renderer/src/gpu_data.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Packed data ready to be sent to the GPU.

use crate::paint::PaintCompositeOp;
use std::sync::atomic::{AtomicU32, Ordering};
use tessera_color::ColorU;
use tessera_content::fill::FillRule;
use tessera_content::outline::{Outline, PointFlags};
use tessera_geometry::line_segment::LineSegmentU16;
use tessera_geometry::rect::RectI;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::Vector2F;
use tessera_gpu::TextureSamplingFlags;
use std::ops::Range;

/// Bits 0–1 of the tile ctrl byte hold the fill rule mask.
pub const TILE_CTRL_MASK_MASK: i32 = 0x3;
pub const TILE_CTRL_MASK_WINDING: i32 = 0x1;
pub const TILE_CTRL_MASK_EVEN_ODD: i32 = 0x2;
pub const TILE_CTRL_MASK_0_SHIFT: i32 = 0;

/// Bits 2–3 hold the color-combine op: 0 = no color texture, 1 = SrcIn,
/// 2 = DestIn.
pub const TILE_CTRL_COLOR_COMBINE_SHIFT: i32 = 2;
pub const TILE_CTRL_COLOR_COMBINE_SRC_IN: i32 = 0x1;
pub const TILE_CTRL_COLOR_COMBINE_DEST_IN: i32 = 0x2;

/// The composite opcode occupies the high nibble, so it can never collide
/// with the mask or combine bits.
pub const TILE_CTRL_COMPOSITE_SHIFT: i32 = 4;

/// Segment-index flags for the compute backend's segment streams.
pub const CURVE_IS_QUADRATIC: u32 = 0x8000_0000;
pub const CURVE_IS_CUBIC: u32 = 0x4000_0000;

#[inline]
pub fn fill_rule_to_ctrl(fill_rule: FillRule) -> u8 {
    let mask = match fill_rule {
        FillRule::Winding => TILE_CTRL_MASK_WINDING,
        FillRule::EvenOdd => TILE_CTRL_MASK_EVEN_ODD,
    };
    debug_assert_eq!(mask & !TILE_CTRL_MASK_MASK, 0);
    ((mask << TILE_CTRL_MASK_0_SHIFT) & 0xff) as u8
}

/// Identifies a texture page (an atlas, a standalone image, or a render
/// target).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct TexturePageId(pub u32);

/// A rectangle within a texture page.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct TextureLocation {
    pub page: TexturePageId,
    pub rect: RectI,
}

/// A 24-bit monotonically allocated index into the mask page.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(C)]
pub struct AlphaTileId(pub u32);

/// Ids at or above this value are invalid: a single frame cannot produce
/// more than 16M alpha tiles.
pub const ALPHA_TILE_ID_LIMIT: u32 = 1 << 24;

impl AlphaTileId {
    /// Allocates the next id. Returns an invalid id on 24-bit overflow;
    /// the caller detects this at the end of the build and aborts the
    /// frame.
    #[inline]
    pub fn new(next_alpha_tile_index: &AtomicU32) -> AlphaTileId {
        let index = next_alpha_tile_index.fetch_add(1, Ordering::Relaxed);
        if index >= ALPHA_TILE_ID_LIMIT {
            return AlphaTileId::invalid();
        }
        AlphaTileId(index)
    }

    #[inline]
    pub fn invalid() -> AlphaTileId {
        AlphaTileId(!0)
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 < ALPHA_TILE_ID_LIMIT
    }
}

/// A quantized line segment contributing trapezoid coverage to one alpha
/// tile.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct Fill {
    /// The segment in unsigned 8.8 fixed point, relative to the tile
    /// origin.
    pub line_segment: LineSegmentU16,
    /// For the raster backend, the alpha tile this fill belongs to. For
    /// the compute backend, the index of the next fill in the tile's
    /// singly-linked fill list.
    pub link: u32,
}

/// One tile of one path, as built by the CPU tiler.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TileObjectPrimitive {
    pub tile_x: i16,
    pub tile_y: i16,
    pub alpha_tile_id: AlphaTileId,
    pub path_id: u32,
    pub metadata_id: u16,
    pub ctrl: u8,
    pub backdrop: i8,
}

impl TileObjectPrimitive {
    /// True if the tile has no mask: it is either empty or fully covered,
    /// depending on the backdrop.
    #[inline]
    pub fn is_solid(&self) -> bool {
        !self.alpha_tile_id.is_valid()
    }
}

/// A mask-combine record: intersects a draw tile's mask with a clip
/// tile's.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Clip {
    pub dest_tile_id: AlphaTileId,
    pub dest_backdrop: i32,
    pub src_tile_id: AlphaTileId,
    pub src_backdrop: i32,
}

impl Default for Clip {
    #[inline]
    fn default() -> Clip {
        Clip {
            dest_tile_id: AlphaTileId::invalid(),
            dest_backdrop: 0,
            src_tile_id: AlphaTileId::invalid(),
            src_backdrop: 0,
        }
    }
}

/// The color texture and composite op shared by a tile batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBatchTexture {
    pub page: TexturePageId,
    pub sampling_flags: TextureSamplingFlags,
    pub composite_op: PaintCompositeOp,
}

/// Unique ID of a batch of tiles within a frame.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TileBatchId(pub u32);

/// Where a batch's paths come from.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PathSource {
    Draw,
    Clip,
}

// Compute-backend structures. Layouts match the compute shaders.

/// A tile slot in the compute backend. Tiles at the same screen position
/// from different paths are chained through `next_tile_id`.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TileCompute {
    pub next_tile_id: i32,
    pub first_fill_id: i32,
    pub alpha_tile_id_lo: i16,
    pub alpha_tile_id_hi: i8,
    pub backdrop_delta: i8,
    pub metadata_id: u16,
    pub ctrl: u8,
    pub backdrop: i8,
}

/// Head of the per-screen-tile list of path tiles.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct FirstTile {
    first_tile: i32,
}

impl Default for FirstTile {
    #[inline]
    fn default() -> FirstTile {
        FirstTile { first_tile: -1 }
    }
}

/// A short straight segment in sub-tile-quantized coordinates, produced by
/// the dice pass.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Microline {
    pub from_x_px: i16,
    pub from_y_px: i16,
    pub to_x_px: i16,
    pub to_y_px: i16,
    pub from_x_subpx: u8,
    pub from_y_subpx: u8,
    pub to_x_subpx: u8,
    pub to_y_subpx: u8,
    pub path_index: u32,
}

/// Initial backdrop value for one tile column of one path.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct BackdropInfo {
    pub initial_backdrop: i32,
    /// Column number, where 0 is the leftmost column in the tile rect.
    pub tile_x_offset: i32,
    pub path_index: u32,
}

/// Per-path metadata consumed by the propagate pass.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct PropagateMetadata {
    pub tile_rect: RectI,
    pub tile_offset: u32,
    pub path_index: u32,
    pub z_write: u32,
    /// Refers to the clip batch, not this one.
    pub clip_path_index: u32,
    pub backdrop_offset: u32,
    pub pad0: u32,
    pub pad1: u32,
    pub pad2: u32,
}

pub const PROPAGATE_CLIP_PATH_NONE: u32 = !0;

/// Per-path metadata consumed by the dice pass.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct DiceMetadata {
    /// Either a draw path index or a clip path index, depending on the
    /// batch's path source.
    pub global_path_id: u32,
    pub first_global_segment_index: u32,
    pub first_batch_segment_index: u32,
    pub pad: u32,
}

/// Sparse per-path tile info consumed by the bound pass.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TilePathInfo {
    pub tile_min_x: i16,
    pub tile_min_y: i16,
    pub tile_max_x: i16,
    pub tile_max_y: i16,
    pub first_tile_index: u32,
    // Must match the trailing field order of `TileCompute`.
    pub metadata_id: u16,
    pub ctrl: u8,
    pub backdrop: i8,
}

/// Mapping from batch-local alpha tile index to global tile index, written
/// by the propagate pass and read by the fill pass.
#[derive(Clone, Copy, Debug, Default)]
#[repr(C)]
pub struct AlphaTileInfo {
    pub alpha_tile_index: u32,
    pub clip_tile_index: u32,
}

/// Segment streams for upload to the compute backend.
#[derive(Clone, Debug, Default)]
pub struct Segments {
    pub points: Vec<Vector2F>,
    pub indices: Vec<SegmentIndices>,
}

#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct SegmentIndices {
    pub first_point_index: u32,
    pub flags: u32,
}

impl Segments {
    #[inline]
    pub fn new() -> Segments {
        Segments { points: vec![], indices: vec![] }
    }

    /// Appends one path's segments, returning the range of segment indices
    /// it occupies.
    pub fn add_path(&mut self, outline: &Outline) -> Range<u32> {
        let first_segment_index = self.indices.len() as u32;

        for contour in outline.contours() {
            let point_count = contour.len();
            self.points.reserve(point_count as usize + 1);

            for point_index in 0..point_count {
                if !contour.flags_of(point_index).intersects(PointFlags::CONTROL_POINT_0 |
                                                             PointFlags::CONTROL_POINT_1) {
                    let mut flags = 0;
                    if point_index + 1 < point_count &&
                            contour.flags_of(point_index + 1)
                                   .contains(PointFlags::CONTROL_POINT_0) {
                        if point_index + 2 < point_count &&
                                contour.flags_of(point_index + 2)
                                       .contains(PointFlags::CONTROL_POINT_1) {
                            flags = CURVE_IS_CUBIC;
                        } else {
                            flags = CURVE_IS_QUADRATIC;
                        }
                    }

                    self.indices.push(SegmentIndices {
                        first_point_index: self.points.len() as u32,
                        flags,
                    });
                }

                self.points.push(contour.position_of(point_index));
            }

            // The implicit closing segment.
            self.points.push(contour.position_of(0));
        }

        let last_segment_index = self.indices.len() as u32;
        first_segment_index..last_segment_index
    }

    /// The total number of segments appended so far.
    #[inline]
    pub fn len(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Texture metadata for one paint, packed into four RGBA16F texels.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct TextureMetadataEntry {
    pub color_transform: Transform2F,
    pub base_color: ColorU,
}

pub const TEXTURE_METADATA_ENTRIES_PER_ROW: i32 = 128;
pub const TEXTURE_METADATA_TEXTURE_WIDTH: i32 = TEXTURE_METADATA_ENTRIES_PER_ROW * 4;

#[cfg(test)]
mod tests {
    use super::{ALPHA_TILE_ID_LIMIT, AlphaTileId, Fill, Microline, TileCompute,
                TileObjectPrimitive, fill_rule_to_ctrl};
    use crate::gpu_data::{TILE_CTRL_MASK_EVEN_ODD, TILE_CTRL_MASK_WINDING};
    use std::mem;
    use std::sync::atomic::AtomicU32;
    use tessera_content::fill::FillRule;

    #[test]
    fn test_packed_struct_sizes() {
        assert_eq!(mem::size_of::<Fill>(), 12);
        assert_eq!(mem::size_of::<TileObjectPrimitive>(), 16);
        assert_eq!(mem::size_of::<TileCompute>(), 16);
        assert_eq!(mem::size_of::<Microline>(), 16);
    }

    #[test]
    fn test_ctrl_encoding_does_not_collide() {
        let winding = fill_rule_to_ctrl(FillRule::Winding);
        let even_odd = fill_rule_to_ctrl(FillRule::EvenOdd);
        assert_eq!(winding as i32, TILE_CTRL_MASK_WINDING);
        assert_eq!(even_odd as i32, TILE_CTRL_MASK_EVEN_ODD);
        // The highest composite opcode still leaves the mask bits intact.
        let ctrl = winding | (0xf << super::TILE_CTRL_COMPOSITE_SHIFT) as u8;
        assert_eq!(ctrl & super::TILE_CTRL_MASK_MASK as u8, winding);
    }

    #[test]
    fn test_alpha_tile_ids_are_unique_and_bounded() {
        let counter = AtomicU32::new(0);
        let a = AlphaTileId::new(&counter);
        let b = AlphaTileId::new(&counter);
        assert_ne!(a, b);
        assert!(a.is_valid() && b.is_valid());

        let near_limit = AtomicU32::new(ALPHA_TILE_ID_LIMIT - 1);
        assert!(AlphaTileId::new(&near_limit).is_valid());
        assert!(!AlphaTileId::new(&near_limit).is_valid());
    }
}
