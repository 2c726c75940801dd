// tessera/renderer/src/gpu/renderer.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The renderer capability shared by both backends, plus resources common
//! to them: the mask texture geometry, the metadata texture, and the area
//! LUT.

use crate::gpu_data::{TEXTURE_METADATA_TEXTURE_WIDTH, TextureMetadataEntry};
use crate::options::RenderError;
use crate::tiles::{TILE_HEIGHT, TILE_WIDTH};
use std::mem;
use std::slice;
use tessera_color::ColorU;
use tessera_geometry::rect::RectI;
use tessera_geometry::util::alignup_i32;
use tessera_geometry::vector::{Vector2I, vec2i};
use tessera_gpu::{CommandEncoder, Device};

pub const MASK_TILES_ACROSS: u32 = 256;
pub const MASK_TILES_DOWN: u32 = 256;

/// The mask texture. Four mask rows are compressed into the RGBA channels
/// of each texel row, so the texture is a quarter as tall as the tiles it
/// stores.
pub const MASK_FRAMEBUFFER_WIDTH: i32 = TILE_WIDTH as i32 * MASK_TILES_ACROSS as i32;
pub const MASK_FRAMEBUFFER_HEIGHT: i32 =
    TILE_HEIGHT as i32 / 4 * MASK_TILES_DOWN as i32;

/// The number of alpha tiles that fit in the mask texture.
pub const MASK_TILES_PER_PAGE: u32 = MASK_TILES_ACROSS * MASK_TILES_DOWN;

pub const AREA_LUT_LENGTH: i32 = 256;

/// Builds a scene into the renderer-specific intermediate form. One
/// concrete implementation per backend; the scene itself is
/// backend-agnostic.
pub trait SceneBuilder {
    fn build(&mut self, scene: &crate::scene::Scene);
}

/// A renderer: one concrete implementation per execution strategy.
pub trait Renderer<D> where D: Device {
    type SceneBuilder: SceneBuilder;

    /// Compiles the backend's pipelines. Must be called once before
    /// `draw`.
    fn set_up_pipelines(&mut self) -> Result<(), RenderError>;

    /// Renders one frame from the built scene.
    fn draw(&mut self, scene_builder: &mut Self::SceneBuilder) -> Result<(), RenderError>;

    /// Replaces the destination texture. Dependent resources are
    /// reallocated on the next draw.
    fn set_dest_texture(&mut self, texture: D::Texture);

    fn dest_texture(&self) -> Option<&D::Texture>;
}

/// Reinterprets a slice of packed GPU records as bytes for upload.
///
/// Safety: `T` must be `#[repr(C)]` with no padding requirements beyond
/// its fields'.
pub(crate) fn slice_to_bytes<T>(data: &[T]) -> &[u8] {
    unsafe {
        slice::from_raw_parts(data.as_ptr() as *const u8,
                              data.len() * mem::size_of::<T>())
    }
}

/// The size of the metadata texture needed for `entry_count` entries.
pub(crate) fn texture_metadata_size(entry_count: usize) -> Vector2I {
    vec2i(TEXTURE_METADATA_TEXTURE_WIDTH,
          alignup_i32(entry_count.max(1) as i32,
                      crate::gpu_data::TEXTURE_METADATA_ENTRIES_PER_ROW))
}

/// Packs the metadata entries into RGBA16F texels (four texels per entry)
/// and records the upload.
pub(crate) fn upload_texture_metadata<D>(encoder: &mut D::CommandEncoder,
                                         texture: &D::Texture,
                                         entries: &[TextureMetadataEntry])
                                         where D: Device {
    if entries.is_empty() {
        return;
    }

    let size = texture_metadata_size(entries.len());
    let area = size.x as usize * size.y as usize;

    let mut texels = Vec::with_capacity(area * 4);
    for entry in entries {
        let base_color = entry.base_color.to_f32();
        texels.extend_from_slice(&[
            entry.color_transform.m11(),
            entry.color_transform.m21(),
            entry.color_transform.m12(),
            entry.color_transform.m22(),
            entry.color_transform.vector.x,
            entry.color_transform.vector.y,
            0.0,
            0.0,
            base_color.r,
            base_color.g,
            base_color.b,
            base_color.a,
            0.0,
            0.0,
            0.0,
            0.0,
        ]);
    }
    while texels.len() < area * 4 {
        texels.push(0.0);
    }

    let bytes = tessera_gpu::f32_slice_to_f16_bytes(&texels);
    encoder.upload_to_texture(texture, RectI::new(Vector2I::zero(), size), &bytes);
}

/// Computes the area LUT: texel (u, v) holds the coverage of a pixel whose
/// center is `u/16 − 8` pixels above the edge, for an edge falling
/// `v/16` pixels across the sample window.
pub(crate) fn build_area_lut_texels() -> Vec<ColorU> {
    let mut texels = Vec::with_capacity((AREA_LUT_LENGTH * AREA_LUT_LENGTH) as usize);
    for v in 0..AREA_LUT_LENGTH {
        let dy = v as f32 / (AREA_LUT_LENGTH - 1) as f32 * 16.0;
        for u in 0..AREA_LUT_LENGTH {
            let y = u as f32 / (AREA_LUT_LENGTH - 1) as f32 * 16.0 - 8.0;

            // Average coverage over the window.
            const SAMPLES: i32 = 16;
            let mut coverage = 0.0;
            for sample in 0..SAMPLES {
                let s = (sample as f32 + 0.5) / SAMPLES as f32 - 0.5;
                coverage += (0.5 - (y + dy * s)).max(0.0).min(1.0);
            }
            coverage /= SAMPLES as f32;

            let value = (coverage * 255.0).round() as u8;
            texels.push(ColorU::new(value, value, value, value));
        }
    }
    texels
}

#[cfg(test)]
mod tests {
    use super::{build_area_lut_texels, texture_metadata_size, AREA_LUT_LENGTH};
    use tessera_geometry::vector::vec2i;

    #[test]
    fn test_metadata_texture_size() {
        assert_eq!(texture_metadata_size(1), vec2i(512, 1));
        assert_eq!(texture_metadata_size(128), vec2i(512, 1));
        assert_eq!(texture_metadata_size(129), vec2i(512, 2));
    }

    #[test]
    fn test_area_lut_extremes() {
        let texels = build_area_lut_texels();
        assert_eq!(texels.len(), (AREA_LUT_LENGTH * AREA_LUT_LENGTH) as usize);
        // Far above the edge: no coverage. Far below: full coverage.
        assert_eq!(texels[(AREA_LUT_LENGTH - 1) as usize].r, 0);
        assert_eq!(texels[0].r, 255);
    }
}
