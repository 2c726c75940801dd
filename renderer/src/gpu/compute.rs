// tessera/renderer/src/gpu/compute.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The compute renderer: dices, bins, propagates, fills, sorts, and
//! composites tiles entirely on the GPU.

use crate::compute::{ComputeSceneBuilder, DrawTileBatch, PrepareTilesInfo, TileBatchData};
use crate::gpu::mem::{GeneralBufferId, GpuMemoryAllocator, TextureId};
use crate::gpu::renderer::{self, MASK_FRAMEBUFFER_HEIGHT, MASK_FRAMEBUFFER_WIDTH, Renderer,
                           slice_to_bytes};
use crate::gpu::shaders::ComputePrograms;
use crate::gpu::raster::filter_params;
use crate::gpu_data::{ALPHA_TILE_ID_LIMIT, AlphaTileInfo, DiceMetadata, Fill, FirstTile,
                      Microline, PathSource, PropagateMetadata, Segments, TileBatchTexture,
                      TileCompute, TilePathInfo};
use crate::options::{RenderError, RendererOptions};
use crate::paint::{PaintInfo, TexturePageContent};
use crate::tiles;
use byte_slice_cast::AsByteSlice;
use smallvec::SmallVec;
use std::mem;
use std::ops::Range;
use tessera_color::{ColorF, color_slice_to_u8_slice};
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectI;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::{Vector2F, Vector2I, vec2i};
use tessera_gpu::{CommandEncoder, DescriptorBinding, Device, TextureFilter, TextureFormat};
use vec_map::VecMap;

const FILL_INDIRECT_DRAW_PARAMS_INSTANCE_COUNT_INDEX: usize = 1;
const FILL_INDIRECT_DRAW_PARAMS_ALPHA_TILE_COUNT_INDEX: usize = 4;
const FILL_INDIRECT_DRAW_PARAMS_SIZE: usize = 8;

const BIN_INDIRECT_DRAW_PARAMS_MICROLINE_COUNT_INDEX: usize = 3;

const DICE_WORKGROUP_SIZE: u32 = 64;
const BOUND_WORKGROUP_SIZE: u32 = 64;
const BIN_WORKGROUP_SIZE: u32 = 64;
const PROPAGATE_WORKGROUP_SIZE: u32 = 64;
const SORT_WORKGROUP_SIZE: u32 = 64;

/// Whether the tile pass clears or loads the destination.
const LOAD_ACTION_CLEAR: i32 = 0;
const LOAD_ACTION_LOAD: i32 = 1;

const INITIAL_ALLOCATED_MICROLINE_COUNT: u32 = 1024 * 16;
const INITIAL_ALLOCATED_FILL_COUNT: u32 = 1024 * 16;

#[derive(Default)]
struct SceneSourceBuffers {
    points_buffer: Option<GeneralBufferId>,
    points_capacity: u32,
    point_indices_buffer: Option<GeneralBufferId>,
    point_indices_capacity: u32,
    point_indices_count: u32,
}

#[derive(Default)]
struct SceneBuffers {
    draw: SceneSourceBuffers,
    clip: SceneSourceBuffers,
}

struct TileBatchInfo {
    tile_count: u32,
    z_buffer_id: GeneralBufferId,
    tiles_buffer_id: GeneralBufferId,
    propagate_metadata_buffer_id: GeneralBufferId,
    first_tile_map_buffer_id: GeneralBufferId,
}

struct MicrolineStorage {
    buffer_id: GeneralBufferId,
    count: u32,
}

/// Renders scenes built by the `ComputeSceneBuilder`.
pub struct ComputeRenderer<D> where D: Device {
    pub device: D,
    options: RendererOptions,
    allocator: GpuMemoryAllocator<D>,

    programs: Option<ComputePrograms<D>>,

    dest_texture: Option<D::Texture>,
    mask_texture: D::Texture,
    area_lut_texture: D::Texture,
    metadata_texture: Option<(D::Texture, Vector2I)>,

    paint_textures: Vec<Option<D::Texture>>,
    render_target_textures: SmallVec<[(RenderTargetId, TextureId); 4]>,

    dice_ub0: D::Buffer,
    dice_ub1: D::Buffer,
    bound_ub: D::Buffer,
    bin_ub: D::Buffer,
    propagate_ub: D::Buffer,
    fill_ub: D::Buffer,
    sort_ub: D::Buffer,
    tile_ub0: D::Buffer,
    tile_ub1: D::Buffer,
    filter_ub: D::Buffer,

    scene_buffers: SceneBuffers,
    tile_batch_info: VecMap<TileBatchInfo>,

    allocated_microline_count: u32,
    allocated_fill_count: u32,
    alpha_tile_count: u32,
    clear_dest_texture: bool,
}

impl<D> ComputeRenderer<D> where D: Device {
    pub fn new(device: D, options: RendererOptions)
               -> Result<ComputeRenderer<D>, RenderError> {
        let mask_size = vec2i(MASK_FRAMEBUFFER_WIDTH, MASK_FRAMEBUFFER_HEIGHT);
        let mask_texture =
            device.create_texture(TextureFormat::Rgba8Unorm, mask_size, "mask texture")?;

        let area_lut_size = vec2i(renderer::AREA_LUT_LENGTH, renderer::AREA_LUT_LENGTH);
        let area_lut_texture =
            device.create_texture(TextureFormat::Rgba8Unorm, area_lut_size, "area lut")?;

        let dice_ub0 = create_uniform_buffer(&device, 12, "dice uniforms 0")?;
        let dice_ub1 = create_uniform_buffer(&device, 4, "dice uniforms 1")?;
        let bound_ub = create_uniform_buffer(&device, 4, "bound uniforms")?;
        let bin_ub = create_uniform_buffer(&device, 4, "bin uniforms")?;
        let propagate_ub = create_uniform_buffer(&device, 4, "propagate uniforms")?;
        let fill_ub = create_uniform_buffer(&device, 4, "fill uniforms")?;
        let sort_ub = create_uniform_buffer(&device, 4, "sort uniforms")?;
        let tile_ub0 = create_uniform_buffer(&device, 8, "tile uniforms 0")?;
        let tile_ub1 = create_uniform_buffer(&device, 8, "tile uniforms 1")?;
        let filter_ub = create_uniform_buffer(&device, 12, "filter uniforms")?;

        let mut encoder = device.create_command_encoder("init compute renderer");
        let area_lut_texels = renderer::build_area_lut_texels();
        encoder.upload_to_texture(&area_lut_texture,
                                  RectI::new(Vector2I::zero(), area_lut_size),
                                  color_slice_to_u8_slice(&area_lut_texels));
        device.submit_and_wait(encoder)?;

        Ok(ComputeRenderer {
            device,
            options,
            allocator: GpuMemoryAllocator::new(),
            programs: None,
            dest_texture: None,
            mask_texture,
            area_lut_texture,
            metadata_texture: None,
            paint_textures: vec![],
            render_target_textures: SmallVec::new(),
            dice_ub0,
            dice_ub1,
            bound_ub,
            bin_ub,
            propagate_ub,
            fill_ub,
            sort_ub,
            tile_ub0,
            tile_ub1,
            filter_ub,
            scene_buffers: SceneBuffers::default(),
            tile_batch_info: VecMap::new(),
            allocated_microline_count: INITIAL_ALLOCATED_MICROLINE_COUNT,
            allocated_fill_count: INITIAL_ALLOCATED_FILL_COUNT,
            alpha_tile_count: 0,
            clear_dest_texture: true,
        })
    }

    /// The destination size in whole tiles.
    fn framebuffer_tile_size(&self) -> Vector2I {
        let dest_size = self.device.texture_size(self.dest_texture.as_ref().unwrap());
        tiles::pixel_size_to_tile_size(dest_size)
    }

    fn upload_scene(&mut self, segments_dirty: bool,
                    draw_segments: &Segments,
                    clip_segments: &Segments)
                    -> Result<(), RenderError> {
        if !segments_dirty {
            return Ok(());
        }
        let mut encoder = self.device.create_command_encoder("upload scene");
        upload_source_buffers(&self.device,
                              &mut self.allocator,
                              &mut encoder,
                              &mut self.scene_buffers.draw,
                              draw_segments,
                              "draw")?;
        upload_source_buffers(&self.device,
                              &mut self.allocator,
                              &mut encoder,
                              &mut self.scene_buffers.clip,
                              clip_segments,
                              "clip")?;
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn upload_metadata(&mut self, paint_info: &PaintInfo) -> Result<(), RenderError> {
        let needed_size = renderer::texture_metadata_size(paint_info.metadata_entries.len());
        let needs_new_texture = match self.metadata_texture {
            Some((_, size)) => size.y < needed_size.y,
            None => true,
        };
        if needs_new_texture {
            let texture = self.device.create_texture(TextureFormat::Rgba16F,
                                                     needed_size,
                                                     "metadata texture")?;
            self.metadata_texture = Some((texture, needed_size));
        }

        let mut encoder = self.device.create_command_encoder("upload metadata");
        let (ref texture, _) = *self.metadata_texture.as_ref().unwrap();
        renderer::upload_texture_metadata::<D>(&mut encoder,
                                               texture,
                                               &paint_info.metadata_entries);
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn prepare_paint_textures(&mut self, paint_info: &PaintInfo)
                              -> Result<(), RenderError> {
        self.paint_textures.clear();

        self.render_target_textures.clear();
        for metadata in &paint_info.render_target_metadata {
            let texture_id = self.allocator.allocate_texture(
                &self.device,
                metadata.location.rect.size(),
                TextureFormat::Rgba8Unorm,
                "render target")?;
            self.render_target_textures.push((metadata.id, texture_id));
        }

        let mut encoder = self.device.create_command_encoder("upload paint textures");
        for page in &paint_info.texture_pages {
            let page = match page {
                None => {
                    self.paint_textures.push(None);
                    continue;
                }
                Some(page) => page,
            };
            match page.content {
                TexturePageContent::Texels(ref texels) => {
                    let texture = self.device.create_texture(TextureFormat::Rgba8Unorm,
                                                             page.size,
                                                             "paint page")?;
                    encoder.upload_to_texture(&texture,
                                              RectI::new(Vector2I::zero(), page.size),
                                              color_slice_to_u8_slice(texels));
                    self.paint_textures.push(Some(texture));
                }
                TexturePageContent::RenderTarget(id) => {
                    let texture_id = self.texture_id_for_render_target(id);
                    self.paint_textures
                        .push(Some(self.allocator.get_texture(texture_id).clone()));
                }
            }
        }
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn texture_id_for_render_target(&self, id: RenderTargetId) -> TextureId {
        self.render_target_textures
            .iter()
            .find(|&&(existing_id, _)| existing_id == id)
            .map(|&(_, texture_id)| texture_id)
            .expect("render target was never declared")
    }

    fn allocate_z_buffer(&mut self) -> Result<GeneralBufferId, RenderError> {
        // The fill indirect draw params live in a reserved prefix of the
        // Z-buffer rather than their own buffer, to respect the 8-SSBO
        // minimum of some drivers.
        let size = self.framebuffer_tile_size().area() as u64 +
            FILL_INDIRECT_DRAW_PARAMS_SIZE as u64;
        Ok(self.allocator
               .allocate_general_buffer(&self.device, size * 4, "z buffer")?)
    }

    /// Prepares one batch: dice, bound, bin, propagate, fill, sort.
    /// Returns false if the batch had to be dropped.
    fn prepare_tiles(&mut self, batch: &TileBatchData) -> Result<bool, RenderError> {
        let tiles_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            batch.tile_count.max(1) as u64 * mem::size_of::<TileCompute>() as u64,
            "tiles buffer")?;

        // Fetch clip storage if the batch is clipped.
        let clip_buffer_ids = if batch.clipped_path_count > 0 {
            match self.tile_batch_info.get(0) {
                Some(clip_info) => {
                    Some((clip_info.propagate_metadata_buffer_id, clip_info.tiles_buffer_id))
                }
                None => {
                    warn!("clipped batch has no prepared clip batch");
                    None
                }
            }
        } else {
            None
        };

        let z_buffer_id = self.allocate_z_buffer()?;
        let first_tile_map_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            self.framebuffer_tile_size().area() as u64 * mem::size_of::<FirstTile>() as u64,
            "first tile map buffer")?;

        let propagate_metadata_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            batch.prepare_info.propagate_metadata.len().max(1) as u64 *
                mem::size_of::<PropagateMetadata>() as u64,
            "propagate metadata buffer")?;
        let backdrops_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            batch.prepare_info.backdrops.len().max(1) as u64 *
                mem::size_of::<crate::gpu_data::BackdropInfo>() as u64,
            "backdrops buffer")?;

        {
            let mut encoder = self.device.create_command_encoder("upload propagate metadata");
            encoder.upload_to_buffer(
                self.allocator.get_general_buffer(propagate_metadata_buffer_id),
                0,
                slice_to_bytes(&batch.prepare_info.propagate_metadata));
            self.device.submit_and_wait(encoder)?;
        }

        // Dice (flatten) segments into microlines. We might have to do
        // this twice if the first attempt runs out of space.
        let mut microline_storage = None;
        for _ in 0..2 {
            microline_storage = self.dice_segments(&batch.prepare_info,
                                                   batch.segment_count,
                                                   batch.path_source)?;
            if microline_storage.is_some() {
                break;
            }
        }
        let microline_storage = match microline_storage {
            Some(microline_storage) => microline_storage,
            None => {
                error!("ran out of space for microlines when dicing; dropping batch {:?}",
                       batch.batch_id);
                self.allocator.free_general_buffer(tiles_buffer_id);
                self.allocator.free_general_buffer(z_buffer_id);
                self.allocator.free_general_buffer(first_tile_map_buffer_id);
                self.allocator.free_general_buffer(propagate_metadata_buffer_id);
                self.allocator.free_general_buffer(backdrops_buffer_id);
                return Ok(false);
            }
        };

        // Initialize tiles and bin segments. On fill overflow the tiles
        // and backdrops were already mutated, so bound and the backdrop
        // upload must be re-run.
        let mut fill_buffer_id = None;
        for _ in 0..2 {
            self.bound(tiles_buffer_id, batch.tile_count, &batch.prepare_info)?;
            self.upload_initial_backdrops(backdrops_buffer_id, &batch.prepare_info)?;
            fill_buffer_id = self.bin_segments(&microline_storage,
                                               propagate_metadata_buffer_id,
                                               backdrops_buffer_id,
                                               tiles_buffer_id,
                                               z_buffer_id)?;
            if fill_buffer_id.is_some() {
                break;
            }
        }
        self.allocator.free_general_buffer(microline_storage.buffer_id);
        let fill_buffer_id = match fill_buffer_id {
            Some(fill_buffer_id) => fill_buffer_id,
            None => {
                error!("ran out of space for fills when binning; dropping batch {:?}",
                       batch.batch_id);
                self.allocator.free_general_buffer(tiles_buffer_id);
                self.allocator.free_general_buffer(z_buffer_id);
                self.allocator.free_general_buffer(first_tile_map_buffer_id);
                self.allocator.free_general_buffer(propagate_metadata_buffer_id);
                self.allocator.free_general_buffer(backdrops_buffer_id);
                return Ok(false);
            }
        };

        let alpha_tiles_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            batch.tile_count.max(1) as u64 * mem::size_of::<AlphaTileInfo>() as u64,
            "alpha tile info buffer")?;

        let alpha_tile_range = self.propagate_tiles(
            batch.prepare_info.backdrops.len() as u32,
            tiles_buffer_id,
            z_buffer_id,
            first_tile_map_buffer_id,
            alpha_tiles_buffer_id,
            propagate_metadata_buffer_id,
            backdrops_buffer_id,
            clip_buffer_ids)?;

        self.allocator.free_general_buffer(backdrops_buffer_id);

        self.draw_fills(fill_buffer_id, tiles_buffer_id, alpha_tiles_buffer_id,
                        &alpha_tile_range)?;

        self.allocator.free_general_buffer(fill_buffer_id);
        self.allocator.free_general_buffer(alpha_tiles_buffer_id);

        self.sort_tiles(tiles_buffer_id, first_tile_map_buffer_id, z_buffer_id)?;

        self.tile_batch_info.insert(batch.batch_id.0 as usize, TileBatchInfo {
            tile_count: batch.tile_count,
            z_buffer_id,
            tiles_buffer_id,
            propagate_metadata_buffer_id,
            first_tile_map_buffer_id,
        });

        Ok(true)
    }

    fn dice_segments(&mut self,
                     prepare_info: &PrepareTilesInfo,
                     batch_segment_count: u32,
                     path_source: PathSource)
                     -> Result<Option<MicrolineStorage>, RenderError> {
        let microline_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            self.allocated_microline_count as u64 * mem::size_of::<Microline>() as u64,
            "microline buffer")?;
        let dice_metadata_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            prepare_info.dice_metadata.len().max(1) as u64 *
                mem::size_of::<DiceMetadata>() as u64,
            "dice metadata buffer")?;
        let indirect_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            FILL_INDIRECT_DRAW_PARAMS_SIZE as u64 * 4,
            "indirect draw params buffer")?;

        let source_buffers = match path_source {
            PathSource::Draw => &self.scene_buffers.draw,
            PathSource::Clip => &self.scene_buffers.clip,
        };
        let (points_buffer_id, point_indices_buffer_id, point_indices_count) =
            match (source_buffers.points_buffer, source_buffers.point_indices_buffer) {
                (Some(points), Some(indices)) => {
                    (points, indices, source_buffers.point_indices_count)
                }
                _ => {
                    // Empty scene source; nothing to dice.
                    self.allocator.free_general_buffer(dice_metadata_buffer_id);
                    self.allocator.free_general_buffer(indirect_buffer_id);
                    return Ok(Some(MicrolineStorage {
                        buffer_id: microline_buffer_id,
                        count: 0,
                    }));
                }
            };

        let indirect_params: [u32; FILL_INDIRECT_DRAW_PARAMS_SIZE] =
            [0, 0, 0, 0, point_indices_count, 0, 0, 0];

        let transform = prepare_info.transform;
        let dice_uniform_data0: [f32; 12] = transform_to_std140(transform);
        let dice_uniform_data1: [i32; 4] = [
            prepare_info.dice_metadata.len() as i32,
            batch_segment_count as i32,
            self.allocated_microline_count as i32,
            0,
        ];

        let mut encoder = self.device.create_command_encoder("dice segments");
        encoder.upload_to_buffer(self.allocator.get_general_buffer(indirect_buffer_id),
                                 0,
                                 indirect_params.as_byte_slice());
        encoder.upload_to_buffer(self.allocator.get_general_buffer(dice_metadata_buffer_id),
                                 0,
                                 slice_to_bytes(&prepare_info.dice_metadata));
        encoder.upload_to_buffer(&self.dice_ub0, 0, dice_uniform_data0.as_byte_slice());
        encoder.upload_to_buffer(&self.dice_ub1, 0, dice_uniform_data1.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0, self.allocator.get_general_buffer(indirect_buffer_id).clone(), true),
            DescriptorBinding::storage(
                1, self.allocator.get_general_buffer(dice_metadata_buffer_id).clone(), false),
            DescriptorBinding::storage(
                2, self.allocator.get_general_buffer(points_buffer_id).clone(), false),
            DescriptorBinding::storage(
                3, self.allocator.get_general_buffer(point_indices_buffer_id).clone(), false),
            DescriptorBinding::storage(
                4, self.allocator.get_general_buffer(microline_buffer_id).clone(), true),
            DescriptorBinding::uniform(5, self.dice_ub0.clone()),
            DescriptorBinding::uniform(6, self.dice_ub1.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.dice);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch(
            (batch_segment_count + DICE_WORKGROUP_SIZE - 1) / DICE_WORKGROUP_SIZE, 1, 1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;

        // Read the microline count back.
        let mut readback = [0u8; FILL_INDIRECT_DRAW_PARAMS_SIZE * 4];
        self.device.read_buffer(self.allocator.get_general_buffer(indirect_buffer_id),
                                0,
                                &mut readback);
        let microline_count =
            read_u32(&readback, BIN_INDIRECT_DRAW_PARAMS_MICROLINE_COUNT_INDEX);

        self.allocator.free_general_buffer(dice_metadata_buffer_id);
        self.allocator.free_general_buffer(indirect_buffer_id);

        if microline_count > self.allocated_microline_count {
            self.allocated_microline_count = microline_count.next_power_of_two();
            self.allocator.free_general_buffer(microline_buffer_id);
            return Ok(None);
        }

        Ok(Some(MicrolineStorage { buffer_id: microline_buffer_id, count: microline_count }))
    }

    fn bound(&mut self,
             tiles_buffer_id: GeneralBufferId,
             tile_count: u32,
             prepare_info: &PrepareTilesInfo)
             -> Result<(), RenderError> {
        let path_info_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            prepare_info.tile_path_info.len().max(1) as u64 *
                mem::size_of::<TilePathInfo>() as u64,
            "path info buffer")?;

        let uniform_data: [i32; 4] =
            [prepare_info.tile_path_info.len() as i32, tile_count as i32, 0, 0];

        let mut encoder = self.device.create_command_encoder("bound");
        encoder.upload_to_buffer(self.allocator.get_general_buffer(path_info_buffer_id),
                                 0,
                                 slice_to_bytes(&prepare_info.tile_path_info));
        encoder.upload_to_buffer(&self.bound_ub, 0, uniform_data.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0, self.allocator.get_general_buffer(path_info_buffer_id).clone(), false),
            DescriptorBinding::storage(
                1, self.allocator.get_general_buffer(tiles_buffer_id).clone(), true),
            DescriptorBinding::uniform(2, self.bound_ub.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.bound);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch((tile_count + BOUND_WORKGROUP_SIZE - 1) / BOUND_WORKGROUP_SIZE,
                         1,
                         1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;

        self.allocator.free_general_buffer(path_info_buffer_id);
        Ok(())
    }

    fn upload_initial_backdrops(&self,
                                backdrops_buffer_id: GeneralBufferId,
                                prepare_info: &PrepareTilesInfo)
                                -> Result<(), RenderError> {
        let mut encoder = self.device.create_command_encoder("upload initial backdrops");
        encoder.upload_to_buffer(self.allocator.get_general_buffer(backdrops_buffer_id),
                                 0,
                                 slice_to_bytes(&prepare_info.backdrops));
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn bin_segments(&mut self,
                    microline_storage: &MicrolineStorage,
                    propagate_metadata_buffer_id: GeneralBufferId,
                    backdrops_buffer_id: GeneralBufferId,
                    tiles_buffer_id: GeneralBufferId,
                    z_buffer_id: GeneralBufferId)
                    -> Result<Option<GeneralBufferId>, RenderError> {
        let fill_buffer_id = self.allocator.allocate_general_buffer(
            &self.device,
            self.allocated_fill_count as u64 * mem::size_of::<Fill>() as u64,
            "fill vertex buffer")?;

        // The fill indirect draw params go in the Z-buffer's reserved
        // prefix.
        let indirect_params: [u32; FILL_INDIRECT_DRAW_PARAMS_SIZE] =
            [6, 0, 0, 0, 0, microline_storage.count, 0, 0];
        let uniform_data: [i32; 4] = [
            microline_storage.count as i32,
            self.allocated_fill_count as i32,
            0,
            0,
        ];

        let mut encoder = self.device.create_command_encoder("bin segments");
        encoder.upload_to_buffer(self.allocator.get_general_buffer(z_buffer_id),
                                 0,
                                 indirect_params.as_byte_slice());
        encoder.upload_to_buffer(&self.bin_ub, 0, uniform_data.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0,
                self.allocator.get_general_buffer(microline_storage.buffer_id).clone(),
                false),
            DescriptorBinding::storage(
                1,
                self.allocator.get_general_buffer(propagate_metadata_buffer_id).clone(),
                false),
            DescriptorBinding::storage(
                2, self.allocator.get_general_buffer(z_buffer_id).clone(), true),
            DescriptorBinding::storage(
                3, self.allocator.get_general_buffer(fill_buffer_id).clone(), true),
            DescriptorBinding::storage(
                4, self.allocator.get_general_buffer(tiles_buffer_id).clone(), true),
            DescriptorBinding::storage(
                5, self.allocator.get_general_buffer(backdrops_buffer_id).clone(), true),
            DescriptorBinding::uniform(6, self.bin_ub.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.bin);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch(
            (microline_storage.count + BIN_WORKGROUP_SIZE - 1) / BIN_WORKGROUP_SIZE, 1, 1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;

        let mut readback = [0u8; FILL_INDIRECT_DRAW_PARAMS_SIZE * 4];
        self.device.read_buffer(self.allocator.get_general_buffer(z_buffer_id),
                                0,
                                &mut readback);
        let needed_fill_count =
            read_u32(&readback, FILL_INDIRECT_DRAW_PARAMS_INSTANCE_COUNT_INDEX);

        if needed_fill_count > self.allocated_fill_count {
            self.allocated_fill_count = needed_fill_count.next_power_of_two();
            self.allocator.free_general_buffer(fill_buffer_id);
            return Ok(None);
        }

        Ok(Some(fill_buffer_id))
    }

    fn propagate_tiles(&mut self,
                       column_count: u32,
                       tiles_buffer_id: GeneralBufferId,
                       z_buffer_id: GeneralBufferId,
                       first_tile_map_buffer_id: GeneralBufferId,
                       alpha_tiles_buffer_id: GeneralBufferId,
                       propagate_metadata_buffer_id: GeneralBufferId,
                       backdrops_buffer_id: GeneralBufferId,
                       clip_buffer_ids: Option<(GeneralBufferId, GeneralBufferId)>)
                       -> Result<Range<u32>, RenderError> {
        let framebuffer_tile_size = self.framebuffer_tile_size();
        let tile_area = framebuffer_tile_size.area() as usize;

        let mut encoder = self.device.create_command_encoder("propagate tiles");

        // Zero the Z-buffer past the reserved prefix and reset the first
        // tile map.
        let z_buffer_data = vec![0i32; tile_area];
        encoder.upload_to_buffer(self.allocator.get_general_buffer(z_buffer_id),
                                 FILL_INDIRECT_DRAW_PARAMS_SIZE as u64 * 4,
                                 z_buffer_data.as_byte_slice());
        let first_tile_map = vec![FirstTile::default(); tile_area];
        encoder.upload_to_buffer(self.allocator.get_general_buffer(first_tile_map_buffer_id),
                                 0,
                                 slice_to_bytes(&first_tile_map));

        let uniform_data: [i32; 4] = [
            framebuffer_tile_size.x,
            framebuffer_tile_size.y,
            column_count as i32,
            self.alpha_tile_count as i32,
        ];
        encoder.upload_to_buffer(&self.propagate_ub, 0, uniform_data.as_byte_slice());

        let (clip_metadata_id, clip_tiles_id) = match clip_buffer_ids {
            Some((metadata, tiles)) => (metadata, tiles),
            // Placeholder bindings; the shader never reads them when no
            // path in the batch is clipped.
            None => (propagate_metadata_buffer_id, tiles_buffer_id),
        };

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0,
                self.allocator.get_general_buffer(propagate_metadata_buffer_id).clone(),
                false),
            DescriptorBinding::storage(
                1, self.allocator.get_general_buffer(clip_metadata_id).clone(), false),
            DescriptorBinding::storage(
                2, self.allocator.get_general_buffer(backdrops_buffer_id).clone(), false),
            DescriptorBinding::storage(
                3, self.allocator.get_general_buffer(tiles_buffer_id).clone(), true),
            DescriptorBinding::storage(
                4, self.allocator.get_general_buffer(clip_tiles_id).clone(), true),
            DescriptorBinding::storage(
                5, self.allocator.get_general_buffer(z_buffer_id).clone(), true),
            DescriptorBinding::storage(
                6,
                self.allocator.get_general_buffer(first_tile_map_buffer_id).clone(),
                true),
            DescriptorBinding::storage(
                7, self.allocator.get_general_buffer(alpha_tiles_buffer_id).clone(), true),
            DescriptorBinding::uniform(8, self.propagate_ub.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.propagate);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch(
            (column_count + PROPAGATE_WORKGROUP_SIZE - 1) / PROPAGATE_WORKGROUP_SIZE, 1, 1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;

        let mut readback = [0u8; FILL_INDIRECT_DRAW_PARAMS_SIZE * 4];
        self.device.read_buffer(self.allocator.get_general_buffer(z_buffer_id),
                                0,
                                &mut readback);
        let batch_alpha_tile_count =
            read_u32(&readback, FILL_INDIRECT_DRAW_PARAMS_ALPHA_TILE_COUNT_INDEX);

        let alpha_tile_start = self.alpha_tile_count;
        self.alpha_tile_count += batch_alpha_tile_count;
        if self.alpha_tile_count >= ALPHA_TILE_ID_LIMIT {
            error!("frame produced more than 2^24 alpha tiles; aborting");
            return Err(RenderError::AlphaTileOverflow);
        }

        Ok(alpha_tile_start..self.alpha_tile_count)
    }

    fn draw_fills(&mut self,
                  fill_buffer_id: GeneralBufferId,
                  tiles_buffer_id: GeneralBufferId,
                  alpha_tiles_buffer_id: GeneralBufferId,
                  alpha_tile_range: &Range<u32>)
                  -> Result<(), RenderError> {
        let alpha_tile_count = alpha_tile_range.end - alpha_tile_range.start;
        if alpha_tile_count == 0 {
            return Ok(());
        }

        let uniform_data: [i32; 4] =
            [alpha_tile_range.start as i32, alpha_tile_range.end as i32, 0, 0];

        let mut encoder = self.device.create_command_encoder("draw fills");
        encoder.upload_to_buffer(&self.fill_ub, 0, uniform_data.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0, self.allocator.get_general_buffer(fill_buffer_id).clone(), false),
            DescriptorBinding::storage(
                1, self.allocator.get_general_buffer(tiles_buffer_id).clone(), false),
            DescriptorBinding::storage(
                2, self.allocator.get_general_buffer(alpha_tiles_buffer_id).clone(), false),
            DescriptorBinding::image(3, self.mask_texture.clone()),
            DescriptorBinding::sampled(4, self.area_lut_texture.clone(),
                                       TextureFilter::Linear),
            DescriptorBinding::uniform(5, self.fill_ub.clone()),
        ]);

        // Two-dimensional dispatch to dodge driver limits on large
        // one-dimensional dispatches.
        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.fill);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch(alpha_tile_count.min(1 << 15),
                         (alpha_tile_count + (1 << 15) - 1) >> 15,
                         1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn sort_tiles(&mut self,
                  tiles_buffer_id: GeneralBufferId,
                  first_tile_map_buffer_id: GeneralBufferId,
                  z_buffer_id: GeneralBufferId)
                  -> Result<(), RenderError> {
        let tile_count = self.framebuffer_tile_size().area() as u32;
        let uniform_data: [i32; 4] = [tile_count as i32, 0, 0, 0];

        let mut encoder = self.device.create_command_encoder("sort tiles");
        encoder.upload_to_buffer(&self.sort_ub, 0, uniform_data.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0, self.allocator.get_general_buffer(tiles_buffer_id).clone(), true),
            DescriptorBinding::storage(
                1,
                self.allocator.get_general_buffer(first_tile_map_buffer_id).clone(),
                true),
            DescriptorBinding::storage(
                2, self.allocator.get_general_buffer(z_buffer_id).clone(), false),
            DescriptorBinding::uniform(3, self.sort_ub.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.sort);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch((tile_count + SORT_WORKGROUP_SIZE - 1) / SORT_WORKGROUP_SIZE, 1, 1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn draw_tiles(&mut self, batch: &DrawTileBatch) -> Result<(), RenderError> {
        let batch_info = match self.tile_batch_info.get(batch.tile_batch_data.batch_id.0 as
                                                        usize) {
            Some(info) => info,
            None => return Ok(()),
        };

        let framebuffer_tile_size = self.framebuffer_tile_size();

        // Decide the target and the load action.
        let (target_texture, load_action);
        match batch.render_target {
            Some(id) => {
                let texture_id = self.texture_id_for_render_target(id);
                target_texture = self.allocator.get_texture(texture_id).clone();
                load_action = LOAD_ACTION_CLEAR;
            }
            None => {
                target_texture = self.dest_texture.as_ref().unwrap().clone();
                load_action = if self.clear_dest_texture {
                    LOAD_ACTION_CLEAR
                } else {
                    LOAD_ACTION_LOAD
                };
            }
        }
        let target_size = self.device.texture_size(&target_texture);

        let color_texture = batch.color_texture
                                 .and_then(|batch_texture: TileBatchTexture| {
                                     self.paint_textures[batch_texture.page.0 as usize]
                                         .clone()
                                 });
        let color_texture_size = color_texture
            .as_ref()
            .map(|texture| self.device.texture_size(texture))
            .unwrap_or(Vector2I::zero());

        let clear_color = self.options
                              .background_color
                              .unwrap_or(ColorF::transparent_black());
        let (ref metadata_texture, metadata_size) = *self.metadata_texture.as_ref().unwrap();

        let tile_uniform_data0: [f32; 8] = [
            clear_color.r,
            clear_color.g,
            clear_color.b,
            clear_color.a,
            color_texture_size.x as f32,
            color_texture_size.y as f32,
            target_size.x as f32,
            target_size.y as f32,
        ];
        let tile_uniform_data1: [i32; 8] = [
            metadata_size.x,
            metadata_size.y,
            framebuffer_tile_size.x,
            framebuffer_tile_size.y,
            load_action,
            0,
            0,
            0,
        ];
        let filter_uniform_data = filter_params(&batch.filter);

        let mut encoder = self.device.create_command_encoder("draw tiles");
        encoder.upload_to_buffer(&self.tile_ub0, 0, tile_uniform_data0.as_byte_slice());
        encoder.upload_to_buffer(&self.tile_ub1, 0, tile_uniform_data1.as_byte_slice());
        encoder.upload_to_buffer(&self.filter_ub, 0, filter_uniform_data.as_byte_slice());

        let mask_texture = self.mask_texture.clone();
        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::storage(
                0,
                self.allocator.get_general_buffer(batch_info.tiles_buffer_id).clone(),
                false),
            DescriptorBinding::storage(
                1,
                self.allocator
                    .get_general_buffer(batch_info.first_tile_map_buffer_id)
                    .clone(),
                false),
            DescriptorBinding::sampled(2, metadata_texture.clone(), TextureFilter::Nearest),
            DescriptorBinding::sampled(3,
                                       color_texture.unwrap_or_else(|| mask_texture.clone()),
                                       TextureFilter::Linear),
            DescriptorBinding::sampled(4, mask_texture, TextureFilter::Nearest),
            DescriptorBinding::image(5, target_texture),
            DescriptorBinding::uniform(6, self.tile_ub0.clone()),
            DescriptorBinding::uniform(7, self.tile_ub1.clone()),
            DescriptorBinding::uniform(8, self.filter_ub.clone()),
        ]);

        let programs = self.programs.as_ref().unwrap();
        encoder.begin_compute_pass();
        encoder.bind_compute_pipeline(&programs.tile);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.dispatch(framebuffer_tile_size.x as u32, framebuffer_tile_size.y as u32, 1);
        encoder.end_compute_pass();
        self.device.submit_and_wait(encoder)?;

        if batch.render_target.is_none() {
            self.clear_dest_texture = false;
        }
        Ok(())
    }

    fn free_tile_batch_buffers(&mut self) {
        let batch_ids: Vec<usize> = self.tile_batch_info.keys().collect();
        for batch_id in batch_ids {
            if let Some(info) = self.tile_batch_info.remove(batch_id) {
                self.allocator.free_general_buffer(info.z_buffer_id);
                self.allocator.free_general_buffer(info.tiles_buffer_id);
                self.allocator.free_general_buffer(info.propagate_metadata_buffer_id);
                self.allocator.free_general_buffer(info.first_tile_map_buffer_id);
            }
        }
        for (_, texture_id) in mem::replace(&mut self.render_target_textures,
                                            SmallVec::new()) {
            self.allocator.free_texture(texture_id);
        }
    }
}

impl<D> Renderer<D> for ComputeRenderer<D> where D: Device {
    type SceneBuilder = ComputeSceneBuilder;

    fn set_up_pipelines(&mut self) -> Result<(), RenderError> {
        self.programs = Some(ComputePrograms::new(&self.device)?);
        Ok(())
    }

    fn draw(&mut self, scene_builder: &mut ComputeSceneBuilder) -> Result<(), RenderError> {
        if self.programs.is_none() {
            return Err(RenderError::PipelinesNotReady);
        }
        if self.dest_texture.is_none() {
            return Err(RenderError::NoDestTexture);
        }

        let paint_info = match scene_builder.paint_info.take() {
            None => return Ok(()),
            Some(paint_info) => paint_info,
        };

        let built_segments = match scene_builder.built_segments {
            None => return Ok(()),
            Some(ref built_segments) => built_segments,
        };

        self.upload_scene(scene_builder.segments_are_dirty,
                          &built_segments.draw_segments,
                          &built_segments.clip_segments)?;
        scene_builder.segments_are_dirty = false;

        self.upload_metadata(&paint_info)?;
        self.prepare_paint_textures(&paint_info)?;

        self.alpha_tile_count = 0;
        self.clear_dest_texture = true;

        // Prepare clip tiles first; draw batches reference them.
        if let Some(clip_batch) = scene_builder.clip_batch.take() {
            if clip_batch.path_count > 0 {
                self.prepare_tiles(&clip_batch)?;
            }
        }

        // Prepare and draw each batch in display-list order.
        let tile_batches = mem::replace(&mut scene_builder.tile_batches, vec![]);
        for batch in &tile_batches {
            if self.prepare_tiles(&batch.tile_batch_data)? {
                self.draw_tiles(batch)?;
            }
        }

        self.free_tile_batch_buffers();
        self.allocator.purge_if_needed();

        Ok(())
    }

    fn set_dest_texture(&mut self, texture: D::Texture) {
        self.dest_texture = Some(texture);
    }

    fn dest_texture(&self) -> Option<&D::Texture> {
        self.dest_texture.as_ref()
    }
}

fn create_uniform_buffer<D>(device: &D, float_count: u64, tag: &str)
                            -> Result<D::Buffer, RenderError>
                            where D: Device {
    Ok(device.create_buffer(&tessera_gpu::BufferDescriptor {
        byte_size: float_count * 4,
        kind: tessera_gpu::BufferKind::Uniform,
        memory: tessera_gpu::MemoryProperty::HostVisibleCoherent,
    }, tag)?)
}

fn upload_source_buffers<D>(device: &D,
                            allocator: &mut GpuMemoryAllocator<D>,
                            encoder: &mut D::CommandEncoder,
                            source_buffers: &mut SceneSourceBuffers,
                            segments: &Segments,
                            tag: &str)
                            -> Result<(), RenderError>
                            where D: Device {
    let needed_points_capacity = (segments.points.len() as u32).next_power_of_two();
    let needed_point_indices_capacity = (segments.indices.len() as u32).next_power_of_two();

    if source_buffers.points_capacity < needed_points_capacity {
        if let Some(old_buffer) = source_buffers.points_buffer.take() {
            allocator.free_general_buffer(old_buffer);
        }
        source_buffers.points_buffer = Some(allocator.allocate_general_buffer(
            device,
            needed_points_capacity as u64 * mem::size_of::<Vector2F>() as u64,
            &format!("{} points buffer", tag))?);
        source_buffers.points_capacity = needed_points_capacity;
    }

    if source_buffers.point_indices_capacity < needed_point_indices_capacity {
        if let Some(old_buffer) = source_buffers.point_indices_buffer.take() {
            allocator.free_general_buffer(old_buffer);
        }
        source_buffers.point_indices_buffer = Some(allocator.allocate_general_buffer(
            device,
            needed_point_indices_capacity as u64 * 8,
            &format!("{} point indices buffer", tag))?);
        source_buffers.point_indices_capacity = needed_point_indices_capacity;
    }

    source_buffers.point_indices_count = segments.indices.len() as u32;

    if !segments.points.is_empty() {
        encoder.upload_to_buffer(
            allocator.get_general_buffer(source_buffers.points_buffer.unwrap()),
            0,
            slice_to_bytes(&segments.points));
    }
    if !segments.indices.is_empty() {
        encoder.upload_to_buffer(
            allocator.get_general_buffer(source_buffers.point_indices_buffer.unwrap()),
            0,
            slice_to_bytes(&segments.indices));
    }

    Ok(())
}

/// A 2×2 matrix plus translation in std140 layout: each column of the
/// matrix occupies a vec4 row.
fn transform_to_std140(transform: Transform2F) -> [f32; 12] {
    [
        transform.m11(),
        transform.m21(),
        0.0,
        0.0,
        transform.m12(),
        transform.m22(),
        0.0,
        0.0,
        transform.vector.x,
        transform.vector.y,
        0.0,
        0.0,
    ]
}

fn read_u32(bytes: &[u8], index: usize) -> u32 {
    let offset = index * 4;
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2],
                        bytes[offset + 3]])
}
