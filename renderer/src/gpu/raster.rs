// tessera/renderer/src/gpu/raster.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The raster renderer: consumes CPU-built fills and tile batches, and
//! runs the fill, clip-combine, and tile passes.

use crate::gpu::mem::{FramebufferId, GpuMemoryAllocator};
use crate::gpu::renderer::{self, MASK_FRAMEBUFFER_HEIGHT, MASK_FRAMEBUFFER_WIDTH, Renderer,
                           slice_to_bytes};
use crate::gpu::shaders::{ClipCombineProgram, ClipCopyProgram, FillProgram,
                          MAX_FILLS_PER_BATCH, TileProgram, quad_vertex_indices_bytes,
                          quad_vertex_positions_bytes};
use crate::gpu_data::{ALPHA_TILE_ID_LIMIT, Clip, Fill, TileObjectPrimitive};
use crate::options::{RenderError, RendererOptions};
use crate::paint::{PaintInfo, TexturePageContent};
use crate::raster::{DrawTileBatch, RasterSceneBuilder};
use byte_slice_cast::AsByteSlice;
use smallvec::SmallVec;
use std::mem;
use tessera_color::{ColorF, color_slice_to_u8_slice};
use tessera_content::effects::{BlurDirection, PaintFilter, PatternFilter};
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectI;
use tessera_geometry::vector::{Vector2I, vec2i};
use tessera_gpu::{BufferDescriptor, BufferKind, CommandEncoder, DescriptorBinding, Device,
                  LoadAction, MemoryProperty, RenderPassTarget, TextureFilter, TextureFormat};

struct RasterPrograms<D> where D: Device {
    fill: FillProgram<D>,
    tile: TileProgram<D>,
    clip_combine: ClipCombineProgram<D>,
    clip_copy: ClipCopyProgram<D>,
}

/// Renders scenes built by the `RasterSceneBuilder`.
pub struct RasterRenderer<D> where D: Device {
    pub device: D,
    options: RendererOptions,
    allocator: GpuMemoryAllocator<D>,

    programs: Option<RasterPrograms<D>>,

    dest_texture: Option<D::Texture>,
    dest_framebuffer: Option<D::Framebuffer>,

    mask_framebuffer: D::Framebuffer,
    mask_temp_framebuffer: D::Framebuffer,
    area_lut_texture: D::Texture,
    metadata_texture: Option<(D::Texture, Vector2I)>,

    quad_vertex_positions_buffer: D::Buffer,
    quad_vertex_indices_buffer: D::Buffer,
    fill_vertex_buffer: D::Buffer,
    tile_vertex_buffer: Option<(D::Buffer, u64)>,
    clip_vertex_buffer: Option<(D::Buffer, u64)>,

    fill_uniform_buffer: D::Buffer,
    tile_uniform_buffer: D::Buffer,
    filter_uniform_buffer: D::Buffer,
    clip_uniform_buffer: D::Buffer,

    /// Per-page color textures for this frame. Render-target pages alias
    /// their framebuffer's texture.
    paint_textures: Vec<Option<D::Texture>>,
    render_target_framebuffers: SmallVec<[(RenderTargetId, FramebufferId); 4]>,
}

impl<D> RasterRenderer<D> where D: Device {
    pub fn new(device: D, options: RendererOptions) -> Result<RasterRenderer<D>, RenderError> {
        let mask_size = vec2i(MASK_FRAMEBUFFER_WIDTH, MASK_FRAMEBUFFER_HEIGHT);
        let mask_texture = device.create_texture(TextureFormat::Rgba16F,
                                                 mask_size,
                                                 "mask texture")?;
        let mask_framebuffer = device.create_framebuffer(mask_texture);
        let mask_temp_texture = device.create_texture(TextureFormat::Rgba16F,
                                                      mask_size,
                                                      "mask temp texture")?;
        let mask_temp_framebuffer = device.create_framebuffer(mask_temp_texture);

        let area_lut_size = vec2i(renderer::AREA_LUT_LENGTH, renderer::AREA_LUT_LENGTH);
        let area_lut_texture =
            device.create_texture(TextureFormat::Rgba8Unorm, area_lut_size, "area lut")?;

        let quad_vertex_positions_buffer = device.create_buffer(&BufferDescriptor {
            byte_size: quad_vertex_positions_bytes().len() as u64,
            kind: BufferKind::Vertex,
            memory: MemoryProperty::DeviceLocal,
        }, "quad vertex positions")?;
        let quad_vertex_indices_buffer = device.create_buffer(&BufferDescriptor {
            byte_size: quad_vertex_indices_bytes().len() as u64,
            kind: BufferKind::Index,
            memory: MemoryProperty::DeviceLocal,
        }, "quad vertex indices")?;
        let fill_vertex_buffer = device.create_buffer(&BufferDescriptor {
            byte_size: (MAX_FILLS_PER_BATCH * mem::size_of::<Fill>()) as u64,
            kind: BufferKind::Vertex,
            memory: MemoryProperty::HostVisibleCoherent,
        }, "fill vertex buffer")?;

        let fill_uniform_buffer = create_uniform_buffer(&device, 4, "fill uniforms")?;
        let tile_uniform_buffer = create_uniform_buffer(&device, 8, "tile uniforms")?;
        let filter_uniform_buffer = create_uniform_buffer(&device, 12, "filter uniforms")?;
        let clip_uniform_buffer = create_uniform_buffer(&device, 4, "clip uniforms")?;

        // Upload the static data.
        let mut encoder = device.create_command_encoder("init raster renderer");
        encoder.upload_to_buffer(&quad_vertex_positions_buffer,
                                 0,
                                 quad_vertex_positions_bytes());
        encoder.upload_to_buffer(&quad_vertex_indices_buffer,
                                 0,
                                 quad_vertex_indices_bytes());
        let area_lut_texels = renderer::build_area_lut_texels();
        encoder.upload_to_texture(&area_lut_texture,
                                  RectI::new(Vector2I::zero(), area_lut_size),
                                  color_slice_to_u8_slice(&area_lut_texels));
        device.submit_and_wait(encoder)?;

        Ok(RasterRenderer {
            device,
            options,
            allocator: GpuMemoryAllocator::new(),
            programs: None,
            dest_texture: None,
            dest_framebuffer: None,
            mask_framebuffer,
            mask_temp_framebuffer,
            area_lut_texture,
            metadata_texture: None,
            quad_vertex_positions_buffer,
            quad_vertex_indices_buffer,
            fill_vertex_buffer,
            tile_vertex_buffer: None,
            clip_vertex_buffer: None,
            fill_uniform_buffer,
            tile_uniform_buffer,
            filter_uniform_buffer,
            clip_uniform_buffer,
            paint_textures: vec![],
            render_target_framebuffers: SmallVec::new(),
        })
    }

    fn prepare_paint_textures(&mut self, paint_info: &PaintInfo)
                              -> Result<(), RenderError> {
        self.paint_textures.clear();

        // Allocate framebuffers for this frame's render targets first so
        // their pages can alias them.
        self.render_target_framebuffers.clear();
        for metadata in &paint_info.render_target_metadata {
            let framebuffer_id = self.allocator.allocate_framebuffer(
                &self.device,
                metadata.location.rect.size(),
                TextureFormat::Rgba8Unorm,
                "render target")?;
            self.render_target_framebuffers.push((metadata.id, framebuffer_id));
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
                    let framebuffer_id = self.framebuffer_id_for_render_target(id);
                    let framebuffer = self.allocator.get_framebuffer(framebuffer_id);
                    let texture = self.device.framebuffer_texture(framebuffer).clone();
                    self.paint_textures.push(Some(texture));
                }
            }
        }
        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn framebuffer_id_for_render_target(&self, id: RenderTargetId) -> FramebufferId {
        self.render_target_framebuffers
            .iter()
            .find(|&&(existing_id, _)| existing_id == id)
            .map(|&(_, framebuffer_id)| framebuffer_id)
            .expect("render target was never declared")
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

    /// Draws buffered fills into the mask framebuffer, additively.
    fn draw_fills(&mut self, fills: &[Fill], first_batch: bool) -> Result<(), RenderError> {
        let programs = self.programs.as_ref().unwrap();

        let mut encoder = self.device.create_command_encoder("draw fills");
        encoder.upload_to_buffer(&self.fill_vertex_buffer, 0, slice_to_bytes(fills));

        let uniform_data: [f32; 4] = [
            MASK_FRAMEBUFFER_WIDTH as f32,
            MASK_FRAMEBUFFER_HEIGHT as f32,
            crate::tiles::TILE_WIDTH as f32,
            crate::tiles::TILE_HEIGHT as f32,
        ];
        encoder.upload_to_buffer(&self.fill_uniform_buffer,
                                 0,
                                 uniform_data.as_byte_slice());

        let descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::uniform(0, self.fill_uniform_buffer.clone()),
            DescriptorBinding::sampled(1, self.area_lut_texture.clone(),
                                       TextureFilter::Linear),
        ]);

        encoder.begin_render_pass(&RenderPassTarget {
            framebuffer: &self.mask_framebuffer,
            load_action: if first_batch {
                LoadAction::Clear(ColorF::transparent_black())
            } else {
                LoadAction::Load
            },
        });
        encoder.bind_render_pipeline(&programs.fill.pipeline);
        encoder.bind_vertex_buffer(0, &self.quad_vertex_positions_buffer);
        encoder.bind_vertex_buffer(1, &self.fill_vertex_buffer);
        encoder.bind_index_buffer(&self.quad_vertex_indices_buffer);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.set_viewport(RectI::new(Vector2I::zero(),
                                        vec2i(MASK_FRAMEBUFFER_WIDTH,
                                              MASK_FRAMEBUFFER_HEIGHT)));
        encoder.draw_indexed_instanced(6, fills.len() as u32);
        encoder.end_render_pass();

        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    /// Intersects clipped draw masks with their clip masks: combine into
    /// the scratch mask, then copy back.
    fn draw_clip_combines(&mut self, clips: &[Clip]) -> Result<(), RenderError> {
        if clips.is_empty() {
            return Ok(());
        }

        let byte_size = (clips.len() * mem::size_of::<Clip>()) as u64;
        ensure_vertex_buffer_capacity(&self.device,
                                      &mut self.clip_vertex_buffer,
                                      byte_size,
                                      "clip vertex buffer")?;
        let clip_vertex_buffer = &self.clip_vertex_buffer.as_ref().unwrap().0;

        let uniform_data: [f32; 4] = [
            MASK_FRAMEBUFFER_WIDTH as f32,
            MASK_FRAMEBUFFER_HEIGHT as f32,
            0.0,
            0.0,
        ];

        let programs = self.programs.as_ref().unwrap();
        let mut encoder = self.device.create_command_encoder("clip combine");
        encoder.upload_to_buffer(clip_vertex_buffer, 0, slice_to_bytes(clips));
        encoder.upload_to_buffer(&self.clip_uniform_buffer,
                                 0,
                                 uniform_data.as_byte_slice());

        let mask_texture =
            self.device.framebuffer_texture(&self.mask_framebuffer).clone();
        let combine_descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::uniform(0, self.clip_uniform_buffer.clone()),
            DescriptorBinding::sampled(1, mask_texture, TextureFilter::Nearest),
        ]);

        encoder.begin_render_pass(&RenderPassTarget {
            framebuffer: &self.mask_temp_framebuffer,
            load_action: LoadAction::Clear(ColorF::transparent_black()),
        });
        encoder.bind_render_pipeline(&programs.clip_combine.pipeline);
        encoder.bind_vertex_buffer(0, &self.quad_vertex_positions_buffer);
        encoder.bind_vertex_buffer(1, clip_vertex_buffer);
        encoder.bind_index_buffer(&self.quad_vertex_indices_buffer);
        encoder.bind_descriptor_set(&combine_descriptor_set);
        encoder.set_viewport(RectI::new(Vector2I::zero(),
                                        vec2i(MASK_FRAMEBUFFER_WIDTH,
                                              MASK_FRAMEBUFFER_HEIGHT)));
        encoder.draw_indexed_instanced(6, clips.len() as u32);
        encoder.end_render_pass();

        // Copy the combined tiles back into the mask texture.
        let temp_texture =
            self.device.framebuffer_texture(&self.mask_temp_framebuffer).clone();
        let copy_descriptor_set = self.device.create_descriptor_set(vec![
            DescriptorBinding::uniform(0, self.clip_uniform_buffer.clone()),
            DescriptorBinding::sampled(1, temp_texture, TextureFilter::Nearest),
        ]);

        encoder.begin_render_pass(&RenderPassTarget {
            framebuffer: &self.mask_framebuffer,
            load_action: LoadAction::Load,
        });
        encoder.bind_render_pipeline(&programs.clip_copy.pipeline);
        encoder.bind_vertex_buffer(0, &self.quad_vertex_positions_buffer);
        encoder.bind_vertex_buffer(1, clip_vertex_buffer);
        encoder.bind_index_buffer(&self.quad_vertex_indices_buffer);
        encoder.bind_descriptor_set(&copy_descriptor_set);
        encoder.set_viewport(RectI::new(Vector2I::zero(),
                                        vec2i(MASK_FRAMEBUFFER_WIDTH,
                                              MASK_FRAMEBUFFER_HEIGHT)));
        encoder.draw_indexed_instanced(6, clips.len() as u32);
        encoder.end_render_pass();

        self.device.submit_and_wait(encoder)?;
        Ok(())
    }

    fn draw_tile_batch(&mut self,
                       batch: &DrawTileBatch,
                       clear_dest: bool)
                       -> Result<(), RenderError> {
        if batch.tiles.is_empty() {
            return Ok(());
        }

        let byte_size = (batch.tiles.len() * mem::size_of::<TileObjectPrimitive>()) as u64;
        ensure_vertex_buffer_capacity(&self.device,
                                      &mut self.tile_vertex_buffer,
                                      byte_size,
                                      "tile vertex buffer")?;
        let tile_vertex_buffer = &self.tile_vertex_buffer.as_ref().unwrap().0;

        // Resolve the render target.
        let target_framebuffer_id = batch.render_target
                                         .map(|id| self.framebuffer_id_for_render_target(id));
        let (target_size, load_action);
        match target_framebuffer_id {
            Some(framebuffer_id) => {
                let framebuffer = self.allocator.get_framebuffer(framebuffer_id);
                target_size =
                    self.device.texture_size(self.device.framebuffer_texture(framebuffer));
                load_action = LoadAction::Clear(ColorF::transparent_black());
            }
            None => {
                let dest_texture = self.dest_texture.as_ref().unwrap();
                target_size = self.device.texture_size(dest_texture);
                load_action = if clear_dest {
                    let clear_color = self.options
                                          .background_color
                                          .unwrap_or(ColorF::transparent_black());
                    LoadAction::Clear(clear_color)
                } else {
                    LoadAction::Load
                };
            }
        }

        let color_texture = batch.color_texture
                                 .and_then(|batch_texture| {
                                     self.paint_textures[batch_texture.page.0 as usize]
                                         .clone()
                                 });
        let color_texture_size = color_texture
            .as_ref()
            .map(|texture| self.device.texture_size(texture))
            .unwrap_or(Vector2I::zero());
        let color_filter = match batch.color_texture {
            Some(batch_texture)
                    if batch_texture.sampling_flags
                                    .contains(tessera_gpu::TextureSamplingFlags::NEAREST_MAG) => {
                TextureFilter::Nearest
            }
            _ => TextureFilter::Linear,
        };

        let (ref metadata_texture, metadata_size) = *self.metadata_texture.as_ref().unwrap();

        let tile_uniform_data: [f32; 8] = [
            target_size.x as f32,
            target_size.y as f32,
            color_texture_size.x as f32,
            color_texture_size.y as f32,
            metadata_size.x as f32,
            metadata_size.y as f32,
            crate::tiles::TILE_WIDTH as f32,
            crate::tiles::TILE_HEIGHT as f32,
        ];
        let filter_uniform_data = filter_params(&batch.filter);

        let programs = self.programs.as_ref().unwrap();
        let mut encoder = self.device.create_command_encoder("draw tiles");
        encoder.upload_to_buffer(tile_vertex_buffer, 0, slice_to_bytes(&batch.tiles));
        encoder.upload_to_buffer(&self.tile_uniform_buffer,
                                 0,
                                 tile_uniform_data.as_byte_slice());
        encoder.upload_to_buffer(&self.filter_uniform_buffer,
                                 0,
                                 filter_uniform_data.as_byte_slice());

        let mask_texture =
            self.device.framebuffer_texture(&self.mask_framebuffer).clone();
        let mut bindings = vec![
            DescriptorBinding::uniform(0, self.tile_uniform_buffer.clone()),
            DescriptorBinding::uniform(1, self.filter_uniform_buffer.clone()),
            DescriptorBinding::sampled(2, metadata_texture.clone(), TextureFilter::Nearest),
            DescriptorBinding::sampled(3, mask_texture.clone(), TextureFilter::Nearest),
        ];
        // When the batch has no color texture, sample the mask texture as
        // a harmless placeholder; the ctrl byte keeps the shader away from
        // it.
        bindings.push(DescriptorBinding::sampled(
            4,
            color_texture.unwrap_or(mask_texture),
            color_filter));
        let descriptor_set = self.device.create_descriptor_set(bindings);

        {
            let target: &D::Framebuffer = match target_framebuffer_id {
                Some(framebuffer_id) => self.allocator.get_framebuffer(framebuffer_id),
                None => self.dest_framebuffer.as_ref().unwrap(),
            };
            encoder.begin_render_pass(&RenderPassTarget { framebuffer: target, load_action });
        }
        encoder.bind_render_pipeline(&programs.tile.pipeline);
        encoder.bind_vertex_buffer(0, &self.quad_vertex_positions_buffer);
        encoder.bind_vertex_buffer(1, tile_vertex_buffer);
        encoder.bind_index_buffer(&self.quad_vertex_indices_buffer);
        encoder.bind_descriptor_set(&descriptor_set);
        encoder.set_viewport(RectI::new(Vector2I::zero(), target_size));
        encoder.draw_indexed_instanced(6, batch.tiles.len() as u32);
        encoder.end_render_pass();

        self.device.submit_and_wait(encoder)?;
        Ok(())
    }
}

impl<D> Renderer<D> for RasterRenderer<D> where D: Device {
    type SceneBuilder = RasterSceneBuilder;

    fn set_up_pipelines(&mut self) -> Result<(), RenderError> {
        self.programs = Some(RasterPrograms {
            fill: FillProgram::new(&self.device)?,
            tile: TileProgram::new(&self.device)?,
            clip_combine: ClipCombineProgram::new(&self.device)?,
            clip_copy: ClipCopyProgram::new(&self.device)?,
        });
        Ok(())
    }

    fn draw(&mut self, scene_builder: &mut RasterSceneBuilder) -> Result<(), RenderError> {
        if self.programs.is_none() {
            return Err(RenderError::PipelinesNotReady);
        }
        let dest_texture = match self.dest_texture {
            None => return Err(RenderError::NoDestTexture),
            Some(ref texture) => texture.clone(),
        };
        if self.dest_framebuffer.is_none() {
            self.dest_framebuffer = Some(self.device.create_framebuffer(dest_texture));
        }

        if scene_builder.alpha_tile_count >= ALPHA_TILE_ID_LIMIT {
            error!("frame produced more than 2^24 alpha tiles; aborting");
            return Err(RenderError::AlphaTileOverflow);
        }

        let paint_info = match scene_builder.paint_info.take() {
            None => return Ok(()),
            Some(paint_info) => paint_info,
        };

        self.upload_metadata(&paint_info)?;
        self.prepare_paint_textures(&paint_info)?;

        // Fill pass.
        let mut first_fill_batch = true;
        let pending_fills = mem::replace(&mut scene_builder.pending_fills, vec![]);
        for fill_chunk in pending_fills.chunks(MAX_FILLS_PER_BATCH) {
            self.draw_fills(fill_chunk, first_fill_batch)?;
            first_fill_batch = false;
        }
        if first_fill_batch {
            // No fills at all; the mask must still be cleared for the
            // tile pass.
            self.draw_fills(&[], true)?;
        }

        // Clip-combine pass.
        let all_clips: Vec<Clip> = scene_builder
            .tile_batches
            .iter()
            .flat_map(|batch| batch.clips.iter().cloned())
            .collect();
        self.draw_clip_combines(&all_clips)?;

        // Tile passes, in display-list order.
        let tile_batches = mem::replace(&mut scene_builder.tile_batches, vec![]);
        let mut clear_dest = true;
        for batch in &tile_batches {
            let draws_to_dest = batch.render_target.is_none();
            self.draw_tile_batch(batch, clear_dest)?;
            if draws_to_dest {
                clear_dest = false;
            }
        }

        // A frame with no batches still clears the destination.
        if clear_dest {
            let clear_color = self.options
                                  .background_color
                                  .unwrap_or(ColorF::transparent_black());
            let mut encoder = self.device.create_command_encoder("clear dest");
            encoder.begin_render_pass(&RenderPassTarget {
                framebuffer: self.dest_framebuffer.as_ref().unwrap(),
                load_action: LoadAction::Clear(clear_color),
            });
            encoder.end_render_pass();
            self.device.submit_and_wait(encoder)?;
        }

        // Release this frame's render targets and run the purge pass.
        for (_, framebuffer_id) in mem::replace(&mut self.render_target_framebuffers,
                                                SmallVec::new()) {
            self.allocator.free_framebuffer(framebuffer_id);
        }
        self.allocator.purge_if_needed();

        Ok(())
    }

    fn set_dest_texture(&mut self, texture: D::Texture) {
        self.dest_texture = Some(texture);
        self.dest_framebuffer = None;
    }

    fn dest_texture(&self) -> Option<&D::Texture> {
        self.dest_texture.as_ref()
    }
}

fn create_uniform_buffer<D>(device: &D, float_count: u64, tag: &str)
                            -> Result<D::Buffer, RenderError>
                            where D: Device {
    Ok(device.create_buffer(&BufferDescriptor {
        byte_size: float_count * 4,
        kind: BufferKind::Uniform,
        memory: MemoryProperty::HostVisibleCoherent,
    }, tag)?)
}

fn ensure_vertex_buffer_capacity<D>(device: &D,
                                    slot: &mut Option<(D::Buffer, u64)>,
                                    needed_byte_size: u64,
                                    tag: &str)
                                    -> Result<(), RenderError>
                                    where D: Device {
    let needed_byte_size = needed_byte_size.next_power_of_two();
    let needs_realloc = match *slot {
        Some((_, capacity)) => capacity < needed_byte_size,
        None => true,
    };
    if needs_realloc {
        let buffer = device.create_buffer(&BufferDescriptor {
            byte_size: needed_byte_size,
            kind: BufferKind::Vertex,
            memory: MemoryProperty::HostVisibleCoherent,
        }, tag)?;
        *slot = Some((buffer, needed_byte_size));
    }
    Ok(())
}

/// Packs a paint filter into the filter uniform layout shared by the tile
/// shaders.
pub(crate) fn filter_params(filter: &PaintFilter) -> [f32; 12] {
    let mut params = [0.0; 12];
    match *filter {
        PaintFilter::None => {}
        PaintFilter::RadialGradient { line, radii, uv_origin } => {
            params[0] = 1.0;
            params[4] = line.from_x();
            params[5] = line.from_y();
            params[6] = line.to_x();
            params[7] = line.to_y();
            params[8] = radii.x;
            params[9] = radii.y;
            params[10] = uv_origin.x;
            params[11] = uv_origin.y;
        }
        PaintFilter::PatternFilter(PatternFilter::Blur { direction, sigma }) => {
            params[0] = 2.0;
            params[1] = sigma;
            params[4] = match direction {
                BlurDirection::X => 1.0,
                BlurDirection::Y => 0.0,
            };
            params[5] = match direction {
                BlurDirection::X => 0.0,
                BlurDirection::Y => 1.0,
            };
        }
        PaintFilter::PatternFilter(PatternFilter::Text { fg_color, bg_color }) => {
            params[0] = 3.0;
            params[4] = fg_color.r;
            params[5] = fg_color.g;
            params[6] = fg_color.b;
            params[7] = fg_color.a;
            params[8] = bg_color.r;
            params[9] = bg_color.g;
            params[10] = bg_color.b;
            params[11] = bg_color.a;
        }
    }
    params
}
