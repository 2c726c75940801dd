// tessera/renderer/src/gpu/shaders.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Typed wrappers around the backend pipelines and their vertex layouts.

use crate::gpu_data::{Clip, Fill, TileObjectPrimitive};
use std::mem;
use tessera_gpu::{BlendFactor, BlendState, Device, DeviceError, RenderPipelineDescriptor,
                  VertexFormat, VertexInput, VertexInputRate};

pub const MAX_FILLS_PER_BATCH: usize = 0x10000;

static QUAD_VERTEX_POSITIONS: [u16; 8] = [0, 0, 1, 0, 1, 1, 0, 1];
static QUAD_VERTEX_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

pub(crate) fn quad_vertex_positions_bytes() -> &'static [u8] {
    super::renderer::slice_to_bytes(&QUAD_VERTEX_POSITIONS)
}

pub(crate) fn quad_vertex_indices_bytes() -> &'static [u8] {
    super::renderer::slice_to_bytes(&QUAD_VERTEX_INDICES)
}

/// The raster fill program: accumulates trapezoid coverage into the mask
/// texture with additive blending.
pub struct FillProgram<D> where D: Device {
    pub pipeline: D::RenderPipeline,
}

impl<D> FillProgram<D> where D: Device {
    pub fn new(device: &D) -> Result<FillProgram<D>, DeviceError> {
        let stride = mem::size_of::<Fill>() as u32;
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            vertex_shader_source: include_bytes!("../../shaders/fill.vs.glsl"),
            fragment_shader_source: include_bytes!("../../shaders/fill.fs.glsl"),
            vertex_inputs: &[
                VertexInput {
                    location: 0,
                    buffer_index: 0,
                    format: VertexFormat::U16x2,
                    offset: 0,
                    stride: 4,
                    rate: VertexInputRate::Vertex,
                },
                VertexInput {
                    location: 1,
                    buffer_index: 1,
                    format: VertexFormat::U16x4,
                    offset: 0,
                    stride,
                    rate: VertexInputRate::Instance,
                },
                VertexInput {
                    location: 2,
                    buffer_index: 1,
                    format: VertexFormat::U32x1,
                    offset: 8,
                    stride,
                    rate: VertexInputRate::Instance,
                },
            ],
            blend: Some(BlendState {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::One,
            }),
        }, "fill program")?;
        Ok(FillProgram { pipeline })
    }
}

/// The tile program: composites solid and alpha tiles into the render
/// target.
pub struct TileProgram<D> where D: Device {
    pub pipeline: D::RenderPipeline,
}

impl<D> TileProgram<D> where D: Device {
    pub fn new(device: &D) -> Result<TileProgram<D>, DeviceError> {
        let stride = mem::size_of::<TileObjectPrimitive>() as u32;
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            vertex_shader_source: include_bytes!("../../shaders/tile.vs.glsl"),
            fragment_shader_source: include_bytes!("../../shaders/tile.fs.glsl"),
            vertex_inputs: &[
                VertexInput {
                    location: 0,
                    buffer_index: 0,
                    format: VertexFormat::U16x2,
                    offset: 0,
                    stride: 4,
                    rate: VertexInputRate::Vertex,
                },
                VertexInput {
                    location: 1,
                    buffer_index: 1,
                    format: VertexFormat::I16x2,
                    offset: 0,
                    stride,
                    rate: VertexInputRate::Instance,
                },
                VertexInput {
                    location: 2,
                    buffer_index: 1,
                    format: VertexFormat::U32x1,
                    offset: 4,
                    stride,
                    rate: VertexInputRate::Instance,
                },
                // metadata_id | ctrl << 16 | backdrop << 24, packed.
                VertexInput {
                    location: 3,
                    buffer_index: 1,
                    format: VertexFormat::U32x1,
                    offset: 12,
                    stride,
                    rate: VertexInputRate::Instance,
                },
            ],
            blend: Some(BlendState {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
            }),
        }, "tile program")?;
        Ok(TileProgram { pipeline })
    }
}

/// Mask combine for clipped tiles: intersects a draw mask with a clip
/// mask into a scratch texture.
pub struct ClipCombineProgram<D> where D: Device {
    pub pipeline: D::RenderPipeline,
}

/// Copies combined mask tiles from the scratch texture back into the mask
/// texture.
pub struct ClipCopyProgram<D> where D: Device {
    pub pipeline: D::RenderPipeline,
}

fn clip_vertex_inputs() -> Vec<VertexInput> {
    let stride = mem::size_of::<Clip>() as u32;
    let mut inputs = vec![VertexInput {
        location: 0,
        buffer_index: 0,
        format: VertexFormat::U16x2,
        offset: 0,
        stride: 4,
        rate: VertexInputRate::Vertex,
    }];
    for (location, offset) in (1..5).zip([0u32, 4, 8, 12].iter()) {
        inputs.push(VertexInput {
            location,
            buffer_index: 1,
            format: VertexFormat::U32x1,
            offset: *offset,
            stride,
            rate: VertexInputRate::Instance,
        });
    }
    inputs
}

impl<D> ClipCombineProgram<D> where D: Device {
    pub fn new(device: &D) -> Result<ClipCombineProgram<D>, DeviceError> {
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            vertex_shader_source: include_bytes!("../../shaders/tile_clip_combine.vs.glsl"),
            fragment_shader_source: include_bytes!("../../shaders/tile_clip_combine.fs.glsl"),
            vertex_inputs: &clip_vertex_inputs(),
            blend: None,
        }, "tile clip combine program")?;
        Ok(ClipCombineProgram { pipeline })
    }
}

impl<D> ClipCopyProgram<D> where D: Device {
    pub fn new(device: &D) -> Result<ClipCopyProgram<D>, DeviceError> {
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            vertex_shader_source: include_bytes!("../../shaders/tile_clip_copy.vs.glsl"),
            fragment_shader_source: include_bytes!("../../shaders/tile_clip_copy.fs.glsl"),
            vertex_inputs: &clip_vertex_inputs(),
            blend: None,
        }, "tile clip copy program")?;
        Ok(ClipCopyProgram { pipeline })
    }
}

/// The seven compute pipelines, in dispatch order.
pub struct ComputePrograms<D> where D: Device {
    pub dice: D::ComputePipeline,
    pub bound: D::ComputePipeline,
    pub bin: D::ComputePipeline,
    pub propagate: D::ComputePipeline,
    pub fill: D::ComputePipeline,
    pub sort: D::ComputePipeline,
    pub tile: D::ComputePipeline,
}

impl<D> ComputePrograms<D> where D: Device {
    pub fn new(device: &D) -> Result<ComputePrograms<D>, DeviceError> {
        Ok(ComputePrograms {
            dice: device.create_compute_pipeline(
                include_bytes!("../../shaders/dice.comp.glsl"), "dice pipeline")?,
            bound: device.create_compute_pipeline(
                include_bytes!("../../shaders/bound.comp.glsl"), "bound pipeline")?,
            bin: device.create_compute_pipeline(
                include_bytes!("../../shaders/bin.comp.glsl"), "bin pipeline")?,
            propagate: device.create_compute_pipeline(
                include_bytes!("../../shaders/propagate.comp.glsl"), "propagate pipeline")?,
            fill: device.create_compute_pipeline(
                include_bytes!("../../shaders/fill.comp.glsl"), "fill pipeline")?,
            sort: device.create_compute_pipeline(
                include_bytes!("../../shaders/sort.comp.glsl"), "sort pipeline")?,
            tile: device.create_compute_pipeline(
                include_bytes!("../../shaders/tile.comp.glsl"), "tile pipeline")?,
        })
    }
}
