// tessera/gpu/src/lib.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The GPU capability surface the renderer draws through.
//!
//! Concrete backends (GL, Vulkan, Metal, WebGPU) implement `Device` and
//! `CommandEncoder`; the renderer is generic over them and records all of
//! its work through this interface.

#[macro_use]
extern crate bitflags;

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use tessera_color::ColorF;
use tessera_geometry::rect::RectI;
use tessera_geometry::vector::Vector2I;

/// A connection to a GPU.
///
/// Resource handles are cheaply clonable so that they can be recorded into
/// descriptor sets by value.
pub trait Device: Sized {
    type Buffer: Clone;
    type Texture: Clone;
    type Framebuffer;
    type RenderPipeline;
    type ComputePipeline;
    type DescriptorSet;
    type CommandEncoder: CommandEncoder<Self>;
    type SwapChain;

    fn create_buffer(&self, descriptor: &BufferDescriptor, tag: &str)
                     -> Result<Self::Buffer, DeviceError>;
    fn create_texture(&self, format: TextureFormat, size: Vector2I, tag: &str)
                      -> Result<Self::Texture, DeviceError>;
    fn create_framebuffer(&self, texture: Self::Texture) -> Self::Framebuffer;

    fn create_render_pipeline(&self, descriptor: &RenderPipelineDescriptor, tag: &str)
                              -> Result<Self::RenderPipeline, DeviceError>;
    fn create_compute_pipeline(&self, source: &[u8], tag: &str)
                               -> Result<Self::ComputePipeline, DeviceError>;

    fn create_descriptor_set(&self, bindings: Vec<DescriptorBinding<Self>>)
                             -> Self::DescriptorSet;
    fn update_descriptor_set(&self,
                             descriptor_set: &mut Self::DescriptorSet,
                             bindings: Vec<DescriptorBinding<Self>>);

    fn framebuffer_texture<'f>(&self, framebuffer: &'f Self::Framebuffer)
                               -> &'f Self::Texture;
    fn texture_size(&self, texture: &Self::Texture) -> Vector2I;
    fn texture_format(&self, texture: &Self::Texture) -> TextureFormat;
    fn set_texture_sampling_flags(&self, texture: &Self::Texture,
                                  flags: TextureSamplingFlags);

    /// Reads back a byte range of a buffer. Valid only after all writes to
    /// the buffer have been submitted and waited on.
    fn read_buffer(&self, buffer: &Self::Buffer, offset: u64, output: &mut [u8]);

    fn create_command_encoder(&self, tag: &str) -> Self::CommandEncoder;

    /// Submits the encoder and blocks until the GPU has finished with it.
    fn submit_and_wait(&self, encoder: Self::CommandEncoder) -> Result<(), DeviceError>;

    /// Submits the encoder asynchronously and schedules presentation into
    /// the swap chain.
    fn present(&self, encoder: Self::CommandEncoder, swap_chain: &Self::SwapChain)
               -> Result<(), DeviceError>;
}

/// Records GPU commands for later submission.
pub trait CommandEncoder<D> where D: Device {
    fn begin_render_pass(&mut self, target: &RenderPassTarget<D>);
    fn bind_render_pipeline(&mut self, pipeline: &D::RenderPipeline);
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: &D::Buffer);
    fn bind_index_buffer(&mut self, buffer: &D::Buffer);
    fn bind_descriptor_set(&mut self, descriptor_set: &D::DescriptorSet);
    fn set_viewport(&mut self, viewport: RectI);
    fn draw(&mut self, vertex_count: u32, first_vertex: u32);
    fn draw_indexed(&mut self, index_count: u32, first_index: u32);
    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32);
    fn end_render_pass(&mut self);

    fn begin_compute_pass(&mut self);
    fn bind_compute_pipeline(&mut self, pipeline: &D::ComputePipeline);
    fn dispatch(&mut self, size_x: u32, size_y: u32, size_z: u32);
    fn end_compute_pass(&mut self);

    fn upload_to_buffer(&mut self, buffer: &D::Buffer, offset: u64, data: &[u8]);
    fn upload_to_texture(&mut self, texture: &D::Texture, rect: RectI, data: &[u8]);
    fn transition_texture(&mut self, texture: &D::Texture, layout: TextureLayout);
}

/// Describes a buffer to be created.
#[derive(Clone, Copy, Debug)]
pub struct BufferDescriptor {
    pub byte_size: u64,
    pub kind: BufferKind,
    pub memory: MemoryProperty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
    /// A general storage buffer, readable and writable from shaders.
    General,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MemoryProperty {
    HostVisibleCoherent,
    DeviceLocal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    Rgba16F,
}

impl TextureFormat {
    /// Bytes per texel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba8Unorm |
            TextureFormat::Bgra8Unorm |
            TextureFormat::Rgba8Srgb |
            TextureFormat::Bgra8Srgb => 4,
            TextureFormat::Rgba16F => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureLayout {
    Undefined,
    ShaderReadOnly,
    General,
    ColorAttachment,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

bitflags! {
    /// How a texture is sampled.
    pub struct TextureSamplingFlags: u8 {
        const REPEAT_U    = 0x01;
        const REPEAT_V    = 0x02;
        const NEAREST_MIN = 0x04;
        const NEAREST_MAG = 0x08;
    }
}

/// Describes a render pipeline to be compiled.
pub struct RenderPipelineDescriptor<'a> {
    pub vertex_shader_source: &'a [u8],
    pub fragment_shader_source: &'a [u8],
    pub vertex_inputs: &'a [VertexInput],
    pub blend: Option<BlendState>,
}

/// One vertex attribute.
#[derive(Clone, Copy, Debug)]
pub struct VertexInput {
    pub location: u32,
    /// Which bound vertex buffer the attribute reads from.
    pub buffer_index: u32,
    pub format: VertexFormat,
    pub offset: u32,
    pub stride: u32,
    pub rate: VertexInputRate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VertexFormat {
    F32x2,
    I16x2,
    I16x4,
    U16x2,
    U16x4,
    I8x2,
    U32x1,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VertexInputRate {
    Vertex,
    Instance,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendState {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendFactor {
    One,
    OneMinusSrcAlpha,
}

/// A render pass target plus its load action.
pub struct RenderPassTarget<'a, D> where D: Device {
    pub framebuffer: &'a D::Framebuffer,
    pub load_action: LoadAction,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadAction {
    Clear(ColorF),
    Load,
}

/// One descriptor-set binding.
pub struct DescriptorBinding<D> where D: Device {
    pub binding: u32,
    pub resource: DescriptorResource<D>,
}

pub enum DescriptorResource<D> where D: Device {
    UniformBuffer(D::Buffer),
    /// `read_write` is a hint only; backends may ignore it.
    StorageBuffer { buffer: D::Buffer, read_write: bool },
    SampledTexture(D::Texture, TextureFilter),
    StorageImage(D::Texture),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureFilter {
    Linear,
    Nearest,
}

impl<D> DescriptorBinding<D> where D: Device {
    #[inline]
    pub fn uniform(binding: u32, buffer: D::Buffer) -> DescriptorBinding<D> {
        DescriptorBinding { binding, resource: DescriptorResource::UniformBuffer(buffer) }
    }

    #[inline]
    pub fn storage(binding: u32, buffer: D::Buffer, read_write: bool)
                   -> DescriptorBinding<D> {
        DescriptorBinding {
            binding,
            resource: DescriptorResource::StorageBuffer { buffer, read_write },
        }
    }

    #[inline]
    pub fn sampled(binding: u32, texture: D::Texture, filter: TextureFilter)
                   -> DescriptorBinding<D> {
        DescriptorBinding {
            binding,
            resource: DescriptorResource::SampledTexture(texture, filter),
        }
    }

    #[inline]
    pub fn image(binding: u32, texture: D::Texture) -> DescriptorBinding<D> {
        DescriptorBinding { binding, resource: DescriptorResource::StorageImage(texture) }
    }
}

/// Converts a slice of f32 values to raw IEEE half-precision bytes, for
/// RGBA16F texture uploads.
pub fn f32_slice_to_f16_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 2);
    for &value in values {
        bytes.extend_from_slice(&half::f16::from_f32(value).to_bits().to_le_bytes());
    }
    bytes
}

/// Errors surfaced by GPU backends.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceError {
    /// The device was lost or became unusable.
    DeviceLost,
    /// The requested texture format is unsupported.
    UnsupportedFormat(TextureFormat),
    /// The device ran out of memory.
    OutOfMemory,
    /// Shader compilation or pipeline creation failed.
    PipelineCreation(String),
}

impl Display for DeviceError {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match *self {
            DeviceError::DeviceLost => write!(formatter, "GPU device lost"),
            DeviceError::UnsupportedFormat(format) => {
                write!(formatter, "unsupported texture format {:?}", format)
            }
            DeviceError::OutOfMemory => write!(formatter, "GPU out of memory"),
            DeviceError::PipelineCreation(ref message) => {
                write!(formatter, "pipeline creation failed: {}", message)
            }
        }
    }
}

impl Error for DeviceError {}
