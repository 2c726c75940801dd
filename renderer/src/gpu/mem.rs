// tessera/renderer/src/gpu/mem.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! GPU memory management: a sized, tagged, time-decayed pool of transient
//! buffers, textures, and framebuffers.

use fxhash::FxHashMap;
use instant::Instant;
use tessera_geometry::vector::Vector2I;
use tessera_gpu::{BufferDescriptor, BufferKind, Device, DeviceError, MemoryProperty,
                  TextureFormat};

/// Everything above this size is allocated exactly; everything below is
/// rounded up to a power of two.
const MAX_BUFFER_SIZE_CLASS: u64 = 16 * 1024 * 1024;

/// Number of seconds before unused memory is purged.
const DECAY_TIME: f32 = 0.250;

/// Number of seconds before an object can be reused, to avoid stalls on
/// work still in flight.
const REUSE_TIME: f32 = 0.015;

/// An opaque id for an allocator-owned buffer.
pub type GeneralBufferId = u64;
/// An opaque id for an allocator-owned index buffer.
pub type IndexBufferId = u64;
/// An opaque id for an allocator-owned texture.
pub type TextureId = u64;
/// An opaque id for an allocator-owned framebuffer.
pub type FramebufferId = u64;

struct BufferAllocation<D> where D: Device {
    buffer: D::Buffer,
    size: u64,
    tag: String,
}

struct TextureAllocation<D> where D: Device {
    texture: D::Texture,
    descriptor: TextureDescriptor,
    tag: String,
}

struct FramebufferAllocation<D> where D: Device {
    framebuffer: D::Framebuffer,
    descriptor: TextureDescriptor,
    tag: String,
}

#[derive(Clone, Copy, PartialEq, Debug)]
struct TextureDescriptor {
    size: Vector2I,
    format: TextureFormat,
}

struct FreeObject<D> where D: Device {
    when: Instant,
    kind: FreeObjectKind<D>,
}

enum FreeObjectKind<D> where D: Device {
    GeneralBuffer { id: GeneralBufferId, allocation: BufferAllocation<D> },
    IndexBuffer { id: IndexBufferId, allocation: BufferAllocation<D> },
    Texture { id: TextureId, allocation: TextureAllocation<D> },
    Framebuffer { id: FramebufferId, allocation: FramebufferAllocation<D> },
}

/// The per-renderer GPU memory allocator. Not thread-safe across
/// renderers.
pub struct GpuMemoryAllocator<D> where D: Device {
    general_buffers_in_use: FxHashMap<GeneralBufferId, BufferAllocation<D>>,
    index_buffers_in_use: FxHashMap<IndexBufferId, BufferAllocation<D>>,
    textures_in_use: FxHashMap<TextureId, TextureAllocation<D>>,
    framebuffers_in_use: FxHashMap<FramebufferId, FramebufferAllocation<D>>,

    free_objects: Vec<FreeObject<D>>,

    next_general_buffer_id: GeneralBufferId,
    next_index_buffer_id: IndexBufferId,
    next_texture_id: TextureId,
    next_framebuffer_id: FramebufferId,

    bytes_committed: u64,
    bytes_allocated: u64,
}

impl<D> GpuMemoryAllocator<D> where D: Device {
    pub fn new() -> GpuMemoryAllocator<D> {
        GpuMemoryAllocator {
            general_buffers_in_use: FxHashMap::default(),
            index_buffers_in_use: FxHashMap::default(),
            textures_in_use: FxHashMap::default(),
            framebuffers_in_use: FxHashMap::default(),
            free_objects: vec![],
            next_general_buffer_id: 0,
            next_index_buffer_id: 0,
            next_texture_id: 0,
            next_framebuffer_id: 0,
            bytes_committed: 0,
            bytes_allocated: 0,
        }
    }

    pub fn allocate_general_buffer(&mut self,
                                   device: &D,
                                   mut byte_size: u64,
                                   tag: &str)
                                   -> Result<GeneralBufferId, DeviceError> {
        if byte_size < MAX_BUFFER_SIZE_CLASS {
            byte_size = byte_size.next_power_of_two();
        }

        let now = Instant::now();
        for free_object_index in 0..self.free_objects.len() {
            let matches = match self.free_objects[free_object_index] {
                FreeObject {
                    ref when,
                    kind: FreeObjectKind::GeneralBuffer { ref allocation, .. },
                } => {
                    allocation.size == byte_size &&
                        now.duration_since(*when).as_secs_f32() >= REUSE_TIME
                }
                _ => false,
            };
            if !matches {
                continue;
            }

            let free_object = self.free_objects.remove(free_object_index);
            let (id, mut allocation) = match free_object.kind {
                FreeObjectKind::GeneralBuffer { id, allocation } => (id, allocation),
                _ => unreachable!(),
            };
            allocation.tag = tag.to_owned();
            self.bytes_committed += allocation.size;
            self.general_buffers_in_use.insert(id, allocation);
            return Ok(id);
        }

        let buffer = device.create_buffer(&BufferDescriptor {
            byte_size,
            kind: BufferKind::General,
            memory: MemoryProperty::HostVisibleCoherent,
        }, tag)?;

        let id = self.next_general_buffer_id;
        self.next_general_buffer_id += 1;

        debug!("allocating general buffer {} ({}B): {}", id, byte_size, tag);
        self.general_buffers_in_use.insert(id, BufferAllocation {
            buffer,
            size: byte_size,
            tag: tag.to_owned(),
        });
        self.bytes_allocated += byte_size;
        self.bytes_committed += byte_size;

        Ok(id)
    }

    pub fn get_general_buffer(&self, id: GeneralBufferId) -> &D::Buffer {
        &self.general_buffers_in_use[&id].buffer
    }

    pub fn free_general_buffer(&mut self, id: GeneralBufferId) {
        let allocation = self.general_buffers_in_use
                             .remove(&id)
                             .expect("no such general buffer");
        self.bytes_committed -= allocation.size;
        self.free_objects.push(FreeObject {
            when: Instant::now(),
            kind: FreeObjectKind::GeneralBuffer { id, allocation },
        });
    }

    pub fn allocate_index_buffer(&mut self,
                                 device: &D,
                                 mut byte_size: u64,
                                 tag: &str)
                                 -> Result<IndexBufferId, DeviceError> {
        if byte_size < MAX_BUFFER_SIZE_CLASS {
            byte_size = byte_size.next_power_of_two();
        }

        let now = Instant::now();
        for free_object_index in 0..self.free_objects.len() {
            let matches = match self.free_objects[free_object_index] {
                FreeObject {
                    ref when,
                    kind: FreeObjectKind::IndexBuffer { ref allocation, .. },
                } => {
                    allocation.size == byte_size &&
                        now.duration_since(*when).as_secs_f32() >= REUSE_TIME
                }
                _ => false,
            };
            if !matches {
                continue;
            }

            let free_object = self.free_objects.remove(free_object_index);
            let (id, mut allocation) = match free_object.kind {
                FreeObjectKind::IndexBuffer { id, allocation } => (id, allocation),
                _ => unreachable!(),
            };
            allocation.tag = tag.to_owned();
            self.bytes_committed += allocation.size;
            self.index_buffers_in_use.insert(id, allocation);
            return Ok(id);
        }

        let buffer = device.create_buffer(&BufferDescriptor {
            byte_size,
            kind: BufferKind::Index,
            memory: MemoryProperty::HostVisibleCoherent,
        }, tag)?;

        let id = self.next_index_buffer_id;
        self.next_index_buffer_id += 1;

        self.index_buffers_in_use.insert(id, BufferAllocation {
            buffer,
            size: byte_size,
            tag: tag.to_owned(),
        });
        self.bytes_allocated += byte_size;
        self.bytes_committed += byte_size;

        Ok(id)
    }

    pub fn get_index_buffer(&self, id: IndexBufferId) -> &D::Buffer {
        &self.index_buffers_in_use[&id].buffer
    }

    pub fn free_index_buffer(&mut self, id: IndexBufferId) {
        let allocation = self.index_buffers_in_use
                             .remove(&id)
                             .expect("no such index buffer");
        self.bytes_committed -= allocation.size;
        self.free_objects.push(FreeObject {
            when: Instant::now(),
            kind: FreeObjectKind::IndexBuffer { id, allocation },
        });
    }

    pub fn allocate_texture(&mut self,
                            device: &D,
                            size: Vector2I,
                            format: TextureFormat,
                            tag: &str)
                            -> Result<TextureId, DeviceError> {
        let descriptor = TextureDescriptor { size, format };

        let now = Instant::now();
        for free_object_index in 0..self.free_objects.len() {
            let matches = match self.free_objects[free_object_index] {
                FreeObject {
                    ref when,
                    kind: FreeObjectKind::Texture { ref allocation, .. },
                } => {
                    allocation.descriptor == descriptor &&
                        now.duration_since(*when).as_secs_f32() >= REUSE_TIME
                }
                _ => false,
            };
            if !matches {
                continue;
            }

            let free_object = self.free_objects.remove(free_object_index);
            let (id, mut allocation) = match free_object.kind {
                FreeObjectKind::Texture { id, allocation } => (id, allocation),
                _ => unreachable!(),
            };
            allocation.tag = tag.to_owned();
            self.bytes_committed += texture_byte_size(&descriptor);
            self.textures_in_use.insert(id, allocation);
            return Ok(id);
        }

        let texture = device.create_texture(format, size, tag)?;
        let id = self.next_texture_id;
        self.next_texture_id += 1;

        self.textures_in_use.insert(id, TextureAllocation {
            texture,
            descriptor,
            tag: tag.to_owned(),
        });
        self.bytes_allocated += texture_byte_size(&descriptor);
        self.bytes_committed += texture_byte_size(&descriptor);

        Ok(id)
    }

    pub fn get_texture(&self, id: TextureId) -> &D::Texture {
        &self.textures_in_use[&id].texture
    }

    pub fn free_texture(&mut self, id: TextureId) {
        let allocation = self.textures_in_use.remove(&id).expect("no such texture");
        self.bytes_committed -= texture_byte_size(&allocation.descriptor);
        self.free_objects.push(FreeObject {
            when: Instant::now(),
            kind: FreeObjectKind::Texture { id, allocation },
        });
    }

    pub fn allocate_framebuffer(&mut self,
                                device: &D,
                                size: Vector2I,
                                format: TextureFormat,
                                tag: &str)
                                -> Result<FramebufferId, DeviceError> {
        let descriptor = TextureDescriptor { size, format };

        let now = Instant::now();
        for free_object_index in 0..self.free_objects.len() {
            let matches = match self.free_objects[free_object_index] {
                FreeObject {
                    ref when,
                    kind: FreeObjectKind::Framebuffer { ref allocation, .. },
                } => {
                    allocation.descriptor == descriptor &&
                        now.duration_since(*when).as_secs_f32() >= REUSE_TIME
                }
                _ => false,
            };
            if !matches {
                continue;
            }

            let free_object = self.free_objects.remove(free_object_index);
            let (id, mut allocation) = match free_object.kind {
                FreeObjectKind::Framebuffer { id, allocation } => (id, allocation),
                _ => unreachable!(),
            };
            allocation.tag = tag.to_owned();
            self.bytes_committed += texture_byte_size(&descriptor);
            self.framebuffers_in_use.insert(id, allocation);
            return Ok(id);
        }

        let texture = device.create_texture(format, size, tag)?;
        let framebuffer = device.create_framebuffer(texture);
        let id = self.next_framebuffer_id;
        self.next_framebuffer_id += 1;

        self.framebuffers_in_use.insert(id, FramebufferAllocation {
            framebuffer,
            descriptor,
            tag: tag.to_owned(),
        });
        self.bytes_allocated += texture_byte_size(&descriptor);
        self.bytes_committed += texture_byte_size(&descriptor);

        Ok(id)
    }

    pub fn get_framebuffer(&self, id: FramebufferId) -> &D::Framebuffer {
        &self.framebuffers_in_use[&id].framebuffer
    }

    pub fn free_framebuffer(&mut self, id: FramebufferId) {
        let allocation = self.framebuffers_in_use
                             .remove(&id)
                             .expect("no such framebuffer");
        self.bytes_committed -= texture_byte_size(&allocation.descriptor);
        self.free_objects.push(FreeObject {
            when: Instant::now(),
            kind: FreeObjectKind::Framebuffer { id, allocation },
        });
    }

    /// Evicts free objects that have gone unused for the decay time.
    pub fn purge_if_needed(&mut self) {
        let now = Instant::now();
        loop {
            match self.free_objects.first() {
                Some(FreeObject { when, .. })
                        if now.duration_since(*when).as_secs_f32() >= DECAY_TIME => {}
                _ => break,
            }
            match self.free_objects.remove(0).kind {
                FreeObjectKind::GeneralBuffer { allocation, .. } |
                FreeObjectKind::IndexBuffer { allocation, .. } => {
                    debug!("purging buffer: {}", allocation.tag);
                    self.bytes_allocated -= allocation.size;
                }
                FreeObjectKind::Texture { allocation, .. } => {
                    debug!("purging texture: {}", allocation.tag);
                    self.bytes_allocated -= texture_byte_size(&allocation.descriptor);
                }
                FreeObjectKind::Framebuffer { allocation, .. } => {
                    debug!("purging framebuffer: {}", allocation.tag);
                    self.bytes_allocated -= texture_byte_size(&allocation.descriptor);
                }
            }
        }
    }

    #[inline]
    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }

    #[inline]
    pub fn bytes_committed(&self) -> u64 {
        self.bytes_committed
    }
}

fn texture_byte_size(descriptor: &TextureDescriptor) -> u64 {
    descriptor.size.area() as u64 * descriptor.format.bytes_per_pixel() as u64
}
