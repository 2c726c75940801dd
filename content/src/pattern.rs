// tessera/content/src/pattern.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Raster image patterns.

use crate::effects::PatternFilter;
use crate::render_target::RenderTargetId;
use crate::util;
use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tessera_color::ColorU;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::Vector2I;

/// A raster image pattern.
#[derive(Clone, PartialEq, Debug)]
pub struct Pattern {
    source: PatternSource,
    transform: Transform2F,
    filter: Option<PatternFilter>,
    flags: PatternFlags,
}

/// Where a pattern's pixels come from.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PatternSource {
    /// A image whose pixels are stored in CPU memory.
    Image(Image),
    /// Previously-rendered vector content.
    ///
    /// This value allows the output of rendering to be used as an input,
    /// with no round trip to the CPU.
    RenderTarget {
        /// The ID of the render target, including the ID of the scene it
        /// came from.
        id: RenderTargetId,
        /// The device pixel size of the render target.
        size: Vector2I,
    },
}

/// A raster image, in 32-bit RGBA (8 bits per channel), premultiplied.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    size: Vector2I,
    pixels: Arc<Vec<ColorU>>,
    pixels_hash: u64,
    is_opaque: bool,
}

bitflags! {
    /// Various flags that determine behavior of a pattern.
    pub struct PatternFlags: u8 {
        /// If set, the pattern repeats in the X direction.
        const REPEAT_X = 0x01;
        /// If set, the pattern repeats in the Y direction.
        const REPEAT_Y = 0x02;
        /// If set, nearest-neighbor interpolation is used when compositing
        /// this pattern instead of bilinear interpolation.
        const NO_SMOOTHING = 0x04;
    }
}

impl Pattern {
    #[inline]
    fn from_source(source: PatternSource) -> Pattern {
        Pattern {
            source,
            transform: Transform2F::default(),
            filter: None,
            flags: PatternFlags::empty(),
        }
    }

    /// Creates a new pattern from the given image.
    #[inline]
    pub fn from_image(image: Image) -> Pattern {
        Pattern::from_source(PatternSource::Image(image))
    }

    /// Creates a new pattern from the given render target with the given
    /// size.
    #[inline]
    pub fn from_render_target(id: RenderTargetId, size: Vector2I) -> Pattern {
        Pattern::from_source(PatternSource::RenderTarget { id, size })
    }

    #[inline]
    pub fn source(&self) -> &PatternSource {
        &self.source
    }

    /// The affine transform applied to the pattern.
    #[inline]
    pub fn transform(&self) -> Transform2F {
        self.transform
    }

    /// Applies the given transform on top of the current one.
    #[inline]
    pub fn apply_transform(&mut self, transform: Transform2F) {
        self.transform = transform * self.transform;
    }

    /// The size of the buffer the pattern samples from.
    #[inline]
    pub fn size(&self) -> Vector2I {
        match self.source {
            PatternSource::Image(ref image) => image.size(),
            PatternSource::RenderTarget { size, .. } => size,
        }
    }

    #[inline]
    pub fn filter(&self) -> Option<PatternFilter> {
        self.filter
    }

    #[inline]
    pub fn set_filter(&mut self, filter: Option<PatternFilter>) {
        self.filter = filter;
    }

    #[inline]
    pub fn repeat_x(&self) -> bool {
        self.flags.contains(PatternFlags::REPEAT_X)
    }

    #[inline]
    pub fn set_repeat_x(&mut self, repeat_x: bool) {
        self.flags.set(PatternFlags::REPEAT_X, repeat_x);
    }

    #[inline]
    pub fn repeat_y(&self) -> bool {
        self.flags.contains(PatternFlags::REPEAT_Y)
    }

    #[inline]
    pub fn set_repeat_y(&mut self, repeat_y: bool) {
        self.flags.set(PatternFlags::REPEAT_Y, repeat_y);
    }

    #[inline]
    pub fn smoothing_enabled(&self) -> bool {
        !self.flags.contains(PatternFlags::NO_SMOOTHING)
    }

    #[inline]
    pub fn set_smoothing_enabled(&mut self, enable: bool) {
        self.flags.set(PatternFlags::NO_SMOOTHING, !enable);
    }

    /// True if this pattern obviously does not need a mask to composite.
    #[inline]
    pub fn is_opaque(&self) -> bool {
        match self.source {
            PatternSource::Image(ref image) => image.is_opaque(),
            PatternSource::RenderTarget { .. } => false,
        }
    }
}

impl Image {
    /// Creates an image with the given device pixel size and pixel store,
    /// as premultiplied RGBA8.
    pub fn new(size: Vector2I, pixels: Arc<Vec<ColorU>>) -> Image {
        assert_eq!(size.x as usize * size.y as usize, pixels.len());
        let is_opaque = pixels.iter().all(|pixel| pixel.is_opaque());

        let mut pixels_hasher = DefaultHasher::new();
        pixels.hash(&mut pixels_hasher);
        let pixels_hash = pixels_hasher.finish();

        Image { size, pixels, pixels_hash, is_opaque }
    }

    #[inline]
    pub fn size(&self) -> Vector2I {
        self.size
    }

    #[inline]
    pub fn pixels(&self) -> &Arc<Vec<ColorU>> {
        &self.pixels
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        self.is_opaque
    }
}

impl Debug for Image {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "Image({}x{})", self.size.x, self.size.y)
    }
}

impl Hash for Image {
    fn hash<H>(&self, state: &mut H) where H: Hasher {
        self.size.hash(state);
        self.pixels_hash.hash(state);
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H>(&self, state: &mut H) where H: Hasher {
        self.source.hash(state);
        util::hash_transform_2f(self.transform, state);
        self.filter.hash(state);
        self.flags.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, Pattern};
    use std::sync::Arc;
    use tessera_color::ColorU;
    use tessera_geometry::vector::vec2i;

    #[test]
    fn test_image_opacity_detection() {
        let opaque = Image::new(vec2i(1, 2),
                                Arc::new(vec![ColorU::black(), ColorU::white()]));
        assert!(opaque.is_opaque());

        let translucent = Image::new(vec2i(1, 1), Arc::new(vec![ColorU::new(0, 0, 0, 4)]));
        assert!(!translucent.is_opaque());
    }

    #[test]
    fn test_identical_images_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = Image::new(vec2i(1, 1), Arc::new(vec![ColorU::black()]));
        let b = Image::new(vec2i(1, 1), Arc::new(vec![ColorU::black()]));

        let (mut hasher_a, mut hasher_b) = (DefaultHasher::new(), DefaultHasher::new());
        a.hash(&mut hasher_a);
        b.hash(&mut hasher_b);
        assert_eq!(hasher_a.finish(), hasher_b.finish());
        assert_eq!(a, b);
    }

    #[test]
    fn test_pattern_repeat_flags() {
        let image = Image::new(vec2i(1, 1), Arc::new(vec![ColorU::black()]));
        let mut pattern = Pattern::from_image(image);
        assert!(!pattern.repeat_x());
        pattern.set_repeat_x(true);
        assert!(pattern.repeat_x());
        assert!(pattern.smoothing_enabled());
    }
}
