// tessera/renderer/src/paint.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! How a path is to be filled: the paint model and the palette that
//! deduplicates paints and assigns them texture space.

use crate::allocator::{AllocationMode, TextureAllocator};
use crate::gpu_data::{TextureLocation, TextureMetadataEntry, TexturePageId};
use fxhash::FxHashMap;
use hashbrown::HashMap;
use tessera_color::ColorU;
use tessera_content::effects::PaintFilter;
use tessera_content::gradient::{Gradient, GradientGeometry, GradientWrap};
use tessera_content::pattern::{Pattern, PatternSource};
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectI;
use tessera_geometry::transform2d::{Matrix2x2F, Transform2F};
use tessera_geometry::vector::{Vector2F, Vector2I, vec2f, vec2i};
use tessera_gpu::TextureSamplingFlags;

/// The number of texels in a gradient color ramp.
pub const GRADIENT_TILE_LENGTH: u32 = 256;

/// The paint ID, a small index into the palette.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct PaintId(pub u16);

/// How an overlay is to be composited over the base color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PaintCompositeOp {
    /// The source that overlaps the destination, replaces the destination.
    SrcIn,
    /// Destination which overlaps the source, replaces the source.
    DestIn,
}

/// Defines how a shape is to be filled: a base color, optionally under an
/// overlay (gradient or pattern).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Paint {
    base_color: ColorU,
    overlay: Option<PaintOverlay>,
}

/// What is to be overlaid on top of a base color.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PaintOverlay {
    composite_op: PaintCompositeOp,
    contents: PaintContents,
}

/// The contents of an overlay: either a gradient or a pattern.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PaintContents {
    Gradient(Gradient),
    Pattern(Pattern),
}

impl Paint {
    /// Creates a simple paint from a single base color.
    #[inline]
    pub fn from_color(color: ColorU) -> Paint {
        Paint { base_color: color, overlay: None }
    }

    /// Creates a paint from a gradient.
    #[inline]
    pub fn from_gradient(gradient: Gradient) -> Paint {
        Paint {
            base_color: ColorU::white(),
            overlay: Some(PaintOverlay {
                composite_op: PaintCompositeOp::SrcIn,
                contents: PaintContents::Gradient(gradient),
            }),
        }
    }

    /// Creates a paint from a raster pattern.
    #[inline]
    pub fn from_pattern(pattern: Pattern) -> Paint {
        Paint {
            base_color: ColorU::white(),
            overlay: Some(PaintOverlay {
                composite_op: PaintCompositeOp::SrcIn,
                contents: PaintContents::Pattern(pattern),
            }),
        }
    }

    #[inline]
    pub fn black() -> Paint {
        Paint::from_color(ColorU::black())
    }

    #[inline]
    pub fn transparent_black() -> Paint {
        Paint::from_color(ColorU::transparent_black())
    }

    /// Returns true if this paint is obviously opaque, via a quick check.
    pub fn is_opaque(&self) -> bool {
        if !self.base_color.is_opaque() {
            return false;
        }
        match self.overlay {
            None => true,
            Some(ref overlay) => {
                match overlay.contents {
                    PaintContents::Gradient(ref gradient) => gradient.is_opaque(),
                    PaintContents::Pattern(ref pattern) => pattern.is_opaque(),
                }
            }
        }
    }

    /// Returns true if this paint draws nothing at all.
    pub fn is_fully_transparent(&self) -> bool {
        if !self.base_color.is_fully_transparent() {
            return false;
        }
        match self.overlay {
            None => true,
            Some(ref overlay) => {
                match overlay.contents {
                    PaintContents::Gradient(ref gradient) => gradient.is_fully_transparent(),
                    PaintContents::Pattern(_) => false,
                }
            }
        }
    }

    #[inline]
    pub fn is_color(&self) -> bool {
        self.overlay.is_none()
    }

    #[inline]
    pub fn base_color(&self) -> ColorU {
        self.base_color
    }

    #[inline]
    pub fn set_base_color(&mut self, new_base_color: ColorU) {
        self.base_color = new_base_color;
    }

    #[inline]
    pub fn overlay(&self) -> &Option<PaintOverlay> {
        &self.overlay
    }

    #[inline]
    pub fn overlay_mut(&mut self) -> &mut Option<PaintOverlay> {
        &mut self.overlay
    }

    /// Folds an opacity factor into the paint.
    pub fn apply_opacity(&mut self, alpha: f32) {
        if alpha == 1.0 {
            return;
        }
        self.base_color.a = (self.base_color.a as f32 * alpha).round() as u8;
    }

    /// Applies an affine transform to this paint's geometry.
    pub fn apply_transform(&mut self, transform: &Transform2F) {
        if transform.is_identity() {
            return;
        }

        match self.overlay {
            None => {}
            Some(ref mut overlay) => {
                match overlay.contents {
                    PaintContents::Gradient(ref mut gradient) => {
                        gradient.apply_transform(*transform)
                    }
                    PaintContents::Pattern(ref mut pattern) => {
                        pattern.apply_transform(*transform)
                    }
                }
            }
        }
    }
}

impl PaintOverlay {
    #[inline]
    pub fn contents(&self) -> &PaintContents {
        &self.contents
    }

    #[inline]
    pub fn composite_op(&self) -> PaintCompositeOp {
        self.composite_op
    }

    #[inline]
    pub fn set_composite_op(&mut self, composite_op: PaintCompositeOp) {
        self.composite_op = composite_op;
    }
}

/// A set of paints, deduplicated by value, plus the scene's render
/// targets.
#[derive(Clone)]
pub struct Palette {
    pub(crate) paints: Vec<Paint>,
    cache: HashMap<Paint, PaintId>,
    render_targets: Vec<RenderTargetDesc>,
    scene_id: u32,
}

/// Describes an offscreen render target to be allocated by the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTargetDesc {
    pub size: Vector2I,
}

impl Palette {
    #[inline]
    pub fn new(scene_id: u32) -> Palette {
        Palette {
            paints: vec![],
            cache: HashMap::new(),
            render_targets: vec![],
            scene_id,
        }
    }

    /// Adds a paint, sharing the id of an identical existing paint.
    pub fn push_paint(&mut self, paint: &Paint) -> PaintId {
        if let Some(paint_id) = self.cache.get(paint) {
            return *paint_id;
        }

        debug_assert!(self.paints.len() <= u16::max_value() as usize);
        let paint_id = PaintId(self.paints.len() as u16);
        self.cache.insert((*paint).clone(), paint_id);
        self.paints.push((*paint).clone());
        paint_id
    }

    #[inline]
    pub fn get_paint(&self, paint_id: PaintId) -> &Paint {
        &self.paints[paint_id.0 as usize]
    }

    pub fn push_render_target(&mut self, desc: RenderTargetDesc) -> RenderTargetId {
        let id = RenderTargetId {
            scene: self.scene_id,
            render_target: self.render_targets.len() as u32,
        };
        self.render_targets.push(desc);
        id
    }

    #[inline]
    pub fn render_targets(&self) -> &[RenderTargetDesc] {
        &self.render_targets
    }

    #[inline]
    pub fn scene_id(&self) -> u32 {
        self.scene_id
    }

    /// Merges another palette into this one, returning the paint and
    /// render-target id remappings.
    pub fn append_palette(&mut self, other: &Palette) -> MergedPaletteInfo {
        // Merge render targets first so paints can be remapped onto them.
        let mut render_target_mapping = Vec::with_capacity(other.render_targets.len());
        for &desc in &other.render_targets {
            render_target_mapping.push(self.push_render_target(desc));
        }

        let mut paint_mapping = Vec::with_capacity(other.paints.len());
        for paint in &other.paints {
            let mut new_paint = (*paint).clone();
            if let Some(ref mut overlay) = new_paint.overlay {
                if let PaintContents::Pattern(ref mut pattern) = overlay.contents {
                    if let PatternSource::RenderTarget { id, size } = *pattern.source() {
                        if id.scene == other.scene_id {
                            let new_id = render_target_mapping[id.render_target as usize];
                            *pattern = reparent_render_target_pattern(pattern, new_id, size);
                        }
                    }
                }
            }
            paint_mapping.push(self.push_paint(&new_paint));
        }

        MergedPaletteInfo { paint_mapping, render_target_mapping }
    }

    /// Assigns every paint a texture location and computes its metadata.
    pub fn build_paint_info(&self, render_transform: Transform2F) -> PaintInfo {
        let mut allocator = TextureAllocator::new();

        // Render targets get their own pages up front.
        let mut render_target_metadata = Vec::with_capacity(self.render_targets.len());
        for (index, desc) in self.render_targets.iter().enumerate() {
            let location = allocator.allocate(desc.size, AllocationMode::OwnPage);
            render_target_metadata.push(RenderTargetMetadata {
                id: RenderTargetId {
                    scene: self.scene_id,
                    render_target: index as u32,
                },
                location,
            });
        }

        // Assign locations.
        let mut gradient_tile_builder = GradientTileBuilder::new();
        let mut image_locations: FxHashMap<u64, TextureLocation> = FxHashMap::default();
        let mut pending_images: Vec<(TextureLocation, Vector2I, Vec<ColorU>)> = vec![];
        let mut paint_metadata = Vec::with_capacity(self.paints.len());

        for paint in &self.paints {
            let overlay = match paint.overlay {
                None => {
                    paint_metadata.push(PaintMetadata {
                        color_texture_metadata: None,
                        base_color: paint.base_color,
                        is_opaque: paint.is_opaque(),
                    });
                    continue;
                }
                Some(ref overlay) => overlay,
            };

            let color_texture_metadata = match overlay.contents {
                PaintContents::Gradient(ref gradient) => {
                    let location = gradient_tile_builder.allocate(&mut allocator, gradient);
                    let mut sampling_flags = TextureSamplingFlags::empty();
                    if gradient.wrap == GradientWrap::Repeat {
                        sampling_flags.insert(TextureSamplingFlags::REPEAT_U);
                    }
                    PaintColorTextureMetadata {
                        location,
                        page_scale: Vector2F::zero(),
                        transform: Transform2F::default(),
                        sampling_flags,
                        filter: gradient_filter(gradient, render_transform),
                        composite_op: overlay.composite_op,
                    }
                }
                PaintContents::Pattern(ref pattern) => {
                    let location = match *pattern.source() {
                        PatternSource::RenderTarget { id, .. } => {
                            render_target_metadata[id.render_target as usize].location
                        }
                        PatternSource::Image(ref image) => {
                            let mut image_hasher = fxhash::FxHasher::default();
                            use std::hash::{Hash, Hasher};
                            image.hash(&mut image_hasher);
                            let image_hash = image_hasher.finish();
                            match image_locations.get(&image_hash) {
                                Some(&location) => location,
                                None => {
                                    let location = allocator.allocate(image.size(),
                                                                      AllocationMode::Atlas);
                                    image_locations.insert(image_hash, location);
                                    pending_images.push((location,
                                                         image.size(),
                                                         (**image.pixels()).clone()));
                                    location
                                }
                            }
                        }
                    };

                    let mut sampling_flags = TextureSamplingFlags::empty();
                    if pattern.repeat_x() {
                        sampling_flags.insert(TextureSamplingFlags::REPEAT_U);
                    }
                    if pattern.repeat_y() {
                        sampling_flags.insert(TextureSamplingFlags::REPEAT_V);
                    }
                    if !pattern.smoothing_enabled() {
                        sampling_flags.insert(TextureSamplingFlags::NEAREST_MIN |
                                              TextureSamplingFlags::NEAREST_MAG);
                    }

                    PaintColorTextureMetadata {
                        location,
                        page_scale: Vector2F::zero(),
                        transform: Transform2F::default(),
                        sampling_flags,
                        filter: match pattern.filter() {
                            None => PaintFilter::None,
                            Some(pattern_filter) => PaintFilter::PatternFilter(pattern_filter),
                        },
                        composite_op: overlay.composite_op,
                    }
                }
            };

            paint_metadata.push(PaintMetadata {
                color_texture_metadata: Some(color_texture_metadata),
                base_color: paint.base_color,
                is_opaque: paint.is_opaque(),
            });
        }

        // Compute texture transforms now that page sizes are known.
        for (paint, metadata) in self.paints.iter().zip(paint_metadata.iter_mut()) {
            let texture_metadata = match metadata.color_texture_metadata {
                None => continue,
                Some(ref mut texture_metadata) => texture_metadata,
            };
            let page_scale = allocator.page_scale(texture_metadata.location.page);
            texture_metadata.page_scale = page_scale;

            let overlay = paint.overlay.as_ref().unwrap();
            texture_metadata.transform = match overlay.contents {
                PaintContents::Gradient(ref gradient) => {
                    gradient_uv_transform(gradient,
                                          render_transform,
                                          texture_metadata.location,
                                          page_scale)
                }
                PaintContents::Pattern(ref pattern) => {
                    pattern_uv_transform(pattern,
                                         render_transform,
                                         texture_metadata.location,
                                         page_scale)
                }
            };

            if let PaintFilter::RadialGradient { ref mut uv_origin, .. } =
                    texture_metadata.filter {
                let rect = texture_metadata.location.rect;
                *uv_origin = (rect.origin().to_f32() + vec2f(0.0, 0.5)).scale_xy(page_scale);
            }
        }

        // Paint the texels.
        let mut texture_pages: Vec<Option<TexturePageData>> = vec![];
        for page_id in allocator.page_ids() {
            while texture_pages.len() <= page_id.0 as usize {
                texture_pages.push(None);
            }
            let size = allocator.page_size(page_id);
            let is_render_target = render_target_metadata
                .iter()
                .any(|metadata| metadata.location.page == page_id);
            let content = if is_render_target {
                let id = render_target_metadata
                    .iter()
                    .find(|metadata| metadata.location.page == page_id)
                    .unwrap()
                    .id;
                TexturePageContent::RenderTarget(id)
            } else {
                TexturePageContent::Texels(vec![ColorU::default();
                                                size.x as usize * size.y as usize])
            };
            texture_pages[page_id.0 as usize] = Some(TexturePageData { size, content });
        }

        gradient_tile_builder.render(&mut texture_pages);

        for (location, image_size, pixels) in pending_images {
            let page_data = texture_pages[location.page.0 as usize].as_mut().unwrap();
            let page_size = page_data.size;
            if let TexturePageContent::Texels(ref mut texels) = page_data.content {
                blit_image(texels, page_size, &pixels, image_size, location.rect);
            }
        }

        let metadata_entries = paint_metadata
            .iter()
            .map(|metadata| {
                TextureMetadataEntry {
                    color_transform: metadata.color_texture_metadata
                                             .as_ref()
                                             .map(|texture_metadata| texture_metadata.transform)
                                             .unwrap_or_default(),
                    base_color: metadata.base_color,
                }
            })
            .collect();

        PaintInfo {
            paint_metadata,
            metadata_entries,
            texture_pages,
            render_target_metadata,
        }
    }
}

fn reparent_render_target_pattern(pattern: &Pattern, new_id: RenderTargetId, size: Vector2I)
                                  -> Pattern {
    let mut new_pattern = Pattern::from_render_target(new_id, size);
    new_pattern.apply_transform(pattern.transform());
    new_pattern.set_filter(pattern.filter());
    new_pattern.set_repeat_x(pattern.repeat_x());
    new_pattern.set_repeat_y(pattern.repeat_y());
    new_pattern.set_smoothing_enabled(pattern.smoothing_enabled());
    new_pattern
}

/// Maps scene coordinates to the gradient color ramp's texel row.
fn gradient_uv_transform(gradient: &Gradient,
                         render_transform: Transform2F,
                         location: TextureLocation,
                         page_scale: Vector2F)
                         -> Transform2F {
    let ramp_scale = (GRADIENT_TILE_LENGTH - 1) as f32;
    let rect = location.rect;
    let v = (rect.min_y() as f32 + 0.5) * page_scale.y;
    let u0 = (rect.min_x() as f32 + 0.5) * page_scale.x;
    let su = ramp_scale * page_scale.x;

    match gradient.geometry {
        GradientGeometry::Linear(line) => {
            let line = render_transform * line;
            let direction = line.vector();
            let square_length = direction.square_length().max(::std::f32::EPSILON);
            let dt = direction.scale(1.0 / square_length);
            let t0 = -line.from().dot(direction) / square_length;
            Transform2F {
                matrix: Matrix2x2F::row_major(dt.x * su, dt.y * su, 0.0, 0.0),
                vector: vec2f(t0 * su + u0, v),
            }
        }
        GradientGeometry::Radial { .. } => {
            // The radial filter computes t itself; the transform only has
            // to land in the ramp row.
            Transform2F {
                matrix: Matrix2x2F::row_major(0.0, 0.0, 0.0, 0.0),
                vector: vec2f(u0, v),
            }
        }
    }
}

/// Maps scene coordinates to a pattern's texels.
fn pattern_uv_transform(pattern: &Pattern,
                        render_transform: Transform2F,
                        location: TextureLocation,
                        page_scale: Vector2F)
                        -> Transform2F {
    let pattern_to_scene = render_transform * pattern.transform();
    Transform2F::from_scale(page_scale) *
        Transform2F::from_translation(location.rect.origin().to_f32()) *
        pattern_to_scene.inverse()
}

fn gradient_filter(gradient: &Gradient, render_transform: Transform2F) -> PaintFilter {
    match gradient.geometry {
        GradientGeometry::Linear(_) => PaintFilter::None,
        GradientGeometry::Radial { line, radii, transform } => {
            PaintFilter::RadialGradient {
                line: render_transform * transform * line,
                radii,
                uv_origin: Vector2F::zero(),
            }
        }
    }
}

fn blit_image(dest: &mut [ColorU],
              dest_size: Vector2I,
              src: &[ColorU],
              src_size: Vector2I,
              dest_rect: RectI) {
    for y in 0..src_size.y {
        let dest_start = (dest_rect.min_y() + y) as usize * dest_size.x as usize +
            dest_rect.min_x() as usize;
        let src_start = y as usize * src_size.x as usize;
        dest[dest_start..dest_start + src_size.x as usize]
            .copy_from_slice(&src[src_start..src_start + src_size.x as usize]);
    }
}

/// Everything the renderer needs to know about the palette this frame.
pub struct PaintInfo {
    /// Per-paint metadata, indexed by paint id.
    pub paint_metadata: Vec<PaintMetadata>,
    /// The packed metadata-texture entries, indexed by paint id.
    pub metadata_entries: Vec<TextureMetadataEntry>,
    /// Texel data (or render-target references) for each texture page.
    pub texture_pages: Vec<Option<TexturePageData>>,
    /// Locations of the scene's render targets.
    pub render_target_metadata: Vec<RenderTargetMetadata>,
}

pub struct TexturePageData {
    pub size: Vector2I,
    pub content: TexturePageContent,
}

pub enum TexturePageContent {
    /// CPU texels to upload.
    Texels(Vec<ColorU>),
    /// The page aliases a render target's framebuffer.
    RenderTarget(RenderTargetId),
}

#[derive(Clone, Copy, Debug)]
pub struct RenderTargetMetadata {
    pub id: RenderTargetId,
    pub location: TextureLocation,
}

/// Metadata computed for each paint.
#[derive(Clone, Debug)]
pub struct PaintMetadata {
    /// Metadata associated with the color texture, if the paint has an
    /// overlay.
    pub color_texture_metadata: Option<PaintColorTextureMetadata>,
    /// The base color that the overlay gets mixed into.
    pub base_color: ColorU,
    /// True if this paint is fully opaque.
    pub is_opaque: bool,
}

/// Metadata related to the color texture.
#[derive(Clone, Debug)]
pub struct PaintColorTextureMetadata {
    /// The location of the paint.
    pub location: TextureLocation,
    /// The scale for the page this paint is on.
    pub page_scale: Vector2F,
    /// The transform to apply to screen coordinates to translate them into
    /// UVs.
    pub transform: Transform2F,
    /// The sampling mode for the texture.
    pub sampling_flags: TextureSamplingFlags,
    /// The filter to be applied to this paint.
    pub filter: PaintFilter,
    /// How the color texture is to be composited over the base color.
    pub composite_op: PaintCompositeOp,
}

impl PaintMetadata {
    /// The batch texture key, if the paint samples a color texture.
    pub fn tile_batch_texture(&self) -> Option<crate::gpu_data::TileBatchTexture> {
        self.color_texture_metadata.as_ref().map(|texture_metadata| {
            crate::gpu_data::TileBatchTexture {
                page: texture_metadata.location.page,
                sampling_flags: texture_metadata.sampling_flags,
                composite_op: texture_metadata.composite_op,
            }
        })
    }

    /// The blur filter to apply when compositing, if any.
    pub fn filter(&self) -> PaintFilter {
        match self.color_texture_metadata {
            None => PaintFilter::None,
            Some(ref texture_metadata) => texture_metadata.filter,
        }
    }
}

// Gradient ramps are packed as rows of shared 256×256 tiles.

struct GradientTileBuilder {
    tiles: Vec<GradientTile>,
}

struct GradientTile {
    page: TexturePageId,
    origin: Vector2I,
    next_row: u32,
    gradients: Vec<(Gradient, u32)>,
}

impl GradientTileBuilder {
    fn new() -> GradientTileBuilder {
        GradientTileBuilder { tiles: vec![] }
    }

    fn allocate(&mut self, allocator: &mut TextureAllocator, gradient: &Gradient)
                -> TextureLocation {
        let need_new_tile = match self.tiles.last() {
            None => true,
            Some(tile) => tile.next_row == GRADIENT_TILE_LENGTH,
        };
        if need_new_tile {
            let size = Vector2I::splat(GRADIENT_TILE_LENGTH as i32);
            let location = allocator.allocate(size, AllocationMode::Atlas);
            self.tiles.push(GradientTile {
                page: location.page,
                origin: location.rect.origin(),
                next_row: 0,
                gradients: vec![],
            });
        }

        let tile = self.tiles.last_mut().unwrap();
        let row = tile.next_row;
        tile.next_row += 1;
        tile.gradients.push(((*gradient).clone(), row));

        TextureLocation {
            page: tile.page,
            rect: RectI::new(tile.origin + vec2i(0, row as i32),
                             vec2i(GRADIENT_TILE_LENGTH as i32, 1)),
        }
    }

    fn render(self, texture_pages: &mut Vec<Option<TexturePageData>>) {
        for tile in self.tiles {
            let page_data = texture_pages[tile.page.0 as usize].as_mut().unwrap();
            let page_size = page_data.size;
            let texels = match page_data.content {
                TexturePageContent::Texels(ref mut texels) => texels,
                TexturePageContent::RenderTarget(_) => unreachable!(),
            };

            for (gradient, row) in tile.gradients {
                let y = tile.origin.y + row as i32;
                let row_start = y as usize * page_size.x as usize + tile.origin.x as usize;
                for x in 0..(GRADIENT_TILE_LENGTH as usize) {
                    let t = x as f32 / (GRADIENT_TILE_LENGTH - 1) as f32;
                    texels[row_start + x] = gradient.sample(t);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Paint, Palette, RenderTargetDesc, TexturePageContent};
    use tessera_color::ColorU;
    use tessera_content::gradient::Gradient;
    use tessera_geometry::transform2d::Transform2F;
    use tessera_geometry::vector::{vec2f, vec2i};

    #[test]
    fn test_paint_dedup() {
        let mut palette = Palette::new(0);
        let red = Paint::from_color(ColorU::new(255, 0, 0, 255));
        let id0 = palette.push_paint(&red);
        let id1 = palette.push_paint(&red);
        assert_eq!(id0, id1);

        let blue = Paint::from_color(ColorU::new(0, 0, 255, 255));
        let id2 = palette.push_paint(&blue);
        assert_ne!(id0, id2);
    }

    #[test]
    fn test_solid_color_has_no_texture() {
        let mut palette = Palette::new(0);
        let paint_id = palette.push_paint(&Paint::from_color(ColorU::black()));
        let info = palette.build_paint_info(Transform2F::default());
        let metadata = &info.paint_metadata[paint_id.0 as usize];
        assert!(metadata.color_texture_metadata.is_none());
        assert_eq!(metadata.base_color, ColorU::black());
        assert!(metadata.is_opaque);
    }

    #[test]
    fn test_gradient_ramp_rendered_into_page() {
        let mut gradient = Gradient::linear_from_points(vec2f(0.0, 0.0), vec2f(100.0, 0.0));
        gradient.add_color_stop(ColorU::new(255, 0, 0, 255), 0.0);
        gradient.add_color_stop(ColorU::new(0, 0, 255, 255), 1.0);

        let mut palette = Palette::new(0);
        let paint_id = palette.push_paint(&Paint::from_gradient(gradient));
        let info = palette.build_paint_info(Transform2F::default());

        let metadata = &info.paint_metadata[paint_id.0 as usize];
        let texture_metadata = metadata.color_texture_metadata.as_ref().unwrap();
        let location = texture_metadata.location;

        let page_data = info.texture_pages[location.page.0 as usize].as_ref().unwrap();
        let texels = match page_data.content {
            TexturePageContent::Texels(ref texels) => texels,
            _ => panic!("expected texels"),
        };
        let row_start = location.rect.min_y() as usize * page_data.size.x as usize +
            location.rect.min_x() as usize;
        assert_eq!(texels[row_start], ColorU::new(255, 0, 0, 255));
        assert_eq!(texels[row_start + 255], ColorU::new(0, 0, 255, 255));
    }

    #[test]
    fn test_render_target_gets_own_page() {
        let mut palette = Palette::new(7);
        let id = palette.push_render_target(RenderTargetDesc { size: vec2i(100, 50) });
        assert_eq!(id.scene, 7);
        let info = palette.build_paint_info(Transform2F::default());
        assert_eq!(info.render_target_metadata.len(), 1);
        let location = info.render_target_metadata[0].location;
        let page = info.texture_pages[location.page.0 as usize].as_ref().unwrap();
        match page.content {
            TexturePageContent::RenderTarget(render_target_id) => {
                assert_eq!(render_target_id, id)
            }
            _ => panic!("expected render target page"),
        }
    }

    #[test]
    fn test_append_palette_remaps_ids() {
        let mut dest = Palette::new(0);
        dest.push_paint(&Paint::from_color(ColorU::black()));

        let mut src = Palette::new(1);
        let src_white = src.push_paint(&Paint::from_color(ColorU::white()));
        let src_black = src.push_paint(&Paint::from_color(ColorU::black()));

        let info = dest.append_palette(&src);
        assert_eq!(info.paint_mapping.len(), 2);
        // Black dedups onto the existing entry.
        assert_eq!(info.paint_mapping[src_black.0 as usize].0, 0);
        assert_ne!(info.paint_mapping[src_white.0 as usize].0, 0);
    }
}

/// The result of merging two palettes.
pub struct MergedPaletteInfo {
    pub paint_mapping: Vec<PaintId>,
    pub render_target_mapping: Vec<RenderTargetId>,
}
