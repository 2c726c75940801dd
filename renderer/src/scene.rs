// tessera/renderer/src/scene.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The vector scene to be rendered: an ordered display list of draw paths,
//! clip paths, and render-target brackets.

use crate::paint::{Paint, PaintId, Palette, RenderTargetDesc};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use tessera_content::effects::BlendMode;
use tessera_content::fill::FillRule;
use tessera_content::outline::Outline;
use tessera_content::render_target::RenderTargetId;
use tessera_geometry::rect::RectF;
use tessera_geometry::transform2d::Transform2F;

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(0);

/// Identifies a draw path within a scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DrawPathId(pub u32);

/// Identifies a clip path within a scene.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ClipPathId(pub u32);

/// A filled path in the scene.
#[derive(Clone, Debug)]
pub struct DrawPath {
    outline: Outline,
    paint: PaintId,
    clip_path: Option<ClipPathId>,
    fill_rule: FillRule,
    blend_mode: BlendMode,
}

/// A clip path in the scene. Clips may nest via `clip_path`.
#[derive(Clone, Debug)]
pub struct ClipPath {
    outline: Outline,
    clip_path: Option<ClipPathId>,
    fill_rule: FillRule,
}

/// One entry of the display list.
#[derive(Clone, Debug)]
pub enum DisplayItem {
    /// Draws paths to the render target on top of the stack.
    DrawPaths(Range<u32>),
    /// Pushes a render target onto the stack.
    PushRenderTarget(RenderTargetId),
    /// Pops a render target from the stack.
    PopRenderTarget,
}

/// A wraparound-proof scene revision counter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SceneEpoch {
    pub hi: u64,
    pub lo: u64,
}

impl SceneEpoch {
    #[inline]
    fn new(hi: u64, lo: u64) -> SceneEpoch {
        SceneEpoch { hi, lo }
    }

    #[inline]
    fn successor(self) -> SceneEpoch {
        match self.lo.checked_add(1) {
            Some(lo) => SceneEpoch { hi: self.hi, lo },
            None => SceneEpoch { hi: self.hi + 1, lo: 0 },
        }
    }

    #[inline]
    fn next(&mut self) {
        *self = self.successor();
    }
}

/// The scene: everything to be rendered in a frame.
pub struct Scene {
    id: u32,
    draw_paths: Vec<DrawPath>,
    clip_paths: Vec<ClipPath>,
    palette: Palette,
    display_list: Vec<DisplayItem>,
    bounds: RectF,
    view_box: RectF,
    epoch: SceneEpoch,
}

impl Scene {
    pub fn new() -> Scene {
        let id = NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed);
        Scene {
            id,
            draw_paths: vec![],
            clip_paths: vec![],
            palette: Palette::new(id),
            display_list: vec![],
            bounds: RectF::default(),
            view_box: RectF::default(),
            epoch: SceneEpoch::new(0, 1),
        }
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn epoch(&self) -> SceneEpoch {
        self.epoch
    }

    #[inline]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[inline]
    pub fn draw_paths(&self) -> &[DrawPath] {
        &self.draw_paths
    }

    #[inline]
    pub fn clip_paths(&self) -> &[ClipPath] {
        &self.clip_paths
    }

    #[inline]
    pub fn display_list(&self) -> &[DisplayItem] {
        &self.display_list
    }

    #[inline]
    pub fn get_draw_path(&self, draw_path_id: DrawPathId) -> &DrawPath {
        &self.draw_paths[draw_path_id.0 as usize]
    }

    #[inline]
    pub fn get_clip_path(&self, clip_path_id: ClipPathId) -> &ClipPath {
        &self.clip_paths[clip_path_id.0 as usize]
    }

    #[inline]
    pub fn get_paint(&self, paint_id: PaintId) -> &Paint {
        self.palette.get_paint(paint_id)
    }

    /// Adds a paint to the scene's palette, deduplicating by value.
    pub fn push_paint(&mut self, paint: &Paint) -> PaintId {
        let paint_id = self.palette.push_paint(paint);
        self.epoch.next();
        paint_id
    }

    /// Adds a draw path and appends it to the display list.
    pub fn push_draw_path(&mut self, draw_path: DrawPath) -> DrawPathId {
        if !draw_path.outline.bounds().is_finite() {
            warn!("dropping draw path with non-finite bounds");
            return DrawPathId(self.draw_paths.len().saturating_sub(1) as u32);
        }

        // A referenced clip path must already have been pushed.
        debug_assert!(draw_path.clip_path
                               .map_or(true,
                                       |clip_path_id| {
                                           (clip_path_id.0 as usize) < self.clip_paths.len()
                                       }));

        let draw_path_id = DrawPathId(self.draw_paths.len() as u32);
        self.bounds = self.bounds.union_rect(draw_path.outline.bounds());
        self.draw_paths.push(draw_path);
        self.push_draw_path_to_display_list(draw_path_id);
        draw_path_id
    }

    fn push_draw_path_to_display_list(&mut self, draw_path_id: DrawPathId) {
        let end = draw_path_id.0 + 1;

        // Coalesce with the previous item when possible.
        match self.display_list.last_mut() {
            Some(DisplayItem::DrawPaths(ref mut range)) if range.end == draw_path_id.0 => {
                range.end = end
            }
            _ => self.display_list.push(DisplayItem::DrawPaths(draw_path_id.0..end)),
        }

        self.epoch.next();
    }

    /// Adds a clip path.
    pub fn push_clip_path(&mut self, clip_path: ClipPath) -> ClipPathId {
        self.bounds = self.bounds.union_rect(clip_path.outline.bounds());
        let clip_path_id = ClipPathId(self.clip_paths.len() as u32);
        self.clip_paths.push(clip_path);
        self.epoch.next();
        clip_path_id
    }

    /// Allocates a render target and pushes it onto the render-target
    /// stack.
    pub fn push_render_target(&mut self, desc: RenderTargetDesc) -> RenderTargetId {
        let render_target_id = self.palette.push_render_target(desc);
        self.display_list.push(DisplayItem::PushRenderTarget(render_target_id));
        self.epoch.next();
        render_target_id
    }

    /// Pops the current render target from the stack.
    pub fn pop_render_target(&mut self) {
        self.display_list.push(DisplayItem::PopRenderTarget);
        self.epoch.next();
    }

    /// Appends another scene to this one, remapping its paint, clip, and
    /// render-target ids.
    pub fn append_scene(&mut self, scene: Scene, transform: Transform2F) {
        if scene.draw_paths.is_empty() {
            return;
        }

        let merged_palette_info = self.palette.append_palette(&scene.palette);

        // Merge clip paths.
        let mut clip_path_mapping = Vec::with_capacity(scene.clip_paths.len());
        for clip_path in &scene.clip_paths {
            let mut new_clip_path = (*clip_path).clone();
            new_clip_path.outline.transform(&transform);
            new_clip_path.clip_path = new_clip_path
                .clip_path
                .map(|old_id| clip_path_mapping[old_id.0 as usize]);
            clip_path_mapping.push(ClipPathId(self.clip_paths.len() as u32));
            self.clip_paths.push(new_clip_path);
        }

        // Merge draw paths.
        let mut draw_path_mapping = Vec::with_capacity(scene.draw_paths.len());
        for draw_path in &scene.draw_paths {
            let mut new_draw_path = (*draw_path).clone();
            new_draw_path.outline.transform(&transform);
            new_draw_path.paint =
                merged_palette_info.paint_mapping[draw_path.paint.0 as usize];
            new_draw_path.clip_path = new_draw_path
                .clip_path
                .map(|old_id| clip_path_mapping[old_id.0 as usize]);
            draw_path_mapping.push(DrawPathId(self.draw_paths.len() as u32));
            self.bounds = self.bounds.union_rect(new_draw_path.outline.bounds());
            self.draw_paths.push(new_draw_path);
        }

        // Merge display items.
        for display_item in &scene.display_list {
            match *display_item {
                DisplayItem::PushRenderTarget(old_render_target_id) => {
                    let new_render_target_id = merged_palette_info.render_target_mapping
                        [old_render_target_id.render_target as usize];
                    self.display_list
                        .push(DisplayItem::PushRenderTarget(new_render_target_id));
                }
                DisplayItem::PopRenderTarget => {
                    self.display_list.push(DisplayItem::PopRenderTarget)
                }
                DisplayItem::DrawPaths(ref range) => {
                    for old_path_index in range.clone() {
                        let new_draw_path_id = draw_path_mapping[old_path_index as usize];
                        self.push_draw_path_to_display_list(new_draw_path_id);
                    }
                }
            }
        }

        self.epoch.next();
    }

    #[inline]
    pub fn bounds(&self) -> RectF {
        self.bounds
    }

    #[inline]
    pub fn view_box(&self) -> RectF {
        self.view_box
    }

    pub fn set_view_box(&mut self, new_view_box: RectF) {
        if new_view_box == self.view_box {
            return;
        }
        self.view_box = new_view_box;
        self.epoch.next();
    }

    /// Builds the scene with the given builder and renders the result in
    /// one step.
    pub fn build_and_render<D, R>(&mut self,
                                  renderer: &mut R,
                                  scene_builder: &mut R::SceneBuilder)
                                  -> Result<(), crate::options::RenderError>
                                  where D: tessera_gpu::Device,
                                        R: crate::gpu::renderer::Renderer<D> {
        use crate::gpu::renderer::SceneBuilder;
        scene_builder.build(self);
        renderer.draw(scene_builder)
    }

    /// Checks the display-list bracket balance. Returns false if a pop has
    /// no matching push.
    pub fn render_target_brackets_are_balanced(&self) -> bool {
        let mut nesting = 0i32;
        for display_item in &self.display_list {
            match *display_item {
                DisplayItem::PushRenderTarget(_) => nesting += 1,
                DisplayItem::PopRenderTarget => {
                    nesting -= 1;
                    if nesting < 0 {
                        return false;
                    }
                }
                DisplayItem::DrawPaths(_) => {}
            }
        }
        nesting == 0
    }
}

impl DrawPath {
    #[inline]
    pub fn new(outline: Outline, paint: PaintId) -> DrawPath {
        DrawPath {
            outline,
            paint,
            clip_path: None,
            fill_rule: FillRule::Winding,
            blend_mode: BlendMode::SrcOver,
        }
    }

    #[inline]
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    #[inline]
    pub fn paint(&self) -> PaintId {
        self.paint
    }

    #[inline]
    pub fn clip_path(&self) -> Option<ClipPathId> {
        self.clip_path
    }

    #[inline]
    pub fn set_clip_path(&mut self, new_clip_path: Option<ClipPathId>) {
        self.clip_path = new_clip_path
    }

    #[inline]
    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    #[inline]
    pub fn set_fill_rule(&mut self, new_fill_rule: FillRule) {
        self.fill_rule = new_fill_rule
    }

    #[inline]
    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    #[inline]
    pub fn set_blend_mode(&mut self, new_blend_mode: BlendMode) {
        self.blend_mode = new_blend_mode
    }
}

impl ClipPath {
    #[inline]
    pub fn new(outline: Outline) -> ClipPath {
        ClipPath { outline, clip_path: None, fill_rule: FillRule::Winding }
    }

    #[inline]
    pub fn outline(&self) -> &Outline {
        &self.outline
    }

    #[inline]
    pub fn clip_path(&self) -> Option<ClipPathId> {
        self.clip_path
    }

    #[inline]
    pub fn set_clip_path(&mut self, new_clip_path: Option<ClipPathId>) {
        self.clip_path = new_clip_path
    }

    #[inline]
    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    #[inline]
    pub fn set_fill_rule(&mut self, new_fill_rule: FillRule) {
        self.fill_rule = new_fill_rule
    }
}

#[cfg(test)]
mod tests {
    use super::{DisplayItem, DrawPath, Scene};
    use crate::paint::{Paint, RenderTargetDesc};
    use tessera_color::ColorU;
    use tessera_content::outline::Outline;
    use tessera_geometry::rect::RectF;
    use tessera_geometry::transform2d::Transform2F;
    use tessera_geometry::vector::{vec2f, vec2i};

    fn rect_path(scene: &mut Scene, rect: RectF, color: ColorU) {
        let paint_id = scene.push_paint(&Paint::from_color(color));
        scene.push_draw_path(DrawPath::new(Outline::from_rect(rect), paint_id));
    }

    #[test]
    fn test_consecutive_draw_paths_coalesce() {
        let mut scene = Scene::new();
        rect_path(&mut scene, RectF::new(vec2f(0.0, 0.0), vec2f(1.0, 1.0)), ColorU::black());
        rect_path(&mut scene, RectF::new(vec2f(1.0, 0.0), vec2f(1.0, 1.0)), ColorU::white());

        assert_eq!(scene.display_list().len(), 1);
        match scene.display_list()[0] {
            DisplayItem::DrawPaths(ref range) => assert_eq!(*range, 0..2),
            _ => panic!("expected a DrawPaths item"),
        }
    }

    #[test]
    fn test_epoch_bumps_on_mutation() {
        let mut scene = Scene::new();
        let epoch0 = scene.epoch();
        scene.set_view_box(RectF::new(vec2f(0.0, 0.0), vec2f(100.0, 100.0)));
        let epoch1 = scene.epoch();
        assert_ne!(epoch0, epoch1);

        rect_path(&mut scene, RectF::new(vec2f(0.0, 0.0), vec2f(1.0, 1.0)), ColorU::black());
        assert_ne!(epoch1, scene.epoch());
    }

    #[test]
    fn test_render_target_brackets() {
        let mut scene = Scene::new();
        assert!(scene.render_target_brackets_are_balanced());

        scene.push_render_target(RenderTargetDesc { size: vec2i(64, 64) });
        assert!(!scene.render_target_brackets_are_balanced());
        scene.pop_render_target();
        assert!(scene.render_target_brackets_are_balanced());
    }

    #[test]
    fn test_append_scene_remaps_and_transforms() {
        let mut dest = Scene::new();
        rect_path(&mut dest, RectF::new(vec2f(0.0, 0.0), vec2f(1.0, 1.0)), ColorU::black());

        let mut src = Scene::new();
        rect_path(&mut src, RectF::new(vec2f(0.0, 0.0), vec2f(2.0, 2.0)), ColorU::white());

        dest.append_scene(src, Transform2F::from_translation(vec2f(10.0, 0.0)));

        assert_eq!(dest.draw_paths().len(), 2);
        let appended = &dest.draw_paths()[1];
        assert_eq!(appended.outline().bounds().origin(), vec2f(10.0, 0.0));
        // The appended white paint must not alias the black one.
        assert_ne!(appended.paint(), dest.draw_paths()[0].paint());
        // Consecutive paths coalesce across the append.
        assert_eq!(dest.display_list().len(), 1);
    }

    #[test]
    fn test_scene_ids_are_unique() {
        assert_ne!(Scene::new().id(), Scene::new().id());
    }
}
