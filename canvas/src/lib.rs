// tessera/canvas/src/lib.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A simple API for Tessera that mirrors a subset of HTML canvas.

#[macro_use]
extern crate log;

use std::f32::consts::PI;
use std::fmt::{self, Debug, Formatter};
use std::mem;
use tessera_color::ColorU;
use tessera_content::dash::OutlineDash;
use tessera_content::effects::{BlendMode, BlurDirection, PatternFilter};
use tessera_content::fill::FillRule;
use tessera_content::gradient::Gradient;
use tessera_content::outline::{ArcDirection, Contour, Outline};
use tessera_content::pattern::{Image, Pattern};
use tessera_content::render_target::RenderTargetId;
use tessera_content::stroke::{LineCap, LineJoin as StrokeLineJoin, OutlineStrokeToFill,
                              StrokeStyle};
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::rect::RectF;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::{Vector2F, Vector2I, vec2f};
use tessera_renderer::paint::{Paint, PaintCompositeOp, PaintId, RenderTargetDesc};
use tessera_renderer::scene::{ClipPath, ClipPathId, DrawPath, Scene};

const HAIRLINE_STROKE_WIDTH: f32 = 0.0333;

/// The stateful drawing context.
pub struct Canvas2D {
    scene: Scene,
    current_state: State,
    saved_states: Vec<State>,
}

impl Canvas2D {
    /// Creates a canvas with the given size, in device pixels.
    pub fn new(size: Vector2F) -> Canvas2D {
        let mut scene = Scene::new();
        scene.set_view_box(RectF::new(Vector2F::zero(), size));
        Canvas2D::from_scene(scene)
    }

    #[inline]
    pub fn from_scene(scene: Scene) -> Canvas2D {
        Canvas2D { scene, current_state: State::default(), saved_states: vec![] }
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    pub fn into_scene(self) -> Scene {
        self.scene
    }

    /// Resizes the canvas. The scene is rebuilt against the new view box
    /// on the next frame.
    pub fn resize(&mut self, new_size: Vector2F) {
        self.scene.set_view_box(RectF::new(Vector2F::zero(), new_size));
    }

    // Drawing rectangles

    #[inline]
    pub fn fill_rect(&mut self, rect: RectF) {
        let mut path = Path2D::new();
        path.rect(rect);
        self.fill_path(path, FillRule::Winding);
    }

    #[inline]
    pub fn stroke_rect(&mut self, rect: RectF) {
        let mut path = Path2D::new();
        path.rect(rect);
        self.stroke_path(path);
    }

    pub fn clear_rect(&mut self, rect: RectF) {
        let mut path = Path2D::new();
        path.rect(rect);

        let paint_id = self.scene.push_paint(&Paint::transparent_black());
        let mut outline = path.into_outline();
        outline.transform(&self.current_state.transform);

        let mut draw_path = DrawPath::new(outline, paint_id);
        draw_path.set_blend_mode(BlendMode::Clear);
        self.scene.push_draw_path(draw_path);
    }

    // Line styles

    #[inline]
    pub fn set_line_width(&mut self, new_line_width: f32) {
        self.current_state.line_width = new_line_width
    }

    #[inline]
    pub fn set_line_cap(&mut self, new_line_cap: LineCap) {
        self.current_state.line_cap = new_line_cap
    }

    #[inline]
    pub fn set_line_join(&mut self, new_line_join: LineJoin) {
        self.current_state.line_join = new_line_join
    }

    #[inline]
    pub fn set_miter_limit(&mut self, new_miter_limit: f32) {
        self.current_state.miter_limit = new_miter_limit
    }

    #[inline]
    pub fn set_line_dash(&mut self, mut new_line_dash: Vec<f32>) {
        // Duplicate and concatenate if an odd number of dashes are
        // present.
        if new_line_dash.len() % 2 == 1 {
            let mut real_line_dash = new_line_dash.clone();
            real_line_dash.extend(new_line_dash.into_iter());
            new_line_dash = real_line_dash;
        }
        self.current_state.line_dash = new_line_dash
    }

    #[inline]
    pub fn set_line_dash_offset(&mut self, new_offset: f32) {
        self.current_state.line_dash_offset = new_offset
    }

    // Fill and stroke styles

    #[inline]
    pub fn set_fill_paint(&mut self, new_fill_paint: Paint) {
        self.current_state.fill_paint = new_fill_paint;
    }

    #[inline]
    pub fn set_stroke_paint(&mut self, new_stroke_paint: Paint) {
        self.current_state.stroke_paint = new_stroke_paint;
    }

    // Shadows

    #[inline]
    pub fn shadow_color(&self) -> ColorU {
        self.current_state.shadow_color
    }

    #[inline]
    pub fn set_shadow_color(&mut self, new_shadow_color: ColorU) {
        self.current_state.shadow_color = new_shadow_color;
    }

    #[inline]
    pub fn shadow_blur(&self) -> f32 {
        self.current_state.shadow_blur
    }

    #[inline]
    pub fn set_shadow_blur(&mut self, new_shadow_blur: f32) {
        self.current_state.shadow_blur = new_shadow_blur;
    }

    #[inline]
    pub fn shadow_offset(&self) -> Vector2F {
        self.current_state.shadow_offset
    }

    #[inline]
    pub fn set_shadow_offset(&mut self, new_shadow_offset: Vector2F) {
        self.current_state.shadow_offset = new_shadow_offset;
    }

    // Drawing paths

    #[inline]
    pub fn fill_path(&mut self, path: Path2D, fill_rule: FillRule) {
        let paint = self.current_state.resolve_paint(&self.current_state.fill_paint);
        let paint_id = self.scene.push_paint(&paint);
        self.push_path(path.into_outline(), paint_id, fill_rule);
    }

    pub fn stroke_path(&mut self, path: Path2D) {
        let paint = self.current_state.resolve_paint(&self.current_state.stroke_paint);
        let paint_id = self.scene.push_paint(&paint);

        let mut stroke_style = self.current_state.resolve_stroke_style();

        // Zero-radius strokes draw nothing.
        if stroke_style.line_width <= 0.0 {
            debug!("skipping zero-width stroke");
            return;
        }

        // Clamp thin strokes to a hairline so they stay visible.
        let transform_scale = f32::min(self.current_state.transform.m11(),
                                       self.current_state.transform.m22());
        if stroke_style.line_width * transform_scale < HAIRLINE_STROKE_WIDTH {
            stroke_style.line_width = HAIRLINE_STROKE_WIDTH / transform_scale;
        }

        let mut outline = path.into_outline();

        // Dash before converting the stroke to a fill.
        if !self.current_state.line_dash.is_empty() {
            let mut dash = OutlineDash::new(&outline,
                                            &self.current_state.line_dash,
                                            self.current_state.line_dash_offset);
            dash.dash();
            outline = dash.into_outline();
        }

        let mut stroke_to_fill = OutlineStrokeToFill::new(&outline, stroke_style);
        stroke_to_fill.offset();
        outline = stroke_to_fill.into_outline();

        self.push_path(outline, paint_id, FillRule::Winding);
    }

    pub fn clip_path(&mut self, path: Path2D, fill_rule: FillRule) {
        let mut outline = path.into_outline();
        outline.transform(&self.current_state.transform);

        let mut clip_path = ClipPath::new(outline);
        clip_path.set_fill_rule(fill_rule);
        clip_path.set_clip_path(self.current_state.clip_path);
        let clip_path_id = self.scene.push_clip_path(clip_path);

        self.current_state.clip_path = Some(clip_path_id);
    }

    // Images

    /// Draws an image with its top-left corner at `position`.
    pub fn draw_image(&mut self, image: Image, position: Vector2F) {
        let size = image.size().to_f32();
        self.draw_subimage(image, RectF::new(position, size));
    }

    /// Draws an image scaled into `dest_rect`.
    pub fn draw_subimage(&mut self, image: Image, dest_rect: RectF) {
        let image_size = image.size().to_f32();
        let scale = dest_rect.size() / image_size;
        let mut pattern = Pattern::from_image(image);
        pattern.apply_transform(Transform2F::from_scale(scale)
                                    .translate(dest_rect.origin()));
        pattern.set_smoothing_enabled(self.current_state.image_smoothing_enabled);

        let old_fill_paint =
            mem::replace(&mut self.current_state.fill_paint, Paint::from_pattern(pattern));
        self.fill_rect(dest_rect);
        self.current_state.fill_paint = old_fill_paint;
    }

    /// Composites a previously-rendered render target over `dest_rect`.
    pub fn draw_render_target(&mut self, id: RenderTargetId, size: Vector2I,
                              dest_rect: RectF) {
        let mut pattern = Pattern::from_render_target(id, size);
        pattern.apply_transform(Transform2F::from_translation(dest_rect.origin()));

        let old_fill_paint =
            mem::replace(&mut self.current_state.fill_paint, Paint::from_pattern(pattern));
        self.fill_rect(dest_rect);
        self.current_state.fill_paint = old_fill_paint;
    }

    fn push_path(&mut self, mut outline: Outline, paint_id: PaintId, fill_rule: FillRule) {
        let transform = self.current_state.transform;
        let clip_path = self.current_state.clip_path;
        let blend_mode = self.current_state.global_composite_operation.to_blend_mode();
        let opacity = self.current_state.global_alpha;

        outline.transform(&transform);

        if !self.current_state.shadow_color.is_fully_transparent() {
            self.push_shadow_paths(&outline, fill_rule, blend_mode);
        }

        let mut paint = self.scene.get_paint(paint_id).clone();
        let paint_id = if opacity != 1.0 {
            paint.apply_opacity(opacity);
            self.scene.push_paint(&paint)
        } else {
            paint_id
        };

        let mut draw_path = DrawPath::new(outline, paint_id);
        draw_path.set_clip_path(clip_path);
        draw_path.set_fill_rule(fill_rule);
        draw_path.set_blend_mode(blend_mode);
        self.scene.push_draw_path(draw_path);
    }

    /// The shadow pipeline: render the shadow shape into render target A,
    /// blur it along x into render target B, then blur along y while
    /// compositing into the destination.
    fn push_shadow_paths(&mut self,
                         outline: &Outline,
                         fill_rule: FillRule,
                         blend_mode: BlendMode) {
        let state = &self.current_state;
        let sigma = state.shadow_blur * 0.5;

        let mut shadow_outline = outline.clone();
        shadow_outline.transform(&Transform2F::from_translation(state.shadow_offset));

        // Per spec the shadow respects the alpha of the shadowed path but
        // otherwise takes the shadow color.
        let base_paint = state.resolve_paint(&state.fill_paint);
        let mut shadow_paint = base_paint.clone();
        let shadow_base_alpha = shadow_paint.base_color().a;
        let mut shadow_color = state.shadow_color.to_f32();
        shadow_color.a *= shadow_base_alpha as f32 / 255.0 * state.global_alpha;
        shadow_paint.set_base_color(shadow_color.to_u8());
        if let Some(ref mut overlay) = *shadow_paint.overlay_mut() {
            overlay.set_composite_op(PaintCompositeOp::DestIn);
        }

        // Destructive modes would knock out the intermediate blur
        // targets, so those composites fall back to source-over.
        let composite_blend_mode = if blend_mode.is_destructive() {
            BlendMode::SrcOver
        } else {
            blend_mode
        };

        if sigma == 0.0 {
            // No blur: draw the shadow shape directly.
            let shadow_paint_id = self.scene.push_paint(&shadow_paint);
            let mut shadow_path = DrawPath::new(shadow_outline, shadow_paint_id);
            shadow_path.set_clip_path(state.clip_path);
            shadow_path.set_fill_rule(fill_rule);
            shadow_path.set_blend_mode(composite_blend_mode);
            self.scene.push_draw_path(shadow_path);
            return;
        }

        // Bounds expansion caused by the blur.
        let bounds = shadow_outline.bounds().dilate(sigma * 3.0).round_out();
        let bounds_size = bounds.size().to_i32();

        let render_target_y =
            self.scene.push_render_target(RenderTargetDesc { size: bounds_size });
        let render_target_x =
            self.scene.push_render_target(RenderTargetDesc { size: bounds_size });

        // Draw the shadow shape into render target X, in target-local
        // coordinates.
        shadow_outline.transform(&Transform2F::from_translation(-bounds.origin()));
        let shadow_paint_id = self.scene.push_paint(&shadow_paint);
        let mut shadow_path = DrawPath::new(shadow_outline, shadow_paint_id);
        shadow_path.set_fill_rule(fill_rule);
        self.scene.push_draw_path(shadow_path);

        // Blur along X into render target Y.
        let mut pattern_x = Pattern::from_render_target(render_target_x, bounds_size);
        pattern_x.set_filter(Some(PatternFilter::Blur {
            direction: BlurDirection::X,
            sigma,
        }));
        let paint_x = self.scene.push_paint(&Paint::from_pattern(pattern_x));
        self.scene.pop_render_target();
        let path_x = DrawPath::new(
            Outline::from_rect(RectF::new(Vector2F::zero(), bounds.size())), paint_x);
        self.scene.push_draw_path(path_x);

        // Blur along Y while compositing into the destination.
        let mut pattern_y = Pattern::from_render_target(render_target_y, bounds_size);
        pattern_y.apply_transform(Transform2F::from_translation(bounds.origin()));
        pattern_y.set_filter(Some(PatternFilter::Blur {
            direction: BlurDirection::Y,
            sigma,
        }));
        let paint_y = self.scene.push_paint(&Paint::from_pattern(pattern_y));
        self.scene.pop_render_target();
        let mut path_y = DrawPath::new(Outline::from_rect(bounds), paint_y);
        path_y.set_clip_path(self.current_state.clip_path);
        path_y.set_blend_mode(composite_blend_mode);
        self.scene.push_draw_path(path_y);
    }

    // Transformations

    #[inline]
    pub fn transform(&self) -> Transform2F {
        self.current_state.transform
    }

    #[inline]
    pub fn set_transform(&mut self, new_transform: &Transform2F) {
        self.current_state.transform = *new_transform;
    }

    #[inline]
    pub fn reset_transform(&mut self) {
        self.current_state.transform = Transform2F::default();
    }

    // Compositing

    #[inline]
    pub fn global_alpha(&self) -> f32 {
        self.current_state.global_alpha
    }

    #[inline]
    pub fn set_global_alpha(&mut self, new_global_alpha: f32) {
        self.current_state.global_alpha = new_global_alpha;
    }

    #[inline]
    pub fn global_composite_operation(&self) -> CompositeOperation {
        self.current_state.global_composite_operation
    }

    #[inline]
    pub fn set_global_composite_operation(&mut self,
                                          new_composite_operation: CompositeOperation) {
        self.current_state.global_composite_operation = new_composite_operation;
    }

    // Image smoothing

    #[inline]
    pub fn set_image_smoothing_enabled(&mut self, enabled: bool) {
        self.current_state.image_smoothing_enabled = enabled
    }

    // The canvas state

    #[inline]
    pub fn save_state(&mut self) {
        self.saved_states.push(self.current_state.clone());
    }

    #[inline]
    pub fn restore_state(&mut self) {
        if let Some(state) = self.saved_states.pop() {
            self.current_state = state;
        }
    }
}

#[derive(Clone)]
struct State {
    transform: Transform2F,
    line_width: f32,
    line_cap: LineCap,
    line_join: LineJoin,
    miter_limit: f32,
    line_dash: Vec<f32>,
    line_dash_offset: f32,
    fill_paint: Paint,
    stroke_paint: Paint,
    shadow_color: ColorU,
    shadow_blur: f32,
    shadow_offset: Vector2F,
    image_smoothing_enabled: bool,
    global_alpha: f32,
    global_composite_operation: CompositeOperation,
    clip_path: Option<ClipPathId>,
}

impl Default for State {
    fn default() -> State {
        State {
            transform: Transform2F::default(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            line_dash: vec![],
            line_dash_offset: 0.0,
            fill_paint: Paint::black(),
            stroke_paint: Paint::black(),
            shadow_color: ColorU::transparent_black(),
            shadow_blur: 0.0,
            shadow_offset: Vector2F::zero(),
            image_smoothing_enabled: true,
            global_alpha: 1.0,
            global_composite_operation: CompositeOperation::SourceOver,
            clip_path: None,
        }
    }
}

impl State {
    fn resolve_paint(&self, paint: &Paint) -> Paint {
        let mut paint = (*paint).clone();
        paint.apply_transform(&self.transform);
        paint
    }

    fn resolve_stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            line_width: self.line_width,
            line_cap: self.line_cap,
            line_join: match self.line_join {
                LineJoin::Miter => StrokeLineJoin::Miter(self.miter_limit),
                LineJoin::Bevel => StrokeLineJoin::Bevel,
                LineJoin::Round => StrokeLineJoin::Round,
            },
        }
    }
}

/// An in-progress path, built contour by contour.
#[derive(Clone)]
pub struct Path2D {
    outline: Outline,
    current_contour: Contour,
}

impl Path2D {
    #[inline]
    pub fn new() -> Path2D {
        Path2D { outline: Outline::new(), current_contour: Contour::new() }
    }

    #[inline]
    pub fn close_path(&mut self) {
        self.current_contour.close();
    }

    #[inline]
    pub fn move_to(&mut self, to: Vector2F) {
        self.flush_current_contour();
        self.current_contour.push_endpoint(to);
    }

    #[inline]
    pub fn line_to(&mut self, to: Vector2F) {
        self.current_contour.push_endpoint(to);
    }

    #[inline]
    pub fn quadratic_curve_to(&mut self, ctrl: Vector2F, to: Vector2F) {
        self.current_contour.push_quadratic(ctrl, to);
    }

    #[inline]
    pub fn bezier_curve_to(&mut self, ctrl0: Vector2F, ctrl1: Vector2F, to: Vector2F) {
        self.current_contour.push_cubic(ctrl0, ctrl1, to);
    }

    #[inline]
    pub fn arc(&mut self,
               center: Vector2F,
               radius: f32,
               start_angle: f32,
               end_angle: f32,
               direction: ArcDirection) {
        let transform = Transform2F::from_scale(Vector2F::splat(radius)).translate(center);
        self.current_contour.push_arc(&transform, start_angle, end_angle, direction);
    }

    pub fn arc_to(&mut self, ctrl: Vector2F, to: Vector2F, radius: f32) {
        let from = self.current_contour.last_position().unwrap_or_default();
        let (v0, v1) = (from - ctrl, to - ctrl);
        let (vu0, vu1) = (v0.normalize(), v1.normalize());
        let hypot = radius / f32::sqrt(0.5 * (1.0 - vu0.dot(vu1)));
        let bisector = vu0 + vu1;
        let center = ctrl + bisector.scale(hypot / bisector.length());

        let transform = Transform2F::from_scale(Vector2F::splat(radius)).translate(center);
        let chord = LineSegment2F::new(vu0.yx().scale_xy(vec2f(-1.0, 1.0)),
                                       vu1.yx().scale_xy(vec2f(1.0, -1.0)));
        self.current_contour.push_arc_from_unit_chord(&transform, chord, ArcDirection::CW);
    }

    pub fn rect(&mut self, rect: RectF) {
        self.flush_current_contour();
        self.current_contour.push_endpoint(rect.origin());
        self.current_contour.push_endpoint(rect.upper_right());
        self.current_contour.push_endpoint(rect.lower_right());
        self.current_contour.push_endpoint(rect.lower_left());
        self.current_contour.close();
    }

    pub fn ellipse(&mut self,
                   center: Vector2F,
                   axes: Vector2F,
                   rotation: f32,
                   start_angle: f32,
                   end_angle: f32) {
        self.flush_current_contour();

        let transform = Transform2F::from_scale(axes).rotate(rotation).translate(center);
        self.current_contour.push_arc(&transform, start_angle, end_angle, ArcDirection::CW);

        if end_angle - start_angle >= 2.0 * PI {
            self.current_contour.close();
        }
    }

    pub fn add_path(&mut self, mut path: Path2D, transform: &Transform2F) {
        self.flush_current_contour();
        path.flush_current_contour();
        path.outline.transform(transform);
        let last_contour = path.outline.pop_contour();
        for contour in path.outline.into_contours() {
            self.outline.push_contour(contour);
        }
        self.current_contour = last_contour.unwrap_or_else(Contour::new);
    }

    pub fn into_outline(mut self) -> Outline {
        self.flush_current_contour();
        self.outline
    }

    fn flush_current_contour(&mut self) {
        if !self.current_contour.is_empty() {
            self.outline
                .push_contour(mem::replace(&mut self.current_contour, Contour::new()));
        }
    }
}

impl Debug for Path2D {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        self.clone().into_outline().fmt(formatter)
    }
}

// The miter limit is canvas state rather than part of the join, matching
// HTML canvas semantics; the content crate keeps it inside the join.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineJoin {
    Miter,
    Bevel,
    Round,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompositeOperation {
    SourceOver,
    SourceIn,
    SourceOut,
    SourceAtop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl CompositeOperation {
    fn to_blend_mode(self) -> BlendMode {
        match self {
            CompositeOperation::SourceOver => BlendMode::SrcOver,
            CompositeOperation::SourceIn => BlendMode::SrcIn,
            CompositeOperation::SourceOut => BlendMode::SrcOut,
            CompositeOperation::SourceAtop => BlendMode::SrcAtop,
            CompositeOperation::DestinationOver => BlendMode::DestOver,
            CompositeOperation::DestinationIn => BlendMode::DestIn,
            CompositeOperation::DestinationOut => BlendMode::DestOut,
            CompositeOperation::DestinationAtop => BlendMode::DestAtop,
            CompositeOperation::Lighter => BlendMode::Lighter,
            CompositeOperation::Copy => BlendMode::Copy,
            CompositeOperation::Xor => BlendMode::Xor,
            CompositeOperation::Multiply => BlendMode::Multiply,
            CompositeOperation::Screen => BlendMode::Screen,
            CompositeOperation::Overlay => BlendMode::Overlay,
            CompositeOperation::Darken => BlendMode::Darken,
            CompositeOperation::Lighten => BlendMode::Lighten,
            CompositeOperation::ColorDodge => BlendMode::ColorDodge,
            CompositeOperation::ColorBurn => BlendMode::ColorBurn,
            CompositeOperation::HardLight => BlendMode::HardLight,
            CompositeOperation::SoftLight => BlendMode::SoftLight,
            CompositeOperation::Difference => BlendMode::Difference,
            CompositeOperation::Exclusion => BlendMode::Exclusion,
            CompositeOperation::Hue => BlendMode::Hue,
            CompositeOperation::Saturation => BlendMode::Saturation,
            CompositeOperation::Color => BlendMode::Color,
            CompositeOperation::Luminosity => BlendMode::Luminosity,
        }
    }
}

#[cfg(test)]
mod tests;
