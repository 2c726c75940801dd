// tessera/canvas/src/tests.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::{Canvas2D, CompositeOperation, Path2D};
use tessera_color::ColorU;
use tessera_content::effects::BlendMode;
use tessera_content::fill::FillRule;
use tessera_geometry::rect::RectF;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::{Vector2F, vec2f};
use tessera_renderer::paint::Paint;
use tessera_renderer::scene::DisplayItem;

#[test]
fn test_save_restore_state() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_line_width(5.0);
    canvas.save_state();
    canvas.set_line_width(10.0);
    canvas.set_transform(&Transform2F::from_translation(vec2f(1.0, 2.0)));
    canvas.restore_state();
    assert_eq!(canvas.current_state.line_width, 5.0);
    assert!(canvas.transform().is_identity());
}

#[test]
fn test_restore_without_save_is_harmless() {
    let mut canvas = Canvas2D::new(vec2f(10.0, 10.0));
    canvas.restore_state();
    assert_eq!(canvas.current_state.global_alpha, 1.0);
}

#[test]
fn test_fill_rect_pushes_one_path() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_fill_paint(Paint::from_color(ColorU::new(255, 0, 0, 255)));
    canvas.fill_rect(RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)));

    let scene = canvas.scene();
    assert_eq!(scene.draw_paths().len(), 1);
    let draw_path = &scene.draw_paths()[0];
    assert_eq!(draw_path.outline().bounds(),
               RectF::from_points(vec2f(10.0, 10.0), vec2f(90.0, 90.0)));
    assert_eq!(draw_path.blend_mode(), BlendMode::SrcOver);
}

#[test]
fn test_transform_applies_to_paths() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_transform(&Transform2F::from_translation(vec2f(10.0, 20.0)));
    canvas.fill_rect(RectF::new(Vector2F::zero(), vec2f(10.0, 10.0)));

    let bounds = canvas.scene().draw_paths()[0].outline().bounds();
    assert_eq!(bounds.origin(), vec2f(10.0, 20.0));
}

#[test]
fn test_global_composite_operation_becomes_blend_mode() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_global_composite_operation(CompositeOperation::Multiply);
    canvas.fill_rect(RectF::new(Vector2F::zero(), vec2f(10.0, 10.0)));
    assert_eq!(canvas.scene().draw_paths()[0].blend_mode(), BlendMode::Multiply);
}

#[test]
fn test_clip_path_applies_to_subsequent_fills() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));

    let mut clip = Path2D::new();
    clip.rect(RectF::new(Vector2F::zero(), vec2f(50.0, 50.0)));
    canvas.clip_path(clip, FillRule::Winding);
    canvas.fill_rect(RectF::new(Vector2F::zero(), vec2f(100.0, 100.0)));

    let scene = canvas.scene();
    assert_eq!(scene.clip_paths().len(), 1);
    assert!(scene.draw_paths()[0].clip_path().is_some());
}

#[test]
fn test_clip_is_scoped_by_save_restore() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.save_state();
    let mut clip = Path2D::new();
    clip.rect(RectF::new(Vector2F::zero(), vec2f(50.0, 50.0)));
    canvas.clip_path(clip, FillRule::Winding);
    canvas.restore_state();

    canvas.fill_rect(RectF::new(Vector2F::zero(), vec2f(100.0, 100.0)));
    assert!(canvas.scene().draw_paths()[0].clip_path().is_none());
}

#[test]
fn test_global_alpha_scales_paint() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_fill_paint(Paint::from_color(ColorU::new(255, 0, 0, 255)));
    canvas.set_global_alpha(0.5);
    canvas.fill_rect(RectF::new(Vector2F::zero(), vec2f(10.0, 10.0)));

    let scene = canvas.scene();
    let paint = scene.get_paint(scene.draw_paths()[0].paint());
    assert_eq!(paint.base_color().a, 128);
}

#[test]
fn test_stroke_path_converts_to_fill() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_line_width(8.0);
    let mut path = Path2D::new();
    path.move_to(vec2f(10.0, 50.0));
    path.line_to(vec2f(90.0, 50.0));
    canvas.stroke_path(path);

    let scene = canvas.scene();
    assert_eq!(scene.draw_paths().len(), 1);
    let bounds = scene.draw_paths()[0].outline().bounds();
    assert!((bounds.min_y() - 46.0).abs() < 0.1);
    assert!((bounds.max_y() - 54.0).abs() < 0.1);
    assert_eq!(scene.draw_paths()[0].fill_rule(), FillRule::Winding);
}

#[test]
fn test_shadow_blur_pushes_render_target_pair() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_shadow_color(ColorU::black());
    canvas.set_shadow_blur(8.0);
    canvas.fill_rect(RectF::from_points(vec2f(20.0, 20.0), vec2f(60.0, 60.0)));

    let scene = canvas.scene();
    // Shadow shape, two blur composites, and the main shape.
    assert_eq!(scene.draw_paths().len(), 4);

    let pushes = scene.display_list()
                      .iter()
                      .filter(|item| match item {
                          DisplayItem::PushRenderTarget(_) => true,
                          _ => false,
                      })
                      .count();
    let pops = scene.display_list()
                    .iter()
                    .filter(|item| match item {
                        DisplayItem::PopRenderTarget => true,
                        _ => false,
                    })
                    .count();
    assert_eq!(pushes, 2);
    assert_eq!(pops, 2);
    assert!(scene.render_target_brackets_are_balanced());
}

#[test]
fn test_path2d_ellipse_closes_full_sweep() {
    let mut path = Path2D::new();
    path.ellipse(vec2f(50.0, 50.0), vec2f(20.0, 10.0), 0.0, 0.0,
                 std::f32::consts::PI * 2.0);
    let outline = path.into_outline();
    assert_eq!(outline.contours().len(), 1);
    assert!(outline.contours()[0].is_closed());
}

#[test]
fn test_zero_width_stroke_is_skipped() {
    let mut canvas = Canvas2D::new(vec2f(100.0, 100.0));
    canvas.set_line_width(0.0);
    let mut path = Path2D::new();
    path.move_to(vec2f(0.0, 0.0));
    path.line_to(vec2f(10.0, 0.0));
    canvas.stroke_path(path);
    assert!(canvas.scene().draw_paths().is_empty());
}
