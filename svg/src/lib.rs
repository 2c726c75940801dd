// tessera/svg/src/lib.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Converts a subset of SVG to a Tessera scene.

#[macro_use]
extern crate bitflags;

use hashbrown::HashMap;
use std::fmt::{self, Display, Formatter};
use tessera_color::ColorU;
use tessera_content::dash::OutlineDash;
use tessera_content::fill::FillRule;
use tessera_content::outline::{Contour, Outline};
use tessera_content::stroke::{LineCap, LineJoin, OutlineStrokeToFill, StrokeStyle};
use tessera_geometry::rect::RectF;
use tessera_geometry::transform2d::{Matrix2x2F, Transform2F};
use tessera_geometry::vector::{Vector2F, vec2f};
use tessera_renderer::paint::Paint;
use tessera_renderer::scene::{ClipPath, ClipPathId, DrawPath, Scene};
use usvg::{FillRule as UsvgFillRule, LineCap as UsvgLineCap, LineJoin as UsvgLineJoin,
           Node, NodeExt, NodeKind, Opacity, Paint as UsvgPaint,
           PathSegment as UsvgPathSegment, Transform as UsvgTransform, Tree, Visibility};

const HAIRLINE_STROKE_WIDTH: f32 = 0.0333;

/// The result of converting an SVG tree: the scene plus a record of
/// everything the converter had to skip.
pub struct BuiltSVG {
    pub scene: Scene,
    pub result_flags: BuildResultFlags,
    clip_paths: HashMap<String, ClipPathId>,
}

bitflags! {
    // NB: If you change this, make sure to update the `Display`
    // implementation as well.
    pub struct BuildResultFlags: u16 {
        const UNSUPPORTED_CLIP_PATH_NODE       = 0x0001;
        const UNSUPPORTED_DEFS_NODE            = 0x0002;
        const UNSUPPORTED_FILTER_NODE          = 0x0004;
        const UNSUPPORTED_IMAGE_NODE           = 0x0008;
        const UNSUPPORTED_LINEAR_GRADIENT_NODE = 0x0010;
        const UNSUPPORTED_MASK_NODE            = 0x0020;
        const UNSUPPORTED_PATTERN_NODE         = 0x0040;
        const UNSUPPORTED_RADIAL_GRADIENT_NODE = 0x0080;
        const UNSUPPORTED_NESTED_SVG_NODE      = 0x0100;
        const UNSUPPORTED_TEXT_NODE            = 0x0200;
        const UNSUPPORTED_LINK_PAINT           = 0x0400;
        const UNSUPPORTED_CLIP_PATH_ATTR       = 0x0800;
    }
}

impl BuiltSVG {
    /// Builds a scene from an SVG tree.
    pub fn from_tree(tree: &Tree) -> BuiltSVG {
        let mut built_svg = BuiltSVG {
            scene: Scene::new(),
            result_flags: BuildResultFlags::empty(),
            clip_paths: HashMap::new(),
        };

        let root = &tree.root();
        match *root.borrow() {
            NodeKind::Svg(ref svg) => {
                let view_box = svg.view_box.rect;
                built_svg.scene.set_view_box(
                    RectF::new(vec2f(view_box.x() as f32, view_box.y() as f32),
                               vec2f(view_box.width() as f32, view_box.height() as f32)));
                for kid in root.children() {
                    built_svg.process_node(&kid, &Transform2F::default(), None);
                }
            }
            _ => unreachable!(),
        }

        built_svg
    }

    fn process_node(&mut self,
                    node: &Node,
                    transform: &Transform2F,
                    clip_path: Option<ClipPathId>) {
        let node_transform = usvg_transform_to_transform_2d(&node.transform());
        let transform = *transform * node_transform;

        match *node.borrow() {
            NodeKind::Group(ref group) => {
                let mut clip_path = clip_path;
                if let Some(ref clip_path_name) = group.clip_path {
                    match self.clip_paths.get(clip_path_name) {
                        Some(&clip_path_id) => clip_path = Some(clip_path_id),
                        None => {
                            self.result_flags
                                .insert(BuildResultFlags::UNSUPPORTED_CLIP_PATH_ATTR)
                        }
                    }
                }
                if group.mask.is_some() {
                    self.result_flags.insert(BuildResultFlags::UNSUPPORTED_MASK_NODE);
                }
                if group.filter.is_some() {
                    self.result_flags.insert(BuildResultFlags::UNSUPPORTED_FILTER_NODE);
                }

                for kid in node.children() {
                    self.process_node(&kid, &transform, clip_path)
                }
            }
            NodeKind::Path(ref path) if path.visibility == Visibility::Visible => {
                if let Some(ref fill) = path.fill {
                    let style = self.paint_from_svg_paint(&fill.paint, fill.opacity);

                    let mut outline = usvg_path_to_outline(path.data.iter().cloned());
                    outline.transform(&transform);

                    let paint_id = self.scene.push_paint(&style);
                    let mut draw_path = DrawPath::new(outline, paint_id);
                    draw_path.set_fill_rule(match fill.rule {
                        UsvgFillRule::NonZero => FillRule::Winding,
                        UsvgFillRule::EvenOdd => FillRule::EvenOdd,
                    });
                    draw_path.set_clip_path(clip_path);
                    self.scene.push_draw_path(draw_path);
                }

                if let Some(ref stroke) = path.stroke {
                    let style = self.paint_from_svg_paint(&stroke.paint, stroke.opacity);
                    let stroke_style = StrokeStyle {
                        line_width: f32::max(stroke.width.value() as f32,
                                             HAIRLINE_STROKE_WIDTH),
                        line_cap: usvg_line_cap_to_line_cap(stroke.linecap),
                        line_join: usvg_line_join_to_line_join(stroke.linejoin,
                                                               stroke.miterlimit.value()
                                                                     as f32),
                    };

                    let mut outline = usvg_path_to_outline(path.data.iter().cloned());

                    // Dash before stroke-to-fill.
                    if let Some(ref dash_array) = stroke.dasharray {
                        let dashes: Vec<f32> =
                            dash_array.iter().map(|&value| value as f32).collect();
                        let mut dash = OutlineDash::new(&outline,
                                                        &dashes,
                                                        stroke.dashoffset as f32);
                        dash.dash();
                        outline = dash.into_outline();
                    }

                    let mut stroke_to_fill = OutlineStrokeToFill::new(&outline,
                                                                      stroke_style);
                    stroke_to_fill.offset();
                    let mut outline = stroke_to_fill.into_outline();
                    outline.transform(&transform);

                    let paint_id = self.scene.push_paint(&style);
                    let mut draw_path = DrawPath::new(outline, paint_id);
                    draw_path.set_clip_path(clip_path);
                    self.scene.push_draw_path(draw_path);
                }
            }
            NodeKind::Path(..) => {}
            NodeKind::ClipPath(_) => {
                for kid in node.children() {
                    match *kid.borrow() {
                        NodeKind::Path(ref path) => {
                            let mut outline =
                                usvg_path_to_outline(path.data.iter().cloned());
                            outline.transform(&transform);

                            let clip_path_id =
                                self.scene.push_clip_path(ClipPath::new(outline));
                            self.clip_paths.insert(node.id().to_owned(), clip_path_id);
                        }
                        _ => {
                            self.result_flags
                                .insert(BuildResultFlags::UNSUPPORTED_CLIP_PATH_NODE);
                        }
                    }
                }
            }
            NodeKind::Defs => {
                // Clip-path definitions still need to be registered; the
                // rest is unsupported.
                for kid in node.children() {
                    match *kid.borrow() {
                        NodeKind::ClipPath(..) => {}
                        _ => {
                            self.result_flags
                                .insert(BuildResultFlags::UNSUPPORTED_DEFS_NODE);
                            continue;
                        }
                    }
                    self.process_node(&kid, &transform, None);
                }
            }
            NodeKind::Filter(..) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_FILTER_NODE);
            }
            NodeKind::Image(..) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_IMAGE_NODE);
            }
            NodeKind::LinearGradient(..) => {
                self.result_flags
                    .insert(BuildResultFlags::UNSUPPORTED_LINEAR_GRADIENT_NODE);
            }
            NodeKind::RadialGradient(..) => {
                self.result_flags
                    .insert(BuildResultFlags::UNSUPPORTED_RADIAL_GRADIENT_NODE);
            }
            NodeKind::Mask(..) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_MASK_NODE);
            }
            NodeKind::Pattern(..) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_PATTERN_NODE);
            }
            NodeKind::Svg(..) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_NESTED_SVG_NODE);
            }
        }
    }

    fn paint_from_svg_paint(&mut self, paint: &UsvgPaint, opacity: Opacity) -> Paint {
        let mut built_paint = match *paint {
            UsvgPaint::Color(color) => {
                Paint::from_color(ColorU::new(color.red, color.green, color.blue, 255))
            }
            UsvgPaint::Link(_) => {
                self.result_flags.insert(BuildResultFlags::UNSUPPORTED_LINK_PAINT);
                Paint::black()
            }
        };
        built_paint.apply_opacity(opacity.value() as f32);
        built_paint
    }
}

impl Display for BuildResultFlags {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }

        let mut first = true;
        for (bit, name) in NAMES.iter().enumerate() {
            if (self.bits() >> bit) & 1 == 0 {
                continue;
            }
            if !first {
                formatter.write_str(", ")?;
            } else {
                first = false;
            }
            formatter.write_str(name)?;
        }
        return Ok(());

        // Must match the order in `BuildResultFlags`.
        static NAMES: &'static [&'static str] = &[
            "<clipPath>",
            "<defs>",
            "<filter>",
            "<image>",
            "<linearGradient>",
            "<mask>",
            "<pattern>",
            "<radialGradient>",
            "nested <svg>",
            "<text>",
            "paint link",
            "clip-path attribute",
        ];
    }
}

fn usvg_path_to_outline<I>(segments: I) -> Outline
                           where I: Iterator<Item = UsvgPathSegment> {
    let mut outline = Outline::new();
    let mut current_contour = Contour::new();

    for segment in segments {
        match segment {
            UsvgPathSegment::MoveTo { x, y } => {
                if !current_contour.is_empty() {
                    outline.push_contour(
                        std::mem::replace(&mut current_contour, Contour::new()));
                }
                current_contour.push_endpoint(vec2f(x as f32, y as f32));
            }
            UsvgPathSegment::LineTo { x, y } => {
                current_contour.push_endpoint(vec2f(x as f32, y as f32));
            }
            UsvgPathSegment::CurveTo { x1, y1, x2, y2, x, y } => {
                current_contour.push_cubic(vec2f(x1 as f32, y1 as f32),
                                           vec2f(x2 as f32, y2 as f32),
                                           vec2f(x as f32, y as f32));
            }
            UsvgPathSegment::ClosePath => {
                current_contour.close();
                outline.push_contour(
                    std::mem::replace(&mut current_contour, Contour::new()));
            }
        }
    }

    if !current_contour.is_empty() {
        outline.push_contour(current_contour);
    }

    outline
}

fn usvg_transform_to_transform_2d(transform: &UsvgTransform) -> Transform2F {
    Transform2F {
        matrix: Matrix2x2F::row_major(transform.a as f32,
                                      transform.c as f32,
                                      transform.b as f32,
                                      transform.d as f32),
        vector: Vector2F::new(transform.e as f32, transform.f as f32),
    }
}

fn usvg_line_cap_to_line_cap(line_cap: UsvgLineCap) -> LineCap {
    match line_cap {
        UsvgLineCap::Butt => LineCap::Butt,
        UsvgLineCap::Round => LineCap::Round,
        UsvgLineCap::Square => LineCap::Square,
    }
}

fn usvg_line_join_to_line_join(line_join: UsvgLineJoin, miter_limit: f32) -> LineJoin {
    match line_join {
        UsvgLineJoin::Miter => LineJoin::Miter(miter_limit),
        UsvgLineJoin::Round => LineJoin::Round,
        UsvgLineJoin::Bevel => LineJoin::Bevel,
    }
}

#[cfg(test)]
mod tests {
    use super::{usvg_path_to_outline, usvg_transform_to_transform_2d};
    use tessera_geometry::vector::vec2f;
    use usvg::PathSegment;

    #[test]
    fn test_path_conversion() {
        let segments = vec![
            PathSegment::MoveTo { x: 0.0, y: 0.0 },
            PathSegment::LineTo { x: 10.0, y: 0.0 },
            PathSegment::CurveTo { x1: 12.0, y1: 0.0, x2: 14.0, y2: 2.0, x: 14.0, y: 4.0 },
            PathSegment::ClosePath,
        ];
        let outline = usvg_path_to_outline(segments.into_iter());
        assert_eq!(outline.contours().len(), 1);
        assert!(outline.contours()[0].is_closed());
        assert_eq!(outline.contours()[0].first_position(), Some(vec2f(0.0, 0.0)));
    }

    #[test]
    fn test_transform_conversion() {
        let transform = usvg::Transform::new(1.0, 0.0, 0.0, 1.0, 3.0, 4.0);
        let converted = usvg_transform_to_transform_2d(&transform);
        assert_eq!(converted * vec2f(0.0, 0.0), vec2f(3.0, 4.0));
        // SVG's `c` lands in the upper-right matrix slot.
        let skew = usvg::Transform::new(1.0, 0.0, 2.0, 1.0, 0.0, 0.0);
        let converted = usvg_transform_to_transform_2d(&skew);
        assert_eq!(converted * vec2f(0.0, 1.0), vec2f(2.0, 1.0));
    }
}
