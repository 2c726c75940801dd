// tessera/content/src/effects.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Special effects: blend modes and filters.

use std::hash::{Hash, Hasher};
use tessera_color::ColorF;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::vector::Vector2F;

use crate::util;

/// Color-combine bits of the tile ctrl byte.
pub const COMBINER_CTRL_COLOR_COMBINE_SRC_IN: i32 = 0x1;
pub const COMBINER_CTRL_COLOR_COMBINE_DEST_IN: i32 = 0x2;

/// Composite opcodes of the tile ctrl byte, stored in the high nibble.
pub const COMBINER_CTRL_COMPOSITE_NORMAL: i32 = 0x0;
pub const COMBINER_CTRL_COMPOSITE_MULTIPLY: i32 = 0x1;
pub const COMBINER_CTRL_COMPOSITE_SCREEN: i32 = 0x2;
pub const COMBINER_CTRL_COMPOSITE_OVERLAY: i32 = 0x3;
pub const COMBINER_CTRL_COMPOSITE_DARKEN: i32 = 0x4;
pub const COMBINER_CTRL_COMPOSITE_LIGHTEN: i32 = 0x5;
pub const COMBINER_CTRL_COMPOSITE_COLOR_DODGE: i32 = 0x6;
pub const COMBINER_CTRL_COMPOSITE_COLOR_BURN: i32 = 0x7;
pub const COMBINER_CTRL_COMPOSITE_HARD_LIGHT: i32 = 0x8;
pub const COMBINER_CTRL_COMPOSITE_SOFT_LIGHT: i32 = 0x9;
pub const COMBINER_CTRL_COMPOSITE_DIFFERENCE: i32 = 0xa;
pub const COMBINER_CTRL_COMPOSITE_EXCLUSION: i32 = 0xb;
pub const COMBINER_CTRL_COMPOSITE_HUE: i32 = 0xc;
pub const COMBINER_CTRL_COMPOSITE_SATURATION: i32 = 0xd;
pub const COMBINER_CTRL_COMPOSITE_COLOR: i32 = 0xe;
pub const COMBINER_CTRL_COMPOSITE_LUMINOSITY: i32 = 0xf;

/// Blend modes that can be applied to individual paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    // Porter-Duff modes, handled natively by the GPU blender.
    Clear,
    Copy,
    SrcIn,
    SrcOut,
    SrcOver,
    SrcAtop,
    DestIn,
    DestOut,
    DestOver,
    DestAtop,
    Xor,
    Lighter,

    // Modes that require a shader-implemented composite.
    Darken,
    Lighten,
    Multiply,
    Screen,
    HardLight,
    Overlay,
    ColorDodge,
    ColorBurn,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl Default for BlendMode {
    #[inline]
    fn default() -> BlendMode {
        BlendMode::SrcOver
    }
}

impl BlendMode {
    /// The composite opcode stored in the tile ctrl byte.
    pub fn composite_ctrl(self) -> i32 {
        match self {
            BlendMode::Clear |
            BlendMode::Copy |
            BlendMode::SrcIn |
            BlendMode::SrcOut |
            BlendMode::SrcOver |
            BlendMode::SrcAtop |
            BlendMode::DestIn |
            BlendMode::DestOut |
            BlendMode::DestOver |
            BlendMode::DestAtop |
            BlendMode::Xor |
            BlendMode::Lighter => COMBINER_CTRL_COMPOSITE_NORMAL,
            BlendMode::Multiply => COMBINER_CTRL_COMPOSITE_MULTIPLY,
            BlendMode::Screen => COMBINER_CTRL_COMPOSITE_SCREEN,
            BlendMode::Overlay => COMBINER_CTRL_COMPOSITE_OVERLAY,
            BlendMode::Darken => COMBINER_CTRL_COMPOSITE_DARKEN,
            BlendMode::Lighten => COMBINER_CTRL_COMPOSITE_LIGHTEN,
            BlendMode::ColorDodge => COMBINER_CTRL_COMPOSITE_COLOR_DODGE,
            BlendMode::ColorBurn => COMBINER_CTRL_COMPOSITE_COLOR_BURN,
            BlendMode::HardLight => COMBINER_CTRL_COMPOSITE_HARD_LIGHT,
            BlendMode::SoftLight => COMBINER_CTRL_COMPOSITE_SOFT_LIGHT,
            BlendMode::Difference => COMBINER_CTRL_COMPOSITE_DIFFERENCE,
            BlendMode::Exclusion => COMBINER_CTRL_COMPOSITE_EXCLUSION,
            BlendMode::Hue => COMBINER_CTRL_COMPOSITE_HUE,
            BlendMode::Saturation => COMBINER_CTRL_COMPOSITE_SATURATION,
            BlendMode::Color => COMBINER_CTRL_COMPOSITE_COLOR,
            BlendMode::Luminosity => COMBINER_CTRL_COMPOSITE_LUMINOSITY,
        }
    }

    /// True if a fully opaque source pixel completely hides whatever is
    /// behind it. Occlusion culling may only drop tiles behind such modes.
    pub fn occludes_backdrop(self) -> bool {
        match self {
            BlendMode::SrcOver | BlendMode::Clear => true,
            BlendMode::Copy |
            BlendMode::SrcIn |
            BlendMode::SrcOut |
            BlendMode::SrcAtop |
            BlendMode::DestIn |
            BlendMode::DestOut |
            BlendMode::DestOver |
            BlendMode::DestAtop |
            BlendMode::Xor |
            BlendMode::Lighter |
            BlendMode::Darken |
            BlendMode::Lighten |
            BlendMode::Multiply |
            BlendMode::Screen |
            BlendMode::HardLight |
            BlendMode::Overlay |
            BlendMode::ColorDodge |
            BlendMode::ColorBurn |
            BlendMode::SoftLight |
            BlendMode::Difference |
            BlendMode::Exclusion |
            BlendMode::Hue |
            BlendMode::Saturation |
            BlendMode::Color |
            BlendMode::Luminosity => false,
        }
    }

    /// True if the mode can affect destination pixels the source does not
    /// cover. Such paths must be tiled over the whole view box.
    pub fn is_destructive(self) -> bool {
        match self {
            BlendMode::Clear |
            BlendMode::Copy |
            BlendMode::SrcIn |
            BlendMode::DestIn |
            BlendMode::SrcOut |
            BlendMode::DestAtop => true,
            BlendMode::SrcOver |
            BlendMode::SrcAtop |
            BlendMode::DestOut |
            BlendMode::DestOver |
            BlendMode::Xor |
            BlendMode::Lighter |
            BlendMode::Darken |
            BlendMode::Lighten |
            BlendMode::Multiply |
            BlendMode::Screen |
            BlendMode::HardLight |
            BlendMode::Overlay |
            BlendMode::ColorDodge |
            BlendMode::ColorBurn |
            BlendMode::SoftLight |
            BlendMode::Difference |
            BlendMode::Exclusion |
            BlendMode::Hue |
            BlendMode::Saturation |
            BlendMode::Color |
            BlendMode::Luminosity => false,
        }
    }

    /// True if compositing needs to read the destination, which the fixed-
    /// function blender cannot do.
    pub fn needs_readable_framebuffer(self) -> bool {
        self.composite_ctrl() != COMBINER_CTRL_COMPOSITE_NORMAL
    }
}

/// The axis a Gaussian blur is applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlurDirection {
    X,
    Y,
}

/// Shaders applicable to patterns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PatternFilter {
    /// Performs postprocessing operations useful for monochrome text.
    Text {
        fg_color: ColorF,
        bg_color: ColorF,
    },
    /// A blur in one direction. A full Gaussian blur is two successive
    /// blur operations, one per axis.
    Blur {
        direction: BlurDirection,
        sigma: f32,
    },
}

/// The shader that should be used when compositing a paint layer onto its
/// destination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintFilter {
    None,
    /// Converts a linear gradient to a radial one.
    RadialGradient {
        /// The line the circles lie along.
        line: LineSegment2F,
        /// The radii of the circles at the two endpoints.
        radii: Vector2F,
        /// The origin of the linearized gradient in the texture.
        uv_origin: Vector2F,
    },
    PatternFilter(PatternFilter),
}

impl Eq for PatternFilter {}

impl Hash for PatternFilter {
    fn hash<H>(&self, state: &mut H) where H: Hasher {
        match *self {
            PatternFilter::Text { fg_color, bg_color } => {
                (0).hash(state);
                util::hash_color_f(fg_color, state);
                util::hash_color_f(bg_color, state);
            }
            PatternFilter::Blur { direction, sigma } => {
                (1).hash(state);
                direction.hash(state);
                util::hash_f32(sigma, state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BlendMode, COMBINER_CTRL_COMPOSITE_LUMINOSITY};

    #[test]
    fn test_composite_ctrl_fits_in_nibble() {
        let modes = [
            BlendMode::SrcOver, BlendMode::Multiply, BlendMode::Screen,
            BlendMode::Overlay, BlendMode::Darken, BlendMode::Lighten,
            BlendMode::ColorDodge, BlendMode::ColorBurn, BlendMode::HardLight,
            BlendMode::SoftLight, BlendMode::Difference, BlendMode::Exclusion,
            BlendMode::Hue, BlendMode::Saturation, BlendMode::Color,
            BlendMode::Luminosity,
        ];
        for &mode in &modes {
            assert!(mode.composite_ctrl() <= COMBINER_CTRL_COMPOSITE_LUMINOSITY);
            assert!(mode.composite_ctrl() >= 0);
        }
    }

    #[test]
    fn test_only_src_over_family_occludes() {
        assert!(BlendMode::SrcOver.occludes_backdrop());
        assert!(!BlendMode::Multiply.occludes_backdrop());
        assert!(!BlendMode::DestIn.occludes_backdrop());
    }
}
