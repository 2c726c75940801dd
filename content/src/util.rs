// tessera/content/src/util.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hashing helpers for float-bearing types.

use std::hash::Hasher;
use tessera_color::ColorF;
use tessera_geometry::line_segment::LineSegment2F;
use tessera_geometry::transform2d::Transform2F;
use tessera_geometry::vector::Vector2F;

#[inline]
pub(crate) fn hash_f32<H>(value: f32, state: &mut H) where H: Hasher {
    state.write_u32(value.to_bits());
}

#[inline]
pub(crate) fn hash_vector_2f<H>(vector: Vector2F, state: &mut H) where H: Hasher {
    hash_f32(vector.x, state);
    hash_f32(vector.y, state);
}

#[inline]
pub(crate) fn hash_line_segment<H>(segment: LineSegment2F, state: &mut H) where H: Hasher {
    hash_vector_2f(segment.from(), state);
    hash_vector_2f(segment.to(), state);
}

#[inline]
pub(crate) fn hash_transform_2f<H>(transform: Transform2F, state: &mut H) where H: Hasher {
    hash_f32(transform.m11(), state);
    hash_f32(transform.m12(), state);
    hash_f32(transform.m21(), state);
    hash_f32(transform.m22(), state);
    hash_vector_2f(transform.vector, state);
}

#[inline]
pub(crate) fn hash_color_f<H>(color: ColorF, state: &mut H) where H: Hasher {
    hash_f32(color.r, state);
    hash_f32(color.g, state);
    hash_f32(color.b, state);
    hash_f32(color.a, state);
}
