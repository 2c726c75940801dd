// tessera/content/src/render_target.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A render target id, scoped to the scene that owns the target.

/// Identifies an offscreen render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetId {
    /// The ID of the scene that this render target ID belongs to.
    pub scene: u32,
    /// The ID of the render target within this scene.
    pub render_target: u32,
}
