// tessera/renderer/src/options.rs
//
// Copyright © 2021 The Tessera Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Renderer options and error types.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use tessera_color::ColorF;
use tessera_gpu::DeviceError;

/// Options that influence rendering.
#[derive(Clone, Debug, Default)]
pub struct RendererOptions {
    /// The background color. If not present, transparent is assumed.
    pub background_color: Option<ColorF>,
}

/// Errors the renderer surfaces to the caller. Input-validity problems are
/// logged and skipped instead.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderError {
    /// The device was lost, ran out of memory, or rejected a resource.
    /// The frame is abandoned.
    Device(DeviceError),
    /// A single frame produced more than 2^24 alpha tiles. The frame is
    /// aborted.
    AlphaTileOverflow,
    /// `draw` was called before `set_up_pipelines`.
    PipelinesNotReady,
    /// No destination texture has been set.
    NoDestTexture,
}

impl Display for RenderError {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match *self {
            RenderError::Device(ref error) => write!(formatter, "device error: {}", error),
            RenderError::AlphaTileOverflow => {
                write!(formatter, "alpha tile id space exhausted (more than 2^24 tiles)")
            }
            RenderError::PipelinesNotReady => {
                write!(formatter, "pipelines have not been set up")
            }
            RenderError::NoDestTexture => {
                write!(formatter, "no destination texture has been set")
            }
        }
    }
}

impl Error for RenderError {}

impl From<DeviceError> for RenderError {
    #[inline]
    fn from(error: DeviceError) -> RenderError {
        RenderError::Device(error)
    }
}
