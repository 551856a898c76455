// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;

use super::attributes::AttributeHandler;
use super::context::ShaderContext;
use super::knob::Value;
use super::graph::ShaderId;
use crate::external::ImageSource;
use crate::textures::TileCache;

/// Sentinel `channels` entry marking an output slot as not image-sourced.
pub const UNUSED_CHANNEL: u32 = u32::MAX;

/// How one input knob resolves to a value (§3 "Material / shader graph",
/// §4.3 "Binding resolution").
#[derive(Clone)]
pub enum InputBinding {
    Constant(Value),
    Attribute(AttributeHandler),
    Texture {
        source: Arc<dyn ImageSource>,
        /// R, G, B, A source-channel indices; `UNUSED_CHANNEL` in a slot
        /// means that output component isn't sourced from the image (the
        /// sampler leaves it at zero).
        channels: [u32; 4],
        /// UDIM tile offset, §6.
        tile_offset: (u32, u32),
        cache: Arc<TileCache>,
        /// Returned in place of a sample on `ResourceError` (§7).
        fallback: Value,
    },
    Upstream {
        shader: ShaderId,
        output_index: usize,
    },
    /// A legacy per-pixel sampler callable with the shader context (§4.3
    /// "External image-pixel source").
    LegacyPixelSource(Arc<dyn Fn(&ShaderContext) -> Value + Send + Sync>),
    /// No binding set yet; resolves to zero.
    Unbound,
}

impl Default for InputBinding {
    fn default() -> Self {
        Self::Unbound
    }
}

impl std::fmt::Debug for InputBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "Constant({v:?})"),
            Self::Attribute(a) => write!(f, "Attribute({a:?})"),
            Self::Texture { tile_offset, .. } => write!(f, "Texture(tile={tile_offset:?})"),

            Self::Upstream { shader, output_index } => {
                write!(f, "Upstream({shader:?}[{output_index}])")
            }
            Self::LegacyPixelSource(_) => write!(f, "LegacyPixelSource"),
            Self::Unbound => write!(f, "Unbound"),
        }
    }
}
