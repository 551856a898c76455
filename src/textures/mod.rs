// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Tiled 2-D texture sampling: UDIM addressing, lazy tile loading, and the
//! EWA-approximating filter (§4.4).

mod sampler;
mod tile;
pub mod udim;

pub use sampler::sample_filtered;
pub use tile::{Tile, TileCache, TileStatus};

use glam::{Vec2, Vec4};

use crate::external::ImageSource;

/// A texture-shader's binding: a reference to a host image plus a UDIM tile
/// offset and a lazily-built tile cache. Cheap to construct; the expensive
/// tile build happens once, on first sample (§4.4 step 1).
pub struct TextureSource {
    pub source: std::sync::Arc<dyn ImageSource>,
    pub tile_offset: (u32, u32),
    cache: TileCache,
}

impl TextureSource {
    pub fn new(source: std::sync::Arc<dyn ImageSource>, tile_offset: (u32, u32)) -> Self {
        Self {
            source,
            tile_offset,
            cache: TileCache::default(),
        }
    }

    /// Samples at `stx.UV - uv_tile_offset` with derivatives, falling back
    /// to `fallback` on a `ResourceError` (§7).
    pub fn sample(
        &self,
        uv: Vec2,
        duvdx: Vec2,
        duvdy: Vec2,
        channels: [u32; 4],
        fallback: Vec4,
    ) -> Vec4 {
        let local_uv = Vec2::new(
            uv.x - self.tile_offset.0 as f32,
            uv.y - self.tile_offset.1 as f32,
        );
        match self.cache.get_or_load(self.source.as_ref()) {
            Ok(tile) => {
                let out = sample_filtered(&tile, local_uv, duvdx, duvdy, channels);
                Vec4::from_array(out)
            }
            Err(err) => {
                log::warn!("texture sample fell back to fallback colour: {err}");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid(f32);
    impl ImageSource for Solid {
        fn channels(&self) -> u32 {
            4
        }
        fn format(&self) -> (u32, u32) {
            (4, 4)
        }
        fn sample(&self, _x: u32, _y: u32, _channel: u32) -> f32 {
            self.0
        }
    }

    struct Broken;
    impl ImageSource for Broken {
        fn channels(&self) -> u32 {
            1
        }
        fn format(&self) -> (u32, u32) {
            (0, 0)
        }
        fn sample(&self, _x: u32, _y: u32, _channel: u32) -> f32 {
            0.
        }
    }

    #[test]
    fn samples_solid_source_at_any_uv() {
        let tex = TextureSource::new(std::sync::Arc::new(Solid(0.25)), (0, 0));
        let out = tex.sample(Vec2::splat(0.5), Vec2::ZERO, Vec2::ZERO, [0, 1, 2, 3], Vec4::ZERO);
        assert_eq!(out, Vec4::splat(0.25));
    }

    #[test]
    fn broken_source_yields_fallback() {
        let tex = TextureSource::new(std::sync::Arc::new(Broken), (0, 0));
        let fallback = Vec4::new(1., 0., 1., 1.);
        let out = tex.sample(Vec2::splat(0.5), Vec2::ZERO, Vec2::ZERO, [0, 0, 0, 0], fallback);
        assert_eq!(out, fallback);
    }
}
