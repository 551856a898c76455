// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Lazy tile build with a four-state machine, `{NotLoaded, Loading, Loaded,
//! Error}` (§4.4 step 1), mirroring `scene::dicing`'s `DicingGate` but with
//! an extra terminal `Error` state that still lets other threads proceed
//! (they get the sampler's fallback colour rather than blocking forever).

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::RenderResult;
use crate::external::ImageSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStatus {
    NotLoaded,
    Loading,
    Loaded,
    Error,
}

/// An in-memory float tile covering an image source's full data window,
/// row-major, `channels` floats per texel.
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl Tile {
    pub fn texel(&self, x: u32, y: u32, channel: u32) -> f32 {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize
            + channel as usize;
        self.data.get(idx).copied().unwrap_or(0.)
    }
}

enum Entry {
    YouLoad,
    Wait,
}

#[derive(Default)]
pub struct TileCache {
    status: Mutex<TileStatus>,
    changed: Condvar,
    tile: Mutex<Option<Arc<Tile>>>,
}

impl Default for TileStatus {
    fn default() -> Self {
        TileStatus::NotLoaded
    }
}

impl TileCache {
    /// Returns the loaded tile, building it on first use. Concurrent
    /// callers block on the condition variable rather than spin-sleeping
    /// (§9 redesign note) until the loading thread finishes.
    pub fn get_or_load(&self, source: &dyn ImageSource) -> RenderResult<Arc<Tile>> {
        loop {
            let entry = {
                let mut status = self.status.lock();
                match *status {
                    TileStatus::Loaded => return Ok(self.tile.lock().clone().expect("Loaded implies tile present")),
                    TileStatus::Error => {
                        return Err(crate::error::RenderError::Resource(
                            "texture tile failed to load".into(),
                        ))
                    }
                    TileStatus::NotLoaded => {
                        *status = TileStatus::Loading;
                        Entry::YouLoad
                    }
                    TileStatus::Loading => Entry::Wait,
                }
            };
            match entry {
                Entry::YouLoad => {
                    let built = Self::build(source);
                    let mut status = self.status.lock();
                    match built {
                        Some(tile) => {
                            *self.tile.lock() = Some(Arc::new(tile));
                            *status = TileStatus::Loaded;
                        }
                        None => *status = TileStatus::Error,
                    }
                    drop(status);
                    self.changed.notify_all();
                }
                Entry::Wait => {
                    let mut status = self.status.lock();
                    if *status == TileStatus::Loading {
                        self.changed.wait(&mut status);
                    }
                }
            }
        }
    }

    fn build(source: &dyn ImageSource) -> Option<Tile> {
        let (width, height) = source.format();
        if width == 0 || height == 0 {
            return None;
        }
        let channels = source.channels();
        let mut data = vec![0f32; (width * height * channels) as usize];
        source.fill_tile(0, 0, width, height, &mut data);
        Some(Tile {
            width,
            height,
            channels,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid {
        w: u32,
        h: u32,
        value: f32,
    }

    impl ImageSource for Solid {
        fn channels(&self) -> u32 {
            1
        }
        fn format(&self) -> (u32, u32) {
            (self.w, self.h)
        }
        fn sample(&self, _x: u32, _y: u32, _channel: u32) -> f32 {
            self.value
        }
    }

    struct Failing;
    impl ImageSource for Failing {
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
    fn loads_once_and_caches() {
        let cache = TileCache::default();
        let source = Solid { w: 4, h: 4, value: 0.5 };
        let tile = cache.get_or_load(&source).unwrap();
        assert_eq!(tile.texel(0, 0, 0), 0.5);
        assert_eq!(*cache.status.lock(), TileStatus::Loaded);
    }

    #[test]
    fn zero_sized_source_reports_resource_error() {
        let cache = TileCache::default();
        assert!(cache.get_or_load(&Failing).is_err());
        assert_eq!(*cache.status.lock(), TileStatus::Error);
    }
}
