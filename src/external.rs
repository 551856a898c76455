// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The small API surface the host compositing application implements to
//! drive this engine: scene/material construction callbacks, image and
//! light sources, host frame notifications, and cancellation. See
//! `spec.md` §6.

use glam::{Mat4, Vec3};

use crate::error::RenderResult;

/// A reference to a host-side 2-D image. Texture shaders hold a handle to
/// one of these, never a copy of the pixel data.
pub trait ImageSource: Send + Sync {
    fn channels(&self) -> u32;

    fn format(&self) -> (u32, u32);

    /// Sample a single texel. `channel` is `0..channels()`.
    fn sample(&self, x: u32, y: u32, channel: u32) -> f32;

    /// Bulk fill of a rectangular region into `out`, row-major,
    /// `channels()` floats per texel. Implementations may override this for
    /// a faster path than repeated `sample` calls; the default just loops.
    fn fill_tile(&self, x0: u32, y0: u32, width: u32, height: u32, out: &mut [f32]) {
        let channels = self.channels() as usize;
        for row in 0..height {
            for col in 0..width {
                let base = (row as usize * width as usize + col as usize) * channels;
                for c in 0..channels {
                    out[base + c] = self.sample(x0 + col, y0 + row, c as u32);
                }
            }
        }
    }
}

/// One motion sample of an object: a transform and a topology reference
/// (opaque to the core; it is whatever handle the host uses to identify the
/// dice-able geometry).
#[derive(Debug, Clone)]
pub struct MotionSample {
    pub time: f32,
    pub world_matrix: Mat4,
    pub topology_ref: u64,
}

/// Per-object description the host supplies when building a `Scene`.
pub trait SceneObjectInput: Send + Sync {
    fn motion_samples(&self) -> &[MotionSample];

    fn material_handle(&self) -> crate::scene::MaterialId;

    /// A screen-space AABB hint used to accelerate BVH construction before
    /// the object has been diced.
    fn screen_space_aabb_hint(&self) -> Option<crate::math::aabb::Aabb>;
}

/// The host-side policy for turning one object's primitive description into
/// render primitives the first time a ray touches it (§4.5: "the dicing
/// step selects a handler per host primitive type"). Stored per object
/// context and invoked through `ObjectContext::ensure_diced`.
pub trait Dicer: Send + Sync {
    fn dice(&self) -> RenderResult<(Vec<crate::scene::SurfaceContext>, Vec<crate::scene::RenderPrimitive>)>;
}

/// A light the volume integrator and surface shaders can query.
pub trait LightSource: Send + Sync {
    fn light_type(&self) -> LightType;

    /// Direction toward the light and distance to it, from a surface point
    /// with the given (face-forward) normal.
    fn get_l_vector(&self, p: Vec3, n: Vec3) -> (Vec3, f32);

    fn get_color(&self, p: Vec3, n: Vec3, dir: Vec3, dist: f32) -> Vec3;

    fn get_shadowing(&self, p: Vec3) -> f32;

    /// Only meaningful for volumetric lights (spot cones, point spheres).
    fn volume_bounds(&self) -> Option<VolumeBounds> {
        None
    }

    fn illuminate_atmosphere(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LightType {
    Point,
    Directional,
    Spot,
    Area,
}

#[derive(Debug, Clone, Copy)]
pub struct VolumeBounds {
    pub near: f32,
    pub far: f32,
    pub cone_angle: f32,
}

/// Cooperative cancellation: polled by the marchers and the long
/// traversals. `true` means the host wants the in-flight render aborted.
pub trait Cancellation: Send + Sync {
    fn aborted(&self) -> bool;
}

impl Cancellation for std::sync::atomic::AtomicBool {
    fn aborted(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Host frame notifications.
pub trait HostFrame {
    /// Validate scene/material/shader graphs. `for_real` distinguishes a
    /// cheap interactive validation pass from the one immediately preceding
    /// a real render.
    fn validate(&mut self, for_real: bool) -> RenderResult<()>;

    /// The host is requesting a region be rendered on `count` channels.
    fn request(&mut self, region: crate::render_context::Region, channels: u32, count: u32) -> RenderResult<()>;

    /// Per-scanline render entry point.
    fn engine(
        &mut self,
        y: u32,
        x: u32,
        r: u32,
        channels: &[u32],
        row: &mut [f32],
    ) -> RenderResult<()>;
}
