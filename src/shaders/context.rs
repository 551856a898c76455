// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The shader-evaluation context, `stx` (§3 "Shader context").
//!
//! The spec describes `stx` as carrying a raw pointer to its pushing frame,
//! the owning thread context, and the render context. A raw "previous
//! context" pointer has no safe, non-`unsafe` Rust equivalent without
//! `Rc`/`Weak`, so per the §9 redesign note we instead store an index into
//! the thread context's frame stack (`parent_frame`) and pass `&ThreadContext`
//! / `&RenderContext` as explicit arguments to every function that needs
//! them, rather than embedding them in the POD context itself. `ShaderContext`
//! stays `Copy`, matching "essentially POD so copying is a memcpy".

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::math::Ray;
use crate::scene::SidesMode;

/// Interpolated intersection data, both geometric and shading, each with
/// analytic x/y derivatives where the spec calls for them.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub point: Vec3,
    pub dpdx: Vec3,
    pub dpdy: Vec3,
    pub local_point: Vec3,
    pub local_to_world: Mat4,

    pub geometric_normal: Vec3,
    pub geometric_normal_faceforward: Vec3,
    pub shading_normal: Vec3,
    pub shading_normal_faceforward: Vec3,

    pub uv: Vec2,
    pub duvdx: Vec2,
    pub duvdy: Vec2,
    pub st: Vec2,

    pub vertex_colour: Vec4,
    pub dcfdx: Vec4,
    pub dcfdy: Vec4,
}

impl Default for Intersection {
    fn default() -> Self {
        Self {
            point: Vec3::ZERO,
            dpdx: Vec3::ZERO,
            dpdy: Vec3::ZERO,
            local_point: Vec3::ZERO,
            local_to_world: Mat4::IDENTITY,
            geometric_normal: Vec3::Z,
            geometric_normal_faceforward: Vec3::Z,
            shading_normal: Vec3::Z,
            shading_normal_faceforward: Vec3::Z,
            uv: Vec2::ZERO,
            duvdx: Vec2::ZERO,
            duvdy: Vec2::ZERO,
            st: Vec2::ZERO,
            vertex_colour: Vec4::ONE,
            dcfdx: Vec4::ZERO,
            dcfdy: Vec4::ZERO,
        }
    }
}

impl Intersection {
    /// Flips `normal` to face toward `view` (dot product > 0), as required
    /// to populate the `*_faceforward` fields.
    pub fn faceforward(normal: Vec3, view: Vec3) -> Vec3 {
        if normal.dot(view) < 0. {
            -normal
        } else {
            normal
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShaderContext {
    pub ray: Ray,
    pub intersection: Intersection,
    /// Recursion depth per ray type, indexed by `RayType::index()`.
    pub depth: [u8; 6],
    pub sides: SidesMode,
    pub frame_time: f32,
    pub shutter_offset: f32,
    /// Index into the owning thread context's frame stack, or `None` for
    /// the root context of a trace (replaces the spec's `previous_stx`
    /// pointer).
    pub parent_frame: Option<usize>,
    /// Deterministic seed for noise/random attribute handlers: a pure
    /// function of this value (never mutated in place) keeps
    /// `evaluateSurface` reproducible across threads (§8 property 4).
    pub seed: u64,
}

impl ShaderContext {
    pub fn root(ray: Ray, frame_time: f32, shutter_offset: f32, seed: u64) -> Self {
        Self {
            ray,
            intersection: Intersection::default(),
            depth: [0; 6],
            sides: SidesMode::Both,
            frame_time,
            shutter_offset,
            parent_frame: None,
            seed,
        }
    }

    /// A child context pushed for a recursive ray (reflection, refraction,
    /// shadow, ...), incrementing the depth counter for `ray.ray_type`.
    pub fn push_child(&self, ray: Ray, parent_frame: usize) -> Self {
        let mut depth = self.depth;
        depth[ray.ray_type.index()] += 1;
        Self {
            ray,
            intersection: Intersection::default(),
            depth,
            sides: self.sides,
            frame_time: self.frame_time,
            shutter_offset: self.shutter_offset,
            parent_frame: Some(parent_frame),
            seed: self.seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1),
        }
    }

    pub fn view_vector(&self) -> Vec3 {
        -self.ray.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RayType;

    #[test]
    fn push_child_increments_only_its_ray_types_depth() {
        let root = ShaderContext::root(
            Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera),
            0.,
            0.,
            42,
        );
        let child = root.push_child(Ray::new(Vec3::ZERO, Vec3::X, 0., RayType::Reflection), 0);
        assert_eq!(child.depth[RayType::Reflection.index()], 1);
        assert_eq!(child.depth[RayType::Camera.index()], 0);
        assert_eq!(child.parent_frame, Some(0));
    }

    #[test]
    fn faceforward_flips_normal_away_from_view() {
        let n = Vec3::Z;
        let view = Vec3::NEG_Z;
        assert_eq!(Intersection::faceforward(n, view), -n);
    }
}
