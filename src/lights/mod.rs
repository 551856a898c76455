// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Light evaluation helpers built on top of the host-supplied
//! `external::LightSource` trait (§6), plus geometric-bound intersection
//! for volumetric lights (§4.6).

use glam::Vec3;

use crate::bvh::Bvh;
use crate::external::LightSource;
use crate::math::Ray;
use crate::scene::RenderPrimitive;

/// One light's contribution at a shading point (§6 "Light evaluation").
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub direction: Vec3,
    pub distance: f32,
    pub colour: Vec3,
    pub shadow: f32,
}

pub fn sample(light: &dyn LightSource, p: Vec3, n: Vec3) -> LightSample {
    let (direction, distance) = light.get_l_vector(p, n);
    let colour = light.get_color(p, n, direction, distance);
    let shadow = light.get_shadowing(p);
    LightSample { direction, distance, colour, shadow }
}

/// A `[tmin, tmax]` pair on the ray, one per ray-volume overlap (glossary
/// "Volume intersection"). A light-volume object is diced like any other
/// geometry (its render primitives approximate the volume's geometric
/// bound — a sphere for a point light, a cone for a spot, ...); entering
/// and exiting the bound are just the minimum and maximum hit distances of
/// that closed surface, so this reuses the ordinary primitive BVH rather
/// than needing bespoke sphere/cone intersection code.
pub fn volume_intersection(prim_bvh: &Bvh<RenderPrimitive>, prims: &[RenderPrimitive], ray: &Ray) -> Option<(f32, f32)> {
    let hits = prim_bvh.get_intersections(prims, ray, ray.mindist, ray.maxdist);
    if hits.is_empty() {
        return None;
    }
    let tmin = hits.iter().map(|h| h.t).fold(f32::INFINITY, f32::min);
    let tmax = hits.iter().map(|h| h.t).fold(f32::NEG_INFINITY, f32::max);
    Some((tmin, tmax))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::LightType;
    use crate::math::RayType;

    struct FixedLight;
    impl LightSource for FixedLight {
        fn light_type(&self) -> LightType {
            LightType::Point
        }
        fn get_l_vector(&self, p: Vec3, _n: Vec3) -> (Vec3, f32) {
            let to_light = Vec3::new(0., 5., 0.) - p;
            (to_light.normalize(), to_light.length())
        }
        fn get_color(&self, _p: Vec3, _n: Vec3, _dir: Vec3, _dist: f32) -> Vec3 {
            Vec3::ONE
        }
        fn get_shadowing(&self, _p: Vec3) -> f32 {
            1.0
        }
    }

    #[test]
    fn sample_reads_direction_and_distance_from_light() {
        let s = sample(&FixedLight, Vec3::ZERO, Vec3::Y);
        assert!((s.distance - 5.).abs() < 1e-5);
        assert!((s.direction - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn empty_primitive_list_has_no_volume_intersection() {
        let prims: [RenderPrimitive; 0] = [];
        let bvh = Bvh::build(&prims);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0., RayType::Camera);
        assert!(volume_intersection(&bvh, &prims, &ray).is_none());
    }
}
