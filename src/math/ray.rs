// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Vec3;

/// Mask of traversal purposes a ray may carry; surface shaders branch on
/// this to decide whether e.g. a cheap shadow-only evaluation suffices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, serde::Serialize, serde::Deserialize,
)]
pub enum RayType {
    Camera,
    Shadow,
    Diffuse,
    Glossy,
    Reflection,
    Transmission,
}

impl RayType {
    /// Index into a `[T; 6]` array of per-ray-type state (e.g. the shader
    /// context's recursion-depth counters).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A ray plus the precomputed reciprocal direction and AABB-slab signs
/// described in §4.2, computed once at construction rather than per BVH
/// node visited.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub time: f32,
    pub ray_type: RayType,
    pub mindist: f32,
    pub maxdist: f32,
    pub inv_dir: Vec3,
    pub sign: [usize; 3],
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, time: f32, ray_type: RayType) -> Self {
        Self::with_range(origin, direction, time, ray_type, 1e-4, f32::INFINITY)
    }

    pub fn with_range(
        origin: Vec3,
        direction: Vec3,
        time: f32,
        ray_type: RayType,
        mindist: f32,
        maxdist: f32,
    ) -> Self {
        let direction = direction.normalize_or_zero();
        let inv_dir = Vec3::new(1. / direction.x, 1. / direction.y, 1. / direction.z);
        let sign = [
            (inv_dir.x < 0.) as usize,
            (inv_dir.y < 0.) as usize,
            (inv_dir.z < 0.) as usize,
        ];
        Self {
            origin,
            direction,
            time,
            ray_type,
            mindist,
            maxdist,
            inv_dir,
            sign,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// `NaN`/`Inf` distances from degenerate rays are caught here per the
    /// `NumericalError` rule of §7: such rays are simply skipped by the
    /// caller.
    pub fn is_finite(&self) -> bool {
        self.origin.is_finite()
            && self.direction.is_finite()
            && self.mindist.is_finite()
            && self.inv_dir.is_finite()
    }
}

/// Auxiliary rays for the neighbouring pixel in image x and y, used to size
/// texture filter footprints and shading derivatives.
#[derive(Debug, Clone, Copy)]
pub struct RayDifferential {
    pub dx_direction: Vec3,
    pub dy_direction: Vec3,
}

impl RayDifferential {
    pub fn zero() -> Self {
        Self {
            dx_direction: Vec3::ZERO,
            dy_direction: Vec3::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inv_dir_and_sign_match_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(-1., 1., 0.), 0., RayType::Camera);
        assert_eq!(ray.sign, [1, 0, 1]);
        assert!(ray.inv_dir.x < 0.);
    }

    #[test]
    fn degenerate_ray_is_not_finite() {
        let ray = Ray::new(Vec3::ZERO, Vec3::ZERO, 0., RayType::Camera);
        assert!(!ray.is_finite());
    }
}
