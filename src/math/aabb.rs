// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Vec3;

use super::ray::Ray;

/// An axis-aligned bounding box. `min > max` on any axis represents the
/// empty box (the state produced by `Aabb::EMPTY`).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn centroid(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.;
        }
        let e = self.extent();
        2. * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Longest axis of the box: 0 = x, 1 = y, 2 = z.
    pub fn longest_axis(&self) -> usize {
        let e = self.extent();
        if e.x > e.y && e.x > e.z {
            0
        } else if e.y > e.z {
            1
        } else {
            2
        }
    }

    pub fn transform(&self, m: glam::Mat4) -> Aabb {
        let mut result = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            result.grow(m.transform_point3(corner));
        }
        result
    }

    /// Slab test, offset so the ray origin is relative to `local_origin`
    /// (the BVH-local origin referred to in §4.2) to reduce precision loss
    /// at large world scales. Returns the intersected `[t0, t1]` clamped to
    /// the ray's own `[mindist, maxdist]`, or `None` if there is no overlap.
    pub fn intersect_ray(&self, ray: &Ray, local_origin: Vec3) -> Option<(f32, f32)> {
        let origin = ray.origin - local_origin;
        let min = self.min - local_origin;
        let max = self.max - local_origin;

        let mut t0 = ray.mindist;
        let mut t1 = ray.maxdist;

        for axis in 0..3 {
            let inv_d = ray.inv_dir[axis];
            let mut near = (min[axis] - origin[axis]) * inv_d;
            let mut far = (max[axis] - origin[axis]) * inv_d;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ray::RayType;

    #[test]
    fn union_grows_to_contain_both() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(-1.), Vec3::splat(0.5));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::splat(-1.));
        assert_eq!(u.max, Vec3::ONE);
    }

    #[test]
    fn ray_through_unit_box_hits() {
        let bbox = Aabb::new(Vec3::splat(-1.), Vec3::ONE);
        let ray = Ray::new(
            Vec3::new(0., 0., 5.),
            Vec3::new(0., 0., -1.),
            0.,
            RayType::Camera,
        );
        let hit = bbox.intersect_ray(&ray, Vec3::ZERO);
        assert!(hit.is_some());
        let (t0, t1) = hit.unwrap();
        assert!((t0 - 4.).abs() < 1e-5);
        assert!((t1 - 6.).abs() < 1e-5);
    }

    #[test]
    fn ray_missing_box_returns_none() {
        let bbox = Aabb::new(Vec3::splat(-1.), Vec3::ONE);
        let ray = Ray::new(
            Vec3::new(5., 5., 5.),
            Vec3::new(0., 0., -1.),
            0.,
            RayType::Camera,
        );
        assert!(bbox.intersect_ray(&ray, Vec3::ZERO).is_none());
    }
}
