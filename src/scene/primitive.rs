// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::{Vec2, Vec3};

use super::{ObjectId, SurfaceId};
use crate::bvh::{BvhItem, UvBvhItem};
use crate::math::{Aabb, Ray};

/// A render primitive produced by dicing (§4.5): a single shading triangle
/// with per-vertex normal and UV, carrying back-references to its parent
/// object and surface context so the shader context can be populated on
/// hit.
#[derive(Debug, Clone, Copy)]
pub struct RenderPrimitive {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub n0: Vec3,
    pub n1: Vec3,
    pub n2: Vec3,
    pub uv0: Vec2,
    pub uv1: Vec2,
    pub uv2: Vec2,
    pub object: ObjectId,
    pub surface: SurfaceId,
}

/// Geometric intersection payload: barycentrics, interpolated geometric
/// normal, and UV — the "geometric" data of §3, prior to computing the
/// "interpolated" shading data for the nearest hit only.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveHit {
    pub barycentric: Vec2,
    pub geometric_normal: Vec3,
}

impl RenderPrimitive {
    pub fn geometric_normal(&self) -> Vec3 {
        (self.v1 - self.v0).cross(self.v2 - self.v0).normalize_or_zero()
    }

    pub fn shading_normal(&self, barycentric: Vec2) -> Vec3 {
        let (u, v) = (barycentric.x, barycentric.y);
        let w = 1. - u - v;
        (self.n0 * w + self.n1 * u + self.n2 * v).normalize_or_zero()
    }

    pub fn uv(&self, barycentric: Vec2) -> Vec2 {
        let (u, v) = (barycentric.x, barycentric.y);
        let w = 1. - u - v;
        self.uv0 * w + self.uv1 * u + self.uv2 * v
    }

    pub fn point(&self, barycentric: Vec2) -> Vec3 {
        let (u, v) = (barycentric.x, barycentric.y);
        let w = 1. - u - v;
        self.v0 * w + self.v1 * u + self.v2 * v
    }
}

impl BvhItem for RenderPrimitive {
    type Hit = PrimitiveHit;

    fn aabb(&self) -> Aabb {
        let mut bounds = Aabb::from_point(self.v0);
        bounds.grow(self.v1);
        bounds.grow(self.v2);
        bounds
    }

    /// Möller–Trumbore ray/triangle intersection.
    fn intersect(&self, ray: &Ray) -> Option<(f32, PrimitiveHit)> {
        const EPSILON: f32 = 1e-7;
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);
        if a.abs() < EPSILON {
            return None;
        }
        let f = 1. / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0. ..=1.).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0. || u + v > 1. {
            return None;
        }
        let t = f * edge2.dot(q);
        if t < ray.mindist || t > ray.maxdist {
            return None;
        }
        Some((
            t,
            PrimitiveHit {
                barycentric: Vec2::new(u, v),
                geometric_normal: self.geometric_normal(),
            },
        ))
    }
}

impl UvBvhItem for RenderPrimitive {
    /// Clips the query segment against the triangle's three UV-space edges
    /// (a standard parametric line-vs-convex-polygon clip, one half-plane
    /// per edge): the footprint's barycentric coordinates are affine in UV,
    /// hence linear in the query segment's own parameter `t`, so each edge
    /// constraint just tightens a `[tmin, tmax]` interval.
    fn intersect_uv_segment(&self, uv0: Vec2, uv1: Vec2) -> Option<(f32, f32)> {
        const EPSILON: f32 = 1e-12;

        let e1 = self.uv1 - self.uv0;
        let e2 = self.uv2 - self.uv0;
        let denom = e1.x * e2.y - e1.y * e2.x;
        if denom.abs() < EPSILON {
            return None;
        }

        let barycentric_uv = |p: Vec2| -> (f32, f32) {
            let d = p - self.uv0;
            let u = (d.x * e2.y - d.y * e2.x) / denom;
            let v = (e1.x * d.y - e1.y * d.x) / denom;
            (u, v)
        };

        let (u0, v0) = barycentric_uv(uv0);
        let (u1, v1) = barycentric_uv(uv1);
        let w0 = 1. - u0 - v0;
        let w1 = 1. - u1 - v1;

        let mut tmin = 0.0f32;
        let mut tmax = 1.0f32;
        for (a0, a1) in [(u0, u1), (v0, v1), (w0, w1)] {
            let slope = a1 - a0;
            if slope.abs() < EPSILON {
                if a0 < 0. {
                    return None;
                }
                continue;
            }
            let t_cross = -a0 / slope;
            if slope > 0. {
                tmin = tmin.max(t_cross);
            } else {
                tmax = tmax.min(t_cross);
            }
        }

        (tmin <= tmax).then_some((tmin, tmax))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RayType;

    fn unit_triangle(object: ObjectId, surface: SurfaceId) -> RenderPrimitive {
        RenderPrimitive {
            v0: Vec3::new(-1., -1., 0.),
            v1: Vec3::new(1., -1., 0.),
            v2: Vec3::new(0., 1., 0.),
            n0: Vec3::Z,
            n1: Vec3::Z,
            n2: Vec3::Z,
            uv0: Vec2::new(0., 0.),
            uv1: Vec2::new(1., 0.),
            uv2: Vec2::new(0.5, 1.),
            object,
            surface,
        }
    }

    #[test]
    fn straight_on_hit_reports_correct_t_and_normal() {
        let tri = unit_triangle(ObjectId::default(), SurfaceId::default());
        let ray = Ray::new(Vec3::new(0., -0.5, 5.), Vec3::new(0., 0., -1.), 0., RayType::Camera);
        let (t, hit) = tri.intersect(&ray).unwrap();
        assert!((t - 5.).abs() < 1e-4);
        assert!((hit.geometric_normal - Vec3::Z).length() < 1e-4);
    }

    #[test]
    fn miss_outside_triangle_returns_none() {
        let tri = unit_triangle(ObjectId::default(), SurfaceId::default());
        let ray = Ray::new(Vec3::new(5., 5., 5.), Vec3::new(0., 0., -1.), 0., RayType::Camera);
        assert!(tri.intersect(&ray).is_none());
    }

    #[test]
    fn uv_segment_through_triangle_clips_to_footprint() {
        let tri = unit_triangle(ObjectId::default(), SurfaceId::default());
        // A horizontal line at v = (0,0) -> (1,0) crosses uv0=(0,0)..uv1=(1,0)
        // along its base edge, so the whole segment lies on the boundary.
        let (t0, t1) = tri.intersect_uv_segment(Vec2::new(0., 0.), Vec2::new(1., 0.)).unwrap();
        assert!(t0 <= t1);

        // A vertical line off-center enters through the base edge and exits
        // through the left edge, both strictly inside [0, 1].
        let (t0, t1) = tri
            .intersect_uv_segment(Vec2::new(0.3, -1.), Vec2::new(0.3, 1.))
            .unwrap();
        assert!(t0 > 0. && t1 < 1. && t0 < t1);
    }

    #[test]
    fn uv_segment_missing_footprint_returns_none() {
        let tri = unit_triangle(ObjectId::default(), SurfaceId::default());
        assert!(tri
            .intersect_uv_segment(Vec2::new(5., 5.), Vec2::new(6., 6.))
            .is_none());
    }
}
