// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! A two-level bounding volume hierarchy (§4.2). This module implements one
//! generic `Bvh<I>` type; `RenderContext` builds one instance over object
//! contexts (the "object BVH") and each diced object builds its own
//! instance over its render primitives (the "primitive BVH").

mod build;
mod node;
mod traverse;

pub use node::BvhNode;

use glam::Vec2;

use crate::math::{Aabb, Ray};

/// An item a BVH can be built over: must expose a world-space bounding box
/// and a leaf-intersection test against a ray. `Hit` carries whatever
/// leaf-specific payload the caller needs back (barycentrics, a sub-item
/// index, ...).
pub trait BvhItem {
    type Hit: Copy;

    fn aabb(&self) -> Aabb;

    /// Intersect this single item; `t` must lie within `[ray.mindist,
    /// ray.maxdist]` to count as a hit.
    fn intersect(&self, ray: &Ray) -> Option<(f32, Self::Hit)>;
}

/// A hit returned by the BVH, naming which item index (into the caller's
/// original item slice) was struck.
#[derive(Debug, Clone, Copy)]
pub struct BvhHit<H> {
    pub item_index: usize,
    pub t: f32,
    pub payload: H,
}

/// An item whose footprint in some UV parameterization can be clipped
/// against a query line segment `uv0 -> uv1` (§4.2 "line-through-UV
/// queries"). Unlike `BvhItem::intersect`, this test has nothing to do
/// with the item's world-space bounds, so `Bvh::get_intersections_with_uvs`
/// cannot prune by AABB and instead walks every leaf.
pub trait UvBvhItem: BvhItem {
    /// Returns the sub-range `[t0, t1] ⊆ [0, 1]` of the query segment's own
    /// parameter `t` (`uv(t) = uv0 + t * (uv1 - uv0)`) that falls inside
    /// this item's UV footprint, or `None` if the segment never enters it.
    fn intersect_uv_segment(&self, uv0: Vec2, uv1: Vec2) -> Option<(f32, f32)>;
}

/// One segment of a `get_intersections_with_uvs` query: the item struck and
/// the `[t0, t1]` sub-range of the query line's parameter it covers.
#[derive(Debug, Clone, Copy)]
pub struct UvSegmentHit {
    pub item_index: usize,
    pub t0: f32,
    pub t1: f32,
}

pub struct Bvh<I: BvhItem> {
    nodes: Vec<BvhNode>,
    /// `item_order[i]` is the index into the original items slice stored at
    /// leaf position `i`.
    item_order: Vec<usize>,
    local_origin: glam::Vec3,
    _marker: std::marker::PhantomData<I>,
}

impl<I: BvhItem> Bvh<I> {
    /// Builds a BVH over `items`; an empty slice produces a BVH whose root
    /// is an empty leaf (`get_first_intersection` always returns `None`).
    pub fn build(items: &[I]) -> Self {
        build::build(items)
    }

    pub fn is_empty(&self) -> bool {
        self.item_order.is_empty()
    }

    pub fn get_first_intersection(&self, items: &[I], ray: &Ray) -> Option<BvhHit<I::Hit>> {
        traverse::first_intersection(self, items, ray)
    }

    pub fn get_intersections(
        &self,
        items: &[I],
        ray: &Ray,
        tmin: f32,
        tmax: f32,
    ) -> Vec<BvhHit<I::Hit>> {
        traverse::all_intersections(self, items, ray, tmin, tmax)
    }

    /// Variant traversal of §4.2: every item whose UV footprint the segment
    /// `uv0 -> uv1` crosses, each reported as a parametric sub-range of the
    /// segment.
    pub fn get_intersections_with_uvs(&self, items: &[I], uv0: Vec2, uv1: Vec2) -> Vec<UvSegmentHit>
    where
        I: UvBvhItem,
    {
        traverse::intersections_with_uvs(self, items, uv0, uv1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RayType;
    use glam::Vec3;

    #[derive(Clone, Copy)]
    struct Sphere {
        center: Vec3,
        radius: f32,
    }

    impl BvhItem for Sphere {
        type Hit = Vec3; // normal

        fn aabb(&self) -> Aabb {
            Aabb::new(self.center - Vec3::splat(self.radius), self.center + Vec3::splat(self.radius))
        }

        fn intersect(&self, ray: &Ray) -> Option<(f32, Vec3)> {
            let oc = ray.origin - self.center;
            let b = oc.dot(ray.direction);
            let c = oc.dot(oc) - self.radius * self.radius;
            let disc = b * b - c;
            if disc < 0. {
                return None;
            }
            let sqrt_disc = disc.sqrt();
            let mut t = -b - sqrt_disc;
            if t < ray.mindist || t > ray.maxdist {
                t = -b + sqrt_disc;
            }
            if t < ray.mindist || t > ray.maxdist {
                return None;
            }
            let normal = (ray.at(t) - self.center) / self.radius;
            Some((t, normal))
        }
    }

    // S3: BVH hit on a single AABB leaf (a unit sphere at the origin).
    #[test]
    fn s3_single_sphere_hit() {
        let items = [Sphere {
            center: Vec3::ZERO,
            radius: 1.,
        }];
        let bvh = Bvh::build(&items);
        let ray = Ray::new(Vec3::new(0., 0., 5.), Vec3::new(0., 0., -1.), 0., RayType::Camera);
        let hit = bvh.get_first_intersection(&items, &ray).unwrap();
        assert!((hit.t - 4.).abs() < 1e-4);
        assert!((hit.payload - Vec3::new(0., 0., 1.)).length() < 1e-4);
    }

    #[test]
    fn first_intersection_equals_min_of_all_intersections() {
        let items = [
            Sphere { center: Vec3::new(0., 0., 0.), radius: 1. },
            Sphere { center: Vec3::new(0., 0., -5.), radius: 1. },
            Sphere { center: Vec3::new(0., 0., 3.), radius: 0.5 },
        ];
        let bvh = Bvh::build(&items);
        let ray = Ray::new(Vec3::new(0., 0., 10.), Vec3::new(0., 0., -1.), 0., RayType::Camera);
        let first = bvh.get_first_intersection(&items, &ray).unwrap();
        let all = bvh.get_intersections(&items, &ray, f32::NEG_INFINITY, f32::INFINITY);
        let min_t = all.iter().map(|h| h.t).fold(f32::INFINITY, f32::min);
        assert!((first.t - min_t).abs() < 1e-5);
    }

    #[test]
    fn empty_bvh_never_hits() {
        let items: [Sphere; 0] = [];
        let bvh = Bvh::build(&items);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z, 0., RayType::Camera);
        assert!(bvh.get_first_intersection(&items, &ray).is_none());
    }
}
