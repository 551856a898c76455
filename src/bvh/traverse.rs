// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Vec2;

use super::{Bvh, BvhHit, BvhItem, UvBvhItem, UvSegmentHit};
use crate::math::Ray;

/// 256-entry fixed stack, per §4.2 ("a 256-entry fixed stack is sufficient
/// for the depths produced by the construction").
const STACK_DEPTH: usize = 256;

pub fn first_intersection<I: BvhItem>(
    bvh: &Bvh<I>,
    items: &[I],
    ray: &Ray,
) -> Option<BvhHit<I::Hit>> {
    if bvh.is_empty() || !ray.is_finite() {
        return None;
    }

    let mut stack = [0u32; STACK_DEPTH];
    let mut stack_ptr = 0usize;
    let mut node_index = 0u32;
    let mut closest: Option<BvhHit<I::Hit>> = None;
    let mut current_max = ray.maxdist;

    loop {
        let node = &bvh.nodes[node_index as usize];
        if node
            .bounds
            .intersect_ray(ray, bvh.local_origin)
            .filter(|&(t0, _)| t0 <= current_max)
            .is_some()
        {
            if node.is_leaf() {
                for i in 0..node.item_count {
                    let item_index = bvh.item_order[(node.item_start + i) as usize];
                    if let Some((t, payload)) = items[item_index].intersect(ray) {
                        if t >= ray.mindist && t <= current_max {
                            current_max = t;
                            closest = Some(BvhHit {
                                item_index,
                                t,
                                payload,
                            });
                        }
                    }
                }
                if stack_ptr == 0 {
                    break;
                }
                stack_ptr -= 1;
                node_index = stack[stack_ptr];
                continue;
            }

            let axis = node.split_axis as usize;
            let (near, far) = if ray.sign[axis] == 0 {
                (node_index + 1, node.second_child_offset)
            } else {
                (node.second_child_offset, node_index + 1)
            };
            if stack_ptr < STACK_DEPTH {
                stack[stack_ptr] = far;
                stack_ptr += 1;
            }
            node_index = near;
            continue;
        }

        if stack_ptr == 0 {
            break;
        }
        stack_ptr -= 1;
        node_index = stack[stack_ptr];
    }

    closest
}

pub fn all_intersections<I: BvhItem>(
    bvh: &Bvh<I>,
    items: &[I],
    ray: &Ray,
    tmin: f32,
    tmax: f32,
) -> Vec<BvhHit<I::Hit>> {
    let mut hits = Vec::new();
    if bvh.is_empty() || !ray.is_finite() {
        return hits;
    }

    let mut stack = [0u32; STACK_DEPTH];
    let mut stack_ptr = 0usize;
    let mut node_index = 0u32;

    loop {
        let node = &bvh.nodes[node_index as usize];
        if node.bounds.intersect_ray(ray, bvh.local_origin).is_some() {
            if node.is_leaf() {
                for i in 0..node.item_count {
                    let item_index = bvh.item_order[(node.item_start + i) as usize];
                    if let Some((t, payload)) = items[item_index].intersect(ray) {
                        if t > tmin && t < tmax && t >= ray.mindist && t <= ray.maxdist {
                            hits.push(BvhHit {
                                item_index,
                                t,
                                payload,
                            });
                        }
                    }
                }
            } else {
                if stack_ptr < STACK_DEPTH {
                    stack[stack_ptr] = node.second_child_offset;
                    stack_ptr += 1;
                }
                node_index = node_index + 1;
                continue;
            }
        }

        if stack_ptr == 0 {
            break;
        }
        stack_ptr -= 1;
        node_index = stack[stack_ptr];
    }

    hits
}

/// No world-space AABB bounds a UV footprint, so this walks every leaf
/// rather than pruning by the node's `bounds`.
pub fn intersections_with_uvs<I: UvBvhItem>(
    bvh: &Bvh<I>,
    items: &[I],
    uv0: Vec2,
    uv1: Vec2,
) -> Vec<UvSegmentHit> {
    let mut hits = Vec::new();
    if bvh.is_empty() {
        return hits;
    }

    let mut stack = [0u32; STACK_DEPTH];
    let mut stack_ptr = 0usize;
    let mut node_index = 0u32;

    loop {
        let node = &bvh.nodes[node_index as usize];
        if node.is_leaf() {
            for i in 0..node.item_count {
                let item_index = bvh.item_order[(node.item_start + i) as usize];
                if let Some((t0, t1)) = items[item_index].intersect_uv_segment(uv0, uv1) {
                    hits.push(UvSegmentHit { item_index, t0, t1 });
                }
            }
        } else if stack_ptr < STACK_DEPTH {
            stack[stack_ptr] = node.second_child_offset;
            stack_ptr += 1;
            node_index += 1;
            continue;
        }

        if stack_ptr == 0 {
            break;
        }
        stack_ptr -= 1;
        node_index = stack[stack_ptr];
    }

    hits
}
