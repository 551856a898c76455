// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Vec3;

use super::{Bvh, BvhItem, BvhNode};
use crate::math::Aabb;

const LEAF_THRESHOLD: usize = 1;
const SAH_BUCKETS: usize = 12;

struct ItemInfo {
    index: usize,
    bounds: Aabb,
    centroid: Vec3,
}

pub fn build<I: BvhItem>(items: &[I]) -> Bvh<I> {
    if items.is_empty() {
        let nodes = vec![BvhNode {
            bounds: Aabb::EMPTY,
            split_axis: 0,
            item_start: 0,
            item_count: 0,
            second_child_offset: 0,
        }];
        return Bvh {
            nodes,
            item_order: Vec::new(),
            local_origin: Vec3::ZERO,
            _marker: std::marker::PhantomData,
        };
    }

    let mut infos: Vec<ItemInfo> = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let bounds = item.aabb();
            ItemInfo {
                index,
                bounds,
                centroid: bounds.centroid(),
            }
        })
        .collect();

    let local_origin = infos
        .iter()
        .fold(Aabb::EMPTY, |acc, info| acc.union(&info.bounds))
        .centroid();

    let mut nodes = Vec::with_capacity(items.len() * 2);
    let mut item_order = Vec::with_capacity(items.len());

    build_recursive(&mut infos, &mut nodes, &mut item_order);

    Bvh {
        nodes,
        item_order,
        local_origin,
        _marker: std::marker::PhantomData,
    }
}

/// Recursively splits `infos[..]` in place along the longest centroid axis
/// using a binned surface-area heuristic; returns the index of the node
/// just pushed.
fn build_recursive(
    infos: &mut [ItemInfo],
    nodes: &mut Vec<BvhNode>,
    item_order: &mut Vec<usize>,
) -> usize {
    let bounds = infos
        .iter()
        .fold(Aabb::EMPTY, |acc, info| acc.union(&info.bounds));

    let node_index = nodes.len();
    nodes.push(BvhNode {
        bounds,
        split_axis: 0,
        item_start: 0,
        item_count: 0,
        second_child_offset: 0,
    });

    if infos.len() <= LEAF_THRESHOLD {
        make_leaf(infos, nodes, item_order, node_index, bounds);
        return node_index;
    }

    let centroid_bounds = infos
        .iter()
        .fold(Aabb::EMPTY, |mut acc, info| {
            acc.grow(info.centroid);
            acc
        });
    let axis = centroid_bounds.longest_axis();
    let extent = centroid_bounds.extent()[axis];

    if extent < 1e-8 {
        make_leaf(infos, nodes, item_order, node_index, bounds);
        return node_index;
    }

    let split = binned_sah_split(infos, axis, centroid_bounds.min[axis], extent);

    let Some(mid) = split else {
        make_leaf(infos, nodes, item_order, node_index, bounds);
        return node_index;
    };

    infos.select_nth_unstable_by(mid, |a, b| {
        a.centroid[axis].partial_cmp(&b.centroid[axis]).unwrap()
    });
    let (left, right) = infos.split_at_mut(mid);

    build_recursive(left, nodes, item_order);
    let second_child_offset = nodes.len();
    build_recursive(right, nodes, item_order);

    nodes[node_index].split_axis = axis as u8;
    nodes[node_index].second_child_offset = second_child_offset as u32;
    node_index
}

fn make_leaf(
    infos: &[ItemInfo],
    nodes: &mut [BvhNode],
    item_order: &mut Vec<usize>,
    node_index: usize,
    bounds: Aabb,
) {
    let item_start = item_order.len() as u32;
    item_order.extend(infos.iter().map(|info| info.index));
    nodes[node_index] = BvhNode {
        bounds,
        split_axis: 0,
        item_start,
        item_count: infos.len() as u32,
        second_child_offset: 0,
    };
}

/// Surface-area heuristic over `SAH_BUCKETS` centroid bins along `axis`.
/// Returns the split position (an item count for the left partition) that
/// minimizes the heuristic cost, or `None` if no split beats a leaf.
fn binned_sah_split(infos: &[ItemInfo], axis: usize, min: f32, extent: f32) -> Option<usize> {
    struct Bucket {
        count: usize,
        bounds: Aabb,
    }

    let mut buckets: Vec<Bucket> = (0..SAH_BUCKETS)
        .map(|_| Bucket {
            count: 0,
            bounds: Aabb::EMPTY,
        })
        .collect();

    let bucket_for = |centroid: f32| -> usize {
        let b = ((centroid - min) / extent * SAH_BUCKETS as f32) as usize;
        b.min(SAH_BUCKETS - 1)
    };

    for info in infos {
        let b = bucket_for(info.centroid[axis]);
        buckets[b].count += 1;
        buckets[b].bounds = buckets[b].bounds.union(&info.bounds);
    }

    let mut best_cost = f32::INFINITY;
    let mut best_split = None;
    let mut best_count = 0usize;

    for split in 1..SAH_BUCKETS {
        let mut left_bounds = Aabb::EMPTY;
        let mut left_count = 0;
        for b in &buckets[..split] {
            left_bounds = left_bounds.union(&b.bounds);
            left_count += b.count;
        }
        let mut right_bounds = Aabb::EMPTY;
        let mut right_count = 0;
        for b in &buckets[split..] {
            right_bounds = right_bounds.union(&b.bounds);
            right_count += b.count;
        }
        if left_count == 0 || right_count == 0 {
            continue;
        }
        let cost = left_count as f32 * left_bounds.surface_area()
            + right_count as f32 * right_bounds.surface_area();
        if cost < best_cost {
            best_cost = cost;
            best_split = Some(split);
            best_count = left_count;
        }
    }

    best_split.map(|_| best_count.max(1).min(infos.len() - 1))
}
