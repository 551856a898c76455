// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The elliptically-weighted-area texture filter of §4.4.

use glam::Vec2;

use super::tile::Tile;

/// Separable 1-D filter weights over a texel footprint, plus the constant
/// needed to renormalize them to sum to exactly 1 (§8 property 3).
struct FilterAxis {
    first_texel: i64,
    weights: Vec<f32>,
}

impl FilterAxis {
    /// A cubic (Catmull-Rom-like) falloff kernel evaluated at `radius`
    /// texels either side of `center`.
    fn cubic(center: f32, radius: f32) -> Self {
        let first_texel = (center - radius).floor() as i64;
        let last_texel = (center + radius).ceil() as i64;
        let mut weights = Vec::with_capacity((last_texel - first_texel + 1).max(1) as usize);
        let mut sum = 0f32;
        for texel in first_texel..=last_texel {
            let d = (texel as f32 + 0.5 - center) / radius.max(1e-6);
            let w = cubic_kernel(d);
            weights.push(w);
            sum += w;
        }
        if sum > 0. {
            for w in &mut weights {
                *w /= sum;
            }
        } else {
            let n = weights.len().max(1);
            weights = vec![1. / n as f32; n];
        }
        Self { first_texel, weights }
    }

    /// A single edge-clamped sample, used when an axis is fully outside the
    /// tile's data window (§4.4 step 4).
    fn edge_clamped(center: f32) -> Self {
        Self {
            first_texel: center.round() as i64,
            weights: vec![1.0],
        }
    }
}

fn cubic_kernel(x: f32) -> f32 {
    let x = x.abs();
    if x >= 1. {
        0.
    } else {
        1. - (3. - 2. * x) * x * x
    }
}

/// Samples `tile` at `uv` (in `[0,1]²`) filtered by the footprint implied by
/// `duvdx`/`duvdy`, writing into `channels` (mapped R, G, B, A source
/// indices). Falls back to nearest-neighbour when both derivatives are
/// zero, and to bilinear when they are present but degenerately small
/// (§4.4 "Fallback paths").
pub fn sample_filtered(tile: &Tile, uv: Vec2, duvdx: Vec2, duvdy: Vec2, channels: [u32; 4]) -> [f32; 4] {
    let texel = Vec2::new(uv.x * tile.width as f32, (1. - uv.y) * tile.height as f32);

    let jx = Vec2::new(duvdx.x * tile.width as f32, duvdx.y * tile.height as f32);
    let jy = Vec2::new(duvdy.x * tile.width as f32, duvdy.y * tile.height as f32);

    if jx.length_squared() < 1e-12 && jy.length_squared() < 1e-12 {
        return sample_nearest(tile, texel, channels);
    }
    if jx.length() < 0.5 && jy.length() < 0.5 {
        return sample_bilinear(tile, texel, channels);
    }

    // Approximate the footprint ellipse with an axis-aligned parallelogram
    // whose extents are the longer of the two derivatives projected onto
    // each axis (§4.4 step 2).
    let radius_x = jx.x.abs().max(jy.x.abs()).max(0.5);
    let radius_y = jx.y.abs().max(jy.y.abs()).max(0.5);

    let axis_u = filter_axis(texel.x, radius_x, tile.width);
    let axis_v = filter_axis(texel.y, radius_y, tile.height);

    let mut out = [0f32; 4];
    for (vi, wv) in axis_v.weights.iter().enumerate() {
        let y = axis_v.first_texel + vi as i64;
        for (ui, wu) in axis_u.weights.iter().enumerate() {
            let x = axis_u.first_texel + ui as i64;
            let weight = wu * wv;
            if weight == 0. {
                continue;
            }
            let (cx, cy) = clamp_texel(x, y, tile.width, tile.height);
            for (i, &ch) in channels.iter().enumerate() {
                out[i] += weight * tile.texel(cx, cy, ch);
            }
        }
    }
    out
}

/// Picks the cubic footprint, or collapses to a single edge-clamped sample
/// if the footprint falls entirely outside the tile's data window.
fn filter_axis(center: f32, radius: f32, extent: u32) -> FilterAxis {
    let hi = center + radius;
    let lo = center - radius;
    if hi < 0. || lo > extent as f32 {
        FilterAxis::edge_clamped(center.clamp(0., (extent.max(1) - 1) as f32))
    } else {
        FilterAxis::cubic(center, radius)
    }
}

fn clamp_texel(x: i64, y: i64, width: u32, height: u32) -> (u32, u32) {
    let cx = x.clamp(0, width as i64 - 1) as u32;
    let cy = y.clamp(0, height as i64 - 1) as u32;
    (cx, cy)
}

fn sample_nearest(tile: &Tile, texel: Vec2, channels: [u32; 4]) -> [f32; 4] {
    let (x, y) = clamp_texel(texel.x.floor() as i64, texel.y.floor() as i64, tile.width, tile.height);
    let mut out = [0f32; 4];
    for (i, &ch) in channels.iter().enumerate() {
        out[i] = tile.texel(x, y, ch);
    }
    out
}

fn sample_bilinear(tile: &Tile, texel: Vec2, channels: [u32; 4]) -> [f32; 4] {
    let x0f = texel.x - 0.5;
    let y0f = texel.y - 0.5;
    let (x0, y0) = (x0f.floor(), y0f.floor());
    let (fx, fy) = (x0f - x0, y0f - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut out = [0f32; 4];
    for (i, &ch) in channels.iter().enumerate() {
        let (cx0, cy0) = clamp_texel(x0, y0, tile.width, tile.height);
        let (cx1, cy1) = clamp_texel(x0 + 1, y0 + 1, tile.width, tile.height);
        let v00 = tile.texel(cx0, cy0, ch);
        let v10 = tile.texel(cx1, cy0, ch);
        let v01 = tile.texel(cx0, cy1, ch);
        let v11 = tile.texel(cx1, cy1, ch);
        let top = v00 * (1. - fx) + v10 * fx;
        let bottom = v01 * (1. - fx) + v11 * fx;
        out[i] = top * (1. - fy) + bottom * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_tile() -> Tile {
        let size = 8u32;
        let mut data = vec![0f32; (size * size) as usize];
        for y in 0..size {
            for x in 0..size {
                data[(y * size + x) as usize] = if (x + y) % 2 == 0 { 1. } else { 0. };
            }
        }
        Tile { width: size, height: size, channels: 1, data }
    }

    #[test]
    fn filter_weights_sum_to_one() {
        let axis = FilterAxis::cubic(3.3, 2.0);
        let sum: f32 = axis.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_derivatives_use_nearest() {
        let tile = checker_tile();
        let out = sample_filtered(&tile, Vec2::new(0.1, 0.1), Vec2::ZERO, Vec2::ZERO, [0, 0, 0, 0]);
        assert!(out[0] == 0. || out[0] == 1.);
    }

    #[test]
    fn large_footprint_averages_toward_midgray() {
        let tile = checker_tile();
        let out = sample_filtered(
            &tile,
            Vec2::new(0.5, 0.5),
            Vec2::new(0.5, 0.),
            Vec2::new(0., 0.5),
            [0, 0, 0, 0],
        );
        assert!((out[0] - 0.5).abs() < 0.2);
    }
}
