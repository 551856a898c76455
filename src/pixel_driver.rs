// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The pixel-sample driver (§4.7): pixel → ray → shader tree → accumulated,
//! AOV-filled pixel. Parallelized across scanlines with `rayon`, one
//! `ThreadContext` built per worker — grounded on the teacher's own
//! `RayMarcherRenderState` (`renderers/ray_marcher.rs`), which tracks
//! `paths_rendered_per_pixel` / `resolution` / `frame_counter` across a
//! similarly-structured per-pixel loop; we keep an analogous `RenderStats`
//! accumulator.

use glam::Vec4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::channels::{AovLayer, Channel, MergeMode};
use crate::render_context::{PixelFilter, RenderContext};
use crate::shaders::ShaderContext;
use crate::thread_context::ThreadContext;

/// One finished pixel: the merged RGBA plus every AOV layer's merged value
/// (its handler's full `Vec4`, not just one channel — a layer's `channels`
/// picks which components of it matter), in the same order as
/// `AovTable::layers`.
#[derive(Debug, Clone)]
pub struct PixelResult {
    pub x: u32,
    pub y: u32,
    pub rgba: Vec4,
    pub aovs: Vec<Vec4>,
}

/// Running totals mirroring the teacher's `RayMarcherRenderState` counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    pub pixels_rendered: u64,
    pub samples_rendered: u64,
}

/// Renders every pixel of `render.region`, one scanline per `rayon` task.
/// Returns pixels in row-major order within the region; no ordering is
/// promised across pixels or samples (§5), only that sub-samples within one
/// pixel are evaluated in a deterministic order for a fixed configuration.
pub fn render_region(render: &RenderContext) -> (Vec<PixelResult>, RenderStats) {
    let region = render.region;
    let aov_channel_count = render.aovs.layers().len();

    let rows: Vec<Vec<PixelResult>> = (0..region.height)
        .into_par_iter()
        .map(|row| {
            let y = region.y + row;
            let channels: Vec<Channel> = [Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha]
                .into_iter()
                .collect();
            let mut tc = ThreadContext::new(render, channels);
            let mut pixels = Vec::with_capacity(region.width as usize);
            for col in 0..region.width {
                let x = region.x + col;
                pixels.push(render_pixel(render, &mut tc, x, y, aov_channel_count));
            }
            pixels
        })
        .collect();

    let mut stats = RenderStats::default();
    let mut out = Vec::with_capacity((region.width * region.height) as usize);
    for row in rows {
        stats.pixels_rendered += row.len() as u64;
        out.extend(row);
    }
    (out, stats)
}

fn render_pixel(render: &RenderContext, tc: &mut ThreadContext, x: u32, y: u32, aov_channel_count: usize) -> PixelResult {
    let (samples_x, samples_y) = render.settings.samples_per_pixel;
    let total_samples = (samples_x * samples_y).max(1);

    let mut accum = Vec4::ZERO;
    let mut aov_accum = vec![Vec4::ZERO; aov_channel_count];
    // A fixed per-pixel seed keeps sub-sample order deterministic for a
    // given configuration (§5 "per-pixel, the order of sub-samples is
    // deterministic"), following the teacher's `StdRng::seed_from_u64`
    // pattern for reproducible kernels.
    let mut rng = StdRng::seed_from_u64(((y as u64) << 32) | x as u64);

    for sy in 0..samples_y.max(1) {
        for sx in 0..samples_x.max(1) {
            let (jx, jy) = if render.settings.stochastic_jitter {
                (rng.random_range(0.0..1.0), rng.random_range(0.0..1.0))
            } else {
                (0.5, 0.5)
            };
            let px = x as f32 + (sx as f32 + jx) / samples_x.max(1) as f32;
            let py = y as f32 + (sy as f32 + jy) / samples_y.max(1) as f32;

            let Ok((ray, _differential)) = render.camera.construct_ray(
                px,
                py,
                0.,
                render.settings.image_width as f32,
                render.settings.image_height as f32,
                render.settings.pixel_aspect,
                false,
            ) else {
                continue;
            };

            let stx = ShaderContext::root(ray, ray.time, 0., ((y as u64) << 32 | x as u64) ^ ((sy as u64) << 16 | sx as u64));
            tc.push_frame(stx);

            let (sample_rgba, sample_aovs) = shade_primary_ray(render, tc, &stx, aov_channel_count);
            tc.pop_frame();

            let weight = pixel_filter_weight(render.settings.pixel_filter, sx, sy, samples_x, samples_y);
            accum = MergeMode::Plus.merge(accum, sample_rgba * weight);
            accumulate_aovs(&mut aov_accum, render.aovs.layers(), &sample_aovs, weight);
        }
    }

    let norm = (total_samples as f32).max(1.);
    PixelResult {
        x,
        y,
        rgba: accum / norm,
        aovs: normalize_aovs(aov_accum, render.aovs.layers(), norm),
    }
}

/// Merges one sample's AOV values into the running per-layer accumulator
/// using each layer's own `merge_mode` (§4.7), rather than a single mode
/// shared by every layer the way the RGBA accumulation above uses `Plus`.
fn accumulate_aovs(accum: &mut [Vec4], layers: &[AovLayer], sample: &[Vec4], weight: f32) {
    for ((slot, value), layer) in accum.iter_mut().zip(sample.iter().copied()).zip(layers) {
        *slot = layer.merge_mode.merge(*slot, value * weight);
    }
}

/// `Plus`/`Under`/`PremultUnder` accumulate a running sum across
/// sub-samples and need the box-filter average every other channel gets;
/// `Min`/`Mid`/`Max` already settle on a representative value as each
/// sample merges in, so dividing by the sample count would only shrink it.
fn normalize_aovs(accum: Vec<Vec4>, layers: &[AovLayer], norm: f32) -> Vec<Vec4> {
    accum
        .into_iter()
        .zip(layers)
        .map(|(v, layer)| match layer.merge_mode {
            MergeMode::Plus | MergeMode::Under | MergeMode::PremultUnder => v / norm,
            MergeMode::Min | MergeMode::Mid | MergeMode::Max => v,
        })
        .collect()
}

/// Traces one primary ray, evaluates the hit surface, and applies the AOV
/// table's handlers (§4.7). Misses contribute zero everywhere.
fn shade_primary_ray(
    render: &RenderContext,
    _tc: &mut ThreadContext,
    root_stx: &ShaderContext,
    aov_channel_count: usize,
) -> (Vec4, Vec<Vec4>) {
    let mut aovs = vec![Vec4::ZERO; aov_channel_count];

    let Some(hit) = render.trace(&root_stx.ray) else {
        return (Vec4::ZERO, aovs);
    };
    let Some(material) = render.scene.materials.get(hit_material(render, &hit)) else {
        return (Vec4::ZERO, aovs);
    };

    let mut stx = *root_stx;
    populate_intersection(&mut stx, &hit);

    // The surface shader already folds cutout into its returned pixel (a
    // fully cut-out sample comes back as zero RGBA); `extra` channels beyond
    // the pixel itself have no AOV-layer slot to land in here.
    let rgba = material.evaluate_surface(&stx).map(|(pixel, _extra)| pixel).unwrap_or(Vec4::ZERO);

    for (i, layer) in render.aovs.layers().iter().enumerate() {
        let mut value = layer.handler.evaluate(&stx);
        // `unpremult` divides the colour components out of the handler's
        // own alpha (`value.w`) before merging, recovering the raw
        // attribute value rather than its alpha-weighted contribution —
        // the same un-premultiply `MergeMode::Under` does to `dst`'s rgb
        // before use, but applied here to a single sample.
        if layer.unpremult && value.w.abs() > f32::EPSILON {
            value = (value.truncate() / value.w).extend(value.w);
        }
        aovs[i] = value;
    }

    (rgba, aovs)
}

fn hit_material(render: &RenderContext, hit: &crate::render_context::SceneHit) -> crate::scene::MaterialId {
    render
        .scene
        .objects
        .get(hit.object)
        .map(|object| object.material)
        .unwrap_or_default()
}

fn populate_intersection(stx: &mut ShaderContext, hit: &crate::render_context::SceneHit) {
    let bary = hit.detail.barycentric;
    stx.intersection.point = hit.primitive.point(bary);
    stx.intersection.geometric_normal = hit.detail.geometric_normal;
    stx.intersection.geometric_normal_faceforward =
        crate::shaders::Intersection::faceforward(hit.detail.geometric_normal, stx.view_vector());
    let shading_normal = hit.primitive.shading_normal(bary);
    stx.intersection.shading_normal = shading_normal;
    stx.intersection.shading_normal_faceforward = crate::shaders::Intersection::faceforward(shading_normal, stx.view_vector());
    stx.intersection.uv = hit.primitive.uv(bary);
}

fn pixel_filter_weight(filter: PixelFilter, sx: u32, sy: u32, total_x: u32, total_y: u32) -> f32 {
    match filter {
        PixelFilter::Box => 1.0,
        PixelFilter::Cubic => {
            let cx = cubic_weight(centered(sx, total_x));
            let cy = cubic_weight(centered(sy, total_y));
            cx * cy
        }
    }
}

fn centered(i: u32, total: u32) -> f32 {
    if total <= 1 {
        0.
    } else {
        (i as f32 + 0.5) / total as f32 * 2. - 1.
    }
}

fn cubic_weight(d: f32) -> f32 {
    let d = d.abs().min(1.);
    1. - (3. - 2. * d) * d * d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraSample};
    use crate::channels::AovTable;
    use crate::render_context::{Region, RenderSettings};
    use crate::scene::Scene;
    use glam::Mat4;

    fn empty_context(width: u32, height: u32) -> RenderContext {
        let scene = Scene::default();
        let camera = Camera::new(vec![CameraSample { world_matrix: Mat4::IDENTITY, ..Default::default() }]).unwrap();
        let mut settings = RenderSettings::default();
        settings.image_width = width;
        settings.image_height = height;
        RenderContext::new(scene, camera, settings, AovTable::new(), Region::new(0, 0, width, height)).unwrap()
    }

    #[test]
    fn empty_scene_renders_all_zero_pixels() {
        let render = empty_context(4, 4);
        let (pixels, stats) = render_region(&render);
        assert_eq!(pixels.len(), 16);
        assert_eq!(stats.pixels_rendered, 16);
        assert!(pixels.iter().all(|p| p.rgba == Vec4::ZERO));
    }

    #[test]
    fn box_filter_weight_is_uniform() {
        assert_eq!(pixel_filter_weight(PixelFilter::Box, 0, 0, 4, 4), 1.0);
        assert_eq!(pixel_filter_weight(PixelFilter::Box, 3, 3, 4, 4), 1.0);
    }

    #[test]
    fn cubic_filter_peaks_at_center() {
        let center = pixel_filter_weight(PixelFilter::Cubic, 2, 2, 4, 4);
        let edge = pixel_filter_weight(PixelFilter::Cubic, 0, 0, 4, 4);
        assert!(center > edge);
    }

    fn test_layer(merge_mode: MergeMode) -> AovLayer {
        AovLayer {
            name: "test".into(),
            channels: vec![Channel::Red],
            merge_mode,
            unpremult: false,
            handler: crate::shaders::AttributeHandler::Null,
        }
    }

    #[test]
    fn plus_merge_mode_averages_across_samples() {
        let layers = [test_layer(MergeMode::Plus)];
        let mut accum = vec![Vec4::ZERO];
        for _ in 0..4 {
            accumulate_aovs(&mut accum, &layers, &[Vec4::splat(2.)], 1.0);
        }
        let normalized = normalize_aovs(accum, &layers, 4.0);
        assert_eq!(normalized[0], Vec4::splat(2.));
    }

    #[test]
    fn max_merge_mode_is_not_summed_across_samples() {
        let layers = [test_layer(MergeMode::Max)];
        let mut accum = vec![Vec4::ZERO];
        for sample in [Vec4::splat(3.), Vec4::splat(3.), Vec4::ZERO, Vec4::ZERO] {
            accumulate_aovs(&mut accum, &layers, &[sample], 1.0);
        }
        // A naive running sum divided by 4 would give 1.5; `Max` must
        // preserve the largest sample instead.
        let normalized = normalize_aovs(accum, &layers, 4.0);
        assert_eq!(normalized[0], Vec4::splat(3.));
    }

    #[test]
    fn min_merge_mode_is_not_summed_across_samples() {
        let layers = [test_layer(MergeMode::Min)];
        let mut accum = vec![Vec4::splat(f32::INFINITY)];
        for sample in [Vec4::splat(5.), Vec4::splat(1.), Vec4::splat(5.), Vec4::splat(5.)] {
            accumulate_aovs(&mut accum, &layers, &[sample], 1.0);
        }
        let normalized = normalize_aovs(accum, &layers, 4.0);
        assert_eq!(normalized[0], Vec4::splat(1.));
    }

    #[test]
    fn unpremult_divides_colour_by_the_handler_alpha() {
        // Mirrors the divide `shade_primary_ray` applies per AOV layer when
        // `unpremult` is set: a premultiplied (1, 0, 0, 0.5) sample recovers
        // its raw (2, 0, 0) colour once divided by its own alpha.
        let premultiplied = Vec4::new(1., 0., 0., 0.5);
        let unpremultiplied = (premultiplied.truncate() / premultiplied.w).extend(premultiplied.w);
        assert!((unpremultiplied.x - 2.).abs() < 1e-6);
        assert_eq!(unpremultiplied.w, 0.5);
    }
}
