// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The immutable-after-setup render context (§3 "Render context"): camera,
//! scene, channel/AOV configuration, and the nested object/primitive BVH
//! traversal (§4.2) that drives lazy dicing (§4.5).

use glam::Vec2;
use serde_hashkey::{to_key_with_ordered_float, Key, OrderedFloatPolicy};

use crate::bvh::UvSegmentHit;
use crate::camera::Camera;
use crate::channels::{AovTable, ChannelSet};
use crate::error::{RenderError, RenderResult};
use crate::math::Ray;
use crate::scene::{ObjectId, PrimitiveHit, RenderPrimitive, Scene, SurfaceId};
use crate::volume::VolumeSettings;

/// A rectangular sub-window of the output image (§6 `request`/`engine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize, serde::Deserialize)]
pub enum PixelFilter {
    Box,
    Cubic,
}

/// Render settings the host fills in and hands to `RenderContext::new`,
/// following the teacher's `#[serde(default)]` config-struct pattern
/// (`Camera`, `Material`, `ProceduralTexture`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Maximum recursion depth per ray type (§4.3/§5), indexed by
    /// `RayType::index`.
    pub max_ray_depth: [u8; 6],
    pub samples_per_pixel: (u32, u32),
    pub stochastic_jitter: bool,
    pub pixel_filter: PixelFilter,
    pub volume: VolumeSettings,
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_aspect: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_ray_depth: [4, 2, 1, 2, 4, 4],
            samples_per_pixel: (1, 1),
            stochastic_jitter: false,
            pixel_filter: PixelFilter::Box,
            volume: VolumeSettings::default(),
            image_width: 1920,
            image_height: 1080,
            pixel_aspect: 1.0,
        }
    }
}

/// One ray hit resolved all the way down to a render primitive, the result
/// of `RenderContext::trace`'s nested object→primitive traversal.
#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    pub object: ObjectId,
    pub surface: SurfaceId,
    pub t: f32,
    pub primitive: RenderPrimitive,
    pub detail: PrimitiveHit,
}

pub struct RenderContext {
    pub scene: Scene,
    pub camera: Camera,
    pub settings: RenderSettings,
    pub aovs: AovTable,
    pub region: Region,
    scene_hash: Key<OrderedFloatPolicy>,
}

impl RenderContext {
    pub fn new(
        mut scene: Scene,
        camera: Camera,
        settings: RenderSettings,
        aovs: AovTable,
        region: Region,
    ) -> RenderResult<Self> {
        scene.build_object_bvh();
        let scene_hash = Self::compute_scene_hash(&camera, &settings)?;
        Ok(Self { scene, camera, settings, aovs, region, scene_hash })
    }

    /// A hash over the parts of scene configuration cheap enough to
    /// serialize every time validation runs (camera + render settings),
    /// generalizing the teacher's `recompile_hash`/`reconstruct_hash`
    /// (`render_passes/mod.rs`) to decide whether per-object dicing state
    /// needs invalidating for a new render rather than a new GPU pipeline.
    fn compute_scene_hash(camera: &Camera, settings: &RenderSettings) -> RenderResult<Key<OrderedFloatPolicy>> {
        #[derive(serde::Serialize)]
        struct HashInput<'a> {
            camera_samples: &'a [crate::camera::CameraSample],
            settings: &'a RenderSettings,
        }
        to_key_with_ordered_float(&HashInput { camera_samples: camera.samples(), settings })
            .map_err(|err| RenderError::Configuration(format!("failed to hash scene configuration: {err}")))
    }

    pub fn scene_hash(&self) -> &Key<OrderedFloatPolicy> {
        &self.scene_hash
    }

    /// Validates every material in the scene and (re)builds the object BVH.
    /// Idempotent per §3's shader-validation invariant.
    pub fn validate(&mut self) -> RenderResult<()> {
        for (_, material) in self.scene.materials.iter_mut() {
            material.validate(0., glam::Mat4::IDENTITY)?;
        }
        self.scene.build_object_bvh();
        Ok(())
    }

    /// The union of every channel any material or AOV layer in this
    /// context can produce (§3 invariant).
    pub fn channel_set(&self) -> ChannelSet {
        let materials = self.scene.materials.values().map(|m| m.channel_set());
        let mut set = ChannelSet::union_all(materials.collect::<Vec<_>>().iter());
        set = set.union(&self.aovs.channel_set());
        set
    }

    /// Two-level traversal of §4.2: object BVH first, dicing any object the
    /// ray reaches for the first time, then that object's primitive BVH.
    /// Degenerate rays are skipped per `NumericalError` (§7); dicing
    /// failures drop that object from consideration for this ray rather
    /// than aborting the whole traversal (§7 `TopologyError`/recoverable
    /// errors are local).
    pub fn trace(&self, ray: &Ray) -> Option<SceneHit> {
        if !ray.is_finite() {
            return None;
        }
        let object_bvh = self.scene.object_bvh()?;
        let leaves = self.scene.object_bvh_leaves();
        let object_hits = object_bvh.get_intersections(&leaves, ray, ray.mindist, ray.maxdist);

        let mut best: Option<SceneHit> = None;
        for object_hit in object_hits {
            let object_id = object_hit.payload;
            let Some(object) = self.scene.objects.get(object_id) else {
                continue;
            };
            if let Some(dicer) = self.scene.dicer(object_id) {
                if let Err(err) = object.ensure_diced(|| dicer.dice()) {
                    log::warn!("dropping object {object_id:?} from this ray after dicing failure: {err}");
                    continue;
                }
            }
            let diced = object.diced();
            let Some(prim_bvh) = diced.prim_bvh.as_ref() else {
                continue;
            };
            if let Some(prim_hit) = prim_bvh.get_first_intersection(&diced.prim_list, ray) {
                let is_closer = match &best {
                    Some(b) => prim_hit.t < b.t,
                    None => true,
                };
                if is_closer {
                    let primitive = diced.prim_list[prim_hit.item_index];
                    best = Some(SceneHit {
                        object: object_id,
                        surface: primitive.surface,
                        t: prim_hit.t,
                        primitive,
                        detail: prim_hit.payload,
                    });
                }
            }
        }
        best
    }

    /// Variant traversal of §4.2: every render primitive of `object`'s
    /// diced primitive BVH whose UV footprint the segment `uv0 -> uv1`
    /// crosses, each reported as a `[t0, t1] ⊆ [0, 1]` sub-range of the
    /// query segment's own parameter. Dices the object on first use, same
    /// as `trace`; a dicing failure or an object with no diced geometry
    /// yields an empty result rather than an error.
    pub fn intersections_with_uvs(&self, object_id: ObjectId, uv0: Vec2, uv1: Vec2) -> Vec<UvSegmentHit> {
        let Some(object) = self.scene.objects.get(object_id) else {
            return Vec::new();
        };
        if let Some(dicer) = self.scene.dicer(object_id) {
            if let Err(err) = object.ensure_diced(|| dicer.dice()) {
                log::warn!("dropping object {object_id:?} from UV query after dicing failure: {err}");
                return Vec::new();
            }
        }
        let diced = object.diced();
        let Some(prim_bvh) = diced.prim_bvh.as_ref() else {
            return Vec::new();
        };
        prim_bvh.get_intersections_with_uvs(&diced.prim_list, uv0, uv1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSample;
    use crate::external::{Dicer, MotionSample, SceneObjectInput};
    use crate::math::RayType;
    use crate::scene::{ObjectContext, SidesMode, SurfaceContext};
    use glam::{Mat4, Vec2, Vec3};
    use std::sync::Arc;

    struct CubeInput {
        samples: Vec<MotionSample>,
    }

    impl SceneObjectInput for CubeInput {
        fn motion_samples(&self) -> &[MotionSample] {
            &self.samples
        }
        fn material_handle(&self) -> crate::scene::MaterialId {
            crate::scene::MaterialId::default()
        }
        fn screen_space_aabb_hint(&self) -> Option<crate::math::Aabb> {
            Some(crate::math::Aabb::new(Vec3::splat(-1.), Vec3::ONE))
        }
    }

    struct TwoTriangleDicer;
    impl Dicer for TwoTriangleDicer {
        fn dice(&self) -> RenderResult<(Vec<SurfaceContext>, Vec<RenderPrimitive>)> {
            let object = ObjectId::default();
            let surface = SurfaceId::default();
            let tri = RenderPrimitive {
                v0: Vec3::new(-10., -10., 0.),
                v1: Vec3::new(10., -10., 0.),
                v2: Vec3::new(0., 10., 0.),
                n0: Vec3::Z,
                n1: Vec3::Z,
                n2: Vec3::Z,
                uv0: Vec2::ZERO,
                uv1: Vec2::new(1., 0.),
                uv2: Vec2::new(0.5, 1.),
                object,
                surface,
            };
            let surf = SurfaceContext {
                object,
                primitive_range: 0..1,
                material: crate::scene::MaterialId::default(),
                displacement_bounds: 0.,
                sides: SidesMode::Both,
            };
            Ok((vec![surf], vec![tri]))
        }
    }

    fn context_with_one_triangle() -> RenderContext {
        let mut scene = Scene::default();
        let input = CubeInput {
            samples: vec![MotionSample { time: 0., world_matrix: Mat4::IDENTITY, topology_ref: 1 }],
        };
        let object = ObjectContext::from_input(&input, crate::scene::MaterialId::default()).unwrap();
        scene.add_object_with_dicer(object, Arc::new(TwoTriangleDicer));

        let camera = Camera::new(vec![CameraSample { world_matrix: Mat4::IDENTITY, ..Default::default() }]).unwrap();
        RenderContext::new(scene, camera, RenderSettings::default(), AovTable::new(), Region::new(0, 0, 64, 64)).unwrap()
    }

    #[test]
    fn trace_dices_on_first_ray_and_hits_primitive() {
        let ctx = context_with_one_triangle();
        let ray = Ray::new(Vec3::new(0., 0., 5.), Vec3::NEG_Z, 0., RayType::Camera);
        let hit = ctx.trace(&ray).expect("should hit the diced triangle");
        assert!((hit.t - 5.).abs() < 1e-3);
    }

    #[test]
    fn trace_skips_nonfinite_rays() {
        let ctx = context_with_one_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::ZERO, 0., RayType::Camera);
        assert!(ctx.trace(&ray).is_none());
    }

    #[test]
    fn intersections_with_uvs_finds_diced_triangle_footprint() {
        let ctx = context_with_one_triangle();
        let object_id = ctx.scene.objects.keys().next().unwrap();
        let hits = ctx.intersections_with_uvs(object_id, Vec2::new(0.3, -1.), Vec2::new(0.3, 1.));
        assert_eq!(hits.len(), 1);
        assert!(hits[0].t0 > 0. && hits[0].t1 < 1. && hits[0].t0 < hits[0].t1);
    }

    #[test]
    fn intersections_with_uvs_misses_outside_footprint() {
        let ctx = context_with_one_triangle();
        let object_id = ctx.scene.objects.keys().next().unwrap();
        let hits = ctx.intersections_with_uvs(object_id, Vec2::new(5., 5.), Vec2::new(6., 6.));
        assert!(hits.is_empty());
    }

    #[test]
    fn scene_hash_changes_with_camera() {
        let ctx_a = context_with_one_triangle();
        let mut scene = Scene::default();
        let camera_b = Camera::new(vec![CameraSample {
            world_matrix: Mat4::from_translation(Vec3::X),
            ..Default::default()
        }])
        .unwrap();
        let ctx_b = RenderContext::new(
            std::mem::take(&mut scene),
            camera_b,
            RenderSettings::default(),
            AovTable::new(),
            Region::new(0, 0, 64, 64),
        )
        .unwrap();
        assert_ne!(ctx_a.scene_hash(), ctx_b.scene_hash());
    }
}
