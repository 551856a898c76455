// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Scene, object contexts, and lazy dicing (§3, §4.5). Object/surface/
//! primitive/shader state lives in flat arenas keyed by stable handles
//! (`slotmap`), per the §9 redesign note replacing cyclic pointers between
//! `ObjectContext`, `SurfaceContext`, `MaterialContext`, and
//! `RenderPrimitive`.

mod dicing;
mod object;
mod primitive;
mod surface;

pub use dicing::DicingStatus;
pub use object::{DicedData, ObjectContext, ObjectMotionSample};
pub use primitive::{PrimitiveHit, RenderPrimitive};
pub use surface::{SidesMode, SurfaceContext};

use slotmap::new_key_type;

new_key_type! {
    pub struct ObjectId;
    pub struct SurfaceId;
    pub struct MaterialId;
    pub struct LightId;
}

use std::sync::Arc;

use crate::bvh::Bvh;
use crate::external::Dicer;
use crate::materials::Material;

/// The host-supplied scene: objects (not yet diced), lights, and the
/// materials they reference. §3 "Object context", §6 "Scene input".
pub struct Scene {
    pub objects: slotmap::SlotMap<ObjectId, ObjectContext>,
    pub materials: slotmap::SlotMap<MaterialId, Material>,
    /// `Arc`, not `Box`: each worker's `ThreadContext` clones this list
    /// cheaply rather than sharing `&Scene` lights directly (§3 "Thread
    /// context ... a cloned lighting scene").
    pub lights: Vec<Arc<dyn crate::external::LightSource>>,
    /// The object BVH (§4.2), built once at validate time over the world
    /// AABBs of every object's motion samples.
    object_bvh: Option<Bvh<ObjectBvhLeaf>>,
    /// Per-object dicing policy, supplied by the host alongside the object
    /// itself. Absent for objects that will never need dicing (already
    /// diced by the host, or light-volume placeholders with no geometry).
    dicers: slotmap::SecondaryMap<ObjectId, Arc<dyn Dicer>>,
}

/// A BVH leaf pointing at one object context; dicing is triggered lazily
/// the first time a ray reaches this leaf (see `scene::dicing`).
#[derive(Clone, Copy)]
pub struct ObjectBvhLeaf {
    pub object: ObjectId,
    pub bounds: crate::math::Aabb,
}

impl crate::bvh::BvhItem for ObjectBvhLeaf {
    type Hit = ObjectId;

    fn aabb(&self) -> crate::math::Aabb {
        self.bounds
    }

    fn intersect(&self, ray: &crate::math::Ray) -> Option<(f32, ObjectId)> {
        // The object BVH only prunes by AABB; the real intersection
        // happens one level down in the object's primitive BVH, driven by
        // `RenderContext::trace`, which is why this always "hits" at the
        // box's near distance when the box is hit at all. It exists purely
        // so `Bvh<ObjectBvhLeaf>` can share the generic traversal code.
        ray.is_finite()
            .then(|| self.bounds.intersect_ray(ray, glam::Vec3::ZERO))
            .flatten()
            .map(|(t0, _)| (t0.max(ray.mindist), self.object))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            objects: slotmap::SlotMap::with_key(),
            materials: slotmap::SlotMap::with_key(),
            lights: Vec::new(),
            object_bvh: None,
            dicers: slotmap::SecondaryMap::new(),
        }
    }
}

impl Scene {
    pub fn add_object(&mut self, object: ObjectContext) -> ObjectId {
        self.objects.insert(object)
    }

    pub fn add_object_with_dicer(&mut self, object: ObjectContext, dicer: Arc<dyn Dicer>) -> ObjectId {
        let id = self.objects.insert(object);
        self.dicers.insert(id, dicer);
        id
    }

    pub fn dicer(&self, object: ObjectId) -> Option<Arc<dyn Dicer>> {
        self.dicers.get(object).cloned()
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    /// Builds the object BVH from the current set of objects' world AABBs.
    /// Called once at validate time (§4.2); re-buildable if the scene
    /// changes between renders.
    pub fn build_object_bvh(&mut self) {
        let leaves = self.object_bvh_leaves();
        self.object_bvh = Some(Bvh::build(&leaves));
    }

    pub fn object_bvh(&self) -> Option<&Bvh<ObjectBvhLeaf>> {
        self.object_bvh.as_ref()
    }

    pub fn object_bvh_leaves(&self) -> Vec<ObjectBvhLeaf> {
        self.objects
            .iter()
            .map(|(id, object)| ObjectBvhLeaf {
                object: id,
                bounds: object.world_aabb,
            })
            .collect()
    }
}
