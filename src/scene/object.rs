// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Mat4;
use parking_lot::{RwLock, RwLockReadGuard};

use super::dicing::{DicingEntry, DicingGate, DicingStatus};
use super::{MaterialId, RenderPrimitive, SurfaceContext};
use crate::bvh::Bvh;
use crate::error::{RenderError, RenderResult};
use crate::external::{MotionSample, SceneObjectInput};
use crate::math::Aabb;

/// The product of dicing, behind a lock so `ensure_diced` can coordinate
/// through `&self` (§5: the render context is shared read-only across
/// worker threads; only per-object dicing state is mutable, and that
/// mutation is through interior mutability, never `&mut`).
#[derive(Default)]
pub struct DicedData {
    pub surface_list: Vec<SurfaceContext>,
    pub prim_list: Vec<RenderPrimitive>,
    pub prim_bvh: Option<Bvh<RenderPrimitive>>,
}

/// One motion sample of an object, resolved to the object's own coordinate
/// space: a transform and a frame time. §3 "motion samples (pairs of
/// (scene, object-index))".
#[derive(Debug, Clone, Copy)]
pub struct ObjectMotionSample {
    pub time: f32,
    pub world_matrix: Mat4,
    pub topology_ref: u64,
}

impl From<&MotionSample> for ObjectMotionSample {
    fn from(sample: &MotionSample) -> Self {
        Self {
            time: sample.time,
            world_matrix: sample.world_matrix,
            topology_ref: sample.topology_ref,
        }
    }
}

/// Either a geometry object or a light-volume object; §3 "Object context".
pub struct ObjectContext {
    pub motion_samples: Vec<ObjectMotionSample>,
    pub material: MaterialId,
    pub world_aabb: Aabb,
    pub is_light_volume: bool,

    dicing_gate: DicingGate,
    diced: RwLock<DicedData>,
}

impl ObjectContext {
    pub fn from_input(input: &dyn SceneObjectInput, material: MaterialId) -> RenderResult<Self> {
        let samples = input.motion_samples();
        if samples.is_empty() {
            return Err(RenderError::Configuration(
                "object has no motion samples".into(),
            ));
        }

        let topology = samples[0].topology_ref;
        let motion_samples: Vec<ObjectMotionSample> = samples.iter().map(Into::into).collect();

        // TopologyError (§7): demote a motion-blurred object whose samples
        // disagree on topology to a single, non-blurred sample rather than
        // aborting the render.
        let consistent = motion_samples.iter().all(|s| s.topology_ref == topology);
        let motion_samples = if consistent {
            motion_samples
        } else {
            log::warn!("object motion samples have inconsistent topology, demoting to 1 sample");
            vec![motion_samples[0]]
        };

        let world_aabb = input
            .screen_space_aabb_hint()
            .unwrap_or(Aabb::EMPTY)
            .transform(motion_samples[0].world_matrix);
        let world_aabb = motion_samples
            .iter()
            .skip(1)
            .fold(world_aabb, |acc, sample| {
                acc.union(
                    &input
                        .screen_space_aabb_hint()
                        .unwrap_or(Aabb::EMPTY)
                        .transform(sample.world_matrix),
                )
            });

        Ok(Self {
            motion_samples,
            material,
            world_aabb,
            is_light_volume: false,
            dicing_gate: DicingGate::default(),
            diced: RwLock::new(DicedData::default()),
        })
    }

    pub fn is_blurred(&self) -> bool {
        self.motion_samples.len() > 1
    }

    pub fn dicing_status(&self) -> DicingStatus {
        self.dicing_gate.status()
    }

    /// A read lock on the diced surface/primitive lists and primitive BVH.
    /// Empty (lists empty, BVH `None`) until `ensure_diced` has succeeded
    /// at least once.
    pub fn diced(&self) -> RwLockReadGuard<'_, DicedData> {
        self.diced.read()
    }

    /// Ensures this object is diced, invoking `dice` at most once even
    /// under concurrent calls from many threads (§4.5, tested by S4).
    /// `dice` produces the `(SurfaceContext, RenderPrimitive)` lists from
    /// whatever host-side primitive description this object wraps. Takes
    /// `&self`: the dicing gate serializes the one `NotDiced -> Dicing`
    /// transition, and the result is published through the `RwLock` rather
    /// than requiring unique access to the object.
    pub fn ensure_diced<F>(&self, dice: F) -> RenderResult<()>
    where
        F: FnOnce() -> RenderResult<(Vec<SurfaceContext>, Vec<RenderPrimitive>)>,
    {
        match self.dicing_gate.enter() {
            DicingEntry::AlreadyDiced => Ok(()),
            DicingEntry::YouDice => match dice() {
                Ok((surface_list, prim_list)) => {
                    let prim_bvh = Some(Bvh::build(&prim_list));
                    *self.diced.write() = DicedData { surface_list, prim_list, prim_bvh };
                    self.dicing_gate.finish(true);
                    Ok(())
                }
                Err(err) => {
                    log::warn!("dicing failed, object reverted to NotDiced: {err}");
                    self.dicing_gate.finish(false);
                    Err(err)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedInput {
        samples: Vec<MotionSample>,
    }

    impl SceneObjectInput for FixedInput {
        fn motion_samples(&self) -> &[MotionSample] {
            &self.samples
        }

        fn material_handle(&self) -> MaterialId {
            MaterialId::default()
        }

        fn screen_space_aabb_hint(&self) -> Option<Aabb> {
            Some(Aabb::new(glam::Vec3::splat(-1.), glam::Vec3::ONE))
        }
    }

    #[test]
    fn inconsistent_topology_demotes_to_single_sample() {
        let input = FixedInput {
            samples: vec![
                MotionSample {
                    time: 0.,
                    world_matrix: Mat4::IDENTITY,
                    topology_ref: 1,
                },
                MotionSample {
                    time: 1.,
                    world_matrix: Mat4::IDENTITY,
                    topology_ref: 2,
                },
            ],
        };
        let object = ObjectContext::from_input(&input, MaterialId::default()).unwrap();
        assert!(!object.is_blurred());
    }

    #[test]
    fn consistent_topology_keeps_all_samples() {
        let input = FixedInput {
            samples: vec![
                MotionSample {
                    time: 0.,
                    world_matrix: Mat4::IDENTITY,
                    topology_ref: 1,
                },
                MotionSample {
                    time: 1.,
                    world_matrix: Mat4::from_translation(glam::Vec3::X),
                    topology_ref: 1,
                },
            ],
        };
        let object = ObjectContext::from_input(&input, MaterialId::default()).unwrap();
        assert!(object.is_blurred());
    }

    // S4, at the object level: concurrent `ensure_diced` calls through a
    // shared `&ObjectContext` still dice exactly once.
    #[test]
    fn concurrent_ensure_diced_through_shared_reference_dices_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let input = FixedInput {
            samples: vec![MotionSample { time: 0., world_matrix: Mat4::IDENTITY, topology_ref: 1 }],
        };
        let object = Arc::new(ObjectContext::from_input(&input, MaterialId::default()).unwrap());
        let dice_calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let object = object.clone();
                let dice_calls = dice_calls.clone();
                std::thread::spawn(move || {
                    object
                        .ensure_diced(|| {
                            dice_calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(2));
                            Ok((Vec::new(), Vec::new()))
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(dice_calls.load(Ordering::SeqCst), 1);
        assert_eq!(object.dicing_status(), DicingStatus::Diced);
        assert!(object.diced().prim_bvh.is_some());
    }
}
