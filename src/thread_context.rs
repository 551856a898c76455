// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Per-worker-thread state (§3 "Thread context", §5): a stack of
//! shader-evaluation frames, scratch vectors sized once up front, and a
//! cloned lighting scene. One of these is built per `rayon` worker by the
//! pixel driver; nothing here is shared across threads.

use std::cell::Cell;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::channels::Channel;
use crate::external::LightSource;
use crate::render_context::RenderContext;
use crate::scene::ObjectId;
use crate::shaders::ShaderContext;
use crate::volume::DeepSample;

/// Maps a pixel's declared output channels to buffer slots, remembering
/// the position of the last successful lookup (an "interest ratchet", §3)
/// so repeated lookups for neighbouring channels don't rescan from zero.
pub struct ChannelRatchet {
    channels: Vec<Channel>,
    last_index: Cell<usize>,
}

impl ChannelRatchet {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self { channels, last_index: Cell::new(0) }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Finds `channel`'s slot, starting the scan at the last hit rather
    /// than index 0.
    pub fn index_of(&self, channel: Channel) -> Option<usize> {
        let len = self.channels.len();
        if len == 0 {
            return None;
        }
        let start = self.last_index.get() % len;
        for offset in 0..len {
            let i = (start + offset) % len;
            if self.channels[i] == channel {
                self.last_index.set(i);
                return Some(i);
            }
        }
        None
    }
}

/// Thread-owned state for walking the shader tree recursively (§3, §5).
/// Scratch vectors reserve capacity for the configured max ray depth up
/// front, matching the §5 "capacities reserved up front to avoid
/// reallocation" requirement.
pub struct ThreadContext<'ctx> {
    pub render: &'ctx RenderContext,
    frame_stack: Vec<ShaderContext>,
    /// The thread's own copy of the scene's lights (§3 "a cloned lighting
    /// scene with per-object light filter lists").
    lights: Vec<Arc<dyn LightSource>>,
    /// Per-object subset of `lights` by index; objects absent from this
    /// map see every light (the common case — unfiltered scenes never pay
    /// for the lookup).
    light_filter: FxHashMap<ObjectId, Vec<usize>>,
    pub deep_samples: Vec<DeepSample>,
    pub channel_ratchet: ChannelRatchet,
}

impl<'ctx> ThreadContext<'ctx> {
    pub fn new(render: &'ctx RenderContext, channels: Vec<Channel>) -> Self {
        let max_depth = render.settings.max_ray_depth.iter().copied().max().unwrap_or(4) as usize;
        Self {
            render,
            frame_stack: Vec::with_capacity(max_depth + 1),
            lights: render.scene.lights.clone(),
            light_filter: FxHashMap::default(),
            deep_samples: Vec::with_capacity(64),
            channel_ratchet: ChannelRatchet::new(channels),
        }
    }

    pub fn set_light_filter(&mut self, object: ObjectId, light_indices: Vec<usize>) {
        self.light_filter.insert(object, light_indices);
    }

    /// Lights visible to `object`: every light, unless a filter was
    /// registered for it.
    pub fn visible_lights(&self, object: ObjectId) -> Vec<&dyn LightSource> {
        match self.light_filter.get(&object) {
            Some(indices) => indices.iter().filter_map(|&i| self.lights.get(i)).map(|l| l.as_ref()).collect(),
            None => self.lights.iter().map(|l| l.as_ref()).collect(),
        }
    }

    /// Pushes a shader-evaluation frame, returning the stack index children
    /// should record as their `parent_frame`. LIFO per §5's "within a
    /// single ray the shader stack is strictly LIFO".
    pub fn push_frame(&mut self, stx: ShaderContext) -> usize {
        self.frame_stack.push(stx);
        self.frame_stack.len() - 1
    }

    pub fn pop_frame(&mut self) {
        self.frame_stack.pop();
    }

    pub fn current_frame(&self) -> Option<&ShaderContext> {
        self.frame_stack.last()
    }

    pub fn frame_depth(&self) -> usize {
        self.frame_stack.len()
    }

    pub fn clear_deep_samples(&mut self) {
        self.deep_samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, CameraSample};
    use crate::channels::AovTable;
    use crate::external::LightType;
    use crate::math::{Ray, RayType};
    use crate::render_context::{Region, RenderSettings};
    use crate::scene::Scene;
    use glam::{Mat4, Vec3};

    struct FixedLight;
    impl LightSource for FixedLight {
        fn light_type(&self) -> LightType {
            LightType::Point
        }
        fn get_l_vector(&self, _p: Vec3, _n: Vec3) -> (Vec3, f32) {
            (Vec3::Y, 1.0)
        }
        fn get_color(&self, _p: Vec3, _n: Vec3, _dir: Vec3, _dist: f32) -> Vec3 {
            Vec3::ONE
        }
        fn get_shadowing(&self, _p: Vec3) -> f32 {
            1.0
        }
    }

    fn context() -> RenderContext {
        let mut scene = Scene::default();
        scene.lights.push(Arc::new(FixedLight));
        scene.lights.push(Arc::new(FixedLight));
        let camera = Camera::new(vec![CameraSample { world_matrix: Mat4::IDENTITY, ..Default::default() }]).unwrap();
        RenderContext::new(scene, camera, RenderSettings::default(), AovTable::new(), Region::new(0, 0, 4, 4)).unwrap()
    }

    #[test]
    fn unfiltered_object_sees_every_light() {
        let render = context();
        let tc = ThreadContext::new(&render, vec![Channel::Red, Channel::Alpha]);
        assert_eq!(tc.visible_lights(ObjectId::default()).len(), 2);
    }

    #[test]
    fn filtered_object_sees_only_its_subset() {
        let render = context();
        let mut tc = ThreadContext::new(&render, vec![Channel::Red]);
        let object = ObjectId::default();
        tc.set_light_filter(object, vec![0]);
        assert_eq!(tc.visible_lights(object).len(), 1);
    }

    #[test]
    fn push_pop_frame_is_lifo() {
        let render = context();
        let mut tc = ThreadContext::new(&render, vec![]);
        let root = ShaderContext::root(Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera), 0., 0., 0);
        let idx0 = tc.push_frame(root);
        let idx1 = tc.push_frame(root.push_child(Ray::new(Vec3::ZERO, Vec3::X, 0., RayType::Reflection), idx0));
        assert_eq!(idx1, 1);
        assert_eq!(tc.frame_depth(), 2);
        tc.pop_frame();
        assert_eq!(tc.frame_depth(), 1);
    }

    #[test]
    fn channel_ratchet_finds_every_channel() {
        let ratchet = ChannelRatchet::new(vec![Channel::Red, Channel::Green, Channel::Blue, Channel::Alpha]);
        assert_eq!(ratchet.index_of(Channel::Blue), Some(2));
        assert_eq!(ratchet.index_of(Channel::Red), Some(0));
        assert_eq!(ratchet.index_of(Channel::Aov(9)), None);
    }
}
