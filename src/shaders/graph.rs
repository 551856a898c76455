// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The shader graph runtime: typed knobs, instances, and the evaluation
//! entry points (§4.3).

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::channels::ChannelSet;
use crate::error::{RenderError, RenderResult};

use super::binding::{InputBinding, UNUSED_CHANNEL};
use super::context::ShaderContext;
use super::knob::{parse_literal, KnobDef, KnobType, Value};

new_key_type! {
    pub struct ShaderId;
}

/// What a shader class implements. Instances are built by a registered
/// constructor (§6 "registered shader-class descriptors") and hold their
/// static knob tables plus per-instance derived state (file hashes,
/// transforms, ...).
pub trait Shader: Send + Sync {
    fn class_name(&self) -> &'static str;
    fn input_defs(&self) -> &'static [KnobDef];
    fn output_defs(&self) -> &'static [KnobDef];

    /// Fills `out` (RGBA plus any AOV channels the shader owns) from the
    /// resolved `inputs`, one per `input_defs()` entry, in order.
    fn evaluate_surface(&self, _inputs: &[Value], _stx: &ShaderContext) -> Option<Value> {
        None
    }

    /// Returns a perturbed `(position, normal)` pair.
    fn evaluate_displacement(
        &self,
        _inputs: &[Value],
        _stx: &ShaderContext,
    ) -> Option<(Vec3, Vec3)> {
        None
    }

    /// Recomputes any derived state that depends on frame time or the
    /// current transform (e.g. a texture's file hash, a projector's view
    /// matrix). Called once per `validateShader` pass.
    fn update_uniform_locals(&mut self, _frame_time: f32, _local_to_world: Mat4) {}

    /// Channels written outside the primary RGBA output, e.g. the cutout
    /// shader's designated cutout channel (§4.3 "Built-in shaders").
    fn evaluate_extra(
        &self,
        _inputs: &[Value],
        _stx: &ShaderContext,
    ) -> Vec<(crate::channels::Channel, f32)> {
        Vec::new()
    }
}

/// The `Channel` a `channels` array position feeds: position 0 is always
/// the R output slot, 1 is G, and so on (§4.3 "Texture source").
fn rgba_slot(position: usize) -> crate::channels::Channel {
    use crate::channels::Channel;
    match position {
        0 => Channel::Red,
        1 => Channel::Green,
        2 => Channel::Blue,
        _ => Channel::Alpha,
    }
}

/// The channels an output knob of this type actually carries, by arity
/// (§4.3 "Validation"): a colour/vec3 output writes RGB only, a scalar
/// writes just the red slot, and so on, rather than every shader
/// publishing RGBA regardless of what it produces.
fn channels_for_knob_type(knob_type: KnobType) -> ChannelSet {
    use crate::channels::Channel;
    let mut set = ChannelSet::new();
    let arity = knob_type.arity();
    if arity >= 1 {
        set.insert(Channel::Red);
    }
    if arity >= 2 {
        set.insert(Channel::Green);
    }
    if arity >= 3 {
        set.insert(Channel::Blue);
    }
    if arity >= 4 {
        set.insert(Channel::Alpha);
    }
    set
}

/// One node in the graph: a `Shader` impl plus its resolved input bindings
/// and published channel sets.
pub struct ShaderInstance {
    pub shader: Box<dyn Shader>,
    pub bindings: Vec<InputBinding>,
    /// Shaders can be toggled off without disconnecting them, falling back
    /// to a zero output (§4.3 supplement, grounded on
    /// `zprender2.0::RayShader`'s enable mask).
    pub enabled: bool,
    valid: bool,
    pub texture_channels: ChannelSet,
    pub output_channels: ChannelSet,
}

impl ShaderInstance {
    pub fn new(shader: Box<dyn Shader>) -> Self {
        let n = shader.input_defs().len();
        Self {
            bindings: vec![InputBinding::Unbound; n],
            shader,
            enabled: true,
            valid: false,
            texture_channels: ChannelSet::new(),
            output_channels: ChannelSet::new(),
        }
    }
}

/// The transitive closure of shader nodes reachable from a material's
/// outputs, stored in a flat arena keyed by `ShaderId` (§9 redesign note:
/// cyclic pointers between contexts become stable handles).
#[derive(Default)]
pub struct ShaderGraph {
    nodes: SlotMap<ShaderId, ShaderInstance>,
}

impl ShaderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, shader: Box<dyn Shader>) -> ShaderId {
        self.nodes.insert(ShaderInstance::new(shader))
    }

    pub fn get(&self, id: ShaderId) -> Option<&ShaderInstance> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: ShaderId) -> Option<&mut ShaderInstance> {
        self.nodes.get_mut(id)
    }

    /// `setInputValue`: parses a constant literal into the named input.
    pub fn set_input_value(
        &mut self,
        shader: ShaderId,
        input_index: usize,
        literal: &str,
    ) -> RenderResult<()> {
        let node = self
            .nodes
            .get_mut(shader)
            .ok_or_else(|| RenderError::Configuration("unknown shader instance".into()))?;
        let def = node.shader.input_defs().get(input_index).ok_or_else(|| {
            RenderError::Configuration(format!("input index {input_index} out of range"))
        })?;
        let value = parse_literal(def.knob_type, literal)
            .ok_or_else(|| RenderError::Configuration(format!("unparseable literal {literal:?}")))?;
        node.bindings[input_index] = InputBinding::Constant(value);
        node.valid = false;
        Ok(())
    }

    /// `connectInput(input_index, upstream, output_name)`: succeeds iff the
    /// output type is assignable to the input type and no cycle is created.
    pub fn connect_input(
        &mut self,
        shader: ShaderId,
        input_index: usize,
        upstream: ShaderId,
        output_index: usize,
    ) -> RenderResult<()> {
        let input_type = self
            .nodes
            .get(shader)
            .and_then(|n| n.shader.input_defs().get(input_index))
            .ok_or_else(|| RenderError::Configuration("unknown input knob".into()))?
            .knob_type;
        let output_type = self
            .nodes
            .get(upstream)
            .and_then(|n| n.shader.output_defs().get(output_index))
            .ok_or_else(|| RenderError::Configuration("unknown output knob".into()))?
            .knob_type;
        if !input_type.assignable_from(output_type) {
            return Err(RenderError::Configuration(format!(
                "cannot connect {output_type} output to {input_type} input"
            )));
        }
        if self.reaches(upstream, shader) {
            return Err(RenderError::Configuration(
                "connection would create a cycle".into(),
            ));
        }
        let node = self.nodes.get_mut(shader).expect("checked above");
        node.bindings[input_index] = InputBinding::Upstream { shader: upstream, output_index };
        node.valid = false;
        Ok(())
    }

    /// DFS reachability: does `from` transitively depend on `target`?
    fn reaches(&self, from: ShaderId, target: ShaderId) -> bool {
        if from == target {
            return true;
        }
        let Some(node) = self.nodes.get(from) else { return false };
        node.bindings.iter().any(|b| match b {
            InputBinding::Upstream { shader, .. } => self.reaches(*shader, target),
            _ => false,
        })
    }

    /// `validateShader`: depth-first, idempotent. Validates every upstream
    /// first, then recomputes derived state and publishes this node's
    /// channel sets (§4.3 "Validation").
    pub fn validate(&mut self, shader: ShaderId, frame_time: f32, local_to_world: Mat4) -> RenderResult<()> {
        if self.nodes.get(shader).map(|n| n.valid) == Some(true) {
            return Ok(());
        }
        let upstream_ids: Vec<ShaderId> = self
            .nodes
            .get(shader)
            .ok_or_else(|| RenderError::Configuration("unknown shader instance".into()))?
            .bindings
            .iter()
            .filter_map(|b| match b {
                InputBinding::Upstream { shader, .. } => Some(*shader),
                _ => None,
            })
            .collect();
        for upstream in upstream_ids {
            self.validate(upstream, frame_time, local_to_world)?;
        }

        let node = self.nodes.get_mut(shader).expect("checked above");
        node.shader.update_uniform_locals(frame_time, local_to_world);

        let mut texture_channels = ChannelSet::new();
        for binding in &node.bindings {
            if let InputBinding::Texture { channels, .. } = binding {
                for (slot, &source_channel) in channels.iter().enumerate() {
                    if source_channel != UNUSED_CHANNEL {
                        texture_channels.insert(rgba_slot(slot));
                    }
                }
            }
        }
        node.texture_channels = texture_channels;

        let mut output_channels = ChannelSet::new();
        for output in node.shader.output_defs() {
            output_channels = output_channels.union(&channels_for_knob_type(output.knob_type));
        }
        node.output_channels = output_channels;

        node.valid = true;
        Ok(())
    }

    fn resolve_input(
        &self,
        binding: &InputBinding,
        stx: &ShaderContext,
        cache: &mut FxHashMap<ShaderId, Value>,
    ) -> Value {
        match binding {
            InputBinding::Constant(v) => *v,
            InputBinding::Attribute(handler) => handler.evaluate(stx),
            InputBinding::Texture { source, channels, tile_offset, cache: tile_cache, fallback } => {
                let local_uv = glam::Vec2::new(
                    stx.intersection.uv.x - tile_offset.0 as f32,
                    stx.intersection.uv.y - tile_offset.1 as f32,
                );
                match tile_cache.get_or_load(source.as_ref()) {
                    Ok(tile) => {
                        let out = crate::textures::sample_filtered(
                            &tile,
                            local_uv,
                            stx.intersection.duvdx,
                            stx.intersection.duvdy,
                            *channels,
                        );
                        Value::from_array(out)
                    }
                    Err(err) => {
                        log::warn!("texture input fell back to its fallback colour: {err}");
                        *fallback
                    }
                }
            }
            InputBinding::Upstream { shader, output_index: _ } => {
                // Outputs beyond index 0 are not modelled separately: every
                // built-in shader in this crate has a single RGBA output,
                // so "the chosen output-knob index" always resolves to it.
                self.evaluate_surface_cached(*shader, stx, cache).unwrap_or(Value::ZERO)
            }
            InputBinding::LegacyPixelSource(f) => f(stx),
            InputBinding::Unbound => Value::ZERO,
        }
    }

    /// `evaluateSurface(stx, out_pixel)`. Reference-counted shader instances
    /// shared across the graph (diamond dependencies) evaluate once per ray
    /// and are cached in `cache`, keyed by `ShaderId` (§4.3 supplement).
    pub fn evaluate_surface_cached(
        &self,
        shader: ShaderId,
        stx: &ShaderContext,
        cache: &mut FxHashMap<ShaderId, Value>,
    ) -> Option<Value> {
        if let Some(v) = cache.get(&shader) {
            return Some(*v);
        }
        let node = self.nodes.get(shader)?;
        if !node.enabled {
            cache.insert(shader, Value::ZERO);
            return Some(Value::ZERO);
        }
        let inputs: Vec<Value> = node
            .bindings
            .iter()
            .map(|b| self.resolve_input(b, stx, cache))
            .collect();
        let result = node.shader.evaluate_surface(&inputs, stx).unwrap_or(Value::ZERO);
        cache.insert(shader, result);
        Some(result)
    }

    /// Extra (non-RGBA) channels the given shader writes directly, e.g. the
    /// cutout channel. Not cached: intended for the material's top-level
    /// surface output only, evaluated once per ray by the pixel driver.
    pub fn evaluate_extra(&self, shader: ShaderId, stx: &ShaderContext) -> Vec<(crate::channels::Channel, f32)> {
        let Some(node) = self.nodes.get(shader) else { return Vec::new() };
        if !node.enabled {
            return Vec::new();
        }
        let mut cache = FxHashMap::default();
        let inputs: Vec<Value> = node
            .bindings
            .iter()
            .map(|b| self.resolve_input(b, stx, &mut cache))
            .collect();
        node.shader.evaluate_extra(&inputs, stx)
    }

    pub fn evaluate_displacement(
        &self,
        shader: ShaderId,
        stx: &ShaderContext,
    ) -> Option<(Vec3, Vec3)> {
        let node = self.nodes.get(shader)?;
        if !node.enabled {
            return None;
        }
        let mut cache = FxHashMap::default();
        let inputs: Vec<Value> = node
            .bindings
            .iter()
            .map(|b| self.resolve_input(b, stx, &mut cache))
            .collect();
        node.shader.evaluate_displacement(&inputs, stx)
    }
}
