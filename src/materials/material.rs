// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::channels::{Channel, ChannelSet};
use crate::error::RenderResult;
use crate::scene::SidesMode;
use crate::shaders::{ShaderContext, ShaderGraph, ShaderId, Value};

/// The triple `(surface-output, displacement-output, volume-output)` plus
/// the transitive closure of reachable shaders (§3 "Material / shader
/// graph"). Each output is an entry point into the same `ShaderGraph`; the
/// graph itself holds every node any of the three outputs can reach.
pub struct Material {
    pub graph: ShaderGraph,
    pub surface_output: Option<ShaderId>,
    pub displacement_output: Option<ShaderId>,
    pub volume_output: Option<ShaderId>,
    pub displacement_bounds: f32,
    pub sides: SidesMode,
}

impl Material {
    pub fn new() -> Self {
        Self {
            graph: ShaderGraph::new(),
            surface_output: None,
            displacement_output: None,
            volume_output: None,
            displacement_bounds: 0.,
            sides: SidesMode::Both,
        }
    }

    /// Validates whichever of the three outputs are set. Idempotent per
    /// output (§3 invariant: "A shader is either valid or invalid...
    /// Validation is idempotent").
    pub fn validate(&mut self, frame_time: f32, local_to_world: Mat4) -> RenderResult<()> {
        for output in [self.surface_output, self.displacement_output, self.volume_output]
            .into_iter()
            .flatten()
        {
            self.graph.validate(output, frame_time, local_to_world)?;
        }
        Ok(())
    }

    /// Channel sets output by this material: the union of channels output
    /// by all shaders reachable from its outputs (§3 invariant).
    pub fn channel_set(&self) -> ChannelSet {
        let mut set = ChannelSet::new();
        for output in [self.surface_output, self.displacement_output, self.volume_output]
            .into_iter()
            .flatten()
        {
            if let Some(node) = self.graph.get(output) {
                set = set.union(&node.output_channels);
            }
        }
        set
    }

    /// `evaluateSurface(stx, out_pixel)`: fills RGBA plus any extra channels
    /// the surface output writes directly (e.g. cutout).
    pub fn evaluate_surface(&self, stx: &ShaderContext) -> Option<(Value, Vec<(Channel, f32)>)> {
        let output = self.surface_output?;
        let mut cache = FxHashMap::default();
        let pixel = self.graph.evaluate_surface_cached(output, stx, &mut cache)?;
        let extra = self.graph.evaluate_extra(output, stx);
        Some((pixel, extra))
    }

    /// `evaluateDisplacement(stx, out_pixel)`: a perturbed `(position,
    /// normal)` pair.
    pub fn evaluate_displacement(&self, stx: &ShaderContext) -> Option<(Vec3, Vec3)> {
        self.graph.evaluate_displacement(self.displacement_output?, stx)
    }

    pub fn has_volume(&self) -> bool {
        self.volume_output.is_some()
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, RayType};
    use crate::shaders::builtin::{Cutout, UvTexture};
    use glam::Vec4;

    #[test]
    fn material_without_surface_output_evaluates_to_none() {
        let material = Material::new();
        let stx = ShaderContext::root(Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera), 0., 0., 0);
        assert!(material.evaluate_surface(&stx).is_none());
    }

    #[test]
    fn channel_set_is_empty_before_validation() {
        let mut material = Material::new();
        let uv = material.graph.add(Box::new(UvTexture));
        material.surface_output = Some(uv);
        assert!(material.channel_set().is_empty());
        material.validate(0., Mat4::IDENTITY).unwrap();
        assert!(!material.channel_set().is_empty());
    }

    #[test]
    fn surface_evaluation_reports_cutout_extra_channel() {
        let mut material = Material::new();
        let uv = material.graph.add(Box::new(UvTexture));
        material.graph.set_input_value(uv, 1, "1 1 1 1").unwrap();
        material.graph.set_input_value(uv, 2, "0 0 0 0").unwrap();
        let cutout = material.graph.add(Box::new(Cutout));
        material.graph.connect_input(cutout, 0, uv, 0).unwrap();
        material.surface_output = Some(cutout);
        material.validate(0., Mat4::IDENTITY).unwrap();

        let stx = ShaderContext::root(Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera), 0., 0., 0);
        let (pixel, extra) = material.evaluate_surface(&stx).unwrap();
        assert_eq!(pixel, Vec4::new(0., 0., 0., 0.));
        assert_eq!(extra, vec![(Channel::Cutout, 1.0)]);
    }
}
