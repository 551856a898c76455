// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::channels::Channel;
use crate::shaders::context::ShaderContext;
use crate::shaders::graph::Shader;
use crate::shaders::knob::{KnobDef, KnobType, Value};

/// Passes its input through, but resets RGB to zero and marks the
/// designated cutout channel (§4.3 "Cutout", §8 property 8).
static INPUTS: [KnobDef; 1] = [KnobDef { name: "in", knob_type: KnobType::Colour4 }];
static OUTPUTS: [KnobDef; 1] = [KnobDef { name: "out", knob_type: KnobType::Colour4 }];

pub struct Cutout;

impl Shader for Cutout {
    fn class_name(&self) -> &'static str {
        "cutout"
    }

    fn input_defs(&self) -> &'static [KnobDef] {
        &INPUTS
    }

    fn output_defs(&self) -> &'static [KnobDef] {
        &OUTPUTS
    }

    fn evaluate_surface(&self, inputs: &[Value], _stx: &ShaderContext) -> Option<Value> {
        Some(Value::new(0., 0., 0., inputs[0].w))
    }

    fn evaluate_extra(&self, _inputs: &[Value], _stx: &ShaderContext) -> Vec<(Channel, f32)> {
        vec![(Channel::Cutout, 1.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, RayType};
    use glam::Vec3;

    // S6: Cutout(UVTexture(constant red)) -> rgb=0, alpha=passthrough, cutout=1.
    #[test]
    fn s6_cutout_chain() {
        let shader = Cutout;
        let stx = ShaderContext::root(Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera), 0., 0., 0);
        let upstream = Value::new(1., 0., 0., 1.);
        let out = shader.evaluate_surface(&[upstream], &stx).unwrap();
        assert_eq!(out, Value::new(0., 0., 0., 1.));
        let extra = shader.evaluate_extra(&[upstream], &stx);
        assert_eq!(extra, vec![(Channel::Cutout, 1.0)]);
    }
}
