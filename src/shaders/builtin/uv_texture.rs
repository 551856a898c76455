// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::shaders::context::ShaderContext;
use crate::shaders::graph::Shader;
use crate::shaders::knob::{KnobDef, KnobType, Value};

/// Samples the bound image at `stx.UV - uv_tile_offset` (the image binding
/// itself lives on input 0, resolved generically by `ShaderGraph` via
/// `InputBinding::Texture`, which already performs the EWA filtering of
/// §4.4 using the current UV derivatives). This shader only applies the
/// scale/bias knobs on top of the resolved sample (§4.3 "UV texture").
static INPUTS: [KnobDef; 3] = [
    KnobDef { name: "image", knob_type: KnobType::PixelRef },
    KnobDef { name: "scale", knob_type: KnobType::Colour4 },
    KnobDef { name: "bias", knob_type: KnobType::Colour4 },
];
static OUTPUTS: [KnobDef; 1] = [KnobDef { name: "out", knob_type: KnobType::Colour4 }];

pub struct UvTexture;

impl Shader for UvTexture {
    fn class_name(&self) -> &'static str {
        "uv_texture"
    }

    fn input_defs(&self) -> &'static [KnobDef] {
        &INPUTS
    }

    fn output_defs(&self) -> &'static [KnobDef] {
        &OUTPUTS
    }

    fn evaluate_surface(&self, inputs: &[Value], _stx: &ShaderContext) -> Option<Value> {
        let sample = inputs[0];
        let scale = inputs[1];
        let bias = inputs[2];
        Some(sample * scale + bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, RayType};
    use glam::Vec3;

    #[test]
    fn applies_scale_and_bias_to_resolved_sample() {
        let shader = UvTexture;
        let stx = ShaderContext::root(Ray::new(Vec3::ZERO, Vec3::NEG_Z, 0., RayType::Camera), 0., 0., 0);
        let out = shader
            .evaluate_surface(&[Value::new(1., 0., 0., 1.), Value::splat(2.), Value::splat(0.1)], &stx)
            .unwrap();
        assert_eq!(out, Value::new(2.1, 0.1, 0.1, 2.1));
    }
}
