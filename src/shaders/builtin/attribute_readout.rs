// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use crate::shaders::attributes::AttributeHandler;
use crate::shaders::context::ShaderContext;
use crate::shaders::graph::Shader;
use crate::shaders::knob::{KnobDef, KnobType, Value};

static INPUTS: [KnobDef; 0] = [];
static OUTPUTS: [KnobDef; 1] = [KnobDef { name: "out", knob_type: KnobType::Colour3 }];

/// Evaluates a single attribute handler into an RGB triplet (§4.3
/// "Attribute readout").
pub struct AttributeReadout {
    pub attribute: AttributeHandler,
}

impl Shader for AttributeReadout {
    fn class_name(&self) -> &'static str {
        "attribute_readout"
    }

    fn input_defs(&self) -> &'static [KnobDef] {
        &INPUTS
    }

    fn output_defs(&self) -> &'static [KnobDef] {
        &OUTPUTS
    }

    fn evaluate_surface(&self, _inputs: &[Value], stx: &ShaderContext) -> Option<Value> {
        Some(self.attribute.evaluate(stx))
    }
}
