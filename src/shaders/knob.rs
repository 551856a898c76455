// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use glam::Vec4;

/// Typed input/output knobs (§3 "Material / shader graph"). A `Value` is
/// always stored as up to four floats; `KnobType` records how many of them
/// are meaningful and is used for both literal parsing and the
/// `connectInput` assignability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize, serde::Deserialize)]
pub enum KnobType {
    String,
    Int,
    Float,
    Double,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Colour3,
    Colour4,
    PixelRef,
    Pointer,
}

impl KnobType {
    pub fn arity(&self) -> usize {
        match self {
            KnobType::String | KnobType::Int | KnobType::Float | KnobType::Double => 1,
            KnobType::Vec2 => 2,
            KnobType::Vec3 | KnobType::Colour3 => 3,
            KnobType::Vec4 | KnobType::Colour4 | KnobType::Mat4 | KnobType::PixelRef
            | KnobType::Pointer => 4,
        }
    }

    /// `connectInput` succeeds iff the output knob's type is assignable to
    /// the input's (§4.3 "Connection rules"). We allow same-type
    /// connections and colour<->vec widening of equal arity; anything else
    /// is rejected.
    pub fn assignable_from(&self, other: KnobType) -> bool {
        if *self == other {
            return true;
        }
        matches!(
            (self, other),
            (KnobType::Vec3, KnobType::Colour3)
                | (KnobType::Colour3, KnobType::Vec3)
                | (KnobType::Vec4, KnobType::Colour4)
                | (KnobType::Colour4, KnobType::Vec4)
                | (KnobType::Float, KnobType::Int)
                | (KnobType::Double, KnobType::Float)
        )
    }
}

#[derive(Debug, Clone)]
pub struct KnobDef {
    pub name: &'static str,
    pub knob_type: KnobType,
}

pub type Value = Vec4;

/// Parses a constant literal: `"1"`, `"0.5 0.5 0.5"`, `"1 1 1 1"` (§4.3).
pub fn parse_literal(knob_type: KnobType, literal: &str) -> Option<Value> {
    let parts: Vec<f32> = literal
        .split_whitespace()
        .map(str::parse::<f32>)
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }
    let mut components = [0f32; 4];
    // Scalars broadcast to fill every component the type cares about
    // (matches the teacher convention of constant colours written as a
    // single shared channel value, e.g. `Material::diffuse_colour`
    // defaulting to `Vec3::ONE`).
    if parts.len() == 1 && knob_type.arity() > 1 {
        components = [parts[0]; 4];
    } else {
        for (i, v) in parts.iter().enumerate().take(4) {
            components[i] = *v;
        }
    }
    Some(Value::from_array(components))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_literal() {
        assert_eq!(parse_literal(KnobType::Float, "1").unwrap().x, 1.);
    }

    #[test]
    fn parses_vec3_literal() {
        let v = parse_literal(KnobType::Colour3, "0.5 0.5 0.5").unwrap();
        assert_eq!(v.truncate(), glam::Vec3::splat(0.5));
    }

    #[test]
    fn parses_vec4_literal() {
        let v = parse_literal(KnobType::Colour4, "1 1 1 1").unwrap();
        assert_eq!(v, Value::ONE);
    }

    #[test]
    fn rejects_malformed_literal() {
        assert!(parse_literal(KnobType::Float, "not a number").is_none());
    }
}
