// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The shader graph runtime (§4.3): typed knobs, input bindings, shader
//! instances, and the built-in shader classes.

pub mod attributes;
pub mod binding;
pub mod builtin;
pub mod context;
pub mod graph;
pub mod knob;

pub use attributes::AttributeHandler;
pub use binding::InputBinding;
pub use context::{Intersection, ShaderContext};
pub use graph::{Shader, ShaderGraph, ShaderId, ShaderInstance};
pub use knob::{parse_literal, KnobDef, KnobType, Value};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// A registered shader-class constructor (§6 "registered shader-class
/// descriptors"). Kept as a process-wide table, the one piece of global
/// mutable state the spec explicitly calls for; everything else routes
/// through an explicit `ShaderGraph`.
type ShaderBuilder = fn() -> Box<dyn Shader>;

static REGISTRY: Mutex<Option<FxHashMap<&'static str, ShaderBuilder>>> = Mutex::new(None);

pub fn register_shader_class(name: &'static str, builder: ShaderBuilder) {
    let mut registry = REGISTRY.lock();
    registry.get_or_insert_with(FxHashMap::default).insert(name, builder);
}

/// Looks up a registered class and constructs a fresh instance. Returns
/// `None` for an unknown class name (`ConfigurationError` at the call
/// site, §7).
pub fn build_registered(name: &str) -> Option<Box<dyn Shader>> {
    let registry = REGISTRY.lock();
    registry.as_ref()?.get(name).map(|builder| builder())
}

/// Registers the built-in shader classes. Idempotent; safe to call more
/// than once (e.g. once per host session).
pub fn register_builtins() {
    register_shader_class("uv_texture", || Box::new(builtin::UvTexture));
    register_shader_class("cutout", || Box::new(builtin::Cutout));
    register_shader_class("read_texture", || {
        Box::new(crate::shaders::builtin_read_texture_default())
    });
}

// `ReadTexture` has no zero-argument constructor that means anything (it
// needs a path), so the registry entry above hands back an empty-path
// instance; callers always override `path` via `setInputValue`-equivalent
// host code before validating.
pub(crate) fn builtin_read_texture_default() -> builtin::ReadTexture {
    builtin::ReadTexture::new(String::new())
}
