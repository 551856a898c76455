// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use super::{MaterialId, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SidesMode {
    FrontOnly,
    BackOnly,
    Both,
}

/// A shading-unit view of part of an object: which sub-primitives it
/// covers and the resolved material to shade them with. §3 "Surface
/// context".
#[derive(Debug, Clone)]
pub struct SurfaceContext {
    pub object: ObjectId,
    pub primitive_range: std::ops::Range<u32>,
    pub material: MaterialId,
    pub displacement_bounds: f32,
    pub sides: SidesMode,
}
