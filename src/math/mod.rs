// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

pub mod aabb;
pub mod ray;

pub use aabb::Aabb;
pub use ray::{Ray, RayDifferential, RayType};
