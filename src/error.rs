// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Errors surfaced at the library boundary.
///
/// `Configuration` is always surfaced to the host and aborts the render.
/// The remaining variants are recorded (typically via `log::warn!`) and
/// recovered locally by the call site: `Resource` falls back to a sampler's
/// fallback colour, `Topology` demotes an object to a single motion sample,
/// `Cancelled` unwinds the current traversal, and `Numerical` causes the
/// offending ray to be skipped.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resource error: {0}")]
    Resource(String),

    #[error("topology error: {0}")]
    Topology(String),

    #[error("render cancelled")]
    Cancelled,

    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type RenderResult<T> = Result<T, RenderError>;
