// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! The fixed attribute-handler table of §4.3: each handler reads fields
//! straight out of `ShaderContext` into a 4-float output. The same table
//! backs both `InputBinding::Attribute` and AOV layer handlers (§3 "AOV
//! layer") since both are "read this stx field into some channels".

use glam::Vec4;

use super::context::ShaderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AttributeHandler {
    /// World-space shading point.
    Pw,
    DpwDx,
    DpwDy,
    /// Local-space (object-space) shading point.
    Pl,
    /// Geometric-normal-perturbed world point (no displacement modelled
    /// here, so identical to `Pw`).
    Pwg,
    /// View vector (toward the camera).
    V,
    /// Camera-space depth along the ray.
    Z,
    /// Shading normal.
    N,
    /// Shading normal, face-forward.
    Nf,
    /// Geometric normal.
    Ng,
    /// Geometric normal, face-forward.
    Ngf,
    /// Shading normal (alias kept distinct from `N` for source fidelity
    /// with the original attribute-token table).
    Ns,
    DnsDx,
    DnsDy,
    St,
    DstDx,
    DstDy,
    Uv,
    DuvDx,
    DuvDy,
    Cf,
    DcfDx,
    DcfDy,
    /// Ray parametric distance from its origin to the shading point.
    T,
    Time,
    DtDx,
    DtDy,
    VDotN,
    VDotNg,
    VDotNf,
    NoisePw,
    RandomPw,
    NoiseUv,
    /// Unknown attribute name: writes zero (§6 "AOV naming").
    Null,
}

impl AttributeHandler {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "pw" => Self::Pw,
            "dpwdx" => Self::DpwDx,
            "dpwdy" => Self::DpwDy,
            "pl" => Self::Pl,
            "pwg" => Self::Pwg,
            "v" => Self::V,
            "z" => Self::Z,
            "n" => Self::N,
            "nf" => Self::Nf,
            "ng" => Self::Ng,
            "ngf" => Self::Ngf,
            "ns" => Self::Ns,
            "dnsdx" => Self::DnsDx,
            "dnsdy" => Self::DnsDy,
            "st" => Self::St,
            "dstdx" => Self::DstDx,
            "dstdy" => Self::DstDy,
            "uv" => Self::Uv,
            "duvdx" => Self::DuvDx,
            "duvdy" => Self::DuvDy,
            "cf" => Self::Cf,
            "dcfdx" => Self::DcfDx,
            "dcfdy" => Self::DcfDy,
            "t" => Self::T,
            "time" => Self::Time,
            "dtdx" => Self::DtDx,
            "dtdy" => Self::DtDy,
            "vdotn" => Self::VDotN,
            "vdotng" => Self::VDotNg,
            "vdotnf" => Self::VDotNf,
            "noisepw" => Self::NoisePw,
            "randompw" => Self::RandomPw,
            "noiseuv" => Self::NoiseUv,
            _ => return None,
        })
    }

    /// Deterministic hash-based pseudo-noise: a pure function of its input
    /// and the context's seed, never mutating shared state, so repeated
    /// evaluation with identical `stx` always agrees (§8 property 4).
    fn hash_noise(seed: u64, v: Vec4) -> f32 {
        let bits = v.x.to_bits() as u64
            ^ (v.y.to_bits() as u64).rotate_left(16)
            ^ (v.z.to_bits() as u64).rotate_left(32)
            ^ (v.w.to_bits() as u64).rotate_left(48)
            ^ seed;
        let mut x = bits;
        x ^= x >> 33;
        x = x.wrapping_mul(0xff51afd7ed558ccd);
        x ^= x >> 33;
        x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
        x ^= x >> 33;
        (x >> 11) as f32 / (1u64 << 53) as f32
    }

    pub fn evaluate(&self, stx: &ShaderContext) -> Vec4 {
        let isect = &stx.intersection;
        match self {
            Self::Pw => isect.point.extend(0.),
            Self::DpwDx => isect.dpdx.extend(0.),
            Self::DpwDy => isect.dpdy.extend(0.),
            Self::Pl => isect.local_point.extend(0.),
            Self::Pwg => isect.point.extend(0.),
            Self::V => stx.view_vector().extend(0.),
            Self::Z => Vec4::splat((isect.point - stx.ray.origin).dot(stx.ray.direction)),
            Self::N => isect.shading_normal.extend(0.),
            Self::Nf => isect.shading_normal_faceforward.extend(0.),
            Self::Ng => isect.geometric_normal.extend(0.),
            Self::Ngf => isect.geometric_normal_faceforward.extend(0.),
            Self::Ns => isect.shading_normal.extend(0.),
            Self::DnsDx | Self::DnsDy => Vec4::ZERO,
            Self::St => isect.st.extend(0.).extend(0.),
            Self::DstDx | Self::DstDy => Vec4::ZERO,
            Self::Uv => isect.uv.extend(0.).extend(0.),
            Self::DuvDx => isect.duvdx.extend(0.).extend(0.),
            Self::DuvDy => isect.duvdy.extend(0.).extend(0.),
            Self::Cf => isect.vertex_colour,
            Self::DcfDx => isect.dcfdx,
            Self::DcfDy => isect.dcfdy,
            Self::T => Vec4::splat((isect.point - stx.ray.origin).length()),
            Self::Time => Vec4::splat(stx.ray.time),
            Self::DtDx | Self::DtDy => Vec4::ZERO,
            Self::VDotN => Vec4::splat(stx.view_vector().dot(isect.shading_normal)),
            Self::VDotNg => Vec4::splat(stx.view_vector().dot(isect.geometric_normal)),
            Self::VDotNf => Vec4::splat(stx.view_vector().dot(isect.shading_normal_faceforward)),
            Self::NoisePw => Vec4::splat(Self::hash_noise(stx.seed, isect.point.extend(0.))),
            Self::RandomPw => Vec4::splat(Self::hash_noise(stx.seed ^ 0xA5A5_A5A5, isect.point.extend(0.))),
            Self::NoiseUv => Vec4::splat(Self::hash_noise(stx.seed, isect.uv.extend(0.).extend(0.))),
            Self::Null => Vec4::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Ray, RayType};
    use glam::Vec3;

    #[test]
    fn from_name_is_case_insensitive() {
        assert_eq!(AttributeHandler::from_name("PW"), Some(AttributeHandler::Pw));
        assert_eq!(AttributeHandler::from_name("NoiseUV"), Some(AttributeHandler::NoiseUv));
    }

    #[test]
    fn unknown_name_returns_none() {
        assert_eq!(AttributeHandler::from_name("bogus"), None);
    }

    #[test]
    fn evaluation_is_deterministic_for_identical_context() {
        let stx = ShaderContext::root(
            Ray::new(Vec3::new(0., 0., 5.), Vec3::NEG_Z, 0., RayType::Camera),
            0.,
            0.,
            7,
        );
        let a = AttributeHandler::NoisePw.evaluate(&stx);
        let b = AttributeHandler::NoisePw.evaluate(&stx);
        assert_eq!(a, b);
    }
}
