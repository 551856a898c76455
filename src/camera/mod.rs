// Copyright (c) 2024, Owen Bulka
// All rights reserved.
// This source code is licensed under the BSD-style license found in the
// LICENSE file in the root directory of this source tree.

//! Camera and ray construction (§4.1). A camera carries one sample per
//! shutter time; the render context interpolates between the two samples
//! bracketing a requested shutter fraction.

use glam::{Mat4, Vec3};

use crate::error::{RenderError, RenderResult};
use crate::math::{Ray, RayDifferential, RayType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, serde::Serialize, serde::Deserialize)]
pub enum Projection {
    Perspective,
    Spherical,
    Cylindrical,
}

/// A single shutter-time snapshot of the camera, generalizing the teacher's
/// `Camera` (`geometry/camera.rs`) from a single fixed exposure to one of a
/// list interpolated over the shutter.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CameraSample {
    pub time: f32,
    pub projection: Projection,
    pub focal_length: f32,
    pub film_width: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub focus_distance: f32,
    pub f_stop: f32,
    pub window_translate: (f32, f32),
    pub window_scale: (f32, f32),
    pub window_roll: f32,
    pub filmback_shift: (f32, f32),
    pub world_matrix: Mat4,
}

impl Default for CameraSample {
    fn default() -> Self {
        Self {
            time: 0.,
            projection: Projection::Perspective,
            focal_length: 50.,
            film_width: 24.576,
            near_plane: 0.1,
            far_plane: 10000.,
            focus_distance: 2.,
            f_stop: 16.,
            window_translate: (0., 0.),
            window_scale: (1., 1.),
            window_roll: 0.,
            filmback_shift: (0., 0.),
            world_matrix: Mat4::IDENTITY,
        }
    }
}

impl CameraSample {
    /// Validates `near_plane < far_plane`, per §4.1's `NearExceedsFar`.
    /// Rather than reject the sample outright the render proceeds with
    /// `max = min + eps`, as the spec directs.
    pub fn validated(mut self) -> Self {
        if self.near_plane >= self.far_plane {
            log::warn!(
                "camera sample: near_plane ({}) >= far_plane ({}), clamping",
                self.near_plane,
                self.far_plane
            );
            self.far_plane = self.near_plane + f32::EPSILON.max(1e-6);
        }
        self
    }

    /// Pixel (x, y) in `[0, width) x [0, height)` to NDC in `[-1, 1]^2`,
    /// accounting for image and pixel aspect per step 1 of §4.1.
    fn pixel_to_ndc(
        &self,
        x: f32,
        y: f32,
        image_width: f32,
        image_height: f32,
        pixel_aspect: f32,
    ) -> (f32, f32) {
        let image_aspect = (image_width * pixel_aspect) / image_height;
        let ndc_x = (2. * (x + 0.5) / image_width - 1.) * image_aspect;
        let ndc_y = 2. * (y + 0.5) / image_height - 1.;

        let (roll_sin, roll_cos) = self.window_roll.sin_cos();
        let rolled_x = ndc_x * roll_cos - ndc_y * roll_sin;
        let rolled_y = ndc_x * roll_sin + ndc_y * roll_cos;

        (
            rolled_x * self.window_scale.0 + self.window_translate.0,
            rolled_y * self.window_scale.1 + self.window_translate.1,
        )
    }

    /// Step 2 of §4.1: NDC to a camera-space direction, via the selected
    /// projection.
    fn ndc_to_local_direction(&self, ndc_x: f32, ndc_y: f32) -> RenderResult<Vec3> {
        match self.projection {
            Projection::Perspective => {
                let lens_scale = self.film_width / (2. * self.focal_length);
                Ok(Vec3::new(ndc_x * lens_scale, ndc_y * lens_scale, -1.))
            }
            Projection::Spherical => {
                // theta in [0, pi] top-to-bottom, phi in a full 2*pi sweep
                // phase-shifted so that screen-window centre (0, 0) looks
                // down +Z, matching S2.
                let theta = (1. - ndc_y) * 0.5 * std::f32::consts::PI;
                let phi = (ndc_x + 0.5) * std::f32::consts::PI;
                let (sin_t, cos_t) = theta.sin_cos();
                let (sin_p, cos_p) = phi.sin_cos();
                Ok(Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p))
            }
            Projection::Cylindrical => {
                let phi = (ndc_x + 0.5) * std::f32::consts::PI;
                let (sin_p, cos_p) = phi.sin_cos();
                Ok(Vec3::new(sin_p, ndc_y, cos_p))
            }
        }
    }

    pub fn direction_for_pixel(
        &self,
        x: f32,
        y: f32,
        image_width: f32,
        image_height: f32,
        pixel_aspect: f32,
    ) -> RenderResult<Vec3> {
        let (ndc_x, ndc_y) = self.pixel_to_ndc(x, y, image_width, image_height, pixel_aspect);
        let local = self.ndc_to_local_direction(ndc_x, ndc_y)?;
        Ok(self.world_matrix.transform_vector3(local).normalize_or_zero())
    }

    fn origin(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }
}

/// A camera with one sample per shutter time. §4.1.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Camera {
    samples: Vec<CameraSample>,
}

impl Camera {
    /// Samples must be supplied in ascending `time` order; at least one is
    /// required (a non-blurred camera carries exactly one).
    pub fn new(mut samples: Vec<CameraSample>) -> RenderResult<Self> {
        if samples.is_empty() {
            return Err(RenderError::Configuration(
                "camera requires at least one shutter sample".into(),
            ));
        }
        samples.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
        let samples = samples.into_iter().map(CameraSample::validated).collect();
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[CameraSample] {
        &self.samples
    }

    /// Locate the bracketing pair of samples for shutter fraction `t` and
    /// the local interpolant within that bracket, by binary search per the
    /// §9 redesign note generalizing two-sample interpolation to an ordered
    /// list.
    fn bracket(&self, t: f32) -> (usize, usize, f32) {
        if self.samples.len() == 1 || t <= self.samples[0].time {
            return (0, 0, 0.);
        }
        let last = self.samples.len() - 1;
        if t >= self.samples[last].time {
            return (last, last, 0.);
        }
        let mut lo = 0;
        let mut hi = last;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.samples[mid].time <= t {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let span = self.samples[hi].time - self.samples[lo].time;
        let local_t = if span.abs() < 1e-8 {
            0.
        } else {
            (t - self.samples[lo].time) / span
        };
        (lo, hi, local_t)
    }

    /// Construct a ray at image pixel `(x, y)` with shutter fraction
    /// `t in [0, 1]`, optionally with ray differentials. §4.1.
    pub fn construct_ray(
        &self,
        x: f32,
        y: f32,
        t: f32,
        image_width: f32,
        image_height: f32,
        pixel_aspect: f32,
        with_differentials: bool,
    ) -> RenderResult<(Ray, Option<RayDifferential>)> {
        let (lo, hi, local_t) = self.bracket(t);
        let origin;
        let direction;
        if lo == hi || local_t <= 0. {
            let s = &self.samples[lo];
            origin = s.origin();
            direction = s.direction_for_pixel(x, y, image_width, image_height, pixel_aspect)?;
        } else if local_t >= 1. {
            let s = &self.samples[hi];
            origin = s.origin();
            direction = s.direction_for_pixel(x, y, image_width, image_height, pixel_aspect)?;
        } else {
            let a = &self.samples[lo];
            let b = &self.samples[hi];
            let o0 = a.origin();
            let o1 = b.origin();
            origin = o0.lerp(o1, local_t);
            let d0 = a.direction_for_pixel(x, y, image_width, image_height, pixel_aspect)?;
            let d1 = b.direction_for_pixel(x, y, image_width, image_height, pixel_aspect)?;
            direction = d0.lerp(d1, local_t).normalize_or_zero();
        }

        let ray = Ray::new(origin, direction, t, RayType::Camera);

        let differential = if with_differentials {
            let sample = &self.samples[if local_t >= 1. { hi } else { lo }];
            let dx_dir = sample.direction_for_pixel(
                x + 1.,
                y,
                image_width,
                image_height,
                pixel_aspect,
            )?;
            let dy_dir = sample.direction_for_pixel(
                x,
                y + 1.,
                image_width,
                image_height,
                pixel_aspect,
            )?;
            Some(RayDifferential {
                dx_direction: sample.world_matrix.transform_vector3(dx_dir) - direction,
                dy_direction: sample.world_matrix.transform_vector3(dy_dir) - direction,
            })
        } else {
            None
        };

        Ok((ray, differential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S1: perspective single-pixel camera ray.
    #[test]
    fn s1_perspective_single_pixel() {
        let sample = CameraSample {
            focal_length: 50.,
            film_width: 50.,
            world_matrix: Mat4::IDENTITY,
            ..Default::default()
        };
        let camera = Camera::new(vec![sample]).unwrap();
        let (ray, _) = camera
            .construct_ray(0., 0., 0., 2., 2., 1., false)
            .unwrap();
        let expected = Vec3::new(-0.25, -0.25, -1.).normalize();
        assert!((ray.direction - expected).length() < 1e-4);
    }

    // S2: full-sphere spherical projection.
    #[test]
    fn s2_spherical_center() {
        let sample = CameraSample {
            projection: Projection::Spherical,
            world_matrix: Mat4::IDENTITY,
            ..Default::default()
        };
        let camera = Camera::new(vec![sample]).unwrap();
        let (ray, _) = camera.construct_ray(0., 0., 0., 1., 1., 1., false).unwrap();
        assert!((ray.direction - Vec3::new(0., 0., 1.)).length() < 1e-3);
    }

    #[test]
    fn near_exceeds_far_is_clamped_not_rejected() {
        let sample = CameraSample {
            near_plane: 10.,
            far_plane: 1.,
            ..Default::default()
        };
        let validated = sample.validated();
        assert!(validated.far_plane > validated.near_plane);
    }

    #[test]
    fn shutter_fraction_endpoints_use_single_sample() {
        let a = CameraSample {
            time: 0.,
            world_matrix: Mat4::from_translation(Vec3::ZERO),
            ..Default::default()
        };
        let b = CameraSample {
            time: 1.,
            world_matrix: Mat4::from_translation(Vec3::new(10., 0., 0.)),
            ..Default::default()
        };
        let camera = Camera::new(vec![a, b]).unwrap();
        let (ray0, _) = camera.construct_ray(0., 0., 0., 2., 2., 1., false).unwrap();
        let (ray1, _) = camera.construct_ray(0., 0., 1., 2., 2., 1., false).unwrap();
        assert!(ray0.origin.distance(Vec3::ZERO) < 1e-5);
        assert!(ray1.origin.distance(Vec3::new(10., 0., 0.)) < 1e-5);
    }

    #[test]
    fn ray_differential_converges_with_image_width() {
        let sample = CameraSample {
            world_matrix: Mat4::IDENTITY,
            ..Default::default()
        };
        let camera = Camera::new(vec![sample]).unwrap();
        let (ray0, _) = camera.construct_ray(50., 50., 0., 400., 400., 1., false).unwrap();
        let (ray1, _) = camera.construct_ray(51., 50., 0., 400., 400., 1., false).unwrap();
        let (_, diff) = camera
            .construct_ray(50., 50., 0., 400., 400., 1., true)
            .unwrap();
        let finite_diff = (ray1.direction - ray0.direction).length();
        let analytic = diff.unwrap().dx_direction.length();
        assert!((finite_diff - analytic).abs() < 1e-3);
    }
}
