// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Analytic volume and mass estimation for parametric prims
//!
//! The native engine only knows boxes, spheres and triangle meshes, so the
//! mass of a prim is estimated before any geometry exists. The estimate
//! starts from the bounding box and applies:
//!
//! 1. a cross-section factor per profile/path combination,
//! 2. a hollow factor per hollow/profile combination,
//! 3. the symmetric trapezoid taper factor
//!    `t1x*t1y + 0.5*(t1x*ty + tx*t1y) + tx*ty/3`,
//! 4. the swept fractions of path and profile.
//!
//! The multipliers are empirical and must be kept bit-for-bit; they are
//! not approximations of a closed form.
//!
//! # Example
//!
//! ```
//! use glam::DVec3;
//! use prim_physics::shape::{ShapeDescriptor, VolumeMassCalculator};
//!
//! let volume = VolumeMassCalculator::compute_volume(&ShapeDescriptor::cube(), DVec3::ONE);
//! assert_eq!(volume, 1.0);
//! ```

use super::{HollowShape, PathCurve, ProfileShape, ShapeDescriptor, SCALE_QUANTA};
use crate::mass::MassProperties;
use glam::DVec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Smallest volume ever reported
pub const MIN_VOLUME: f64 = 1.0e-6;

const QUARTER_PI: f64 = 0.78539816339;
const TORUS_CIRCLE: f64 = 0.61685027506808491367715568749226e-2;
const TUBE_SQUARE: f64 = 0.78539816339e-2;
const SPHERE: f64 = 0.5236;
const EQUILATERAL_TRIANGLE: f64 = 0.32475953;
const TRIANGLE_TO_EQUILATERAL: f64 = 3.07920140172638;

/// Pure volume and mass estimator
pub struct VolumeMassCalculator;

impl VolumeMassCalculator {
    /// Estimate the solid volume of `shape` scaled to `size`
    ///
    /// Always returns at least [`MIN_VOLUME`], and never increases as the
    /// hollow amount grows with everything else fixed.
    pub fn compute_volume(shape: &ShapeDescriptor, size: DVec3) -> f64 {
        let mut volume = size.x * size.y * size.z;
        let hollow_amount = shape.hollow_amount();
        let mut hollow_volume = hollow_amount * hollow_amount;

        match (shape.profile_shape, shape.path_curve) {
            (ProfileShape::Square, PathCurve::Straight) => {
                if hollow_amount > 0.0 {
                    hollow_volume *= square_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::Square, PathCurve::Curve1) => {
                volume *= TUBE_SQUARE * (200.0 - shape.path_scale_x as f64);
                let t = hole_term(shape.path_scale_y);
                volume -= volume * t * t;
                if hollow_amount > 0.0 {
                    hollow_volume *= hollow_amount;
                    hollow_volume *= square_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::Circle, PathCurve::Straight) => {
                volume *= QUARTER_PI;
                if hollow_amount > 0.0 {
                    hollow_volume *= circle_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::Circle, PathCurve::Curve1) => {
                volume *= TORUS_CIRCLE * (200.0 - shape.path_scale_x as f64);
                let t = hole_term(shape.path_scale_y);
                volume *= 1.0 - t * t;
                if hollow_amount > 0.0 {
                    hollow_volume *= hollow_amount;
                    hollow_volume *= circle_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::HalfCircle, PathCurve::Curve1) => {
                volume *= SPHERE;
                if hollow_amount > 0.0 {
                    hollow_volume *= hollow_amount;
                    if shape.hollow_shape == HollowShape::Square {
                        hollow_volume *= 0.909;
                    }
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::EquilateralTriangle, PathCurve::Straight) => {
                volume *= EQUILATERAL_TRIANGLE;
                if hollow_amount > 0.0 {
                    hollow_volume *= triangle_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            (ProfileShape::EquilateralTriangle, PathCurve::Curve1) => {
                volume *= EQUILATERAL_TRIANGLE;
                volume *= 0.01 * (200.0 - shape.path_scale_x as f64);
                let t = hole_term(shape.path_scale_y);
                volume *= 1.0 - t * t;
                if hollow_amount > 0.0 {
                    hollow_volume *= hollow_amount;
                    hollow_volume *= triangle_hollow_factor(shape.hollow_shape);
                    volume *= hollow_factor(hollow_volume);
                }
            }
            _ => {}
        }

        let (taper_x, taper_x1) = taper_pair(shape, shape.path_scale_x, shape.path_taper_x);
        let (taper_y, taper_y1) = taper_pair(shape, shape.path_scale_y, shape.path_taper_y);
        volume *= taper_x1 * taper_y1
            + 0.5 * (taper_x1 * taper_y + taper_x * taper_y1)
            + 0.3333333333 * taper_x * taper_y;

        volume *= shape.path_end_fraction() - shape.path_begin_fraction();
        volume *= shape.profile_end_fraction() - shape.profile_begin_fraction();

        if volume.is_finite() {
            volume.max(MIN_VOLUME)
        } else {
            MIN_VOLUME
        }
    }

    /// Convert a volume into a mass clamped to `[min_mass, max_mass]`
    pub fn mass_from_volume(density: f64, volume: f64, min_mass: f64, max_mass: f64) -> f64 {
        let mass = density * volume;
        if !(mass > 0.0) {
            min_mass
        } else if mass > max_mass {
            max_mass
        } else {
            mass.max(min_mass)
        }
    }

    /// Own-frame mass properties of a prim
    ///
    /// An unmodified sphere is a solid ball of diameter `size.x`. Anything
    /// else is treated as a solid box of `oob_size`. Either way the result
    /// is centred on `oob_offset` in the prim's local frame.
    pub fn own_mass_properties(
        mass: f64,
        shape: &ShapeDescriptor,
        size: DVec3,
        oob_size: DVec3,
        oob_offset: DVec3,
    ) -> MassProperties {
        let mut props = if shape.is_sphere(size) {
            MassProperties::sphere_total(mass, size.x * 0.5)
        } else {
            MassProperties::box_total(mass, oob_size)
        };
        props.translate(oob_offset);
        props
    }

    /// Estimate many volumes at once
    ///
    /// Runs on the rayon pool when the `parallel` feature is enabled.
    pub fn compute_volumes(items: &[(&ShapeDescriptor, DVec3)]) -> Vec<f64> {
        #[cfg(feature = "parallel")]
        {
            items
                .par_iter()
                .map(|(shape, size)| Self::compute_volume(shape, *size))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            items
                .iter()
                .map(|(shape, size)| Self::compute_volume(shape, *size))
                .collect()
        }
    }
}

fn hollow_factor(hollow_volume: f64) -> f64 {
    (1.0 - hollow_volume).max(0.0)
}

fn hole_term(path_scale_y: u8) -> f64 {
    1.0 - 0.02 * (200.0 - path_scale_y as f64)
}

fn square_hollow_factor(hollow: HollowShape) -> f64 {
    match hollow {
        HollowShape::Same | HollowShape::Square => 1.0,
        HollowShape::Circle => QUARTER_PI,
        HollowShape::Triangle => 0.5 * 0.5,
    }
}

fn circle_hollow_factor(hollow: HollowShape) -> f64 {
    match hollow {
        HollowShape::Same | HollowShape::Circle => 1.0,
        HollowShape::Square => 0.5 * 2.5984480504799,
        HollowShape::Triangle => 0.5 * 1.27323954473516,
    }
}

fn triangle_hollow_factor(hollow: HollowShape) -> f64 {
    match hollow {
        HollowShape::Same | HollowShape::Triangle => 0.25,
        HollowShape::Square => 0.499849 * TRIANGLE_TO_EQUILATERAL,
        HollowShape::Circle => 0.1963495 * TRIANGLE_TO_EQUILATERAL,
    }
}

/// Returns `(taper, 1 - taper)` for one axis
fn taper_pair(shape: &ShapeDescriptor, scale: u8, taper: i8) -> (f64, f64) {
    match shape.path_curve {
        PathCurve::Straight | PathCurve::Flexible => {
            let mut t1 = scale as f64 * SCALE_QUANTA;
            if t1 > 1.0 {
                t1 = 2.0 - t1;
            }
            (1.0 - t1, t1)
        }
        _ => {
            let t = (taper as f64 * SCALE_QUANTA).abs();
            (t, 1.0 - t)
        }
    }
}
