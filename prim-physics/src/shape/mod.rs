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
//! Parametric prim shapes
//!
//! A prim is a 2D profile (square, circle, triangle, ...) optionally
//! hollowed, swept along a path (straight extrusion or a circular sweep).
//! The path can be tapered, scaled and cut. Parameters are kept in the
//! quantized integer encoding used on the wire, so the empirical volume
//! constants in [`volume`] apply to exactly the same inputs.
//!
//! | field | scale | meaning |
//! |---|---|---|
//! | `profile_hollow` | ×2e-5 | hollow amount, 0..1 |
//! | `path_begin`, `profile_begin` | ×2e-5 | cut from the start |
//! | `path_end`, `profile_end` | ×2e-5 | cut from the end (`1 - v`) |
//! | `path_scale_x/y` | ×0.01 | 100 = unscaled; circular paths encode the hole as `200 - v` |
//! | `path_taper_x/y` | ×0.01 | signed taper |

use glam::DVec3;
use serde::{Deserialize, Serialize};

pub mod volume;

pub use volume::VolumeMassCalculator;

/// Quantization step of cut and hollow parameters
pub const CUT_QUANTA: f64 = 2.0e-5;
/// Quantization step of scale, taper and shear parameters
pub const SCALE_QUANTA: f64 = 0.01;
/// Smallest size component a prim is built with
pub const MIN_SIZE: f64 = 0.01;

/// The size a prim is actually built with
///
/// Non-finite sizes fall back to a half-metre cube, then every component
/// is raised to at least [`MIN_SIZE`]. Volume, mass and geometry are all
/// derived from this value.
pub fn sanitize_size(size: DVec3) -> DVec3 {
    let size = if size.is_finite() {
        size
    } else {
        DVec3::splat(0.5)
    };
    size.max(DVec3::splat(MIN_SIZE))
}

/// Cross-section of the swept solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileShape {
    /// Circle or ellipse
    Circle,
    /// Square or rectangle
    Square,
    /// Isosceles triangle
    IsometricTriangle,
    /// Equilateral triangle
    EquilateralTriangle,
    /// Right triangle
    RightTriangle,
    /// Half circle, sphere when swept around a circle
    HalfCircle,
}

/// Shape of the hole cut out of the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HollowShape {
    /// Same as the profile
    Same,
    /// Circular hole
    Circle,
    /// Square hole
    Square,
    /// Triangular hole
    Triangle,
}

/// Path the profile is swept along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathCurve {
    /// Linear extrusion
    Straight,
    /// Circular sweep (torus, tube, ring, sphere)
    Curve1,
    /// Second circular sweep variant
    Curve2,
    /// Flexible path, treated as straight for mass purposes
    Flexible,
}

/// How the engine should represent a prim that is not a plain primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhysicsShapeType {
    /// Exact shape (primitive or triangle mesh)
    #[default]
    Primitive,
    /// Convex hull of the shape
    ConvexHull,
    /// No collision shape requested
    None,
}

/// Reference to an externally defined sculpt or mesh asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SculptReference {
    /// Asset identifier handed to the mesher
    pub asset_id: u64,
    /// True for a mesh asset, false for a sculpt map
    pub is_mesh: bool,
}

/// Full parametric description of a prim's solid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescriptor {
    /// Cross-section
    pub profile_shape: ProfileShape,
    /// Hole shape
    pub hollow_shape: HollowShape,
    /// Quantized hollow amount
    pub profile_hollow: u16,
    /// Sweep path
    pub path_curve: PathCurve,
    /// Quantized path cut start
    pub path_begin: u16,
    /// Quantized path cut from the end
    pub path_end: u16,
    /// Quantized profile cut start
    pub profile_begin: u16,
    /// Quantized profile cut from the end
    pub profile_end: u16,
    /// Path scale X (100 = 1.0)
    pub path_scale_x: u8,
    /// Path scale Y (100 = 1.0)
    pub path_scale_y: u8,
    /// Path taper X (signed percent)
    pub path_taper_x: i8,
    /// Path taper Y (signed percent)
    pub path_taper_y: i8,
    /// Path shear X
    pub path_shear_x: i8,
    /// Path shear Y
    pub path_shear_y: i8,
    /// Twist at the end of the path
    pub path_twist: i8,
    /// Twist at the start of the path
    pub path_twist_begin: i8,
    /// Sculpt or mesh asset, if any
    pub sculpt: Option<SculptReference>,
    /// Requested physics representation
    pub shape_type: PhysicsShapeType,
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self::cube()
    }
}

impl ShapeDescriptor {
    /// Plain box: square profile extruded straight
    pub fn cube() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::Square,
            hollow_shape: HollowShape::Same,
            profile_hollow: 0,
            path_curve: PathCurve::Straight,
            path_begin: 0,
            path_end: 0,
            profile_begin: 0,
            profile_end: 0,
            path_scale_x: 100,
            path_scale_y: 100,
            path_taper_x: 0,
            path_taper_y: 0,
            path_shear_x: 0,
            path_shear_y: 0,
            path_twist: 0,
            path_twist_begin: 0,
            sculpt: None,
            shape_type: PhysicsShapeType::Primitive,
        }
    }

    /// Cylinder: circle profile extruded straight
    pub fn cylinder() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::Circle,
            ..Self::cube()
        }
    }

    /// Sphere: half circle swept around a circle
    pub fn sphere() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::HalfCircle,
            path_curve: PathCurve::Curve1,
            ..Self::cube()
        }
    }

    /// Triangular prism
    pub fn prism() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::EquilateralTriangle,
            ..Self::cube()
        }
    }

    /// Torus: circle swept around a circle
    pub fn torus() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::Circle,
            path_curve: PathCurve::Curve1,
            path_scale_y: 175,
            ..Self::cube()
        }
    }

    /// Tube: square swept around a circle
    pub fn tube() -> Self {
        ShapeDescriptor {
            profile_shape: ProfileShape::Square,
            path_curve: PathCurve::Curve1,
            path_scale_y: 175,
            ..Self::cube()
        }
    }

    /// Set the hollow shape and quantized amount
    pub fn with_hollow(mut self, shape: HollowShape, amount: u16) -> Self {
        self.hollow_shape = shape;
        self.profile_hollow = amount;
        self
    }

    /// Set the quantized path cut
    pub fn with_path_cut(mut self, begin: u16, end: u16) -> Self {
        self.path_begin = begin;
        self.path_end = end;
        self
    }

    /// Set the quantized profile cut
    pub fn with_profile_cut(mut self, begin: u16, end: u16) -> Self {
        self.profile_begin = begin;
        self.profile_end = end;
        self
    }

    /// Set the path scale
    pub fn with_path_scale(mut self, x: u8, y: u8) -> Self {
        self.path_scale_x = x;
        self.path_scale_y = y;
        self
    }

    /// Set the path taper
    pub fn with_path_taper(mut self, x: i8, y: i8) -> Self {
        self.path_taper_x = x;
        self.path_taper_y = y;
        self
    }

    /// Attach a sculpt or mesh asset
    pub fn with_sculpt(mut self, sculpt: SculptReference) -> Self {
        self.sculpt = Some(sculpt);
        self
    }

    /// Set the requested physics representation
    pub fn with_shape_type(mut self, shape_type: PhysicsShapeType) -> Self {
        self.shape_type = shape_type;
        self
    }

    /// Hollow amount in 0..1
    pub fn hollow_amount(&self) -> f64 {
        self.profile_hollow as f64 * CUT_QUANTA
    }

    /// Fraction of the path where the sweep starts
    pub fn path_begin_fraction(&self) -> f64 {
        self.path_begin as f64 * CUT_QUANTA
    }

    /// Fraction of the path where the sweep ends
    pub fn path_end_fraction(&self) -> f64 {
        1.0 - self.path_end as f64 * CUT_QUANTA
    }

    /// Fraction of the profile where the cross-section starts
    pub fn profile_begin_fraction(&self) -> f64 {
        self.profile_begin as f64 * CUT_QUANTA
    }

    /// Fraction of the profile where the cross-section ends
    pub fn profile_end_fraction(&self) -> f64 {
        1.0 - self.profile_end as f64 * CUT_QUANTA
    }

    fn is_uncut(&self) -> bool {
        self.path_begin == 0
            && self.path_end == 0
            && self.profile_begin == 0
            && self.profile_end == 0
    }

    /// True for an unmodified box that the engine can represent directly
    pub fn is_box(&self) -> bool {
        self.sculpt.is_none()
            && self.profile_shape == ProfileShape::Square
            && self.path_curve == PathCurve::Straight
            && self.profile_hollow == 0
            && self.is_uncut()
            && self.path_scale_x == 100
            && self.path_scale_y == 100
            && self.path_taper_x == 0
            && self.path_taper_y == 0
            && self.path_shear_x == 0
            && self.path_shear_y == 0
            && self.path_twist == 0
            && self.path_twist_begin == 0
    }

    /// True when the shape plus `size` is a sphere
    ///
    /// Only the profile and path are checked for the fallback geometry,
    /// so a cut or hollow sphere that failed to mesh still falls back to a
    /// sphere.
    pub fn is_sphere_like(&self, size: DVec3) -> bool {
        self.profile_shape == ProfileShape::HalfCircle
            && self.path_curve == PathCurve::Curve1
            && size.x == size.y
            && size.y == size.z
    }

    /// True for an unmodified sphere that the engine can represent directly
    pub fn is_sphere(&self, size: DVec3) -> bool {
        self.sculpt.is_none()
            && self.is_sphere_like(size)
            && self.profile_hollow == 0
            && self.is_uncut()
            && self.path_scale_x == 100
            && self.path_scale_y == 100
            && self.path_taper_x == 0
            && self.path_taper_y == 0
            && self.path_twist == 0
            && self.path_twist_begin == 0
    }

    /// Whether this shape has to go through the mesher
    pub fn needs_meshing(&self, size: DVec3) -> bool {
        if self.sculpt.is_some() {
            return true;
        }
        if self.shape_type != PhysicsShapeType::Primitive {
            return true;
        }
        !(self.is_box() || self.is_sphere(size))
    }
}
