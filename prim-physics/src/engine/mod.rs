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
//! Native engine capability
//!
//! The bridge never talks to a physics library directly. Everything it
//! needs is expressed by [`PhysicsEngine`]: geometry, rigid bodies,
//! constraints and a fixed-step `step` call. An adapter per native library
//! implements the trait; [`SandboxEngine`] is a small pure-Rust
//! implementation used for tests and headless runs.
//!
//! # Handles
//!
//! Engines hand out raw handles ([`RawBody`], [`RawGeometry`],
//! [`RawConstraint`]). The bridge pairs them with the stable [`BodyId`] of
//! the owning body in [`BodyHandle`] and [`ShapeHandle`] so constraints and
//! contacts can be traced back to bodies without asking the engine.
//!
//! # Version compatibility
//!
//! Engines report the capability version they implement. The scene refuses
//! engines whose version is incompatible with [`ENGINE_API_VERSION`]; the
//! rule is the usual semver one, with 0.x minors treated as breaking.

use crate::body::CollisionCategories;
use crate::error::{PhysicsError, PhysicsResult};
use crate::id::BodyId;
use crate::mass::MassProperties;
use crate::shape::ShapeDescriptor;
use glam::{DQuat, DVec3};
use semver::Version;
use std::fmt;
use std::sync::Arc;

pub mod sandbox;

pub use sandbox::SandboxEngine;

/// Version of the engine capability this crate drives
pub const ENGINE_API_VERSION: &str = "0.2.0";

/// Engine-issued rigid body handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawBody(pub u64);

/// Engine-issued geometry handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawGeometry(pub u64);

/// Engine-issued constraint (joint) handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawConstraint(pub u64);

/// Native rigid body paired with the id of the body that owns it
///
/// Two handles are equal when both the id and the native handle match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    id: BodyId,
    raw: RawBody,
}

impl BodyHandle {
    /// Pair a native body with its owner
    pub fn new(id: BodyId, raw: RawBody) -> Self {
        BodyHandle { id, raw }
    }

    /// Owning body id
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Native handle
    pub fn raw(&self) -> RawBody {
        self.raw
    }
}

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.raw.0)
    }
}

/// Native geometry paired with the id of the body that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle {
    id: BodyId,
    raw: RawGeometry,
}

impl ShapeHandle {
    /// Pair a native geometry with its owner
    pub fn new(id: BodyId, raw: RawGeometry) -> Self {
        ShapeHandle { id, raw }
    }

    /// Owning body id
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Native handle
    pub fn raw(&self) -> RawGeometry {
        self.raw
    }
}

/// Triangle mesh produced by a [`Mesher`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    /// Vertex positions in the prim's local frame
    pub vertices: Vec<DVec3>,
    /// Triangle indices, three per face
    pub indices: Vec<u32>,
    /// Centroid of the solid
    pub centroid: DVec3,
}

impl Mesh {
    /// True when there is nothing to build a geometry from
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }
}

/// Shape handed to [`PhysicsEngine::create_geometry`]
#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySpec {
    /// Sphere of the given radius
    Sphere {
        /// Radius
        radius: f64,
    },
    /// Box with full extents `size`
    Box {
        /// Full extents
        size: DVec3,
    },
    /// Triangle mesh
    TriMesh(Arc<Mesh>),
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: DVec3,
    /// Maximum corner
    pub max: DVec3,
}

impl Aabb {
    /// Box spanning `min` to `max`
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Aabb { min, max }
    }

    /// Full extents
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Centre point
    pub fn center(&self) -> DVec3 {
        (self.max + self.min) * 0.5
    }

    /// True if the boxes overlap
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Snapshot of a native body's kinematic state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Position of the body frame (centre of mass)
    pub position: DVec3,
    /// Orientation of the body frame
    pub orientation: DQuat,
    /// Linear velocity
    pub linear_velocity: DVec3,
    /// Angular velocity
    pub angular_velocity: DVec3,
}

/// One contact reported by [`PhysicsEngine::step`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Geometry that was hit
    pub geometry: RawGeometry,
    /// The other geometry, `None` for terrain
    pub other: Option<RawGeometry>,
    /// World contact point
    pub position: DVec3,
    /// Contact normal pointing away from `other`
    pub normal: DVec3,
    /// Penetration depth
    pub depth: f64,
}

/// What a step changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Bodies whose state was integrated
    pub updated: Vec<RawBody>,
    /// Contacts found after integration
    pub contacts: Vec<Contact>,
    /// Sub-steps actually taken
    pub substeps: u32,
}

/// Joint types understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Rigid weld
    Fixed,
    /// Ball and socket
    PointToPoint,
    /// Single rotational axis
    Hinge,
    /// Single translational axis
    Slider,
    /// Cone with twist limits
    ConeTwist,
    /// Six degrees of freedom with per-axis limits
    Generic6Dof,
}

/// Attachment frame of a constraint, relative to a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Offset from the body origin
    pub position: DVec3,
    /// Rotation relative to the body
    pub orientation: DQuat,
}

impl Frame {
    /// Frame at `position` with no rotation
    pub fn at(position: DVec3) -> Self {
        Frame {
            position,
            orientation: DQuat::IDENTITY,
        }
    }

    /// True if every component is finite
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.orientation.is_finite()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::at(DVec3::ZERO)
    }
}

/// Which limit set [`PhysicsEngine::set_constraint_limits`] targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Translational limits
    Linear,
    /// Rotational limits
    Angular,
}

/// Tunable constraint parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintParam {
    /// Error reduction
    Erp,
    /// Error reduction at the limits
    StopErp,
    /// Constraint force mixing
    Cfm,
    /// Constraint force mixing at the limits
    StopCfm,
}

/// Axis a [`ConstraintParam`] applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintAxis {
    /// Linear X
    LinearX,
    /// Linear Y
    LinearY,
    /// Linear Z
    LinearZ,
    /// Angular X
    AngularX,
    /// Angular Y
    AngularY,
    /// Angular Z
    AngularZ,
    /// All linear axes
    LinearAll,
    /// All angular axes
    AngularAll,
    /// Every axis
    All,
}

/// Per-axis rotation freedom; `true` means the axis may rotate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AxisLock {
    /// Rotation about X is free
    pub x: bool,
    /// Rotation about Y is free
    pub y: bool,
    /// Rotation about Z is free
    pub z: bool,
}

impl AxisLock {
    /// Every axis free
    pub const FREE: AxisLock = AxisLock {
        x: true,
        y: true,
        z: true,
    };

    /// Every axis locked
    pub const LOCKED: AxisLock = AxisLock {
        x: false,
        y: false,
        z: false,
    };

    /// Build from the scripting convention: 1.0 is free, 0.0 is locked
    pub fn from_vector(v: DVec3) -> Self {
        AxisLock {
            x: v.x != 0.0,
            y: v.y != 0.0,
            z: v.z != 0.0,
        }
    }

    /// True if no axis is locked
    pub fn is_free(&self) -> bool {
        self.x && self.y && self.z
    }

    /// Number of locked axes
    pub fn locked_count(&self) -> usize {
        [self.x, self.y, self.z].iter().filter(|free| !**free).count()
    }
}

impl Default for AxisLock {
    fn default() -> Self {
        AxisLock::FREE
    }
}

/// Turns a parametric shape into a triangle mesh
pub trait Mesher {
    /// Tessellate `shape` at `size`
    ///
    /// `Ok(None)` means the mesher has nothing for this shape; the body then
    /// falls back to a sphere or box. `Err` carries a reason for the log.
    fn create_mesh(
        &self,
        shape: &ShapeDescriptor,
        size: DVec3,
        level_of_detail: u32,
        physical: bool,
        convex: bool,
    ) -> Result<Option<Mesh>, String>;
}

/// Mesher that never produces a mesh
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMesher;

impl Mesher for NullMesher {
    fn create_mesh(
        &self,
        _shape: &ShapeDescriptor,
        _size: DVec3,
        _level_of_detail: u32,
        _physical: bool,
        _convex: bool,
    ) -> Result<Option<Mesh>, String> {
        Ok(None)
    }
}

/// The native physics library, seen through the operations the bridge needs
///
/// Creation calls return `None` when the library fails to allocate. All
/// other calls on a stale handle are ignored by conforming engines.
pub trait PhysicsEngine {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Capability version this engine implements
    fn api_version(&self) -> &str {
        ENGINE_API_VERSION
    }

    /// Create a static geometry at the origin
    fn create_geometry(&mut self, spec: &GeometrySpec) -> Option<RawGeometry>;
    /// Release a geometry
    fn destroy_geometry(&mut self, geometry: RawGeometry);
    /// Place a geometry that is not attached to a body
    fn set_geometry_pose(&mut self, geometry: RawGeometry, position: DVec3, orientation: DQuat);
    /// Bounding box of a geometry in its own frame
    fn geometry_aabb(&self, geometry: RawGeometry) -> Option<Aabb>;
    /// Set what a geometry is and what it collides with
    fn set_collision_bits(
        &mut self,
        geometry: RawGeometry,
        categories: CollisionCategories,
        mask: CollisionCategories,
    );
    /// Attach a geometry to a body at an offset in the body frame
    fn attach_geometry(
        &mut self,
        geometry: RawGeometry,
        body: RawBody,
        offset_position: DVec3,
        offset_orientation: DQuat,
    );
    /// Detach a geometry, leaving it static at its current world pose
    fn detach_geometry(&mut self, geometry: RawGeometry);

    /// Create a rigid body; `mass` must be centred on the origin
    fn create_body(
        &mut self,
        mass: &MassProperties,
        position: DVec3,
        orientation: DQuat,
    ) -> Option<RawBody>;
    /// Release a body; attached geometries become static
    fn destroy_body(&mut self, body: RawBody);
    /// Enable or disable simulation of a body
    fn set_body_enabled(&mut self, body: RawBody, enabled: bool);
    /// Whether a body is currently simulated
    fn is_body_enabled(&self, body: RawBody) -> bool;
    /// Let the engine put a body to sleep after `steps` quiet steps
    fn set_auto_disable(&mut self, body: RawBody, steps: Option<u32>);
    /// Linear and angular damping
    fn set_damping(&mut self, body: RawBody, linear: f64, angular: f64);
    /// Teleport a body
    fn set_position(&mut self, body: RawBody, position: DVec3);
    /// Rotate a body
    fn set_orientation(&mut self, body: RawBody, orientation: DQuat);
    /// Set linear velocity
    fn set_linear_velocity(&mut self, body: RawBody, velocity: DVec3);
    /// Set angular velocity
    fn set_angular_velocity(&mut self, body: RawBody, velocity: DVec3);
    /// Read back a body's state
    fn body_state(&self, body: RawBody) -> Option<BodyState>;
    /// Add a force for the next step
    fn apply_force(&mut self, body: RawBody, force: DVec3);
    /// Add a torque for the next step
    fn apply_torque(&mut self, body: RawBody, torque: DVec3);
    /// Change momentum immediately
    fn apply_impulse(&mut self, body: RawBody, impulse: DVec3);
    /// Drop pending forces and torques
    fn clear_forces(&mut self, body: RawBody);

    /// Advance the world by `dt` using at most `max_substeps` sub-steps
    fn step(&mut self, dt: f64, max_substeps: u32) -> StepReport;

    /// Join two bodies
    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        body_a: RawBody,
        body_b: RawBody,
        frame_a: Frame,
        frame_b: Frame,
    ) -> Option<RawConstraint>;
    /// Lock rotation of a single body on the locked axes of `lock`
    fn create_angular_motor(
        &mut self,
        body: RawBody,
        lock: AxisLock,
        orientation: DQuat,
    ) -> Option<RawConstraint>;
    /// Set linear or angular limits; false if unsupported for the joint
    fn set_constraint_limits(
        &mut self,
        constraint: RawConstraint,
        kind: LimitKind,
        low: DVec3,
        high: DVec3,
    ) -> bool;
    /// Set a tuning parameter; false if unsupported for the joint
    fn set_constraint_param(
        &mut self,
        constraint: RawConstraint,
        param: ConstraintParam,
        value: f64,
        axis: ConstraintAxis,
    ) -> bool;
    /// Recompute a joint's frames after its bodies moved
    fn calculate_constraint_transforms(&mut self, constraint: RawConstraint) -> bool;
    /// Release a joint
    fn destroy_constraint(&mut self, constraint: RawConstraint);
}

/// Check whether an engine at `engine_version` can serve a crate requiring `required`
///
/// Major versions must match. For 0.x versions the minor must match too;
/// otherwise the engine's minor must be at least the required minor.
pub fn is_version_compatible(engine_version: &str, required: &str) -> bool {
    let engine = match Version::parse(engine_version) {
        Ok(v) => v,
        Err(_) => return false,
    };
    let required = match Version::parse(required) {
        Ok(v) => v,
        Err(_) => return false,
    };

    if engine.major != required.major {
        return false;
    }

    if required.major != 0 {
        required.minor <= engine.minor
    } else {
        required.minor == engine.minor
    }
}

/// Reject engines this crate cannot drive
pub fn check_engine_version<E: PhysicsEngine + ?Sized>(engine: &E) -> PhysicsResult<()> {
    if is_version_compatible(engine.api_version(), ENGINE_API_VERSION) {
        Ok(())
    } else {
        Err(PhysicsError::IncompatibleEngine {
            engine: engine.api_version().to_string(),
            required: ENGINE_API_VERSION.to_string(),
        })
    }
}
