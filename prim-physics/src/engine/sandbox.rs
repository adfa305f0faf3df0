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
//! Pure-Rust reference engine
//!
//! `SandboxEngine` implements [`PhysicsEngine`] well enough to drive the
//! bridge end to end without a native library:
//!
//! - bodies integrate with semi-implicit Euler under the forces and
//!   torques applied since the last step (there is no built-in gravity;
//!   the bridge applies it as a force),
//! - quiet bodies go to sleep after their auto-disable step count,
//! - contacts are overlaps of world AABBs between geometries whose
//!   category and mask bits match, plus an optional flat ground plane,
//! - constraints are recorded with their frames, limits and parameters
//!   but not solved; angular motors do lock the requested axes.
//!
//! # Algorithm
//!
//! ```text
//! v(t + dt) = (v(t) + F/m * dt) * (1 - linear_damping)
//! x(t + dt) = x(t) + v(t + dt) * dt
//! ```
//!
//! Angular motion follows the same scheme using the world-space inverse
//! inertia tensor.

use super::{
    Aabb, AxisLock, BodyState, ConstraintAxis, ConstraintKind, ConstraintParam, Contact, Frame,
    GeometrySpec, LimitKind, PhysicsEngine, RawBody, RawConstraint, RawGeometry, StepReport,
};
use crate::body::{CollisionBits, CollisionCategories};
use crate::mass::MassProperties;
use glam::{DMat3, DQuat, DVec3};
use std::collections::{BTreeMap, HashMap};

/// Speed below which a body counts as quiet for auto-disable
const SLEEP_LINEAR_THRESHOLD: f64 = 0.01;
/// Angular speed below which a body counts as quiet for auto-disable
const SLEEP_ANGULAR_THRESHOLD: f64 = 0.01;

struct Attachment {
    body: RawBody,
    offset_position: DVec3,
    offset_orientation: DQuat,
}

struct SandboxGeometry {
    local: Aabb,
    position: DVec3,
    orientation: DQuat,
    attachment: Option<Attachment>,
    bits: CollisionBits,
}

struct SandboxBody {
    mass: f64,
    inv_inertia: DMat3,
    position: DVec3,
    orientation: DQuat,
    linear_velocity: DVec3,
    angular_velocity: DVec3,
    force: DVec3,
    torque: DVec3,
    enabled: bool,
    auto_disable: Option<u32>,
    quiet_steps: u32,
    linear_damping: f64,
    angular_damping: f64,
    rotation_lock: Option<AxisLock>,
}

/// Recorded joint
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxConstraint {
    /// Joint type; `None` for an angular motor
    pub kind: Option<ConstraintKind>,
    /// First body
    pub body_a: RawBody,
    /// Second body; `None` for an angular motor
    pub body_b: Option<RawBody>,
    /// Frame on the first body
    pub frame_a: Frame,
    /// Frame on the second body
    pub frame_b: Frame,
    /// Linear limits, if set
    pub linear_limits: Option<(DVec3, DVec3)>,
    /// Angular limits, if set
    pub angular_limits: Option<(DVec3, DVec3)>,
    /// Parameters in the order they were set
    pub params: Vec<(ConstraintParam, ConstraintAxis, f64)>,
    /// How many times transforms were recalculated
    pub transform_updates: u32,
    /// Locked axes of an angular motor
    pub lock: Option<AxisLock>,
}

/// In-process reference implementation of [`PhysicsEngine`]
pub struct SandboxEngine {
    next_handle: u64,
    geometries: BTreeMap<u64, SandboxGeometry>,
    bodies: BTreeMap<u64, SandboxBody>,
    constraints: HashMap<u64, SandboxConstraint>,
    ground_height: Option<f64>,
    fail_allocations: bool,
    steps: u64,
}

impl SandboxEngine {
    /// Create an empty world with no ground
    pub fn new() -> Self {
        SandboxEngine {
            next_handle: 1,
            geometries: BTreeMap::new(),
            bodies: BTreeMap::new(),
            constraints: HashMap::new(),
            ground_height: None,
            fail_allocations: false,
            steps: 0,
        }
    }

    /// Add a flat ground plane at `height`
    pub fn with_ground(mut self, height: f64) -> Self {
        self.ground_height = Some(height);
        self
    }

    /// Make every subsequent creation call fail
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Number of live geometries
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live constraints, angular motors included
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Number of steps taken
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Whether a body handle is live
    pub fn has_body(&self, body: RawBody) -> bool {
        self.bodies.contains_key(&body.0)
    }

    /// Whether a geometry handle is live
    pub fn has_geometry(&self, geometry: RawGeometry) -> bool {
        self.geometries.contains_key(&geometry.0)
    }

    /// Inspect a recorded constraint
    pub fn constraint(&self, constraint: RawConstraint) -> Option<&SandboxConstraint> {
        self.constraints.get(&constraint.0)
    }

    /// Category and mask of a geometry
    pub fn collision_bits(&self, geometry: RawGeometry) -> Option<CollisionBits> {
        self.geometries.get(&geometry.0).map(|g| g.bits)
    }

    /// Body a geometry is attached to
    pub fn geometry_body(&self, geometry: RawGeometry) -> Option<RawBody> {
        self.geometries
            .get(&geometry.0)
            .and_then(|g| g.attachment.as_ref().map(|a| a.body))
    }

    /// Mass of a body
    pub fn body_mass(&self, body: RawBody) -> Option<f64> {
        self.bodies.get(&body.0).map(|b| b.mass)
    }

    /// World pose of a geometry
    pub fn geometry_pose(&self, geometry: RawGeometry) -> Option<(DVec3, DQuat)> {
        self.geometries.get(&geometry.0).map(|g| self.world_pose(g))
    }

    fn allocate(&mut self) -> Option<u64> {
        if self.fail_allocations {
            return None;
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        Some(handle)
    }

    fn world_pose(&self, geometry: &SandboxGeometry) -> (DVec3, DQuat) {
        match &geometry.attachment {
            Some(attachment) => match self.bodies.get(&attachment.body.0) {
                Some(body) => (
                    body.position + body.orientation * attachment.offset_position,
                    body.orientation * attachment.offset_orientation,
                ),
                None => (geometry.position, geometry.orientation),
            },
            None => (geometry.position, geometry.orientation),
        }
    }

    fn world_aabb(&self, geometry: &SandboxGeometry) -> Aabb {
        let (position, orientation) = self.world_pose(geometry);
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for i in 0..8 {
            let corner = DVec3::new(
                if i & 1 == 0 { geometry.local.min.x } else { geometry.local.max.x },
                if i & 2 == 0 { geometry.local.min.y } else { geometry.local.max.y },
                if i & 4 == 0 { geometry.local.min.z } else { geometry.local.max.z },
            );
            let world = position + orientation * corner;
            min = min.min(world);
            max = max.max(world);
        }
        Aabb::new(min, max)
    }

    fn integrate(&mut self, dt: f64) -> Vec<RawBody> {
        let mut updated = Vec::new();
        for (handle, body) in self.bodies.iter_mut() {
            if !body.enabled {
                body.force = DVec3::ZERO;
                body.torque = DVec3::ZERO;
                continue;
            }

            body.linear_velocity += body.force / body.mass * dt;
            body.linear_velocity *= 1.0 - body.linear_damping;

            let r = DMat3::from_quat(body.orientation);
            let world_inv_inertia = r * body.inv_inertia * r.transpose();
            body.angular_velocity += world_inv_inertia * body.torque * dt;
            body.angular_velocity *= 1.0 - body.angular_damping;

            if let Some(lock) = body.rotation_lock {
                let mut local = body.orientation.inverse() * body.angular_velocity;
                if !lock.x {
                    local.x = 0.0;
                }
                if !lock.y {
                    local.y = 0.0;
                }
                if !lock.z {
                    local.z = 0.0;
                }
                body.angular_velocity = body.orientation * local;
            }

            body.position += body.linear_velocity * dt;
            let w = body.angular_velocity;
            let spin = DQuat::from_xyzw(w.x, w.y, w.z, 0.0) * body.orientation;
            body.orientation = (body.orientation + spin * (0.5 * dt)).normalize();

            body.force = DVec3::ZERO;
            body.torque = DVec3::ZERO;

            if let Some(steps) = body.auto_disable {
                if body.linear_velocity.length() < SLEEP_LINEAR_THRESHOLD
                    && body.angular_velocity.length() < SLEEP_ANGULAR_THRESHOLD
                {
                    body.quiet_steps += 1;
                    if body.quiet_steps >= steps {
                        body.enabled = false;
                        body.quiet_steps = 0;
                    }
                } else {
                    body.quiet_steps = 0;
                }
            }

            updated.push(RawBody(*handle));
        }
        updated
    }

    fn find_contacts(&mut self) -> Vec<Contact> {
        let boxes: Vec<(u64, Aabb, Option<RawBody>, CollisionBits)> = self
            .geometries
            .iter()
            .map(|(handle, g)| {
                (
                    *handle,
                    self.world_aabb(g),
                    g.attachment.as_ref().map(|a| a.body),
                    g.bits,
                )
            })
            .collect();

        let mut contacts = Vec::new();
        for i in 0..boxes.len() {
            for j in (i + 1)..boxes.len() {
                let (ha, aabb_a, body_a, bits_a) = boxes[i];
                let (hb, aabb_b, body_b, bits_b) = boxes[j];
                if body_a.is_none() && body_b.is_none() {
                    continue;
                }
                if body_a.is_some() && body_a == body_b {
                    continue;
                }
                let wanted = bits_a.categories.intersects(bits_b.mask)
                    || bits_b.categories.intersects(bits_a.mask);
                if !wanted || !aabb_a.intersects(&aabb_b) {
                    continue;
                }
                let lo = aabb_a.min.max(aabb_b.min);
                let hi = aabb_a.max.min(aabb_b.max);
                let overlap = hi - lo;
                let (depth, axis) = if overlap.x <= overlap.y && overlap.x <= overlap.z {
                    (overlap.x, DVec3::X)
                } else if overlap.y <= overlap.z {
                    (overlap.y, DVec3::Y)
                } else {
                    (overlap.z, DVec3::Z)
                };
                let sign = if (aabb_a.center() - aabb_b.center()).dot(axis) >= 0.0 {
                    1.0
                } else {
                    -1.0
                };
                contacts.push(Contact {
                    geometry: RawGeometry(ha),
                    other: Some(RawGeometry(hb)),
                    position: (lo + hi) * 0.5,
                    normal: axis * sign,
                    depth,
                });
            }
        }

        if let Some(ground) = self.ground_height {
            let mut lifts: BTreeMap<u64, f64> = BTreeMap::new();
            for (handle, aabb, body, bits) in &boxes {
                let Some(body) = body else { continue };
                if !bits.mask.contains(CollisionCategories::LAND) || aabb.min.z >= ground {
                    continue;
                }
                let depth = ground - aabb.min.z;
                contacts.push(Contact {
                    geometry: RawGeometry(*handle),
                    other: None,
                    position: DVec3::new(aabb.center().x, aabb.center().y, ground),
                    normal: DVec3::Z,
                    depth,
                });
                let lift = lifts.entry(body.0).or_insert(0.0);
                *lift = lift.max(depth);
            }
            for (handle, lift) in lifts {
                if let Some(body) = self.bodies.get_mut(&handle) {
                    body.position.z += lift;
                    if body.linear_velocity.z < 0.0 {
                        body.linear_velocity.z = 0.0;
                    }
                }
            }
        }

        contacts
    }
}

impl Default for SandboxEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsEngine for SandboxEngine {
    fn name(&self) -> &str {
        "Sandbox"
    }

    fn create_geometry(&mut self, spec: &GeometrySpec) -> Option<RawGeometry> {
        let local = match spec {
            GeometrySpec::Sphere { radius } => {
                Aabb::new(DVec3::splat(-radius), DVec3::splat(*radius))
            }
            GeometrySpec::Box { size } => Aabb::new(-*size * 0.5, *size * 0.5),
            GeometrySpec::TriMesh(mesh) => {
                if mesh.is_empty() {
                    return None;
                }
                let mut min = DVec3::splat(f64::INFINITY);
                let mut max = DVec3::splat(f64::NEG_INFINITY);
                for v in &mesh.vertices {
                    min = min.min(*v);
                    max = max.max(*v);
                }
                Aabb::new(min, max)
            }
        };
        let handle = self.allocate()?;
        self.geometries.insert(
            handle,
            SandboxGeometry {
                local,
                position: DVec3::ZERO,
                orientation: DQuat::IDENTITY,
                attachment: None,
                bits: CollisionBits::none(),
            },
        );
        Some(RawGeometry(handle))
    }

    fn destroy_geometry(&mut self, geometry: RawGeometry) {
        self.geometries.remove(&geometry.0);
    }

    fn set_geometry_pose(&mut self, geometry: RawGeometry, position: DVec3, orientation: DQuat) {
        if let Some(g) = self.geometries.get_mut(&geometry.0) {
            g.position = position;
            g.orientation = orientation;
        }
    }

    fn geometry_aabb(&self, geometry: RawGeometry) -> Option<Aabb> {
        self.geometries.get(&geometry.0).map(|g| g.local)
    }

    fn set_collision_bits(
        &mut self,
        geometry: RawGeometry,
        categories: CollisionCategories,
        mask: CollisionCategories,
    ) {
        if let Some(g) = self.geometries.get_mut(&geometry.0) {
            g.bits = CollisionBits::new(categories, mask);
        }
    }

    fn attach_geometry(
        &mut self,
        geometry: RawGeometry,
        body: RawBody,
        offset_position: DVec3,
        offset_orientation: DQuat,
    ) {
        if !self.bodies.contains_key(&body.0) {
            return;
        }
        if let Some(g) = self.geometries.get_mut(&geometry.0) {
            g.attachment = Some(Attachment {
                body,
                offset_position,
                offset_orientation,
            });
        }
    }

    fn detach_geometry(&mut self, geometry: RawGeometry) {
        let pose = match self.geometries.get(&geometry.0) {
            Some(g) => self.world_pose(g),
            None => return,
        };
        if let Some(g) = self.geometries.get_mut(&geometry.0) {
            g.position = pose.0;
            g.orientation = pose.1;
            g.attachment = None;
        }
    }

    fn create_body(
        &mut self,
        mass: &MassProperties,
        position: DVec3,
        orientation: DQuat,
    ) -> Option<RawBody> {
        if !mass.is_valid() {
            return None;
        }
        let handle = self.allocate()?;
        let inertia = mass.central_inertia();
        let inv_inertia = if inertia.determinant().abs() > f64::EPSILON {
            inertia.inverse()
        } else {
            DMat3::ZERO
        };
        self.bodies.insert(
            handle,
            SandboxBody {
                mass: mass.mass,
                inv_inertia,
                position,
                orientation,
                linear_velocity: DVec3::ZERO,
                angular_velocity: DVec3::ZERO,
                force: DVec3::ZERO,
                torque: DVec3::ZERO,
                enabled: true,
                auto_disable: None,
                quiet_steps: 0,
                linear_damping: 0.0,
                angular_damping: 0.0,
                rotation_lock: None,
            },
        );
        Some(RawBody(handle))
    }

    fn destroy_body(&mut self, body: RawBody) {
        let attached: Vec<u64> = self
            .geometries
            .iter()
            .filter(|(_, g)| g.attachment.as_ref().map(|a| a.body) == Some(body))
            .map(|(h, _)| *h)
            .collect();
        for handle in attached {
            self.detach_geometry(RawGeometry(handle));
        }
        self.bodies.remove(&body.0);
    }

    fn set_body_enabled(&mut self, body: RawBody, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.enabled = enabled;
            b.quiet_steps = 0;
        }
    }

    fn is_body_enabled(&self, body: RawBody) -> bool {
        self.bodies.get(&body.0).map(|b| b.enabled).unwrap_or(false)
    }

    fn set_auto_disable(&mut self, body: RawBody, steps: Option<u32>) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.auto_disable = steps;
        }
    }

    fn set_damping(&mut self, body: RawBody, linear: f64, angular: f64) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.linear_damping = linear;
            b.angular_damping = angular;
        }
    }

    fn set_position(&mut self, body: RawBody, position: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.position = position;
        }
    }

    fn set_orientation(&mut self, body: RawBody, orientation: DQuat) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.orientation = orientation;
        }
    }

    fn set_linear_velocity(&mut self, body: RawBody, velocity: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.linear_velocity = velocity;
        }
    }

    fn set_angular_velocity(&mut self, body: RawBody, velocity: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.angular_velocity = velocity;
        }
    }

    fn body_state(&self, body: RawBody) -> Option<BodyState> {
        self.bodies.get(&body.0).map(|b| BodyState {
            position: b.position,
            orientation: b.orientation,
            linear_velocity: b.linear_velocity,
            angular_velocity: b.angular_velocity,
        })
    }

    fn apply_force(&mut self, body: RawBody, force: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.force += force;
        }
    }

    fn apply_torque(&mut self, body: RawBody, torque: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.torque += torque;
        }
    }

    fn apply_impulse(&mut self, body: RawBody, impulse: DVec3) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.linear_velocity += impulse / b.mass;
        }
    }

    fn clear_forces(&mut self, body: RawBody) {
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.force = DVec3::ZERO;
            b.torque = DVec3::ZERO;
        }
    }

    fn step(&mut self, dt: f64, max_substeps: u32) -> StepReport {
        assert!(
            dt > 0.0 && dt.is_finite(),
            "Timestep must be positive and finite"
        );
        self.steps += 1;
        let updated = self.integrate(dt);
        let contacts = self.find_contacts();
        StepReport {
            updated,
            contacts,
            substeps: max_substeps.min(1),
        }
    }

    fn create_constraint(
        &mut self,
        kind: ConstraintKind,
        body_a: RawBody,
        body_b: RawBody,
        frame_a: Frame,
        frame_b: Frame,
    ) -> Option<RawConstraint> {
        if !self.bodies.contains_key(&body_a.0) || !self.bodies.contains_key(&body_b.0) {
            return None;
        }
        let handle = self.allocate()?;
        self.constraints.insert(
            handle,
            SandboxConstraint {
                kind: Some(kind),
                body_a,
                body_b: Some(body_b),
                frame_a,
                frame_b,
                linear_limits: None,
                angular_limits: None,
                params: Vec::new(),
                transform_updates: 0,
                lock: None,
            },
        );
        Some(RawConstraint(handle))
    }

    fn create_angular_motor(
        &mut self,
        body: RawBody,
        lock: AxisLock,
        orientation: DQuat,
    ) -> Option<RawConstraint> {
        if !self.bodies.contains_key(&body.0) {
            return None;
        }
        let handle = self.allocate()?;
        if let Some(b) = self.bodies.get_mut(&body.0) {
            b.rotation_lock = Some(lock);
            b.angular_velocity = DVec3::ZERO;
            b.torque = DVec3::ZERO;
        }
        self.constraints.insert(
            handle,
            SandboxConstraint {
                kind: None,
                body_a: body,
                body_b: None,
                frame_a: Frame {
                    position: DVec3::ZERO,
                    orientation,
                },
                frame_b: Frame::default(),
                linear_limits: None,
                angular_limits: None,
                params: Vec::new(),
                transform_updates: 0,
                lock: Some(lock),
            },
        );
        Some(RawConstraint(handle))
    }

    fn set_constraint_limits(
        &mut self,
        constraint: RawConstraint,
        kind: LimitKind,
        low: DVec3,
        high: DVec3,
    ) -> bool {
        match self.constraints.get_mut(&constraint.0) {
            Some(c) if c.kind.is_some() => {
                match kind {
                    LimitKind::Linear => c.linear_limits = Some((low, high)),
                    LimitKind::Angular => c.angular_limits = Some((low, high)),
                }
                true
            }
            _ => false,
        }
    }

    fn set_constraint_param(
        &mut self,
        constraint: RawConstraint,
        param: ConstraintParam,
        value: f64,
        axis: ConstraintAxis,
    ) -> bool {
        match self.constraints.get_mut(&constraint.0) {
            Some(c) => {
                c.params.push((param, axis, value));
                true
            }
            None => false,
        }
    }

    fn calculate_constraint_transforms(&mut self, constraint: RawConstraint) -> bool {
        match self.constraints.get_mut(&constraint.0) {
            Some(c) => {
                c.transform_updates += 1;
                true
            }
            None => false,
        }
    }

    fn destroy_constraint(&mut self, constraint: RawConstraint) {
        if let Some(c) = self.constraints.remove(&constraint.0) {
            if c.lock.is_some() {
                if let Some(b) = self.bodies.get_mut(&c.body_a.0) {
                    b.rotation_lock = None;
                }
            }
        }
    }
}
