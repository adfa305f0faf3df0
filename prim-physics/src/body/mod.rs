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
//! Physical bodies
//!
//! A [`PhysicsBody`] is the bridge's record of one prim: its cached
//! kinematic state, its state flags, its shape and mass data, and the
//! native geometry and body it owns. Bodies live in a [`BodyArena`] and are
//! only ever mutated by the simulation thread, through
//! change application and the per-tick motion passes.
//!
//! # States
//!
//! The state flags are orthogonal:
//!
//! - **static**: geometry only, no native body
//! - **physical**: a linkset root with a native body
//! - **disabled**: the body exists but is not simulated and has no
//!   collision bits
//! - **selected**: frozen, collides with nothing
//! - **volume detect / phantom**: detection only, no contact response
//! - **child**: part of a linkset; its geometry hangs off the root's body
//!
//! # Linksets
//!
//! A root owns an ordered list of children. Children hold a non-owning
//! back reference to their root and never own a native body themselves.
//! Whenever link topology, a member's shape or the root's physical state
//! changes, the root's native body is destroyed and rebuilt from the
//! members' own-frame mass properties.

use crate::config::SceneConfig;
use crate::constraint::ConstraintCollection;
use crate::engine::{AxisLock, BodyHandle, Mesher, PhysicsEngine, RawConstraint, ShapeHandle};
use crate::events::{CollisionContact, SceneEvent};
use crate::id::BodyId;
use crate::mass::MassProperties;
use crate::shape::ShapeDescriptor;
use crate::terrain::Terrain;
use crate::vehicle::Vehicle;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

mod apply;
pub mod arena;
pub mod collision;
mod motion;

pub use arena::BodyArena;
pub use collision::{CollisionBits, CollisionCategories};

/// State flags of a body
///
/// Only the simulation thread writes these; everything else sees them
/// through [`PhysicsBody::flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BodyFlags {
    /// Simulated by the engine
    pub physical: bool,
    /// Collides with terrain only
    pub phantom: bool,
    /// Reports contacts without responding to them
    pub volume_detect: bool,
    /// Held by an editor
    pub selected: bool,
    /// Not simulated and not colliding
    pub disabled: bool,
    /// Being assembled; no native body until building ends
    pub building: bool,
    /// Floats on water
    pub collides_water: bool,
    /// Mesh generation failed; collides with terrain only
    pub no_collide: bool,
    /// Selection is waiting for the body to become physical
    pub delay_select: bool,
    /// Left the region and was parked
    pub out_of_bounds: bool,
}

/// Surface material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Material {
    /// Stone
    Stone,
    /// Metal
    Metal,
    /// Glass
    Glass,
    /// Wood
    #[default]
    Wood,
    /// Flesh
    Flesh,
    /// Plastic
    Plastic,
    /// Rubber
    Rubber,
}

impl Material {
    /// Contact friction coefficient
    pub fn friction(&self) -> f64 {
        match self {
            Material::Stone => 0.8,
            Material::Metal => 0.3,
            Material::Glass => 0.2,
            Material::Wood => 0.6,
            Material::Flesh => 0.9,
            Material::Plastic => 0.4,
            Material::Rubber => 0.9,
        }
    }

    /// Contact restitution
    pub fn bounce(&self) -> f64 {
        match self {
            Material::Stone => 0.4,
            Material::Metal => 0.4,
            Material::Glass => 0.7,
            Material::Wood => 0.5,
            Material::Flesh => 0.3,
            Material::Plastic => 0.7,
            Material::Rubber => 0.95,
        }
    }
}

/// Height reference of the hover controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HoverKind {
    /// Hover above terrain
    #[default]
    Ground,
    /// Hover above terrain or water, whichever is higher
    GroundAndWater,
}

/// Hover controller settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HoverSettings {
    /// Height above the reference surface; 0 turns the controller off
    pub height: f64,
    /// Time constant
    pub tau: f64,
    /// Reference surface
    pub kind: HoverKind,
    /// Whether the controller runs
    pub active: bool,
}

impl HoverSettings {
    /// True when the controller should drive the body
    pub fn is_engaged(&self) -> bool {
        self.active && self.tau != 0.0 && self.height != 0.0
    }
}

/// Move-to-target controller settings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveToTarget {
    /// World position to move to
    pub target: DVec3,
    /// Time constant; 0 disables the controller
    pub tau: f64,
    /// Whether the controller runs
    pub active: bool,
}

impl MoveToTarget {
    /// True when the controller should drive the body
    pub fn is_engaged(&self) -> bool {
        self.active && self.tau > 0.0
    }
}

/// Per-body collision reporting state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionSubscription {
    /// Minimum milliseconds between reports; 0 means unsubscribed
    pub interval_ms: u32,
    /// Milliseconds accumulated since the last report
    pub elapsed_ms: u32,
    /// An empty report has already been sent
    pub sent_empty: bool,
    /// Contacts gathered since the last report
    pub contacts: Vec<CollisionContact>,
}

impl CollisionSubscription {
    /// Whether the body wants collision reports
    pub fn is_subscribed(&self) -> bool {
        self.interval_ms > 0
    }
}

/// Everything needed to create a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimDescriptor {
    /// Name used in logs
    pub name: String,
    /// World position
    pub position: DVec3,
    /// World orientation
    pub orientation: DQuat,
    /// Bounding size
    pub size: DVec3,
    /// Parametric shape
    pub shape: ShapeDescriptor,
    /// Start physical
    pub physical: bool,
    /// Start phantom
    pub phantom: bool,
    /// Start as a volume detector
    pub volume_detect: bool,
    /// Start in building mode
    pub building: bool,
    /// Density override
    pub density: Option<f64>,
}

impl PrimDescriptor {
    /// A static box of `size` at `position`
    pub fn new(position: DVec3, size: DVec3) -> Self {
        PrimDescriptor {
            name: String::new(),
            position,
            orientation: DQuat::IDENTITY,
            size,
            shape: ShapeDescriptor::cube(),
            physical: false,
            phantom: false,
            volume_detect: false,
            building: false,
            density: None,
        }
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the orientation
    pub fn with_orientation(mut self, orientation: DQuat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the shape
    pub fn with_shape(mut self, shape: ShapeDescriptor) -> Self {
        self.shape = shape;
        self
    }

    /// Set the density
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    /// Make the body physical
    pub fn physical(mut self) -> Self {
        self.physical = true;
        self
    }

    /// Make the body phantom
    pub fn phantom(mut self) -> Self {
        self.phantom = true;
        self
    }

    /// Make the body a volume detector
    pub fn volume_detect(mut self) -> Self {
        self.volume_detect = true;
        self
    }

    /// Start in building mode
    pub fn building(mut self) -> Self {
        self.building = true;
        self
    }
}

/// The bridge's record of one prim
#[derive(Debug, Clone)]
pub struct PhysicsBody {
    pub(crate) id: BodyId,
    pub(crate) name: String,

    pub(crate) position: DVec3,
    pub(crate) orientation: DQuat,
    pub(crate) velocity: DVec3,
    pub(crate) angular_velocity: DVec3,
    pub(crate) acceleration: DVec3,
    pub(crate) target_velocity: DVec3,

    pub(crate) force: DVec3,
    pub(crate) torque: DVec3,
    pub(crate) force_acc: DVec3,
    pub(crate) angular_force_acc: DVec3,

    pub(crate) shape: ShapeDescriptor,
    pub(crate) size: DVec3,
    pub(crate) density: f64,
    pub(crate) volume: f64,
    pub(crate) prim_mass: f64,
    pub(crate) own_mass: MassProperties,
    pub(crate) oob_size: DVec3,
    pub(crate) oob_offset: DVec3,
    pub(crate) oob_radius_sq: f64,

    /// Mass of the whole linkset while a native body exists, else `prim_mass`
    pub(crate) mass: f64,
    /// Centre of mass of the linkset in the root's frame
    pub(crate) center_of_mass: DVec3,
    /// Pose relative to the root frame, for linkset children
    pub(crate) link_offset: Option<(DVec3, DQuat)>,

    pub(crate) flags: BodyFlags,
    pub(crate) last_done_selected: bool,
    pub(crate) bits: CollisionBits,
    pub(crate) geometry: Option<ShapeHandle>,
    pub(crate) body: Option<BodyHandle>,
    pub(crate) angular_motor: Option<RawConstraint>,
    pub(crate) angular_lock: AxisLock,

    pub(crate) parent: Option<BodyId>,
    pub(crate) children: Vec<BodyId>,

    pub(crate) buoyancy: f64,
    pub(crate) move_to: MoveToTarget,
    pub(crate) hover: HoverSettings,
    pub(crate) vehicle: Option<Vehicle>,
    pub(crate) material: Material,

    pub(crate) collisions: CollisionSubscription,
    pub(crate) collision_score: f64,

    pub(crate) settled: bool,
    pub(crate) last_update_sent: bool,
    pub(crate) sleep_counter: u32,
}

impl PhysicsBody {
    /// Record for a new body; no native objects exist yet
    pub(crate) fn new(id: BodyId, descriptor: &PrimDescriptor, config: &SceneConfig) -> Self {
        let mut flags = BodyFlags {
            physical: descriptor.physical,
            phantom: descriptor.phantom,
            volume_detect: descriptor.volume_detect,
            building: descriptor.building,
            ..BodyFlags::default()
        };
        if flags.physical && descriptor.position.z < 0.0 {
            log::warn!(
                target: "prim_physics::body",
                "{} created below ground at {}, starting non-physical",
                id,
                descriptor.position
            );
            flags.physical = false;
        }

        PhysicsBody {
            id,
            name: descriptor.name.clone(),
            position: descriptor.position,
            orientation: descriptor.orientation,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            acceleration: DVec3::ZERO,
            target_velocity: DVec3::ZERO,
            force: DVec3::ZERO,
            torque: DVec3::ZERO,
            force_acc: DVec3::ZERO,
            angular_force_acc: DVec3::ZERO,
            shape: descriptor.shape.clone(),
            size: descriptor.size,
            density: descriptor.density.unwrap_or(config.default_density),
            volume: 0.0,
            prim_mass: 0.0,
            own_mass: MassProperties::zero(),
            oob_size: descriptor.size,
            oob_offset: DVec3::ZERO,
            oob_radius_sq: (descriptor.size * 0.5).length_squared(),
            mass: 0.0,
            center_of_mass: DVec3::ZERO,
            link_offset: None,
            flags,
            last_done_selected: false,
            bits: CollisionBits::none(),
            geometry: None,
            body: None,
            angular_motor: None,
            angular_lock: AxisLock::FREE,
            parent: None,
            children: Vec::new(),
            buoyancy: 0.0,
            move_to: MoveToTarget::default(),
            hover: HoverSettings::default(),
            vehicle: None,
            material: Material::default(),
            collisions: CollisionSubscription::default(),
            collision_score: 0.0,
            settled: false,
            last_update_sent: false,
            sleep_counter: 0,
        }
    }

    /// Stable id
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached world position
    pub fn position(&self) -> DVec3 {
        self.position
    }

    /// Cached world orientation
    pub fn orientation(&self) -> DQuat {
        self.orientation
    }

    /// Cached linear velocity
    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Cached angular velocity
    pub fn angular_velocity(&self) -> DVec3 {
        self.angular_velocity
    }

    /// Cached acceleration
    pub fn acceleration(&self) -> DVec3 {
        self.acceleration
    }

    /// Constant applied force
    pub fn force(&self) -> DVec3 {
        self.force
    }

    /// Constant applied torque
    pub fn torque(&self) -> DVec3 {
        self.torque
    }

    /// State flags
    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    /// Collision bits currently applied to the geometry
    pub fn collision_bits(&self) -> CollisionBits {
        self.bits
    }

    /// Parametric shape
    pub fn shape(&self) -> &ShapeDescriptor {
        &self.shape
    }

    /// Bounding size
    pub fn size(&self) -> DVec3 {
        self.size
    }

    /// Density
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Estimated volume
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Mass of this prim alone
    pub fn prim_mass(&self) -> f64 {
        self.prim_mass
    }

    /// Mass used for forces: the linkset's while a native body exists
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Own-frame mass properties
    pub fn own_mass_properties(&self) -> &MassProperties {
        &self.own_mass
    }

    /// Oriented bounding box size
    pub fn oob_size(&self) -> DVec3 {
        self.oob_size
    }

    /// Oriented bounding box centre in the prim frame
    pub fn oob_offset(&self) -> DVec3 {
        self.oob_offset
    }

    /// Squared radius of the oriented bounding box
    pub fn oob_radius_sq(&self) -> f64 {
        self.oob_radius_sq
    }

    /// World centre of mass
    ///
    /// For a linkset root with a native body this is the linkset's centre
    /// of mass; otherwise it is this prim's own.
    pub fn center_of_mass(&self) -> DVec3 {
        if self.body.is_some() {
            self.position + self.orientation * self.center_of_mass
        } else {
            self.position + self.orientation * self.own_mass.center
        }
    }

    /// Native geometry, if one was built
    pub fn geometry(&self) -> Option<ShapeHandle> {
        self.geometry
    }

    /// Native body; only linkset roots that are physical have one
    pub fn body_handle(&self) -> Option<BodyHandle> {
        self.body
    }

    /// Rotation freedom
    pub fn angular_lock(&self) -> AxisLock {
        self.angular_lock
    }

    /// True if an angular motor currently enforces the lock
    pub fn has_angular_motor(&self) -> bool {
        self.angular_motor.is_some()
    }

    /// Linkset root, for children
    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    /// Linkset children, for roots
    pub fn children(&self) -> &[BodyId] {
        &self.children
    }

    /// True if part of a linkset but not its root
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Buoyancy; 1 cancels gravity
    pub fn buoyancy(&self) -> f64 {
        self.buoyancy
    }

    /// Move-to-target controller
    pub fn move_to_target(&self) -> MoveToTarget {
        self.move_to
    }

    /// Hover controller
    pub fn hover(&self) -> HoverSettings {
        self.hover
    }

    /// Vehicle parameters, if any
    pub fn vehicle(&self) -> Option<&Vehicle> {
        self.vehicle.as_ref()
    }

    /// Surface material
    pub fn material(&self) -> Material {
        self.material
    }

    /// Collision reporting state
    pub fn collision_subscription(&self) -> &CollisionSubscription {
        &self.collisions
    }

    /// Contacts seen since collision accounting was last reset
    pub fn collision_score(&self) -> f64 {
        self.collision_score
    }

    /// True when the last readback saw no movement
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Zero every velocity and force accumulator
    ///
    /// Children keep their accumulators; only the root drives the linkset.
    pub(crate) fn stop(&mut self, engine: &mut dyn PhysicsEngine) {
        if self.parent.is_none() {
            self.force = DVec3::ZERO;
            self.force_acc = DVec3::ZERO;
            self.angular_force_acc = DVec3::ZERO;
            self.torque = DVec3::ZERO;
            self.velocity = DVec3::ZERO;
            self.acceleration = DVec3::ZERO;
            self.angular_velocity = DVec3::ZERO;
            self.target_velocity = DVec3::ZERO;
            if let Some(vehicle) = self.vehicle.as_mut() {
                vehicle.stop();
            }
        }
        if let Some(body) = self.body {
            engine.clear_forces(body.raw());
            engine.set_linear_velocity(body.raw(), DVec3::ZERO);
            engine.set_angular_velocity(body.raw(), DVec3::ZERO);
        }
    }

    /// Forget contacts counted toward the collision score
    pub(crate) fn reset_collision_accounting(&mut self) {
        self.collision_score = 0.0;
    }

    /// Wake the native body if it is asleep
    pub(crate) fn wake(&self, engine: &mut dyn PhysicsEngine) {
        if let Some(body) = self.body {
            if !engine.is_body_enabled(body.raw()) {
                engine.set_body_enabled(body.raw(), true);
            }
        }
    }
}

/// What the body passes need from the scene for one call
pub(crate) struct SimContext<'a> {
    pub engine: &'a mut dyn PhysicsEngine,
    pub mesher: &'a dyn Mesher,
    pub config: &'a SceneConfig,
    pub constraints: &'a ConstraintCollection,
    pub terrain: &'a Terrain,
    pub events: &'a mut Vec<SceneEvent>,
}
