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
//! Deferred mutation protocol
//!
//! Nothing outside the simulation thread touches a body. Producers hold a
//! [`ChangeSender`] and enqueue typed [`Change`] records; once per tick the
//! scene drains a snapshot of the [`ChangeQueue`] and applies the records
//! in order.
//!
//! # Guarantees
//!
//! - Enqueueing never blocks (unbounded `crossbeam-channel`).
//! - Records for one body are applied in the order they were sent by any
//!   single producer; there is no ordering across bodies.
//! - A drain takes only what was queued when it started. Records sent
//!   while the drain is being applied wait for the next tick.
//! - Non-finite vectors, quaternions and scalars are rejected by the
//!   sender, logged, and never reach the queue.
//!
//! # Example
//!
//! ```
//! use prim_physics::{PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig};
//! use glam::DVec3;
//!
//! let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap();
//! let sender = scene.sender();
//! let id = sender
//!     .add_prim(PrimDescriptor::new(DVec3::new(128.0, 128.0, 30.0), DVec3::ONE))
//!     .unwrap();
//! sender.set_position(id, DVec3::new(120.0, 128.0, 30.0)).unwrap();
//!
//! scene.step();
//! assert_eq!(scene.body(id).unwrap().position(), DVec3::new(120.0, 128.0, 30.0));
//! ```

use crate::body::{HoverSettings, Material, PrimDescriptor};
use crate::engine::AxisLock;
use crate::error::{PhysicsError, PhysicsResult};
use crate::id::{BodyId, IdAllocator};
use crate::shape::ShapeDescriptor;
use crate::vehicle::{
    VehicleFlags, VehicleFloatParam, VehicleRotationParam, VehicleType, VehicleVectorParam,
};
use crossbeam_channel::{Receiver, Sender};
use glam::{DQuat, DVec3};
use std::sync::Arc;

/// One deferred mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create the body
    Add(Box<PrimDescriptor>),
    /// Destroy the body and release its native objects
    Remove,
    /// Join the linkset rooted at the given body
    Link(BodyId),
    /// Leave the current linkset
    Delink,
    /// Move
    Position(DVec3),
    /// Rotate
    Orientation(DQuat),
    /// Move and rotate
    PositionAndOrientation(DVec3, DQuat),
    /// Set linear velocity
    Velocity(DVec3),
    /// Set angular velocity
    AngularVelocity(DVec3),
    /// Set the constant force
    Force(DVec3),
    /// Set the constant torque
    Torque(DVec3),
    /// Add a linear impulse, applied as a force over the next step
    AddForce(DVec3),
    /// Add an angular impulse
    AddAngularForce(DVec3),
    /// Restrict rotation
    AngularLock(AxisLock),
    /// Resize
    Size(DVec3),
    /// Replace the shape
    Shape(Box<ShapeDescriptor>),
    /// Replace shape and size together
    ShapeAndSize(Box<ShapeDescriptor>, DVec3),
    /// Float on water
    CollidesWater(bool),
    /// Detection only
    VolumeDetect(bool),
    /// Collide with terrain only
    Phantom(bool),
    /// Simulate
    Physical(bool),
    /// Editor selection
    Selected(bool),
    /// Suspend simulation and collisions
    Disabled(bool),
    /// Hold off building the native body
    Building(bool),
    /// Scale gravity by `1 - buoyancy`
    Buoyancy(f64),
    /// Move-to-target position
    PidTarget(DVec3),
    /// Move-to-target time constant
    PidTau(f64),
    /// Turn the move-to-target controller on or off
    PidActive(bool),
    /// Hover controller settings
    Hover(HoverSettings),
    /// Surface material
    Material(Material),
    /// Density for the next mass computation
    Density(f64),
    /// Vehicle archetype; `None` removes the vehicle
    VehicleType(VehicleType),
    /// Vehicle scalar parameter
    VehicleFloatParam(VehicleFloatParam, f64),
    /// Vehicle vector parameter
    VehicleVectorParam(VehicleVectorParam, DVec3),
    /// Vehicle rotation parameter
    VehicleRotationParam(VehicleRotationParam, DQuat),
    /// Vehicle switches
    VehicleFlags(VehicleFlags, bool),
    /// Report collisions at most every given milliseconds
    SubscribeCollisions(u32),
    /// Stop reporting collisions
    UnsubscribeCollisions,
    /// Bring a parked out-of-bounds body back into the region
    CrossingFailure,
    /// Does nothing
    Null,
}

fn vec_finite(v: &DVec3) -> bool {
    v.is_finite()
}

impl Change {
    /// Short name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            Change::Add(_) => "Add",
            Change::Remove => "Remove",
            Change::Link(_) => "Link",
            Change::Delink => "Delink",
            Change::Position(_) => "Position",
            Change::Orientation(_) => "Orientation",
            Change::PositionAndOrientation(..) => "PositionAndOrientation",
            Change::Velocity(_) => "Velocity",
            Change::AngularVelocity(_) => "AngularVelocity",
            Change::Force(_) => "Force",
            Change::Torque(_) => "Torque",
            Change::AddForce(_) => "AddForce",
            Change::AddAngularForce(_) => "AddAngularForce",
            Change::AngularLock(_) => "AngularLock",
            Change::Size(_) => "Size",
            Change::Shape(_) => "Shape",
            Change::ShapeAndSize(..) => "ShapeAndSize",
            Change::CollidesWater(_) => "CollidesWater",
            Change::VolumeDetect(_) => "VolumeDetect",
            Change::Phantom(_) => "Phantom",
            Change::Physical(_) => "Physical",
            Change::Selected(_) => "Selected",
            Change::Disabled(_) => "Disabled",
            Change::Building(_) => "Building",
            Change::Buoyancy(_) => "Buoyancy",
            Change::PidTarget(_) => "PidTarget",
            Change::PidTau(_) => "PidTau",
            Change::PidActive(_) => "PidActive",
            Change::Hover(_) => "Hover",
            Change::Material(_) => "Material",
            Change::Density(_) => "Density",
            Change::VehicleType(_) => "VehicleType",
            Change::VehicleFloatParam(..) => "VehicleFloatParam",
            Change::VehicleVectorParam(..) => "VehicleVectorParam",
            Change::VehicleRotationParam(..) => "VehicleRotationParam",
            Change::VehicleFlags(..) => "VehicleFlags",
            Change::SubscribeCollisions(_) => "SubscribeCollisions",
            Change::UnsubscribeCollisions => "UnsubscribeCollisions",
            Change::CrossingFailure => "CrossingFailure",
            Change::Null => "Null",
        }
    }

    /// Name of the first non-finite argument, if any
    ///
    /// `Add` is not checked here; creation sanitises its own input.
    pub fn non_finite_argument(&self) -> Option<&'static str> {
        let ok = match self {
            Change::Position(v)
            | Change::Velocity(v)
            | Change::AngularVelocity(v)
            | Change::Force(v)
            | Change::Torque(v)
            | Change::AddForce(v)
            | Change::AddAngularForce(v)
            | Change::Size(v)
            | Change::PidTarget(v)
            | Change::VehicleVectorParam(_, v) => vec_finite(v),
            Change::Orientation(q) | Change::VehicleRotationParam(_, q) => q.is_finite(),
            Change::PositionAndOrientation(v, q) => vec_finite(v) && q.is_finite(),
            Change::ShapeAndSize(_, v) => vec_finite(v),
            Change::Buoyancy(x) | Change::PidTau(x) | Change::Density(x) => x.is_finite(),
            Change::VehicleFloatParam(_, x) => x.is_finite(),
            Change::Hover(h) => h.height.is_finite() && h.tau.is_finite(),
            _ => true,
        };
        if ok {
            None
        } else {
            Some(self.kind_name())
        }
    }
}

/// A change addressed to one body
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Target body
    pub target: BodyId,
    /// What to do
    pub change: Change,
}

/// The queue between producers and the simulation thread
pub struct ChangeQueue {
    sender: Sender<ChangeRecord>,
    receiver: Receiver<ChangeRecord>,
    ids: Arc<IdAllocator>,
    timestep: f64,
}

impl ChangeQueue {
    /// Create an empty queue whose producers allocate ids from `ids`
    ///
    /// `timestep` is the scene's fixed step, used to express push forces
    /// in the impulse units [`Change::AddForce`] carries.
    pub fn new(ids: Arc<IdAllocator>, timestep: f64) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        ChangeQueue {
            sender,
            receiver,
            ids,
            timestep,
        }
    }

    /// New producer handle
    pub fn sender(&self) -> ChangeSender {
        ChangeSender {
            sender: self.sender.clone(),
            ids: Arc::clone(&self.ids),
            timestep: self.timestep,
        }
    }

    /// Records currently queued
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Take everything queued right now, oldest first
    pub fn drain(&self) -> Vec<ChangeRecord> {
        let pending = self.receiver.len();
        self.receiver.try_iter().take(pending).collect()
    }
}

/// Producer handle; cheap to clone and safe to send across threads
#[derive(Clone)]
pub struct ChangeSender {
    sender: Sender<ChangeRecord>,
    ids: Arc<IdAllocator>,
    timestep: f64,
}

impl ChangeSender {
    /// Queue `change` for `target`
    ///
    /// Non-finite arguments are logged and rejected; the change is dropped
    /// and the body keeps its previous state.
    pub fn enqueue(&self, target: BodyId, change: Change) -> PhysicsResult<()> {
        if let Some(what) = change.non_finite_argument() {
            log::warn!(
                target: "prim_physics::change",
                "rejected non-finite {} for {}",
                what,
                target
            );
            return Err(PhysicsError::NonFinite { what, body: target });
        }
        self.sender
            .send(ChangeRecord { target, change })
            .map_err(|_| PhysicsError::QueueDisconnected)
    }

    /// Allocate an id and queue the body's creation
    pub fn add_prim(&self, descriptor: PrimDescriptor) -> PhysicsResult<BodyId> {
        let id = self.ids.allocate();
        match self.enqueue(id, Change::Add(Box::new(descriptor))) {
            Ok(()) => Ok(id),
            Err(err) => {
                self.ids.release(id);
                Err(err)
            }
        }
    }

    /// Queue the body's removal
    pub fn remove(&self, id: BodyId) -> PhysicsResult<()> {
        self.enqueue(id, Change::Remove)
    }

    /// Link `child` into the linkset rooted at `parent`
    pub fn link(&self, child: BodyId, parent: BodyId) -> PhysicsResult<()> {
        self.enqueue(child, Change::Link(parent))
    }

    /// Take `id` out of its linkset
    pub fn delink(&self, id: BodyId) -> PhysicsResult<()> {
        self.enqueue(id, Change::Delink)
    }

    /// Move
    pub fn set_position(&self, id: BodyId, position: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::Position(position))
    }

    /// Rotate
    pub fn set_orientation(&self, id: BodyId, orientation: DQuat) -> PhysicsResult<()> {
        self.enqueue(id, Change::Orientation(orientation))
    }

    /// Move and rotate in one change
    pub fn set_position_and_orientation(
        &self,
        id: BodyId,
        position: DVec3,
        orientation: DQuat,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::PositionAndOrientation(position, orientation))
    }

    /// Set linear velocity
    pub fn set_velocity(&self, id: BodyId, velocity: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::Velocity(velocity))
    }

    /// Set angular velocity
    pub fn set_angular_velocity(&self, id: BodyId, velocity: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::AngularVelocity(velocity))
    }

    /// Set the constant force
    pub fn set_force(&self, id: BodyId, force: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::Force(force))
    }

    /// Set the constant torque
    pub fn set_torque(&self, id: BodyId, torque: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::Torque(torque))
    }

    /// Add a linear impulse for one step
    ///
    /// With `push_force` the value is a force rather than an impulse.
    pub fn add_force(&self, id: BodyId, force: DVec3, push_force: bool) -> PhysicsResult<()> {
        let impulse = if push_force { force * self.timestep } else { force };
        self.enqueue(id, Change::AddForce(impulse))
    }

    /// Add an angular impulse
    pub fn add_angular_force(&self, id: BodyId, torque: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::AddAngularForce(torque))
    }

    /// Restrict rotation; non-zero components are free
    pub fn lock_angular_motion(&self, id: BodyId, axes: DVec3) -> PhysicsResult<()> {
        if !axes.is_finite() {
            log::warn!(
                target: "prim_physics::change",
                "rejected non-finite angular lock for {}",
                id
            );
            return Err(PhysicsError::NonFinite {
                what: "AngularLock",
                body: id,
            });
        }
        self.enqueue(id, Change::AngularLock(AxisLock::from_vector(axes)))
    }

    /// Resize
    pub fn set_size(&self, id: BodyId, size: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::Size(size))
    }

    /// Replace the shape
    pub fn set_shape(&self, id: BodyId, shape: ShapeDescriptor) -> PhysicsResult<()> {
        self.enqueue(id, Change::Shape(Box::new(shape)))
    }

    /// Replace shape and size together
    pub fn set_shape_and_size(
        &self,
        id: BodyId,
        shape: ShapeDescriptor,
        size: DVec3,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::ShapeAndSize(Box::new(shape), size))
    }

    /// Toggle simulation
    pub fn set_physical(&self, id: BodyId, physical: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::Physical(physical))
    }

    /// Toggle phantom
    pub fn set_phantom(&self, id: BodyId, phantom: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::Phantom(phantom))
    }

    /// Toggle volume detection
    pub fn set_volume_detect(&self, id: BodyId, volume_detect: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::VolumeDetect(volume_detect))
    }

    /// Toggle editor selection
    pub fn set_selected(&self, id: BodyId, selected: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::Selected(selected))
    }

    /// Suspend or resume simulation and collisions
    pub fn set_disabled(&self, id: BodyId, disabled: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::Disabled(disabled))
    }

    /// Enter or leave building mode
    pub fn set_building(&self, id: BodyId, building: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::Building(building))
    }

    /// Toggle floating on water
    pub fn set_collides_water(&self, id: BodyId, collides: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::CollidesWater(collides))
    }

    /// Scale gravity by `1 - buoyancy`
    pub fn set_buoyancy(&self, id: BodyId, buoyancy: f64) -> PhysicsResult<()> {
        self.enqueue(id, Change::Buoyancy(buoyancy))
    }

    /// Move-to-target position
    pub fn set_pid_target(&self, id: BodyId, target: DVec3) -> PhysicsResult<()> {
        self.enqueue(id, Change::PidTarget(target))
    }

    /// Move-to-target time constant
    pub fn set_pid_tau(&self, id: BodyId, tau: f64) -> PhysicsResult<()> {
        self.enqueue(id, Change::PidTau(tau))
    }

    /// Turn the move-to-target controller on or off
    pub fn set_pid_active(&self, id: BodyId, active: bool) -> PhysicsResult<()> {
        self.enqueue(id, Change::PidActive(active))
    }

    /// Configure the hover controller
    pub fn set_hover(&self, id: BodyId, hover: HoverSettings) -> PhysicsResult<()> {
        self.enqueue(id, Change::Hover(hover))
    }

    /// Surface material
    pub fn set_material(&self, id: BodyId, material: Material) -> PhysicsResult<()> {
        self.enqueue(id, Change::Material(material))
    }

    /// Density for the next mass computation
    pub fn set_density(&self, id: BodyId, density: f64) -> PhysicsResult<()> {
        self.enqueue(id, Change::Density(density))
    }

    /// Vehicle archetype
    pub fn set_vehicle_type(&self, id: BodyId, kind: VehicleType) -> PhysicsResult<()> {
        self.enqueue(id, Change::VehicleType(kind))
    }

    /// Vehicle scalar parameter
    pub fn set_vehicle_float_param(
        &self,
        id: BodyId,
        param: VehicleFloatParam,
        value: f64,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::VehicleFloatParam(param, value))
    }

    /// Vehicle vector parameter
    pub fn set_vehicle_vector_param(
        &self,
        id: BodyId,
        param: VehicleVectorParam,
        value: DVec3,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::VehicleVectorParam(param, value))
    }

    /// Vehicle rotation parameter
    pub fn set_vehicle_rotation_param(
        &self,
        id: BodyId,
        param: VehicleRotationParam,
        value: DQuat,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::VehicleRotationParam(param, value))
    }

    /// Vehicle switches
    pub fn set_vehicle_flags(
        &self,
        id: BodyId,
        flags: VehicleFlags,
        on: bool,
    ) -> PhysicsResult<()> {
        self.enqueue(id, Change::VehicleFlags(flags, on))
    }

    /// Report collisions at most every `interval_ms`
    pub fn subscribe_collisions(&self, id: BodyId, interval_ms: u32) -> PhysicsResult<()> {
        self.enqueue(id, Change::SubscribeCollisions(interval_ms))
    }

    /// Stop reporting collisions
    pub fn unsubscribe_collisions(&self, id: BodyId) -> PhysicsResult<()> {
        self.enqueue(id, Change::UnsubscribeCollisions)
    }

    /// Bring a parked out-of-bounds body back into the region
    pub fn crossing_failure(&self, id: BodyId) -> PhysicsResult<()> {
        self.enqueue(id, Change::CrossingFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> ChangeQueue {
        ChangeQueue::new(Arc::new(IdAllocator::new()), 0.02)
    }

    #[test]
    fn test_fifo_per_body() {
        let queue = queue();
        let sender = queue.sender();
        let id = BodyId::new(1);
        sender.set_position(id, DVec3::X).expect("enqueue");
        sender.set_position(id, DVec3::Y).expect("enqueue");
        sender.set_physical(id, true).expect("enqueue");

        let drained = queue.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].change, Change::Position(DVec3::X));
        assert_eq!(drained[1].change, Change::Position(DVec3::Y));
        assert_eq!(drained[2].change, Change::Physical(true));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_non_finite_rejected() {
        let queue = queue();
        let sender = queue.sender();
        let id = BodyId::new(3);
        let err = sender
            .set_velocity(id, DVec3::new(f64::NAN, 0.0, 0.0))
            .expect_err("NaN velocity must be rejected");
        assert_eq!(
            err,
            PhysicsError::NonFinite {
                what: "Velocity",
                body: id
            }
        );
        assert!(sender
            .set_orientation(id, DQuat::from_xyzw(0.0, 0.0, f64::INFINITY, 1.0))
            .is_err());
        assert!(sender.set_buoyancy(id, f64::NAN).is_err());
        assert!(sender.lock_angular_motion(id, DVec3::splat(f64::NAN)).is_err());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_add_prim_allocates_ids() {
        let ids = Arc::new(IdAllocator::new());
        let queue = ChangeQueue::new(Arc::clone(&ids), 0.02);
        let sender = queue.sender();
        let a = sender
            .add_prim(PrimDescriptor::new(DVec3::ZERO, DVec3::ONE))
            .expect("add");
        let b = sender
            .add_prim(PrimDescriptor::new(DVec3::ZERO, DVec3::ONE))
            .expect("add");
        assert_ne!(a, b);
        assert!(ids.is_live(a));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_disconnected_queue() {
        let sender = queue().sender();
        assert_eq!(
            sender.set_physical(BodyId::new(1), true),
            Err(PhysicsError::QueueDisconnected)
        );
    }

    #[test]
    fn test_push_force_scaled_to_impulse() {
        let queue = ChangeQueue::new(Arc::new(IdAllocator::new()), 0.5);
        let sender = queue.sender();
        let id = BodyId::new(1);
        sender.add_force(id, DVec3::new(0.0, 0.0, 2.0), true).expect("enqueue");
        sender.add_force(id, DVec3::new(0.0, 0.0, 2.0), false).expect("enqueue");
        let drained = queue.drain();
        assert_eq!(drained[0].change, Change::AddForce(DVec3::new(0.0, 0.0, 1.0)));
        assert_eq!(drained[1].change, Change::AddForce(DVec3::new(0.0, 0.0, 2.0)));
    }

    #[test]
    fn test_lock_axes_from_vector() {
        let queue = queue();
        let sender = queue.sender();
        sender
            .lock_angular_motion(BodyId::new(1), DVec3::new(0.0, 1.0, 0.0))
            .expect("enqueue");
        let drained = queue.drain();
        assert_eq!(
            drained[0].change,
            Change::AngularLock(AxisLock {
                x: false,
                y: true,
                z: false
            })
        );
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = queue();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sender = queue.sender();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let x = i as f64;
                        sender
                            .set_position(BodyId::new(t + 1), DVec3::new(x, 0.0, 0.0))
                            .expect("enqueue");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("producer thread");
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 400);
        for t in 1..=4 {
            let xs: Vec<f64> = drained
                .iter()
                .filter(|r| r.target == BodyId::new(t))
                .map(|r| match r.change {
                    Change::Position(p) => p.x,
                    _ => f64::NAN,
                })
                .collect();
            assert_eq!(xs.len(), 100);
            assert!(xs.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
