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
//! Applying queued changes to bodies
//!
//! Every [`Change`] variant maps to one handler here. Handlers run on the
//! simulation thread only, between ticks, and are the sole writers of body
//! state and native objects outside the per-tick motion passes.
//!
//! Apart from `Add` and `Remove`, changes for a body without a geometry
//! are dropped: there is nothing native to update.

use super::{BodyArena, PhysicsBody, SimContext};
use crate::change::Change;
use crate::id::BodyId;
use crate::shape::{sanitize_size, ShapeDescriptor};
use crate::vehicle::{Vehicle, VehicleType};
use glam::{DQuat, DVec3};

impl BodyArena {
    /// Apply one change to `id`
    ///
    /// `volume` is a precomputed volume for an `Add`. Returns false if the
    /// change was dropped.
    pub(crate) fn apply_change(
        &mut self,
        id: BodyId,
        change: Change,
        volume: Option<f64>,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        match change {
            Change::Add(descriptor) => return self.insert(id, &descriptor, volume, ctx),
            Change::Remove => return self.remove(id, ctx).is_some(),
            _ => {}
        }

        let Some(prim) = self.get(id) else {
            log::debug!(
                target: "prim_physics::body",
                "dropping {} for unknown {}",
                change.kind_name(),
                id
            );
            return false;
        };
        if prim.geometry.is_none() {
            log::debug!(
                target: "prim_physics::body",
                "dropping {} for {} without geometry",
                change.kind_name(),
                id
            );
            return false;
        }

        match change {
            Change::Add(_) | Change::Remove | Change::Null => {}
            Change::Link(parent) => self.change_link(id, Some(parent), ctx),
            Change::Delink => self.change_link(id, None, ctx),
            Change::Position(position) => self.change_pose(id, Some(position), None, ctx),
            Change::Orientation(orientation) => {
                self.change_pose(id, None, Some(orientation.normalize()), ctx)
            }
            Change::PositionAndOrientation(position, orientation) => {
                self.change_pose(id, Some(position), Some(orientation.normalize()), ctx)
            }
            Change::Velocity(velocity) => self.change_velocity(id, velocity, false, ctx),
            Change::AngularVelocity(velocity) => self.change_velocity(id, velocity, true, ctx),
            Change::Force(force) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.force = force;
                    prim.wake(ctx.engine);
                }
            }
            Change::Torque(torque) => {
                if self.wake_unless_selected(id, ctx) {
                    if let Some(prim) = self.get_mut(id) {
                        prim.torque = torque;
                    }
                }
            }
            Change::AddForce(impulse) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.force_acc += impulse * ctx.config.inv_timestep();
                }
                if self.wake_unless_selected(id, ctx) {
                    if let Some(prim) = self.get_mut(id) {
                        prim.reset_collision_accounting();
                    }
                }
            }
            Change::AddAngularForce(impulse) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.angular_force_acc += impulse * ctx.config.inv_timestep();
                }
                if self.wake_unless_selected(id, ctx) {
                    if let Some(prim) = self.get_mut(id) {
                        prim.reset_collision_accounting();
                    }
                }
            }
            Change::AngularLock(lock) => self.set_angular_lock(id, lock, ctx.engine),
            Change::Size(size) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.size = size;
                }
                self.change_size_shape(id, ctx);
            }
            Change::Shape(shape) => {
                self.set_shape(id, *shape);
                self.change_size_shape(id, ctx);
            }
            Change::ShapeAndSize(shape, size) => {
                self.set_shape(id, *shape);
                if let Some(prim) = self.get_mut(id) {
                    prim.size = size;
                }
                self.change_size_shape(id, ctx);
            }
            Change::CollidesWater(on) => {
                self.update_flags(id, ctx, |prim| prim.flags.collides_water = on)
            }
            Change::VolumeDetect(on) => {
                self.update_flags(id, ctx, |prim| prim.flags.volume_detect = on)
            }
            Change::Phantom(on) => self.update_flags(id, ctx, |prim| prim.flags.phantom = on),
            Change::Physical(on) => self.change_physical(id, on, ctx),
            Change::Selected(on) => {
                let last = self.get(id).map(|p| p.last_done_selected);
                if last != Some(on) {
                    if let Some(prim) = self.get_mut(id) {
                        prim.last_done_selected = on;
                    }
                    self.do_selected_status(id, on, ctx.engine);
                }
            }
            Change::Disabled(on) => {
                let disabled = self.get(id).is_some_and(|p| p.flags.disabled);
                if on && !disabled {
                    self.disable_soft(id, ctx.engine);
                } else if !on && disabled {
                    self.enable_soft(id, ctx.engine);
                }
            }
            Change::Building(on) => self.change_building(id, on, ctx),
            Change::Buoyancy(buoyancy) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.buoyancy = buoyancy;
                }
            }
            Change::PidTarget(target) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.move_to.target = target;
                }
            }
            Change::PidTau(tau) => {
                let tau = normalize_tau(tau, ctx.config.min_controller_tau());
                if let Some(prim) = self.get_mut(id) {
                    prim.move_to.tau = tau;
                }
            }
            Change::PidActive(active) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.move_to.active = active;
                }
            }
            Change::Hover(mut hover) => {
                hover.tau = normalize_tau(hover.tau, ctx.config.min_controller_tau());
                if hover.height == 0.0 {
                    hover.active = false;
                }
                if let Some(prim) = self.get_mut(id) {
                    prim.hover = hover;
                }
            }
            Change::Material(material) => {
                if let Some(prim) = self.get_mut(id) {
                    prim.material = material;
                }
            }
            Change::Density(density) => {
                if let Some(prim) = self.get_mut(id) {
                    if density > 0.0 {
                        prim.density = density;
                    } else {
                        log::warn!(
                            target: "prim_physics::body",
                            "ignoring non-positive density {} for {}",
                            density,
                            id
                        );
                    }
                }
            }
            Change::VehicleType(kind) => {
                if let Some(prim) = self.get_mut(id) {
                    if kind == VehicleType::None {
                        prim.vehicle = None;
                    } else {
                        prim.vehicle.get_or_insert_with(|| Vehicle::new(kind)).set_type(kind);
                    }
                }
            }
            Change::VehicleFloatParam(param, value) => {
                if let Some(vehicle) = self.get_mut(id).and_then(|p| p.vehicle.as_mut()) {
                    vehicle.set_float(param, value);
                }
            }
            Change::VehicleVectorParam(param, value) => {
                if let Some(vehicle) = self.get_mut(id).and_then(|p| p.vehicle.as_mut()) {
                    vehicle.set_vector(param, value);
                }
            }
            Change::VehicleRotationParam(param, value) => {
                if let Some(vehicle) = self.get_mut(id).and_then(|p| p.vehicle.as_mut()) {
                    vehicle.set_rotation(param, value);
                }
            }
            Change::VehicleFlags(flags, on) => {
                if let Some(vehicle) = self.get_mut(id).and_then(|p| p.vehicle.as_mut()) {
                    vehicle.set_flags(flags, on);
                }
            }
            Change::SubscribeCollisions(interval_ms) => self.subscribe_collisions(id, interval_ms),
            Change::UnsubscribeCollisions => self.unsubscribe_collisions(id),
            Change::CrossingFailure => self.crossing_failure(id, ctx),
        }
        true
    }

    fn change_link(&mut self, id: BodyId, new_parent: Option<BodyId>, ctx: &mut SimContext<'_>) {
        let current = self.get(id).and_then(|p| p.parent);
        if let Some(parent) = new_parent {
            if !self.contains(parent) {
                log::warn!(
                    target: "prim_physics::body",
                    "cannot link {} to unknown {}",
                    id,
                    parent
                );
                return;
            }
        }
        match (current, new_parent) {
            (None, Some(parent)) => self.parent_prim(parent, id, ctx),
            (Some(old), new) if new != Some(old) => {
                self.child_delink(old, id, new.is_none(), ctx);
                if let Some(parent) = new {
                    self.rebuild(old, ctx);
                    self.parent_prim(parent, id, ctx);
                }
            }
            _ => {}
        }
    }

    /// Move and/or rotate a body
    ///
    /// A linkset child that moves while its root has a native body gets
    /// the root's body rebuilt so the composite inertia follows the new
    /// layout; while building only the cached pose changes.
    fn change_pose(
        &mut self,
        id: BodyId,
        position: Option<DVec3>,
        orientation: Option<DQuat>,
        ctx: &mut SimContext<'_>,
    ) {
        self.check_delay_select(id, ctx.engine);
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        let position = position.unwrap_or(prim.position);
        let orientation = orientation.unwrap_or(prim.orientation);
        let moved = position != prim.position;
        let rotated = orientation != prim.orientation;
        prim.position = position;
        prim.orientation = orientation;
        let building = prim.flags.building;
        let physical = prim.flags.physical;

        match prim.parent {
            Some(root) => {
                if self.has_body(root) {
                    if (moved || rotated) && !building {
                        self.rebuild(root, ctx);
                        self.wake(root, ctx);
                    }
                } else if moved || rotated {
                    self.place_geometry(id, ctx.engine);
                }
            }
            None => {
                if moved || rotated {
                    self.set_root_pose(id, ctx);
                }
                if rotated {
                    self.create_angular_motor(id, ctx.engine);
                }
                if physical {
                    self.wake(id, ctx);
                }
            }
        }
        if let Some(prim) = self.get_mut(id) {
            prim.reset_collision_accounting();
        }
    }

    /// Push a root's cached pose to its native body, or to its geometry if
    /// it has no body
    pub(crate) fn set_root_pose(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        let Some(prim) = self.get(id) else {
            return;
        };
        match prim.body {
            Some(body) => {
                ctx.engine.set_position(
                    body.raw(),
                    prim.position + prim.orientation * prim.center_of_mass,
                );
                ctx.engine.set_orientation(body.raw(), prim.orientation);
                self.propagate_child_poses(id);
            }
            None => self.place_geometry(id, ctx.engine),
        }
    }

    fn wake(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        if let Some(prim) = self.get(id) {
            prim.wake(ctx.engine);
        }
    }

    /// Re-enable a physical body about to receive motion; false while selected
    fn wake_unless_selected(&mut self, id: BodyId, ctx: &mut SimContext<'_>) -> bool {
        let Some(prim) = self.get(id) else {
            return false;
        };
        if prim.flags.selected {
            return false;
        }
        if prim.flags.physical && prim.body.is_some() {
            if prim.flags.disabled {
                self.enable_soft(id, ctx.engine);
            } else {
                prim.wake(ctx.engine);
            }
        }
        true
    }

    fn change_velocity(
        &mut self,
        id: BodyId,
        velocity: DVec3,
        angular: bool,
        ctx: &mut SimContext<'_>,
    ) {
        let Some(prim) = self.get(id) else {
            return;
        };
        if !prim.flags.selected {
            if let Some(body) = prim.body {
                if prim.flags.disabled {
                    self.enable_soft(id, ctx.engine);
                } else {
                    prim.wake(ctx.engine);
                }
                if angular {
                    ctx.engine.set_angular_velocity(body.raw(), velocity);
                } else {
                    ctx.engine.set_linear_velocity(body.raw(), velocity);
                }
            }
        }
        if let Some(prim) = self.get_mut(id) {
            if angular {
                prim.angular_velocity = velocity;
            } else {
                prim.velocity = velocity;
            }
        }
    }

    fn set_shape(&mut self, id: BodyId, shape: ShapeDescriptor) {
        if let Some(prim) = self.get_mut(id) {
            prim.shape = shape;
        }
    }

    /// Rebuild geometry and mass data after a size or shape change
    fn change_size_shape(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        self.check_delay_select(id, ctx.engine);
        let root = self.root_of(id);
        self.destroy_body(root, ctx);
        self.remove_geometry(id, ctx.engine);

        if let Some(prim) = self.get_mut(id) {
            prim.size = sanitize_size(prim.size);
        }
        if self.create_geometry(id, None, ctx) {
            self.place_geometry(id, ctx.engine);
        }
        self.rebuild(root, ctx);
        if let Some(prim) = self.get_mut(id) {
            prim.reset_collision_accounting();
        }
    }

    /// Set flags through `update` and refresh the linkset's collision bits
    fn update_flags<F>(&mut self, id: BodyId, ctx: &mut SimContext<'_>, update: F)
    where
        F: FnOnce(&mut PhysicsBody),
    {
        if let Some(prim) = self.get_mut(id) {
            update(prim);
        }
        self.apply_collision_bits(id, ctx.engine);
    }

    fn change_physical(&mut self, id: BodyId, physical: bool, ctx: &mut SimContext<'_>) {
        self.check_delay_select(id, ctx.engine);
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        prim.flags.physical = physical;
        if prim.parent.is_none() {
            if physical {
                if prim.body.is_none() {
                    self.rebuild(id, ctx);
                }
            } else {
                self.destroy_body(id, ctx);
                if let Some(prim) = self.get_mut(id) {
                    prim.stop(ctx.engine);
                }
                self.apply_collision_bits(id, ctx.engine);
            }
        }
        if let Some(prim) = self.get_mut(id) {
            prim.reset_collision_accounting();
        }
    }

    fn change_building(&mut self, id: BodyId, building: bool, ctx: &mut SimContext<'_>) {
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        if prim.flags.building == building {
            return;
        }
        prim.flags.building = building;
        let is_root = prim.parent.is_none();
        let children = if is_root { prim.children.clone() } else { Vec::new() };

        if building {
            if is_root {
                self.destroy_body(id, ctx);
            }
        } else {
            self.check_delay_select(id, ctx.engine);
        }
        for child in &children {
            if let Some(prim) = self.get_mut(*child) {
                prim.flags.building = building;
            }
        }
        if !building && is_root {
            self.make_body(id, ctx);
        }
    }

    fn subscribe_collisions(&mut self, id: BodyId, interval_ms: u32) {
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        prim.collisions.interval_ms = interval_ms;
        prim.collisions.elapsed_ms = 0;
        prim.collisions.sent_empty = false;
        prim.collisions.contacts.clear();
        if interval_ms > 0 {
            self.add_reporter(id);
        } else {
            self.remove_reporter(id);
        }
    }

    fn unsubscribe_collisions(&mut self, id: BodyId) {
        if let Some(prim) = self.get_mut(id) {
            prim.collisions.interval_ms = 0;
            prim.collisions.elapsed_ms = 0;
            prim.collisions.contacts.clear();
        }
        self.remove_reporter(id);
    }
}

/// Clamp a controller time constant: non-positive turns the controller off
fn normalize_tau(tau: f64, min_tau: f64) -> f64 {
    if tau <= 0.0 {
        0.0
    } else {
        tau.max(min_tau)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{CollisionCategories, PrimDescriptor};
    use crate::config::SceneConfig;
    use crate::constraint::ConstraintCollection;
    use crate::engine::{AxisLock, NullMesher, PhysicsEngine, SandboxEngine};
    use crate::events::SceneEvent;
    use crate::terrain::Terrain;
    use approx::assert_relative_eq;

    struct Fixture {
        engine: SandboxEngine,
        config: SceneConfig,
        constraints: ConstraintCollection,
        terrain: Terrain,
        events: Vec<SceneEvent>,
        arena: BodyArena,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                engine: SandboxEngine::new(),
                config: SceneConfig::default(),
                constraints: ConstraintCollection::new(),
                terrain: Terrain::default(),
                events: Vec::new(),
                arena: BodyArena::new(),
            }
        }

        fn apply(&mut self, id: BodyId, change: Change) -> bool {
            let mut ctx = SimContext {
                engine: &mut self.engine,
                mesher: &NullMesher,
                config: &self.config,
                constraints: &self.constraints,
                terrain: &self.terrain,
                events: &mut self.events,
            };
            self.arena.apply_change(id, change, None, &mut ctx)
        }

        fn add(&mut self, id: u32, descriptor: PrimDescriptor) -> BodyId {
            let id = BodyId::new(id);
            assert!(self.apply(id, Change::Add(Box::new(descriptor))));
            id
        }

        fn body(&self, id: BodyId) -> &PhysicsBody {
            self.arena.get(id).expect("body exists")
        }

        fn engine_enabled(&self, id: BodyId) -> bool {
            let raw = self.body(id).body_handle().expect("native body").raw();
            self.engine.is_body_enabled(raw)
        }
    }

    fn at(x: f64) -> PrimDescriptor {
        PrimDescriptor::new(DVec3::new(x, 128.0, 30.0), DVec3::ONE)
    }

    #[test]
    fn test_unknown_body_is_dropped() {
        let mut fx = Fixture::new();
        assert!(!fx.apply(BodyId::new(9), Change::Position(DVec3::ONE)));
    }

    #[test]
    fn test_static_position_moves_geometry() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0));
        let target = DVec3::new(100.0, 100.0, 25.0);
        assert!(fx.apply(id, Change::Position(target)));

        let prim = fx.body(id);
        assert_eq!(prim.position(), target);
        let geometry = prim.geometry().expect("geometry");
        let (pose, _) = fx.engine.geometry_pose(geometry.raw()).expect("pose");
        assert_eq!(pose, target);
    }

    #[test]
    fn test_child_move_rebuilds_root() {
        let mut fx = Fixture::new();
        let root = fx.add(1, at(128.0).physical());
        let child = fx.add(2, at(130.0));
        fx.apply(child, Change::Link(root));
        let before = fx.body(root).body_handle().expect("body");

        fx.apply(child, Change::Position(DVec3::new(132.0, 128.0, 30.0)));

        let after = fx.body(root).body_handle().expect("body");
        assert_ne!(before, after);
        assert_relative_eq!(fx.body(root).center_of_mass.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_physical_toggle() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0));
        fx.apply(id, Change::Velocity(DVec3::X));
        fx.apply(id, Change::Physical(true));
        assert!(fx.body(id).body_handle().is_some());
        assert!(fx.arena.is_active(id));

        fx.apply(id, Change::Physical(false));
        let prim = fx.body(id);
        assert!(prim.body_handle().is_none());
        assert_eq!(prim.velocity(), DVec3::ZERO);
        assert_eq!(fx.engine.body_count(), 0);
    }

    #[test]
    fn test_disabled_is_idempotent() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::Disabled(true));
        let first = fx.body(id).collision_bits();
        fx.apply(id, Change::Disabled(true));
        assert_eq!(fx.body(id).collision_bits(), first);
        assert!(first.categories.is_empty());
        assert!(!fx.engine_enabled(id));

        fx.apply(id, Change::Disabled(false));
        assert_eq!(fx.body(id).collision_bits().categories, CollisionCategories::GEOM);
        assert!(fx.engine_enabled(id));
    }

    #[test]
    fn test_selected_torque_is_ignored() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::Selected(true));
        fx.apply(id, Change::Torque(DVec3::Z));
        assert_eq!(fx.body(id).torque(), DVec3::ZERO);
        assert_eq!(fx.body(id).collision_bits().categories, CollisionCategories::SELECTED);

        fx.apply(id, Change::Selected(false));
        fx.apply(id, Change::Torque(DVec3::Z));
        assert_eq!(fx.body(id).torque(), DVec3::Z);
    }

    #[test]
    fn test_impulse_accumulates_as_force() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::AddForce(DVec3::new(0.0, 0.0, 1.0)));
        fx.apply(id, Change::AddForce(DVec3::new(0.0, 0.0, 1.0)));
        assert_relative_eq!(fx.body(id).force_acc.z, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_size_change_rebuilds_mass() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        let before = fx.body(id).prim_mass();
        fx.apply(id, Change::Size(DVec3::new(2.0, 1.0, -3.0)));

        let prim = fx.body(id);
        assert_eq!(prim.size(), DVec3::new(2.0, 1.0, 0.01));
        assert_relative_eq!(prim.prim_mass(), before * 0.02, epsilon = 1e-9);
        assert!(prim.body_handle().is_some());
        assert_eq!(fx.engine.geometry_count(), 1);
    }

    #[test]
    fn test_pid_tau_normalized() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::PidTau(0.001));
        assert_eq!(fx.body(id).move_to_target().tau, 0.05);
        fx.apply(id, Change::PidTau(-1.0));
        assert_eq!(fx.body(id).move_to_target().tau, 0.0);
        fx.apply(id, Change::PidTau(2.0));
        assert_eq!(fx.body(id).move_to_target().tau, 2.0);
    }

    #[test]
    fn test_angular_lock_creates_motor() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::AngularLock(AxisLock::LOCKED));
        assert!(fx.body(id).has_angular_motor());
        assert_eq!(fx.engine.constraint_count(), 1);

        fx.apply(id, Change::AngularLock(AxisLock::FREE));
        assert!(!fx.body(id).has_angular_motor());
        assert_eq!(fx.engine.constraint_count(), 0);
    }

    #[test]
    fn test_relink_moves_child_between_roots() {
        let mut fx = Fixture::new();
        let a = fx.add(1, at(120.0).physical());
        let b = fx.add(2, at(130.0).physical());
        let c = fx.add(3, at(122.0).physical());

        fx.apply(c, Change::Link(a));
        assert_eq!(fx.body(c).parent(), Some(a));
        fx.apply(c, Change::Link(b));

        assert_eq!(fx.body(c).parent(), Some(b));
        assert!(fx.body(a).children().is_empty());
        assert_eq!(fx.body(b).children(), &[c]);
        assert!(fx.body(a).body_handle().is_some());
        assert!(fx.body(b).body_handle().is_some());
        assert_eq!(fx.engine.body_count(), 2);

        fx.apply(c, Change::Delink);
        assert_eq!(fx.body(c).parent(), None);
        assert!(fx.body(c).body_handle().is_some());
        assert_eq!(fx.engine.body_count(), 3);
    }

    #[test]
    fn test_vehicle_type_none_removes_vehicle() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::VehicleType(VehicleType::Car));
        assert_eq!(fx.body(id).vehicle().map(|v| v.kind()), Some(VehicleType::Car));
        fx.apply(id, Change::VehicleType(VehicleType::None));
        assert!(fx.body(id).vehicle().is_none());
    }

    #[test]
    fn test_building_defers_body() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(128.0).physical());
        fx.apply(id, Change::Building(true));
        assert!(fx.body(id).body_handle().is_none());
        fx.apply(id, Change::Position(DVec3::new(127.0, 128.0, 30.0)));
        fx.apply(id, Change::Building(false));
        assert!(fx.body(id).body_handle().is_some());
    }
}
