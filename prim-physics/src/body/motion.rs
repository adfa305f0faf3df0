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
//! Per-tick motion passes
//!
//! Three passes run around every engine step:
//!
//! 1. `move_bodies` computes the force and torque for every active root
//!    and hands them to the engine,
//! 2. `route_contacts` attributes the engine's contacts to subscribed
//!    bodies,
//! 3. `update_bodies` reads the integrated state back, enforces region
//!    bounds and raises terse updates.
//!
//! Collision batches go out last, through `send_collisions`.
//!
//! # Force model
//!
//! ```text
//! free:     F = m * g * (1 - buoyancy) + F_const + F_impulse
//! move-to:  v* = clamp((target - x) / tau, 0.05, 50)
//!           F = m * (v* - v) / dt
//! hover:    vz* = clamp((h - z) / tau, 0.1, 50)
//!           Fz = m * (vz* - vz) / dt
//! ```

use super::{BodyArena, HoverKind, PhysicsBody, SimContext};
use crate::config::COLLISION_FRAME_TIME_CAP_MS;
use crate::engine::{BodyState, Contact};
use crate::events::{CollisionContact, SceneEvent};
use crate::id::BodyId;
use crate::vehicle::{VehicleInput, VehicleType};
use glam::{DQuat, DVec3};

/// Ticks a sleeping body waits before it is woken again
const WAKE_INTERVAL: u32 = 20;

/// Move-to error below which the body snaps onto the target
const MOVE_TO_SNAP: f64 = 0.02;
const MOVE_TO_MIN_SPEED: f64 = 0.05;
const MOVE_TO_MAX_SPEED: f64 = 50.0;

/// Hover error below which the body snaps onto the target height
const HOVER_SNAP: f64 = 0.01;
const HOVER_MIN_SPEED: f64 = 0.1;
const HOVER_MAX_SPEED: f64 = 50.0;

/// Position delta under which a body counts as not moving
const SETTLE_POSITION: f64 = 0.001;
/// Orientation delta (x, y, z only) under which a body counts as not rotating
const SETTLE_ORIENTATION: f64 = 0.0001;
/// Native speed under which velocity is derived from the position delta
const NATIVE_VELOCITY_FLOOR: f64 = 0.001;
/// Acceleration components below this are reported as zero
const ACCELERATION_SNAP: f64 = 0.01;

/// Region margins for parking bodies that cross the X/Y edges
const EDGE_NEAR: f64 = 0.1;
const EDGE_FAR: f64 = 2.0;

/// Crossing failure margins
const CROSSING_INSET: f64 = 0.5;
const CROSSING_LIFT: f64 = 0.2;
const CROSSING_MAX_Z: f64 = 50_000.0;

/// Root frame pose of a native body state
fn root_pose(state: &BodyState, center_of_mass: DVec3) -> (DVec3, DQuat) {
    (
        state.position - state.orientation * center_of_mass,
        state.orientation,
    )
}

fn all_below(v: DVec3, limit: f64) -> bool {
    v.x.abs() < limit && v.y.abs() < limit && v.z.abs() < limit
}

fn orientation_settled(a: DQuat, b: DQuat) -> bool {
    (a.x - b.x).abs() < SETTLE_ORIENTATION
        && (a.y - b.y).abs() < SETTLE_ORIENTATION
        && (a.z - b.z).abs() < SETTLE_ORIENTATION
}

/// Scale `v` so its length lies in `[min, max]`; zero stays zero
fn clamp_speed(v: DVec3, min: f64, max: f64) -> DVec3 {
    let length = v.length();
    if length == 0.0 {
        v
    } else {
        v * (length.clamp(min, max) / length)
    }
}

/// Whether a body takes part in the pre-step force pass
fn is_movable(prim: &PhysicsBody) -> bool {
    prim.parent.is_none()
        && prim.flags.physical
        && prim.body.is_some()
        && !prim.flags.disabled
        && !prim.flags.selected
        && !prim.flags.building
        && !prim.flags.out_of_bounds
}

impl BodyArena {
    /// Apply this tick's forces to every active root
    pub(crate) fn move_bodies(&mut self, ctx: &mut SimContext<'_>) {
        let ids: Vec<BodyId> = self.active_ids().collect();
        for id in ids {
            self.move_body(id, ctx);
        }
    }

    /// Compute and apply one root's force and torque
    pub(crate) fn move_body(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        if !is_movable(prim) {
            return;
        }
        let Some(body) = prim.body else {
            return;
        };
        let raw = body.raw();

        if !ctx.engine.is_body_enabled(raw) {
            let has_vehicle = prim
                .vehicle
                .as_ref()
                .map_or(false, |v| v.kind() != VehicleType::None);
            if has_vehicle {
                return;
            }
            prim.sleep_counter += 1;
            if prim.sleep_counter < WAKE_INTERVAL {
                return;
            }
            prim.sleep_counter = 0;
            ctx.engine.set_body_enabled(raw, true);
        }

        let Some(state) = ctx.engine.body_state(raw) else {
            return;
        };
        let (position, orientation) = root_pose(&state, prim.center_of_mass);
        let velocity = state.linear_velocity;
        let mass = prim.mass;
        let inv_dt = ctx.config.inv_timestep();

        let mut force = DVec3::ZERO;
        let mut torque = DVec3::ZERO;

        let vehicle = prim.vehicle.as_mut().filter(|v| v.kind() != VehicleType::None);
        if let Some(vehicle) = vehicle {
            let input = VehicleInput {
                mass,
                position,
                orientation,
                linear_velocity: velocity,
                angular_velocity: state.angular_velocity,
                gravity: ctx.config.gravity,
                ground_height: ctx.terrain.height_at(position.x, position.y),
                water_level: ctx.terrain.water_level(),
                timestep: ctx.config.timestep,
            };
            let output = vehicle.step(&input);
            force += output.force;
            torque += output.torque;
        } else if prim.move_to.is_engaged() {
            let error = prim.move_to.target - position;
            if all_below(error, MOVE_TO_SNAP) {
                let target = prim.move_to.target;
                prim.position = target;
                prim.velocity = DVec3::ZERO;
                ctx.engine
                    .set_position(raw, target + orientation * prim.center_of_mass);
                ctx.engine.set_linear_velocity(raw, DVec3::ZERO);
                prim.force_acc = DVec3::ZERO;
                prim.angular_force_acc = DVec3::ZERO;
                self.propagate_child_poses(id);
                return;
            }
            let wanted =
                clamp_speed(error / prim.move_to.tau, MOVE_TO_MIN_SPEED, MOVE_TO_MAX_SPEED);
            prim.target_velocity = wanted;
            force += (wanted - velocity) * inv_dt * mass;
        } else if prim.hover.is_engaged() {
            let ground = ctx.terrain.height_at(position.x, position.y);
            let surface = match prim.hover.kind {
                HoverKind::Ground => ground,
                HoverKind::GroundAndWater => ground.max(ctx.terrain.water_level()),
            };
            let target = surface + prim.hover.height;
            let error = target - position.z;
            // no drive at all, gravity included, while the target is underground
            let reachable = target > ground || prim.flags.volume_detect;
            if reachable && error.abs() < HOVER_SNAP {
                let snapped = DVec3::new(position.x, position.y, target);
                ctx.engine
                    .set_position(raw, snapped + orientation * prim.center_of_mass);
                ctx.engine
                    .set_linear_velocity(raw, DVec3::new(velocity.x, velocity.y, 0.0));
            } else if reachable {
                let wanted = (error / prim.hover.tau).abs().clamp(HOVER_MIN_SPEED, HOVER_MAX_SPEED)
                    * error.signum();
                prim.target_velocity = DVec3::new(0.0, 0.0, wanted);
                force.z += (wanted - velocity.z) * inv_dt * mass;
            }
        } else {
            force += ctx.config.gravity * (1.0 - prim.buoyancy) * mass;
        }

        force += prim.force + prim.force_acc;
        torque += prim.torque + prim.angular_force_acc;
        prim.force_acc = DVec3::ZERO;
        prim.angular_force_acc = DVec3::ZERO;

        if force.is_finite() && force != DVec3::ZERO {
            ctx.engine.apply_force(raw, force);
        }
        if torque.is_finite() && torque != DVec3::ZERO {
            ctx.engine.apply_torque(raw, torque);
        }
    }

    /// Read back every active root after a step
    ///
    /// Returns the number of bodies whose cached state was refreshed.
    pub(crate) fn update_bodies(&mut self, ctx: &mut SimContext<'_>) -> usize {
        let ids: Vec<BodyId> = self.active_ids().collect();
        ids.into_iter()
            .filter(|id| self.update_position_and_velocity(*id, ctx))
            .count()
    }

    /// Refresh one root's cached pose, velocity and acceleration
    ///
    /// Bodies leaving the region are clamped, stopped, disabled and
    /// reported with an [`SceneEvent::OutOfBounds`].
    pub(crate) fn update_position_and_velocity(
        &mut self,
        id: BodyId,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        let Some(prim) = self.get_mut(id) else {
            return false;
        };
        if prim.parent.is_some()
            || prim.flags.disabled
            || prim.flags.building
            || prim.flags.out_of_bounds
        {
            return false;
        }
        let Some(body) = prim.body else {
            return false;
        };
        let raw = body.raw();
        if !ctx.engine.is_body_enabled(raw) && prim.settled {
            return false;
        }
        let Some(state) = ctx.engine.body_state(raw) else {
            return false;
        };
        let (mut position, orientation) = root_pose(&state, prim.center_of_mass);

        let config = ctx.config;
        let extents = config.world_extents;
        let mut out_of_bounds = false;
        if position.z < config.min_z || position.z > config.max_z {
            position.z = position.z.clamp(config.min_z, config.max_z);
            out_of_bounds = true;
        }
        if position.x < 0.0 {
            position.x = position.x.clamp(-EDGE_FAR, -EDGE_NEAR);
            out_of_bounds = true;
        } else if position.x > extents.x {
            position.x = position.x.clamp(extents.x + EDGE_NEAR, extents.x + EDGE_FAR);
            out_of_bounds = true;
        }
        if position.y < 0.0 {
            position.y = position.y.clamp(-EDGE_FAR, -EDGE_NEAR);
            out_of_bounds = true;
        } else if position.y > extents.y {
            position.y = position.y.clamp(extents.y + EDGE_NEAR, extents.y + EDGE_FAR);
            out_of_bounds = true;
        }

        if out_of_bounds {
            log::info!(
                target: "prim_physics::body",
                "{} left the region, parking at {}",
                id,
                position
            );
            prim.position = position;
            prim.orientation = orientation;
            prim.velocity = DVec3::ZERO;
            prim.angular_velocity = DVec3::ZERO;
            prim.acceleration = DVec3::ZERO;
            prim.settled = true;
            prim.flags.out_of_bounds = true;
            let center = position + orientation * prim.center_of_mass;
            ctx.engine.set_linear_velocity(raw, DVec3::ZERO);
            ctx.engine.set_angular_velocity(raw, DVec3::ZERO);
            ctx.engine.set_position(raw, center);
            self.propagate_child_poses(id);
            self.disable_soft(id, ctx.engine);
            self.send_terse_update(id, ctx.events);
            ctx.events.push(SceneEvent::OutOfBounds { body: id, position });
            return true;
        }

        let was_settled = prim.settled;
        let settled = all_below(prim.position - position, SETTLE_POSITION)
            && orientation_settled(prim.orientation, orientation);
        prim.settled = settled;

        if !(settled && was_settled) {
            let inv_dt = config.inv_timestep();
            let previous = prim.velocity;
            prim.velocity = if all_below(state.linear_velocity, NATIVE_VELOCITY_FLOOR) {
                (position - prim.position) * inv_dt
            } else {
                state.linear_velocity
            };
            let acceleration = (prim.velocity - previous) * inv_dt;
            prim.acceleration = if all_below(acceleration, ACCELERATION_SNAP) {
                DVec3::ZERO
            } else {
                acceleration
            };
            prim.angular_velocity = if orientation_settled(prim.orientation, orientation) {
                DVec3::ZERO
            } else {
                state.angular_velocity
            };
        }

        if settled {
            if was_settled {
                prim.velocity = DVec3::ZERO;
                prim.acceleration = DVec3::ZERO;
                prim.angular_velocity = DVec3::ZERO;
            }
            if !prim.last_update_sent {
                if was_settled {
                    prim.last_update_sent = true;
                }
                self.send_terse_update(id, ctx.events);
            }
            return true;
        }

        prim.position = position;
        prim.orientation = orientation;
        prim.last_update_sent = false;
        self.propagate_child_poses(id);
        self.send_terse_update(id, ctx.events);
        true
    }

    /// Bring a body that failed to leave the region back inside it
    pub(crate) fn crossing_failure(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        if !prim.flags.out_of_bounds {
            return;
        }
        let extents = ctx.config.world_extents;
        let position = DVec3::new(
            prim.position
                .x
                .clamp(CROSSING_INSET, extents.x - CROSSING_INSET),
            prim.position
                .y
                .clamp(CROSSING_INSET, extents.y - CROSSING_INSET),
            (prim.position.z + CROSSING_LIFT).clamp(ctx.config.min_z, CROSSING_MAX_Z),
        );
        prim.position = position;
        prim.velocity = DVec3::ZERO;
        prim.acceleration = DVec3::ZERO;
        prim.settled = false;
        if let Some(vehicle) = prim.vehicle.as_mut() {
            if vehicle.kind() != VehicleType::None {
                vehicle.stop();
            }
        }
        if let Some(body) = prim.body {
            ctx.engine.set_linear_velocity(body.raw(), DVec3::ZERO);
        }
        prim.flags.out_of_bounds = false;
        log::debug!(
            target: "prim_physics::body",
            "{} crossing failed, returned to {}",
            id,
            position
        );

        self.set_root_pose(id, ctx);
        self.enable_soft(id, ctx.engine);
        self.send_terse_update(id, ctx.events);
    }

    /// Attribute the engine's contacts to the bodies that own the geometry
    ///
    /// Every contact counts toward both bodies' collision score. Subscribed
    /// bodies also record it and rejoin the reporting set.
    pub(crate) fn route_contacts(&mut self, contacts: &[Contact]) {
        for contact in contacts {
            let Some(a) = self.owner_of(contact.geometry) else {
                continue;
            };
            let b = contact.other.and_then(|g| self.owner_of(g));
            self.record_contact(
                a,
                CollisionContact {
                    other: b,
                    position: contact.position,
                    normal: contact.normal,
                    depth: contact.depth,
                },
            );
            if let Some(b) = b {
                self.record_contact(
                    b,
                    CollisionContact {
                        other: Some(a),
                        position: contact.position,
                        normal: -contact.normal,
                        depth: contact.depth,
                    },
                );
            }
        }
    }

    fn record_contact(&mut self, id: BodyId, contact: CollisionContact) {
        let Some(prim) = self.get_mut(id) else {
            return;
        };
        prim.collision_score += 1.0;
        if !prim.collisions.is_subscribed() {
            return;
        }
        prim.collisions.contacts.push(contact);
        self.add_reporter(id);
    }

    /// Advance every reporter's frame time and emit due collision batches
    ///
    /// A batch goes out once the subscription interval has elapsed. An
    /// empty batch is sent once; the body then leaves the reporting set
    /// until a new contact arrives.
    pub(crate) fn send_collisions(&mut self, frame_ms: u32, events: &mut Vec<SceneEvent>) {
        let reporters: Vec<BodyId> = self.collision_reporters().collect();
        for id in reporters {
            let Some(prim) = self.get_mut(id) else {
                self.remove_reporter(id);
                continue;
            };
            let subscription = &mut prim.collisions;
            if !subscription.is_subscribed() {
                self.remove_reporter(id);
                continue;
            }
            subscription.elapsed_ms = subscription
                .elapsed_ms
                .saturating_add(frame_ms)
                .min(COLLISION_FRAME_TIME_CAP_MS);
            if subscription.elapsed_ms < subscription.interval_ms {
                continue;
            }
            subscription.elapsed_ms = 0;

            let count = subscription.contacts.len();
            if subscription.sent_empty && count == 0 {
                continue;
            }
            events.push(SceneEvent::Collisions {
                body: id,
                contacts: std::mem::take(&mut subscription.contacts),
            });
            if count == 0 {
                subscription.sent_empty = true;
                self.remove_reporter(id);
            } else {
                subscription.sent_empty = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{HoverSettings, PrimDescriptor};
    use crate::change::Change;
    use crate::config::SceneConfig;
    use crate::constraint::ConstraintCollection;
    use crate::engine::{NullMesher, PhysicsEngine, SandboxEngine};
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
            Fixture::with_engine(SandboxEngine::new())
        }

        fn with_engine(engine: SandboxEngine) -> Self {
            Fixture {
                engine,
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

        fn tick(&mut self) -> usize {
            let frame_ms = (self.config.timestep * 1000.0).round() as u32;
            let mut ctx = SimContext {
                engine: &mut self.engine,
                mesher: &NullMesher,
                config: &self.config,
                constraints: &self.constraints,
                terrain: &self.terrain,
                events: &mut self.events,
            };
            self.arena.move_bodies(&mut ctx);
            let report = ctx
                .engine
                .step(ctx.config.timestep, ctx.config.max_substeps);
            self.arena.route_contacts(&report.contacts);
            let updated = self.arena.update_bodies(&mut ctx);
            self.arena.send_collisions(frame_ms, ctx.events);
            updated
        }

        fn body(&self, id: BodyId) -> &PhysicsBody {
            self.arena.get(id).expect("body exists")
        }
    }

    fn at(position: DVec3) -> PrimDescriptor {
        PrimDescriptor::new(position, DVec3::ONE)
    }

    #[test]
    fn test_clamp_speed() {
        let v = clamp_speed(DVec3::new(0.0, 0.0, 0.001), 0.05, 50.0);
        assert_relative_eq!(v.z, 0.05, epsilon = 1e-12);
        let v = clamp_speed(DVec3::new(300.0, 400.0, 0.0), 0.05, 50.0);
        assert_relative_eq!(v.length(), 50.0, epsilon = 1e-9);
        assert_eq!(clamp_speed(DVec3::ZERO, 0.05, 50.0), DVec3::ZERO);
    }

    #[test]
    fn test_gravity_moves_physical_body() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        assert_eq!(fx.tick(), 1);

        let prim = fx.body(id);
        assert!(prim.position().z < 50.0);
        assert_relative_eq!(prim.velocity().z, -9.8 * 0.02 * (1.0 - 0.002), epsilon = 1e-9);
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, SceneEvent::TerseUpdate { body, .. } if *body == id)));
    }

    #[test]
    fn test_full_buoyancy_floats() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        fx.apply(id, Change::Buoyancy(1.0));
        for _ in 0..5 {
            fx.tick();
        }
        assert_relative_eq!(fx.body(id).position().z, 50.0, epsilon = 1e-9);
        assert!(fx.body(id).is_settled());
    }

    #[test]
    fn test_z_out_of_bounds_is_clamped() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 150_000.0)).physical());
        fx.apply(id, Change::Velocity(DVec3::new(0.0, 0.0, 40.0)));
        fx.tick();

        let prim = fx.body(id);
        assert!(prim.flags().out_of_bounds);
        assert!(prim.flags().disabled);
        assert_eq!(prim.position().z, 100_000.0);
        assert_eq!(prim.velocity(), DVec3::ZERO);
        let event = fx
            .events
            .iter()
            .find_map(|e| match e {
                SceneEvent::OutOfBounds { body, position } if *body == id => Some(*position),
                _ => None,
            })
            .expect("out of bounds event");
        assert_eq!(event.z, 100_000.0);

        // parked bodies are no longer read back
        fx.events.clear();
        assert_eq!(fx.tick(), 0);
        assert!(fx.events.is_empty());
    }

    #[test]
    fn test_x_edge_parks_outside_region() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(255.99, 128.0, 50.0)).physical());
        fx.apply(id, Change::Buoyancy(1.0));
        fx.apply(id, Change::Velocity(DVec3::new(10.0, 0.0, 0.0)));
        fx.tick();

        let prim = fx.body(id);
        assert!(prim.flags().out_of_bounds);
        assert_relative_eq!(prim.position().x, 255.99 + 10.0 * 0.998 * 0.02, epsilon = 1e-9);
        assert!(fx
            .events
            .iter()
            .any(|e| matches!(e, SceneEvent::OutOfBounds { body, .. } if *body == id)));
    }

    #[test]
    fn test_crossing_failure_returns_body() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 150_000.0)).physical());
        fx.tick();
        assert!(fx.body(id).flags().out_of_bounds);

        fx.events.clear();
        assert!(fx.apply(id, Change::CrossingFailure));
        let prim = fx.body(id);
        assert!(!prim.flags().out_of_bounds);
        assert!(!prim.flags().disabled);
        assert_eq!(prim.position().z, 50_000.0);
        assert_eq!(prim.velocity(), DVec3::ZERO);
        let raw = prim.body_handle().expect("native body").raw();
        assert!(fx.engine.is_body_enabled(raw));
        assert_eq!(fx.events.len(), 1);
    }

    #[test]
    fn test_move_to_target_snaps() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        let target = DVec3::new(128.01, 128.0, 50.0);
        fx.apply(id, Change::PidTarget(target));
        fx.apply(id, Change::PidTau(1.0));
        fx.apply(id, Change::PidActive(true));
        fx.tick();
        assert_relative_eq!(fx.body(id).position().x, 128.01, epsilon = 1e-9);
        assert_eq!(fx.body(id).velocity(), DVec3::ZERO);
    }

    #[test]
    fn test_move_to_target_approaches() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        fx.apply(id, Change::PidTarget(DVec3::new(138.0, 128.0, 50.0)));
        fx.apply(id, Change::PidTau(1.0));
        fx.apply(id, Change::PidActive(true));
        fx.tick();
        let prim = fx.body(id);
        assert!(prim.position().x > 128.0);
        assert_relative_eq!(prim.position().z, 50.0, epsilon = 1e-9);
        assert_relative_eq!(prim.target_velocity.x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_hover_rises_toward_height() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 1.0)).physical());
        fx.apply(
            id,
            Change::Hover(HoverSettings {
                height: 5.0,
                tau: 1.0,
                kind: HoverKind::Ground,
                active: true,
            }),
        );
        fx.tick();
        assert!(fx.body(id).velocity().z > 0.0);
    }

    #[test]
    fn test_underground_hover_target_applies_no_force() {
        let sinking = HoverSettings {
            height: -3.0,
            tau: 1.0,
            kind: HoverKind::Ground,
            active: true,
        };
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        fx.apply(id, Change::Hover(sinking));
        fx.tick();
        assert_eq!(fx.body(id).velocity(), DVec3::ZERO);
        assert_relative_eq!(fx.body(id).position().z, 50.0, epsilon = 1e-9);

        let ghost = fx.add(2, at(DVec3::new(100.0, 100.0, 50.0)).physical().volume_detect());
        fx.apply(ghost, Change::Hover(sinking));
        fx.tick();
        assert!(fx.body(ghost).velocity().z < 0.0);
    }

    #[test]
    fn test_impulse_consumed_once() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        fx.apply(id, Change::Buoyancy(1.0));
        fx.apply(id, Change::AddForce(DVec3::new(1.0, 0.0, 0.0)));
        fx.tick();
        let first = fx.body(id).velocity().x;
        assert!(first > 0.0);
        assert_eq!(fx.body(id).force_acc, DVec3::ZERO);
        fx.tick();
        assert!(fx.body(id).velocity().x <= first);
    }

    #[test]
    fn test_sleeping_body_woken_periodically() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        let raw = fx.body(id).body_handle().expect("native body").raw();
        fx.engine.set_body_enabled(raw, false);
        for _ in 0..(WAKE_INTERVAL - 1) {
            fx.tick();
        }
        assert!(!fx.engine.is_body_enabled(raw));
        fx.tick();
        assert!(fx.engine.is_body_enabled(raw));
    }

    #[test]
    fn test_vehicle_is_left_asleep() {
        let mut fx = Fixture::new();
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 50.0)).physical());
        fx.apply(id, Change::VehicleType(VehicleType::Car));
        let raw = fx.body(id).body_handle().expect("native body").raw();
        fx.engine.set_body_enabled(raw, false);
        for _ in 0..(WAKE_INTERVAL + 5) {
            fx.tick();
        }
        assert!(!fx.engine.is_body_enabled(raw));
    }

    #[test]
    fn test_collision_batches_and_empty_once() {
        let mut fx = Fixture::with_engine(SandboxEngine::new().with_ground(0.0));
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 0.4)).physical());
        fx.apply(id, Change::SubscribeCollisions(20));
        fx.tick();

        let batches: Vec<usize> = fx
            .events
            .iter()
            .filter_map(|e| match e {
                SceneEvent::Collisions { contacts, .. } => Some(contacts.len()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![1]);
        assert!(fx.body(id).collision_score() >= 1.0);

        // lift it clear of the ground: one empty batch, then silence
        fx.apply(id, Change::Position(DVec3::new(128.0, 128.0, 80.0)));
        fx.apply(id, Change::Buoyancy(1.0));
        fx.events.clear();
        fx.tick();
        fx.tick();
        let batches: Vec<usize> = fx
            .events
            .iter()
            .filter_map(|e| match e {
                SceneEvent::Collisions { contacts, .. } => Some(contacts.len()),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![0]);
        assert_eq!(fx.arena.collision_reporters().count(), 0);
    }

    #[test]
    fn test_unsubscribed_body_only_scores() {
        let mut fx = Fixture::with_engine(SandboxEngine::new().with_ground(0.0));
        let id = fx.add(1, at(DVec3::new(128.0, 128.0, 0.4)).physical());
        fx.tick();
        assert!(fx.body(id).collision_score() >= 1.0);
        assert!(!fx
            .events
            .iter()
            .any(|e| matches!(e, SceneEvent::Collisions { .. })));
    }
}
