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
//! Body storage and native object lifecycle
//!
//! The arena owns every [`PhysicsBody`] of a scene together with three
//! indexes:
//!
//! - the *active set*: linkset roots that currently own a native body,
//!   iterated in id order by the per-tick passes,
//! - the geometry owner map, used to route engine contacts back to bodies,
//! - the set of bodies with a live collision subscription.
//!
//! Linksets are assembled here. A root's native body is always built from
//! scratch: the members' own-frame mass properties are moved into the
//! root's frame, summed, and recentred on the combined centre of mass.
//!
//! ```text
//! body position = root position + root orientation * c
//! geometry offset (root)  = -c
//! geometry offset (child) = R_root⁻¹ (p_child - p_root) - c
//! ```

use super::collision::{derive_bits, derive_child_bits, static_bits};
use super::{CollisionBits, CollisionCategories, PhysicsBody, PrimDescriptor, SimContext};
use crate::engine::{AxisLock, BodyHandle, GeometrySpec, PhysicsEngine, RawGeometry, ShapeHandle};
use crate::error::PhysicsError;
use crate::events::SceneEvent;
use crate::id::BodyId;
use crate::shape::{sanitize_size, PhysicsShapeType, ShapeDescriptor, VolumeMassCalculator};
use glam::{DQuat, DVec3};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Linear and angular damping given to every native body
const BODY_DAMPING: f64 = 0.002;

/// Geometry used when a shape is not meshed, or meshing failed
fn fallback_geometry(shape: &ShapeDescriptor, size: DVec3) -> GeometrySpec {
    if shape.is_sphere_like(size) {
        GeometrySpec::Sphere {
            radius: size.x * 0.5,
        }
    } else {
        GeometrySpec::Box { size }
    }
}

/// Every body of one scene
#[derive(Debug, Default)]
pub struct BodyArena {
    bodies: HashMap<BodyId, PhysicsBody>,
    active: BTreeSet<BodyId>,
    geometry_owner: HashMap<RawGeometry, BodyId>,
    collision_reporters: BTreeSet<BodyId>,
}

impl BodyArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True if there are no bodies
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Look up a body
    pub fn get(&self, id: BodyId) -> Option<&PhysicsBody> {
        self.bodies.get(&id)
    }

    /// Check whether a body exists
    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// All bodies, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &PhysicsBody> {
        self.bodies.values()
    }

    /// Ids of every body, sorted
    pub fn ids(&self) -> Vec<BodyId> {
        let mut ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Linkset roots that own a native body, in id order
    pub fn active_ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.active.iter().copied()
    }

    /// True if `id` is a root with a native body
    pub fn is_active(&self, id: BodyId) -> bool {
        self.active.contains(&id)
    }

    /// Number of roots with a native body
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Body that owns a native geometry
    pub fn owner_of(&self, geometry: RawGeometry) -> Option<BodyId> {
        self.geometry_owner.get(&geometry).copied()
    }

    /// Bodies with a live collision subscription, in id order
    pub fn collision_reporters(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.collision_reporters.iter().copied()
    }

    pub(crate) fn get_mut(&mut self, id: BodyId) -> Option<&mut PhysicsBody> {
        self.bodies.get_mut(&id)
    }

    pub(crate) fn add_reporter(&mut self, id: BodyId) {
        self.collision_reporters.insert(id);
    }

    pub(crate) fn remove_reporter(&mut self, id: BodyId) {
        self.collision_reporters.remove(&id);
    }

    /// Root of the linkset `id` belongs to
    pub(crate) fn root_of(&self, id: BodyId) -> BodyId {
        self.bodies
            .get(&id)
            .and_then(|b| b.parent)
            .unwrap_or(id)
    }

    pub(crate) fn has_body(&self, id: BodyId) -> bool {
        self.bodies.get(&id).is_some_and(|b| b.body.is_some())
    }

    /// Create a body from its descriptor and build its native objects
    ///
    /// `volume` is a precomputed volume for the descriptor's shape and size.
    /// Returns false if the id is already taken.
    pub(crate) fn insert(
        &mut self,
        id: BodyId,
        descriptor: &PrimDescriptor,
        volume: Option<f64>,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        if self.bodies.contains_key(&id) {
            log::warn!(target: "prim_physics::body", "{} already exists, ignoring add", id);
            return false;
        }
        let mut descriptor = descriptor.clone();
        if !descriptor.position.is_finite() {
            log::warn!(target: "prim_physics::body", "{} added at non-finite position", id);
            let center = ctx.config.world_extents * 0.5;
            let ground = ctx.terrain.height_at(center.x, center.y);
            descriptor.position = center.extend(ground + 0.5);
        }
        if !descriptor.size.is_finite() {
            log::warn!(target: "prim_physics::body", "{} added with non-finite size", id);
        }
        if !descriptor.orientation.is_finite() {
            descriptor.orientation = DQuat::IDENTITY;
        } else {
            descriptor.orientation = descriptor.orientation.normalize();
        }
        descriptor.size = sanitize_size(descriptor.size);

        self.bodies
            .insert(id, PhysicsBody::new(id, &descriptor, ctx.config));

        if !self.create_geometry(id, volume, ctx) {
            return true;
        }
        self.place_geometry(id, ctx.engine);

        let physical = self.bodies.get(&id).is_some_and(|b| b.flags.physical);
        if physical {
            self.make_body(id, ctx);
        } else {
            self.apply_collision_bits(id, ctx.engine);
        }
        log::debug!(target: "prim_physics::body", "added {} ({:?})", id, descriptor.name);
        true
    }

    /// Build the native geometry and the body data derived from it
    pub(crate) fn create_geometry(
        &mut self,
        id: BodyId,
        volume: Option<f64>,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return false;
        };
        prim.flags.no_collide = false;

        let mut spec = None;
        let mut centroid = None;
        if prim.shape.needs_meshing(prim.size) {
            let convex = prim.shape.shape_type == PhysicsShapeType::ConvexHull;
            match ctx.mesher.create_mesh(
                &prim.shape,
                prim.size,
                ctx.config.mesh_level_of_detail,
                prim.flags.physical,
                convex,
            ) {
                Ok(Some(mesh)) if !mesh.is_empty() => {
                    centroid = Some(mesh.centroid);
                    spec = Some(GeometrySpec::TriMesh(Arc::new(mesh)));
                }
                Ok(Some(_)) => {
                    let err = PhysicsError::MeshGeneration {
                        body: id,
                        reason: "empty mesh".to_string(),
                    };
                    log::warn!(target: "prim_physics::body", "{}, using fallback geometry", err);
                    prim.flags.no_collide = true;
                }
                Ok(None) => {}
                Err(reason) => {
                    let err = PhysicsError::MeshGeneration { body: id, reason };
                    log::warn!(target: "prim_physics::body", "{}, using fallback geometry", err);
                    prim.flags.no_collide = true;
                }
            }
        }
        let spec = spec.unwrap_or_else(|| fallback_geometry(&prim.shape, prim.size));

        let Some(raw) = ctx.engine.create_geometry(&spec) else {
            let err = PhysicsError::EngineAllocation {
                what: "geometry",
                body: id,
            };
            log::warn!(target: "prim_physics::body", "{}", err);
            prim.geometry = None;
            return false;
        };
        prim.geometry = Some(ShapeHandle::new(id, raw));
        self.geometry_owner.insert(raw, id);

        prim.volume = volume
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or_else(|| VolumeMassCalculator::compute_volume(&prim.shape, prim.size));
        prim.prim_mass = VolumeMassCalculator::mass_from_volume(
            prim.density,
            prim.volume,
            ctx.config.min_mass,
            ctx.config.max_mass,
        );
        match ctx.engine.geometry_aabb(raw) {
            Some(aabb) => {
                prim.oob_size = aabb.size();
                prim.oob_offset = centroid.unwrap_or_else(|| aabb.center());
            }
            None => {
                prim.oob_size = prim.size;
                prim.oob_offset = DVec3::ZERO;
            }
        }
        prim.oob_radius_sq = (prim.oob_size * 0.5).length_squared();
        prim.own_mass = VolumeMassCalculator::own_mass_properties(
            prim.prim_mass,
            &prim.shape,
            prim.size,
            prim.oob_size,
            prim.oob_offset,
        );
        if prim.body.is_none() {
            prim.mass = prim.prim_mass;
        }
        true
    }

    /// Put a geometry that is not attached to a body at its prim's pose
    pub(crate) fn place_geometry(&self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        if let Some(prim) = self.bodies.get(&id) {
            if let Some(geometry) = prim.geometry {
                engine.set_geometry_pose(geometry.raw(), prim.position, prim.orientation);
            }
        }
    }

    /// Release a body's geometry
    pub(crate) fn remove_geometry(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        if let Some(geometry) = prim.geometry.take() {
            self.geometry_owner.remove(&geometry.raw());
            engine.destroy_geometry(geometry.raw());
        }
    }

    /// Build the native body of a physical linkset root
    ///
    /// Does nothing for children, static or building bodies, or bodies
    /// without a geometry. An existing native body is destroyed first.
    pub(crate) fn make_body(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        let Some(root) = self.bodies.get(&id) else {
            return;
        };
        if !root.flags.physical
            || root.parent.is_some()
            || root.flags.building
            || root.geometry.is_none()
        {
            return;
        }
        if root.body.is_some() {
            self.destroy_body(id, ctx);
        }

        let Some(root) = self.bodies.get(&id) else {
            return;
        };
        let root_position = root.position;
        let root_orientation = root.orientation;
        let inverse = root_orientation.inverse();

        let mut total = root.own_mass;
        let mut parts: Vec<(BodyId, DVec3, DQuat)> = Vec::with_capacity(root.children.len());
        for child_id in &root.children {
            let Some(child) = self.bodies.get(child_id) else {
                continue;
            };
            if child.geometry.is_none() {
                continue;
            }
            let relative_position = inverse * (child.position - root_position);
            let relative_orientation = inverse * child.orientation;
            let mut part = child.own_mass;
            part.rotate(relative_orientation);
            part.translate(relative_position);
            total.add(&part);
            parts.push((*child_id, relative_position, relative_orientation));
        }
        let center = total.recenter();

        let Some(raw) =
            ctx.engine
                .create_body(&total, root_position + root_orientation * center, root_orientation)
        else {
            let err = PhysicsError::EngineAllocation {
                what: "body",
                body: id,
            };
            log::warn!(target: "prim_physics::body", "{}", err);
            return;
        };

        let frames = ctx.config.body_auto_disable_frames;
        ctx.engine
            .set_auto_disable(raw, if frames > 0 { Some(frames) } else { None });
        ctx.engine.set_damping(raw, BODY_DAMPING, BODY_DAMPING);

        for (child_id, relative_position, relative_orientation) in parts {
            if let Some(child) = self.bodies.get_mut(&child_id) {
                if let Some(geometry) = child.geometry {
                    ctx.engine.attach_geometry(
                        geometry.raw(),
                        raw,
                        relative_position - center,
                        relative_orientation,
                    );
                }
                child.link_offset = Some((relative_position, relative_orientation));
            }
        }

        let Some(root) = self.bodies.get_mut(&id) else {
            return;
        };
        if let Some(geometry) = root.geometry {
            ctx.engine
                .attach_geometry(geometry.raw(), raw, -center, DQuat::IDENTITY);
        }
        root.body = Some(BodyHandle::new(id, raw));
        root.mass = total.mass;
        root.center_of_mass = center;
        root.settled = false;
        root.last_update_sent = false;
        root.sleep_counter = 0;
        if root.flags.delay_select {
            root.flags.selected = true;
            root.flags.delay_select = false;
        }
        let lock = root.angular_lock;
        self.active.insert(id);

        if !lock.is_free() {
            self.create_angular_motor(id, ctx.engine);
        }
        self.apply_collision_bits(id, ctx.engine);

        let Some(root) = self.bodies.get(&id) else {
            return;
        };
        if root.flags.selected || root.flags.disabled {
            ctx.engine.set_body_enabled(raw, false);
        } else {
            ctx.engine.set_linear_velocity(raw, root.velocity);
            ctx.engine.set_angular_velocity(raw, root.angular_velocity);
        }
        log::debug!(
            target: "prim_physics::body",
            "built body for {} with {} part(s), mass {:.3}",
            id,
            root.children.len() + 1,
            root.mass
        );

        let bodies = &self.bodies;
        ctx.constraints
            .restore_body(id, ctx.engine, |other| bodies.get(&other).and_then(|b| b.body));
    }

    /// Tear down a root's native body, leaving every geometry static in place
    ///
    /// The angular motor is destroyed with it. Joints referencing the body
    /// are parked until [`make_body`](Self::make_body) gives it a new one.
    pub(crate) fn destroy_body(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        self.active.remove(&id);
        let Some(root) = self.bodies.get_mut(&id) else {
            return;
        };
        let Some(handle) = root.body.take() else {
            return;
        };
        if let Some(motor) = root.angular_motor.take() {
            ctx.engine.destroy_constraint(motor);
        }
        ctx.constraints.park_body(id, ctx.engine);
        ctx.engine.destroy_body(handle.raw());

        root.mass = root.prim_mass;
        root.center_of_mass = DVec3::ZERO;
        root.bits = if root.flags.no_collide {
            CollisionBits::none()
        } else {
            static_bits(&root.flags)
        };
        if let Some(geometry) = root.geometry {
            ctx.engine
                .set_collision_bits(geometry.raw(), root.bits.categories, root.bits.mask);
        }
        let children = root.children.clone();

        for child_id in children {
            let Some(child) = self.bodies.get_mut(&child_id) else {
                continue;
            };
            child.link_offset = None;
            child.body = None;
            child.bits = if child.flags.no_collide {
                CollisionBits::none()
            } else {
                static_bits(&child.flags)
            };
            if let Some(geometry) = child.geometry {
                ctx.engine
                    .set_collision_bits(geometry.raw(), child.bits.categories, child.bits.mask);
            }
        }
        log::debug!(target: "prim_physics::body", "destroyed body of {}", id);
    }

    /// Derive and push collision bits for the whole linkset containing `id`
    pub(crate) fn apply_collision_bits(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let root_id = self.root_of(id);
        let Some(root) = self.bodies.get_mut(&root_id) else {
            return;
        };
        let root_flags = root.flags;
        let derived = derive_bits(&root.flags);
        root.bits = if root.flags.no_collide {
            CollisionBits::no_collide(root.flags.physical)
        } else {
            derived
        };
        if let Some(geometry) = root.geometry {
            engine.set_collision_bits(geometry.raw(), root.bits.categories, root.bits.mask);
        }
        let children = root.children.clone();

        for child_id in children {
            let Some(child) = self.bodies.get_mut(&child_id) else {
                continue;
            };
            child.bits = if child.flags.no_collide {
                CollisionBits::no_collide(root_flags.physical)
            } else {
                derive_child_bits(&child.flags, &root_flags, derived)
            };
            if let Some(geometry) = child.geometry {
                engine.set_collision_bits(geometry.raw(), child.bits.categories, child.bits.mask);
            }
        }
    }

    /// Stop simulating a body without destroying it
    pub(crate) fn disable_soft(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        prim.flags.disabled = true;
        if !prim.flags.physical || prim.parent.is_some() {
            return;
        }
        let Some(body) = prim.body else {
            return;
        };
        let selected = prim.flags.selected;
        self.apply_collision_bits(id, engine);
        if selected {
            if let Some(prim) = self.bodies.get_mut(&id) {
                prim.bits = CollisionBits::new(
                    CollisionCategories::SELECTED,
                    CollisionCategories::empty(),
                );
                if let Some(geometry) = prim.geometry {
                    engine.set_collision_bits(
                        geometry.raw(),
                        prim.bits.categories,
                        prim.bits.mask,
                    );
                }
            }
        }
        engine.set_body_enabled(body.raw(), false);
    }

    /// Resume simulating a body disabled with [`disable_soft`](Self::disable_soft)
    pub(crate) fn enable_soft(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        prim.flags.disabled = false;
        if prim.parent.is_some() || prim.flags.selected || !prim.flags.physical {
            return;
        }
        let Some(body) = prim.body else {
            return;
        };
        self.apply_collision_bits(id, engine);
        engine.set_body_enabled(body.raw(), true);
    }

    /// Replace the angular motor of a root to enforce its axis lock
    pub(crate) fn create_angular_motor(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        if let Some(motor) = prim.angular_motor.take() {
            engine.destroy_constraint(motor);
        }
        let Some(body) = prim.body else {
            return;
        };
        if prim.angular_lock.is_free() {
            return;
        }
        prim.angular_motor =
            engine.create_angular_motor(body.raw(), prim.angular_lock, prim.orientation);
        if prim.angular_motor.is_none() {
            let err = PhysicsError::EngineAllocation {
                what: "angular motor",
                body: id,
            };
            log::warn!(target: "prim_physics::body", "{}", err);
        }
    }

    /// Store a new axis lock and apply it if the body is a physical root
    pub(crate) fn set_angular_lock(
        &mut self,
        id: BodyId,
        lock: AxisLock,
        engine: &mut dyn PhysicsEngine,
    ) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        prim.angular_lock = lock;
        if prim.body.is_none() || prim.parent.is_some() {
            return;
        }
        if lock.is_free() {
            if let Some(motor) = prim.angular_motor.take() {
                engine.destroy_constraint(motor);
            }
        } else {
            self.create_angular_motor(id, engine);
        }
    }

    /// Adopt `child` (and any children it has) into the linkset rooted at `parent`
    pub(crate) fn parent_prim(&mut self, parent: BodyId, child: BodyId, ctx: &mut SimContext<'_>) {
        let parent = self.root_of(parent);
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        self.destroy_body(parent, ctx);
        if self.has_body(child) {
            self.destroy_body(child, ctx);
        }

        let grandchildren = match self.bodies.get_mut(&child) {
            Some(prim) => {
                prim.parent = Some(parent);
                prim.link_offset = None;
                std::mem::take(&mut prim.children)
            }
            None => return,
        };
        for id in &grandchildren {
            if let Some(prim) = self.bodies.get_mut(id) {
                prim.parent = Some(parent);
                prim.link_offset = None;
            }
        }
        if let Some(root) = self.bodies.get_mut(&parent) {
            for id in std::iter::once(child).chain(grandchildren) {
                if !root.children.contains(&id) {
                    root.children.push(id);
                }
            }
        }

        log::debug!(target: "prim_physics::body", "linked {} to {}", child, parent);
        self.rebuild(parent, ctx);
    }

    /// Rebuild a root's body, or refresh its static bits if it gets none
    pub(crate) fn rebuild(&mut self, id: BodyId, ctx: &mut SimContext<'_>) {
        self.make_body(id, ctx);
        if !self.has_body(id) {
            self.apply_collision_bits(id, ctx.engine);
        }
    }

    /// Take `member` out of the linkset rooted at `root`
    ///
    /// Delinking the root promotes its first child to root of the rest.
    /// With `remake` every resulting linkset gets a fresh body.
    pub(crate) fn child_delink(
        &mut self,
        root: BodyId,
        member: BodyId,
        remake: bool,
        ctx: &mut SimContext<'_>,
    ) {
        let Some(root_prim) = self.bodies.get(&root) else {
            return;
        };
        if member != root && !root_prim.children.contains(&member) {
            return;
        }
        self.destroy_body(root, ctx);

        if member == root {
            if let Some(new_root) = self.promote_first_child(root) {
                if remake {
                    self.rebuild(new_root, ctx);
                }
            }
        } else {
            self.detach_child(root, member);
            if remake {
                self.rebuild(member, ctx);
            }
        }
        log::debug!(target: "prim_physics::body", "delinked {} from {}", member, root);
        if remake {
            self.rebuild(root, ctx);
        }
    }

    /// Like [`child_delink`](Self::child_delink) for a member about to be
    /// destroyed; the remaining linkset always gets a fresh body
    pub(crate) fn child_remove(&mut self, root: BodyId, member: BodyId, ctx: &mut SimContext<'_>) {
        let Some(root_prim) = self.bodies.get(&root) else {
            return;
        };
        if member != root && !root_prim.children.contains(&member) {
            return;
        }
        self.destroy_body(root, ctx);

        if member == root {
            if let Some(new_root) = self.promote_first_child(root) {
                self.rebuild(new_root, ctx);
            }
        } else {
            self.detach_child(root, member);
            self.rebuild(root, ctx);
        }
    }

    fn detach_child(&mut self, root: BodyId, member: BodyId) {
        if let Some(root_prim) = self.bodies.get_mut(&root) {
            root_prim.children.retain(|c| *c != member);
        }
        if let Some(prim) = self.bodies.get_mut(&member) {
            prim.parent = None;
            prim.link_offset = None;
        }
    }

    fn promote_first_child(&mut self, root: BodyId) -> Option<BodyId> {
        let children = std::mem::take(&mut self.bodies.get_mut(&root)?.children);
        let (&new_root, rest) = children.split_first()?;
        for id in rest {
            if let Some(prim) = self.bodies.get_mut(id) {
                prim.parent = Some(new_root);
            }
        }
        let prim = self.bodies.get_mut(&new_root)?;
        prim.parent = None;
        prim.link_offset = None;
        prim.children.extend_from_slice(rest);
        log::debug!(target: "prim_physics::body", "{} promoted to root", new_root);
        Some(new_root)
    }

    /// Apply pending selection if the body was selected before it was physical
    pub(crate) fn check_delay_select(&mut self, id: BodyId, engine: &mut dyn PhysicsEngine) {
        let Some(prim) = self.bodies.get(&id) else {
            return;
        };
        if prim.flags.delay_select {
            let selected = prim.flags.selected;
            self.do_selected_status(id, selected, engine);
        }
    }

    /// Enter or leave the selected state
    ///
    /// Selecting a static body only marks it for delayed selection; the
    /// bits change when it is next touched.
    pub(crate) fn do_selected_status(
        &mut self,
        id: BodyId,
        selected: bool,
        engine: &mut dyn PhysicsEngine,
    ) {
        let Some(prim) = self.bodies.get_mut(&id) else {
            return;
        };
        prim.flags.selected = selected;
        prim.stop(engine);

        if selected {
            if prim.parent.is_none() {
                if let Some(body) = prim.body {
                    engine.set_body_enabled(body.raw(), false);
                }
            }
            if prim.flags.delay_select || prim.flags.physical {
                let selected_bits =
                    CollisionBits::new(CollisionCategories::SELECTED, CollisionCategories::empty());
                let is_root = prim.parent.is_none();
                let children = if is_root { prim.children.clone() } else { Vec::new() };
                prim.flags.delay_select = false;
                for member in std::iter::once(id).chain(children) {
                    let Some(prim) = self.bodies.get_mut(&member) else {
                        continue;
                    };
                    prim.flags.delay_select = false;
                    prim.bits = if prim.flags.no_collide {
                        CollisionBits::none()
                    } else {
                        selected_bits
                    };
                    if let Some(geometry) = prim.geometry {
                        engine.set_collision_bits(
                            geometry.raw(),
                            prim.bits.categories,
                            prim.bits.mask,
                        );
                    }
                }
            } else {
                prim.flags.delay_select = true;
            }
        } else {
            if prim.parent.is_none() && !prim.flags.disabled {
                if let Some(body) = prim.body {
                    engine.set_body_enabled(body.raw(), true);
                }
            }
            prim.flags.delay_select = false;
            self.apply_collision_bits(id, engine);
        }

        if let Some(prim) = self.bodies.get_mut(&id) {
            prim.reset_collision_accounting();
        }
    }

    /// Update the cached pose of a root's children from the root's pose
    pub(crate) fn propagate_child_poses(&mut self, root: BodyId) {
        let Some(prim) = self.bodies.get(&root) else {
            return;
        };
        let position = prim.position;
        let orientation = prim.orientation;
        let children = prim.children.clone();
        for child_id in children {
            if let Some(child) = self.bodies.get_mut(&child_id) {
                if let Some((offset, rotation)) = child.link_offset {
                    child.position = position + orientation * offset;
                    child.orientation = orientation * rotation;
                }
            }
        }
    }

    /// Destroy a body and everything native it owns
    ///
    /// Returns the removed record.
    pub(crate) fn remove(&mut self, id: BodyId, ctx: &mut SimContext<'_>) -> Option<PhysicsBody> {
        let root = self.root_of(id);
        if self.contains(id) {
            self.child_remove(root, id, ctx);
        }
        if let Some(prim) = self.bodies.get_mut(&id) {
            prim.vehicle = None;
        }
        ctx.constraints.remove_and_destroy_body(id, ctx.engine);
        self.remove_geometry(id, ctx.engine);
        self.collision_reporters.remove(&id);
        self.active.remove(&id);
        let removed = self.bodies.remove(&id);
        if removed.is_some() {
            log::debug!(target: "prim_physics::body", "removed {}", id);
        }
        removed
    }

    /// Queue a terse update for `id`
    pub(crate) fn send_terse_update(&self, id: BodyId, events: &mut Vec<SceneEvent>) {
        if let Some(prim) = self.bodies.get(&id) {
            events.push(SceneEvent::terse_update(prim));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::constraint::ConstraintCollection;
    use crate::engine::{NullMesher, SandboxEngine};
    use crate::terrain::Terrain;
    use approx::assert_relative_eq;

    struct Fixture {
        engine: SandboxEngine,
        config: SceneConfig,
        constraints: ConstraintCollection,
        terrain: Terrain,
        events: Vec<SceneEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                engine: SandboxEngine::new(),
                config: SceneConfig::default(),
                constraints: ConstraintCollection::new(),
                terrain: Terrain::default(),
                events: Vec::new(),
            }
        }

        fn ctx(&mut self) -> SimContext<'_> {
            SimContext {
                engine: &mut self.engine,
                mesher: &NullMesher,
                config: &self.config,
                constraints: &self.constraints,
                terrain: &self.terrain,
                events: &mut self.events,
            }
        }
    }

    fn cube(x: f64) -> PrimDescriptor {
        PrimDescriptor::new(DVec3::new(x, 128.0, 30.0), DVec3::ONE)
    }

    #[test]
    fn test_static_add_has_geometry_only() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        assert!(arena.insert(id, &cube(128.0), None, &mut fx.ctx()));

        let prim = arena.get(id).expect("body");
        assert!(prim.geometry().is_some());
        assert!(prim.body_handle().is_none());
        assert!(!arena.is_active(id));
        assert_relative_eq!(prim.volume(), 1.0, epsilon = 1e-9);
        assert_eq!(prim.collision_bits().categories, CollisionCategories::GEOM);
        assert_eq!(fx.engine.geometry_count(), 1);

        // same id twice is refused
        assert!(!arena.insert(id, &cube(128.0), None, &mut fx.ctx()));
    }

    #[test]
    fn test_non_finite_add_lands_at_region_center() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        let descriptor = PrimDescriptor::new(
            DVec3::new(f64::NAN, 0.0, 0.0),
            DVec3::new(f64::INFINITY, 1.0, 1.0),
        );
        assert!(arena.insert(id, &descriptor, None, &mut fx.ctx()));

        let prim = arena.get(id).expect("body");
        assert_eq!(prim.position(), DVec3::new(128.0, 128.0, 0.5));
        assert_eq!(prim.size(), DVec3::splat(0.5));
        assert_relative_eq!(prim.volume(), 0.125, epsilon = 1e-9);
    }

    #[test]
    fn test_physical_add_builds_body() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        arena.insert(id, &cube(128.0).physical(), None, &mut fx.ctx());

        let prim = arena.get(id).expect("body");
        let handle = prim.body_handle().expect("native body");
        assert!(arena.is_active(id));
        assert_eq!(fx.engine.body_count(), 1);
        assert_relative_eq!(
            fx.engine.body_mass(handle.raw()).unwrap_or_default(),
            prim.prim_mass(),
            epsilon = 1e-9
        );
        let geometry = prim.geometry().expect("geometry");
        assert_eq!(arena.owner_of(geometry.raw()), Some(id));
        assert_eq!(fx.engine.geometry_body(geometry.raw()), Some(handle.raw()));
    }

    #[test]
    fn test_linkset_body_aggregates_mass() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let root = BodyId::new(1);
        let child = BodyId::new(2);
        arena.insert(root, &cube(128.0).physical(), None, &mut fx.ctx());
        arena.insert(child, &cube(130.0), None, &mut fx.ctx());

        arena.parent_prim(root, child, &mut fx.ctx());

        let root_prim = arena.get(root).expect("root");
        let child_prim = arena.get(child).expect("child");
        assert_eq!(root_prim.children(), &[child]);
        assert_eq!(child_prim.parent(), Some(root));
        assert!(child_prim.body_handle().is_none());
        assert_relative_eq!(
            root_prim.mass(),
            root_prim.prim_mass() + child_prim.prim_mass(),
            epsilon = 1e-9
        );
        // equal masses one metre apart along X
        assert_relative_eq!(root_prim.center_of_mass.x, 1.0, epsilon = 1e-9);
        assert_eq!(fx.engine.body_count(), 1);

        let body = root_prim.body_handle().expect("native body");
        let child_geometry = child_prim.geometry().expect("geometry");
        assert_eq!(fx.engine.geometry_body(child_geometry.raw()), Some(body.raw()));
        let (position, _) = fx
            .engine
            .geometry_pose(child_geometry.raw())
            .expect("geometry pose");
        assert_relative_eq!(position.x, 130.0, epsilon = 1e-9);
    }

    #[test]
    fn test_delink_root_promotes_first_child() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let ids = [BodyId::new(1), BodyId::new(2), BodyId::new(3)];
        for (i, id) in ids.iter().enumerate() {
            arena.insert(*id, &cube(120.0 + 2.0 * i as f64).physical(), None, &mut fx.ctx());
        }
        arena.parent_prim(ids[0], ids[1], &mut fx.ctx());
        arena.parent_prim(ids[0], ids[2], &mut fx.ctx());
        assert_eq!(fx.engine.body_count(), 1);

        arena.child_delink(ids[0], ids[0], true, &mut fx.ctx());

        assert!(arena.get(ids[0]).expect("old root").children().is_empty());
        let new_root = arena.get(ids[1]).expect("new root");
        assert_eq!(new_root.parent(), None);
        assert_eq!(new_root.children(), &[ids[2]]);
        assert_eq!(arena.get(ids[2]).expect("child").parent(), Some(ids[1]));
        assert!(arena.is_active(ids[0]));
        assert!(arena.is_active(ids[1]));
        assert!(!arena.is_active(ids[2]));
        assert_eq!(fx.engine.body_count(), 2);
    }

    #[test]
    fn test_destroy_body_leaves_static_bits() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        arena.insert(id, &cube(128.0).physical(), None, &mut fx.ctx());
        arena.destroy_body(id, &mut fx.ctx());

        let prim = arena.get(id).expect("body");
        assert!(prim.body_handle().is_none());
        assert!(!arena.is_active(id));
        assert_eq!(prim.mass(), prim.prim_mass());
        assert_eq!(
            prim.collision_bits(),
            CollisionBits::new(CollisionCategories::GEOM, CollisionCategories::empty())
        );
        assert_eq!(fx.engine.body_count(), 0);
        assert_eq!(fx.engine.geometry_count(), 1);
    }

    #[test]
    fn test_remove_releases_everything() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        arena.insert(id, &cube(128.0).physical(), None, &mut fx.ctx());
        let geometry = arena.get(id).and_then(|p| p.geometry()).expect("geometry");

        assert!(arena.remove(id, &mut fx.ctx()).is_some());
        assert!(arena.is_empty());
        assert_eq!(arena.owner_of(geometry.raw()), None);
        assert_eq!(fx.engine.body_count(), 0);
        assert_eq!(fx.engine.geometry_count(), 0);
    }

    #[test]
    fn test_geometry_allocation_failure_keeps_record() {
        let mut fx = Fixture::new();
        fx.engine.set_fail_allocations(true);
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        assert!(arena.insert(id, &cube(128.0).physical(), None, &mut fx.ctx()));
        let prim = arena.get(id).expect("body");
        assert!(prim.geometry().is_none());
        assert!(prim.body_handle().is_none());
    }

    #[test]
    fn test_selecting_static_body_is_delayed() {
        let mut fx = Fixture::new();
        let mut arena = BodyArena::new();
        let id = BodyId::new(1);
        arena.insert(id, &cube(128.0), None, &mut fx.ctx());

        arena.do_selected_status(id, true, &mut fx.engine);
        assert!(arena.get(id).expect("body").flags().delay_select);

        arena.check_delay_select(id, &mut fx.engine);
        let prim = arena.get(id).expect("body");
        assert!(!prim.flags().delay_select);
        assert_eq!(prim.collision_bits().categories, CollisionCategories::SELECTED);
    }
}
