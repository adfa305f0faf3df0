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
//! Simulation driver
//!
//! [`PhysicsScene`] owns one native world and everything derived from it:
//! the body arena, the constraint collection, the terrain and the consumer
//! side of the change queue. It is meant to live on a single simulation
//! thread; producers talk to it only through [`ChangeSender`]s.
//!
//! # Tick order
//!
//! Each call to [`PhysicsScene::step`] runs:
//!
//! 1. drain a snapshot of the change queue and apply it, FIFO per body
//! 2. the pre-step force pass over every active root
//! 3. one engine step of `timestep` with at most `max_substeps` sub-steps
//! 4. contact routing and collision scores
//! 5. state readback, bounds checks and terse updates
//! 6. due collision batches
//!
//! Changes enqueued while a tick runs wait for the next one.

use crate::body::{BodyArena, PhysicsBody, SimContext};
use crate::change::{Change, ChangeQueue, ChangeRecord, ChangeSender};
use crate::config::SceneConfig;
use crate::constraint::{Constraint, ConstraintCollection};
use crate::engine::{
    check_engine_version, ConstraintAxis, ConstraintKind, ConstraintParam, Frame, LimitKind,
    Mesher, NullMesher, PhysicsEngine,
};
use crate::error::{PhysicsError, PhysicsResult};
use crate::events::SceneEvent;
use crate::id::{BodyId, IdAllocator};
use crate::shape::{sanitize_size, ShapeDescriptor, VolumeMassCalculator};
use crate::terrain::Terrain;
use glam::DVec3;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one tick did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepSummary {
    /// Change records applied (dropped records are not counted)
    pub changes_applied: usize,
    /// Roots whose cached state was refreshed
    pub bodies_updated: usize,
    /// Contacts the engine reported
    pub contacts: usize,
    /// Wall time spent in the tick
    pub elapsed: Duration,
}

/// One simulation world
pub struct PhysicsScene<E: PhysicsEngine> {
    engine: E,
    mesher: Box<dyn Mesher>,
    config: SceneConfig,
    ids: Arc<IdAllocator>,
    queue: ChangeQueue,
    bodies: BodyArena,
    constraints: ConstraintCollection,
    terrain: Terrain,
    events: Vec<SceneEvent>,
    ticks: u64,
}

impl<E: PhysicsEngine> PhysicsScene<E> {
    /// Create a scene around `engine`
    ///
    /// Fails if the configuration is out of range or the engine implements
    /// an incompatible capability version.
    pub fn new(engine: E, config: SceneConfig) -> PhysicsResult<Self> {
        config.validate()?;
        check_engine_version(&engine)?;

        let ids = Arc::new(IdAllocator::new());
        let queue = ChangeQueue::new(Arc::clone(&ids), config.timestep);
        log::info!(
            target: "prim_physics::scene",
            "scene on {} (api {}), timestep {}s, {} max substeps",
            engine.name(),
            engine.api_version(),
            config.timestep,
            config.max_substeps
        );

        Ok(PhysicsScene {
            engine,
            mesher: Box::new(NullMesher),
            terrain: Terrain::flat(0.0, config.water_level),
            config,
            ids,
            queue,
            bodies: BodyArena::new(),
            constraints: ConstraintCollection::new(),
            events: Vec::new(),
            ticks: 0,
        })
    }

    /// Use `mesher` for shapes that need tessellation
    pub fn with_mesher(mut self, mesher: Box<dyn Mesher>) -> Self {
        self.mesher = mesher;
        self
    }

    /// A producer handle for the change queue
    pub fn sender(&self) -> ChangeSender {
        self.queue.sender()
    }

    /// The id allocator shared with producers
    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    /// Changes waiting for the next tick
    pub fn pending_changes(&self) -> usize {
        self.queue.len()
    }

    /// Run one tick
    pub fn step(&mut self) -> StepSummary {
        let started = Instant::now();
        let records = self.queue.drain();
        let volumes = precompute_volumes(&records);
        let frame_ms = (self.config.timestep * 1000.0).round() as u32;

        let mut ctx = SimContext {
            engine: &mut self.engine,
            mesher: self.mesher.as_ref(),
            config: &self.config,
            constraints: &self.constraints,
            terrain: &self.terrain,
            events: &mut self.events,
        };

        let mut changes_applied = 0;
        for (record, volume) in records.into_iter().zip(volumes) {
            let target = record.target;
            let lifecycle = matches!(record.change, Change::Add(_) | Change::Remove);
            if self.bodies.apply_change(target, record.change, volume, &mut ctx) {
                changes_applied += 1;
            }
            if lifecycle && !self.bodies.contains(target) {
                self.ids.release(target);
            }
        }

        self.bodies.move_bodies(&mut ctx);
        let report = ctx.engine.step(self.config.timestep, self.config.max_substeps);
        self.bodies.route_contacts(&report.contacts);
        let bodies_updated = self.bodies.update_bodies(&mut ctx);
        self.bodies.send_collisions(frame_ms, ctx.events);
        self.ticks += 1;

        let summary = StepSummary {
            changes_applied,
            bodies_updated,
            contacts: report.contacts.len(),
            elapsed: started.elapsed(),
        };
        log::trace!(
            target: "prim_physics::scene",
            "tick {}: {} change(s), {} updated, {} contact(s) in {:?}",
            self.ticks,
            summary.changes_applied,
            summary.bodies_updated,
            summary.contacts,
            summary.elapsed
        );
        summary
    }

    /// Take the events raised since the last call
    pub fn take_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read-only view of a body
    pub fn body(&self, id: BodyId) -> Option<&PhysicsBody> {
        self.bodies.get(id)
    }

    /// Every body
    pub fn bodies(&self) -> &BodyArena {
        &self.bodies
    }

    /// Number of bodies
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// True if the scene has no bodies
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    /// Join the native bodies of `a` and `b`
    ///
    /// Both must be physical linkset roots. Any joint already on the pair
    /// is replaced. The joint survives rebuilds of either body and is only
    /// destroyed with [`remove_constraint`](Self::remove_constraint) or
    /// when one of its bodies is removed.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        a: BodyId,
        b: BodyId,
        frame_a: Frame,
        frame_b: Frame,
    ) -> PhysicsResult<Constraint> {
        if !frame_a.is_finite() {
            return Err(PhysicsError::NonFinite {
                what: "constraint frame",
                body: a,
            });
        }
        if !frame_b.is_finite() {
            return Err(PhysicsError::NonFinite {
                what: "constraint frame",
                body: b,
            });
        }
        let body_a = self
            .bodies
            .get(a)
            .ok_or(PhysicsError::UnknownBody(a))?
            .body_handle();
        let body_b = self
            .bodies
            .get(b)
            .ok_or(PhysicsError::UnknownBody(b))?
            .body_handle();
        let (Some(body_a), Some(body_b)) = (body_a, body_b) else {
            return Err(PhysicsError::ConstraintBodiesMissing { a, b });
        };

        let raw = self
            .engine
            .create_constraint(kind, body_a.raw(), body_b.raw(), frame_a, frame_b)
            .ok_or(PhysicsError::EngineAllocation {
                what: "constraint",
                body: a,
            })?;
        let constraint = Constraint::new(raw, kind, body_a, body_b, frame_a, frame_b);
        self.constraints.add(constraint.clone(), &mut self.engine);
        log::debug!(
            target: "prim_physics::constraint",
            "{:?} joint between {} and {}",
            kind,
            a,
            b
        );
        Ok(constraint)
    }

    /// Remove the joint between `a` and `b`; false if there was none
    pub fn remove_constraint(&mut self, a: BodyId, b: BodyId) -> bool {
        self.constraints
            .remove_and_destroy_pair(a, b, &mut self.engine)
    }

    /// Set linear or angular limits on the joint between `a` and `b`
    pub fn set_constraint_limits(
        &mut self,
        a: BodyId,
        b: BodyId,
        kind: LimitKind,
        low: DVec3,
        high: DVec3,
    ) -> bool {
        if !low.is_finite() || !high.is_finite() {
            log::warn!(
                target: "prim_physics::constraint",
                "ignoring non-finite limits between {} and {}",
                a,
                b
            );
            return false;
        }
        self.constraints
            .set_limits(a, b, kind, low, high, &mut self.engine)
    }

    /// Tune a parameter of the joint between `a` and `b`
    pub fn set_constraint_param(
        &mut self,
        a: BodyId,
        b: BodyId,
        param: ConstraintParam,
        value: f64,
        axis: ConstraintAxis,
    ) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.constraints
            .set_param(a, b, param, value, axis, &mut self.engine)
    }

    /// Recompute every joint after bodies were moved in bulk
    pub fn recalculate_constraints(&mut self) -> usize {
        self.constraints.recalculate_all(&mut self.engine)
    }

    /// The joints of this world
    pub fn constraints(&self) -> &ConstraintCollection {
        &self.constraints
    }

    /// Current terrain
    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    /// Replace the terrain heightmap
    pub fn set_terrain(&mut self, terrain: Terrain) {
        self.terrain = terrain;
    }

    /// Move the water plane
    pub fn set_water_level(&mut self, level: f64) {
        self.config.water_level = level;
        self.terrain.set_water_level(level);
    }

    /// Configuration in use
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// The native engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The native engine, mutably; bypasses the change protocol
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: PhysicsEngine> Drop for PhysicsScene<E> {
    fn drop(&mut self) {
        self.constraints.clear(&mut self.engine);
    }
}

/// Volumes for the `Add` records of a batch, computed up front
fn precompute_volumes(records: &[ChangeRecord]) -> Vec<Option<f64>> {
    let adds: Vec<(usize, &ShapeDescriptor, DVec3)> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match &record.change {
            Change::Add(descriptor) => {
                Some((index, &descriptor.shape, sanitize_size(descriptor.size)))
            }
            _ => None,
        })
        .collect();

    let mut volumes = vec![None; records.len()];
    if adds.is_empty() {
        return volumes;
    }
    let items: Vec<(&ShapeDescriptor, DVec3)> =
        adds.iter().map(|(_, shape, size)| (*shape, *size)).collect();
    for ((index, _, _), volume) in adds.iter().zip(VolumeMassCalculator::compute_volumes(&items)) {
        volumes[*index] = Some(volume);
    }
    volumes
}
