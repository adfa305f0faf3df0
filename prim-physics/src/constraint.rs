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
//! Joints between bodies
//!
//! A [`ConstraintCollection`] owns every joint of one world and keeps at
//! most one joint per unordered body pair. It is shared between the change
//! application path and the body destruction path, so its state sits
//! behind a single `parking_lot::Mutex`.
//!
//! A joint is either live, with a native handle, or parked. Rebuilding a
//! body parks its joints; once both ends own a native body again the joint
//! is re-created with its frames, limits and parameters. Only removing a
//! body, or the joint itself, forgets it.
//!
//! Native handles are released through the engine passed to each
//! mutating call; the collection itself never holds the engine.

use crate::engine::{
    BodyHandle, ConstraintAxis, ConstraintKind, ConstraintParam, Frame, LimitKind,
    PhysicsEngine, RawConstraint,
};
use crate::id::BodyId;
use glam::DVec3;
use parking_lot::Mutex;

/// A native joint between two bodies
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    handle: RawConstraint,
    kind: ConstraintKind,
    body_a: BodyHandle,
    body_b: BodyHandle,
    frame_a: Frame,
    frame_b: Frame,
    linear_limits: Option<(DVec3, DVec3)>,
    angular_limits: Option<(DVec3, DVec3)>,
    params: Vec<(ConstraintParam, ConstraintAxis, f64)>,
}

impl Constraint {
    /// Wrap a joint the engine has already created
    pub fn new(
        handle: RawConstraint,
        kind: ConstraintKind,
        body_a: BodyHandle,
        body_b: BodyHandle,
        frame_a: Frame,
        frame_b: Frame,
    ) -> Self {
        Constraint {
            handle,
            kind,
            body_a,
            body_b,
            frame_a,
            frame_b,
            linear_limits: None,
            angular_limits: None,
            params: Vec::new(),
        }
    }

    /// Native handle
    pub fn handle(&self) -> RawConstraint {
        self.handle
    }

    /// Joint type
    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// First body
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// Second body
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Attachment frame on the first body
    pub fn frame_a(&self) -> Frame {
        self.frame_a
    }

    /// Attachment frame on the second body
    pub fn frame_b(&self) -> Frame {
        self.frame_b
    }

    /// Last limits the engine accepted for `kind`
    pub fn limits(&self, kind: LimitKind) -> Option<(DVec3, DVec3)> {
        match kind {
            LimitKind::Linear => self.linear_limits,
            LimitKind::Angular => self.angular_limits,
        }
    }

    /// Parameters the engine accepted, one entry per parameter and axis
    pub fn params(&self) -> &[(ConstraintParam, ConstraintAxis, f64)] {
        &self.params
    }

    /// True if either end is `body`
    pub fn references(&self, body: BodyId) -> bool {
        self.body_a.id() == body || self.body_b.id() == body
    }

    /// True if the joint connects `a` and `b`, in either order
    pub fn connects(&self, a: BodyId, b: BodyId) -> bool {
        (self.body_a.id() == a && self.body_b.id() == b)
            || (self.body_a.id() == b && self.body_b.id() == a)
    }

    fn record_limits(&mut self, kind: LimitKind, low: DVec3, high: DVec3) {
        match kind {
            LimitKind::Linear => self.linear_limits = Some((low, high)),
            LimitKind::Angular => self.angular_limits = Some((low, high)),
        }
    }

    fn record_param(&mut self, param: ConstraintParam, axis: ConstraintAxis, value: f64) {
        match self.params.iter_mut().find(|(p, a, _)| *p == param && *a == axis) {
            Some(entry) => entry.2 = value,
            None => self.params.push((param, axis, value)),
        }
    }

    /// Re-create this joint between `body_a` and `body_b`
    ///
    /// Frames, limits and parameters carry over to the new native joint.
    fn recreate(
        &self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        engine: &mut dyn PhysicsEngine,
    ) -> Option<Constraint> {
        let handle = engine.create_constraint(
            self.kind,
            body_a.raw(),
            body_b.raw(),
            self.frame_a,
            self.frame_b,
        )?;
        for kind in [LimitKind::Linear, LimitKind::Angular] {
            if let Some((low, high)) = self.limits(kind) {
                engine.set_constraint_limits(handle, kind, low, high);
            }
        }
        for (param, axis, value) in &self.params {
            engine.set_constraint_param(handle, *param, *value, *axis);
        }
        Some(Constraint {
            handle,
            body_a,
            body_b,
            ..self.clone()
        })
    }
}

#[derive(Debug, Default)]
struct Joints {
    live: Vec<Constraint>,
    parked: Vec<Constraint>,
}

/// All joints of one world
#[derive(Debug, Default)]
pub struct ConstraintCollection {
    joints: Mutex<Joints>,
}

impl ConstraintCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        ConstraintCollection {
            joints: Mutex::new(Joints::default()),
        }
    }

    /// Number of live joints
    pub fn len(&self) -> usize {
        self.joints.lock().live.len()
    }

    /// True if there are no live joints
    pub fn is_empty(&self) -> bool {
        self.joints.lock().live.is_empty()
    }

    /// Number of joints waiting for their bodies to be rebuilt
    pub fn parked_len(&self) -> usize {
        self.joints.lock().parked.len()
    }

    /// True if the joint between `a` and `b` is waiting for its bodies
    pub fn is_parked(&self, a: BodyId, b: BodyId) -> bool {
        self.joints.lock().parked.iter().any(|c| c.connects(a, b))
    }

    /// Insert `constraint`, destroying any joint already on the same pair
    ///
    /// Returns true if an older joint was replaced.
    pub fn add(&self, constraint: Constraint, engine: &mut dyn PhysicsEngine) -> bool {
        let mut joints = self.joints.lock();
        let a = constraint.body_a.id();
        let b = constraint.body_b.id();
        let parked = joints.parked.len();
        joints.parked.retain(|c| !c.connects(a, b));
        let mut replaced = joints.parked.len() != parked;
        if let Some(index) = joints.live.iter().position(|c| c.connects(a, b)) {
            let old = joints.live.remove(index);
            if old.handle != constraint.handle {
                engine.destroy_constraint(old.handle);
            }
            replaced = true;
        }
        if replaced {
            log::debug!(
                target: "prim_physics::constraint",
                "replacing joint between {} and {}",
                a,
                b
            );
        }
        joints.live.push(constraint);
        replaced
    }

    /// Live joint between `a` and `b`, in either order
    pub fn find(&self, a: BodyId, b: BodyId) -> Option<Constraint> {
        self.joints
            .lock()
            .live
            .iter()
            .find(|c| c.connects(a, b))
            .cloned()
    }

    /// Set limits on the live joint between `a` and `b`
    ///
    /// Accepted limits are kept so a rebuilt joint gets them back.
    pub fn set_limits(
        &self,
        a: BodyId,
        b: BodyId,
        kind: LimitKind,
        low: DVec3,
        high: DVec3,
        engine: &mut dyn PhysicsEngine,
    ) -> bool {
        let mut joints = self.joints.lock();
        let Some(joint) = joints.live.iter_mut().find(|c| c.connects(a, b)) else {
            return false;
        };
        if !engine.set_constraint_limits(joint.handle, kind, low, high) {
            return false;
        }
        joint.record_limits(kind, low, high);
        true
    }

    /// Set a parameter on the live joint between `a` and `b`
    ///
    /// Accepted values are kept so a rebuilt joint gets them back.
    pub fn set_param(
        &self,
        a: BodyId,
        b: BodyId,
        param: ConstraintParam,
        value: f64,
        axis: ConstraintAxis,
        engine: &mut dyn PhysicsEngine,
    ) -> bool {
        let mut joints = self.joints.lock();
        let Some(joint) = joints.live.iter_mut().find(|c| c.connects(a, b)) else {
            return false;
        };
        if !engine.set_constraint_param(joint.handle, param, value, axis) {
            return false;
        }
        joint.record_param(param, axis, value);
        true
    }

    /// Remove the joint between `a` and `b`, live or parked
    pub fn remove_and_destroy_pair(
        &self,
        a: BodyId,
        b: BodyId,
        engine: &mut dyn PhysicsEngine,
    ) -> bool {
        let mut joints = self.joints.lock();
        let parked = joints.parked.len();
        joints.parked.retain(|c| !c.connects(a, b));
        let mut removed = joints.parked.len() != parked;
        if let Some(index) = joints.live.iter().position(|c| c.connects(a, b)) {
            let old = joints.live.remove(index);
            engine.destroy_constraint(old.handle);
            removed = true;
        }
        removed
    }

    /// Forget every joint that references `body`, live or parked
    ///
    /// Joints not referencing `body` are untouched. Returns true if any
    /// joint was removed.
    pub fn remove_and_destroy_body(&self, body: BodyId, engine: &mut dyn PhysicsEngine) -> bool {
        let mut joints = self.joints.lock();
        let before = joints.live.len() + joints.parked.len();
        joints.live.retain(|c| {
            if c.references(body) {
                engine.destroy_constraint(c.handle);
                false
            } else {
                true
            }
        });
        joints.parked.retain(|c| !c.references(body));
        let removed = before - joints.live.len() - joints.parked.len();
        if removed > 0 {
            log::debug!(
                target: "prim_physics::constraint",
                "destroyed {} joint(s) of {}",
                removed,
                body
            );
        }
        removed > 0
    }

    /// Release the native joints of `body` and keep them for
    /// [`restore_body`](Self::restore_body)
    ///
    /// Returns the number of joints parked.
    pub fn park_body(&self, body: BodyId, engine: &mut dyn PhysicsEngine) -> usize {
        let mut joints = self.joints.lock();
        let (moving, staying): (Vec<Constraint>, Vec<Constraint>) =
            joints.live.drain(..).partition(|c| c.references(body));
        joints.live = staying;
        for joint in &moving {
            engine.destroy_constraint(joint.handle);
        }
        let count = moving.len();
        joints.parked.extend(moving);
        if count > 0 {
            log::debug!(
                target: "prim_physics::constraint",
                "parked {} joint(s) of {}",
                count,
                body
            );
        }
        count
    }

    /// Re-create parked joints of `body` whose ends both have native bodies
    ///
    /// `resolve` maps a body id to its current native body. Joints with an
    /// end that has none stay parked. Returns the number of joints restored.
    pub fn restore_body<F>(&self, body: BodyId, engine: &mut dyn PhysicsEngine, resolve: F) -> usize
    where
        F: Fn(BodyId) -> Option<BodyHandle>,
    {
        let mut joints = self.joints.lock();
        let parked = std::mem::take(&mut joints.parked);
        let mut restored = 0;
        for joint in parked {
            if !joint.references(body) {
                joints.parked.push(joint);
                continue;
            }
            let ends = resolve(joint.body_a.id()).zip(resolve(joint.body_b.id()));
            let Some((body_a, body_b)) = ends else {
                joints.parked.push(joint);
                continue;
            };
            match joint.recreate(body_a, body_b, engine) {
                Some(rebuilt) => {
                    joints.live.push(rebuilt);
                    restored += 1;
                }
                None => {
                    log::warn!(
                        target: "prim_physics::constraint",
                        "engine refused to rebuild joint between {} and {}",
                        joint.body_a.id(),
                        joint.body_b.id()
                    );
                    joints.parked.push(joint);
                }
            }
        }
        if restored > 0 {
            log::debug!(
                target: "prim_physics::constraint",
                "restored {} joint(s) of {}",
                restored,
                body
            );
        }
        restored
    }

    /// Recompute every joint's transforms after bodies moved in bulk
    ///
    /// Returns the number of joints the engine accepted.
    pub fn recalculate_all(&self, engine: &mut dyn PhysicsEngine) -> usize {
        self.joints
            .lock()
            .live
            .iter()
            .filter(|c| engine.calculate_constraint_transforms(c.handle))
            .count()
    }

    /// Destroy every joint, live or parked
    pub fn clear(&self, engine: &mut dyn PhysicsEngine) {
        let mut joints = self.joints.lock();
        for c in joints.live.drain(..) {
            engine.destroy_constraint(c.handle);
        }
        joints.parked.clear();
    }

    /// Copy of the current live joints
    pub fn snapshot(&self) -> Vec<Constraint> {
        self.joints.lock().live.clone()
    }
}
