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
//! Notifications raised toward the scene layer
//!
//! The bridge never calls back into the scene. Events are buffered during
//! a tick and handed out by [`PhysicsScene::take_events`](crate::PhysicsScene::take_events).

use crate::body::PhysicsBody;
use crate::id::BodyId;
use glam::{DQuat, DVec3};

/// One contact as seen by a subscribed body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionContact {
    /// Body on the other side; `None` for terrain
    pub other: Option<BodyId>,
    /// World contact point
    pub position: DVec3,
    /// Contact normal
    pub normal: DVec3,
    /// Penetration depth
    pub depth: f64,
}

/// Something the scene layer should know about
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A body's position, orientation or velocity changed materially
    TerseUpdate {
        /// Body that moved
        body: BodyId,
        /// New position
        position: DVec3,
        /// New orientation
        orientation: DQuat,
        /// New linear velocity
        velocity: DVec3,
        /// New angular velocity
        angular_velocity: DVec3,
        /// New acceleration
        acceleration: DVec3,
    },
    /// A body left the region and was parked
    OutOfBounds {
        /// Body that left
        body: BodyId,
        /// Clamped position it was parked at
        position: DVec3,
    },
    /// Contacts gathered for a subscribed body; may be empty once
    Collisions {
        /// Subscribed body
        body: BodyId,
        /// Contacts since the last report
        contacts: Vec<CollisionContact>,
    },
}

impl SceneEvent {
    /// Body the event is about
    pub fn body(&self) -> BodyId {
        match self {
            SceneEvent::TerseUpdate { body, .. }
            | SceneEvent::OutOfBounds { body, .. }
            | SceneEvent::Collisions { body, .. } => *body,
        }
    }

    /// Snapshot a body's kinematic state
    pub(crate) fn terse_update(body: &PhysicsBody) -> Self {
        SceneEvent::TerseUpdate {
            body: body.id(),
            position: body.position(),
            orientation: body.orientation(),
            velocity: body.velocity(),
            angular_velocity: body.angular_velocity(),
            acceleration: body.acceleration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_body() {
        let id = BodyId::new(7);
        let event = SceneEvent::OutOfBounds {
            body: id,
            position: DVec3::ZERO,
        };
        assert_eq!(event.body(), id);

        let event = SceneEvent::Collisions {
            body: id,
            contacts: Vec::new(),
        };
        assert_eq!(event.body(), id);
    }
}
