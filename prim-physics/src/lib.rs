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
//! # Prim Physics
//!
//! A rigid-body physics bridge between a scene of parametric "prims" and a
//! native physics engine.
//!
//! ## Features
//!
//! - **Mass Estimation**: Analytic volume of extruded-profile shapes before
//!   any mesh exists
//! - **Deferred Changes**: Producers on any thread enqueue typed change
//!   records; only the simulation thread touches native state
//! - **Linksets**: Several prims simulated as one native body with
//!   aggregated inertia
//! - **Constraints**: One joint per body pair, destroyed with its bodies
//! - **Engine Capability**: The native library sits behind the
//!   [`PhysicsEngine`] trait; [`SandboxEngine`] is a pure-Rust reference
//! - **Parallelization**: Optional Rayon volume precompute for bulk adds
//!
//! ## Example
//!
//! ```rust
//! use prim_physics::{PhysicsScene, PrimDescriptor, SandboxEngine, SceneConfig, SceneEvent};
//! use glam::DVec3;
//!
//! let mut scene = PhysicsScene::new(SandboxEngine::new(), SceneConfig::default()).unwrap();
//! let sender = scene.sender();
//!
//! let id = sender
//!     .add_prim(PrimDescriptor::new(DVec3::new(128.0, 128.0, 50.0), DVec3::ONE).physical())
//!     .unwrap();
//! scene.step();
//!
//! // gravity pulled it down and the scene was told
//! assert!(scene.body(id).unwrap().position().z < 50.0);
//! assert!(scene
//!     .take_events()
//!     .iter()
//!     .any(|e| matches!(e, SceneEvent::TerseUpdate { body, .. } if *body == id)));
//! ```

#![warn(missing_docs)]

/// Physical bodies, linksets and their per-tick passes
pub mod body;

/// Deferred change records and the queue that carries them
pub mod change;

/// Scene tunables
pub mod config;

/// Joints between bodies
pub mod constraint;

/// Native engine capability and the sandbox reference engine
pub mod engine;

/// Error types
pub mod error;

/// Notifications raised toward the scene layer
pub mod events;

/// Body ids and their allocator
pub mod id;

/// Mass and inertia
pub mod mass;

/// Simulation driver
pub mod scene;

/// Parametric shapes and volume estimation
pub mod shape;

/// Terrain height and water level
pub mod terrain;

/// Vehicle parameter blocks and motors
pub mod vehicle;

pub use body::{
    BodyArena, BodyFlags, HoverKind, HoverSettings, Material, PhysicsBody, PrimDescriptor,
};
pub use change::{Change, ChangeQueue, ChangeSender};
pub use config::SceneConfig;
pub use constraint::{Constraint, ConstraintCollection};
pub use engine::{BodyHandle, Mesher, NullMesher, PhysicsEngine, SandboxEngine, ShapeHandle};
pub use error::{PhysicsError, PhysicsResult};
pub use events::{CollisionContact, SceneEvent};
pub use id::{BodyId, IdAllocator};
pub use scene::{PhysicsScene, StepSummary};
pub use shape::{ShapeDescriptor, VolumeMassCalculator};
pub use terrain::Terrain;
