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
//! Scene configuration
//!
//! [`SceneConfig`] carries every tunable the bridge reads during a tick.
//! It can be built in code with the `with_*` methods, deserialized with
//! serde, or patched from the environment:
//!
//! ```bash
//! export PRIM_PHYSICS_TIMESTEP=0.0111
//! export PRIM_PHYSICS_MAX_MASS=5000
//! ```

use crate::error::{PhysicsError, PhysicsResult};
use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

/// Density used when a prim does not specify one (aluminium, g/cm³ scaled)
pub const DEFAULT_DENSITY: f64 = 10.000006836;

/// Upper bound on accumulated collision frame time, in milliseconds
pub const COLLISION_FRAME_TIME_CAP_MS: u32 = 50_000;

/// Environment variable overriding [`SceneConfig::timestep`]
pub const ENV_TIMESTEP: &str = "PRIM_PHYSICS_TIMESTEP";
/// Environment variable overriding [`SceneConfig::max_substeps`]
pub const ENV_MAX_SUBSTEPS: &str = "PRIM_PHYSICS_MAX_SUBSTEPS";
/// Environment variable overriding [`SceneConfig::max_mass`]
pub const ENV_MAX_MASS: &str = "PRIM_PHYSICS_MAX_MASS";
/// Environment variable overriding [`SceneConfig::default_density`]
pub const ENV_DEFAULT_DENSITY: &str = "PRIM_PHYSICS_DEFAULT_DENSITY";

/// Tunables for one simulation world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Fixed simulation step in seconds
    pub timestep: f64,
    /// Maximum number of sub-steps the engine may take per tick
    pub max_substeps: u32,
    /// Gravity applied by the pre-step force pass
    pub gravity: DVec3,
    /// Size of the region along X and Y
    pub world_extents: DVec2,
    /// Lowest legal Z coordinate
    pub min_z: f64,
    /// Highest legal Z coordinate
    pub max_z: f64,
    /// Density assigned to new prims
    pub default_density: f64,
    /// Mass floor
    pub min_mass: f64,
    /// Mass ceiling
    pub max_mass: f64,
    /// Quiet steps before the engine puts a body to sleep
    pub body_auto_disable_frames: u32,
    /// Height of the water plane
    pub water_level: f64,
    /// Level of detail handed to the mesher
    pub mesh_level_of_detail: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            timestep: 0.02,
            max_substeps: 10,
            gravity: DVec3::new(0.0, 0.0, -9.8),
            world_extents: DVec2::new(256.0, 256.0),
            min_z: -100.0,
            max_z: 100_000.0,
            default_density: DEFAULT_DENSITY,
            min_mass: 0.0001,
            max_mass: 10_000.01,
            body_auto_disable_frames: 5,
            water_level: 20.0,
            mesh_level_of_detail: 32,
        }
    }
}

impl SceneConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration patched from `PRIM_PHYSICS_*` environment variables
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(std::env::vars());
        config
    }

    /// Apply `(name, value)` overrides, ignoring unknown names
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref();
            match key {
                ENV_TIMESTEP => parse_into(key, value, &mut self.timestep),
                ENV_MAX_SUBSTEPS => parse_into(key, value, &mut self.max_substeps),
                ENV_MAX_MASS => parse_into(key, value, &mut self.max_mass),
                ENV_DEFAULT_DENSITY => parse_into(key, value, &mut self.default_density),
                _ => {}
            }
        }
    }

    /// Set the timestep
    ///
    /// # Panics
    ///
    /// Panics if timestep is non-positive, NaN, or infinite
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        assert!(
            timestep > 0.0 && timestep.is_finite(),
            "Timestep must be positive and finite"
        );
        self.timestep = timestep;
        self
    }

    /// Set the sub-step limit
    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps;
        self
    }

    /// Set gravity
    pub fn with_gravity(mut self, gravity: DVec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the region size
    pub fn with_world_extents(mut self, x: f64, y: f64) -> Self {
        self.world_extents = DVec2::new(x, y);
        self
    }

    /// Set the mass ceiling
    pub fn with_max_mass(mut self, max_mass: f64) -> Self {
        self.max_mass = max_mass;
        self
    }

    /// Set the default density
    pub fn with_default_density(mut self, density: f64) -> Self {
        self.default_density = density;
        self
    }

    /// Set the water level
    pub fn with_water_level(mut self, level: f64) -> Self {
        self.water_level = level;
        self
    }

    /// Set the engine auto-disable step count
    pub fn with_auto_disable_frames(mut self, frames: u32) -> Self {
        self.body_auto_disable_frames = frames;
        self
    }

    /// `1 / timestep`
    pub fn inv_timestep(&self) -> f64 {
        1.0 / self.timestep
    }

    /// Smallest tau accepted by the move-to and hover controllers
    pub fn min_controller_tau(&self) -> f64 {
        self.timestep.max(0.05)
    }

    /// Check every field for a usable value
    pub fn validate(&self) -> PhysicsResult<()> {
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!(
                "timestep must be positive and finite, got {}",
                self.timestep
            )));
        }
        if self.max_substeps == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_substeps must be at least 1".to_string(),
            ));
        }
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".to_string()));
        }
        let extents = self.world_extents;
        if !(extents.x > 0.0 && extents.y > 0.0 && extents.is_finite()) {
            return Err(PhysicsError::InvalidConfig(
                "world extents must be positive".to_string(),
            ));
        }
        if !(self.min_z < self.max_z) {
            return Err(PhysicsError::InvalidConfig(format!(
                "min_z {} must be below max_z {}",
                self.min_z, self.max_z
            )));
        }
        if !(self.min_mass > 0.0 && self.min_mass <= self.max_mass) {
            return Err(PhysicsError::InvalidConfig(format!(
                "mass range [{}, {}] is empty",
                self.min_mass, self.max_mass
            )));
        }
        if !(self.default_density > 0.0 && self.default_density.is_finite()) {
            return Err(PhysicsError::InvalidConfig(
                "default density must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_into<T: std::str::FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.trim().parse::<T>() {
        Ok(parsed) => {
            log::info!(target: "prim_physics::config", "{} overridden to {}", key, value);
            *slot = parsed;
        }
        Err(_) => {
            log::warn!(target: "prim_physics::config", "ignoring unparsable {}={:?}", key, value);
        }
    }
}
