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
//! Vehicle parameters and motors
//!
//! A body with a vehicle replaces the plain gravity/force pass with
//! [`Vehicle::step`]. Motors are expressed in the vehicle's reference
//! frame and drive velocity toward a target over a timescale:
//!
//! ```text
//! F = m * (v_target - v) / max(timescale, dt)
//! ```
//!
//! Friction timescales damp each body-frame axis the same way, and the
//! hover term pulls the body toward a height above ground or water.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Timescales at or above this value switch a term off
pub const DISABLED_TIMESCALE: f64 = 300.0;

/// Vehicle archetype; each sets its own defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VehicleType {
    /// No vehicle behaviour
    #[default]
    None,
    /// Slides on the ground
    Sled,
    /// Drives on the ground
    Car,
    /// Floats on water
    Boat,
    /// Flies with lift
    Airplane,
    /// Floats in the air
    Balloon,
}

/// Scalar vehicle parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleFloatParam {
    /// Time to reach the linear motor velocity
    LinearMotorTimescale,
    /// Time for the linear motor to decay
    LinearMotorDecayTimescale,
    /// Time to reach the angular motor velocity
    AngularMotorTimescale,
    /// Time for the angular motor to decay
    AngularMotorDecayTimescale,
    /// Hover height
    HoverHeight,
    /// Hover efficiency, 0..1
    HoverEfficiency,
    /// Hover timescale
    HoverTimescale,
    /// Buoyancy, 0..1
    Buoyancy,
}

/// Vector vehicle parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleVectorParam {
    /// Linear motor target velocity in the vehicle frame
    LinearMotorDirection,
    /// Angular motor target velocity in the vehicle frame
    AngularMotorDirection,
    /// Per-axis linear friction timescales
    LinearFrictionTimescale,
    /// Per-axis angular friction timescales
    AngularFrictionTimescale,
}

/// Rotation vehicle parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleRotationParam {
    /// Vehicle frame relative to the body
    ReferenceFrame,
}

bitflags::bitflags! {
    /// Vehicle behaviour switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VehicleFlags: u32 {
        /// No vertical deflection
        const NO_DEFLECTION_UP = 0x001;
        /// Limit roll only
        const LIMIT_ROLL_ONLY = 0x002;
        /// Hover over water only
        const HOVER_WATER_ONLY = 0x004;
        /// Hover over terrain only
        const HOVER_TERRAIN_ONLY = 0x008;
        /// Hover height is absolute
        const HOVER_GLOBAL_HEIGHT = 0x010;
        /// Hover only pushes up
        const HOVER_UP_ONLY = 0x020;
        /// Linear motor cannot push up
        const LIMIT_MOTOR_UP = 0x040;
    }
}

/// World state a vehicle step reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleInput {
    /// Mass of the whole linkset
    pub mass: f64,
    /// Root position
    pub position: DVec3,
    /// Root orientation
    pub orientation: DQuat,
    /// Linear velocity
    pub linear_velocity: DVec3,
    /// Angular velocity
    pub angular_velocity: DVec3,
    /// Scene gravity
    pub gravity: DVec3,
    /// Ground height under the vehicle
    pub ground_height: f64,
    /// Water level
    pub water_level: f64,
    /// Fixed step
    pub timestep: f64,
}

/// Force and torque a vehicle step produces
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleOutput {
    /// World force
    pub force: DVec3,
    /// World torque
    pub torque: DVec3,
}

/// Vehicle parameter block
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    kind: VehicleType,
    linear_motor_direction: DVec3,
    linear_motor_timescale: f64,
    linear_motor_decay_timescale: f64,
    angular_motor_direction: DVec3,
    angular_motor_timescale: f64,
    angular_motor_decay_timescale: f64,
    linear_friction_timescale: DVec3,
    angular_friction_timescale: DVec3,
    hover_height: f64,
    hover_efficiency: f64,
    hover_timescale: f64,
    buoyancy: f64,
    reference_frame: DQuat,
    flags: VehicleFlags,
}

impl Vehicle {
    /// Vehicle of `kind` with that archetype's defaults
    pub fn new(kind: VehicleType) -> Self {
        let mut vehicle = Vehicle {
            kind: VehicleType::None,
            linear_motor_direction: DVec3::ZERO,
            linear_motor_timescale: DISABLED_TIMESCALE,
            linear_motor_decay_timescale: 120.0,
            angular_motor_direction: DVec3::ZERO,
            angular_motor_timescale: DISABLED_TIMESCALE,
            angular_motor_decay_timescale: 120.0,
            linear_friction_timescale: DVec3::splat(DISABLED_TIMESCALE),
            angular_friction_timescale: DVec3::splat(DISABLED_TIMESCALE),
            hover_height: 0.0,
            hover_efficiency: 0.0,
            hover_timescale: DISABLED_TIMESCALE,
            buoyancy: 0.0,
            reference_frame: DQuat::IDENTITY,
            flags: VehicleFlags::empty(),
        };
        vehicle.set_type(kind);
        vehicle
    }

    /// Archetype
    pub fn kind(&self) -> VehicleType {
        self.kind
    }

    /// Behaviour switches
    pub fn flags(&self) -> VehicleFlags {
        self.flags
    }

    /// Linear motor target in the vehicle frame
    pub fn linear_motor_direction(&self) -> DVec3 {
        self.linear_motor_direction
    }

    /// Angular motor target in the vehicle frame
    pub fn angular_motor_direction(&self) -> DVec3 {
        self.angular_motor_direction
    }

    /// Hover height
    pub fn hover_height(&self) -> f64 {
        self.hover_height
    }

    /// Switch archetype, resetting parameters to its defaults
    pub fn set_type(&mut self, kind: VehicleType) {
        self.kind = kind;
        self.linear_motor_direction = DVec3::ZERO;
        self.angular_motor_direction = DVec3::ZERO;
        self.reference_frame = DQuat::IDENTITY;
        match kind {
            VehicleType::None => {}
            VehicleType::Sled => {
                self.linear_friction_timescale = DVec3::new(30.0, 1.0, 1000.0);
                self.angular_friction_timescale = DVec3::splat(30.0);
                self.linear_motor_timescale = 1000.0;
                self.linear_motor_decay_timescale = 120.0;
                self.angular_motor_timescale = 1000.0;
                self.angular_motor_decay_timescale = 120.0;
                self.hover_timescale = DISABLED_TIMESCALE;
                self.buoyancy = 0.0;
                self.flags = VehicleFlags::NO_DEFLECTION_UP
                    | VehicleFlags::LIMIT_ROLL_ONLY
                    | VehicleFlags::LIMIT_MOTOR_UP;
            }
            VehicleType::Car => {
                self.linear_friction_timescale = DVec3::new(100.0, 2.0, 1000.0);
                self.angular_friction_timescale = DVec3::splat(1000.0);
                self.linear_motor_timescale = 1.0;
                self.linear_motor_decay_timescale = 60.0;
                self.angular_motor_timescale = 1.0;
                self.angular_motor_decay_timescale = 0.8;
                self.hover_timescale = DISABLED_TIMESCALE;
                self.buoyancy = 0.0;
                self.flags = VehicleFlags::NO_DEFLECTION_UP
                    | VehicleFlags::LIMIT_ROLL_ONLY
                    | VehicleFlags::HOVER_UP_ONLY
                    | VehicleFlags::LIMIT_MOTOR_UP;
            }
            VehicleType::Boat => {
                self.linear_friction_timescale = DVec3::new(10.0, 3.0, 2.0);
                self.angular_friction_timescale = DVec3::splat(10.0);
                self.linear_motor_timescale = 5.0;
                self.linear_motor_decay_timescale = 60.0;
                self.angular_motor_timescale = 4.0;
                self.angular_motor_decay_timescale = 4.0;
                self.hover_height = 0.0;
                self.hover_efficiency = 0.5;
                self.hover_timescale = 2.0;
                self.buoyancy = 1.0;
                self.flags = VehicleFlags::NO_DEFLECTION_UP
                    | VehicleFlags::HOVER_WATER_ONLY
                    | VehicleFlags::HOVER_UP_ONLY
                    | VehicleFlags::LIMIT_MOTOR_UP;
            }
            VehicleType::Airplane => {
                self.linear_friction_timescale = DVec3::new(200.0, 10.0, 5.0);
                self.angular_friction_timescale = DVec3::splat(20.0);
                self.linear_motor_timescale = 2.0;
                self.linear_motor_decay_timescale = 60.0;
                self.angular_motor_timescale = 4.0;
                self.angular_motor_decay_timescale = 4.0;
                self.hover_timescale = DISABLED_TIMESCALE;
                self.buoyancy = 0.0;
                self.flags = VehicleFlags::LIMIT_ROLL_ONLY;
            }
            VehicleType::Balloon => {
                self.linear_friction_timescale = DVec3::splat(5.0);
                self.angular_friction_timescale = DVec3::splat(10.0);
                self.linear_motor_timescale = 5.0;
                self.linear_motor_decay_timescale = 60.0;
                self.angular_motor_timescale = 6.0;
                self.angular_motor_decay_timescale = 10.0;
                self.hover_height = 5.0;
                self.hover_efficiency = 0.8;
                self.hover_timescale = 10.0;
                self.buoyancy = 1.0;
                self.flags = VehicleFlags::NO_DEFLECTION_UP | VehicleFlags::HOVER_GLOBAL_HEIGHT;
            }
        }
    }

    /// Set a scalar parameter; values are clamped to their legal range
    pub fn set_float(&mut self, param: VehicleFloatParam, value: f64) {
        match param {
            VehicleFloatParam::LinearMotorTimescale => self.linear_motor_timescale = value.max(0.0),
            VehicleFloatParam::LinearMotorDecayTimescale => {
                self.linear_motor_decay_timescale = value.clamp(0.0, 120.0)
            }
            VehicleFloatParam::AngularMotorTimescale => {
                self.angular_motor_timescale = value.max(0.0)
            }
            VehicleFloatParam::AngularMotorDecayTimescale => {
                self.angular_motor_decay_timescale = value.clamp(0.0, 120.0)
            }
            VehicleFloatParam::HoverHeight => self.hover_height = value,
            VehicleFloatParam::HoverEfficiency => self.hover_efficiency = value.clamp(0.0, 1.0),
            VehicleFloatParam::HoverTimescale => self.hover_timescale = value.max(0.0),
            VehicleFloatParam::Buoyancy => self.buoyancy = value.clamp(-1.0, 1.0),
        }
    }

    /// Set a vector parameter
    pub fn set_vector(&mut self, param: VehicleVectorParam, value: DVec3) {
        match param {
            VehicleVectorParam::LinearMotorDirection => self.linear_motor_direction = value,
            VehicleVectorParam::AngularMotorDirection => self.angular_motor_direction = value,
            VehicleVectorParam::LinearFrictionTimescale => {
                self.linear_friction_timescale = value.max(DVec3::ZERO)
            }
            VehicleVectorParam::AngularFrictionTimescale => {
                self.angular_friction_timescale = value.max(DVec3::ZERO)
            }
        }
    }

    /// Set a rotation parameter
    pub fn set_rotation(&mut self, param: VehicleRotationParam, value: DQuat) {
        match param {
            VehicleRotationParam::ReferenceFrame => self.reference_frame = value.normalize(),
        }
    }

    /// Turn behaviour switches on or off
    pub fn set_flags(&mut self, flags: VehicleFlags, on: bool) {
        self.flags.set(flags, on);
    }

    /// Cut both motors
    pub fn stop(&mut self) {
        self.linear_motor_direction = DVec3::ZERO;
        self.angular_motor_direction = DVec3::ZERO;
    }

    fn hover_target(&self, input: &VehicleInput) -> f64 {
        if self.flags.contains(VehicleFlags::HOVER_GLOBAL_HEIGHT) {
            self.hover_height
        } else if self.flags.contains(VehicleFlags::HOVER_WATER_ONLY) {
            input.water_level + self.hover_height
        } else if self.flags.contains(VehicleFlags::HOVER_TERRAIN_ONLY) {
            input.ground_height + self.hover_height
        } else {
            input.ground_height.max(input.water_level) + self.hover_height
        }
    }

    /// Compute this step's force and torque and decay the motors
    pub fn step(&mut self, input: &VehicleInput) -> VehicleOutput {
        let dt = input.timestep;
        let frame = input.orientation * self.reference_frame;
        let mut output = VehicleOutput::default();
        if self.kind == VehicleType::None {
            return output;
        }

        // gravity, partly cancelled by buoyancy
        output.force += input.gravity * (1.0 - self.buoyancy) * input.mass;

        // linear motor
        if self.linear_motor_timescale < DISABLED_TIMESCALE {
            let mut target = frame * self.linear_motor_direction;
            if self.flags.contains(VehicleFlags::LIMIT_MOTOR_UP) && target.z > 0.0 {
                target.z = 0.0;
            }
            if target != DVec3::ZERO {
                let along = target.normalize();
                let current = along * input.linear_velocity.dot(along);
                output.force +=
                    (target - current) * input.mass / self.linear_motor_timescale.max(dt);
            }
        }

        // linear friction in the vehicle frame
        let local_velocity = frame.inverse() * input.linear_velocity;
        let mut friction = DVec3::ZERO;
        for axis in 0..3 {
            let timescale = self.linear_friction_timescale[axis];
            if timescale < DISABLED_TIMESCALE {
                friction[axis] = -local_velocity[axis] / timescale.max(dt);
            }
        }
        output.force += frame * friction * input.mass;

        // hover
        if self.hover_timescale < DISABLED_TIMESCALE && self.hover_height != 0.0 {
            let target = self.hover_target(input);
            let error = target - input.position.z;
            if error > 0.0 || !self.flags.contains(VehicleFlags::HOVER_UP_ONLY) {
                let timescale = self.hover_timescale.max(dt);
                let wanted = error / timescale;
                let push = (wanted - input.linear_velocity.z) / timescale;
                output.force.z += push * input.mass * self.hover_efficiency.max(0.1);
            }
        }

        // angular motor and friction
        let mut torque = DVec3::ZERO;
        if self.angular_motor_timescale < DISABLED_TIMESCALE {
            let target = frame * self.angular_motor_direction;
            torque += (target - input.angular_velocity) / self.angular_motor_timescale.max(dt);
        }
        let local_spin = frame.inverse() * input.angular_velocity;
        let mut spin_friction = DVec3::ZERO;
        for axis in 0..3 {
            let timescale = self.angular_friction_timescale[axis];
            if timescale < DISABLED_TIMESCALE {
                spin_friction[axis] = -local_spin[axis] / timescale.max(dt);
            }
        }
        torque += frame * spin_friction;
        output.torque = torque * input.mass;

        // motors decay toward zero
        if self.linear_motor_decay_timescale > 0.0 {
            let keep = (1.0 - dt / self.linear_motor_decay_timescale).max(0.0);
            self.linear_motor_direction *= keep;
        }
        if self.angular_motor_decay_timescale > 0.0 {
            let keep = (1.0 - dt / self.angular_motor_decay_timescale).max(0.0);
            self.angular_motor_direction *= keep;
        }

        output
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::new(VehicleType::None)
    }
}
