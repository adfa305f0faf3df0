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
//! Mass and inertia algebra
//!
//! [`MassProperties`] stores total mass, centre of mass and the inertia
//! tensor about the *reference point* of its frame (not about the centre
//! of mass). Keeping every part about a common reference point makes
//! composition a plain sum:
//!
//! ```text
//! I_total = Σ R_i · I_i · R_iᵀ  (each part translated to the reference point)
//! c_total = Σ m_i · c_i / Σ m_i
//! ```
//!
//! A linkset body is built by rotating and translating each child's
//! own-frame properties into the root frame, adding them, then shifting the
//! result so the centre of mass sits at the origin, which is what a native
//! rigid body expects.

use glam::{DMat3, DQuat, DVec3};

/// Mass, centre of mass and inertia about the frame origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Total mass
    pub mass: f64,
    /// Centre of mass in the frame
    pub center: DVec3,
    /// Inertia tensor about the frame origin
    pub inertia: DMat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::zero()
    }
}

/// `|v|² I - v vᵀ`, the parallel-axis term for a unit mass at `v`
fn parallel_axis(v: DVec3) -> DMat3 {
    let outer = DMat3::from_cols(v * v.x, v * v.y, v * v.z);
    DMat3::from_diagonal(DVec3::splat(v.length_squared())) - outer
}

impl MassProperties {
    /// Massless properties, the identity for [`add`](Self::add)
    pub fn zero() -> Self {
        MassProperties {
            mass: 0.0,
            center: DVec3::ZERO,
            inertia: DMat3::ZERO,
        }
    }

    /// Solid box of total mass `mass` and full extents `size`, centred on the origin
    pub fn box_total(mass: f64, size: DVec3) -> Self {
        let sq = size * size;
        let k = mass / 12.0;
        MassProperties {
            mass,
            center: DVec3::ZERO,
            inertia: DMat3::from_diagonal(DVec3::new(
                k * (sq.y + sq.z),
                k * (sq.x + sq.z),
                k * (sq.x + sq.y),
            )),
        }
    }

    /// Solid sphere of total mass `mass`, centred on the origin
    pub fn sphere_total(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        MassProperties {
            mass,
            center: DVec3::ZERO,
            inertia: DMat3::from_diagonal(DVec3::splat(i)),
        }
    }

    /// Move the body by `offset` relative to the reference point
    pub fn translate(&mut self, offset: DVec3) {
        let moved = self.center + offset;
        let shift = parallel_axis(moved) - parallel_axis(self.center);
        self.inertia = self.inertia + shift * self.mass;
        self.center = moved;
    }

    /// Rotate the body about the reference point
    pub fn rotate(&mut self, rotation: DQuat) {
        let r = DMat3::from_quat(rotation);
        self.inertia = r * self.inertia * r.transpose();
        self.center = rotation * self.center;
    }

    /// Merge `other` into `self`; both must share a reference point
    pub fn add(&mut self, other: &MassProperties) {
        let total = self.mass + other.mass;
        if total > 0.0 {
            self.center = (self.center * self.mass + other.center * other.mass) / total;
        }
        self.mass = total;
        self.inertia = self.inertia + other.inertia;
    }

    /// Shift the reference point to the centre of mass
    ///
    /// Returns the old centre of mass.
    pub fn recenter(&mut self) -> DVec3 {
        let c = self.center;
        self.translate(-c);
        self.center = DVec3::ZERO;
        c
    }

    /// Inertia about the centre of mass
    pub fn central_inertia(&self) -> DMat3 {
        self.inertia - parallel_axis(self.center) * self.mass
    }

    /// True if mass is positive and every component is finite
    pub fn is_valid(&self) -> bool {
        self.mass > 0.0
            && self.mass.is_finite()
            && self.center.is_finite()
            && self.inertia.is_finite()
    }
}
