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
//! Terrain height and water level
//!
//! The hover controller and vehicles need the ground height under a body.
//! Terrain is a regular heightmap with one sample per metre, sampled
//! bilinearly and clamped at the edges.

use crate::error::{PhysicsError, PhysicsResult};

/// Heightmap plus water plane
#[derive(Debug, Clone, PartialEq)]
pub struct Terrain {
    size_x: usize,
    size_y: usize,
    heights: Vec<f64>,
    water_level: f64,
}

impl Terrain {
    /// Flat terrain at `height`
    pub fn flat(height: f64, water_level: f64) -> Self {
        Terrain {
            size_x: 1,
            size_y: 1,
            heights: vec![height],
            water_level,
        }
    }

    /// Terrain from a row-major heightmap of `size_x` by `size_y` samples
    pub fn from_heightmap(
        size_x: usize,
        size_y: usize,
        heights: Vec<f64>,
        water_level: f64,
    ) -> PhysicsResult<Self> {
        if size_x == 0 || size_y == 0 || heights.len() != size_x * size_y {
            return Err(PhysicsError::InvalidConfig(format!(
                "heightmap of {} samples does not match {}x{}",
                heights.len(),
                size_x,
                size_y
            )));
        }
        if heights.iter().any(|h| !h.is_finite()) {
            return Err(PhysicsError::InvalidConfig(
                "heightmap contains non-finite samples".to_string(),
            ));
        }
        Ok(Terrain {
            size_x,
            size_y,
            heights,
            water_level,
        })
    }

    /// Water plane height
    pub fn water_level(&self) -> f64 {
        self.water_level
    }

    /// Move the water plane
    pub fn set_water_level(&mut self, level: f64) {
        self.water_level = level;
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        let x = x.min(self.size_x - 1);
        let y = y.min(self.size_y - 1);
        self.heights[y * self.size_x + x]
    }

    /// Ground height at world `(x, y)`
    pub fn height_at(&self, x: f64, y: f64) -> f64 {
        let max_x = (self.size_x - 1) as f64;
        let max_y = (self.size_y - 1) as f64;
        let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let h00 = self.sample(x0, y0);
        let h10 = self.sample(x0 + 1, y0);
        let h01 = self.sample(x0, y0 + 1);
        let h11 = self.sample(x0 + 1, y0 + 1);

        let low = h00 + (h10 - h00) * fx;
        let high = h01 + (h11 - h01) * fx;
        low + (high - low) * fy
    }
}

impl Default for Terrain {
    fn default() -> Self {
        Terrain::flat(0.0, 20.0)
    }
}
