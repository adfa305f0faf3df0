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
//! Collision categories and masks
//!
//! A geometry's category says what it *is*; its mask says what it wants to
//! collide with. Neither is set directly: both are derived from the body's
//! state flags every time one of them changes. The priority, highest first:
//!
//! | state | category | mask when physical | mask when static |
//! |---|---|---|---|
//! | physical and disabled | none | none | n/a |
//! | selected | `SELECTED` | none | none |
//! | volume detect | `VOLUME_DETECT` | `GEOM \| CHARACTER` | none |
//! | phantom | `PHANTOM` | `LAND` | none |
//! | otherwise | `GEOM` | `GEOM \| CHARACTER \| LAND \| VOLUME_DETECT` | none |
//!
//! A body whose mesh failed to build is *no-collide*: no category, and a
//! mask of `LAND` while physical so it still rests on terrain.

use super::BodyFlags;

bitflags::bitflags! {
    /// Category and mask bits understood by the engine
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CollisionCategories: u32 {
        /// Prim geometry
        const GEOM = 0x0001;
        /// Rigid body
        const BODY = 0x0002;
        /// Collision space of a linkset
        const SPACE = 0x0004;
        /// Avatar
        const CHARACTER = 0x0008;
        /// Terrain
        const LAND = 0x0010;
        /// Water plane
        const WATER = 0x0020;
        /// Wind volume
        const WIND = 0x0040;
        /// Sensor volume
        const SENSOR = 0x0080;
        /// Selected in an editor
        const SELECTED = 0x0100;
        /// Volume detector
        const VOLUME_DETECT = 0x0200;
        /// Phantom
        const PHANTOM = 0x0400;
    }
}

/// Mask of an ordinary physical prim
pub const DEFAULT_PHYSICAL_MASK: CollisionCategories = CollisionCategories::GEOM
    .union(CollisionCategories::CHARACTER)
    .union(CollisionCategories::LAND)
    .union(CollisionCategories::VOLUME_DETECT);

/// Category and mask pair applied to one geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionBits {
    /// What the geometry is
    pub categories: CollisionCategories,
    /// What it collides with
    pub mask: CollisionCategories,
}

impl CollisionBits {
    /// Category and mask pair
    pub fn new(categories: CollisionCategories, mask: CollisionCategories) -> Self {
        CollisionBits { categories, mask }
    }

    /// Neither category nor mask
    pub fn none() -> Self {
        Self::default()
    }

    /// Bits for a geometry whose mesh failed to build
    pub fn no_collide(physical: bool) -> Self {
        CollisionBits {
            categories: CollisionCategories::empty(),
            mask: if physical {
                CollisionCategories::LAND
            } else {
                CollisionCategories::empty()
            },
        }
    }
}

/// Bits for a linkset root or a standalone prim
pub fn derive_bits(flags: &BodyFlags) -> CollisionBits {
    if flags.physical && flags.disabled {
        return CollisionBits::none();
    }
    if flags.selected {
        return CollisionBits::new(CollisionCategories::SELECTED, CollisionCategories::empty());
    }
    member_bits(flags, flags.physical).unwrap_or_else(|| {
        let mut mask = if flags.physical {
            DEFAULT_PHYSICAL_MASK
        } else {
            CollisionCategories::empty()
        };
        if flags.physical && flags.collides_water {
            mask |= CollisionCategories::WATER;
        }
        CollisionBits::new(CollisionCategories::GEOM, mask)
    })
}

/// Bits for a linkset child, given its root's flags and derived bits
///
/// A child keeps its own selected, volume-detect and phantom state and
/// otherwise takes the root's bits.
pub fn derive_child_bits(
    child: &BodyFlags,
    root: &BodyFlags,
    root_bits: CollisionBits,
) -> CollisionBits {
    if root.physical && root.disabled {
        return CollisionBits::none();
    }
    if child.selected {
        return CollisionBits::new(CollisionCategories::SELECTED, CollisionCategories::empty());
    }
    member_bits(child, root.physical).unwrap_or(root_bits)
}

/// Bits left on a geometry after its native body has been destroyed
pub fn static_bits(flags: &BodyFlags) -> CollisionBits {
    let categories = if flags.disabled {
        CollisionCategories::empty()
    } else if flags.selected {
        CollisionCategories::SELECTED
    } else if flags.volume_detect {
        CollisionCategories::VOLUME_DETECT
    } else if flags.phantom {
        CollisionCategories::PHANTOM
    } else {
        CollisionCategories::GEOM
    };
    CollisionBits::new(categories, CollisionCategories::empty())
}

fn member_bits(flags: &BodyFlags, physical: bool) -> Option<CollisionBits> {
    if flags.volume_detect {
        let mask = if physical {
            CollisionCategories::GEOM | CollisionCategories::CHARACTER
        } else {
            CollisionCategories::empty()
        };
        Some(CollisionBits::new(CollisionCategories::VOLUME_DETECT, mask))
    } else if flags.phantom {
        let mask = if physical {
            CollisionCategories::LAND
        } else {
            CollisionCategories::empty()
        };
        Some(CollisionBits::new(CollisionCategories::PHANTOM, mask))
    } else {
        None
    }
}
