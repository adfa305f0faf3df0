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
//! Error types for the physics bridge
//!
//! Errors only surface at the public boundary: producer-side setters that
//! reject bad input, scene construction, and constraint creation. Once a
//! change has been accepted into the queue, failures while applying it are
//! logged and degrade a single body instead of aborting the tick.

use crate::id::BodyId;
use thiserror::Error;

/// Result alias used throughout the crate
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Errors raised by the physics bridge
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// A caller-supplied vector, quaternion or scalar was NaN or infinite
    #[error("non-finite {what} for {body}")]
    NonFinite {
        /// Which argument was rejected
        what: &'static str,
        /// Target body
        body: BodyId,
    },

    /// The referenced body is not known to the scene
    #[error("unknown body {0}")]
    UnknownBody(BodyId),

    /// The native engine returned a null handle
    #[error("native engine failed to allocate {what} for {body}")]
    EngineAllocation {
        /// Kind of native object that could not be created
        what: &'static str,
        /// Body the allocation was for
        body: BodyId,
    },

    /// The mesher produced no usable mesh
    #[error("mesh generation failed for {body}: {reason}")]
    MeshGeneration {
        /// Body whose shape failed to tessellate
        body: BodyId,
        /// Mesher supplied reason
        reason: String,
    },

    /// The engine capability reports an API version this crate cannot drive
    #[error("engine API version {engine} is incompatible with required {required}")]
    IncompatibleEngine {
        /// Version reported by the engine
        engine: String,
        /// Version this crate was built against
        required: String,
    },

    /// A configuration value is out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A constraint was requested between bodies that have no native body
    #[error("cannot constrain {a} and {b}: both need a native body")]
    ConstraintBodiesMissing {
        /// First body of the pair
        a: BodyId,
        /// Second body of the pair
        b: BodyId,
    },

    /// The change queue's consumer side has been dropped
    #[error("change queue disconnected")]
    QueueDisconnected,
}

impl PhysicsError {
    /// True for errors caused by caller input rather than engine state
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PhysicsError::NonFinite { .. } | PhysicsError::InvalidConfig(_)
        )
    }
}
