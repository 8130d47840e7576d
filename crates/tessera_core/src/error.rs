//! # Kernel Error Types
//!
//! All errors that can occur in the ECS kernel.
//!
//! Every error is either resource exhaustion or a programmer error. None of
//! them are transient, so nothing in the kernel retries.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the ECS kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// The entity pool is full.
    #[error("entity limit reached ({living} / {capacity})")]
    CapacityExhausted {
        /// Entities alive when the request was made.
        living: usize,
        /// Configured pool capacity.
        capacity: usize,
    },

    /// A destroy was requested while the live count was already zero.
    #[error("no entities to destroy (entity {entity} still carries a signature)")]
    DestroyUnderflow {
        /// Entity whose destruction was attempted.
        entity: Entity,
    },

    /// An entity identifier outside the pool was used for indexed access.
    #[error("entity {entity} is outside the pool (capacity {capacity})")]
    EntityOutOfRange {
        /// Offending identifier.
        entity: Entity,
        /// Configured pool capacity.
        capacity: usize,
    },

    /// An in-range identifier was used that the pool has not handed out.
    #[error("entity {entity} is not alive")]
    EntityNotAlive {
        /// Offending identifier.
        entity: Entity,
    },

    /// A component type was used before being registered.
    #[error("component type not registered: {name}")]
    ComponentNotRegistered {
        /// Rust type name of the component.
        name: &'static str,
    },

    /// No more component type identifiers are available.
    #[error("component type limit reached ({capacity}) while registering {name}")]
    ComponentLimitReached {
        /// Rust type name of the component.
        name: &'static str,
        /// Configured component capacity.
        capacity: usize,
    },

    /// The entity has no component of the requested type.
    #[error("entity {entity} has no {name} component")]
    ComponentNotFound {
        /// Entity that was queried.
        entity: Entity,
        /// Rust type name of the component.
        name: &'static str,
    },

    /// A system type was used before being registered.
    #[error("system not registered: {name}")]
    SystemNotRegistered {
        /// Rust type name of the system.
        name: &'static str,
    },

    /// Invalid kernel configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_actionable() {
        let err = KernelError::CapacityExhausted { living: 2, capacity: 2 };
        assert_eq!(err.to_string(), "entity limit reached (2 / 2)");

        let err = KernelError::ComponentNotFound {
            entity: Entity::from_raw(7),
            name: "Position",
        };
        assert_eq!(err.to_string(), "entity 7 has no Position component");

        let err = KernelError::EntityNotAlive {
            entity: Entity::from_raw(3),
        };
        assert_eq!(err.to_string(), "entity 3 is not alive");
    }
}
