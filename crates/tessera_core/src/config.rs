//! # Kernel Configuration
//!
//! Capacities are fixed for the lifetime of a [`Coordinator`](crate::Coordinator).
//! The defaults match the compile-time constants below; a TOML file can
//! override them once at startup.
//!
//! ```toml
//! entity_capacity = 10000
//! component_capacity = 32
//! default_tick_rate = 60.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::Signature;
use crate::error::{KernelError, KernelResult};

/// Default maximum number of simultaneously live entities.
pub const MAX_ENTITIES: usize = 5000;

/// Maximum number of distinct component types (the signature width).
pub const MAX_COMPONENTS: usize = Signature::BITS;

/// Default pacing rate for systems, in ticks per second.
pub const DEFAULT_TICK_RATE: f32 = 30.0;

/// Configuration for the kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Number of entity slots in the pool.
    pub entity_capacity: usize,
    /// Number of component types that may be registered (at most 64).
    pub component_capacity: usize,
    /// Ticks per second every newly registered system is paced at.
    pub default_tick_rate: f32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            entity_capacity: MAX_ENTITIES,
            component_capacity: MAX_COMPONENTS,
            default_tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl KernelConfig {
    /// Configuration with a custom entity capacity and defaults elsewhere.
    #[must_use]
    pub fn with_entity_capacity(entity_capacity: usize) -> Self {
        Self {
            entity_capacity,
            ..Self::default()
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// Missing keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] if the document does not parse
    /// or describes out-of-range capacities.
    pub fn from_toml_str(source: &str) -> KernelResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| KernelError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] if the file cannot be read or
    /// its contents are invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> KernelResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            KernelError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks every capacity bound.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidConfig`] describing the first violated bound.
    pub fn validate(&self) -> KernelResult<()> {
        if self.entity_capacity == 0 {
            return Err(KernelError::InvalidConfig(
                "entity_capacity must be greater than zero".into(),
            ));
        }
        if u32::try_from(self.entity_capacity).is_err() {
            return Err(KernelError::InvalidConfig(format!(
                "entity_capacity {} exceeds u32::MAX",
                self.entity_capacity
            )));
        }
        if self.component_capacity == 0 || self.component_capacity > MAX_COMPONENTS {
            return Err(KernelError::InvalidConfig(format!(
                "component_capacity must be within 1..={MAX_COMPONENTS}, got {}",
                self.component_capacity
            )));
        }
        if !self.default_tick_rate.is_finite() || self.default_tick_rate <= 0.0 {
            return Err(KernelError::InvalidConfig(format!(
                "default_tick_rate must be a positive number, got {}",
                self.default_tick_rate
            )));
        }
        Ok(())
    }
}
