//! Force settings
//!
//! Read from JSON (a standalone file or the `settings` block of a scene).
//! Missing fields fall back to defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::CollideError;
use crate::sim::{RectCollide, random};

/// Collision force configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollideSettings {
    /// Rectangle size for every node [width, height]
    pub size: [f64; 2],
    /// Push = overlap * strength
    pub strength: f64,
    /// Build-and-resolve passes per tick
    pub iterations: usize,
    /// Seed for the zero-delta jiggle (entropy when absent)
    pub seed: Option<u64>,

    // === Driver ===
    /// Fraction of velocity removed each tick
    pub velocity_decay: f64,
}

impl Default for CollideSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_NODE_SIZE,
            strength: DEFAULT_STRENGTH,
            iterations: DEFAULT_ITERATIONS,
            seed: None,
            velocity_decay: DEFAULT_VELOCITY_DECAY,
        }
    }
}

impl CollideSettings {
    pub fn from_json(json: &str) -> Result<Self, CollideError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CollideError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CollideError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Configured (not yet initialized) collision force
    pub fn build_force(&self) -> RectCollide {
        let mut force = RectCollide::new();
        force
            .set_size(self.size)
            .set_strength(self.strength)
            .set_iterations(self.iterations);
        if let Some(seed) = self.seed {
            force.set_random_source(random::seeded(seed));
        }
        force
    }
}
