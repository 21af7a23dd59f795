//! Rect Collide - rectangle collision force for force-directed layouts
//!
//! Core modules:
//! - `sim`: Collision force, quadtree index, and a minimal tick driver
//! - `settings`: Serializable force configuration
//! - `scene`: JSON scenes for the command-line driver
//! - `error`: Errors raised at the initialization boundary

pub mod error;
pub mod scene;
pub mod settings;
pub mod sim;

pub use error::CollideError;
pub use scene::{Scene, SceneOutput};
pub use settings::CollideSettings;
pub use sim::{Footprint, Node, RectCollide, Simulation};

use sim::RandomSource;

/// Force configuration defaults
pub mod consts {
    /// Collision strength (push = overlap * strength)
    pub const DEFAULT_STRENGTH: f64 = 1.0;
    /// Build-and-resolve passes per tick
    pub const DEFAULT_ITERATIONS: usize = 1;
    /// Node size used by layout-level settings when none is given
    pub const DEFAULT_NODE_SIZE: [f64; 2] = [10.0, 10.0];
    /// Velocity decay applied by the tick driver (fraction removed per tick)
    pub const DEFAULT_VELOCITY_DECAY: f64 = 0.4;

    /// Magnitude of the zero-delta perturbation
    pub const JIGGLE_SCALE: f64 = 1e-6;

    /// Maximum quadtree subdivision depth. Entries that still share a cell
    /// at this depth are kept together in one leaf bucket.
    pub const MAX_DEPTH: usize = 48;
}

/// Small nonzero perturbation, symmetric about zero
///
/// Used to break exact coincidence of two centers on an axis so the
/// direction vector can always be normalized.
#[inline]
pub fn jiggle(random: &mut dyn RandomSource) -> f64 {
    let value = (random.next_unit() - 0.5) * consts::JIGGLE_SCALE;
    if value == 0.0 {
        // next_unit() returned exactly 0.5
        consts::JIGGLE_SCALE * 0.5
    } else {
        value
    }
}
