//! Collision force and its supporting simulation types
//!
//! This module must stay deterministic given a seeded random source:
//! - Stable iteration order (by node index)
//! - Injected randomness only
//! - Spatial index rebuilt every iteration, never cached

pub mod collide;
pub mod quadtree;
pub mod random;
pub mod state;
pub mod tick;

pub use collide::{
    Body, Impulse, RectCollide, ResolveReport, SizeFn, pair_impulse, projected_center,
};
pub use quadtree::{Entry, Extent, Partition, QuadTree};
pub use random::{FnSource, RandomSource};
pub use state::{Footprint, Node, NodeInput, nodes_from_positions};
pub use tick::{Force, Simulation};
