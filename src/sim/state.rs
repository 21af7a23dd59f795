//! Node and footprint types shared by the force and the tick driver
//!
//! Nodes are owned by the outer simulation. The collision force only reads
//! position/velocity and writes velocity.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A layout node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable index, equal to the node's position in the list
    pub index: usize,
    pub pos: DVec2,
    pub vel: DVec2,
}

impl Node {
    pub fn new(index: usize, pos: DVec2) -> Self {
        Self {
            index,
            pos,
            vel: DVec2::ZERO,
        }
    }

    pub fn with_velocity(mut self, vel: DVec2) -> Self {
        self.vel = vel;
        self
    }
}

/// Axis-aligned rectangle size assigned to a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Footprint {
    pub width: f64,
    pub height: f64,
}

impl Footprint {
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Half extents as a vector
    #[inline]
    pub fn half(&self) -> DVec2 {
        DVec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Relative weight of a node when splitting an impulse
    #[inline]
    pub fn mass(&self) -> f64 {
        self.width * self.height
    }

    /// Component-wise maximum (used to aggregate subtree bounds)
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }

    /// Non-negative and finite in both axes
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width >= 0.0 && self.height >= 0.0
    }
}

impl From<[f64; 2]> for Footprint {
    fn from([width, height]: [f64; 2]) -> Self {
        Self { width, height }
    }
}

/// Node record as it appears in a JSON scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInput {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub vx: f64,
    #[serde(default)]
    pub vy: f64,
    /// Overrides the scene-wide width; a missing axis keeps the scene value
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl NodeInput {
    pub fn to_node(&self, index: usize) -> Node {
        Node::new(index, DVec2::new(self.x, self.y)).with_velocity(DVec2::new(self.vx, self.vy))
    }

    /// Whether either axis overrides the scene-wide size
    pub fn has_size(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }

    /// Footprint with per-axis overrides applied over `fallback`
    pub fn footprint(&self, fallback: Footprint) -> Footprint {
        Footprint::new(
            self.width.unwrap_or(fallback.width),
            self.height.unwrap_or(fallback.height),
        )
    }
}

/// Build a node list with stable indices from positions
pub fn nodes_from_positions(positions: &[DVec2]) -> Vec<Node> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &p)| Node::new(i, p))
        .collect()
}
