//! JSON scenes for the command-line driver
//!
//! A scene is a settings block plus a list of nodes. Nodes may carry their
//! own width/height; otherwise the settings size applies.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CollideError;
use crate::settings::CollideSettings;
use crate::sim::{Footprint, Node, NodeInput, SizeFn, Simulation};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub settings: CollideSettings,
    pub nodes: Vec<NodeInput>,
}

/// A node after simulation, as written by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutput {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneOutput {
    pub ticks: u64,
    /// Pairs of rectangles still overlapping at their current positions
    pub overlapping_pairs: usize,
    pub nodes: Vec<NodeOutput>,
}

impl Scene {
    pub fn from_json(json: &str) -> Result<Self, CollideError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CollideError> {
        let path = path.as_ref();
        let scene = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("Loaded scene with {} nodes from {}", scene.nodes.len(), path.display());
        Ok(scene)
    }

    /// Per-node footprints, honoring per-node overrides
    pub fn footprints(&self) -> Vec<Footprint> {
        let fallback = Footprint::from(self.settings.size);
        self.nodes
            .iter()
            .map(|n| n.footprint(fallback))
            .collect()
    }

    /// Simulation with the collision force already initialized
    pub fn to_simulation(&self) -> Result<Simulation, CollideError> {
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| n.to_node(i))
            .collect();

        let mut force = self.settings.build_force();
        if self.nodes.iter().any(NodeInput::has_size) {
            let footprints = self.footprints();
            force.set_size(SizeFn::per_node(move |_, i, _| footprints[i]));
        }

        let mut sim = Simulation::new(nodes).with_velocity_decay(self.settings.velocity_decay);
        sim.add_force(Box::new(force))?;
        Ok(sim)
    }
}

/// Count rectangle pairs overlapping at their current positions
///
/// Exhaustive; meant for reporting, not for the per-tick path.
pub fn overlapping_pairs(nodes: &[Node], footprints: &[Footprint]) -> usize {
    let mut count = 0;
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let ci = nodes[i].pos + footprints[i].half();
            let cj = nodes[j].pos + footprints[j].half();
            let reach = footprints[i].half() + footprints[j].half();
            let gap = (ci - cj).abs() - reach;
            if gap.x < 0.0 && gap.y < 0.0 {
                count += 1;
            }
        }
    }
    count
}

impl SceneOutput {
    pub fn new(sim: &Simulation, footprints: &[Footprint]) -> Self {
        let nodes = sim
            .nodes()
            .iter()
            .zip(footprints)
            .map(|(n, f)| NodeOutput {
                index: n.index,
                x: n.pos.x,
                y: n.pos.y,
                vx: n.vel.x,
                vy: n.vel.y,
                width: f.width,
                height: f.height,
            })
            .collect();
        Self {
            ticks: sim.ticks(),
            overlapping_pairs: overlapping_pairs(sim.nodes(), footprints),
            nodes,
        }
    }
}
