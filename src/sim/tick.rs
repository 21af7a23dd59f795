//! Minimal tick driver
//!
//! Stands in for the outer layout engine: forces adjust velocities, then
//! velocities decay and are integrated into positions. There is no alpha
//! cooling; `alpha` stays at 1 and is only passed through to forces.

use super::state::Node;
use crate::consts::DEFAULT_VELOCITY_DECAY;
use crate::error::CollideError;

/// A velocity-adjusting force composed into a simulation
pub trait Force {
    /// Cache per-node state. Called whenever the node list changes.
    fn initialize(&mut self, nodes: &[Node]) -> Result<(), CollideError>;

    /// Mutate node velocities for one tick
    fn apply(&mut self, nodes: &mut [Node], alpha: f64);
}

/// Node list plus the forces acting on it
pub struct Simulation {
    nodes: Vec<Node>,
    forces: Vec<Box<dyn Force>>,
    /// Fraction of velocity removed each tick
    pub velocity_decay: f64,
    pub alpha: f64,
    ticks: u64,
}

impl Simulation {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            forces: Vec::new(),
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            alpha: 1.0,
            ticks: 0,
        }
    }

    pub fn with_velocity_decay(mut self, decay: f64) -> Self {
        self.velocity_decay = decay;
        self
    }

    /// Initialize a force against the current nodes and add it
    pub fn add_force(&mut self, mut force: Box<dyn Force>) -> Result<&mut Self, CollideError> {
        force.initialize(&self.nodes)?;
        self.forces.push(force);
        Ok(self)
    }

    /// Replace the node list, re-initializing every force
    ///
    /// All-or-nothing: if any force rejects the new list, forces already
    /// switched over are re-initialized against the current nodes and the
    /// simulation keeps running on them.
    pub fn set_nodes(&mut self, nodes: Vec<Node>) -> Result<(), CollideError> {
        for done in 0..self.forces.len() {
            if let Err(e) = self.forces[done].initialize(&nodes) {
                for force in &mut self.forces[..=done] {
                    force.initialize(&self.nodes)?;
                }
                log::warn!("Rejected new node list ({} nodes): {}", nodes.len(), e);
                return Err(e);
            }
        }
        self.nodes = nodes;
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance one tick
    pub fn tick(&mut self) {
        for force in &mut self.forces {
            force.apply(&mut self.nodes, self.alpha);
        }

        let keep = 1.0 - self.velocity_decay;
        for node in &mut self.nodes {
            node.vel *= keep;
            node.pos += node.vel;
        }
        self.ticks += 1;
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
        log::debug!("Simulation ran {} ticks ({} total)", ticks, self.ticks);
    }
}
