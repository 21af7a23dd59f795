//! Rectangle collision force
//!
//! The tricky part of the layout: pushing overlapping axis-aligned
//! rectangles apart every tick without testing all n² pairs.
//!
//! Each iteration snapshots the projected center of every node (position
//! plus pending velocity plus half footprint), builds a quadtree over those
//! centers, then queries it once per node. Only candidates with a higher
//! index than the querying node are tested, so every unordered pair is
//! resolved at most once per iteration.

use std::fmt;

use glam::DVec2;

use super::quadtree::QuadTree;
use super::random::{self, RandomSource};
use super::state::{Footprint, Node};
use super::tick::Force;
use crate::consts::{DEFAULT_ITERATIONS, DEFAULT_STRENGTH};
use crate::error::CollideError;
use crate::jiggle;

/// Per-node rectangle size, evaluated once per initialization
pub enum SizeFn {
    Constant(Footprint),
    /// Called with (node, index, all nodes)
    PerNode(Box<dyn Fn(&Node, usize, &[Node]) -> Footprint>),
}

impl SizeFn {
    pub fn per_node(f: impl Fn(&Node, usize, &[Node]) -> Footprint + 'static) -> Self {
        SizeFn::PerNode(Box::new(f))
    }

    pub fn footprint(&self, node: &Node, index: usize, nodes: &[Node]) -> Footprint {
        match self {
            SizeFn::Constant(footprint) => *footprint,
            SizeFn::PerNode(f) => f(node, index, nodes),
        }
    }
}

impl Default for SizeFn {
    fn default() -> Self {
        SizeFn::Constant(Footprint::ZERO)
    }
}

impl From<Footprint> for SizeFn {
    fn from(footprint: Footprint) -> Self {
        SizeFn::Constant(footprint)
    }
}

impl From<[f64; 2]> for SizeFn {
    fn from(size: [f64; 2]) -> Self {
        SizeFn::Constant(size.into())
    }
}

impl fmt::Debug for SizeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeFn::Constant(footprint) => f.debug_tuple("Constant").field(footprint).finish(),
            SizeFn::PerNode(_) => f.write_str("PerNode(..)"),
        }
    }
}

/// One side of a candidate pair
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub center: DVec2,
    pub footprint: Footprint,
    pub mass: f64,
}

/// Velocity changes for both members of an overlapping pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    pub first: DVec2,
    pub second: DVec2,
}

/// Counters from the most recent `apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub iterations: usize,
    /// Candidate pairs that reached the overlap test
    pub pair_tests: usize,
    /// Pairs that overlapped and received an impulse
    pub overlaps: usize,
    /// Quadtree cells skipped by the prune test
    pub pruned: usize,
}

/// Projected center: position + pending velocity + half footprint
#[inline]
pub fn projected_center(node: &Node, footprint: Footprint) -> DVec2 {
    node.pos + node.vel + footprint.half()
}

/// Overlap test and impulse for one pair
///
/// Returns `None` unless the rectangles overlap on both axes. A zero delta
/// component is replaced by a jiggle so the direction can be normalized.
/// The push is split by the other body's mass share, so the lighter body
/// moves more.
pub fn pair_impulse(
    a: &Body,
    b: &Body,
    strength: f64,
    random: &mut dyn RandomSource,
) -> Option<Impulse> {
    let mut delta = a.center - b.center;
    if delta.x == 0.0 {
        delta.x = jiggle(random);
    }
    if delta.y == 0.0 {
        delta.y = jiggle(random);
    }

    let reach = a.footprint.half() + b.footprint.half();
    let depth = delta.abs() - reach;
    if !(depth.x < 0.0 && depth.y < 0.0) {
        return None;
    }

    let overlap = depth.length();
    let direction = delta / delta.length();

    let total = a.mass + b.mass;
    // Degenerate rectangles (zero area on both sides) split evenly
    let (ratio_a, ratio_b) = if total > 0.0 {
        (a.mass / total, b.mass / total)
    } else {
        (0.5, 0.5)
    };

    let push = direction * overlap * strength;
    Some(Impulse {
        first: push * ratio_b,
        second: -push * ratio_a,
    })
}

/// Collision force for axis-aligned rectangles
pub struct RectCollide {
    size: SizeFn,
    strength: f64,
    iterations: usize,
    random: Box<dyn RandomSource>,
    footprints: Vec<Footprint>,
    masses: Vec<f64>,
    initialized: bool,
    report: ResolveReport,
}

impl fmt::Debug for RectCollide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RectCollide")
            .field("size", &self.size)
            .field("strength", &self.strength)
            .field("iterations", &self.iterations)
            .field("nodes", &self.footprints.len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Default for RectCollide {
    fn default() -> Self {
        Self::new()
    }
}

impl RectCollide {
    pub fn new() -> Self {
        Self {
            size: SizeFn::default(),
            strength: DEFAULT_STRENGTH,
            iterations: DEFAULT_ITERATIONS,
            random: Box::new(random::from_entropy()),
            footprints: Vec::new(),
            masses: Vec::new(),
            initialized: false,
            report: ResolveReport::default(),
        }
    }

    pub fn size(&self) -> &SizeFn {
        &self.size
    }

    /// Takes effect on the next `initialize`
    pub fn set_size(&mut self, size: impl Into<SizeFn>) -> &mut Self {
        self.size = size.into();
        self
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn set_strength(&mut self, strength: f64) -> &mut Self {
        self.strength = strength;
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn set_iterations(&mut self, iterations: usize) -> &mut Self {
        self.iterations = iterations;
        self
    }

    pub fn set_random_source(&mut self, random: impl RandomSource + 'static) -> &mut Self {
        self.random = Box::new(random);
        self
    }

    /// Footprints cached by the last successful `initialize`
    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn last_report(&self) -> ResolveReport {
        self.report
    }

    /// Derive and cache footprints and masses for a node list
    ///
    /// Must be called again whenever the node list changes. On error the
    /// previously cached state is kept.
    pub fn initialize(&mut self, nodes: &[Node]) -> Result<(), CollideError> {
        let mut footprints = Vec::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if node.index != position {
                return Err(CollideError::IndexMismatch {
                    position,
                    index: node.index,
                });
            }
            let footprint = self.size.footprint(node, position, nodes);
            if !footprint.is_valid() {
                return Err(CollideError::InvalidFootprint {
                    index: position,
                    width: footprint.width,
                    height: footprint.height,
                });
            }
            footprints.push(footprint);
        }

        self.masses = footprints.iter().map(Footprint::mass).collect();
        self.footprints = footprints;
        self.initialized = true;
        log::debug!("Collide force initialized with {} nodes", nodes.len());
        Ok(())
    }

    /// Run all iterations for one tick, mutating velocities in place
    pub fn apply(&mut self, nodes: &mut [Node]) {
        self.report = ResolveReport::default();

        if !self.initialized {
            log::warn!("Collide force applied before initialize - skipping");
            return;
        }
        if nodes.len() != self.footprints.len() {
            log::warn!(
                "Collide force initialized for {} nodes but got {} - skipping",
                self.footprints.len(),
                nodes.len()
            );
            return;
        }

        for _ in 0..self.iterations {
            self.iterate(nodes);
            self.report.iterations += 1;
        }

        log::debug!(
            "Collide: {} iterations, {} pair tests, {} overlaps, {} cells pruned",
            self.report.iterations,
            self.report.pair_tests,
            self.report.overlaps,
            self.report.pruned
        );
    }

    fn iterate(&mut self, nodes: &mut [Node]) {
        let centers: Vec<DVec2> = nodes
            .iter()
            .zip(&self.footprints)
            .map(|(node, &footprint)| projected_center(node, footprint))
            .collect();
        let tree = QuadTree::build(&centers, &self.footprints);

        let footprints = &self.footprints;
        let masses = &self.masses;
        let strength = self.strength;
        let random = &mut *self.random;
        let report = &mut self.report;

        for i in 0..nodes.len() {
            let querying = Body {
                center: centers[i],
                footprint: footprints[i],
                mass: masses[i],
            };

            let pruned = tree.query(querying.center, querying.footprint, |entry| {
                let j = entry.index;
                if j <= i {
                    return;
                }
                report.pair_tests += 1;

                let candidate = Body {
                    center: entry.center,
                    footprint: footprints[j],
                    mass: masses[j],
                };
                if let Some(impulse) = pair_impulse(&querying, &candidate, strength, &mut *random)
                {
                    nodes[i].vel += impulse.first;
                    nodes[j].vel += impulse.second;
                    report.overlaps += 1;
                }
            });
            report.pruned += pruned;
        }
    }
}

impl Force for RectCollide {
    fn initialize(&mut self, nodes: &[Node]) -> Result<(), CollideError> {
        RectCollide::initialize(self, nodes)
    }

    /// Strength is not scaled by alpha
    fn apply(&mut self, nodes: &mut [Node], _alpha: f64) {
        RectCollide::apply(self, nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::random::FnSource;
    use crate::sim::state::nodes_from_positions;
    use proptest::prelude::*;

    /// Jiggle becomes a fixed value regardless of call order
    fn fixed_random() -> FnSource<impl FnMut() -> f64> {
        FnSource(|| 0.75)
    }

    fn force(size: [f64; 2], strength: f64) -> RectCollide {
        let mut force = RectCollide::new();
        force
            .set_size(size)
            .set_strength(strength)
            .set_random_source(fixed_random());
        force
    }

    fn body(center: DVec2, width: f64, height: f64) -> Body {
        let footprint = Footprint::new(width, height);
        Body {
            center,
            footprint,
            mass: footprint.mass(),
        }
    }

    /// Same pair rule applied to every pair, no index
    fn resolve_exhaustive(nodes: &mut [Node], footprints: &[Footprint], strength: f64) {
        let centers: Vec<DVec2> = nodes
            .iter()
            .zip(footprints)
            .map(|(n, &f)| projected_center(n, f))
            .collect();
        let mut random = fixed_random();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                let a = body(centers[i], footprints[i].width, footprints[i].height);
                let b = body(centers[j], footprints[j].width, footprints[j].height);
                if let Some(impulse) = pair_impulse(&a, &b, strength, &mut random) {
                    nodes[i].vel += impulse.first;
                    nodes[j].vel += impulse.second;
                }
            }
        }
    }

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).abs().max_element() <= 1e-9 * (1.0 + a.abs().max_element())
    }

    #[test]
    fn test_unit_squares_pushed_apart_on_x() {
        let mut nodes = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(0.5, 0.0)]);
        let mut force = force([1.0, 1.0], 1.0);
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);

        let expected = (0.5f64.powi(2) + 1.0).sqrt() / 2.0;
        assert!((nodes[0].vel.x + expected).abs() < 1e-5);
        assert!((nodes[1].vel.x - expected).abs() < 1e-5);
        assert!(nodes[0].vel.y.abs() < 1e-5);
        assert!(nodes[1].vel.y.abs() < 1e-5);
        assert_eq!(force.last_report().overlaps, 1);
    }

    #[test]
    fn test_distant_squares_pruned() {
        let mut nodes = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(5.0, 5.0)]);
        let mut force = force([1.0, 1.0], 1.0);
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);

        assert_eq!(nodes[0].vel, DVec2::ZERO);
        assert_eq!(nodes[1].vel, DVec2::ZERO);
        let report = force.last_report();
        assert_eq!(report.pair_tests, 0);
        assert!(report.pruned > 0);
    }

    #[test]
    fn test_touching_edges_do_not_collide() {
        let mut nodes = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.5)]);
        let mut force = force([1.0, 1.0], 1.0);
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);
        assert_eq!(nodes[0].vel, DVec2::ZERO);
        assert_eq!(nodes[1].vel, DVec2::ZERO);
    }

    #[test]
    fn test_single_axis_overlap_is_not_collision() {
        // Overlapping in x, separated in y
        let a = body(DVec2::new(0.0, 0.0), 4.0, 1.0);
        let b = body(DVec2::new(1.0, 3.0), 4.0, 1.0);
        assert!(pair_impulse(&a, &b, 1.0, &mut fixed_random()).is_none());
    }

    #[test]
    fn test_coincident_centers_get_opposite_push() {
        let mut nodes = nodes_from_positions(&[DVec2::new(2.0, 2.0), DVec2::new(2.0, 2.0)]);
        let mut force = RectCollide::new();
        force.set_size([3.0, 3.0]).set_random_source(random::seeded(7));
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);

        let (a, b) = (nodes[0].vel, nodes[1].vel);
        assert!(a.is_finite() && b.is_finite());
        assert!(a.length() > 0.0);
        assert!(close(a, -b));
    }

    #[test]
    fn test_impulse_symmetry() {
        let a = body(DVec2::new(0.0, 0.0), 4.0, 2.0);
        let b = body(DVec2::new(1.0, 0.5), 2.0, 2.0);
        let impulse = pair_impulse(&a, &b, 1.0, &mut fixed_random()).unwrap();

        let total = a.mass + b.mass;
        let (r1, r2) = (a.mass / total, b.mass / total);
        assert!(close(impulse.first * r1, -impulse.second * r2));
    }

    #[test]
    fn test_heavier_partner_pushes_harder() {
        let a = body(DVec2::new(0.0, 0.0), 2.0, 2.0);
        let light = Body {
            mass: 4.0,
            ..body(DVec2::new(0.5, 0.25), 2.0, 2.0)
        };
        let heavy = Body { mass: 8.0, ..light };

        let before = pair_impulse(&a, &light, 1.0, &mut fixed_random()).unwrap();
        let after = pair_impulse(&a, &heavy, 1.0, &mut fixed_random()).unwrap();
        assert!(after.first.length() > before.first.length());
        assert!(after.second.length() < before.second.length());
    }

    #[test]
    fn test_zero_area_pair_splits_evenly() {
        let a = body(DVec2::new(0.0, 0.0), 0.0, 4.0);
        let b = body(DVec2::new(0.5, 0.5), 4.0, 0.0);
        let impulse = pair_impulse(&a, &b, 1.0, &mut fixed_random()).unwrap();
        assert!(impulse.first.is_finite());
        assert!(close(impulse.first, -impulse.second));
    }

    #[test]
    fn test_each_pair_tested_once_per_call() {
        let positions = [
            DVec2::new(0.0, 0.0),
            DVec2::new(0.1, 0.2),
            DVec2::new(0.3, 0.1),
            DVec2::new(0.2, 0.3),
        ];
        let mut nodes = nodes_from_positions(&positions);
        let mut force = force([10.0, 10.0], 1.0);
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);

        let report = force.last_report();
        assert_eq!(report.pair_tests, 6);
        assert_eq!(report.overlaps, 6);
    }

    #[test]
    fn test_second_apply_pushes_again() {
        let mut nodes = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(0.5, 0.0)]);
        let mut force = force([4.0, 4.0], 0.1);
        force.initialize(&nodes).unwrap();

        force.apply(&mut nodes);
        let first = nodes[1].vel.x;
        force.apply(&mut nodes);
        let second = nodes[1].vel.x;

        assert!(first > 0.0);
        assert!(second > first);
    }

    #[test]
    fn test_more_iterations_separate_further() {
        let start = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(0.5, 0.0)]);

        let mut once = start.clone();
        let mut force_once = force([4.0, 4.0], 0.1);
        force_once.initialize(&once).unwrap();
        force_once.apply(&mut once);

        let mut thrice = start;
        let mut force_thrice = force([4.0, 4.0], 0.1);
        force_thrice.set_iterations(3);
        force_thrice.initialize(&thrice).unwrap();
        force_thrice.apply(&mut thrice);

        assert_eq!(force_thrice.last_report().iterations, 3);
        assert!(thrice[1].vel.x > once[1].vel.x);
    }

    #[test]
    fn test_position_and_footprint_untouched() {
        let mut nodes = nodes_from_positions(&[DVec2::new(0.0, 0.0), DVec2::new(0.5, 0.5)]);
        let mut force = force([2.0, 2.0], 1.0);
        force.initialize(&nodes).unwrap();
        force.apply(&mut nodes);
        assert_eq!(nodes[0].pos, DVec2::new(0.0, 0.0));
        assert_eq!(nodes[1].pos, DVec2::new(0.5, 0.5));
        assert_eq!(force.footprints(), &[Footprint::new(2.0, 2.0); 2]);
        assert_eq!(force.masses(), &[4.0, 4.0]);
    }

    #[test]
    fn test_per_node_size_and_mass() {
        let nodes = nodes_from_positions(&[DVec2::ZERO, DVec2::ONE, DVec2::splat(2.0)]);
        let mut force = RectCollide::new();
        force.set_size(SizeFn::per_node(|_, i, all| {
            Footprint::new(i as f64 + 1.0, all.len() as f64)
        }));
        force.initialize(&nodes).unwrap();
        assert_eq!(force.footprints()[2], Footprint::new(3.0, 3.0));
        assert_eq!(force.masses(), &[3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_initialize_rejects_negative_size() {
        let nodes = nodes_from_positions(&[DVec2::ZERO, DVec2::ONE]);
        let mut force = RectCollide::new();
        force.set_size(SizeFn::per_node(|_, i, _| {
            if i == 1 {
                Footprint::new(-1.0, 2.0)
            } else {
                Footprint::new(1.0, 1.0)
            }
        }));
        let err = force.initialize(&nodes).unwrap_err();
        assert!(matches!(err, CollideError::InvalidFootprint { index: 1, .. }));
        assert!(force.footprints().is_empty());
    }

    #[test]
    fn test_initialize_rejects_non_finite_size() {
        let nodes = nodes_from_positions(&[DVec2::ZERO]);
        let mut force = RectCollide::new();
        force.set_size([f64::INFINITY, 1.0]);
        let err = force.initialize(&nodes).unwrap_err();
        assert!(matches!(err, CollideError::InvalidFootprint { index: 0, .. }));
    }

    #[test]
    fn test_initialize_rejects_index_mismatch() {
        let mut nodes = nodes_from_positions(&[DVec2::ZERO, DVec2::ONE]);
        nodes[1].index = 5;
        let err = RectCollide::new().initialize(&nodes).unwrap_err();
        assert!(matches!(err, CollideError::IndexMismatch { position: 1, index: 5 }));
    }

    #[test]
    fn test_stale_node_list_is_skipped() {
        let nodes = nodes_from_positions(&[DVec2::ZERO, DVec2::splat(0.1)]);
        let mut force = force([1.0, 1.0], 1.0);
        force.initialize(&nodes).unwrap();

        let mut grown = nodes_from_positions(&[DVec2::ZERO, DVec2::splat(0.1), DVec2::splat(0.2)]);
        force.apply(&mut grown);
        assert!(grown.iter().all(|n| n.vel == DVec2::ZERO));
        assert_eq!(force.last_report(), ResolveReport::default());
    }

    #[test]
    fn test_apply_before_initialize_is_noop() {
        let mut nodes = nodes_from_positions(&[DVec2::ZERO, DVec2::ZERO]);
        let mut force = force([1.0, 1.0], 1.0);
        force.apply(&mut nodes);
        assert!(nodes.iter().all(|n| n.vel == DVec2::ZERO));
    }

    #[test]
    fn test_accessors_chain() {
        let mut force = RectCollide::new();
        force.set_strength(0.5).set_iterations(4).set_size([2.0, 3.0]);
        assert_eq!(force.strength(), 0.5);
        assert_eq!(force.iterations(), 4);
        assert!(matches!(force.size(), SizeFn::Constant(f) if *f == Footprint::new(2.0, 3.0)));
    }

    fn scene() -> impl Strategy<Value = Vec<(f64, f64, f64, f64, f64, f64)>> {
        // Coordinates on a coarse grid so coincident axes occur often
        let coord = (-40i32..40).prop_map(|v| v as f64 * 0.5);
        let vel = (-4i32..4).prop_map(|v| v as f64 * 0.25);
        let dim = (0u32..16).prop_map(|v| v as f64);
        prop::collection::vec((coord.clone(), coord, vel.clone(), vel, dim.clone(), dim), 0..40)
    }

    fn build(scene: &[(f64, f64, f64, f64, f64, f64)]) -> (Vec<Node>, Vec<Footprint>) {
        let nodes = scene
            .iter()
            .enumerate()
            .map(|(i, &(x, y, vx, vy, _, _))| {
                Node::new(i, DVec2::new(x, y)).with_velocity(DVec2::new(vx, vy))
            })
            .collect();
        let footprints = scene.iter().map(|&(.., w, h)| Footprint::new(w, h)).collect();
        (nodes, footprints)
    }

    proptest! {
        #[test]
        fn prop_pruning_matches_exhaustive(scene in scene(), strength in 0.1f64..2.0) {
            let (nodes, footprints) = build(&scene);
            let sizes = footprints.clone();

            let mut indexed = nodes.clone();
            let mut force = force([0.0, 0.0], strength);
            force.set_size(SizeFn::per_node(move |_, i, _| sizes[i]));
            force.initialize(&indexed).unwrap();
            force.apply(&mut indexed);

            let mut exhaustive = nodes;
            resolve_exhaustive(&mut exhaustive, &footprints, strength);

            for (a, b) in indexed.iter().zip(&exhaustive) {
                prop_assert!(close(a.vel, b.vel), "{:?} vs {:?}", a.vel, b.vel);
            }
        }

        #[test]
        fn prop_disjoint_rectangles_untouched(
            gap in 0.01f64..5.0,
            w in 0.5f64..10.0,
            h in 0.5f64..10.0,
            dy in -20.0f64..20.0,
        ) {
            // Second rectangle starts at or beyond the first one's right edge
            let mut nodes = vec![
                Node::new(0, DVec2::ZERO),
                Node::new(1, DVec2::new(w + gap, dy)),
            ];
            let mut force = force([w, h], 1.0);
            force.initialize(&nodes).unwrap();
            force.apply(&mut nodes);
            prop_assert_eq!(nodes[0].vel, DVec2::ZERO);
            prop_assert_eq!(nodes[1].vel, DVec2::ZERO);
        }

        #[test]
        fn prop_impulse_symmetric(
            dx in -3.0f64..3.0,
            dy in -3.0f64..3.0,
            w1 in 0.5f64..4.0,
            h1 in 0.5f64..4.0,
            w2 in 0.5f64..4.0,
            h2 in 0.5f64..4.0,
        ) {
            let a = body(DVec2::ZERO, w1, h1);
            let b = body(DVec2::new(dx, dy), w2, h2);
            if let Some(impulse) = pair_impulse(&a, &b, 1.0, &mut fixed_random()) {
                let total = a.mass + b.mass;
                let (r1, r2) = (a.mass / total, b.mass / total);
                prop_assert!(close(impulse.first * r1, -impulse.second * r2));
            }
        }
    }
}
