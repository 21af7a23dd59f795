//! Quadtree over projected node centers
//!
//! Rebuilt from scratch on every iteration. After insertion, one post-order
//! pass stores on every partition node the component-wise maximum footprint
//! of the rectangles below it. Queries use that bound to skip whole cells
//! that cannot reach the query rectangle.

use glam::DVec2;

use super::state::Footprint;
use crate::consts::MAX_DEPTH;

/// Axis-aligned square cell in center space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: DVec2,
    pub max: DVec2,
}

impl Extent {
    pub fn new(min: DVec2, max: DVec2) -> Self {
        Self { min, max }
    }

    /// Smallest square covering all points (side 1 when they coincide)
    pub fn from_points(points: &[DVec2]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        let side = (max - min).max_element();
        let side = if side > 0.0 { side } else { 1.0 };
        Some(Self::new(min, min + DVec2::splat(side)))
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// Quadrant of a point: bit 0 = right half, bit 1 = lower half
    #[inline]
    pub fn quadrant_index(&self, p: DVec2) -> usize {
        let mid = self.center();
        ((p.y >= mid.y) as usize) << 1 | (p.x >= mid.x) as usize
    }

    pub fn quadrant(&self, index: usize) -> Self {
        let mid = self.center();
        let (x0, x1) = if index & 1 == 0 {
            (self.min.x, mid.x)
        } else {
            (mid.x, self.max.x)
        };
        let (y0, y1) = if index & 2 == 0 {
            (self.min.y, mid.y)
        } else {
            (mid.y, self.max.y)
        };
        Self::new(DVec2::new(x0, y0), DVec2::new(x1, y1))
    }

    /// True when the cell lies entirely outside the box of half-extent
    /// `reach` around `center`. Touching edges do not count as outside.
    #[inline]
    pub fn is_beyond(&self, center: DVec2, reach: DVec2) -> bool {
        self.min.x > center.x + reach.x
            || self.min.y > center.y + reach.y
            || self.max.x < center.x - reach.x
            || self.max.y < center.y - reach.y
    }
}

/// A node reference stored in a leaf
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    /// Index into the node list
    pub index: usize,
    /// Projected center at build time
    pub center: DVec2,
}

/// Quadtree node
#[derive(Debug, Default)]
pub enum Partition {
    #[default]
    Empty,
    /// Entries sharing one cell: either exactly coincident centers or
    /// anything that reached `MAX_DEPTH`
    Leaf {
        entries: Vec<Entry>,
        footprint: Footprint,
    },
    Internal {
        children: Box<[Partition; 4]>,
        footprint: Footprint,
    },
}

impl Partition {
    fn leaf(entry: Entry) -> Self {
        Partition::Leaf {
            entries: vec![entry],
            footprint: Footprint::ZERO,
        }
    }

    fn internal() -> Self {
        Partition::Internal {
            children: Box::default(),
            footprint: Footprint::ZERO,
        }
    }

    /// Aggregated footprint (None for empty cells)
    pub fn footprint(&self) -> Option<Footprint> {
        match self {
            Partition::Empty => None,
            Partition::Leaf { footprint, .. } | Partition::Internal { footprint, .. } => {
                Some(*footprint)
            }
        }
    }

    fn insert(&mut self, extent: &Extent, entry: Entry, depth: usize) {
        match self {
            Partition::Empty => *self = Partition::leaf(entry),
            Partition::Leaf { entries, .. } => {
                if depth >= MAX_DEPTH || entries[0].center == entry.center {
                    entries.push(entry);
                    return;
                }
                let existing = std::mem::take(entries);
                *self = Partition::internal();
                for e in existing {
                    self.insert(extent, e, depth);
                }
                self.insert(extent, entry, depth);
            }
            Partition::Internal { children, .. } => {
                let q = extent.quadrant_index(entry.center);
                children[q].insert(&extent.quadrant(q), entry, depth + 1);
            }
        }
    }

    /// Post-order: children are finished before the parent reads them
    fn aggregate(&mut self, footprints: &[Footprint]) -> Footprint {
        match self {
            Partition::Empty => Footprint::ZERO,
            Partition::Leaf { entries, footprint } => {
                *footprint = entries
                    .iter()
                    .map(|e| footprints[e.index])
                    .fold(Footprint::ZERO, Footprint::max);
                *footprint
            }
            Partition::Internal { children, footprint } => {
                let mut agg = Footprint::ZERO;
                for child in children.iter_mut() {
                    agg = agg.max(child.aggregate(footprints));
                }
                *footprint = agg;
                agg
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Partition::Empty | Partition::Leaf { .. } => 0,
            Partition::Internal { children, .. } => {
                1 + children.iter().map(Partition::depth).max().unwrap_or(0)
            }
        }
    }
}

/// Collision-aware spatial index for one resolution pass
#[derive(Debug)]
pub struct QuadTree {
    pub root: Partition,
    pub extent: Extent,
    len: usize,
}

impl QuadTree {
    /// Build from projected centers and per-node footprints (same length,
    /// indexed by node index)
    pub fn build(centers: &[DVec2], footprints: &[Footprint]) -> Self {
        debug_assert_eq!(centers.len(), footprints.len());

        let Some(extent) = Extent::from_points(centers) else {
            return Self {
                root: Partition::Empty,
                extent: Extent::new(DVec2::ZERO, DVec2::ZERO),
                len: 0,
            };
        };

        let mut root = Partition::Empty;
        for (index, &center) in centers.iter().enumerate() {
            root.insert(&extent, Entry { index, center }, 0);
        }
        root.aggregate(footprints);

        Self {
            root,
            extent,
            len: centers.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Visit every entry whose cell survives the prune test for a query
    /// rectangle of size `footprint` centered at `center`.
    ///
    /// A cell is skipped when it lies outside the query center expanded by
    /// half the sum of the query footprint and the cell's aggregated
    /// footprint. Returns the number of cells pruned.
    pub fn query(
        &self,
        center: DVec2,
        footprint: Footprint,
        mut on_entry: impl FnMut(&Entry),
    ) -> usize {
        let mut pruned = 0;
        let mut stack: Vec<(&Partition, Extent)> = vec![(&self.root, self.extent)];

        while let Some((node, extent)) = stack.pop() {
            let Some(aggregate) = node.footprint() else {
                continue;
            };
            let reach = (footprint.half() + aggregate.half()).max(DVec2::ZERO);
            if extent.is_beyond(center, reach) {
                pruned += 1;
                continue;
            }
            match node {
                Partition::Empty => {}
                Partition::Leaf { entries, .. } => entries.iter().for_each(&mut on_entry),
                Partition::Internal { children, .. } => {
                    // Reverse so quadrant 0 is visited first
                    for (q, child) in children.iter().enumerate().rev() {
                        if !matches!(child, Partition::Empty) {
                            stack.push((child, extent.quadrant(q)));
                        }
                    }
                }
            }
        }

        pruned
    }
}
