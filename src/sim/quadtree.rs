//! Quad-tree spatial index
//!
//! Buckets balls geographically so the collision engine checks near-linear
//! candidate pairs instead of all O(n²) combinations. Nodes hold up to
//! `MAX_ITEMS_PER_NODE` items and split lazily into four quadrants; an item
//! descends into a child only if the child rectangle contains its whole
//! circle, so balls straddling a split boundary stay at the parent and are
//! never duplicated.
//!
//! Two safeguards keep cross-boundary collisions from being missed: a node
//! never subdivides below an extent of twice the largest ball diameter, and
//! `candidate_pairs` pairs every parent-level item against the items of its
//! entire subtree.

use glam::DVec2;

use super::ball::BallId;

/// Axis-aligned rectangle with origin at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether a point lies inside (edges inclusive)
    pub fn contains_point(&self, p: DVec2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Whether a whole circle lies inside
    pub fn contains_circle(&self, center: DVec2, radius: f64) -> bool {
        center.x - radius >= self.x
            && center.x + radius <= self.x + self.width
            && center.y - radius >= self.y
            && center.y + radius <= self.y + self.height
    }

    /// The four equal quadrants, in NW/NE/SW/SE order
    fn quadrants(&self) -> [Rect; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            Rect::new(self.x, self.y, hw, hh),
            Rect::new(self.x + hw, self.y, hw, hh),
            Rect::new(self.x, self.y + hh, hw, hh),
            Rect::new(self.x + hw, self.y + hh, hw, hh),
        ]
    }
}

/// Position snapshot stored in the tree
#[derive(Debug, Clone, Copy)]
pub struct TreeItem {
    pub id: BallId,
    pub center: DVec2,
    pub radius: f64,
}

/// One node of the quad-tree (the root doubles as the tree handle)
#[derive(Debug)]
pub struct QuadTree {
    bounds: Rect,
    capacity: usize,
    /// Nodes at or below this extent never subdivide
    min_extent: f64,
    items: Vec<TreeItem>,
    children: Option<Box<[QuadTree; 4]>>,
}

impl QuadTree {
    pub fn new(bounds: Rect, capacity: usize, min_extent: f64) -> Self {
        Self {
            bounds,
            capacity: capacity.max(1),
            min_extent,
            items: Vec::new(),
            children: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Total number of items in this subtree
    pub fn len(&self) -> usize {
        let mut n = self.items.len();
        if let Some(children) = &self.children {
            for child in children.iter() {
                n += child.len();
            }
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert an item at the smallest node whose bounds contain its circle,
    /// subdividing on overflow
    pub fn insert(&mut self, item: TreeItem) {
        if let Some(children) = &mut self.children {
            if let Some(index) = child_for(children, &item) {
                children[index].insert(item);
                return;
            }
        }

        self.items.push(item);

        if self.children.is_none() && self.items.len() > self.capacity && self.can_subdivide() {
            self.subdivide();
        }
    }

    /// Re-home an item whose position changed
    ///
    /// If the node currently holding the item still contains the moved
    /// circle the stored snapshot is updated in place; otherwise the item
    /// is removed and re-inserted from this node down.
    pub fn update(&mut self, item: TreeItem) {
        match self.refresh_in_place(&item) {
            RefreshOutcome::Updated => {}
            RefreshOutcome::Displaced => self.insert(item),
            RefreshOutcome::NotFound => self.insert(item),
        }
    }

    /// Remove an item by id; returns whether it was present
    pub fn remove(&mut self, id: BallId) -> bool {
        if let Some(index) = self.items.iter().position(|i| i.id == id) {
            self.items.swap_remove(index);
            return true;
        }
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.remove(id) {
                    return true;
                }
            }
        }
        false
    }

    /// All candidate collision pairs in this subtree
    ///
    /// Every pair of items sharing a node, plus every parent-level item
    /// paired against all items in its descendants. Any two circles that
    /// actually overlap are guaranteed to appear in at least one pair.
    pub fn candidate_pairs(&self) -> Vec<(BallId, BallId)> {
        let mut pairs = Vec::new();
        self.collect_pairs(&mut pairs);
        pairs
    }

    fn collect_pairs(&self, out: &mut Vec<(BallId, BallId)>) {
        for i in 0..self.items.len() {
            for j in (i + 1)..self.items.len() {
                out.push((self.items[i].id, self.items[j].id));
            }
        }
        if let Some(children) = &self.children {
            if !self.items.is_empty() {
                let mut below = Vec::new();
                for child in children.iter() {
                    child.collect_ids(&mut below);
                }
                for item in &self.items {
                    for id in &below {
                        out.push((item.id, *id));
                    }
                }
            }
            for child in children.iter() {
                child.collect_pairs(out);
            }
        }
    }

    fn collect_ids(&self, out: &mut Vec<BallId>) {
        out.extend(self.items.iter().map(|i| i.id));
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_ids(out);
            }
        }
    }

    fn can_subdivide(&self) -> bool {
        self.bounds.width / 2.0 >= self.min_extent && self.bounds.height / 2.0 >= self.min_extent
    }

    fn subdivide(&mut self) {
        let (capacity, min_extent) = (self.capacity, self.min_extent);
        let quads = self.bounds.quadrants();
        let make = |bounds| QuadTree::new(bounds, capacity, min_extent);
        let mut children = Box::new([make(quads[0]), make(quads[1]), make(quads[2]), make(quads[3])]);

        // Push down every item whose circle fits entirely in one quadrant;
        // straddlers stay here
        let mut kept = Vec::new();
        for item in self.items.drain(..) {
            match child_for(&children, &item) {
                Some(index) => children[index].insert(item),
                None => kept.push(item),
            }
        }
        self.items = kept;
        self.children = Some(children);
    }

    fn refresh_in_place(&mut self, item: &TreeItem) -> RefreshOutcome {
        if let Some(index) = self.items.iter().position(|i| i.id == item.id) {
            // Still valid at this node only if no child would claim it and
            // it remains inside these bounds
            let still_here = self.bounds.contains_circle(item.center, item.radius)
                && match &self.children {
                    Some(children) => child_for(children, item).is_none(),
                    None => true,
                };
            if still_here {
                self.items[index] = *item;
                return RefreshOutcome::Updated;
            }
            self.items.swap_remove(index);
            return RefreshOutcome::Displaced;
        }
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                match child.refresh_in_place(item) {
                    RefreshOutcome::NotFound => continue,
                    outcome => return outcome,
                }
            }
        }
        RefreshOutcome::NotFound
    }
}

enum RefreshOutcome {
    Updated,
    Displaced,
    NotFound,
}

fn child_for(children: &[QuadTree; 4], item: &TreeItem) -> Option<usize> {
    children
        .iter()
        .position(|c| c.bounds.contains_circle(item.center, item.radius))
}
