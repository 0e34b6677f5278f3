use rstar::primitives::GeomWithData;
use rstar::RTree;

use route_planner_model::{Coordinate, Waypoint};

/// Spatial lookup over the points of one path snapshot. Build a new one whenever the path changes.
pub struct PathIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl PathIndex {
    pub fn new(path: &[Waypoint]) -> PathIndex {
        let pts = path
            .iter()
            .enumerate()
            .map(|(idx, waypt)| GeomWithData::new([waypt.x, waypt.y], idx))
            .collect();
        PathIndex {
            tree: RTree::bulk_load(pts),
        }
    }

    /// The index of the closest path point and the distance to it
    pub fn nearest(&self, pt: Coordinate) -> Option<(usize, f64)> {
        let query = [pt.x, pt.y];
        let found = self.tree.nearest_neighbor(&query)?;
        let [x, y] = *found.geom();
        Some((found.data, pt.dist_to(Coordinate::new(x, y))))
    }

    /// Is some path point within `distance` of `pt`?
    pub fn covers(&self, pt: Coordinate, distance: f64) -> bool {
        self.tree
            .locate_within_distance([pt.x, pt.y], distance * distance)
            .next()
            .is_some()
    }
}

/// A published path together with its index, so pointer events don't rebuild the tree
pub struct IndexedPath {
    pub path: Vec<Waypoint>,
    pub index: PathIndex,
}

impl IndexedPath {
    pub fn new(path: Vec<Waypoint>) -> IndexedPath {
        let index = PathIndex::new(&path);
        IndexedPath { path, index }
    }

    /// The path point closest to `pt`, if it's no further away than `distance`
    pub fn nearest_within(&self, pt: Coordinate, distance: f64) -> Option<&Waypoint> {
        let (idx, dist) = self.index.nearest(pt)?;
        if dist > distance {
            return None;
        }
        self.path.get(idx)
    }
}
