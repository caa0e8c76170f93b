//! Multi-floor routing: connects two `FloorPoint`s that may live on
//! different floors by threading portal transits together with
//! in-floor walks.
//!
//! The search runs Dijkstra over a graph whose nodes are the source
//! point, the destination point, and every portal on every floor.
//! Portal-to-portal edges along a portal's own `destinations` carry a
//! fixed penalty rather than a measured distance, biasing the search
//! away from unnecessary floor changes without needing real-world
//! travel times for elevators and escalators. A "virtual final edge"
//! connects any node already on the destination floor straight to the
//! destination, so the search doesn't need a dedicated goal test beyond
//! normal Dijkstra termination.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use tracing::debug;

use crate::batch::{cache_key, CacheKey};
use crate::config::RouteConfig;
use crate::error::RouteError;
use crate::geometry::{Path, Point};
use crate::model::{Floor, FloorPath, FloorPoint, Layout};
use crate::pathfind::InFloorFinder;
use crate::queue::{Handle, PriorityQueue};
use crate::raster::Raster;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Node {
    Source,
    Destination,
    Portal(usize, usize),
}

/// Precomputes per-floor rasters and intra-floor portal distances once,
/// then answers many `connect` queries against them.
pub struct FloorConnector<'a> {
    layout: &'a Layout,
    rasters: Vec<Raster>,
    portal_penalty: f64,
    max_nearby_delta: i64,
    intra_floor_portal_dist: HashMap<(usize, usize, usize), f64>,
    /// One in-floor path cache per floor, keyed by the pair
    /// of raster cells a query snaps to so repeated `neighbors()` calls
    /// across the N² distance oracle reuse each floor's search work
    /// instead of re-running Dijkstra for every pair.
    caches: Vec<Mutex<LruCache<CacheKey, Option<Path>>>>,
}

impl<'a> FloorConnector<'a> {
    pub fn new(layout: &'a Layout, config: RouteConfig) -> Result<Self, RouteError> {
        let mut rasters = Vec::with_capacity(layout.floors.len());
        for (i, floor) in layout.floors.iter().enumerate() {
            rasters.push(Raster::build(i, floor, config.raster_size, config.max_nearby_delta)?);
        }

        let portal_penalty = Self::portal_penalty(layout, config.portal_penalty_multiplier);

        let mut intra_floor_portal_dist = HashMap::new();
        for (fi, floor) in layout.floors.iter().enumerate() {
            let finder = InFloorFinder::new(&rasters[fi], config.max_nearby_delta);
            for i in 0..floor.portals.len() {
                for j in (i + 1)..floor.portals.len() {
                    if let Some(path) = finder.connect(floor.portals[i].location, floor.portals[j].location) {
                        let d = path.length();
                        intra_floor_portal_dist.insert((fi, i, j), d);
                        intra_floor_portal_dist.insert((fi, j, i), d);
                    }
                }
            }
        }

        let capacity = NonZeroUsize::new(config.cache_capacity.max(1)).unwrap();
        let caches = (0..rasters.len()).map(|_| Mutex::new(LruCache::new(capacity))).collect();

        Ok(Self {
            layout,
            rasters,
            portal_penalty,
            max_nearby_delta: config.max_nearby_delta,
            intra_floor_portal_dist,
            caches,
        })
    }

    /// 100x (by default) the largest single floor
    /// dimension across the whole layout, so a portal transit always
    /// costs more than walking across even the biggest floor.
    fn portal_penalty(layout: &Layout, multiplier: f64) -> f64 {
        let mut max_dim = 0.0f64;
        for floor in &layout.floors {
            if let Some(b) = floor.bounds.bounds() {
                max_dim = max_dim.max(b.width).max(b.height);
            }
        }
        multiplier * max_dim
    }

    fn finder(&self, floor: usize) -> InFloorFinder<'_> {
        InFloorFinder::new(&self.rasters[floor], self.max_nearby_delta)
    }

    /// Connects `a` to `b` on `floor`, consulting and populating that
    /// floor's cache first. Mirrors `batch::CachedFinder`'s at-most-once
    /// invariant: the search runs with no lock held, then the result is
    /// re-checked under the lock before inserting so two callers racing
    /// on the same cell pair both see the same answer.
    fn connect_cached(&self, floor: usize, a: Point, b: Point) -> Option<Path> {
        let raster = &self.rasters[floor];
        let key = cache_key(raster, a, b)?;
        let cache = &self.caches[floor];
        if let Some(cached) = cache.lock().unwrap().get(&key) {
            debug!(floor, "in-floor cache hit");
            return cached.clone();
        }
        debug!(floor, "in-floor cache miss");

        let result = self.finder(floor).connect(a, b);

        let mut guard = cache.lock().unwrap();
        if let Some(existing) = guard.get(&key) {
            return existing.clone();
        }
        guard.put(key, result.clone());
        result
    }

    /// Answers many targets from one `source` on `floor`, per spec §4.5's
    /// "upgrade to a batch" rule: every target already in the floor's
    /// cache is served without a search; the rest -- the "pending
    /// destinations sharing the source" -- are settled together by one
    /// multi-target `InFloorFinder::connect_batch` run instead of one
    /// single-pair search per target. Mirrors `connect_cached`'s
    /// at-most-once invariant: the batch search runs with no lock held,
    /// then each result is re-checked under the lock before inserting.
    fn connect_batch_cached(&self, floor: usize, source: Point, targets: &[Point]) -> Vec<Option<Path>> {
        let raster = &self.rasters[floor];
        let cache = &self.caches[floor];
        let keys: Vec<Option<CacheKey>> = targets.iter().map(|&t| cache_key(raster, source, t)).collect();

        let mut results: Vec<Option<Path>> = vec![None; targets.len()];
        let mut pending_indices = Vec::new();
        let mut pending_points = Vec::new();
        {
            let mut guard = cache.lock().unwrap();
            for (i, key) in keys.iter().enumerate() {
                match key {
                    Some(k) => match guard.get(k) {
                        Some(cached) => results[i] = cached.clone(),
                        None => {
                            pending_indices.push(i);
                            pending_points.push(targets[i]);
                        }
                    },
                    None => {}
                }
            }
        }

        if pending_points.is_empty() {
            debug!(floor, targets = targets.len(), "in-floor batch fully served from cache");
            return results;
        }
        debug!(floor, pending = pending_points.len(), total = targets.len(), "in-floor batch cache miss; running one multi-target search");

        let batch_results = self.finder(floor).connect_batch(source, &pending_points);

        let mut guard = cache.lock().unwrap();
        for (slot, path) in pending_indices.into_iter().zip(batch_results) {
            let key = keys[slot].expect("pending index always has a resolvable cache key");
            let path = match guard.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    guard.put(key, path.clone());
                    path
                }
            };
            results[slot] = path;
        }
        results
    }

    fn floor(&self, node: Node, start: FloorPoint, end: FloorPoint) -> usize {
        match node {
            Node::Source => start.floor,
            Node::Destination => end.floor,
            Node::Portal(f, _) => f,
        }
    }

    fn point(&self, node: Node, start: FloorPoint, end: FloorPoint) -> Point {
        match node {
            Node::Source => start.point,
            Node::Destination => end.point,
            Node::Portal(f, i) => self.layout.floors[f].portals[i].location,
        }
    }

    fn floor_at(&self, index: usize) -> &Floor {
        &self.layout.floors[index]
    }

    /// The portal id a `Node::Portal` refers to, or `None` for the
    /// source/destination endpoints.
    fn portal_id(&self, node: Node) -> Option<u64> {
        match node {
            Node::Portal(f, i) => Some(self.layout.floors[f].portals[i].id),
            _ => None,
        }
    }

    fn neighbors(&self, node: Node, start: FloorPoint, end: FloorPoint) -> Vec<(Node, f64)> {
        let mut out = Vec::new();
        match node {
            Node::Source => {
                let floor = self.floor_at(start.floor);
                let same_floor_destination = start.floor == end.floor;
                let mut targets: Vec<Point> = floor.portals.iter().map(|p| p.location).collect();
                if same_floor_destination {
                    targets.push(end.point);
                }
                // One source, many targets on this floor: settle them all
                // with a single multi-target search rather than one
                // single-pair search per portal.
                let results = self.connect_batch_cached(start.floor, start.point, &targets);
                for (i, path) in results.iter().take(floor.portals.len()).enumerate() {
                    if let Some(path) = path {
                        out.push((Node::Portal(start.floor, i), path.length()));
                    }
                }
                if same_floor_destination {
                    if let Some(path) = &results[floor.portals.len()] {
                        out.push((Node::Destination, path.length()));
                    }
                }
            }
            Node::Portal(f, i) => {
                let floor = self.floor_at(f);
                for j in 0..floor.portals.len() {
                    if j == i {
                        continue;
                    }
                    if let Some(&dist) = self.intra_floor_portal_dist.get(&(f, i, j)) {
                        out.push((Node::Portal(f, j), dist));
                    }
                }
                for &dest_id in &floor.portals[i].destinations {
                    // Portals reference each other only by raw id;
                    // resolve lazily through the layout rather than storing
                    // a pre-resolved index.
                    if let Some((dest_floor, dest_idx)) = self.layout.portal_location(dest_id) {
                        out.push((Node::Portal(dest_floor, dest_idx), self.portal_penalty));
                    }
                }
                if f == end.floor {
                    if let Some(path) = self.connect_cached(f, floor.portals[i].location, end.point) {
                        out.push((Node::Destination, path.length()));
                    }
                }
            }
            Node::Destination => {}
        }
        out
    }

    /// Finds a route from `start` to `end`, possibly across several
    /// floors. Returns the in-floor walks only; portal transits between
    /// consecutive segments carry no path data of their own.
    pub fn connect(&self, start: FloorPoint, end: FloorPoint) -> Result<Vec<FloorPath>, RouteError> {
        self.connect_with_hops(start, end).map(|(segments, _)| segments)
    }

    fn connect_with_hops(&self, start: FloorPoint, end: FloorPoint) -> Result<(Vec<FloorPath>, usize), RouteError> {
        debug!(from_floor = start.floor, to_floor = end.floor, "multi-floor search starting");
        let mut pq: PriorityQueue<Node> = PriorityQueue::new();
        let mut handles: HashMap<Node, Handle> = HashMap::new();
        let mut best: HashMap<Node, f64> = HashMap::new();
        let mut came_from: HashMap<Node, Node> = HashMap::new();

        best.insert(Node::Source, 0.0);
        let handle = pq.push(Node::Source, 0.0);
        handles.insert(Node::Source, handle);

        let mut reached = false;
        let mut expansions = 0u64;
        while let Some((node, dist)) = pq.pop() {
            handles.remove(&node);
            if node == Node::Destination {
                reached = true;
                break;
            }
            expansions += 1;
            for (next, weight) in self.neighbors(node, start, end) {
                let new_dist = dist + weight;
                match best.get(&next) {
                    Some(&d) if new_dist >= d => continue,
                    _ => {}
                }
                best.insert(next, new_dist);
                came_from.insert(next, node);
                match handles.get(&next) {
                    Some(&existing) => pq.replace(existing, next, new_dist),
                    None => {
                        let h = pq.push(next, new_dist);
                        handles.insert(next, h);
                    }
                }
            }
        }

        if !reached {
            debug!(expansions, "multi-floor search exhausted frontier without reaching the destination");
            return Err(RouteError::UnreachableAcrossFloors { from: start.floor, to: end.floor });
        }
        debug!(expansions, "multi-floor search reached destination");

        let mut nodes = vec![Node::Destination];
        let mut cur = Node::Destination;
        while let Some(&prev) = came_from.get(&cur) {
            nodes.push(prev);
            cur = prev;
        }
        nodes.reverse();

        let mut segments = Vec::new();
        let mut i = 0;
        while i + 1 < nodes.len() {
            let (a, b) = (nodes[i], nodes[i + 1]);
            let floor_a = self.floor(a, start, end);
            let floor_b = self.floor(b, start, end);
            if floor_a != floor_b {
                // A portal teleport: no path data of its own, just a jump
                // to the next step's starting floor.
                i += 1;
                continue;
            }
            let path = self
                .connect_cached(floor_a, self.point(a, start, end), self.point(b, start, end))
                .ok_or(RouteError::NoInFloorPath { floor: floor_a })?;

            // If the edge immediately after this one leaves the floor,
            // this step ends at a portal use; record which portal pair.
            let (source_portal, dest_portal) = match nodes.get(i + 2) {
                Some(&c) if self.floor(c, start, end) != floor_b => (self.portal_id(b), self.portal_id(c)),
                _ => (None, None),
            };
            segments.push(FloorPath { floor: floor_a, path, source_portal, dest_portal });
            i += 1;
        }

        let step_count = segments.len();
        Ok((segments, step_count))
    }

    /// Builds an all-pairs distance matrix over `points` for use as a
    /// TSP cost oracle. Deliberately double-counts the portal penalty:
    /// it is folded into each edge weight during the Dijkstra search
    /// *and* added again here, multiplied by the number of `FloorPathStep`s
    /// (i.e. `segments.len()`, not the raw internal graph-node hop count)
    /// in the winning path. Squaring away that double-count would change
    /// which floor orderings the TSP solver considers cheapest, so it is
    /// kept rather than "fixed" (see DESIGN.md).
    pub fn distance_oracle(&self, points: &[FloorPoint]) -> Vec<Vec<f64>> {
        let n = points.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                matrix[i][j] = match self.connect_with_hops(points[i], points[j]) {
                    Ok((segments, step_count)) => {
                        let sum_len: f64 = segments.iter().map(|s| s.path.length()).sum();
                        step_count as f64 * self.portal_penalty + sum_len
                    }
                    Err(_) => f64::INFINITY,
                };
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::model::{Portal, PortalType, Zone};

    fn square_bounds() -> Polygon {
        Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
    }

    fn two_floor_layout() -> Layout {
        let up = Portal { id: 1, location: Point::new(50.0, 50.0), portal_type: PortalType::Elevator, destinations: vec![2] };
        let down = Portal { id: 2, location: Point::new(50.0, 50.0), portal_type: PortalType::Elevator, destinations: vec![1] };
        Layout {
            floors: vec![
                Floor {
                    name: "Ground".into(),
                    bounds: square_bounds(),
                    obstacles: vec![],
                    non_preferred: vec![],
                    zones: vec![Zone { name: "Entrance".into(), location: Point::new(5.0, 5.0), entrance: true, ..Default::default() }],
                    portals: vec![up],
                },
                Floor {
                    name: "Upper".into(),
                    bounds: square_bounds(),
                    obstacles: vec![],
                    non_preferred: vec![],
                    zones: vec![Zone { name: "Shoes".into(), location: Point::new(90.0, 90.0), ..Default::default() }],
                    portals: vec![down],
                },
            ],
        }
    }

    #[test]
    fn connects_across_a_single_portal() {
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let start = FloorPoint { floor: 0, point: Point::new(5.0, 5.0) };
        let end = FloorPoint { floor: 1, point: Point::new(90.0, 90.0) };
        let segments = connector.connect(start, end).unwrap();
        assert_eq!(segments.first().unwrap().floor, 0);
        assert_eq!(segments.last().unwrap().floor, 1);
    }

    #[test]
    fn portal_ids_are_recorded_on_the_step_that_uses_them() {
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let start = FloorPoint { floor: 0, point: Point::new(5.0, 5.0) };
        let end = FloorPoint { floor: 1, point: Point::new(90.0, 90.0) };
        let segments = connector.connect(start, end).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].source_portal, Some(1));
        assert_eq!(segments[0].dest_portal, Some(2));
        assert_eq!(segments[1].source_portal, None);
        assert_eq!(segments[1].dest_portal, None);
    }

    #[test]
    fn same_floor_uses_the_virtual_final_edge_directly() {
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let start = FloorPoint { floor: 0, point: Point::new(5.0, 5.0) };
        let end = FloorPoint { floor: 0, point: Point::new(95.0, 95.0) };
        let segments = connector.connect(start, end).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].floor, 0);
    }

    #[test]
    fn unreachable_floor_without_portals_is_an_error() {
        let mut layout = two_floor_layout();
        layout.floors.push(Floor {
            name: "Isolated".into(),
            bounds: square_bounds(),
            obstacles: vec![],
            non_preferred: vec![],
            zones: vec![],
            portals: vec![],
        });
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let start = FloorPoint { floor: 0, point: Point::new(5.0, 5.0) };
        let end = FloorPoint { floor: 2, point: Point::new(50.0, 50.0) };
        let err = connector.connect(start, end).unwrap_err();
        assert_eq!(err, RouteError::UnreachableAcrossFloors { from: 0, to: 2 });
    }

    #[test]
    fn distance_oracle_is_symmetric_zero_diagonal() {
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let points = vec![
            FloorPoint { floor: 0, point: Point::new(5.0, 5.0) },
            FloorPoint { floor: 1, point: Point::new(90.0, 90.0) },
        ];
        let matrix = connector.distance_oracle(&points);
        assert_eq!(matrix[0][0], 0.0);
        assert_eq!(matrix[1][1], 0.0);
        assert!(matrix[0][1].is_finite());
    }

    #[test]
    fn oracle_multiplies_the_penalty_by_floor_path_steps_not_raw_graph_hops() {
        // Source -> Portal(0,0) -> Portal(1,0) -> Destination is 3 internal
        // graph edges but only 2 FloorPathSteps (one walk per floor); the
        // oracle's double-count must scale with the latter.
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let start = FloorPoint { floor: 0, point: Point::new(5.0, 5.0) };
        let end = FloorPoint { floor: 1, point: Point::new(90.0, 90.0) };

        let (segments, step_count) = connector.connect_with_hops(start, end).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(step_count, 2);

        let matrix = connector.distance_oracle(&[start, end]);
        let sum_len: f64 = segments.iter().map(|s| s.path.length()).sum();
        let expected = 2.0 * connector.portal_penalty + sum_len;
        assert!((matrix[0][1] - expected).abs() < 1e-9, "got {}, expected {expected}", matrix[0][1]);
    }

    #[test]
    fn repeated_in_floor_queries_reuse_the_per_floor_cache() {
        let layout = two_floor_layout();
        let connector = FloorConnector::new(&layout, RouteConfig::default()).unwrap();
        let a = Point::new(5.0, 5.0);
        let b = Point::new(95.0, 95.0);

        let first = connector.connect_cached(0, a, b);
        let second = connector.connect_cached(0, a, b);
        assert!(first.is_some());
        assert_eq!(first, second);

        let cached = connector.caches[0].lock().unwrap().len();
        assert_eq!(cached, 1);
    }
}
