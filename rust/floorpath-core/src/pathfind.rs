//! In-floor pathfinding: a structured-state Dijkstra search over a
//! floor's raster.
//!
//! Each search state is `(cell, preferred_change_count)`; whether the
//! cell itself lies in a non-preferred region is a fixed property of
//! the cell, not part of the state, but crossing the boundary between a
//! preferred and non-preferred region increments `preferred_change_count`.
//! A state is only relaxed while that count stays within the budget
//! implied by the endpoints: +1 for each endpoint that itself sits in a
//! non-preferred region. The search therefore prefers staying in
//! preferred regions, but tolerates a bounded number of crossings when
//! the endpoints require it, and reports no path at all rather than
//! silently exceeding that bound.

use std::collections::HashMap;

use tracing::trace;

use crate::geometry::{Path, Point};
use crate::queue::{Handle, PriorityQueue};
use crate::raster::{Raster, RasterPoint};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct StateKey {
    cell: RasterPoint,
    changes: u8,
}

/// Searches one floor's raster for walkable routes between two points.
pub struct InFloorFinder<'a> {
    raster: &'a Raster,
    distance_table: Vec<Vec<f64>>,
}

impl<'a> InFloorFinder<'a> {
    pub fn new(raster: &'a Raster, max_nearby_delta: i64) -> Self {
        let k = max_nearby_delta.max(0) as usize;
        let mut table = vec![vec![0.0; k + 1]; k + 1];
        for (i, row) in table.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = ((i * i + j * j) as f64).sqrt();
            }
        }
        Self { raster, distance_table: table }
    }

    fn step_distance(&self, a: RasterPoint, b: RasterPoint) -> f64 {
        let di = (a.x - b.x).unsigned_abs() as usize;
        let dj = (a.y - b.y).unsigned_abs() as usize;
        self.distance_table[di][dj]
    }

    /// Finds a walkable route from `a` to `b` on this floor, snapping
    /// both endpoints to the nearest open cell first. Returns `None` if
    /// either endpoint has no reachable open cell, or no route
    /// satisfies the preferred-region budget.
    pub fn connect(&self, a: Point, b: Point) -> Option<Path> {
        let start_open = self.raster.unobstruct(a)?;
        let end_open = self.raster.unobstruct(b)?;
        let start_cell = self.raster.point_to_cell(start_open);
        let end_cell = self.raster.point_to_cell(end_open);

        let max_changes = self.raster.is_non_preferred(start_cell) as u8 + self.raster.is_non_preferred(end_cell) as u8;

        let mut pq: PriorityQueue<StateKey> = PriorityQueue::new();
        let mut handles: HashMap<StateKey, Handle> = HashMap::new();
        let mut best: HashMap<StateKey, f64> = HashMap::new();
        let mut came_from: HashMap<StateKey, StateKey> = HashMap::new();

        let start_state = StateKey { cell: start_cell, changes: 0 };
        best.insert(start_state, 0.0);
        let handle = pq.push(start_state, 0.0);
        handles.insert(start_state, handle);

        let mut goal = None;
        let mut pops = 0u64;
        while let Some((state, dist)) = pq.pop() {
            handles.remove(&state);
            pops += 1;
            if state.cell == end_cell {
                goal = Some(state);
                break;
            }
            let cur_non_pref = self.raster.is_non_preferred(state.cell);
            self.raster.nearby_points(state.cell, |neighbor| {
                let neighbor_non_pref = self.raster.is_non_preferred(neighbor);
                let changes = state.changes + (neighbor_non_pref != cur_non_pref) as u8;
                if changes > max_changes {
                    return;
                }
                let new_dist = dist + self.step_distance(state.cell, neighbor);
                let next_state = StateKey { cell: neighbor, changes };
                match best.get(&next_state) {
                    Some(&d) if new_dist >= d => return,
                    _ => {}
                }
                best.insert(next_state, new_dist);
                came_from.insert(next_state, state);
                match handles.get(&next_state) {
                    Some(&existing) => pq.replace(existing, next_state, new_dist),
                    None => {
                        let h = pq.push(next_state, new_dist);
                        handles.insert(next_state, h);
                    }
                }
            });
        }

        trace!(pops, reached = goal.is_some(), "in-floor search settled");
        let goal = goal?;
        let cells = Self::reconstruct_cells(&came_from, goal);
        Some(self.build_path(a, b, cells))
    }

    /// Runs one Dijkstra search from `source` against every cell region
    /// this floor contains, then answers all of `targets` from the
    /// resulting distance field. Each target is allowed its
    /// own preferred-region budget, since that budget depends on
    /// whether the particular target sits in a non-preferred region.
    pub fn connect_batch(&self, source: Point, targets: &[Point]) -> Vec<Option<Path>> {
        let Some(start_open) = self.raster.unobstruct(source) else {
            return vec![None; targets.len()];
        };
        let start_cell = self.raster.point_to_cell(start_open);
        let start_non_pref = self.raster.is_non_preferred(start_cell) as u8;

        let mut pq: PriorityQueue<StateKey> = PriorityQueue::new();
        let mut handles: HashMap<StateKey, Handle> = HashMap::new();
        let mut best: HashMap<StateKey, f64> = HashMap::new();
        let mut came_from: HashMap<StateKey, StateKey> = HashMap::new();

        let start_state = StateKey { cell: start_cell, changes: 0 };
        best.insert(start_state, 0.0);
        let handle = pq.push(start_state, 0.0);
        handles.insert(start_state, handle);

        while let Some((state, dist)) = pq.pop() {
            handles.remove(&state);
            let cur_non_pref = self.raster.is_non_preferred(state.cell);
            self.raster.nearby_points(state.cell, |neighbor| {
                let neighbor_non_pref = self.raster.is_non_preferred(neighbor);
                let changes = state.changes + (neighbor_non_pref != cur_non_pref) as u8;
                if changes > 2 {
                    return;
                }
                let new_dist = dist + self.step_distance(state.cell, neighbor);
                let next_state = StateKey { cell: neighbor, changes };
                match best.get(&next_state) {
                    Some(&d) if new_dist >= d => return,
                    _ => {}
                }
                best.insert(next_state, new_dist);
                came_from.insert(next_state, state);
                match handles.get(&next_state) {
                    Some(&existing) => pq.replace(existing, next_state, new_dist),
                    None => {
                        let h = pq.push(next_state, new_dist);
                        handles.insert(next_state, h);
                    }
                }
            });
        }

        targets
            .iter()
            .map(|&target| {
                let open = self.raster.unobstruct(target)?;
                let target_cell = self.raster.point_to_cell(open);
                let budget = start_non_pref + self.raster.is_non_preferred(target_cell) as u8;
                let goal = (0..=budget)
                    .filter_map(|changes| {
                        let key = StateKey { cell: target_cell, changes };
                        best.get(&key).map(|&d| (key, d))
                    })
                    .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                    .map(|(key, _)| key)?;
                let cells = Self::reconstruct_cells(&came_from, goal);
                Some(self.build_path(source, target, cells))
            })
            .collect()
    }

    fn reconstruct_cells(came_from: &HashMap<StateKey, StateKey>, goal: StateKey) -> Vec<RasterPoint> {
        let mut cells = vec![goal.cell];
        let mut cur = goal;
        while let Some(&prev) = came_from.get(&cur) {
            cells.push(prev.cell);
            cur = prev;
        }
        cells.reverse();
        cells
    }

    fn build_path(&self, a: Point, b: Point, cells: Vec<RasterPoint>) -> Path {
        let mut points = Vec::with_capacity(cells.len() + 2);
        points.push(a);
        for cell in cells {
            points.push(self.raster.cell_to_point(cell));
        }
        points.push(b);
        Path::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::model::Floor;
    use crate::raster::Raster;

    fn open_floor() -> Floor {
        Floor {
            name: "Ground".into(),
            bounds: Polygon::new(vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ]),
            obstacles: vec![],
            non_preferred: vec![],
            zones: vec![],
            portals: vec![],
        }
    }

    #[test]
    fn connects_directly_across_open_floor() {
        let floor = open_floor();
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let finder = InFloorFinder::new(&raster, 4);
        let path = finder.connect(Point::new(5.0, 5.0), Point::new(95.0, 95.0)).unwrap();
        assert_eq!(path.first().unwrap(), Point::new(5.0, 5.0));
        assert_eq!(path.last().unwrap(), Point::new(95.0, 95.0));
    }

    #[test]
    fn routes_around_a_dividing_obstacle() {
        let mut floor = open_floor();
        floor.obstacles.push(Polygon::new(vec![
            Point::new(45.0, 0.0),
            Point::new(55.0, 0.0),
            Point::new(55.0, 80.0),
            Point::new(45.0, 80.0),
        ]));
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let finder = InFloorFinder::new(&raster, 4);
        let path = finder.connect(Point::new(10.0, 50.0), Point::new(90.0, 50.0)).unwrap();
        assert!(path.len() > 2, "expected a detour around the obstacle");
        assert!(path.length() > 80.0);
    }

    #[test]
    fn crossing_into_non_preferred_region_is_allowed_within_budget() {
        let mut floor = open_floor();
        floor.non_preferred.push(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]));
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let finder = InFloorFinder::new(&raster, 4);
        let path = finder.connect(Point::new(5.0, 5.0), Point::new(95.0, 95.0));
        assert!(path.is_some());
    }

    #[test]
    fn connect_batch_answers_every_reachable_target() {
        let floor = open_floor();
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let finder = InFloorFinder::new(&raster, 4);
        let targets = [Point::new(90.0, 10.0), Point::new(10.0, 90.0), Point::new(50.0, 50.0)];
        let results = finder.connect_batch(Point::new(5.0, 5.0), &targets);
        assert_eq!(results.len(), 3);
        for (path, target) in results.iter().zip(targets.iter()) {
            let path = path.as_ref().expect("every open target should be reachable");
            assert_eq!(path.last().unwrap(), *target);
        }
    }

    #[test]
    fn same_point_returns_trivial_path() {
        let floor = open_floor();
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let finder = InFloorFinder::new(&raster, 4);
        let path = finder.connect(Point::new(50.0, 50.0), Point::new(50.0, 50.0)).unwrap();
        assert!(path.length() < 1.0);
    }
}
