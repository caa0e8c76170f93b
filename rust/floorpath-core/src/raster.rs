//! Floor rasterization: turns a floor's polygons into a bit-grid cheap
//! enough to search cell-by-cell.
//!
//! The grid is sized to put `raster_size` cells along the floor's
//! longer axis and preserve its aspect ratio on the shorter one, then
//! every cell center is classified against the floor's obstacles and
//! non-preferred regions. Polygon marking is clipped to each polygon's
//! own bounding box so a small fixture doesn't cost a full-grid scan.

use bitvec::prelude::*;

use crate::error::RouteError;
use crate::geometry::{Container, Point, Polygon};
use crate::model::Floor;

/// A cell coordinate in raster space, signed so ring expansion around
/// the grid's edge can be checked uniformly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterPoint {
    pub x: i64,
    pub y: i64,
}

impl RasterPoint {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A floor rasterized into a grid of obstructed / non-preferred cells.
pub struct Raster {
    origin_x: f64,
    origin_y: f64,
    scale_x: f64,
    scale_y: f64,
    width: usize,
    height: usize,
    obstructed: BitVec,
    non_preferred: BitVec,
    max_nearby_delta: i64,
}

impl Raster {
    /// Builds a raster for `floor`, targeting `raster_size` cells on the
    /// long axis. `floor_index` is carried only for error reporting.
    pub fn build(floor_index: usize, floor: &Floor, raster_size: usize, max_nearby_delta: i64) -> Result<Self, RouteError> {
        let bounds = floor.bounds.bounds().ok_or(RouteError::DegenerateLayout { floor: floor_index })?;
        if bounds.width <= 0.0 || bounds.height <= 0.0 {
            return Err(RouteError::DegenerateLayout { floor: floor_index });
        }
        let raster_size = raster_size.max(1) as f64;
        let (width, height) = if bounds.width >= bounds.height {
            let h = (bounds.height * raster_size / bounds.width).ceil().max(1.0);
            (raster_size as usize, h as usize)
        } else {
            let w = (bounds.width * raster_size / bounds.height).ceil().max(1.0);
            (w as usize, raster_size as usize)
        };

        let scale_x = width as f64 / bounds.width;
        let scale_y = height as f64 / bounds.height;

        let mut raster = Raster {
            origin_x: bounds.x,
            origin_y: bounds.y,
            scale_x,
            scale_y,
            width,
            height,
            obstructed: bitvec![0; width * height],
            non_preferred: bitvec![0; width * height],
            max_nearby_delta,
        };

        raster.mark_outside_bounds(&floor.bounds);
        for obstacle in &floor.obstacles {
            raster.mark_polygon(obstacle, true);
        }
        for region in &floor.non_preferred {
            raster.mark_polygon(region, false);
        }

        Ok(raster)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Every cell whose center falls outside the floor's own bounds
    /// polygon is obstructed; this is what makes the walkable area
    /// follow an irregular (non-rectangular) floor outline.
    fn mark_outside_bounds(&mut self, bounds: &Polygon) {
        let container = Container::new(bounds);
        for y in 0..self.height {
            for x in 0..self.width {
                let p = self.cell_center(x, y);
                if !container.contains(p) {
                    let idx = self.index(x, y);
                    self.obstructed.set(idx, true);
                }
            }
        }
    }

    fn mark_polygon(&mut self, polygon: &Polygon, obstacle: bool) {
        let Some(bounds) = polygon.bounds() else { return };
        let container = Container::new(polygon);

        let (min_x, min_y) = self.point_to_raster_clamped(Point::new(bounds.x, bounds.y));
        let (max_x, max_y) =
            self.point_to_raster_clamped(Point::new(bounds.x + bounds.width, bounds.y + bounds.height));

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = self.cell_center(x, y);
                if container.contains(p) {
                    let idx = self.index(x, y);
                    if obstacle {
                        self.obstructed.set(idx, true);
                    } else {
                        self.non_preferred.set(idx, true);
                    }
                }
            }
        }
    }

    fn point_to_raster_clamped(&self, p: Point) -> (usize, usize) {
        let x = ((p.x - self.origin_x) * self.scale_x).round();
        let y = ((p.y - self.origin_y) * self.scale_y).round();
        let x = x.clamp(0.0, (self.width - 1) as f64) as usize;
        let y = y.clamp(0.0, (self.height - 1) as f64) as usize;
        (x, y)
    }

    pub fn cell_center(&self, x: usize, y: usize) -> Point {
        Point::new((x as f64 + 0.5) / self.scale_x + self.origin_x, (y as f64 + 0.5) / self.scale_y + self.origin_y)
    }

    pub fn point_to_cell(&self, p: Point) -> RasterPoint {
        let x = ((p.x - self.origin_x) * self.scale_x).round() as i64;
        let y = ((p.y - self.origin_y) * self.scale_y).round() as i64;
        RasterPoint::new(x, y)
    }

    pub fn cell_to_point(&self, cell: RasterPoint) -> Point {
        self.cell_center(cell.x.max(0) as usize, cell.y.max(0) as usize)
    }

    fn in_bounds(&self, cell: RasterPoint) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height
    }

    pub fn is_obstructed(&self, cell: RasterPoint) -> bool {
        if !self.in_bounds(cell) {
            return true;
        }
        self.obstructed[self.index(cell.x as usize, cell.y as usize)]
    }

    pub fn is_non_preferred(&self, cell: RasterPoint) -> bool {
        if !self.in_bounds(cell) {
            return false;
        }
        self.non_preferred[self.index(cell.x as usize, cell.y as usize)]
    }

    /// Walks outward from `cell` in expanding Chebyshev rings, invoking
    /// `visit` on every unobstructed cell found. Stops enlarging the
    /// search past the first ring that contains any obstructed cell,
    /// but always finishes emitting the rest of that ring first.
    pub fn nearby_points(&self, cell: RasterPoint, mut visit: impl FnMut(RasterPoint)) {
        let mut hit_obstacle = false;
        let mut delta = 1i64;
        while delta <= self.max_nearby_delta && !hit_obstacle {
            for i in -delta..=delta {
                for &j in &[-delta, delta] {
                    for (dx, dy) in [(i, j), (j, i)] {
                        let rp = RasterPoint::new(cell.x + dx, cell.y + dy);
                        if rp.x < 0 || rp.y < 0 || rp.x >= self.width as i64 || rp.y >= self.height as i64 {
                            continue;
                        }
                        if self.is_obstructed(rp) {
                            hit_obstacle = true;
                        } else {
                            visit(rp);
                        }
                    }
                }
            }
            delta += 1;
        }
    }

    /// Finds the nearest (4-connected, BFS-nearest) unobstructed cell to
    /// `p`, clamped into the grid first. Returns `None` only if every
    /// cell in the raster is obstructed.
    pub fn unobstruct(&self, p: Point) -> Option<Point> {
        let start = self.clamp_cell(self.point_to_cell(p));
        if !self.is_obstructed(start) {
            return Some(self.cell_to_point(start));
        }

        let mut visited = bitvec![0; self.width * self.height];
        let mut queue = std::collections::VecDeque::new();
        visited.set(self.index(start.x as usize, start.y as usize), true);
        queue.push_back(start);

        while let Some(cur) = queue.pop_front() {
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let next = RasterPoint::new(cur.x + dx, cur.y + dy);
                if !self.in_bounds(next) {
                    continue;
                }
                let idx = self.index(next.x as usize, next.y as usize);
                if visited[idx] {
                    continue;
                }
                visited.set(idx, true);
                if !self.is_obstructed(next) {
                    return Some(self.cell_to_point(next));
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn clamp_cell(&self, cell: RasterPoint) -> RasterPoint {
        RasterPoint::new(cell.x.clamp(0, self.width as i64 - 1), cell.y.clamp(0, self.height as i64 - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_floor() -> Floor {
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
    fn raster_preserves_aspect_ratio() {
        let mut floor = square_floor();
        floor.bounds = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(200.0, 0.0),
            Point::new(200.0, 100.0),
            Point::new(0.0, 100.0),
        ]);
        let raster = Raster::build(0, &floor, 600, 4).unwrap();
        assert_eq!(raster.width(), 600);
        assert_eq!(raster.height(), 300);
    }

    #[test]
    fn degenerate_bounds_is_an_error() {
        let mut floor = square_floor();
        floor.bounds = Polygon::new(vec![]);
        let err = Raster::build(3, &floor, 600, 4).unwrap_err();
        assert_eq!(err, RouteError::DegenerateLayout { floor: 3 });
    }

    #[test]
    fn obstacle_polygon_marks_its_cells_obstructed() {
        let mut floor = square_floor();
        floor.obstacles.push(Polygon::new(vec![
            Point::new(40.0, 40.0),
            Point::new(60.0, 40.0),
            Point::new(60.0, 60.0),
            Point::new(40.0, 60.0),
        ]));
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let center_cell = raster.point_to_cell(Point::new(50.0, 50.0));
        assert!(raster.is_obstructed(center_cell));
        let corner_cell = raster.point_to_cell(Point::new(5.0, 5.0));
        assert!(!raster.is_obstructed(corner_cell));
    }

    #[test]
    fn unobstruct_finds_nearest_open_cell_from_inside_an_obstacle() {
        let mut floor = square_floor();
        floor.obstacles.push(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 100.0),
            Point::new(0.0, 100.0),
        ]));
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let found = raster.unobstruct(Point::new(25.0, 50.0)).unwrap();
        assert!(found.x > 50.0, "expected escape past the obstacle, got {found:?}");
    }

    #[test]
    fn nearby_points_stops_enlarging_past_first_obstructed_ring() {
        let mut floor = square_floor();
        floor.obstacles.push(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 3.0),
            Point::new(0.0, 3.0),
        ]));
        let raster = Raster::build(0, &floor, 100, 4).unwrap();
        let mut visited = Vec::new();
        raster.nearby_points(RasterPoint::new(50, 50), |p| visited.push(p));
        assert!(!visited.is_empty());
    }
}
