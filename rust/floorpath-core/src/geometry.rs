//! Geometry primitives: points, paths, polygons, and point-in-polygon
//! containment via cached ray intersection.
//!
//! The containment test fires a ray from the query point in a fixed
//! direction chosen once per process (or supplied for deterministic
//! tests) and counts crossings with the polygon's edges; each edge's
//! intersection test reduces to inverting a 2x2 matrix built once per
//! edge, so `Container` amortizes the inversion over many queries.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A 2-dimensional location in floor-local coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(a: Point, b: Point) -> Point {
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }
}

/// A finite ordered sequence of points; the endpoints of a `Path` are its
/// first and last elements.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Path(pub Vec<Point>);

impl Path {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    pub fn first(&self) -> Option<Point> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.0.last().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A closed region described by tracing point[i] -> point[i+1] and the
/// last point back to the first. A duplicated closing point is stripped
/// by `dedup`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon(pub Vec<Point>);

/// Axis-aligned bounding box: `(x, y, width, height)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn is_empty(&self) -> bool {
        self.dedup_points().is_empty()
    }

    /// Strips a duplicated closing point (`points[0] == points[last]`).
    fn dedup_points(&self) -> &[Point] {
        if self.0.len() >= 2 && self.0[0] == *self.0.last().unwrap() {
            &self.0[..self.0.len() - 1]
        } else {
            &self.0[..]
        }
    }

    /// Gets the point at `idx`, wrapping around for negative or
    /// out-of-range indices.
    pub fn point_at(&self, idx: isize) -> Point {
        let pts = self.dedup_points();
        let n = pts.len() as isize;
        let mut i = idx % n;
        if i < 0 {
            i += n;
        }
        pts[i as usize]
    }

    /// Axis-aligned bounds, or `None` for an empty (invalid) polygon.
    pub fn bounds(&self) -> Option<Bounds> {
        let pts = self.dedup_points();
        let first = pts.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in pts {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Bounds { x: min.x, y: min.y, width: max.x - min.x, height: max.y - min.y })
    }

    /// One-off containment check. Prefer `Container::new` when testing
    /// the same polygon against many points.
    pub fn contains(&self, p: Point) -> bool {
        Container::new(self).contains(p)
    }
}

static PROCESS_RAY_DIRECTION: OnceLock<Point> = OnceLock::new();

/// Sets the process-wide ray direction from a deterministic seed. Only
/// takes effect if no `Container` has computed the default direction
/// yet; intended to be called once, near process start.
pub fn seed_ray_direction(seed: u64) {
    let _ = PROCESS_RAY_DIRECTION.set(direction_from_seed(seed));
}

fn direction_from_seed(seed: u64) -> Point {
    let mut rng = StdRng::seed_from_u64(seed);
    let theta = rng.gen::<f64>() * std::f64::consts::PI * 2.0;
    Point::new(theta.cos(), theta.sin())
}

fn process_ray_direction() -> Point {
    *PROCESS_RAY_DIRECTION.get_or_init(|| direction_from_seed(rand::random()))
}

/// One edge's cached ray-intersection test: a ray from an arbitrary
/// origin in a fixed `direction` against the segment `start -> end`,
/// solved by inverting the 2x2 matrix `[direction | end - start]` once.
struct RayIntersector {
    inv11: f64,
    inv12: f64,
    inv21: f64,
    inv22: f64,
    start: Point,
}

impl RayIntersector {
    fn new(direction: Point, start: Point, end: Point) -> Option<Self> {
        let edge = end.sub(start);
        let (m11, m12, m21, m22) = (direction.x, edge.x, direction.y, edge.y);
        let det = m11 * m22 - m12 * m21;
        if det == 0.0 {
            return None;
        }
        let d = 1.0 / det;
        Some(Self { inv11: d * m22, inv12: -d * m12, inv21: -d * m21, inv22: d * m11, start })
    }

    /// True if the ray from `origin` along `direction` crosses the
    /// segment strictly between its endpoints (segment parameter in
    /// `(0, 1)`) and strictly ahead of the origin (ray parameter `> 0`).
    fn intersects(&self, origin: Point) -> bool {
        let input = origin.sub(self.start);
        let ray_t = -(self.inv11 * input.x + self.inv12 * input.y);
        let seg_t = self.inv21 * input.x + self.inv22 * input.y;
        ray_t > 0.0 && seg_t > 0.0 && seg_t < 1.0
    }
}

/// A precomputed point-in-polygon test: one `RayIntersector` per edge,
/// so repeated `contains` calls are O(edges) with a low constant.
pub struct Container {
    intersectors: Vec<RayIntersector>,
}

impl Container {
    /// Builds a container using the process-wide ray direction.
    pub fn new(poly: &Polygon) -> Self {
        Self::with_direction(poly, process_ray_direction())
    }

    /// Builds a container with a specific seed, for deterministic tests
    /// independent of the process-wide direction.
    pub fn with_seed(poly: &Polygon, seed: u64) -> Self {
        Self::with_direction(poly, direction_from_seed(seed))
    }

    fn with_direction(poly: &Polygon, direction: Point) -> Self {
        let pts = poly.dedup_points();
        let mut intersectors = Vec::with_capacity(pts.len());
        for i in 0..pts.len() {
            let start = pts[i];
            let end = poly.point_at(i as isize + 1);
            if let Some(r) = RayIntersector::new(direction, start, end) {
                intersectors.push(r);
            }
        }
        Self { intersectors }
    }

    /// Empty polygons never contain anything.
    pub fn contains(&self, point: Point) -> bool {
        if self.intersectors.is_empty() {
            return false;
        }
        let crossings = self.intersectors.iter().filter(|r| r.intersects(point)).count();
        crossings % 2 == 1
    }
}
