//! Tunable knobs for rasterization, search, and TSP strategy selection,
//! following the `#[serde(default)]` + `Default` + documented constants
//! convention the core library's options type uses.

use serde::{Deserialize, Serialize};

/// Target cell count along a floor's longer axis when rasterizing it.
pub const DEFAULT_RASTER_SIZE: usize = 600;
/// Widest Chebyshev ring radius searched for a walkable neighbor before
/// giving up on expanding a search frontier.
pub const DEFAULT_MAX_NEARBY_DELTA: i64 = 4;
/// Per-portal-transit penalty, expressed as a multiplier of the largest
/// floor dimension across the layout.
pub const DEFAULT_PORTAL_PENALTY_MULTIPLIER: f64 = 100.0;
/// Destination counts at or below which the TSP solver runs the exact
/// factorial search.
pub const DEFAULT_TSP_EXACT_THRESHOLD: usize = 10;
/// Destination counts at or below which the TSP solver runs beam search
/// with a beam width of 1000.
pub const DEFAULT_TSP_WIDE_BEAM_THRESHOLD: usize = 30;
/// Destination counts at or below which the TSP solver runs beam search
/// with a beam width of 100; beyond this it falls back to greedy
/// nearest-neighbor.
pub const DEFAULT_TSP_NARROW_BEAM_THRESHOLD: usize = 50;
/// Per-floor in-floor-path cache capacity, keyed by raster cell pairs.
/// Bounded rather than unbounded so a layout with many floors and a
/// long-lived connector has a fixed memory ceiling; see the design
/// notes on the cache-eviction open question.
pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;

const DEFAULT_WIDE_BEAM_WIDTH: usize = 1000;
const DEFAULT_NARROW_BEAM_WIDTH: usize = 100;

/// Configuration for one routing engine instance. A request may
/// override any subset of these fields via partial JSON.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub raster_size: usize,
    pub max_nearby_delta: i64,
    pub portal_penalty_multiplier: f64,
    pub tsp_exact_threshold: usize,
    pub tsp_wide_beam_threshold: usize,
    pub tsp_narrow_beam_threshold: usize,
    pub tsp_wide_beam_width: usize,
    pub tsp_narrow_beam_width: usize,
    /// Seeds the ray direction used for point-in-polygon containment.
    /// `None` lets the process pick one direction for its lifetime.
    pub ray_seed: Option<u64>,
    pub cache_capacity: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            raster_size: DEFAULT_RASTER_SIZE,
            max_nearby_delta: DEFAULT_MAX_NEARBY_DELTA,
            portal_penalty_multiplier: DEFAULT_PORTAL_PENALTY_MULTIPLIER,
            tsp_exact_threshold: DEFAULT_TSP_EXACT_THRESHOLD,
            tsp_wide_beam_threshold: DEFAULT_TSP_WIDE_BEAM_THRESHOLD,
            tsp_narrow_beam_threshold: DEFAULT_TSP_NARROW_BEAM_THRESHOLD,
            tsp_wide_beam_width: DEFAULT_WIDE_BEAM_WIDTH,
            tsp_narrow_beam_width: DEFAULT_NARROW_BEAM_WIDTH,
            ray_seed: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}
