//! floorpath-core: geometry and multi-floor routing engine for store
//! navigation.
//!
//! A [`model::Layout`] describes a store as a set of floors, each with
//! a walkable boundary, obstacles, preference regions, named zones, and
//! portals to other floors. [`route::plan`] turns a
//! [`model::RouteRequest`] against a `Layout` into an ordered
//! [`model::Route`], composing the rest of the crate:
//!
//! - [`geometry`] -- points, polygons, and point-in-polygon containment.
//! - [`queue`] -- a decrease-key priority queue used by every search.
//! - [`raster`] -- turns a floor's polygons into a searchable bit-grid.
//! - [`pathfind`] -- in-floor Dijkstra over a floor's raster.
//! - [`batch`] -- caches repeated in-floor queries.
//! - [`connector`] -- Dijkstra across floors via portals.
//! - [`tsp`] -- orders a destination list into a single tour.
//! - [`config`] -- tunable knobs with documented defaults.
//! - [`error`] -- the failure modes routing can report.

pub mod batch;
pub mod config;
pub mod connector;
pub mod error;
pub mod geometry;
pub mod model;
pub mod pathfind;
pub mod queue;
pub mod raster;
pub mod route;
pub mod tsp;

pub use config::RouteConfig;
pub use error::{RouteError, RouteResult};
pub use model::{DestinationRef, Floor, FloorPath, FloorPoint, Layout, Portal, PortalType, Route, RouteRequest, Zone};
pub use route::plan;

/// The crate version, as recorded in `Cargo.toml`.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
