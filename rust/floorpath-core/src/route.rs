//! Route orchestration: turns a `RouteRequest` into a complete `Route`.
//! Re-resolves each destination zone, locates the entrance and
//! checkout, deduplicates destinations that resolved to the same place,
//! orders the visit with the TSP solver, then walks the ordered points
//! with the multi-floor connector. Any failure along the way -- an
//! unresolvable zone, a missing entrance, an unreachable hop -- aborts
//! the whole plan; there is no such thing as a route with some segments
//! missing.

use std::collections::HashSet;

use tracing::info;

use crate::config::RouteConfig;
use crate::connector::FloorConnector;
use crate::error::RouteError;
use crate::geometry::{self, Point};
use crate::model::{DestinationRef, FloorPoint, Layout, Route, RouteRequest, Zone};
use crate::tsp;

/// Builds the route answering `request` against `layout`.
pub fn plan(layout: &Layout, request: &RouteRequest, config: RouteConfig) -> Result<Route, RouteError> {
    if let Some(seed) = config.ray_seed {
        geometry::seed_ray_direction(seed);
    }

    let (entrance_floor, entrance_zone) = layout.find_entrance().ok_or(RouteError::MissingEntrance)?;
    let (checkout_floor, checkout_zone) = layout.find_checkout().ok_or(RouteError::MissingCheckout)?;
    let entrance_name = entrance_zone.name.clone();
    let checkout_name = checkout_zone.name.clone();
    info!(entrance = %entrance_name, checkout = %checkout_name, "resolved entrance and checkout");

    let resolved = resolve_destinations(layout, &request.destinations)?;
    if resolved.is_empty() {
        return Err(RouteError::EmptyDestinationList);
    }
    info!(stops = resolved.len(), "resolved destination zones");

    let mut points = Vec::with_capacity(resolved.len() + 2);
    points.push(FloorPoint { floor: entrance_floor, point: entrance_zone.location });
    for dest in &resolved {
        points.push(FloorPoint { floor: dest.floor, point: dest.location });
    }
    points.push(FloorPoint { floor: checkout_floor, point: checkout_zone.location });

    let connector = FloorConnector::new(layout, config)?;
    let matrix = connector.distance_oracle(&points);
    let tour = tsp::solve(&matrix, &config);
    info!(n = points.len(), "tour ordered");

    let mut segments = Vec::new();
    for pair in tour.windows(2) {
        let hop = connector.connect(points[pair[0]], points[pair[1]])?;
        segments.extend(hop);
    }

    let mut visit_order = Vec::with_capacity(tour.len());
    for &idx in &tour {
        visit_order.push(match idx {
            0 => entrance_name.clone(),
            i if i == points.len() - 1 => checkout_name.clone(),
            i => resolved[i - 1].name.clone(),
        });
    }

    Ok(Route { segments, visit_order })
}

struct ResolvedZone {
    floor: usize,
    name: String,
    location: Point,
}

/// Re-resolves every requested destination against the current layout
/// and drops duplicates that resolved to the same floor, name, and
/// (rounded) location, preserving the first occurrence's order.
fn resolve_destinations(layout: &Layout, destinations: &[DestinationRef]) -> Result<Vec<ResolvedZone>, RouteError> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(destinations.len());
    for dest in destinations {
        let (floor, zone) =
            find_exact_zone(layout, dest).ok_or_else(|| RouteError::UnresolvableZone { zone: dest.zone_name.clone() })?;
        let key = (floor, zone.name.clone(), round_point(zone.location));
        if seen.insert(key) {
            resolved.push(ResolvedZone { floor, name: zone.name.clone(), location: zone.location });
        }
    }
    Ok(resolved)
}

/// Looks up a destination zone, preferring an exact match on the
/// remembered floor (and location, if given), then falling back to the
/// first floor with a zone of that name, the way a stale destination
/// list still gets answered as long as the name still exists somewhere.
fn find_exact_zone<'l>(layout: &'l Layout, dest: &DestinationRef) -> Option<(usize, &'l Zone)> {
    if let Some(floor) = dest.last_known_floor {
        let exact = layout.floors.get(floor).and_then(|f| {
            f.zones.iter().find(|z| {
                z.name == dest.zone_name
                    && match dest.last_known_location {
                        None => true,
                        Some(expected) => expected == z.location,
                    }
            })
        });
        if let Some(zone) = exact {
            return Some((floor, zone));
        }
    }
    layout.floors.iter().enumerate().find_map(|(i, f)| f.zones.iter().find(|z| z.name == dest.zone_name).map(|z| (i, z)))
}

fn round_point(p: Point) -> (i64, i64) {
    ((p.x * 1000.0).round() as i64, (p.y * 1000.0).round() as i64)
}
