//! Layout data model: floors, zones, portals, and the request/response
//! shapes the rest of the crate operates on.

use serde::{Deserialize, Serialize};

use crate::geometry::{Path, Point, Polygon};

/// A named location on a floor, e.g. a department or a fixture.
///
/// `entrance`/`checkout` mark the (normally unique) zones a route starts
/// and ends at; `specific` distinguishes a precise aisle pin from a
/// departmental centroid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub location: Point,
    #[serde(default)]
    pub entrance: bool,
    #[serde(default)]
    pub checkout: bool,
    #[serde(default)]
    pub specific: bool,
}

/// The kind of vertical transit a `Portal` represents: a small closed
/// tag set plus a catch-all for anything else a layout names, so an
/// unrecognized `type` string deserializes instead of hard-failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalType {
    Elevator,
    Escalator,
    #[serde(other)]
    Unknown,
}

/// A vertical-transit point on one floor. `id` is unique across the
/// whole layout; `destinations` names other portal ids reachable by one
/// use of this portal. A portal with no destinations is a dead end and
/// is never traversed.
///
/// Portals reference other portals only by raw id, resolved lazily
/// through the `Layout`'s id index (`Layout::portal_location`) rather
/// than stored as direct pointers or pre-resolved indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    pub id: u64,
    pub location: Point,
    #[serde(rename = "type")]
    pub portal_type: PortalType,
    pub destinations: Vec<u64>,
}

/// One level of the store: its walkable bounds, obstacles, preference
/// regions, named zones, and portals to other floors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub name: String,
    /// The floor's walkable outer boundary.
    pub bounds: Polygon,
    /// Interior regions that are not walkable (fixtures, walls).
    #[serde(default)]
    pub obstacles: Vec<Polygon>,
    /// Regions that are walkable but should be avoided when a
    /// preferred-region path exists.
    #[serde(default)]
    pub non_preferred: Vec<Polygon>,
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub portals: Vec<Portal>,
}

/// The complete, immutable description of a store used to answer route
/// requests; shared read-only across concurrent requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub floors: Vec<Floor>,
}

impl Layout {
    /// The first zone across all floors with `entrance` set. Floors
    /// are scanned in index order, zones in list order.
    pub fn find_entrance(&self) -> Option<(usize, &Zone)> {
        self.floors.iter().enumerate().find_map(|(i, f)| f.zones.iter().find(|z| z.entrance).map(|z| (i, z)))
    }

    /// The first zone across all floors with `checkout` set.
    pub fn find_checkout(&self) -> Option<(usize, &Zone)> {
        self.floors.iter().enumerate().find_map(|(i, f)| f.zones.iter().find(|z| z.checkout).map(|z| (i, z)))
    }

    /// Resolves a portal id to its containing floor and index within
    /// that floor's portal list. Portals reference each other only by
    /// this raw id; lookups go through the layout rather than
    /// storing a resolved pointer or index at load time.
    pub fn portal_location(&self, id: u64) -> Option<(usize, usize)> {
        self.floors.iter().enumerate().find_map(|(fi, f)| f.portals.iter().position(|p| p.id == id).map(|pi| (fi, pi)))
    }
}

/// A point on a specific floor, the unit multi-floor routing connects.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorPoint {
    pub floor: usize,
    pub point: Point,
}

/// One uninterrupted walk, entirely on a single floor, between two
/// `FloorPoint`s. For every step but the last, `source_portal` and
/// `dest_portal` name the portal used to leave this floor after `path`
/// ends and the partner portal the next step resumes from; the
/// final step's `path` ends at the route's actual destination and both
/// are `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloorPath {
    pub floor: usize,
    pub path: Path,
    #[serde(default)]
    pub source_portal: Option<u64>,
    #[serde(default)]
    pub dest_portal: Option<u64>,
}

/// A full route: the ordered floor-local walks plus the destination
/// order they were resolved to visit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub segments: Vec<FloorPath>,
    pub visit_order: Vec<String>,
}

/// A request to route through a list of destination zones. The
/// entrance and checkout are not named here: they are located in the
/// `Layout` itself by their `entrance`/`checkout` flags, so a stale
/// request can never point routing at the wrong door.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteRequest {
    /// Each destination is matched by zone name and, optionally, the
    /// floor it was last known to be on.
    pub destinations: Vec<DestinationRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DestinationRef {
    pub zone_name: String,
    #[serde(default)]
    pub last_known_floor: Option<usize>,
    #[serde(default)]
    pub last_known_location: Option<Point>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_defaults_fill_in_missing_obstacle_and_portal_lists() {
        let json = serde_json::json!({
            "name": "Ground",
            "bounds": [
                {"x": 0.0, "y": 0.0}, {"x": 10.0, "y": 0.0},
                {"x": 10.0, "y": 10.0}, {"x": 0.0, "y": 10.0}
            ],
            "zones": [],
        });
        let floor: Floor = serde_json::from_value(json).unwrap();
        assert!(floor.obstacles.is_empty());
        assert!(floor.non_preferred.is_empty());
        assert!(floor.portals.is_empty());
    }

    #[test]
    fn portal_type_serializes_snake_case() {
        let json = serde_json::to_value(PortalType::Elevator).unwrap();
        assert_eq!(json, serde_json::json!("elevator"));
    }

    #[test]
    fn unrecognized_portal_type_falls_back_to_unknown_instead_of_failing() {
        let json = serde_json::json!("stairs");
        let portal_type: PortalType = serde_json::from_value(json).unwrap();
        assert_eq!(portal_type, PortalType::Unknown);
    }

    #[test]
    fn portal_round_trips_type_field_rename() {
        let portal =
            Portal { id: 1, location: Point::new(1.0, 1.0), portal_type: PortalType::Escalator, destinations: vec![2] };
        let json = serde_json::to_value(&portal).unwrap();
        assert_eq!(json["type"], serde_json::json!("escalator"));
        let back: Portal = serde_json::from_value(json).unwrap();
        assert_eq!(back, portal);
    }

    #[test]
    fn layout_finds_entrance_and_checkout_by_flag() {
        let layout = Layout {
            floors: vec![Floor {
                name: "Ground".into(),
                bounds: Polygon::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)]),
                obstacles: vec![],
                non_preferred: vec![],
                zones: vec![
                    Zone { name: "Front Door".into(), location: Point::new(1.0, 1.0), entrance: true, ..Default::default() },
                    Zone { name: "Register".into(), location: Point::new(9.0, 9.0), checkout: true, ..Default::default() },
                ],
                portals: vec![],
            }],
        };
        assert_eq!(layout.find_entrance().unwrap().1.name, "Front Door");
        assert_eq!(layout.find_checkout().unwrap().1.name, "Register");
    }

    #[test]
    fn portal_location_resolves_raw_ids_through_the_layout() {
        let layout = Layout {
            floors: vec![Floor {
                name: "Ground".into(),
                bounds: Polygon::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0), Point::new(0.0, 10.0)]),
                obstacles: vec![],
                non_preferred: vec![],
                zones: vec![],
                portals: vec![Portal { id: 42, location: Point::new(5.0, 5.0), portal_type: PortalType::Elevator, destinations: vec![7] }],
            }],
        };
        assert_eq!(layout.portal_location(42), Some((0, 0)));
        assert_eq!(layout.portal_location(99), None);
    }
}
