//! Typed failure modes for the routing engine. All of these
//! are reported outright rather than masked behind a partial route; the
//! orchestration layer never returns a `Route` missing some segments.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RouteError {
    #[error("floor {floor} has a degenerate or empty bounds polygon")]
    DegenerateLayout { floor: usize },

    #[error("no walkable path on floor {floor} between the requested points")]
    NoInFloorPath { floor: usize },

    #[error("no portal-connected route exists between floor {from} and floor {to}")]
    UnreachableAcrossFloors { from: usize, to: usize },

    #[error("layout has no zone flagged as the entrance")]
    MissingEntrance,

    #[error("layout has no zone flagged as the checkout")]
    MissingCheckout,

    #[error("destination zone {zone:?} could not be resolved on any floor")]
    UnresolvableZone { zone: String },

    #[error("route request named no destinations after deduplication")]
    EmptyDestinationList,
}

pub type RouteResult<T> = Result<T, RouteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_offending_floor() {
        let err = RouteError::DegenerateLayout { floor: 2 };
        assert!(err.to_string().contains("floor 2"));
    }

    #[test]
    fn errors_are_comparable_for_test_assertions() {
        assert_eq!(RouteError::EmptyDestinationList, RouteError::EmptyDestinationList);
        assert_ne!(RouteError::MissingEntrance, RouteError::MissingCheckout);
    }
}
