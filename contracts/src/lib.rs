//! Payload shapes for the two upstream transit APIs.
//!
//! Nearby stops come from ResRobot, live departures from the Trafiklab
//! realtime API. Both are decoded into explicit structs; a body that does
//! not match is an error for the caller to handle.

pub mod resrobot;
pub mod time;
pub mod trafiklab;

pub use resrobot::{NearbyStopsResponse, StopLocation};
pub use time::{parse_timestamp, REFERENCE_TZ};
pub use trafiklab::{Departure, DeparturesResponse, Route};
