use crate::time::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `/v1/departures/{area_id}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[non_exhaustive]
pub struct DeparturesResponse {
    pub departures: Vec<Departure>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Departure {
    #[serde(default)]
    pub scheduled: Option<String>,
    #[serde(default)]
    pub realtime: Option<String>,
    /// Seconds behind schedule.
    #[serde(default)]
    pub delay: i64,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub is_realtime: bool,
    pub route: Route,
    #[serde(default)]
    pub trip: Option<Trip>,
    #[serde(default)]
    pub agency: Option<Agency>,
    #[serde(default)]
    pub stop: Option<Stop>,
    #[serde(default)]
    pub scheduled_platform: Option<Platform>,
    #[serde(default)]
    pub realtime_platform: Option<Platform>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Departure {
    pub fn new(route: Route, scheduled: Option<String>, realtime: Option<String>) -> Self {
        Self {
            scheduled,
            realtime,
            delay: 0,
            canceled: false,
            is_realtime: false,
            route,
            trip: None,
            agency: None,
            stop: None,
            scheduled_platform: None,
            realtime_platform: None,
            alerts: Vec::new(),
        }
    }

    /// The live time when it is present and readable, otherwise the
    /// scheduled time.
    pub fn best_known_time(&self) -> Option<DateTime<Utc>> {
        self.realtime
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| self.scheduled.as_deref().and_then(parse_timestamp))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Route {
    #[serde(default)]
    pub name: Option<String>,
    pub designation: String,
    pub direction: String,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub transport_mode_code: Option<i32>,
    #[serde(default)]
    pub origin: Option<RouteEndpoint>,
    #[serde(default)]
    pub destination: Option<RouteEndpoint>,
}

impl Route {
    pub fn new(designation: String, direction: String) -> Self {
        Self {
            name: None,
            designation,
            direction,
            transport_mode: None,
            transport_mode_code: None,
            origin: None,
            destination: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RouteEndpoint {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Trip {
    pub trip_id: String,
    pub start_date: Option<String>,
    pub technical_number: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Agency {
    pub id: String,
    pub name: String,
    pub operator: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Platform {
    pub id: String,
    pub designation: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: String,
    pub summary: String,
}
