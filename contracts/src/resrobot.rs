use serde::{Deserialize, Serialize};

/// Body of `location.nearbystops`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[non_exhaustive]
pub struct NearbyStopsResponse {
    /// ResRobot leaves this out entirely when nothing is nearby.
    #[serde(rename = "stopLocationOrCoordLocation", default)]
    pub locations: Vec<LocationWrapper>,
}

impl NearbyStopsResponse {
    pub fn into_stops(self) -> Vec<StopLocation> {
        self.locations
            .into_iter()
            .filter_map(|wrapper| wrapper.stop_location)
            .collect()
    }
}

/// One entry of `stopLocationOrCoordLocation`. Coordinate locations are
/// skipped.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LocationWrapper {
    #[serde(rename = "StopLocation")]
    pub stop_location: Option<StopLocation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct StopLocation {
    pub id: String,
    /// Key for departure lookups.
    pub ext_id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Distance from the query point in meters.
    pub dist: u32,
    /// Bitmask of the products serving the stop.
    pub products: u32,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub timezone_offset: Option<i32>,
    #[serde(default)]
    pub minimum_change_duration: Option<String>,
    #[serde(default)]
    pub product_at_stop: Vec<ProductAtStop>,
}

impl StopLocation {
    pub fn new(id: String, ext_id: String, name: String, lat: f64, lon: f64, dist: u32) -> Self {
        Self {
            id,
            ext_id,
            name,
            lon,
            lat,
            dist,
            products: 0,
            weight: None,
            timezone_offset: None,
            minimum_change_duration: None,
            product_at_stop: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProductAtStop {
    pub cls: String,
    pub icon: Option<Icon>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Icon {
    pub res: String,
}
