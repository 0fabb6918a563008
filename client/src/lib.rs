use contracts::{Departure, DeparturesResponse, NearbyStopsResponse, StopLocation};
use isahc::{config::Configurable, AsyncReadResponseExt, HttpClient};
use std::{error::Error, fmt::Display, future::Future, time::Duration};

#[macro_use]
extern crate log;

pub const DEFAULT_RESROBOT_URL: &str = "https://api.resrobot.se/v2.1";
pub const DEFAULT_TRAFIKLAB_URL: &str = "https://realtime-api.trafiklab.se/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// The two upstream lookups the bot needs.
pub trait TransitGateway {
    /// Stops around a coordinate, nearest first, at most `limit` of them.
    fn nearby_stops(
        &self,
        lat: f64,
        lon: f64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<StopLocation>, TransitClientError>> + Send;

    /// Live departures for the stop with the given external id.
    fn departures(
        &self,
        ext_id: &str,
    ) -> impl Future<Output = Result<Vec<Departure>, TransitClientError>> + Send;
}

pub struct TransitClient {
    resrobot_url: String,
    resrobot_key: String,
    trafiklab_url: String,
    trafiklab_key: String,
    client: HttpClient,
}

impl TransitClient {
    pub fn new(resrobot_key: String, trafiklab_key: String) -> TransitClientBuilder {
        TransitClientBuilder::new(resrobot_key, trafiklab_key)
    }

    fn from_builder(builder: TransitClientBuilder) -> Result<Self, TransitBuilderError> {
        let resrobot_url = trim_url(&builder.resrobot_url).ok_or(TransitBuilderError::InvalidUrl)?;
        let trafiklab_url =
            trim_url(&builder.trafiklab_url).ok_or(TransitBuilderError::InvalidUrl)?;

        let resrobot_key = builder.resrobot_key.trim();
        if resrobot_key.is_empty() {
            return Err(TransitBuilderError::InvalidResRobotKey);
        }

        let trafiklab_key = builder.trafiklab_key.trim();
        if trafiklab_key.is_empty() {
            return Err(TransitBuilderError::InvalidTrafiklabKey);
        }

        let client = HttpClient::builder()
            .timeout(builder.timeout)
            .build()
            .map_err(TransitBuilderError::IsahcError)?;

        Ok(Self {
            resrobot_url,
            resrobot_key: resrobot_key.to_owned(),
            trafiklab_url,
            trafiklab_key: trafiklab_key.to_owned(),
            client,
        })
    }

    fn nearby_stops_url(&self, lat: f64, lon: f64, limit: usize) -> String {
        format!(
            "{}/location.nearbystops?originCoordLat={}&originCoordLong={}&maxNo={}&format=json&accessId={}",
            self.resrobot_url,
            lat,
            lon,
            limit,
            urlencoding::encode(&self.resrobot_key)
        )
    }

    fn departures_url(&self, ext_id: &str) -> String {
        format!(
            "{}/departures/{}?key={}",
            self.trafiklab_url,
            urlencoding::encode(ext_id),
            urlencoding::encode(&self.trafiklab_key)
        )
    }
}

impl TransitGateway for TransitClient {
    async fn nearby_stops(
        &self,
        lat: f64,
        lon: f64,
        limit: usize,
    ) -> Result<Vec<StopLocation>, TransitClientError> {
        trace!("looking up stops near ({}, {})", lat, lon);
        let mut response = self
            .client
            .get_async(self.nearby_stops_url(lat, lon, limit))
            .await?;

        if !response.status().is_success() {
            return Err(TransitClientError::Status(response.status().as_u16()));
        }

        let body: NearbyStopsResponse = response.json().await?;
        let mut stops = body.into_stops();
        stops.truncate(limit);

        debug!("found {} stops near ({}, {})", stops.len(), lat, lon);
        Ok(stops)
    }

    async fn departures(&self, ext_id: &str) -> Result<Vec<Departure>, TransitClientError> {
        trace!("fetching departures for stop '{}'", ext_id);
        let mut response = self.client.get_async(self.departures_url(ext_id)).await?;

        if !response.status().is_success() {
            return Err(TransitClientError::Status(response.status().as_u16()));
        }

        let body: DeparturesResponse = response.json().await?;

        debug!(
            "fetched {} departures for stop '{}'",
            body.departures.len(),
            ext_id
        );
        Ok(body.departures)
    }
}

fn trim_url(url: &str) -> Option<String> {
    let mut url = url.trim();
    if let Some(without_trailing_slash) = url.strip_suffix('/') {
        url = without_trailing_slash;
    }

    if url.is_empty() {
        None
    } else {
        Some(url.to_owned())
    }
}

pub struct TransitClientBuilder {
    resrobot_url: String,
    resrobot_key: String,
    trafiklab_url: String,
    trafiklab_key: String,
    timeout: Duration,
}

impl TransitClientBuilder {
    fn new(resrobot_key: String, trafiklab_key: String) -> Self {
        Self {
            resrobot_url: DEFAULT_RESROBOT_URL.to_owned(),
            resrobot_key,
            trafiklab_url: DEFAULT_TRAFIKLAB_URL.to_owned(),
            trafiklab_key,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn resrobot_url(mut self, url: String) -> Self {
        self.resrobot_url = url;
        self
    }

    pub fn trafiklab_url(mut self, url: String) -> Self {
        self.trafiklab_url = url;
        self
    }

    /// Applies to every request, connect and transfer included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<TransitClient, TransitBuilderError> {
        TransitClient::from_builder(self)
    }
}

#[derive(Debug)]
pub enum TransitBuilderError {
    InvalidUrl,
    InvalidResRobotKey,
    InvalidTrafiklabKey,
    IsahcError(isahc::Error),
}

impl Display for TransitBuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitBuilderError::InvalidUrl => write!(f, "invalid url"),
            TransitBuilderError::InvalidResRobotKey => write!(f, "missing ResRobot access key"),
            TransitBuilderError::InvalidTrafiklabKey => {
                write!(f, "missing Trafiklab realtime access key")
            }
            TransitBuilderError::IsahcError(e) => write!(f, "could not create http client: '{}'", e),
        }
    }
}

impl Error for TransitBuilderError {}

#[derive(Debug)]
pub enum TransitClientError {
    IsahcError(isahc::Error),
    Status(u16),
    SerdeError(serde_json::Error),
}

impl TransitClientError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransitClientError::IsahcError(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl Display for TransitClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            TransitClientError::IsahcError(e) => format!("isahc error: '{}'", e),
            TransitClientError::Status(status) => format!("unexpected status code: {}", status),
            TransitClientError::SerdeError(serde_error) => {
                format!("malformed response: '{}'", serde_error)
            }
        };

        write!(f, "{}", output)
    }
}

impl From<isahc::Error> for TransitClientError {
    fn from(e: isahc::Error) -> Self {
        Self::IsahcError(e)
    }
}

impl From<serde_json::Error> for TransitClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerdeError(e)
    }
}

impl Error for TransitClientError {}
