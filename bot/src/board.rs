use crate::{
    app::Reply,
    departures::{aggregate, format_relative, DepartureGroup},
    markdown,
    telegram::MAX_MESSAGE_LENGTH,
};
use chrono::{DateTime, Utc};
use client::{TransitClientError, TransitGateway};
use contracts::StopLocation;
use futures::future;

pub const HEADER: &str = "🚌 Upcoming departures:";
pub const NO_STOPS_TEXT: &str = "No bus stops found nearby.";
pub const NO_DEPARTURES_TEXT: &str = "No upcoming departures found nearby.";
pub const TRUNCATED_TEXT: &str = "More departures were left out to keep this message short.";

const LABEL_SEPARATOR: &str = r" \| ";

/// Departures around one location, stops in the order the lookup returned
/// them.
#[derive(Debug, Clone)]
pub struct Board {
    pub stops_found: usize,
    pub stops: Vec<StopBoard>,
}

#[derive(Debug, Clone)]
pub struct StopBoard {
    pub stop: StopLocation,
    pub groups: Vec<DepartureGroup>,
}

impl Board {
    /// Looks up the stops near a coordinate and their departures.
    ///
    /// Departures for all stops are fetched concurrently. A stop whose
    /// lookup fails or yields no departures is left out; only a failing
    /// stop lookup fails the whole board.
    pub async fn fetch<G>(
        gateway: &G,
        lat: f64,
        lon: f64,
        max_stops: usize,
    ) -> Result<Self, TransitClientError>
    where
        G: TransitGateway,
    {
        let mut stops = gateway.nearby_stops(lat, lon, max_stops).await?;
        stops.truncate(max_stops);
        let stops_found = stops.len();

        let lookups = stops
            .iter()
            .map(|stop| gateway.departures(&stop.ext_id));
        let results = future::join_all(lookups).await;

        let stops = stops
            .into_iter()
            .zip(results)
            .filter_map(|(stop, result)| match result {
                Ok(departures) if departures.is_empty() => {
                    debug!("no departures for stop '{}'", stop.ext_id);
                    None
                }
                Ok(departures) => Some(StopBoard {
                    groups: aggregate(departures),
                    stop,
                }),
                Err(e) if e.is_timeout() => {
                    warn!("timed out fetching departures for stop '{}'", stop.ext_id);
                    None
                }
                Err(e) => {
                    warn!(
                        "failed to fetch departures for stop '{}' with error: '{}'",
                        stop.ext_id, e
                    );
                    None
                }
            })
            .collect();

        Ok(Self { stops_found, stops })
    }

    pub fn render(&self, now: DateTime<Utc>) -> Reply {
        if self.stops_found == 0 {
            return Reply::plain(NO_STOPS_TEXT);
        }
        if self.stops.is_empty() {
            return Reply::plain(NO_DEPARTURES_TEXT);
        }

        let sections: Vec<String> = self
            .stops
            .iter()
            .map(|board| render_section(&board.stop.name, &board.groups, now))
            .collect();

        Reply::markdown(fit_sections(&sections))
    }
}

/// Puts sections under the header, stopping at the first one that would
/// push the message past [`MAX_MESSAGE_LENGTH`]. Sections are never cut,
/// unless the first one alone is too long, in which case it keeps as many
/// of its lines as fit. A note marks a shortened message.
fn fit_sections(sections: &[String]) -> String {
    let note = format!("\n{}", markdown::escape(TRUNCATED_TEXT));
    let budget = MAX_MESSAGE_LENGTH - message_length(&note);

    let mut text = format!("{}\n\n", HEADER);
    let mut shown = 0;
    for section in sections {
        let separator = if shown == 0 { "" } else { "\n" };
        if message_length(&text) + message_length(separator) + message_length(section) > budget {
            break;
        }
        text.push_str(separator);
        text.push_str(section);
        shown += 1;
    }

    if shown == sections.len() {
        return text;
    }

    if shown == 0 {
        if let Some(first) = sections.first() {
            for line in first.split_inclusive('\n') {
                if message_length(&text) + message_length(line) > budget {
                    break;
                }
                text.push_str(line);
            }
        }
    }

    text.push_str(&note);
    text
}

/// Telegram counts message length in UTF-16 code units.
fn message_length(text: &str) -> usize {
    text.encode_utf16().count()
}

/// One stop: a bold header followed by a line per group.
pub fn render_section(stop_name: &str, groups: &[DepartureGroup], now: DateTime<Utc>) -> String {
    let mut section = format!("📍 {}\n", markdown::bold(stop_name));

    for group in groups {
        let labels: Vec<String> = group
            .departures
            .iter()
            .map(|d| markdown::escape(&format_relative(d, now)))
            .collect();

        section.push_str(&format!(
            "🚍{:<4}: {}\n",
            markdown::escape(&group.line),
            labels.join(LABEL_SEPARATOR)
        ));
    }

    section
}
