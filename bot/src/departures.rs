use chrono::{DateTime, Utc};
use contracts::Departure;
use std::collections::BTreeMap;

/// Departures shown per (line, direction).
pub const DEPARTURES_PER_GROUP: usize = 3;

/// Label for a departure without any readable time.
pub const UNKNOWN_LABEL: &str = "??";

/// Label for a departure that is due or already gone.
pub const ARRIVED_LABEL: &str = "Arr";

/// The soonest departures of one line in one direction at a stop.
#[derive(Debug, Clone, PartialEq)]
pub struct DepartureGroup {
    pub line: String,
    pub direction: String,
    pub departures: Vec<Departure>,
}

/// Groups departures by (line designation, direction).
///
/// Groups come out in lexicographic order of the key, each holding at most
/// [`DEPARTURES_PER_GROUP`] departures sorted by best-known time. Departures
/// without a readable time sort after all others, keeping input order
/// among themselves.
pub fn aggregate(departures: Vec<Departure>) -> Vec<DepartureGroup> {
    let mut grouped: BTreeMap<(String, String), Vec<Departure>> = BTreeMap::new();
    for departure in departures {
        let key = (
            departure.route.designation.clone(),
            departure.route.direction.clone(),
        );
        grouped.entry(key).or_default().push(departure);
    }

    grouped
        .into_iter()
        .map(|((line, direction), mut departures)| {
            departures.sort_by_cached_key(|d| {
                let time = d.best_known_time();
                (time.is_none(), time)
            });
            departures.truncate(DEPARTURES_PER_GROUP);

            DepartureGroup {
                line,
                direction,
                departures,
            }
        })
        .collect()
}

/// Short relative label for a departure: `"{n}m"`, [`ARRIVED_LABEL`] when
/// it is due, or [`UNKNOWN_LABEL`] when no time is known.
///
/// `now` is taken by the caller once per reply so that every label in the
/// reply is measured from the same instant.
pub fn format_relative(departure: &Departure, now: DateTime<Utc>) -> String {
    let time = match departure.best_known_time() {
        Some(time) => time,
        None => return UNKNOWN_LABEL.to_owned(),
    };

    let diff_minutes = (time - now).num_seconds().div_euclid(60);
    if diff_minutes <= 0 {
        ARRIVED_LABEL.to_owned()
    } else {
        format!("{}m", diff_minutes)
    }
}
