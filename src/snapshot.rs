//! Joins decoded trip updates against the stop table.
//!
//! Building never fails: an unknown stop or a missing time degrades to the
//! placeholder strings below.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::StopDirectory;
use crate::parser::{FeedEntityKind, StopTimeUpdate, TripUpdateRecord, trip_updates};
use crate::timestamp::TimeFormatter;

/// Stop name used when the stop id is not in the table.
pub const UNKNOWN: &str = "Inconnu";
/// Used for every other field that has no value.
pub const UNAVAILABLE: &str = "Non disponible";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedStop {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_desc: String,
    pub geom: String,
    pub arrival_time: String,
    pub departure_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripSnapshot {
    pub trip_id: String,
    pub stops: Vec<EnrichedStop>,
}

/// Top-level output document.
///
/// `vehicles` and `alerts` are always empty: those entity kinds are decoded
/// but not rendered yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub trips: Vec<TripSnapshot>,
    pub vehicles: Vec<serde_json::Value>,
    pub alerts: Vec<serde_json::Value>,
}

/// Builds [`Snapshot`]s from decoded entities.
pub struct SnapshotBuilder<'a> {
    directory: &'a StopDirectory,
    formatter: TimeFormatter,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(directory: &'a StopDirectory, formatter: TimeFormatter) -> Self {
        Self {
            directory,
            formatter,
        }
    }

    /// One [`TripSnapshot`] per trip-update entity, in feed order.
    pub fn build(&self, entities: &[FeedEntityKind]) -> Snapshot {
        let mut unknown_stops = 0usize;
        let trips: Vec<_> = trip_updates(entities)
            .map(|t| self.trip(t, &mut unknown_stops))
            .collect();
        debug!(trips = trips.len(), unknown_stops, "Snapshot built");

        Snapshot {
            trips,
            vehicles: Vec::new(),
            alerts: Vec::new(),
        }
    }

    fn trip(&self, update: &TripUpdateRecord, unknown_stops: &mut usize) -> TripSnapshot {
        TripSnapshot {
            trip_id: update.trip_id.clone(),
            stops: update
                .stop_time_updates
                .iter()
                .map(|stu| {
                    let (stop, known) = self.stop(stu);
                    if !known {
                        *unknown_stops += 1;
                    }
                    stop
                })
                .collect(),
        }
    }

    /// The enriched stop, and whether the stop id was found in the table.
    fn stop(&self, update: &StopTimeUpdate) -> (EnrichedStop, bool) {
        let record = self.directory.lookup(&update.stop_id);
        let (stop_name, stop_desc, geom) = match record {
            Some(record) => (
                record.stop_name.clone(),
                record.stop_desc.clone(),
                record.geom.clone(),
            ),
            None => (
                UNKNOWN.to_string(),
                UNAVAILABLE.to_string(),
                UNAVAILABLE.to_string(),
            ),
        };

        let stop = EnrichedStop {
            stop_id: update.stop_id.clone(),
            stop_name,
            stop_desc,
            geom,
            arrival_time: self.formatter.render(update.arrival_epoch),
            departure_time: self.formatter.render(update.departure_epoch),
        };
        (stop, record.is_some())
    }
}
