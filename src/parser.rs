//! Protobuf parser for GTFS Realtime feeds.
//!
//! The raw prost types are narrowed to [`FeedEntityKind`], which is all the
//! snapshot builder needs to see.

use prost::Message;
use tracing::debug;

use crate::error::DecodeError;
use crate::gtfs_rt::trip_update::StopTimeEvent;
use crate::gtfs_rt::{FeedEntity, FeedMessage, TripUpdate};

/// One stop's revised prediction. Epochs are `None` when the producer left
/// them unset or zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTimeUpdate {
    pub stop_id: String,
    pub arrival_epoch: Option<i64>,
    pub departure_epoch: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripUpdateRecord {
    pub entity_id: String,
    pub trip_id: String,
    /// Kept in feed order.
    pub stop_time_updates: Vec<StopTimeUpdate>,
}

/// A decoded feed entity, tagged by the payload it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEntityKind {
    TripUpdate(TripUpdateRecord),
    VehiclePosition { entity_id: String },
    Alert { entity_id: String },
    /// No payload this crate knows about (deleted entities, shapes, ...).
    Unknown { entity_id: String },
}

impl FeedEntityKind {
    pub fn as_trip_update(&self) -> Option<&TripUpdateRecord> {
        match self {
            FeedEntityKind::TripUpdate(record) => Some(record),
            _ => None,
        }
    }
}

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
    FeedMessage::decode(bytes).map_err(|source| DecodeError {
        len: bytes.len(),
        source,
    })
}

/// Decodes `bytes` and classifies every entity, preserving feed order.
pub fn decode_entities(bytes: &[u8]) -> Result<Vec<FeedEntityKind>, DecodeError> {
    let feed = parse_feed(bytes)?;
    let entities: Vec<_> = feed.entity.into_iter().map(classify).collect();

    let trip_updates = entities
        .iter()
        .filter(|e| e.as_trip_update().is_some())
        .count();
    debug!(
        entities = entities.len(),
        trip_updates,
        ignored = entities.len() - trip_updates,
        "Feed decoded"
    );

    Ok(entities)
}

/// Iterates over the trip-update entities only.
pub fn trip_updates(entities: &[FeedEntityKind]) -> impl Iterator<Item = &TripUpdateRecord> {
    entities.iter().filter_map(FeedEntityKind::as_trip_update)
}

fn classify(entity: FeedEntity) -> FeedEntityKind {
    let FeedEntity {
        id,
        trip_update,
        vehicle,
        alert,
        ..
    } = entity;

    match (trip_update, vehicle, alert) {
        (Some(update), _, _) => FeedEntityKind::TripUpdate(trip_record(id, update)),
        (None, Some(_), _) => FeedEntityKind::VehiclePosition { entity_id: id },
        (None, None, Some(_)) => FeedEntityKind::Alert { entity_id: id },
        (None, None, None) => FeedEntityKind::Unknown { entity_id: id },
    }
}

fn trip_record(entity_id: String, update: TripUpdate) -> TripUpdateRecord {
    TripUpdateRecord {
        entity_id,
        trip_id: update.trip.trip_id.unwrap_or_default(),
        stop_time_updates: update
            .stop_time_update
            .into_iter()
            .map(|stu| StopTimeUpdate {
                stop_id: stu.stop_id.unwrap_or_default(),
                arrival_epoch: event_epoch(stu.arrival.as_ref()),
                departure_epoch: event_epoch(stu.departure.as_ref()),
            })
            .collect(),
    }
}

/// Zero means "not provided" in the feeds we consume.
fn event_epoch(event: Option<&StopTimeEvent>) -> Option<i64> {
    event.and_then(|e| e.time).filter(|&t| t != 0)
}
