// Event payload interpretation: turns a raw storage event into a canonical
// object location, or decides the event is not ours to handle.

use crate::errors::EventError;
use serde::Deserialize;
use tracing::{error, info, instrument};

/// Structured message delivered by the trigger source. Unknown fields are
/// ignored; the location key inside `data` varies by storage source type.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub id: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "blobUrl")]
    pub blob_url: Option<String>,
}

/// Canonical (endpoint, container, path) triple identifying one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub service_endpoint: String,
    pub container: String,
    pub relative_path: String,
}

/// Outcome of location resolution. `Skip` means the event's location does not
/// belong to the configured storage endpoint: no work proceeds and the caller
/// returns cleanly. This is distinct from the fatal `EventError` cases, which
/// indicate a malformed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Proceed(ObjectLocation),
    Skip,
}

/// Decode a raw queue message body into an event payload.
pub fn parse_event(message: &[u8]) -> Result<EventPayload, EventError> {
    serde_json::from_slice(message).map_err(|e| {
        error!(error = %e, "Failed to decode event message");
        EventError::MalformedMessage(e.to_string())
    })
}

/// Resolve the event's location string against the configured storage
/// endpoint.
///
/// Checks `url` then `blobUrl`; neither present is fatal. A location that does
/// not start with `service_endpoint` (on a path boundary) yields
/// `Resolution::Skip`. On a match, the endpoint plus exactly one path
/// separator is stripped and the remainder is split at the first separator
/// into container and relative path.
#[instrument(skip(payload), fields(message_id = %payload.id))]
pub fn resolve_location(
    payload: &EventPayload,
    service_endpoint: &str,
) -> Result<Resolution, EventError> {
    let location = payload
        .data
        .url
        .as_deref()
        .or(payload.data.blob_url.as_deref())
        .ok_or_else(|| {
            error!("Event data contains no location field");
            EventError::MissingLocationField
        })?;

    info!(location = %location, "Resolving event location");

    let endpoint = service_endpoint.trim_end_matches('/');
    let remainder = match location.strip_prefix(endpoint) {
        Some(rest) => rest,
        None => {
            info!(
                endpoint = %endpoint,
                "Location does not match the configured storage endpoint, skipping event"
            );
            return Ok(Resolution::Skip);
        }
    };

    // The prefix must end on a path boundary; a mid-segment match means the
    // location belongs to a different endpoint.
    let remainder = match remainder.strip_prefix('/') {
        Some(rest) => rest,
        None => {
            info!(
                endpoint = %endpoint,
                "Location matches the endpoint mid-segment, skipping event"
            );
            return Ok(Resolution::Skip);
        }
    };

    let (container, relative_path) = remainder
        .split_once('/')
        .filter(|(container, path)| !container.is_empty() && !path.is_empty())
        .ok_or_else(|| {
            error!(location = %location, "Location has no container/path structure");
            EventError::MissingPathStructure(location.to_string())
        })?;

    let resolved = ObjectLocation {
        service_endpoint: endpoint.to_string(),
        container: container.to_string(),
        relative_path: relative_path.to_string(),
    };

    info!(
        container = %resolved.container,
        relative_path = %resolved.relative_path,
        "Event location resolved"
    );

    Ok(Resolution::Proceed(resolved))
}
