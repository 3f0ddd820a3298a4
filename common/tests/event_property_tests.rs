// Property-based tests for event location resolution

use common::event::{parse_event, resolve_location, EventData, EventPayload, Resolution};
use proptest::prelude::*;

const ENDPOINT: &str = "https://my-account.blob.core.windows.net";

fn payload(url: Option<String>, blob_url: Option<String>) -> EventPayload {
    EventPayload {
        id: "m1".to_string(),
        data: EventData { url, blob_url },
    }
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9-]{0,19}"
}

proptest! {
    /// *For any* container and path built from well-formed segments, a
    /// location under the configured endpoint resolves to exactly that
    /// container and path.
    #[test]
    fn property_matching_location_resolves_exactly(
        container in segment(),
        path_segments in prop::collection::vec(segment(), 1..4),
    ) {
        let relative_path = path_segments.join("/");
        let location = format!("{}/{}/{}", ENDPOINT, container, relative_path);

        let resolution = resolve_location(&payload(Some(location), None), ENDPOINT).unwrap();
        match resolution {
            Resolution::Proceed(resolved) => {
                prop_assert_eq!(resolved.container, container);
                prop_assert_eq!(resolved.relative_path, relative_path);
                prop_assert_eq!(resolved.service_endpoint, ENDPOINT);
            }
            Resolution::Skip => prop_assert!(false, "expected Proceed"),
        }
    }

    /// *For any* location under a different host, resolution is a clean skip
    /// rather than an error.
    #[test]
    fn property_foreign_host_is_skipped(
        host in "[a-z0-9]{1,12}",
        container in segment(),
        path in segment(),
    ) {
        let location = format!("https://{}.example.com/{}/{}", host, container, path);
        let resolution = resolve_location(&payload(None, Some(location)), ENDPOINT).unwrap();
        prop_assert_eq!(resolution, Resolution::Skip);
    }

    /// *For any* well-formed location, resolution is deterministic across
    /// repeated calls.
    #[test]
    fn property_resolution_is_deterministic(
        container in segment(),
        path in segment(),
    ) {
        let location = format!("{}/{}/{}", ENDPOINT, container, path);
        let event = payload(Some(location), None);
        let first = resolve_location(&event, ENDPOINT).unwrap();
        let second = resolve_location(&event, ENDPOINT).unwrap();
        prop_assert_eq!(first, second);
    }

    /// *For any* event id and location, round-tripping the event through its
    /// JSON wire form preserves the fields the resolver depends on.
    #[test]
    fn property_event_wire_form_round_trips(
        id in "[a-z0-9-]{1,24}",
        container in segment(),
        path in segment(),
    ) {
        let location = format!("{}/{}/{}", ENDPOINT, container, path);
        let message = serde_json::json!({
            "id": id,
            "data": { "blobUrl": location }
        });
        let event = parse_event(&serde_json::to_vec(&message).unwrap()).unwrap();
        prop_assert_eq!(event.id, id);
        prop_assert_eq!(event.data.blob_url.as_deref(), Some(location.as_str()));
    }
}

#[test]
fn test_event_without_location_field_fails() {
    let err = resolve_location(&payload(None, None), ENDPOINT).unwrap_err();
    assert!(matches!(
        err,
        common::errors::EventError::MissingLocationField
    ));
}
