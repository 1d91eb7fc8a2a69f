//! Custom assertion helpers.

use mk_protocol::ipc::{Outcome, Response};
use mk_protocol::playback_models::{PlaybackEvent, PlaybackOutcome};

/// Assert that a Response is a success with no `result`.
#[allow(dead_code)]
pub fn assert_void_success(response: &Response) {
    assert_eq!(
        response.outcome,
        Outcome::Success(None),
        "Expected void success for {}",
        response.id
    );
}

/// Assert that a Response failed with an error starting with `prefix`.
#[allow(dead_code)]
pub fn assert_failure_prefix(response: &Response, prefix: &str) {
    match &response.outcome {
        Outcome::Failure(error) => assert!(
            error.starts_with(prefix),
            "Expected error starting with {prefix:?}, got {error:?}"
        ),
        other => panic!("Expected failure for {}, got {other:?}", response.id),
    }
}

/// Assert that playback events start with `Started` and end with a
/// `Finished` carrying `outcome`.
#[allow(dead_code)]
pub fn assert_playback_finished(events: &[PlaybackEvent], outcome: &PlaybackOutcome) {
    assert!(
        matches!(events.first(), Some(PlaybackEvent::Started { .. })),
        "First event should be Started, got: {:?}",
        events.first()
    );
    match events.last() {
        Some(PlaybackEvent::Finished { outcome: last, .. }) => assert_eq!(last, outcome),
        other => panic!("Last event should be Finished, got: {other:?}"),
    }
}
