use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use punchbridge_types::{CanonicalPunch, IngestStatus};
use tracing::{Instrument, Span, debug, error, info, info_span};

use crate::decode::{Decoded, decode};
use crate::filter::filter_batch;
use crate::normalize::normalize;
use crate::persist::persist_batch;
use crate::status::StatusTracker;
use crate::store::PunchStore;

/// How a single inbound message was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Payload was not JSON.
    Malformed,
    /// JSON, but not a `sendlog` with records.
    NotSendLog,
    /// Every record was a system event; nothing to report.
    Empty,
    /// The batch reached the store; this is the new status snapshot.
    Reported(IngestStatus),
}

/// Decode → normalize → filter → persist → status, for one message at a
/// time.
pub struct IngestPipeline {
    store: Arc<dyn PunchStore>,
    status: StatusTracker,
    store_images: bool,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn PunchStore>, status: StatusTracker, store_images: bool) -> Self {
        Self {
            store,
            status,
            store_images,
        }
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    /// Handle one transport message. Never fails: irrelevant traffic is
    /// dropped quietly and store faults (including panics in the store)
    /// end up in the status snapshot.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> HandleOutcome {
        // Root span per message, not nested under the subscriber
        let span = info_span!(
            parent: Span::none(),
            "mqtt_message",
            topic = %topic,
            payload_size = payload.len(),
            device_sn = tracing::field::Empty,
        );

        self.handle_in_span(payload).instrument(span).await
    }

    async fn handle_in_span(&self, payload: &[u8]) -> HandleOutcome {
        let message = match decode(payload) {
            Decoded::SendLog(message) => message,
            Decoded::Invalid => {
                debug!("payload is not JSON, skipping message");
                return HandleOutcome::Malformed;
            }
            Decoded::Ignored => {
                debug!("not a sendlog message, skipping");
                return HandleOutcome::NotSendLog;
            }
        };

        let device_serial = message.device_serial.clone();
        if let Some(sn) = &device_serial {
            Span::current().record("device_sn", sn.as_str());
        }

        let punches: Vec<CanonicalPunch> = message
            .records
            .iter()
            .map(|record| normalize(device_serial.as_deref(), &message, record))
            .collect();
        let received = punches.len();

        let punches = filter_batch(punches, self.store_images);
        if punches.is_empty() {
            debug!(records = received, "no attendance records in message");
            return HandleOutcome::Empty;
        }

        let persisted = AssertUnwindSafe(persist_batch(
            self.store.as_ref(),
            device_serial.as_deref(),
            &punches,
        ))
        .catch_unwind()
        .await;

        let status = match persisted {
            Ok(outcome) => match outcome.error {
                None => {
                    info!(inserted = outcome.inserted_count, "Ingested punches");
                    IngestStatus::success(device_serial, outcome.inserted_count)
                }
                Some(e) => IngestStatus::failure(device_serial, e),
            },
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(error = %reason, "Ingest exception");
                IngestStatus::failure(device_serial, reason)
            }
        };

        self.status.record(status.clone());
        HandleOutcome::Reported(status)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "ingest task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockPunchStore, StoreError};

    const VALID: &[u8] = br#"{"cmd":"sendlog","sn":"DEV1","record":[{"enrollid":7,"time":"2024-01-01T00:00:00Z","inout":0}]}"#;

    fn pipeline(store: MockPunchStore, store_images: bool) -> IngestPipeline {
        IngestPipeline::new(Arc::new(store), StatusTracker::new(), store_images)
    }

    fn untouched_store() -> MockPunchStore {
        let mut store = MockPunchStore::new();
        store.expect_upsert_device().times(0);
        store.expect_insert_punches().times(0);
        store
    }

    #[tokio::test]
    async fn malformed_payload_has_no_side_effects() {
        let pipeline = pipeline(untouched_store(), false);

        let outcome = pipeline.handle_message("aiface/DEV1/sub", b"{{{").await;

        assert_eq!(outcome, HandleOutcome::Malformed);
        assert_eq!(*pipeline.status().snapshot(), IngestStatus::default());
    }

    #[tokio::test]
    async fn other_commands_have_no_side_effects() {
        let pipeline = pipeline(untouched_store(), false);

        let outcome = pipeline
            .handle_message("aiface/DEV1/sub", br#"{"cmd":"senduser","sn":"DEV1","record":[{"enrollid":1}]}"#)
            .await;
        assert_eq!(outcome, HandleOutcome::NotSendLog);

        let outcome = pipeline
            .handle_message("aiface/DEV1/sub", br#"{"cmd":"sendlog","sn":"DEV1","record":"nope"}"#)
            .await;
        assert_eq!(outcome, HandleOutcome::NotSendLog);
        assert_eq!(*pipeline.status().snapshot(), IngestStatus::default());
    }

    #[tokio::test]
    async fn system_events_only_leave_status_unchanged() {
        let pipeline = pipeline(untouched_store(), false);

        let outcome = pipeline
            .handle_message("aiface/DEV1/sub", br#"{"cmd":"sendlog","sn":"DEV1","record":[{"enrollid":0}]}"#)
            .await;

        assert_eq!(outcome, HandleOutcome::Empty);
        assert_eq!(*pipeline.status().snapshot(), IngestStatus::default());
    }

    #[tokio::test]
    async fn valid_sendlog_is_persisted_and_reported() {
        let mut store = MockPunchStore::new();
        store
            .expect_upsert_device()
            .withf(|sn| sn == "DEV1")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_insert_punches()
            .withf(|punches| {
                punches.len() == 1
                    && punches[0].device_serial.as_deref() == Some("DEV1")
                    && punches[0].enroll_id == 7
                    && punches[0].punch_time_iso() == "2024-01-01T00:00:00.000Z"
                    && punches[0].inout == Some(0)
            })
            .times(1)
            .returning(|p| Ok(p.len()));
        let pipeline = pipeline(store, false);

        let outcome = pipeline.handle_message("aiface/DEV1/sub", VALID).await;

        let snapshot = pipeline.status().snapshot();
        assert_eq!(outcome, HandleOutcome::Reported((*snapshot).clone()));
        assert_eq!(snapshot.device_serial.as_deref(), Some("DEV1"));
        assert_eq!(snapshot.inserted_count, 1);
        assert_eq!(snapshot.error, None);
        assert!(snapshot.timestamp.is_some());
    }

    #[tokio::test]
    async fn images_are_dropped_when_retention_is_off() {
        let mut store = MockPunchStore::new();
        store.expect_upsert_device().returning(|_| Ok(()));
        store
            .expect_insert_punches()
            .withf(|punches| punches.iter().all(|p| p.image_payload.is_none()))
            .times(1)
            .returning(|p| Ok(p.len()));
        let pipeline = pipeline(store, false);

        pipeline
            .handle_message(
                "aiface/DEV1/sub",
                br#"{"cmd":"sendlog","sn":"DEV1","record":[{"enrollid":1,"image":"aW1n"},{"enrollid":2,"image":"aW1n"}]}"#,
            )
            .await;
    }

    #[tokio::test]
    async fn insert_failure_is_reported_and_next_message_still_handled() {
        let mut store = MockPunchStore::new();
        store.expect_upsert_device().returning(|_| Ok(()));
        let mut calls = 0;
        store.expect_insert_punches().times(2).returning(move |p| {
            calls += 1;
            if calls == 1 {
                Err(StoreError::Rejected("connection reset".into()))
            } else {
                Ok(p.len())
            }
        });
        let pipeline = pipeline(store, false);

        pipeline.handle_message("aiface/DEV1/sub", VALID).await;
        let failed = pipeline.status().snapshot();
        assert_eq!(failed.inserted_count, 0);
        assert_eq!(failed.error.as_deref(), Some("connection reset"));

        pipeline.handle_message("aiface/DEV1/sub", VALID).await;
        let recovered = pipeline.status().snapshot();
        assert_eq!(recovered.inserted_count, 1);
        assert_eq!(recovered.error, None);
    }

    struct PanickingStore;

    #[async_trait::async_trait]
    impl PunchStore for PanickingStore {
        async fn upsert_device(&self, _device_serial: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert_punches(&self, _punches: &[CanonicalPunch]) -> Result<usize, StoreError> {
            panic!("pool exhausted")
        }
    }

    #[tokio::test]
    async fn store_panic_is_contained_in_status() {
        let pipeline = IngestPipeline::new(Arc::new(PanickingStore), StatusTracker::new(), false);

        let outcome = pipeline.handle_message("aiface/DEV1/sub", VALID).await;

        let snapshot = pipeline.status().snapshot();
        assert!(matches!(outcome, HandleOutcome::Reported(_)));
        assert_eq!(snapshot.inserted_count, 0);
        assert_eq!(snapshot.error.as_deref(), Some("pool exhausted"));
    }
}
