//! Punchbridge ingestion core.
//!
//! Turns `sendlog` messages published by attendance terminals into stored
//! punches:
//! - decode: bytes → JSON → structurally-checked log message
//! - normalize: vendor record → `CanonicalPunch` with per-field coercion
//! - filter: drop system events, apply the image retention policy
//! - persist: register the device, then insert the batch atomically
//! - status: last-ingest snapshot for the health surface
//!
//! `mqtt` and `worker` feed the pipeline from the broker through a bounded
//! queue drained by a single worker.

pub mod coerce;
pub mod decode;
pub mod filter;
pub mod mqtt;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod status;
pub mod store;
pub mod worker;

pub use decode::{Decoded, InboundMessage, RawRecord, decode};
pub use filter::filter_batch;
pub use mqtt::{ConnectionState, MqttError, MqttSettings, run_mqtt_subscriber};
pub use normalize::normalize;
pub use persist::{PersistOutcome, persist_batch};
pub use pipeline::{HandleOutcome, IngestPipeline};
pub use status::StatusTracker;
pub use store::{PunchStore, SqliteStore, StoreError};
pub use worker::{InboundFrame, run_ingest_worker};
