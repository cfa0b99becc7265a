pub mod api;
pub mod models;

pub use models::{CanonicalPunch, IngestStatus, format_instant};
