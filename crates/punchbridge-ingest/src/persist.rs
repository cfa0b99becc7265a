use punchbridge_types::CanonicalPunch;
use tracing::{debug, error};

use crate::store::PunchStore;

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub inserted_count: usize,
    pub error: Option<String>,
}

/// Register the device (if known), then insert the batch.
///
/// A failed device upsert is logged and ignored; punches are written
/// regardless. A failed insert reports zero rows and the store's error; the
/// batch is not retried.
pub async fn persist_batch(
    store: &dyn PunchStore,
    device_serial: Option<&str>,
    punches: &[CanonicalPunch],
) -> PersistOutcome {
    if let Some(device_sn) = device_serial {
        if let Err(e) = store.upsert_device(device_sn).await {
            error!(device_sn = %device_sn, error = %e, "devices upsert error");
        }
    }

    if punches.is_empty() {
        return PersistOutcome { inserted_count: 0, error: None };
    }

    match store.insert_punches(punches).await {
        Ok(_) => {
            debug!(count = punches.len(), "attendance_punches inserted");
            PersistOutcome { inserted_count: punches.len(), error: None }
        }
        Err(e) => {
            error!(error = %e, count = punches.len(), "attendance_punches insert error");
            PersistOutcome { inserted_count: 0, error: Some(e.to_string()) }
        }
    }
}
