use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pipeline::IngestPipeline;

/// One publish received from the broker, queued for ingestion.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Drain the ingest queue one frame at a time, in arrival order.
///
/// A single worker keeps store writes sequential; each message is handled to
/// completion before the next is taken. Stops when the queue closes or on
/// shutdown.
pub async fn run_ingest_worker(
    pipeline: Arc<IngestPipeline>,
    mut queue: mpsc::Receiver<InboundFrame>,
    shutdown: CancellationToken,
) {
    info!("ingest worker started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("ingest worker received shutdown");
                break;
            }
            frame = queue.recv() => {
                match frame {
                    Some(frame) => {
                        pipeline.handle_message(&frame.topic, &frame.payload).await;
                    }
                    None => {
                        debug!("ingest queue closed");
                        break;
                    }
                }
            }
        }
    }

    info!("ingest worker stopped");
}
