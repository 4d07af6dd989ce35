//! Routes of the loopback ingestion endpoint.

use crate::domain::models::{BpmPayload, BpmReading};
use axum::{extract::State, routing, Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Shared by every request: where readings go and the sequence counter.
#[derive(Clone)]
pub struct Ingest {
    bpm_tx: broadcast::Sender<BpmReading>,
    sequence: Arc<AtomicU64>,
}

impl Ingest {
    pub fn new(bpm_tx: broadcast::Sender<BpmReading>, sequence: Arc<AtomicU64>) -> Self {
        Self { bpm_tx, sequence }
    }

    /// Stamp a value with the next sequence number and publish it.
    pub fn record(&self, value: i32) -> BpmReading {
        let reading = BpmReading {
            value,
            sequence_number: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };
        if self.bpm_tx.send(reading).is_err() {
            debug!("BPM {} received with no listeners", value);
        }
        reading
    }
}

pub fn router(ingest: Ingest) -> Router {
    Router::new()
        .route("/", routing::get(status).post(ingest_bpm))
        .with_state(ingest)
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

async fn ingest_bpm(
    State(ingest): State<Ingest>,
    Json(payload): Json<BpmPayload>,
) -> Json<BpmPayload> {
    let reading = ingest.record(payload.bpm);
    trace!(
        "Ingested BPM {} (#{})",
        reading.value,
        reading.sequence_number
    );
    Json(payload)
}
