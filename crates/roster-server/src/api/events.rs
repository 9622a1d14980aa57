//! `POST /events/object-created`: upload notifications that trigger ingest

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::pipeline::ObjectCreatedEvent;

/// Outcome of one object named by the event
#[derive(Debug, Serialize)]
pub struct ObjectSummary {
    pub bucket: String,
    pub key: String,
    pub stored: usize,
    pub queued: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub objects: Vec<ObjectSummary>,
}

/// Ingest every object in the event and report per-object counts.
///
/// Object failures are reported in the body; only an undecodable event is
/// rejected.
pub async fn object_created(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let event: ObjectCreatedEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Malformed object-created event");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Malformed event: {}", e) })),
            )
                .into_response();
        }
    };

    let objects = state
        .ingestor
        .ingest_event(&event)
        .await
        .into_iter()
        .map(|(object, result)| match result {
            Ok(report) => ObjectSummary {
                bucket: object.bucket,
                key: object.key,
                stored: report.stored(),
                queued: report.queued(),
                failed: report.failed(),
                error: None,
            },
            Err(e) => ObjectSummary {
                bucket: object.bucket,
                key: object.key,
                stored: 0,
                queued: 0,
                failed: 0,
                error: Some(e.to_string()),
            },
        })
        .collect();

    (StatusCode::ACCEPTED, Json(EventSummary { objects })).into_response()
}
