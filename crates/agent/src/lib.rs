//! syncbox-agent: Destination-side replication agent
//!
//! Serves the `/v1/file` wire protocol over HTTP and applies each operation
//! to the destination tree through an [`FsSink`].

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use syncbox_core::ReplicationSink as _;
use syncbox_core::protocol::{CreateFileBody, DeleteFileBody, RenameFileBody, UpdateFileBody};
use syncbox_transport::FsSink;

/// Build the agent router over the given destination sink
pub fn app(sink: FsSink) -> Router {
    Router::new()
        .route("/v1/health/live", get(health_live))
        .route(
            "/v1/file",
            post(create_file)
                .delete(delete_file)
                .patch(rename_file)
                .put(update_file),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(sink))
}

async fn health_live() -> StatusCode {
    StatusCode::OK
}

async fn create_file(
    State(sink): State<Arc<FsSink>>,
    Json(body): Json<CreateFileBody>,
) -> Response {
    match sink.create(&body.path, &body.data, body.is_directory).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => internal_error("creating file", &err),
    }
}

async fn delete_file(
    State(sink): State<Arc<FsSink>>,
    Json(body): Json<DeleteFileBody>,
) -> Response {
    match sink.delete(&body.path).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => internal_error("deleting file", &err),
    }
}

async fn rename_file(
    State(sink): State<Arc<FsSink>>,
    Json(body): Json<RenameFileBody>,
) -> Response {
    match sink.rename(&body.previous_path, &body.path).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => internal_error("renaming file", &err),
    }
}

async fn update_file(
    State(sink): State<Arc<FsSink>>,
    Json(body): Json<UpdateFileBody>,
) -> Response {
    match sink.update(&body.path, &body.data).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => internal_error("updating file contents", &err),
    }
}

fn internal_error(context: &str, err: &color_eyre::Report) -> Response {
    error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"message": "an internal server error occurred"})),
    )
        .into_response()
}
