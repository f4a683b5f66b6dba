// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Binary files endpoint.
//!
//! Serves binaries from S3, either as a 302 redirect to a time-limited
//! presigned URL (`presign` mode, the default) or streamed through the
//! API so clients never see the bucket (`proxy` mode).

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::db::connections;
use crate::error::ApiError;
use crate::models::DeviceAction;
use crate::objectstore::join_key;
use crate::state::AppState;

/// Log binary access (best effort).
async fn log_binary_access(state: &AppState, mode: &str) {
    if let Some(pool) = &state.db {
        if let Err(e) = connections::log_connection(
            pool,
            DeviceAction::BinaryGet,
            "system@local",
            Uuid::nil(),
            "none",
            None,
            None,
        )
        .await
        {
            tracing::warn!(error = %e, mode, "Failed to log binary access");
        }
    }
}

/// Get a binary file from S3.
///
/// Behavior depends on `DM_BINARIES_MODE`:
/// - `presign`: 302 redirect to a time-limited presigned S3 URL
/// - `proxy`: the object is streamed through the API
#[utoipa::path(
    get,
    path = "/binaries/{path}",
    params(
        ("path" = String, Path, description = "Binary path below the binaries prefix")
    ),
    tag = "Binaries",
    responses(
        (status = 302, description = "Redirect to presigned S3 URL (presign mode)"),
        (status = 200, description = "Binary file stream (proxy mode)"),
        (status = 404, description = "Binary not found"),
        (status = 500, description = "Server configuration error")
    )
)]
pub async fn get_binary(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    let objects = state
        .objects
        .as_ref()
        .ok_or_else(|| ApiError::internal("S3 bucket not configured (DM_S3_BUCKET)."))?;

    let key = join_key(&settings.s3_prefix_binaries, &path);

    match settings.binaries_mode.as_str() {
        "presign" => {
            let url = objects
                .presign_get(&key, Duration::from_secs(settings.presign_ttl_seconds))
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, key, "Failed to presign binary URL");
                    ApiError::not_found(format!("Binary not found or cannot presign: {e}"))
                })?;

            log_binary_access(&state, "presign").await;
            Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
        }
        "proxy" => {
            let output = objects.get_object(&key).await.map_err(|e| {
                tracing::error!(error = %e, key, "Failed to get binary object");
                ApiError::not_found(format!("Binary not found: {e}"))
            })?;

            let content_type = output
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();

            log_binary_access(&state, "proxy").await;

            let stream = ReaderStream::new(output.body.into_async_read());
            Ok((
                [(header::CONTENT_TYPE, content_type)],
                Body::from_stream(stream),
            )
                .into_response())
        }
        _ => Err(ApiError::internal(
            "Invalid DM_BINARIES_MODE (must be 'presign' or 'proxy').",
        )),
    }
}
