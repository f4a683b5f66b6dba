// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;
use std::path::Path;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::auth::{resolve_identity, OptionalAuth};
use crate::db::{connections, provisioning};
use crate::error::ApiError;
use crate::models::{DeviceAction, EnrollRequest, EnrollResponse};
use crate::objectstore::join_key;
use crate::state::AppState;

/// Write the raw enrollment payload to the local filesystem.
fn store_locally(dir: &Path, filename: &str, body: &[u8]) -> Result<String, ApiError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| ApiError::internal(format!("Cannot write local file: {e}")))?;
    let path = dir.join(filename);
    std::fs::write(&path, body)
        .map_err(|e| ApiError::internal(format!("Cannot write local file: {e}")))?;
    Ok(path.to_string_lossy().into_owned())
}

/// Client source address, as forwarded by the fronting proxy.
fn source_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))?
        .to_str()
        .ok()?;
    forwarded
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Enroll a device/plugin.
///
/// Accepts a JSON payload with `device_name`, `plugin_uuid` and `email`,
/// stores the raw payload to the local filesystem and/or S3 per
/// configuration, and records the enrollment in the database.
///
/// Authentication is optional but recommended for production; the
/// resolved identity feeds the provisioning record and the audit log.
#[utoipa::path(
    post,
    path = "/enroll",
    request_body = EnrollRequest,
    tag = "Enrollment",
    responses(
        (status = 201, description = "Enrollment successful", body = EnrollResponse),
        (status = 400, description = "Invalid request"),
        (status = 413, description = "Payload too large"),
        (status = 500, description = "Server error")
    )
)]
pub async fn enroll(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrollResponse>), ApiError> {
    let settings = &state.settings;

    if body.is_empty() {
        return Err(ApiError::bad_request("Empty body"));
    }
    if body.len() > settings.max_body_bytes() {
        return Err(ApiError::payload_too_large("Body too large"));
    }

    let body_json: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Body is not valid JSON: {e}")))?;
    if !body_json.is_object() {
        return Err(ApiError::bad_request("Body must be a JSON object"));
    }

    let mut request: EnrollRequest = serde_json::from_value(body_json.clone())
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    request.validate().map_err(ApiError::bad_request)?;

    let filename = format!(
        "{}-{}.json",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    );

    let mut stored: BTreeMap<String, String> = BTreeMap::new();

    if settings.store_enroll_locally {
        let path = store_locally(&settings.enroll_dir, &filename, &body)?;
        stored.insert("local".to_string(), path);
    }

    if settings.store_enroll_s3 {
        let objects = state
            .objects
            .as_ref()
            .ok_or_else(|| ApiError::internal("S3 bucket not configured (DM_S3_BUCKET)."))?;
        let key = join_key(&settings.s3_prefix_enroll, &filename);
        let uri = objects
            .put_object(&key, body.to_vec(), "application/json")
            .await
            .map_err(|e| ApiError::internal(format!("Cannot write to S3: {e}")))?;
        stored.insert("s3".to_string(), uri);
    }

    // Database updates are best effort: the payload is already stored, so
    // a failed upsert or audit row must not fail the enrollment.
    if let Some(pool) = &state.db {
        let identity = resolve_identity(user.as_ref(), &headers, Some(&body_json));
        let client_uuid = request.plugin_uuid;
        let email = request.email.as_str();
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Err(e) = provisioning::upsert(
            pool,
            email,
            client_uuid,
            &request.device_name,
            &identity.key_fingerprint,
            "enroll",
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to upsert provisioning record");
        }

        if let Err(e) = connections::log_connection(
            pool,
            DeviceAction::Enroll,
            email,
            client_uuid,
            &identity.key_fingerprint,
            source_ip(&headers).as_deref(),
            user_agent.as_deref(),
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to log enrollment connection");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse { ok: true, stored }),
    ))
}
