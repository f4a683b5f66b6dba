// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::RequireAdmin;
use crate::db::connections;
use crate::error::ApiError;
use crate::models::DeviceConnectionRecord;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConnectionsQuery {
    /// Maximum number of records to return (1..=100).
    pub limit: Option<i64>,
}

/// List the most recent connection events for a device.
///
/// Requires the `admin` realm role.
#[utoipa::path(
    get,
    path = "/devices/{client_uuid}/connections",
    params(
        ("client_uuid" = Uuid, Path, description = "Device/client UUID"),
        ConnectionsQuery
    ),
    tag = "Devices",
    responses(
        (status = 200, description = "Connection events, newest first", body = [DeviceConnectionRecord]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing admin role"),
        (status = 503, description = "Database unavailable")
    )
)]
pub async fn list_connections(
    RequireAdmin(user): RequireAdmin,
    Path(client_uuid): Path<Uuid>,
    Query(query): Query<ConnectionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceConnectionRecord>>, ApiError> {
    let pool = state.db.as_ref().ok_or_else(|| {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Database is not configured")
    })?;

    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let records = connections::last_connections(pool, client_uuid, limit)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, %client_uuid, "Failed to query device connections");
            ApiError::internal("Failed to query device connections")
        })?;

    tracing::debug!(
        admin = %user.subject,
        %client_uuid,
        count = records.len(),
        "Device connections listed"
    );

    Ok(Json(records))
}
