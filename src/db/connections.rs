// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository for the device connection audit log.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DeviceAction, DeviceConnectionRecord};

/// Append a device connection event.
///
/// `HEALTHZ` probes are deliberately not persisted; they would drown the
/// log without telling anyone anything.
pub async fn log_connection(
    pool: &PgPool,
    action: DeviceAction,
    email: &str,
    client_uuid: Uuid,
    encryption_key_fingerprint: &str,
    source_ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    if matches!(action, DeviceAction::Healthz) {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO device_connections (
            email, client_uuid, action, encryption_key_fingerprint,
            connected_at, source_ip, user_agent
        ) VALUES ($1, $2, $3, $4, now(), $5, $6)
        "#,
    )
    .bind(email)
    .bind(client_uuid)
    .bind(action.as_str())
    .bind(encryption_key_fingerprint)
    .bind(source_ip)
    .bind(user_agent)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the last `limit` connection events for a client UUID, newest first.
pub async fn last_connections(
    pool: &PgPool,
    client_uuid: Uuid,
    limit: i64,
) -> Result<Vec<DeviceConnectionRecord>, sqlx::Error> {
    sqlx::query_as::<_, DeviceConnectionRecord>(
        r#"
        SELECT id, created_at, email, client_uuid, action,
               encryption_key_fingerprint, connected_at,
               disconnected_at, source_ip, user_agent
        FROM device_connections
        WHERE client_uuid = $1
        ORDER BY connected_at DESC
        LIMIT $2
        "#,
    )
    .bind(client_uuid)
    .bind(limit)
    .fetch_all(pool)
    .await
}
