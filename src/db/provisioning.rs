// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository for provisioning records.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ProvisioningRecord;

/// Insert or update a provisioning record (idempotent enrollment).
///
/// A fresh insert lands with status `ENROLLED`. On conflict the existing
/// row is updated only while its status is still `PENDING` or `ENROLLED` —
/// a revoked or failed provisioning is never silently resurrected.
///
/// Returns whether a row was written.
pub async fn upsert(
    pool: &PgPool,
    email: &str,
    client_uuid: Uuid,
    device_name: &str,
    encryption_key: &str,
    comments: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO provisioning (
            email, device_name, client_uuid, status, encryption_key, comments
        ) VALUES ($1, $2, $3, 'ENROLLED', $4, $5)
        ON CONFLICT (client_uuid) DO UPDATE
        SET email = EXCLUDED.email,
            device_name = EXCLUDED.device_name,
            status = 'ENROLLED',
            encryption_key = EXCLUDED.encryption_key,
            updated_at = now()
        WHERE provisioning.status IN ('PENDING', 'ENROLLED')
        "#,
    )
    .bind(email)
    .bind(device_name)
    .bind(client_uuid)
    .bind(encryption_key)
    .bind(comments)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Get the latest active provisioning record for a client UUID.
pub async fn get_by_client_uuid(
    pool: &PgPool,
    client_uuid: Uuid,
) -> Result<Option<ProvisioningRecord>, sqlx::Error> {
    sqlx::query_as::<_, ProvisioningRecord>(
        r#"
        SELECT id, created_at, updated_at, email, device_name,
               client_uuid, status, encryption_key, comments
        FROM provisioning
        WHERE client_uuid = $1
          AND status IN ('PENDING', 'ENROLLED')
        ORDER BY updated_at DESC
        LIMIT 1
        "#,
    )
    .bind(client_uuid)
    .fetch_optional(pool)
    .await
}

/// Revoke a provisioning (set status to `REVOKED`).
///
/// Returns whether a record was revoked.
pub async fn revoke(pool: &PgPool, client_uuid: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE provisioning
        SET status = 'REVOKED', updated_at = now()
        WHERE client_uuid = $1
          AND status IN ('PENDING', 'ENROLLED')
        "#,
    )
    .bind(client_uuid)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
