// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # PostgreSQL Access
//!
//! Connection pool construction plus the two repositories backing the
//! API: provisioning records and the device connection audit log.
//!
//! The pool is created lazily so the service starts (degraded) when the
//! database is down; `/healthz` reports connectivity. Schema creation and
//! migration are deployment concerns and are not handled here.

pub mod connections;
pub mod provisioning;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

use crate::config::DatabaseSettings;

/// Build a lazy connection pool from `PSQL_*` settings.
///
/// Returns `None` when the settings are incomplete; callers then skip all
/// database work.
pub fn connect(settings: &DatabaseSettings) -> Option<PgPool> {
    if !settings.is_configured() {
        return None;
    }

    let mut options = PgConnectOptions::new()
        .host(settings.host.as_deref()?)
        .port(settings.port)
        .database(settings.database.as_deref()?)
        .username(settings.user.as_deref()?);
    if let Some(password) = settings.password.as_deref() {
        options = options.password(password);
    }

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy_with(options);

    Some(pool)
}

/// Verify database connectivity with a trivial query.
pub async fn check_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
