// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;
use std::path::Path;

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::db;
use crate::models::{CheckStatus, HealthzResponse};
use crate::state::AppState;

/// Problem type URI for dependency check results.
const PROBLEM_TYPE: &str = "https://example.com/problems/dependency-check";

/// Probe that the enrollment directory is writable.
fn check_local_storage(dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let probe = dir.join(".write_test");
    std::fs::write(&probe, b"ok").map_err(|e| e.to_string())?;
    std::fs::remove_file(&probe).map_err(|e| e.to_string())?;
    Ok(())
}

/// Health check endpoint handler.
///
/// Checks connectivity to all dependencies (local storage, S3, database)
/// and reports per-check results in RFC 7807 Problem Details shape.
/// Always returns 200 so monitoring can observe degraded states.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Health",
    responses(
        (status = 200, description = "Health check results", body = HealthzResponse)
    )
)]
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let settings = &state.settings;
    let mut checks: BTreeMap<String, CheckStatus> = BTreeMap::new();
    let mut errors: Vec<String> = Vec::new();

    // Local storage
    if settings.store_enroll_locally {
        match check_local_storage(&settings.enroll_dir) {
            Ok(()) => {
                checks.insert("local_storage".to_string(), CheckStatus::ok());
            }
            Err(detail) => {
                errors.push(format!("Local enroll_dir not writable: {detail}"));
                checks.insert("local_storage".to_string(), CheckStatus::error(detail));
            }
        }
    } else {
        checks.insert("local_storage".to_string(), CheckStatus::skipped());
    }

    // S3
    let s3_required = settings.store_enroll_s3
        || matches!(settings.binaries_mode.as_str(), "presign" | "proxy");
    match &state.objects {
        Some(store) => match store.head_bucket().await {
            Ok(()) => {
                checks.insert("s3".to_string(), CheckStatus::ok());
            }
            Err(e) => {
                errors.push(format!("S3 not reachable or unauthorized: {e}"));
                checks.insert("s3".to_string(), CheckStatus::error(e.to_string()));
            }
        },
        None if s3_required => {
            errors.push("S3 bucket is not configured (DM_S3_BUCKET missing).".to_string());
            checks.insert("s3".to_string(), CheckStatus::error("bucket missing"));
        }
        None => {
            checks.insert("s3".to_string(), CheckStatus::skipped());
        }
    }

    // Database
    match &state.db {
        Some(pool) => match db::check_connection(pool).await {
            Ok(()) => {
                checks.insert("db".to_string(), CheckStatus::ok());
            }
            Err(e) => {
                errors.push(format!("DB not reachable or unauthorized: {e}"));
                checks.insert("db".to_string(), CheckStatus::error(e.to_string()));
            }
        },
        None => {
            errors.push("Database is not configured; cannot verify DB connection.".to_string());
            checks.insert("db".to_string(), CheckStatus::error("database not configured"));
        }
    }

    let healthy = errors.is_empty();
    let body = HealthzResponse {
        r#type: PROBLEM_TYPE.to_string(),
        title: if healthy {
            "OK".to_string()
        } else {
            "Dependency check failed".to_string()
        },
        status: 200,
        detail: if healthy {
            "All dependencies are healthy.".to_string()
        } else {
            "One or more dependencies are not healthy.".to_string()
        },
        checks,
        errors,
    };

    (
        [(header::CONTENT_TYPE, "application/problem+json")],
        Json(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_settings, test_state};
    use crate::state::AppState;
    use axum::body::to_bytes;
    use tempfile::TempDir;

    async fn response_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_always_returns_200_problem_json() {
        let response = healthz(State(test_state())).await.into_response();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn unconfigured_dependencies_are_reported() {
        // Default test settings: no local storage, presign mode without a
        // bucket, no database.
        let body = response_body(healthz(State(test_state())).await.into_response()).await;

        assert_eq!(body["title"], "Dependency check failed");
        assert_eq!(body["checks"]["local_storage"]["status"], "skipped");
        assert_eq!(body["checks"]["s3"]["status"], "error");
        assert_eq!(body["checks"]["db"]["status"], "error");
        assert!(!body["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn writable_enroll_dir_checks_ok() {
        let dir = TempDir::new().unwrap();
        let mut settings = test_settings();
        settings.store_enroll_locally = true;
        settings.enroll_dir = dir.path().to_path_buf();

        let body =
            response_body(healthz(State(AppState::new(settings))).await.into_response()).await;
        assert_eq!(body["checks"]["local_storage"]["status"], "ok");
    }

    #[tokio::test]
    async fn unwritable_enroll_dir_checks_error() {
        let mut settings = test_settings();
        settings.store_enroll_locally = true;
        settings.enroll_dir = std::path::PathBuf::from("/proc/no-such-dir/enroll");

        let body =
            response_body(healthz(State(AppState::new(settings))).await.into_response()).await;
        assert_eq!(body["checks"]["local_storage"]["status"], "error");
        assert!(body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .any(|e| e.as_str().unwrap().contains("enroll_dir")));
    }

    #[tokio::test]
    async fn s3_skipped_when_not_required() {
        let mut settings = test_settings();
        settings.binaries_mode = "disabled".to_string();
        settings.store_enroll_s3 = false;

        let body =
            response_body(healthz(State(AppState::new(settings))).await.into_response()).await;
        assert_eq!(body["checks"]["s3"]["status"], "skipped");
    }
}
