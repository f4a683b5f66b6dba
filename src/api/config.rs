// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Configuration endpoint.
//!
//! Serves dynamic configuration JSON for devices/plugins. Templates live
//! under the configured config directory and support environment variable
//! placeholders: `${{VARNAME}}` (preferred) and `${VARNAME}` (legacy).

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use axum::{
    extract::{Path as UrlPath, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::db::connections;
use crate::error::ApiError;
use crate::models::{DeviceAction, DEVICE_ALLOWLIST, PROFILE_ALLOWLIST};
use crate::state::AppState;

static TEMPLATE_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\{([A-Z0-9_]+)\}\}|\$\{([A-Z0-9_]+)\}").expect("template placeholder regex")
});

/// Load a config template JSON from the config directory.
///
/// Resolution order (device-specific first when provided):
/// - `<device>/config.<profile>.json`
/// - `<device>/config.json`
/// - `config.<profile>.json`
/// - `config.json`
fn load_config_template(
    base: &Path,
    profile: &str,
    device: Option<&str>,
) -> Result<serde_json::Value, ApiError> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(device) = device {
        candidates.push(base.join(device).join(format!("config.{profile}.json")));
        candidates.push(base.join(device).join("config.json"));
    }
    candidates.push(base.join(format!("config.{profile}.json")));
    candidates.push(base.join("config.json"));

    for path in &candidates {
        if path.is_file() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ApiError::internal(format!("Cannot read config template: {e}")))?;
            return serde_json::from_str(&raw)
                .map_err(|e| ApiError::internal(format!("Config template is not valid JSON: {e}")));
        }
    }

    Err(ApiError::internal(
        "No config template found in config directory (expected config.json)",
    ))
}

/// Replace environment variable placeholders in a string.
///
/// Missing variables are replaced with an empty string.
fn substitute_env_in_str(value: &str) -> String {
    TEMPLATE_VAR_RE
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let var = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(var).unwrap_or_default()
        })
        .into_owned()
}

/// Recursively substitute environment variables in any string values.
fn substitute_env(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute_env(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(substitute_env).collect())
        }
        serde_json::Value::String(s) => serde_json::Value::String(substitute_env_in_str(&s)),
        other => other,
    }
}

fn allowlist_error(field: &str, allowlist: &[&str]) -> ApiError {
    let mut values: Vec<&str> = allowlist.to_vec();
    values.sort_unstable();
    ApiError::bad_request(format!("{field} must be one of: {}", values.join(", ")))
}

async fn config_response(
    state: &AppState,
    profile: Option<&str>,
    device: Option<&str>,
) -> Result<axum::response::Response, ApiError> {
    let settings = &state.settings;

    let profile = profile
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| settings.config_profile.trim().to_lowercase());
    if !PROFILE_ALLOWLIST.contains(&profile.as_str()) {
        return Err(allowlist_error("profile", PROFILE_ALLOWLIST));
    }

    let device = device.map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty());
    if let Some(device) = &device {
        if !DEVICE_ALLOWLIST.contains(&device.as_str()) {
            return Err(allowlist_error("device", DEVICE_ALLOWLIST));
        }
    }

    let template = load_config_template(&settings.config_dir, &profile, device.as_deref())?;
    let mut config = substitute_env(template);
    if let Some(map) = config.as_object_mut() {
        map.insert(
            "enabled".to_string(),
            serde_json::Value::Bool(settings.config_enabled),
        );
    }

    // Access logging is best effort.
    if let Some(pool) = &state.db {
        if let Err(e) = connections::log_connection(
            pool,
            DeviceAction::ConfigGet,
            "system@local",
            Uuid::nil(),
            "none",
            None,
            None,
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to log config access");
        }
    }

    Ok(([(header::CACHE_CONTROL, "no-store")], Json(config)).into_response())
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConfigQuery {
    /// Configuration profile (dev, prod, int, llama, gptoss).
    pub profile: Option<String>,
    /// Device name for device-specific config.
    pub device: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProfileQuery {
    /// Configuration profile (dev, prod, int, llama, gptoss).
    pub profile: Option<String>,
}

/// Get configuration JSON.
///
/// The template is resolved from the config directory, environment
/// placeholders are substituted, and the `enabled` flag is injected.
#[utoipa::path(
    get,
    path = "/config/config.json",
    params(ConfigQuery),
    tag = "Configuration",
    responses(
        (status = 200, description = "Configuration JSON"),
        (status = 400, description = "Unknown profile or device"),
        (status = 500, description = "No config template found")
    )
)]
pub async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> Result<axum::response::Response, ApiError> {
    config_response(&state, query.profile.as_deref(), query.device.as_deref()).await
}

/// Get device-specific configuration with fallback to the default.
#[utoipa::path(
    get,
    path = "/config/{device}/config.json",
    params(
        ("device" = String, Path, description = "Device name"),
        ProfileQuery
    ),
    tag = "Configuration",
    responses(
        (status = 200, description = "Device-specific configuration JSON"),
        (status = 400, description = "Unknown profile or device"),
        (status = 500, description = "No config template found")
    )
)]
pub async fn get_device_config(
    UrlPath(device): UrlPath<String>,
    State(state): State<AppState>,
    Query(query): Query<ProfileQuery>,
) -> Result<axum::response::Response, ApiError> {
    config_response(&state, query.profile.as_deref(), Some(&device)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::testing::test_settings;
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    fn write_template(dir: &Path, relative: &str, content: &serde_json::Value) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content.to_string()).unwrap();
    }

    fn state_with_config_dir(dir: &Path) -> AppState {
        let mut settings = test_settings();
        settings.config_dir = dir.to_path_buf();
        AppState::new(settings)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn template_resolution_prefers_device_and_profile() {
        let dir = TempDir::new().unwrap();
        write_template(dir.path(), "config.json", &serde_json::json!({"source": "base"}));
        write_template(
            dir.path(),
            "config.dev.json",
            &serde_json::json!({"source": "base-dev"}),
        );
        write_template(
            dir.path(),
            "matisse/config.json",
            &serde_json::json!({"source": "device"}),
        );
        write_template(
            dir.path(),
            "matisse/config.dev.json",
            &serde_json::json!({"source": "device-dev"}),
        );

        let load = |profile: &str, device: Option<&str>| {
            load_config_template(dir.path(), profile, device).unwrap()["source"]
                .as_str()
                .unwrap()
                .to_string()
        };

        assert_eq!(load("dev", Some("matisse")), "device-dev");
        assert_eq!(load("prod", Some("matisse")), "device");
        assert_eq!(load("dev", None), "base-dev");
        assert_eq!(load("prod", None), "base");
    }

    #[test]
    fn missing_template_is_a_server_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config_template(dir.path(), "prod", None).unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn substitution_handles_both_syntaxes_and_missing_vars() {
        std::env::set_var("DM_TEST_SUBST_VAR", "resolved");

        assert_eq!(
            substitute_env_in_str("a=${{DM_TEST_SUBST_VAR}} b=${DM_TEST_SUBST_VAR}"),
            "a=resolved b=resolved"
        );
        assert_eq!(
            substitute_env_in_str("gone=${{DM_TEST_SUBST_MISSING}}!"),
            "gone=!"
        );
        assert_eq!(substitute_env_in_str("no placeholders"), "no placeholders");
    }

    #[test]
    fn substitution_recurses_into_nested_values() {
        std::env::set_var("DM_TEST_SUBST_NESTED", "inner");
        let value = serde_json::json!({
            "top": "${{DM_TEST_SUBST_NESTED}}",
            "list": ["${DM_TEST_SUBST_NESTED}", 42, {"deep": "${{DM_TEST_SUBST_NESTED}}"}],
            "untouched": true
        });

        let result = substitute_env(value);
        assert_eq!(result["top"], "inner");
        assert_eq!(result["list"][0], "inner");
        assert_eq!(result["list"][1], 42);
        assert_eq!(result["list"][2]["deep"], "inner");
        assert_eq!(result["untouched"], true);
    }

    #[tokio::test]
    async fn unknown_profile_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state_with_config_dir(dir.path());

        let err = config_response(&state, Some("staging"), None)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("profile must be one of"));
    }

    #[tokio::test]
    async fn unknown_device_is_rejected() {
        let dir = TempDir::new().unwrap();
        let state = state_with_config_dir(dir.path());

        let err = config_response(&state, None, Some("toaster")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("device must be one of"));
    }

    #[tokio::test]
    async fn served_config_injects_enabled_and_no_store() {
        let dir = TempDir::new().unwrap();
        write_template(
            dir.path(),
            "config.prod.json",
            &serde_json::json!({"update_url": "https://updates.example.com"}),
        );
        let state = state_with_config_dir(dir.path());

        let response = config_response(&state, None, None).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );

        let body = body_json(response).await;
        assert_eq!(body["enabled"], true);
        assert_eq!(body["update_url"], "https://updates.example.com");
    }

    #[tokio::test]
    async fn device_casing_and_whitespace_are_normalized() {
        let dir = TempDir::new().unwrap();
        write_template(
            dir.path(),
            "matisse/config.json",
            &serde_json::json!({"source": "device"}),
        );
        write_template(dir.path(), "config.json", &serde_json::json!({"source": "base"}));
        let state = state_with_config_dir(dir.path());

        let response = config_response(&state, None, Some("  Matisse ")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["source"], "device");
    }
}
