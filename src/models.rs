// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request, response and database record types used by the REST API. All
//! API-facing types derive `Serialize`/`Deserialize` and `ToSchema` for
//! automatic JSON handling and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Enrollment**: device registration payloads and responses
//! - **Configuration**: profile and device name allowlists
//! - **Records**: provisioning and connection-audit rows (PostgreSQL)
//! - **Health**: dependency check results (RFC 7807 shape)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Provisioning lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProvisioningStatus {
    Pending,
    Enrolled,
    Revoked,
    Failed,
}

/// Device connection action types recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceAction {
    Enroll,
    ConfigGet,
    BinaryGet,
    Healthz,
    Unknown,
}

impl DeviceAction {
    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::Enroll => "ENROLL",
            DeviceAction::ConfigGet => "CONFIG_GET",
            DeviceAction::BinaryGet => "BINARY_GET",
            DeviceAction::Healthz => "HEALTHZ",
            DeviceAction::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Device names accepted by the config endpoint.
pub const DEVICE_ALLOWLIST: &[&str] = &["matisse", "libreoffice", "chrome", "edge", "firefox", "misc"];

/// Configuration profiles accepted by the config endpoint.
pub const PROFILE_ALLOWLIST: &[&str] = &["dev", "prod", "int", "llama", "gptoss"];

// =============================================================================
// Enrollment Models
// =============================================================================

/// Request payload for device enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollRequest {
    /// Device/plugin identifier (e.g. `matisse`, `libreoffice`).
    pub device_name: String,
    /// Unique plugin/client UUID.
    pub plugin_uuid: Uuid,
    /// User email address.
    pub email: String,
    /// Optional encryption key fingerprint for audit.
    #[serde(default)]
    pub encryption_key_fingerprint: Option<String>,
}

impl EnrollRequest {
    /// Validate and normalize the request in place.
    ///
    /// `device_name` is trimmed and lowercased; the email must look like an
    /// address; the fingerprint is length-capped.
    pub fn validate(&mut self) -> Result<(), String> {
        self.device_name = self.device_name.trim().to_lowercase();
        if self.device_name.is_empty() {
            return Err("device_name: cannot be empty".to_string());
        }
        if self.device_name.len() > 100 {
            return Err("device_name: must be at most 100 characters".to_string());
        }

        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
            return Err("email: value is not a valid email address".to_string());
        }
        self.email = email.to_string();

        if let Some(fp) = &self.encryption_key_fingerprint {
            if fp.len() > 500 {
                return Err(
                    "encryption_key_fingerprint: must be at most 500 characters".to_string(),
                );
            }
        }
        Ok(())
    }
}

/// Response for successful enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// Storage locations keyed by backend (`local` path, `s3` URI).
    pub stored: std::collections::BTreeMap<String, String>,
}

// =============================================================================
// Database Records
// =============================================================================

/// Provisioning database record.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ProvisioningRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub device_name: String,
    pub client_uuid: Uuid,
    pub status: String,
    pub encryption_key: String,
    pub comments: Option<String>,
}

/// Device connection audit log record.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DeviceConnectionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub client_uuid: Uuid,
    pub action: String,
    pub encryption_key_fingerprint: String,
    pub connected_at: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

// =============================================================================
// Health Models
// =============================================================================

/// Individual health check status.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckStatus {
    /// `ok`, `error` or `skipped`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            detail: None,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: "skipped".to_string(),
            detail: None,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: Some(detail.into()),
        }
    }
}

/// Health check response (RFC 7807 Problem Details shape).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthzResponse {
    /// Problem type URI.
    pub r#type: String,
    /// Short summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation.
    pub detail: String,
    /// Individual dependency check results.
    pub checks: std::collections::BTreeMap<String, CheckStatus>,
    /// Error messages (empty if healthy).
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> EnrollRequest {
        EnrollRequest {
            device_name: "Matisse".to_string(),
            plugin_uuid: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            encryption_key_fingerprint: None,
        }
    }

    #[test]
    fn validate_normalizes_device_name() {
        let mut req = sample_request();
        req.device_name = "  LibreOffice  ".to_string();
        req.validate().unwrap();
        assert_eq!(req.device_name, "libreoffice");
    }

    #[test]
    fn validate_rejects_blank_device_name() {
        let mut req = sample_request();
        req.device_name = "   ".to_string();
        let err = req.validate().unwrap_err();
        assert!(err.starts_with("device_name"));
    }

    #[test]
    fn validate_rejects_bad_email() {
        for email in ["", "nope", "@example.com", "user@"] {
            let mut req = sample_request();
            req.email = email.to_string();
            assert!(req.validate().is_err(), "should reject {email:?}");
        }
    }

    #[test]
    fn validate_caps_fingerprint_length() {
        let mut req = sample_request();
        req.encryption_key_fingerprint = Some("f".repeat(501));
        assert!(req.validate().is_err());

        req.encryption_key_fingerprint = Some("f".repeat(500));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn device_action_db_representation() {
        assert_eq!(DeviceAction::Enroll.as_str(), "ENROLL");
        assert_eq!(DeviceAction::ConfigGet.to_string(), "CONFIG_GET");
    }

    #[test]
    fn enroll_request_deserializes_without_fingerprint() {
        let req: EnrollRequest = serde_json::from_value(serde_json::json!({
            "device_name": "matisse",
            "plugin_uuid": "b9bdf6ad-3b1f-4f1a-9f07-4f8606c3fe5a",
            "email": "user@example.com"
        }))
        .unwrap();
        assert!(req.encryption_key_fingerprint.is_none());
    }
}
