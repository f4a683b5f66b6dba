// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request identity resolution.
//!
//! Audit logging needs an identity for every request, however the caller
//! authenticated (or didn't). Each field resolves independently through a
//! fixed precedence chain and always ends in a sentinel, so resolution
//! never fails and has no side effects.

use axum::http::HeaderMap;

use super::claims::AuthenticatedUser;

/// Header carrying the caller's email when no token is presented.
pub const HEADER_USER_EMAIL: &str = "x-user-email";
/// Header carrying the client UUID.
pub const HEADER_CLIENT_UUID: &str = "x-client-uuid";
/// Header carrying the encryption key fingerprint.
pub const HEADER_KEY_FINGERPRINT: &str = "x-encryption-key-fingerprint";

/// Sentinel email for unidentified callers.
pub const UNKNOWN_EMAIL: &str = "unknown@local";
/// Sentinel client UUID for unidentified callers.
pub const NIL_CLIENT_UUID: &str = "00000000-0000-0000-0000-000000000000";
/// Sentinel fingerprint for unidentified callers.
pub const UNKNOWN_FINGERPRINT: &str = "unknown";

/// Normalized identity attached to audit log rows.
///
/// Constructed fresh per request; only its fields are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub email: String,
    pub client_uuid: String,
    pub key_fingerprint: String,
}

/// Resolve the request identity from the available sources.
///
/// Per-field precedence (first non-empty wins):
/// - `email`: authenticated user → `X-User-Email` header → body `email` → sentinel
/// - `client_uuid`: `X-Client-UUID` header → body `client_uuid` → body `plugin_uuid` → nil UUID
/// - `key_fingerprint`: `X-Encryption-Key-Fingerprint` header → body `encryption_key_fingerprint` → `"unknown"`
pub fn resolve_identity(
    user: Option<&AuthenticatedUser>,
    headers: &HeaderMap,
    body: Option<&serde_json::Value>,
) -> RequestIdentity {
    let email = user
        .and_then(|u| u.email.as_deref())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| header_value(headers, HEADER_USER_EMAIL))
        .or_else(|| body_value(body, "email"))
        .unwrap_or_else(|| UNKNOWN_EMAIL.to_string());

    let client_uuid = header_value(headers, HEADER_CLIENT_UUID)
        .or_else(|| body_value(body, "client_uuid"))
        .or_else(|| body_value(body, "plugin_uuid"))
        .unwrap_or_else(|| NIL_CLIENT_UUID.to_string());

    let key_fingerprint = header_value(headers, HEADER_KEY_FINGERPRINT)
        .or_else(|| body_value(body, "encryption_key_fingerprint"))
        .unwrap_or_else(|| UNKNOWN_FINGERPRINT.to_string());

    RequestIdentity {
        email,
        client_uuid,
        key_fingerprint,
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn body_value(body: Option<&serde_json::Value>, field: &str) -> Option<String> {
    body.and_then(|b| b.get(field))
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
