// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! The verifier returns a closed enumeration of failure kinds so callers
//! can pattern-match instead of inspecting exception classes or strings.
//! Client token errors map to 401, missing roles to 403, and anything that
//! indicates a broken deployment (no issuer configured, JWKS unreachable)
//! to 500 — a token is never accepted because verification could not run.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present.
    #[error("Not authenticated")]
    MissingAuthHeader,
    /// Invalid authorization header format.
    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,
    /// JWT verification is not configured (issuer URL missing).
    #[error("JWT validation not configured (KEYCLOAK_ISSUER_URL missing)")]
    NotConfigured,
    /// JWKS could not be fetched from the identity provider.
    #[error("Failed to fetch JWKS: {0}")]
    KeyFetch(String),
    /// Token cannot be structurally parsed.
    #[error("Invalid token: malformed")]
    MalformedToken,
    /// No key in the JWKS matches the token's key id, even after refresh.
    #[error("Unable to find appropriate key")]
    UnknownKey,
    /// Token signature is invalid or the algorithm is not allowed.
    #[error("Invalid token signature: {0}")]
    Signature(String),
    /// Token has expired.
    #[error("Token has expired")]
    Expired,
    /// Token claims failed verification (issuer, audience, required claims).
    #[error("Invalid token claims: {0}")]
    Claims(String),
    /// Authenticated but missing a required realm role.
    #[error("Missing required role: {0}")]
    MissingRole(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::NotConfigured => "auth_not_configured",
            AuthError::KeyFetch(_) => "jwks_fetch_error",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownKey => "unknown_key",
            AuthError::Signature(_) => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::Claims(_) => "invalid_claims",
            AuthError::MissingRole(_) => "missing_role",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::UnknownKey
            | AuthError::Signature(_)
            | AuthError::Expired
            | AuthError::Claims(_) => StatusCode::UNAUTHORIZED,
            AuthError::MissingRole(_) => StatusCode::FORBIDDEN,
            AuthError::NotConfigured | AuthError::KeyFetch(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the failure is attributable to the presented token, as
    /// opposed to the deployment. Only these are downgraded to anonymous
    /// on optional-auth endpoints.
    pub fn is_client_token_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidAuthHeader
                | AuthError::MalformedToken
                | AuthError::UnknownKey
                | AuthError::Signature(_)
                | AuthError::Expired
                | AuthError::Claims(_)
        )
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}
