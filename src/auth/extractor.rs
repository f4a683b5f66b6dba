// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```
//!
//! `OptionalAuth` is for endpoints that serve both authenticated and
//! anonymous callers: a missing token and a bad token both resolve to
//! `None`. Server-side failures (verification unconfigured, JWKS
//! unreachable) still reject — those indicate a broken deployment, not a
//! bad client, and hiding them behind an anonymous identity would mask
//! the defect.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::state::AppState;

use super::claims::AuthenticatedUser;
use super::error::AuthError;

/// Realm role required for device administration endpoints.
pub const ADMIN_ROLE: &str = "admin";

/// Extract the bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Extractor for authenticated users.
///
/// Rejects with 401 (missing/invalid token) or 500 (verification not
/// configured or JWKS unreachable). No token is ever accepted when
/// verification cannot run.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let verifier = state.verifier.as_ref().ok_or(AuthError::NotConfigured)?;
        let claims = verifier.verify(token).await?;
        Ok(Auth(AuthenticatedUser::from_claims(claims)))
    }
}

/// Optional authentication extractor.
///
/// `None` when no token is presented or the presented token fails with a
/// client token error. Deployment defects (`NotConfigured`, `KeyFetch`)
/// are NOT downgraded and reject with a server error.
pub struct OptionalAuth(pub Option<AuthenticatedUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(OptionalAuth(None));
        }

        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(user)) => Ok(OptionalAuth(Some(user))),
            Err(e) if e.is_client_token_error() => {
                tracing::debug!(error = %e, "Invalid token on optional-auth endpoint, treating as anonymous");
                Ok(OptionalAuth(None))
            }
            Err(e) => Err(e),
        }
    }
}

/// Extractor that requires the `admin` realm role.
pub struct RequireAdmin(pub AuthenticatedUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.has_role(ADMIN_ROLE) {
            return Err(AuthError::MissingRole(ADMIN_ROLE.to_string()));
        }

        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sign_hs256, test_state, test_state_with_auth, JwksStub, TEST_SECRET};
    use axum::http::Request;
    use serde_json::json;

    fn parts_with_headers(pairs: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/test");
        for (name, value) in pairs {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn bearer_token_parsing() {
        let parts = parts_with_headers(&[("Authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&parts.headers).unwrap(), "abc.def.ghi");

        let parts = parts_with_headers(&[("Authorization", "Basic dXNlcjpwYXNz")]);
        assert!(matches!(
            bearer_token(&parts.headers),
            Err(AuthError::InvalidAuthHeader)
        ));

        let parts = parts_with_headers(&[("Authorization", "Bearer ")]);
        assert!(matches!(
            bearer_token(&parts.headers),
            Err(AuthError::InvalidAuthHeader)
        ));

        let parts = parts_with_headers(&[]);
        assert!(matches!(
            bearer_token(&parts.headers),
            Err(AuthError::MissingAuthHeader)
        ));
    }

    #[tokio::test]
    async fn auth_requires_auth_header() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_fails_closed_when_unconfigured() {
        // Verification unconfigured: a presented token is a server error,
        // never accepted and never anonymous.
        let state = test_state();
        let mut parts = parts_with_headers(&[("Authorization", "Bearer some.jwt.token")]);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn auth_accepts_valid_token() {
        let stub = JwksStub::oct("hmac-1", TEST_SECRET).await;
        let (state, issuer) = test_state_with_auth(&stub).await;
        let token = sign_hs256(
            "hmac-1",
            &json!({
                "sub": "user_123",
                "email": "user@example.com",
                "realm_access": {"roles": ["admin"]},
                "iss": issuer,
                "exp": future_exp()
            }),
        );
        let auth_value = format!("Bearer {token}");
        let mut parts = parts_with_headers(&[("Authorization", &auth_value)]);

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.subject, "user_123");
        assert!(user.has_role("admin"));
    }

    #[tokio::test]
    async fn optional_auth_returns_none_without_header() {
        let state = test_state();
        let mut parts = parts_with_headers(&[]);

        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn optional_auth_downgrades_unknown_key_to_anonymous() {
        let stub = JwksStub::oct("hmac-1", TEST_SECRET).await;
        let (state, issuer) = test_state_with_auth(&stub).await;
        let token = sign_hs256(
            "some-unknown-kid",
            &json!({"sub": "user_123", "iss": issuer, "exp": future_exp()}),
        );
        let auth_value = format!("Bearer {token}");
        let mut parts = parts_with_headers(&[("Authorization", &auth_value)]);

        let OptionalAuth(user) = OptionalAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn optional_auth_surfaces_unconfigured_verification() {
        let state = test_state();
        let mut parts = parts_with_headers(&[("Authorization", "Bearer some.jwt.token")]);

        let result = OptionalAuth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }

    #[tokio::test]
    async fn require_admin_rejects_non_admin() {
        let stub = JwksStub::oct("hmac-1", TEST_SECRET).await;
        let (state, issuer) = test_state_with_auth(&stub).await;
        let token = sign_hs256(
            "hmac-1",
            &json!({
                "sub": "user_123",
                "realm_access": {"roles": ["user"]},
                "iss": issuer,
                "exp": future_exp()
            }),
        );
        let auth_value = format!("Bearer {token}");
        let mut parts = parts_with_headers(&[("Authorization", &auth_value)]);

        let result = RequireAdmin::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingRole(_))));
    }

    #[tokio::test]
    async fn require_admin_accepts_admin() {
        let stub = JwksStub::oct("hmac-1", TEST_SECRET).await;
        let (state, issuer) = test_state_with_auth(&stub).await;
        let token = sign_hs256(
            "hmac-1",
            &json!({
                "sub": "user_123",
                "realm_access": {"roles": ["admin"]},
                "iss": issuer,
                "exp": future_exp()
            }),
        );
        let auth_value = format!("Bearer {token}");
        let mut parts = parts_with_headers(&[("Authorization", &auth_value)]);

        let RequireAdmin(user) = RequireAdmin::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.subject, "user_123");
    }
}
