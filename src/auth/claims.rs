// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Claims extracted from a Keycloak JWT.
///
/// Well-known OIDC and Keycloak claims get typed fields; anything else the
/// issuer adds lands in `extra` so issuer-specific claims stay inspectable
/// without giving up type safety on the common path.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID).
    #[serde(default)]
    pub sub: String,

    /// User email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the email address has been verified by the issuer.
    #[serde(default)]
    pub email_verified: bool,

    /// Preferred username.
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Given name.
    #[serde(default)]
    pub given_name: Option<String>,

    /// Family name.
    #[serde(default)]
    pub family_name: Option<String>,

    /// Realm-wide role grants.
    #[serde(default)]
    pub realm_access: Option<RoleAccess>,

    /// Per-client role grants, keyed by client id.
    #[serde(default)]
    pub resource_access: HashMap<String, RoleAccess>,

    /// OAuth scope string.
    #[serde(default)]
    pub scope: String,

    /// Expiration timestamp (seconds since epoch).
    #[serde(default)]
    pub exp: Option<i64>,

    /// Issued-at timestamp (seconds since epoch).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Unrecognized issuer-specific claims.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A set of role grants (`realm_access` / `resource_access.<client>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Authenticated user information derived from verified claims.
///
/// Immutable once constructed; this is the type handlers see.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim).
    pub subject: String,
    /// User email, if the token carries one.
    pub email: Option<String>,
    /// Whether the email has been verified by the issuer.
    pub email_verified: bool,
    /// Realm-wide roles.
    pub realm_roles: HashSet<String>,
    /// Per-client roles as `<client>:<role>`.
    pub client_roles: HashSet<String>,
    /// OAuth scope string.
    pub scope: String,
    /// Token expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Token issue time.
    pub issued_at: Option<DateTime<Utc>>,
}

impl AuthenticatedUser {
    /// Create from verified claims.
    pub fn from_claims(claims: TokenClaims) -> Self {
        let realm_roles = claims
            .realm_access
            .map(|a| a.roles.into_iter().collect())
            .unwrap_or_default();

        let client_roles = claims
            .resource_access
            .into_iter()
            .flat_map(|(client, access)| {
                access
                    .roles
                    .into_iter()
                    .map(move |role| format!("{client}:{role}"))
            })
            .collect();

        Self {
            subject: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified,
            realm_roles,
            client_roles,
            scope: claims.scope,
            expires_at: claims.exp.and_then(|ts| DateTime::from_timestamp(ts, 0)),
            issued_at: claims.iat.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }

    /// Check if the user has a specific realm role.
    pub fn has_role(&self, role: &str) -> bool {
        self.realm_roles.contains(role)
    }

    /// Check if the user has a specific client role.
    pub fn has_client_role(&self, client: &str, role: &str) -> bool {
        self.client_roles.contains(&format!("{client}:{role}"))
    }
}
