// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Keycloak JWT authentication for the Device Management API.
//!
//! ## Auth Flow
//!
//! 1. Client obtains a token from Keycloak
//! 2. Client sends `Authorization: Bearer <JWT>`
//! 3. This service:
//!    - Fetches Keycloak's JWKS from `<issuer>/protocol/openid-connect/certs`
//!    - Verifies JWT signature, expiry, issuer and (optionally) audience
//!    - Extracts `sub`, email and realm/client roles
//!
//! ## Security
//!
//! - The JWKS is cached whole with a TTL; a key-id miss triggers exactly
//!   one invalidate-and-refetch to absorb key rotation
//! - Verification fails closed: with no issuer configured, endpoints that
//!   require auth reject with a server error rather than accepting tokens
//! - Optional-auth endpoints treat a bad token like no token at all

pub mod claims;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod jwks;
pub mod verifier;

pub use claims::{AuthenticatedUser, TokenClaims};
pub use error::AuthError;
pub use extractor::{Auth, OptionalAuth, RequireAdmin};
pub use identity::{resolve_identity, RequestIdentity};
pub use jwks::KeySetCache;
pub use verifier::TokenVerifier;
