// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token verification against the issuer's published keys.
//!
//! Verification is a single pass per call: parse the header for the key
//! id, locate the key in the cached set, then verify signature and claims
//! in one decode. A key-id miss triggers exactly one cache invalidation
//! and refetch before failing — the only retry in the system, covering the
//! window where the issuer rotated keys after the cache was populated.

use std::sync::Arc;

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};

use crate::config::AuthSettings;

use super::claims::TokenClaims;
use super::error::AuthError;
use super::jwks::KeySetCache;

/// Verifies bearer tokens using the issuer's JWKS.
#[derive(Clone)]
pub struct TokenVerifier {
    cache: Arc<KeySetCache>,
    issuer_url: String,
    client_id: String,
    algorithms: Vec<Algorithm>,
    verify_exp: bool,
    verify_aud: bool,
    leeway_seconds: u64,
}

impl TokenVerifier {
    /// Build a verifier from settings.
    ///
    /// Returns `None` when no issuer URL is configured; callers then fail
    /// closed with [`AuthError::NotConfigured`] instead of accepting tokens.
    pub fn from_settings(settings: &AuthSettings) -> Option<Self> {
        let issuer_url = settings.issuer_url.clone()?;
        let jwks_url = settings.jwks_url()?;

        let algorithms = settings
            .algorithms
            .iter()
            .filter_map(|name| name.parse::<Algorithm>().ok())
            .collect::<Vec<_>>();

        let cache = KeySetCache::new(jwks_url)
            .with_cache_ttl(std::time::Duration::from_secs(settings.jwks_cache_ttl_seconds));

        Some(Self {
            cache: Arc::new(cache),
            issuer_url,
            client_id: settings.client_id.clone(),
            algorithms,
            verify_exp: settings.verify_exp,
            verify_aud: settings.verify_aud,
            leeway_seconds: settings.leeway_seconds,
        })
    }

    /// Access the underlying key set cache (health checks).
    pub fn key_set_cache(&self) -> &KeySetCache {
        &self.cache
    }

    /// Verify a bearer token and return its claims.
    pub async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        let kid = header.kid.as_deref();

        // Locate the signing key; on a miss, invalidate and refetch once to
        // tolerate key rotation between cache population and token issuance.
        let jwk = match self.lookup_key(kid).await? {
            Some(jwk) => jwk,
            None => {
                self.cache.invalidate().await;
                match self.lookup_key(kid).await? {
                    Some(jwk) => jwk,
                    None => return Err(AuthError::UnknownKey),
                }
            }
        };

        let (decoding_key, algorithm) = decoding_key_for(&jwk)?;
        if !self.algorithms.contains(&algorithm) {
            return Err(AuthError::Signature(format!(
                "algorithm {algorithm:?} is not in the configured allowlist"
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.leeway_seconds;
        // `exp` is checked when present; its absence is not an error.
        validation.required_spec_claims.clear();
        validation.validate_exp = self.verify_exp;
        validation.set_issuer(&[&self.issuer_url]);
        if self.verify_aud {
            validation.set_audience(&[&self.client_id]);
        } else {
            validation.validate_aud = false;
        }

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AuthError::Signature("signature verification failed".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => {
                    AuthError::Claims("issuer mismatch".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidAudience => {
                    AuthError::Claims("audience mismatch".to_string())
                }
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => {
                    AuthError::Claims("token is not yet valid".to_string())
                }
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::Claims(format!("missing required claim: {claim}"))
                }
                _ => AuthError::MalformedToken,
            })?;

        Ok(token_data.claims)
    }

    /// Look up the key matching `kid` in the current key set.
    ///
    /// Mirrors the JWKS contract: a token without a `kid` only matches a
    /// published key that also has none.
    async fn lookup_key(&self, kid: Option<&str>) -> Result<Option<Jwk>, AuthError> {
        let keys = self.cache.get_keys().await?;
        Ok(keys
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == kid)
            .cloned())
    }
}

/// Convert a JWK into a decoding key and its signing algorithm.
fn decoding_key_for(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), AuthError> {
    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| AuthError::Signature(format!("unusable JWK: {e}")))?;

    let algorithm = match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => match jwk.common.key_algorithm {
            Some(KeyAlgorithm::RS384) => Algorithm::RS384,
            Some(KeyAlgorithm::RS512) => Algorithm::RS512,
            Some(KeyAlgorithm::PS256) => Algorithm::PS256,
            Some(KeyAlgorithm::PS384) => Algorithm::PS384,
            Some(KeyAlgorithm::PS512) => Algorithm::PS512,
            _ => Algorithm::RS256,
        },
        AlgorithmParameters::EllipticCurve(_) => match jwk.common.key_algorithm {
            Some(KeyAlgorithm::ES384) => Algorithm::ES384,
            _ => Algorithm::ES256,
        },
        AlgorithmParameters::OctetKey(_) => match jwk.common.key_algorithm {
            Some(KeyAlgorithm::HS384) => Algorithm::HS384,
            Some(KeyAlgorithm::HS512) => Algorithm::HS512,
            _ => Algorithm::HS256,
        },
        _ => {
            return Err(AuthError::Signature(
                "unsupported key type in JWKS".to_string(),
            ))
        }
    };

    Ok((key, algorithm))
}
