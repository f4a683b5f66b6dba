// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! All configuration is read from the environment once at startup into a
//! single [`Settings`] value stored in `AppState`. Nothing else in the
//! codebase reads environment variables, with one deliberate exception:
//! config template substitution (`${{VAR}}` placeholders), where reading
//! the process environment at request time is the feature itself.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `DM_PORT` (fallback `PORT`) | Server bind port | `8000` |
//! | `DM_ALLOW_ORIGINS` | CSV list of CORS origins | `*` |
//! | `DM_MAX_BODY_SIZE_MB` | Enrollment body size cap | `10` |
//! | `DM_CONFIG_ENABLED` | `enabled` flag injected into served config | `true` |
//! | `DM_CONFIG_PROFILE` | Default configuration profile | `prod` |
//! | `DM_CONFIG_DIR` | Root directory for config templates | `./config` |
//! | `DM_ENROLL_DIR` | Local directory for enrollment payloads | `/data/enroll` |
//! | `DM_STORE_ENROLL_LOCALLY` | Store enrollment payloads on disk | `true` |
//! | `DM_STORE_ENROLL_S3` | Store enrollment payloads in S3 | `false` |
//! | `DM_S3_BUCKET` | S3 bucket name | unset |
//! | `DM_S3_PREFIX_ENROLL` | Key prefix for enrollment payloads | `enroll/` |
//! | `DM_S3_PREFIX_BINARIES` | Key prefix for binaries | `binaries/` |
//! | `DM_BINARIES_MODE` | `presign` or `proxy` | `presign` |
//! | `DM_PRESIGN_TTL_SECONDS` | Presigned URL lifetime | `300` |
//! | `DM_S3_ENDPOINT_URL` | S3 endpoint override (MinIO etc.) | unset |
//! | `AWS_REGION` | S3 region | unset |
//! | `PSQL_HOST` / `PSQL_PORT` / `PSQL_DATABASE` / `PSQL_USER` / `PSQL_PASSWORD` | PostgreSQL | unset / `5432` |
//! | `KEYCLOAK_ISSUER_URL` | Token issuer; JWKS is fetched from `<issuer>/protocol/openid-connect/certs` | unset |
//! | `KEYCLOAK_REALM` | Keycloak realm | `bootstrap` |
//! | `KEYCLOAK_CLIENT_ID` | Expected audience when `JWT_VERIFY_AUD` | `device-management-plugin` |
//! | `JWT_ALGORITHMS` | CSV signing algorithm allowlist | `RS256` |
//! | `JWT_VERIFY_EXP` | Verify token expiry | `true` |
//! | `JWT_VERIFY_AUD` | Verify token audience | `false` |
//! | `JWT_LEEWAY_SECONDS` | Clock-skew leeway | `30` |
//! | `JWKS_CACHE_TTL_SECONDS` | JWKS cache time-to-live | `3600` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::path::PathBuf;

use url::Url;

/// Application settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// CSV list of allowed CORS origins (`*` for any).
    pub allow_origins: String,
    /// Maximum enrollment body size in MiB.
    pub max_body_size_mb: usize,

    /// Value of the `enabled` flag injected into served configuration.
    pub config_enabled: bool,
    /// Default configuration profile when none is requested.
    pub config_profile: String,
    /// Root directory containing config templates.
    pub config_dir: PathBuf,

    /// Local directory for enrollment payloads.
    pub enroll_dir: PathBuf,
    /// Whether enrollment payloads are written to the local filesystem.
    pub store_enroll_locally: bool,
    /// Whether enrollment payloads are written to S3.
    pub store_enroll_s3: bool,

    /// S3 bucket for enrollment payloads and binaries.
    pub s3_bucket: Option<String>,
    /// Key prefix for enrollment payloads.
    pub s3_prefix_enroll: String,
    /// Key prefix for binaries.
    pub s3_prefix_binaries: String,
    /// Binary delivery mode: `presign` (302 redirect) or `proxy` (streamed).
    pub binaries_mode: String,
    /// Presigned URL lifetime in seconds.
    pub presign_ttl_seconds: u64,
    /// S3 endpoint override for non-AWS deployments.
    pub s3_endpoint_url: Option<String>,
    /// S3 region.
    pub aws_region: Option<String>,

    /// PostgreSQL connection settings.
    pub database: DatabaseSettings,
    /// JWT verification settings.
    pub auth: AuthSettings,
}

/// PostgreSQL connection settings (`PSQL_*`).
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: Option<String>,
    pub port: u16,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DatabaseSettings {
    /// Whether enough is configured to open a connection pool.
    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.database.is_some() && self.user.is_some()
    }
}

/// JWT verification settings (`KEYCLOAK_*` / `JWT_*`).
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Token issuer URL. Verification is disabled when unset; endpoints
    /// requiring auth then fail closed with a server error.
    pub issuer_url: Option<String>,
    /// Keycloak realm.
    pub realm: String,
    /// Client id, used as the expected audience when `verify_aud` is on.
    pub client_id: String,
    /// Accepted signing algorithms.
    pub algorithms: Vec<String>,
    /// Whether token expiry is verified.
    pub verify_exp: bool,
    /// Whether token audience is verified.
    pub verify_aud: bool,
    /// Clock-skew leeway in seconds.
    pub leeway_seconds: u64,
    /// JWKS cache time-to-live in seconds.
    pub jwks_cache_ttl_seconds: u64,
}

impl AuthSettings {
    /// The JWKS endpoint derived from the issuer URL (Keycloak layout).
    pub fn jwks_url(&self) -> Option<Url> {
        let issuer = self.issuer_url.as_deref()?;
        let base = issuer.trim_end_matches('/');
        Url::parse(&format!("{base}/protocol/openid-connect/certs")).ok()
    }
}

impl Settings {
    /// Load settings from the environment.
    pub fn from_env() -> Self {
        Self {
            host: env_str("HOST", "0.0.0.0"),
            port: env::var("DM_PORT")
                .or_else(|_| env::var("PORT"))
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            allow_origins: env_str("DM_ALLOW_ORIGINS", "*"),
            max_body_size_mb: env_parse("DM_MAX_BODY_SIZE_MB", 10),

            config_enabled: env_bool("DM_CONFIG_ENABLED", true),
            config_profile: env_str("DM_CONFIG_PROFILE", "prod"),
            config_dir: PathBuf::from(env_str("DM_CONFIG_DIR", "./config")),

            enroll_dir: PathBuf::from(env_str("DM_ENROLL_DIR", "/data/enroll")),
            store_enroll_locally: env_bool("DM_STORE_ENROLL_LOCALLY", true),
            store_enroll_s3: env_bool("DM_STORE_ENROLL_S3", false),

            s3_bucket: env_opt("DM_S3_BUCKET"),
            s3_prefix_enroll: env_str("DM_S3_PREFIX_ENROLL", "enroll/"),
            s3_prefix_binaries: env_str("DM_S3_PREFIX_BINARIES", "binaries/"),
            binaries_mode: env_str("DM_BINARIES_MODE", "presign"),
            presign_ttl_seconds: env_parse("DM_PRESIGN_TTL_SECONDS", 300),
            s3_endpoint_url: env_opt("DM_S3_ENDPOINT_URL"),
            aws_region: env_opt("AWS_REGION"),

            database: DatabaseSettings {
                host: env_opt("PSQL_HOST"),
                port: env_parse("PSQL_PORT", 5432),
                database: env_opt("PSQL_DATABASE"),
                user: env_opt("PSQL_USER"),
                password: env_opt("PSQL_PASSWORD"),
            },
            auth: AuthSettings {
                issuer_url: env_opt("KEYCLOAK_ISSUER_URL"),
                realm: env_str("KEYCLOAK_REALM", "bootstrap"),
                client_id: env_str("KEYCLOAK_CLIENT_ID", "device-management-plugin"),
                algorithms: env_str("JWT_ALGORITHMS", "RS256")
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect(),
                verify_exp: env_bool("JWT_VERIFY_EXP", true),
                verify_aud: env_bool("JWT_VERIFY_AUD", false),
                leeway_seconds: env_parse("JWT_LEEWAY_SECONDS", 30),
                jwks_cache_ttl_seconds: env_parse("JWKS_CACHE_TTL_SECONDS", 3600),
            },
        }
    }

    /// Maximum enrollment body size in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_settings(issuer: Option<&str>) -> AuthSettings {
        AuthSettings {
            issuer_url: issuer.map(str::to_string),
            realm: "bootstrap".into(),
            client_id: "device-management-plugin".into(),
            algorithms: vec!["RS256".into()],
            verify_exp: true,
            verify_aud: false,
            leeway_seconds: 30,
            jwks_cache_ttl_seconds: 3600,
        }
    }

    #[test]
    fn jwks_url_derived_from_issuer() {
        let auth = auth_settings(Some("https://kc.example.com/realms/bootstrap"));
        assert_eq!(
            auth.jwks_url().unwrap().as_str(),
            "https://kc.example.com/realms/bootstrap/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn jwks_url_strips_trailing_slash() {
        let auth = auth_settings(Some("https://kc.example.com/realms/bootstrap/"));
        assert_eq!(
            auth.jwks_url().unwrap().as_str(),
            "https://kc.example.com/realms/bootstrap/protocol/openid-connect/certs"
        );
    }

    #[test]
    fn jwks_url_none_without_issuer() {
        assert!(auth_settings(None).jwks_url().is_none());
    }

    #[test]
    fn database_settings_require_host_db_and_user() {
        let mut db = DatabaseSettings {
            host: Some("localhost".into()),
            port: 5432,
            database: Some("bootstrap".into()),
            user: Some("dev".into()),
            password: None,
        };
        assert!(db.is_configured());
        db.user = None;
        assert!(!db.is_configured());
    }
}
