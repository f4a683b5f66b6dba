// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared test support: a local JWKS stub server, token signing helpers
//! and pre-built application state. Compiled for tests only.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};

use crate::auth::TokenVerifier;
use crate::config::{AuthSettings, DatabaseSettings, Settings};
use crate::state::AppState;

/// Symmetric signing secret shared between test tokens and stub JWKS.
pub const TEST_SECRET: &[u8] = b"device-management-test-secret-key";

struct StubState {
    hits: AtomicUsize,
    fail_next: AtomicBool,
    body: RwLock<Value>,
}

/// In-process JWKS endpoint with hit counting, key rotation and failure
/// injection. Serves the key set on every path so both raw JWKS URLs and
/// issuer-derived URLs resolve against it.
pub struct JwksStub {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl JwksStub {
    /// Start a stub serving the given key set.
    pub async fn serve(body: Value) -> Self {
        let state = Arc::new(StubState {
            hits: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            body: RwLock::new(body),
        });

        let app = Router::new()
            .route("/{*path}", get(jwks_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind JWKS stub");
        let addr = listener.local_addr().expect("stub local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("JWKS stub server");
        });

        Self { addr, state }
    }

    /// Stub publishing a single RSA key set.
    pub async fn rsa() -> Self {
        Self::serve(sample_rsa_jwks()).await
    }

    /// Stub publishing a single symmetric (oct) key under `kid`.
    pub async fn oct(kid: &str, secret: &[u8]) -> Self {
        Self::serve(oct_jwks(kid, secret)).await
    }

    /// Direct JWKS URL of the stub.
    pub fn url(&self) -> String {
        format!("http://{}/certs", self.addr)
    }

    /// Issuer URL whose derived JWKS endpoint resolves to the stub.
    pub fn issuer_url(&self) -> String {
        format!("http://{}/realms/bootstrap", self.addr)
    }

    /// Number of requests the stub has served (including injected failures).
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Make the next request fail with HTTP 500.
    pub fn fail_next(&self) {
        self.state.fail_next.store(true, Ordering::SeqCst);
    }

    /// Replace the published key set with a single oct key (key rotation).
    pub fn set_oct_key(&self, kid: &str, secret: &[u8]) {
        *self.state.body.write().unwrap() = oct_jwks(kid, secret);
    }
}

async fn jwks_handler(State(state): State<Arc<StubState>>) -> axum::response::Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if state.fail_next.swap(false, Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(state.body.read().unwrap().clone()).into_response()
}

/// A JWKS with a single symmetric key.
pub fn oct_jwks(kid: &str, secret: &[u8]) -> Value {
    json!({
        "keys": [{
            "kty": "oct",
            "kid": kid,
            "alg": "HS256",
            "k": URL_SAFE_NO_PAD.encode(secret)
        }]
    })
}

/// A JWKS with two RSA keys (public test vector material).
pub fn sample_rsa_jwks() -> Value {
    let n = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";
    json!({
        "keys": [
            {"kty": "RSA", "kid": "test-kid-1", "use": "sig", "alg": "RS256", "n": n, "e": "AQAB"},
            {"kty": "RSA", "kid": "test-kid-2", "use": "sig", "alg": "RS256", "n": n, "e": "AQAB"}
        ]
    })
}

/// Sign an HS256 token with [`TEST_SECRET`] and the given key id.
pub fn sign_hs256(kid: &str, claims: &Value) -> String {
    let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(
        &header,
        claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET),
    )
    .expect("sign test token")
}

/// Settings with no external dependencies configured.
pub fn test_settings() -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        allow_origins: "*".to_string(),
        max_body_size_mb: 10,
        config_enabled: true,
        config_profile: "prod".to_string(),
        config_dir: std::path::PathBuf::from("./config"),
        enroll_dir: std::path::PathBuf::from("/data/enroll"),
        store_enroll_locally: false,
        store_enroll_s3: false,
        s3_bucket: None,
        s3_prefix_enroll: "enroll/".to_string(),
        s3_prefix_binaries: "binaries/".to_string(),
        binaries_mode: "presign".to_string(),
        presign_ttl_seconds: 300,
        s3_endpoint_url: None,
        aws_region: None,
        database: DatabaseSettings {
            host: None,
            port: 5432,
            database: None,
            user: None,
            password: None,
        },
        auth: AuthSettings {
            issuer_url: None,
            realm: "bootstrap".to_string(),
            client_id: "device-management-plugin".to_string(),
            algorithms: vec!["RS256".to_string()],
            verify_exp: true,
            verify_aud: false,
            leeway_seconds: 30,
            jwks_cache_ttl_seconds: 3600,
        },
    }
}

/// App state with nothing external configured (no DB, S3 or verifier).
pub fn test_state() -> AppState {
    AppState::new(test_settings())
}

/// App state whose verifier trusts the stub issuer (HS256 allowlist).
/// Returns the state and the issuer URL tokens must carry in `iss`.
pub async fn test_state_with_auth(stub: &JwksStub) -> (AppState, String) {
    let issuer = stub.issuer_url();
    let mut settings = test_settings();
    settings.auth.issuer_url = Some(issuer.clone());
    settings.auth.algorithms = vec!["HS256".to_string()];

    let verifier = TokenVerifier::from_settings(&settings.auth).expect("verifier");
    let state = AppState::new(settings).with_verifier(verifier);
    (state, issuer)
}
