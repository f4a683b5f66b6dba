// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Settings,
    models::{
        CheckStatus, DeviceConnectionRecord, EnrollRequest, EnrollResponse, HealthzResponse,
    },
    state::AppState,
};

pub mod binaries;
pub mod config;
pub mod devices;
pub mod enroll;
pub mod health;

fn cors_layer(settings: &Settings) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    let origins: Vec<&str> = settings
        .allow_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        layer.allow_origin(Any)
    } else {
        let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(list))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);

    Router::new()
        .route(
            "/enroll",
            axum::routing::post(enroll::enroll).put(enroll::enroll),
        )
        .route("/config/config.json", get(config::get_config))
        .route("/config/{device}/config.json", get(config::get_device_config))
        .route("/binaries/{*path}", get(binaries::get_binary))
        .route(
            "/devices/{client_uuid}/connections",
            get(devices::list_connections),
        )
        .route("/healthz", get(health::healthz))
        // Body size is enforced in the enroll handler so oversize payloads
        // get the documented JSON error instead of a bare 413.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        enroll::enroll,
        config::get_config,
        config::get_device_config,
        binaries::get_binary,
        devices::list_connections,
        health::healthz
    ),
    components(
        schemas(
            EnrollRequest,
            EnrollResponse,
            DeviceConnectionRecord,
            HealthzResponse,
            CheckStatus
        )
    ),
    tags(
        (name = "Enrollment", description = "Device registration"),
        (name = "Configuration", description = "Dynamic device configuration"),
        (name = "Binaries", description = "Binary distribution from S3"),
        (name = "Devices", description = "Device administration"),
        (name = "Health", description = "Dependency health checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sign_hs256, test_state, test_state_with_auth, JwksStub, TEST_SECRET};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(test_state());
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn healthz_is_reachable_without_auth() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn required_auth_endpoint_rejects_missing_token_with_challenge() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::get("/devices/00000000-0000-0000-0000-000000000000/connections")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn optional_auth_endpoint_treats_unknown_key_token_as_anonymous() {
        let stub = JwksStub::oct("hmac-1", TEST_SECRET).await;
        let (state, issuer) = test_state_with_auth(&stub).await;
        let app = router(state);

        let token = sign_hs256(
            "key-nobody-knows",
            &json!({"sub": "user_123", "iss": issuer, "exp": chrono::Utc::now().timestamp() + 3600}),
        );
        let payload = json!({
            "device_name": "matisse",
            "plugin_uuid": "b9bdf6ad-3b1f-4f1a-9f07-4f8606c3fe5a",
            "email": "user@example.com"
        });

        let response = app
            .oneshot(
                Request::post("/enroll")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        // The garbage token is treated exactly like no token at all.
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn enroll_error_bodies_are_json() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::post("/enroll").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Empty body");
    }

    #[tokio::test]
    async fn enroll_accepts_put() {
        let app = router(test_state());
        let payload = json!({
            "device_name": "chrome",
            "plugin_uuid": "b9bdf6ad-3b1f-4f1a-9f07-4f8606c3fe5a",
            "email": "user@example.com"
        });

        let response = app
            .oneshot(
                Request::put("/enroll")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
