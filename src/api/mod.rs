// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    models::{
        CreatePasswordRequest, DownloadFileRequest, FileLinkResponse, InfoResponse,
        RevealedPasswordResponse, ShareLinkResponse, ShareSummaryResponse,
    },
    state::AppState,
};

pub mod files;
pub mod health;
pub mod info;
pub mod passwords;

/// Room for the non-file multipart fields on top of the upload limit.
const FORM_OVERHEAD_BYTES: u64 = 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_file_size.saturating_add(FORM_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    let routes = Router::new()
        .route(
            "/api/v1",
            get(passwords::help).post(passwords::create_password),
        )
        .route("/api/v1/info", get(info::info))
        // Target of the links handed out for password shares. Read-only, so
        // link previews never spend a view.
        .route("/{token}", get(passwords::read_password))
        .route(
            "/api/v1/{token}",
            get(passwords::read_password)
                .post(passwords::reveal_password)
                .delete(passwords::delete_password),
        )
        .route("/file", post(files::upload_file))
        .route(
            "/file/{token}",
            get(files::read_file)
                .post(files::download_file)
                .delete(files::delete_file),
        )
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Base URL for generated links.
///
/// The host comes from the request; `http` is upgraded to `https` unless
/// `NO_SSL` is set.
pub(crate) fn base_url(headers: &HeaderMap, config: &Config) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| config.bind_addr());

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let scheme = if !config.no_ssl && scheme == "http" {
        "https"
    } else {
        scheme
    };

    format!("{scheme}://{host}")
}

#[derive(OpenApi)]
#[openapi(
    paths(
        passwords::help,
        passwords::create_password,
        passwords::read_password,
        passwords::reveal_password,
        passwords::delete_password,
        files::upload_file,
        files::read_file,
        files::download_file,
        files::delete_file,
        info::info,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CreatePasswordRequest,
            ShareLinkResponse,
            ShareSummaryResponse,
            RevealedPasswordResponse,
            FileLinkResponse,
            DownloadFileRequest,
            InfoResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Passwords", description = "Password shares"),
        (name = "Files", description = "File shares"),
        (name = "Info", description = "Display strings and limits"),
        (name = "Health", description = "Liveness and readiness checks")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = AppState::in_memory(Config::for_tests(dir.path())).unwrap();
        (dir, state)
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (_dir, state) = state();
        let _ = router(state).into_make_service();
    }

    #[test]
    fn base_url_upgrades_scheme_unless_no_ssl() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("okuru.example"));

        let mut config = Config::for_tests("/tmp");
        config.no_ssl = false;
        assert_eq!(base_url(&headers, &config), "https://okuru.example");

        config.no_ssl = true;
        assert_eq!(base_url(&headers, &config), "http://okuru.example");
    }

    #[test]
    fn base_url_falls_back_to_bind_address() {
        let config = Config::for_tests("/tmp");
        assert_eq!(base_url(&HeaderMap::new(), &config), "http://127.0.0.1:4000");
    }

    #[tokio::test]
    async fn password_share_round_trip_over_http() {
        let (_dir, state) = state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::HOST, "localhost")
                    .body(Body::from(r#"{"password":"swordfish","views":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("x-request-id"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let created: ShareLinkResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.link_api, format!("http://localhost/api/v1/{}", created.token));

        let reveal = || {
            Request::post(format!("/api/v1/{}", created.token))
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(reveal()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let revealed: RevealedPasswordResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(revealed.password, "swordfish");
        assert_eq!(revealed.views_remaining, 0);

        let response = app.oneshot(reveal()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn password_link_resolves_without_consuming_a_view() {
        let (_dir, state) = state();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::post("/api/v1")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::HOST, "localhost")
                    .body(Body::from(r#"{"password":"pw","views":2}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let created: ShareLinkResponse = serde_json::from_slice(&body).unwrap();
        let path = created.link.strip_prefix("http://localhost").unwrap().to_string();
        assert_eq!(path, format!("/{}", created.token));

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(Request::get(path.as_str()).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let summary: ShareSummaryResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(summary.views_remaining, 2);
        }

        let response = app
            .oneshot(Request::post(path.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn static_routes_win_over_password_links() {
        let (_dir, state) = state();
        let response = router(state)
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn info_route_is_not_a_token() {
        let (_dir, state) = state();
        let response = router(state)
            .oneshot(Request::get("/api/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (_dir, state) = state();
        let response = router(state)
            .oneshot(
                Request::get("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
