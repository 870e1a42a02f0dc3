// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use super::base_url;
use crate::{
    error::ApiError,
    models::{
        CreatePasswordRequest, RevealedPasswordResponse, ShareLinkResponse, ShareSummaryResponse,
    },
    share::limits,
    state::AppState,
};

/// Usage text for `curl` users.
#[utoipa::path(
    get,
    path = "/api/v1",
    tag = "Passwords",
    responses((status = 200, body = String, content_type = "text/plain"))
)]
pub async fn help(State(state): State<AppState>, headers: HeaderMap) -> String {
    let base = base_url(&headers, &state.config);
    format!(
        "Generate a password share link with the following parameters:\n\
password: (required) the password\n\
ttl: (optional) number of seconds, min: {min}, max: {max}, default: {default} (one hour)\n\
views: (optional) number between 1 and {max_views}\n\
deletable: (optional) boolean (false, true), default: false\n\
For example with the following command:\n\
curl -X POST -H \"Content-Type:application/json\" \
-d '{{\"password\":\"password-here\",\"ttl\":3600,\"views\":1,\"deletable\":true}}' \
{base}/api/v1\n",
        min = limits::MIN_TTL_SECS,
        max = limits::MAX_TTL_SECS,
        default = limits::DEFAULT_TTL_SECS,
        max_views = limits::MAX_VIEWS,
    )
}

#[utoipa::path(
    post,
    path = "/api/v1",
    request_body = CreatePasswordRequest,
    tag = "Passwords",
    responses(
        (status = 201, body = ShareLinkResponse),
        (status = 400, description = "Missing password or budgets out of range")
    )
)]
pub async fn create_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePasswordRequest>,
) -> Result<(StatusCode, Json<ShareLinkResponse>), ApiError> {
    if request.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }
    let views = request.views.unwrap_or(0);
    if views > limits::MAX_VIEWS {
        return Err(ApiError::bad_request(format!(
            "Views too high (max {})",
            limits::MAX_VIEWS
        )));
    }
    let ttl = request.ttl.unwrap_or(0);
    if ttl > limits::MAX_TTL_SECS {
        return Err(ApiError::bad_request(format!(
            "TTL too high (max {} seconds)",
            limits::MAX_TTL_SECS
        )));
    }
    let deletable = request.deletable.unwrap_or(false);

    let deposit = state
        .shares
        .deposit_secret(request.password.as_bytes(), ttl, views, deletable)
        .await?;

    let base = base_url(&headers, &state.config);
    let response = ShareLinkResponse {
        link: format!("{base}/{}", deposit.token),
        link_api: format!("{base}/api/v1/{}", deposit.token),
        token: deposit.token,
        views: deposit.views,
        ttl: deposit.ttl_secs,
        ttl_text: limits::ttl_text(deposit.ttl_secs),
        deletable,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Metadata of a password share. Does not consume a view.
#[utoipa::path(
    get,
    path = "/api/v1/{token}",
    params(("token" = String, Path, description = "Share token")),
    tag = "Passwords",
    responses(
        (status = 200, body = ShareSummaryResponse),
        (status = 404, description = "Unknown, expired or malformed token")
    )
)]
pub async fn read_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ShareSummaryResponse>, ApiError> {
    let summary = state.shares.peek_secret(&token).await?;
    Ok(Json(summary.into()))
}

/// Reveal the password, consuming one view.
#[utoipa::path(
    post,
    path = "/api/v1/{token}",
    params(("token" = String, Path, description = "Share token")),
    tag = "Passwords",
    responses(
        (status = 200, body = RevealedPasswordResponse),
        (status = 404, description = "Unknown, expired, exhausted or malformed token")
    )
)]
pub async fn reveal_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<RevealedPasswordResponse>, ApiError> {
    let revealed = state.shares.reveal_secret(&token).await?;
    Ok(Json(RevealedPasswordResponse {
        password: String::from_utf8_lossy(&revealed.plaintext).into_owned(),
        views_remaining: revealed.views_remaining,
        ttl: revealed.ttl_secs,
        ttl_text: revealed.ttl_text,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/{token}",
    params(("token" = String, Path, description = "Share token")),
    tag = "Passwords",
    responses(
        (status = 200, description = "Deleted"),
        (status = 401, description = "Share is not deletable"),
        (status = 404, description = "Unknown share")
    )
)]
pub async fn delete_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.shares.delete_secret(&token).await?;
    Ok(StatusCode::OK)
}
