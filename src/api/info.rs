// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{models::InfoResponse, share::limits, state::AppState};

/// Display strings and limits for clients.
#[utoipa::path(
    get,
    path = "/api/v1/info",
    tag = "Info",
    responses((status = 200, body = InfoResponse))
)]
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let config = &state.config;
    Json(InfoResponse {
        app_name: config.branding.app_name.clone(),
        logo: config.branding.logo.clone(),
        disclaimer: config.branding.disclaimer.clone(),
        copyright: config.branding.copyright.clone(),
        max_file_size: config.max_file_size,
        max_file_size_text: limits::max_file_size_text(config.max_file_size),
        max_ttl: limits::MAX_TTL_SECS,
        max_views: limits::MAX_VIEWS,
    })
}
