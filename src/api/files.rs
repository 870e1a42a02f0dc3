// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # File Share Handlers
//!
//! Upload takes a multipart form with any number of `files` parts plus the
//! `password`, `ttl` (hour/day unit), `views` and `deletable` fields. The
//! download password may be sent as JSON or as a url-encoded form.

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::base_url;
use crate::{
    error::ApiError,
    models::{DownloadFileRequest, FileLinkResponse, ShareSummaryResponse},
    share::{limits, FileShareRequest},
    state::AppState,
    storage::StagedFile,
};

/// Header carrying the views left after a download.
pub const VIEWS_REMAINING_HEADER: &str = "x-views-remaining";

#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<StagedFile>,
    password: Option<String>,
    ttl_unit: Option<u32>,
    views: Option<u32>,
    deletable: bool,
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid {field}")))
}

fn parse_checkbox(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "on" | "true" | "1")
}

async fn read_upload(mut multipart: Multipart, max_file_size: u64) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    let mut total: u64 = 0;
    let too_large = || {
        ApiError::payload_too_large(format!(
            "File too large (max {})",
            limits::max_file_size_text(max_file_size)
        ))
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("file")
                    .to_string();
                let contents = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                // Browsers send an empty part when no file was picked.
                if contents.is_empty() && file_name == "file" {
                    continue;
                }
                let size = contents.len() as u64;
                total = total.saturating_add(size);
                if size > max_file_size || total > max_file_size {
                    return Err(too_large());
                }
                form.files.push(StagedFile::new(file_name, contents.to_vec()));
            }
            "password" | "ttl" | "views" | "ttlViews" | "deletable" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
                if value.trim().is_empty() {
                    continue;
                }
                match name.as_str() {
                    "password" => form.password = Some(value),
                    "ttl" => form.ttl_unit = Some(parse_number("ttl", &value)?),
                    "views" | "ttlViews" => form.views = Some(parse_number("views", &value)?),
                    _ => form.deletable = parse_checkbox(&value),
                }
            }
            other => debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

/// Upload files and create a file share.
#[utoipa::path(
    post,
    path = "/file",
    request_body(
        content_type = "multipart/form-data",
        description = "`files` parts plus `password`, `ttl`, `views`, `deletable`"
    ),
    tag = "Files",
    responses(
        (status = 201, body = FileLinkResponse),
        (status = 400, description = "No files, or budgets out of range"),
        (status = 413, description = "Upload exceeds the size limit")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<FileLinkResponse>), ApiError> {
    let form = read_upload(multipart, state.config.max_file_size).await?;

    if form.files.is_empty() {
        return Err(ApiError::bad_request("No file was selected"));
    }
    let unit = form.ttl_unit.unwrap_or(1);
    if unit > limits::MAX_TTL_UNIT {
        return Err(ApiError::bad_request("TTL is too high"));
    }
    let views = form.views.unwrap_or(1);
    if views > limits::MAX_VIEWS {
        return Err(ApiError::bad_request(format!(
            "Views too high (max {})",
            limits::MAX_VIEWS
        )));
    }

    let deposit = state
        .shares
        .deposit_file(FileShareRequest {
            files: form.files,
            password: form.password,
            ttl_secs: limits::ttl_from_unit(unit),
            views,
            deletable: form.deletable,
        })
        .await?;

    let base = base_url(&headers, &state.config);
    let response = FileLinkResponse {
        link: format!("{base}/file/{}", deposit.token),
        password_link: deposit
            .password_token
            .as_ref()
            .map(|token| format!("{base}/{token}")),
        token: deposit.token,
        views: deposit.views,
        ttl: deposit.ttl_secs,
        ttl_text: limits::ttl_text(deposit.ttl_secs),
        deletable: form.deletable,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Metadata of a file share. Does not consume a view.
#[utoipa::path(
    get,
    path = "/file/{token}",
    params(("token" = String, Path, description = "Share token")),
    tag = "Files",
    responses(
        (status = 200, body = ShareSummaryResponse),
        (status = 404, description = "Unknown, expired or malformed token")
    )
)]
pub async fn read_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ShareSummaryResponse>, ApiError> {
    let summary = state.shares.peek_file(&token).await?;
    Ok(Json(summary.into()))
}

fn download_password(headers: &HeaderMap, body: &[u8]) -> Result<Option<String>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let password = if is_json {
        serde_json::from_slice::<DownloadFileRequest>(body)
            .map_err(|_| ApiError::bad_request("Invalid request body"))?
            .password
    } else {
        url::form_urlencoded::parse(body)
            .find(|(name, _)| name == "password")
            .map(|(_, value)| value.into_owned())
    };
    Ok(password.filter(|p| !p.is_empty()))
}

/// Check the download password and stream the zip bundle, consuming a view.
#[utoipa::path(
    post,
    path = "/file/{token}",
    params(("token" = String, Path, description = "Share token")),
    request_body(content = DownloadFileRequest, description = "JSON or url-encoded form"),
    tag = "Files",
    responses(
        (status = 200, description = "Zip bundle", content_type = "application/zip"),
        (status = 401, description = "Wrong or missing download password"),
        (status = 404, description = "Unknown, expired, exhausted or malformed token")
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let password = download_password(&headers, &body)?;
    let download = state
        .shares
        .reveal_file(&token, password.as_deref())
        .await?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        download.file_name
    ))
    .map_err(|_| ApiError::internal("Internal server error"))?;

    let body = Body::from_stream(ReaderStream::new(download.file));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static(VIEWS_REMAINING_HEADER),
                HeaderValue::from(download.views_remaining),
            ),
        ],
        body,
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/file/{token}",
    params(("token" = String, Path, description = "Share token")),
    tag = "Files",
    responses(
        (status = 200, description = "Share, linked password and bundle deleted"),
        (status = 401, description = "Share is not deletable"),
        (status = 404, description = "Unknown share")
    )
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.shares.delete_file(&token).await?;
    Ok(StatusCode::OK)
}
