// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::crypto::EnvelopeError;
use crate::storage::{BlobError, StoreError};
use crate::token::TokenError;

/// Failures of the share core.
#[derive(Debug, Error)]
pub enum ShareError {
    /// Token shape rejected. Surfaces exactly like `NotFound`.
    #[error("invalid share token")]
    InvalidToken,
    /// Record absent, expired, exhausted, or logically empty.
    #[error("share not found")]
    NotFound,
    /// Deletion of a non-deletable record, or a wrong download password.
    #[error("not authorized")]
    Unauthorized,
    #[error("envelope failure: {0}")]
    Crypto(#[from] EnvelopeError),
    #[error("metadata store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("blob store failure: {0}")]
    Blob(#[from] BlobError),
}

impl From<TokenError> for ShareError {
    fn from(_: TokenError) -> Self {
        ShareError::InvalidToken
    }
}

impl From<StoreError> for ShareError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ShareError::NotFound,
            StoreError::Unavailable(msg) | StoreError::Invalid(msg) => {
                ShareError::StoreUnavailable(msg)
            }
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ShareError> for ApiError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::InvalidToken | ShareError::NotFound => ApiError::not_found("Not found"),
            ShareError::Unauthorized => ApiError::unauthorized("Unauthorized"),
            ShareError::Blob(BlobError::Empty) => ApiError::bad_request("No file was selected"),
            other => {
                error!(error = %other, "Share operation failed");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
