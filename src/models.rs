// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive `ToSchema`
//! for the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Password shares**: create, summary, reveal
//! - **File shares**: upload result, summary, download password
//! - **Info**: display strings and upload limits

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::share::Summary;

// =============================================================================
// Password Shares
// =============================================================================

/// Body of `POST /api/v1`.
#[derive(Debug, Clone, Deserialize, ToSchema, PartialEq, Eq)]
pub struct CreatePasswordRequest {
    /// Secret to share.
    pub password: String,
    /// Lifetime in seconds (300 to 604800, default 3600).
    #[serde(default)]
    pub ttl: Option<u64>,
    /// View budget (1 to 100, default 1).
    #[serde(default)]
    pub views: Option<u32>,
    /// Whether holders of the link may delete the share.
    #[serde(default)]
    pub deletable: Option<bool>,
}

/// Links to a freshly created share.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ShareLinkResponse {
    /// Share token (`storage_key` + separator + `encryption_key`).
    pub token: String,
    /// Browser link.
    pub link: String,
    /// API link for `curl` users.
    pub link_api: String,
    pub views: u32,
    /// Lifetime in seconds.
    pub ttl: u64,
    pub ttl_text: String,
    pub deletable: bool,
}

/// Metadata of a live share, read without consuming a view.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ShareSummaryResponse {
    pub views: u32,
    pub views_remaining: u32,
    /// Remaining lifetime in seconds.
    pub ttl: u64,
    pub ttl_text: String,
    pub deletable: bool,
    /// File shares only: a download password must be supplied.
    pub password_required: bool,
}

impl From<Summary> for ShareSummaryResponse {
    fn from(summary: Summary) -> Self {
        Self {
            views: summary.views_allowed,
            views_remaining: summary.views_remaining,
            ttl: summary.ttl_secs,
            ttl_text: summary.ttl_text,
            deletable: summary.deletable,
            password_required: summary.password_required,
        }
    }
}

/// A revealed password.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct RevealedPasswordResponse {
    pub password: String,
    pub views_remaining: u32,
    /// Remaining lifetime in seconds at reveal time.
    pub ttl: u64,
    pub ttl_text: String,
}

// =============================================================================
// File Shares
// =============================================================================

/// Result of `POST /file`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FileLinkResponse {
    pub token: String,
    pub link: String,
    /// Link to the password share, when a download password was chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_link: Option<String>,
    pub views: u32,
    pub ttl: u64,
    pub ttl_text: String,
    pub deletable: bool,
}

/// Body of `POST /file/{token}` (JSON or form encoded).
#[derive(Debug, Clone, Default, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DownloadFileRequest {
    #[serde(default)]
    pub password: Option<String>,
}

// =============================================================================
// Info
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct InfoResponse {
    pub app_name: String,
    pub logo: String,
    pub disclaimer: String,
    pub copyright: String,
    /// Upload limit in bytes.
    pub max_file_size: u64,
    pub max_file_size_text: String,
    /// Largest accepted lifetime for password shares, in seconds.
    pub max_ttl: u64,
    pub max_views: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_defaults_optional_fields() {
        let request: CreatePasswordRequest =
            serde_json::from_str(r#"{"password":"swordfish"}"#).unwrap();
        assert_eq!(request.password, "swordfish");
        assert_eq!(request.ttl, None);
        assert_eq!(request.views, None);
        assert_eq!(request.deletable, None);
    }

    #[test]
    fn file_link_omits_absent_password_link() {
        let response = FileLinkResponse {
            token: "k~s".into(),
            link: "https://example.org/file/k~s".into(),
            password_link: None,
            views: 1,
            ttl: 3600,
            ttl_text: "one more hour".into(),
            deletable: false,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("password_link").is_none());
    }

    #[test]
    fn summary_maps_to_response() {
        let response = ShareSummaryResponse::from(Summary {
            views_allowed: 3,
            views_remaining: 2,
            ttl_secs: 7200,
            ttl_text: "2 more hours".into(),
            deletable: true,
            password_required: false,
        });
        assert_eq!(response.views, 3);
        assert_eq!(response.views_remaining, 2);
        assert_eq!(response.ttl, 7200);
    }
}
