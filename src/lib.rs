// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Okuru - Ephemeral Encrypted Secret Sharing
//!
//! Passwords and file bundles are sealed with a fresh key that only exists in
//! the share token handed back to the depositor. Records expire by TTL or once
//! their view budget is spent; file bundles follow their record.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `share` - Secret and File Record state machines
//! - `storage` - Metadata stores (Redis, in-memory) and the bundle directory
//! - `watcher` - Removes bundles of expired File Records

pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod models;
pub mod share;
pub mod state;
pub mod storage;
pub mod token;
pub mod watcher;
