// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pring access gate: approval-based access to private QR profiles
//!
//! This crate provides the backend API that lets an anonymous visitor
//! request access to a private profile, lets the owner approve or deny it
//! through a tokenized link, and serves the privacy-filtered profile to
//! approved requesters until the token expires.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::AccessService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub access: AccessService,
}
