// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access request and profile gate routes.
//!
//! All of these are public: the access token in the body or query string is
//! the only credential.

use crate::error::{AppError, Result};
use crate::models::{AccessStatus, NewAccessRequest, ProfileSummary, ProfileView};
use crate::services::{ProfileAccess, RequestDetails};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/profile/request-access", post(request_access))
        .route("/api/profile/view", get(view_profile))
        .route("/api/profile/public", get(public_profile))
        .route("/api/access-request/respond", post(respond))
        .route("/api/access-request/details", get(request_details))
}

fn require_param(value: Option<String>, message: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

// ─── Request Access ──────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RequestAccessResponse {
    pub message: String,
    pub request_id: String,
    pub expires_at: String,
}

/// Submit requester contact details for a private profile.
async fn request_access(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<NewAccessRequest>, JsonRejection>,
) -> Result<Json<RequestAccessResponse>> {
    let Json(body) = body?;
    let request = state.access.create_request(body).await?;

    Ok(Json(RequestAccessResponse {
        message: "Access request sent successfully. The profile owner will be notified."
            .to_string(),
        request_id: request.id,
        expires_at: format_utc_rfc3339(request.expires_at),
    }))
}

// ─── Respond ─────────────────────────────────────────────────

const RESPOND_FIELDS_REQUIRED: &str = "Token and approval status are required";

#[derive(Deserialize)]
struct RespondBody {
    token: Option<String>,
    approve: Option<bool>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RespondResponse {
    pub message: String,
    pub status: String,
}

/// Owner approves or denies a request via the emailed link.
async fn respond(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<RespondBody>, JsonRejection>,
) -> Result<Json<RespondResponse>> {
    let Json(body) = body?;
    let token = require_param(body.token, RESPOND_FIELDS_REQUIRED)?;
    let approve = body
        .approve
        .ok_or_else(|| AppError::BadRequest(RESPOND_FIELDS_REQUIRED.to_string()))?;
    let status = state.access.respond_to_request(&token, approve).await?;

    let message = match status {
        AccessStatus::Approved => "Access approved successfully",
        _ => "Access denied",
    };

    Ok(Json(RespondResponse {
        message: message.to_string(),
        status: status.to_string(),
    }))
}

// ─── Details ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetailsResponse {
    pub id: String,
    pub profile_id: String,
    pub profile_owner: ProfileSummary,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub requester_mobile: Option<String>,
    pub status: String,
    pub expires_at: String,
    pub created_at: String,
    pub responded_at: Option<String>,
}

impl From<RequestDetails> for RequestDetailsResponse {
    fn from(details: RequestDetails) -> Self {
        Self {
            id: details.id,
            profile_id: details.profile_id,
            profile_owner: details.owner,
            requester_name: details.requester_name,
            requester_email: details.requester_email,
            requester_mobile: details.requester_mobile,
            status: details.status.to_string(),
            expires_at: format_utc_rfc3339(details.expires_at),
            created_at: format_utc_rfc3339(details.created_at),
            responded_at: details.responded_at.map(format_utc_rfc3339),
        }
    }
}

#[derive(Serialize)]
pub struct RequestDetailsEnvelope {
    pub request: RequestDetailsResponse,
}

/// Load a request for the owner's approval page.
async fn request_details(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TokenQuery>,
) -> Result<Json<RequestDetailsEnvelope>> {
    let token = require_param(params.token, "Token is required")?;
    let details = state.access.get_request_details(&token).await?;

    Ok(Json(RequestDetailsEnvelope {
        request: details.into(),
    }))
}

// ─── Profile Gate ────────────────────────────────────────────

#[derive(Deserialize)]
struct ViewQuery {
    id: Option<String>,
    token: Option<String>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
}

/// Read a private profile with an approved token.
async fn view_profile(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ViewQuery>,
) -> Result<Json<ProfileResponse>> {
    let profile_id = require_param(params.id, "Profile ID and token are required")?;
    let token = require_param(params.token, "Profile ID and token are required")?;

    let profile = state.access.view_profile(&profile_id, &token).await?;
    Ok(Json(ProfileResponse { profile }))
}

#[derive(Deserialize)]
struct ProfileQuery {
    id: Option<String>,
}

/// Either the public profile or just enough to render the request form.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileResponse {
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_type: Option<String>,
}

async fn public_profile(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProfileQuery>,
) -> Result<Json<PublicProfileResponse>> {
    let profile_id = require_param(params.id, "Profile ID is required")?;

    let response = match state.access.check_public_or_gated(&profile_id).await? {
        ProfileAccess::Public(profile) => PublicProfileResponse {
            is_public: true,
            profile: Some(profile),
            profile_name: None,
            profile_type: None,
        },
        ProfileAccess::Gated(summary) => PublicProfileResponse {
            is_public: false,
            profile: None,
            profile_name: Some(summary.name),
            profile_type: Some(summary.work_type),
        },
    };

    Ok(Json(response))
}
