// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access request lifecycle and the profile gate.
//!
//! State machine:
//! - `pending -> approved | denied` when the owner responds
//! - `pending | approved -> expired` once `expires_at` passes
//!
//! Expiry is lazy: every read path checks the deadline and materializes the
//! `expired` status before doing anything else. Persisting that transition
//! is best effort; the caller sees "expired" even if the write fails.

use crate::db::{AccessRequestStore, ProfileStore, Transition};
use crate::error::{AppError, Result};
use crate::models::access_request::token_hint;
use crate::models::{AccessRequest, AccessStatus, NewAccessRequest, ProfileSummary, ProfileView};
use crate::services::notifier::{ApprovalNotice, Notifier, OwnerNotice};
use crate::services::token::TokenIssuer;
use crate::time_utils::Clock;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use validator::Validate;

/// Token collisions are astronomically unlikely; this only bounds the loop.
const MAX_TOKEN_ATTEMPTS: usize = 3;

const INVALID_ACCESS_TOKEN: &str = "Invalid or expired access token";
const PROFILE_TYPE_FALLBACK: &str = "Professional Profile";
const OWNER_NAME_FALLBACK: &str = "The profile owner";

/// What the approval page shows the owner.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDetails {
    pub id: String,
    pub profile_id: String,
    pub owner: ProfileSummary,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub requester_mobile: Option<String>,
    pub status: AccessStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Outcome of visiting a profile's QR link without a token.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAccess {
    Public(ProfileView),
    /// Private profile: only enough to render the "request access" form.
    Gated(ProfileSummary),
}

/// Access request lifecycle manager and profile gate.
#[derive(Clone)]
pub struct AccessService {
    requests: Arc<dyn AccessRequestStore>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    tokens: TokenIssuer,
    /// Base for approval and access links, without trailing slash
    app_url: String,
}

impl AccessService {
    pub fn new(
        requests: Arc<dyn AccessRequestStore>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        app_url: impl Into<String>,
    ) -> Self {
        Self {
            requests,
            profiles,
            notifier,
            clock,
            tokens: TokenIssuer::new(),
            app_url: app_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn approval_link(&self, token: &str) -> String {
        format!(
            "{}/approve-access?token={}",
            self.app_url,
            urlencoding::encode(token)
        )
    }

    pub fn access_link(&self, profile_id: &str, token: &str) -> String {
        format!(
            "{}/profile/{}?token={}",
            self.app_url,
            urlencoding::encode(profile_id),
            urlencoding::encode(token)
        )
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Create a pending access request and notify the profile owner.
    pub async fn create_request(&self, input: NewAccessRequest) -> Result<AccessRequest> {
        let input = input.normalized();
        input.validate()?;

        let profile = self
            .profiles
            .get_profile(&input.profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        let now = self.clock.now();
        let email = input.requester_email.as_deref();
        let mobile = input.requester_mobile.as_deref();

        let existing = self
            .requests
            .find_pending_for_profile(&input.profile_id)
            .await?;
        if existing
            .iter()
            .any(|r| r.blocks_duplicate(email, mobile, now))
        {
            tracing::info!(
                profile_id = %input.profile_id,
                "Duplicate access request rejected"
            );
            return Err(AppError::Conflict(
                "You already have a pending request for this profile. \
                 Please wait for the owner's response."
                    .to_string(),
            ));
        }

        let id = self.tokens.issue_id()?;
        let mut stored = None;
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            let request = AccessRequest::new_pending(
                id.clone(),
                self.tokens.issue()?,
                input.clone(),
                now,
            );
            if self.requests.insert_request(&request).await? {
                stored = Some(request);
                break;
            }
            tracing::warn!(attempt, "Access token collision, regenerating");
        }
        let request = stored.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Could not issue a unique access token after {} attempts",
                MAX_TOKEN_ATTEMPTS
            ))
        })?;

        tracing::info!(
            request_id = %request.id,
            profile_id = %request.profile_id,
            token = request.token_hint(),
            expires_at = %request.expires_at,
            "Access request created"
        );

        match (&profile.email, request.requester_contact()) {
            (Some(owner_email), Some(contact)) => {
                let notice = OwnerNotice {
                    owner_email: owner_email.clone(),
                    owner_name: profile.name.clone(),
                    profile_type: if profile.work_type.is_empty() {
                        PROFILE_TYPE_FALLBACK.to_string()
                    } else {
                        profile.work_type.clone()
                    },
                    requester_name: request.requester_name.clone(),
                    requester_contact: contact.to_string(),
                    approval_link: self.approval_link(&request.access_token),
                    expires_at: request.expires_at,
                };
                let notifier = self.notifier.clone();
                spawn_notification("access_request", async move {
                    notifier.notify_owner_of_request(notice).await
                });
            }
            _ => tracing::debug!(
                profile_id = %request.profile_id,
                "Profile owner has no email; skipping notification"
            ),
        }

        Ok(request)
    }

    /// Approve or deny a pending request. Returns the new status.
    pub async fn respond_to_request(&self, token: &str, approve: bool) -> Result<AccessStatus> {
        let request = self
            .requests
            .get_request(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid or expired access request".to_string()))?;

        let now = self.clock.now();
        if request.needs_expiry(now) {
            self.materialize_expiry(&request, now).await;
            return Err(AppError::Expired("Access request has expired".to_string()));
        }

        match request.status {
            AccessStatus::Pending => {}
            AccessStatus::Expired => {
                return Err(AppError::Expired("Access request has expired".to_string()))
            }
            AccessStatus::Approved | AccessStatus::Denied => {
                return Err(AppError::AlreadyResponded)
            }
        }

        let target = if approve {
            AccessStatus::Approved
        } else {
            AccessStatus::Denied
        };

        let updated = match self.requests.transition_request(token, target, now).await? {
            Transition::Applied(updated) => updated,
            Transition::Stale(current) if current.status == AccessStatus::Expired => {
                return Err(AppError::Expired("Access request has expired".to_string()))
            }
            Transition::Stale(current) => {
                tracing::info!(
                    request_id = %current.id,
                    status = %current.status,
                    "Lost response race; request already answered"
                );
                return Err(AppError::AlreadyResponded);
            }
            Transition::Missing => {
                return Err(AppError::NotFound(
                    "Invalid or expired access request".to_string(),
                ))
            }
        };

        tracing::info!(
            request_id = %updated.id,
            profile_id = %updated.profile_id,
            status = %updated.status,
            "Access request answered"
        );

        if updated.status == AccessStatus::Approved {
            self.notify_requester(&updated);
        }

        Ok(updated.status)
    }

    /// Request as seen by the owner on the approval page.
    pub async fn get_request_details(&self, token: &str) -> Result<RequestDetails> {
        let mut request = self
            .requests
            .get_request(token)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid access request token".to_string()))?;

        let now = self.clock.now();
        if request.needs_expiry(now) {
            self.materialize_expiry(&request, now).await;
            request.status = AccessStatus::Expired;
        }

        let owner = self
            .profiles
            .get_profile(&request.profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?
            .summary();

        Ok(RequestDetails {
            id: request.id,
            profile_id: request.profile_id,
            owner,
            requester_name: request.requester_name,
            requester_email: request.requester_email,
            requester_mobile: request.requester_mobile,
            status: request.status,
            expires_at: request.expires_at,
            created_at: request.created_at,
            responded_at: request.responded_at,
        })
    }

    // ─── Profile Gate ────────────────────────────────────────────

    /// Read a private profile with an approved token.
    ///
    /// Failures other than "unknown token" and "expired" all report the same
    /// message so callers can't probe which part was wrong.
    pub async fn view_profile(&self, profile_id: &str, token: &str) -> Result<ProfileView> {
        let request = self
            .requests
            .get_request(token)
            .await?
            .ok_or_else(|| AppError::NotFound(INVALID_ACCESS_TOKEN.to_string()))?;

        if request.profile_id != profile_id {
            tracing::warn!(
                profile_id,
                token = token_hint(token),
                "Access token presented for a different profile"
            );
            return Err(AppError::Forbidden(INVALID_ACCESS_TOKEN.to_string()));
        }

        let now = self.clock.now();
        if request.needs_expiry(now) {
            self.materialize_expiry(&request, now).await;
            return Err(AppError::Expired("Access token has expired".to_string()));
        }

        match request.status {
            AccessStatus::Approved => {}
            AccessStatus::Expired => {
                return Err(AppError::Expired("Access token has expired".to_string()))
            }
            AccessStatus::Pending | AccessStatus::Denied => {
                return Err(AppError::Forbidden(INVALID_ACCESS_TOKEN.to_string()))
            }
        }

        let profile = self
            .profiles
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        tracing::debug!(
            request_id = %request.id,
            profile_id,
            "Profile viewed with access token"
        );

        Ok(profile.redacted())
    }

    /// Decide what an anonymous visitor gets for a profile link.
    pub async fn check_public_or_gated(&self, profile_id: &str) -> Result<ProfileAccess> {
        let profile = self
            .profiles
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        if profile.is_publicly_visible() {
            Ok(ProfileAccess::Public(profile.redacted()))
        } else {
            Ok(ProfileAccess::Gated(profile.summary()))
        }
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// Persist `expired` for a request whose deadline has passed.
    ///
    /// Idempotent: a record someone else already expired comes back `Stale`.
    async fn materialize_expiry(&self, request: &AccessRequest, now: DateTime<Utc>) {
        match self
            .requests
            .transition_request(&request.access_token, AccessStatus::Expired, now)
            .await
        {
            Ok(Transition::Applied(_)) => tracing::info!(
                request_id = %request.id,
                previous = %request.status,
                "Access request expired"
            ),
            Ok(Transition::Stale(_)) | Ok(Transition::Missing) => {}
            Err(e) => tracing::warn!(
                request_id = %request.id,
                error = %e,
                "Failed to persist expired status"
            ),
        }
    }

    fn notify_requester(&self, request: &AccessRequest) {
        let Some(requester_email) = request.requester_email.clone() else {
            tracing::debug!(
                request_id = %request.id,
                "Requester gave no email; skipping approval notification"
            );
            return;
        };

        let notifier = self.notifier.clone();
        let profiles = self.profiles.clone();
        let profile_id = request.profile_id.clone();
        let requester_name = request.requester_name.clone();
        let access_link = self.access_link(&request.profile_id, &request.access_token);
        let expires_at = request.expires_at;

        spawn_notification("approval", async move {
            let owner_name = match profiles.get_profile(&profile_id).await {
                Ok(Some(profile)) => profile.name,
                Ok(None) => OWNER_NAME_FALLBACK.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Owner lookup failed for approval email");
                    OWNER_NAME_FALLBACK.to_string()
                }
            };

            notifier
                .notify_requester_of_approval(ApprovalNotice {
                    requester_email,
                    requester_name,
                    access_link,
                    owner_name,
                    expires_at,
                })
                .await
        });
    }
}

/// Fire-and-forget a notification; failures are logged, never returned.
fn spawn_notification<F>(kind: &'static str, send: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = send.await {
            tracing::warn!(kind, error = %e, "Failed to send notification");
        }
    });
}
