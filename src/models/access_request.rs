// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access request model and its status state machine.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError};

/// Time a request stays answerable, and after approval, readable.
pub const REQUEST_TTL_HOURS: i64 = 24;

pub fn request_ttl() -> Duration {
    Duration::hours(REQUEST_TTL_HOURS)
}

/// Lifecycle status of an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Approved,
    Denied,
    Expired,
}

impl AccessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Approved => "approved",
            AccessStatus::Denied => "denied",
            AccessStatus::Expired => "expired",
        }
    }

    /// Statuses from which a transition into `self` is allowed.
    pub fn predecessors(self) -> &'static [AccessStatus] {
        match self {
            AccessStatus::Pending => &[],
            AccessStatus::Approved | AccessStatus::Denied => &[AccessStatus::Pending],
            AccessStatus::Expired => &[AccessStatus::Pending, AccessStatus::Approved],
        }
    }

    pub fn can_transition_to(self, to: AccessStatus) -> bool {
        to.predecessors().contains(&self)
    }

    /// Statuses that still have a time-triggered expiry ahead of them.
    pub fn is_time_boxed(self) -> bool {
        matches!(self, AccessStatus::Pending | AccessStatus::Approved)
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access request stored in Firestore (document ID is the access token).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: String,
    pub profile_id: String,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub requester_mobile: Option<String>,
    /// Bearer credential for both the owner's response and the requester's read
    pub access_token: String,
    pub status: AccessStatus,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    #[serde(with = "firestore::serialize_as_optional_timestamp")]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Build a fresh pending request from validated input.
    pub fn new_pending(
        id: String,
        access_token: String,
        input: NewAccessRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            profile_id: input.profile_id,
            requester_name: input.requester_name,
            requester_email: input.requester_email,
            requester_mobile: input.requester_mobile,
            access_token,
            status: AccessStatus::Pending,
            expires_at: now + request_ttl(),
            responded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// True when a read at `now` must materialize the `expired` transition.
    pub fn needs_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status.is_time_boxed() && self.is_past_expiry(now)
    }

    /// Contact matches when either the email or the mobile is the same.
    pub fn matches_contact(&self, email: Option<&str>, mobile: Option<&str>) -> bool {
        let email_match = matches!(
            (self.requester_email.as_deref(), email),
            (Some(a), Some(b)) if a == b
        );
        let mobile_match = matches!(
            (self.requester_mobile.as_deref(), mobile),
            (Some(a), Some(b)) if compact_mobile(a) == compact_mobile(b)
        );
        email_match || mobile_match
    }

    /// Whether this request prevents the same requester from submitting again.
    pub fn blocks_duplicate(
        &self,
        email: Option<&str>,
        mobile: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        self.status == AccessStatus::Pending
            && !self.is_past_expiry(now)
            && self.matches_contact(email, mobile)
    }

    /// Apply a transition in memory. Callers check `can_transition_to` first.
    pub fn apply_transition(&mut self, to: AccessStatus, now: DateTime<Utc>) {
        self.status = to;
        self.updated_at = now;
        if matches!(to, AccessStatus::Approved | AccessStatus::Denied) {
            self.responded_at = Some(now);
        }
    }

    /// Best contact to show the owner (email preferred).
    pub fn requester_contact(&self) -> Option<&str> {
        self.requester_email
            .as_deref()
            .or(self.requester_mobile.as_deref())
    }

    /// Token prefix safe to put in logs.
    pub fn token_hint(&self) -> &str {
        token_hint(&self.access_token)
    }
}

/// First eight characters of a token, for log correlation.
pub fn token_hint(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

/// Input for creating an access request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_contact_present"))]
pub struct NewAccessRequest {
    #[validate(length(min = 1, max = 128, message = "Profile ID is required"))]
    pub profile_id: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub requester_name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Please enter a valid email address"))]
    pub requester_email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_mobile"))]
    pub requester_mobile: Option<String>,
}

impl NewAccessRequest {
    /// Trim everything, lowercase the email, strip whitespace from the
    /// mobile, and drop blank fields.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            profile_id: self.profile_id.trim().to_string(),
            requester_name: clean(self.requester_name),
            requester_email: clean(self.requester_email).map(|e| e.to_lowercase()),
            requester_mobile: clean(self.requester_mobile).map(|m| compact_mobile(&m)),
        }
    }
}

fn validate_contact_present(input: &NewAccessRequest) -> Result<(), ValidationError> {
    if input.requester_email.is_none() && input.requester_mobile.is_none() {
        return Err(ValidationError::new("contact_required")
            .with_message(Cow::Borrowed("Either email or mobile number is required")));
    }
    Ok(())
}

/// Mobile number with all whitespace removed; the form stored and compared.
pub fn compact_mobile(mobile: &str) -> String {
    mobile.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Optional leading `+`, then 10-15 digits, hyphens or parentheses.
/// Whitespace is ignored.
fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    let compact = compact_mobile(mobile);
    let body = compact.strip_prefix('+').unwrap_or(&compact);
    let len = body.chars().count();
    let allowed = body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '(' | ')'));

    if allowed && (10..=15).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("mobile")
            .with_message(Cow::Borrowed("Please enter a valid mobile number")))
    }
}
