// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email notifications for access requests.
//!
//! Delivery is best effort: callers spawn these and only log failures.

use crate::error::AppError;
use crate::models::access_request::token_hint;
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use futures_util::future::{self, BoxFuture};
use serde::Serialize;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Tells a profile owner that someone wants to see their profile.
#[derive(Debug, Clone)]
pub struct OwnerNotice {
    pub owner_email: String,
    pub owner_name: String,
    pub profile_type: String,
    pub requester_name: Option<String>,
    pub requester_contact: String,
    pub approval_link: String,
    pub expires_at: DateTime<Utc>,
}

/// Tells a requester their access was approved.
#[derive(Debug, Clone)]
pub struct ApprovalNotice {
    pub requester_email: String,
    pub requester_name: Option<String>,
    pub access_link: String,
    pub owner_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Outbound notification channel.
pub trait Notifier: Send + Sync {
    fn notify_owner_of_request(&self, notice: OwnerNotice) -> BoxFuture<'_, Result<(), AppError>>;

    fn notify_requester_of_approval(
        &self,
        notice: ApprovalNotice,
    ) -> BoxFuture<'_, Result<(), AppError>>;
}

/// Logs notices instead of sending them. Used when no email API key is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_owner_of_request(&self, notice: OwnerNotice) -> BoxFuture<'_, Result<(), AppError>> {
        tracing::info!(
            to = %notice.owner_email,
            requester = %notice.requester_contact,
            approval_link = %redact_link(&notice.approval_link),
            expires_at = %format_utc_rfc3339(notice.expires_at),
            "Email disabled; access request notice not sent"
        );
        Box::pin(future::ready(Ok(())))
    }

    fn notify_requester_of_approval(
        &self,
        notice: ApprovalNotice,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        tracing::info!(
            to = %notice.requester_email,
            access_link = %redact_link(&notice.access_link),
            expires_at = %format_utc_rfc3339(notice.expires_at),
            "Email disabled; approval notice not sent"
        );
        Box::pin(future::ready(Ok(())))
    }
}

/// Link with its bearer token cut down to the log-safe prefix.
fn redact_link(link: &str) -> String {
    match link.split_once("token=") {
        Some((base, token)) => format!("{}token={}...", base, token_hint(token)),
        None => link.to_string(),
    }
}

/// Sends email through the Resend HTTP API.
#[derive(Clone)]
pub struct ResendNotifier {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: String,
}

impl ResendNotifier {
    pub fn new(api_key: String, from: String) -> Self {
        Self::with_api_url(api_key, from, RESEND_API_URL.to_string())
    }

    /// Point at a different endpoint (e.g. a local mock server).
    pub fn with_api_url(api_key: String, from: String, api_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    async fn send(&self, to: &str, subject: &str, html: String) -> Result<(), AppError> {
        let body = SendEmailRequest {
            from: &self.from,
            to: [to],
            subject,
            html,
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Email(format!("HTTP {}: {}", status, text)));
        }

        tracing::debug!(subject, "Email accepted for delivery");
        Ok(())
    }
}

impl Notifier for ResendNotifier {
    fn notify_owner_of_request(&self, notice: OwnerNotice) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            let html = owner_notice_html(&notice);
            self.send(
                &notice.owner_email,
                "Access Request for Your QR Profile",
                html,
            )
            .await
        })
    }

    fn notify_requester_of_approval(
        &self,
        notice: ApprovalNotice,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async move {
            let html = approval_notice_html(&notice);
            self.send(
                &notice.requester_email,
                "Profile Access Approved - View Now",
                html,
            )
            .await
        })
    }
}

/// Minimal HTML escaping for user-supplied text.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn owner_notice_html(notice: &OwnerNotice) -> String {
    let requester_line = notice
        .requester_name
        .as_deref()
        .map(|name| format!("<p><strong>Requester:</strong> {}</p>", escape_html(name)))
        .unwrap_or_default();

    format!(
        "<p>Hi {owner},</p>\
         <p>Someone has requested access to view your professional QR profile.</p>\
         <p><strong>Profile:</strong> {profile}</p>\
         {requester_line}\
         <p><strong>Contact:</strong> {contact}</p>\
         <p><strong>Expires:</strong> {expires}</p>\
         <p><a href=\"{link}\">Review Request</a></p>\
         <p>Only approve access if you recognize this request. \
         The access will automatically expire in 24 hours.</p>",
        owner = escape_html(&notice.owner_name),
        profile = escape_html(&notice.profile_type),
        contact = escape_html(&notice.requester_contact),
        expires = format_utc_rfc3339(notice.expires_at),
        link = escape_html(&notice.approval_link),
    )
}

fn approval_notice_html(notice: &ApprovalNotice) -> String {
    let greeting = match notice.requester_name.as_deref() {
        Some(name) => format!("Hi {},", escape_html(name)),
        None => "Hello,".to_string(),
    };

    format!(
        "<p>{greeting}</p>\
         <p><strong>{owner}</strong> has approved your request to view their \
         professional profile.</p>\
         <p><a href=\"{link}\">View Profile Now</a></p>\
         <p>This access will expire on {expires}.</p>",
        owner = escape_html(&notice.owner_name),
        link = escape_html(&notice.access_link),
        expires = format_utc_rfc3339(notice.expires_at),
    )
}
