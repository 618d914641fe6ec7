// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod access_request;
pub mod profile;

pub use access_request::{AccessRequest, AccessStatus, NewAccessRequest};
pub use profile::{CustomLink, PrivacySettings, Profile, ProfileSummary, ProfileView, SocialLinks};
