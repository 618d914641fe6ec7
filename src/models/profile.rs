// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile model (owned by the profile service; read-only here) and the
//! redacted views handed out by the profile gate.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

fn default_true() -> bool {
    true
}

/// Owner-controlled visibility flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    #[serde(default = "default_true")]
    pub show_email: bool,
    #[serde(default = "default_true")]
    pub show_mobile: bool,
    #[serde(default)]
    pub show_date_of_birth: bool,
    #[serde(default = "default_true")]
    pub allow_profile_views: bool,
    #[serde(default = "default_true")]
    pub allow_connection_requests: bool,
    /// Legacy public flag; either this or `Profile::is_public` makes a profile public.
    #[serde(default)]
    pub is_public: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            show_email: true,
            show_mobile: true,
            show_date_of_birth: false,
            allow_profile_views: true,
            allow_connection_requests: true,
            is_public: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SocialLinks {
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub website: String,
}

/// Entry in the "Other Useful Links" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CustomLink {
    pub name: String,
    pub url: String,
}

/// Profile stored in Firestore (document ID is `id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    /// Type of work, shown as the profile's headline
    #[serde(default)]
    pub work_type: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub custom_links: Vec<CustomLink>,
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

impl Profile {
    pub fn is_publicly_visible(&self) -> bool {
        self.is_public || self.privacy.is_public
    }

    /// Fields safe to show anyone, e.g. on the "request access" prompt.
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            name: self.name.clone(),
            work_type: self.work_type.clone(),
        }
    }

    /// Profile filtered by the owner's own privacy flags.
    ///
    /// Applies on top of whatever granted access; an approved token never
    /// unlocks a field the owner has hidden.
    pub fn redacted(&self) -> ProfileView {
        let privacy = &self.privacy;
        ProfileView {
            id: self.id.clone(),
            name: self.name.clone(),
            work_type: self.work_type.clone(),
            bio: self.bio.clone(),
            profile_picture: self.profile_picture.clone(),
            department: self.department.clone(),
            position: self.position.clone(),
            social_links: self.social_links.clone(),
            custom_links: self.custom_links.clone(),
            email: self.email.clone().filter(|_| privacy.show_email),
            mobile: self.mobile.clone().filter(|_| privacy.show_mobile),
            date_of_birth: self
                .date_of_birth
                .clone()
                .filter(|_| privacy.show_date_of_birth),
            allow_connection_requests: privacy.allow_connection_requests,
        }
    }
}

/// Minimal descriptive info, never contact fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub work_type: String,
}

/// Privacy-filtered profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: String,
    pub name: String,
    pub work_type: String,
    pub bio: String,
    pub profile_picture: String,
    pub department: String,
    pub position: String,
    pub social_links: SocialLinks,
    pub custom_links: Vec<CustomLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    pub allow_connection_requests: bool,
}
