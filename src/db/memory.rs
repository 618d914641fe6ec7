// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local store for local development and tests.
//!
//! Each `DashMap` shard lock covers a whole record, which makes the
//! read-check-write in `transition_request` atomic per token.

use crate::db::{AccessRequestStore, ProfileStore, Transition};
use crate::error::AppError;
use crate::models::{AccessRequest, AccessStatus, Profile};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{self, BoxFuture};

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Keyed by access token
    requests: DashMap<String, AccessRequest>,
    profiles: DashMap<String, Profile>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    pub fn remove_profile(&self, profile_id: &str) -> Option<Profile> {
        self.profiles.remove(profile_id).map(|(_, p)| p)
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    fn transition(&self, token: &str, to: AccessStatus, now: DateTime<Utc>) -> Transition {
        match self.requests.get_mut(token) {
            None => Transition::Missing,
            Some(mut entry) => {
                if !entry.status.can_transition_to(to) {
                    return Transition::Stale(entry.clone());
                }
                entry.apply_transition(to, now);
                Transition::Applied(entry.clone())
            }
        }
    }
}

impl AccessRequestStore for MemoryStore {
    fn get_request<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<AccessRequest>, AppError>> {
        let found = self.requests.get(token).map(|r| r.clone());
        Box::pin(future::ready(Ok(found)))
    }

    fn insert_request<'a>(
        &'a self,
        request: &'a AccessRequest,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        let inserted = match self.requests.entry(request.access_token.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                true
            }
        };
        Box::pin(future::ready(Ok(inserted)))
    }

    fn find_pending_for_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AccessRequest>, AppError>> {
        let pending = self
            .requests
            .iter()
            .filter(|r| r.profile_id == profile_id && r.status == AccessStatus::Pending)
            .map(|r| r.clone())
            .collect();
        Box::pin(future::ready(Ok(pending)))
    }

    fn transition_request<'a>(
        &'a self,
        token: &'a str,
        to: AccessStatus,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Transition, AppError>> {
        Box::pin(future::ready(Ok(self.transition(token, to, now))))
    }
}

impl ProfileStore for MemoryStore {
    fn get_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Profile>, AppError>> {
        let found = self.profiles.get(profile_id).map(|p| p.clone());
        Box::pin(future::ready(Ok(found)))
    }
}
