// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: store traits plus Firestore and in-memory backends.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{AccessRequest, AccessStatus, Profile};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

/// Collection names as constants.
pub mod collections {
    /// Access requests, keyed by access token
    pub const ACCESS_REQUESTS: &str = "access_requests";
    pub const PROFILES: &str = "profiles";
}

/// Result of a conditional status transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The write happened; carries the updated record.
    Applied(AccessRequest),
    /// Current status does not allow the transition; carries the record as stored.
    Stale(AccessRequest),
    /// No request with that token.
    Missing,
}

/// Persistence for access requests.
///
/// Every mutation addresses one record by token. `transition_request` is a
/// conditional write: it only changes the status if the stored status is
/// still one of `to.predecessors()`.
pub trait AccessRequestStore: Send + Sync {
    fn get_request<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<AccessRequest>, AppError>>;

    /// Insert a new request. Returns `false` if the token is already taken.
    fn insert_request<'a>(
        &'a self,
        request: &'a AccessRequest,
    ) -> BoxFuture<'a, Result<bool, AppError>>;

    /// All requests for a profile that are stored as pending.
    fn find_pending_for_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AccessRequest>, AppError>>;

    fn transition_request<'a>(
        &'a self,
        token: &'a str,
        to: AccessStatus,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Transition, AppError>>;
}

/// Read access to profiles.
pub trait ProfileStore: Send + Sync {
    fn get_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Profile>, AppError>>;
}
