// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, TimeZone, Utc};
use futures_util::future::{self, BoxFuture};
use pring_access::config::Config;
use pring_access::db::{AccessRequestStore, FirestoreDb, MemoryStore, Transition};
use pring_access::error::AppError;
use pring_access::models::{
    AccessRequest, AccessStatus, PrivacySettings, Profile, SocialLinks,
};
use pring_access::routes::create_router;
use pring_access::services::{AccessService, ApprovalNotice, Notifier, OwnerNotice};
use pring_access::time_utils::ManualClock;
use pring_access::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const PRIVATE_PROFILE: &str = "profile-private";
pub const PUBLIC_PROFILE: &str = "profile-public";
pub const QUIET_PROFILE: &str = "profile-no-email";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// Notice captured by [`RecordingNotifier`].
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Sent {
    Owner(OwnerNotice),
    Approval(ApprovalNotice),
}

/// Notifier that forwards every notice to a channel.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Sent>,
}

impl Notifier for RecordingNotifier {
    fn notify_owner_of_request(&self, notice: OwnerNotice) -> BoxFuture<'_, Result<(), AppError>> {
        let _ = self.tx.send(Sent::Owner(notice));
        Box::pin(future::ready(Ok(())))
    }

    fn notify_requester_of_approval(
        &self,
        notice: ApprovalNotice,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        let _ = self.tx.send(Sent::Approval(notice));
        Box::pin(future::ready(Ok(())))
    }
}

/// Notifier whose every send fails.
#[allow(dead_code)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify_owner_of_request(&self, _notice: OwnerNotice) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(future::ready(Err(AppError::Email("smtp down".to_string()))))
    }

    fn notify_requester_of_approval(
        &self,
        _notice: ApprovalNotice,
    ) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(future::ready(Err(AppError::Email("smtp down".to_string()))))
    }
}

/// Store that reads normally but fails every expiry write.
#[allow(dead_code)]
pub struct ExpiryWriteFailingStore {
    pub inner: Arc<MemoryStore>,
}

impl AccessRequestStore for ExpiryWriteFailingStore {
    fn get_request<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<AccessRequest>, AppError>> {
        self.inner.get_request(token)
    }

    fn insert_request<'a>(
        &'a self,
        request: &'a AccessRequest,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        self.inner.insert_request(request)
    }

    fn find_pending_for_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AccessRequest>, AppError>> {
        self.inner.find_pending_for_profile(profile_id)
    }

    fn transition_request<'a>(
        &'a self,
        token: &'a str,
        to: AccessStatus,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Transition, AppError>> {
        if to == AccessStatus::Expired {
            return Box::pin(future::ready(Err(AppError::Database(
                "write unavailable".to_string(),
            ))));
        }
        self.inner.transition_request(token, to, now)
    }
}

/// Store whose reads always show `snapshot` as pending while every
/// conditional write finds the record already moved to `current`.
/// Models another writer landing between the read and the write.
#[allow(dead_code)]
pub struct LostRaceStore {
    pub snapshot: AccessRequest,
    pub current: AccessStatus,
}

impl AccessRequestStore for LostRaceStore {
    fn get_request<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<AccessRequest>, AppError>> {
        let found = (token == self.snapshot.access_token).then(|| self.snapshot.clone());
        Box::pin(future::ready(Ok(found)))
    }

    fn insert_request<'a>(
        &'a self,
        _request: &'a AccessRequest,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        Box::pin(future::ready(Ok(false)))
    }

    fn find_pending_for_profile<'a>(
        &'a self,
        _profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AccessRequest>, AppError>> {
        Box::pin(future::ready(Ok(vec![self.snapshot.clone()])))
    }

    fn transition_request<'a>(
        &'a self,
        _token: &'a str,
        _to: AccessStatus,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Transition, AppError>> {
        let mut stored = self.snapshot.clone();
        stored.apply_transition(self.current, now);
        Box::pin(future::ready(Ok(Transition::Stale(stored))))
    }
}

#[allow(dead_code)]
pub fn test_profile(id: &str, is_public: bool) -> Profile {
    Profile {
        id: id.to_string(),
        name: "Asha Rao".to_string(),
        email: Some("asha@example.com".to_string()),
        mobile: Some("+91 98765 43210".to_string()),
        date_of_birth: Some("1990-04-02".to_string()),
        work_type: "Architect".to_string(),
        bio: "Designs libraries.".to_string(),
        profile_picture: String::new(),
        department: "Design".to_string(),
        position: "Lead".to_string(),
        social_links: SocialLinks {
            linkedin: "https://linkedin.com/in/asha".to_string(),
            ..Default::default()
        },
        custom_links: vec![],
        privacy: PrivacySettings::default(),
        is_public,
    }
}

/// Memory store seeded with one private, one public and one email-less profile.
#[allow(dead_code)]
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.upsert_profile(test_profile(PRIVATE_PROFILE, false));
    store.upsert_profile(test_profile(PUBLIC_PROFILE, true));
    store.upsert_profile(Profile {
        email: None,
        ..test_profile(QUIET_PROFILE, false)
    });
    store
}

/// Everything a lifecycle test needs.
#[allow(dead_code)]
pub struct Harness {
    pub service: AccessService,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub sent: mpsc::UnboundedReceiver<Sent>,
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    let store = seeded_store();
    let clock = Arc::new(ManualClock::new(start_time()));
    let (tx, sent) = mpsc::unbounded_channel();

    let service = AccessService::new(
        store.clone(),
        store.clone(),
        Arc::new(RecordingNotifier { tx }),
        clock.clone(),
        Config::default().app_url,
    );

    Harness {
        service,
        store,
        clock,
        sent,
    }
}

/// Wait for the next spawned notification.
#[allow(dead_code)]
pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Sent>) -> Sent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notifier channel closed")
}

/// Create a test app over the in-memory store.
/// Returns the router plus the handles needed to steer it.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Harness) {
    let h = harness();
    let state = Arc::new(AppState {
        config: Config::default(),
        access: h.service.clone(),
    });

    (create_router(state.clone()), state, h)
}
