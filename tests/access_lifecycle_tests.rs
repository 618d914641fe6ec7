// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access request lifecycle tests over the in-memory store.

use chrono::Duration;
use pring_access::db::AccessRequestStore;
use pring_access::error::AppError;
use pring_access::models::{AccessRequest, AccessStatus, NewAccessRequest};
use pring_access::services::AccessService;
use pring_access::time_utils::ManualClock;
use std::sync::Arc;

mod common;
use common::{harness, next_notice, Sent, PRIVATE_PROFILE, QUIET_PROFILE};

fn by_email(profile_id: &str, email: &str) -> NewAccessRequest {
    NewAccessRequest {
        profile_id: profile_id.to_string(),
        requester_name: Some("Ravi".to_string()),
        requester_email: Some(email.to_string()),
        requester_mobile: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CREATE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_create_issues_pending_request_and_notifies_owner() {
    let mut h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    assert_eq!(request.status, AccessStatus::Pending);
    assert_eq!(request.access_token.len(), 64);
    assert_eq!(request.expires_at, common::start_time() + Duration::hours(24));
    assert!(request.responded_at.is_none());

    match next_notice(&mut h.sent).await {
        Sent::Owner(notice) => {
            assert_eq!(notice.owner_email, "asha@example.com");
            assert_eq!(notice.requester_contact, "a@x.com");
            assert_eq!(notice.profile_type, "Architect");
            assert!(notice
                .approval_link
                .ends_with(&format!("/approve-access?token={}", request.access_token)));
        }
        other => panic!("expected owner notice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_normalizes_requester_email() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "  A@X.Com "))
        .await
        .unwrap();

    assert_eq!(request.requester_email.as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn test_create_requires_a_contact() {
    let h = harness();

    let err = h
        .service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_name: Some("Ravi".to_string()),
            requester_email: Some("   ".to_string()),
            requester_mobile: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("email or mobile")));
    assert_eq!(h.store.request_count(), 0);
}

#[tokio::test]
async fn test_create_rejects_malformed_contacts() {
    let h = harness();

    let bad_email = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "not-an-email"))
        .await;
    assert!(matches!(bad_email, Err(AppError::Validation(_))));

    let bad_mobile = h
        .service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_mobile: Some("12-34".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(bad_mobile, Err(AppError::Validation(_))));
    assert_eq!(h.store.request_count(), 0);
}

#[tokio::test]
async fn test_create_for_unknown_profile_is_not_found() {
    let h = harness();

    let err = h
        .service
        .create_request(by_email("missing-profile", "a@x.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_owner_without_email_is_skipped_silently() {
    let mut h = harness();

    let request = h
        .service
        .create_request(by_email(QUIET_PROFILE, "a@x.com"))
        .await
        .unwrap();
    assert_eq!(request.status, AccessStatus::Pending);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.sent.try_recv().is_err());
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_create() {
    let store = common::seeded_store();
    let clock = Arc::new(ManualClock::new(common::start_time()));
    let service = AccessService::new(
        store.clone(),
        store.clone(),
        Arc::new(common::FailingNotifier),
        clock,
        "http://localhost:3000",
    );

    let request = service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .expect("create must succeed even when email fails");

    let status = service
        .respond_to_request(&request.access_token, true)
        .await
        .expect("approval must succeed even when email fails");
    assert_eq!(status, AccessStatus::Approved);
}

// ═══════════════════════════════════════════════════════════════════════════
// DUPLICATE GUARD
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_duplicate_pending_request_conflicts() {
    let h = harness();

    h.service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    let err = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "A@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.store.request_count(), 1);
}

#[tokio::test]
async fn test_duplicate_guard_matches_on_mobile() {
    let h = harness();
    let mobile = Some("+1 (555) 010-0000".to_string());

    h.service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_mobile: mobile.clone(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = h
        .service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_email: Some("other@x.com".to_string()),
            requester_mobile: mobile,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_duplicate_guard_ignores_mobile_spacing() {
    let h = harness();

    let first = h
        .service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_mobile: Some("+1 555 010 0000".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.requester_mobile.as_deref(), Some("+15550100000"));

    let err = h
        .service
        .create_request(NewAccessRequest {
            profile_id: PRIVATE_PROFILE.to_string(),
            requester_mobile: Some("+15550100000".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.store.request_count(), 1);
}

#[tokio::test]
async fn test_different_requesters_do_not_conflict() {
    let h = harness();

    h.service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();
    h.service
        .create_request(by_email(PRIVATE_PROFILE, "b@x.com"))
        .await
        .unwrap();

    assert_eq!(h.store.request_count(), 2);
}

#[tokio::test]
async fn test_new_request_allowed_after_first_is_answered() {
    for approve in [true, false] {
        let h = harness();

        let first = h
            .service
            .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
            .await
            .unwrap();
        h.service
            .respond_to_request(&first.access_token, approve)
            .await
            .unwrap();

        let second = h
            .service
            .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
            .await
            .unwrap();
        assert_ne!(second.access_token, first.access_token);
    }
}

#[tokio::test]
async fn test_new_request_allowed_after_first_expires_unread() {
    let h = harness();

    let first = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    // Nobody read the first request, so it is still stored as pending.
    h.clock.advance(Duration::hours(25));

    let second = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();
    assert_ne!(second.access_token, first.access_token);
}

// ═══════════════════════════════════════════════════════════════════════════
// RESPOND
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_approve_sets_responded_at_and_notifies_requester() {
    let mut h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();
    let _owner_notice = next_notice(&mut h.sent).await;

    h.clock.advance(Duration::hours(2));
    let status = h
        .service
        .respond_to_request(&request.access_token, true)
        .await
        .unwrap();
    assert_eq!(status, AccessStatus::Approved);

    let stored = h
        .store
        .get_request(&request.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AccessStatus::Approved);
    assert_eq!(
        stored.responded_at,
        Some(common::start_time() + Duration::hours(2))
    );

    match next_notice(&mut h.sent).await {
        Sent::Approval(notice) => {
            assert_eq!(notice.requester_email, "a@x.com");
            assert_eq!(notice.owner_name, "Asha Rao");
            assert_eq!(notice.expires_at, request.expires_at);
            assert!(notice.access_link.ends_with(&format!(
                "/profile/{}?token={}",
                PRIVATE_PROFILE, request.access_token
            )));
        }
        other => panic!("expected approval notice, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deny_sends_nothing() {
    let mut h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();
    let _owner_notice = next_notice(&mut h.sent).await;

    let status = h
        .service
        .respond_to_request(&request.access_token, false)
        .await
        .unwrap();
    assert_eq!(status, AccessStatus::Denied);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.sent.try_recv().is_err());
}

#[tokio::test]
async fn test_second_response_fails_and_first_sticks() {
    for (first, second) in [(true, false), (false, true)] {
        let h = harness();

        let request = h
            .service
            .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
            .await
            .unwrap();

        h.service
            .respond_to_request(&request.access_token, first)
            .await
            .unwrap();

        let err = h
            .service
            .respond_to_request(&request.access_token, second)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyResponded));

        let stored = h
            .store
            .get_request(&request.access_token)
            .await
            .unwrap()
            .unwrap();
        let expected = if first {
            AccessStatus::Approved
        } else {
            AccessStatus::Denied
        };
        assert_eq!(stored.status, expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_responses_produce_single_outcome() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..8 {
        let service = h.service.clone();
        let token = request.access_token.clone();
        handles.push(tokio::spawn(async move {
            service.respond_to_request(&token, i % 2 == 0).await
        }));
    }

    let mut winners = vec![];
    for handle in handles {
        match handle.await.unwrap() {
            Ok(status) => winners.push(status),
            Err(AppError::AlreadyResponded) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(winners.len(), 1, "exactly one response must win");
    let stored = h
        .store
        .get_request(&request.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, winners[0]);
}

/// Service over a store where another writer wins between read and write.
fn lost_race_service(current: AccessStatus) -> (AccessService, String) {
    let profiles = common::seeded_store();
    let snapshot = AccessRequest::new_pending(
        "req-1".to_string(),
        "a".repeat(64),
        by_email(PRIVATE_PROFILE, "a@x.com"),
        common::start_time(),
    );
    let token = snapshot.access_token.clone();
    let service = AccessService::new(
        Arc::new(common::LostRaceStore { snapshot, current }),
        profiles,
        Arc::new(common::FailingNotifier),
        Arc::new(ManualClock::new(common::start_time())),
        "http://localhost:3000",
    );
    (service, token)
}

#[tokio::test]
async fn test_losing_response_race_reports_already_responded() {
    for winner in [AccessStatus::Approved, AccessStatus::Denied] {
        let (service, token) = lost_race_service(winner);

        let err = service.respond_to_request(&token, true).await.unwrap_err();
        assert!(
            matches!(err, AppError::AlreadyResponded),
            "lost to {}: {:?}",
            winner,
            err
        );
    }
}

#[tokio::test]
async fn test_losing_race_to_expiry_reports_expired() {
    let (service, token) = lost_race_service(AccessStatus::Expired);

    let err = service.respond_to_request(&token, false).await.unwrap_err();
    assert!(matches!(err, AppError::Expired(_)));
}

#[tokio::test]
async fn test_respond_with_unknown_token_is_not_found() {
    let h = harness();

    let err = h
        .service
        .respond_to_request(&"0".repeat(64), true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_respond_after_deadline_expires_request() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(24) + Duration::seconds(1));

    let err = h
        .service
        .respond_to_request(&request.access_token, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Expired(_)));

    let stored = h
        .store
        .get_request(&request.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AccessStatus::Expired);
    assert!(stored.responded_at.is_none());

    // And stays expired.
    let again = h
        .service
        .respond_to_request(&request.access_token, false)
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::Expired(_)));
}

#[tokio::test]
async fn test_respond_exactly_at_deadline_is_allowed() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    h.clock.set(request.expires_at);

    let status = h
        .service
        .respond_to_request(&request.access_token, true)
        .await
        .unwrap();
    assert_eq!(status, AccessStatus::Approved);
}

// ═══════════════════════════════════════════════════════════════════════════
// DETAILS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_details_show_owner_summary_and_requester() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    let details = h
        .service
        .get_request_details(&request.access_token)
        .await
        .unwrap();

    assert_eq!(details.id, request.id);
    assert_eq!(details.owner.name, "Asha Rao");
    assert_eq!(details.owner.work_type, "Architect");
    assert_eq!(details.requester_email.as_deref(), Some("a@x.com"));
    assert_eq!(details.requester_name.as_deref(), Some("Ravi"));
    assert_eq!(details.status, AccessStatus::Pending);
}

#[tokio::test]
async fn test_details_unknown_token_is_not_found() {
    let h = harness();

    let err = h
        .service
        .get_request_details("no-such-token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_details_materialize_expiry_idempotently() {
    let h = harness();

    let request = h
        .service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(30));

    for _ in 0..3 {
        let details = h
            .service
            .get_request_details(&request.access_token)
            .await
            .unwrap();
        assert_eq!(details.status, AccessStatus::Expired);
    }

    let stored = h
        .store
        .get_request(&request.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AccessStatus::Expired);
}

#[tokio::test]
async fn test_details_report_expired_even_if_write_fails() {
    let store = common::seeded_store();
    let clock = Arc::new(ManualClock::new(common::start_time()));
    let service = AccessService::new(
        Arc::new(common::ExpiryWriteFailingStore {
            inner: store.clone(),
        }),
        store.clone(),
        Arc::new(pring_access::services::LogNotifier),
        clock.clone(),
        "http://localhost:3000",
    );

    let request = service
        .create_request(by_email(PRIVATE_PROFILE, "a@x.com"))
        .await
        .unwrap();
    clock.advance(Duration::hours(25));

    let details = service
        .get_request_details(&request.access_token)
        .await
        .unwrap();
    assert_eq!(details.status, AccessStatus::Expired);

    let view = service
        .view_profile(PRIVATE_PROFILE, &request.access_token)
        .await
        .unwrap_err();
    assert!(matches!(view, AppError::Expired(_)));

    // The write failed, so storage still says pending.
    let stored = store
        .get_request(&request.access_token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AccessStatus::Pending);
}
