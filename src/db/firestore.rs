// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Access requests (document ID is the access token)
//! - Profiles (read, plus upsert for seeding)

use crate::db::{collections, AccessRequestStore, ProfileStore, Transition};
use crate::error::AppError;
use crate::models::{AccessRequest, AccessStatus, Profile};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Profile Operations ──────────────────────────────────────

    /// Get a profile by ID.
    pub async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(profile_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a profile.
    ///
    /// Profiles are owned by the registration flow; this exists for seeding
    /// the emulator and local environments.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Access Request Operations ───────────────────────────────

    /// Get an access request by its token.
    pub async fn get_request(&self, token: &str) -> Result<Option<AccessRequest>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACCESS_REQUESTS)
            .obj()
            .one(token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create an access request document.
    ///
    /// Uses create semantics so an existing token is never overwritten.
    /// Returns `false` if a document with this token already exists.
    pub async fn insert_request(&self, request: &AccessRequest) -> Result<bool, AppError> {
        let result: Result<(), firestore::errors::FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::ACCESS_REQUESTS)
            .document_id(&request.access_token)
            .object(request)
            .execute()
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(firestore::errors::FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Get all pending requests for a profile.
    ///
    /// Expiry and contact matching are evaluated by the caller against its
    /// own clock.
    pub async fn find_pending_for_profile(
        &self,
        profile_id: &str,
    ) -> Result<Vec<AccessRequest>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACCESS_REQUESTS)
            .filter(|q| {
                q.for_all([
                    q.field("profile_id").eq(profile_id),
                    q.field("status").eq(AccessStatus::Pending.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically move a request to `to` if its stored status allows it.
    ///
    /// The read and the write run in one Firestore transaction. If another
    /// writer changes the document first, Firestore retries the closure with
    /// fresh data, so a late approval can never clobber a denial (or the
    /// reverse).
    pub async fn transition_request(
        &self,
        token: &str,
        to: AccessStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, AppError> {
        let token = token.to_string();

        let outcome = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let token = token.clone();
                Box::pin(async move {
                    let current: Option<AccessRequest> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ACCESS_REQUESTS)
                        .obj()
                        .one(&token)
                        .await?;

                    let Some(mut request) = current else {
                        return Ok(Transition::Missing);
                    };

                    if !request.status.can_transition_to(to) {
                        return Ok(Transition::Stale(request));
                    }

                    request.apply_transition(to, now);

                    db.fluent()
                        .update()
                        .in_col(collections::ACCESS_REQUESTS)
                        .document_id(&token)
                        .object(&request)
                        .add_to_transaction(transaction)?;

                    Ok(Transition::Applied(request))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Status transition failed: {}", e)))?;

        if let Transition::Applied(request) = &outcome {
            tracing::debug!(
                request_id = %request.id,
                status = %request.status,
                "Access request transition committed"
            );
        }

        Ok(outcome)
    }
}

impl AccessRequestStore for FirestoreDb {
    fn get_request<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<Option<AccessRequest>, AppError>> {
        Box::pin(FirestoreDb::get_request(self, token))
    }

    fn insert_request<'a>(
        &'a self,
        request: &'a AccessRequest,
    ) -> BoxFuture<'a, Result<bool, AppError>> {
        Box::pin(FirestoreDb::insert_request(self, request))
    }

    fn find_pending_for_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AccessRequest>, AppError>> {
        Box::pin(FirestoreDb::find_pending_for_profile(self, profile_id))
    }

    fn transition_request<'a>(
        &'a self,
        token: &'a str,
        to: AccessStatus,
        now: DateTime<Utc>,
    ) -> BoxFuture<'a, Result<Transition, AppError>> {
        Box::pin(FirestoreDb::transition_request(self, token, to, now))
    }
}

impl ProfileStore for FirestoreDb {
    fn get_profile<'a>(
        &'a self,
        profile_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Profile>, AppError>> {
        Box::pin(FirestoreDb::get_profile(self, profile_id))
    }
}
