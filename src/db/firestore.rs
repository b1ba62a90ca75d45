// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides:
//! - Users, with an email index document to enforce uniqueness
//! - Refresh-token set updates run as read-modify-write transactions
//! - Generic document CRUD for the other collections

use crate::db::{collections, Document, Repository, UserStore};
use crate::error::AppError;
use crate::models::{TokenSetUpdate, User};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Email index document: `user_emails/{urlencoded email}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndex {
    user_id: String,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
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
        // The emulator accepts any bearer token; hand it an unsigned one.
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

        tracing::info!(project = project_id, "Connected to Firestore emulator");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation returns `AppError::Database`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Load a user, apply `mutate`, and write it back in one transaction.
    ///
    /// Firestore aborts and retries the closure if the user document changes
    /// between the read and the commit, so `mutate` always sees the latest
    /// stored token set.
    async fn mutate_user<R, F>(&self, user_id: &str, missing: R, mutate: F) -> Result<R, AppError>
    where
        R: Clone + Send + Sync + 'static,
        F: Fn(&mut User) -> R + Clone + Send + Sync + 'static,
    {
        let user_id = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user_id = user_id.clone();
                let missing = missing.clone();
                let mutate = mutate.clone();

                Box::pin(async move {
                    let current: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let Some(mut user) = current else {
                        return Ok(missing);
                    };

                    let outcome = mutate(&mut user);

                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user_id)
                        .object(&user)
                        .add_to_transaction(transaction)?;

                    Ok(outcome)
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("User transaction failed: {}", e)))
    }
}

#[async_trait]
impl UserStore for FirestoreDb {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let index: Option<EmailIndex> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(urlencoding::encode(email).as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match index {
            Some(index) => self.find_by_id(&index.user_id).await,
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let email_key = urlencoding::encode(&user.email).into_owned();
        let user = user.clone();

        let created = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let email_key = email_key.clone();
                let user = user.clone();

                Box::pin(async move {
                    let existing: Option<EmailIndex> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USER_EMAILS)
                        .obj()
                        .one(&email_key)
                        .await?;

                    if existing.is_some() {
                        return Ok(false);
                    }

                    db.fluent()
                        .update()
                        .in_col(collections::USER_EMAILS)
                        .document_id(&email_key)
                        .object(&EmailIndex {
                            user_id: user.id.clone(),
                        })
                        .add_to_transaction(transaction)?;

                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user.id)
                        .object(&user)
                        .add_to_transaction(transaction)?;

                    Ok(true)
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("User creation failed: {}", e)))?;

        if created {
            tracing::info!(user_id = %user.id, "User created");
            Ok(())
        } else {
            Err(AppError::Conflict("user already exists".to_string()))
        }
    }

    async fn push_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, AppError> {
        let token = token.to_string();
        self.mutate_user(user_id, false, move |user| {
            user.refresh_tokens.push(token.clone());
            true
        })
        .await
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
        replacement: &str,
    ) -> Result<TokenSetUpdate, AppError> {
        let presented = presented.to_string();
        let replacement = replacement.to_string();
        self.mutate_user(user_id, TokenSetUpdate::UserMissing, move |user| {
            user.rotate_refresh_token(&presented, replacement.clone())
        })
        .await
    }

    async fn revoke_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
    ) -> Result<TokenSetUpdate, AppError> {
        let presented = presented.to_string();
        self.mutate_user(user_id, TokenSetUpdate::UserMissing, move |user| {
            user.revoke_refresh_token(&presented)
        })
        .await
    }

    async fn add_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError> {
        let doc_id = doc_id.to_string();
        self.mutate_user(user_id, false, move |user| {
            if !user.saved_activities.contains(&doc_id) {
                user.saved_activities.push(doc_id.clone());
            }
            true
        })
        .await
    }

    async fn remove_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError> {
        let doc_id = doc_id.to_string();
        self.mutate_user(user_id, false, move |user| {
            let before = user.saved_activities.len();
            user.saved_activities.retain(|id| *id != doc_id);
            user.saved_activities.len() != before
        })
        .await
    }
}

#[async_trait]
impl<T: Document> Repository<T> for FirestoreDb {
    async fn get(&self, id: &str) -> Result<Option<T>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(T::COLLECTION)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by(&self, field: &'static str, value: &str) -> Result<Vec<T>, AppError> {
        let value = value.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(T::COLLECTION)
            .filter(move |q| q.field(field).eq(value.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create(&self, doc: &T) -> Result<(), AppError> {
        let _: T = self
            .get_client()?
            .fluent()
            .insert()
            .into(T::COLLECTION)
            .document_id(doc.doc_id())
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, doc: &T) -> Result<(), AppError> {
        let _: T = self
            .get_client()?
            .fluent()
            .update()
            .in_col(T::COLLECTION)
            .document_id(doc.doc_id())
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        if Repository::<T>::get(self, id).await?.is_none() {
            return Ok(false);
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(T::COLLECTION)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }
}
