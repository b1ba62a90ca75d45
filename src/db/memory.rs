// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local store for tests and local development.
//!
//! Each user record lives in a `DashMap` entry; token-set updates run while
//! holding that entry's write guard, so they are atomic with respect to
//! every other operation on the same user.

use crate::db::{Document, Repository, UserStore};
use crate::error::AppError;
use crate::models::{TokenSetUpdate, User};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory database. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, User>>,
    /// email -> user ID
    emails: Arc<DashMap<String, String>>,
    /// (collection, document ID) -> JSON document
    documents: Arc<DashMap<(&'static str, String), serde_json::Value>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryDb {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let Some(user_id) = self.emails.get(email).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.find_by_id(&user_id).await
    }

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        match self.emails.entry(user.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict("user already exists".to_string())),
            Entry::Vacant(slot) => {
                // Insert the record before releasing the email slot so a
                // concurrent lookup never sees a dangling index entry.
                self.users.insert(user.id.clone(), user.clone());
                slot.insert(user.id.clone());
                Ok(())
            }
        }
    }

    async fn push_refresh_token(&self, user_id: &str, token: &str) -> Result<bool, AppError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.refresh_tokens.push(token.to_string());
                true
            }
            None => false,
        })
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
        replacement: &str,
    ) -> Result<TokenSetUpdate, AppError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => user.rotate_refresh_token(presented, replacement.to_string()),
            None => TokenSetUpdate::UserMissing,
        })
    }

    async fn revoke_refresh_token(
        &self,
        user_id: &str,
        presented: &str,
    ) -> Result<TokenSetUpdate, AppError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => user.revoke_refresh_token(presented),
            None => TokenSetUpdate::UserMissing,
        })
    }

    async fn add_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => {
                if !user.saved_activities.iter().any(|id| id == doc_id) {
                    user.saved_activities.push(doc_id.to_string());
                }
                true
            }
            None => false,
        })
    }

    async fn remove_saved_activity(&self, user_id: &str, doc_id: &str) -> Result<bool, AppError> {
        Ok(match self.users.get_mut(user_id) {
            Some(mut user) => {
                let before = user.saved_activities.len();
                user.saved_activities.retain(|id| id != doc_id);
                user.saved_activities.len() != before
            }
            None => false,
        })
    }
}

#[async_trait]
impl<T: Document> Repository<T> for MemoryDb {
    async fn get(&self, id: &str) -> Result<Option<T>, AppError> {
        self.documents
            .get(&(T::COLLECTION, id.to_string()))
            .map(|doc| serde_json::from_value(doc.clone()))
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_by(&self, field: &'static str, value: &str) -> Result<Vec<T>, AppError> {
        self.documents
            .iter()
            .filter(|entry| entry.key().0 == T::COLLECTION)
            .filter(|entry| entry.value().get(field).and_then(|v| v.as_str()) == Some(value))
            .map(|entry| serde_json::from_value(entry.value().clone()))
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create(&self, doc: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(doc).map_err(|e| AppError::Database(e.to_string()))?;
        match self.documents.entry((T::COLLECTION, doc.doc_id().to_string())) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "{} document {} already exists",
                T::COLLECTION,
                doc.doc_id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn update(&self, doc: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(doc).map_err(|e| AppError::Database(e.to_string()))?;
        self.documents
            .insert((T::COLLECTION, doc.doc_id().to_string()), value);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        Ok(self
            .documents
            .remove(&(T::COLLECTION, id.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Activity, SavedActivity};

    fn user(id: &str, email: &str) -> User {
        User {
            id: id.to_string(),
            email: email.to_string(),
            username: "someone".to_string(),
            password_hash: "hash".to_string(),
            refresh_tokens: vec![],
            image_url: None,
            liked_posts: vec![],
            saved_activities: vec![],
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let db = MemoryDb::new();
        db.create_user(&user("u1", "a@b.com")).await.unwrap();

        let err = db.create_user(&user("u2", "a@b.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(db.user_count(), 1);

        // Emails are compared exactly as stored.
        db.create_user(&user("u3", "A@b.com")).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_rotation_with_same_token_applies_once() {
        let db = MemoryDb::new();
        db.create_user(&user("u1", "a@b.com")).await.unwrap();
        db.push_refresh_token("u1", "original").await.unwrap();

        let mut handles = vec![];
        for i in 0..8 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.rotate_refresh_token("u1", "original", &format!("next-{i}"))
                    .await
                    .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() == TokenSetUpdate::Applied {
                applied += 1;
            }
        }

        assert_eq!(applied, 1, "exactly one rotation may win");
        // The losers detected reuse and cleared the set.
        let stored = db.find_by_id("u1").await.unwrap().unwrap();
        assert!(stored.refresh_tokens.len() <= 1);
    }

    #[tokio::test]
    async fn repository_find_by_field() {
        let db = MemoryDb::new();
        let saved = SavedActivity {
            doc_id: "d1".to_string(),
            activity: Activity {
                id: Some("42".to_string()),
                ..Default::default()
            },
        };
        Repository::<SavedActivity>::create(&db, &saved).await.unwrap();

        let found: Vec<SavedActivity> = db.find_by("id", "42").await.unwrap();
        assert_eq!(found, vec![saved.clone()]);

        let none: Vec<SavedActivity> = db.find_by("id", "43").await.unwrap();
        assert!(none.is_empty());

        assert!(Repository::<SavedActivity>::delete(&db, "d1").await.unwrap());
        assert!(!Repository::<SavedActivity>::delete(&db, "d1").await.unwrap());
    }
}
