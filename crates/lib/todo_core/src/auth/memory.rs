//! In-process [`UserStore`] and [`SessionStore`].
//!
//! Used by tests and local experiments; state is lost on drop.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::AuthError;
use super::store::{SessionStore, UserStore};
use crate::models::auth::{NewUser, RefreshTokenRecord, User};

/// Users and sessions held in concurrent maps.
///
/// `emails` and `usernames` index user IDs and enforce uniqueness; a user is
/// only inserted while both index slots are held.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    emails: DashMap<String, i64>,
    usernames: DashMap<String, i64>,
    sessions: DashMap<String, RefreshTokenRecord>,
    next_user_id: AtomicI64,
    next_session_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip a user's active flag. Returns false if the user does not exist.
    pub fn set_active(&self, user_id: i64, active: bool) -> bool {
        self.users
            .get_mut(&user_id)
            .map(|mut user| user.is_active = active)
            .is_some()
    }

    /// Flip a user's admin flag. Returns false if the user does not exist.
    pub fn set_admin(&self, user_id: i64, admin: bool) -> bool {
        self.users
            .get_mut(&user_id)
            .map(|mut user| user.is_admin = admin)
            .is_some()
    }

    /// Drop a user record (sessions are left in place).
    pub fn remove_user(&self, user_id: i64) -> bool {
        match self.users.remove(&user_id) {
            Some((_, user)) => {
                self.emails.remove(&user.email);
                self.usernames.remove(&user.username);
                true
            }
            None => false,
        }
    }

    /// Number of stored sessions, expired ones included.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn user_by_index(&self, index: &DashMap<String, i64>, key: &str) -> Option<User> {
        let id = index.get(key).map(|entry| *entry.value())?;
        self.users.get(&id).map(|user| user.value().clone())
    }
}

fn unique_violation() -> AuthError {
    AuthError::Internal("create user: unique constraint violated".into())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, AuthError> {
        // Lock order: emails, usernames, users.
        let Entry::Vacant(email_slot) = self.emails.entry(new_user.email.clone()) else {
            return Err(unique_violation());
        };
        let Entry::Vacant(username_slot) = self.usernames.entry(new_user.username.clone()) else {
            return Err(unique_violation());
        };
        let now = Utc::now();
        let user = User {
            id: self.next_user_id.fetch_add(1, Ordering::SeqCst) + 1,
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            is_active: new_user.is_active,
            is_admin: new_user.is_admin,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.id, user.clone());
        email_slot.insert(user.id);
        username_slot.insert(user.id);
        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.user_by_index(&self.emails, email))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        Ok(self.user_by_index(&self.usernames, username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.emails.contains_key(email))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        Ok(self.usernames.contains_key(username))
    }

    async fn update_last_login(&self, user_id: i64, at: DateTime<Utc>) -> Result<(), AuthError> {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_refresh_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match self.sessions.entry(token.to_string()) {
            Entry::Occupied(_) => Err(AuthError::Internal(
                "save refresh token: duplicate token".into(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(RefreshTokenRecord {
                    id: self.next_session_id.fetch_add(1, Ordering::SeqCst) + 1,
                    user_id,
                    token: token.to_string(),
                    expires_at,
                    created_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    async fn find_valid_refresh_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self
            .sessions
            .get(token)
            .filter(|record| record.expires_at > now)
            .map(|record| record.value().clone()))
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AuthError> {
        Ok(self.sessions.remove(token).is_some())
    }

    async fn delete_user_refresh_tokens(&self, user_id: i64) -> Result<u64, AuthError> {
        Ok(self.remove_sessions(|record| record.user_id == user_id))
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        Ok(self.remove_sessions(|record| record.expires_at < now))
    }
}

impl MemoryStore {
    /// Remove matching sessions, counting inside the pass so concurrent
    /// inserts do not skew the result.
    fn remove_sessions(&self, doomed: impl Fn(&RefreshTokenRecord) -> bool) -> u64 {
        let mut removed = 0;
        self.sessions.retain(|_, record| {
            if doomed(record) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn find_valid_skips_expired_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .save_refresh_token(1, "live", now + Duration::minutes(5))
            .await
            .unwrap();
        store.save_refresh_token(1, "dead", now).await.unwrap();

        assert!(store.find_valid_refresh_token("live", now).await.unwrap().is_some());
        assert!(store.find_valid_refresh_token("dead", now).await.unwrap().is_none());
        assert!(store.find_valid_refresh_token("missing", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected() {
        let store = MemoryStore::new();
        let expires = Utc::now() + Duration::hours(1);
        store.save_refresh_token(1, "tok", expires).await.unwrap();
        assert!(store.save_refresh_token(2, "tok", expires).await.is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store
            .save_refresh_token(1, "tok", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert!(store.delete_refresh_token("tok").await.unwrap());
        assert!(!store.delete_refresh_token("tok").await.unwrap());
        assert!(!store.delete_refresh_token("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn delete_for_user_leaves_other_users() {
        let store = MemoryStore::new();
        let expires = Utc::now() + Duration::hours(1);
        store.save_refresh_token(1, "a", expires).await.unwrap();
        store.save_refresh_token(1, "b", expires).await.unwrap();
        store.save_refresh_token(2, "c", expires).await.unwrap();

        assert_eq!(store.delete_user_refresh_tokens(1).await.unwrap(), 2);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bulk_deletes_run_alongside_saves() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20_000 {
                    let expires = if i % 2 == 0 {
                        now - Duration::minutes(1)
                    } else {
                        now + Duration::hours(1)
                    };
                    store
                        .save_refresh_token(i % 3, &format!("tok-{i}"), expires)
                        .await
                        .unwrap();
                }
            })
        };

        let mut removed = 0;
        while !writer.is_finished() {
            removed += store.delete_expired_refresh_tokens(now).await.unwrap();
            removed += store.delete_user_refresh_tokens(2).await.unwrap();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        removed += store.delete_expired_refresh_tokens(now).await.unwrap();
        removed += store.delete_user_refresh_tokens(2).await.unwrap();

        assert_eq!(removed as usize + store.session_count(), 20_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_of_one_name_admit_one() {
        let store = Arc::new(MemoryStore::new());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_user(&NewUser {
                            email: format!("user{i}@x.com"),
                            username: "same".into(),
                            password_hash: "hash".into(),
                            first_name: String::new(),
                            last_name: String::new(),
                            is_active: true,
                            is_admin: false,
                        })
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.user_count(), 1);
        assert!(store.username_exists("same").await.unwrap());
    }

    #[tokio::test]
    async fn removed_user_frees_email_and_username() {
        let store = MemoryStore::new();
        let new_user = NewUser {
            email: "a@x.com".into(),
            username: "alice".into(),
            password_hash: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_admin: false,
        };
        let user = store.create_user(&new_user).await.unwrap();
        assert!(store.create_user(&new_user).await.is_err());

        assert!(store.remove_user(user.id));
        assert!(!store.email_exists("a@x.com").await.unwrap());
        assert!(store.find_user_by_username("alice").await.unwrap().is_none());
        assert!(store.create_user(&new_user).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_keeps_rows_expiring_at_or_after_now() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .save_refresh_token(1, "past", now - Duration::seconds(1))
            .await
            .unwrap();
        store.save_refresh_token(1, "boundary", now).await.unwrap();
        store
            .save_refresh_token(1, "future", now + Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_refresh_tokens(now).await.unwrap(), 1);
        assert_eq!(store.session_count(), 2);
        assert!(!store.delete_refresh_token("past").await.unwrap());
        assert!(store.delete_refresh_token("boundary").await.unwrap());
    }
}
