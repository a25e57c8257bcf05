//! In-memory user directory.
//!
//! Holds administrator accounts for the lifetime of the process. The
//! authentication flow reads the stored action-required flag from here on
//! every profile and refresh request, so a password change takes effect
//! immediately even for sessions whose tokens still carry the old flag.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::StoreError;
use crate::token::Identity;

/// A stored account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub needs_password_update: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub needs_password_update: bool,
}

#[derive(Debug)]
struct UserTable {
    users: BTreeMap<i64, User>,
    next_id: i64,
}

impl Default for UserTable {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            next_id: 1,
        }
    }
}

/// Shared handle to the user table. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    table: Arc<RwLock<UserTable>>,
}

fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account. Emails are unique, compared case-insensitively.
    pub async fn insert(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut table = self.table.write().await;

        if table
            .users
            .values()
            .any(|user| same_email(&user.email, &new_user.email))
        {
            return Err(StoreError::Duplicate(format!(
                "user with email '{}'",
                new_user.email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: table.next_id,
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            needs_password_update: new_user.needs_password_update,
            created_at: now,
            updated_at: now,
        };
        table.next_id += 1;
        table.users.insert(user.id, user.clone());

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.table
            .read()
            .await
            .users
            .values()
            .find(|user| same_email(&user.email, email))
            .cloned()
    }

    pub async fn find_by_id(&self, id: i64) -> Option<User> {
        self.table.read().await.users.get(&id).cloned()
    }

    /// Current action-required flag, or `None` for an unknown id.
    pub async fn needs_password_update(&self, id: i64) -> Option<bool> {
        self.table
            .read()
            .await
            .users
            .get(&id)
            .map(|user| user.needs_password_update)
    }

    /// Replace the password hash and clear the action-required flag.
    pub async fn update_password(&self, id: i64, password_hash: String) -> Result<User, StoreError> {
        let mut table = self.table.write().await;
        let user = table
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;

        user.password_hash = password_hash;
        user.needs_password_update = false;
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    /// Number of registered users.
    pub async fn count(&self) -> usize {
        self.table.read().await.users.len()
    }
}
