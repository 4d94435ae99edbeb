//! In-memory store used by the tests

use super::{DatabaseHandle, Grant, NewUser, Store, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub password: String,
    pub grants: Vec<Grant>,
}

#[derive(Default)]
struct State {
    /// Calls left that fail with `Unavailable`; `u32::MAX` means forever.
    unavailable_calls: u32,
    /// `create_user` calls that write the user, then report `Unavailable`.
    lost_create_replies: u32,
    calls: u32,
    databases: BTreeSet<String>,
    /// Keyed by (authentication database, username).
    users: BTreeMap<(String, String), StoredUser>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that never answers.
    pub fn unreachable() -> Self {
        Self::flaky(u32::MAX)
    }

    /// A store whose first `calls` operations fail with `Unavailable`.
    pub fn flaky(calls: u32) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().unavailable_calls = calls;
        store
    }

    /// A store whose next `create_user` commits but whose reply is lost.
    pub fn losing_create_reply() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().lost_create_replies = 1;
        store
    }

    pub fn with_user(self, db: &str, username: &str, password: &str, grants: Vec<Grant>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.databases.insert(db.to_string());
            state.users.insert(
                (db.to_string(), username.to_string()),
                StoredUser {
                    password: password.to_string(),
                    grants,
                },
            );
        }
        self
    }

    pub fn calls(&self) -> u32 {
        self.state.lock().unwrap().calls
    }

    pub fn databases(&self) -> Vec<String> {
        self.state.lock().unwrap().databases.iter().cloned().collect()
    }

    pub fn users(&self) -> Vec<(String, String, StoredUser)> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .map(|((db, name), user)| (db.clone(), name.clone(), user.clone()))
            .collect()
    }

    /// Whether `username`/`password`, authenticated against `auth_db`, may
    /// write documents into `target_db`.
    pub fn can_write(&self, auth_db: &str, username: &str, password: &str, target_db: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .users
            .get(&(auth_db.to_string(), username.to_string()))
            .filter(|user| user.password == password)
            .is_some_and(|user| {
                user.grants
                    .iter()
                    .any(|grant| grant.db == target_db && grant.role.can_write())
            })
    }

    fn enter(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.unavailable_calls > 0 {
            if state.unavailable_calls != u32::MAX {
                state.unavailable_calls -= 1;
            }
            return Err(StoreError::Unavailable("connect ECONNREFUSED".to_string()));
        }
        Ok(state)
    }
}

impl Store for MemoryStore {
    async fn select_database(&self, name: &str) -> Result<DatabaseHandle, StoreError> {
        let mut state = self.enter()?;
        state.databases.insert(name.to_string());
        Ok(DatabaseHandle::new(name))
    }

    async fn create_user(&self, db: &DatabaseHandle, user: &NewUser) -> Result<(), StoreError> {
        let mut state = self.enter()?;
        let key = (db.name().to_string(), user.username.clone());
        if state.users.contains_key(&key) {
            return Err(StoreError::DuplicateIdentity(user.username.clone()));
        }
        state.users.insert(
            key,
            StoredUser {
                password: user.password.clone(),
                grants: user.grants.clone(),
            },
        );
        if state.lost_create_replies > 0 {
            state.lost_create_replies -= 1;
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }

    async fn user_grants(
        &self,
        db: &DatabaseHandle,
        username: &str,
    ) -> Result<Option<Vec<Grant>>, StoreError> {
        let state = self.enter()?;
        Ok(state
            .users
            .get(&(db.name().to_string(), username.to_string()))
            .map(|user| user.grants.clone()))
    }
}
