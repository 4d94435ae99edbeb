//! The bootstrap operation
//!
//! Select the target database, then create one user holding exactly one
//! grant on it. Nothing else is written. Whether the store is bootstrapped
//! is read from the store itself: the user either exists or it does not.

use super::config::{BootstrapConfig, DuplicatePolicy};
use crate::error::BootstrapError;
use crate::store::{DatabaseHandle, Grant, NewUser, Store, StoreError};
use tracing::{info, instrument, warn};

/// How a successful bootstrap ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The user was created by this run.
    Created,
    /// An identical user was already there; nothing was written.
    AlreadyBootstrapped,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::AlreadyBootstrapped => "already_bootstrapped",
        }
    }
}

fn store_error(err: StoreError, config: &BootstrapConfig) -> BootstrapError {
    match err {
        StoreError::DuplicateIdentity(username) => BootstrapError::DuplicateIdentity {
            username,
            database: config.database.clone(),
        },
        StoreError::Unavailable(reason) => BootstrapError::StoreUnavailable(reason),
        StoreError::Command(reason) => BootstrapError::Store(reason),
    }
}

/// Provision the administrative user described by `config`.
///
/// Invalid configuration is rejected before the store is contacted.
#[instrument(skip_all, fields(database = %config.database, username = %config.username))]
pub async fn bootstrap<S: Store>(
    store: &S,
    config: &BootstrapConfig,
) -> Result<Outcome, BootstrapError> {
    let grant = config.validate()?;

    let handle = store
        .select_database(&config.database)
        .await
        .map_err(|e| store_error(e, config))?;

    let user = NewUser {
        username: config.username.clone(),
        password: config.password.clone(),
        grants: vec![grant.clone()],
    };

    match store.create_user(&handle, &user).await {
        Ok(()) => {
            info!(grant = %grant, "Created user");
            Ok(Outcome::Created)
        }
        Err(StoreError::DuplicateIdentity(_)) => {
            resolve_duplicate(store, &handle, config, &grant).await
        }
        Err(e) => Err(store_error(e, config)),
    }
}

async fn resolve_duplicate<S: Store>(
    store: &S,
    handle: &DatabaseHandle,
    config: &BootstrapConfig,
    grant: &Grant,
) -> Result<Outcome, BootstrapError> {
    if config.duplicate_policy == DuplicatePolicy::Fail {
        return Err(BootstrapError::DuplicateIdentity {
            username: config.username.clone(),
            database: config.database.clone(),
        });
    }

    let existing = store
        .user_grants(handle, &config.username)
        .await
        .map_err(|e| store_error(e, config))?
        .ok_or_else(|| {
            BootstrapError::Store(format!(
                "store reported {} as existing but returned no such user",
                config.username
            ))
        })?;

    if existing.len() == 1 && existing[0] == *grant {
        info!("User already exists with the requested grant, skipping");
        return Ok(Outcome::AlreadyBootstrapped);
    }

    warn!(existing = ?existing, "User already exists with different grants");
    Err(BootstrapError::GrantConflict {
        username: config.username.clone(),
        database: config.database.clone(),
        existing,
    })
}
