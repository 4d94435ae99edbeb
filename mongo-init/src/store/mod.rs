//! Data store boundary
//!
//! The initializer only needs three things from MongoDB, captured by the
//! [`Store`] trait. [`MongoShell`] implements it by driving `mongosh`.

mod mongosh;
mod script;

#[cfg(test)]
pub(crate) mod memory;

pub use mongosh::{MongoShell, RootCredentials, StoreConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;

/// A database selected on the store.
///
/// Passed explicitly to every per-database operation; there is no ambient
/// "current database".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHandle {
    name: String,
}

impl DatabaseHandle {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// MongoDB database role.
///
/// Configuration only accepts the built-in database roles (see [`FromStr`]).
/// Roles read back from the store that are not built-in end up in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    Read,
    ReadWrite,
    DbAdmin,
    DbOwner,
    UserAdmin,
    Custom(String),
}

impl Role {
    pub const BUILTIN: [Role; 5] = [
        Role::Read,
        Role::ReadWrite,
        Role::DbAdmin,
        Role::DbOwner,
        Role::UserAdmin,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Role::Read => "read",
            Role::ReadWrite => "readWrite",
            Role::DbAdmin => "dbAdmin",
            Role::DbOwner => "dbOwner",
            Role::UserAdmin => "userAdmin",
            Role::Custom(name) => name,
        }
    }

    /// Whether this role lets its holder modify documents.
    pub fn can_write(&self) -> bool {
        matches!(self, Role::ReadWrite | Role::DbOwner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a configured role is not a built-in database role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}', expected one of: read, readWrite, dbAdmin, dbOwner, userAdmin")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::BUILTIN
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Role::Custom(s))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// A (role, database) pair authorizing an identity's access level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub role: Role,
    pub db: String,
}

impl Grant {
    pub fn new(role: Role, db: impl Into<String>) -> Self {
        Self { role, db: db.into() }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// A user to be created on the store.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub grants: Vec<Grant>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("grants", &self.grants)
            .finish()
    }
}

/// Failures reported by a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A user with this name already exists in the target database.
    #[error("user {0} already exists")]
    DuplicateIdentity(String),

    /// The store could not be reached (not started yet, network failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure, including authentication against the store.
    #[error("store command failed: {0}")]
    Command(String),
}

/// Operations consumed from the underlying data store.
pub trait Store {
    /// Resolve the database named `name`, creating it implicitly if absent.
    fn select_database(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<DatabaseHandle, StoreError>> + Send;

    /// Create `user` in `db`. Atomic: either the user exists with all its
    /// grants afterwards, or nothing was written.
    fn create_user(
        &self,
        db: &DatabaseHandle,
        user: &NewUser,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Grants currently held by `username` in `db`, `None` if no such user.
    fn user_grants(
        &self,
        db: &DatabaseHandle,
        username: &str,
    ) -> impl Future<Output = Result<Option<Vec<Grant>>, StoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_builtin() {
        assert_eq!("readWrite".parse::<Role>(), Ok(Role::ReadWrite));
        assert_eq!("dbOwner".parse::<Role>(), Ok(Role::DbOwner));
    }

    #[test]
    fn test_role_parse_is_case_sensitive() {
        assert!("readwrite".parse::<Role>().is_err());
        assert!("root".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_grant_json_matches_mongo_shape() {
        let grant = Grant::new(Role::ReadWrite, "alita");
        assert_eq!(
            serde_json::to_string(&grant).unwrap(),
            r#"{"role":"readWrite","db":"alita"}"#
        );
    }

    #[test]
    fn test_unknown_role_from_store_is_custom() {
        let grant: Grant = serde_json::from_str(r#"{"role":"root","db":"admin"}"#).unwrap();
        assert_eq!(grant.role, Role::Custom("root".to_string()));
        assert_eq!(grant.to_string(), "root@admin");
    }

    #[test]
    fn test_new_user_debug_redacts_password() {
        let user = NewUser {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            grants: vec![Grant::new(Role::ReadWrite, "alita")],
        };
        let rendered = format!("{:?}", user);
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
