//! `Store` implementation driving the `mongosh` shell
//!
//! Scripts are piped on stdin so passwords never appear in the process table.

use super::script::{self, ScriptResult};
use super::{DatabaseHandle, Grant, NewUser, Store, StoreError};
use anyhow::{bail, Result};
use common::{run_with_stdin, ConfigExt};
use std::env;
use std::fmt;
use tracing::{debug, instrument};

pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// MongoDB error code for `User "x@db" already exists`.
const USER_EXISTS_CODE: i64 = 51003;

/// Server error codes meaning "try again later" rather than "you are wrong".
const UNAVAILABLE_CODES: &[i64] = &[
    6,     // HostUnreachable
    7,     // HostNotFound
    89,    // NetworkTimeout
    91,    // ShutdownInProgress
    189,   // PrimarySteppedDown
    10107, // NotWritablePrimary
    11600, // InterruptedAtShutdown
    13436, // NotPrimaryOrSecondary
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "MongoNetworkError",
    "MongoServerSelectionError",
    "MongoNotConnectedError",
    "ECONNREFUSED",
    "ECONNRESET",
    "ENOTFOUND",
    "ETIMEDOUT",
];

/// Credentials used to authenticate against `admin` before provisioning.
#[derive(Clone)]
pub struct RootCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RootCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How to reach the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    pub shell: String,
    pub root: Option<RootCredentials>,
}

impl StoreConfig {
    /// Load connection settings from environment variables
    pub fn from_env() -> Result<Self> {
        let root = match env::var("MONGO_INIT_ROOT_USERNAME").ok().filter(|u| !u.is_empty()) {
            Some(username) => match String::env_secret("MONGO_INIT_ROOT_PASSWORD")? {
                Some(password) => Some(RootCredentials { username, password }),
                None => bail!(
                    "MONGO_INIT_ROOT_USERNAME is set but neither MONGO_INIT_ROOT_PASSWORD \
                     nor MONGO_INIT_ROOT_PASSWORD_FILE is"
                ),
            },
            None => None,
        };

        Ok(Self {
            uri: String::env_or("MONGO_INIT_URI", DEFAULT_URI),
            shell: String::env_or("MONGO_INIT_SHELL", "mongosh"),
            root,
        })
    }

    /// The URI with any embedded credentials masked, for logging.
    pub fn redacted_uri(&self) -> String {
        match self.uri.split_once("://") {
            Some((scheme, rest)) => match rest.rsplit_once('@') {
                Some((_, host)) => format!("{}://***@{}", scheme, host),
                None => self.uri.clone(),
            },
            None => self.uri.clone(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            shell: "mongosh".to_string(),
            root: None,
        }
    }
}

/// MongoDB reached through `mongosh`.
pub struct MongoShell {
    config: StoreConfig,
}

impl MongoShell {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Run `script` and return its result line.
    ///
    /// A missing result line means mongosh gave up before running the
    /// script, usually because it could not connect.
    async fn eval(&self, script: &str) -> Result<ScriptResult, StoreError> {
        let output = run_with_stdin(
            &self.config.shell,
            &["--quiet", "--norc", &self.config.uri],
            script,
        )
        .await
        .map_err(|e| StoreError::Command(format!("{:#}", e)))?;

        if let Some(result) = script::parse_result(&output.stdout) {
            return Ok(result);
        }

        let detail = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        debug!(code = %output.code_display(), "mongosh produced no result line");

        if is_unavailable_text(detail) {
            Err(StoreError::Unavailable(detail.to_string()))
        } else {
            Err(StoreError::Command(format!(
                "{} exited {}: {}",
                self.config.shell,
                output.code_display(),
                detail
            )))
        }
    }
}

fn is_unavailable_text(text: &str) -> bool {
    UNAVAILABLE_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Map a failed script result onto the store error taxonomy.
fn failure(result: &ScriptResult) -> StoreError {
    let message = result
        .message
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());

    let unavailable = result
        .code
        .is_some_and(|code| UNAVAILABLE_CODES.contains(&code))
        || is_unavailable_text(&message)
        || result.code_name.as_deref().is_some_and(is_unavailable_text);

    if unavailable {
        StoreError::Unavailable(message)
    } else {
        StoreError::Command(message)
    }
}

impl Store for MongoShell {
    #[instrument(skip(self))]
    async fn select_database(&self, name: &str) -> Result<DatabaseHandle, StoreError> {
        let result = self
            .eval(&script::ping(self.config.root.as_ref(), name))
            .await?;
        if !result.ok {
            return Err(failure(&result));
        }

        debug!("Database selected");
        Ok(DatabaseHandle::new(name))
    }

    #[instrument(skip_all, fields(database = %db.name(), username = %user.username))]
    async fn create_user(&self, db: &DatabaseHandle, user: &NewUser) -> Result<(), StoreError> {
        let result = self
            .eval(&script::create_user(self.config.root.as_ref(), db.name(), user))
            .await?;

        match result {
            ScriptResult { ok: true, .. } => Ok(()),
            ScriptResult {
                code: Some(USER_EXISTS_CODE),
                ..
            } => Err(StoreError::DuplicateIdentity(user.username.clone())),
            other => Err(failure(&other)),
        }
    }

    #[instrument(skip(self, db), fields(database = %db.name()))]
    async fn user_grants(
        &self,
        db: &DatabaseHandle,
        username: &str,
    ) -> Result<Option<Vec<Grant>>, StoreError> {
        let result = self
            .eval(&script::get_user(self.config.root.as_ref(), db.name(), username))
            .await?;
        if !result.ok {
            return Err(failure(&result));
        }

        Ok(result.user.map(|user| user.roles))
    }
}
