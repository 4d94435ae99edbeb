//! Bootstrap error taxonomy

use crate::store::Grant;

/// Exit status for configuration errors (sysexits EX_CONFIG).
pub const EXIT_CONFIG: i32 = 78;
/// Exit status when the store never became reachable (sysexits EX_UNAVAILABLE).
pub const EXIT_UNAVAILABLE: i32 = 69;

/// Everything that can stop a bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootstrapError {
    /// A required value is empty or malformed. Fatal, never retried.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The user already exists and the policy says that is an error.
    #[error("user {username} already exists in database {database}")]
    DuplicateIdentity { username: String, database: String },

    /// The user already exists with grants other than the requested one.
    #[error(
        "user {username} already exists in database {database} with different grants: [{}]",
        format_grants(.existing)
    )]
    GrantConflict {
        username: String,
        database: String,
        existing: Vec<Grant>,
    },

    /// The store could not be reached. Nothing was written.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected the operation for another reason.
    #[error("store error: {0}")]
    Store(String),
}

fn format_grants(grants: &[Grant]) -> String {
    grants
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl BootstrapError {
    /// Only unavailability is worth waiting out.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidConfig(_) => EXIT_CONFIG,
            Self::StoreUnavailable(_) => EXIT_UNAVAILABLE,
            _ => 1,
        }
    }

    /// Bootstrap step this error stops at, as reported to telemetry.
    pub fn phase(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "validate_config",
            Self::StoreUnavailable(_) => "connect",
            Self::DuplicateIdentity { .. } => "create_user",
            Self::GrantConflict { .. } => "check_existing_user",
            Self::Store(_) => "store_command",
        }
    }

    /// Create a new InvalidConfig error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
