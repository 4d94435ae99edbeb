//! Bootstrap configuration
//!
//! Four values describe the bootstrap: database, username, password and
//! role. They come from an optional YAML file named by `MONGO_INIT_CONFIG`,
//! overridden by `MONGO_INIT_*` environment variables. Password files
//! (orchestrator secrets) beat inline passwords.

use crate::error::BootstrapError;
use crate::store::{Grant, Role};
use anyhow::{Context, Result};
use common::read_secret_file;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Characters MongoDB forbids in database names (any platform).
const FORBIDDEN_DB_CHARS: &[char] = &['/', '\\', '.', '"', '$', '*', '<', '>', ':', '|', '?'];

/// MongoDB database names must be shorter than 64 bytes.
const MAX_DB_NAME_LEN: usize = 63;

pub const DEFAULT_ROLE: &str = "readWrite";

/// What to do when the user already exists.
///
/// Parsed case-insensitively, the same way from the env and the YAML file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DuplicatePolicy {
    /// Treat an existing user holding exactly the requested grant as
    /// already bootstrapped. Its password is not compared and never
    /// changed: the first bootstrap's credential stays in force.
    #[default]
    Skip,
    /// Report `DuplicateIdentity`.
    Fail,
}

impl FromStr for DuplicatePolicy {
    type Err = BootstrapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "fail" => Ok(Self::Fail),
            other => Err(BootstrapError::invalid_config(format!(
                "unknown duplicate policy '{}', expected skip or fail",
                other
            ))),
        }
    }
}

impl TryFrom<String> for DuplicatePolicy {
    type Error = BootstrapError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Layout of the optional YAML config file.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    password_file: Option<String>,
    role: Option<String>,
    duplicate_policy: Option<DuplicatePolicy>,
}

/// Inputs of the bootstrap operation.
#[derive(Clone)]
pub struct BootstrapConfig {
    pub database: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub duplicate_policy: DuplicatePolicy,
}

impl fmt::Debug for BootstrapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapConfig")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("duplicate_policy", &self.duplicate_policy)
            .finish()
    }
}

impl BootstrapConfig {
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            username: username.into(),
            password: password.into(),
            role: role.into(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Load configuration from the config file and environment variables.
    ///
    /// Loading problems (unreadable file, bad YAML) are `InvalidConfig` too:
    /// they are deployment errors. Values are not validated here.
    pub fn from_env() -> Result<Self, BootstrapError> {
        Self::from_lookup(|name| env::var(name).ok()).map_err(|e| {
            e.downcast::<BootstrapError>()
                .unwrap_or_else(|e| BootstrapError::invalid_config(format!("{:#}", e)))
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match lookup("MONGO_INIT_CONFIG") {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                serde_yaml::from_str::<FileConfig>(&content)
                    .with_context(|| format!("Failed to parse config file {}", path))?
            }
            None => FileConfig::default(),
        };

        let password = if let Some(path) = lookup("MONGO_INIT_PASSWORD_FILE") {
            read_secret_file(&path)?
        } else if let Some(password) = lookup("MONGO_INIT_PASSWORD") {
            password
        } else if let Some(path) = &file.password_file {
            read_secret_file(path)?
        } else {
            file.password.unwrap_or_default()
        };

        let duplicate_policy = match lookup("MONGO_INIT_DUPLICATE_POLICY") {
            Some(value) => value.parse::<DuplicatePolicy>()?,
            None => file.duplicate_policy.unwrap_or_default(),
        };

        Ok(Self {
            database: lookup("MONGO_INIT_DATABASE")
                .or(file.database)
                .unwrap_or_default(),
            username: lookup("MONGO_INIT_USERNAME")
                .or(file.username)
                .unwrap_or_default(),
            password,
            role: lookup("MONGO_INIT_ROLE")
                .or(file.role)
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            duplicate_policy,
        })
    }

    /// Check every value and return the single grant the user will hold.
    pub fn validate(&self) -> Result<Grant, BootstrapError> {
        require("database", "MONGO_INIT_DATABASE", &self.database)?;
        require("username", "MONGO_INIT_USERNAME", &self.username)?;
        require("password", "MONGO_INIT_PASSWORD", &self.password)?;
        require("role", "MONGO_INIT_ROLE", &self.role)?;

        validate_database_name(&self.database)?;

        let role: Role = self
            .role
            .parse::<Role>()
            .map_err(|e| BootstrapError::invalid_config(e.to_string()))?;

        Ok(Grant::new(role, self.database.clone()))
    }
}

fn require(field: &str, var: &str, value: &str) -> Result<(), BootstrapError> {
    if value.is_empty() {
        return Err(BootstrapError::invalid_config(format!(
            "{} must not be empty (set {})",
            field, var
        )));
    }
    Ok(())
}

fn validate_database_name(name: &str) -> Result<(), BootstrapError> {
    if name.len() > MAX_DB_NAME_LEN {
        return Err(BootstrapError::invalid_config(format!(
            "database name '{}' is longer than {} bytes",
            name, MAX_DB_NAME_LEN
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| FORBIDDEN_DB_CHARS.contains(c) || c.is_whitespace() || *c == '\0')
    {
        return Err(BootstrapError::invalid_config(format!(
            "database name '{}' contains forbidden character {:?}",
            name, c
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn alita() -> BootstrapConfig {
        BootstrapConfig::new("alita", "admin", "admin", "readWrite")
    }

    #[test]
    fn test_valid_config_yields_single_grant() {
        assert_eq!(alita().validate(), Ok(Grant::new(Role::ReadWrite, "alita")));
    }

    #[test]
    fn test_empty_values_are_invalid() {
        let cases = [
            BootstrapConfig::new("", "admin", "admin", "readWrite"),
            BootstrapConfig::new("alita", "", "admin", "readWrite"),
            BootstrapConfig::new("alita", "admin", "", "readWrite"),
            BootstrapConfig::new("alita", "admin", "admin", ""),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(BootstrapError::InvalidConfig(_))),
                "{:?} should be invalid",
                config
            );
        }
    }

    #[test]
    fn test_unknown_role_is_invalid() {
        let config = BootstrapConfig::new("alita", "admin", "admin", "root");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown role 'root'"));
    }

    #[test]
    fn test_database_name_rules() {
        for name in ["my.db", "a/b", "with space", "dollar$", "x\0y"] {
            let config = BootstrapConfig::new(name, "admin", "admin", "readWrite");
            assert!(config.validate().is_err(), "{:?} should be rejected", name);
        }

        let long = "a".repeat(64);
        assert!(BootstrapConfig::new(long, "admin", "admin", "readWrite")
            .validate()
            .is_err());

        let ok = "a".repeat(63);
        assert!(BootstrapConfig::new(ok, "admin", "admin", "readWrite")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_env_values_and_default_role() {
        let config = BootstrapConfig::from_lookup(lookup(&[
            ("MONGO_INIT_DATABASE", "alita"),
            ("MONGO_INIT_USERNAME", "admin"),
            ("MONGO_INIT_PASSWORD", "admin"),
        ]))
        .unwrap();

        assert_eq!(config.database, "alita");
        assert_eq!(config.role, DEFAULT_ROLE);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Skip);
    }

    #[test]
    fn test_explicitly_empty_role_is_kept_for_validation() {
        let config = BootstrapConfig::from_lookup(lookup(&[
            ("MONGO_INIT_DATABASE", "alita"),
            ("MONGO_INIT_USERNAME", "admin"),
            ("MONGO_INIT_PASSWORD", "admin"),
            ("MONGO_INIT_ROLE", ""),
        ]))
        .unwrap();

        assert_eq!(config.role, "");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_file_beats_inline_password() {
        let mut secret = tempfile::NamedTempFile::new().unwrap();
        writeln!(secret, "from-secret").unwrap();
        let path = secret.path().display().to_string();

        let config = BootstrapConfig::from_lookup(lookup(&[
            ("MONGO_INIT_PASSWORD", "inline"),
            ("MONGO_INIT_PASSWORD_FILE", path.as_str()),
        ]))
        .unwrap();

        assert_eq!(config.password, "from-secret");
    }

    #[test]
    fn test_yaml_file_overridden_by_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "database: alita\nusername: admin\npassword: from-file\nrole: read\nduplicate_policy: fail\n"
        )
        .unwrap();
        let path = file.path().display().to_string();

        let config = BootstrapConfig::from_lookup(lookup(&[
            ("MONGO_INIT_CONFIG", path.as_str()),
            ("MONGO_INIT_ROLE", "readWrite"),
        ]))
        .unwrap();

        assert_eq!(config.database, "alita");
        assert_eq!(config.password, "from-file");
        assert_eq!(config.role, "readWrite");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Fail);
    }

    #[test]
    fn test_yaml_duplicate_policy_ignores_case() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "database: alita\nduplicate_policy: FAIL\n").unwrap();
        let path = file.path().display().to_string();

        let config =
            BootstrapConfig::from_lookup(lookup(&[("MONGO_INIT_CONFIG", path.as_str())])).unwrap();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Fail);
    }

    #[test]
    fn test_yaml_bad_duplicate_policy_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "duplicate_policy: overwrite\n").unwrap();
        let path = file.path().display().to_string();

        assert!(BootstrapConfig::from_lookup(lookup(&[("MONGO_INIT_CONFIG", path.as_str())])).is_err());
    }

    #[test]
    fn test_yaml_unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "database: alita\nroles: [readWrite]\n").unwrap();
        let path = file.path().display().to_string();

        assert!(BootstrapConfig::from_lookup(lookup(&[("MONGO_INIT_CONFIG", path.as_str())])).is_err());
    }

    #[test]
    fn test_bad_duplicate_policy() {
        let result = BootstrapConfig::from_lookup(lookup(&[(
            "MONGO_INIT_DUPLICATE_POLICY",
            "overwrite",
        )]));
        assert!(result.is_err());
        assert_eq!("FAIL".parse::<DuplicatePolicy>(), Ok(DuplicatePolicy::Fail));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = BootstrapConfig::new("alita", "admin", "hunter2", "readWrite");
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
