//! mongosh script generation
//!
//! Every script prints exactly one `MONGO_INIT_RESULT <json>` line, success
//! or failure, so the caller never has to scrape shell output. Values are
//! embedded as JSON string literals, which are valid JavaScript.

use super::{Grant, NewUser, RootCredentials};
use serde::Deserialize;

/// Prefix of the single result line printed by each script.
pub const RESULT_MARKER: &str = "MONGO_INIT_RESULT ";

/// Parsed result line.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ScriptResult {
    pub ok: bool,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default, rename = "codeName")]
    pub code_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<UserDoc>,
}

/// The part of a `getUser` document we care about.
#[derive(Debug, Deserialize, PartialEq)]
pub struct UserDoc {
    #[serde(default)]
    pub roles: Vec<Grant>,
}

fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn wrap(root: Option<&RootCredentials>, body: &str) -> String {
    let auth = match root {
        Some(root) => format!(
            "db.getSiblingDB(\"admin\").auth({}, {});\n  ",
            literal(&root.username),
            literal(&root.password)
        ),
        None => String::new(),
    };

    format!(
        r#"const marker = {marker};
try {{
  {auth}{body}
}} catch (e) {{
  print(marker + JSON.stringify({{
    ok: false,
    code: typeof e.code === "number" ? e.code : null,
    codeName: e.codeName || null,
    message: String(e.message || e)
  }}));
}}
"#,
        marker = literal(RESULT_MARKER),
        auth = auth,
        body = body,
    )
}

/// Ping the selected database.
pub fn ping(root: Option<&RootCredentials>, database: &str) -> String {
    let body = format!(
        "db.getSiblingDB({}).runCommand({{ ping: 1 }});\n  print(marker + JSON.stringify({{ ok: true }}));",
        literal(database)
    );
    wrap(root, &body)
}

/// Create `user` in `database` with exactly its listed grants.
pub fn create_user(root: Option<&RootCredentials>, database: &str, user: &NewUser) -> String {
    // Vec<Grant> always serializes
    let roles = serde_json::to_string(&user.grants).unwrap_or_else(|_| "[]".to_string());
    let body = format!(
        "db.getSiblingDB({db}).createUser({{ user: {user}, pwd: {pwd}, roles: {roles} }});\n  print(marker + JSON.stringify({{ ok: true }}));",
        db = literal(database),
        user = literal(&user.username),
        pwd = literal(&user.password),
        roles = roles,
    );
    wrap(root, &body)
}

/// Fetch `username` from `database`; prints `user: null` when absent.
pub fn get_user(root: Option<&RootCredentials>, database: &str, username: &str) -> String {
    let body = format!(
        "const found = db.getSiblingDB({db}).getUser({user});\n  print(marker + JSON.stringify({{ ok: true, user: found ? {{ roles: found.roles }} : null }}));",
        db = literal(database),
        user = literal(username),
    );
    wrap(root, &body)
}

/// Find and parse the result line in mongosh stdout.
pub fn parse_result(stdout: &str) -> Option<ScriptResult> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(RESULT_MARKER))
        .and_then(|json| serde_json::from_str(json).ok())
}
