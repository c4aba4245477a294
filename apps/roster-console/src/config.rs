//! Environment-backed runtime configuration for `roster-console`.

use std::{
    collections::HashSet,
    env,
    error::Error,
    fmt,
    path::PathBuf,
};

use roster_core::MemberIdentity;

const DEFAULT_ROSTER_FILE: &str = "./roster.json";
const DEFAULT_GROUP_ID: &str = "default";

/// Runtime configuration used by the console app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// JSON array of member rows, re-read on every reload.
    pub roster_file: PathBuf,
    /// Identity of the local user, used to flag the user's own row.
    pub own_identity: MemberIdentity,
    /// Group the roster belongs to; notifications for other groups are ignored.
    pub group_id: String,
    /// Optional settings file. When absent settings only live for the process.
    pub settings_file: Option<PathBuf>,
    /// Whether the local user may remove members (group admin).
    pub can_remove: bool,
    /// Identities selected once after the first load.
    pub preselect: HashSet<MemberIdentity>,
}

impl ConsoleConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let roster_file = optional_trimmed_env("ROSTER_FILE", &mut lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROSTER_FILE));
        let own_identity = match optional_trimmed_env("ROSTER_OWN_IDENTITY", &mut lookup) {
            Some(value) => parse_identity("ROSTER_OWN_IDENTITY", &value)?,
            None => MemberIdentity::new(Vec::new()),
        };
        let group_id = optional_trimmed_env("ROSTER_GROUP_ID", &mut lookup)
            .unwrap_or_else(|| DEFAULT_GROUP_ID.to_owned());
        let settings_file =
            optional_trimmed_env("ROSTER_SETTINGS_FILE", &mut lookup).map(PathBuf::from);
        let can_remove = parse_optional_bool("ROSTER_CAN_REMOVE", false, &mut lookup)?;
        let preselect = match optional_trimmed_env("ROSTER_PRESELECT", &mut lookup) {
            Some(value) => parse_identity_list("ROSTER_PRESELECT", &value)?,
            None => HashSet::new(),
        };

        Ok(Self {
            roster_file,
            own_identity,
            group_id,
            settings_file,
            can_remove,
            preselect,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Parse a comma or whitespace separated list of hex identities.
pub fn parse_identity_list(
    key: &'static str,
    value: &str,
) -> Result<HashSet<MemberIdentity>, ConfigError> {
    value
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| parse_identity(key, part))
        .collect()
}

fn parse_identity(key: &'static str, value: &str) -> Result<MemberIdentity, ConfigError> {
    MemberIdentity::from_hex(value).map_err(|err| ConfigError::InvalidValue {
        key,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_bool<F>(
    key: &'static str,
    default: bool,
    lookup: &mut F,
) -> Result<bool, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}
