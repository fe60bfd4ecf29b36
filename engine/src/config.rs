//! Planner configuration.
//!
//! Options arrive as a loosely-typed JSON object using dotted option names
//! (`fields.key`, `field.last.updated`, ...). They are deserialized into
//! [`PlannerOptions`] and resolved once into an immutable, validated
//! [`PlannerConfig`]; nothing is looked up by path after that.

use crate::{error::Result, ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

pub const KEY_FIELD_NAMES: &str = "fields.key";
pub const LAST_UPDATED_FIELD_NAME: &str = "field.last.updated";
pub const EFFECTIVE_FROM_FIELD_NAME: &str = "field.effective.from";
pub const EFFECTIVE_TO_FIELD_NAME: &str = "field.effective.to";
pub const CURRENT_FLAG_FIELD_NAME: &str = "field.current.flag";
pub const TIMESTAMP_FIELD_NAME: &str = "field.timestamp";
pub const VALUE_FIELD_NAMES: &str = "fields.values";
pub const CLOSE_MODE: &str = "close.mode";

/// A boolean option that may be written as `true` or `"true"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    /// Strings other than a case-insensitive `"true"` read as false.
    pub fn enabled(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Raw planner options, as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerOptions {
    #[serde(rename = "strategy", default)]
    pub strategy: Option<String>,
    #[serde(rename = "fields.key", default)]
    pub key_fields: Option<Vec<String>>,
    #[serde(rename = "field.last.updated", default)]
    pub last_updated_field: Option<String>,
    #[serde(rename = "uuid.key.enabled", default)]
    pub uuid_key_enabled: Option<Flag>,
    #[serde(rename = "field.effective.from", default)]
    pub effective_from_field: Option<String>,
    #[serde(rename = "field.effective.to", default)]
    pub effective_to_field: Option<String>,
    #[serde(rename = "field.current.flag", default)]
    pub current_flag_field: Option<String>,
    #[serde(rename = "field.timestamp", default)]
    pub timestamp_field: Option<String>,
    #[serde(rename = "fields.values", default)]
    pub value_fields: Option<Vec<String>>,
    #[serde(rename = "close.mode", default)]
    pub close_mode: Option<String>,
}

impl PlannerOptions {
    /// Parse options from a JSON object. Unrecognised options are ignored.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::Configuration(ConfigError::InvalidOption {
                option: "planner options",
                reason: e.to_string(),
            })
        })
    }
}

/// How a superseded history version is closed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseMode {
    /// UPDATE the open version in place (default)
    #[default]
    Update,
    /// DELETE the open version and INSERT a closed copy
    Delete,
}

impl FromStr for CloseMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "update" => Ok(CloseMode::Update),
            "delete" => Ok(CloseMode::Delete),
            other => Err(ConfigError::InvalidOption {
                option: CLOSE_MODE,
                reason: format!("expected 'update' or 'delete', got '{}'", other),
            }),
        }
    }
}

/// Column names used by history-preserving planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFields {
    pub effective_from: Option<String>,
    pub effective_to: Option<String>,
    pub current_flag: Option<String>,
    pub event_time: Option<String>,
    pub value_fields: Option<Vec<String>>,
    pub close_mode: CloseMode,
}

/// Validated configuration, immutable for the lifetime of a planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    strategy: String,
    key_fields: Vec<String>,
    last_updated_field: Option<String>,
    synthetic_keys: bool,
    history: HistoryFields,
}

impl PlannerConfig {
    /// Resolve raw options.
    ///
    /// Only checks that hold for every strategy are made here; strategies
    /// check their own requirements when constructed.
    pub fn resolve(options: &PlannerOptions) -> Result<Self> {
        let strategy = options
            .strategy
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingStrategy)?;

        let close_mode = match &options.close_mode {
            Some(mode) => mode.parse()?,
            None => CloseMode::default(),
        };

        let value_fields = match &options.value_fields {
            Some(names) if !names.is_empty() => {
                Some(resolve_field_list(names, VALUE_FIELD_NAMES)?)
            }
            _ => None,
        };

        Ok(Self {
            strategy,
            key_fields: resolve_key_fields(options)?,
            last_updated_field: resolve_last_updated_field(options)?,
            synthetic_keys: resolve_synthetic_key_policy(options),
            history: HistoryFields {
                effective_from: resolve_optional_field(
                    options.effective_from_field.as_deref(),
                    EFFECTIVE_FROM_FIELD_NAME,
                )?,
                effective_to: resolve_optional_field(
                    options.effective_to_field.as_deref(),
                    EFFECTIVE_TO_FIELD_NAME,
                )?,
                current_flag: resolve_optional_field(
                    options.current_flag_field.as_deref(),
                    CURRENT_FLAG_FIELD_NAME,
                )?,
                event_time: resolve_optional_field(
                    options.timestamp_field.as_deref(),
                    TIMESTAMP_FIELD_NAME,
                )?,
                value_fields,
                close_mode,
            },
        })
    }

    /// Parse and resolve a JSON options object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Self::resolve(&PlannerOptions::from_json(value)?)
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn has_key_fields(&self) -> bool {
        !self.key_fields.is_empty()
    }

    pub fn last_updated_field(&self) -> Option<&str> {
        self.last_updated_field.as_deref()
    }

    pub fn synthetic_keys(&self) -> bool {
        self.synthetic_keys
    }

    pub fn history(&self) -> &HistoryFields {
        &self.history
    }
}

/// Ordered, unique key field names. Absent or empty means no keys.
pub fn resolve_key_fields(options: &PlannerOptions) -> Result<Vec<String>> {
    match &options.key_fields {
        Some(names) => resolve_field_list(names, KEY_FIELD_NAMES),
        None => Ok(Vec::new()),
    }
}

pub fn resolve_last_updated_field(options: &PlannerOptions) -> Result<Option<String>> {
    resolve_optional_field(
        options.last_updated_field.as_deref(),
        LAST_UPDATED_FIELD_NAME,
    )
}

/// Whether synthetic keys are enabled. Defaults to false.
pub fn resolve_synthetic_key_policy(options: &PlannerOptions) -> bool {
    options
        .uuid_key_enabled
        .as_ref()
        .map(Flag::enabled)
        .unwrap_or(false)
}

fn resolve_optional_field(name: Option<&str>, option: &'static str) -> Result<Option<String>> {
    match name {
        None => Ok(None),
        Some(n) if n.trim().is_empty() => Err(ConfigError::BlankField(option).into()),
        Some(n) => Ok(Some(n.trim().to_string())),
    }
}

fn resolve_field_list(names: &[String], option: &'static str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::BlankField(option).into());
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateField {
                option,
                field: name.to_string(),
            }
            .into());
        }
        resolved.push(name.to_string());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> PlannerOptions {
        PlannerOptions::from_json(&value).unwrap()
    }

    #[test]
    fn resolves_full_surface() {
        let config = PlannerConfig::from_json(&json!({
            "strategy": "Type2",
            "fields.key": ["id", "region"],
            "field.last.updated": "updated_at",
            "uuid.key.enabled": false,
            "field.effective.from": "valid_from",
            "field.effective.to": "valid_to",
            "field.current.flag": "is_current",
            "field.timestamp": "event_time",
            "fields.values": ["name"],
            "close.mode": "delete"
        }))
        .unwrap();

        assert_eq!(config.strategy(), "type2");
        assert_eq!(config.key_fields(), &["id".to_string(), "region".to_string()]);
        assert_eq!(config.last_updated_field(), Some("updated_at"));
        assert!(!config.synthetic_keys());

        let history = config.history();
        assert_eq!(history.effective_from.as_deref(), Some("valid_from"));
        assert_eq!(history.effective_to.as_deref(), Some("valid_to"));
        assert_eq!(history.current_flag.as_deref(), Some("is_current"));
        assert_eq!(history.event_time.as_deref(), Some("event_time"));
        assert_eq!(history.value_fields, Some(vec!["name".to_string()]));
        assert_eq!(history.close_mode, CloseMode::Delete);
    }

    #[test]
    fn missing_strategy() {
        let result = PlannerConfig::from_json(&json!({"fields.key": ["id"]}));
        assert_eq!(
            result,
            Err(Error::Configuration(ConfigError::MissingStrategy))
        );
    }

    #[test]
    fn blank_key_field_rejected() {
        let result = resolve_key_fields(&options(json!({"fields.key": ["id", "  "]})));
        assert_eq!(
            result,
            Err(Error::Configuration(ConfigError::BlankField(KEY_FIELD_NAMES)))
        );
    }

    #[test]
    fn duplicate_key_field_rejected() {
        let result = resolve_key_fields(&options(json!({"fields.key": ["id", "id"]})));
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::DuplicateField { option: KEY_FIELD_NAMES, field }))
                if field == "id"
        ));
    }

    #[test]
    fn duplicate_value_field_names_its_option() {
        let result = PlannerConfig::from_json(&json!({
            "strategy": "type2",
            "fields.key": ["id"],
            "fields.values": ["name", "name"]
        }));
        let err = result.unwrap_err();
        assert!(matches!(
            &err,
            Error::Configuration(ConfigError::DuplicateField { option: VALUE_FIELD_NAMES, field })
                if field == "name"
        ));
        assert_eq!(
            err.to_string(),
            "configuration error: option 'fields.values' lists field 'name' more than once"
        );
    }

    #[test]
    fn absent_or_empty_key_fields() {
        assert!(resolve_key_fields(&options(json!({}))).unwrap().is_empty());
        assert!(resolve_key_fields(&options(json!({"fields.key": []})))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn blank_last_updated_rejected() {
        let result = resolve_last_updated_field(&options(json!({"field.last.updated": ""})));
        assert!(result.is_err());
    }

    #[test]
    fn synthetic_key_policy_parsing() {
        assert!(!resolve_synthetic_key_policy(&options(json!({}))));
        assert!(resolve_synthetic_key_policy(&options(
            json!({"uuid.key.enabled": true})
        )));
        assert!(resolve_synthetic_key_policy(&options(
            json!({"uuid.key.enabled": "TRUE"})
        )));
        assert!(!resolve_synthetic_key_policy(&options(
            json!({"uuid.key.enabled": "yes"})
        )));
    }

    #[test]
    fn invalid_close_mode() {
        let result = PlannerConfig::from_json(&json!({
            "strategy": "type2",
            "close.mode": "archive"
        }));
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::InvalidOption { option, .. })) if option == CLOSE_MODE
        ));
    }

    #[test]
    fn wrongly_typed_option() {
        let result = PlannerOptions::from_json(&json!({"fields.key": "id"}));
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigError::InvalidOption { .. }))
        ));
    }
}
