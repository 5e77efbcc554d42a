//! JSON configuration file.
//!
//! ```json
//! {
//!     "name": "Tests for the foo driver",
//!     "files": [ "tests/foo/*.c" ],
//!     "exclude_files": [ "tests/foo/*-helper.c" ],
//!     "fields": {
//!         "Category": {
//!             "_properties_": { "mandatory": true },
//!             "Sub-category": { "_properties_": {} }
//!         },
//!         "Description": { "_properties_": { "mandatory": true } }
//!     }
//! }
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Reserved key carrying field metadata inside the `fields` hierarchy.
pub const PROPERTIES_KEY: &str = "_properties_";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub exclude_files: Vec<String>,
    #[serde(default)]
    pub planning_files: Vec<String>,
    #[serde(default)]
    pub drivers: Option<Vec<String>>,
    #[serde(default)]
    pub name: Option<String>,
    /// Nested field hierarchy, kept in file order.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if config.fields.is_empty() {
            return Err(Error::Config(format!(
                "{}: configuration has no fields",
                path.display()
            )));
        }
        Ok(config)
    }
}

/// Contents of a `_properties_` object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldProperties {
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Group ordering for listings; `__all__` splits prefix from suffix.
    #[serde(default)]
    pub order: Option<Vec<String>>,
    #[serde(default)]
    pub update_from_file: Option<UpdateFromFile>,
    #[serde(default)]
    pub include_type: Option<MatchType>,
    #[serde(default)]
    pub exclude_type: Option<MatchType>,
}

impl FieldProperties {
    /// Merge a later declaration of the same field on top of this one.
    pub fn merge(&mut self, other: FieldProperties) {
        self.mandatory |= other.mandatory;
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.order.is_some() {
            self.order = other.order;
        }
        if other.update_from_file.is_some() {
            self.update_from_file = other.update_from_file;
        }
        if other.include_type.is_some() {
            self.include_type = other.include_type;
        }
        if other.exclude_type.is_some() {
            self.exclude_type = other.exclude_type;
        }
    }
}

/// `update-from-file` rule, as written in the configuration.
///
/// `include`/`exclude` are lists of `{ "<label>": "<list file>" }` objects.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateFromFile {
    #[serde(default)]
    pub default_if_not_excluded: Option<String>,
    #[serde(default)]
    pub append_value_if_not_excluded: Option<String>,
    #[serde(default)]
    pub include: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub exclude: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    pub include_type: Option<MatchType>,
    #[serde(default)]
    pub exclude_type: Option<MatchType>,
}

/// How list-file lines become matchers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    Regex,
    RegexIgnorecase,
    #[default]
    SubtestMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_properties() {
        let props: FieldProperties = serde_json::from_str(
            r#"{
                "mandatory": true,
                "description": "test category",
                "update-from-file": {
                    "default-if-not-excluded": "Full",
                    "include": [ { "BAT": "fast-feedback.testlist" } ],
                    "include-type": "regex-ignorecase"
                }
            }"#,
        )
        .unwrap();
        assert!(props.mandatory);
        let update = props.update_from_file.unwrap();
        assert_eq!(update.default_if_not_excluded.as_deref(), Some("Full"));
        assert_eq!(update.include.len(), 1);
        assert_eq!(update.include_type, Some(MatchType::RegexIgnorecase));
        assert_eq!(update.exclude_type, None);
    }

    #[test]
    fn rejects_unknown_match_type() {
        let res: std::result::Result<UpdateFromFile, _> =
            serde_json::from_str(r#"{ "include-type": "glob" }"#);
        assert!(res.is_err());
    }

    #[test]
    fn merge_keeps_mandatory() {
        let mut a = FieldProperties {
            mandatory: true,
            ..Default::default()
        };
        a.merge(FieldProperties {
            description: Some("d".into()),
            ..Default::default()
        });
        assert!(a.mandatory);
        assert_eq!(a.description.as_deref(), Some("d"));
    }

    #[test]
    fn keeps_field_order() {
        let config: Config =
            serde_json::from_str(r#"{ "fields": { "Zeta": {}, "Alpha": {}, "Mid": {} } }"#)
                .unwrap();
        let keys: Vec<&String> = config.fields.keys().collect();
        assert_eq!(keys, ["Zeta", "Alpha", "Mid"]);
    }
}
