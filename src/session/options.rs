// src/session/options.rs

//! Typed access to option maps passed across the session interface

use crate::error::{Error, Result};
use crate::goal::{GoalJobSettings, GoalSetting};
use crate::package::Reason;
use serde_json::Value;
use std::collections::BTreeMap;

/// Loosely typed options, as received from a client
pub type KeyValueMap = BTreeMap<String, Value>;

fn wrong_type(key: &str, expected: &str) -> Error {
    Error::InvalidArgument(format!("Option \"{}\" must be {}", key, expected))
}

pub fn get_bool(options: &KeyValueMap, key: &str) -> Result<Option<bool>> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(wrong_type(key, "a boolean")),
    }
}

pub fn get_string(options: &KeyValueMap, key: &str) -> Result<Option<String>> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(wrong_type(key, "a string")),
    }
}

pub fn get_strings(options: &KeyValueMap, key: &str) -> Result<Vec<String>> {
    match options.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(|| wrong_type(key, "a list of strings")))
            .collect(),
        Some(_) => Err(wrong_type(key, "a list of strings")),
    }
}

/// String-valued map, such as configuration overrides
pub fn get_string_map(options: &KeyValueMap, key: &str) -> Result<BTreeMap<String, String>> {
    match options.get(key) {
        None => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => Ok((k.clone(), s.clone())),
                Value::Bool(b) => Ok((k.clone(), b.to_string())),
                Value::Number(n) => Ok((k.clone(), n.to_string())),
                _ => Err(wrong_type(key, "a map of strings")),
            })
            .collect(),
        Some(_) => Err(wrong_type(key, "a map of strings")),
    }
}

/// Job settings from `repo_ids`, `skip_unavailable`, `skip_broken`,
/// `strict`, `best` and `reason`
pub fn job_settings(options: &KeyValueMap) -> Result<GoalJobSettings> {
    let mut settings = GoalJobSettings::new().with_repo_ids(get_strings(options, "repo_ids")?);
    settings.skip_unavailable = get_bool(options, "skip_unavailable")?;
    settings.skip_broken = get_bool(options, "skip_broken")?;
    settings.strict = get_bool(options, "strict")?;
    if let Some(best) = get_bool(options, "best")? {
        settings.best = GoalSetting::from(best);
    }
    if let Some(reason) = get_string(options, "reason")? {
        let reason = reason.parse::<Reason>().map_err(Error::InvalidArgument)?;
        settings.reason = Some(reason);
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> KeyValueMap {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_job_settings_from_options() {
        let options = map(json!({
            "repo_ids": ["repo2"],
            "strict": false,
            "best": true,
            "reason": "dependency",
        }));
        let settings = job_settings(&options).unwrap();
        assert_eq!(settings.to_repo_ids, vec!["repo2".to_string()]);
        assert_eq!(settings.strict, Some(false));
        assert_eq!(settings.skip_unavailable, None);
        assert_eq!(settings.best, GoalSetting::True);
        assert_eq!(settings.reason, Some(Reason::Dependency));
    }

    #[test]
    fn test_bad_option_types() {
        assert!(matches!(
            job_settings(&map(json!({"strict": "yes"}))),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            job_settings(&map(json!({"repo_ids": [1, 2]}))),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            job_settings(&map(json!({"reason": "whim"}))),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_string_map_stringifies_scalars() {
        let options = map(json!({"config": {"best": true, "installroot": "/tmp/x"}}));
        let overrides = get_string_map(&options, "config").unwrap();
        assert_eq!(overrides.get("best").map(String::as_str), Some("true"));
        assert_eq!(overrides.get("installroot").map(String::as_str), Some("/tmp/x"));
    }
}
