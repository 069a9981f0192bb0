use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Component, Path};

use crate::advisory::OutputFormat;
use crate::allocator::{
    Strategy, DEFAULT_INSTANCE_PREFIX, DEFAULT_MAX_ATTEMPTS, DEFAULT_STORAGE_DIR,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Config {
    pub(crate) storage_dir: String,
    pub(crate) instance_prefix: String,
    pub(crate) strategy: Strategy,
    pub(crate) max_attempts: u32,
    pub(crate) format: OutputFormat,
    pub(crate) log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            instance_prefix: DEFAULT_INSTANCE_PREFIX.to_string(),
            strategy: Strategy::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            format: OutputFormat::default(),
            log_path: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct LoadedConfig {
    pub(crate) config: Config,
    pub(crate) warnings: Vec<String>,
}

const ALLOWED_KEYS: [&str; 6] = [
    "storage_dir",
    "instance_prefix",
    "strategy",
    "max_attempts",
    "format",
    "log_path",
];

pub(crate) fn load_config(path: &Path) -> Result<LoadedConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config {}: {}", path.display(), err))?;
    let value: Value = serde_yaml::from_str(&content)
        .map_err(|err| format!("Failed to parse config {}: {}", path.display(), err))?;
    let mut mapping = match value {
        Value::Mapping(mapping) => mapping,
        // An empty file parses as null.
        Value::Null => Mapping::new(),
        _ => {
            return Err(format!(
                "Config {} must be a YAML mapping",
                path.display()
            ))
        }
    };

    let warnings = unknown_top_level_keys(&mapping);
    for key in &warnings {
        mapping.remove(Value::String(key.clone()));
    }
    validate_fields(&mapping).map_err(|err| format!("Invalid config {}: {}", path.display(), err))?;

    let config: Config = serde_path_to_error::deserialize(Value::Mapping(mapping)).map_err(|err| {
        format!(
            "Failed to parse config {}: {}: {}",
            path.display(),
            err.path(),
            err.inner()
        )
    })?;

    Ok(LoadedConfig { config, warnings })
}

fn unknown_top_level_keys(mapping: &Mapping) -> Vec<String> {
    mapping
        .keys()
        .filter_map(|key| key.as_str().map(|value| value.to_string()))
        .filter(|key| !ALLOWED_KEYS.contains(&key.as_str()))
        .collect()
}

fn validate_fields(mapping: &Mapping) -> Result<(), String> {
    if let Some(storage_dir) = optional_non_empty_string(mapping, "storage_dir")? {
        let path = Path::new(storage_dir);
        if !path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return Err(format!(
                "storage_dir must be a relative path without '..', got {:?}",
                storage_dir
            ));
        }
    }
    if let Some(prefix) = optional_non_empty_string(mapping, "instance_prefix")? {
        if prefix.contains('/') || prefix.contains('\\') {
            return Err(format!(
                "instance_prefix must not contain path separators, got {:?}",
                prefix
            ));
        }
    }
    if let Some(value) = mapping.get(Value::String("max_attempts".to_string())) {
        match value.as_u64() {
            Some(attempts) if attempts >= 1 && attempts <= u64::from(u32::MAX) => {}
            _ => return Err("max_attempts must be a positive integer".to_string()),
        }
    }
    optional_non_empty_string(mapping, "log_path")?;
    Ok(())
}

fn optional_non_empty_string<'a>(
    mapping: &'a Mapping,
    key_name: &str,
) -> Result<Option<&'a str>, String> {
    let key = Value::String(key_name.to_string());
    match mapping.get(&key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            if value.trim().is_empty() {
                Err(format!("{} must not be empty", key_name))
            } else {
                Ok(Some(value.as_str()))
            }
        }
        Some(_) => Err(format!("{} must be a string", key_name)),
    }
}
