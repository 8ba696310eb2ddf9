//! Layered configuration loading.
//!
//! Sources are merged in priority order (later overrides earlier):
//! 1. Built-in defaults ([`RecognitionConfig::default()`])
//! 2. User-level: `~/.voxnav/config.toml`
//! 3. Workspace-level: `./.voxnav/config.toml`
//! 4. An explicit file passed by the caller (`--config`)
//! 5. `VOXNAV_*` environment variables
//!
//! CLI flags are applied by the caller on top of the result. Each field of
//! the final [`EffectiveConfig`] is annotated with the [`ConfigSource`] that
//! set it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::RecognitionConfig;
use crate::ConfigError;

/// Config files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

static BUILTIN_DEFAULT: ConfigSource = ConfigSource::BuiltinDefault;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    BuiltinDefault,
    UserFile(PathBuf),
    WorkspaceFile(PathBuf),
    ExplicitFile(PathBuf),
    EnvVar(String),
    CliFlag(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::BuiltinDefault => write!(f, "built-in default"),
            ConfigSource::UserFile(p) => write!(f, "user file: {}", p.display()),
            ConfigSource::WorkspaceFile(p) => write!(f, "workspace file: {}", p.display()),
            ConfigSource::ExplicitFile(p) => write!(f, "config file: {}", p.display()),
            ConfigSource::EnvVar(name) => write!(f, "env var: {name}"),
            ConfigSource::CliFlag(name) => write!(f, "CLI flag: {name}"),
        }
    }
}

/// The merged config plus provenance for each dotted field path.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: RecognitionConfig,
    pub sources: HashMap<String, ConfigSource>,
    /// Config files that were found and loaded, in priority order.
    pub source_files: Vec<PathBuf>,
}

impl EffectiveConfig {
    /// Source of a dotted field path, falling back to the nearest parent.
    pub fn source_of(&self, path: &str) -> &ConfigSource {
        let mut key = path;
        loop {
            if let Some(source) = self.sources.get(key) {
                return source;
            }
            match key.rfind('.') {
                Some(idx) => key = &key[..idx],
                None => return &BUILTIN_DEFAULT,
            }
        }
    }

    /// Record a CLI override applied after loading.
    pub fn record_cli_override(&mut self, path: &str, flag: &str) {
        self.sources
            .insert(path.to_string(), ConfigSource::CliFlag(flag.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Environment mappings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvKind {
    Str,
    Bool,
    Int,
}

struct EnvMapping {
    env_var: &'static str,
    toml_path: &'static [&'static str],
    kind: EnvKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        env_var: "VOXNAV_LANGUAGE",
        toml_path: &["language"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        env_var: "VOXNAV_INTERIM_RESULTS",
        toml_path: &["interim_results"],
        kind: EnvKind::Bool,
    },
    EnvMapping {
        env_var: "VOXNAV_GRAMMAR_HINT",
        toml_path: &["grammar_hint"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        env_var: "VOXNAV_SCROLL_AMOUNT",
        toml_path: &["scroll_amount"],
        kind: EnvKind::Int,
    },
    EnvMapping {
        env_var: "VOXNAV_AUTO_START",
        toml_path: &["auto_start"],
        kind: EnvKind::Bool,
    },
    EnvMapping {
        env_var: "VOXNAV_STT_PROVIDER",
        toml_path: &["stt", "provider"],
        kind: EnvKind::Str,
    },
    EnvMapping {
        env_var: "VOXNAV_KEY_ATTRIBUTE",
        toml_path: &["browser", "key_attribute"],
        kind: EnvKind::Str,
    },
];

// ---------------------------------------------------------------------------
// ConfigLoader
// ---------------------------------------------------------------------------

/// Loads config from every layer and merges them with override semantics.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    workspace_config_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
    /// Replaces the process environment (for testing).
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the user config file path.
    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Override the workspace config file path.
    #[must_use]
    pub fn with_workspace_path(mut self, path: PathBuf) -> Self {
        self.workspace_config_path = Some(path);
        self
    }

    /// Load an explicit file on top of the user and workspace layers.
    /// Unlike the other layers, this file must exist.
    #[must_use]
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.explicit_path = Some(path);
        self
    }

    /// Read overrides from this map instead of the process environment.
    #[must_use]
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    fn user_path(&self) -> PathBuf {
        self.user_config_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".voxnav").join("config.toml")
        })
    }

    fn workspace_path(&self) -> PathBuf {
        self.workspace_config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".voxnav/config.toml"))
    }

    fn env_var(&self, name: &str) -> Option<String> {
        match &self.env {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }
    }

    /// Load, merge, and validate configuration from all sources.
    pub fn load(&self) -> Result<EffectiveConfig, ConfigError> {
        let mut sources = HashMap::new();
        let mut source_files = Vec::new();

        let mut merged = toml::Value::try_from(RecognitionConfig::default()).map_err(|e| {
            ConfigError::Parse {
                origin: "built-in defaults".into(),
                reason: e.to_string(),
            }
        })?;

        let mut layers = vec![
            (self.user_path(), ConfigSource::UserFile(self.user_path())),
            (
                self.workspace_path(),
                ConfigSource::WorkspaceFile(self.workspace_path()),
            ),
        ];
        if let Some(explicit) = &self.explicit_path {
            if !explicit.exists() {
                return Err(ConfigError::Read {
                    path: explicit.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                });
            }
            layers.push((explicit.clone(), ConfigSource::ExplicitFile(explicit.clone())));
        }

        for (path, source) in layers {
            if !path.exists() {
                continue;
            }
            let content = read_config_file(&path)?;
            let layer: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                origin: source.to_string(),
                reason: e.to_string(),
            })?;
            deep_merge(&mut merged, &layer);
            record_sources(&layer, &mut sources, &source, "");
            tracing::debug!(path = %path.display(), "loaded config layer");
            source_files.push(path);
        }

        self.apply_env_overrides(&mut merged, &mut sources)?;

        let config: RecognitionConfig = merged.try_into().map_err(|e: toml::de::Error| {
            ConfigError::Parse {
                origin: "merged configuration".into(),
                reason: e.to_string(),
            }
        })?;
        config.validate()?;

        Ok(EffectiveConfig {
            config,
            sources,
            source_files,
        })
    }

    fn apply_env_overrides(
        &self,
        merged: &mut toml::Value,
        sources: &mut HashMap<String, ConfigSource>,
    ) -> Result<(), ConfigError> {
        for mapping in ENV_MAPPINGS {
            let Some(raw) = self.env_var(mapping.env_var) else {
                continue;
            };
            validate_env_value(mapping.env_var, &raw)?;
            let value = env_value_to_toml(mapping, &raw)?;
            set_nested_value(merged, mapping.toml_path, value);
            sources.insert(
                mapping.toml_path.join("."),
                ConfigSource::EnvVar(mapping.env_var.to_string()),
            );
        }
        Ok(())
    }
}

/// Read a config file, rejecting oversized files and NUL bytes.
fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Rejected {
            path: path.to_path_buf(),
            reason: format!(
                "exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes (actual: {} bytes)",
                metadata.len()
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if content.contains('\0') {
        return Err(ConfigError::Rejected {
            path: path.to_path_buf(),
            reason: "contains null bytes".into(),
        });
    }
    Ok(content)
}

/// Merge `overlay` into `base`. Tables merge recursively; anything else
/// (including arrays) is replaced.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn record_sources(
    layer: &toml::Value,
    sources: &mut HashMap<String, ConfigSource>,
    source: &ConfigSource,
    prefix: &str,
) {
    if let toml::Value::Table(table) = layer {
        for (key, value) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            sources.insert(path.clone(), source.clone());
            record_sources(value, sources, source, &path);
        }
    }
}

fn validate_env_value(var: &str, value: &str) -> Result<(), ConfigError> {
    if let Some(ch) = value
        .chars()
        .find(|c| c.is_control() && *c != '\t' && *c != '\n' && *c != '\r')
    {
        return Err(ConfigError::Env {
            var: var.to_string(),
            reason: format!("contains control character U+{:04X}", ch as u32),
        });
    }
    Ok(())
}

fn env_value_to_toml(mapping: &EnvMapping, raw: &str) -> Result<toml::Value, ConfigError> {
    let trimmed = raw.trim();
    match mapping.kind {
        EnvKind::Str => Ok(toml::Value::String(raw.to_string())),
        EnvKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Ok(toml::Value::Boolean(false)),
            _ => Err(ConfigError::Env {
                var: mapping.env_var.to_string(),
                reason: format!("expected a boolean, got {raw:?}"),
            }),
        },
        EnvKind::Int => trimmed
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| ConfigError::Env {
                var: mapping.env_var.to_string(),
                reason: format!("must be numeric: {e}"),
            }),
    }
}

/// Set a value at a nested path, creating intermediate tables as needed.
fn set_nested_value(root: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let toml::Value::Table(table) = root else {
        return;
    };
    if rest.is_empty() {
        table.insert(first.to_string(), value);
        return;
    }
    let entry = table
        .entry(first.to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    set_nested_value(entry, rest, value);
}
