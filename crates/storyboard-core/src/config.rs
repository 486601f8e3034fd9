use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::i18n::Catalog;

/// Directory holding the store and project config, relative to the root.
pub const STORYBOARD_DIR: &str = ".storyboard";

/// Project config file name inside [`STORYBOARD_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Default store file name inside [`STORYBOARD_DIR`].
pub const DEFAULT_STORE_FILE: &str = "storyboard.db";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub i18n: I18nConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl ProjectConfig {
    /// Absolute store path for a project rooted at `project_root`.
    ///
    /// Relative paths resolve against the `.storyboard/` directory.
    #[must_use]
    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        let dir = project_root.join(STORYBOARD_DIR);
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            dir.join(&self.store.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Status-name localisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nConfig {
    #[serde(default)]
    pub language: Option<String>,
    /// `msgid -> text` pairs.
    #[serde(default)]
    pub catalog: BTreeMap<String, String>,
}

impl I18nConfig {
    /// Build the message catalog; an unset language yields `en`.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        Catalog::new(
            self.language.clone().unwrap_or_else(|| "en".to_string()),
            self.catalog.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

/// Load `.storyboard/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the export delimiter is unusable.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(STORYBOARD_DIR).join(CONFIG_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<ProjectConfig>(&content)
        .map_err(|err| anyhow::Error::new(err).context(StoreError::ConfigParse(path.clone())))?;

    let delimiter = config.export.delimiter;
    if matches!(delimiter, '"' | '\r' | '\n') || !delimiter.is_ascii() {
        return Err(anyhow!(
            "export delimiter {delimiter:?} must be a single ASCII character other than a quote or newline"
        )
        .context(StoreError::ConfigParse(path)));
    }

    Ok(config)
}

/// Load the per-user config from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("storyboard").join(CONFIG_FILE);
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Merge project config, user config and the output-mode overrides.
///
/// # Errors
///
/// Returns an error if either config file is unreadable or invalid.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(cli_json, user.output.clone(), env_format);

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn resolve_output(cli_json: bool, user_output: Option<String>, env_format: Option<String>) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_FILE)
}

const fn default_delimiter() -> char {
    ','
}
