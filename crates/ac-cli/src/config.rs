use std::path::{Path, PathBuf};

use ac_core::{HtmlTheme, DEFAULT_ACCENT};
use ac_client::DEFAULT_CHAT_PATH;
use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server the chat endpoint lives on
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the chat endpoint on that server
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Accent color for headers, code and links (#rgb or #rrggbb)
    #[serde(default = "default_accent")]
    pub accent_color: String,

    /// Example prompts offered by `/examples`
    #[serde(default)]
    pub examples: Vec<String>,

    /// Write the conversation as an HTML page here on exit (supports $HOME, ~)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}

fn default_accent() -> String {
    DEFAULT_ACCENT.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_path: default_chat_path(),
            accent_color: default_accent(),
            examples: Vec::new(),
            transcript: None,
        }
    }
}

/// Expand environment variables in a path string
/// Supports: $VAR, ${VAR}, ~
pub fn expand_path(path: &str) -> PathBuf {
    let mut result = path.to_string();

    if result.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            result = format!("{}{}", home.display(), &result[1..]);
        }
    } else if result == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    let re = regex::Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").unwrap();
    let expanded = re.replace_all(&result, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    });

    PathBuf::from(expanded.to_string())
}

impl Config {
    /// Load defaults, then the user config file, then `explicit`, then `AC_*`
    /// environment variables. Later sources win.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        let user_config = Self::config_path().ok().filter(|p| p.exists());
        Self::figment(user_config.as_deref(), explicit)
            .extract()
            .context("Invalid configuration")
    }

    pub fn figment(user_config: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = user_config {
            figment = figment.merge(Toml::file(path));
        }
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("AC_"))
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("ac").join("config.toml"))
    }

    pub fn theme(&self) -> Result<HtmlTheme> {
        HtmlTheme::new(self.accent_color.as_str()).context("Invalid accent_color")
    }

    pub fn transcript_path(&self) -> Option<PathBuf> {
        self.transcript.as_deref().map(expand_path)
    }
}
