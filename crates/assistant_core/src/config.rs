use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "assistant.toml";

/// Keywords identifying questions about the portfolio owner.
pub const DEFAULT_DOMAIN_KEYWORDS: &[&str] = &[
    "moshiur",
    "rahman",
    "portfolio",
    "project",
    "skill",
    "experience",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("invalid api base url '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    /// Collection path of the session resource, relative to the base url.
    pub sessions_path: String,
    pub request_timeout_secs: u64,
    /// Number of prior messages the classifier looks at.
    pub history_window: usize,
    pub domain_keywords: Vec<String>,
    pub domain_persona_label: String,
    pub general_persona_label: String,
    pub auth_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".into(),
            sessions_path: crate::transport::DEFAULT_SESSIONS_PATH.into(),
            request_timeout_secs: 30,
            history_window: 3,
            domain_keywords: DEFAULT_DOMAIN_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
            domain_persona_label: "Moshiur's AI".into(),
            general_persona_label: "General Assistant".into(),
            auth_token: None,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Parsed base url, with a trailing slash so relative joins keep the path prefix.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self.api_base_url.trim();
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&with_slash).map_err(|source| ConfigError::InvalidBaseUrl {
            value: raw.to_string(),
            source,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    sessions_path: Option<String>,
    request_timeout_secs: Option<u64>,
    history_window: Option<usize>,
    domain_keywords: Option<Vec<String>>,
    domain_persona_label: Option<String>,
    general_persona_label: Option<String>,
    auth_token: Option<String>,
}

/// Defaults, then the settings file, then environment overrides.
///
/// An explicitly named file must exist; the default `assistant.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings, ConfigError> {
    let mut settings = ClientSettings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw).map_err(|source| {
                ConfigError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;
            apply_file_settings(&mut settings, file_cfg);
        }
        Err(err) if !required && err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(ConfigError::Read { path, source }),
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.base_url()?;
    Ok(settings)
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.sessions_path {
        settings.sessions_path = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.history_window {
        settings.history_window = v;
    }
    if let Some(v) = file_cfg.domain_keywords {
        settings.domain_keywords = v;
    }
    if let Some(v) = file_cfg.domain_persona_label {
        settings.domain_persona_label = v;
    }
    if let Some(v) = file_cfg.general_persona_label {
        settings.general_persona_label = v;
    }
    if let Some(v) = file_cfg.auth_token {
        settings.auth_token = Some(v);
    }
}

fn apply_env_overrides(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("ASSISTANT_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = var("APP__SESSIONS_PATH") {
        settings.sessions_path = v;
    }

    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = var("APP__HISTORY_WINDOW") {
        if let Ok(parsed) = v.trim().parse::<usize>() {
            settings.history_window = parsed;
        }
    }

    if let Some(v) = var("APP__DOMAIN_KEYWORDS") {
        let keywords: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect();
        if !keywords.is_empty() {
            settings.domain_keywords = keywords;
        }
    }

    if let Some(v) = var("ASSISTANT_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
