// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "dbgear";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_SERVER_URL: &str = "http://localhost:5000";
const DEFAULT_SERVER_TIMEOUT: &str = "10s";
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT: &str = "30s";
const CONFIG_PATH_ENV: &str = "DBGEAR_CONFIG_PATH";
const API_KEY_ENV: &str = "DBGEAR_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub editor: Editor,
    #[serde(default)]
    pub llm: Llm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            editor: Editor::default(),
            llm: Llm::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_SERVER_URL.to_owned()),
            timeout: Some(DEFAULT_SERVER_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Editor {
    pub page_size: Option<i64>,
    pub show_all_columns: Option<bool>,
}

impl Default for Editor {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
            show_all_columns: Some(false),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Llm {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            enabled: Some(false),
            base_url: Some(DEFAULT_LLM_BASE_URL.to_owned()),
            model: Some(DEFAULT_LLM_MODEL.to_owned()),
            api_key: None,
            timeout: Some(DEFAULT_LLM_TIMEOUT.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [server], [editor], and [llm]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.server_base_url().is_empty() {
            bail!("server.base_url in {} must not be empty", path.display());
        }

        if let Some(page_size) = self.editor.page_size
            && page_size <= 0
        {
            bail!(
                "editor.page_size in {} must be positive, got {}",
                path.display(),
                page_size
            );
        }

        for (key, timeout) in [
            ("server.timeout", &self.server.timeout),
            ("llm.timeout", &self.llm.timeout),
        ] {
            if let Some(timeout) = timeout {
                let parsed = parse_duration(timeout)?;
                if parsed <= Duration::ZERO {
                    bail!(
                        "{key} in {} must be positive, got {}",
                        path.display(),
                        timeout
                    );
                }
            }
        }

        Ok(())
    }

    pub fn server_base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_URL)
            .trim()
            .trim_end_matches('/')
    }

    pub fn server_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.server
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_SERVER_TIMEOUT),
        )
    }

    pub fn page_size(&self) -> usize {
        self.editor
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn show_all_columns(&self) -> bool {
        self.editor.show_all_columns.unwrap_or(false)
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.enabled.unwrap_or(false)
    }

    pub fn llm_base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_LLM_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn llm_model(&self) -> &str {
        self.llm.model.as_deref().unwrap_or(DEFAULT_LLM_MODEL)
    }

    /// `DBGEAR_API_KEY` wins over `llm.api_key`.
    pub fn llm_api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.llm.api_key.clone())
    }

    pub fn llm_timeout(&self) -> Result<Duration> {
        parse_duration(self.llm.timeout.as_deref().unwrap_or(DEFAULT_LLM_TIMEOUT))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# dbgear config\n# Place this file at: {}\n\nversion = 1\n\n[server]\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[editor]\npage_size = {}\nshow_all_columns = false\n\n[llm]\n# Used by `fill ... ai`. The key may also come from {}.\nenabled = false\nbase_url = \"{}\"\nmodel = \"{}\"\n# api_key = \"sk-...\"\ntimeout = \"{}\"\n",
            path.display(),
            DEFAULT_SERVER_URL,
            DEFAULT_SERVER_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            API_KEY_ENV,
            DEFAULT_LLM_BASE_URL,
            DEFAULT_LLM_MODEL,
            DEFAULT_LLM_TIMEOUT,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
