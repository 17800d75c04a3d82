use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "review.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    pub access_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            page_size: review_client::DEFAULT_PAGE_SIZE,
            request_timeout_secs: review_client::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            access_token: None,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
    access_token: Option<String>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub server_url: Option<String>,
    pub page_size: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub access_token: Option<String>,
}

pub fn load_settings(
    config_path: Option<&Path>,
    overrides: &CliOverrides,
) -> anyhow::Result<ClientSettings> {
    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut settings = ClientSettings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
        }
        // The default file is optional; an explicitly named one is not.
        Err(err) if config_path.is_some() => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    apply_overrides(&mut settings, overrides);
    validate(&settings)?;
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.access_token {
        settings.access_token = Some(v);
    }
}

fn apply_env(
    settings: &mut ClientSettings,
    var: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = var("REVIEW_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = var("APP__PAGE_SIZE") {
        settings.page_size = v
            .trim()
            .parse()
            .with_context(|| format!("APP__PAGE_SIZE must be a positive integer, got '{v}'"))?;
    }
    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        settings.request_timeout_secs = v.trim().parse().with_context(|| {
            format!("APP__REQUEST_TIMEOUT_SECS must be a positive integer, got '{v}'")
        })?;
    }

    if let Some(v) = var("APP__ACCESS_TOKEN").filter(|v| !v.trim().is_empty()) {
        settings.access_token = Some(v);
    }
    Ok(())
}

fn apply_overrides(settings: &mut ClientSettings, overrides: &CliOverrides) {
    if let Some(v) = &overrides.server_url {
        settings.server_url = v.clone();
    }
    if let Some(v) = overrides.page_size {
        settings.page_size = v;
    }
    if let Some(v) = overrides.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = &overrides.access_token {
        settings.access_token = Some(v.clone());
    }
}

fn validate(settings: &ClientSettings) -> anyhow::Result<()> {
    if settings.server_url.trim().is_empty() {
        bail!("server_url must not be empty");
    }
    if settings.page_size == 0 {
        bail!("page_size must be at least 1");
    }
    if settings.request_timeout_secs == 0 {
        bail!("request_timeout_secs must be at least 1");
    }
    Ok(())
}
