use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_BODY_LIMIT_MB: usize = 50;

/// Which side of the relay a provider key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    Relay,
    Client,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub provider: String,
    pub api_base: String,
    pub relay_api_key: Option<String>,
    pub client_api_key: Option<String>,
    pub image_model: String,
    pub text_model: String,
    pub port: u16,
    pub relay_url: String,
    pub body_limit_bytes: usize,
    pub request_timeout: Option<Duration>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            relay_api_key: None,
            client_api_key: None,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            port: DEFAULT_PORT,
            relay_url: DEFAULT_RELAY_URL.to_string(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
            request_timeout: None,
        }
    }
}

impl StudioConfig {
    /// Process environment first, then `./.env` for anything unset.
    pub fn from_env() -> Self {
        let dotenv = fs::read_to_string(Path::new(".env"))
            .map(|content| parse_dotenv(&content))
            .unwrap_or_default();
        if !dotenv.is_empty() {
            log::debug!("loaded {} entries from .env", dotenv.len());
        }
        Self::from_lookup(|key| {
            non_empty_env(key).or_else(|| {
                dotenv
                    .get(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let relay_api_key = lookup("API_KEY");
        let client_api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("GOOGLE_API_KEY"))
            .or_else(|| relay_api_key.clone());

        let port = match lookup("PORT").map(|raw| raw.parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(err)) => {
                log::warn!("ignoring invalid PORT: {err}");
                defaults.port
            }
            None => defaults.port,
        };
        let body_limit_bytes = match lookup("NANOSTUDIO_BODY_LIMIT_MB") {
            Some(raw) => match raw.parse::<usize>().ok().and_then(body_limit_from_mb) {
                Some(bytes) => bytes,
                None => {
                    log::warn!("ignoring invalid NANOSTUDIO_BODY_LIMIT_MB: {raw}");
                    defaults.body_limit_bytes
                }
            },
            None => defaults.body_limit_bytes,
        };
        let request_timeout = lookup("NANOSTUDIO_REQUEST_TIMEOUT").and_then(|raw| {
            let timeout = raw
                .parse::<f64>()
                .ok()
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
            if timeout.is_none() {
                log::warn!("ignoring invalid NANOSTUDIO_REQUEST_TIMEOUT: {raw}");
            }
            timeout
        });

        Self {
            provider: lookup("NANOSTUDIO_PROVIDER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.provider),
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            relay_api_key,
            client_api_key,
            image_model: lookup("NANOSTUDIO_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: lookup("NANOSTUDIO_TEXT_MODEL").unwrap_or(defaults.text_model),
            port,
            relay_url: lookup("NANOSTUDIO_RELAY_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or(defaults.relay_url),
            body_limit_bytes,
            request_timeout,
        }
    }

    pub fn api_key(&self, role: KeyRole) -> Option<&str> {
        match role {
            KeyRole::Relay => self.relay_api_key.as_deref(),
            KeyRole::Client => self.client_api_key.as_deref(),
        }
    }
}

/// Megabytes to bytes; `None` for zero or when the product overflows.
pub fn body_limit_from_mb(mb: usize) -> Option<usize> {
    if mb == 0 {
        return None;
    }
    mb.checked_mul(1024 * 1024)
}

/// `KEY=value` lines; `#` comments, `export ` prefixes and matching quotes are handled.
pub fn parse_dotenv(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim().to_string();
        if value.len() >= 2 {
            let bytes = value.as_bytes();
            if (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
                || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            {
                value = value[1..value.len() - 1].to_string();
            }
        }
        vars.insert(key.to_string(), value);
    }
    vars
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
