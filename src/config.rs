use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Backend base URL used when `MAOS_AMIGAS_API_URL` is unset.
pub const DEFAULT_API_BASE: &str = "/api";
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_VIACEP_URL: &str = "https://viacep.com.br/ws";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Absolute backend base URL, trailing slashes stripped.
    pub api_base_url: String,
    /// Origin the single-page app is served from; relative API bases resolve against it.
    pub app_origin: String,
    /// Base path the app is mounted under (used for redirect URLs).
    pub app_base_path: String,
    pub viacep_base_url: String,
    /// Directory backing the local-storage emulation.
    pub storage_dir: PathBuf,
    pub autosave_debounce_ms: u64,
    /// Delay before an existing user is sent back to login after registering.
    pub redirect_delay_ms: u64,
    /// Delay of each artificial stage in the checkout simulator.
    pub payment_stage_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: resolve_api_base(DEFAULT_API_BASE, DEFAULT_APP_ORIGIN)
                .unwrap_or_else(|_| format!("{}{}", DEFAULT_APP_ORIGIN, DEFAULT_API_BASE)),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            app_base_path: "/".to_string(),
            viacep_base_url: DEFAULT_VIACEP_URL.to_string(),
            storage_dir: PathBuf::from(".maos-amigas"),
            autosave_debounce_ms: 2000,
            redirect_delay_ms: 3000,
            payment_stage_delay_ms: 800,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let app_origin = std::env::var("MAOS_AMIGAS_APP_ORIGIN")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string());
        if !app_origin.starts_with("http://") && !app_origin.starts_with("https://") {
            anyhow::bail!("MAOS_AMIGAS_APP_ORIGIN must start with http:// or https://");
        }

        let raw_api = std::env::var("MAOS_AMIGAS_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let config = Self {
            api_base_url: resolve_api_base(&raw_api, &app_origin)?,
            app_base_path: std::env::var("MAOS_AMIGAS_APP_BASE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "/".to_string()),
            viacep_base_url: std::env::var("MAOS_AMIGAS_VIACEP_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("MAOS_AMIGAS_VIACEP_URL must start with http:// or https://");
                    }
                    Ok(strip_trailing_slashes(&url))
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_VIACEP_URL.to_string()),
            storage_dir: std::env::var("MAOS_AMIGAS_STORAGE_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".maos-amigas")),
            autosave_debounce_ms: parse_millis("MAOS_AMIGAS_AUTOSAVE_MS", 2000)?,
            redirect_delay_ms: parse_millis("MAOS_AMIGAS_REDIRECT_DELAY_MS", 3000)?,
            payment_stage_delay_ms: parse_millis("MAOS_AMIGAS_PAYMENT_STAGE_MS", 800)?,
            app_origin,
        };

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("API base URL: {}", config.api_base_url);
        tracing::debug!("ViaCEP base URL: {}", config.viacep_base_url);
        tracing::debug!("Storage dir: {}", config.storage_dir.display());

        Ok(config)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn payment_stage_delay(&self) -> Duration {
        Duration::from_millis(self.payment_stage_delay_ms)
    }
}

fn parse_millis(var: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a number of milliseconds", var)),
        _ => Ok(default),
    }
}

pub fn strip_trailing_slashes(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Resolves the configured API base against the app origin.
///
/// Absolute bases are kept as-is; relative ones (the `/api` fallback) are
/// joined to the origin. Trailing slashes are always stripped.
pub fn resolve_api_base(raw: &str, origin: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(strip_trailing_slashes(trimmed));
    }

    let origin = url::Url::parse(origin)
        .map_err(|e| anyhow::anyhow!("Invalid app origin '{}': {}", origin, e))?;
    let joined = origin
        .join(trimmed)
        .map_err(|e| anyhow::anyhow!("Invalid API base '{}': {}", trimmed, e))?;

    Ok(strip_trailing_slashes(joined.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_base_resolves_against_origin() {
        let base = resolve_api_base("/api/", "http://localhost:5173").unwrap();
        assert_eq!(base, "http://localhost:5173/api");
    }

    #[test]
    fn test_absolute_base_strips_trailing_slashes() {
        let base = resolve_api_base("https://api.maosamigas.org/v1//", DEFAULT_APP_ORIGIN).unwrap();
        assert_eq!(base, "https://api.maosamigas.org/v1");
    }

    #[test]
    fn test_default_config_uses_api_fallback() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:5173/api");
        assert_eq!(config.autosave_debounce(), Duration::from_millis(2000));
    }
}
