use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::fetch::hydration::HydrationPolicy;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceKind,
    pub kalshi: KalshiConfig,
    pub browser: BrowserConfig,
    pub browse: BrowseConfig,
    pub monitoring: MonitoringConfig,
}

/// Where market data comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Kalshi public REST API.
    #[default]
    Api,
    /// Client-rendered kalshi.com pages driven through WebDriver.
    Browser,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KalshiConfig {
    pub api_base_url: String,
    pub web_base_url: String,
    pub request_timeout_seconds: u64,
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.elections.kalshi.com/trade-api/v2".to_string(),
            web_base_url: "https://kalshi.com".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

impl KalshiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Browser automation settings. These only change how a page is obtained,
/// never the shape of what is extracted from it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub browser_binary_path: Option<PathBuf>,
    pub driver_binary_path: Option<PathBuf>,
    /// Already-running WebDriver endpoint. When set no driver process is spawned.
    pub webdriver_url: Option<String>,
    /// 0 picks a free local port.
    pub driver_port: u16,
    pub driver_startup_timeout_seconds: u64,
    pub hydration_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub window_size: String,
    pub user_agent: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            browser_binary_path: None,
            driver_binary_path: None,
            webdriver_url: None,
            driver_port: 0,
            driver_startup_timeout_seconds: 10,
            hydration_timeout_seconds: 20,
            poll_interval_ms: 250,
            window_size: "1920,1080".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn hydration_policy(&self) -> HydrationPolicy {
        HydrationPolicy::new(
            Duration::from_secs(self.hydration_timeout_seconds),
            Duration::from_millis(self.poll_interval_ms),
        )
    }

    pub fn driver_startup_policy(&self) -> HydrationPolicy {
        HydrationPolicy::new(
            Duration::from_secs(self.driver_startup_timeout_seconds),
            Duration::from_millis(100),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowseConfig {
    pub default_max_markets: usize,
    /// Minimum page size requested from the API when filtering by category client-side.
    pub category_fetch_floor: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            default_max_markets: 20,
            category_fetch_floor: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or config/default.toml), then apply
    /// environment overrides. A missing default file falls back to built-in defaults;
    /// a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("KALSHI_API_BASE_URL") {
            self.kalshi.api_base_url = url;
        }
        if let Ok(path) = std::env::var("CHROME_BINARY") {
            self.browser.browser_binary_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("CHROMEDRIVER") {
            self.browser.driver_binary_path = Some(PathBuf::from(path));
        }
        if let Ok(flag) = std::env::var("KALSHI_HEADLESS") {
            self.browser.headless = !matches!(flag.trim(), "0" | "false" | "no");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_config() {
        let contents = std::fs::read_to_string("config/default.toml")
            .expect("config/default.toml should exist");
        let config = AppConfig::from_toml_str(&contents).expect("should parse");
        assert_eq!(config.source, SourceKind::Api);
        assert_eq!(config.browse.default_max_markets, 20);
        assert_eq!(config.browser.hydration_timeout_seconds, 20);
        assert!(config.browser.headless);
        assert!(config.browser.driver_binary_path.is_none());
        assert_eq!(config.kalshi.web_base_url, "https://kalshi.com");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            source = "browser"

            [browser]
            headless = false
            driver_binary_path = "/opt/chromedriver"
            "#,
        )
        .unwrap();

        assert_eq!(config.source, SourceKind::Browser);
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.driver_binary_path.as_deref(),
            Some(Path::new("/opt/chromedriver"))
        );
        assert_eq!(config.browser.poll_interval_ms, 250);
        assert_eq!(config.kalshi.request_timeout_seconds, 30);
    }

    #[test]
    fn test_hydration_policy_from_config() {
        let config = BrowserConfig {
            hydration_timeout_seconds: 5,
            poll_interval_ms: 500,
            ..BrowserConfig::default()
        };
        let policy = config.hydration_policy();
        assert_eq!(policy.timeout(), Duration::from_secs(5));
        assert_eq!(policy.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(AppConfig::from_toml_str(r#"source = "carrier-pigeon""#).is_err());
    }
}
