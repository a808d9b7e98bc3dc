//! Headless Chrome provider driven over WebDriver.
//!
//! Kalshi pages are client-rendered: the initial HTML is an empty shell. We
//! load the page in a real browser, wait for outcome or market-link markup to
//! appear, and snapshot the DOM for the extractors.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{AppConfig, BrowserConfig};
use crate::extract::{RenderedPage, Source};
use crate::fetch::hydration::wait_until;
use crate::fetch::webdriver::{Locator, Session, WebDriverClient};
use crate::fetch::{FetchError, SourceProvider};
use crate::market::target::Target;

/// Outcome rows carry a Yes/No control once the market page has hydrated.
const MARKET_READY: Locator<'static> =
    Locator::XPath("//*[contains(text(),'Yes') or contains(text(),'No')]");
/// Browse and category pages are ready once market cards link somewhere.
const LISTING_READY: Locator<'static> = Locator::XPath("//a[contains(@href,'/markets/')]");

const BROWSER_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium-browser",
    "chromium",
];
const DRIVER_NAME: &str = "chromedriver";
const FALLBACK_DRIVER: &str = "/tmp/chromedriver-linux64/chromedriver";

pub struct BrowserProvider {
    config: BrowserConfig,
    web_base: Url,
    http: reqwest::Client,
}

/// A reachable WebDriver endpoint, plus the driver process when we own it.
/// The process is killed when this is dropped.
struct Driver {
    client: WebDriverClient,
    _process: Option<Child>,
}

impl BrowserProvider {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let web_base = Url::parse(&config.kalshi.web_base_url)
            .with_context(|| format!("Invalid web_base_url: {}", config.kalshi.web_base_url))?;

        // Page loads are bounded by the hydration policy; this only guards
        // against a wedged driver.
        let http = reqwest::Client::builder()
            .timeout(config.kalshi.request_timeout() + config.browser.hydration_policy().timeout())
            .build()
            .context("Failed to create WebDriver HTTP client")?;

        Ok(Self {
            config: config.browser.clone(),
            web_base,
            http,
        })
    }

    /// W3C capabilities for a Chrome session.
    pub fn capabilities(&self, browser_binary: Option<&Path>) -> Value {
        let mut args = Vec::new();
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        args.extend([
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={}", self.config.window_size),
            format!("--user-agent={}", self.config.user_agent),
        ]);

        let mut chrome_options = json!({ "args": args });
        if let Some(binary) = browser_binary {
            chrome_options["binary"] = json!(binary.to_string_lossy());
        }

        json!({
            "browserName": "chrome",
            "goog:chromeOptions": chrome_options,
        })
    }

    async fn start_driver(&self) -> Result<Driver, FetchError> {
        if let Some(endpoint) = &self.config.webdriver_url {
            let base = driver_base(endpoint)?;
            debug!(%base, "Using external WebDriver");
            return Ok(Driver {
                client: WebDriverClient::new(self.http.clone(), base),
                _process: None,
            });
        }

        let binary = locate_driver(self.config.driver_binary_path.as_deref())?;
        let port = match self.config.driver_port {
            0 => free_port()?,
            port => port,
        };

        let process = Command::new(&binary)
            .arg(format!("--port={port}"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Driver(format!("failed to start {}: {e}", binary.display())))?;

        let base = driver_base(&format!("http://127.0.0.1:{port}"))?;
        let client = WebDriverClient::new(self.http.clone(), base);

        let policy = self.config.driver_startup_policy();
        let probe_client = &client;
        wait_until(&policy, "chromedriver", move || async move {
            // Connection refused just means the driver is still starting.
            Ok(probe_client.is_ready().await.unwrap_or(false))
        })
        .await
        .map_err(|_| {
            FetchError::Driver(format!(
                "{} not ready after {}s",
                binary.display(),
                policy.timeout().as_secs()
            ))
        })?;

        info!(driver = %binary.display(), port, "chromedriver started");
        Ok(Driver {
            client,
            _process: Some(process),
        })
    }

    /// Load `page_url`, wait for `ready` to match, and snapshot the DOM. The
    /// session is closed whether or not the page hydrated.
    #[instrument(skip(self, page_url, ready), fields(url = %page_url))]
    async fn render(&self, page_url: Url, ready: Locator<'static>, what: &str) -> Result<Source, FetchError> {
        let driver = self.start_driver().await?;

        let browser_binary = locate_browser(self.config.browser_binary_path.as_deref());
        if browser_binary.is_none() {
            debug!("No browser binary found; leaving the choice to the driver");
        }

        let session = driver
            .client
            .new_session(self.capabilities(browser_binary.as_deref()))
            .await?;

        let snapshot = self.snapshot(&session, &page_url, ready, what).await;

        if let Err(e) = session.delete().await {
            warn!(error = %e, "Failed to close WebDriver session");
        }

        let html = snapshot?;
        info!(bytes = html.len(), "Page rendered");
        Ok(Source::Rendered(RenderedPage::new(page_url, html)))
    }

    async fn snapshot(
        &self,
        session: &Session<'_>,
        page_url: &Url,
        ready: Locator<'static>,
        what: &str,
    ) -> Result<String, FetchError> {
        session.navigate(page_url).await?;

        let attempts = wait_until(&self.config.hydration_policy(), what, move || async move {
            Ok(session.count_elements(ready).await? > 0)
        })
        .await?;
        debug!(session = session.id(), attempts, "Page hydrated");

        session.page_source().await
    }
}

#[async_trait]
impl SourceProvider for BrowserProvider {
    async fn obtain_listing(&self, target: &Target, _max_results: usize) -> Result<Source, FetchError> {
        self.render(target.page_url(&self.web_base), LISTING_READY, "browse page")
            .await
    }

    async fn obtain_market(&self, target: &Target) -> Result<Source, FetchError> {
        if target.event_ticker().is_none() {
            return Err(FetchError::InvalidTarget(target.to_string()));
        }
        self.render(target.page_url(&self.web_base), MARKET_READY, "market page")
            .await
    }

    fn name(&self) -> &str {
        "browser"
    }
}

/// WebDriver endpoints are joined against, so the base must end in `/`.
fn driver_base(endpoint: &str) -> Result<Url, FetchError> {
    let mut base = Url::parse(endpoint)
        .map_err(|e| FetchError::Driver(format!("invalid WebDriver URL {endpoint}: {e}")))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn free_port() -> Result<u16, FetchError> {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(|e| FetchError::Driver(format!("no free local port: {e}")))
}

/// Configured path, then `PATH`, then the newest Playwright-managed Chromium.
fn locate_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return is_executable(path).then(|| path.to_path_buf());
    }

    BROWSER_NAMES
        .iter()
        .find_map(|name| find_on_path(name))
        .or_else(playwright_chromium)
}

fn locate_driver(configured: Option<&Path>) -> Result<PathBuf, FetchError> {
    if let Some(path) = configured {
        return if is_executable(path) {
            Ok(path.to_path_buf())
        } else {
            Err(FetchError::Driver(format!(
                "configured driver {} is not an executable file",
                path.display()
            )))
        };
    }

    find_on_path(DRIVER_NAME)
        .or_else(|| {
            let fallback = PathBuf::from(FALLBACK_DRIVER);
            is_executable(&fallback).then_some(fallback)
        })
        .ok_or_else(|| {
            FetchError::Driver(
                "chromedriver not found; set browser.driver_binary_path or CHROMEDRIVER".to_string(),
            )
        })
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn playwright_chromium() -> Option<PathBuf> {
    let cache = dirs::home_dir()?.join(".cache").join("ms-playwright");
    let mut installs: Vec<PathBuf> = std::fs::read_dir(cache)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("chromium-"))
        })
        .collect();
    installs.sort();

    installs
        .into_iter()
        .rev()
        .map(|dir| dir.join("chrome-linux64").join("chrome"))
        .find(|chrome| is_executable(chrome))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
