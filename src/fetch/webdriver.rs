//! Minimal W3C WebDriver client over HTTP.
//!
//! Only the handful of commands needed to load a page, poll for elements and
//! read back the rendered markup.

use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::fetch::FetchError;

/// How to find elements. Mirrors the W3C locator strategies we use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator<'a> {
    XPath(&'a str),
}

impl Locator<'_> {
    fn to_json(self) -> Value {
        match self {
            Self::XPath(value) => json!({"using": "xpath", "value": value}),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base: Url,
}

impl WebDriverClient {
    pub fn new(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// `GET /status` → `value.ready`.
    pub async fn is_ready(&self) -> Result<bool, FetchError> {
        let value = self.command(reqwest::Method::GET, "status", None).await?;
        Ok(value.get("ready").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Start a browser session with the given `alwaysMatch` capabilities.
    pub async fn new_session(&self, capabilities: Value) -> Result<Session<'_>, FetchError> {
        let body = json!({"capabilities": {"alwaysMatch": capabilities}});
        let value = self
            .command(reqwest::Method::POST, "session", Some(body))
            .await?;

        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::WebDriver {
                error: "session not created".to_string(),
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();

        debug!(session = %id, "WebDriver session started");
        Ok(Session { client: self, id })
    }

    /// Send a command and return the `value` member of the response.
    async fn command(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| FetchError::Driver(format!("bad WebDriver path {path}: {e}")))?;

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(path, e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(path, e))?;

        let mut payload: Value = serde_json::from_str(&text).map_err(|e| FetchError::InvalidJson {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(FetchError::WebDriver {
                error: error.to_string(),
                message: value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                path: path.to_string(),
                body: text.chars().take(200).collect(),
            });
        }

        Ok(value)
    }
}

/// An open browser session. Call [`Session::delete`] when done; dropping it
/// leaves the browser running until the driver exits.
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a WebDriverClient,
    id: String,
}

impl Session<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn navigate(&self, url: &Url) -> Result<(), FetchError> {
        self.command(reqwest::Method::POST, "url", Some(json!({"url": url.as_str()})))
            .await?;
        Ok(())
    }

    /// Number of elements currently matching `locator`.
    pub async fn count_elements(&self, locator: Locator<'_>) -> Result<usize, FetchError> {
        let value = self
            .command(reqwest::Method::POST, "elements", Some(locator.to_json()))
            .await?;
        Ok(value.as_array().map_or(0, Vec::len))
    }

    pub async fn page_source(&self) -> Result<String, FetchError> {
        let value = self.command(reqwest::Method::GET, "source", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    pub async fn delete(self) -> Result<(), FetchError> {
        let path = format!("session/{}", self.id);
        self.client
            .command(reqwest::Method::DELETE, &path, None)
            .await?;
        debug!(session = %self.id, "WebDriver session closed");
        Ok(())
    }

    async fn command(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let path = format!("session/{}/{endpoint}", self.id);
        self.client.command(method, &path, body).await
    }
}
