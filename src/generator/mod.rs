use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Map, Value};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;

pub mod model;

pub use model::{Credentials, GeneratedIdea, GenerationRequest, TimingSegment};

const GENERATE_PATH: &str = "v1/ideas";

/// Remote idea generator. Any `Err` counts as a failed job; its display
/// string becomes the reason reported to the caller.
#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedIdea>;
}

#[derive(Clone)]
pub struct HttpGenerator {
    http: Client,
    base_url: Url,
    api_key: String,
    model: Option<String>,
}

impl fmt::Debug for HttpGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpGenerator {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("content-batch/0.1")
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model: None,
        })
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.generator.base_url).context("invalid generator.base_url")?;
        let client = Self::new(
            base_url,
            cfg.generator.api_key.clone(),
            Duration::from_secs(cfg.generator.timeout_secs),
        )?;
        Ok(client.with_model(cfg.generator.model.clone()))
    }

    /// Request credentials take precedence over the configured ones.
    pub fn build_request(&self, request: &GenerationRequest) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(GENERATE_PATH)
            .context("invalid generator base URL")?;
        let key = request
            .credentials
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.api_key);
        let model = request
            .credentials
            .model
            .as_deref()
            .or(self.model.as_deref());
        let body = build_generate_body(request, model);
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&body)
            .build()
            .context("failed to build generator request")
    }

    async fn execute(&self, request: &GenerationRequest) -> Result<GeneratedIdea> {
        let http_request = self.build_request(request)?;
        debug!(url = %http_request.url(), date = %request.date, "sending generation request");
        for (name, value) in http_request.headers() {
            if name.as_str().eq_ignore_ascii_case("authorization") {
                debug!("  {}: Bearer [REDACTED]", name);
            } else {
                debug!("  {}: {}", name, value.to_str().unwrap_or("[invalid]"));
            }
        }

        let res = self
            .http
            .execute(http_request)
            .await
            .context("failed to reach generator")?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("Rate limited by generator: {}", body);
            bail!("received 429 from generator: {}", body);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "generator error: {}", body);
            bail!("generator error {}: {}", status, body);
        }

        let text = res
            .text()
            .await
            .context("failed to read generator response")?;
        let idea = parse_idea(&text)?;
        info!(date = %request.date, title = %idea.title, "generated idea");
        Ok(idea)
    }
}

#[async_trait]
impl IdeaGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedIdea> {
        self.execute(request).await
    }
}

pub fn build_generate_body(request: &GenerationRequest, model: Option<&str>) -> Value {
    let mut body = Map::new();
    body.insert("date".into(), json!(request.date.format("%Y-%m-%d").to_string()));
    body.insert("focus".into(), json!(request.focus));
    body.insert("length".into(), json!(request.length));
    body.insert("tone".into(), json!(request.tone));
    body.insert("content_type".into(), json!(request.content_type.as_str()));
    body.insert("include_timing".into(), json!(request.include_timing));
    if let Some(style) = request.style.as_deref().filter(|s| !s.is_empty()) {
        body.insert("style".into(), json!(style));
    }
    if let Some(pillar) = request.pillar {
        body.insert("pillar".into(), json!(pillar.label()));
    }
    if let Some(model) = model {
        body.insert("model".into(), json!(model));
    }
    Value::Object(body)
}

/// Parse and sanity-check a generator response body.
pub fn parse_idea(body: &str) -> Result<GeneratedIdea> {
    let idea: GeneratedIdea =
        serde_json::from_str(body).context("invalid generator response JSON")?;
    if idea.title.trim().is_empty() {
        return Err(anyhow!("generator returned an idea without a title"));
    }
    Ok(idea)
}
