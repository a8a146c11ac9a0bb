use anyhow::{Context, Result};
use axum::body::Bytes;
use rand::Rng;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::config::SecretTransport;

/// Header carrying the shared secret when header transport is enabled.
pub const SECRET_HEADER: &str = "X-Bridge-Secret";

/// The configured Apps Script deployments. Never empty.
#[derive(Debug, Clone)]
pub struct BackendPool {
    targets: Vec<Url>,
}

/// One backend drawn from the pool for the lifetime of a request.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
    /// Zero-based position in the pool.
    pub index: usize,
    pub pool_size: usize,
}

impl Target {
    /// One-based position, as reported to dashboard clients.
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    pub fn is_pooled(&self) -> bool {
        self.pool_size > 1
    }
}

impl BackendPool {
    /// Parse a comma-separated list of URLs. Blank input means "not configured".
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let targets = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Url::parse(s).with_context(|| format!("Invalid backend URL: {s}")))
            .collect::<Result<Vec<_>>>()?;

        if targets.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self { targets }))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Uniform random draw. No affinity, no health tracking.
    pub fn pick(&self) -> Target {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Target {
        let index = if self.targets.len() == 1 {
            0
        } else {
            rng.gen_range(0..self.targets.len())
        };
        Target {
            url: self.targets[index].clone(),
            index,
            pool_size: self.targets.len(),
        }
    }
}

/// Set `key` on the URL query, replacing any previous value.
fn set_query(url: &mut Url, key: &str, value: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (k, v) in &kept {
        pairs.append_pair(k, v);
    }
    pairs.append_pair(key, value);
}

/// Raw text reply from the backend plus its declared content type.
#[derive(Debug)]
pub struct TextReply {
    pub body: String,
    pub content_type: Option<String>,
}

/// Client for one request's backend target.
#[derive(Clone)]
pub struct Backend {
    http: reqwest::Client,
    target: Target,
    secret: Option<String>,
    transport: SecretTransport,
}

impl Backend {
    pub fn new(
        http: reqwest::Client,
        target: Target,
        secret: Option<String>,
        transport: SecretTransport,
    ) -> Self {
        Self {
            http,
            target,
            secret,
            transport,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.target.url.clone();
        for (key, value) in params {
            set_query(&mut url, key, value);
        }
        if let Some(secret) = self.secret.as_deref() {
            if self.transport.uses_query() {
                set_query(&mut url, "secret", secret);
            }
        }
        url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.secret.as_deref() {
            Some(secret) if self.transport.uses_header() => request.header(SECRET_HEADER, secret),
            _ => request,
        }
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        debug!(
            "Backend GET #{} of {} with {} params",
            self.target.ordinal(),
            self.target.pool_size,
            params.len()
        );
        // URLs carry the secret; strip them from transport errors.
        self.authorize(self.http.get(self.url(params)))
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to reach backend")
    }

    /// GET with the given query parameters and return the body untouched.
    pub async fn fetch_text(&self, params: &[(&str, &str)]) -> Result<TextReply> {
        let response = self.get(params).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to read backend response")?;
        Ok(TextReply { body, content_type })
    }

    /// GET with the given query parameters and parse the body as JSON.
    pub async fn fetch_json(&self, params: &[(&str, &str)]) -> Result<Value> {
        let reply = self.fetch_text(params).await?;
        serde_json::from_str(&reply.body).context("Backend returned invalid JSON")
    }

    /// Invoke a named backend action and parse its JSON reply.
    pub async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("action", action));
        all.extend_from_slice(params);
        self.fetch_json(&all)
            .await
            .with_context(|| format!("Backend action {action} failed"))
    }

    /// Invoke a named backend action, checking only the status code.
    pub async fn notify(&self, action: &str, params: &[(&str, &str)]) -> Result<()> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("action", action));
        all.extend_from_slice(params);
        let response = self.get(&all).await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Backend action {action} returned {status}");
        }
        Ok(())
    }

    /// POST a Telegram update body to the backend unchanged.
    pub async fn forward_update(&self, body: Bytes) -> Result<String> {
        debug!(
            "Forwarding {} byte update to backend #{}",
            body.len(),
            self.target.ordinal()
        );
        let response = self
            .authorize(self.http.post(self.url(&[])))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to forward update to backend")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to read backend response")?;
        if !status.is_success() {
            anyhow::bail!("Backend rejected update ({status}): {text}");
        }
        Ok(text)
    }
}
