//! Oracle client: a thin transport to the text-generation service.
//!
//! The oracle is an external, rate-limited, free-text-generating service.
//! This module owns exactly one concern: turn a prompt into raw response
//! text, or an [`OracleError`]. Retries, fallbacks, and inter-call delays
//! all live with the callers: every engine in this crate has its own idea
//! of how many attempts a failure is worth, and a transport that silently
//! retried underneath them would wreck that accounting.
//!
//! # Architecture
//!
//! - [`Oracle`]: the trait every engine is written against
//! - [`HttpOracle`]: the production implementation, an OpenAI-compatible
//!   chat-completions call over `reqwest`
//! - `testing::ScriptedOracle` (test builds only): replays a canned script
//!   of responses so the engines' retry ladders can be exercised offline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Errors a single oracle call can produce.
///
/// All of these are recoverable locally; no caller lets one propagate past
/// its own component boundary.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned status {status}: {preview}")]
    Status { status: u16, preview: String },

    #[error("response carried no message content")]
    EmptyResponse,

    #[error("expected JSON but response did not parse: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// A live-search recency window, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct SearchWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Per-call generation options.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_output_tokens: u32,
    /// When set, the response is required to parse as a JSON object; text
    /// that does not is an [`OracleError::MalformedJson`].
    pub expect_json: bool,
    /// When set, the request asks the service to ground itself in live
    /// search results from this window.
    pub search_window: Option<SearchWindow>,
    pub max_search_results: Option<u32>,
}

impl GenerateOptions {
    /// Options for a structured-JSON call with no live search.
    pub fn json(max_output_tokens: u32) -> Self {
        Self {
            max_output_tokens,
            expect_json: true,
            search_window: None,
            max_search_results: None,
        }
    }

    /// Options for a free-prose call.
    pub fn text(max_output_tokens: u32) -> Self {
        Self {
            max_output_tokens,
            expect_json: false,
            search_window: None,
            max_search_results: None,
        }
    }

    pub fn with_search(mut self, window: SearchWindow, max_results: u32) -> Self {
        self.search_window = Some(window);
        self.max_search_results = Some(max_results);
        self
    }
}

/// The seam every engine talks to the oracle through.
pub trait Oracle {
    /// Send a prompt, get raw response text.
    async fn generate(&self, prompt: &str, opts: &GenerateOptions)
    -> Result<String, OracleError>;
}

/// Production oracle: OpenAI-compatible chat-completions endpoint.
pub struct HttpOracle {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct SearchSource {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct SearchParameters {
    mode: &'static str,
    return_citations: bool,
    max_search_results: u32,
    sources: Vec<SearchSource>,
    from_date: String,
    to_date: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_parameters: Option<SearchParameters>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpOracle {
    /// Build a client for the given endpoint, key, and model identifier.
    pub fn new(endpoint: String, api_key: String, model: String) -> Result<Self, OracleError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            model,
        })
    }

    fn search_parameters(opts: &GenerateOptions) -> Option<SearchParameters> {
        opts.search_window.map(|window| SearchParameters {
            mode: "on",
            return_citations: true,
            max_search_results: opts.max_search_results.unwrap_or(15),
            sources: vec![
                SearchSource { kind: "web" },
                SearchSource { kind: "news" },
                SearchSource { kind: "x" },
            ],
            from_date: window.from.to_string(),
            to_date: window.to.to_string(),
        })
    }
}

impl Oracle for HttpOracle {
    #[instrument(level = "info", skip_all, fields(model = %self.model, expect_json = opts.expect_json))]
    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerateOptions,
    ) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: opts.max_output_tokens,
            response_format: opts.expect_json.then_some(ResponseFormat {
                kind: "json_object",
            }),
            search_parameters: Self::search_parameters(opts),
        };

        let t0 = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "Oracle returned non-success status"
            );
            return Err(OracleError::Status {
                status: status.as_u16(),
                preview: crate::utils::truncate_for_log(&body, 200),
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(OracleError::EmptyResponse)?;

        if opts.expect_json {
            // Shape checks beyond "is a JSON object" belong to the callers.
            let parsed: serde_json::Value = serde_json::from_str(&content)?;
            if !parsed.is_object() {
                return Err(OracleError::EmptyResponse);
            }
        }

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            bytes = content.len(),
            "Oracle call succeeded"
        );
        Ok(content)
    }
}
