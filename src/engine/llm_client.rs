use std::fmt;
use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::NarrationConfig;
use crate::model::message::{Part, Turn};

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum NarrationError {
    #[display("The narrator returned no text")]
    EmptyResponse,
    #[display("Narration failed: {_0}")]
    Provider(String),
}

impl std::error::Error for NarrationError {}

/// Produces the model's next turn from the full conversation so far.
pub trait NarrationClient: Send + Sync {
    fn generate_narration(&self, history: &[Turn]) -> Result<String, NarrationError>;
}

#[derive(Clone, PartialEq, Eq)]
pub enum NarrationEndpoint {
    Proxy { url: String },
    Gemini { api_key: String, model: String },
}

impl fmt::Debug for NarrationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy { url } => f.debug_struct("Proxy").field("url", url).finish(),
            Self::Gemini { model, .. } => f.debug_struct("Gemini").field("model", model).finish_non_exhaustive(),
        }
    }
}

impl NarrationEndpoint {
    /// Proxy wins over a raw API key.
    pub fn from_config(config: &NarrationConfig) -> Option<Self> {
        if let Some(url) = &config.proxy_url {
            return Some(Self::Proxy { url: url.clone() });
        }
        config.api_key.as_ref().map(|key| Self::Gemini {
            api_key: key.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    history: &'a [Turn],
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Turn],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ProviderError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

pub struct HttpNarrationClient {
    client: Client,
    endpoint: Option<NarrationEndpoint>,
}

impl HttpNarrationClient {
    pub fn new(config: &NarrationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        let endpoint = NarrationEndpoint::from_config(config);
        match &endpoint {
            Some(endpoint) => tracing::info!(?endpoint, "narration endpoint configured"),
            None => tracing::warn!("no narration endpoint configured; turns will fail until one is set"),
        }
        Ok(Self { client, endpoint })
    }

    fn request(
        &self,
        endpoint: &NarrationEndpoint,
        history: &[Turn],
    ) -> reqwest::Result<reqwest::blocking::Request> {
        match endpoint {
            NarrationEndpoint::Proxy { url } => {
                self.client.post(url).json(&ProxyRequest { history }).build()
            }
            // The key travels in a header so it never shows up in URLs or errors.
            NarrationEndpoint::Gemini { api_key, model } => self
                .client
                .post(format!("{GEMINI_BASE}/{model}:generateContent"))
                .header(API_KEY_HEADER, api_key.as_str())
                .json(&GenerateContentRequest { contents: history })
                .build(),
        }
    }
}

impl NarrationClient for HttpNarrationClient {
    fn generate_narration(&self, history: &[Turn]) -> Result<String, NarrationError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(NarrationError::Provider(format!(
                "no narration endpoint; set {} or {}",
                crate::config::PROXY_URL_ENV,
                crate::config::GEMINI_KEY_ENV
            )));
        };

        tracing::debug!(turns = history.len(), "requesting narration");
        let response = self
            .request(endpoint, history)
            .and_then(|request| self.client.execute(request))
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().map_err(transport_error)?;

        read_reply(status.is_success(), status.as_u16(), &body)
    }
}

fn transport_error(e: reqwest::Error) -> NarrationError {
    NarrationError::Provider(e.without_url().to_string())
}

/// Pull the first candidate's text out of a provider reply body.
fn read_reply(success: bool, status: u16, body: &str) -> Result<String, NarrationError> {
    let parsed: Option<GenerateContentResponse> = serde_json::from_str(body).ok();

    if let Some(error) = parsed.as_ref().and_then(|r| r.error.as_ref()) {
        return Err(NarrationError::Provider(error.message.clone()));
    }
    if !success {
        return Err(NarrationError::Provider(format!("HTTP {status}")));
    }

    let Some(reply) = parsed else {
        return Err(NarrationError::Provider("reply was not valid JSON".to_string()));
    };
    let text = reply
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .map(|p| p.text)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(NarrationError::EmptyResponse);
    }
    Ok(text)
}
