//! The external content-understanding service.
//!
//! The pipeline only depends on [`ContentCollaborator`]; the production
//! implementation talks to an OpenAI-compatible chat-completions endpoint.

use crate::components::schema::registry;
use crate::config::CollaboratorConfig;
use crate::error::ExtractionError;
use anyhow::Context;
use lazy_static::lazy_static;
use reqwest::Client;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Which reply-size limit a call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenBudget {
    Document,
    Chunk,
}

/// A black box that answers system instructions plus user content with free
/// text. Replies are expected, but never trusted, to hold JSON.
pub trait ContentCollaborator: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        instructions: &str,
        content: &str,
        budget: TokenBudget,
    ) -> impl Future<Output = Result<String, ExtractionError>> + Send;
}

pub struct OpenAiCollaborator {
    client: Client,
    endpoint: Url,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    chunk_max_tokens: u32,
}

impl OpenAiCollaborator {
    /// The API key is looked up once here; a missing key only fails the
    /// individual calls, so callers can still fall back.
    pub fn new(config: &CollaboratorConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid collaborator endpoint: {}", config.endpoint))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("md2site/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            log::warn!(
                "{} is not set; extraction calls will fail and use the fallback parser",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            chunk_max_tokens: config.chunk_max_tokens,
        })
    }
}

impl ContentCollaborator for OpenAiCollaborator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        instructions: &str,
        content: &str,
        budget: TokenBudget,
    ) -> Result<String, ExtractionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ExtractionError::MissingApiKey(self.api_key_env.clone()))?;

        let max_tokens = match budget {
            TokenBudget::Document => self.max_tokens,
            TokenBudget::Chunk => self.chunk_max_tokens,
        };

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": content},
            ],
            "temperature": self.temperature,
            "max_tokens": max_tokens,
        });

        log::debug!(
            "Requesting completion from {} ({} chars, max_tokens {})",
            self.model,
            content.chars().count(),
            max_tokens
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: Value = response.json().await?;
        reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string)
            .ok_or(ExtractionError::EmptyReply)
    }
}

const CONTENT_TYPES: [&str; 8] = [
    "core-business",
    "leadership",
    "services",
    "contact",
    "awards",
    "process",
    "background",
    "other",
];

lazy_static! {
    static ref DOCUMENT_INSTRUCTIONS: String = build_document_instructions();
}

fn build_document_instructions() -> String {
    let mut text = String::from(
        "You convert markdown documents into structured page components for a generated microsite.\n\
         Choose the most specific component type for each piece of essential content. Skip \
         lengthy background, internal detail and repetition.\n\
         Use at most one \"hero\" and at most two \"section\" components, and prefer a \
         diverse mix of types.\n\nAvailable component types:\n",
    );

    for schema in registry().iter() {
        text.push_str(&format!("- {}", schema.kind));
        if !schema.required_props.is_empty() {
            text.push_str(&format!(" (required: {})", schema.required_props.join(", ")));
        }
        if !schema.optional_props.is_empty() {
            text.push_str(&format!(" (optional: {})", schema.optional_props.join(", ")));
        }
        text.push('\n');
    }

    text.push_str(&format!(
        "\nScore every component with relevanceScore (0-100) and classify it with contentType, \
         one of: {}.\n",
        CONTENT_TYPES.join(", ")
    ));
    text.push_str(
        "\nRespond with ONLY a JSON object, no explanations or code fences:\n\
         {\"components\": [{\"type\": \"...\", \"props\": {...}, \"relevanceScore\": 90, \
         \"contentType\": \"core-business\"}], \
         \"metadata\": {\"title\": \"...\", \"description\": \"...\", \"tags\": [\"...\"]}}\n",
    );
    text
}

/// System instructions for a whole-document call.
pub fn document_instructions() -> &'static str {
    &DOCUMENT_INSTRUCTIONS
}

/// System instructions for chunk `index` (zero-based) of `total`. Only the
/// first chunk is asked for document metadata.
pub fn chunk_instructions(index: usize, total: usize) -> String {
    let metadata_request = if index == 0 {
        "Extract the document title, description and tags for metadata from this first chunk.\n"
    } else {
        ""
    };
    format!(
        "Parse this markdown chunk ({}/{}) into components.\n{}Return ONLY valid JSON.\n\n{}",
        index + 1,
        total,
        metadata_request,
        document_instructions()
    )
}

/// Run one collaborator call under a deadline. Hitting the deadline is an
/// ordinary call failure.
pub async fn complete_with_timeout<C: ContentCollaborator>(
    collaborator: &C,
    instructions: &str,
    content: &str,
    budget: TokenBudget,
    limit: Duration,
) -> Result<String, ExtractionError> {
    match tokio::time::timeout(limit, collaborator.complete(instructions, content, budget)).await {
        Ok(reply) => reply,
        Err(_) => Err(ExtractionError::Timeout(limit)),
    }
}
