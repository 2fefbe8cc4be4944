pub mod types;

pub use types::{ChatMessage, ChatRequest, ChatResponse, Role};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::{Config, Settings};

/// Appended verbatim after the diff in the user message.
pub const REVIEW_INSTRUCTION: &str = "\nPlease provide a final consideration for this PR in Markdown format, focusing only on potential issues and ensuring the application's stability. Include an 'Approved: true/false' statement at the end for easy decision-making.Thank you!";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Failed to serialize chat request: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("Chat completion request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Failed to read chat completion response: {0}")]
    ResponseRead(#[source] reqwest::Error),

    #[error("Failed to parse chat completion response: {0}")]
    Deserialization(#[source] serde_json::Error),

    #[error("No response received from the model{}", detail_suffix(.detail))]
    EmptyResponse { detail: Option<String> },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {detail}"),
        None => String::new(),
    }
}

/// Anything that can turn a diff into review text.
#[async_trait]
pub trait ReviewModel: Send + Sync {
    async fn review(&self, diff: &str, api_key: &str) -> Result<String, ReviewError>;
}

/// Pick the instruction appended to the diff.
///
/// The configured custom prompt replaces the built-in instruction only when
/// `use_custom` is set and the prompt is not blank.
pub fn instruction_for(config: &Config, use_custom: bool) -> String {
    if !use_custom {
        return REVIEW_INSTRUCTION.to_string();
    }
    match config.custom_prompt() {
        Some(custom) => format!("\n{custom}"),
        None => {
            warn!("--custom-prompt given but [prompt] custom is empty, using the built-in instruction");
            REVIEW_INSTRUCTION.to_string()
        }
    }
}

/// Build the single-message chat request for a diff.
pub fn build_request(settings: &Settings, diff: &str, instruction: &str) -> ChatRequest {
    let mut content = String::with_capacity(diff.len() + instruction.len());
    content.push_str(diff);
    content.push_str(instruction);

    ChatRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage {
            role: Role::User,
            content,
        }],
        temperature: settings.temperature,
    }
}

/// Take the first choice's content, verbatim.
fn first_choice(response: ChatResponse) -> Result<String, ReviewError> {
    match response.choices.into_iter().next() {
        Some(choice) => Ok(choice.message.content.unwrap_or_default()),
        None => Err(ReviewError::EmptyResponse {
            detail: response.error.map(|e| e.message),
        }),
    }
}

/// Review generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiReviewer {
    client: reqwest::Client,
    settings: Settings,
    instruction: String,
}

impl OpenAiReviewer {
    /// No timeout is set; the request waits on the transport's own limits.
    pub fn new(settings: &Settings, instruction: impl Into<String>) -> Result<Self, ReviewError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(ReviewError::Request)?;
        Ok(Self {
            client,
            settings: settings.clone(),
            instruction: instruction.into(),
        })
    }
}

#[async_trait]
impl ReviewModel for OpenAiReviewer {
    #[instrument(skip_all, fields(endpoint = %self.settings.endpoint, model = %self.settings.model))]
    async fn review(&self, diff: &str, api_key: &str) -> Result<String, ReviewError> {
        let request = build_request(&self.settings, diff, &self.instruction);
        let body = serde_json::to_vec(&request).map_err(ReviewError::Serialization)?;
        debug!(body_bytes = body.len(), "sending chat completion request");

        let response = self
            .client
            .post(&self.settings.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .body(body)
            .send()
            .await
            .map_err(ReviewError::Request)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ReviewError::ResponseRead)?;
        debug!(%status, response_bytes = bytes.len(), "received chat completion response");

        let parsed: ChatResponse =
            serde_json::from_slice(&bytes).map_err(ReviewError::Deserialization)?;

        if let Some(error) = &parsed.error {
            warn!(%status, kind = ?error.kind, message = %error.message, "model API returned an error");
        }
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }

        first_choice(parsed)
    }
}
