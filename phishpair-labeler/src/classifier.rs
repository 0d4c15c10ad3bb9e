//! Persuasion classifier
//!
//! `OpenAiClassifier` asks a chat completion model which persuasion
//! categories a document uses. Whatever the model answers is run through
//! `parse_classification`, so only known category names ever come back.

use crate::categories::{self, canonical};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini-2024-07-18";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Characters of document text sent to the model
pub const MAX_PROMPT_CHARS: usize = 4000;

const USER_AGENT: &str = concat!("phishpair-labeler/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;

const SYSTEM_PROMPT: &str =
    "You are a classifier that returns only the requested categories as a JSON array.";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Labels a document's text with persuasion categories
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Vec<String>, ClassifierError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completion client
pub struct OpenAiClassifier {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClassifier {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: OPENAI_BASE_URL.to_string(),
        })
    }

    /// Point at an API-compatible endpoint other than api.openai.com
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat request for one document
    pub fn build_request(&self, text: &str) -> ChatRequest {
        let excerpt: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        let prompt = format!(
            "Analyze the following text and classify it based ONLY on these categories: {}.\n\
             Return ONLY the applicable category names as a JSON array, with no explanation or additional text.\n\
             If none apply, return an empty array.\n\n\
             Text to analyze:\n{}",
            categories::prompt_listing(),
            excerpt
        );

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
            temperature: 0.0,
        }
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<String>, ClassifierError> {
        let request = self.build_request(text);
        debug!(model = %self.model, "Sending text for classification");

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api(status.as_u16(), body));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::Parse(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Parse("response has no message content".to_string()))?;

        let tags = parse_classification(&content);
        if tags.is_empty() {
            info!("No applicable categories found");
        } else {
            info!("Classified with tags: {}", tags.join(", "));
        }
        Ok(tags)
    }
}

/// Extract known category names from a model answer
///
/// Accepts a JSON array of names, a JSON object holding the names under
/// `categories` (or else its first list value), or free text mentioning
/// category names. Unknown labels are dropped, duplicates removed, and
/// the result uses canonical names in first-seen order.
pub fn parse_classification(answer: &str) -> Vec<String> {
    let answer = answer.trim();

    let labels: Vec<String> = match serde_json::from_str::<Value>(answer) {
        Ok(Value::Array(items)) => string_items(&items),
        Ok(Value::Object(map)) => match map.get("categories") {
            Some(Value::Array(items)) => string_items(items),
            _ => map
                .values()
                .find_map(|v| v.as_array())
                .map(|items| string_items(items))
                .unwrap_or_default(),
        },
        _ => categories::mentioned_in(answer)
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    let mut tags: Vec<String> = Vec::new();
    for label in labels {
        if let Some(name) = canonical(&label) {
            if !tags.iter().any(|t| t == name) {
                tags.push(name.to_string());
            }
        }
    }
    tags
}

fn string_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
