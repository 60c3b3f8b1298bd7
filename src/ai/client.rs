use crate::config::AiConfig;
use rocket::serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("request to model API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model API returned no completion text")]
    EmptyCompletion,

    #[error("no JSON object found in model output")]
    NoJson,

    #[error("model output has the wrong shape: {0}")]
    InvalidShape(String),
}

impl AiError {
    /// Short label separating transport failures from unusable output.
    pub fn failure_class(&self) -> &'static str {
        match self {
            AiError::Request(_) | AiError::Status { .. } | AiError::EmptyCompletion => "call",
            AiError::NoJson | AiError::InvalidShape(_) => "output",
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::InvalidShape(err.to_string())
    }
}

/// One free-text completion from a hosted model.
#[rocket::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AiError>;
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionsClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("task_backend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(ChatCompletionsClient {
            http,
            endpoint: format!("{}/chat/completions", config.base_url),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[rocket::async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: 0.3,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::EmptyCompletion)
    }
}
