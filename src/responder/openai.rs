//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Prompt, Responder, ResponderError};
use crate::config::ResponderConfig;

const MAX_TOKENS: u32 = 400;

pub struct OpenAiResponder {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiResponder {
    pub fn new(api_key: String, config: &ResponderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    fn translate_request<'a>(&'a self, prompt: &'a Prompt) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: vec![
                CompletionMessage {
                    role: "system",
                    content: &prompt.system,
                },
                CompletionMessage {
                    role: "user",
                    content: &prompt.message,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: 0.6,
        }
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn respond(&self, prompt: &Prompt) -> Result<String, ResponderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.translate_request(prompt))
            .send()
            .await
            .map_err(|e| ResponderError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::from_status(status.as_u16(), &body));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ResponderError::invalid_response(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ResponderError::invalid_response("completion contained no text"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    content: Option<String>,
}
