//! OpenAI LLM provider.
//!
//! Uses the chat-completions API. Streaming responses arrive as
//! server-sent events (`data: {...}` lines terminated by `data: [DONE]`).

use crate::client::{LlmClient, LlmRequest, LlmResponse, TokenChunk, TokenStream};
use benebot_core::{AppError, AppResult};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client with an API key and optional custom endpoint.
    pub fn new(api_key: impl Into<String>, endpoint: Option<&str>) -> Self {
        Self {
            base_url: endpoint.unwrap_or(DEFAULT_OPENAI_URL).to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: request.stream,
        }
    }

    async fn send(&self, body: &ChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to OpenAI: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(model = %request.model, "Sending completion request to OpenAI");

        let mut body = self.to_chat_request(request);
        body.stream = false;

        let response = self.send(&body).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse OpenAI response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: parsed.model,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<TokenStream> {
        tracing::debug!(model = %request.model, "Starting streaming request to OpenAI");

        let mut body = self.to_chat_request(request);
        body.stream = true;

        let response = self.send(&body).await?;

        // SSE lines may be split across network chunks; carry a buffer.
        let stream = futures::stream::unfold(
            (response.bytes_stream(), String::new(), false),
            |(mut bytes, mut buffer, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(pos) = buffer.find('\n') {
                        let line: String = buffer.drain(..=pos).collect();
                        match parse_sse_line(line.trim()) {
                            SseLine::Skip => continue,
                            SseLine::Done => return None,
                            SseLine::Chunk(chunk) => {
                                let done = chunk.done;
                                return Some((Ok(chunk), (bytes, buffer, done)));
                            }
                            SseLine::Error(e) => return Some((Err(e), (bytes, buffer, true))),
                        }
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            buffer.push_str(&String::from_utf8_lossy(&chunk));
                        }
                        Some(Err(e)) => {
                            let err = AppError::Llm(format!("Stream error: {}", e));
                            return Some((Err(err), (bytes, buffer, true)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

enum SseLine {
    Skip,
    Done,
    Chunk(TokenChunk),
    Error(AppError),
}

/// Parse one SSE line from the chat-completions stream.
fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data.is_empty() {
        return SseLine::Skip;
    }
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(parsed) => {
            let Some(choice) = parsed.choices.into_iter().next() else {
                return SseLine::Skip;
            };
            SseLine::Chunk(TokenChunk {
                content: choice.delta.content.unwrap_or_default(),
                done: choice.finish_reason.is_some(),
            })
        }
        Err(e) => SseLine::Error(AppError::Llm(format!("Failed to parse chunk: {}", e))),
    }
}
