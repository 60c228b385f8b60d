//! Streaming completions from external LLM providers.
//!
//! OpenAI and Groq share the chat-completions SSE format; Anthropic uses
//! the Messages API event stream. Both are reduced to `StreamChunk`s.

use std::pin::Pin;

use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::types::{ChatMessage, LLMProvider, ResolvedProvider};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// What one SSE `data:` payload means.
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Token(String),
    Done,
    Error(String),
    Skip,
}

/// Stream a completion from the resolved provider.
pub fn stream_completion(
    client: &Client,
    resolved: &ResolvedProvider,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: usize,
) -> BoxedStream {
    let provider = resolved.provider;
    let request = build_request(client, resolved, &messages, temperature, max_tokens);
    let model = resolved.model.clone();

    Box::pin(async_stream::stream! {
        debug!("Streaming from {} with model {}", provider, model);

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();
        let mut token_count = 0usize;

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            for payload in drain_data_lines(&mut buffer) {
                match decode(provider, &payload) {
                    SseEvent::Token(text) => {
                        token_count += 1;
                        yield StreamChunk::Token(text);
                    }
                    SseEvent::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseEvent::Error(msg) => {
                        error!("{} stream error: {}", provider, msg);
                        yield StreamChunk::Error(msg);
                        return;
                    }
                    SseEvent::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    })
}

/// Collect a stream into the full completion text.
pub async fn collect_text(mut stream: BoxedStream) -> Result<String, String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Token(t) => text.push_str(&t),
            StreamChunk::Done { .. } => break,
            StreamChunk::Error(e) => return Err(e),
        }
    }
    Ok(text)
}

fn build_request(
    client: &Client,
    resolved: &ResolvedProvider,
    messages: &[ChatMessage],
    temperature: f64,
    max_tokens: usize,
) -> reqwest::RequestBuilder {
    match resolved.provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            let url = if resolved.provider == LLMProvider::OpenAI {
                OPENAI_URL
            } else {
                GROQ_URL
            };
            let msgs: Vec<serde_json::Value> = messages
                .iter()
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect();
            client
                .post(url)
                .header("Authorization", format!("Bearer {}", resolved.api_key))
                .json(&json!({
                    "model": resolved.model,
                    "messages": msgs,
                    "temperature": temperature,
                    "max_tokens": max_tokens,
                    "stream": true,
                }))
        }
        LLMProvider::Anthropic => {
            let conv: Vec<serde_json::Value> = messages
                .iter()
                .filter(|m| m.role != "system")
                .map(|m| json!({"role": m.role, "content": m.content}))
                .collect();
            let mut body = json!({
                "model": resolved.model,
                "messages": conv,
                "temperature": temperature,
                "max_tokens": max_tokens,
                "stream": true,
            });
            if let Some(sys) = messages.iter().find(|m| m.role == "system") {
                body["system"] = json!(sys.content);
            }
            client
                .post(ANTHROPIC_URL)
                .header("x-api-key", &resolved.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        }
    }
}

/// Remove complete lines from `buffer` and return their `data:` payloads.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    let mut payloads = Vec::new();
    while let Some(line_end) = buffer.find('\n') {
        let line: String = buffer.drain(..=line_end).collect();
        let line = line.trim();
        if let Some(data) = line.strip_prefix("data:") {
            payloads.push(data.trim().to_string());
        }
    }
    payloads
}

pub(crate) fn decode(provider: LLMProvider, payload: &str) -> SseEvent {
    if provider != LLMProvider::Anthropic && payload == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(payload) else {
        return SseEvent::Skip;
    };

    match provider {
        LLMProvider::OpenAI | LLMProvider::Groq => {
            if let Some(msg) = parsed["error"]["message"].as_str() {
                return SseEvent::Error(msg.to_string());
            }
            match parsed["choices"][0]["delta"]["content"].as_str() {
                Some(content) if !content.is_empty() => SseEvent::Token(content.to_string()),
                _ => SseEvent::Skip,
            }
        }
        LLMProvider::Anthropic => match parsed["type"].as_str() {
            Some("content_block_delta") => match parsed["delta"]["text"].as_str() {
                Some(text) if !text.is_empty() => SseEvent::Token(text.to_string()),
                _ => SseEvent::Skip,
            },
            Some("message_stop") => SseEvent::Done,
            Some("error") => SseEvent::Error(
                parsed["error"]["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            _ => SseEvent::Skip,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_keeps_partial_line() {
        let mut buffer = String::from("event: ping\ndata: {\"a\":1}\n: comment\ndata: [DO");
        let payloads = drain_data_lines(&mut buffer);
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
        assert_eq!(buffer, "data: [DO");
    }

    #[test]
    fn test_decode_openai() {
        let token = r#"{"choices":[{"delta":{"content":"pH"}}]}"#;
        assert_eq!(decode(LLMProvider::OpenAI, token), SseEvent::Token("pH".into()));
        assert_eq!(decode(LLMProvider::Groq, "[DONE]"), SseEvent::Done);
        assert_eq!(
            decode(LLMProvider::OpenAI, r#"{"choices":[{"delta":{}}]}"#),
            SseEvent::Skip
        );
    }

    #[test]
    fn test_decode_anthropic() {
        let delta = r#"{"type":"content_block_delta","delta":{"text":"7.31"}}"#;
        assert_eq!(decode(LLMProvider::Anthropic, delta), SseEvent::Token("7.31".into()));
        assert_eq!(
            decode(LLMProvider::Anthropic, r#"{"type":"message_stop"}"#),
            SseEvent::Done
        );
        assert_eq!(
            decode(
                LLMProvider::Anthropic,
                r#"{"type":"error","error":{"message":"overloaded"}}"#
            ),
            SseEvent::Error("overloaded".into())
        );
    }

    #[tokio::test]
    async fn test_collect_text() {
        let chunks = vec![
            StreamChunk::Token("Na: ".into()),
            StreamChunk::Token("140".into()),
            StreamChunk::Done { tokens_used: 2 },
            StreamChunk::Token("ignored".into()),
        ];
        let stream: BoxedStream = Box::pin(tokio_stream::iter(chunks));
        assert_eq!(collect_text(stream).await.unwrap(), "Na: 140");

        let failing: BoxedStream = Box::pin(tokio_stream::iter(vec![
            StreamChunk::Token("partial".into()),
            StreamChunk::Error("API error 500".into()),
        ]));
        assert_eq!(collect_text(failing).await.unwrap_err(), "API error 500");
    }
}
