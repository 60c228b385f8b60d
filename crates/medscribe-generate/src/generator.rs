//! `ReportGenerator` backed by the configured LLM provider.

use futures::future::BoxFuture;
use parking_lot::RwLock;
use reqwest::Client;
use tracing::{info, warn};

use medscribe_core::{Error, ReportGenerator, Result};

use crate::config::LLMConfig;
use crate::providers::{collect_text, stream_completion};
use crate::types::{ChatMessage, GeneratorConfigResponse, GeneratorConfigUpdate};

const SYSTEM_PROMPT: &str = "You revise clinical reports. Apply the clinician's instruction \
to the report and return the complete revised report as plain text. Keep every section, \
value and placeholder the instruction does not ask you to change. Do not add commentary.";

/// Regenerates reports through OpenAI, Anthropic or Groq.
pub struct LlmGenerator {
    config: RwLock<LLMConfig>,
    client: Client,
}

impl LlmGenerator {
    pub fn new(config: LLMConfig) -> Self {
        Self {
            config: RwLock::new(config),
            client: Client::new(),
        }
    }

    pub fn config_response(&self) -> GeneratorConfigResponse {
        self.config.read().to_response()
    }

    /// Merge an update and persist it.
    pub fn update_config(&self, update: &GeneratorConfigUpdate) -> Result<GeneratorConfigResponse> {
        let mut config = self.config.write();
        config.apply_update(update);
        config.save()?;
        Ok(config.to_response())
    }
}

pub(crate) fn build_messages(current_text: &str, instruction: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Instruction:\n{}\n\nCurrent report:\n{}",
            instruction.trim(),
            current_text
        )),
    ]
}

impl ReportGenerator for LlmGenerator {
    fn regenerate<'a>(
        &'a self,
        current_text: &'a str,
        instruction: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let (resolved, temperature, max_tokens) = {
                let config = self.config.read();
                (
                    config.resolve_provider(),
                    config.temperature,
                    config.max_tokens,
                )
            };
            let resolved = resolved
                .ok_or_else(|| Error::Regeneration("No LLM provider configured".into()))?;

            info!(
                "Regenerating report ({} chars) via {}",
                current_text.len(),
                resolved.provider
            );
            let stream = stream_completion(
                &self.client,
                &resolved,
                build_messages(current_text, instruction),
                temperature,
                max_tokens,
            );
            let text = collect_text(stream).await.map_err(|e| {
                warn!("Regeneration via {} failed: {}", resolved.provider, e);
                Error::Regeneration(e)
            })?;

            let text = text.trim().to_string();
            if text.is_empty() {
                return Err(Error::Regeneration("Provider returned an empty report".into()));
            }
            Ok(text)
        })
    }

    fn is_available(&self) -> bool {
        self.config.read().resolve_provider().is_some()
    }
}
