use std::time::Duration;

use async_trait::async_trait;
use ringline_core::config::TranscriptionConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::errors::StageError;

const SYSTEM_PROMPT: &str = "You are a helpful assistant for a phone repair shop. \
    Summarize the following customer inquiry concisely in English.";

/// Condenses a transcript into a short summary. Optional capability, same
/// degradation contract as transcription.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<String, StageError>;
}

/// Chat-completions summarizer sharing the transcription credential.
pub struct ChatSummarizer {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatSummarizer {
    /// `None` when no API key is configured.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Option<Self>, StageError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: config.summary_model.clone(),
        }))
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<String, StageError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": transcript },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StageError::Rejected(format!(
                "summary endpoint returned status {}",
                response.status()
            )));
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| StageError::Rejected("summary response contained no choices".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use ringline_core::config::AppConfig;

    use super::ChatSummarizer;

    #[test]
    fn absent_api_key_means_no_summarizer() {
        let config = AppConfig::default().transcription;
        assert!(ChatSummarizer::from_config(&config).expect("build").is_none());
    }
}
