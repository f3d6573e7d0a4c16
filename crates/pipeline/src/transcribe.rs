use std::time::Duration;

use async_trait::async_trait;
use ringline_core::config::TranscriptionConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::errors::StageError;

/// Turns a recording URL into transcript text. Optional capability; the
/// pipeline substitutes a placeholder when it is absent or failing.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, recording_url: &str) -> Result<String, StageError>;
}

/// Whisper-style HTTP transcriber: download the recording (optionally with
/// the voice provider's basic-auth pair), then upload it as multipart
/// form data to an audio-transcriptions endpoint.
pub struct WhisperTranscriber {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
    recording_auth: Option<(String, SecretString)>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    /// `None` when no API key is configured.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Option<Self>, StageError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let recording_auth = match (&config.recording_auth_sid, &config.recording_auth_token) {
            (Some(sid), Some(token)) => Some((sid.clone(), token.clone())),
            _ => None,
        };

        Ok(Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: config.model.clone(),
            recording_auth,
        }))
    }

    async fn download(&self, recording_url: &str) -> Result<Vec<u8>, StageError> {
        let mut request = self.http.get(recording_url);
        if let Some((sid, token)) = &self.recording_auth {
            request = request.basic_auth(sid, Some(token.expose_secret()));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StageError::Rejected(format!(
                "recording download returned status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, recording_url: &str) -> Result<String, StageError> {
        let audio = self.download(recording_url).await?;

        let file = reqwest::multipart::Part::bytes(audio)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .map_err(|err| StageError::Transport(err.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("language", "en")
            .part("file", file);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StageError::Rejected(format!(
                "transcription endpoint returned status {}",
                response.status()
            )));
        }

        let payload: TranscriptionResponse = response.json().await?;
        Ok(payload.text)
    }
}
