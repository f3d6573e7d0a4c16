use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use ringline_core::config::EmailConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio::io::AsyncWriteExt;

use crate::errors::StageError;

/// A composed report ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Primary delivery channel. Optional; absence routes every report to the
/// durable archive instead.
#[async_trait]
pub trait ReportSender: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), StageError>;
}

/// SendGrid-style JSON mail API sender.
pub struct SendGridSender {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    from_address: String,
}

impl SendGridSender {
    /// `None` when no API key is configured.
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>, StageError> {
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
            from_address: config.from_address.clone(),
        }))
    }
}

#[async_trait]
impl ReportSender for SendGridSender {
    async fn send(&self, report: &Report) -> Result<(), StageError> {
        let to: Vec<_> = report.recipients.iter().map(|email| json!({ "email": email })).collect();
        let body = json!({
            "personalizations": [{ "to": to }],
            "from": { "email": self.from_address },
            "subject": report.subject,
            "content": [{ "type": "text/plain", "value": report.body }],
        });

        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StageError::Rejected(format!(
                "mail endpoint returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Durable local fallback: reports are appended to a flat file so a transport
/// outage never silently drops one.
pub struct ReportArchive {
    path: PathBuf,
}

impl ReportArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, report: &Report) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let rule = "=".repeat(50);
        let block = format!(
            "\n{rule}\nTO: {}\nSUBJECT: {}\nBODY:\n{}\n{rule}\n",
            report.recipients.join(", "),
            report.subject,
            report.body,
        );
        file.write_all(block.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use ringline_core::config::AppConfig;
    use tempfile::TempDir;

    use super::{Report, ReportArchive, SendGridSender};

    fn report() -> Report {
        Report {
            recipients: vec!["owner@example.com".to_owned()],
            subject: "Cannon Hill Phones Call | Menu repair | +615550123 | recording".to_owned(),
            body: "New voicemail recording received.".to_owned(),
        }
    }

    #[test]
    fn absent_api_key_means_no_sender() {
        let config = AppConfig::default().email;
        assert!(SendGridSender::from_config(&config).expect("build").is_none());
    }

    #[tokio::test]
    async fn archive_appends_rather_than_overwriting() {
        let dir = TempDir::new().expect("tempdir");
        let archive = ReportArchive::new(dir.path().join("reports.log"));

        archive.append(&report()).await.expect("first append");
        archive.append(&report()).await.expect("second append");

        let contents = std::fs::read_to_string(archive.path()).expect("read archive");
        assert_eq!(contents.matches("SUBJECT:").count(), 2);
        assert!(contents.contains("TO: owner@example.com"));
    }
}
