use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use ringline_core::TenantId;
use ringline_tenant::ConfigCache;
use tracing::{error, info, warn};

use crate::deliver::{Report, ReportArchive, ReportSender};
use crate::report::{self, ReportContext};
use crate::summarize::Summarizer;
use crate::transcribe::Transcriber;

pub const TRANSCRIPT_UNCONFIGURED: &str = "Transcription not available (transcriber not configured)";
pub const TRANSCRIPT_FAILED: &str = "Transcription not available (processing failed)";
pub const SUMMARY_UNCONFIGURED: &str = "Summary not available (summarizer not configured)";
pub const SUMMARY_FAILED: &str = "Summary not available (summarization failed)";
pub const SUMMARY_SKIPPED: &str = "Summary not available (no transcript to summarize)";

/// Everything known about a completed recording, assembled from the webhook
/// payload and the call session. Consumed once, then discarded.
#[derive(Clone, Debug)]
pub struct RecordingJob {
    pub tenant_id: TenantId,
    pub recording_url: String,
    pub from_number: Option<String>,
    pub call_sid: Option<String>,
    pub duration: Option<String>,
    pub menu_selection: Option<String>,
}

/// Best-effort staged processing of one recording: config lookup, timestamp
/// resolution, transcription, summarization, report composition, delivery.
///
/// Every stage degrades instead of aborting; the only early exit is a tenant
/// with no resolvable recipients, because then there is nothing to deliver
/// to. The pipeline runs detached from the webhook path and never blocks it.
pub struct RecordingPipeline {
    cache: Arc<ConfigCache>,
    transcriber: Option<Arc<dyn Transcriber>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    sender: Option<Arc<dyn ReportSender>>,
    archive: ReportArchive,
}

impl RecordingPipeline {
    pub fn new(
        cache: Arc<ConfigCache>,
        transcriber: Option<Arc<dyn Transcriber>>,
        summarizer: Option<Arc<dyn Summarizer>>,
        sender: Option<Arc<dyn ReportSender>>,
        archive: ReportArchive,
    ) -> Self {
        Self { cache, transcriber, summarizer, sender, archive }
    }

    /// Fire-and-forget entry point for the webhook layer.
    pub fn dispatch(self: &Arc<Self>, job: RecordingJob) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.process(job).await;
        });
    }

    pub async fn process(&self, job: RecordingJob) {
        let call_sid = job.call_sid.clone().unwrap_or_else(|| "unknown".to_owned());
        let menu_selection = job.menu_selection.clone().unwrap_or_else(|| "unknown".to_owned());
        let from_number = job.from_number.clone().unwrap_or_else(|| "unknown".to_owned());
        let duration = job.duration.clone().unwrap_or_else(|| "N/A".to_owned());

        info!(
            tenant = %job.tenant_id,
            call_sid = %call_sid,
            menu_selection = %menu_selection,
            "processing recording"
        );

        let (config, origin) = self.cache.get(&job.tenant_id).await;
        let recipients = config.email_recipients();
        if recipients.is_empty() {
            error!(
                tenant = %job.tenant_id,
                call_sid = %call_sid,
                stage = "config",
                config_origin = origin.as_str(),
                "no email recipients configured, nothing to deliver to"
            );
            return;
        }

        let store_name = config.setting("store_name").unwrap_or("Store");
        let timezone = config.setting("timezone").unwrap_or("UTC");
        let tz: Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
        let timestamp = Utc::now().with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string();

        let (transcript, summary) = self.transcribe_and_summarize(&job, &call_sid).await;

        let report = Report {
            recipients,
            subject: report::subject(store_name, &menu_selection, &from_number),
            body: report::body(&ReportContext {
                store_name,
                from_number: &from_number,
                timestamp: &timestamp,
                timezone,
                menu_selection: &menu_selection,
                duration: &duration,
                call_sid: &call_sid,
                summary: &summary,
                transcript: &transcript,
                recording_url: &job.recording_url,
            }),
        };

        self.deliver(&job.tenant_id, &call_sid, &report).await;
    }

    async fn transcribe_and_summarize(
        &self,
        job: &RecordingJob,
        call_sid: &str,
    ) -> (String, String) {
        let Some(transcriber) = &self.transcriber else {
            warn!(
                tenant = %job.tenant_id,
                call_sid = %call_sid,
                stage = "transcription",
                "transcriber not configured, using placeholder"
            );
            return (TRANSCRIPT_UNCONFIGURED.to_owned(), SUMMARY_UNCONFIGURED.to_owned());
        };

        match transcriber.transcribe(&job.recording_url).await {
            Ok(transcript) => {
                info!(
                    tenant = %job.tenant_id,
                    call_sid = %call_sid,
                    stage = "transcription",
                    chars = transcript.len(),
                    "transcription complete"
                );
                let summary = self.summarize(job, call_sid, &transcript).await;
                (transcript, summary)
            }
            Err(err) => {
                warn!(
                    tenant = %job.tenant_id,
                    call_sid = %call_sid,
                    stage = "transcription",
                    error = %err,
                    "transcription failed, using placeholder"
                );
                (TRANSCRIPT_FAILED.to_owned(), SUMMARY_SKIPPED.to_owned())
            }
        }
    }

    // Only reached when transcription produced real text.
    async fn summarize(&self, job: &RecordingJob, call_sid: &str, transcript: &str) -> String {
        let Some(summarizer) = &self.summarizer else {
            return SUMMARY_UNCONFIGURED.to_owned();
        };

        match summarizer.summarize(transcript).await {
            Ok(summary) => {
                info!(
                    tenant = %job.tenant_id,
                    call_sid = %call_sid,
                    stage = "summarization",
                    "summary complete"
                );
                summary
            }
            Err(err) => {
                warn!(
                    tenant = %job.tenant_id,
                    call_sid = %call_sid,
                    stage = "summarization",
                    error = %err,
                    "summarization failed, using placeholder"
                );
                SUMMARY_FAILED.to_owned()
            }
        }
    }

    async fn deliver(&self, tenant: &TenantId, call_sid: &str, report: &Report) {
        if let Some(sender) = &self.sender {
            match sender.send(report).await {
                Ok(()) => {
                    info!(
                        tenant = %tenant,
                        call_sid = %call_sid,
                        stage = "delivery",
                        recipients = report.recipients.len(),
                        "report delivered"
                    );
                    return;
                }
                Err(err) => {
                    warn!(
                        tenant = %tenant,
                        call_sid = %call_sid,
                        stage = "delivery",
                        error = %err,
                        "primary delivery failed, archiving report"
                    );
                }
            }
        } else {
            info!(
                tenant = %tenant,
                call_sid = %call_sid,
                stage = "delivery",
                "delivery transport not configured, archiving report"
            );
        }

        if let Err(err) = self.archive.append(report).await {
            error!(
                tenant = %tenant,
                call_sid = %call_sid,
                stage = "delivery",
                error = %err,
                "failed to archive report"
            );
        }
    }
}
