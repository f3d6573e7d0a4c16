pub mod deliver;
pub mod errors;
pub mod report;
pub mod runner;
pub mod summarize;
pub mod transcribe;

pub use deliver::{Report, ReportArchive, ReportSender, SendGridSender};
pub use errors::StageError;
pub use runner::{RecordingJob, RecordingPipeline};
pub use summarize::{ChatSummarizer, Summarizer};
pub use transcribe::{Transcriber, WhisperTranscriber};
