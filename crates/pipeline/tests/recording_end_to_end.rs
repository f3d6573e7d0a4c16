use std::sync::Arc;
use std::time::Duration;

use ringline_core::TenantId;
use ringline_pipeline::deliver::ReportArchive;
use ringline_pipeline::runner::{RecordingJob, RecordingPipeline, TRANSCRIPT_UNCONFIGURED};
use ringline_tenant::{ConfigCache, LocalTableSource};
use tempfile::TempDir;

fn seed_tenant_tables(dir: &TempDir, recipients: &str) {
    std::fs::write(
        dir.path().join("settings.csv"),
        format!(
            "key,value\nstore_name,Cannon Hill Phones\ntimezone,Australia/Brisbane\n\
             email_recipients,{recipients}\n"
        ),
    )
    .expect("write settings table");
}

fn cache_from(dir: &TempDir) -> Arc<ConfigCache> {
    let source = Arc::new(LocalTableSource::new(dir.path()));
    Arc::new(ConfigCache::new(source.clone(), source, Duration::from_secs(180), 100))
}

fn job() -> RecordingJob {
    RecordingJob {
        tenant_id: TenantId::from("cannonhill"),
        recording_url: "https://recordings.example/CA123".to_owned(),
        from_number: Some("+615550123".to_owned()),
        call_sid: Some("CA123".to_owned()),
        duration: Some("42".to_owned()),
        menu_selection: Some("repair".to_owned()),
    }
}

#[tokio::test]
async fn unconfigured_capabilities_still_produce_an_archived_report() {
    let tables = TempDir::new().expect("tables dir");
    seed_tenant_tables(&tables, "owner@example.com");
    let out = TempDir::new().expect("out dir");
    let archive_path = out.path().join("reports.log");

    let pipeline = RecordingPipeline::new(
        cache_from(&tables),
        None,
        None,
        None,
        ReportArchive::new(&archive_path),
    );
    pipeline.process(job()).await;

    let contents = std::fs::read_to_string(&archive_path).expect("archived report");
    assert!(contents.contains(TRANSCRIPT_UNCONFIGURED), "transcript placeholder expected");
    assert!(contents
        .contains("SUBJECT: Cannon Hill Phones Call | Menu repair | +615550123 | recording"));
    assert!(contents.contains("TO: owner@example.com"));
    assert!(contents.contains("https://recordings.example/CA123"));
}

#[tokio::test]
async fn missing_recipients_abort_before_composing_anything() {
    let tables = TempDir::new().expect("tables dir");
    seed_tenant_tables(&tables, "");
    let out = TempDir::new().expect("out dir");
    let archive_path = out.path().join("reports.log");

    let pipeline = RecordingPipeline::new(
        cache_from(&tables),
        None,
        None,
        None,
        ReportArchive::new(&archive_path),
    );
    pipeline.process(job()).await;

    assert!(!archive_path.exists(), "no report should be written without recipients");
}

#[tokio::test]
async fn missing_session_fields_render_as_placeholders() {
    let tables = TempDir::new().expect("tables dir");
    seed_tenant_tables(&tables, "owner@example.com");
    let out = TempDir::new().expect("out dir");
    let archive_path = out.path().join("reports.log");

    let pipeline = RecordingPipeline::new(
        cache_from(&tables),
        None,
        None,
        None,
        ReportArchive::new(&archive_path),
    );
    pipeline
        .process(RecordingJob {
            tenant_id: TenantId::from("cannonhill"),
            recording_url: "https://recordings.example/CA999".to_owned(),
            from_number: None,
            call_sid: None,
            duration: None,
            menu_selection: None,
        })
        .await;

    let contents = std::fs::read_to_string(&archive_path).expect("archived report");
    assert!(contents.contains("Menu unknown"));
    assert!(contents.contains("Duration: N/As"));
    assert!(contents.contains("Call SID: unknown"));
}
