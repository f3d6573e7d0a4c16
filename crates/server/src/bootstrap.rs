use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use ringline_core::{
    AppConfig, CallSessionStore, ConfigError, LoadOptions, TenantId, TenantResolver,
};
use ringline_pipeline::{
    ChatSummarizer, RecordingPipeline, ReportArchive, ReportSender, SendGridSender, StageError,
    Summarizer, Transcriber, WhisperTranscriber,
};
use ringline_tenant::{ConfigCache, LocalTableSource, SheetsClient, SourceError};
use thiserror::Error;
use tracing::info;

use crate::routes::{self, AppState, BackendFlags, CallStats};

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("remote table client construction failed: {0}")]
    Sheets(#[source] SourceError),
    #[error("capability construction failed: {0}")]
    Capability(#[source] StageError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires every component from an already-loaded config: tenant resolution,
/// the two-source config cache, the session store, the recording pipeline,
/// and the webhook router.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let numbers: BTreeMap<String, TenantId> = config
        .tenancy
        .phone_numbers
        .iter()
        .map(|(number, tenant)| (number.clone(), TenantId::from(tenant.as_str())))
        .collect();
    let resolver = Arc::new(TenantResolver::new(
        numbers,
        TenantId::from(config.tenancy.default_tenant.as_str()),
    ));

    let known_tenants: Vec<TenantId> = config
        .tenancy
        .sheets
        .keys()
        .map(String::as_str)
        .chain(std::iter::once(config.tenancy.default_tenant.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(TenantId::from)
        .collect();

    let primary =
        Arc::new(SheetsClient::new(&config.sheets, &config.tenancy).map_err(BootstrapError::Sheets)?);
    let fallback = Arc::new(LocalTableSource::new(&config.sheets.fallback_dir));
    let cache = Arc::new(ConfigCache::new(
        primary,
        fallback,
        Duration::from_secs(config.cache.ttl_secs),
        config.cache.capacity,
    ));

    let sessions = Arc::new(CallSessionStore::new(
        Duration::from_secs(config.sessions.ttl_secs),
        config.sessions.capacity,
    ));

    let transcriber = WhisperTranscriber::from_config(&config.transcription)
        .map_err(BootstrapError::Capability)?
        .map(|t| Arc::new(t) as Arc<dyn Transcriber>);
    let summarizer = ChatSummarizer::from_config(&config.transcription)
        .map_err(BootstrapError::Capability)?
        .map(|s| Arc::new(s) as Arc<dyn Summarizer>);
    let sender = SendGridSender::from_config(&config.email)
        .map_err(BootstrapError::Capability)?
        .map(|s| Arc::new(s) as Arc<dyn ReportSender>);

    let flags = BackendFlags {
        sheets: config.sheets.api_key.is_some(),
        transcription: transcriber.is_some(),
        summarization: summarizer.is_some(),
        email: sender.is_some(),
    };

    let pipeline = Arc::new(RecordingPipeline::new(
        Arc::clone(&cache),
        transcriber,
        summarizer,
        sender,
        ReportArchive::new(&config.email.fallback_path),
    ));

    info!(
        default_tenant = %resolver.default_tenant(),
        tenants = known_tenants.len(),
        phone_numbers = config.tenancy.phone_numbers.len(),
        sheets = flags.sheets,
        transcription = flags.transcription,
        email = flags.email,
        "application wired"
    );

    let state = AppState {
        cache,
        sessions,
        resolver,
        pipeline,
        stats: Arc::new(CallStats::new()),
        flags,
        known_tenants: Arc::new(known_tenants),
    };
    let router = routes::router(state.clone());

    Ok(Application { config, state, router })
}
