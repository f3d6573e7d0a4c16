use std::collections::BTreeMap;

use async_trait::async_trait;
use ringline_core::TenantId;
use thiserror::Error;

/// One flat row from a tabular backend: column header -> cell value.
pub type RawRow = BTreeMap<String, String>;

/// The four tenant tables as raw row sequences, before normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTables {
    pub settings: Vec<RawRow>,
    pub schedule: Vec<RawRow>,
    pub prompts: Vec<RawRow>,
    pub repair_scope: Vec<RawRow>,
}

/// Table names shared by both backends.
pub const TABLE_NAMES: [&str; 4] = ["settings", "schedule", "prompts", "repair_scope"];

#[derive(Debug, Error)]
pub enum SourceError {
    /// The backend cannot be used at all: missing credentials or missing
    /// tenant-to-sheet mapping. A configuration error, never a panic.
    #[error("configuration backend unavailable: {0}")]
    Unconfigured(String),
    #[error("configuration backend request failed: {0}")]
    Transport(String),
    #[error("configuration backend returned malformed data for table `{table}`: {detail}")]
    Malformed { table: String, detail: String },
    #[error("local table `{table}` could not be read: {source}")]
    LocalRead { table: String, source: std::io::Error },
}

/// Pluggable backend producing the raw per-tenant tables.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_raw(&self, tenant: &TenantId) -> Result<RawTables, SourceError>;
}
