use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use ringline_core::config::{SheetsConfig, TenancyConfig};
use ringline_core::TenantId;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::source::{ConfigSource, RawRow, RawTables, SourceError, TABLE_NAMES};

/// Remote tabular backend speaking a Sheets-style values API: one GET per
/// worksheet, first row is the header row. Requires an API credential and a
/// tenant-to-spreadsheet mapping; when either is absent the fetch reports
/// `Unconfigured` so the cache can fall back instead of crashing.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    sheet_ids: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsClient {
    pub fn new(sheets: &SheetsConfig, tenancy: &TenancyConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(sheets.timeout_secs))
            .build()
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url: sheets.base_url.trim_end_matches('/').to_owned(),
            api_key: sheets.api_key.clone(),
            sheet_ids: tenancy.sheets.clone(),
        })
    }

    fn credential(&self) -> Result<&SecretString, SourceError> {
        self.api_key
            .as_ref()
            .ok_or_else(|| SourceError::Unconfigured("sheets.api_key is not set".to_owned()))
    }

    fn sheet_id(&self, tenant: &TenantId) -> Result<&str, SourceError> {
        self.sheet_ids.get(tenant.as_str()).map(String::as_str).ok_or_else(|| {
            SourceError::Unconfigured(format!("no spreadsheet mapped for tenant `{tenant}`"))
        })
    }

    async fn fetch_table(
        &self,
        sheet_id: &str,
        credential: &SecretString,
        table: &str,
    ) -> Result<Vec<RawRow>, SourceError> {
        let url = format!("{}/spreadsheets/{sheet_id}/values/{table}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential.expose_secret())
            .send()
            .await
            .map_err(|err| SourceError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Transport(format!(
                "table `{table}` request returned status {}",
                response.status()
            )));
        }

        let payload: ValuesResponse = response.json().await.map_err(|err| {
            SourceError::Malformed { table: table.to_owned(), detail: err.to_string() }
        })?;

        Ok(rows_from_values(payload.values))
    }
}

fn rows_from_values(values: Vec<Vec<String>>) -> Vec<RawRow> {
    let mut values = values.into_iter();
    let Some(headers) = values.next() else {
        return Vec::new();
    };

    values
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, header)| (header.clone(), cells.get(i).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

#[async_trait]
impl ConfigSource for SheetsClient {
    async fn fetch_raw(&self, tenant: &TenantId) -> Result<RawTables, SourceError> {
        let credential = self.credential()?;
        let sheet_id = self.sheet_id(tenant)?;

        let mut tables = RawTables::default();
        for table in TABLE_NAMES {
            let rows = self.fetch_table(sheet_id, credential, table).await?;
            match table {
                "settings" => tables.settings = rows,
                "schedule" => tables.schedule = rows,
                "prompts" => tables.prompts = rows,
                _ => tables.repair_scope = rows,
            }
        }
        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use ringline_core::config::{AppConfig, TenancyConfig};
    use ringline_core::TenantId;

    use super::{rows_from_values, SheetsClient};
    use crate::source::{ConfigSource, SourceError};

    fn tenancy_with_sheet() -> TenancyConfig {
        let mut tenancy = AppConfig::default().tenancy;
        tenancy.sheets.insert("cannonhill".to_owned(), "sheet-123".to_owned());
        tenancy
    }

    #[tokio::test]
    async fn missing_credential_reports_unconfigured() {
        let defaults = AppConfig::default();
        let client = SheetsClient::new(&defaults.sheets, &tenancy_with_sheet()).expect("client");

        let error = client
            .fetch_raw(&TenantId::from("cannonhill"))
            .await
            .expect_err("fetch without credential should fail");
        assert!(matches!(error, SourceError::Unconfigured(_)));
    }

    #[tokio::test]
    async fn unmapped_tenant_reports_unconfigured() {
        let mut defaults = AppConfig::default();
        defaults.sheets.api_key = Some("sheets-key".to_owned().into());
        let client = SheetsClient::new(&defaults.sheets, &tenancy_with_sheet()).expect("client");

        let error = client
            .fetch_raw(&TenantId::from("nowhere"))
            .await
            .expect_err("fetch for unmapped tenant should fail");
        assert!(matches!(error, SourceError::Unconfigured(_)));
    }

    #[test]
    fn header_row_folds_into_row_maps_and_short_rows_pad_empty() {
        let rows = rows_from_values(vec![
            vec!["key".to_owned(), "value".to_owned()],
            vec!["store_name".to_owned(), "Cannon Hill Phones".to_owned()],
            vec!["off_mode".to_owned()],
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("value").map(String::as_str), Some("Cannon Hill Phones"));
        assert_eq!(rows[1].get("key").map(String::as_str), Some("off_mode"));
        assert_eq!(rows[1].get("value").map(String::as_str), Some(""));
    }

    #[test]
    fn empty_values_payload_yields_no_rows() {
        assert!(rows_from_values(Vec::new()).is_empty());
    }
}
