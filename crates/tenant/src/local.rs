use std::path::PathBuf;

use async_trait::async_trait;
use ringline_core::TenantId;
use tracing::debug;

use crate::source::{ConfigSource, RawRow, RawTables, SourceError};

/// CSV-directory fallback backend. Each of the four tables is loaded
/// independently; a missing file yields an empty table, not an error, so a
/// partially populated directory still produces a usable config.
pub struct LocalTableSource {
    dir: PathBuf,
}

impl LocalTableSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_table(&self, table: &str) -> Result<Vec<RawRow>, SourceError> {
        let path = self.dir.join(format!("{table}.csv"));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(table = %table, path = %path.display(), "local table missing, treating as empty");
                return Ok(Vec::new());
            }
            Err(err) => return Err(SourceError::LocalRead { table: table.to_owned(), source: err }),
        };

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = reader
            .headers()
            .map_err(|err| SourceError::Malformed { table: table.to_owned(), detail: err.to_string() })?
            .clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| SourceError::Malformed {
                table: table.to_owned(),
                detail: err.to_string(),
            })?;
            let row: RawRow = headers
                .iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_owned(), cell.to_owned()))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl ConfigSource for LocalTableSource {
    async fn fetch_raw(&self, _tenant: &TenantId) -> Result<RawTables, SourceError> {
        Ok(RawTables {
            settings: self.read_table("settings").await?,
            schedule: self.read_table("schedule").await?,
            prompts: self.read_table("prompts").await?,
            repair_scope: self.read_table("repair_scope").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use ringline_core::TenantId;
    use tempfile::TempDir;

    use super::LocalTableSource;
    use crate::source::ConfigSource;

    #[tokio::test]
    async fn missing_tables_yield_empty_sequences() {
        let dir = TempDir::new().expect("tempdir");
        let source = LocalTableSource::new(dir.path());

        let tables = source.fetch_raw(&TenantId::from("cannonhill")).await.expect("fetch");
        assert!(tables.settings.is_empty());
        assert!(tables.schedule.is_empty());
        assert!(tables.prompts.is_empty());
        assert!(tables.repair_scope.is_empty());
    }

    #[tokio::test]
    async fn csv_rows_map_headers_to_cells_in_order() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(
            dir.path().join("settings.csv"),
            "key,value\nstore_name,Cannon Hill Phones\ntimezone,Australia/Brisbane\n",
        )
        .expect("write settings");
        std::fs::write(
            dir.path().join("schedule.csv"),
            "day,enabled,start,end\nMon,TRUE,09:00,17:00\nSat,FALSE,,\n",
        )
        .expect("write schedule");

        let source = LocalTableSource::new(dir.path());
        let tables = source.fetch_raw(&TenantId::from("cannonhill")).await.expect("fetch");

        assert_eq!(tables.settings.len(), 2);
        assert_eq!(tables.settings[0].get("key").map(String::as_str), Some("store_name"));
        assert_eq!(
            tables.settings[0].get("value").map(String::as_str),
            Some("Cannon Hill Phones")
        );
        assert_eq!(tables.schedule.len(), 2);
        assert_eq!(tables.schedule[1].get("day").map(String::as_str), Some("Sat"));
        assert_eq!(tables.schedule[1].get("start").map(String::as_str), Some(""));
    }
}
