use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::{ToSql, Value as SqlValue};
use rusqlite::{Connection, OpenFlags};
use tally_recon::config::SqliteSourceConfig;
use tally_recon::{DataSource, ReconError, Record, Value};
use tracing::{debug, info};

use super::{filter_by_date, resolve_path};

const SUPPORTED_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

pub struct SqliteSource {
    name: String,
    database: PathBuf,
    query: String,
    date_field: Option<String>,
    date_format: String,
}

/// Rewrite `{start_date}` / `{end_date}` placeholders into named parameters.
fn bind_placeholders(query: &str) -> String {
    query
        .replace("{start_date}", ":start_date")
        .replace("{end_date}", ":end_date")
}

fn to_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(x) => Value::Float(x),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

impl SqliteSource {
    pub fn from_config(config: &SqliteSourceConfig, base_dir: &Path) -> Self {
        Self {
            name: config.name.clone(),
            database: resolve_path(base_dir, &config.database),
            query: bind_placeholders(&config.query),
            date_field: config.date_field.clone(),
            date_format: config.date_format.clone(),
        }
    }

    fn unavailable(&self, message: impl Into<String>) -> ReconError {
        ReconError::source_unavailable(&self.name, message)
    }

    fn open(&self) -> Result<Connection, ReconError> {
        let supported = self
            .database
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext));
        if !supported {
            return Err(self.unavailable(format!(
                "unsupported connection string '{}' (expected a .db, .sqlite or .sqlite3 file)",
                self.database.display()
            )));
        }

        Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| self.unavailable(format!("cannot open {}: {e}", self.database.display())))
    }

    fn query_rows(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        let conn = self.open()?;
        let sql_err = |e: rusqlite::Error| self.unavailable(format!("query failed: {e}"));

        let mut stmt = conn.prepare(&self.query).map_err(sql_err)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();

        let start_date = start.format("%Y-%m-%d").to_string();
        let end_date = end.format("%Y-%m-%d").to_string();
        let mut params: Vec<(&str, &dyn ToSql)> = Vec::new();
        if stmt.parameter_index(":start_date").map_err(sql_err)?.is_some() {
            params.push((":start_date", &start_date));
        }
        if stmt.parameter_index(":end_date").map_err(sql_err)?.is_some() {
            params.push((":end_date", &end_date));
        }

        let mut rows = stmt.query(params.as_slice()).map_err(sql_err)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(sql_err)? {
            let mut record = Record::new();
            for (i, column) in columns.iter().enumerate() {
                let value: SqlValue = row.get(i).map_err(sql_err)?;
                record.insert(column.as_str(), to_value(value));
            }
            records.push(record);
        }
        Ok(records)
    }
}

impl DataSource for SqliteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_transactions(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>, ReconError> {
        let records = self.query_rows(start, end)?;
        let kept = match &self.date_field {
            Some(field) => filter_by_date(&self.name, records, field, &self.date_format, start, end),
            None => records,
        };
        info!(source = %self.name, database = %self.database.display(), count = kept.len(), "loaded database transactions");
        Ok(kept)
    }

    /// Column names of the configured query, without executing it.
    fn list_fields(&self) -> Vec<String> {
        let fields = self.open().and_then(|conn| {
            let stmt = conn
                .prepare(&self.query)
                .map_err(|e| self.unavailable(e.to_string()))?;
            let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
            Ok(names)
        });
        match fields {
            Ok(fields) => fields,
            Err(e) => {
                debug!(source = %self.name, error = %e, "cannot list database fields");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ledger_db(dir: &Path) -> PathBuf {
        let path = dir.join("ledger.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE tx (id TEXT, date TEXT, amount REAL, qty INTEGER, note TEXT);
             INSERT INTO tx VALUES ('1', '2026-01-05', 10.5, 2, NULL);
             INSERT INTO tx VALUES ('2', '2026-01-20', 3.0, 1, 'split');
             INSERT INTO tx VALUES ('3', '2026-02-02', 7.0, 1, NULL);
             INSERT INTO tx VALUES ('4', 'unknown', 1.0, 1, NULL);",
        )
        .unwrap();
        path
    }

    fn source(dir: &Path, database: &str, query: &str, date_field: Option<&str>) -> SqliteSource {
        let config = SqliteSourceConfig {
            name: "warehouse".into(),
            database: database.into(),
            query: query.into(),
            date_field: date_field.map(str::to_string),
            date_format: "%Y-%m-%d".into(),
        };
        SqliteSource::from_config(&config, dir)
    }

    #[test]
    fn named_parameters_are_bound() {
        let dir = tempfile::tempdir().unwrap();
        ledger_db(dir.path());
        let src = source(
            dir.path(),
            "ledger.db",
            "SELECT * FROM tx WHERE date BETWEEN :start_date AND :end_date ORDER BY id",
            None,
        );
        let records = src.fetch_transactions(date("2026-01-01"), date("2026-01-31")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("amount"), Some(&Value::Float(10.5)));
        assert_eq!(records[0].get("qty"), Some(&Value::Integer(2)));
        assert_eq!(records[0].get("note"), Some(&Value::Null));
        assert_eq!(records[1].get("note"), Some(&Value::from("split")));
    }

    #[test]
    fn brace_placeholders_become_parameters() {
        let dir = tempfile::tempdir().unwrap();
        ledger_db(dir.path());
        let src = source(
            dir.path(),
            "ledger.db",
            "SELECT id FROM tx WHERE date >= {start_date} AND date <= {end_date}",
            None,
        );
        let records = src.fetch_transactions(date("2026-01-06"), date("2026-02-28")).unwrap();
        let ids: Vec<String> = records.iter().map(|r| r.get("id").unwrap().canonical()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn date_field_filters_client_side() {
        let dir = tempfile::tempdir().unwrap();
        ledger_db(dir.path());
        let src = source(dir.path(), "ledger.db", "SELECT * FROM tx", Some("date"));
        let records = src.fetch_transactions(date("2026-01-01"), date("2026-01-31")).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn lists_query_columns() {
        let dir = tempfile::tempdir().unwrap();
        ledger_db(dir.path());
        let src = source(dir.path(), "ledger.db", "SELECT id, amount FROM tx WHERE date >= :start_date", None);
        assert_eq!(src.list_fields(), vec!["id", "amount"]);
    }

    #[test]
    fn unsupported_connection_string() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "postgres://localhost/ledger", "SELECT 1", None);
        let err = src.fetch_transactions(date("2026-01-01"), date("2026-01-31")).unwrap_err();
        assert!(err.to_string().contains("unsupported connection string"));
    }

    #[test]
    fn missing_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(dir.path(), "absent.db", "SELECT 1", None);
        let err = src.fetch_transactions(date("2026-01-01"), date("2026-01-31")).unwrap_err();
        assert!(matches!(err, ReconError::SourceUnavailable { .. }));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn bad_sql_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        ledger_db(dir.path());
        let src = source(dir.path(), "ledger.db", "SELECT * FROM nope", None);
        let err = src.fetch_transactions(date("2026-01-01"), date("2026-01-31")).unwrap_err();
        assert!(err.to_string().contains("query failed"));
    }
}
