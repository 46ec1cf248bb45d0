//! DuckDB-backed warehouse
//!
//! The project is an attached DuckDB catalog (a database file, or `:memory:`),
//! datasets are schemas and tables are tables. Batches are staged as Parquet
//! files and bulk-loaded with `read_parquet`; rows are read back through
//! DuckDB's JSON export.

use super::types::{quote_ident, quote_literal, DatasetRef, TableRef};
use super::Warehouse;
use crate::error::{Error, Result, ResultExt};
use crate::output::write_batch_to_parquet;
use crate::schema::ColumnSpec;
use crate::types::{JsonObject, WriteDisposition};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const MEMORY_LOCATION: &str = ":memory:";

/// Warehouse stored in a DuckDB database
pub struct DuckDbWarehouse {
    conn: Mutex<Connection>,
    project: String,
    location: String,
}

impl DuckDbWarehouse {
    /// Open (or create) a database file as the catalog of `project`
    pub fn open(path: impl AsRef<Path>, project: &str) -> Result<Self> {
        let location = path
            .as_ref()
            .to_str()
            .ok_or_else(|| Error::config("Warehouse path is not valid UTF-8"))?
            .to_string();
        Self::attach(location, project)
    }

    /// Purely in-memory catalog for `project`
    pub fn in_memory(project: &str) -> Result<Self> {
        Self::attach(MEMORY_LOCATION.to_string(), project)
    }

    fn attach(location: String, project: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::warehouse(format!("Failed to create DuckDB connection: {e}")))?;

        let attach_sql = format!(
            "ATTACH {} AS {};",
            quote_literal(&location),
            quote_ident(project)
        );
        conn.execute_batch(&attach_sql)
            .map_err(|e| Error::warehouse(format!("Failed to attach '{location}': {e}")))?;
        // Render TIMESTAMPTZ in UTC when the time zone extension is present
        if let Err(e) = conn.execute_batch("SET TimeZone = 'UTC';") {
            warn!("Could not pin DuckDB session time zone to UTC, timestamps render in local time: {e}");
        }

        debug!("Attached DuckDB warehouse '{location}' as catalog '{project}'");

        Ok(Self {
            conn: Mutex::new(conn),
            project: project.to_string(),
            location,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::warehouse("DuckDB connection lock poisoned"))
    }

    fn check_project(&self, project: &str) -> Result<()> {
        if project == self.project {
            Ok(())
        } else {
            Err(Error::warehouse(format!(
                "Project '{project}' is not attached (this warehouse serves '{}')",
                self.project
            )))
        }
    }

    fn table_exists(conn: &Connection, table: &TableRef) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_catalog = ? AND table_schema = ? AND table_name = ?",
            params![table.project, table.dataset, table.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse")
            .field("project", &self.project)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    async fn read_rows(
        &self,
        table: &TableRef,
        columns: &[&str],
        order_by: Option<&str>,
    ) -> Result<Vec<JsonObject>> {
        self.check_project(&table.project)?;
        let conn = self.lock()?;

        if !Self::table_exists(&conn, table)? {
            return Err(Error::table_not_found(table.to_string()));
        }

        let select = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut query = format!("SELECT {select} FROM {}", table.qualified());
        if let Some(column) = order_by {
            query.push_str(&format!(" ORDER BY {} ASC", quote_ident(column)));
        }

        debug!("Executing query: {query}");

        // DuckDB's native JSON export via a temp file
        let staged = StagedFile::new("json");
        let copy_sql = format!(
            "COPY ({query}) TO {} (FORMAT JSON, ARRAY true);",
            quote_literal(staged.path_str()?)
        );
        conn.execute_batch(&copy_sql)
            .map_err(|e| Error::warehouse(format!("Failed to read {table}: {e}")))?;

        let json_content = std::fs::read_to_string(staged.path())
            .with_context(|| format!("Failed to read exported rows of {table}"))?;
        if json_content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&json_content)
            .map_err(|e| Error::warehouse(format!("Failed to parse rows of {table}: {e}")))
    }

    async fn list_tables(&self, dataset: &DatasetRef, prefix: &str) -> Result<Vec<String>> {
        self.check_project(&dataset.project)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables
             WHERE table_catalog = ? AND table_schema = ? AND starts_with(table_name, ?)
             ORDER BY table_name",
        )?;

        let tables = stmt
            .query_map(params![dataset.project, dataset.dataset, prefix], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tables)
    }

    async fn table_schema(&self, table: &TableRef) -> Result<Vec<ColumnSpec>> {
        self.check_project(&table.project)?;
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns
             WHERE table_catalog = ? AND table_schema = ? AND table_name = ?
             ORDER BY ordinal_position",
        )?;

        let columns = stmt
            .query_map(params![table.project, table.dataset, table.table], |row| {
                Ok(ColumnSpec::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(Error::table_not_found(table.to_string()));
        }
        Ok(columns)
    }

    async fn write(
        &self,
        table: &TableRef,
        batch: &RecordBatch,
        disposition: WriteDisposition,
    ) -> Result<usize> {
        self.check_project(&table.project)?;
        if batch.num_columns() == 0 {
            return Err(Error::warehouse(format!(
                "Refusing to write a batch without columns to {table}"
            )));
        }

        let staged = StagedFile::new("parquet");
        write_batch_to_parquet(staged.path(), batch, None)?;
        let source = format!("read_parquet({})", quote_literal(staged.path_str()?));

        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {};",
            table.dataset_ref().qualified()
        ))
        .context(format!("Failed to create dataset {}", table.dataset_ref()))?;

        let sql = match disposition {
            WriteDisposition::Append if Self::table_exists(&conn, table)? => format!(
                "INSERT INTO {} BY NAME SELECT * FROM {source};",
                table.qualified()
            ),
            WriteDisposition::Append => format!(
                "CREATE TABLE {} AS SELECT * FROM {source};",
                table.qualified()
            ),
            WriteDisposition::Replace => format!(
                "CREATE OR REPLACE TABLE {} AS SELECT * FROM {source};",
                table.qualified()
            ),
        };

        debug!("Loading {} rows into {table} ({disposition})", batch.num_rows());
        conn.execute_batch(&sql)
            .map_err(|e| Error::warehouse(format!("Failed to {disposition} {table}: {e}")))?;

        Ok(batch.num_rows())
    }
}

/// Temp file removed on drop
struct StagedFile {
    path: PathBuf,
}

impl StagedFile {
    fn new(extension: &str) -> Self {
        let path = std::env::temp_dir().join(format!("ctm_sync_{}.{extension}", uuid_simple()));
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> Result<&str> {
        self.path
            .to_str()
            .ok_or_else(|| Error::config("Invalid temp path"))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Generate a simple unique ID (process + timestamp + sequence)
fn uuid_simple() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{:x}_{timestamp:x}_{seq:x}", std::process::id())
}
