// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Loading CSV files into a Postgres table
//!
//! [`TableLoader`] is the seam the run orchestrator drives; [`PgLoader`] is
//! the sqlx implementation. COPY FROM STDIN is the fast path; batched INSERT
//! is used when COPY is disabled or rejected by the server.

use std::io::{Read, SeekFrom};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgCopyIn, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tokio::io::{AsyncReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use super::encoding::{open_text, open_text_skipping_bom, TextEncoding};
use crate::config::{DatabaseConfig, Settings};
use crate::error::{Result, SupaloadError};
use crate::optimizer::OptimizationSettings;

/// Postgres limit on bind parameters in one statement
pub const MAX_BIND_PARAMS: usize = 65535;
const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// How a file ended up in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMethod {
    Copy,
    Insert,
}

/// Result of loading one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub rows: u64,
    pub bytes: u64,
    pub method: LoadMethod,
}

/// Destination of an import
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Adjust the table before loading (e.g. disable triggers)
    async fn prepare(&self) -> Result<()>;

    /// Load one CSV file (header line first) in a single transaction
    async fn load_file(
        &self,
        path: &Path,
        batch_size: u32,
        encoding: TextEncoding,
    ) -> Result<LoadOutcome>;

    /// Undo `prepare` and run maintenance
    async fn finalize(&self) -> Result<()>;

    /// Rows currently in the target table
    async fn row_count(&self) -> Result<i64>;

    /// Release connections
    async fn close(&self) {}
}

/// Quote a Postgres identifier.
///
/// Plain identifiers are folded to lower case first, the same way the server
/// treats them unquoted, so `UserId` in a CSV header matches a `userid` column.
pub fn pg_ident(name: &str) -> String {
    let name = name.trim();
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    let folded = if plain {
        name.to_ascii_lowercase()
    } else {
        name.to_string()
    };
    format!("\"{}\"", folded.replace('"', "\"\""))
}

/// Quote a string literal
pub fn pg_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Name of a column as stored in the catalog
fn catalog_name(name: &str) -> String {
    let quoted = pg_ident(name);
    quoted[1..quoted.len() - 1].replace("\"\"", "\"")
}

/// Schema-qualified, quoted table reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", pg_ident(&self.schema), pg_ident(&self.name))
    }
}

/// Statements run on every new pooled connection
pub fn session_statements(optimization: &OptimizationSettings, optimize_db: bool) -> Vec<String> {
    let mut statements = vec![format!(
        "SET statement_timeout = {}",
        pg_literal(&optimization.statement_timeout)
    )];
    if optimize_db {
        statements.push(format!("SET work_mem = {}", pg_literal(&optimization.work_mem)));
        statements.push(format!(
            "SET maintenance_work_mem = {}",
            pg_literal(&optimization.maintenance_work_mem)
        ));
        statements.push("SET synchronous_commit = off".to_string());
    }
    statements
}

/// COPY statement for a quoted column list
pub fn copy_statement(table: &TableRef, columns: &[String]) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT CSV, HEADER FALSE, DELIMITER ',', QUOTE '\"')",
        table.qualified(),
        column_list(columns)
    )
}

fn column_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| pg_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rows per INSERT so the statement stays under [`MAX_BIND_PARAMS`]
pub fn rows_per_insert(batch_size: u32, column_count: usize) -> usize {
    let cap = MAX_BIND_PARAMS / column_count.max(1);
    (batch_size as usize).min(cap).max(1)
}

/// Statements run once before the first file is loaded
pub fn prepare_statements(
    table: &TableRef,
    optimization: &OptimizationSettings,
    optimize_db: bool,
) -> Vec<String> {
    if optimize_db && optimization.disable_triggers {
        vec![format!("ALTER TABLE {} DISABLE TRIGGER ALL", table.qualified())]
    } else {
        Vec::new()
    }
}

/// Statements run after the last file: re-enable triggers, then VACUUM
/// ANALYZE or plain ANALYZE
pub fn finalize_statements(
    table: &TableRef,
    optimization: &OptimizationSettings,
    optimize_db: bool,
) -> Vec<String> {
    if !optimize_db {
        return Vec::new();
    }
    let table = table.qualified();
    let mut statements = Vec::new();
    if optimization.disable_triggers {
        statements.push(format!("ALTER TABLE {} ENABLE TRIGGER ALL", table));
    }
    if optimization.run_vacuum {
        statements.push(format!("VACUUM ANALYZE {}", table));
    } else if optimization.run_analyze {
        statements.push(format!("ANALYZE {}", table));
    }
    statements
}

/// Read the header record from the start of `input` (BOM already skipped).
///
/// Returns the trimmed column names and the number of bytes the header
/// record took, so the body can be streamed from there.
pub fn read_header<R: Read>(input: R, encoding: TextEncoding) -> Result<(Vec<String>, u64)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    let mut record = csv::ByteRecord::new();
    if !reader.read_byte_record(&mut record)? {
        return Err(SupaloadError::import("missing header line"));
    }
    let columns: Vec<String> = record
        .iter()
        .map(|f| encoding.decode_lossy(f).trim().to_string())
        .collect();
    if columns.iter().any(String::is_empty) {
        return Err(SupaloadError::import("header contains an empty column name"));
    }
    Ok((columns, reader.position().byte()))
}

/// One multi-row INSERT worth of values; `None` is SQL NULL
pub type InsertBatch = Vec<Vec<Option<String>>>;

/// Groups the body records of a CSV file into INSERT batches.
///
/// Empty fields become NULL. A record whose field count differs from the
/// header ends the iteration with an error naming the record.
pub struct InsertBatches<R> {
    reader: csv::Reader<R>,
    record: csv::ByteRecord,
    columns: usize,
    per_statement: usize,
    encoding: TextEncoding,
    records: u64,
    done: bool,
}

impl<R: Read> InsertBatches<R> {
    pub fn new(input: R, columns: usize, per_statement: usize, encoding: TextEncoding) -> Self {
        Self {
            reader: csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_reader(input),
            record: csv::ByteRecord::new(),
            columns,
            per_statement: per_statement.max(1),
            encoding,
            records: 0,
            done: false,
        }
    }

    fn fill(&mut self, batch: &mut InsertBatch) -> Result<()> {
        while batch.len() < self.per_statement {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.done = true;
                break;
            }
            self.records += 1;
            if self.record.len() != self.columns {
                return Err(SupaloadError::import(format!(
                    "record {} has {} fields, expected {}",
                    self.records,
                    self.record.len(),
                    self.columns
                )));
            }
            let encoding = self.encoding;
            batch.push(
                self.record
                    .iter()
                    .map(|f| (!f.is_empty()).then(|| encoding.decode_lossy(f)))
                    .collect(),
            );
        }
        Ok(())
    }
}

impl<R: Read> Iterator for InsertBatches<R> {
    type Item = Result<InsertBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::with_capacity(self.per_statement);
        if let Err(e) = self.fill(&mut batch) {
            self.done = true;
            return Some(Err(e));
        }
        (!batch.is_empty()).then_some(Ok(batch))
    }
}

/// Runtime switches for [`PgLoader`]
#[derive(Debug, Clone)]
pub struct PgLoaderOptions {
    pub use_copy: bool,
    pub optimize_db: bool,
    pub optimization: OptimizationSettings,
}

/// sqlx-backed loader
pub struct PgLoader {
    pool: PgPool,
    table: TableRef,
    options: PgLoaderOptions,
}

impl PgLoader {
    /// Build the pool described by `settings` and check it can connect.
    pub async fn connect(settings: &Settings, optimize_db: bool) -> Result<Self> {
        let pool_cfg = settings.database.pool;
        let statements = session_statements(&settings.optimization, optimize_db);

        let pool = PgPoolOptions::new()
            .min_connections(pool_cfg.min_connections)
            .max_connections(pool_cfg.max_connections)
            .idle_timeout(Duration::from_secs(u64::from(pool_cfg.keepalive)))
            .after_connect(move |conn, _meta| {
                let statements = statements.clone();
                Box::pin(async move {
                    for sql in &statements {
                        sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(sql)).await?;
                    }
                    Ok(())
                })
            })
            .connect_with(connect_options(&settings.database)?)
            .await?;

        info!(
            max_connections = pool_cfg.max_connections,
            table = %settings.qualified_table(),
            "connection pool ready"
        );

        Ok(Self {
            pool,
            table: TableRef::new(&settings.database.schema, &settings.database.table_name),
            options: PgLoaderOptions {
                use_copy: settings.import.use_copy,
                optimize_db,
                optimization: settings.optimization.clone(),
            },
        })
    }

    async fn run_maintenance(&self, statements: Vec<String>) {
        for sql in statements {
            match sqlx::raw_sql(&sql).execute(&self.pool).await {
                Ok(_) => info!("applied: {}", sql),
                Err(e) => warn!(error = %e, "failed: {}", sql),
            }
        }
    }

    async fn copy_file(
        &self,
        path: &Path,
        columns: &[String],
        body_start: u64,
        encoding: TextEncoding,
    ) -> Result<u64> {
        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(body_start)).await?;
        let mut reader = BufReader::new(file);

        let mut tx = self.pool.begin().await?;
        let mut copy = tx.copy_in_raw(&copy_statement(&self.table, columns)).await?;

        if let Err(e) = stream_body(&mut reader, &mut copy, encoding).await {
            if let Err(abort_err) = copy.abort(e.to_string()).await {
                debug!(error = %abort_err, "COPY abort reported");
            }
            return Err(e);
        }

        let rows = copy.finish().await?;
        tx.commit().await?;
        debug!(file = %path.display(), rows, "COPY committed");
        Ok(rows)
    }

    async fn insert_file(
        &self,
        path: &Path,
        columns: &[String],
        batch_size: u32,
        encoding: TextEncoding,
    ) -> Result<u64> {
        let types = self.column_types(columns).await?;
        let per_statement = rows_per_insert(batch_size, columns.len());
        let insert_head = format!(
            "INSERT INTO {} ({}) ",
            self.table.qualified(),
            column_list(columns)
        );

        let batches = InsertBatches::new(open_text(path)?, columns.len(), per_statement, encoding);
        let mut rows = 0u64;
        let mut tx = self.pool.begin().await?;

        for batch in batches {
            let batch = batch?;
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(&insert_head);
            qb.push_values(batch.iter(), |mut b, row| {
                for (value, ty) in row.iter().zip(&types) {
                    b.push("CAST(");
                    b.push_bind_unseparated(value.clone());
                    b.push_unseparated(format!(" AS {})", ty));
                }
            });
            qb.build().execute(&mut *tx).await?;
            rows += batch.len() as u64;
        }

        tx.commit().await?;
        debug!(file = %path.display(), rows, "INSERT batches committed");
        Ok(rows)
    }

    /// Declared type of each column, in header order
    async fn column_types(&self, columns: &[String]) -> Result<Vec<String>> {
        let catalog: Vec<(String, String)> = sqlx::query_as(
            "SELECT a.attname, format_type(a.atttypid, a.atttypmod) \
             FROM pg_attribute a \
             WHERE a.attrelid = $1::regclass AND a.attnum > 0 AND NOT a.attisdropped",
        )
        .bind(self.table.qualified())
        .fetch_all(&self.pool)
        .await?;

        columns
            .iter()
            .map(|column| {
                let wanted = catalog_name(column);
                catalog
                    .iter()
                    .find(|(name, _)| *name == wanted)
                    .map(|(_, ty)| ty.clone())
                    .ok_or_else(|| {
                        SupaloadError::import(format!(
                            "column {} not found in {}",
                            column,
                            self.table.qualified()
                        ))
                    })
            })
            .collect()
    }
}

#[async_trait]
impl TableLoader for PgLoader {
    async fn prepare(&self) -> Result<()> {
        let statements = prepare_statements(
            &self.table,
            &self.options.optimization,
            self.options.optimize_db,
        );
        self.run_maintenance(statements).await;
        Ok(())
    }

    async fn load_file(
        &self,
        path: &Path,
        batch_size: u32,
        encoding: TextEncoding,
    ) -> Result<LoadOutcome> {
        let started = Instant::now();
        let bytes = tokio::fs::metadata(path).await?.len();

        let (text, bom) = open_text_skipping_bom(path)?;
        let (columns, header_bytes) = read_header(text, encoding)?;

        let (rows, method) = if self.options.use_copy {
            match self.copy_file(path, &columns, bom + header_bytes, encoding).await {
                Ok(rows) => (rows, LoadMethod::Copy),
                Err(e) if e.is_database_rejection() => {
                    warn!(file = %path.display(), error = %e, "COPY rejected, falling back to batched INSERT");
                    let rows = self.insert_file(path, &columns, batch_size, encoding).await?;
                    (rows, LoadMethod::Insert)
                }
                Err(e) => return Err(e),
            }
        } else {
            let rows = self.insert_file(path, &columns, batch_size, encoding).await?;
            (rows, LoadMethod::Insert)
        };

        let elapsed = started.elapsed();
        info!(
            file = %path.display(),
            rows,
            ?method,
            elapsed_ms = elapsed.as_millis() as u64,
            rows_per_sec = (rows as f64 / elapsed.as_secs_f64().max(f64::EPSILON)) as u64,
            "loaded file"
        );

        Ok(LoadOutcome {
            rows,
            bytes,
            method,
        })
    }

    async fn finalize(&self) -> Result<()> {
        let statements = finalize_statements(
            &self.table,
            &self.options.optimization,
            self.options.optimize_db,
        );
        self.run_maintenance(statements).await;
        Ok(())
    }

    async fn row_count(&self) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table.qualified());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("connection pool closed");
    }
}

fn connect_options(db: &DatabaseConfig) -> Result<PgConnectOptions> {
    let options = match &db.connection_string {
        Some(url) => PgConnectOptions::from_str(url)?,
        None => PgConnectOptions::new()
            .host(required(&db.host, "host")?)
            .port(db.port.ok_or_else(|| missing("port"))?)
            .database(required(&db.database, "database")?)
            .username(required(&db.user, "user")?)
            .password(required(&db.password, "password")?),
    };
    Ok(options
        .application_name("supaload")
        .options([("search_path", db.schema.as_str())]))
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| missing(field))
}

fn missing(field: &str) -> SupaloadError {
    SupaloadError::config(format!("Missing required database configuration: {}", field))
}

/// Send the file body to COPY as UTF-8. Line breaks left over from the
/// header's terminator are dropped so the first row is not read as blank.
async fn stream_body(
    reader: &mut BufReader<tokio::fs::File>,
    copy: &mut PgCopyIn<&mut PgConnection>,
    encoding: TextEncoding,
) -> Result<()> {
    let mut decoder = encoding.stream_decoder();
    let mut buf = vec![0u8; COPY_BUFFER_BYTES];
    let mut at_start = true;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            let tail = decoder.decode(&[], true);
            if !tail.is_empty() {
                copy.send(tail).await?;
            }
            return Ok(());
        }

        let mut piece = &buf[..n];
        if at_start {
            let skip = piece
                .iter()
                .take_while(|b| matches!(b, b'\r' | b'\n'))
                .count();
            piece = &piece[skip..];
            at_start = piece.is_empty();
        }
        let text = decoder.decode(piece, false);
        if !text.is_empty() {
            copy.send(text).await?;
        }
    }
}
