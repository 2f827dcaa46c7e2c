// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Import orchestration
//!
//! For each input file: analyze, split if it is larger than one chunk, load
//! the pieces through a [`TableLoader`], then remove the chunk files.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::{debug, error, info, warn};

use super::analyzer::{analyze_file, FileAnalysis};
use super::encoding::TextEncoding;
use super::loader::{LoadOutcome, TableLoader};
use super::progress::ProgressTracker;
use super::splitter::split_file;
use crate::config::{FileHandlingConfig, RetryConfig, Settings};
use crate::error::{Result, SupaloadError};
use crate::utils;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Knobs for one import run
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub chunk_size_mb: u32,
    pub batch_size: u32,
    pub parallel: bool,
    pub parallel_workers: u32,
    pub max_connections: u32,
    pub optimize_db: bool,
    pub temp_dir: PathBuf,
    pub dry_run: bool,
    pub retry: RetryConfig,
    pub file_handling: FileHandlingConfig,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            chunk_size_mb: settings.import.chunk_size_mb,
            batch_size: settings.import.batch_size,
            parallel: true,
            parallel_workers: settings.import.parallel_workers,
            max_connections: settings.database.pool.max_connections,
            optimize_db: true,
            temp_dir: settings.directories.temp_directory.clone(),
            dry_run: false,
            retry: settings.import.retry.clone(),
            file_handling: settings.file_handling.clone(),
            show_progress: true,
        }
    }

    /// Concurrent loads for `files` pieces.
    ///
    /// One pool connection is kept free for maintenance statements.
    pub fn worker_count(&self, files: usize) -> usize {
        if !self.parallel || files <= 1 {
            return 1;
        }
        let by_pool = self.max_connections.saturating_sub(1);
        self.parallel_workers.min(by_pool).max(1) as usize
    }

    pub fn chunk_size_bytes(&self) -> u64 {
        u64::from(self.chunk_size_mb) * BYTES_PER_MB
    }

    /// Delays between attempts: base, 2×base, 4×base... capped, with jitter
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        // from_millis(2) yields 2^n ms; the factor scales that to base × 2^(n-1)
        ExponentialBackoff::from_millis(2)
            .factor(self.retry.base_delay_ms.max(2) / 2)
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .map(jitter)
            .take(self.retry.max_retries as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Loaded,
    /// Dry run: analysis only
    Analyzed,
    Failed,
}

/// Outcome for one input file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub rows: u64,
    pub bytes: u64,
    pub chunks: usize,
    pub chunks_failed: usize,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<FileAnalysis>,
}

impl FileReport {
    fn failed(path: &Path, err: &SupaloadError) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Failed,
            rows: 0,
            bytes: 0,
            chunks: 0,
            chunks_failed: 0,
            elapsed_secs: 0.0,
            error: Some(err.to_string()),
            analysis: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != FileStatus::Failed
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub elapsed_secs: f64,
}

impl RunReport {
    pub fn files_attempted(&self) -> usize {
        self.files.len()
    }

    pub fn files_succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.files_attempted() - self.files_succeeded()
    }

    pub fn rows(&self) -> u64 {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes).sum()
    }

    pub fn is_success(&self) -> bool {
        self.files_failed() == 0
    }

    pub fn rows_per_second(&self) -> f64 {
        utils::per_second(self.rows() as f64, self.elapsed_secs)
    }

    pub fn mb_per_second(&self) -> f64 {
        utils::per_second(self.bytes() as f64 / BYTES_PER_MB as f64, self.elapsed_secs)
    }

    pub fn estimated_cost(&self) -> f64 {
        utils::estimate_storage_cost(self.bytes())
    }
}

/// Drives a [`TableLoader`] over files and directories
pub struct ImportRunner<L: TableLoader> {
    loader: L,
    options: RunOptions,
}

impl<L: TableLoader> ImportRunner<L> {
    pub fn new(loader: L, options: RunOptions) -> Self {
        Self { loader, options }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Import a single file or every CSV file in a directory
    pub async fn run_path(&self, path: &Path) -> Result<RunReport> {
        let started = Instant::now();
        let files = collect_csv_files(path)?;
        info!(count = files.len(), "found files to import");

        let mut reports = Vec::with_capacity(files.len());
        for (idx, file) in files.iter().enumerate() {
            info!("processing file {}/{}: {}", idx + 1, files.len(), file.display());
            reports.push(self.run_file(file).await);
        }

        let report = RunReport {
            files: reports,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            attempted = report.files_attempted(),
            succeeded = report.files_succeeded(),
            rows = report.rows(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
        Ok(report)
    }

    /// Import one file. Failures are captured in the report.
    pub async fn run_file(&self, path: &Path) -> FileReport {
        let started = Instant::now();
        let mut report = match self.try_run_file(path).await {
            Ok(report) => report,
            Err(e) => {
                error!(file = %path.display(), error = %e, "import failed");
                FileReport::failed(path, &e)
            }
        };
        report.elapsed_secs = started.elapsed().as_secs_f64();
        report
    }

    async fn try_run_file(&self, path: &Path) -> Result<FileReport> {
        let analysis = {
            let path = path.to_path_buf();
            let chunk_size_mb = self.options.chunk_size_mb;
            let handling = self.options.file_handling.clone();
            blocking(move || analyze_file(&path, chunk_size_mb, &handling)).await?
        };
        info!(
            file = %path.display(),
            size_mb = format!("{:.2}", analysis.size_mb),
            rows = analysis.row_count,
            columns = analysis.column_count(),
            encoding = %analysis.encoding,
            "analyzed"
        );

        if self.options.dry_run {
            return Ok(FileReport {
                path: path.to_path_buf(),
                status: FileStatus::Analyzed,
                rows: analysis.row_count,
                bytes: analysis.size_bytes,
                chunks: analysis.estimated_chunks as usize,
                chunks_failed: 0,
                elapsed_secs: 0.0,
                error: None,
                analysis: Some(analysis),
            });
        }

        let split = analysis.needs_split(self.options.chunk_size_mb);
        let (pieces, encoding) = if split {
            let source = path.to_path_buf();
            let out_dir = self.options.temp_dir.clone();
            let chunk_bytes = self.options.chunk_size_bytes();
            let encoding = analysis.encoding;
            let chunks =
                blocking(move || split_file(&source, chunk_bytes, &out_dir, encoding)).await?;
            info!(file = %path.display(), chunks = chunks.len(), "split into chunks");
            (chunks, TextEncoding::utf8())
        } else {
            (vec![path.to_path_buf()], analysis.encoding)
        };

        let outcomes = self.load_pieces(&pieces, encoding).await;

        if split {
            remove_chunks(&pieces).await;
        }

        let mut report = FileReport {
            path: path.to_path_buf(),
            status: FileStatus::Loaded,
            rows: 0,
            bytes: 0,
            chunks: pieces.len(),
            chunks_failed: 0,
            elapsed_secs: 0.0,
            error: None,
            analysis: None,
        };
        for (piece, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    report.rows += outcome.rows;
                    report.bytes += outcome.bytes;
                }
                Err(e) => {
                    error!(file = %piece.display(), error = %e, "chunk failed after retries");
                    report.chunks_failed += 1;
                    report.error.get_or_insert_with(|| e.to_string());
                }
            }
        }
        if report.chunks_failed > 0 {
            report.status = FileStatus::Failed;
        }

        info!(
            file = %path.display(),
            rows = report.rows,
            chunks = report.chunks,
            failed = report.chunks_failed,
            "file finished"
        );
        Ok(report)
    }

    /// prepare → load every piece → finalize
    async fn load_pieces<'a>(
        &self,
        pieces: &'a [PathBuf],
        encoding: TextEncoding,
    ) -> Vec<(&'a PathBuf, Result<LoadOutcome>)> {
        if self.options.optimize_db {
            if let Err(e) = self.loader.prepare().await {
                warn!(error = %e, "table preparation failed");
            }
        }

        let total_bytes = pieces
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        let tracker = if self.options.show_progress {
            ProgressTracker::with_bar(total_bytes)
        } else {
            ProgressTracker::hidden()
        };

        let workers = self.options.worker_count(pieces.len());
        debug!(workers, pieces = pieces.len(), "loading");

        let this = self;
        let tracker_ref = &tracker;
        let outcomes: Vec<_> = stream::iter(pieces.iter())
            .map(move |piece| async move {
                let outcome = this.load_with_retry(piece, encoding, tracker_ref).await;
                (piece, outcome)
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        tracker.finish();
        let stats = tracker.stats();
        debug!(
            rows = stats.rows,
            bytes = stats.bytes,
            rows_per_sec = stats.rows_per_second as u64,
            "pieces loaded"
        );

        if self.options.optimize_db {
            if let Err(e) = self.loader.finalize().await {
                warn!(error = %e, "table finalization failed");
            }
        }
        outcomes
    }

    async fn load_with_retry(
        &self,
        piece: &Path,
        encoding: TextEncoding,
        tracker: &ProgressTracker,
    ) -> Result<LoadOutcome> {
        let loader = &self.loader;
        let batch_size = self.options.batch_size;
        tracker.set_status(format!(
            "Loading {}",
            piece.file_name().unwrap_or_default().to_string_lossy()
        ));

        let outcome = Retry::start(self.options.retry_strategy(), move || async move {
            let result = loader.load_file(piece, batch_size, encoding).await;
            if let Err(e) = &result {
                warn!(file = %piece.display(), error = %e, "load attempt failed");
            }
            result
        })
        .await?;

        tracker.add_rows(outcome.rows);
        tracker.add_bytes(outcome.bytes);
        Ok(outcome)
    }
}

/// A file itself, or the CSV files of a directory ordered largest first
pub fn collect_csv_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(SupaloadError::InvalidInput(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        let is_csv = file
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && entry.file_type()?.is_file() {
            files.push((entry.metadata()?.len(), file));
        }
    }

    if files.is_empty() {
        return Err(SupaloadError::import(format!(
            "No CSV files found in {}",
            path.display()
        )));
    }

    files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(files.into_iter().map(|(_, f)| f).collect())
}

async fn remove_chunks(chunks: &[PathBuf]) {
    for chunk in chunks {
        if let Err(e) = tokio::fs::remove_file(chunk).await {
            warn!(file = %chunk.display(), error = %e, "could not remove chunk file");
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SupaloadError::import(format!("background task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::LoadMethod;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeLoader {
        loaded: Mutex<Vec<PathBuf>>,
        transient_failures: AtomicU32,
        always_fail: bool,
        prepared: AtomicBool,
        finalized: AtomicBool,
    }

    #[async_trait]
    impl TableLoader for FakeLoader {
        async fn prepare(&self) -> Result<()> {
            self.prepared.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn load_file(
            &self,
            path: &Path,
            _batch_size: u32,
            _encoding: TextEncoding,
        ) -> Result<LoadOutcome> {
            if self.always_fail {
                return Err(SupaloadError::import("table is gone"));
            }
            let pending = self.transient_failures.load(Ordering::SeqCst);
            if pending > 0 {
                self.transient_failures.store(pending - 1, Ordering::SeqCst);
                return Err(SupaloadError::import("connection reset"));
            }

            let content = std::fs::read(path)?;
            let lines = content.iter().filter(|&&b| b == b'\n').count() as u64;
            self.loaded.lock().unwrap().push(path.to_path_buf());
            Ok(LoadOutcome {
                rows: lines.saturating_sub(1),
                bytes: content.len() as u64,
                method: LoadMethod::Copy,
            })
        }

        async fn finalize(&self) -> Result<()> {
            self.finalized.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn row_count(&self) -> Result<i64> {
            Ok(0)
        }
    }

    fn options(temp: &TempDir) -> RunOptions {
        let mut options = RunOptions::from_settings(&Settings::default());
        options.temp_dir = temp.path().join("chunks");
        options.show_progress = false;
        options.retry.base_delay_ms = 1;
        options.retry.max_delay_ms = 5;
        options
    }

    fn write_csv(dir: &Path, name: &str, rows: usize, row_width: usize) -> PathBuf {
        let path = dir.join(name);
        let mut body = String::from("id,payload\n");
        for i in 0..rows {
            body.push_str(&format!("{},{}\n", i, "x".repeat(row_width)));
        }
        std::fs::write(&path, body).unwrap();
        path
    }

    // ===== option tests =====

    #[test]
    fn test_worker_count() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(&temp);
        opts.parallel_workers = 8;
        opts.max_connections = 5;
        assert_eq!(opts.worker_count(10), 4);
        assert_eq!(opts.worker_count(1), 1);

        opts.max_connections = 1;
        assert_eq!(opts.worker_count(10), 1);

        opts.max_connections = 10;
        opts.parallel = false;
        assert_eq!(opts.worker_count(10), 1);
    }

    #[test]
    fn test_retry_strategy_length_and_cap() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(&temp);
        opts.retry.max_retries = 4;
        opts.retry.max_delay_ms = 50;
        let delays: Vec<_> = opts.retry_strategy().collect();
        assert_eq!(delays.len(), 4);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(50)));
    }

    // ===== file discovery tests =====

    #[test]
    fn test_collect_csv_files_largest_first() {
        let temp = TempDir::new().unwrap();
        write_csv(temp.path(), "small.csv", 1, 1);
        write_csv(temp.path(), "BIG.CSV", 50, 10);
        write_csv(temp.path(), "notes.txt", 5, 5);

        let files = collect_csv_files(temp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["BIG.CSV", "small.csv"]);
    }

    #[test]
    fn test_collect_csv_files_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            collect_csv_files(temp.path()),
            Err(SupaloadError::Import(_))
        ));
        assert!(matches!(
            collect_csv_files(&temp.path().join("missing")),
            Err(SupaloadError::InvalidInput(_))
        ));
    }

    // ===== run tests =====

    #[tokio::test]
    async fn test_single_file_loads_with_prepare_and_finalize() {
        let temp = TempDir::new().unwrap();
        let file = write_csv(temp.path(), "users.csv", 25, 8);
        let runner = ImportRunner::new(FakeLoader::default(), options(&temp));

        let report = runner.run_path(&file).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.files_attempted(), 1);
        assert_eq!(report.rows(), 25);
        assert_eq!(report.files[0].chunks, 1);
        assert!(runner.loader().prepared.load(Ordering::SeqCst));
        assert!(runner.loader().finalized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_no_optimize_skips_table_maintenance() {
        let temp = TempDir::new().unwrap();
        let file = write_csv(temp.path(), "users.csv", 3, 8);
        let mut opts = options(&temp);
        opts.optimize_db = false;
        let runner = ImportRunner::new(FakeLoader::default(), opts);

        runner.run_path(&file).await.unwrap();
        assert!(!runner.loader().prepared.load(Ordering::SeqCst));
        assert!(!runner.loader().finalized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_large_file_is_split_and_chunks_removed() {
        let temp = TempDir::new().unwrap();
        // ~1.6 MB with 1 MB chunks
        let file = write_csv(temp.path(), "events.csv", 16_000, 100);
        let mut opts = options(&temp);
        opts.chunk_size_mb = 1;
        let chunk_dir = opts.temp_dir.clone();
        let runner = ImportRunner::new(FakeLoader::default(), opts);

        let report = runner.run_path(&file).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.rows(), 16_000);
        assert_eq!(report.files[0].chunks, 2);
        assert_eq!(runner.loader().loaded.lock().unwrap().len(), 2);
        assert_eq!(std::fs::read_dir(&chunk_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_load() {
        let temp = TempDir::new().unwrap();
        let file = write_csv(temp.path(), "users.csv", 7, 8);
        let mut opts = options(&temp);
        opts.dry_run = true;
        let runner = ImportRunner::new(FakeLoader::default(), opts);

        let report = runner.run_path(&file).await.unwrap();
        assert_eq!(report.files[0].status, FileStatus::Analyzed);
        assert_eq!(report.files[0].rows, 7);
        assert!(report.files[0].analysis.is_some());
        assert!(runner.loader().loaded.lock().unwrap().is_empty());
        assert!(!runner.loader().prepared.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let temp = TempDir::new().unwrap();
        let file = write_csv(temp.path(), "users.csv", 4, 8);
        let loader = FakeLoader {
            transient_failures: AtomicU32::new(2),
            ..FakeLoader::default()
        };
        let runner = ImportRunner::new(loader, options(&temp));

        let report = runner.run_path(&file).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.rows(), 4);
    }

    #[tokio::test]
    async fn test_persistent_failure_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        write_csv(temp.path(), "a.csv", 4, 8);
        write_csv(temp.path(), "b.csv", 2, 8);
        let loader = FakeLoader {
            always_fail: true,
            ..FakeLoader::default()
        };
        let runner = ImportRunner::new(loader, options(&temp));

        let report = runner.run_path(temp.path()).await.unwrap();
        assert_eq!(report.files_attempted(), 2);
        assert_eq!(report.files_failed(), 2);
        assert!(!report.is_success());
        assert!(report.files[0]
            .error
            .as_deref()
            .unwrap()
            .contains("table is gone"));
        // triggers are restored even when loading failed
        assert!(runner.loader().finalized.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_analysis_failure_marks_file_failed() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.csv");
        std::fs::write(&empty, b"").unwrap();
        let runner = ImportRunner::new(FakeLoader::default(), options(&temp));

        let report = runner.run_file(&empty).await;
        assert_eq!(report.status, FileStatus::Failed);
        assert!(report.error.unwrap().contains("empty"));
    }

    #[test]
    fn test_report_throughput() {
        let report = RunReport {
            files: vec![FileReport {
                path: PathBuf::from("a.csv"),
                status: FileStatus::Loaded,
                rows: 1000,
                bytes: 2 * BYTES_PER_MB,
                chunks: 1,
                chunks_failed: 0,
                elapsed_secs: 2.0,
                error: None,
                analysis: None,
            }],
            elapsed_secs: 2.0,
        };
        assert_eq!(report.rows_per_second(), 500.0);
        assert_eq!(report.mb_per_second(), 1.0);
    }
}
