// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CSV file inspection ahead of an import

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::encoding::{open_text, resolve_encoding, TextEncoding};
use crate::config::FileHandlingConfig;
use crate::error::{Result, SupaloadError};

/// Files up to this size get an exact row count
pub const EXACT_COUNT_LIMIT_BYTES: u64 = 100 * 1024 * 1024;
/// Bytes read from mid-file to estimate the average row length
pub const ESTIMATE_SAMPLE_BYTES: u64 = 1024 * 1024;
/// Assumed row length when the estimate sample holds no newline
pub const FALLBACK_BYTES_PER_ROW: u64 = 1000;
pub const SAMPLE_ROW_LIMIT: usize = 5;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What we learned about one CSV file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub encoding: TextEncoding,
    pub columns: Vec<String>,
    pub row_count: u64,
    /// True when `row_count` was extrapolated from a sample
    pub row_count_estimated: bool,
    pub estimated_chunks: u64,
    pub sample_rows: Vec<Vec<String>>,
}

impl FileAnalysis {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the file is larger than one chunk
    pub fn needs_split(&self, chunk_size_mb: u32) -> bool {
        self.size_mb > f64::from(chunk_size_mb)
    }
}

/// Inspect a CSV file: size, encoding, header, row count and a few sample rows.
pub fn analyze_file(
    path: &Path,
    chunk_size_mb: u32,
    handling: &FileHandlingConfig,
) -> Result<FileAnalysis> {
    let size_bytes = std::fs::metadata(path)?.len();
    if size_bytes == 0 {
        return Err(SupaloadError::analysis(format!(
            "{} is empty",
            path.display()
        )));
    }

    let encoding = resolve_encoding(path, handling)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(open_text(path)?);

    let header = reader.byte_headers()?.clone();
    let columns: Vec<String> = header
        .iter()
        .map(|field| encoding.decode_lossy(field).trim().to_string())
        .collect();
    if columns.iter().all(String::is_empty) {
        return Err(SupaloadError::analysis(format!(
            "{} has no header row",
            path.display()
        )));
    }

    let exact = size_bytes <= EXACT_COUNT_LIMIT_BYTES;
    let mut sample_rows = Vec::new();
    let mut counted = 0u64;
    let mut record = csv::ByteRecord::new();

    while reader.read_byte_record(&mut record)? {
        if sample_rows.len() < SAMPLE_ROW_LIMIT {
            sample_rows.push(record.iter().map(|f| encoding.decode_lossy(f)).collect());
        }
        counted += 1;
        if !exact && sample_rows.len() >= SAMPLE_ROW_LIMIT {
            break;
        }
    }

    let row_count = if exact {
        counted
    } else {
        estimate_row_count(path, size_bytes)?
    };

    let size_mb = size_bytes as f64 / BYTES_PER_MB;
    let estimated_chunks = ((size_mb / f64::from(chunk_size_mb.max(1))) as u64).max(1);

    tracing::debug!(
        file = %path.display(),
        size_bytes,
        rows = row_count,
        estimated = !exact,
        %encoding,
        "analyzed file"
    );

    Ok(FileAnalysis {
        path: path.to_path_buf(),
        size_bytes,
        size_mb,
        encoding,
        columns,
        row_count,
        row_count_estimated: !exact,
        estimated_chunks,
        sample_rows,
    })
}

/// Extrapolate a row count from the newline density in the middle of the file
pub fn estimate_row_count(path: &Path, size_bytes: u64) -> Result<u64> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(size_bytes / 2))?;

    let mut sample = Vec::new();
    file.take(ESTIMATE_SAMPLE_BYTES).read_to_end(&mut sample)?;

    let newlines = sample.iter().filter(|&&b| b == b'\n').count();
    if newlines == 0 {
        return Ok(size_bytes / FALLBACK_BYTES_PER_ROW);
    }

    let avg_row_bytes = sample.len() as f64 / newlines as f64;
    Ok((size_bytes as f64 / avg_row_bytes) as u64)
}
