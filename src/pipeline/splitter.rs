// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Splits large CSV files into header-prefixed chunk files

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::encoding::{open_text, TextEncoding};
use crate::error::Result;

const PROGRESS_EVERY_ROWS: u64 = 100_000;

/// Name of the n-th (1-based) chunk of `stem`
pub fn chunk_file_name(stem: &str, index: usize) -> String {
    format!("{}_chunk_{:04}.csv", stem, index)
}

/// Split `path` into chunks of roughly `chunk_size_bytes`.
///
/// Every chunk starts with the header record, is UTF-8 and uses `\n` record
/// terminators. A new chunk is started before a record once the current one
/// has reached the size limit, so chunks overshoot by at most one record.
/// Record boundaries come from the same CSV grammar the analyzer and loader
/// use; each record's bytes are copied verbatim. A file with only a header
/// yields no chunks.
pub fn split_file(
    path: &Path,
    chunk_size_bytes: u64,
    output_dir: &Path,
    encoding: TextEncoding,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(open_text(path)?);
    let mut raw = RecordSpans::new(open_text(path)?);
    let mut record = csv::ByteRecord::new();

    if !reader.read_byte_record(&mut record)? {
        return Ok(Vec::new());
    }
    let header = encoding
        .to_utf8(raw.next_span(reader.position().byte())?)
        .into_owned();

    let mut chunks = Vec::new();
    let mut current: Option<BufWriter<File>> = None;
    let mut current_size = 0u64;
    let mut rows = 0u64;

    while reader.read_byte_record(&mut record)? {
        let bytes = encoding.to_utf8(raw.next_span(reader.position().byte())?);

        if current.is_none() || current_size >= chunk_size_bytes {
            if let Some(mut done) = current.take() {
                done.flush()?;
            }
            let chunk_path = output_dir.join(chunk_file_name(&stem, chunks.len() + 1));
            let mut w = BufWriter::new(File::create(&chunk_path)?);
            w.write_all(&header)?;
            w.write_all(b"\n")?;
            current_size = header.len() as u64 + 1;
            chunks.push(chunk_path);
            current = Some(w);
        }

        if let Some(writer) = current.as_mut() {
            writer.write_all(&bytes)?;
            writer.write_all(b"\n")?;
            current_size += bytes.len() as u64 + 1;
        }

        rows += 1;
        if rows % PROGRESS_EVERY_ROWS == 0 {
            tracing::info!(rows, chunks = chunks.len(), "splitting {}", path.display());
        }
    }

    if let Some(mut done) = current.take() {
        done.flush()?;
    }

    tracing::info!(
        file = %path.display(),
        rows,
        chunks = chunks.len(),
        "split complete"
    );
    Ok(chunks)
}

/// Second cursor over the input that hands out the raw bytes between
/// successive CSV reader positions
struct RecordSpans<R> {
    input: R,
    offset: u64,
    buf: Vec<u8>,
}

impl<R: Read> RecordSpans<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            offset: 0,
            buf: Vec::new(),
        }
    }

    /// Bytes up to `end`, without surrounding line terminators.
    ///
    /// A record never starts or ends with a bare CR or LF outside quotes, so
    /// those are blank lines or the tail of a CRLF the reader split across
    /// two reads.
    fn next_span(&mut self, end: u64) -> io::Result<&[u8]> {
        self.buf.clear();
        (&mut self.input)
            .take(end.saturating_sub(self.offset))
            .read_to_end(&mut self.buf)?;
        self.offset = end;

        let is_term = |b: &u8| matches!(b, b'\r' | b'\n');
        let start = self.buf.iter().position(|b| !is_term(b)).unwrap_or(self.buf.len());
        let stop = self.buf.iter().rposition(|b| !is_term(b)).map_or(start, |i| i + 1);
        Ok(&self.buf[start..stop])
    }
}
