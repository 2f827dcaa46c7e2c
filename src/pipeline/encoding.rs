// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input text encoding detection and transcoding to UTF-8

use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use chardetng::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use serde::{Serialize, Serializer};

use crate::config::FileHandlingConfig;
use crate::error::{Result, SupaloadError};

/// Bytes inspected when sniffing a file
pub const SNIFF_BYTES: u64 = 1024 * 1024;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Character encoding of an input file.
///
/// Only ASCII-compatible encodings are accepted, so CSV delimiters, quotes
/// and line breaks can be found on the raw bytes before transcoding.
#[derive(Debug, Clone, Copy)]
pub struct TextEncoding(&'static Encoding);

// encodings are singletons
impl PartialEq for TextEncoding {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for TextEncoding {}

impl TextEncoding {
    pub fn utf8() -> Self {
        TextEncoding(UTF_8)
    }

    /// Wrap an `encoding_rs` encoding, rejecting ones CSV bytes can't be split in
    pub fn new(encoding: &'static Encoding) -> Option<Self> {
        encoding.is_ascii_compatible().then_some(TextEncoding(encoding))
    }

    /// WHATWG name, e.g. `UTF-8` or `windows-1252`
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    pub fn is_utf8(&self) -> bool {
        std::ptr::eq(self.0, UTF_8)
    }

    /// Guess from a prefix of the file. `complete` is true when the sample
    /// is the whole file.
    ///
    /// Valid UTF-8 wins outright; anything else goes to the legacy encoding
    /// detector.
    pub fn sniff(sample: &[u8], complete: bool) -> Self {
        if sample.starts_with(UTF8_BOM) {
            return Self::utf8();
        }
        match std::str::from_utf8(sample) {
            Ok(_) => return Self::utf8(),
            // sample ended mid code point
            Err(e) if e.error_len().is_none() && !complete => return Self::utf8(),
            Err(_) => {}
        }

        let mut detector = EncodingDetector::new();
        detector.feed(sample, complete);
        let guess = detector.guess(None, false);
        Self::new(guess).unwrap_or_else(|| TextEncoding(encoding_rs::WINDOWS_1252))
    }

    /// Convert a whole record (or any slice cut on a record boundary) to UTF-8.
    /// UTF-8 input is passed through untouched.
    pub fn to_utf8<'a>(&self, bytes: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_utf8() {
            return Cow::Borrowed(bytes);
        }
        match self.0.decode_without_bom_handling(bytes).0 {
            Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
            Cow::Owned(text) => Cow::Owned(text.into_bytes()),
        }
    }

    /// Lossy string form of a field
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(&self.to_utf8(bytes)).into_owned()
    }

    /// Transcoder for a byte stream read in arbitrary pieces
    pub fn stream_decoder(&self) -> StreamDecoder {
        StreamDecoder {
            decoder: (!self.is_utf8()).then(|| self.0.new_decoder_without_bom_handling()),
        }
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl FromStr for TextEncoding {
    type Err = SupaloadError;

    /// Any WHATWG label, plus the `utf-8-sig` and `latin-1` spellings
    /// common in spreadsheet exports
    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_ascii_lowercase();
        let label = match label.as_str() {
            "utf_8" | "utf-8-sig" | "utf8-sig" | "utf_8_sig" => "utf-8",
            "latin-1" | "latin_1" => "latin1",
            other => other,
        };
        Encoding::for_label(label.as_bytes())
            .and_then(Self::new)
            .ok_or_else(|| SupaloadError::config(format!("Unsupported encoding: {}", s.trim())))
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Incremental decoder that keeps a partial multi-byte sequence between pieces
pub struct StreamDecoder {
    decoder: Option<Decoder>,
}

impl StreamDecoder {
    /// Decode the next piece; pass `last` once the input is exhausted.
    pub fn decode<'a>(&mut self, bytes: &'a [u8], last: bool) -> Cow<'a, [u8]> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Cow::Borrowed(bytes);
        };

        let mut out = String::new();
        let mut read = 0;
        loop {
            let rest = &bytes[read..];
            out.reserve(
                decoder
                    .max_utf8_buffer_length(rest.len())
                    .unwrap_or(rest.len() * 3 + 4),
            );
            let (result, consumed, _) = decoder.decode_to_string(rest, &mut out, last);
            read += consumed;
            if let CoderResult::InputEmpty = result {
                return Cow::Owned(out.into_bytes());
            }
        }
    }
}

/// Sniff the first [`SNIFF_BYTES`] of a file
pub fn detect_encoding(path: &Path) -> Result<TextEncoding> {
    let mut sample = Vec::new();
    File::open(path)?.take(SNIFF_BYTES).read_to_end(&mut sample)?;
    let complete = (sample.len() as u64) < SNIFF_BYTES;
    Ok(TextEncoding::sniff(&sample, complete))
}

/// Detect or fall back to the configured default
pub fn resolve_encoding(path: &Path, handling: &FileHandlingConfig) -> Result<TextEncoding> {
    if handling.encoding_detection {
        detect_encoding(path)
    } else {
        handling.default_encoding.parse()
    }
}

/// Open a file for reading with any leading UTF-8 BOM skipped
pub fn open_text(path: &Path) -> Result<BufReader<File>> {
    open_text_skipping_bom(path).map(|(reader, _)| reader)
}

/// Like [`open_text`], also returning how many bytes were skipped
pub fn open_text_skipping_bom(path: &Path) -> Result<(BufReader<File>, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
        return Ok((reader, UTF8_BOM.len() as u64));
    }
    Ok((reader, 0))
}
