// src/input/scanner.rs

//! Record scanner over an async byte stream.
//!
//! Records are terminated either by a configured separator byte sequence
//! (the separator stays on the end of each record) or, with no separator
//! configured, by a line feed (stripped, along with a preceding carriage
//! return). The final record may lack its terminator and is still
//! delivered.

use anyhow::{anyhow, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Initial capacity of the scan buffer.
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Hard ceiling on the size of a single record.
pub const MAX_RECORD_BYTES: usize = 5_000_000_000;

/// Incremental scanner producing records from an async reader.
///
/// Input bytes are decoded lossily to `String` at record boundaries.
pub struct RecordScanner<R> {
    reader: R,
    /// Record separator; `None` means newline records.
    separator: Option<Vec<u8>>,
    buf: Vec<u8>,
    /// Position up to which `buf` has already been searched, so refills do
    /// not rescan the whole buffer.
    search_from: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> RecordScanner<R> {
    pub fn new(reader: R, separator: Option<Vec<u8>>) -> Self {
        Self {
            reader,
            // An empty separator degenerates to newline records.
            separator: separator.filter(|sep| !sep.is_empty()),
            buf: Vec::with_capacity(INITIAL_CAPACITY),
            search_from: 0,
            eof: false,
        }
    }

    /// Next record, or `None` at end of stream.
    pub async fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            if let Some((content_end, advance)) = self.find_boundary() {
                let rest = self.buf.split_off(advance);
                let mut record = std::mem::replace(&mut self.buf, rest);
                record.truncate(content_end);
                if self.separator.is_none() && record.last() == Some(&b'\r') {
                    record.pop();
                }
                self.search_from = 0;
                return Ok(Some(into_string(record)));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // Short final record without its terminator.
                let mut record = std::mem::take(&mut self.buf);
                if self.separator.is_none() && record.last() == Some(&b'\r') {
                    record.pop();
                }
                self.search_from = 0;
                return Ok(Some(into_string(record)));
            }

            self.fill().await?;
        }
    }

    /// Locate the next record boundary in the buffered data.
    ///
    /// Returns `(content_end, advance)`: the exclusive end of the record's
    /// content and the number of bytes to consume from the buffer. With a
    /// configured separator the content includes it; in newline mode the
    /// terminator is excluded.
    fn find_boundary(&mut self) -> Option<(usize, usize)> {
        let start = self.search_from;
        match &self.separator {
            Some(sep) => {
                let found = self.buf[start..]
                    .windows(sep.len())
                    .position(|w| w == sep.as_slice())
                    .map(|p| p + start);
                match found {
                    Some(i) => Some((i + sep.len(), i + sep.len())),
                    None => {
                        // A separator may straddle the next refill; keep its
                        // possible prefix in the unsearched tail.
                        self.search_from =
                            self.buf.len().saturating_sub(sep.len().saturating_sub(1));
                        None
                    }
                }
            }
            None => match self.buf[start..].iter().position(|&b| b == b'\n') {
                Some(p) => Some((p + start, p + start + 1)),
                None => {
                    self.search_from = self.buf.len();
                    None
                }
            },
        }
    }

    async fn fill(&mut self) -> Result<()> {
        if self.buf.len() >= MAX_RECORD_BYTES {
            return Err(anyhow!(
                "record exceeds the {MAX_RECORD_BYTES}-byte limit"
            ));
        }
        let n = self.reader.read_buf(&mut self.buf).await?;
        if n == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

fn into_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}
