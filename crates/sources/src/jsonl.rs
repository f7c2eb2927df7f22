//! Line-oriented reading of JSONL transcript files.
//!
//! Transcript lines are usually small but can balloon (inlined images, large
//! tool results). The reader enforces a per-line byte cap instead of trusting
//! the file, and skips oversized or empty lines rather than failing the whole
//! stream.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sessionhub_core::{Result, StoreError};

/// Hard per-line cap. Lines beyond this are dropped, not truncated.
pub const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

pub struct LineReader<R: Read> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    line_no: usize,
}

impl LineReader<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|err| StoreError::Io(format!("open {}: {err}", path.display())))?;
        Ok(Self::new(file))
    }
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        LineReader {
            inner: BufReader::with_capacity(64 * 1024, inner),
            buf: Vec::new(),
            line_no: 0,
        }
    }

    /// 1-based number of the line most recently returned.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// The next non-empty line without its terminator, or `Ok(None)` at end
    /// of file. Oversized lines are skipped with a trace event.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        loop {
            self.buf.clear();
            let n = read_capped_line(&mut self.inner, &mut self.buf)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            if self.buf.len() > MAX_LINE_BYTES {
                tracing::debug!(line = self.line_no, bytes = self.buf.len(), "skipping oversized line");
                continue;
            }
            while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
                self.buf.pop();
            }
            if self.buf.is_empty() {
                continue;
            }
            // NLL workaround: returning `&self.buf` directly extends the loop
            // borrow. The buffer is stable until the next call.
            break;
        }
        Ok(Some(&self.buf))
    }
}

/// `read_until` that bails out once the line exceeds the cap, consuming the
/// rest of the line so the stream stays aligned. Returns bytes consumed.
fn read_capped_line<R: Read>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> Result<usize> {
    let mut total = 0usize;
    loop {
        let chunk = reader
            .fill_buf()
            .map_err(|err| StoreError::Io(err.to_string()))?;
        if chunk.is_empty() {
            return Ok(total);
        }
        match chunk.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                if buf.len() <= MAX_LINE_BYTES {
                    buf.extend_from_slice(&chunk[..=pos]);
                }
                reader.consume(pos + 1);
                return Ok(total + pos + 1);
            }
            None => {
                let len = chunk.len();
                if buf.len() <= MAX_LINE_BYTES {
                    buf.extend_from_slice(chunk);
                } else {
                    // Past the cap: drain without storing.
                    buf.truncate(MAX_LINE_BYTES + 1);
                }
                reader.consume(len);
                total += len;
            }
        }
    }
}
