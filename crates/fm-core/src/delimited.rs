//! Delimited-text reading for legacy exports.
//!
//! Exports arrive as comma- or tab-separated bytes with no reliable
//! extension. The delimiter is sniffed from the first line, then rows are
//! pulled from the underlying reader one at a time as [`LegacyRow`]s, so
//! a load never holds more of the file than the batch it is filling.
//! Unreadable rows come back as [`RowError`]s so the loader can count and
//! skip them.

use crate::adapter::RowError;
use crate::record::LegacyRow;
use std::io::{self, BufRead, BufReader, Read};

/// Bytes of the first line inspected when sniffing the delimiter.
pub const SNIFF_LIMIT: usize = 8 * 1024;

/// Pick tab or comma from the first line of `sample`.
///
/// Tab wins only when the first line has strictly more tabs than commas.
pub fn sniff_delimiter(sample: &[u8]) -> u8 {
    let capped = &sample[..sample.len().min(SNIFF_LIMIT)];
    let first_line = capped
        .split(|b| *b == b'\n')
        .next()
        .unwrap_or_default();
    let tabs = first_line.iter().filter(|b| **b == b'\t').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// Rows of one export, read on demand.
///
/// Blank rows are skipped. An I/O failure ends iteration; it is reported
/// by [`DelimitedRows::finish`] rather than as a row error.
pub struct DelimitedRows<R: Read> {
    delimiter: u8,
    records: csv::StringRecordsIntoIter<BufReader<R>>,
    pulled: u64,
    unreadable: usize,
    io_error: Option<io::Error>,
}

impl<R: Read> DelimitedRows<R> {
    /// The sniffed delimiter.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Rows the reader could not decode so far.
    pub fn unreadable(&self) -> usize {
        self.unreadable
    }

    /// Count of unreadable rows, or the I/O error that cut the read short.
    pub fn finish(self) -> io::Result<usize> {
        match self.io_error {
            Some(e) => Err(e),
            None => Ok(self.unreadable),
        }
    }
}

impl<R: Read> Iterator for DelimitedRows<R> {
    type Item = Result<LegacyRow, RowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.io_error.is_some() {
            return None;
        }
        loop {
            let result = self.records.next()?;
            self.pulled += 1;
            let fallback_line = self.pulled;
            match result {
                Ok(record) => {
                    let line_no = record
                        .position()
                        .map(|p| p.line())
                        .unwrap_or(fallback_line);
                    if record.iter().all(|f| f.trim().is_empty()) {
                        continue;
                    }
                    return Some(Ok(LegacyRow::new(line_no, record, self.delimiter)));
                }
                Err(e) if e.is_io_error() => {
                    if let csv::ErrorKind::Io(err) = e.into_kind() {
                        self.io_error = Some(err);
                    }
                    return None;
                }
                Err(e) => {
                    let line_no = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                    log::debug!("Unreadable row at line {}: {}", line_no, e);
                    self.unreadable += 1;
                    return Some(Err(RowError::Unreadable {
                        line_no,
                        message: e.to_string(),
                    }));
                }
            }
        }
    }
}

/// Start reading rows from `reader` using the sniffed delimiter.
///
/// The delimiter is sniffed from the first [`SNIFF_LIMIT`] bytes without
/// consuming them. Rows may have any width. Tab-separated dumps are read
/// without quote handling since those exports never quote; comma exports
/// honor `"`.
pub fn read_rows<R: Read>(reader: R) -> io::Result<DelimitedRows<R>> {
    let mut buffered = BufReader::with_capacity(SNIFF_LIMIT, reader);
    let delimiter = sniff_delimiter(buffered.fill_buf()?);
    let records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .quoting(delimiter == b',')
        .from_reader(buffered)
        .into_records();

    Ok(DelimitedRows {
        delimiter,
        records,
        pulled: 0,
        unreadable: 0,
        io_error: None,
    })
}

#[cfg(test)]
#[path = "delimited_test.rs"]
mod tests;
