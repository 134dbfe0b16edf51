//! File naming and row encoding for CSV series files.
//!
//! A series lives at `<root>/<exchange>/<interval>/<stem>.csv`, the stem being
//! [`SeriesKey::file_stem`] (`/` becomes `-`). The first line is [`HEADER_LINE`]; every other
//! line is one candle with `date` as the open time in milliseconds.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serie_core::{Candle, SerieError, SeriesKey};

/// Column names, in file order.
pub const HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// The header as it appears on disk.
pub const HEADER_LINE: &str = "date,open,high,low,close,volume";

/// File extension of series files.
pub const EXTENSION: &str = "csv";

/// Path of the file holding `key` under `root`.
#[must_use]
pub fn series_path(root: &Path, key: &SeriesKey) -> PathBuf {
    root.join(&key.exchange)
        .join(key.interval.as_str())
        .join(format!("{}.{EXTENSION}", key.file_stem()))
}

/// Recover a symbol from a file stem written by [`series_path`].
#[must_use]
pub fn symbol_from_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut rest = stem;
    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("%2D") {
            out.push('-');
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("%25") {
            out.push('%');
            rest = tail;
        } else {
            out.push(if ch == '-' { '/' } else { ch });
            rest = &rest[ch.len_utf8()..];
        }
    }
    out
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Row {
    date: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl From<&Candle> for Row {
    fn from(c: &Candle) -> Self {
        Self {
            date: c.ts,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
        }
    }
}

impl From<Row> for Candle {
    fn from(r: Row) -> Self {
        Self::new(r.date, r.open, r.high, r.low, r.close, r.volume)
    }
}

/// Encode candles as newline-terminated data lines, optionally preceded by the header.
pub(crate) fn encode_rows(candles: &[Candle], with_header: bool) -> Result<Vec<u8>, SerieError> {
    let mut out = Vec::new();
    if with_header {
        out.extend_from_slice(HEADER_LINE.as_bytes());
        out.push(b'\n');
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    for c in candles {
        wtr.serialize(Row::from(c))
            .map_err(|e| SerieError::Io(format!("encode row {}: {e}", c.ts)))?;
    }
    wtr.into_inner()
        .map_err(|e| SerieError::Io(format!("flush rows: {}", e.error())))
}

/// Decode a single data line.
pub(crate) fn decode_line(line: &str) -> Result<Candle, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    match rdr.deserialize::<Row>().next() {
        Some(Ok(row)) => Ok(row.into()),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("empty row".to_string()),
    }
}

/// Strictly decode a whole file: header, every row, trailing newline, ordering.
pub(crate) fn decode_file(key: &SeriesKey, bytes: &[u8]) -> Result<Vec<Candle>, SerieError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.last() != Some(&b'\n') {
        return Err(SerieError::corrupted(key, "torn final row"));
    }
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    let headers = rdr
        .headers()
        .map_err(|e| SerieError::corrupted(key, format!("unreadable header: {e}")))?;
    if headers.iter().ne(HEADER) {
        return Err(SerieError::corrupted(key, "unexpected header"));
    }
    let mut out: Vec<Candle> = Vec::new();
    for (i, row) in rdr.deserialize::<Row>().enumerate() {
        let row = row.map_err(|e| SerieError::corrupted(key, format!("row {}: {e}", i + 1)))?;
        let candle = Candle::from(row);
        if out.last().is_some_and(|prev| prev.ts >= candle.ts) {
            return Err(SerieError::corrupted(
                key,
                format!("timestamps not strictly increasing at row {}", i + 1),
            ));
        }
        out.push(candle);
    }
    Ok(out)
}

/// Best-effort decode: keeps every parseable, newline-terminated data row, in file order.
pub(crate) fn salvage_rows(bytes: &[u8]) -> Vec<Candle> {
    let text = String::from_utf8_lossy(bytes);
    let complete = match text.rfind('\n') {
        Some(end) => &text[..end],
        None => "",
    };
    complete
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty() && *l != HEADER_LINE)
        .filter_map(|l| decode_line(l).ok())
        .collect()
}
