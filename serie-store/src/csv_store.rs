use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serie_core::{
    Candle, Interval, SerieError, SeriesKey, SeriesStore, SeriesSummary, merge_pages,
    retain_newer,
};

use crate::layout::{self, HEADER_LINE};

/// Bytes read per step when scanning a file backwards for its tail.
const TAIL_CHUNK: u64 = 8 * 1024;

/// Rows re-read to verify ordering when a key is first touched and after each append.
const VERIFY_ROWS: usize = 64;

#[derive(Debug, Default)]
struct SeriesSlot {
    /// `None` until the tail has been read once; then the last stored timestamp.
    last: Option<Option<i64>>,
}

/// CSV-file backed series store.
///
/// Layout: see [`layout`](crate::layout). The store keeps a small in-memory
/// index per key (the last stored timestamp) so that [`last_timestamp`] is
/// O(1) once a key has been touched; a cold key only reads the file tail.
///
/// Each key is guarded by its own `RwLock`, so readers in this process never
/// observe a half-written batch.
///
/// [`last_timestamp`]: SeriesStore::last_timestamp
#[derive(Debug)]
pub struct CsvStore {
    root: PathBuf,
    slots: Mutex<HashMap<SeriesKey, Arc<RwLock<SeriesSlot>>>>,
}

impl CsvStore {
    /// Open a store rooted at `root`. The directory is created lazily on first append.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of `key`.
    #[must_use]
    pub fn path_for(&self, key: &SeriesKey) -> PathBuf {
        layout::series_path(&self.root, key)
    }

    fn slot(&self, key: &SeriesKey) -> Arc<RwLock<SeriesSlot>> {
        let mut slots = self.slots.lock().expect("mutex poisoned");
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    fn read_file(&self, key: &SeriesKey) -> Result<Option<Vec<u8>>, SerieError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, &e)),
        }
    }

    fn read_all(&self, key: &SeriesKey) -> Result<Vec<Candle>, SerieError> {
        match self.read_file(key)? {
            Some(bytes) => layout::decode_file(key, &bytes).inspect_err(log_corruption),
            None => Ok(Vec::new()),
        }
    }

    /// Last `n` rows of the file, ascending, reading only as much of the file as needed.
    fn read_tail(&self, key: &SeriesKey, n: usize) -> Result<Vec<Candle>, SerieError> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&path, &e)),
        };
        let (bytes, from_start) = tail_bytes(&mut file, n).map_err(|e| io_error(&path, &e))?;
        decode_tail(key, &bytes, from_start, n).inspect_err(log_corruption)
    }

    fn cached_last(&self, key: &SeriesKey, slot: &mut SeriesSlot) -> Result<Option<i64>, SerieError> {
        if let Some(last) = slot.last {
            return Ok(last);
        }
        let last = self.read_tail(key, VERIFY_ROWS)?.last().map(|c| c.ts);
        slot.last = Some(last);
        Ok(last)
    }

    fn write_batch(&self, key: &SeriesKey, batch: &[Candle]) -> Result<(), SerieError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(&path, &e))?;
        let is_new = file.metadata().map_err(|e| io_error(&path, &e))?.len() == 0;
        let bytes = layout::encode_rows(batch, is_new)?;
        file.write_all(&bytes).map_err(|e| io_error(&path, &e))?;
        file.sync_data().map_err(|e| io_error(&path, &e))?;
        Ok(())
    }

    fn verify_append(&self, key: &SeriesKey, batch: &[Candle]) -> Result<(), SerieError> {
        let rows = self.read_tail(key, (batch.len() + 1).min(VERIFY_ROWS))?;
        if serie_core::first_disorder(&rows).is_some() {
            return Err(SerieError::corrupted(key, "read-back found unordered rows"));
        }
        if rows.last().map(|c| c.ts) != batch.last().map(|c| c.ts) {
            return Err(SerieError::corrupted(key, "read-back tail does not match batch"));
        }
        Ok(())
    }
}

impl SeriesStore for CsvStore {
    fn last_timestamp(&self, key: &SeriesKey) -> Result<Option<i64>, SerieError> {
        let slot = self.slot(key);
        if let Some(last) = slot.read().expect("lock poisoned").last {
            return Ok(last);
        }
        let mut guard = slot.write().expect("lock poisoned");
        self.cached_last(key, &mut guard)
    }

    fn load(&self, key: &SeriesKey, from_ts: i64, to_ts: i64) -> Result<Vec<Candle>, SerieError> {
        let slot = self.slot(key);
        let _guard = slot.read().expect("lock poisoned");
        let mut rows = self.read_all(key)?;
        // The newest row may still be an open bar.
        rows.pop();
        rows.retain(|c| c.ts >= from_ts && c.ts < to_ts);
        Ok(rows)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            target = "serie::store",
            skip(self, key, candles),
            fields(key = %key, offered = candles.len()),
        )
    )]
    fn append(&self, key: &SeriesKey, candles: Vec<Candle>) -> Result<usize, SerieError> {
        let slot = self.slot(key);
        let mut guard = slot.write().expect("lock poisoned");
        let last = self.cached_last(key, &mut guard)?;
        let batch = retain_newer(candles, last);
        if batch.is_empty() {
            return Ok(0);
        }
        // Unknown on-disk state after a failed write; force a tail re-read.
        guard.last = None;
        self.write_batch(key, &batch)?;
        self.verify_append(key, &batch)?;
        guard.last = Some(batch.last().map(|c| c.ts));
        #[cfg(feature = "tracing")]
        tracing::debug!(target: "serie::store", appended = batch.len(), "batch committed");
        Ok(batch.len())
    }

    fn tail(&self, key: &SeriesKey, n: usize) -> Result<Vec<Candle>, SerieError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let slot = self.slot(key);
        let _guard = slot.read().expect("lock poisoned");
        self.read_tail(key, n)
    }

    fn inventory(&self) -> Result<Vec<SeriesSummary>, SerieError> {
        let mut out = Vec::new();
        for exchange_dir in list_dirs(&self.root)? {
            let Some(exchange) = file_name(&exchange_dir) else {
                continue;
            };
            for interval_dir in list_dirs(&exchange_dir)? {
                let Some(interval) = file_name(&interval_dir).and_then(|n| n.parse::<Interval>().ok())
                else {
                    continue;
                };
                for file in list_files(&interval_dir)? {
                    let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    let key = SeriesKey::new(
                        exchange.clone(),
                        layout::symbol_from_stem(stem),
                        interval,
                    );
                    let slot = self.slot(&key);
                    let _guard = slot.read().expect("lock poisoned");
                    match self.read_all(&key) {
                        Ok(rows) => out.push(SeriesSummary {
                            rows: rows.len(),
                            first_ts: rows.first().map(|c| c.ts),
                            last_ts: rows.last().map(|c| c.ts),
                            key,
                        }),
                        // Unparsable series are left out of the listing.
                        Err(SerieError::StoreCorrupted { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(target = "serie::store", skip(self, key), fields(key = %key))
    )]
    fn rebuild(&self, key: &SeriesKey) -> Result<usize, SerieError> {
        let slot = self.slot(key);
        let mut guard = slot.write().expect("lock poisoned");
        let Some(bytes) = self.read_file(key)? else {
            guard.last = Some(None);
            return Ok(0);
        };
        let rows = merge_pages(std::iter::once(layout::salvage_rows(&bytes)));
        let path = self.path_for(key);
        let dir = path
            .parent()
            .ok_or_else(|| SerieError::Io(format!("{}: no parent directory", path.display())))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_error(dir, &e))?;
        tmp.write_all(&layout::encode_rows(&rows, true)?)
            .map_err(|e| io_error(tmp.path(), &e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| io_error(tmp.path(), &e))?;
        tmp.persist(&path).map_err(|e| io_error(&path, &e.error))?;
        guard.last = Some(rows.last().map(|c| c.ts));
        #[cfg(feature = "tracing")]
        tracing::warn!(target: "serie::store", kept = rows.len(), "series rebuilt");
        Ok(rows.len())
    }
}

fn io_error(path: &Path, e: &io::Error) -> SerieError {
    SerieError::Io(format!("{}: {e}", path.display()))
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn log_corruption(e: &SerieError) {
    #[cfg(feature = "tracing")]
    if let SerieError::StoreCorrupted { key, reason } = e {
        tracing::error!(target: "serie::store", key = %key, reason = %reason, "store corrupted");
    }
}

/// Read backwards from the end until `n` complete rows (plus the preceding
/// line boundary) are buffered, or the start of the file is reached.
///
/// Returns the bytes and whether they begin at offset 0.
fn tail_bytes(file: &mut File, n: usize) -> io::Result<(Vec<u8>, bool)> {
    let len = file.metadata()?.len();
    let mut pos = len;
    let mut buf: Vec<u8> = Vec::new();
    while pos > 0 {
        let step = TAIL_CHUNK.min(pos);
        pos -= step;
        file.seek(SeekFrom::Start(pos))?;
        let mut chunk = vec![0u8; usize::try_from(step).unwrap_or(usize::MAX)];
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        if buf.iter().filter(|b| **b == b'\n').count() > n {
            break;
        }
    }
    Ok((buf, pos == 0))
}

fn decode_tail(
    key: &SeriesKey,
    bytes: &[u8],
    from_start: bool,
    n: usize,
) -> Result<Vec<Candle>, SerieError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.last() != Some(&b'\n') {
        return Err(SerieError::corrupted(key, "torn final row"));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| SerieError::corrupted(key, "file is not valid UTF-8"))?;
    let mut lines: Vec<&str> = text
        .split_terminator('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    if from_start {
        if lines.first().copied() != Some(HEADER_LINE) {
            return Err(SerieError::corrupted(key, "unexpected header"));
        }
        lines.remove(0);
    } else if !lines.is_empty() {
        // First line is cut at an arbitrary byte offset.
        lines.remove(0);
    }
    let skip = lines.len().saturating_sub(n);
    let rows = lines[skip..]
        .iter()
        .map(|l| layout::decode_line(l).map_err(|e| SerieError::corrupted(key, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(i) = serie_core::first_disorder(&rows) {
        return Err(SerieError::corrupted(
            key,
            format!("timestamps not strictly increasing near row {}", skip + i + 1),
        ));
    }
    Ok(rows)
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>, SerieError> {
    list_entries(dir, true)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, SerieError> {
    let mut files = list_entries(dir, false)?;
    files.retain(|p| p.extension().is_some_and(|e| e == layout::EXTENSION));
    Ok(files)
}

fn list_entries(dir: &Path, dirs: bool) -> Result<Vec<PathBuf>, SerieError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, &e)),
    };
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_error(dir, &e))?;
        let ty = entry.file_type().map_err(|e| io_error(dir, &e))?;
        if ty.is_dir() == dirs && (ty.is_dir() || ty.is_file()) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(str::to_string)
}
