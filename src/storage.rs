//! Deduplicating, append-only store of summary results.
//!
//! Results live under `<root>/data/<YYYYMM>/<YYYYMMDD>.jsonl`, one JSON
//! object per line, one file per UTC day. Files are never rewritten.
//!
//! On startup every historical segment is replayed into an in-memory
//! index keyed by `(domain, path)`. [`Storage::put`] checks that index
//! again before each append, so a key is written at most once across the
//! whole history even when the caller's own check was stale.
//!
//! ```text
//! data/
//! ├── 202404/
//! │   ├── 20240429.jsonl
//! │   └── 20240430.jsonl
//! └── 202405/
//!     └── 20240501.jsonl
//! ```
//!
//! The store is single-writer: nothing guards against two processes
//! appending to the same root at once.

use crate::error::{Error, Result};
use crate::models::SummaryResult;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, instrument, warn};

/// Directory under the root that holds the month partitions.
pub const DATA_DIR: &str = "data";

const SEGMENT_EXTENSION: &str = "jsonl";

#[derive(Debug)]
pub struct Storage {
    data_path: PathBuf,
    /// domain -> paths already summarized
    exist_posts: HashMap<String, HashSet<String>>,
}

impl Storage {
    /// Open the store under `root`, creating `root/data` if needed and
    /// replaying every historical segment.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory that holds (or will hold) the `data/` partitions
    ///
    /// # Returns
    ///
    /// A store whose index contains every key found in history.
    ///
    /// # Errors
    ///
    /// Fails if the data directory cannot be created or listed, or if any
    /// segment cannot be read or contains a line that is not a valid
    /// [`SummaryResult`]. A store that cannot replay its history cannot
    /// promise deduplication, so this is fatal.
    #[instrument(level = "info", skip_all, fields(root = %root.as_ref().display()))]
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let data_path = root.as_ref().join(DATA_DIR);
        fs::create_dir_all(&data_path)
            .await
            .map_err(|e| Error::io(&data_path, e))?;

        let mut storage = Self {
            data_path,
            exist_posts: HashMap::new(),
        };
        storage.read_previous_summaries().await?;

        info!(count = storage.len(), "Loaded previous summaries");
        Ok(storage)
    }

    async fn read_previous_summaries(&mut self) -> Result<()> {
        for month in list_entries(&self.data_path, EntryKind::Dir).await? {
            for segment in list_entries(&month, EntryKind::Segment).await? {
                self.read_segment(&segment).await?;
            }
        }
        Ok(())
    }

    async fn read_segment(&mut self, segment: &Path) -> Result<()> {
        let file = File::open(segment)
            .await
            .map_err(|e| Error::io(segment, e))?;
        let mut lines = BufReader::new(file).lines();

        let mut line_no = 0usize;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::io(segment, e))?
        {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let result: SummaryResult =
                serde_json::from_str(&line).map_err(|source| Error::Decode {
                    path: segment.to_path_buf(),
                    line: line_no,
                    source,
                })?;

            if result.title.lines().count() > 1 {
                warn!(path = %result.path, segment = %segment.display(), "post title has multi line");
            }
            if !self.mark(&result.domain, &result.path) {
                warn!(
                    domain = %result.domain,
                    path = %result.path,
                    segment = %segment.display(),
                    "duplicate post in storage"
                );
            }
        }

        debug!(segment = %segment.display(), lines = line_no, "Replayed segment");
        Ok(())
    }

    /// Returns `true` if `(domain, path)` has already been persisted.
    ///
    /// Pure in-memory lookup; reflects startup replay plus successful puts.
    pub fn summary_exists(&self, domain: &str, path: &str) -> bool {
        self.exist_posts
            .get(domain)
            .is_some_and(|paths| paths.contains(path))
    }

    /// Number of distinct keys known to the store.
    pub fn len(&self) -> usize {
        self.exist_posts.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The segment file that a write at `now` appends to.
    pub fn segment_path(&self, now: DateTime<Utc>) -> PathBuf {
        self.data_path
            .join(now.format("%Y%m").to_string())
            .join(format!("{}.{SEGMENT_EXTENSION}", now.format("%Y%m%d")))
    }

    /// Append every result whose key is not yet known to today's segment.
    ///
    /// # Arguments
    ///
    /// * `results` - Batch to persist; an empty batch performs no I/O
    ///
    /// # Returns
    ///
    /// The number of lines written. Results already present, either from
    /// history or earlier in the same batch, are skipped silently.
    ///
    /// # Errors
    ///
    /// An encode or I/O failure stops the batch. Each line is flushed before
    /// its key enters the index, so lines appended before the failure stay
    /// in the file and in the index, and the failed record is in neither.
    #[instrument(level = "info", skip_all, fields(batch = results.len()))]
    pub async fn put(&mut self, results: &[SummaryResult]) -> Result<usize> {
        if results.is_empty() {
            return Ok(0);
        }

        let path = self.segment_path(Utc::now());
        let mut file = open_segment(&path).await?;

        let appended = self.append(&mut file, &path, results).await;
        let flushed = file.flush().await.map_err(|e| Error::io(&path, e));
        let written = appended?;
        flushed?;

        info!(filename = %path.display(), rows = written, "save results");
        Ok(written)
    }

    async fn append<W>(
        &mut self,
        writer: &mut W,
        path: &Path,
        results: &[SummaryResult],
    ) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0usize;
        for result in results {
            if self.summary_exists(&result.domain, &result.path) {
                debug!(domain = %result.domain, path = %result.path, "Summary exists; skipping");
                continue;
            }

            let mut line = serde_json::to_vec(result)?;
            line.push(b'\n');
            writer
                .write_all(&line)
                .await
                .map_err(|e| Error::io(path, e))?;
            // A buffered write can still fail; only index lines that reached the file.
            writer.flush().await.map_err(|e| Error::io(path, e))?;

            self.mark(&result.domain, &result.path);
            written += 1;
        }
        Ok(written)
    }

    /// Record a key; returns `false` if it was already present.
    fn mark(&mut self, domain: &str, path: &str) -> bool {
        self.exist_posts
            .entry(domain.to_string())
            .or_default()
            .insert(path.to_string())
    }
}

async fn open_segment(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| Error::io(path, e))
}

#[derive(Clone, Copy, PartialEq)]
enum EntryKind {
    Dir,
    Segment,
}

/// Matching entries of `dir`, sorted by name.
async fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| Error::io(&path, e))?;
        let keep = match kind {
            EntryKind::Dir => file_type.is_dir(),
            EntryKind::Segment => {
                !file_type.is_dir()
                    && path.extension().is_some_and(|ext| ext == SEGMENT_EXTENSION)
            }
        };
        if keep {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}
