//! Persistent record of item ids already reported, per region.
//!
//! The watermark is a bounded, most-recent-first list of ids. An id that is
//! in the list is never reported again by that region; once more than `cap`
//! ids have been recorded the oldest ones are evicted.
//!
//! # File layout
//!
//! ```text
//! state_dir/
//! ├── last_id_jp.txt   # one id per line, newest first
//! └── last_id_gl.txt
//! ```
//!
//! A file holding a single id (the format of older deployments) is read as a
//! watermark of length one.

use crate::error::WatermarkError;
use crate::regions::RegionConfig;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Default number of ids kept per region.
pub const DEFAULT_CAPACITY: usize = 15;

/// Ids already reported by one region, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    ids: VecDeque<String>,
}

impl Watermark {
    /// Parse the persisted form. Blank lines and surrounding whitespace are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut watermark = Watermark::default();
        for id in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !watermark.contains(id) {
                watermark.ids.push_back(id.to_string());
            }
        }
        watermark
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|seen| seen == id)
    }

    /// Add `id` as the most recent entry, evicting the oldest past `cap`.
    /// Returns `false` when the id was already present (nothing changes).
    pub fn insert(&mut self, id: &str, cap: usize) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_front(id.to_string());
        self.ids.truncate(cap.max(1));
        true
    }

    /// Ids, newest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for id in &self.ids {
            out.push_str(id);
            out.push('\n');
        }
        out
    }
}

/// Durable per-region storage of reported ids.
pub trait WatermarkStore {
    /// Load the watermark of a region. A region without prior state yields an
    /// empty watermark.
    async fn load(&self, region: &RegionConfig) -> Result<Watermark, WatermarkError>;

    async fn contains(&self, region: &RegionConfig, id: &str) -> Result<bool, WatermarkError> {
        Ok(self.load(region).await?.contains(id))
    }

    /// Durably record `id` as reported. Recording an id twice is a no-op.
    /// The record is on disk when this returns `Ok`.
    async fn record(&self, region: &RegionConfig, id: &str) -> Result<(), WatermarkError>;
}

/// [`WatermarkStore`] backed by one text file per region.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    dir: PathBuf,
    cap: usize,
}

impl FileWatermarkStore {
    pub fn new(dir: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            dir: dir.into(),
            cap: cap.max(1),
        }
    }

    pub fn path_for(&self, region: &RegionConfig) -> PathBuf {
        self.dir.join(format!("{}.txt", region.watermark_key))
    }

    async fn read(&self, path: &Path) -> Result<Watermark, WatermarkError> {
        match fs::read_to_string(path).await {
            Ok(raw) => Ok(Watermark::parse(&raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Watermark::default()),
            Err(e) => Err(WatermarkError::new(path, e)),
        }
    }

    /// Replace `path` atomically: write a sibling temp file, flush it to disk,
    /// rename it over the target, then sync the directory entry.
    async fn write_durable(&self, path: &Path, contents: &str) -> Result<(), WatermarkError> {
        let tmp_path = path.with_extension("txt.tmp");
        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| WatermarkError::new(&tmp_path, e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| WatermarkError::new(&tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| WatermarkError::new(&tmp_path, e))?;
        drop(file);

        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| WatermarkError::new(path, e))?;

        #[cfg(unix)]
        {
            let dir = fs::File::open(&self.dir)
                .await
                .map_err(|e| WatermarkError::new(&self.dir, e))?;
            dir.sync_all()
                .await
                .map_err(|e| WatermarkError::new(&self.dir, e))?;
        }
        Ok(())
    }
}

impl WatermarkStore for FileWatermarkStore {
    #[instrument(level = "debug", skip_all, fields(region = %region.name()))]
    async fn load(&self, region: &RegionConfig) -> Result<Watermark, WatermarkError> {
        let path = self.path_for(region);
        let watermark = self.read(&path).await?;
        debug!(path = %path.display(), entries = watermark.len(), "Loaded watermark");
        Ok(watermark)
    }

    #[instrument(level = "info", skip_all, fields(region = %region.name(), %id))]
    async fn record(&self, region: &RegionConfig, id: &str) -> Result<(), WatermarkError> {
        let path = self.path_for(region);
        let mut watermark = self.read(&path).await?;
        if !watermark.insert(id, self.cap) {
            debug!("Id already recorded");
            return Ok(());
        }
        self.write_durable(&path, &watermark.render()).await?;
        info!(entries = watermark.len(), "Recorded id in watermark");
        Ok(())
    }
}
