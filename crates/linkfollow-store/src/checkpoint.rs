use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use linkfollow_core::{Checkpoint, EventId};

/// Persists the discovery cursor as a small JSON file. Writes go
/// through a sibling temp file and a rename so a reader never sees a
/// torn record.
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted checkpoint. On first use the initial value is
    /// persisted before it is returned, so a later `advance` always has
    /// a file to replace.
    pub fn load(&self) -> Result<Checkpoint> {
        if !self.path.exists() {
            let cp = Checkpoint::initial();
            self.persist(cp)?;
            return Ok(cp);
        }
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read checkpoint {}", self.path.display()))?;
        let cp: Checkpoint = serde_json::from_str(&s)
            .with_context(|| format!("parse checkpoint {}", self.path.display()))?;
        Ok(cp)
    }

    /// Shift the window: `previous = current; current = max(current,
    /// new_current)`. Called once per discovery run, after every page
    /// has been scanned.
    pub fn advance(&self, new_current: EventId) -> Result<Checkpoint> {
        let next = self.load()?.advanced(new_current);
        self.persist(next)?;
        Ok(next)
    }

    /// Discard history and return to the initial value. Used for a full
    /// re-scrape.
    pub fn reset(&self) -> Result<()> {
        self.persist(Checkpoint::initial())
    }

    fn persist(&self, cp: Checkpoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let s = serde_json::to_string_pretty(&cp).context("serialize checkpoint")?;
        std::fs::write(&tmp, s).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}
