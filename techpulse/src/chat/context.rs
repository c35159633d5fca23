use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::article::Article;

/// Key under which the article handoff is stored.
pub const HANDOFF_KEY: &str = "chatArticleContext";

/// Zero-or-one article attached to outgoing messages for the lifetime of a session.
///
/// Unlike a one-shot attachment, the snapshot stays in place across sends
/// until it is replaced or cleared.
#[derive(Debug, Default, Clone)]
pub struct ContextAttachment {
    snapshot: Option<Article>,
}

impl ContextAttachment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cross-session handoff exactly once and erase it.
    ///
    /// A corrupt or unreadable slot yields an empty context; the slot is still
    /// erased so the same payload cannot be replayed into a later session.
    pub fn from_handoff(slot: &dyn HandoffSlot) -> Self {
        match slot.take() {
            Ok(Some(article)) => {
                info!(article_id = %article.id, "article context picked up from handoff");
                Self { snapshot: Some(article) }
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(error = %e, "discarding unreadable article handoff");
                Self::default()
            }
        }
    }

    /// Store a copy of `article`, replacing any previous snapshot.
    pub fn capture(&mut self, article: Article) {
        debug!(article_id = %article.id, "article context captured");
        self.snapshot = Some(article);
    }

    /// Snapshot to attach to the next send. Reading does not clear it.
    pub fn consume_for_next_send(&self) -> Option<&Article> {
        self.snapshot.as_ref()
    }

    pub fn clear(&mut self) {
        if self.snapshot.take().is_some() {
            debug!("article context cleared");
        }
    }

    pub fn is_active(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Single-writer, single-reader slot used to hand an article to the next chat session.
pub trait HandoffSlot: Send + Sync {
    /// Producer side: overwrite the slot with `article`.
    fn put(&self, article: &Article) -> Result<()>;

    /// Consumer side: read the slot and erase it.
    fn take(&self) -> Result<Option<Article>>;
}

/// Durable handoff backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileHandoff {
    path: PathBuf,
}

impl FileHandoff {
    /// Slot stored as `<dir>/chatArticleContext.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", HANDOFF_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HandoffSlot for FileHandoff {
    fn put(&self, article: &Article) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create handoff directory: {}", parent.display())
            })?;
        }
        let data = serde_json::to_vec(article).context("Failed to serialize article handoff")?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write handoff file: {}", self.path.display()))?;
        Ok(())
    }

    fn take(&self) -> Result<Option<Article>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read handoff file: {}", self.path.display())
                })
            }
        };

        // Erase before parsing so a bad payload is not picked up again.
        std::fs::remove_file(&self.path)
            .with_context(|| format!("Failed to erase handoff file: {}", self.path.display()))?;

        let article = serde_json::from_slice(&data).context("Failed to parse article handoff")?;
        Ok(Some(article))
    }
}

/// In-process handoff, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryHandoff {
    slot: Mutex<Option<Article>>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HandoffSlot for MemoryHandoff {
    fn put(&self, article: &Article) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("handoff slot poisoned"))?;
        *slot = Some(article.clone());
        Ok(())
    }

    fn take(&self) -> Result<Option<Article>> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("handoff slot poisoned"))?;
        Ok(slot.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Article {
        Article {
            id: format!("id-{}", title),
            title: title.to_string(),
            summary: "summary".to_string(),
            url: "https://example.com".to_string(),
            published_at: "2026-03-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn snapshot_persists_across_reads() {
        let mut ctx = ContextAttachment::new();
        assert!(ctx.consume_for_next_send().is_none());

        ctx.capture(article("X"));
        assert_eq!(ctx.consume_for_next_send().map(|a| a.title.as_str()), Some("X"));
        assert_eq!(ctx.consume_for_next_send().map(|a| a.title.as_str()), Some("X"));
        assert!(ctx.is_active());
    }

    #[test]
    fn capture_overwrites_previous_snapshot() {
        let mut ctx = ContextAttachment::new();
        ctx.capture(article("first"));
        ctx.capture(article("second"));
        assert_eq!(ctx.consume_for_next_send().map(|a| a.title.as_str()), Some("second"));
    }

    #[test]
    fn clear_is_idempotent() {
        let mut ctx = ContextAttachment::new();
        ctx.capture(article("X"));
        ctx.clear();
        ctx.clear();
        assert!(ctx.consume_for_next_send().is_none());
        assert!(!ctx.is_active());
    }

    #[test]
    fn memory_handoff_is_read_once() {
        let slot = MemoryHandoff::new();
        slot.put(&article("handed")).unwrap();

        let ctx = ContextAttachment::from_handoff(&slot);
        assert_eq!(ctx.consume_for_next_send().map(|a| a.title.as_str()), Some("handed"));

        let second = ContextAttachment::from_handoff(&slot);
        assert!(second.consume_for_next_send().is_none());
    }

    #[test]
    fn file_handoff_round_trip_erases_slot() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileHandoff::in_dir(dir.path().join("nested"));

        assert!(slot.take().unwrap().is_none());

        slot.put(&article("durable")).unwrap();
        assert!(slot.path().exists());

        let taken = slot.take().unwrap().unwrap();
        assert_eq!(taken.title, "durable");
        assert!(!slot.path().exists());
        assert!(slot.take().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_handoff_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let slot = FileHandoff::in_dir(dir.path());
        std::fs::write(slot.path(), b"{not json").unwrap();

        let ctx = ContextAttachment::from_handoff(&slot);
        assert!(!ctx.is_active());
        assert!(!slot.path().exists());
    }
}
