use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::events::{is_tracked_document, DocumentEvent};

/// Produces document events for the tracker. The shipped implementation
/// polls a watched directory; hosts with richer editor notifications can
/// plug in their own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentEventSource: Send {
    async fn poll_events(&mut self) -> Result<Vec<DocumentEvent>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileSignature {
    modified: SystemTime,
    len: u64,
}

/// Watches a directory tree by diffing scans. New files open + edit,
/// changed files edit, vanished files delete. A vanished file whose
/// signature reappears under exactly one new path becomes a rename.
pub struct FsPollingSource {
    root: PathBuf,
    seen: HashMap<Arc<str>, FileSignature>,
    primed: bool,
}

impl FsPollingSource {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            seen: HashMap::new(),
            primed: false,
        }
    }

    fn scan(&self) -> Result<HashMap<Arc<str>, FileSignature>> {
        let mut found = HashMap::new();
        scan_dir(&self.root, &mut found)?;
        Ok(found)
    }
}

fn scan_dir(dir: &Path, found: &mut HashMap<Arc<str>, FileSignature>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            // unreadable subdirectories are skipped, not fatal
            if let Err(e) = scan_dir(&path, found) {
                warn!("Failed to scan {path:?}: {e}");
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let Some(path_str) = path.to_str() else {
            continue;
        };
        if !is_tracked_document(path_str) {
            continue;
        }
        let metadata = entry.metadata()?;
        found.insert(
            path_str.into(),
            FileSignature {
                modified: metadata.modified()?,
                len: metadata.len(),
            },
        );
    }
    Ok(())
}

#[async_trait]
impl DocumentEventSource for FsPollingSource {
    async fn poll_events(&mut self) -> Result<Vec<DocumentEvent>> {
        let current = self.scan()?;

        // First scan only primes the baseline; existing files are not
        // spurious activity.
        if !self.primed {
            self.seen = current;
            self.primed = true;
            return Ok(vec![]);
        }

        let mut events = vec![];
        let mut vanished: Vec<(Arc<str>, FileSignature)> = self
            .seen
            .iter()
            .filter(|(path, _)| !current.contains_key(*path))
            .map(|(path, sig)| (path.clone(), *sig))
            .collect();
        let appeared: Vec<&Arc<str>> = current
            .keys()
            .filter(|path| !self.seen.contains_key(*path))
            .collect();

        for path in &appeared {
            let signature = current[*path];
            let renamed_from = vanished
                .iter()
                .position(|(_, sig)| *sig == signature)
                .filter(|_| vanished.len() == 1 && appeared.len() == 1);
            match renamed_from {
                Some(i) => {
                    let (old_path, _) = vanished.remove(i);
                    events.push(DocumentEvent::Renamed {
                        old_path,
                        new_path: (*path).clone(),
                    });
                }
                None => {
                    events.push(DocumentEvent::Opened { path: (*path).clone() });
                    match std::fs::read_to_string(path.as_ref()) {
                        Ok(content) => events.push(DocumentEvent::Edited {
                            path: (*path).clone(),
                            content: content.into(),
                        }),
                        Err(e) => warn!("Failed to read new document {path}: {e}"),
                    }
                }
            }
        }

        for (path, _) in vanished {
            events.push(DocumentEvent::Deleted { path });
        }

        for (path, signature) in &current {
            if matches!(self.seen.get(path), Some(prior) if prior != signature) {
                match std::fs::read_to_string(path.as_ref()) {
                    Ok(content) => events.push(DocumentEvent::Edited {
                        path: path.clone(),
                        content: content.into(),
                    }),
                    Err(e) => warn!("Failed to read changed document {path}: {e}"),
                }
            }
        }

        if !events.is_empty() {
            debug!("Scan produced {} events", events.len());
        }
        self.seen = current;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use crate::engine::events::DocumentEvent;

    use super::{DocumentEventSource, FsPollingSource};

    #[tokio::test]
    async fn first_scan_is_silent() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("existing.md"), "hello")?;
        let mut source = FsPollingSource::new(dir.path().to_owned());

        assert!(source.poll_events().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn new_file_opens_and_edits() -> Result<()> {
        let dir = tempdir()?;
        let mut source = FsPollingSource::new(dir.path().to_owned());
        source.poll_events().await?;

        std::fs::write(dir.path().join("fresh.md"), "one two")?;
        let events = source.poll_events().await?;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], DocumentEvent::Opened { .. }));
        assert!(
            matches!(&events[1], DocumentEvent::Edited { content, .. } if content.as_ref() == "one two")
        );
        Ok(())
    }

    #[tokio::test]
    async fn removed_file_deletes() -> Result<()> {
        let dir = tempdir()?;
        let file = dir.path().join("gone.md");
        std::fs::write(&file, "text")?;
        let mut source = FsPollingSource::new(dir.path().to_owned());
        source.poll_events().await?;

        std::fs::remove_file(&file)?;
        let events = source.poll_events().await?;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DocumentEvent::Deleted { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn untracked_extensions_never_surface() -> Result<()> {
        let dir = tempdir()?;
        let mut source = FsPollingSource::new(dir.path().to_owned());
        source.poll_events().await?;

        std::fs::write(dir.path().join("photo.png"), [0u8, 1, 2])?;
        assert!(source.poll_events().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn moved_file_becomes_rename() -> Result<()> {
        let dir = tempdir()?;
        let old = dir.path().join("draft.md");
        std::fs::write(&old, "chapter one")?;
        let mut source = FsPollingSource::new(dir.path().to_owned());
        source.poll_events().await?;

        std::fs::rename(&old, dir.path().join("chapter-1.md"))?;
        let events = source.poll_events().await?;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DocumentEvent::Renamed { .. }));
        Ok(())
    }
}
