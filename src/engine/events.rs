use std::{path::Path, sync::Arc};

/// Notification from the host about a document. Every variant carries a
/// typed payload instead of a name + bag of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A document came into focus or was opened.
    Opened { path: Arc<str> },
    /// A document changed; carries the full current text.
    Edited { path: Arc<str>, content: Arc<str> },
    Renamed { old_path: Arc<str>, new_path: Arc<str> },
    Deleted { path: Arc<str> },
}

impl DocumentEvent {
    pub fn path(&self) -> &Arc<str> {
        match self {
            DocumentEvent::Opened { path }
            | DocumentEvent::Edited { path, .. }
            | DocumentEvent::Deleted { path } => path,
            DocumentEvent::Renamed { new_path, .. } => new_path,
        }
    }
}

/// Only plain text documents are tracked.
const TRACKED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "text", "org", "rst"];

pub fn is_tracked_document(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            TRACKED_EXTENSIONS.iter().any(|t| *t == e)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::is_tracked_document;

    #[test]
    fn tracks_plain_text_extensions() {
        assert!(is_tracked_document("notes/today.md"));
        assert!(is_tracked_document("draft.TXT"));
        assert!(is_tracked_document("/deep/path/chapter.markdown"));
    }

    #[test]
    fn ignores_everything_else() {
        assert!(!is_tracked_document("image.png"));
        assert!(!is_tracked_document("binary"));
        assert!(!is_tracked_document("archive.tar.gz"));
    }
}
