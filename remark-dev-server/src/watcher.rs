//! Watches the public and slide directories on disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, event::ModifyKind};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use remark_core::memfs::normalize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type FileWatcher = Debouncer<RecommendedWatcher, RecommendedCache>;

/// Creations, removals, renames and data writes. Opens, reads and
/// attribute-only updates are not edits.
fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

#[derive(Debug, Clone)]
struct WatchRoot {
    configured: PathBuf,
    canonical: PathBuf,
}

/// Maps the absolute paths the watcher reports back onto the directories as
/// they were configured, which is how the mirror keys them.
#[derive(Debug, Clone)]
pub struct WatchRoots {
    roots: Vec<WatchRoot>,
}

impl WatchRoots {
    pub fn new<P: AsRef<Path>>(dirs: &[P]) -> Result<Self> {
        let mut roots = dirs
            .iter()
            .map(|dir| -> Result<WatchRoot> {
                let configured = normalize(dir.as_ref());
                let canonical = dir
                    .as_ref()
                    .canonicalize()
                    .with_context(|| format!("cannot watch {}", dir.as_ref().display()))?;
                Ok(WatchRoot {
                    configured,
                    canonical,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // nested roots: the most specific one wins
        roots.sort_by_key(|root| std::cmp::Reverse(root.canonical.components().count()));
        Ok(Self { roots })
    }

    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(|root| root.canonical.as_path())
    }

    /// The mirror path for a path reported by the watcher.
    pub fn to_mirror(&self, path: &Path) -> Option<PathBuf> {
        self.roots.iter().find_map(|root| {
            if let Ok(relative) = path.strip_prefix(&root.canonical) {
                Some(normalize(&root.configured.join(relative)))
            } else if normalize(path).starts_with(&root.configured) {
                Some(normalize(path))
            } else {
                None
            }
        })
    }
}

/// Start watching every root. Changed file paths arrive on the receiver;
/// dropping the returned watcher stops it and closes the channel.
pub fn watch(roots: &WatchRoots, debounce: Duration) -> Result<(FileWatcher, mpsc::Receiver<PathBuf>)> {
    let (tx, rx) = mpsc::channel(100);

    let mut debouncer = new_debouncer(debounce, None, move |res: DebounceEventResult| match res {
        Ok(events) => {
            // one entry per path per batch
            let mut changed: Vec<PathBuf> = Vec::new();
            for event in events.iter().filter(|event| is_content_change(&event.kind)) {
                for path in &event.paths {
                    if !path.is_dir() && !changed.contains(path) {
                        changed.push(path.clone());
                    }
                }
            }

            for path in changed {
                if tx.blocking_send(path).is_err() {
                    break;
                }
            }
        }
        Err(errors) => {
            for e in errors {
                warn!("file watcher error: {e:?}");
            }
        }
    })
    .context("failed to create file watcher")?;

    for dir in roots.dirs() {
        debouncer
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;
        debug!(dir = %dir.display(), "watching");
    }

    Ok((debouncer, rx))
}
