//! Directory watcher for the attachments folder.
//!
//! Uses the platform notify backend. The backend invokes our callback on its
//! own thread; each qualifying event is handed to the rebuild trigger there,
//! synchronously.

use crate::config::FileFilter;
use crate::trigger::RebuildTrigger;
use courier_core::{AppError, AppResult};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A change that may require a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Deleted(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(path) | Self::Deleted(path) => path,
        }
    }
}

impl fmt::Display for WatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(path) => write!(f, "Created: {}", path.display()),
            Self::Deleted(path) => write!(f, "Deleted: {}", path.display()),
        }
    }
}

/// Map a raw notify event to zero or more watch events.
pub fn convert_event(event: &Event) -> Vec<WatchEvent> {
    let first = || event.paths.first().cloned();

    match &event.kind {
        EventKind::Create(CreateKind::Folder) => vec![],
        EventKind::Create(_) => first().map(WatchEvent::Created).into_iter().collect(),

        // Writer closed the file: its content is now complete
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            first().map(WatchEvent::Created).into_iter().collect()
        }

        EventKind::Remove(_) => first().map(WatchEvent::Deleted).into_iter().collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            first().map(WatchEvent::Created).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            first().map(WatchEvent::Deleted).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to, ..] => vec![
                WatchEvent::Deleted(from.clone()),
                WatchEvent::Created(to.clone()),
            ],
            _ => vec![],
        },
        // Backends that cannot tell the direction of a rename
        EventKind::Modify(ModifyKind::Name(_)) => first()
            .map(|path| {
                if path.exists() {
                    WatchEvent::Created(path)
                } else {
                    WatchEvent::Deleted(path)
                }
            })
            .into_iter()
            .collect(),

        _ => vec![],
    }
}

/// Fire the trigger if the event concerns a document. Returns whether it fired.
pub fn handle_event(filter: &FileFilter, trigger: &dyn RebuildTrigger, event: WatchEvent) -> bool {
    match &event {
        WatchEvent::Created(path) | WatchEvent::Deleted(path) if filter.matches(path) => {
            trigger.fire(&event);
            true
        }
        _ => {
            tracing::trace!("Ignoring {}", event);
            false
        }
    }
}

enum WatcherState {
    Stopped,
    Running(RecommendedWatcher),
}

/// Watches one directory (non-recursively) and feeds a rebuild trigger.
pub struct DirectoryWatcher {
    dir: PathBuf,
    filter: FileFilter,
    trigger: Arc<dyn RebuildTrigger>,
    state: WatcherState,
}

impl DirectoryWatcher {
    pub fn new(dir: impl Into<PathBuf>, filter: FileFilter, trigger: Arc<dyn RebuildTrigger>) -> Self {
        Self {
            dir: dir.into(),
            filter,
            trigger,
            state: WatcherState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, WatcherState::Running(_))
    }

    /// Begin watching. Creates the directory if it does not exist.
    pub fn start(&mut self) -> AppResult<()> {
        if self.is_running() {
            tracing::warn!("Watcher for {:?} is already running", self.dir);
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Watch(format!("Failed to create watched directory {:?}: {}", self.dir, e))
        })?;

        let filter = self.filter.clone();
        let trigger = Arc::clone(&self.trigger);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for watch_event in convert_event(&event) {
                        handle_event(&filter, trigger.as_ref(), watch_event);
                    }
                }
                Err(e) => tracing::error!("Watch error: {}", e),
            }
        })
        .map_err(|e| AppError::Watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| AppError::Watch(format!("Failed to watch {:?}: {}", self.dir, e)))?;

        self.state = WatcherState::Running(watcher);
        tracing::info!("Watching {:?} for changes", self.dir);
        Ok(())
    }

    /// Stop watching. A rebuild already running is not interrupted.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.state, WatcherState::Stopped) {
            WatcherState::Running(watcher) => {
                drop(watcher);
                tracing::info!("Stopped watching {:?}", self.dir);
            }
            WatcherState::Stopped => {
                tracing::warn!("Watcher for {:?} is not running", self.dir);
            }
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTrigger {
        events: Mutex<Vec<WatchEvent>>,
    }

    impl RebuildTrigger for RecordingTrigger {
        fn fire(&self, event: &WatchEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_convert_create_and_remove() {
        assert_eq!(
            convert_event(&event(EventKind::Create(CreateKind::File), &["/in/a.pdf"])),
            vec![WatchEvent::Created(PathBuf::from("/in/a.pdf"))]
        );
        assert_eq!(
            convert_event(&event(EventKind::Remove(RemoveKind::File), &["/in/a.pdf"])),
            vec![WatchEvent::Deleted(PathBuf::from("/in/a.pdf"))]
        );
    }

    #[test]
    fn test_convert_ignores_folders_and_data_changes() {
        assert!(convert_event(&event(EventKind::Create(CreateKind::Folder), &["/in/sub"])).is_empty());
        assert!(convert_event(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/in/a.pdf"]
        ))
        .is_empty());
    }

    #[test]
    fn test_convert_close_write_counts_as_created() {
        assert_eq!(
            convert_event(&event(
                EventKind::Access(AccessKind::Close(AccessMode::Write)),
                &["/in/a.txt"]
            )),
            vec![WatchEvent::Created(PathBuf::from("/in/a.txt"))]
        );
    }

    #[test]
    fn test_convert_renames() {
        assert_eq!(
            convert_event(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                &["/in/a.pdf"]
            )),
            vec![WatchEvent::Created(PathBuf::from("/in/a.pdf"))]
        );
        assert_eq!(
            convert_event(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &["/in/a.pdf"]
            )),
            vec![WatchEvent::Deleted(PathBuf::from("/in/a.pdf"))]
        );
        assert_eq!(
            convert_event(&event(
                EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &["/in/old.pdf", "/in/new.pdf"]
            )),
            vec![
                WatchEvent::Deleted(PathBuf::from("/in/old.pdf")),
                WatchEvent::Created(PathBuf::from("/in/new.pdf")),
            ]
        );
    }

    #[test]
    fn test_handle_event_filters() {
        let trigger = RecordingTrigger::default();
        let filter = FileFilter::default();

        assert!(handle_event(
            &filter,
            &trigger,
            WatchEvent::Created(PathBuf::from("/in/invoice.PDF"))
        ));
        assert!(!handle_event(
            &filter,
            &trigger,
            WatchEvent::Created(PathBuf::from("/in/photo.png"))
        ));
        assert!(!handle_event(
            &filter,
            &trigger,
            WatchEvent::Deleted(PathBuf::from("/in/.partial.pdf"))
        ));
        assert!(handle_event(
            &filter,
            &trigger,
            WatchEvent::Deleted(PathBuf::from("/in/notes.md"))
        ));

        assert_eq!(trigger.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_start_stop_state_machine() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("attachments");
        let mut watcher = DirectoryWatcher::new(
            &dir,
            FileFilter::default(),
            Arc::new(RecordingTrigger::default()),
        );

        assert!(!watcher.is_running());
        watcher.stop();
        assert!(!watcher.is_running());

        watcher.start().unwrap();
        assert!(dir.is_dir());
        assert!(watcher.is_running());

        watcher.start().unwrap();
        assert!(watcher.is_running());

        watcher.stop();
        assert!(!watcher.is_running());
    }
}
