//! Bridges filesystem notifications into the rebuild scheduler.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;
use zoukcal_core::WatchSignal;

/// Signals buffered between the watcher thread and the scheduler.
const CHANNEL_CAPACITY: usize = 64;

/// Keeps the underlying watcher alive; dropping it stops notifications.
pub struct SiteWatcher {
    _watcher: RecommendedWatcher,
}

/// Watch `content_dir` recursively and each of `extra` (templates, styles).
///
/// Changes under `output_dir` are ignored so a pass never retriggers itself.
pub fn spawn(
    content_dir: &Path,
    extra: &[PathBuf],
    output_dir: &Path,
) -> Result<(SiteWatcher, mpsc::Receiver<WatchSignal>)> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let ignored = output_dir
        .canonicalize()
        .unwrap_or_else(|_| output_dir.to_path_buf());

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let signal = match res {
            Ok(event) => match signal_for(&event, &ignored) {
                Some(signal) => signal,
                None => return,
            },
            Err(e) => WatchSignal::Failed(e.to_string()),
        };
        // The scheduler is gone once the receiver drops; nothing left to tell.
        let _ = tx.blocking_send(signal);
    })
    .context("Failed to start filesystem watcher")?;

    watcher
        .watch(content_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", content_dir.display()))?;

    for path in extra {
        if !path.exists() {
            warn!("Not watching {}: it does not exist", path.display());
            continue;
        }
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    Ok((SiteWatcher { _watcher: watcher }, rx))
}

fn signal_for(event: &Event, ignored: &Path) -> Option<WatchSignal> {
    let paths = relevant_paths(event, ignored)?;
    Some(match event.kind {
        EventKind::Remove(_) => WatchSignal::Removed(paths),
        _ => WatchSignal::Changed(paths),
    })
}

/// Paths of a notification worth rebuilding for, if any.
fn relevant_paths(event: &Event, ignored: &Path) -> Option<Vec<PathBuf>> {
    if matches!(event.kind, EventKind::Access(_)) {
        return None;
    }

    let paths: Vec<PathBuf> = event
        .paths
        .iter()
        .filter(|p| !p.starts_with(ignored) && !is_temp_file(p))
        .cloned()
        .collect();

    (!paths.is_empty()).then_some(paths)
}

/// Editor swap and backup files.
fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
        || name.starts_with(".#")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_content_change_is_relevant() {
        let ev = event(EventKind::Create(CreateKind::File), &["/site/events/a.md"]);
        assert_eq!(
            relevant_paths(&ev, Path::new("/site/docs")),
            Some(vec![PathBuf::from("/site/events/a.md")])
        );
    }

    #[test]
    fn test_output_and_temp_files_are_ignored() {
        let ev = event(
            EventKind::Modify(ModifyKind::Any),
            &["/site/docs/events.json", "/site/events/.a.md.swp", "/site/events/a.md~"],
        );
        assert_eq!(relevant_paths(&ev, Path::new("/site/docs")), None);
    }

    #[test]
    fn test_removals_are_reported_as_such() {
        let ev = event(EventKind::Remove(RemoveKind::File), &["/site/events/old.md"]);
        assert_eq!(
            signal_for(&ev, Path::new("/site/docs")),
            Some(WatchSignal::Removed(vec![PathBuf::from("/site/events/old.md")]))
        );
    }

    #[test]
    fn test_access_events_are_ignored() {
        let ev = event(EventKind::Access(AccessKind::Any), &["/site/events/a.md"]);
        assert_eq!(relevant_paths(&ev, Path::new("/site/docs")), None);
    }
}
