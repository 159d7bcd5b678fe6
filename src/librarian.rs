// FILE: src/librarian.rs
//! The Librarian: keeps the index in step with the filesystem.
//!
//! A `Watcher` turns filesystem notifications into `FileEvent`s on a channel.
//! One update task drains that channel and feeds each event through the
//! indexer, so the event source never waits on embedding or storage.

use crate::core::Bouncer;
use crate::engine::indexer::Indexer;
use crate::error::Result;
use crate::state::{FileEvent, SharedState};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Called after each event has been applied to the index
pub type ChangeCallback = Arc<dyn Fn(&FileEvent) + Send + Sync>;

/// Source of filesystem events for one root
pub trait Watcher: Send {
    /// Start delivering events under `bouncer.root()`; only candidates of
    /// `bouncer` should be sent.
    fn watch(&mut self, bouncer: Bouncer, events: mpsc::UnboundedSender<FileEvent>) -> Result<()>;

    fn unwatch(&mut self) -> Result<()>;
}

/// `notify`-backed watcher (inotify, FSEvents, ReadDirectoryChanges)
#[derive(Default)]
pub struct NotifyWatcher {
    inner: Option<RecommendedWatcher>,
}

impl NotifyWatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Watcher for NotifyWatcher {
    fn watch(&mut self, bouncer: Bouncer, events: mpsc::UnboundedSender<FileEvent>) -> Result<()> {
        let root = bouncer.root().to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for file_event in translate_event(&event, &bouncer) {
                        tracing::debug!("[Librarian] {:?}", file_event);
                        if events.send(file_event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::warn!("[Librarian] Watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::info!("[Librarian] Watching {}", root.display());

        self.inner = Some(watcher);
        Ok(())
    }

    fn unwatch(&mut self) -> Result<()> {
        // Dropping the watcher closes the subscription and the sender it owns
        self.inner.take();
        Ok(())
    }
}

/// Map a raw notification to zero or more candidate events.
pub fn translate_event(event: &Event, bouncer: &Bouncer) -> Vec<FileEvent> {
    let mut out = Vec::new();
    for path in &event.paths {
        if bouncer.is_ignored(path) || !bouncer.has_allowed_extension(path) || path.is_symlink() {
            continue;
        }
        match event.kind {
            EventKind::Create(_) => {
                if path.is_file() {
                    out.push(FileEvent::Added(path.clone()));
                }
            }
            EventKind::Modify(_) => {
                if path.is_file() {
                    out.push(FileEvent::Changed(path.clone()));
                } else if !path.exists() {
                    // Rename away from this name
                    out.push(FileEvent::Removed(path.clone()));
                }
            }
            EventKind::Remove(_) => out.push(FileEvent::Removed(path.clone())),
            _ => {}
        }
    }
    out
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Librarian {
    watcher: Box<dyn Watcher>,
    running: Option<Running>,
}

impl Librarian {
    pub fn new(watcher: Box<dyn Watcher>) -> Self {
        Self { watcher, running: None }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Subscribe to `bouncer.root()` and spawn the update task.
    /// A previous subscription is stopped first.
    pub async fn start(&mut self, state: SharedState, bouncer: Bouncer, on_change: Option<ChangeCallback>) -> Result<()> {
        self.stop().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.watcher.watch(bouncer, tx)?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::update_loop(state, rx, cancel.clone(), on_change));
        self.running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Unsubscribe and wait for the update task. The event being applied, if
    /// any, is finished; queued events are dropped.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let unwatched = self.watcher.unwatch();
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!("[Librarian] Update task failed: {}", e);
        }
        tracing::info!("[Librarian] Stopped watching");
        unwatched
    }

    async fn update_loop(
        state: SharedState,
        mut events: mpsc::UnboundedReceiver<FileEvent>,
        cancel: CancellationToken,
        on_change: Option<ChangeCallback>,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Err(e) = Self::apply(&state, &event).await {
                tracing::error!("[Librarian] Failed to apply {:?}: {}", event, e);
            }
            if let Some(callback) = &on_change {
                callback(&event);
            }
        }
        tracing::debug!("[Librarian] Update task exiting");
    }

    /// Run one event through the indexer.
    pub async fn apply(state: &SharedState, event: &FileEvent) -> Result<()> {
        match event {
            FileEvent::Added(path) | FileEvent::Changed(path) => {
                Indexer::index_file(state, path, None).await?;
            }
            FileEvent::Removed(path) => {
                Indexer::remove_file(state, Path::new(path)).await?;
            }
        }
        Ok(())
    }
}
