//! Directory scanner
//!
//! Walks a root lazily; ignored directories are pruned before descending.
//! Call `scan()` again for a fresh pass.

use crate::core::Bouncer;
use std::path::PathBuf;
use walkdir::WalkDir;

pub struct Scanner {
    bouncer: Bouncer,
}

impl Scanner {
    pub fn new(bouncer: Bouncer) -> Self {
        Self { bouncer }
    }

    pub fn bouncer(&self) -> &Bouncer {
        &self.bouncer
    }

    /// Candidate files under the root, as absolute paths when the root is.
    pub fn scan(&self) -> impl Iterator<Item = PathBuf> + '_ {
        WalkDir::new(self.bouncer.root())
            .follow_links(false)
            .into_iter()
            .filter_entry(move |e| {
                if e.path_is_symlink() { return false; }
                !self.bouncer.is_ignored(e.path())
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("[Scanner] Walk error: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(move |path| self.bouncer.has_allowed_extension(path))
    }
}
