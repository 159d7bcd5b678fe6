// FILE: src/core/bouncer.rs
//! The Bouncer: decides which paths under a root are worth indexing.
//!
//! A path is rejected when any ignore rule matches it:
//! 1. Plain rules are substrings of the root-relative path (`node_modules`)
//! 2. Rules with `*`, `?` or `[` are globs, tried against each path component
//!    and against the whole relative path (`*.min.js`, `docs/**/gen`)
//!
//! Files must additionally carry an allowlisted extension.

use crate::error::{IndexError, Result};
use glob::Pattern;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Bouncer {
    root: PathBuf,
    substrings: Vec<String>,
    globs: Vec<Pattern>,
    extensions: HashSet<String>,
}

impl Bouncer {
    pub fn new(root: &Path, ignore_patterns: &[String], extensions: &[String]) -> Result<Self> {
        let mut substrings = Vec::new();
        let mut globs = Vec::new();

        for rule in ignore_patterns {
            let rule = rule.trim();
            if rule.is_empty() { continue; }
            if rule.contains(['*', '?', '[']) {
                let pattern = Pattern::new(rule)
                    .map_err(|e| IndexError::Config(format!("Invalid ignore pattern '{}': {}", rule, e)))?;
                globs.push(pattern);
            } else {
                substrings.push(rule.to_string());
            }
        }

        let extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self { root: root.to_path_buf(), substrings, globs, extensions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if an ignore rule matches. The root itself is never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            return false;
        }

        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if self.substrings.iter().any(|s| rel_str.contains(s.as_str())) {
            return true;
        }

        if self.globs.is_empty() {
            return false;
        }
        if self.globs.iter().any(|g| g.matches(&rel_str)) {
            return true;
        }
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.globs.iter().any(|g| g.matches(&name))
        })
    }

    pub fn has_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Allowlisted extension and no matching ignore rule
    pub fn is_candidate(&self, path: &Path) -> bool {
        self.has_allowed_extension(path) && !self.is_ignored(path)
    }
}
