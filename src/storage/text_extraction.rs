//! Text Extraction Module
//!
//! Reads source files as UTF-8 and tags them with a language name derived
//! from the extension. Content is kept verbatim: chunks must reassemble into
//! the exact file.

use crate::error::{IndexError, Result};
use std::path::Path;

/// Read a file as text.
///
/// Missing, unreadable and non-UTF-8 files all surface as
/// `IndexError::FileRead`.
pub fn read_text(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(IndexError::file_read(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a regular file"),
        ));
    }
    std::fs::read_to_string(path).map_err(|e| IndexError::file_read(path, e))
}

/// Language label for a path, by extension
pub fn detect_language(path: &Path) -> &'static str {
    let extension = path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();

    match extension.as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" | "bash" | "zsh" | "fish" => "shell",
        "md" | "markdown" => "markdown",
        "rst" | "txt" | "log" => "text",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "html" | "htm" => "html",
        "css" | "scss" => "css",
        "sql" => "sql",
        _ => "unknown",
    }
}
