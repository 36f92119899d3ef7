//! Glob expansion into batches of source files.
//!
//! A pattern is matched against paths relative to the project root, with
//! forward slashes. `*` never crosses a directory separator, `**` does. Each
//! matched file also carries its path relative to the pattern's base (the
//! longest literal directory prefix), which is what pipelines preserve when
//! they mirror a source tree into a destination.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder};
use walkdir::WalkDir;

/// A file matched by a source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path on disk
    pub path: PathBuf,

    /// Path relative to the pattern base
    pub relative: PathBuf,
}

impl SourceFile {
    /// Lowercased file extension, empty if there is none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase()
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output")
    }
}

/// Compile a pattern with the separator rules used across trowel.
pub fn glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(normalize(pattern))
        .literal_separator(true)
        .build()
}

/// The literal directory a pattern starts from.
///
/// `app/images/src/**/*.png` has base `app/images/src`; a fully literal
/// pattern like `app/js/main.js` has its parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let parts: Vec<&str> = normalize(pattern)
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();

    let mut base = PathBuf::new();
    for (i, part) in parts.iter().enumerate() {
        if is_glob_part(part) || i + 1 == parts.len() {
            break;
        }
        base.push(part);
    }
    base
}

/// Expand a pattern relative to `root` into the files it matches.
///
/// A missing base directory yields an empty batch rather than an error.
/// Results are sorted by path so batches are processed in a stable order.
pub fn expand(root: &Path, pattern: &str) -> Result<Vec<SourceFile>, globset::Error> {
    let matcher = glob(pattern)?.compile_matcher();
    let base = root.join(glob_base(pattern));

    if !base.is_dir() {
        tracing::debug!("No source directory at {}", base.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(&base)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(from_root) = path.strip_prefix(root) else {
            continue;
        };

        if !matcher.is_match(slash_path(from_root)) {
            continue;
        }

        files.push(SourceFile {
            path: path.to_path_buf(),
            relative: path.strip_prefix(&base).unwrap_or(path).to_path_buf(),
        });
    }

    Ok(files)
}

/// Render a relative path with forward slashes, the form patterns match against.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(pattern: &str) -> &str {
    pattern.trim_start_matches("./")
}

fn is_glob_part(part: &str) -> bool {
    part.contains(['*', '?', '[', '{'])
}
