//! Release bundle: clear the distribution directory, then copy artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::PathTable;
use crate::source;

/// Errors from cleaning or assembling the distribution directory.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Failed to remove {}: {source}", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid release pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of assembling the distribution directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    /// Files copied
    pub copied: usize,

    /// Release patterns that matched nothing
    pub empty_patterns: Vec<String>,

    /// Distribution directory
    pub output_dir: PathBuf,
}

/// Remove the distribution directory.
///
/// Returns whether anything was removed. A directory that does not exist is
/// not an error.
pub fn clean(dist: &Path) -> Result<bool, BundleError> {
    match fs::remove_dir_all(dist) {
        Ok(()) => {
            tracing::info!("Removed {}", dist.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Nothing to clean at {}", dist.display());
            Ok(false)
        }
        Err(e) => Err(BundleError::Clean {
            path: dist.to_path_buf(),
            source: e,
        }),
    }
}

/// Copy the release artifacts into the distribution directory.
///
/// Patterns are relative to the serving root and keep their paths under it.
/// A pattern without matches is recorded, not treated as a failure.
pub fn release(root: &Path, paths: &PathTable) -> Result<BundleReport, BundleError> {
    let base = root.join(&paths.serve_root);
    let dist = root.join(&paths.dist_dir);

    let mut report = BundleReport {
        output_dir: dist.clone(),
        ..BundleReport::default()
    };

    for pattern in &paths.release {
        let files = source::expand(&base, pattern).map_err(|e| BundleError::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?;

        if files.is_empty() {
            tracing::debug!("No files for release pattern {}", pattern);
            report.empty_patterns.push(pattern.clone());
            continue;
        }

        for file in files {
            let relative = file.path.strip_prefix(&base).unwrap_or(&file.relative);
            let target = dist.join(relative);
            copy_file(&file.path, &target)?;
            report.copied += 1;
        }
    }

    Ok(report)
}

fn copy_file(from: &Path, to: &Path) -> Result<(), BundleError> {
    let copy_error = |source| BundleError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(copy_error)?;
    }

    fs::copy(from, to).map_err(copy_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, relative).unwrap();
    }

    #[test]
    fn cleaning_missing_directory_succeeds() {
        let temp = tempdir().unwrap();
        assert!(!clean(&temp.path().join("dist")).unwrap());
    }

    #[test]
    fn cleaning_removes_previous_contents() {
        let temp = tempdir().unwrap();
        write(temp.path(), "dist/old/stale.html");

        assert!(clean(&temp.path().join("dist")).unwrap());
        assert!(!temp.path().join("dist").exists());
    }

    #[test]
    fn copies_only_release_artifacts() {
        let temp = tempdir().unwrap();
        for file in [
            "app/css/style.min.css",
            "app/css/style.min.css.map",
            "app/images/hero/banner.avif",
            "app/images/hero/banner.webp",
            "app/images/src/hero/banner.png",
            "app/fonts/body.woff",
            "app/fonts/body.woff2",
            "app/fonts/src/body.ttf",
            "app/js/main.js",
            "app/js/main.min.js",
            "app/js/main.min.js.map",
            "app/index.html",
            "app/pages/index.html",
        ] {
            write(temp.path(), file);
        }

        let report = release(temp.path(), &PathTable::default()).unwrap();
        let dist = temp.path().join("dist");

        assert_eq!(report.copied, 9);
        assert!(report.empty_patterns.is_empty());
        assert!(dist.join("css/style.min.css").exists());
        assert!(dist.join("images/hero/banner.avif").exists());
        assert!(dist.join("images/hero/banner.webp").exists());
        assert!(dist.join("fonts/body.woff2").exists());
        assert!(dist.join("js/main.min.js").exists());
        assert!(dist.join("index.html").exists());
        assert!(!dist.join("pages").exists());
        assert!(!dist.join("images/src").exists());
        assert!(dist.join("css/style.min.css.map").exists());
        assert!(dist.join("js/main.min.js.map").exists());
        assert!(!dist.join("js/main.js").exists());
    }

    #[test]
    fn missing_images_do_not_block_release() {
        let temp = tempdir().unwrap();
        write(temp.path(), "app/css/style.min.css");
        write(temp.path(), "app/js/main.min.js");
        write(temp.path(), "app/index.html");

        let report = release(temp.path(), &PathTable::default()).unwrap();

        assert_eq!(report.copied, 3);
        assert_eq!(
            report.empty_patterns,
            vec![
                "css/style.min.css.map",
                "images/**/*.{svg,webp,avif}",
                "fonts/*.{woff,woff2}",
                "js/main.min.js.map",
            ]
        );
        assert!(temp.path().join("dist/css/style.min.css").exists());
        assert!(temp.path().join("dist/index.html").exists());
    }
}
