//! Pages pipeline: single-level component includes.
//!
//! Two directive forms are recognised:
//!
//! - `@@header` resolves to `<components>/header.html`
//! - `@@include('partials/nav.html')` resolves the quoted path against the
//!   components directory
//!
//! Included content is inserted verbatim and never scanned again, so a
//! directive inside a component stays literal in the output.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::pipeline::{
    write_output, FileOutcome, PipelineError, PipelineReport, Pipelines, Task,
};

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"@@include\(\s*(?:'([^']+)'|"([^"]+)")\s*\)|@@([A-Za-z0-9_-]+(?:/[A-Za-z0-9_-]+)*)"#,
    )
    .expect("include directive pattern is valid")
});

/// Errors from expanding include directives.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Component '{name}' not found at {}", .path.display())]
    NotFound { name: String, path: PathBuf },

    #[error("Failed to read component {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

/// Run the pages pipeline.
pub fn run(pipelines: &Pipelines) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::new(Task::Pages);
    let paths = pipelines.paths();
    let components = pipelines.resolve(&paths.components_dir);
    let dest = pipelines.resolve(&paths.pages_dest);

    for page in pipelines.sources(&paths.pages_src)? {
        let source = match fs::read_to_string(&page.path) {
            Ok(s) => s,
            Err(e) => {
                pipelines.record(
                    &mut report,
                    FileOutcome::Failed(format!("{}: {}", page.path.display(), e)),
                );
                continue;
            }
        };

        match expand_includes(&source, &components) {
            Ok(html) => {
                write_output(&dest.join(&page.relative), html.as_bytes())?;
                pipelines.record(&mut report, FileOutcome::Written(1));
            }
            Err(e) => pipelines.record(
                &mut report,
                FileOutcome::Failed(format!("{}: {}", page.path.display(), e)),
            ),
        }
    }

    Ok(report)
}

/// Replace every include directive in `source` with its component.
pub fn expand_includes(source: &str, components: &Path) -> Result<String, IncludeError> {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;

    for caps in DIRECTIVE.captures_iter(source) {
        let Some(whole) = caps.get(0) else {
            continue;
        };

        out.push_str(&source[last..whole.start()]);
        out.push_str(&load_component(&caps, components)?);
        last = whole.end();
    }

    out.push_str(&source[last..]);
    Ok(out)
}

fn load_component(caps: &Captures<'_>, components: &Path) -> Result<String, IncludeError> {
    let (name, path) = if let Some(quoted) = caps.get(1).or_else(|| caps.get(2)) {
        (quoted.as_str(), components.join(quoted.as_str()))
    } else {
        let name = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        (name, components.join(format!("{}.html", name)))
    };

    if !path.is_file() {
        return Err(IncludeError::NotFound {
            name: name.to_string(),
            path,
        });
    }

    fs::read_to_string(&path).map_err(|e| IncludeError::Read {
        message: e.to_string(),
        path,
    })
}
