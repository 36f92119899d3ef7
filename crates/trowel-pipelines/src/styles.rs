//! Styles pipeline: SCSS compiled to one prefixed, compressed stylesheet.
//!
//! The source map covers the prefix and minify pass only. Its single source
//! is the concatenated CSS that grass produced, embedded as source content;
//! grass emits no maps, so positions never lead back to `.scss` files.

use std::fs;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::pipeline::{
    write_output, FileOutcome, PipelineError, PipelineReport, Pipelines, Task,
};

/// A finished stylesheet and its source map.
#[derive(Debug, Clone)]
pub struct CompiledCss {
    /// Minified CSS
    pub code: String,
    /// Source map JSON
    pub map: String,
}

/// Run the styles pipeline.
///
/// Entries that fail to compile are reported and left out of the bundle. If
/// none compile, the previous bundle is left in place.
pub fn run(pipelines: &Pipelines) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::new(Task::Styles);
    let bundle = pipelines.resolve(&pipelines.paths().styles_bundle);

    if let Some(dir) = bundle.parent() {
        fs::create_dir_all(dir).map_err(|e| PipelineError::Write {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    let mut entries = Vec::new();
    for pattern in &pipelines.paths().styles_src {
        entries.extend(pipelines.sources(pattern)?);
    }

    let mut css = String::new();
    let mut compiled = 0;

    for entry in &entries {
        match compile_scss(&entry.path) {
            Ok(out) => {
                css.push_str(&out);
                css.push('\n');
                compiled += 1;
            }
            Err(message) => pipelines.record(&mut report, FileOutcome::Failed(message)),
        }
    }

    if compiled == 0 {
        return Ok(report);
    }

    let file_name = bundle
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("style.min.css")
        .to_string();

    match process_css(&css, &file_name) {
        Ok(out) => {
            let map_path = bundle.with_file_name(format!("{}.map", file_name));
            let code = format!("{}\n/*# sourceMappingURL={}.map */\n", out.code, file_name);

            write_output(&bundle, code.as_bytes())?;
            write_output(&map_path, out.map.as_bytes())?;
            pipelines.record(&mut report, FileOutcome::Written(2));
        }
        Err(message) => pipelines.record(&mut report, FileOutcome::Failed(message)),
    }

    Ok(report)
}

/// Compile one SCSS entry to plain CSS. Imports resolve next to the entry.
pub fn compile_scss(path: &std::path::Path) -> Result<String, String> {
    let options = grass::Options::default().style(grass::OutputStyle::Expanded);

    grass::from_path(path, &options).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Prefix, minify and map a concatenated stylesheet.
///
/// The map's only source is `file_name`, with `css` as its content.
pub fn process_css(css: &str, file_name: &str) -> Result<CompiledCss, String> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: file_name.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| format!("CSS parse error: {}", e))?;

    stylesheet
        .minify(MinifyOptions {
            targets: browser_targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| format!("CSS minify error: {}", e))?;

    let mut map = SourceMap::new("/");
    map.add_source(file_name);
    map.set_source_content(0, css)
        .map_err(|e| format!("Source map error: {:?}", e))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: Some(&mut map),
            targets: browser_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| format!("CSS print error: {}", e))?;

    let map = map
        .to_json(None)
        .map_err(|e| format!("Source map error: {:?}", e))?;

    Ok(CompiledCss {
        code: printed.code,
        map,
    })
}

/// Browsers the vendor-prefixing pass targets.
fn browser_targets() -> Targets {
    Targets::from(Browsers {
        chrome: Some(version(109, 0)),
        edge: Some(version(120, 0)),
        firefox: Some(version(115, 0)),
        opera: Some(version(100, 0)),
        safari: Some(version(15, 6)),
        ios_saf: Some(version(15, 6)),
        samsung: Some(version(23, 0)),
        ..Browsers::default()
    })
}

const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}
