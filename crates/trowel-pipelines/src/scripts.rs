//! Scripts pipeline: concatenate entries into one minified bundle.

use std::fs;
use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::pipeline::{
    write_output, FileOutcome, PipelineError, PipelineReport, Pipelines, Task,
};

/// A minified bundle and its source map.
#[derive(Debug, Clone)]
pub struct MinifiedScript {
    /// Minified JavaScript
    pub code: String,
    /// Source map JSON, when the code generator produced one
    pub map: Option<String>,
}

/// Run the scripts pipeline.
pub fn run(pipelines: &Pipelines) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::new(Task::Scripts);

    let mut entries = Vec::new();
    for pattern in &pipelines.paths().scripts_src {
        entries.extend(pipelines.sources(pattern)?);
    }

    let mut bundle_source = String::new();
    let mut names = Vec::new();

    for entry in &entries {
        match fs::read_to_string(&entry.path) {
            Ok(source) => {
                bundle_source.push_str(&source);
                bundle_source.push_str("\n;\n");
                names.push(entry.stem().to_string());
            }
            Err(e) => pipelines.record(
                &mut report,
                FileOutcome::Failed(format!("{}: {}", entry.path.display(), e)),
            ),
        }
    }

    if names.is_empty() {
        return Ok(report);
    }

    let bundle = pipelines.resolve(&pipelines.paths().scripts_bundle);
    let file_name = bundle
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("main.min.js")
        .to_string();

    match minify(&bundle_source, &format!("{}.js", names.join("+"))) {
        Ok(out) => {
            let mut code = out.code;
            let mut written = 1;
            if let Some(map) = out.map {
                let map_path = bundle.with_file_name(format!("{}.map", file_name));
                write_output(&map_path, map.as_bytes())?;
                code.push_str(&format!("\n//# sourceMappingURL={}.map\n", file_name));
                written += 1;
            }
            write_output(&bundle, code.as_bytes())?;
            pipelines.record(&mut report, FileOutcome::Written(written));
        }
        Err(message) => pipelines.record(&mut report, FileOutcome::Failed(message)),
    }

    Ok(report)
}

/// Parse, compress, mangle and print a script.
///
/// `source_name` is the name recorded in the source map.
pub fn minify(source: &str, source_name: &str) -> Result<MinifiedScript, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if let Some(error) = parsed.errors.first() {
        return Err(format!("{}: {}", source_name, error));
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let printed = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(PathBuf::from(source_name)),
            ..CodegenOptions::minify()
        })
        .with_scoping(minified.scoping)
        .build(&program);

    Ok(MinifiedScript {
        code: printed.code,
        map: printed.map.map(|m| m.to_json_string()),
    })
}
