//! Fonts pipeline: TTF/OTF sources to WOFF, TTF sources to WOFF2.

use std::fs;
use std::path::Path;

use crate::pipeline::{
    write_output, FileOutcome, PipelineError, PipelineReport, Pipelines, Task,
};
use crate::woff::{self, FontError};

type Converter = fn(&[u8]) -> Result<Vec<u8>, FontError>;

/// Run both font passes. The task is done once both have finished.
pub fn run(pipelines: &Pipelines) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::new(Task::Fonts);
    let paths = pipelines.paths();
    let dest = pipelines.resolve(&paths.fonts_dest);

    convert_batch(pipelines, &mut report, &paths.fonts_src, &dest, "woff", woff::to_woff)?;
    convert_batch(
        pipelines,
        &mut report,
        &paths.fonts_woff2_src,
        &dest,
        "woff2",
        woff::to_woff2,
    )?;

    Ok(report)
}

fn convert_batch(
    pipelines: &Pipelines,
    report: &mut PipelineReport,
    pattern: &str,
    dest: &Path,
    extension: &str,
    convert: Converter,
) -> Result<(), PipelineError> {
    for font in pipelines.sources(pattern)? {
        let converted = fs::read(&font.path)
            .map_err(FontError::from)
            .and_then(|data| convert(&data));

        let outcome = match converted {
            Ok(bytes) => {
                write_output(&dest.join(font.relative.with_extension(extension)), &bytes)?;
                FileOutcome::Written(1)
            }
            Err(e) => FileOutcome::Failed(format!("{}: {}", font.path.display(), e)),
        };

        pipelines.record(report, outcome);
    }

    Ok(())
}
