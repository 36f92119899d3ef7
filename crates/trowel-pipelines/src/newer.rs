//! Incremental skip check: only rebuild outputs older than their source.

use std::io;
use std::path::Path;

/// Whether `source` needs to be processed into `target`.
///
/// True when the target does not exist or the source modification time is
/// strictly newer than the target's. An unreadable source is an error.
pub fn is_newer(source: &Path, target: &Path) -> io::Result<bool> {
    let source_time = source.metadata()?.modified()?;

    let target_time = match target.metadata() {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };

    Ok(source_time > target_time)
}
