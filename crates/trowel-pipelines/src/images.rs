//! Images pipeline: SVGs copied as is, rasters encoded to lossy AVIF and WebP.
//!
//! Each raster is read once and fanned out to both encoders. Every output has
//! its own "newer than destination" check, so a missing WebP is rebuilt even
//! when the AVIF next to it is current. A raster with all outputs current is
//! never decoded.

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::avif::AvifEncoder;
use image::{DynamicImage, ImageReader};
use rayon::prelude::*;

use crate::newer::is_newer;
use crate::pipeline::{
    write_output, FileOutcome, PipelineError, PipelineReport, Pipelines, Task,
};
use crate::source::SourceFile;

const AVIF_QUALITY: u8 = 50;
const AVIF_SPEED: u8 = 6;
const WEBP_QUALITY: f32 = 75.0;

/// Output encodings produced for every raster source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Avif,
    WebP,
}

impl Encoding {
    pub const ALL: [Encoding; 2] = [Encoding::Avif, Encoding::WebP];

    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Avif => "avif",
            Encoding::WebP => "webp",
        }
    }

    /// Encode an image into this format.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, String> {
        match self {
            Encoding::Avif => {
                let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
                let mut out = Vec::new();
                rgba.write_with_encoder(AvifEncoder::new_with_speed_quality(
                    &mut out,
                    AVIF_SPEED,
                    AVIF_QUALITY,
                ))
                .map_err(|e| e.to_string())?;
                Ok(out)
            }
            Encoding::WebP => {
                // libwebp only takes 8-bit RGB or RGBA
                let pixels = if image.color().has_alpha() {
                    DynamicImage::ImageRgba8(image.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                };
                let encoder = webp::Encoder::from_image(&pixels).map_err(|e| e.to_string())?;
                Ok(encoder.encode(WEBP_QUALITY).to_vec())
            }
        }
    }
}

/// Run the images pipeline over the whole source tree in parallel.
pub fn run(pipelines: &Pipelines) -> Result<PipelineReport, PipelineError> {
    let mut report = PipelineReport::new(Task::Images);
    let dest = pipelines.resolve(&pipelines.paths().images_dest);
    let sources = pipelines.sources(&pipelines.paths().images_src)?;

    let outcomes: Vec<Result<FileOutcome, PipelineError>> = sources
        .par_iter()
        .map(|source| process(source, &dest))
        .collect();

    for outcome in outcomes {
        pipelines.record(&mut report, outcome?);
    }

    Ok(report)
}

fn process(source: &SourceFile, dest: &Path) -> Result<FileOutcome, PipelineError> {
    let target = dest.join(&source.relative);

    if source.extension() == "svg" {
        return copy_svg(source, &target);
    }

    let mut pending: Vec<(Encoding, PathBuf)> = Vec::new();
    for encoding in Encoding::ALL {
        let output = target.with_extension(encoding.extension());
        match is_newer(&source.path, &output) {
            Ok(true) => pending.push((encoding, output)),
            Ok(false) => {}
            Err(e) => return Ok(failed(source, e)),
        }
    }

    if pending.is_empty() {
        return Ok(FileOutcome::Skipped);
    }

    let image = match decode(&source.path) {
        Ok(image) => image,
        Err(e) => return Ok(failed(source, e)),
    };

    let mut written = 0;
    for (encoding, output) in pending {
        match encoding.encode(&image) {
            Ok(bytes) => {
                write_output(&output, &bytes)?;
                written += 1;
            }
            Err(e) => return Ok(failed(source, e)),
        }
    }

    Ok(FileOutcome::Written(written))
}

fn copy_svg(source: &SourceFile, target: &Path) -> Result<FileOutcome, PipelineError> {
    match is_newer(&source.path, target) {
        Ok(false) => Ok(FileOutcome::Skipped),
        Ok(true) => match fs::read(&source.path) {
            Ok(bytes) => {
                write_output(target, &bytes)?;
                Ok(FileOutcome::Written(1))
            }
            Err(e) => Ok(failed(source, e)),
        },
        Err(e) => Ok(failed(source, e)),
    }
}

fn decode(path: &Path) -> Result<DynamicImage, image::ImageError> {
    ImageReader::open(path)?.with_guessed_format()?.decode()
}

fn failed(source: &SourceFile, error: impl Display) -> FileOutcome {
    FileOutcome::Failed(format!("{}: {}", source.path.display(), error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::RecordingNotifier;
    use crate::paths::PathTable;
    use filetime::{set_file_mtime, FileTime};
    use image::RgbImage;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn pipelines(root: &Path) -> (Pipelines, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::new());
        let pipelines = Pipelines::new(root, PathTable::default(), notifier.clone());
        (pipelines, notifier)
    }

    fn write_png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(4, 4, image::Rgb([200, 40, 40]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn encodes_rasters_and_copies_svgs() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("app/images/src");
        write_png(&src.join("hero/banner.png"));
        fs::write(src.join("icon.svg"), "<svg/>").unwrap();

        let (pipelines, _) = pipelines(temp.path());
        let report = pipelines.run(Task::Images).unwrap();

        let out = temp.path().join("app/images");
        assert_eq!(report.written, 3);
        assert_eq!(fs::read_to_string(out.join("icon.svg")).unwrap(), "<svg/>");
        let webp = fs::read(out.join("hero/banner.webp")).unwrap();
        assert_eq!(&webp[0..4], b"RIFF");
        assert_eq!(&webp[12..16], b"VP8 ");
        let avif = fs::read(out.join("hero/banner.avif")).unwrap();
        assert_eq!(&avif[4..8], b"ftyp");
        assert!(!out.join("hero/banner.png").exists());
    }

    #[test]
    fn current_outputs_are_left_untouched() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("app/images/src/photo.jpg");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        RgbImage::new(2, 2).save(&source).unwrap();

        let out = temp.path().join("app/images");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("photo.avif"), "existing avif").unwrap();
        fs::write(out.join("photo.webp"), "existing webp").unwrap();

        let time = FileTime::from_unix_time(1_700_000_000, 0);
        set_file_mtime(&source, time).unwrap();
        set_file_mtime(out.join("photo.avif"), time).unwrap();
        set_file_mtime(out.join("photo.webp"), FileTime::from_unix_time(1_700_000_500, 0)).unwrap();

        let (pipelines, _) = pipelines(temp.path());
        let report = pipelines.run(Task::Images).unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.written, 0);
        assert_eq!(fs::read_to_string(out.join("photo.avif")).unwrap(), "existing avif");
        assert_eq!(fs::read_to_string(out.join("photo.webp")).unwrap(), "existing webp");
    }

    #[test]
    fn each_encoding_has_its_own_skip_check() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("app/images/src/photo.png");
        write_png(&source);

        let out = temp.path().join("app/images");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("photo.avif"), "existing avif").unwrap();
        set_file_mtime(&source, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
        set_file_mtime(out.join("photo.avif"), FileTime::from_unix_time(1_700_000_100, 0)).unwrap();

        let (pipelines, _) = pipelines(temp.path());
        let report = pipelines.run(Task::Images).unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(fs::read_to_string(out.join("photo.avif")).unwrap(), "existing avif");
        assert_eq!(&fs::read(out.join("photo.webp")).unwrap()[0..4], b"RIFF");
    }

    #[test]
    fn undecodable_image_is_reported_and_batch_continues() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("app/images/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("broken.png"), "not a png").unwrap();
        fs::write(src.join("logo.svg"), "<svg/>").unwrap();

        let (pipelines, notifier) = pipelines(temp.path());
        let report = pipelines.run(Task::Images).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.written, 1);
        assert!(notifier.messages(Task::Images)[0].contains("broken.png"));
        assert!(temp.path().join("app/images/logo.svg").exists());
    }
}
