//! Asset pipelines for trowel.
//!
//! Each asset category (images, fonts, scripts, styles, pages) has its own
//! pipeline that expands a source glob, runs every file through an ordered
//! chain of transformations and writes the results to a fixed destination.
//! The release bundle copies the finished artifacts into the distribution
//! directory.

pub mod bundle;
pub mod fonts;
pub mod images;
pub mod newer;
pub mod notify;
pub mod pages;
pub mod paths;
pub mod pipeline;
pub mod scripts;
pub mod source;
pub mod styles;
pub mod woff;

pub use bundle::{clean, release, BundleError, BundleReport};
pub use notify::{LogNotifier, Notifier};
pub use paths::PathTable;
pub use pipeline::{FileOutcome, PipelineError, PipelineReport, Pipelines, Task};
pub use source::{expand, SourceFile};
