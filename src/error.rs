//! Rich diagnostic error types for cbz-pack.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. `CbzError` wraps them all so a
//! pipeline driver can use a single `?` chain without losing diagnostics.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::archive::ArchiveError;
pub use crate::collector::CollectError;
pub use crate::comic_info::ComicInfoError;
pub use crate::config::ConfigError;
pub use crate::raster::RasterError;

/// Top-level error type.
#[derive(Debug, Error, Diagnostic)]
pub enum CbzError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ComicInfo(#[from] ComicInfoError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for pipeline results.
pub type CbzResult<T> = std::result::Result<T, CbzError>;
