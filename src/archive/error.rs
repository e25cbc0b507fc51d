//! Rich diagnostic error types for reading and writing archives.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from archive I/O.
#[derive(Debug, Error, Diagnostic)]
pub enum ArchiveError {
    #[error("archive not found: \"{path}\"")]
    #[diagnostic(
        code(cbz::archive::not_found),
        help("Check the path. Relative paths are resolved against the current directory.")
    )]
    NotFound { path: String },

    #[error("unsupported extension: \"{path}\"")]
    #[diagnostic(
        code(cbz::archive::unsupported_extension),
        help("Only .cbz files are accepted. Rename the file if it is a ZIP of page images.")
    )]
    UnsupportedExtension { path: String },

    #[error("invalid CBZ archive \"{path}\": {message}")]
    #[diagnostic(
        code(cbz::archive::invalid_format),
        help(
            "The file must be a valid ZIP containing at least one readable \
             .jpg/.jpeg/.png/.webp/.bmp/.gif/.tiff page."
        )
    )]
    InvalidFormat { path: String, message: String },

    #[error("cannot write archive for {id}: unit has no pages")]
    #[diagnostic(
        code(cbz::archive::empty_unit),
        help("Every page of this archive was dropped upstream; nothing to write.")
    )]
    EmptyUnit { id: String },

    #[error("cannot encode page \"{filename}\": {message}")]
    #[diagnostic(code(cbz::archive::encode))]
    Encode { filename: String, message: String },

    #[error("I/O error on \"{path}\": {source}")]
    #[diagnostic(
        code(cbz::archive::io),
        help("A filesystem operation failed. Check paths, permissions and free space.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience alias for archive operation results.
pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;
