//! Core data types shared by the reader, the collector and the writer.
//!
//! A CBZ archive is decomposed into an ordered list of [`Page`]s plus one
//! [`ComicMetadata`] record. Every page travels with the [`ArchiveId`] of the
//! archive it came from so that independent transforms can hand pages back
//! one at a time and still be regrouped into whole archives.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use crate::comic_info::ComicMetadata;

/// Opaque identity of "all pages that came from the same source archive".
///
/// Derived from the absolutized source path, never from content, so reading
/// the same path twice yields the same id (within and across runs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(PathBuf);

impl ArchiveId {
    /// Derive the id for an archive path.
    ///
    /// Relative paths are resolved against the current directory. If that
    /// fails (e.g. the cwd was removed) the path is used as given.
    pub fn from_path(path: &Path) -> Self {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Self(absolute)
    }

    /// The source archive path this id was derived from.
    pub fn source_path(&self) -> &Path {
        &self.0
    }

    /// Source file name without its extension (`"vol1"` for `/a/vol1.cbz`).
    pub fn stem(&self) -> String {
        self.0
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Decoded raster data in the host tensor layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// RGB samples in `[0.0, 1.0]`, shape `(1, height, width, 3)`.
    pub pixels: Array4<f32>,
    /// Opacity complement (`1.0 - alpha`), shape `(height, width)`.
    /// All zeros when the source had no alpha channel.
    pub mask: Array2<f32>,
}

impl PageImage {
    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.pixels.shape()[1]
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.pixels.shape()[2]
    }
}

/// One decoded page plus its in-archive filename.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Posix-style path relative to the archive root; may contain directories.
    pub filename: String,
    pub image: PageImage,
}

impl Page {
    pub fn new(filename: impl Into<String>, image: PageImage) -> Self {
        Self {
            filename: filename.into(),
            image,
        }
    }
}

/// A whole archive's worth of pages, ready to be written out.
///
/// Produced by the collector; immutable once produced.
#[derive(Debug, Clone)]
pub struct AssembledUnit {
    pub id: ArchiveId,
    /// Pages in arrival order.
    pub pages: Vec<Page>,
    /// Metadata of the first page received for this archive.
    pub metadata: ComicMetadata,
    /// Where the writer will put the archive unless told otherwise.
    pub output_path: PathBuf,
}

impl AssembledUnit {
    /// Number of pages in the unit.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the unit holds no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// In-archive filenames in page order.
    pub fn filenames(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.filename.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_id_is_path_derived() {
        let a = ArchiveId::from_path(Path::new("/comics/vol1.cbz"));
        let b = ArchiveId::from_path(Path::new("/comics/vol1.cbz"));
        let c = ArchiveId::from_path(Path::new("/comics/vol2.cbz"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.stem(), "vol1");
    }

    #[test]
    fn relative_paths_are_absolutized() {
        let id = ArchiveId::from_path(Path::new("relative/vol1.cbz"));
        assert!(id.source_path().is_absolute());
        assert!(id.source_path().ends_with("relative/vol1.cbz"));
    }

    #[test]
    fn page_image_dimensions() {
        let image = PageImage {
            pixels: Array4::zeros((1, 4, 7, 3)),
            mask: Array2::zeros((4, 7)),
        };
        assert_eq!(image.height(), 4);
        assert_eq!(image.width(), 7);
    }
}
