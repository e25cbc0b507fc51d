//! CBZ container conventions shared by the reader and the writer.
//!
//! A CBZ is a plain ZIP. Page entries are any file whose name ends in a
//! known raster extension (case-insensitive) outside `__MACOSX/`; an optional
//! `ComicInfo.xml` at the root carries the metadata sidecar.

pub mod error;
pub mod reader;
pub mod writer;

use std::path::{Path, PathBuf};

use crate::model::ArchiveId;

pub use error::{ArchiveError, ArchiveResult};
pub use reader::{ReadOptions, SkippedPage, SourceFingerprint, UnpackedArchive, fingerprint, read};
pub use writer::{WriteOptions, write};

/// Raster extensions that qualify an entry as a page.
pub const PAGE_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".webp", ".bmp", ".gif", ".tiff"];

/// Resource-fork junk written by macOS archivers.
const MACOS_JUNK_PREFIX: &str = "__MACOSX/";

/// Default suffix appended to the source stem when deriving an output name.
pub const DEFAULT_SUFFIX: &str = "_processed";

/// Whether an in-archive entry name is a page image.
pub fn is_page_entry(name: &str) -> bool {
    if name.starts_with(MACOS_JUNK_PREFIX) {
        return false;
    }
    let lower = name.to_lowercase();
    PAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Whether a filesystem path carries the `.cbz` suffix (case-insensitive).
pub fn has_cbz_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("cbz"))
}

/// Append `.cbz` to a bare output path that lacks it.
pub fn with_cbz_extension(path: &Path) -> PathBuf {
    if has_cbz_extension(path) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".cbz");
        PathBuf::from(name)
    }
}

/// Rule for deriving an output archive path from an [`ArchiveId`]:
/// `{output_dir}/{source stem}{suffix}.cbz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    /// Target directory; `None` means the source archive's own directory.
    pub output_dir: Option<PathBuf>,
    pub suffix: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            output_dir: None,
            suffix: DEFAULT_SUFFIX.into(),
        }
    }
}

impl OutputNaming {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Output path for the archive identified by `id`.
    pub fn output_path(&self, id: &ArchiveId) -> PathBuf {
        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => id
                .source_path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        dir.join(format!("{}{}.cbz", id.stem(), self.suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_entry_rules() {
        assert!(is_page_entry("001.jpg"));
        assert!(is_page_entry("chapter1/002.PNG"));
        assert!(is_page_entry("cover.Tiff"));
        assert!(!is_page_entry("ComicInfo.xml"));
        assert!(!is_page_entry("__MACOSX/._001.jpg"));
        assert!(!is_page_entry("notes.txt"));
        assert!(!is_page_entry("scan.tif"));
        assert!(!is_page_entry("images/"));
    }

    #[test]
    fn cbz_extension() {
        assert!(has_cbz_extension(Path::new("/a/vol1.CBZ")));
        assert!(!has_cbz_extension(Path::new("/a/vol1.zip")));
        assert_eq!(
            with_cbz_extension(Path::new("/out/result")),
            PathBuf::from("/out/result.cbz")
        );
        assert_eq!(
            with_cbz_extension(Path::new("/out/result.cbz")),
            PathBuf::from("/out/result.cbz")
        );
    }

    #[test]
    fn output_path_defaults_to_source_dir() {
        let id = ArchiveId::from_path(Path::new("/comics/saga/vol1.cbz"));
        let naming = OutputNaming::default();
        assert_eq!(
            naming.output_path(&id),
            PathBuf::from("/comics/saga/vol1_processed.cbz")
        );
    }

    #[test]
    fn output_path_honours_dir_and_suffix() {
        let id = ArchiveId::from_path(Path::new("/comics/saga/vol1.cbz"));
        let naming = OutputNaming {
            output_dir: Some(PathBuf::from("/out")),
            suffix: "_x2".into(),
        };
        assert_eq!(naming.output_path(&id), PathBuf::from("/out/vol1_x2.cbz"));
    }
}
