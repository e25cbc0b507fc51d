//! Archive reader: CBZ path → ordered pages + metadata + [`ArchiveId`].
//!
//! Entries are filtered to page images, optionally sorted by name, then the
//! start offset and load cap are applied, in that order. A page that cannot
//! be read or decoded is skipped with a warning; the read only fails if no
//! page survives. A broken sidecar never fails the read.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::{has_cbz_extension, is_page_entry};
use crate::comic_info::{COMIC_INFO_ENTRY, ComicMetadata};
use crate::model::{ArchiveId, Page};
use crate::raster;

/// Page selection options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Maximum number of pages to load (0 = unlimited).
    pub image_load_cap: usize,
    /// Pages before this 0-based index are skipped.
    pub start_index: usize,
    /// Sort entries by in-archive filename before offset/cap.
    pub sort_images: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            image_load_cap: 0,
            start_index: 0,
            sort_images: true,
        }
    }
}

/// A page entry that was selected but could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPage {
    pub filename: String,
    pub reason: String,
}

/// Everything read from one archive.
#[derive(Debug, Clone)]
pub struct UnpackedArchive {
    pub id: ArchiveId,
    pub pages: Vec<Page>,
    pub metadata: ComicMetadata,
    /// Selected entries that failed to load, in selection order.
    pub skipped: Vec<SkippedPage>,
}

impl UnpackedArchive {
    pub fn filenames(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.filename.as_str()).collect()
    }
}

/// Pick the page entries to load from the archive's entry names.
pub fn select_entries<I, S>(names: I, options: &ReadOptions) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut entries: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|n| is_page_entry(n))
        .collect();

    if options.sort_images {
        entries.sort();
    }

    let selected = entries.into_iter().skip(options.start_index);
    if options.image_load_cap > 0 {
        selected.take(options.image_load_cap).collect()
    } else {
        selected.collect()
    }
}

/// Read and decode a CBZ archive.
pub fn read(path: &Path, options: &ReadOptions) -> ArchiveResult<UnpackedArchive> {
    if !path.exists() {
        return Err(ArchiveError::NotFound {
            path: path.display().to_string(),
        });
    }
    if !has_cbz_extension(path) {
        return Err(ArchiveError::UnsupportedExtension {
            path: path.display().to_string(),
        });
    }

    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| ArchiveError::InvalidFormat {
        path: path.display().to_string(),
        message: format!("not a valid ZIP archive: {e}"),
    })?;
    tracing::debug!(path = %path.display(), entries = archive.len(), "opened archive");

    let metadata = read_sidecar(&mut archive, path);

    let names: Vec<String> = archive.file_names().map(String::from).collect();
    if !names.iter().any(|n| is_page_entry(n)) {
        return Err(ArchiveError::InvalidFormat {
            path: path.display().to_string(),
            message: "no valid image files found".into(),
        });
    }

    let mut pages = Vec::new();
    let mut skipped = Vec::new();
    for name in select_entries(names, options) {
        match load_page(&mut archive, &name) {
            Ok(page) => pages.push(page),
            Err(reason) => {
                tracing::warn!(file = %name, error = %reason, "skipping unreadable page");
                skipped.push(SkippedPage {
                    filename: name,
                    reason,
                });
            }
        }
    }

    if pages.is_empty() {
        return Err(ArchiveError::InvalidFormat {
            path: path.display().to_string(),
            message: "no images could be loaded".into(),
        });
    }

    tracing::info!(
        path = %path.display(),
        pages = pages.len(),
        skipped = skipped.len(),
        "unpacked archive"
    );

    Ok(UnpackedArchive {
        id: ArchiveId::from_path(path),
        pages,
        metadata,
        skipped,
    })
}

fn read_sidecar(archive: &mut ZipArchive<File>, path: &Path) -> ComicMetadata {
    let mut entry = match archive.by_name(COMIC_INFO_ENTRY) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            return ComicMetadata::Absent {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            };
        }
        Err(e) => {
            return ComicMetadata::Error {
                message: format!("Error processing metadata: {e}"),
            };
        }
    };

    let mut buf = Vec::new();
    match entry.read_to_end(&mut buf) {
        Ok(_) => ComicMetadata::from_sidecar(&buf),
        Err(e) => ComicMetadata::Error {
            message: format!("Error processing metadata: {e}"),
        },
    }
}

fn load_page(archive: &mut ZipArchive<File>, name: &str) -> Result<Page, String> {
    let mut entry = archive.by_name(name).map_err(|e| e.to_string())?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
    let image = raster::decode_page(&bytes, name).map_err(|e| e.to_string())?;
    Ok(Page::new(name, image))
}

/// Change signal for a source archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFingerprint {
    Missing,
    /// The file exists; `modified` is `None` where the platform has no mtime.
    Present { modified: Option<SystemTime> },
}

/// Cheap staleness check for an orchestrator deciding whether to re-read.
pub fn fingerprint(path: &Path) -> SourceFingerprint {
    match std::fs::metadata(path) {
        Ok(meta) => SourceFingerprint::Present {
            modified: meta.modified().ok(),
        },
        Err(_) => SourceFingerprint::Missing,
    }
}

impl std::fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "file_not_found"),
            Self::Present { modified: None } => write!(f, "present"),
            Self::Present {
                modified: Some(time),
            } => {
                let secs = time
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or_default();
                write!(f, "{secs}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use image::{DynamicImage, ImageFormat, RgbImage};
    use zip::write::SimpleFileOptions;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn write_cbz(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn sort_then_offset_then_cap() {
        let options = ReadOptions {
            image_load_cap: 1,
            start_index: 1,
            sort_images: true,
        };
        assert_eq!(
            select_entries(["b.jpg", "a.jpg", "c.jpg"], &options),
            vec!["b.jpg"]
        );
    }

    #[test]
    fn unsorted_keeps_archive_order() {
        let options = ReadOptions {
            sort_images: false,
            ..Default::default()
        };
        assert_eq!(
            select_entries(["b.jpg", "ComicInfo.xml", "a.jpg"], &options),
            vec!["b.jpg", "a.jpg"]
        );
    }

    #[test]
    fn offset_past_end_selects_nothing() {
        let options = ReadOptions {
            start_index: 5,
            ..Default::default()
        };
        assert!(select_entries(["a.png", "b.png"], &options).is_empty());
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = read(&dir.path().join("nope.cbz"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound { .. }));
    }

    #[test]
    fn wrong_suffix_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.zip");
        write_cbz(&path, &[("001.png", png(2, 2))]);
        let err = read(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedExtension { .. }));
    }

    #[test]
    fn non_zip_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.cbz");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = read(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFormat { .. }));
    }

    #[test]
    fn archive_without_pages_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.cbz");
        write_cbz(
            &path,
            &[
                ("readme.txt", b"hi".to_vec()),
                ("__MACOSX/._001.png", png(1, 1)),
            ],
        );
        let err = read(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFormat { .. }));
    }

    #[test]
    fn corrupt_page_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.cbz");
        write_cbz(
            &path,
            &[
                ("002.png", png(3, 2)),
                ("001.jpg", b"garbage".to_vec()),
                ("003.png", png(3, 2)),
            ],
        );
        let unpacked = read(&path, &ReadOptions::default()).unwrap();
        assert_eq!(unpacked.filenames(), vec!["002.png", "003.png"]);
        assert_eq!(unpacked.skipped.len(), 1);
        assert_eq!(unpacked.skipped[0].filename, "001.jpg");
        assert_eq!(unpacked.pages[0].image.pixels.shape(), &[1, 2, 3, 3]);
    }

    #[test]
    fn all_pages_corrupt_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.cbz");
        write_cbz(&path, &[("001.jpg", b"garbage".to_vec())]);
        let err = read(&path, &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidFormat { .. }));
    }

    #[test]
    fn missing_sidecar_is_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vol1.cbz");
        write_cbz(&path, &[("001.png", png(1, 1))]);
        let unpacked = read(&path, &ReadOptions::default()).unwrap();
        assert_eq!(
            unpacked.metadata,
            ComicMetadata::Absent {
                filename: "vol1.cbz".into()
            }
        );
        assert_eq!(unpacked.id, ArchiveId::from_path(&path));
    }

    #[test]
    fn broken_sidecar_does_not_fail_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vol1.cbz");
        write_cbz(
            &path,
            &[
                ("ComicInfo.xml", b"<ComicInfo><Title>".to_vec()),
                ("001.png", png(1, 1)),
            ],
        );
        let unpacked = read(&path, &ReadOptions::default()).unwrap();
        assert!(matches!(unpacked.metadata, ComicMetadata::Error { .. }));
        assert_eq!(unpacked.pages.len(), 1);
    }

    #[test]
    fn fingerprint_tracks_existence() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("vol1.cbz");
        assert_eq!(fingerprint(&path), SourceFingerprint::Missing);
        assert_eq!(fingerprint(&path).to_string(), "file_not_found");
        std::fs::write(&path, b"x").unwrap();
        assert!(matches!(
            fingerprint(&path),
            SourceFingerprint::Present { .. }
        ));
    }
}
