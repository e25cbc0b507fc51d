//! Archive writer: [`AssembledUnit`] → new CBZ on disk.
//!
//! Pages are re-encoded in the requested raster format and stored in unit
//! order. `ComicInfo.xml` is only written for a real, non-empty metadata
//! record. The archive is assembled under a `.part` name and renamed into
//! place once complete.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::with_cbz_extension;
use crate::comic_info::COMIC_INFO_ENTRY;
use crate::model::{AssembledUnit, Page};
use crate::raster::{self, RasterFormat};

/// Options controlling how a unit is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub format: RasterFormat,
    /// 1..=100; ignored for lossless formats.
    pub quality: u8,
    /// Reuse original filenames (extension swapped to the target format)
    /// instead of sequential page numbers.
    pub preserve_filenames: bool,
    /// Write into this directory instead of the unit's derived location.
    pub output_dir: Option<PathBuf>,
    /// Write to exactly this path (`.cbz` appended if missing).
    /// Takes precedence over `output_dir`.
    pub output_path: Option<PathBuf>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            format: RasterFormat::Png,
            quality: 95,
            preserve_filenames: true,
            output_dir: None,
            output_path: None,
        }
    }
}

impl WriteOptions {
    /// Final archive path for `unit` under these options.
    pub fn target_path(&self, unit: &AssembledUnit) -> PathBuf {
        if let Some(path) = &self.output_path {
            return with_cbz_extension(path);
        }
        match (&self.output_dir, unit.output_path.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => unit.output_path.clone(),
        }
    }
}

/// In-archive entry names for `pages`, in page order.
///
/// Preserved names keep their directory components. Names that collide
/// after the extension swap get a `_N` suffix.
pub fn entry_names(pages: &[Page], options: &WriteOptions) -> Vec<String> {
    let ext = options.format.extension();
    if !options.preserve_filenames {
        return (1..=pages.len())
            .map(|n| format!("{n:04}.{ext}"))
            .collect();
    }

    let mut used = HashSet::new();
    pages
        .iter()
        .map(|page| {
            let stem = strip_extension(&page.filename);
            let mut name = format!("{stem}.{ext}");
            let mut n = 1;
            while !used.insert(name.clone()) {
                name = format!("{stem}_{n}.{ext}");
                n += 1;
            }
            name
        })
        .collect()
}

fn strip_extension(filename: &str) -> &str {
    let base_start = filename.rfind('/').map_or(0, |i| i + 1);
    match filename[base_start..].rfind('.') {
        Some(dot) if dot > 0 => &filename[..base_start + dot],
        _ => filename,
    }
}

/// Write `unit` as a CBZ archive and return its path.
pub fn write(unit: &AssembledUnit, options: &WriteOptions) -> ArchiveResult<PathBuf> {
    if unit.is_empty() {
        return Err(ArchiveError::EmptyUnit {
            id: unit.id.to_string(),
        });
    }

    let target = options.target_path(unit);
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
    }

    let partial = partial_path(&target);
    let result = write_zip(unit, options, &partial)
        .and_then(|()| std::fs::rename(&partial, &target).map_err(|e| ArchiveError::io(&target, e)));
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result?;

    tracing::info!(
        id = %unit.id,
        path = %target.display(),
        pages = unit.len(),
        format = %options.format,
        "wrote archive"
    );
    Ok(target)
}

fn write_zip(unit: &AssembledUnit, options: &WriteOptions, path: &Path) -> ArchiveResult<()> {
    let file = File::create(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut zip = ZipWriter::new(file);

    // Page payloads are already compressed.
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (page, name) in unit.pages.iter().zip(entry_names(&unit.pages, options)) {
        let bytes = raster::encode_page(&page.image, options.format, options.quality).map_err(
            |e| ArchiveError::Encode {
                filename: page.filename.clone(),
                message: e.to_string(),
            },
        )?;
        zip.start_file(name, stored)
            .map_err(|e| zip_error(path, e))?;
        zip.write_all(&bytes).map_err(|e| ArchiveError::io(path, e))?;
    }

    match unit.metadata.info().filter(|_| unit.metadata.is_writable()) {
        Some(info) => {
            let xml = info.to_xml().map_err(|e| ArchiveError::Encode {
                filename: COMIC_INFO_ENTRY.into(),
                message: e.to_string(),
            })?;
            zip.start_file(COMIC_INFO_ENTRY, deflated)
                .map_err(|e| zip_error(path, e))?;
            zip.write_all(xml.as_bytes())
                .map_err(|e| ArchiveError::io(path, e))?;
        }
        None => tracing::debug!(id = %unit.id, "no real metadata, omitting sidecar"),
    }

    zip.finish().map_err(|e| zip_error(path, e))?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn zip_error(path: &Path, e: ZipError) -> ArchiveError {
    let source = match e {
        ZipError::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    };
    ArchiveError::io(path, source)
}
