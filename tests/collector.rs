//! Collector behaviour against pages read from real archives.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use zip::write::SimpleFileOptions;

use cbz_pack::archive::{self, OutputNaming, ReadOptions, UnpackedArchive};
use cbz_pack::collector::{ArchiveCollector, CollectError};
use cbz_pack::model::ArchiveId;

fn make_archive(dir: &Path, name: &str, pages: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
    for page in pages {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(2, 2))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        zip.start_file(*page, SimpleFileOptions::default()).unwrap();
        zip.write_all(&buf).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn read(path: &Path) -> UnpackedArchive {
    archive::read(path, &ReadOptions::default()).unwrap()
}

#[test]
fn interleaved_submissions_regroup_by_archive() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = read(&make_archive(dir.path(), "a.cbz", &["1.png", "2.png", "3.png"]));
    let b = read(&make_archive(dir.path(), "b.cbz", &["x.png", "y.png"]));

    let mut collector = ArchiveCollector::new();
    let mut a_pages = a.pages.clone().into_iter();
    let mut b_pages = b.pages.clone().into_iter();
    loop {
        let mut progressed = false;
        if let Some(page) = a_pages.next() {
            collector.submit(a.id.clone(), page, a.metadata.clone()).unwrap();
            progressed = true;
        }
        if let Some(page) = b_pages.next() {
            collector.submit(b.id.clone(), page, b.metadata.clone()).unwrap();
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    let units = collector.drain(false).unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].id, a.id);
    assert_eq!(units[0].filenames(), vec!["1.png", "2.png", "3.png"]);
    assert_eq!(units[1].id, b.id);
    assert_eq!(units[1].filenames(), vec!["x.png", "y.png"]);
    assert_eq!(units[1].output_path, dir.path().join("b_processed.cbz"));
}

#[test]
fn reversed_submission_order_is_kept() {
    let dir = tempfile::TempDir::new().unwrap();
    let a = read(&make_archive(dir.path(), "a.cbz", &["1.png", "2.png", "3.png"]));

    let mut collector = ArchiveCollector::new();
    for page in a.pages.iter().rev() {
        collector
            .submit(a.id.clone(), page.clone(), a.metadata.clone())
            .unwrap();
    }
    let units = collector.drain(false).unwrap();
    assert_eq!(units[0].filenames(), vec!["3.png", "2.png", "1.png"]);
}

#[test]
fn drain_emits_every_group_whole() {
    let dir = tempfile::TempDir::new().unwrap();
    let archives: Vec<_> = (0..4)
        .map(|i| read(&make_archive(dir.path(), &format!("v{i}.cbz"), &["1.png", "2.png"])))
        .collect();

    let mut collector = ArchiveCollector::with_naming(OutputNaming::in_dir(dir.path().join("out")));
    for unpacked in &archives {
        for page in &unpacked.pages {
            collector
                .submit(unpacked.id.clone(), page.clone(), unpacked.metadata.clone())
                .unwrap();
        }
    }
    assert_eq!(collector.pending_pages(), 8);

    let units = collector.drain(false).unwrap();
    assert_eq!(units.len(), 4);
    for (unit, unpacked) in units.iter().zip(&archives) {
        assert_eq!(unit.id, unpacked.id);
        assert_eq!(unit.len(), unpacked.pages.len());
    }
    assert_eq!(collector.pending_pages(), 0);
    assert!(matches!(
        collector.drain(false),
        Err(CollectError::NothingToEmit)
    ));
    assert!(collector.drain(true).unwrap().is_empty());
}

#[test]
fn same_path_yields_same_id() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = make_archive(dir.path(), "a.cbz", &["1.png"]);
    assert_eq!(read(&path).id, read(&path).id);
    assert_eq!(read(&path).id, ArchiveId::from_path(&path));
}
