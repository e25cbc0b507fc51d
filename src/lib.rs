// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # cbz-pack
//!
//! Read Comic Book Archives (CBZ), hand their pages to arbitrary per-page
//! transforms, regroup the results by source archive, and write new CBZs.
//!
//! ## Architecture
//!
//! - **Reader** (`archive::reader`): CBZ → ordered pages + `ComicInfo.xml` metadata
//! - **Collector** (`collector`): per-archive accumulation of transformed pages
//! - **Writer** (`archive::writer`): assembled unit → re-encoded CBZ
//! - **Raster codec** (`raster`): images ↔ `(1, H, W, 3)` float tensors
//! - **Metadata** (`comic_info`): typed `ComicInfo.xml` record + JSON mapping
//!
//! ## Library usage
//!
//! ```no_run
//! use std::path::Path;
//! use cbz_pack::archive::{self, ReadOptions, WriteOptions};
//! use cbz_pack::collector::ArchiveCollector;
//!
//! let unpacked = archive::read(Path::new("vol1.cbz"), &ReadOptions::default()).unwrap();
//! let mut collector = ArchiveCollector::new();
//! for page in unpacked.pages {
//!     // ... transform the page ...
//!     collector
//!         .submit(unpacked.id.clone(), page, unpacked.metadata.clone())
//!         .unwrap();
//! }
//! for unit in collector.drain(false).unwrap() {
//!     archive::write(&unit, &WriteOptions::default()).unwrap();
//! }
//! ```

pub mod archive;
pub mod collector;
pub mod comic_info;
pub mod config;
pub mod error;
pub mod model;
pub mod payload;
pub mod preview;
pub mod raster;
pub mod scan;
