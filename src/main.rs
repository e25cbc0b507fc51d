//! cbz-pack CLI: unpack, regroup and repack Comic Book Archives.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

use cbz_pack::archive::{self, ReadOptions};
use cbz_pack::collector::ArchiveCollector;
use cbz_pack::config::PackConfig;
use cbz_pack::preview::{PreviewLog, describe_paths};
use cbz_pack::raster::RasterFormat;
use cbz_pack::scan::find_archives;

#[derive(Parser)]
#[command(name = "cbz-pack", version, about = "Comic Book Archive pipeline")]
struct Cli {
    /// TOML config with [read] and [write] defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List CBZ files in a directory.
    Scan {
        dir: PathBuf,

        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,
    },

    /// Decode an archive and print its pages and metadata.
    Unpack {
        path: PathBuf,

        /// Maximum number of pages to load (0 = unlimited).
        #[arg(long)]
        cap: Option<usize>,

        /// Skip pages before this index.
        #[arg(long)]
        start: Option<usize>,

        /// Keep archive order instead of sorting by filename.
        #[arg(long)]
        no_sort: bool,

        /// Print only the metadata JSON.
        #[arg(long)]
        metadata_only: bool,
    },

    /// Read archives, regroup their pages and write processed copies.
    Repack {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Page format: png, jpeg or webp.
        #[arg(long)]
        format: Option<RasterFormat>,

        /// Lossy quality (1-100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Directory for the output archives (default: next to each source).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Suffix appended to each source name.
        #[arg(long)]
        suffix: Option<String>,

        /// Number pages sequentially instead of keeping original names.
        #[arg(long)]
        sequential: bool,

        /// Feed the collector page by page instead of one batch per archive.
        #[arg(long)]
        incremental: bool,
    },

    /// Print the change fingerprint of an archive.
    Fingerprint { path: PathBuf },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PackConfig::load(path)?,
        None => PackConfig::default(),
    };

    match cli.command {
        Commands::Scan { dir, recursive } => {
            let paths = find_archives(&dir, recursive)?;
            print!("{}", describe_paths(&paths));
        }

        Commands::Unpack {
            path,
            cap,
            start,
            no_sort,
            metadata_only,
        } => {
            let defaults = config.read_options();
            let options = ReadOptions {
                image_load_cap: cap.unwrap_or(defaults.image_load_cap),
                start_index: start.unwrap_or(defaults.start_index),
                sort_images: defaults.sort_images && !no_sort,
            };
            let unpacked = archive::read(&path, &options)?;

            if !metadata_only {
                println!("{} ({} pages)", unpacked.id, unpacked.pages.len());
                for page in &unpacked.pages {
                    println!(
                        "  {}  {}x{}",
                        page.filename,
                        page.image.width(),
                        page.image.height()
                    );
                }
                for skipped in &unpacked.skipped {
                    println!("  skipped {}: {}", skipped.filename, skipped.reason);
                }
            }
            println!("{}", unpacked.metadata.to_json());
        }

        Commands::Repack {
            paths,
            format,
            quality,
            output_dir,
            suffix,
            sequential,
            incremental,
        } => {
            let mut naming = config.output_naming();
            if let Some(dir) = output_dir {
                naming.output_dir = Some(dir);
            }
            if let Some(suffix) = suffix {
                naming.suffix = suffix;
            }

            let mut write_options = config.write_options();
            write_options.output_dir = None; // already folded into the naming rule
            if let Some(format) = format {
                write_options.format = format;
            }
            if let Some(quality) = quality {
                write_options.quality = quality;
            }
            if sequential {
                write_options.preserve_filenames = false;
            }

            let read_options = config.read_options();
            let mut collector = ArchiveCollector::with_naming(naming);
            let mut units = Vec::new();
            let mut log = PreviewLog::new();

            for path in &paths {
                let unpacked = archive::read(path, &read_options)?;
                log.push(format!(
                    "{}: {} pages, {} skipped",
                    unpacked.id,
                    unpacked.pages.len(),
                    unpacked.skipped.len()
                ));
                if incremental {
                    for page in unpacked.pages {
                        collector.submit(
                            unpacked.id.clone(),
                            page,
                            unpacked.metadata.clone(),
                        )?;
                    }
                } else {
                    units.push(collector.submit_batch(
                        unpacked.id,
                        unpacked.pages,
                        unpacked.metadata,
                    )?);
                }
            }
            units.extend(collector.drain(true)?);

            for entry in log.entries() {
                println!("{entry}");
            }
            for unit in &units {
                let written = archive::write(unit, &write_options)?;
                println!("{}", written.display());
            }
        }

        Commands::Fingerprint { path } => {
            println!("{}", archive::fingerprint(&path));
        }
    }

    Ok(())
}
