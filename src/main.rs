use clap::{Parser, Subcommand};
use gallery_kit::adapter::fs::FsAdapter;
use gallery_kit::config::{self, GalleryConfig};
use gallery_kit::crop::raster;
use gallery_kit::crop::{CropSession, Selection};
use gallery_kit::output;
use gallery_kit::store::{ImageStore, StoreError};
use gallery_kit::types::{ImageDetails, ImageType};
use gallery_kit::upload::UploadFile;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "gallery-kit")]
#[command(about = "Manage ordered image galleries: upload, reorder, delete, crop")]
#[command(long_about = "\
Manage ordered image galleries: upload, reorder, delete, crop

Images belong to an owner (a project, a portfolio) and are either banners or
gallery images. Banners always list first. Within each type, display order is
kept dense: 0, 1, 2, ...

Storage layout:

  <root>/
  ├── config.toml                  # Optional, see 'gallery-kit gen-config'
  ├── index.json                   # Records of every owner
  ├── banner/<owner>/<hash>.jpg    # Content-addressed blobs
  └── gallery/<owner>/<hash>.png

Positions given to 'move' are 0-based indexes into the listing as printed by
'list' (banners first, then gallery images).")]
#[command(version)]
struct Cli {
    /// Storage directory
    #[arg(long, default_value = "gallery", global = true)]
    root: PathBuf,

    /// Owner whose images to manage
    #[arg(long, default_value = "default", global = true)]
    owner: String,

    /// Directory containing config.toml (defaults to --root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Public base URL for stored blobs (defaults to file:// URLs)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the owner's images in display order
    List,
    /// Upload files (directories are walked recursively)
    Upload {
        paths: Vec<PathBuf>,
        /// banner or gallery
        #[arg(long, default_value = "gallery")]
        kind: ImageType,
        /// Downscale to the configured bounds and re-encode as JPEG first
        #[arg(long)]
        optimize: bool,
    },
    /// Move the image at one listing position to another
    Move { from: usize, to: usize },
    /// Delete images by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Mark an image as a banner
    SetBanner { id: String },
    /// Turn a banner back into a gallery image
    UnsetBanner { id: String },
    /// Close gaps in display order
    Densify,
    /// Set alt text and caption (omitted flags clear the field)
    Edit {
        id: String,
        #[arg(long)]
        alt: Option<String>,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Crop a stored image and write the result as JPEG
    Crop {
        id: String,
        /// Aspect preset (defaults to the preset for the image's type)
        #[arg(long)]
        preset: Option<String>,
        /// Selection as x,y,width,height in rendered pixels (defaults to the preset's centered box)
        #[arg(long, value_parser = parse_rect)]
        rect: Option<Selection>,
        /// Size the selection was drawn at, as WIDTHxHEIGHT (defaults to natural size)
        #[arg(long, value_parser = parse_size)]
        rendered: Option<(u32, u32)>,
        /// Output file
        #[arg(long)]
        out: PathBuf,
        /// Also upload the cropped image to the gallery
        #[arg(long)]
        upload: bool,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(cli.config.as_deref().unwrap_or(cli.root.as_path()))?;
    let mut store = open_store(&cli, &config)?;

    match cli.command {
        Command::List => {}
        Command::Upload {
            paths,
            kind,
            optimize,
        } => {
            let files = collect_files(&paths, optimize.then_some(&config))?;
            let total = files.len();
            let report = store.upload(files, kind);
            output::print_upload_report(&report, total);
            println!();
            output::print_gallery(store.images(), store.max_images());
            report.into_result()?;
            return Ok(());
        }
        Command::Move { from, to } => {
            if !store.move_image(from, to)? {
                println!("Nothing to move");
            }
        }
        Command::Delete { ids } => {
            let removed = store.remove(&ids)?;
            println!("Deleted {removed} images");
        }
        Command::SetBanner { id } => {
            store.set_banner(&id)?;
        }
        Command::UnsetBanner { id } => {
            store.unset_banner(&id)?;
        }
        Command::Densify => {
            if !store.densify()? {
                println!("Already dense");
            }
        }
        Command::Edit { id, alt, caption } => {
            store.update_details(&id, ImageDetails::new(alt, caption))?;
        }
        Command::Crop {
            id,
            preset,
            rect,
            rendered,
            out,
            upload,
        } => {
            let record = store
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::UnknownImage(id.clone()))?;
            let bytes = store.adapter().read_blob(&record)?;

            let mut session = CropSession::for_image_type(&config.crop, record.image_type);
            if let Some(name) = &preset {
                session.set_aspect(name)?;
            }
            session.load_bytes(&bytes)?;
            if let Some((width, height)) = rendered {
                session.set_rendered_size(width, height)?;
            }
            session.begin_selection()?;
            if let Some(selection) = rect {
                session.set_selection(selection)?;
            }
            session.apply()?;
            let cropped = session.export_to(&out)?;
            output::print_crop(cropped, session.preset(), &out);

            if upload {
                let name = format!("{}-cropped.jpg", record.id);
                let file = UploadFile::new(name, "image/jpeg", session.export()?.jpeg);
                let report = store.upload(vec![file], record.image_type);
                output::print_upload_report(&report, 1);
                report.into_result()?;
            }
            return Ok(());
        }
        Command::GenConfig => return Ok(()),
    }

    output::print_gallery(store.images(), store.max_images());
    Ok(())
}

fn open_store(cli: &Cli, config: &GalleryConfig) -> Result<ImageStore<FsAdapter>, StoreError> {
    let mut adapter = FsAdapter::new(&cli.root);
    if let Some(base_url) = &cli.base_url {
        adapter = adapter.with_base_url(base_url.clone());
    }
    let mut store = ImageStore::new(adapter, cli.owner.clone(), config);
    store.load()?;
    Ok(store)
}

/// Read every file under `paths`, in path order, optionally optimized.
fn collect_files(
    paths: &[PathBuf],
    optimize: Option<&GalleryConfig>,
) -> Result<Vec<UploadFile>, Box<dyn std::error::Error>> {
    let mut found: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && !is_hidden(entry.path()) {
                    found.push(entry.into_path());
                }
            }
        } else {
            found.push(path.clone());
        }
    }

    let mut files = Vec::with_capacity(found.len());
    for path in found {
        let file = UploadFile::from_path(&path)?;
        let file = match optimize {
            Some(config) => match raster::optimize_for_upload(&file, &config.uploads) {
                Ok(optimized) => optimized,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not optimize, uploading as is");
                    file
                }
            },
            None => file,
        };
        files.push(file);
    }
    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Parse `x,y,width,height` into a pixel selection.
fn parse_rect(s: &str) -> Result<Selection, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid number in '{s}': {e}"))?;
    match parts.as_slice() {
        [x, y, width, height] if *width > 0.0 && *height > 0.0 => {
            Ok(Selection::pixels(*x, *y, *width, *height))
        }
        [_, _, _, _] => Err(format!("width and height must be positive in '{s}'")),
        _ => Err(format!("expected x,y,width,height, got '{s}'")),
    }
}

/// Parse `WIDTHxHEIGHT`.
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("invalid height '{h}': {e}"))?;
    Ok((width, height))
}
