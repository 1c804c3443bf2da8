use clap::{Parser, Subcommand};
use imgfs::store::{CreateOptions, ImgFs, ListMode, OpenMode};
use imgfs::{ImgfsError, Resolution, MAX_IMG_ID};
use std::path::PathBuf;

// Resolution caps enforced by `create`.
const MAX_THUMB_RES: u16 = 128;
const MAX_SMALL_RES: u16 = 512;

#[derive(Parser)]
#[command(name = "imgfscmd", version = "1.0.0", about = "The imgFS command line tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the contents of an imgFS database
    List {
        imgfs_file: PathBuf,
    },
    /// Create a new imgFS database
    Create {
        imgfs_file: PathBuf,
        /// Maximum number of images
        #[arg(long = "max_files", default_value = "128")]
        max_files: u32,
        /// Thumbnail resolution (default 64x64, maximum 128x128)
        #[arg(long = "thumb_res", num_args = 2, value_names = ["X_RES", "Y_RES"])]
        thumb_res: Option<Vec<u16>>,
        /// Small resolution (default 256x256, maximum 512x512)
        #[arg(long = "small_res", num_args = 2, value_names = ["X_RES", "Y_RES"])]
        small_res: Option<Vec<u16>>,
    },
    /// Read an image and save it to <imgID><suffix>.jpg
    Read {
        imgfs_file: PathBuf,
        img_id: String,
        /// original|orig|small|thumbnail|thumb
        #[arg(default_value = "original")]
        resolution: String,
    },
    /// Insert a new image into the imgFS
    Insert {
        imgfs_file: PathBuf,
        img_id: String,
        image_file: PathBuf,
    },
    /// Delete an image from the imgFS
    Delete {
        imgfs_file: PathBuf,
        img_id: String,
    },
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(e.code());
    }
}

fn run(cli: Cli) -> imgfs::Result<()> {
    match cli.command {

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { imgfs_file } => {
            let fs = ImgFs::open(&imgfs_file, OpenMode::ReadOnly)?;
            fs.list(ListMode::Stdout)?;
        }

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { imgfs_file, max_files, thumb_res, small_res } => {
            if max_files == 0 {
                return Err(ImgfsError::InvalidArgument);
            }
            let defaults = CreateOptions::default();
            let opts = CreateOptions {
                max_files,
                thumb_res: parse_res(thumb_res, defaults.thumb_res, MAX_THUMB_RES)?,
                small_res: parse_res(small_res, defaults.small_res, MAX_SMALL_RES)?,
            };
            ImgFs::create(&imgfs_file, opts)?;
        }

        // ── Read ─────────────────────────────────────────────────────────────
        Commands::Read { imgfs_file, img_id, resolution } => {
            let res = Resolution::from_name(&resolution).ok_or(ImgfsError::Resolutions)?;

            // ReadWrite: a first read of a derived variant materializes it.
            let mut fs = ImgFs::open(&imgfs_file, OpenMode::ReadWrite)?;
            let image = fs.read(&img_id, res)?;

            let out_name = format!("{img_id}{}.jpg", res.suffix());
            std::fs::write(&out_name, &image)?;
            println!("Image written to {out_name} ({} B)", image.len());
        }

        // ── Insert ───────────────────────────────────────────────────────────
        Commands::Insert { imgfs_file, img_id, image_file } => {
            if img_id.is_empty() || img_id.len() > MAX_IMG_ID {
                return Err(ImgfsError::InvalidId);
            }
            let blob = std::fs::read(&image_file)?;
            let mut fs = ImgFs::open(&imgfs_file, OpenMode::ReadWrite)?;
            fs.insert(&blob, &img_id)?;
        }

        // ── Delete ───────────────────────────────────────────────────────────
        Commands::Delete { imgfs_file, img_id } => {
            let mut fs = ImgFs::open(&imgfs_file, OpenMode::ReadWrite)?;
            fs.delete(&img_id)?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_res(arg: Option<Vec<u16>>, default: (u16, u16), cap: u16) -> imgfs::Result<(u16, u16)> {
    let Some(v) = arg else { return Ok(default) };
    let (x, y) = (v[0], v[1]);
    if x == 0 || y == 0 || x > cap || y > cap {
        return Err(ImgfsError::Resolutions);
    }
    Ok((x, y))
}
