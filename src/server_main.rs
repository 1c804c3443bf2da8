use clap::Parser;
use imgfs::http::server::HttpServer;
use imgfs::service::{ServerService, DEFAULT_PORT};
use imgfs::store::{ImgFs, OpenMode};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imgfs-server", version = "1.0.0", about = "The imgFS HTTP server")]
struct Args {
    /// imgFS database file to serve
    imgfs_file: PathBuf,
    /// TCP port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {e}");
        std::process::exit(e.code());
    }
}

fn run(args: Args) -> imgfs::Result<()> {
    let fs = ImgFs::open(&args.imgfs_file, OpenMode::ReadWrite)?;
    println!("{}", fs.header);

    let server = HttpServer::bind(args.port)?;
    println!("ImgFS server started on http://localhost:{}", args.port);
    info!("serving {} on port {}", args.imgfs_file.display(), args.port);

    // Runs until the listener fails (e.g. the process is being torn down);
    // every mutation is persisted as it happens, so there is no state to
    // flush on the way out.
    server.serve(Arc::new(ServerService::new(fs, args.port)))
}
