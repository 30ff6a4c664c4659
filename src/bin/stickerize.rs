//! Stickerize command-line entry point
//!
//! Runs the HTTP API (`stickerize serve`) or converts local images
//! (`stickerize convert`).

#[cfg(feature = "cli")]
use stickerize::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
