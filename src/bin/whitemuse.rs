//! WhiteMuse CLI Tool
//!
//! Command-line front end for the product photo pipeline, size calibration,
//! text scoring and listing copy.

#[cfg(feature = "cli")]
use whitemuse::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(2);
}
