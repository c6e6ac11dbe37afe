// Licensed under the Apache-2.0 license

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

mod clippy;
mod format;
mod header;
mod precheckin;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Xtask {
    #[command(subcommand)]
    xtask: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run clippy on all targets
    Clippy,
    /// Check or fix formatting
    Format {
        /// Only check, do not rewrite files
        #[arg(long, default_value_t = false)]
        check: bool,
    },
    /// Check that every source file carries the license header
    HeaderCheck,
    /// Add the license header where it is missing
    HeaderFix,
    /// Run the unit and integration tests
    Test,
    /// Run pre-check-in checks
    Precheckin,
}

pub static PROJECT_ROOT: LazyLock<PathBuf> = LazyLock::new(|| {
    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    option_env!("CARGO_MANIFEST_DIR")
        .map(|s| {
            let p = Path::new(&s);
            match p.parent() {
                Some(parent) if p.exists() => parent.to_path_buf(),
                _ => current_dir.clone(),
            }
        })
        .unwrap_or(current_dir)
});

fn main() {
    let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    let cli = Xtask::parse();
    let result = match &cli.xtask {
        Commands::Clippy => clippy::clippy(),
        Commands::Format { check } => format::format(*check),
        Commands::HeaderCheck => header::check(),
        Commands::HeaderFix => header::fix(),
        Commands::Test => test::test(),
        Commands::Precheckin => precheckin::precheckin(),
    };
    result.unwrap_or_else(|e| {
        log::error!("Error: {}", e);
        std::process::exit(1);
    });
}
