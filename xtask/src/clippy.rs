// Licensed under the Apache-2.0 license

use anyhow::{bail, Result};
use log::info;
use std::process::Command;

use crate::PROJECT_ROOT;

pub(crate) fn clippy() -> Result<()> {
    clippy_all()?;
    clippy_no_default_features()?;
    Ok(())
}

fn run_clippy(extra: &[&str]) -> Result<()> {
    let mut args = vec!["clippy", "--all-targets"];
    args.extend_from_slice(extra);
    args.extend_from_slice(&["--", "-D", "warnings"]);
    info!("Running: cargo {}", args.join(" "));
    let status = Command::new("cargo")
        .current_dir(&*PROJECT_ROOT)
        .args(args)
        .env("RUSTFLAGS", "-Dwarnings")
        .status()?;

    if !status.success() {
        bail!("cargo clippy failed");
    }
    Ok(())
}

fn clippy_all() -> Result<()> {
    run_clippy(&[])
}

// The key store must also lint clean with ENCRYPTED support compiled out.
fn clippy_no_default_features() -> Result<()> {
    run_clippy(&["-p", "kmu-keystore", "--no-default-features"])
}
