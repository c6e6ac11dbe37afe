// Licensed under the Apache-2.0 license

use anyhow::{anyhow, bail, Result};
use log::{info, warn};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use walkdir::{DirEntry, WalkDir};

use crate::PROJECT_ROOT;

const REQUIRED_TEXT: &str = "Licensed under the Apache-2.0 license";
const EXTENSIONS: &[&str] = &["rs", "toml", "sh", "py"];
const IGNORED_DIRS: &[&str] = &[".git", "examples", "out", "target"];

/// Number of leading lines searched for the header.
const HEADER_LINES: usize = 3;

pub(crate) fn check() -> Result<()> {
    header(false)
}

pub(crate) fn fix() -> Result<()> {
    header(true)
}

fn header(fix: bool) -> Result<()> {
    let files = find_files(&PROJECT_ROOT)?;
    let mut failed = false;
    for file in files.iter() {
        if fix && check_file(file).is_err() {
            info!("Adding license header to {}", file.display());
            fix_file(file)?;
        }
        if let Err(e) = check_file(file) {
            warn!("{e}");
            failed = true;
        }
    }
    if failed {
        bail!("Missing license headers; run \"cargo xtask header-fix\"");
    }
    Ok(())
}

fn check_file_contents(path: &Path, contents: impl BufRead) -> Result<()> {
    for line in contents.lines().take(HEADER_LINES) {
        if line.map_err(|e| anyhow!("{path:?}: {e}"))?.contains(REQUIRED_TEXT) {
            return Ok(());
        }
    }
    bail!("File {path:?} doesn't contain {REQUIRED_TEXT:?} in the first {HEADER_LINES} lines")
}

fn check_file(path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| anyhow!("{path:?}: {e}"))?;
    check_file_contents(path, BufReader::new(file))
}

fn fix_file(path: &Path) -> Result<()> {
    let mut contents = Vec::from(match path.extension().and_then(|s| s.to_str()) {
        Some("rs") => format!("// {REQUIRED_TEXT}\n"),
        Some("toml" | "sh" | "py") => format!("# {REQUIRED_TEXT}\n"),
        other => bail!("Unknown extension {other:?}"),
    });
    let mut prev_contents = std::fs::read(path).map_err(|e| anyhow!("{path:?}: {e}"))?;
    if prev_contents.first() != Some(&b'\n') {
        contents.push(b'\n');
    }
    contents.append(&mut prev_contents);
    std::fs::write(path, contents)?;
    Ok(())
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| IGNORED_DIRS.contains(&name))
}

fn has_checked_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| EXTENSIONS.contains(&ext))
}

fn find_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_ignored(e))
    {
        let entry = entry?;
        if entry.file_type().is_file() && has_checked_extension(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
