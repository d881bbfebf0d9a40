//! Zip extraction for the Core ML encoder package.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extracts a zip archive into `dest_dir`.
///
/// Entries whose names would land outside `dest_dir` are skipped.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or an entry cannot be
/// written.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    info!(
        "Extracting {} to {}",
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open zip: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!("Skipping unsafe path in zip: {}", entry.name());
                continue;
            }
        };

        let dest_path = dest_dir.join(&entry_path);

        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut outfile = File::create(&dest_path)
                .with_context(|| format!("Failed to create: {}", dest_path.display()))?;

            io::copy(&mut entry, &mut outfile)?;
        }
    }

    debug!("ZIP extraction complete");
    Ok(())
}
