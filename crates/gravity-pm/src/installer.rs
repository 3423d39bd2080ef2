//! Archive extraction into the new application directory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

use crate::{GravityError, Result};

/// Leading path components dropped from every entry (`package/…` in npm tarballs)
pub const STRIP_COMPONENTS: usize = 1;

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract the gzipped tarball at `archive_path` into `dest_dir`,
    /// stripping the first path component of every entry.
    pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        let file = File::open(archive_path)
            .map_err(|e| GravityError::Extraction(format!("Failed to open {}: {}", archive_path.display(), e)))?;

        let length = file
            .metadata()
            .map_err(|e| GravityError::Extraction(format!("Failed to stat {}: {}", archive_path.display(), e)))?
            .len();
        if length == 0 {
            return Err(GravityError::Extraction(format!("{} is empty", archive_path.display())));
        }

        let decoder = GzDecoder::new(BufReader::new(file));
        Self::extract_tar_with_strip(decoder, dest_dir, STRIP_COMPONENTS)
    }

    /// Extract tar with prefix stripping
    pub fn extract_tar_with_strip<R: Read>(reader: R, dest_dir: &Path, strip_components: usize) -> Result<()> {
        let mut archive = tar::Archive::new(reader);

        // Canonicalize dest_dir for path traversal check
        let dest_dir_canonical = dest_dir
            .canonicalize()
            .map_err(|e| GravityError::Extraction(format!("Failed to canonicalize destination: {}", e)))?;

        let entries = archive
            .entries()
            .map_err(|e| GravityError::Extraction(format!("Failed to read tar: {}", e)))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| GravityError::Extraction(format!("Failed to read tar entry: {}", e)))?;

            let path = entry
                .path()
                .map_err(|e| GravityError::Extraction(format!("Invalid path in tar: {}", e)))?
                .into_owned();

            let Some(stripped) = strip_path(&path, strip_components)? else {
                continue;
            };

            let entry_type = entry.header().entry_type();
            if !(entry_type.is_dir() || entry_type.is_file() || entry_type.is_symlink()) {
                log::debug!("Skipping {:?} entry {}", entry_type, path.display());
                continue;
            }

            let outpath = dest_dir.join(&stripped);

            // Create parent directories first so we can verify the path
            if entry_type.is_dir() {
                std::fs::create_dir_all(&outpath).map_err(|e| write_failed(&outpath, e))?;
            } else if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(|e| write_failed(parent, e))?;
            }

            let outpath_canonical = if entry_type.is_dir() {
                outpath.canonicalize().map_err(|e| write_failed(&outpath, e))?
            } else {
                // The file itself may not exist yet (or be a dangling symlink)
                let parent = outpath.parent().unwrap_or(dest_dir);
                let parent = parent.canonicalize().map_err(|e| write_failed(parent, e))?;
                match outpath.file_name() {
                    Some(name) => parent.join(name),
                    None => parent,
                }
            };

            if !outpath_canonical.starts_with(&dest_dir_canonical) {
                return Err(GravityError::Extraction(format!(
                    "Path traversal detected: {} escapes destination directory",
                    stripped.display()
                )));
            }

            if !entry_type.is_dir() {
                entry
                    .unpack(&outpath)
                    .map_err(|e| GravityError::Extraction(format!("Failed to extract {}: {}", stripped.display(), e)))?;
            }
        }

        Ok(())
    }
}

fn write_failed(path: &Path, err: std::io::Error) -> GravityError {
    GravityError::Extraction(format!("Failed to write {}: {}", path.display(), err))
}

/// Drop `strip_components` leading components; `None` if nothing is left.
fn strip_path(path: &Path, strip_components: usize) -> Result<Option<PathBuf>> {
    let components: Vec<Component<'_>> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if components.len() <= strip_components {
        return Ok(None);
    }

    let remaining = &components[strip_components..];
    if remaining.iter().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(GravityError::Extraction(format!(
            "Path traversal detected in archive: {}",
            path.display()
        )));
    }

    Ok(Some(remaining.iter().collect()))
}

/// Async front for [`ArchiveExtractor`]; extraction runs on the blocking pool.
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    /// Extract `archive_path` into the existing, empty directory `dest_dir`.
    ///
    /// On failure `dest_dir` is left as-is so the user can inspect it.
    pub async fn install(archive_path: &Path, dest_dir: &Path) -> Result<()> {
        if !dest_dir.is_dir() {
            return Err(GravityError::Extraction(format!(
                "Destination {} is not a directory",
                dest_dir.display()
            )));
        }

        let mut entries = std::fs::read_dir(dest_dir).map_err(|e| write_failed(dest_dir, e))?;
        if entries.next().is_some() {
            return Err(GravityError::Extraction(format!(
                "Destination {} is not empty",
                dest_dir.display()
            )));
        }

        let archive_path = archive_path.to_path_buf();
        let dest_dir = dest_dir.to_path_buf();

        tokio::task::spawn_blocking(move || ArchiveExtractor::extract(&archive_path, &dest_dir))
            .await
            .map_err(|e| GravityError::Extraction(format!("Extraction task failed: {}", e)))?
    }
}
