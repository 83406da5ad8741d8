//! Reading and writing zstd-compressed tarballs.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{archive_relative, Locations};
use crate::utils::{ActionsError, Result};

/// File extension of archives and exports.
pub const EXTENSION: &str = "tar.zst";

/// Write the given absolute paths into a compressed tarball.
///
/// Missing paths are skipped with a warning, matching how an app may declare
/// a directory it has not created yet.
pub fn write<W: Write>(writer: W, paths: &[PathBuf], level: i32) -> Result<W> {
    let encoder = zstd::Encoder::new(writer, level)?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for path in paths {
        let name = archive_relative(path)?;
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Skipping missing path {}", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Adding {} as {}", path.display(), name.display());
        if metadata.is_dir() {
            builder.append_dir_all(&name, path)?;
        } else {
            builder.append_path_with_name(path, &name)?;
        }
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Return the contents of a single file stored in the tarball.
pub fn read_entry<R: Read>(reader: R, file: &Path) -> Result<Vec<u8>> {
    let wanted = archive_relative(file)?;
    let mut archive = tar::Archive::new(zstd::Decoder::new(reader)?);

    for entry in archive.entries()? {
        let mut entry = entry?;
        if *entry.path()? == *wanted {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            return Ok(content);
        }
    }

    Err(ActionsError::MissingEntry(file.display().to_string()))
}

/// Unpack the entries covered by `locations` below `destination`.
///
/// Returns the number of entries written.
pub fn extract<R: Read>(reader: R, locations: &Locations, destination: &Path) -> Result<usize> {
    let filter = LocationFilter::new(locations)?;
    let mut archive = tar::Archive::new(zstd::Decoder::new(reader)?);
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(nix::unistd::geteuid().is_root());
    archive.set_overwrite(true);

    fs::create_dir_all(destination)?;

    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        if !filter.matches(&path) {
            continue;
        }

        if entry.unpack_in(destination)? {
            count += 1;
        } else {
            warn!("Skipping entry outside destination: {}", path.display());
        }
    }

    Ok(count)
}

/// Archive-relative view of restore locations.
struct LocationFilter {
    directories: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl LocationFilter {
    fn new(locations: &Locations) -> Result<Self> {
        Ok(Self {
            directories: locations
                .directories
                .iter()
                .map(|p| archive_relative(p))
                .collect::<Result<_>>()?,
            files: locations
                .files
                .iter()
                .map(|p| archive_relative(p))
                .collect::<Result<_>>()?,
        })
    }

    fn matches(&self, path: &Path) -> bool {
        self.directories.iter().any(|dir| path.starts_with(dir))
            || self.files.iter().any(|file| path == file)
    }
}
