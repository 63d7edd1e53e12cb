//! Atomic file persistence for lifecycle files.

use std::fs::Permissions;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::Builder;

/// Mode given to every lifecycle file, whatever the process umask.
pub(super) const FILE_MODE: u32 = 0o644;

/// Writes the provided bytes to the path using an atomic persist step.
///
/// Data is flushed and fsync'd before the temporary file is renamed into
/// place so a concurrent `stop` never reads a half-written identifier. The
/// mode is applied to the open file after creation, so a umask inherited
/// from a detached parent cannot narrow it.
pub(super) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut builder = Builder::new();
    builder.prefix(
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("fallen"),
    );
    builder.permissions(Permissions::from_mode(FILE_MODE));

    let mut file = builder.tempfile_in(directory)?;
    file.as_file()
        .set_permissions(Permissions::from_mode(FILE_MODE))?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
