//! Image archive extraction and packing.
//!
//! Image archives are tarballs named `<image>.tar`. Extraction sniffs the
//! gzip magic rather than trusting the extension, because committed images
//! are gzip-compressed under the same `.tar` name.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use burrow_common::error::{BurrowError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extracts a tar archive (plain or gzip) into `target`.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or unpacked.
pub fn unpack_archive(archive_path: &Path, target: &Path) -> Result<()> {
    tracing::info!(
        archive = %archive_path.display(),
        target = %target.display(),
        "extracting image"
    );

    std::fs::create_dir_all(target).map_err(|e| BurrowError::io(target, e))?;

    let is_gzip = is_gzip_archive(archive_path)?;
    let file = File::open(archive_path).map_err(|e| BurrowError::io(archive_path, e))?;
    let reader = BufReader::new(file);

    let result = if is_gzip {
        unpack_from(flate2::read::GzDecoder::new(reader), target)
    } else {
        unpack_from(reader, target)
    };
    result.map_err(|e| BurrowError::io(target, e))
}

fn unpack_from(reader: impl Read, target: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    archive.unpack(target)
}

/// Determines whether the file starts with the gzip magic bytes.
fn is_gzip_archive(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| BurrowError::io(path, e))?;
    let mut magic = [0u8; 2];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(BurrowError::io(path, e)),
    }
}

/// Packs the contents of `source` into a gzip tarball at `archive_path`.
///
/// Symlinks are stored as links, not followed, so absolute links inside a
/// container root do not pull in host files.
///
/// # Errors
///
/// Returns an error if the archive cannot be created or a file under
/// `source` cannot be read.
pub fn pack_directory(source: &Path, archive_path: &Path) -> Result<()> {
    tracing::info!(
        source = %source.display(),
        archive = %archive_path.display(),
        "packing image"
    );

    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| BurrowError::io(parent, e))?;
    }
    let file = File::create(archive_path).map_err(|e| BurrowError::io(archive_path, e))?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());

    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", source)
        .map_err(|e| BurrowError::io(source, e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| BurrowError::io(archive_path, e))?;
    let _ = encoder
        .finish()
        .map_err(|e| BurrowError::io(archive_path, e))?;
    Ok(())
}
