//! Zip archive ingestion and emission.
//!
//! Both directions are containment-checked: extraction refuses entries that
//! would land outside the target directory, packing refuses files that do
//! not live under the given root. Either check runs over the whole batch
//! before the first byte is written.

use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::error::{WorkspaceError, WorkspaceResult};
use super::layout::{relative_name, relative_segments};

/// Entries containing this marker are macOS resource forks, not content
pub const MACOS_METADATA_MARKER: &str = "__MACOSX";

/// Extract every file entry of `archive` under `target`.
///
/// Directory entries and macOS metadata are skipped. Returns the relative
/// names written, in archive order. A write failure aborts the extraction
/// and leaves already-written entries in place.
pub fn extract(archive: &[u8], target: &Path) -> WorkspaceResult<Vec<String>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;

    // Plan every destination first so an escaping entry aborts before any write
    let mut plan: Vec<(usize, PathBuf, String)> = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let name = entry.name().to_string();

        if entry.is_dir() || name.ends_with('/') || name.ends_with('\\') {
            continue;
        }
        if name.contains(MACOS_METADATA_MARKER) {
            debug!(entry = %name, "Skipping macOS metadata entry");
            continue;
        }

        let segments = relative_segments(&name)?;
        let mut destination = target.to_path_buf();
        destination.extend(&segments);
        plan.push((index, destination, segments.join("/")));
    }

    let mut written = Vec::with_capacity(plan.len());
    for (index, destination, relative) in plan {
        let mut entry = zip.by_index(index)?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(ZipError::Io)?;
        }
        let mut output = File::create(&destination).map_err(ZipError::Io)?;
        io::copy(&mut entry, &mut output).map_err(ZipError::Io)?;
        output.flush().map_err(ZipError::Io)?;

        debug!(file = %relative, "Extracted archive entry");
        written.push(relative);
    }

    info!(
        target = %target.display(),
        files = written.len(),
        "Extracted archive"
    );
    Ok(written)
}

/// Pack `files` into a zip archive, naming each entry relative to `root`.
///
/// Every file must live under `root`; otherwise nothing is packed and
/// `ContainmentViolation` is returned. An empty file list produces an
/// empty archive; deciding whether that is an error is up to the caller.
pub fn pack(files: &[PathBuf], root: &Path) -> WorkspaceResult<Vec<u8>> {
    let names = files
        .iter()
        .map(|file| relative_name(file, root))
        .collect::<WorkspaceResult<Vec<_>>>()?;

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (file, name) in files.iter().zip(&names) {
        writer.start_file(name.as_str(), options)?;
        let mut input = File::open(file).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => WorkspaceError::FileNotFound(file.clone()),
            _ => WorkspaceError::Archive(ZipError::Io(e)),
        })?;
        io::copy(&mut input, &mut writer).map_err(ZipError::Io)?;
    }

    let bytes = writer.finish()?.into_inner();
    debug!(files = names.len(), bytes = bytes.len(), "Packed archive");
    Ok(bytes)
}
