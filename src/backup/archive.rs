//! Archive builder and unpacker
//!
//! An archive has exactly two logical roots: the `metadata.db` snapshot and
//! an `uploads/` tree mirroring the blob store's relative paths. Building is
//! strictly read-only against live data.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{copy_chunked, BackupContext, BackupError, BLOB_ENTRY_ROOT, DB_ENTRY};

/// Build a compressed archive of the metadata store and blob tree at a
/// scratch path inside the backup directory.
///
/// Returns the artifact base name (`backup_<ts>.zip`, numerically suffixed
/// when another export claimed the same timestamp) and the scratch path.
/// The splitter moves or cuts the scratch file into its final form. On any
/// failure the partial scratch file is removed before returning.
pub fn build_archive(ctx: &BackupContext) -> Result<(String, PathBuf), BackupError> {
    fs::create_dir_all(&ctx.backup_dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let (name, scratch, file) = claim_scratch(&ctx.backup_dir, &stamp)?;

    let result = write_archive(ctx, file);
    if result.is_err() {
        let _ = fs::remove_file(&scratch);
    }
    result?;

    Ok((name, scratch))
}

/// Claim a scratch file for a new archive. `create_new` is the uniqueness
/// primitive: exports started within the same second get distinct base
/// names via a numeric suffix, so neither their scratch files nor their
/// final artifacts can collide. A base name whose final artifact already
/// exists on disk is skipped too.
fn claim_scratch(
    backup_dir: &Path,
    stamp: &str,
) -> Result<(String, PathBuf, File), BackupError> {
    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("backup_{stamp}.zip")
        } else {
            format!("backup_{stamp}_{counter}.zip")
        };
        if backup_dir.join(&name).exists() && counter < 1000 {
            counter += 1;
            continue;
        }
        let scratch = backup_dir.join(format!("{name}.building"));
        match File::create_new(&scratch) {
            Ok(file) => return Ok((name, scratch, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && counter < 1000 => {
                counter += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn write_archive(ctx: &BackupContext, file: File) -> Result<(), BackupError> {
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true)
        .unix_permissions(0o644);

    zip.start_file(DB_ENTRY, options)?;
    let mut db = File::open(&ctx.db_path)?;
    copy_chunked(&mut db, &mut zip)?;

    if ctx.blob_root.is_dir() {
        add_tree(&mut zip, &ctx.blob_root, &ctx.blob_root, options)?;
    }

    zip.finish()?;
    Ok(())
}

/// Recursively add `dir` under the `uploads/` archive root, preserving
/// relative paths. Entries are added in name order.
fn add_tree(
    zip: &mut ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), BackupError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            zip.add_directory(format!("{}/", entry_name(root, &path)?), options)?;
            add_tree(zip, root, &path, options)?;
        } else if file_type.is_file() {
            zip.start_file(entry_name(root, &path)?, options)?;
            let mut blob = File::open(&path)?;
            copy_chunked(&mut blob, zip)?;
        }
        // Symlinks and other special files are not part of the blob store.
    }
    Ok(())
}

/// Archive entry name for a blob: `uploads/<relative path>` with forward
/// slashes regardless of platform.
fn entry_name(root: &Path, path: &Path) -> Result<String, BackupError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| BackupError::Validation(format!("path escapes blob root: {}", path.display())))?;
    let mut name = String::from(BLOB_ENTRY_ROOT);
    for component in rel.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    Ok(name)
}

/// Extract a validated archive into `dest`, preserving the two archive
/// roots. Entry paths are confined to `dest`; entries that would escape it
/// are rejected.
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), BackupError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    fs::create_dir_all(dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let rel = entry.enclosed_name().ok_or_else(|| {
            BackupError::Validation(format!("unsafe entry path in archive: {}", entry.name()))
        })?;
        let target = dest.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            copy_chunked(&mut entry, &mut out)?;
        }
    }
    Ok(())
}
