//! Archive splitter
//!
//! Archives at or below the threshold are delivered whole. Larger archives
//! are cut into threshold-sized parts named `<base>.<seq>` with a
//! three-digit zero-padded sequence starting at 001. The padding is what
//! makes lexicographic part order equal numeric order, which caps an
//! archive at 999 parts.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use super::{copy_limited, BackupArtifact, BackupContext, BackupError, MAX_PARTS};

/// Name of part `seq` of `base`
pub fn part_name(base: &str, seq: u64) -> String {
    format!("{base}.{seq:03}")
}

/// Whether `name` carries a part suffix (`.NNN`)
pub fn is_part_name(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, suffix)) => {
            !stem.is_empty() && suffix.len() == 3 && suffix.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// Turn the scratch archive into deliverable artifacts inside the backup
/// directory.
///
/// At or below the threshold the archive is renamed in place as the single
/// artifact, with no part suffix. Above it, the archive is stream-read in
/// threshold-sized slices written as individual parts, and the unsplit
/// original is removed once every part exists. The sum of part sizes always
/// equals the original archive size and no part is empty.
pub fn split_archive(
    ctx: &BackupContext,
    scratch: &Path,
    base_name: &str,
) -> Result<Vec<BackupArtifact>, BackupError> {
    let size = fs::metadata(scratch)?.len();

    if size <= ctx.split_threshold {
        let dest = ctx.backup_dir.join(base_name);
        fs::rename(scratch, &dest)?;
        return Ok(vec![BackupArtifact {
            name: base_name.to_string(),
            path: dest,
            size,
        }]);
    }

    let part_count = size.div_ceil(ctx.split_threshold);
    if part_count > MAX_PARTS {
        let _ = fs::remove_file(scratch);
        return Err(BackupError::TooManyParts { size });
    }

    let mut reader = File::open(scratch)?;
    let mut artifacts: Vec<BackupArtifact> = Vec::with_capacity(part_count as usize);
    for seq in 1..=part_count {
        let name = part_name(base_name, seq);
        let path = ctx.backup_dir.join(&name);
        match write_part(&mut reader, &path, ctx.split_threshold) {
            Ok(written) => artifacts.push(BackupArtifact {
                name,
                path,
                size: written,
            }),
            Err(e) => {
                // A failed export leaves nothing behind: partial output,
                // finished parts and the scratch archive are all removed.
                let _ = fs::remove_file(&path);
                for artifact in &artifacts {
                    let _ = fs::remove_file(&artifact.path);
                }
                let _ = fs::remove_file(scratch);
                return Err(e.into());
            }
        }
    }
    fs::remove_file(scratch)?;

    tracing::info!(
        archive = base_name,
        size,
        parts = artifacts.len(),
        "Archive split into parts"
    );
    Ok(artifacts)
}

fn write_part(reader: &mut File, path: &Path, limit: u64) -> std::io::Result<u64> {
    use std::io::Write;
    let mut writer = BufWriter::new(File::create(path)?);
    let written = copy_limited(reader, &mut writer, limit)?;
    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const T: u64 = 1024;

    fn context(dir: &TempDir) -> BackupContext {
        let ctx = BackupContext {
            db_path: dir.path().join("metadata.db"),
            blob_root: dir.path().join("uploads"),
            backup_dir: dir.path().join("backups"),
            split_threshold: T,
        };
        fs::create_dir_all(&ctx.backup_dir).unwrap();
        ctx
    }

    fn scratch_of_len(dir: &TempDir, len: u64) -> std::path::PathBuf {
        let path = dir.path().join("backups/scratch.zip.building");
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn part_names_are_zero_padded() {
        assert_eq!(part_name("backup_x.zip", 1), "backup_x.zip.001");
        assert_eq!(part_name("backup_x.zip", 42), "backup_x.zip.042");
        assert_eq!(part_name("backup_x.zip", 999), "backup_x.zip.999");
    }

    #[test]
    fn part_name_detection() {
        assert!(is_part_name("backup_20240101_120000.zip.001"));
        assert!(is_part_name("backup.zip.999"));
        assert!(!is_part_name("backup_20240101_120000.zip"));
        assert!(!is_part_name("archive.z01"));
        assert!(!is_part_name("no_dots"));
        assert!(!is_part_name("four.1234"));
    }

    #[test]
    fn small_archive_is_delivered_whole() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let scratch = scratch_of_len(&dir, T);

        let artifacts = split_archive(&ctx, &scratch, "backup_a.zip").unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "backup_a.zip");
        assert_eq!(artifacts[0].size, T);
        assert!(!is_part_name(&artifacts[0].name));
        assert!(!scratch.exists());
    }

    #[test]
    fn oversized_archive_is_cut_into_exact_parts() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let original = fs::read(scratch_of_len(&dir, 5 * T + 1)).unwrap();
        let scratch = dir.path().join("backups/scratch.zip.building");

        let artifacts = split_archive(&ctx, &scratch, "backup_b.zip").unwrap();
        assert_eq!(artifacts.len(), 6);
        assert!(!scratch.exists());

        let total: u64 = artifacts.iter().map(|a| a.size).sum();
        assert_eq!(total, 5 * T + 1);
        assert!(artifacts.iter().all(|a| a.size > 0));
        assert_eq!(artifacts[0].name, "backup_b.zip.001");
        assert_eq!(artifacts[5].name, "backup_b.zip.006");
        assert_eq!(artifacts[5].size, 1);

        let mut reassembled = Vec::new();
        for artifact in &artifacts {
            reassembled.extend(fs::read(&artifact.path).unwrap());
        }
        assert_eq!(reassembled, original);
    }

    #[test]
    fn more_than_999_parts_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir);
        ctx.split_threshold = 1;
        let scratch = scratch_of_len(&dir, 1000);

        let err = split_archive(&ctx, &scratch, "backup_d.zip").unwrap_err();
        assert!(matches!(err, BackupError::TooManyParts { size: 1000 }));
        assert!(!scratch.exists());
        let leftovers: Vec<_> = fs::read_dir(&ctx.backup_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_part_write_removes_parts_and_scratch() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let scratch = scratch_of_len(&dir, 3 * T);
        // A directory squatting on the second part name makes its
        // File::create fail mid-split.
        fs::create_dir_all(ctx.backup_dir.join("backup_e.zip.002")).unwrap();

        assert!(split_archive(&ctx, &scratch, "backup_e.zip").is_err());
        assert!(!ctx.backup_dir.join("backup_e.zip.001").exists());
        assert!(!scratch.exists());
    }

    #[test]
    fn boundary_sizes_produce_expected_part_counts() {
        for (len, expected) in [(0, 1), (T - 1, 1), (T, 1), (T + 1, 2), (5 * T, 5)] {
            let dir = TempDir::new().unwrap();
            let ctx = context(&dir);
            let scratch = scratch_of_len(&dir, len);

            let artifacts = split_archive(&ctx, &scratch, "backup_c.zip").unwrap();
            assert_eq!(artifacts.len(), expected, "len {len}");
            let total: u64 = artifacts.iter().map(|a| a.size).sum();
            assert_eq!(total, len, "len {len}");
        }
    }
}
