//! End-to-end backup pipeline tests: export the live stores, feed the
//! artifacts back through the restore path, and compare bytes.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use drop_server::backup::{
    archive, merge, registry, split, swap, validate, workspace::Workspace, BackupContext,
    BackupError, BACKUP_GROUP, BACKUP_TAG, DB_ENTRY,
};
use drop_server::db::{self, FileRepository, NewFileRecord};

const TEST_THRESHOLD: u64 = 500;

struct Fixture {
    _dir: TempDir,
    ctx: BackupContext,
    db_url: String,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let ctx = BackupContext {
            db_path: dir.path().join("metadata.db"),
            blob_root: dir.path().join("uploads"),
            backup_dir: dir.path().join("backups"),
            split_threshold: TEST_THRESHOLD,
        };
        let db_url = format!("sqlite:{}", ctx.db_path.display());
        Self {
            _dir: dir,
            ctx,
            db_url,
        }
    }

    async fn seed(&self) {
        let pool = db::create_pool(&self.db_url).await.unwrap();
        let repo = FileRepository::new(&pool);
        for name in ["notes.txt", "photo.jpg"] {
            repo.insert(&NewFileRecord {
                filename: name.to_string(),
                filepath: format!("{}/{name}", self.ctx.blob_root.display()),
                size: 10,
                group_name: None,
                tags: None,
            })
            .await
            .unwrap();
        }
        db::checkpoint_wal(&pool).await.unwrap();
        pool.close().await;

        fs::create_dir_all(self.ctx.blob_root.join("sub")).unwrap();
        fs::write(self.ctx.blob_root.join("notes.txt"), b"some notes").unwrap();
        // Large enough that the archive must split at the test threshold.
        let big: Vec<u8> = (0..2000u32).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(self.ctx.blob_root.join("sub/photo.jpg"), &big).unwrap();
    }

    fn blob_bytes(&self) -> Vec<(PathBuf, Vec<u8>)> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
            let mut entries: Vec<_> = fs::read_dir(dir).unwrap().map(|e| e.unwrap()).collect();
            entries.sort_by_key(|e| e.file_name());
            for entry in entries {
                let path = entry.path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    out.push((rel, fs::read(&path).unwrap()));
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.ctx.blob_root, &self.ctx.blob_root, &mut out);
        out
    }
}

fn run_export(ctx: &BackupContext) -> Vec<drop_server::backup::BackupArtifact> {
    let (name, scratch) = archive::build_archive(ctx).unwrap();
    split::split_archive(ctx, &scratch, &name).unwrap()
}

fn run_restore_from_parts(ctx: &BackupContext, parts: Vec<PathBuf>) -> Result<String, BackupError> {
    let workspace = Workspace::prepare(&ctx.backup_dir).unwrap();
    for part in &parts {
        let name = part.file_name().unwrap().to_string_lossy().into_owned();
        fs::copy(part, workspace.part_path(&name).unwrap()).unwrap();
    }

    let result = (|| {
        let merged = merge::merge_parts(&workspace, workspace.saved_parts().unwrap())?;
        validate::validate_archive(&merged)?;
        let extract_dir = workspace.extract_dir();
        archive::unpack_archive(&merged, &extract_dir)?;
        swap::swap_live_data(ctx, &extract_dir)
    })();
    workspace.clean();
    result
}

#[tokio::test]
async fn export_then_restore_is_byte_identical() {
    let fixture = Fixture::new();
    fixture.seed().await;

    let db_before = fs::read(&fixture.ctx.db_path).unwrap();
    let blobs_before = fixture.blob_bytes();

    let artifacts = run_export(&fixture.ctx);
    assert!(
        artifacts.len() > 1,
        "fixture should be large enough to force a split, got {} artifact(s)",
        artifacts.len()
    );
    let total: u64 = artifacts.iter().map(|a| a.size).sum();
    assert!(artifacts.iter().all(|a| a.size > 0));
    assert!(total > TEST_THRESHOLD);

    // Registry writer catalogs the parts (and mutates the live db after the
    // snapshot was taken, like any other post-export traffic).
    let pool = db::create_pool(&fixture.db_url).await.unwrap();
    registry::register_artifacts(&pool, &artifacts).await.unwrap();
    let rows = FileRepository::new(&pool).list().await.unwrap();
    let backup_rows: Vec<_> = rows
        .iter()
        .filter(|r| r.group_name.as_deref() == Some(BACKUP_GROUP))
        .collect();
    assert_eq!(backup_rows.len(), artifacts.len());
    assert!(backup_rows.iter().all(|r| r.tags.as_deref() == Some(BACKUP_TAG)));
    db::checkpoint_wal(&pool).await.unwrap();
    pool.close().await;

    // Upload the parts in reversed order; the merger sorts by name.
    let mut parts: Vec<PathBuf> = artifacts.iter().map(|a| a.path.clone()).collect();
    parts.reverse();
    let snapshot_name = run_restore_from_parts(&fixture.ctx, parts).unwrap();

    assert_eq!(fs::read(&fixture.ctx.db_path).unwrap(), db_before);
    assert_eq!(fixture.blob_bytes(), blobs_before);

    // The snapshot holds the pre-restore live data, registry rows included.
    let snapshot = fixture.ctx.backup_dir.join(&snapshot_name);
    assert!(snapshot.join(DB_ENTRY).is_file());
    assert!(snapshot.join("uploads/sub/photo.jpg").is_file());
    let snapshot_pool =
        db::create_pool(&format!("sqlite:{}", snapshot.join(DB_ENTRY).display()))
            .await
            .unwrap();
    let snapshot_rows = FileRepository::new(&snapshot_pool).list().await.unwrap();
    assert!(snapshot_rows
        .iter()
        .any(|r| r.group_name.as_deref() == Some(BACKUP_GROUP)));
    snapshot_pool.close().await;

    // The restored catalog predates the registry insert.
    let pool = db::create_pool(&fixture.db_url).await.unwrap();
    let rows = FileRepository::new(&pool).list().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.group_name.is_none()));
    pool.close().await;
}

#[tokio::test]
async fn single_whole_archive_restores_without_merge() {
    let fixture = Fixture::new();
    fixture.seed().await;

    // Raise the threshold so the export yields one unsplit archive.
    let mut big_ctx = fixture.ctx.clone();
    big_ctx.split_threshold = u64::MAX;
    let artifacts = run_export(&big_ctx);
    assert_eq!(artifacts.len(), 1);
    assert!(!split::is_part_name(&artifacts[0].name));

    let snapshot = run_restore_from_parts(&fixture.ctx, vec![artifacts[0].path.clone()]);
    assert!(snapshot.is_ok());
    assert_eq!(
        fs::read(fixture.ctx.blob_root.join("notes.txt")).unwrap(),
        b"some notes"
    );
}

#[tokio::test]
async fn invalid_upload_aborts_before_touching_live_data() {
    let fixture = Fixture::new();
    fixture.seed().await;

    let db_before = fs::read(&fixture.ctx.db_path).unwrap();
    let db_mtime = fs::metadata(&fixture.ctx.db_path).unwrap().modified().unwrap();

    let garbage = fixture.ctx.backup_dir.join("not_an_archive.zip");
    fs::create_dir_all(&fixture.ctx.backup_dir).unwrap();
    fs::write(&garbage, b"garbage bytes, not a zip").unwrap();

    let result = run_restore_from_parts(&fixture.ctx, vec![garbage]);
    assert!(matches!(result, Err(BackupError::Validation(_))));

    assert_eq!(fs::read(&fixture.ctx.db_path).unwrap(), db_before);
    assert_eq!(
        fs::metadata(&fixture.ctx.db_path).unwrap().modified().unwrap(),
        db_mtime
    );
    // No safety snapshot was created: the swapper never ran.
    let snapshots: Vec<_> = fs::read_dir(&fixture.ctx.backup_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("pre_restore_"))
        .collect();
    assert!(snapshots.is_empty());
}

#[tokio::test]
async fn failed_swap_still_leaves_a_safety_snapshot() {
    let fixture = Fixture::new();
    fixture.seed().await;

    let artifacts = run_export(&fixture.ctx);
    let workspace = Workspace::prepare(&fixture.ctx.backup_dir).unwrap();
    for artifact in &artifacts {
        fs::copy(&artifact.path, workspace.part_path(&artifact.name).unwrap()).unwrap();
    }
    let merged = merge::merge_parts(&workspace, workspace.saved_parts().unwrap()).unwrap();
    validate::validate_archive(&merged).unwrap();
    let extract_dir = workspace.extract_dir();
    archive::unpack_archive(&merged, &extract_dir).unwrap();

    // Sabotage the extraction between validation and swap: the precondition
    // check fires before any live data moves.
    fs::remove_file(extract_dir.join(DB_ENTRY)).unwrap();
    let result = swap::swap_live_data(&fixture.ctx, &extract_dir);
    assert!(result.is_err());
    assert!(fixture.ctx.db_path.is_file());

    // Now run a swap that reaches the snapshot: the snapshot persists even
    // though nothing else of the attempt does.
    fs::write(extract_dir.join(DB_ENTRY), b"replacement").unwrap();
    let snapshot_name = swap::swap_live_data(&fixture.ctx, &extract_dir).unwrap();
    workspace.clean();

    let snapshot = fixture.ctx.backup_dir.join(snapshot_name);
    assert!(snapshot.join(DB_ENTRY).is_file());
    assert!(snapshot.join("uploads").is_dir());
    assert!(fs::read_dir(&snapshot).unwrap().count() > 0);
}
