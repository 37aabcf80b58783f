//! Backup export and restore endpoints
//!
//! Export: archive builder → splitter → registry writer. Restore: receiver
//! → merger → validator → swapper → cleaner, serialized by a global lock
//! and tracked through an explicit phase sequence.

use std::path::PathBuf;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::task;

use crate::backup::{
    archive, merge, registry, split, swap, validate, workspace::Workspace, BackupArtifact,
    BackupContext, BackupError, RestoreError, RestorePhase,
};
use crate::db;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ExportResponse {
    artifacts: Vec<String>,
}

#[derive(Serialize)]
pub struct RestoreResponse {
    snapshot: String,
}

/// POST /api/export
///
/// Read-only against live data until the final catalog insert, so exports
/// may run concurrently with normal traffic and with each other. The shared
/// live-data guard only keeps a restore's swapping phase out.
pub async fn export(State(state): State<AppState>) -> Result<Json<ExportResponse>> {
    let ctx = BackupContext::from_config(state.config());
    let pool = state.db().await;

    let artifacts = {
        let _live = state.live_data().read().await;
        // Fold the WAL into the database file so the archived copy is
        // complete on its own.
        db::checkpoint_wal(&pool).await?;

        let build_ctx = ctx.clone();
        task::spawn_blocking(move || -> std::result::Result<Vec<BackupArtifact>, BackupError> {
            let (name, scratch) = archive::build_archive(&build_ctx)?;
            split::split_archive(&build_ctx, &scratch, &name)
        })
        .await
        .map_err(|e| AppError::Internal(format!("export task failed: {e}")))??
    };

    // Artifacts are on disk at this point; a failed insert leaves them
    // uncataloged rather than removing them.
    registry::register_artifacts(&pool, &artifacts)
        .await
        .map_err(|e| {
            AppError::Internal(format!(
                "backup written to disk but not cataloged: {e}"
            ))
        })?;

    let names: Vec<String> = artifacts.into_iter().map(|a| a.name).collect();
    tracing::info!(artifacts = names.len(), "Export complete");
    Ok(Json(ExportResponse { artifacts: names }))
}

/// POST /api/restore (multipart list of backup parts)
///
/// Returns the safety snapshot directory name on success. The workspace is
/// cleaned on every outcome; the snapshot never is.
pub async fn restore(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RestoreResponse>> {
    let _restore_guard = state
        .restore_lock()
        .try_lock()
        .map_err(|_| AppError::RestoreInProgress)?;

    let ctx = BackupContext::from_config(state.config());
    let workspace = Workspace::prepare(&ctx.backup_dir)
        .map_err(|e| RestoreError::new(RestorePhase::Receiving, e))?;

    let result = run_restore(&state, &ctx, &workspace, multipart).await;
    if let Err(e) = &result {
        tracing::warn!(phase = %RestorePhase::Aborted, "Restore failed: {}", e);
    }
    workspace.clean();

    let snapshot = result?;
    Ok(Json(RestoreResponse { snapshot }))
}

async fn run_restore(
    state: &AppState,
    ctx: &BackupContext,
    workspace: &Workspace,
    multipart: Multipart,
) -> Result<String> {
    tracing::info!(phase = %RestorePhase::Receiving, "Restore started");
    receive_parts(workspace, multipart).await?;

    tracing::info!(phase = %RestorePhase::Merging, "Reassembling archive");
    let parts = workspace
        .saved_parts()
        .map_err(|e| RestoreError::new(RestorePhase::Merging, e))?;
    let ws = workspace.clone();
    let extracted: PathBuf = task::spawn_blocking(move || {
        let merged = merge::merge_parts(&ws, parts)
            .map_err(|e| RestoreError::new(RestorePhase::Merging, e))?;

        tracing::info!(phase = %RestorePhase::Validating, "Validating archive");
        validate::validate_archive(&merged)
            .map_err(|e| RestoreError::new(RestorePhase::Validating, e))?;

        let extract_dir = ws.extract_dir();
        archive::unpack_archive(&merged, &extract_dir)
            .map_err(|e| RestoreError::new(RestorePhase::Validating, e))?;
        Ok::<_, RestoreError>(extract_dir)
    })
    .await
    .map_err(|e| AppError::Internal(format!("restore task failed: {e}")))??;

    tracing::info!(phase = %RestorePhase::Swapping, "Swapping live data");
    // Exclusive live-data access: no export may be mid-read, none may start.
    let _live = state.live_data().write().await;

    let pool = state.db().await;
    if let Err(e) = db::checkpoint_wal(&pool).await {
        tracing::warn!("WAL checkpoint before swap failed: {}", e);
    }
    state.close_db().await;

    let swap_ctx = ctx.clone();
    let swap_result = task::spawn_blocking(move || swap::swap_live_data(&swap_ctx, &extracted))
        .await
        .map_err(|e| AppError::Internal(format!("swap task failed: {e}")))?;

    // Reconnect whatever happened: a failed swap still needs a working pool
    // for the operator to inspect state. Schema init migrates snapshots from
    // older versions forward.
    match db::create_pool(&state.config().database.url()).await {
        Ok(pool) => state.install_db(pool).await,
        Err(e) => tracing::error!("Failed to reopen database after swap: {}", e),
    }

    let snapshot = swap_result.map_err(|e| RestoreError::new(RestorePhase::Swapping, e))?;
    tracing::info!(phase = %RestorePhase::Done, snapshot = %snapshot, "Restore complete");
    Ok(snapshot)
}

/// Receiver: stream every uploaded part into the workspace under its own
/// (sanitized) name, in bounded chunks.
async fn receive_parts(workspace: &Workspace, mut multipart: Multipart) -> Result<()> {
    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let path = workspace
            .part_path(&name)
            .map_err(|e| RestoreError::new(RestorePhase::Receiving, e))?;

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| RestoreError::new(RestorePhase::Receiving, e))?;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| RestoreError::new(RestorePhase::Receiving, e))?;
        }
        file.flush()
            .await
            .map_err(|e| RestoreError::new(RestorePhase::Receiving, e))?;

        tracing::debug!(part = %name, "Part received");
    }
    Ok(())
}
