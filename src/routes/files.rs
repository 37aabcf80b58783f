//! File catalog routes
//!
//! Upload, list, download and the metadata operations (rename, group/tags,
//! pin, delete). Uploads and downloads stream in bounded chunks so large
//! files never sit in memory whole.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::backup::CHUNK_SIZE;
use crate::db::{
    now_ts, AnalyticsRepository, FileRecord, FileRepository, NewFileRecord, UpdateFileMeta,
};
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

/// POST /api/upload (multipart)
///
/// Stores each uploaded file under `<unix-ts>_<name>` in the blob store and
/// catalogs it.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>> {
    let pool = state.db().await;
    let files = FileRepository::new(&pool);
    let analytics = AnalyticsRepository::new(&pool);
    let upload_dir = &state.config().storage.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await?;

    let mut stored = 0usize;
    while let Some(mut field) = multipart.next_field().await? {
        let Some(original_name) = field.file_name().map(sanitize_file_name) else {
            continue;
        };
        let original_name = original_name?;

        // Timestamp prefix keeps same-named uploads from clobbering each
        // other on disk; the catalog keeps the original name.
        let stored_name = format!("{}_{}", now_ts() as i64, original_name);
        let location = upload_dir.join(&stored_name);

        let mut file = tokio::fs::File::create(&location).await?;
        let mut size: i64 = 0;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as i64;
        }
        file.flush().await?;

        files
            .insert(&NewFileRecord {
                filename: original_name,
                filepath: location.to_string_lossy().into_owned(),
                size,
                group_name: None,
                tags: None,
            })
            .await?;
        analytics.log_traffic("upload", size).await?;
        stored += 1;
    }

    if stored == 0 {
        return Err(AppError::BadRequest("no files in upload".to_string()));
    }

    tracing::info!(count = stored, "Files uploaded");
    Ok(Json(MessageResponse {
        message: "Uploaded successfully".to_string(),
    }))
}

/// GET /api/files
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>> {
    let pool = state.db().await;
    let rows = FileRepository::new(&pool).list().await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    inline: bool,
}

/// GET /api/download/:id
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let pool = state.db().await;
    let record = FileRepository::new(&pool)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let path = PathBuf::from(&record.filepath);
    if !path.is_file() {
        return Err(AppError::NotFound("File not found".to_string()));
    }

    if let Err(e) = AnalyticsRepository::new(&pool)
        .log_traffic("download", record.size)
        .await
    {
        tracing::warn!("Failed to record download traffic: {}", e);
    }

    let content_type = mime_guess::from_path(&record.filename)
        .first_or_octet_stream()
        .to_string();
    let disposition = if query.inline { "inline" } else { "attachment" };

    let file = tokio::fs::File::open(&path).await?;
    let stream = futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            Ok::<_, std::io::Error>(None)
        } else {
            buf.truncate(n);
            Ok(Some((buf, file)))
        }
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, record.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{}\"", record.filename),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(e.to_string()))?)
}

#[derive(Deserialize)]
pub struct RenameRequest {
    new_name: String,
}

#[derive(Serialize)]
pub struct RenameResponse {
    message: String,
    new_name: String,
}

/// PUT /api/rename/:id
pub async fn rename(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<RenameResponse>> {
    let pool = state.db().await;
    let renamed = FileRepository::new(&pool).rename(id, &request.new_name).await?;
    if !renamed {
        return Err(AppError::NotFound("File not found".to_string()));
    }
    Ok(Json(RenameResponse {
        message: "File renamed successfully".to_string(),
        new_name: request.new_name,
    }))
}

/// PUT /api/meta/:id
pub async fn update_meta(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateFileMeta>,
) -> Result<Json<FileRecord>> {
    let pool = state.db().await;
    let record = FileRepository::new(&pool)
        .update_meta(id, &request)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
    Ok(Json(record))
}

#[derive(Serialize)]
pub struct PinResponse {
    message: String,
    is_pinned: bool,
    id: i64,
}

/// POST /api/pin/:id
pub async fn toggle_pin(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PinResponse>> {
    let pool = state.db().await;
    let is_pinned = FileRepository::new(&pool)
        .toggle_pin(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
    Ok(Json(PinResponse {
        message: "Pin status updated".to_string(),
        is_pinned,
        id,
    }))
}

/// DELETE /api/delete/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    let pool = state.db().await;
    let repo = FileRepository::new(&pool);
    let record = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    // Blob first; a leftover row is worse than a leftover file.
    match tokio::fs::remove_file(&record.filepath).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %record.filepath, "Failed to delete blob: {}", e),
    }
    repo.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

/// Reduce a client-supplied file name to a bare name.
fn sanitize_file_name(name: &str) -> Result<String> {
    match FsPath::new(name).file_name() {
        Some(bare) => Ok(bare.to_string_lossy().into_owned()),
        None => Err(AppError::BadRequest(format!("invalid file name: {name:?}"))),
    }
}
