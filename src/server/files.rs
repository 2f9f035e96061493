use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::auth::RequireAccount;
use crate::error::Error;
use crate::quota::{self, Limits};
use crate::server::AppState;
use crate::server::dto::{RenameFileRequest, UploadedFile, WriteFileRequest};
use crate::server::response::ApiError;
use crate::server::sites::load_owned_site;
use crate::storage::ReadResult;
use crate::types::Site;

fn owner_limits(state: &AppState, site: &Site) -> Result<Limits, ApiError> {
    let owner = state
        .store
        .get_account(&site.account_id)?
        .ok_or_else(|| ApiError::not_found("Site not found"))?;
    Ok(quota::limits(owner.role, owner.plan))
}

/// Writes one file, accounting the storage delta before any bytes land.
/// An overwrite only charges the growth; a shrink refunds afterwards.
async fn store_file(
    state: &AppState,
    site: &Site,
    relative: &str,
    bytes: &[u8],
) -> Result<u64, Error> {
    let root = state.sites.root_for(site);
    state.storage.ensure_root(&root).await?;

    let previous = state.storage.file_size(&root, relative).await?;
    let delta = bytes.len() as i64 - previous as i64;

    if delta > 0 {
        state.sites.record_upload(site, delta)?;
    }

    match state.storage.write(&root, relative, bytes).await {
        Ok(outcome) => {
            if delta < 0 {
                state.sites.record_deletion(site, -delta)?;
            }
            Ok(outcome.size)
        }
        Err(e) => {
            // The reservation was charged but nothing was written.
            if delta > 0 {
                if let Err(refund) = state.sites.record_deletion(site, delta) {
                    tracing::error!(
                        site_id = site.id,
                        "failed to refund storage after write error: {refund}"
                    );
                }
            }
            Err(e)
        }
    }
}

pub async fn write_file(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
    Json(req): Json<WriteFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;

    let filename = req
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Filename is required"))?;
    let content = req.content.unwrap_or_default();
    let bytes = content.as_bytes();

    let limits = owner_limits(&state, &site)?;
    if bytes.len() as i64 > limits.max_upload_bytes {
        return Err(Error::QuotaExceeded("file exceeds upload size limit".into()).into());
    }

    store_file(&state, &site, &filename, bytes).await?;

    Ok(Json(json!({
        "message": "File saved successfully",
        "filename": filename,
    })))
}

pub async fn read_file(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path((id, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    let root = state.sites.root_for(&site);

    let body = match state.storage.read(&root, &path).await.map_err(read_error)? {
        ReadResult::Text { content, size } => {
            json!({ "filename": path, "content": content, "size": size })
        }
        ReadResult::Binary { size } => {
            json!({ "filename": path, "size": size, "type": "binary" })
        }
        ReadResult::Directory(files) => json!({ "path": path, "files": files }),
    };

    Ok(Json(body))
}

pub async fn rename_file(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path((id, path)): Path<(String, String)>,
    Json(req): Json<RenameFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;

    let new_filename = req
        .new_filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("New filename is required"))?;

    let root = state.sites.root_for(&site);
    let clobbered = state
        .storage
        .rename(&root, &path, &new_filename)
        .await
        .map_err(read_error)?;

    // A rename that replaced an existing destination freed its bytes.
    if clobbered > 0 {
        state.sites.record_deletion(&site, clobbered as i64)?;
    }

    Ok(Json(json!({
        "message": "File renamed",
        "file": { "name": new_filename }
    })))
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path((id, path)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    let root = state.sites.root_for(&site);

    let freed = state.storage.delete(&root, &path).await?;
    if freed > 0 {
        state.sites.record_deletion(&site, freed as i64)?;
    }

    Ok(Json(json!({ "message": "File deleted" })))
}

pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    auth: RequireAccount,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let site = load_owned_site(&state, &auth.account, &id)?;
    let limits = owner_limits(&state, &site)?;

    let mut pending: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?
    {
        let Some(filename) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {e}")))?;
        pending.push((filename, bytes.to_vec()));
    }

    if pending.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }
    // Count is checked before any file is written so a too-large batch
    // does not land partially.
    if pending.len() > limits.max_files_per_upload {
        return Err(ApiError::bad_request(format!(
            "Too many files (max {} per upload)",
            limits.max_files_per_upload
        )));
    }

    let mut results = Vec::with_capacity(pending.len());
    for (filename, bytes) in pending {
        if bytes.len() as i64 > limits.max_upload_bytes {
            results.push(UploadedFile {
                name: filename,
                size: bytes.len() as u64,
                status: "rejected",
                error: Some("File exceeds plan size limit".to_string()),
            });
            continue;
        }

        match store_file(&state, &site, &filename, &bytes).await {
            Ok(size) => results.push(UploadedFile {
                name: filename,
                size,
                status: "uploaded",
                error: None,
            }),
            Err(Error::QuotaExceeded(_)) => results.push(UploadedFile {
                name: filename,
                size: bytes.len() as u64,
                status: "rejected",
                error: Some("Storage limit reached".to_string()),
            }),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(json!({ "files": results })))
}

/// File lookups answer 404 for anything the caller should not learn
/// about, including containment violations.
fn read_error(e: Error) -> ApiError {
    match e {
        Error::NotFound | Error::Traversal => ApiError::not_found("File not found"),
        e => e.into(),
    }
}
