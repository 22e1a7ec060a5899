//! 目录列表

use crate::error::TransferError;
use crate::transfer::http_server::AppState;
use crate::transfer::path::{display_relative, resolve_under_root};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub path: Option<String>,
}

/// 列表中的单个条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub name: String,
    /// 相对于根目录的路径，可直接用于 `/open` 和 `/download/`
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub path: String,
    pub entries: Vec<ListingEntry>,
}

pub(crate) async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let requested = query.path.unwrap_or_default();
    match list_directory(&state.root, &requested).await {
        Ok(listing) => Json(listing).into_response(),
        Err(ListError::NotADirectory) => {
            (StatusCode::BAD_REQUEST, "not a directory").into_response()
        }
        Err(ListError::Transfer(e)) => {
            warn!("Listing of {:?} failed: {}", requested, e);
            e.into_response()
        }
    }
}

#[derive(Debug)]
pub enum ListError {
    NotADirectory,
    Transfer(TransferError),
}

impl From<TransferError> for ListError {
    fn from(e: TransferError) -> Self {
        ListError::Transfer(e)
    }
}

impl From<std::io::Error> for ListError {
    fn from(e: std::io::Error) -> Self {
        ListError::Transfer(TransferError::Io(e))
    }
}

/// 列出根目录下 `requested` 的直接子项，按名称排序
pub async fn list_directory(root: &Path, requested: &str) -> Result<DirectoryListing, ListError> {
    let dir = resolve_under_root(root, requested).await?;
    if !tokio::fs::metadata(&dir).await?.is_dir() {
        return Err(ListError::NotADirectory);
    }

    let mut reader = tokio::fs::read_dir(&dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        // 条目可能在读取期间被删除
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let path = entry.path();
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: display_relative(root, &path),
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(DirectoryListing {
        path: display_relative(root, &dir),
        entries,
    })
}
