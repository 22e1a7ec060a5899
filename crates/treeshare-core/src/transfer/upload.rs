//! 文件上传
//!
//! 每个名为 `files` 的 multipart 字段保存为根目录下的一个文件，
//! 文件名可以带 `/` 分隔的子目录（浏览器上传整个文件夹时如此）。
//! 每个文件单独报告结果，一个失败不影响后续文件。

use crate::error::TransferError;
use crate::transfer::http_server::AppState;
use crate::transfer::path::normalize_relative;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{info, warn};
use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// 上传字段名
pub const UPLOAD_FIELD: &str = "files";

pub(crate) async fn upload_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut report = String::new();
    let mut seen = 0usize;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                let _ = writeln!(report, "Failed to parse multipart form: {}", e.body_text());
                break;
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        seen += 1;

        let Some(file_name) = field.file_name().map(str::to_owned) else {
            let _ = writeln!(report, "Skipping part #{seen}: missing filename");
            continue;
        };

        match save_field(&state.root, &file_name, field).await {
            Ok((path, bytes)) => {
                info!("Uploaded {:?} ({} bytes)", path, bytes);
                let _ = writeln!(report, "File {file_name} uploaded successfully ({bytes} bytes)");
            }
            Err(e) => {
                warn!("Upload of {:?} failed: {}", file_name, e);
                let _ = writeln!(report, "Error saving file {file_name}: {e}");
            }
        }
    }

    if seen == 0 && report.is_empty() {
        return (StatusCode::OK, "no files uploaded\n").into_response();
    }
    (StatusCode::OK, report).into_response()
}

/// 计算上传目标路径并创建父目录
///
/// 词法检查之后，在创建任何目录之前校验已存在祖先的真实路径，
/// 创建之后再校验一次父目录，经由符号链接的路径不会在根目录之外留下痕迹。
pub async fn prepare_target(root: &Path, file_name: &str) -> Result<PathBuf, TransferError> {
    let relative = normalize_relative(file_name)?;
    if relative.as_os_str().is_empty() {
        return Err(TransferError::PathEscape(file_name.to_string()));
    }

    let target = root.join(&relative);
    let parent = target
        .parent()
        .ok_or_else(|| TransferError::PathEscape(file_name.to_string()))?;

    // 创建目录之前，先确认已存在的最深祖先位于根目录之下
    let mut existing = parent;
    let canonical_existing = loop {
        match fs::canonicalize(existing).await {
            Ok(path) => break path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                existing = existing
                    .parent()
                    .ok_or_else(|| TransferError::PathEscape(file_name.to_string()))?;
            }
            Err(e) => return Err(e.into()),
        }
    };
    if !canonical_existing.starts_with(root) {
        return Err(TransferError::PathEscape(file_name.to_string()));
    }
    fs::create_dir_all(parent).await?;

    let canonical_parent = fs::canonicalize(parent).await?;
    if !canonical_parent.starts_with(root) {
        return Err(TransferError::PathEscape(file_name.to_string()));
    }
    let name = target
        .file_name()
        .ok_or_else(|| TransferError::PathEscape(file_name.to_string()))?;
    Ok(canonical_parent.join(name))
}

async fn save_field(
    root: &Path,
    file_name: &str,
    mut field: Field<'_>,
) -> Result<(PathBuf, u64), TransferError> {
    let target = prepare_target(root, file_name).await?;
    let mut file = fs::File::create(&target).await?;

    let written = async {
        let mut written = 0u64;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<_, TransferError>(written)
    }
    .await;

    match written {
        Ok(bytes) => Ok((target, bytes)),
        Err(e) => {
            drop(file);
            let _ = fs::remove_file(&target).await;
            Err(e)
        }
    }
}
