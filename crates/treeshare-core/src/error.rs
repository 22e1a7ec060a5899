//! 传输错误
//!
//! 下载、遍历、打包和上传共用的错误类型。响应头发出之前的错误会映射为
//! HTTP 状态码；之后的错误只能通过截断响应体体现。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::PathBuf;

/// 传输错误
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path escapes the uploads root: {0}")]
    PathEscape(String),

    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Directory walk failed at {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot derive archive path for {0:?}")]
    EntryPath(PathBuf),

    #[error("Archive error: {0}")]
    Archive(#[from] async_zip::error::ZipError),

    #[error("Malformed upload: {0}")]
    Upload(String),

    #[error("Transfer cancelled by consumer")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// 响应头发出前对应的状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            TransferError::NotFound(_) => StatusCode::NOT_FOUND,
            TransferError::PathEscape(_) => StatusCode::FORBIDDEN,
            TransferError::Upload(_) => StatusCode::BAD_REQUEST,
            TransferError::Open { source, .. } if source.kind() == io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 转换为 `io::Error`，用于跨越管道交给读取端
    pub fn into_io_error(self) -> io::Error {
        match self {
            TransferError::Io(e) => e,
            cancelled @ TransferError::Cancelled => {
                io::Error::new(io::ErrorKind::BrokenPipe, cancelled)
            }
            other => io::Error::other(other),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for TransferError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        TransferError::Upload(e.body_text())
    }
}

impl IntoResponse for TransferError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            TransferError::NotFound(_) => "file not found".to_string(),
            TransferError::PathEscape(_) => "path outside of uploads root".to_string(),
            other => other.to_string(),
        };
        (status, message).into_response()
    }
}
