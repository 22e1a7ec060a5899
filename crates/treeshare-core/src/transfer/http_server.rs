//! HTTP 传输服务器
//!
//! # 路由
//!
//! - `GET /`、`GET /open?path=<dir>`：目录列表 (JSON)
//! - `GET /download/<path>`：下载文件，或把目录实时打包为 ZIP
//! - `POST /upload`：multipart 上传，字段名 `files`
//!
//! 目录下载在第一块压缩数据产生后才发出响应头，此前的失败仍以状态码
//! 报告。之后出错只能记录日志并中断响应体，客户端会收到一个不完整的 ZIP。

use log::{error, info, warn};

use crate::config::ServerSettings;
use crate::error::TransferError;
use crate::transfer::bridge::StreamingBridge;
use crate::transfer::path::{TransferRequest, resolve_request};
use crate::transfer::pipe::PipeReader;
use crate::transfer::{listing, upload};
use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures_util::{StreamExt, future, stream};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

/// 请求间共享的只读状态
#[derive(Debug)]
pub struct AppState {
    /// 规范化后的上传根目录
    pub root: PathBuf,
    pub bridge: StreamingBridge,
}

impl AppState {
    pub fn new(root: PathBuf, pipe_capacity: usize) -> Self {
        Self {
            root,
            bridge: StreamingBridge::new(pipe_capacity),
        }
    }
}

/// 构建路由
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(listing::list_handler))
        .route("/open", get(listing::list_handler))
        .route("/download/*path", get(download_handler))
        .route(
            "/upload",
            post(upload::upload_handler).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

/// 传输服务器
pub struct TransferServer {
    settings: ServerSettings,
    local_addr: Option<SocketAddr>,
}

impl TransferServer {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings,
            local_addr: None,
        }
    }

    /// 获取实际监听地址（启动后可用）
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    async fn bind(&mut self) -> anyhow::Result<(TcpListener, Router)> {
        tokio::fs::create_dir_all(&self.settings.uploads_dir).await?;
        let root = tokio::fs::canonicalize(&self.settings.uploads_dir).await?;

        let state = Arc::new(AppState::new(
            root.clone(),
            self.settings.effective_pipe_capacity(),
        ));
        let app = router(state, self.settings.max_upload_bytes);

        let listener = TcpListener::bind(&self.settings.listen_addr).await?;
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);

        info!("Serving {:?} on http://{}", root, addr);
        Ok((listener, app))
    }

    /// 在后台启动服务器，返回监听地址
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let (listener, app) = self.bind().await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Server error: {}", e);
            }
        });

        Ok(addr)
    }

    /// 在前台运行，直到 `shutdown` 完成
    pub async fn run_until<F>(mut self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (listener, app) = self.bind().await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Server stopped");
        Ok(())
    }
}

/// 下载处理器
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(requested): Path<String>,
) -> Response {
    let request = match resolve_request(&state.root, &requested).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Download of {:?} rejected: {}", requested, e);
            return e.into_response();
        }
    };

    info!(
        "Download request for {:?} ({})",
        request.root_path,
        if request.is_directory { "directory" } else { "file" }
    );

    if request.is_directory {
        directory_response(&state, request).await
    } else {
        match file_response(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to serve file: {}", e);
                e.into_response()
            }
        }
    }
}

async fn file_response(request: TransferRequest) -> Result<Response, TransferError> {
    let open_err = |source: std::io::Error| TransferError::Open {
        path: request.root_path.clone(),
        source,
    };
    let file = File::open(&request.root_path).await.map_err(open_err)?;
    let length = file.metadata().await.map_err(open_err)?.len();

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            attachment_disposition(&request.download_name),
        ),
        (header::CONTENT_LENGTH, length.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}

async fn directory_response(state: &AppState, request: TransferRequest) -> Response {
    let reader = state.bridge.stream_directory(request.root_path);
    archive_response(reader, &format!("{}.zip", request.download_name)).await
}

/// 等到压缩流的第一块数据再决定状态码
async fn archive_response(mut reader: PipeReader, file_name: &str) -> Response {
    let first = match reader.next().await {
        Some(Ok(chunk)) => chunk,
        Some(Err(e)) => {
            error!("Archive stream for {:?} failed before any data: {}", file_name, e);
            let status = e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<TransferError>())
                .map_or(StatusCode::INTERNAL_SERVER_ERROR, TransferError::status_code);
            return (status, e.to_string()).into_response();
        }
        None => Bytes::new(),
    };

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_DISPOSITION, attachment_disposition(file_name)),
    ];
    let body = stream::once(future::ready(Ok::<_, std::io::Error>(first))).chain(reader);
    (StatusCode::OK, headers, Body::from_stream(body)).into_response()
}

/// 构造 `Content-Disposition` 头
///
/// `filename` 只保留可打印 ASCII，原始名称通过 `filename*` (RFC 5987) 传递。
pub fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    if fallback == name {
        return format!("attachment; filename=\"{fallback}\"");
    }

    let mut encoded = String::new();
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveEntry, EntrySource};
    use async_trait::async_trait;
    use std::io::Cursor;

    /// 产出若干条目后返回权限错误
    struct FailingSource {
        remaining: usize,
    }

    #[async_trait]
    impl EntrySource for FailingSource {
        async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, TransferError> {
            if self.remaining == 0 {
                return Err(TransferError::Open {
                    path: "locked/next.txt".into(),
                    source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                });
            }
            self.remaining -= 1;
            Ok(Some(ArchiveEntry::new(
                format!("file-{:02}.txt", self.remaining),
                Cursor::new(b"some file content".to_vec()),
                Some(17),
            )))
        }
    }

    #[tokio::test]
    async fn test_walk_failure_before_data_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let state = AppState::new(root.clone(), 4096);

        // 解析之后根目录被删除
        let request = TransferRequest {
            root_path: root.join("vanished"),
            is_directory: true,
            download_name: "vanished".to_string(),
        };
        let response = directory_response(&state, request).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn test_empty_directory_response_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let state = AppState::new(root.clone(), 4096);

        let request = TransferRequest {
            root_path: root,
            is_directory: true,
            download_name: "empty".to_string(),
        };
        let response = directory_response(&state, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    }

    #[tokio::test]
    async fn test_failure_mid_stream_aborts_http_body() {
        let app = Router::new().route(
            "/broken.zip",
            get(|| async {
                let reader = StreamingBridge::new(256)
                    .stream_source(FailingSource { remaining: 20 }, "failing".to_string());
                archive_response(reader, "broken.zip").await
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let response = reqwest::get(format!("http://{addr}/broken.zip"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        // 响应体被中断，客户端不会看到正常结束
        assert!(response.bytes().await.is_err());
    }

    #[test]
    fn test_plain_disposition() {
        assert_eq!(
            attachment_disposition("report 2024.pdf"),
            "attachment; filename=\"report 2024.pdf\""
        );
    }

    #[test]
    fn test_disposition_escapes_quotes_and_unicode() {
        assert_eq!(
            attachment_disposition("a\"b.zip"),
            "attachment; filename=\"a_b.zip\"; filename*=UTF-8''a%22b.zip"
        );
        assert_eq!(
            attachment_disposition("文档.zip"),
            "attachment; filename=\"__.zip\"; filename*=UTF-8''%E6%96%87%E6%A1%A3.zip"
        );
    }
}
