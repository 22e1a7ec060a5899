//! Treeshare Core Library
//!
//! 通过 HTTP 共享一个目录树：浏览、上传、下载单个文件，
//! 或把整个子目录实时打包成 ZIP 流式下载。
//!
//! # 模块
//!
//! - **archive**: 目录遍历和增量 ZIP 编码
//! - **transfer**: 有界管道、流式桥接、HTTP 服务器
//! - **config**: 服务器设置的加载和保存
//! - **logging**: 日志级别定义
//!
//! # 使用示例
//!
//! ## 启动服务器
//!
//! ```ignore
//! use treeshare_core::{ServerSettings, TransferServer};
//!
//! let server = TransferServer::new(ServerSettings::load());
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! ```
//!
//! ## 直接获取目录的 ZIP 流
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use treeshare_core::StreamingBridge;
//!
//! let mut reader = StreamingBridge::new(64 * 1024).stream_directory("./uploads/project");
//! while let Some(chunk) = reader.next().await {
//!     out.write_all(&chunk?).await?;
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod logging;
pub mod transfer;

// Archive re-exports
pub use archive::{ArchiveEncoder, ArchiveEntry, DirectoryWalker, EncodeSummary, EntrySource};

// Transfer re-exports
pub use transfer::{
    DirectoryListing, ListingEntry, PipeReader, PipeWriter, StreamingBridge, TransferRequest,
    TransferServer, pipe,
};

pub use config::ServerSettings;
pub use error::TransferError;
pub use logging::LogLevel;
