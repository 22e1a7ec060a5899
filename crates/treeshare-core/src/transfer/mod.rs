//! 传输模块
//!
//! 包含:
//! - 有界管道 (写端携带错误关闭)
//! - 流式桥接 (后台打包 -> 管道 -> 响应体)
//! - 请求路径解析与根目录约束
//! - HTTP 服务器、目录列表和上传

pub mod bridge;
pub mod http_server;
pub mod listing;
pub mod path;
pub mod pipe;
pub mod upload;

pub use bridge::StreamingBridge;
pub use http_server::{AppState, TransferServer, router};
pub use listing::{DirectoryListing, ListingEntry};
pub use path::TransferRequest;
pub use pipe::{PipeReader, PipeWriter, pipe};
