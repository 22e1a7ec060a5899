//! ZIP 流式打包
//!
//! 包含:
//! - 条目来源抽象 (`EntrySource`)
//! - 目录遍历器 (`DirectoryWalker`)
//! - 增量 ZIP 编码器 (`ArchiveEncoder`)

pub mod encoder;
pub mod walker;

pub use encoder::{ArchiveEncoder, EncodeSummary};
pub use walker::{DirectoryWalker, relative_entry_path};

use crate::error::TransferError;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// 单个打包条目
///
/// `relative_path` 以 `/` 分隔、相对于根目录、非空，
/// 不以 `/` 开头也不含 `..` 段。
pub struct ArchiveEntry {
    pub relative_path: String,
    pub content: Box<dyn AsyncRead + Send + Unpin>,
    pub size: Option<u64>,
}

impl ArchiveEntry {
    pub fn new(
        relative_path: impl Into<String>,
        content: impl AsyncRead + Send + Unpin + 'static,
        size: Option<u64>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: Box::new(content),
            size,
        }
    }
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("relative_path", &self.relative_path)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// 条目来源
///
/// 惰性、有限、不可重启的条目序列。返回 `Ok(None)` 表示耗尽，
/// 返回错误后不应再被调用。
#[async_trait]
pub trait EntrySource: Send {
    async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, TransferError>;
}
