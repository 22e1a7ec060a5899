//! 流式桥接
//!
//! 后台任务运行 遍历器 -> 编码器，写入管道写端；调用方拿到读端，
//! 边生成边转发。压缩包从不整体驻留内存或磁盘。

use crate::archive::{ArchiveEncoder, DirectoryWalker, EncodeSummary, EntrySource};
use crate::error::TransferError;
use crate::transfer::pipe::{PipeReader, pipe};
use log::{debug, info, warn};
use std::path::PathBuf;

/// 流式桥接器
#[derive(Debug, Clone, Copy)]
pub struct StreamingBridge {
    capacity: usize,
    encoder: ArchiveEncoder,
}

impl StreamingBridge {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            encoder: ArchiveEncoder::new(),
        }
    }

    pub fn with_encoder(mut self, encoder: ArchiveEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// 把目录打包成 ZIP 流
    pub fn stream_directory(&self, root: impl Into<PathBuf>) -> PipeReader {
        let root = root.into();
        let label = root.display().to_string();
        self.stream_source(DirectoryWalker::new(root), label)
    }

    /// 把任意条目来源打包成 ZIP 流
    ///
    /// 必须在 tokio 运行时中调用。丢弃返回的读端会让后台任务尽快退出。
    pub fn stream_source<S>(&self, mut source: S, label: String) -> PipeReader
    where
        S: EntrySource + 'static,
    {
        let (mut writer, reader) = pipe(self.capacity);
        let encoder = self.encoder;

        tokio::spawn(async move {
            let cancel = writer.cancel_token();
            let result = tokio::select! {
                () = cancel.cancelled() => Err(TransferError::Cancelled),
                encoded = encoder.encode(&mut source, &mut writer) => encoded,
            };

            let result = settle(result, writer.is_cancelled());

            match &result {
                Ok(summary) => info!(
                    "Archive stream for {} finished: {} entries, {} bytes",
                    label, summary.entries, summary.bytes
                ),
                Err(TransferError::Cancelled) => {
                    debug!("Archive stream for {} cancelled by consumer", label);
                }
                Err(e) => warn!("Archive stream for {} aborted: {}", label, e),
            }

            drop(source);
            writer.close(result.map(|_| ()));
        });

        reader
    }
}

/// 读端已经消失时，任何错误都只是断开的结果
fn settle(
    result: Result<EncodeSummary, TransferError>,
    cancelled: bool,
) -> Result<EncodeSummary, TransferError> {
    match result {
        Err(_) if cancelled => Err(TransferError::Cancelled),
        other => other,
    }
}
