//! 增量 ZIP 编码器
//!
//! 输出端不可 seek，因此每个条目使用数据描述符 (data descriptor)
//! 记录 CRC 和大小，整个压缩包从头到尾只写一遍。

use crate::archive::EntrySource;
use crate::error::TransferError;
use async_zip::tokio::write::ZipFileWriter;
use async_zip::{Compression, ZipEntryBuilder};
use log::debug;
use tokio::io::AsyncWrite;
use tokio_util::compat::FuturesAsyncWriteCompatExt;

/// 编码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// 写入的条目数
    pub entries: usize,
    /// 未压缩的内容字节数
    pub bytes: u64,
}

/// ZIP 编码器
#[derive(Debug, Clone, Copy)]
pub struct ArchiveEncoder {
    compression: Compression,
}

impl Default for ArchiveEncoder {
    fn default() -> Self {
        Self {
            compression: Compression::Deflate,
        }
    }
}

impl ArchiveEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不压缩，原样存储
    pub fn stored() -> Self {
        Self {
            compression: Compression::Stored,
        }
    }

    /// 把 `source` 的所有条目依次写入 `sink`
    ///
    /// 只有在来源耗尽后才写入中央目录。来源或复制失败时立即返回该错误，
    /// 已写出的字节保持原样，中央目录不会写入，解码端会发现压缩包不完整。
    pub async fn encode<S, W>(
        &self,
        source: &mut S,
        sink: W,
    ) -> Result<EncodeSummary, TransferError>
    where
        S: EntrySource + ?Sized,
        W: AsyncWrite + Unpin,
    {
        let mut writer = ZipFileWriter::with_tokio(sink);
        let mut summary = EncodeSummary::default();

        while let Some(mut entry) = source.next_entry().await? {
            let builder = ZipEntryBuilder::new(entry.relative_path.clone().into(), self.compression);

            let mut entry_writer = writer.write_entry_stream(builder).await?.compat_write();
            let copied = tokio::io::copy(&mut entry.content, &mut entry_writer).await?;
            entry_writer.into_inner().close().await?;

            debug!("Archived {} ({} bytes)", entry.relative_path, copied);
            summary.entries += 1;
            summary.bytes += copied;
            // 文件句柄随 entry 一起在这里释放
        }

        writer.close().await?;
        Ok(summary)
    }
}
