//! 有界字节管道
//!
//! 单写单读。写端关闭时携带最终结果，读端在读完缓冲数据后
//! 观察到该结果：成功时为流结束，失败时为一次错误。
//!
//! 读端被丢弃时会取消写端持有的 `CancellationToken`，
//! 之后写端的写入也会返回 `BrokenPipe`。

use crate::error::TransferError;
use bytes::Bytes;
use futures_util::Stream;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::sync::oneshot;
use tokio_util::io::ReaderStream;
use tokio_util::sync::{CancellationToken, DropGuard};

type Outcome = Result<(), TransferError>;

/// 创建容量为 `capacity` 字节的管道
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let capacity = capacity.max(1);
    let (write_half, read_half) = tokio::io::duplex(capacity);
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let cancel = CancellationToken::new();

    let writer = PipeWriter {
        inner: write_half,
        outcome: outcome_tx,
        cancel: cancel.clone(),
    };
    let reader = PipeReader {
        body: Some(ReaderStream::with_capacity(read_half, capacity)),
        outcome: Some(outcome_rx),
        _cancel_on_drop: cancel.drop_guard(),
    };
    (writer, reader)
}

/// 管道写端
pub struct PipeWriter {
    inner: DuplexStream,
    outcome: oneshot::Sender<Outcome>,
    cancel: CancellationToken,
}

impl PipeWriter {
    /// 读端消失时被取消的令牌
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 关闭写端并把 `result` 交给读端
    pub fn close(self, result: Result<(), TransferError>) {
        let PipeWriter { inner, outcome, .. } = self;
        // 先发送结果再断开数据流，读端读到 EOF 时结果已就绪
        let _ = outcome.send(result);
        drop(inner);
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// 管道读端，作为字节块流使用
pub struct PipeReader {
    body: Option<ReaderStream<DuplexStream>>,
    outcome: Option<oneshot::Receiver<Outcome>>,
    _cancel_on_drop: DropGuard,
}

impl Stream for PipeReader {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(body) = this.body.as_mut() {
            match ready!(Pin::new(body).poll_next(cx)) {
                Some(chunk) => return Poll::Ready(Some(chunk)),
                None => this.body = None,
            }
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };
        let result = ready!(Pin::new(outcome).poll(cx));
        this.outcome = None;

        match result {
            Ok(Ok(())) => Poll::Ready(None),
            Ok(Err(e)) => Poll::Ready(Some(Err(e.into_io_error()))),
            Err(_) => Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "archive producer exited without closing the pipe",
            )))),
        }
    }
}
