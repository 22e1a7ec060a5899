//! 目录遍历器
//!
//! 深度优先遍历根目录，每个目录内按名称字典序访问，
//! 对每个普通文件产出一个 `ArchiveEntry`。目录本身不产出，
//! 空目录因此不会出现在压缩包中；符号链接和其他特殊文件被跳过。

use crate::archive::{ArchiveEntry, EntrySource};
use crate::error::TransferError;
use async_trait::async_trait;
use log::debug;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// 目录遍历器
pub struct DirectoryWalker {
    root: PathBuf,
    pending: Vec<std::vec::IntoIter<PathBuf>>,
    started: bool,
    finished: bool,
}

impl DirectoryWalker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: Vec::new(),
            started: false,
            finished: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn advance(&mut self) -> Result<Option<ArchiveEntry>, TransferError> {
        if !self.started {
            self.started = true;
            let children = read_sorted(&self.root).await?;
            self.pending.push(children.into_iter());
        }

        while let Some(level) = self.pending.last_mut() {
            let Some(path) = level.next() else {
                self.pending.pop();
                continue;
            };

            let metadata = fs::symlink_metadata(&path)
                .await
                .map_err(|source| TransferError::Walk {
                    path: path.clone(),
                    source,
                })?;
            let file_type = metadata.file_type();

            if file_type.is_dir() {
                let children = read_sorted(&path).await?;
                self.pending.push(children.into_iter());
                continue;
            }
            if !file_type.is_file() {
                debug!("Skipping non-regular entry {:?}", path);
                continue;
            }

            let relative_path = relative_entry_path(&self.root, &path)?;
            let content = fs::File::open(&path)
                .await
                .map_err(|source| TransferError::Open {
                    path: path.clone(),
                    source,
                })?;

            return Ok(Some(ArchiveEntry::new(
                relative_path,
                content,
                Some(metadata.len()),
            )));
        }

        Ok(None)
    }
}

#[async_trait]
impl EntrySource for DirectoryWalker {
    async fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, TransferError> {
        if self.finished {
            return Ok(None);
        }
        let next = self.advance().await;
        if !matches!(next, Ok(Some(_))) {
            self.finished = true;
            self.pending.clear();
        }
        next
    }
}

async fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>, TransferError> {
    let walk_err = |source: std::io::Error| TransferError::Walk {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(walk_err)?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(walk_err)? {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}

/// 计算 `path` 相对于 `root` 的压缩包内路径
///
/// 结果以 `/` 分隔，不以 `/` 开头，不含 `.` 或 `..` 段。
pub fn relative_entry_path(root: &Path, path: &Path) -> Result<String, TransferError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| TransferError::EntryPath(path.to_path_buf()))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(TransferError::EntryPath(path.to_path_buf())),
        }
    }

    if segments.is_empty() {
        return Err(TransferError::EntryPath(path.to_path_buf()));
    }
    Ok(segments.join("/"))
}
