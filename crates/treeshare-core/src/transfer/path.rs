//! 请求路径解析
//!
//! 客户端给出的路径先做词法检查（拒绝 `..`、绝对路径和盘符），
//! 再与根目录拼接并规范化，最终结果必须仍位于根目录之下。
//! 检查在任何文件系统访问之前完成。

use crate::error::TransferError;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// 一次下载请求的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// 规范化后的绝对路径
    pub root_path: PathBuf,
    pub is_directory: bool,
    /// 用于 `Content-Disposition` 的名称
    pub download_name: String,
}

/// 把客户端路径转换为相对路径
///
/// 空路径和 `.` 表示根目录本身。
pub fn normalize_relative(requested: &str) -> Result<PathBuf, TransferError> {
    let trimmed = requested.trim_start_matches('/');
    let mut result = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TransferError::PathEscape(requested.to_string()));
            }
        }
    }

    Ok(result)
}

/// 在根目录下解析路径并确认其存在
///
/// `root` 必须已经规范化。符号链接会被解析，指向根目录之外时拒绝。
pub async fn resolve_under_root(root: &Path, requested: &str) -> Result<PathBuf, TransferError> {
    let relative = normalize_relative(requested)?;
    let candidate = root.join(&relative);

    let canonical = match fs::canonicalize(&candidate).await {
        Ok(path) => path,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(TransferError::NotFound(requested.to_string()));
        }
        Err(e) => return Err(TransferError::Io(e)),
    };

    if !canonical.starts_with(root) {
        return Err(TransferError::PathEscape(requested.to_string()));
    }
    Ok(canonical)
}

/// 解析下载请求：文件、目录或不存在
pub async fn resolve_request(root: &Path, requested: &str) -> Result<TransferRequest, TransferError> {
    let path = resolve_under_root(root, requested).await?;
    let metadata = fs::metadata(&path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TransferError::NotFound(requested.to_string()),
        _ => TransferError::Io(e),
    })?;

    if !metadata.is_dir() && !metadata.is_file() {
        return Err(TransferError::NotFound(requested.to_string()));
    }

    let download_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());

    Ok(TransferRequest {
        root_path: path,
        is_directory: metadata.is_dir(),
        download_name,
    })
}

/// 把根目录下的绝对路径转换为以 `/` 分隔的相对路径
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
        assert_eq!(normalize_relative("/a/./b").unwrap(), PathBuf::from("a/b"));
        assert_eq!(normalize_relative("").unwrap(), PathBuf::new());
    }

    #[test]
    fn test_normalize_rejects_parent_segments() {
        for bad in ["..", "../etc/passwd", "a/../../b", "a/.."] {
            assert!(
                matches!(normalize_relative(bad), Err(TransferError::PathEscape(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("project/sub")).unwrap();
        std::fs::write(root.join("project/a.txt"), "hello").unwrap();

        let file = resolve_request(&root, "project/a.txt").await.unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.download_name, "a.txt");
        assert_eq!(file.root_path, root.join("project/a.txt"));

        let folder = resolve_request(&root, "project").await.unwrap();
        assert!(folder.is_directory);
        assert_eq!(folder.download_name, "project");
    }

    #[tokio::test]
    async fn test_resolve_missing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();

        let err = resolve_request(&root, "nope.txt").await.unwrap_err();
        assert!(matches!(err, TransferError::NotFound(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();

        let err = resolve_request(&root, "escape").await.unwrap_err();
        assert!(matches!(err, TransferError::PathEscape(_)), "{err:?}");
    }

    #[test]
    fn test_display_relative() {
        let root = Path::new("/srv/uploads");
        assert_eq!(display_relative(root, Path::new("/srv/uploads/a/b.txt")), "a/b.txt");
        assert_eq!(display_relative(root, root), "");
    }
}
