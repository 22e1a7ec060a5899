//! 服务器配置和持久化
//!
//! 提供监听地址、上传目录等设置的存储和读取。

use crate::logging::LogLevel;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 管道默认容量 (64 KiB)
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// 上传请求体默认上限 (1 GiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// 服务器设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// 监听地址
    pub listen_addr: String,
    /// 上传根目录，所有浏览/下载/上传路径都限制在其中
    pub uploads_dir: PathBuf,
    /// 打包管道的缓冲容量（字节）
    pub pipe_capacity: usize,
    /// 上传请求体上限（字节）
    pub max_upload_bytes: usize,
    /// 日志级别
    pub log_level: LogLevel,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
            uploads_dir: PathBuf::from("./uploads"),
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log_level: LogLevel::Info,
        }
    }
}

impl ServerSettings {
    /// 获取默认配置文件路径
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("treeshare");
        config_dir.join("settings.toml")
    }

    /// 从默认路径加载设置（如果文件不存在则使用默认值）
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// 从指定路径加载设置，读取或解析失败时回退到默认值
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(settings) => {
                        debug!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        warn!("Failed to parse settings: {}, using defaults", e);
                    }
                },
                Err(e) => {
                    warn!("Failed to read settings file: {}, using defaults", e);
                }
            }
        }
        Self::default()
    }

    /// 保存设置到指定路径
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// 保存设置到默认路径
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    /// 管道容量，至少 1 字节
    pub fn effective_pipe_capacity(&self) -> usize {
        self.pipe_capacity.max(1)
    }
}
