//! 日志模块
//!
//! 核心库通过 `log` 门面输出日志；守护进程负责安装订阅者。
//! 这里只定义配置文件中使用的日志级别。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 日志级别
///
/// 实现了 `PartialOrd` 以便过滤。
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    /// 获取显示名称
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// 未设置 `RUST_LOG` 时使用的过滤指令
    ///
    /// 依赖库保持在 info 以免 hyper 的 trace 日志刷屏。
    pub fn default_directive(&self) -> String {
        match self {
            LogLevel::Error | LogLevel::Warn | LogLevel::Info => self.name().to_string(),
            LogLevel::Debug | LogLevel::Trace => format!(
                "info,treeshare_core={0},treeshare_daemon={0}",
                self.name()
            ),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(LogLevel::Warn.default_directive(), "warn");
        assert_eq!(
            LogLevel::Debug.default_directive(),
            "info,treeshare_core=debug,treeshare_daemon=debug"
        );
        assert!(LogLevel::Trace > LogLevel::Info);
    }
}
