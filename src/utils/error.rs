//! 错误类型定义
//!
//! 定义会话驱动的错误类型，提供描述性错误消息。
//!
//! ## 功能
//! - 定义 SessionError 枚举，涵盖所有可能的错误类型
//! - 实现错误转换（From trait）
//! - 提供错误分类和辅助方法

use thiserror::Error;

/// 会话错误类型
#[derive(Debug, Error)]
pub enum SessionError {
    /// 子进程启动失败（命令不存在、权限不足等），致命错误
    #[error("子进程启动失败: {0}")]
    SpawnFailed(String),

    /// 流已到达末尾；这是正常的终止信号，驱动 DRAINING 转换
    #[error("流已关闭: {0}")]
    StreamClosed(String),

    /// 写入已关闭的管道或输出汇失败；对端已消失，不重试
    #[error("写入失败: {0}")]
    WriteFailed(String),

    /// 输入被外部中断信号取消，与输入 EOF 同等对待
    #[error("会话被中断")]
    Interrupted,

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),
}

impl SessionError {
    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            SessionError::SpawnFailed(_) => "spawn_failed",
            SessionError::StreamClosed(_) => "stream_closed",
            SessionError::WriteFailed(_) => "write_failed",
            SessionError::Interrupted => "interrupted",
            SessionError::IoError(_) => "io_error",
        }
    }

    /// 是否为致命错误
    ///
    /// 致命错误在任何参与者启动之前同步上报给调用方；
    /// 其余错误由检测到的参与者就地处理（设置终止标志并退出）。
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::SpawnFailed(_))
    }

    /// 是否为正常的关闭信号而非故障
    pub fn is_shutdown_signal(&self) -> bool {
        matches!(
            self,
            SessionError::StreamClosed(_) | SessionError::Interrupted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_names() {
        assert_eq!(
            SessionError::SpawnFailed("x".to_string()).error_type(),
            "spawn_failed"
        );
        assert_eq!(
            SessionError::WriteFailed("x".to_string()).error_type(),
            "write_failed"
        );
        assert_eq!(SessionError::Interrupted.error_type(), "interrupted");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SessionError::SpawnFailed("no such file".to_string()).is_fatal());
        assert!(!SessionError::Interrupted.is_fatal());
        assert!(!SessionError::WriteFailed("broken pipe".to_string()).is_fatal());
    }

    #[test]
    fn test_shutdown_signal_classification() {
        assert!(SessionError::StreamClosed("stdout".to_string()).is_shutdown_signal());
        assert!(SessionError::Interrupted.is_shutdown_signal());
        assert!(!SessionError::SpawnFailed("x".to_string()).is_shutdown_signal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: SessionError = io_err.into();
        assert_eq!(err.error_type(), "io_error");
    }
}
