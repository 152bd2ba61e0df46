//! 会话配置
//!
//! 定义会话启动参数。所有参数显式给出，没有隐藏默认值。

use serde::{Deserialize, Serialize};

/// 响应结束标记
///
/// 底层管道协议没有结构化的帧边界，结束标记是唯一可用的响应边界约定。
/// 注入文本与识别前缀允许不同：注入的可以是让子进程打印标记的命令，
/// 识别的是子进程随后实际输出的标记行前缀。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndMarker {
    /// 每条转发输入之后写入子进程的文本（自动追加换行）
    pub inject: String,
    /// 输出行的识别前缀；以此开头的行整行不转发到输出汇
    pub detect: String,
}

impl EndMarker {
    /// 创建注入与识别不同的标记
    pub fn new(inject: impl Into<String>, detect: impl Into<String>) -> Self {
        Self {
            inject: inject.into(),
            detect: detect.into(),
        }
    }

    /// 注入与识别使用同一字符串
    pub fn symmetric(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        Self {
            inject: marker.clone(),
            detect: marker,
        }
    }
}

/// 会话启动参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// 要启动的命令
    pub command: String,
    /// 命令参数
    pub args: Vec<String>,
    /// 提示符文本
    pub prompt: String,
    /// 响应结束标记；None 时同时禁用注入与识别
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<EndMarker>,
    /// 是否在读取任何用户输入之前先发送一次标记
    ///
    /// 用于子进程需要借助标记约定输出自己启动提示的场景；
    /// 同时把提示符初始状态置为"已显示"。
    #[serde(default)]
    pub prime_first: bool,
}

impl SessionConfig {
    /// 创建新的会话配置
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        prompt: impl Into<String>,
        marker: Option<EndMarker>,
        prime_first: bool,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            prompt: prompt.into(),
            marker,
            prime_first,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_marker() {
        let marker = EndMarker::symmetric("<<END>>");
        assert_eq!(marker.inject, "<<END>>");
        assert_eq!(marker.detect, "<<END>>");
    }

    #[test]
    fn test_asymmetric_marker() {
        let marker = EndMarker::new("echo '<<END>>'", "<<END>>");
        assert_eq!(marker.inject, "echo '<<END>>'");
        assert_eq!(marker.detect, "<<END>>");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = SessionConfig::new(
            "bash",
            vec!["-i".to_string()],
            "$ ",
            Some(EndMarker::symmetric("=======================")),
            true,
        );

        let json = serde_json::to_string(&config).unwrap();
        let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_marker_none_omitted_in_json() {
        let config = SessionConfig::new("echo", vec!["hello".to_string()], "$ ", None, false);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("marker"));
    }
}
