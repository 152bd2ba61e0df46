//! 输入/输出边界
//!
//! 会话核心通过抽象的行式输出汇与输入源和外部界面解耦：
//! 任何实现这两个 trait 的对象都可以接入，终端如何渲染与核心无关。
//!
//! 提供的实现：
//! - `StdoutSink` / `StdinSource`：桥接本进程的标准流
//! - `ChannelSink` / `ChannelSource`：通过 mpsc 通道转发，用于测试和嵌入
//! - `ScriptedSource`：预置行序列，取尽后返回 EOF

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::utils::SessionError;

/// 行式输出汇
///
/// 写入不自动追加换行；调用方决定何时刷新。
#[async_trait]
pub trait OutputSink: Send {
    /// 写入文本
    async fn write(&mut self, text: &str) -> Result<(), SessionError>;
    /// 刷新缓冲
    async fn flush(&mut self) -> Result<(), SessionError>;
}

/// 行式输入源
#[async_trait]
pub trait InputSource: Send {
    /// 读取一行（不含换行符）；EOF 时返回 None
    async fn read_line(&mut self) -> Result<Option<String>, SessionError>;
}

/// 标准输出汇
pub struct StdoutSink {
    inner: tokio::io::Stdout,
}

impl StdoutSink {
    /// 创建写入本进程标准输出的输出汇
    pub fn new() -> Self {
        Self {
            inner: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputSink for StdoutSink {
    async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        self.inner
            .write_all(text.as_bytes())
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), SessionError> {
        self.inner
            .flush()
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))
    }
}

/// 标准输入源
pub struct StdinSource {
    inner: BufReader<tokio::io::Stdin>,
}

impl StdinSource {
    /// 创建读取本进程标准输入的输入源
    pub fn new() -> Self {
        Self {
            inner: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinSource {
    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        let mut buf = String::new();
        let n = self.inner.read_line(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        trim_line_ending(&mut buf);
        Ok(Some(buf))
    }
}

/// 通道输出汇
///
/// 把每次写入作为一条消息转发到无界通道，接收端可逐条检查。
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// 创建通道输出汇，返回其接收端
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        self.tx
            .send(text.to_string())
            .map_err(|e| SessionError::WriteFailed(e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}

/// 通道输入源
///
/// 发送端掉落后 `read_line` 返回 EOF。
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelSource {
    /// 创建通道输入源，返回其发送端
    pub fn new() -> (mpsc::UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl InputSource for ChannelSource {
    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        Ok(self.rx.recv().await)
    }
}

/// 脚本输入源
///
/// 按顺序产出预置的行，取尽后返回 EOF。
pub struct ScriptedSource {
    lines: VecDeque<String>,
}

impl ScriptedSource {
    /// 创建预置行序列的输入源
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// 创建立即 EOF 的输入源
    pub fn empty() -> Self {
        Self {
            lines: VecDeque::new(),
        }
    }
}

#[async_trait]
impl InputSource for ScriptedSource {
    async fn read_line(&mut self) -> Result<Option<String>, SessionError> {
        Ok(self.lines.pop_front())
    }
}

/// 去掉行尾的 \n 与 \r\n
fn trim_line_ending(buf: &mut String) {
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
}
