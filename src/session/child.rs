//! 子进程管理
//!
//! 以三路独立管道启动子进程。管道由操作系统按行可及地缓冲，
//! 数据一经写出即可被读取方取到，不存在大块缓冲延迟。

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::utils::SessionError;

/// 子进程实例
///
/// 输入流只允许转发器写入，两路输出流只允许各自的读取器读取；
/// 通过 `take_*` 把流句柄移交给对应参与者，移交后本结构不再访问它们。
#[derive(Debug)]
pub struct ChildProcess {
    /// 进程句柄
    child: Child,
    /// 子进程输入流
    stdin: Option<ChildStdin>,
    /// 子进程标准输出（行缓冲读取器）
    stdout: Option<BufReader<ChildStdout>>,
    /// 子进程标准错误（行缓冲读取器）
    stderr: Option<BufReader<ChildStderr>>,
}

impl ChildProcess {
    /// 启动子进程
    ///
    /// 命令无法启动（不存在、权限不足）时立即返回 `SpawnFailed`，
    /// 调用方不得再启动任何读写参与者。
    pub fn spawn(command: &str, args: &[String]) -> Result<Self, SessionError> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::SpawnFailed(format!("{}: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stdin 管道不可用".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stdout 管道不可用".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stderr 管道不可用".to_string()))?;

        tracing::debug!("子进程已启动: {} (pid {:?})", command, child.id());

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: Some(BufReader::new(stdout)),
            stderr: Some(BufReader::new(stderr)),
        })
    }

    /// 写入字节到子进程输入流
    pub async fn write_input(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SessionError::WriteFailed("子进程输入流已关闭".to_string()))?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| SessionError::WriteFailed(e.to_string()))
    }

    /// 从子进程标准输出读取一行；流关闭时返回 None
    pub async fn read_output_line(&mut self) -> Result<Option<String>, SessionError> {
        match self.stdout.as_mut() {
            Some(reader) => read_one_line(reader).await,
            None => Err(SessionError::StreamClosed("stdout 已移交读取器".to_string())),
        }
    }

    /// 从子进程标准错误读取一行；流关闭时返回 None
    pub async fn read_error_line(&mut self) -> Result<Option<String>, SessionError> {
        match self.stderr.as_mut() {
            Some(reader) => read_one_line(reader).await,
            None => Err(SessionError::StreamClosed("stderr 已移交读取器".to_string())),
        }
    }

    /// 关闭子进程输入流
    pub fn close_input(&mut self) {
        self.stdin.take();
    }

    /// 移交子进程输入流
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// 移交子进程标准输出
    pub fn take_stdout(&mut self) -> Option<BufReader<ChildStdout>> {
        self.stdout.take()
    }

    /// 移交子进程标准错误
    pub fn take_stderr(&mut self) -> Option<BufReader<ChildStderr>> {
        self.stderr.take()
    }

    /// 检查子进程是否已退出
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, SessionError> {
        self.child.try_wait().map_err(SessionError::from)
    }

    /// 等待子进程退出
    pub async fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        self.child.wait().await.map_err(SessionError::from)
    }

    /// 终止子进程
    pub async fn kill(&mut self) -> Result<(), SessionError> {
        self.child.kill().await.map_err(SessionError::from)
    }
}

async fn read_one_line<R>(reader: &mut BufReader<R>) -> Result<Option<String>, SessionError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.ends_with('\n') {
        buf.pop();
        if buf.ends_with('\r') {
            buf.pop();
        }
    }
    Ok(Some(buf))
}
