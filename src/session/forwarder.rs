//! 输入转发器
//!
//! 从输入源逐行读取，转发到子进程输入流，并在每条输入之后注入
//! 结束标记。读取下一条输入之前先等待队列排空：上一条响应尚未
//! 转发完毕时不向用户征集新输入，避免输出与输入在界面上交错。

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::io::InputSource;
use crate::queue::LineQueue;
use crate::utils::ShutdownFlag;

/// 转发器任务句柄
pub struct ForwarderHandle {
    task: JoinHandle<()>,
}

impl ForwarderHandle {
    /// 检查任务是否已结束
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }

    /// 取出底层任务句柄
    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

/// 启动转发器任务
///
/// `prime_first` 为 true 时在读取任何输入之前先注入一次标记，
/// 让子进程按标记约定输出自己的启动提示。
///
/// 任务在以下任一条件退出：输入源 EOF、读取中断、写入失败、
/// 终止标志置位。退出时设置终止标志并丢弃子进程输入流句柄，
/// 向子进程送达 EOF。每次写入紧前重新检查标志，标志置位后的
/// 输入行不再转发。
pub fn spawn_forwarder<W>(
    mut source: Box<dyn InputSource>,
    mut stdin: W,
    queue: Arc<LineQueue>,
    shutdown: ShutdownFlag,
    marker_inject: Option<String>,
    prime_first: bool,
    poll_interval: Duration,
) -> ForwarderHandle
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let task = tokio::spawn(async move {
        if prime_first {
            if let Some(marker) = marker_inject.as_deref() {
                if let Err(e) = write_line(&mut stdin, marker).await {
                    tracing::warn!("预注入标记失败: {}", e);
                    shutdown.trigger();
                    return;
                }
            }
        }

        loop {
            tokio::select! {
                _ = queue.wait_until_empty(poll_interval) => {}
                _ = shutdown.triggered() => break,
            }
            if shutdown.is_set() {
                break;
            }

            let read = tokio::select! {
                result = source.read_line() => result,
                _ = shutdown.triggered() => break,
            };

            match read {
                Ok(Some(text)) => {
                    // 等待输入期间标志可能已置位，置位后不再转发
                    if shutdown.is_set() {
                        break;
                    }
                    if let Err(e) = write_line(&mut stdin, &text).await {
                        tracing::warn!("转发输入失败: {}", e);
                        break;
                    }
                    if let Some(marker) = marker_inject.as_deref() {
                        if let Err(e) = write_line(&mut stdin, marker).await {
                            tracing::warn!("注入标记失败: {}", e);
                            break;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!("输入源已到达 EOF，转发器退出");
                    break;
                }
                Err(e) => {
                    if e.is_shutdown_signal() {
                        tracing::debug!("输入读取被中断，转发器退出");
                    } else {
                        tracing::warn!("读取输入失败: {}", e);
                    }
                    break;
                }
            }
        }

        if shutdown.trigger() {
            tracing::debug!("转发器退出，设置终止标志");
        }
        // stdin 随任务结束被丢弃，子进程收到输入 EOF
    });

    ForwarderHandle { task }
}

async fn write_line<W>(stdin: &mut W, text: &str) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    stdin.write_all(text.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ChannelSource, ScriptedSource};
    use crate::queue::{Line, StreamKind};
    use tokio::io::AsyncReadExt;

    fn poll() -> Duration {
        Duration::from_millis(5)
    }

    async fn read_all(mut reader: tokio::io::DuplexStream) -> String {
        let mut buf = String::new();
        reader.read_to_string(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_forwards_line_then_marker() {
        let (stdin, rx) = tokio::io::duplex(1024);
        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();

        let handle = spawn_forwarder(
            Box::new(ScriptedSource::new(["ls -la"])),
            stdin,
            queue,
            shutdown.clone(),
            Some("<<END>>".to_string()),
            false,
            poll(),
        );
        handle.join().await.unwrap();

        assert_eq!(read_all(rx).await, "ls -la\n<<END>>\n");
        // EOF 置位标志
        assert!(shutdown.is_set());
    }

    #[tokio::test]
    async fn test_prime_first_injects_marker_before_input() {
        let (stdin, rx) = tokio::io::duplex(1024);
        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();

        let handle = spawn_forwarder(
            Box::new(ScriptedSource::new(["pwd"])),
            stdin,
            queue,
            shutdown,
            Some("<<END>>".to_string()),
            true,
            poll(),
        );
        handle.join().await.unwrap();

        assert_eq!(read_all(rx).await, "<<END>>\npwd\n<<END>>\n");
    }

    #[tokio::test]
    async fn test_no_marker_injection_when_disabled() {
        let (stdin, rx) = tokio::io::duplex(1024);
        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();

        let handle = spawn_forwarder(
            Box::new(ScriptedSource::new(["hello"])),
            stdin,
            queue,
            shutdown,
            None,
            // 没有标记时 prime_first 不产生任何写入
            true,
            poll(),
        );
        handle.join().await.unwrap();

        assert_eq!(read_all(rx).await, "hello\n");
    }

    #[tokio::test]
    async fn test_waits_for_queue_to_drain_before_reading() {
        let (stdin, rx) = tokio::io::duplex(1024);
        let queue = Arc::new(LineQueue::new());
        queue.push(Line::new(StreamKind::Stdout, "pending response"));
        let shutdown = ShutdownFlag::new();

        let handle = spawn_forwarder(
            Box::new(ScriptedSource::new(["next command"])),
            stdin,
            queue.clone(),
            shutdown,
            None,
            false,
            poll(),
        );

        // 队列非空时不读取输入
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        queue.try_pop();
        handle.join().await.unwrap();
        assert_eq!(read_all(rx).await, "next command\n");
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_read() {
        let (stdin, _rx) = tokio::io::duplex(1024);
        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();
        let (tx, source) = ChannelSource::new();

        let handle = spawn_forwarder(
            Box::new(source),
            stdin,
            queue,
            shutdown.clone(),
            None,
            false,
            poll(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("forwarder should exit on shutdown")
            .unwrap();
        drop(tx);
    }

    #[tokio::test]
    async fn test_write_failure_sets_flag() {
        let (stdin, rx) = tokio::io::duplex(16);
        drop(rx);
        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();

        let handle = spawn_forwarder(
            Box::new(ScriptedSource::new(["doomed"])),
            stdin,
            queue,
            shutdown.clone(),
            None,
            false,
            poll(),
        );
        handle.join().await.unwrap();
        assert!(shutdown.is_set());
    }
}
