//! 输出流读取器
//!
//! 每路输出流一个独立任务，整行读取后入队。两个读取器共享一个
//! 在读流计数：最后一个退出的读取器负责关闭队列并设置终止标志。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;

use crate::queue::{Line, LineQueue, StreamKind};
use crate::utils::ShutdownFlag;

/// 读取器任务句柄
pub struct StreamReaderHandle {
    task: JoinHandle<()>,
}

impl StreamReaderHandle {
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

/// 启动一路输出流的读取器任务
///
/// 任务在以下任一条件退出：流 EOF、读取错误、终止标志置位、队列关闭。
/// select 偏向读取分支：终止标志置位瞬间已可读的行仍会先被取走，
/// 不会因并发的终止信号丢行。
pub fn spawn_stream_reader<R>(
    stream: StreamKind,
    reader: R,
    queue: Arc<LineQueue>,
    open_streams: Arc<AtomicUsize>,
    shutdown: ShutdownFlag,
) -> StreamReaderHandle
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut lines = reader.lines();

        loop {
            if queue.is_closed() {
                tracing::debug!("队列已关闭，读取器退出: {:?}", stream);
                break;
            }

            tokio::select! {
                biased;

                result = lines.next_line() => {
                    match result {
                        Ok(Some(text)) => {
                            if !queue.push(Line::new(stream, text)) {
                                tracing::debug!("入队被拒绝，读取器退出: {:?}", stream);
                                break;
                            }
                        }
                        Ok(None) => {
                            tracing::debug!("输出流已到达 EOF: {:?}", stream);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("读取输出流失败: {:?}: {}", stream, e);
                            break;
                        }
                    }
                }

                _ = shutdown.triggered() => {
                    tracing::debug!("收到终止信号，读取器退出: {:?}", stream);
                    break;
                }
            }
        }

        // 最后退出的读取器关闭队列并通知其余参与者
        if open_streams.fetch_sub(1, Ordering::SeqCst) == 1 {
            queue.close();
            if shutdown.trigger() {
                tracing::debug!("两路输出流均已结束，设置终止标志");
            }
        }
    });

    StreamReaderHandle { task }
}
