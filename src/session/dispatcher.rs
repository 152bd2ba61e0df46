//! 输出分发器
//!
//! 队列的唯一消费者。把队列中的行依序写入输出汇，识别并吞掉
//! 结束标记行，并在队列空闲时显示提示符。
//!
//! 空闲检测以"队列为空"为依据：它表示没有待转发的输出，并不保证
//! 子进程真正处理完毕。慢速子进程可能在提示符已显示后继续产出，
//! 这些行照常转发。标记识别按行前缀匹配，覆盖子进程在标记后
//! 附带回显内容的情况。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::io::OutputSink;
use crate::queue::{LineQueue, PollOutcome};
use crate::utils::ShutdownFlag;

/// 分发器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 空闲时的兜底轮询间隔
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
        }
    }
}

/// 分发器任务句柄
pub struct DispatcherHandle {
    task: JoinHandle<()>,
}

impl DispatcherHandle {
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

/// 启动分发器任务
///
/// 每个空闲期最多显示一次提示符；取出标记行会把提示符状态复位，
/// 下一个空闲期重新显示。`prompt_preshown` 为 true 时首个空闲期
/// 视为已显示过提示符。
///
/// 终止标志置位后先排空队列中已有的行再退出；退出前做最后一次
/// 刷新，并设置终止标志通知其余参与者。
pub fn spawn_dispatcher(
    queue: Arc<LineQueue>,
    shutdown: ShutdownFlag,
    mut sink: Box<dyn OutputSink>,
    prompt: String,
    marker_detect: Option<String>,
    prompt_preshown: bool,
    config: DispatcherConfig,
) -> DispatcherHandle {
    let task = tokio::spawn(async move {
        let mut prompt_shown = prompt_preshown;

        loop {
            match queue.try_pop() {
                PollOutcome::Line(line) => {
                    if is_marker_line(&line.text, marker_detect.as_deref()) {
                        // 标记行不转发；一个响应结束，准备下一个提示符
                        prompt_shown = false;
                        continue;
                    }
                    if let Err(e) = sink.write(&format!("{}\n", line.text)).await {
                        tracing::warn!("写入输出汇失败: {}", e);
                        shutdown.trigger();
                        break;
                    }
                }
                PollOutcome::Empty => {
                    if shutdown.is_set() {
                        // 标志置位且队列已空，排空完成
                        break;
                    }
                    if !prompt_shown {
                        prompt_shown = true;
                        let shown = match sink.write(&prompt).await {
                            Ok(()) => sink.flush().await,
                            Err(e) => Err(e),
                        };
                        if let Err(e) = shown {
                            tracing::warn!("显示提示符失败: {}", e);
                            shutdown.trigger();
                            break;
                        }
                    }
                    queue.wait_for_line(config.poll_interval).await;
                }
                PollOutcome::Closed => {
                    tracing::debug!("队列已关闭且排空，分发器退出");
                    break;
                }
            }
        }

        if let Err(e) = sink.flush().await {
            tracing::debug!("退出前刷新输出汇失败: {}", e);
        }
        if shutdown.trigger() {
            tracing::debug!("分发器退出，设置终止标志");
        }
    });

    DispatcherHandle { task }
}

/// 判断一行是否为结束标记行（前缀匹配）
fn is_marker_line(text: &str, detect: Option<&str>) -> bool {
    match detect {
        Some(marker) => text.starts_with(marker),
        None => false,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// *对于任意*标记与行文本，前缀匹配与 starts_with 语义一致
        #[test]
        fn prop_marker_detection_matches_prefix(
            marker in "[!-~]{1,16}",
            tail in "[ -~]{0,32}"
        ) {
            let exact = marker.clone();
            let with_tail = format!("{}{}", marker, tail);
            prop_assert!(is_marker_line(&exact, Some(marker.as_str())));
            prop_assert!(is_marker_line(&with_tail, Some(marker.as_str())));
        }

        /// 不以标记开头的行永远不会被吞掉
        #[test]
        fn prop_non_prefixed_lines_pass(
            marker in "[A-Z]{4,8}",
            text in "[a-z]{0,32}"
        ) {
            prop_assume!(!text.starts_with(&marker));
            prop_assert!(!is_marker_line(&text, Some(marker.as_str())));
        }
    }
}
