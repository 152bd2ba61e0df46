//! 终止标志
//!
//! 会话范围的一次性布尔标志，是唯一的取消原语。
//! 任何参与者检测到会话需要结束（两路输出流均关闭、输入 EOF、用户中断）
//! 时设置该标志；其余参与者轮询或等待它，并在有限时间内退出。

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// 终止标志
///
/// 克隆后共享同一个底层标志。`trigger` 只有第一次调用生效。
#[derive(Clone, Debug)]
pub struct ShutdownFlag {
    inner: Arc<FlagInner>,
}

#[derive(Debug)]
struct FlagInner {
    set: AtomicBool,
    notify: Notify,
}

impl ShutdownFlag {
    /// 创建新的终止标志（未设置状态）
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FlagInner {
                set: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// 设置标志并唤醒所有等待者
    ///
    /// 返回 true 表示本次调用完成了设置（首次触发），
    /// false 表示标志早已被其他参与者设置。
    pub fn trigger(&self) -> bool {
        let first = !self.inner.set.swap(true, Ordering::SeqCst);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// 检查标志是否已设置
    pub fn is_set(&self) -> bool {
        self.inner.set.load(Ordering::SeqCst)
    }

    /// 等待标志被设置；已设置时立即返回
    pub async fn triggered(&self) {
        loop {
            if self.is_set() {
                return;
            }
            // 先登记等待再二次检查，避免 trigger 在两步之间发生时丢失唤醒
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}
