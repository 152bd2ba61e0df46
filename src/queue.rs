//! 共享行队列
//!
//! stdout/stderr 两个读取器作为生产者、分发器作为唯一消费者的 FIFO 队列。
//! 单个流内的行保持入队顺序；两个流之间不做任何顺序承诺。
//!
//! 非阻塞的 `try_pop` 以结果类型区分"暂无数据"与"队列已永久关闭"，
//! 分发器依赖这一区分来实现空闲检测（显示提示符）。
//! 每次入队/出队各自持锁，锁从不跨越整个循环迭代。

use std::collections::VecDeque;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// 行的来源流
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// 子进程标准输出
    Stdout,
    /// 子进程标准错误
    Stderr,
}

/// 一行输出
///
/// 文本不含结尾换行符；到达顺序由队列位置隐含表示。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 来源流
    pub stream: StreamKind,
    /// 行文本（不含换行符）
    pub text: String,
}

impl Line {
    /// 创建新行
    pub fn new(stream: StreamKind, text: impl Into<String>) -> Self {
        Self {
            stream,
            text: text.into(),
        }
    }
}

/// 非阻塞取出的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 取出一行
    Line(Line),
    /// 暂无数据，队列仍然开放
    Empty,
    /// 队列已关闭且排空
    Closed,
}

/// 共享行队列
pub struct LineQueue {
    inner: Mutex<VecDeque<Line>>,
    closed: AtomicBool,
    /// 新行入队时唤醒消费者
    arrived: Notify,
    /// 队列被排空时唤醒等待排空的一方
    drained: Notify,
}

impl LineQueue {
    /// 创建新的空队列
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            arrived: Notify::new(),
            drained: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Line>> {
        // 持锁期间没有 panic 路径，中毒不可达；若发生则继续使用内部数据
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 入队一行
    ///
    /// 队列已关闭时丢弃该行并返回 false。
    pub fn push(&self, line: Line) -> bool {
        if self.is_closed() {
            return false;
        }
        self.lock().push_back(line);
        self.arrived.notify_one();
        true
    }

    /// 非阻塞取出一行
    pub fn try_pop(&self) -> PollOutcome {
        let popped = self.lock().pop_front();
        match popped {
            Some(line) => {
                if self.is_empty() {
                    self.drained.notify_waiters();
                }
                PollOutcome::Line(line)
            }
            None if self.is_closed() => PollOutcome::Closed,
            None => PollOutcome::Empty,
        }
    }

    /// 关闭队列
    ///
    /// 已入队的行仍可被取出；后续 push 被丢弃。
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.arrived.notify_waiters();
        self.drained.notify_waiters();
    }

    /// 检查队列是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 检查队列是否为空
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 当前排队行数
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 等待新行到达，最多等待 `timeout`
    ///
    /// 空轮询之间让出处理器；刚入队的行在一个轮询间隔内对消费者可见。
    pub async fn wait_for_line(&self, timeout: Duration) {
        let mut notified = pin!(self.arrived.notified());
        notified.as_mut().enable();
        if !self.is_empty() || self.is_closed() {
            return;
        }
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    }

    /// 等待队列被排空，以 `poll` 为有界的兜底轮询间隔
    pub async fn wait_until_empty(&self, poll: Duration) {
        loop {
            let mut notified = pin!(self.drained.notified());
            notified.as_mut().enable();
            if self.is_empty() || self.is_closed() {
                return;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(poll) => {}
            }
        }
    }
}

impl Default for LineQueue {
    fn default() -> Self {
        Self::new()
    }
}


/// Property-based tests for queue ordering
#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z0-9 ._-]{0,32}", 0..64)
    }

    proptest! {
        /// *对于任意*行序列，单个流入队后出队顺序与入队顺序完全一致
        #[test]
        fn prop_single_stream_order_preserved(texts in lines_strategy()) {
            let queue = LineQueue::new();
            for text in &texts {
                queue.push(Line::new(StreamKind::Stdout, text.clone()));
            }

            let mut observed = Vec::new();
            while let PollOutcome::Line(line) = queue.try_pop() {
                observed.push(line.text);
            }
            prop_assert_eq!(observed, texts);
        }

        /// *对于任意*两个流交错入队，各自流内的相对顺序保持不变
        #[test]
        fn prop_interleaved_streams_keep_per_stream_order(
            out_lines in lines_strategy(),
            err_lines in lines_strategy()
        ) {
            let queue = LineQueue::new();
            let mut out_iter = out_lines.iter();
            let mut err_iter = err_lines.iter();

            // 交替入队模拟两个并发生产者
            loop {
                match (out_iter.next(), err_iter.next()) {
                    (None, None) => break,
                    (o, e) => {
                        if let Some(text) = o {
                            queue.push(Line::new(StreamKind::Stdout, text.clone()));
                        }
                        if let Some(text) = e {
                            queue.push(Line::new(StreamKind::Stderr, text.clone()));
                        }
                    }
                }
            }

            let mut observed_out = Vec::new();
            let mut observed_err = Vec::new();
            while let PollOutcome::Line(line) = queue.try_pop() {
                match line.stream {
                    StreamKind::Stdout => observed_out.push(line.text),
                    StreamKind::Stderr => observed_err.push(line.text),
                }
            }
            prop_assert_eq!(observed_out, out_lines);
            prop_assert_eq!(observed_err, err_lines);
        }
    }
}
