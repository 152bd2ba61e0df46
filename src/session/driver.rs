//! 会话驱动
//!
//! 把子进程与四个参与者装配成一个会话：两个输出流读取器、
//! 输出分发器、输入转发器。会话生命周期固定为
//! Starting -> Running -> Draining -> Terminated。
//!
//! 终止由单一的一次性标志协调：任何参与者检测到结束条件后设置
//! 标志，其余参与者在有限时间内自行退出，`wait` 汇合所有任务、
//! 回收子进程并产出会话报告。

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::io::{InputSource, OutputSink};
use crate::queue::{LineQueue, StreamKind};
use crate::session::child::ChildProcess;
use crate::session::dispatcher::{spawn_dispatcher, DispatcherConfig};
use crate::session::forwarder::spawn_forwarder;
use crate::session::reader::spawn_stream_reader;
use crate::utils::{SessionError, SessionState, SessionStateManager, ShutdownFlag};

/// 子进程退出宽限期；超时后强制终止
const CHILD_WAIT_GRACE: Duration = Duration::from_secs(5);

/// 会话结束报告
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// 会话 ID
    pub session_id: String,
    /// 子进程退出码；被信号终止时为 None
    pub exit_code: Option<i32>,
    /// 会话开始时间（RFC 3339）
    pub started_at: String,
    /// 会话结束时间（RFC 3339）
    pub finished_at: String,
    /// 会话时长（毫秒）
    pub duration_ms: u64,
}

/// 交互式子进程会话
#[derive(Debug)]
pub struct Session {
    id: String,
    state: Arc<Mutex<SessionStateManager>>,
    shutdown: ShutdownFlag,
    child: ChildProcess,
    tasks: Vec<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// 启动会话
    ///
    /// 先启动子进程再装配参与者：子进程启动失败时同步返回
    /// `SpawnFailed`，不会有任何参与者被创建。
    pub fn start(
        config: SessionConfig,
        sink: Box<dyn OutputSink>,
        source: Box<dyn InputSource>,
    ) -> Result<Self, SessionError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut state = SessionStateManager::new(&id);

        let mut child = ChildProcess::spawn(&config.command, &config.args)?;
        let stdin = child
            .take_stdin()
            .ok_or_else(|| SessionError::SpawnFailed("stdin 管道不可用".to_string()))?;
        let stdout = child
            .take_stdout()
            .ok_or_else(|| SessionError::SpawnFailed("stdout 管道不可用".to_string()))?;
        let stderr = child
            .take_stderr()
            .ok_or_else(|| SessionError::SpawnFailed("stderr 管道不可用".to_string()))?;

        let queue = Arc::new(LineQueue::new());
        let shutdown = ShutdownFlag::new();
        let open_streams = Arc::new(AtomicUsize::new(2));
        let dispatcher_config = DispatcherConfig::default();

        let mut tasks = Vec::with_capacity(4);
        tasks.push(
            spawn_stream_reader(
                StreamKind::Stdout,
                stdout,
                queue.clone(),
                open_streams.clone(),
                shutdown.clone(),
            )
            .into_task(),
        );
        tasks.push(
            spawn_stream_reader(
                StreamKind::Stderr,
                stderr,
                queue.clone(),
                open_streams,
                shutdown.clone(),
            )
            .into_task(),
        );
        tasks.push(
            spawn_dispatcher(
                queue.clone(),
                shutdown.clone(),
                sink,
                config.prompt.clone(),
                config.marker.as_ref().map(|m| m.detect.clone()),
                config.prime_first,
                dispatcher_config.clone(),
            )
            .into_task(),
        );
        tasks.push(
            spawn_forwarder(
                source,
                stdin,
                queue,
                shutdown.clone(),
                config.marker.as_ref().map(|m| m.inject.clone()),
                config.prime_first,
                dispatcher_config.poll_interval,
            )
            .into_task(),
        );

        state.transition_to(SessionState::Running);
        tracing::info!("会话 {} 已启动: {}", id, config.command);

        Ok(Self {
            id,
            state: Arc::new(Mutex::new(state)),
            shutdown,
            child,
            tasks,
            started_at: Utc::now(),
        })
    }

    /// 会话 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 当前生命周期状态
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }

    /// 获取终止标志的克隆（用于外部中断，例如 Ctrl-C 处理）
    pub fn shutdown_flag(&self) -> ShutdownFlag {
        self.shutdown.clone()
    }

    /// 请求终止会话
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            tracing::info!("会话 {} 收到终止请求", self.id);
        }
    }

    /// 等待会话结束并产出报告
    ///
    /// 等待终止标志置位，随后进入排空阶段：汇合全部参与者任务
    /// （分发器在汇合完成前送达队列中剩余的行），再回收子进程。
    /// 子进程未在宽限期内退出时强制终止。
    pub async fn wait(mut self) -> Result<SessionReport, SessionError> {
        self.shutdown.triggered().await;
        self.transition(SessionState::Draining);

        let tasks = std::mem::take(&mut self.tasks);
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::warn!("会话 {} 参与者任务异常结束: {}", self.id, e);
            }
        }

        let status = match tokio::time::timeout(CHILD_WAIT_GRACE, self.child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!("会话 {} 子进程未在宽限期内退出，强制终止", self.id);
                self.child.kill().await?;
                self.child.wait().await?
            }
        };

        self.transition(SessionState::Terminated);
        let finished_at = Utc::now();
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        tracing::info!(
            "会话 {} 已结束, 退出码 {:?}, 时长 {} ms",
            self.id,
            status.code(),
            duration_ms
        );

        Ok(SessionReport {
            session_id: self.id,
            exit_code: status.code(),
            started_at: self
                .started_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at: finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        })
    }

    fn transition(&self, target: SessionState) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transition_to(target);
    }
}
