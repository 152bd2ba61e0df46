//! 会话状态管理
//!
//! 提供会话生命周期状态转换逻辑。
//!
//! ## 功能
//! - 定义有效的状态转换规则
//! - 提供状态转换验证
//! - 记录状态变更日志
//!
//! 生命周期固定为 Starting -> Running -> Draining -> Terminated。
//! 任何转换都不允许跳过 Draining：终止标志设置之后、进程退出之前，
//! 队列中尚未消费的行必须先送达输出汇，避免静默丢失缓冲输出。

use serde::{Deserialize, Serialize};

/// 会话生命周期状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// 子进程启动中
    Starting,
    /// 四个参与者全部活跃
    Running,
    /// 终止标志已设置，剩余队列行仍在送达输出汇
    Draining,
    /// 所有参与者已汇合，进程句柄已释放
    Terminated,
}

/// 状态转换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateTransitionResult {
    /// 转换成功
    Success,
    /// 转换无效（当前状态不允许转换到目标状态）
    Invalid {
        from: SessionState,
        to: SessionState,
        reason: String,
    },
}

impl StateTransitionResult {
    /// 检查转换是否成功
    pub fn is_success(&self) -> bool {
        matches!(self, StateTransitionResult::Success)
    }

    /// 检查转换是否失败
    pub fn is_invalid(&self) -> bool {
        matches!(self, StateTransitionResult::Invalid { .. })
    }
}

/// 会话状态管理器
///
/// 管理单个会话的状态转换，确保状态转换的有效性。
#[derive(Debug, Clone)]
pub struct SessionStateManager {
    /// 当前状态
    current_state: SessionState,
    /// 会话 ID（用于日志）
    session_id: String,
}

impl SessionStateManager {
    /// 创建新的状态管理器
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            current_state: SessionState::Starting,
            session_id: session_id.into(),
        }
    }

    /// 获取当前状态
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// 检查是否可以转换到目标状态
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        Self::is_valid_transition(self.current_state, target)
    }

    /// 尝试转换到目标状态
    ///
    /// 如果转换有效，更新状态并返回 Success。
    /// 如果转换无效，保持当前状态并返回 Invalid。
    pub fn transition_to(&mut self, target: SessionState) -> StateTransitionResult {
        if Self::is_valid_transition(self.current_state, target) {
            let from = self.current_state;
            self.current_state = target;

            tracing::debug!(
                "会话 {} 状态转换: {:?} -> {:?}",
                self.session_id,
                from,
                target
            );

            StateTransitionResult::Success
        } else {
            let reason = Self::invalid_transition_reason(self.current_state, target);
            tracing::warn!(
                "会话 {} 无效状态转换: {:?} -> {:?}, 原因: {}",
                self.session_id,
                self.current_state,
                target,
                reason
            );

            StateTransitionResult::Invalid {
                from: self.current_state,
                to: target,
                reason,
            }
        }
    }

    /// 检查状态转换是否有效
    ///
    /// 状态转换规则：
    /// - Starting -> Running
    /// - Running -> Draining
    /// - Draining -> Terminated
    /// - Terminated -> (终态，不能转换)
    ///
    /// 不存在绕过 Draining 的路径。
    pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
        // 相同状态不需要转换
        if from == to {
            return true;
        }

        match from {
            SessionState::Starting => matches!(to, SessionState::Running),
            SessionState::Running => matches!(to, SessionState::Draining),
            SessionState::Draining => matches!(to, SessionState::Terminated),
            SessionState::Terminated => false, // 终态
        }
    }

    /// 获取无效转换的原因
    fn invalid_transition_reason(from: SessionState, to: SessionState) -> String {
        match from {
            SessionState::Terminated => "会话已终止，不能再转换状态".to_string(),
            SessionState::Running if to == SessionState::Terminated => {
                "不能跳过 Draining 直接终止".to_string()
            }
            _ => format!("不允许从 {:?} 转换到 {:?}", from, to),
        }
    }

    /// 检查会话是否处于终态
    pub fn is_terminal(&self) -> bool {
        matches!(self.current_state, SessionState::Terminated)
    }

    /// 检查会话是否处于活动状态
    pub fn is_active(&self) -> bool {
        matches!(
            self.current_state,
            SessionState::Starting | SessionState::Running
        )
    }
}
