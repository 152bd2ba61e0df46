//! 工具模块
//!
//! 提供错误类型、终止标志和会话状态管理。

pub mod error;
pub mod flag;
pub mod state;

pub use error::SessionError;
pub use flag::ShutdownFlag;
pub use state::{SessionState, SessionStateManager, StateTransitionResult};
