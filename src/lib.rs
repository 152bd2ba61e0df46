//! ShellIO
//!
//! 交互式子进程会话驱动：以三路管道包装一个子进程，
//! 行式转发它的输出、按结束标记切分响应、在空闲时显示提示符，
//! 并把用户输入逐行转发给它。
//!
//! 核心入口是 [`session::Session`]：给定 [`config::SessionConfig`]
//! 与一对输入源/输出汇，`start` 装配全部参与者，`wait` 等待会话
//! 结束并产出报告。

pub mod config;
pub mod io;
pub mod queue;
pub mod session;
pub mod utils;

pub use config::{EndMarker, SessionConfig};
pub use session::{Session, SessionReport};
pub use utils::{SessionError, SessionState};
