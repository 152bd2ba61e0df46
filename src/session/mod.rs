//! 会话核心
//!
//! 子进程、两个输出流读取器、输出分发器、输入转发器，
//! 以及把它们装配起来的会话驱动。

pub mod child;
pub mod dispatcher;
pub mod driver;
pub mod forwarder;
pub mod reader;

pub use child::ChildProcess;
pub use dispatcher::{spawn_dispatcher, DispatcherConfig, DispatcherHandle};
pub use driver::{Session, SessionReport};
pub use forwarder::{spawn_forwarder, ForwarderHandle};
pub use reader::{spawn_stream_reader, StreamReaderHandle};
