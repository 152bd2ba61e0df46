//! ShellIO 命令行入口
//!
//! 把当前终端接到一个交互式子进程上：
//!
//! ```text
//! shellio-cli [命令 [参数...]]
//! ```
//!
//! 不带参数时启动默认 shell。Ctrl-C 请求终止会话，
//! 剩余输出送达后进程回收并打印会话报告。

use shellio::config::{EndMarker, SessionConfig};
use shellio::io::{StdinSource, StdoutSink};
use shellio::session::Session;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// 子进程打印结束标记的命令与标记本身
const MARKER_COMMAND: &str = "echo '======================='";
const MARKER_LINE: &str = "=======================";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志写到 stderr，stdout 留给会话输出
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut argv = std::env::args().skip(1);
    let command = argv.next().unwrap_or_else(default_shell);
    let args: Vec<String> = argv.collect();

    let config = SessionConfig::new(
        command,
        args,
        "$ ",
        Some(EndMarker::new(MARKER_COMMAND, MARKER_LINE)),
        false,
    );

    let session = Session::start(
        config,
        Box::new(StdoutSink::new()),
        Box::new(StdinSource::new()),
    )?;
    tracing::info!("会话 {} 就绪", session.id());

    // Ctrl-C 作为外部中断，等同输入 EOF
    let flag = session.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("收到中断信号，开始终止会话");
            flag.trigger();
        }
    });

    let report = session.wait().await?;
    tracing::info!("会话报告: {}", serde_json::to_string(&report)?);

    Ok(())
}

/// 平台默认 shell
fn default_shell() -> String {
    if cfg!(windows) {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    } else {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
}
