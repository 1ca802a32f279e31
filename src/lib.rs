// Exam Shelf library entry
// 二进制入口和集成测试都通过这里访问 shelf 模块。

pub mod config;
pub mod shelf;

use tracing_subscriber::EnvFilter;

/// 安装全局日志订阅者（输出到 stderr，stdout 只留给命令结果 JSON）
///
/// `RUST_LOG` 优先；未设置时使用 `default_filter`。重复调用是无害的。
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
