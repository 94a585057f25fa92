use br_core::BrError;
use std::path::Path;

/// 日志文件环境变量，设置后日志追加写入该文件
pub const LOG_FILE_ENV: &str = "STARROCKS_BR_LOG_FILE";

/// 设置日志记录系统
///
/// - 支持 RUST_LOG 环境变量控制日志级别
/// - 终端输出简洁格式，文件输出详细格式
pub fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if let Ok(log_file) = std::env::var(LOG_FILE_ENV) {
        let path = Path::new(&log_file);
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "starrocks-br.log".into());

        // 输出到文件，不滚动
        let appender = tracing_appender::rolling::never(directory, file_name);
        fmt()
            .with_env_filter(env_filter)
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .without_time()
            .compact()
            .init();
    }
}

/// 从错误链中找到 BrError 并取退出码，找不到时返回 1
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BrError>())
        .map(BrError::exit_code)
        .unwrap_or(1)
}
