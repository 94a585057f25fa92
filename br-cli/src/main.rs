use br_cli::{Cli, CliApp, exit_code_of, setup_logging};
use br_core::config::AppConfig;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 设置日志记录
    setup_logging(cli.verbose);

    let config = match AppConfig::find_and_load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ 配置加载失败: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let app = match CliApp::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("❌ 应用初始化失败: {:#}", e);
            std::process::exit(exit_code_of(&e));
        }
    };

    // 运行命令
    let result = app.run_command(cli.command).await;
    app.shutdown().await;

    if let Err(e) = result {
        error!("❌ 操作失败: {}", e);
        std::process::exit(e.exit_code());
    }
}
