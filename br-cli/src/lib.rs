// 私有模块声明
mod app;
mod cli;
mod commands;
mod utils;

// 通过 pub use 精确控制对外暴露的接口
pub use app::CliApp;
pub use cli::{BackupCommand, Cli, Commands, FullBackupArgs};
pub use commands::{plan_source, restore_target};
pub use utils::{LOG_FILE_ENV, exit_code_of, setup_logging};
