use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 全量类备份的公共参数
#[derive(Args, Debug, Clone)]
pub struct FullBackupArgs {
    /// 表清单分组（ops.table_inventory），不指定时使用配置中的表
    #[arg(long)]
    pub group: Option<String>,

    /// 自定义标签，支持 `-v#r` 版本占位符
    #[arg(long)]
    pub name: Option<String>,
}

/// 备份相关命令
#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// 根据历史自动选择全量或增量
    Auto {
        /// 自定义标签，支持 `-v#r` 版本占位符
        #[arg(long)]
        name: Option<String>,
    },
    /// 增量备份：相对基线（--group）或最近 N 天（--days）
    Incremental {
        /// 表清单分组
        #[arg(long, required_unless_present = "days")]
        group: Option<String>,

        /// 作为基线的备份标签，默认使用最近一次全量备份
        #[arg(long, conflicts_with = "days")]
        baseline_backup: Option<String>,

        /// 备份最近 N 天内有更新的分区
        #[arg(long)]
        days: Option<u32>,

        /// 自定义标签，支持 `-v#r` 版本占位符
        #[arg(long)]
        name: Option<String>,
    },
    /// 全量备份
    Full(FullBackupArgs),
    /// 周全量备份
    Weekly(FullBackupArgs),
    /// 月全量备份
    Monthly(FullBackupArgs),
}

/// StarRocks BR - StarRocks 备份恢复自动化工具
#[derive(Parser)]
#[command(name = "starrocks-br")]
#[command(about = "StarRocks 全量/增量备份与恢复编排工具")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径，不指定时在当前目录查找 starrocks-br.yaml / config.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 创建 ops 控制表并确保备份仓库存在
    Init,
    /// 检查 FE/BE 状态
    Health,
    /// 备份
    #[command(subcommand)]
    Backup(BackupCommand),
    /// 恢复：按标签恢复并切换，或单表恢复到时间点
    Restore {
        /// 目标快照标签
        #[arg(long, conflicts_with = "timestamp")]
        target_label: Option<String>,

        /// 需要恢复的表，可重复
        #[arg(long = "table")]
        tables: Vec<String>,

        /// 只恢复这些分区，可重复
        #[arg(long = "partition", requires = "target_label")]
        partitions: Vec<String>,

        /// 时间点（YYYY-MM-DD HH:MM:SS），需配合单个 --table
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// 列出备份历史
    List {
        /// 显示的条数
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
