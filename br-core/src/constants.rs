/// 控制表相关常量
pub mod control {
    /// 工具自有的运维数据库
    pub const OPS_DATABASE: &str = "ops";

    /// 备份历史表
    pub const BACKUP_HISTORY: &str = "ops.backup_history";

    /// 恢复历史表
    pub const RESTORE_HISTORY: &str = "ops.restore_history";

    /// 任务槽位表（并发控制）
    pub const RUN_STATUS: &str = "ops.run_status";

    /// 表清单（分组）
    pub const TABLE_INVENTORY: &str = "ops.table_inventory";
}

/// 任务轮询相关常量
pub mod polling {
    /// 最大轮询次数，1秒间隔下约6小时
    pub const MAX_POLLS: u32 = 21_600;

    /// 默认轮询间隔（毫秒）
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
}

/// 标签生成相关常量
pub mod labels {
    /// 用户自定义名称中的版本占位符
    pub const VERSION_PLACEHOLDER: &str = "-v#r";

    /// 占位符替换后的版本标记
    pub const VERSION_MARKER: &str = "-v";

    /// 标签冲突时追加的重试后缀前缀
    pub const RETRY_SUFFIX: &str = "_r";

    /// 标签中的日期格式
    pub const DATE_FORMAT: &str = "%Y%m%d";
}

/// 恢复相关常量
pub mod restore {
    /// 恢复时临时表后缀
    pub const TEMP_TABLE_SUFFIX: &str = "_restored";

    /// 切换时旧表后缀
    pub const BACKUP_TABLE_SUFFIX: &str = "_backup";
}

/// 时间格式
pub mod time {
    /// StarRocks DATETIME 文本格式
    pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// 带小数秒的 DATETIME 文本格式
    pub const DATETIME_FORMAT_FRACTIONAL: &str = "%Y-%m-%d %H:%M:%S%.f";
}

/// 配置文件相关常量
pub mod config {
    /// 按优先级查找的配置文件名
    pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
        ["starrocks-br.yaml", "starrocks-br.yml", "config.yaml"];

    /// 密码环境变量，优先于配置文件
    pub const PASSWORD_ENV: &str = "STARROCKS_PASSWORD";

    /// StarRocks FE 默认查询端口
    pub const DEFAULT_QUERY_PORT: u16 = 9030;

    /// 默认仓库名
    pub const DEFAULT_REPOSITORY: &str = "br_repo";
}
