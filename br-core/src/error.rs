use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrError>;

#[derive(Error, Debug)]
pub enum BrError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("集群健康检查失败: {0}")]
    HealthCheck(String),

    #[error(
        "并发冲突: 作用域 '{scope}' 已有活跃任务 '{label}'。请等待其完成，或手动取消: \
         UPDATE ops.run_status SET state='CANCELLED' WHERE scope='{scope}' AND label='{label}' AND state='ACTIVE'"
    )]
    ConcurrencyConflict { scope: String, label: String },

    #[error("任务槽位 {scope}:{label} 已以 {existing} 状态结束，拒绝改写为 {requested}")]
    SlotAlreadyCompleted {
        scope: String,
        label: String,
        existing: String,
        requested: String,
    },

    #[error("备份规划失败: {0}")]
    Planning(String),

    #[error("任务执行失败: {0}")]
    Execution(String),

    #[error("任务跟踪丢失: {0}")]
    LostTracking(String),

    #[error("任务轮询超时: {0}")]
    Timeout(String),

    #[error("恢复链解析失败: {0}")]
    RestoreChain(String),

    #[error("表切换未完整执行: {0}")]
    Cutover(String),

    #[error("非法标识符 '{0}': 只允许字母、数字、下划线、点和连字符")]
    InvalidIdentifier(String),

    #[error("SQL 执行错误: {0}")]
    Sql(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML 解析错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("任务执行错误: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("自定义错误: {0}")]
    Custom(String),
}

// 为 mysql_async 错误实现 From trait
impl From<mysql_async::Error> for BrError {
    fn from(err: mysql_async::Error) -> Self {
        BrError::Sql(err.to_string())
    }
}

impl BrError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn health_check(msg: impl Into<String>) -> Self {
        Self::HealthCheck(msg.into())
    }

    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn restore_chain(msg: impl Into<String>) -> Self {
        Self::RestoreChain(msg.into())
    }

    pub fn sql(msg: impl Into<String>) -> Self {
        Self::Sql(msg.into())
    }

    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// 进程退出码，每一类错误对应一个独立的退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            BrError::Configuration(_) | BrError::InvalidIdentifier(_) | BrError::Yaml(_) => 2,
            BrError::HealthCheck(_) => 3,
            BrError::ConcurrencyConflict { .. } => 4,
            BrError::Planning(_) => 5,
            BrError::Execution(_) | BrError::SlotAlreadyCompleted { .. } => 6,
            BrError::LostTracking(_) => 7,
            BrError::Timeout(_) => 8,
            BrError::RestoreChain(_) => 9,
            BrError::Cutover(_) => 10,
            _ => 1,
        }
    }
}
