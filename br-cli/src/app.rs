use anyhow::Context;
use br_core::{
    config::AppConfig,
    error::Result,
    executor::ExecutionMonitor,
    sql::{SqlClient, StarRocksSession},
    store::SqlControlStore,
    workflow::{BackupManager, Collaborators, RestoreManager, Target},
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cli::Commands;
use crate::commands;

pub struct CliApp {
    pub config: AppConfig,
    pub session: StarRocksSession,
    pub store: Arc<SqlControlStore>,
    pub backup_manager: BackupManager,
    pub restore_manager: RestoreManager,
}

impl CliApp {
    /// 连接集群并组装各管理器
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let session = StarRocksSession::connect(&config.connection)
            .await
            .with_context(|| {
                format!(
                    "无法连接 StarRocks {}:{}",
                    config.connection.host, config.connection.port
                )
            })?;

        let client: Arc<dyn SqlClient> = Arc::new(session.clone());
        let store = Arc::new(SqlControlStore::new(client.clone()));
        let deps = Collaborators {
            client: client.clone(),
            history: store.clone(),
            slots: store.clone(),
            catalog: store.clone(),
            monitor: ExecutionMonitor::new(client, config.poll_settings()),
        };
        let target = Target {
            database: config.connection.database.clone(),
            repository: config.backup.repository.clone(),
            default_tables: config.backup.tables.clone(),
            health_check: config.backup.health_check,
        };

        let backup_manager = BackupManager::new(deps.clone(), target.clone());
        let restore_manager = RestoreManager::new(deps, target);
        debug!("已连接 {}", config.connection.host);

        Ok(Self {
            config,
            session,
            store,
            backup_manager,
            restore_manager,
        })
    }

    /// 运行指定的命令
    pub async fn run_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init => commands::run_init(self).await,
            Commands::Health => commands::run_health(self).await,
            Commands::Backup(backup_cmd) => commands::run_backup(self, backup_cmd).await,
            Commands::Restore {
                target_label,
                tables,
                partitions,
                timestamp,
            } => commands::run_restore(self, target_label, tables, partitions, timestamp).await,
            Commands::List { limit } => commands::run_list(self, limit).await,
        }
    }

    /// 关闭连接，失败只记录
    pub async fn shutdown(&self) {
        if let Err(e) = self.session.close().await {
            warn!("关闭连接失败: {}", e);
        }
    }
}
