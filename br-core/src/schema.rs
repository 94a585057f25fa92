use crate::constants::control;
use crate::sql::SqlClient;
use crate::Result;
use tracing::info;

const TABLE_INVENTORY_DDL: &str = r#"CREATE TABLE IF NOT EXISTS ops.table_inventory (
    inventory_group STRING NOT NULL COMMENT "分组名，backup --group 使用",
    database_name STRING NOT NULL COMMENT "库名",
    table_name STRING NOT NULL COMMENT "表名",
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP COMMENT "登记时间"
)
PRIMARY KEY (inventory_group, database_name, table_name)
COMMENT "备份分组清单""#;

const BACKUP_HISTORY_DDL: &str = r#"CREATE TABLE IF NOT EXISTS ops.backup_history (
    label STRING NOT NULL COMMENT "快照标签",
    backup_type STRING NOT NULL COMMENT "full 或 incremental",
    status STRING NOT NULL COMMENT "RUNNING/FINISHED/FAILED/CANCELLED/TIMEOUT/ERROR/LOST",
    repository STRING NOT NULL COMMENT "仓库名",
    database_name STRING NOT NULL COMMENT "备份的库",
    started_at DATETIME NOT NULL COMMENT "开始时间",
    finished_at DATETIME COMMENT "结束时间",
    error_message STRING COMMENT "失败原因",
    tables_json STRING COMMENT "快照包含的表",
    partitions_json STRING COMMENT "增量备份的分区",
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP COMMENT "记录创建时间"
)
PRIMARY KEY (label)
COMMENT "备份历史""#;

const RESTORE_HISTORY_DDL: &str = r#"CREATE TABLE IF NOT EXISTS ops.restore_history (
    job_id STRING NOT NULL COMMENT "恢复任务 ID",
    backup_label STRING NOT NULL COMMENT "目标快照标签",
    restore_type STRING NOT NULL COMMENT "cutover 或 point_in_time",
    status STRING NOT NULL COMMENT "最终状态",
    repository STRING NOT NULL COMMENT "仓库名",
    started_at DATETIME NOT NULL COMMENT "开始时间",
    finished_at DATETIME COMMENT "结束时间",
    error_message STRING COMMENT "失败原因",
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP COMMENT "记录创建时间"
)
PRIMARY KEY (job_id)
COMMENT "恢复历史""#;

const RUN_STATUS_DDL: &str = r#"CREATE TABLE IF NOT EXISTS ops.run_status (
    scope STRING NOT NULL COMMENT "backup 或 restore",
    label STRING NOT NULL COMMENT "任务标签",
    state STRING NOT NULL DEFAULT "ACTIVE" COMMENT "ACTIVE/FINISHED/FAILED/CANCELLED",
    started_at DATETIME DEFAULT CURRENT_TIMESTAMP COMMENT "开始时间",
    finished_at DATETIME COMMENT "结束时间"
)
PRIMARY KEY (scope, label)
COMMENT "任务槽位，用于并发控制""#;

/// 控制表建表语句，按创建顺序
pub fn control_table_ddl() -> [(&'static str, &'static str); 4] {
    [
        (control::TABLE_INVENTORY, TABLE_INVENTORY_DDL),
        (control::BACKUP_HISTORY, BACKUP_HISTORY_DDL),
        (control::RESTORE_HISTORY, RESTORE_HISTORY_DDL),
        (control::RUN_STATUS, RUN_STATUS_DDL),
    ]
}

/// 创建 ops 库与所有控制表，可重复执行
pub async fn initialize_ops_schema(client: &dyn SqlClient) -> Result<()> {
    client
        .execute(&format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            control::OPS_DATABASE
        ))
        .await?;

    for (table, ddl) in control_table_ddl() {
        client.execute(ddl).await?;
        info!("控制表已就绪: {}", table);
    }
    Ok(())
}
