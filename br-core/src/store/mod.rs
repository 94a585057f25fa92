// 控制表访问模块
//
// 核心组件不直接拼 SQL 访问 ops 库，而是依赖下面三个 trait：
// - HistoryStore: ops.backup_history / ops.restore_history
// - RunStatusStore: ops.run_status（并发槽位）
// - CatalogStore: information_schema 元数据、分组清单与仓库快照信息
//
// 生产实现是 `SqlControlStore`，测试使用内存实现。

mod models;
mod sql;

use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;

pub use models::{
    BackupRecord, BackupType, HistoryFilter, JobScope, JobStatus, PartitionRef, RestoreRecord,
    RunStatus, SlotState,
};
pub use sql::SqlControlStore;

/// 备份/恢复历史
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 写入一条新的备份记录（通常为 RUNNING）
    async fn insert_backup(&self, record: &BackupRecord) -> Result<()>;

    /// 把备份记录更新为终态
    async fn finish_backup(
        &self,
        label: &str,
        status: JobStatus,
        finished_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn get_backup(&self, label: &str) -> Result<Option<BackupRecord>>;

    /// 满足条件的最近一次 FINISHED 备份（按 finished_at）
    async fn latest_finished(&self, filter: &HistoryFilter) -> Result<Option<BackupRecord>>;

    /// 满足条件的全部 FINISHED 备份，按 finished_at 升序
    async fn finished_backups(&self, filter: &HistoryFilter) -> Result<Vec<BackupRecord>>;

    /// 以 prefix 开头的所有标签
    async fn labels_like(&self, prefix: &str) -> Result<Vec<String>>;

    /// 最近的备份记录，按 started_at 降序
    async fn list_backups(&self, limit: usize) -> Result<Vec<BackupRecord>>;

    async fn insert_restore(&self, record: &RestoreRecord) -> Result<()>;
}

/// 任务槽位
#[async_trait]
pub trait RunStatusStore: Send + Sync {
    async fn active_slots(&self) -> Result<Vec<RunStatus>>;

    async fn get_slot(&self, scope: JobScope, label: &str) -> Result<Option<RunStatus>>;

    async fn insert_slot(&self, slot: &RunStatus) -> Result<()>;

    async fn update_slot(
        &self,
        scope: JobScope,
        label: &str,
        state: SlotState,
        finished_at: NaiveDateTime,
    ) -> Result<()>;
}

/// 集群元数据
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 表中 UPDATE_TIME 严格晚于 since 的分区
    async fn changed_partitions(
        &self,
        database: &str,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<String>>;

    /// 多张表中 UPDATE_TIME 不早于 since 的分区
    async fn partitions_updated_since(
        &self,
        database: &str,
        tables: &[String],
        since: NaiveDateTime,
    ) -> Result<Vec<PartitionRef>>;

    async fn table_exists(&self, database: &str, table: &str) -> Result<bool>;

    /// 分组清单中的表，按登记顺序
    async fn inventory_tables(&self, group: &str, database: &str) -> Result<Vec<String>>;

    /// 仓库中快照的 backup_timestamp
    async fn snapshot_timestamp(&self, repository: &str, label: &str) -> Result<Option<String>>;
}

/// 最近一次包含全部 tables 的已完成全量备份，before 给出时只看该时间（含）之前的
///
/// 全量备份可能只覆盖某个分组，所以不能直接取库中最近的全量。
pub async fn latest_full_covering(
    history: &dyn HistoryStore,
    database: &str,
    before: Option<NaiveDateTime>,
    tables: &[String],
) -> Result<Option<BackupRecord>> {
    let mut filter = HistoryFilter::database(database).with_type(BackupType::Full);
    if let Some(at) = before {
        filter = filter.finished_before(at);
    }
    let fulls = history.finished_backups(&filter).await?;
    Ok(fulls
        .into_iter()
        .rev()
        .find(|full| tables.iter().all(|t| full.contains_table(t))))
}
