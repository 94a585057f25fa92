use crate::constants::restore::{BACKUP_TABLE_SUFFIX, TEMP_TABLE_SUFFIX};
use crate::executor::{ExecutionMonitor, ExecutionResult, JobKind};
use crate::sql::{SqlClient, qualified, quote_identifier, validate_identifier};
use crate::store::{
    BackupRecord, BackupType, CatalogStore, HistoryFilter, HistoryStore, JobStatus,
    latest_full_covering,
};
use crate::{BrError, Result};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreKind {
    Full,
    Incremental,
}

impl From<BackupType> for RestoreKind {
    fn from(backup_type: BackupType) -> Self {
        match backup_type {
            BackupType::Full => RestoreKind::Full,
            BackupType::Incremental => RestoreKind::Incremental,
        }
    }
}

/// 恢复链中的一步
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreStep {
    pub kind: RestoreKind,
    pub snapshot_label: String,
    /// 备份完成时间，恢复链按它排序
    pub backup_timestamp: NaiveDateTime,
    pub record: BackupRecord,
}

impl RestoreStep {
    fn from_record(record: BackupRecord) -> Result<Self> {
        let backup_timestamp = record.finished_at.ok_or_else(|| {
            BrError::restore_chain(format!("备份 {} 缺少完成时间", record.label))
        })?;
        Ok(Self {
            kind: record.backup_type.into(),
            snapshot_label: record.label.clone(),
            backup_timestamp,
            record,
        })
    }

    /// 增量步骤中某表的分区，全量步骤为 None
    pub fn partitions(&self, table: &str) -> Option<&[String]> {
        match self.kind {
            RestoreKind::Full => None,
            RestoreKind::Incremental => self.record.partitions_of(table),
        }
    }
}

/// 单表恢复到指定时间点所需的快照链
///
/// 取目标时间之前最近一次包含该表的全量备份，再加上其后包含该表的增量备份（升序）。
/// 早于全量备份的增量不会进入恢复链。
pub async fn resolve_chain(
    history: &dyn HistoryStore,
    database: &str,
    table: &str,
    target: NaiveDateTime,
) -> Result<Vec<RestoreStep>> {
    let full = latest_full_covering(history, database, Some(target), &[table.to_string()])
        .await?
        .ok_or_else(|| {
            BrError::restore_chain(format!(
                "{database} 在 {target} 之前没有包含表 {table} 的已完成全量备份"
            ))
        })?;

    let full = RestoreStep::from_record(full)?;
    let incrementals = history
        .finished_backups(
            &HistoryFilter::database(database)
                .with_type(BackupType::Incremental)
                .finished_before(target),
        )
        .await?;

    let mut chain = vec![full];
    for record in incrementals {
        if !record.contains_table(table) {
            continue;
        }
        let step = RestoreStep::from_record(record)?;
        if step.backup_timestamp > chain[0].backup_timestamp {
            chain.push(step);
        }
    }
    chain[1..].sort_by_key(|s| s.backup_timestamp);

    info!(
        "{}.{} 恢复到 {}: {}",
        database,
        table,
        target,
        chain
            .iter()
            .map(|s| s.snapshot_label.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    Ok(chain)
}

/// 按标签恢复：全量返回自身；增量返回之前最近一次覆盖其全部表的全量加上自身
pub async fn resolve_pair(history: &dyn HistoryStore, target_label: &str) -> Result<Vec<RestoreStep>> {
    let target = history
        .get_backup(target_label)
        .await?
        .ok_or_else(|| BrError::restore_chain(format!("备份 {target_label} 不存在")))?;

    if target.status != JobStatus::Finished {
        return Err(BrError::restore_chain(format!(
            "备份 {target_label} 状态为 {}，无法用于恢复",
            target.status
        )));
    }

    let target = RestoreStep::from_record(target)?;
    if target.kind == RestoreKind::Full {
        return Ok(vec![target]);
    }

    let full = latest_full_covering(
        history,
        &target.record.database_name,
        Some(target.backup_timestamp),
        &target.record.tables,
    )
    .await?
    .ok_or_else(|| {
        BrError::restore_chain(format!(
            "增量备份 {target_label} ({}) 之前没有包含其全部表的已完成全量备份",
            target.backup_timestamp
        ))
    })?;

    Ok(vec![RestoreStep::from_record(full)?, target])
}

/// RESTORE 语句中的一张表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreTarget {
    pub table: String,
    pub alias: Option<String>,
    pub partitions: Vec<String>,
}

/// 构造 RESTORE 语句
pub fn build_restore_statement(
    database: &str,
    label: &str,
    repository: &str,
    targets: &[RestoreTarget],
    backup_timestamp: Option<&str>,
) -> Result<String> {
    if targets.is_empty() {
        return Err(BrError::restore_chain(format!("快照 {label} 没有需要恢复的表")));
    }

    let mut entries = Vec::with_capacity(targets.len());
    for target in targets {
        let mut entry = format!("TABLE {}", quote_identifier(&target.table)?);
        if !target.partitions.is_empty() {
            let mut partitions = Vec::with_capacity(target.partitions.len());
            for partition in &target.partitions {
                partitions.push(quote_identifier(partition)?);
            }
            entry.push_str(&format!(" PARTITION ({})", partitions.join(", ")));
        }
        if let Some(alias) = &target.alias {
            entry.push_str(&format!(" AS {}", quote_identifier(alias)?));
        }
        entries.push(entry);
    }

    let mut statement = format!(
        "RESTORE SNAPSHOT {} FROM {} ON ({})",
        qualified(database, label)?,
        quote_identifier(repository)?,
        entries.join(", ")
    );
    if let Some(ts) = backup_timestamp {
        if !ts.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | ' ' | '.')) {
            return Err(BrError::restore_chain(format!(
                "快照 {label} 的 backup_timestamp 格式异常: {ts}"
            )));
        }
        statement.push_str(&format!(" PROPERTIES (\"backup_timestamp\" = \"{ts}\")"));
    }
    Ok(statement)
}

/// 恢复写入的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// 恢复到 `<table>_restored`，之后切换
    Cutover,
    /// 直接恢复到原表名，要求原表不存在
    InPlace,
}

/// 一次恢复请求
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub database: String,
    pub repository: String,
    pub tables: Vec<String>,
    /// 非空时只恢复这些分区
    pub partitions: Vec<String>,
    pub mode: RestoreMode,
}

/// 一条待执行的 RESTORE 语句
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRestore {
    pub label: String,
    pub statement: String,
}

pub fn temp_table_name(table: &str) -> String {
    format!("{table}{TEMP_TABLE_SUFFIX}")
}

pub fn backup_table_name(table: &str) -> String {
    format!("{table}{BACKUP_TABLE_SUFFIX}")
}

/// 把恢复链展开为按顺序执行的语句
///
/// 请求的每张表都必须出现在全量快照中；增量步骤只恢复它实际包含的表和分区。
pub async fn plan_statements(
    catalog: &dyn CatalogStore,
    request: &RestoreRequest,
    chain: &[RestoreStep],
) -> Result<Vec<PlannedRestore>> {
    let Some(full) = chain.first() else {
        return Err(BrError::restore_chain("恢复链为空"));
    };
    if full.kind != RestoreKind::Full {
        return Err(BrError::restore_chain(format!(
            "恢复链必须以全量备份开始，实际为 {}",
            full.snapshot_label
        )));
    }
    if request.tables.is_empty() {
        return Err(BrError::restore_chain("没有指定需要恢复的表"));
    }

    let missing: Vec<&str> = request
        .tables
        .iter()
        .filter(|t| !full.record.contains_table(t))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(BrError::restore_chain(format!(
            "全量备份 {} 中缺少表: {}",
            full.snapshot_label,
            missing.join(", ")
        )));
    }

    let alias = |table: &str| match request.mode {
        RestoreMode::Cutover => Some(temp_table_name(table)),
        RestoreMode::InPlace => None,
    };

    let mut planned = Vec::with_capacity(chain.len());
    for step in chain {
        let mut targets = Vec::new();
        for table in &request.tables {
            let partitions = match step.partitions(table) {
                None if step.kind == RestoreKind::Full => request.partitions.clone(),
                None => continue,
                Some(step_partitions) if request.partitions.is_empty() => step_partitions.to_vec(),
                Some(step_partitions) => step_partitions
                    .iter()
                    .filter(|p| request.partitions.contains(p))
                    .cloned()
                    .collect(),
            };
            if step.kind == RestoreKind::Incremental && partitions.is_empty() {
                continue;
            }
            targets.push(RestoreTarget {
                table: table.clone(),
                alias: alias(table),
                partitions,
            });
        }

        if targets.is_empty() {
            info!("快照 {} 不涉及请求的表，跳过", step.snapshot_label);
            continue;
        }

        let timestamp = catalog
            .snapshot_timestamp(&request.repository, &step.snapshot_label)
            .await?;
        if timestamp.is_none() {
            warn!("仓库中未找到快照 {} 的 backup_timestamp", step.snapshot_label);
        }

        planned.push(PlannedRestore {
            label: step.snapshot_label.clone(),
            statement: build_restore_statement(
                &request.database,
                &step.snapshot_label,
                &request.repository,
                &targets,
                timestamp.as_deref(),
            )?,
        });
    }
    Ok(planned)
}

/// 原表存在时拒绝直接恢复
pub async fn ensure_in_place_allowed(catalog: &dyn CatalogStore, database: &str, table: &str) -> Result<()> {
    if catalog.table_exists(database, table).await? {
        return Err(BrError::restore_chain(format!(
            "表 {database}.{table} 已存在，时间点恢复只能写入不存在的表。请先删除或改名后重试"
        )));
    }
    Ok(())
}

/// 按顺序执行恢复语句，任一步未成功即停止
///
/// 失败的那一步作为最后一个结果返回，调用方据此记录真实终态。
pub async fn execute_chain(
    monitor: &ExecutionMonitor,
    database: &str,
    planned: &[PlannedRestore],
) -> Vec<ExecutionResult> {
    let mut results = Vec::with_capacity(planned.len());
    for (index, restore) in planned.iter().enumerate() {
        info!(
            "执行恢复 {}/{}: {}",
            index + 1,
            planned.len(),
            restore.label
        );
        let result = monitor
            .run(JobKind::Restore, database, &restore.label, &restore.statement)
            .await;
        let success = result.success;
        results.push(result);
        if !success {
            break;
        }
    }
    results
}

/// 切换失败的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoverFailure {
    pub table: String,
    /// 原表是否已改名为备份名（此时线上表名暂时不存在）
    pub original_renamed: bool,
    pub message: String,
}

/// 切换结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutoverReport {
    pub switched: Vec<String>,
    pub failed: Option<CutoverFailure>,
}

impl CutoverReport {
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_some() {
            return Err(BrError::Cutover(self.to_string()));
        }
        Ok(self)
    }
}

impl fmt::Display for CutoverReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let switched = if self.switched.is_empty() {
            "无".to_string()
        } else {
            self.switched.join(", ")
        };
        match &self.failed {
            None => write!(f, "已切换: {switched}"),
            Some(failure) if failure.original_renamed => write!(
                f,
                "已切换: {switched}；表 {} 已改名为 {}，但 {} 未能切换回原名: {}",
                failure.table,
                backup_table_name(&failure.table),
                temp_table_name(&failure.table),
                failure.message
            ),
            Some(failure) => write!(
                f,
                "已切换: {switched}；表 {} 切换失败，原表未改动: {}",
                failure.table, failure.message
            ),
        }
    }
}

/// 逐表把 `<t>_restored` 切换为 `<t>`，原表改名为 `<t>_backup`
///
/// 多条 RENAME 之间没有事务，中途失败时报告已切换的表和失败位置。
/// 开始前检查所有 `<t>_backup` 都不存在；原表已被删除时直接把 `<t>_restored` 改回原名。
pub async fn cutover(
    client: &dyn SqlClient,
    catalog: &dyn CatalogStore,
    database: &str,
    tables: &[String],
) -> Result<CutoverReport> {
    validate_identifier(database)?;
    let mut live_exists = Vec::with_capacity(tables.len());
    for table in tables {
        validate_identifier(table)?;
        let exists = catalog.table_exists(database, table).await?;
        let backup = backup_table_name(table);
        if exists && catalog.table_exists(database, &backup).await? {
            return Err(BrError::Cutover(format!(
                "{} 已存在，请先清理上一次切换留下的旧表",
                qualified(database, &backup)?
            )));
        }
        live_exists.push(exists);
    }

    let mut report = CutoverReport::default();
    for (table, exists) in tables.iter().zip(live_exists) {
        let live = qualified(database, table)?;
        let backup = qualified(database, &backup_table_name(table))?;
        let temp = qualified(database, &temp_table_name(table))?;

        if !exists {
            warn!("{} 不存在，跳过旧表改名", live);
        } else if let Err(e) = client
            .execute(&format!("RENAME TABLE {live} TO {backup}"))
            .await
        {
            error!("切换 {} 失败: {}", live, e);
            report.failed = Some(CutoverFailure {
                table: table.clone(),
                original_renamed: false,
                message: e.to_string(),
            });
            return Ok(report);
        }

        if let Err(e) = client
            .execute(&format!("RENAME TABLE {temp} TO {live}"))
            .await
        {
            error!("切换 {} 失败: {}", live, e);
            report.failed = Some(CutoverFailure {
                table: table.clone(),
                original_renamed: exists,
                message: e.to_string(),
            });
            return Ok(report);
        }

        if exists {
            info!("已切换 {}，旧表保留为 {}", live, backup);
        } else {
            info!("已恢复 {}", live);
        }
        report.switched.push(table.clone());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PollSettings;
    use crate::sql::SqlRow;
    use crate::testing::{MemoryStore, NoopSleeper, ScriptedClient, finished_backup, ts};
    use std::sync::Arc;
    use std::time::Duration;

    fn store_with_history() -> MemoryStore {
        let store = MemoryStore::new();
        // T(-1) 早于全量的增量
        store.add_backup(finished_backup(
            "inc_before",
            BackupType::Incremental,
            ts(9, 0),
            &["orders"],
            Some(&[("orders", &["p0"])]),
        ));
        store.add_backup(finished_backup(
            "full_t0",
            BackupType::Full,
            ts(10, 0),
            &["orders", "customers"],
            None,
        ));
        store.add_backup(finished_backup(
            "inc_after",
            BackupType::Incremental,
            ts(11, 0),
            &["orders"],
            Some(&[("orders", &["p1", "p2"])]),
        ));
        store.add_backup(finished_backup(
            "inc_other_table",
            BackupType::Incremental,
            ts(11, 5),
            &["customers"],
            Some(&[("customers", &["c1"])]),
        ));
        store.add_backup(finished_backup(
            "inc_later",
            BackupType::Incremental,
            ts(12, 0),
            &["orders"],
            Some(&[("orders", &["p3"])]),
        ));
        store
    }

    fn labels(chain: &[RestoreStep]) -> Vec<&str> {
        chain.iter().map(|s| s.snapshot_label.as_str()).collect()
    }

    #[tokio::test]
    async fn test_chain_excludes_incrementals_before_full() {
        let store = store_with_history();
        let chain = resolve_chain(&store, "sales", "orders", ts(11, 0)).await.unwrap();
        assert_eq!(labels(&chain), vec!["full_t0", "inc_after"]);

        let chain = resolve_chain(&store, "sales", "orders", ts(20, 0)).await.unwrap();
        assert_eq!(labels(&chain), vec!["full_t0", "inc_after", "inc_later"]);
    }

    #[tokio::test]
    async fn test_chain_uses_latest_full_containing_table() {
        let store = MemoryStore::new();
        store.add_backup(finished_backup("full_orders", BackupType::Full, ts(10, 0), &["orders"], None));
        store.add_backup(finished_backup(
            "full_customers",
            BackupType::Full,
            ts(11, 0),
            &["customers"],
            None,
        ));
        store.add_backup(finished_backup(
            "inc_orders",
            BackupType::Incremental,
            ts(11, 30),
            &["orders"],
            Some(&[("orders", &["p1"])]),
        ));

        let chain = resolve_chain(&store, "sales", "orders", ts(12, 0)).await.unwrap();
        assert_eq!(labels(&chain), vec!["full_orders", "inc_orders"]);

        let pair = resolve_pair(&store, "inc_orders").await.unwrap();
        assert_eq!(labels(&pair), vec!["full_orders", "inc_orders"]);
    }

    #[tokio::test]
    async fn test_chain_without_full_is_error() {
        let store = store_with_history();
        let err = resolve_chain(&store, "sales", "orders", ts(9, 12)).await.unwrap_err();
        assert!(matches!(err, BrError::RestoreChain(_)));
    }

    #[tokio::test]
    async fn test_resolve_pair() {
        let store = store_with_history();
        assert_eq!(
            labels(&resolve_pair(&store, "full_t0").await.unwrap()),
            vec!["full_t0"]
        );
        assert_eq!(
            labels(&resolve_pair(&store, "inc_later").await.unwrap()),
            vec!["full_t0", "inc_later"]
        );
        assert!(matches!(
            resolve_pair(&store, "inc_before").await,
            Err(BrError::RestoreChain(_))
        ));
        assert!(matches!(
            resolve_pair(&store, "missing").await,
            Err(BrError::RestoreChain(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_pair_rejects_unfinished_target() {
        let store = MemoryStore::new();
        let mut running = finished_backup("running", BackupType::Full, ts(10, 0), &[], None);
        running.status = JobStatus::Running;
        store.add_backup(running);
        assert!(matches!(
            resolve_pair(&store, "running").await,
            Err(BrError::RestoreChain(_))
        ));
    }

    #[test]
    fn test_restore_statement_shape() {
        let sql = build_restore_statement(
            "sales",
            "full_t0",
            "br_repo",
            &[RestoreTarget {
                table: "orders".into(),
                alias: Some("orders_restored".into()),
                partitions: vec!["p1".into()],
            }],
            Some("2025-10-10-00-00-00-123"),
        )
        .unwrap();
        assert_eq!(
            sql,
            "RESTORE SNAPSHOT sales.full_t0 FROM br_repo ON \
             (TABLE orders PARTITION (p1) AS orders_restored) \
             PROPERTIES (\"backup_timestamp\" = \"2025-10-10-00-00-00-123\")"
        );
    }

    #[tokio::test]
    async fn test_planned_statements_follow_chain_order() {
        let store = store_with_history();
        store.add_snapshot("full_t0", "2025-10-10-00-00-00-001");
        let chain = resolve_chain(&store, "sales", "orders", ts(20, 0)).await.unwrap();
        let request = RestoreRequest {
            database: "sales".into(),
            repository: "br_repo".into(),
            tables: vec!["orders".into()],
            partitions: vec![],
            mode: RestoreMode::InPlace,
        };
        let planned = plan_statements(&store, &request, &chain).await.unwrap();
        assert_eq!(
            planned.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
            vec!["full_t0", "inc_after", "inc_later"]
        );
        assert!(planned[0].statement.contains("ON (TABLE orders)"));
        assert!(planned[0].statement.contains("backup_timestamp"));
        assert!(planned[1].statement.contains("TABLE orders PARTITION (p1, p2)"));
        assert!(!planned[1].statement.contains("PROPERTIES"));
    }

    #[tokio::test]
    async fn test_missing_table_in_full_fails_before_any_statement() {
        let store = store_with_history();
        let chain = resolve_pair(&store, "full_t0").await.unwrap();
        let request = RestoreRequest {
            database: "sales".into(),
            repository: "br_repo".into(),
            tables: vec!["orders".into(), "refunds".into()],
            partitions: vec![],
            mode: RestoreMode::Cutover,
        };
        let err = plan_statements(&store, &request, &chain).await.unwrap_err();
        assert!(err.to_string().contains("refunds"));
    }

    #[tokio::test]
    async fn test_execute_chain_runs_full_before_incrementals() {
        let store = store_with_history();
        let chain = resolve_chain(&store, "sales", "orders", ts(20, 0)).await.unwrap();
        let request = RestoreRequest {
            database: "sales".into(),
            repository: "br_repo".into(),
            tables: vec!["orders".into()],
            partitions: vec![],
            mode: RestoreMode::Cutover,
        };
        let planned = plan_statements(&store, &request, &chain).await.unwrap();

        let client = Arc::new(ScriptedClient::new());
        let finished = |label: &str| {
            Ok(vec![SqlRow::named(&[
                ("Label", Some(label)),
                ("State", Some("FINISHED")),
            ])])
        };
        client.respond_sequence(
            "SHOW RESTORE",
            vec![finished("full_t0"), finished("inc_after"), finished("inc_later")],
        );
        let monitor = ExecutionMonitor::with_sleeper(
            client.clone(),
            Arc::new(NoopSleeper::default()),
            PollSettings {
                max_polls: 3,
                interval: Duration::from_millis(1),
            },
        );

        let results = execute_chain(&monitor, "sales", &planned).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));

        let restores = client.statements_containing("RESTORE SNAPSHOT");
        assert_eq!(restores.len(), 3);
        assert!(restores[0].contains("sales.full_t0"));
        assert!(restores[1].contains("sales.inc_after"));
        assert!(restores[2].contains("sales.inc_later"));
        assert!(restores.iter().all(|s| s.contains("AS orders_restored")));
    }

    #[tokio::test]
    async fn test_cutover_renames_in_order() {
        let client = ScriptedClient::new();
        let store = MemoryStore::new();
        store.add_table("sales", "orders");
        store.add_table("sales", "customers");
        let report = cutover(&client, &store, "sales", &["orders".into(), "customers".into()])
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(report.switched, vec!["orders", "customers"]);
        assert_eq!(
            client.statements(),
            vec![
                "RENAME TABLE sales.orders TO sales.orders_backup",
                "RENAME TABLE sales.orders_restored TO sales.orders",
                "RENAME TABLE sales.customers TO sales.customers_backup",
                "RENAME TABLE sales.customers_restored TO sales.customers",
            ]
        );
    }

    #[tokio::test]
    async fn test_cutover_partial_failure_is_reported() {
        let client = ScriptedClient::new();
        client.fail_on("sales.customers_restored TO", "table not found");
        let store = MemoryStore::new();
        store.add_table("sales", "orders");
        store.add_table("sales", "customers");
        let report = cutover(&client, &store, "sales", &["orders".into(), "customers".into()])
            .await
            .unwrap();

        assert_eq!(report.switched, vec!["orders"]);
        let failure = report.failed.clone().unwrap();
        assert_eq!(failure.table, "customers");
        assert!(failure.original_renamed);
        let err = report.into_result().unwrap_err();
        assert!(matches!(err, BrError::Cutover(_)));
        assert!(err.to_string().contains("customers_backup"));
    }

    #[tokio::test]
    async fn test_cutover_refuses_when_backup_name_taken() {
        let client = ScriptedClient::new();
        let store = MemoryStore::new();
        store.add_table("sales", "orders");
        store.add_table("sales", "orders_backup");
        let err = cutover(&client, &store, "sales", &["orders".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, BrError::Cutover(_)));
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn test_cutover_of_dropped_table_only_renames_restored_copy() {
        let client = ScriptedClient::new();
        let store = MemoryStore::new();
        store.add_table("sales", "customers");
        // 上一次切换留下的旧表不影响已删除的表
        store.add_table("sales", "orders_backup");

        let report = cutover(&client, &store, "sales", &["orders".into(), "customers".into()])
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(report.switched, vec!["orders", "customers"]);
        assert_eq!(
            client.statements(),
            vec![
                "RENAME TABLE sales.orders_restored TO sales.orders",
                "RENAME TABLE sales.customers TO sales.customers_backup",
                "RENAME TABLE sales.customers_restored TO sales.customers",
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_table_failure_is_not_reported_as_renamed() {
        let client = ScriptedClient::new();
        client.fail_on("sales.orders_restored TO", "table not found");
        let store = MemoryStore::new();

        let report = cutover(&client, &store, "sales", &["orders".into()]).await.unwrap();
        assert!(!report.failed.unwrap().original_renamed);
    }

    #[tokio::test]
    async fn test_in_place_guard() {
        let store = MemoryStore::new();
        store.add_table("sales", "orders");
        assert!(ensure_in_place_allowed(&store, "sales", "orders").await.is_err());
        assert!(ensure_in_place_allowed(&store, "sales", "refunds").await.is_ok());
    }
}
