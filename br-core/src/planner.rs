use crate::constants::control;
use crate::sql::{quote_identifier, validate_identifier};
use crate::store::{
    BackupRecord, BackupType, CatalogStore, HistoryFilter, HistoryStore, JobStatus,
    latest_full_covering,
};
use crate::{BrError, Result};
use chrono::{Days, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 单表的变更分区，分区列表保证非空
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChanges {
    table: String,
    partitions: Vec<String>,
}

impl TableChanges {
    /// 分区为空时返回 None：没有变更的表不进入增量计划
    pub fn new(table: impl Into<String>, partitions: Vec<String>) -> Option<Self> {
        if partitions.is_empty() {
            return None;
        }
        Some(Self {
            table: table.into(),
            partitions,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }
}

/// 备份计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupPlan {
    Full { tables: Vec<String> },
    Incremental { changes: Vec<TableChanges> },
}

impl BackupPlan {
    pub fn backup_type(&self) -> BackupType {
        match self {
            BackupPlan::Full { .. } => BackupType::Full,
            BackupPlan::Incremental { .. } => BackupType::Incremental,
        }
    }

    /// 计划涉及的表，按发现顺序
    pub fn tables(&self) -> Vec<String> {
        match self {
            BackupPlan::Full { tables } => tables.clone(),
            BackupPlan::Incremental { changes } => {
                changes.iter().map(|c| c.table.clone()).collect()
            }
        }
    }

    /// 没有任何表需要提交
    pub fn is_empty(&self) -> bool {
        match self {
            BackupPlan::Full { tables } => tables.is_empty(),
            BackupPlan::Incremental { changes } => changes.is_empty(),
        }
    }

    /// 增量计划的分区映射，全量计划为 None
    pub fn partitions_by_table(&self) -> Option<BTreeMap<String, Vec<String>>> {
        match self {
            BackupPlan::Full { .. } => None,
            BackupPlan::Incremental { changes } => Some(
                changes
                    .iter()
                    .map(|c| (c.table.clone(), c.partitions.clone()))
                    .collect(),
            ),
        }
    }
}

/// 增量备份的基线
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// 指定标签，必须是已完成的备份
    Explicit(String),
    /// 该库最近一次已完成的全量备份
    LatestFull,
}

/// 把表名规整为库内的裸表名
///
/// `db.table` 形式只接受与目标库一致的库名；结果去重并保持原顺序。
pub fn normalize_tables(database: &str, tables: &[String]) -> Result<Vec<String>> {
    let mut normalized: Vec<String> = Vec::with_capacity(tables.len());
    for raw in tables {
        let raw = validate_identifier(raw.trim())?;
        let table = match raw.split_once('.') {
            Some((db, table)) if db == database => table,
            Some((db, _)) => {
                return Err(BrError::configuration(format!(
                    "表 {raw} 不属于备份库 {database}（属于 {db}）"
                )));
            }
            None => raw,
        };
        let table = validate_identifier(table)?;
        if !normalized.iter().any(|t| t == table) {
            normalized.push(table.to_string());
        }
    }
    Ok(normalized)
}

fn baseline_time(record: &BackupRecord) -> Result<NaiveDateTime> {
    record.finished_at.ok_or_else(|| {
        BrError::planning(format!("基线备份 {} 缺少完成时间", record.label))
    })
}

async fn diff_since(
    catalog: &dyn CatalogStore,
    database: &str,
    tables: &[String],
    since: NaiveDateTime,
) -> Result<Vec<TableChanges>> {
    let mut changes = Vec::new();
    for table in tables {
        let partitions = catalog.changed_partitions(database, table, since).await?;
        debug!("表 {}.{} 变更分区: {:?}", database, table, partitions);
        changes.extend(TableChanges::new(table.clone(), partitions));
    }
    Ok(changes)
}

/// 根据历史决定全量或增量
///
/// 该库没有任何已完成备份时做全量；否则以最近一次已完成备份的完成时间为基线
/// 做增量，没有变更的表被省略，全部无变更时得到空增量计划。
pub async fn decide_plan(
    history: &dyn HistoryStore,
    catalog: &dyn CatalogStore,
    database: &str,
    tables: &[String],
) -> Result<BackupPlan> {
    let tables = normalize_tables(database, tables)?;
    if tables.is_empty() {
        return Err(BrError::planning("没有需要备份的表"));
    }

    let Some(baseline) = history
        .latest_finished(&HistoryFilter::database(database))
        .await?
    else {
        info!("{} 没有已完成的备份，执行全量备份", database);
        return Ok(BackupPlan::Full { tables });
    };

    let since = baseline_time(&baseline)?;
    info!("以 {} ({}) 为基线计算增量", baseline.label, since);
    let changes = diff_since(catalog, database, &tables, since).await?;
    Ok(BackupPlan::Incremental { changes })
}

/// 分组增量：基线由调用方指定，找不到时报错，不退回全量
pub async fn decide_group_plan(
    history: &dyn HistoryStore,
    catalog: &dyn CatalogStore,
    database: &str,
    tables: &[String],
    baseline: &Baseline,
) -> Result<BackupPlan> {
    let tables = normalize_tables(database, tables)?;
    if tables.is_empty() {
        return Err(BrError::planning("分组中没有需要备份的表"));
    }

    let record = match baseline {
        Baseline::Explicit(label) => {
            let record = history.get_backup(label).await?.ok_or_else(|| {
                BrError::planning(format!("指定的基线备份 {label} 不存在"))
            })?;
            if record.status != JobStatus::Finished {
                return Err(BrError::planning(format!(
                    "指定的基线备份 {label} 状态为 {}，不可作为基线",
                    record.status
                )));
            }
            if record.database_name != database {
                return Err(BrError::planning(format!(
                    "基线备份 {label} 属于库 {}，与目标库 {database} 不一致",
                    record.database_name
                )));
            }
            record
        }
        Baseline::LatestFull => latest_full_covering(history, database, None, &tables)
            .await?
            .ok_or_else(|| {
                BrError::planning(format!(
                    "{database} 没有覆盖表 {} 的已完成全量备份可作为基线",
                    tables.join(", ")
                ))
            })?,
    };

    let since = baseline_time(&record)?;
    info!("分组增量基线: {} ({})", record.label, since);
    let changes = diff_since(catalog, database, &tables, since).await?;
    Ok(BackupPlan::Incremental { changes })
}

/// 最近 N 天内有更新的分区，按表的给定顺序分组
pub async fn plan_recent(
    catalog: &dyn CatalogStore,
    database: &str,
    tables: &[String],
    days: u32,
    today: NaiveDate,
) -> Result<BackupPlan> {
    let tables = normalize_tables(database, tables)?;
    if tables.is_empty() {
        return Err(BrError::planning("没有需要备份的表"));
    }

    let threshold = today
        .checked_sub_days(Days::new(u64::from(days)))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| BrError::planning(format!("无效的天数: {days}")))?;

    let found = catalog
        .partitions_updated_since(database, &tables, threshold)
        .await?;

    let mut by_table: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for partition in &found {
        let entry = by_table.entry(partition.table.as_str()).or_default();
        if !entry.contains(&partition.partition_name) {
            entry.push(partition.partition_name.clone());
        }
    }

    let changes = tables
        .iter()
        .filter_map(|t| TableChanges::new(t.clone(), by_table.remove(t.as_str())?))
        .collect::<Vec<_>>();
    info!(
        "最近 {} 天（自 {}）有 {} 张表存在更新分区",
        days,
        threshold,
        changes.len()
    );
    Ok(BackupPlan::Incremental { changes })
}

/// 全量备份语句，末尾总是带上备份历史表；没有表时返回 None
pub fn build_full_backup_command(
    database: &str,
    label: &str,
    repository: &str,
    tables: &[String],
) -> Result<Option<String>> {
    if tables.is_empty() {
        return Ok(None);
    }
    let mut entries = Vec::with_capacity(tables.len() + 1);
    for table in tables {
        entries.push(format!("TABLE {}", quote_identifier(table)?));
    }
    entries.push(format!("TABLE {}", control::BACKUP_HISTORY));

    Ok(Some(format!(
        "BACKUP DATABASE {} SNAPSHOT {} TO {} ON ({})",
        quote_identifier(database)?,
        quote_identifier(label)?,
        quote_identifier(repository)?,
        entries.join(", ")
    )))
}

/// 增量备份语句，每张变更表一项；没有变更时返回 None
pub fn build_incremental_backup_command(
    database: &str,
    label: &str,
    repository: &str,
    changes: &[TableChanges],
) -> Result<Option<String>> {
    if changes.is_empty() {
        return Ok(None);
    }
    let mut entries = Vec::with_capacity(changes.len());
    for change in changes {
        let mut partitions = Vec::with_capacity(change.partitions.len());
        for partition in &change.partitions {
            partitions.push(quote_identifier(partition)?);
        }
        entries.push(format!(
            "TABLE {} PARTITION ({})",
            quote_identifier(&change.table)?,
            partitions.join(", ")
        ));
    }

    Ok(Some(format!(
        "BACKUP DATABASE {} SNAPSHOT {} TO {} ON ({})",
        quote_identifier(database)?,
        quote_identifier(label)?,
        quote_identifier(repository)?,
        entries.join(", ")
    )))
}

/// 按计划类型构造语句
pub fn build_backup_command(
    plan: &BackupPlan,
    database: &str,
    label: &str,
    repository: &str,
) -> Result<Option<String>> {
    match plan {
        BackupPlan::Full { tables } => {
            build_full_backup_command(database, label, repository, tables)
        }
        BackupPlan::Incremental { changes } => {
            build_incremental_backup_command(database, label, repository, changes)
        }
    }
}
