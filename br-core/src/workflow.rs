// 备份/恢复编排
//
// 每次调用按固定顺序执行：健康检查 -> 规划 -> 标签 -> 预留槽位 -> 提交与轮询 -> 收尾。
// 预留槽位之后的任何结果（成功、规划失败、执行失败）都会进入收尾：写历史表并
// 释放槽位。收尾失败只记录日志，不改变任务本身的结果。

use crate::concurrency::JobGate;
use crate::executor::{ExecutionMonitor, ExecutionResult, JobKind};
use crate::health::check_cluster_health;
use crate::labels::{self, BackupKind};
use crate::planner::{self, Baseline, BackupPlan};
use crate::restore::{
    self, CutoverReport, PlannedRestore, RestoreMode, RestoreRequest, RestoreStep,
};
use crate::sql::SqlClient;
use crate::store::{
    BackupRecord, CatalogStore, HistoryStore, JobScope, JobStatus, RestoreRecord, RunStatusStore,
    SlotState,
};
use crate::{BrError, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 编排依赖的协作者
#[derive(Clone)]
pub struct Collaborators {
    pub client: Arc<dyn SqlClient>,
    pub history: Arc<dyn HistoryStore>,
    pub slots: Arc<dyn RunStatusStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub monitor: ExecutionMonitor,
}

/// 目标库与仓库
#[derive(Debug, Clone)]
pub struct Target {
    pub database: String,
    pub repository: String,
    /// 未指定分组时使用的表
    pub default_tables: Vec<String>,
    pub health_check: bool,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

async fn ensure_healthy(client: &dyn SqlClient, enabled: bool) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    check_cluster_health(client).await?.into_result()?;
    Ok(())
}

/// 备份计划来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    /// 按历史自动决定全量或增量
    Auto,
    /// 分组增量，相对基线
    Group { group: String, baseline: Baseline },
    /// 最近 N 天内更新的分区
    Recent { group: Option<String>, days: u32 },
    /// 全量（full / weekly / monthly）
    Full {
        group: Option<String>,
        kind: BackupKind,
    },
}

/// 一次备份的结果
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    pub label: String,
    pub plan: BackupPlan,
    /// 空增量计划不提交任务，此时为 None
    pub execution: Option<ExecutionResult>,
}

pub struct BackupManager {
    deps: Collaborators,
    target: Target,
    gate: JobGate,
}

impl BackupManager {
    pub fn new(deps: Collaborators, target: Target) -> Self {
        let gate = JobGate::new(deps.slots.clone());
        Self { deps, target, gate }
    }

    async fn tables_for(&self, group: Option<&str>) -> Result<Vec<String>> {
        let tables = match group {
            Some(group) => {
                self.deps
                    .catalog
                    .inventory_tables(group, &self.target.database)
                    .await?
            }
            None => self.target.default_tables.clone(),
        };
        if tables.is_empty() {
            return Err(match group {
                Some(group) => BrError::planning(format!(
                    "分组 {group} 在 {} 中没有登记任何表",
                    self.target.database
                )),
                None => BrError::configuration("backup.tables 为空，请配置需要备份的表或使用 --group"),
            });
        }
        Ok(tables)
    }

    async fn plan(&self, source: &PlanSource, today: NaiveDate) -> Result<(BackupPlan, BackupKind)> {
        let database = self.target.database.as_str();
        let history = self.deps.history.as_ref();
        let catalog = self.deps.catalog.as_ref();

        match source {
            PlanSource::Auto => {
                let tables = self.tables_for(None).await?;
                let plan = planner::decide_plan(history, catalog, database, &tables).await?;
                let kind = BackupKind::from(plan.backup_type());
                Ok((plan, kind))
            }
            PlanSource::Group { group, baseline } => {
                let tables = self.tables_for(Some(group)).await?;
                let plan =
                    planner::decide_group_plan(history, catalog, database, &tables, baseline)
                        .await?;
                Ok((plan, BackupKind::Incremental))
            }
            PlanSource::Recent { group, days } => {
                let tables = self.tables_for(group.as_deref()).await?;
                let plan = planner::plan_recent(catalog, database, &tables, *days, today).await?;
                Ok((plan, BackupKind::Incremental))
            }
            PlanSource::Full { group, kind } => {
                let tables = self.tables_for(group.as_deref()).await?;
                let tables = planner::normalize_tables(database, &tables)?;
                Ok((BackupPlan::Full { tables }, *kind))
            }
        }
    }

    async fn label(&self, kind: BackupKind, today: NaiveDate, name: Option<&str>) -> Result<String> {
        if let Some(label) = labels::resolve(self.deps.history.as_ref(), name).await? {
            // 历史表以 label 为主键，重名会覆盖已有记录
            if let Some(existing) = self.deps.history.get_backup(&label).await? {
                return Err(BrError::configuration(format!(
                    "标签 {label} 已被 {} 备份使用（状态 {}），请换一个名称",
                    existing.backup_type, existing.status
                )));
            }
            return Ok(label);
        }
        let base = labels::generate(&self.target.database, today, kind, &[]);
        let existing = self.deps.history.labels_like(&base).await?;
        Ok(labels::generate(&self.target.database, today, kind, &existing))
    }

    /// 执行一次备份
    #[instrument(skip(self), fields(database = %self.target.database))]
    pub async fn run(&self, source: PlanSource, name: Option<String>) -> Result<BackupOutcome> {
        ensure_healthy(self.deps.client.as_ref(), self.target.health_check).await?;

        let today = Local::now().date_naive();
        let (plan, kind) = self.plan(&source, today).await?;
        let label = self.label(kind, today, name.as_deref()).await?;
        info!(
            "备份计划: {} {} 张表，标签 {}",
            plan.backup_type(),
            plan.tables().len(),
            label
        );

        self.gate.reserve(JobScope::Backup, &label).await?;

        let started_at = now();
        let mut recorded = false;
        let outcome = self
            .run_reserved(&plan, &label, started_at, &mut recorded)
            .await;

        let (status, message) = match &outcome {
            Ok(Some(result)) => (result.state().status(), result.error_message.clone()),
            Ok(None) => (JobStatus::Finished, None),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        };
        self.finalize(&label, status, message.as_deref(), recorded)
            .await;

        let execution = match outcome? {
            Some(result) => Some(result.into_result()?),
            None => None,
        };
        Ok(BackupOutcome {
            label,
            plan,
            execution,
        })
    }

    async fn run_reserved(
        &self,
        plan: &BackupPlan,
        label: &str,
        started_at: NaiveDateTime,
        recorded: &mut bool,
    ) -> Result<Option<ExecutionResult>> {
        let statement = planner::build_backup_command(
            plan,
            &self.target.database,
            label,
            &self.target.repository,
        )?;

        let record = BackupRecord {
            label: label.to_string(),
            backup_type: plan.backup_type(),
            status: JobStatus::Running,
            repository: self.target.repository.clone(),
            database_name: self.target.database.clone(),
            started_at,
            finished_at: None,
            error_message: None,
            tables: plan.tables(),
            partitions: plan.partitions_by_table(),
        };
        self.deps.history.insert_backup(&record).await?;
        *recorded = true;

        let Some(statement) = statement else {
            info!("自上次备份以来没有分区变更，记录空增量 {}", label);
            return Ok(None);
        };

        let result = self
            .deps
            .monitor
            .run(JobKind::Backup, &self.target.database, label, &statement)
            .await;
        Ok(Some(result))
    }

    async fn finalize(&self, label: &str, status: JobStatus, message: Option<&str>, recorded: bool) {
        if recorded {
            if let Err(e) = self
                .deps
                .history
                .finish_backup(label, status, now(), message)
                .await
            {
                error!("更新备份历史 {} 为 {} 失败: {}", label, status, e);
            }
        }
        if let Err(e) = self
            .gate
            .complete(JobScope::Backup, label, SlotState::from(status))
            .await
        {
            error!("释放备份槽位 {} 失败: {}", label, e);
        }
    }
}

/// 恢复目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreSelection {
    /// 按快照标签恢复并切换；tables 为空时恢复快照中的全部表
    Label {
        label: String,
        tables: Vec<String>,
        partitions: Vec<String>,
    },
    /// 单表恢复到时间点，直接写入原表名
    PointInTime { table: String, at: NaiveDateTime },
}

impl RestoreSelection {
    fn restore_type(&self) -> &'static str {
        match self {
            RestoreSelection::Label { .. } => "cutover",
            RestoreSelection::PointInTime { .. } => "point_in_time",
        }
    }
}

/// 一次恢复的结果
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub job_id: String,
    pub chain: Vec<String>,
    pub results: Vec<ExecutionResult>,
    pub cutover: Option<CutoverReport>,
}

pub struct RestoreManager {
    deps: Collaborators,
    target: Target,
    gate: JobGate,
}

impl RestoreManager {
    pub fn new(deps: Collaborators, target: Target) -> Self {
        let gate = JobGate::new(deps.slots.clone());
        Self { deps, target, gate }
    }

    async fn prepare(&self, selection: &RestoreSelection) -> Result<(Vec<RestoreStep>, RestoreRequest)> {
        let database = self.target.database.as_str();
        let history = self.deps.history.as_ref();

        match selection {
            RestoreSelection::Label {
                label,
                tables,
                partitions,
            } => {
                let chain = restore::resolve_pair(history, label).await?;
                if chain[0].record.database_name != database {
                    return Err(BrError::restore_chain(format!(
                        "备份 {label} 属于库 {}，与配置的库 {database} 不一致",
                        chain[0].record.database_name
                    )));
                }
                let tables = if tables.is_empty() {
                    chain[0].record.tables.clone()
                } else {
                    planner::normalize_tables(database, tables)?
                };
                Ok((
                    chain,
                    RestoreRequest {
                        database: database.to_string(),
                        repository: self.target.repository.clone(),
                        tables,
                        partitions: partitions.clone(),
                        mode: RestoreMode::Cutover,
                    },
                ))
            }
            RestoreSelection::PointInTime { table, at } => {
                let table = planner::normalize_tables(database, std::slice::from_ref(table))?
                    .remove(0);
                restore::ensure_in_place_allowed(self.deps.catalog.as_ref(), database, &table)
                    .await?;
                let chain = restore::resolve_chain(history, database, &table, *at).await?;
                Ok((
                    chain,
                    RestoreRequest {
                        database: database.to_string(),
                        repository: self.target.repository.clone(),
                        tables: vec![table],
                        partitions: Vec::new(),
                        mode: RestoreMode::InPlace,
                    },
                ))
            }
        }
    }

    /// 执行一次恢复
    #[instrument(skip(self), fields(database = %self.target.database))]
    pub async fn run(&self, selection: RestoreSelection) -> Result<RestoreOutcome> {
        ensure_healthy(self.deps.client.as_ref(), self.target.health_check).await?;

        let (chain, request) = self.prepare(&selection).await?;
        let planned =
            restore::plan_statements(self.deps.catalog.as_ref(), &request, &chain).await?;
        let chain_labels: Vec<String> = chain.iter().map(|s| s.snapshot_label.clone()).collect();
        let target_label = chain_labels.last().cloned().unwrap_or_default();

        let job_id = format!("restore-{}", Uuid::now_v7().simple());
        info!(
            "恢复任务 {}: {}",
            job_id,
            chain_labels.join(" -> ")
        );

        self.gate.reserve(JobScope::Restore, &job_id).await?;
        let started_at = now();

        let mut terminal = JobStatus::Failed;
        let outcome = self.run_reserved(&request, &planned, &mut terminal).await;
        let (status, message) = match &outcome {
            Ok(_) => (JobStatus::Finished, None),
            Err(e) => (terminal, Some(e.to_string())),
        };

        let record = RestoreRecord {
            job_id: job_id.clone(),
            backup_label: target_label,
            restore_type: selection.restore_type().to_string(),
            status,
            repository: self.target.repository.clone(),
            started_at,
            finished_at: Some(now()),
            error_message: message,
        };
        self.finalize(&record).await;

        let (results, cutover) = outcome?;
        Ok(RestoreOutcome {
            job_id,
            chain: chain_labels,
            results,
            cutover,
        })
    }

    /// 失败时 terminal 写入任务的真实终态（LOST、TIMEOUT 等），其他错误保持 FAILED
    async fn run_reserved(
        &self,
        request: &RestoreRequest,
        planned: &[PlannedRestore],
        terminal: &mut JobStatus,
    ) -> Result<(Vec<ExecutionResult>, Option<CutoverReport>)> {
        let results = restore::execute_chain(&self.deps.monitor, &request.database, planned).await;
        if let Some(failed) = results.iter().find(|r| !r.success) {
            *terminal = failed.state().status();
            failed.clone().into_result()?;
        }

        if request.mode != RestoreMode::Cutover {
            return Ok((results, None));
        }

        let report = restore::cutover(
            self.deps.client.as_ref(),
            self.deps.catalog.as_ref(),
            &request.database,
            &request.tables,
        )
        .await?
        .into_result()?;
        Ok((results, Some(report)))
    }

    async fn finalize(&self, record: &RestoreRecord) {
        if let Err(e) = self.deps.history.insert_restore(record).await {
            error!("写入恢复历史 {} 失败: {}", record.job_id, e);
        }
        if let Err(e) = self
            .gate
            .complete(JobScope::Restore, &record.job_id, SlotState::from(record.status))
            .await
        {
            error!("释放恢复槽位 {} 失败: {}", record.job_id, e);
        }
        if record.status != JobStatus::Finished {
            warn!("恢复任务 {} 以 {} 结束", record.job_id, record.status);
        }
    }
}
