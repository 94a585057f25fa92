//! 测试用的内存实现：脚本化 SQL 客户端、内存控制表、计数睡眠器

use crate::executor::Sleeper;
use crate::sql::{SqlClient, SqlRow};
use crate::store::{
    BackupRecord, CatalogStore, HistoryFilter, HistoryStore, JobScope, JobStatus, PartitionRef,
    RestoreRecord, RunStatus, RunStatusStore, SlotState,
};
use crate::{BrError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

struct Script {
    pattern: String,
    responses: VecDeque<Result<Vec<SqlRow>>>,
}

/// 记录所有语句；查询按子串匹配脚本，队列只剩一项时重复返回该项
#[derive(Default)]
pub struct ScriptedClient {
    statements: Mutex<Vec<String>>,
    scripts: Mutex<Vec<Script>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, pattern: &str, rows: Vec<SqlRow>) {
        self.respond_sequence(pattern, vec![Ok(rows)]);
    }

    pub fn respond_sequence(&self, pattern: &str, responses: Vec<Result<Vec<SqlRow>>>) {
        self.scripts.lock().unwrap().push(Script {
            pattern: pattern.to_string(),
            responses: responses.into(),
        });
    }

    /// 包含 pattern 的语句（execute 或 query）返回错误
    pub fn fail_on(&self, pattern: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((pattern.to_string(), message.to_string()));
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn statements_containing(&self, pattern: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.contains(pattern))
            .collect()
    }

    fn record(&self, statement: &str) -> Result<()> {
        self.statements.lock().unwrap().push(statement.to_string());
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(p, _)| statement.contains(p.as_str())) {
            Some((_, message)) => Err(BrError::sql(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SqlClient for ScriptedClient {
    async fn execute(&self, statement: &str) -> Result<()> {
        self.record(statement)
    }

    async fn query(&self, statement: &str) -> Result<Vec<SqlRow>> {
        self.record(statement)?;
        let mut scripts = self.scripts.lock().unwrap();
        let Some(script) = scripts
            .iter_mut()
            .find(|s| statement.contains(s.pattern.as_str()))
        else {
            return Ok(Vec::new());
        };
        if script.responses.len() > 1 {
            return script.responses.pop_front().unwrap();
        }
        match script.responses.front() {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(e)) => Err(BrError::sql(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

/// 不真正睡眠，只计数
#[derive(Default)]
pub struct NoopSleeper {
    calls: AtomicU32,
}

impl NoopSleeper {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MemoryState {
    backups: Vec<BackupRecord>,
    restores: Vec<RestoreRecord>,
    slots: Vec<RunStatus>,
    partitions: Vec<(String, String, String, NaiveDateTime)>,
    tables: Vec<(String, String)>,
    inventory: Vec<(String, String, String)>,
    snapshots: HashMap<String, String>,
}

/// 内存版控制表
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_label_lookup: bool,
    fail_history_writes: bool,
    fail_slot_updates: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_label_lookup(mut self) -> Self {
        self.fail_label_lookup = true;
        self
    }

    pub fn failing_history_writes(mut self) -> Self {
        self.fail_history_writes = true;
        self
    }

    pub fn failing_slot_updates(mut self) -> Self {
        self.fail_slot_updates = true;
        self
    }

    pub fn add_backup(&self, record: BackupRecord) {
        self.state.lock().unwrap().backups.push(record);
    }

    pub fn add_slot(&self, slot: RunStatus) {
        self.state.lock().unwrap().slots.push(slot);
    }

    pub fn add_partition(&self, database: &str, table: &str, partition: &str, at: NaiveDateTime) {
        self.state.lock().unwrap().partitions.push((
            database.to_string(),
            table.to_string(),
            partition.to_string(),
            at,
        ));
    }

    pub fn add_table(&self, database: &str, table: &str) {
        self.state
            .lock()
            .unwrap()
            .tables
            .push((database.to_string(), table.to_string()));
    }

    pub fn add_inventory(&self, group: &str, database: &str, table: &str) {
        self.state.lock().unwrap().inventory.push((
            group.to_string(),
            database.to_string(),
            table.to_string(),
        ));
    }

    pub fn add_snapshot(&self, label: &str, timestamp: &str) {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(label.to_string(), timestamp.to_string());
    }

    pub fn backups(&self) -> Vec<BackupRecord> {
        self.state.lock().unwrap().backups.clone()
    }

    pub fn restores(&self) -> Vec<RestoreRecord> {
        self.state.lock().unwrap().restores.clone()
    }

    pub fn slots(&self) -> Vec<RunStatus> {
        self.state.lock().unwrap().slots.clone()
    }

    fn finished_matching(&self, filter: &HistoryFilter) -> Vec<BackupRecord> {
        let mut records: Vec<BackupRecord> = self
            .state
            .lock()
            .unwrap()
            .backups
            .iter()
            .filter(|r| r.status == JobStatus::Finished && filter.matches(r))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.finished_at);
        records
    }
}

/// 构造一条已完成的备份记录
pub fn finished_backup(
    label: &str,
    backup_type: crate::store::BackupType,
    finished_at: NaiveDateTime,
    tables: &[&str],
    partitions: Option<&[(&str, &[&str])]>,
) -> BackupRecord {
    BackupRecord {
        label: label.to_string(),
        backup_type,
        status: JobStatus::Finished,
        repository: "br_repo".to_string(),
        database_name: "sales".to_string(),
        started_at: finished_at - chrono::Duration::minutes(10),
        finished_at: Some(finished_at),
        error_message: None,
        tables: tables.iter().map(|t| t.to_string()).collect(),
        partitions: partitions.map(|entries| {
            entries
                .iter()
                .map(|(t, ps)| (t.to_string(), ps.iter().map(|p| p.to_string()).collect()))
                .collect()
        }),
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn insert_backup(&self, record: &BackupRecord) -> Result<()> {
        if self.fail_history_writes {
            return Err(BrError::sql("history unavailable"));
        }
        self.state.lock().unwrap().backups.push(record.clone());
        Ok(())
    }

    async fn finish_backup(
        &self,
        label: &str,
        status: JobStatus,
        finished_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> Result<()> {
        if self.fail_history_writes {
            return Err(BrError::sql("history unavailable"));
        }
        let mut state = self.state.lock().unwrap();
        if let Some(record) = state.backups.iter_mut().find(|r| r.label == label) {
            record.status = status;
            record.finished_at = Some(finished_at);
            record.error_message = error_message.map(str::to_string);
        }
        Ok(())
    }

    async fn get_backup(&self, label: &str) -> Result<Option<BackupRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .backups
            .iter()
            .find(|r| r.label == label)
            .cloned())
    }

    async fn latest_finished(&self, filter: &HistoryFilter) -> Result<Option<BackupRecord>> {
        Ok(self.finished_matching(filter).pop())
    }

    async fn finished_backups(&self, filter: &HistoryFilter) -> Result<Vec<BackupRecord>> {
        Ok(self.finished_matching(filter))
    }

    async fn labels_like(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_label_lookup {
            return Err(BrError::sql("lookup failed"));
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .backups
            .iter()
            .filter(|r| r.label.starts_with(prefix))
            .map(|r| r.label.clone())
            .collect())
    }

    async fn list_backups(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        let mut records = self.state.lock().unwrap().backups.clone();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn insert_restore(&self, record: &RestoreRecord) -> Result<()> {
        if self.fail_history_writes {
            return Err(BrError::sql("history unavailable"));
        }
        self.state.lock().unwrap().restores.push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl RunStatusStore for MemoryStore {
    async fn active_slots(&self) -> Result<Vec<RunStatus>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|s| s.state == SlotState::Active)
            .cloned()
            .collect())
    }

    async fn get_slot(&self, scope: JobScope, label: &str) -> Result<Option<RunStatus>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .slots
            .iter()
            .find(|s| s.scope == scope && s.label == label)
            .cloned())
    }

    async fn insert_slot(&self, slot: &RunStatus) -> Result<()> {
        self.state.lock().unwrap().slots.push(slot.clone());
        Ok(())
    }

    async fn update_slot(
        &self,
        scope: JobScope,
        label: &str,
        state: SlotState,
        finished_at: NaiveDateTime,
    ) -> Result<()> {
        if self.fail_slot_updates {
            return Err(BrError::sql("run_status unavailable"));
        }
        let mut guard = self.state.lock().unwrap();
        if let Some(slot) = guard
            .slots
            .iter_mut()
            .find(|s| s.scope == scope && s.label == label)
        {
            slot.state = state;
            slot.finished_at = Some(finished_at);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn changed_partitions(
        &self,
        database: &str,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .partitions
            .iter()
            .filter(|(d, t, _, at)| d == database && t == table && *at > since)
            .map(|(_, _, p, _)| p.clone())
            .collect())
    }

    async fn partitions_updated_since(
        &self,
        database: &str,
        tables: &[String],
        since: NaiveDateTime,
    ) -> Result<Vec<PartitionRef>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .partitions
            .iter()
            .filter(|(d, t, _, at)| d == database && tables.contains(t) && *at >= since)
            .map(|(d, t, p, _)| PartitionRef {
                database: d.clone(),
                table: t.clone(),
                partition_name: p.clone(),
            })
            .collect())
    }

    async fn table_exists(&self, database: &str, table: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .iter()
            .any(|(d, t)| d == database && t == table))
    }

    async fn inventory_tables(&self, group: &str, database: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .inventory
            .iter()
            .filter(|(g, d, _)| g == group && d == database)
            .map(|(_, _, t)| t.clone())
            .collect())
    }

    async fn snapshot_timestamp(&self, _repository: &str, label: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().snapshots.get(label).cloned())
    }
}
