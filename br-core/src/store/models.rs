use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 备份类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupType {
    Full,
    Incremental,
}

impl BackupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupType::Full => "full",
            BackupType::Incremental => "incremental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(BackupType::Full),
            "incremental" => Some(BackupType::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 备份/恢复任务状态，与 ops.backup_history.status 对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
    Cancelled,
    Timeout,
    Error,
    Lost,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Timeout => "TIMEOUT",
            JobStatus::Error => "ERROR",
            JobStatus::Lost => "LOST",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    /// 无法识别的值归为 UNKNOWN
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => JobStatus::Running,
            "FINISHED" => JobStatus::Finished,
            "FAILED" => JobStatus::Failed,
            "CANCELLED" => JobStatus::Cancelled,
            "TIMEOUT" => JobStatus::Timeout,
            "ERROR" => JobStatus::Error,
            "LOST" => JobStatus::Lost,
            _ => JobStatus::Unknown,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 并发作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobScope {
    Backup,
    Restore,
}

impl JobScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobScope::Backup => "backup",
            JobScope::Restore => "restore",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backup" => Some(JobScope::Backup),
            "restore" => Some(JobScope::Restore),
            _ => None,
        }
    }
}

impl fmt::Display for JobScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务槽位状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotState {
    Active,
    Finished,
    Failed,
    Cancelled,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Active => "ACTIVE",
            SlotState::Finished => "FINISHED",
            SlotState::Failed => "FAILED",
            SlotState::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(SlotState::Active),
            "FINISHED" => Some(SlotState::Finished),
            "FAILED" => Some(SlotState::Failed),
            "CANCELLED" => Some(SlotState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlotState::Active)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<JobStatus> for SlotState {
    /// 任务终态映射到槽位终态：只有 FINISHED 和 CANCELLED 原样保留，其余均视为失败
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Finished => SlotState::Finished,
            JobStatus::Cancelled => SlotState::Cancelled,
            _ => SlotState::Failed,
        }
    }
}

/// ops.backup_history 的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub label: String,
    pub backup_type: BackupType,
    pub status: JobStatus,
    pub repository: String,
    pub database_name: String,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
    /// 快照包含的表（按提交顺序）
    pub tables: Vec<String>,
    /// 增量备份中每张表的分区
    pub partitions: Option<BTreeMap<String, Vec<String>>>,
}

impl BackupRecord {
    /// 快照是否包含指定表。旧记录没有表清单时按包含处理
    pub fn contains_table(&self, table: &str) -> bool {
        if let Some(partitions) = &self.partitions {
            return partitions.contains_key(table);
        }
        self.tables.is_empty() || self.tables.iter().any(|t| t == table)
    }

    pub fn partitions_of(&self, table: &str) -> Option<&[String]> {
        self.partitions
            .as_ref()
            .and_then(|p| p.get(table))
            .map(Vec::as_slice)
    }
}

/// ops.run_status 的一行
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatus {
    pub scope: JobScope,
    pub label: String,
    pub state: SlotState,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
}

/// ops.restore_history 的一行
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreRecord {
    pub job_id: String,
    pub backup_label: String,
    pub restore_type: String,
    pub status: JobStatus,
    pub repository: String,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

/// 分区引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRef {
    pub database: String,
    pub table: String,
    pub partition_name: String,
}

/// 历史查询条件
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub database: Option<String>,
    pub backup_type: Option<BackupType>,
    /// finished_at <= 该时间
    pub finished_before: Option<NaiveDateTime>,
}

impl HistoryFilter {
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, backup_type: BackupType) -> Self {
        self.backup_type = Some(backup_type);
        self
    }

    pub fn finished_before(mut self, at: NaiveDateTime) -> Self {
        self.finished_before = Some(at);
        self
    }

    /// 内存中判断记录是否满足条件（不检查状态）
    pub fn matches(&self, record: &BackupRecord) -> bool {
        if let Some(database) = &self.database {
            if &record.database_name != database {
                return false;
            }
        }
        if let Some(backup_type) = self.backup_type {
            if record.backup_type != backup_type {
                return false;
            }
        }
        if let Some(limit) = self.finished_before {
            match record.finished_at {
                Some(finished_at) if finished_at <= limit => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!(JobStatus::parse("finished"), JobStatus::Finished);
        assert_eq!(JobStatus::parse("PENDING"), JobStatus::Unknown);
        assert_eq!(SlotState::parse("ACTIVE"), Some(SlotState::Active));
        assert_eq!(JobScope::parse("restore"), Some(JobScope::Restore));
        assert_eq!(BackupType::parse("weekly"), None);
    }

    #[test]
    fn test_slot_state_from_job_status() {
        assert_eq!(SlotState::from(JobStatus::Finished), SlotState::Finished);
        assert_eq!(SlotState::from(JobStatus::Cancelled), SlotState::Cancelled);
        assert_eq!(SlotState::from(JobStatus::Lost), SlotState::Failed);
        assert_eq!(SlotState::from(JobStatus::Timeout), SlotState::Failed);
    }
}
