use crate::constants::control;
use crate::sql::{
    SqlClient, SqlRow, format_datetime, like_prefix, quote_identifier, quote_literal,
    validate_all, validate_identifier,
};
use crate::{BrError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::models::{
    BackupRecord, BackupType, HistoryFilter, JobScope, JobStatus, PartitionRef, RestoreRecord,
    RunStatus, SlotState,
};
use super::{CatalogStore, HistoryStore, RunStatusStore};

const BACKUP_COLUMNS: &str = "label, backup_type, status, repository, database_name, \
     started_at, finished_at, error_message, tables_json, partitions_json";

/// 基于 SQL 的控制表实现，标识符在拼接前校验，字面量统一转义
#[derive(Clone)]
pub struct SqlControlStore {
    client: Arc<dyn SqlClient>,
}

impl SqlControlStore {
    pub fn new(client: Arc<dyn SqlClient>) -> Self {
        Self { client }
    }

    fn datetime_literal(value: &NaiveDateTime) -> String {
        quote_literal(&format_datetime(value))
    }

    fn optional_literal(value: Option<&str>) -> String {
        value.map(quote_literal).unwrap_or_else(|| "NULL".to_string())
    }

    fn backup_filter_clause(filter: &HistoryFilter) -> Result<String> {
        let mut clause = format!("status = '{}'", JobStatus::Finished.as_str());
        if let Some(database) = &filter.database {
            clause.push_str(&format!(
                " AND database_name = {}",
                quote_literal(validate_identifier(database)?)
            ));
        }
        if let Some(backup_type) = filter.backup_type {
            clause.push_str(&format!(" AND backup_type = '{}'", backup_type.as_str()));
        }
        if let Some(limit) = &filter.finished_before {
            clause.push_str(&format!(
                " AND finished_at <= {}",
                Self::datetime_literal(limit)
            ));
        }
        Ok(clause)
    }

    fn parse_backup_row(row: &SqlRow) -> Result<BackupRecord> {
        let text = |index: usize| row.get(index).unwrap_or_default().to_string();

        let backup_type = BackupType::parse(&text(1)).ok_or_else(|| {
            BrError::sql(format!("备份记录 {} 的类型无法识别: {}", text(0), text(1)))
        })?;
        let started_at = row
            .get_datetime(5)?
            .ok_or_else(|| BrError::sql(format!("备份记录 {} 缺少 started_at", text(0))))?;

        let tables = match row.get(8) {
            Some(json) if !json.trim().is_empty() => serde_json::from_str(json)?,
            _ => Vec::new(),
        };
        let partitions: Option<BTreeMap<String, Vec<String>>> = match row.get(9) {
            Some(json) if !json.trim().is_empty() => Some(serde_json::from_str(json)?),
            _ => None,
        };

        Ok(BackupRecord {
            label: text(0),
            backup_type,
            status: JobStatus::parse(&text(2)),
            repository: text(3),
            database_name: text(4),
            started_at,
            finished_at: row.get_datetime(6)?,
            error_message: row.get(7).map(str::to_string),
            tables,
            partitions,
        })
    }

    fn parse_slot_row(row: &SqlRow) -> Result<RunStatus> {
        let scope_text = row.get(0).unwrap_or_default();
        let state_text = row.get(2).unwrap_or_default();
        let scope = JobScope::parse(scope_text)
            .ok_or_else(|| BrError::sql(format!("无法识别的任务作用域: {scope_text}")))?;
        let state = SlotState::parse(state_text)
            .ok_or_else(|| BrError::sql(format!("无法识别的槽位状态: {state_text}")))?;
        let label = row.get(1).unwrap_or_default().to_string();
        let started_at = row
            .get_datetime(3)?
            .ok_or_else(|| BrError::sql(format!("槽位 {scope}:{label} 缺少 started_at")))?;

        Ok(RunStatus {
            scope,
            label,
            state,
            started_at,
            finished_at: row.get_datetime(4)?,
        })
    }
}

#[async_trait]
impl HistoryStore for SqlControlStore {
    async fn insert_backup(&self, record: &BackupRecord) -> Result<()> {
        validate_identifier(&record.label)?;
        validate_identifier(&record.repository)?;
        validate_identifier(&record.database_name)?;

        let tables_json = serde_json::to_string(&record.tables)?;
        let partitions_json = match &record.partitions {
            Some(partitions) => Some(serde_json::to_string(partitions)?),
            None => None,
        };

        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({}, '{}', '{}', {}, {}, {}, {}, {}, {}, {})",
            control::BACKUP_HISTORY,
            BACKUP_COLUMNS,
            quote_literal(&record.label),
            record.backup_type.as_str(),
            record.status.as_str(),
            quote_literal(&record.repository),
            quote_literal(&record.database_name),
            Self::datetime_literal(&record.started_at),
            record
                .finished_at
                .as_ref()
                .map(Self::datetime_literal)
                .unwrap_or_else(|| "NULL".to_string()),
            Self::optional_literal(record.error_message.as_deref()),
            quote_literal(&tables_json),
            Self::optional_literal(partitions_json.as_deref()),
        );
        self.client.execute(&statement).await
    }

    async fn finish_backup(
        &self,
        label: &str,
        status: JobStatus,
        finished_at: NaiveDateTime,
        error_message: Option<&str>,
    ) -> Result<()> {
        let statement = format!(
            "UPDATE {} SET status = '{}', finished_at = {}, error_message = {} WHERE label = {}",
            control::BACKUP_HISTORY,
            status.as_str(),
            Self::datetime_literal(&finished_at),
            Self::optional_literal(error_message),
            quote_literal(validate_identifier(label)?),
        );
        self.client.execute(&statement).await
    }

    async fn get_backup(&self, label: &str) -> Result<Option<BackupRecord>> {
        let statement = format!(
            "SELECT {} FROM {} WHERE label = {}",
            BACKUP_COLUMNS,
            control::BACKUP_HISTORY,
            quote_literal(validate_identifier(label)?),
        );
        let rows = self.client.query(&statement).await?;
        rows.first().map(Self::parse_backup_row).transpose()
    }

    async fn latest_finished(&self, filter: &HistoryFilter) -> Result<Option<BackupRecord>> {
        let statement = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY finished_at DESC LIMIT 1",
            BACKUP_COLUMNS,
            control::BACKUP_HISTORY,
            Self::backup_filter_clause(filter)?,
        );
        let rows = self.client.query(&statement).await?;
        rows.first().map(Self::parse_backup_row).transpose()
    }

    async fn finished_backups(&self, filter: &HistoryFilter) -> Result<Vec<BackupRecord>> {
        let statement = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY finished_at ASC",
            BACKUP_COLUMNS,
            control::BACKUP_HISTORY,
            Self::backup_filter_clause(filter)?,
        );
        let rows = self.client.query(&statement).await?;
        rows.iter().map(Self::parse_backup_row).collect()
    }

    async fn labels_like(&self, prefix: &str) -> Result<Vec<String>> {
        let statement = format!(
            "SELECT label FROM {} WHERE label LIKE {}",
            control::BACKUP_HISTORY,
            like_prefix(prefix),
        );
        let rows = self.client.query(&statement).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).map(str::to_string))
            .collect())
    }

    async fn list_backups(&self, limit: usize) -> Result<Vec<BackupRecord>> {
        let statement = format!(
            "SELECT {} FROM {} ORDER BY started_at DESC LIMIT {}",
            BACKUP_COLUMNS,
            control::BACKUP_HISTORY,
            limit,
        );
        let rows = self.client.query(&statement).await?;
        rows.iter().map(Self::parse_backup_row).collect()
    }

    async fn insert_restore(&self, record: &RestoreRecord) -> Result<()> {
        let statement = format!(
            "INSERT INTO {} (job_id, backup_label, restore_type, status, repository, \
             started_at, finished_at, error_message) VALUES ({}, {}, {}, '{}', {}, {}, {}, {})",
            control::RESTORE_HISTORY,
            quote_literal(validate_identifier(&record.job_id)?),
            quote_literal(validate_identifier(&record.backup_label)?),
            quote_literal(&record.restore_type),
            record.status.as_str(),
            quote_literal(validate_identifier(&record.repository)?),
            Self::datetime_literal(&record.started_at),
            record
                .finished_at
                .as_ref()
                .map(Self::datetime_literal)
                .unwrap_or_else(|| "NULL".to_string()),
            Self::optional_literal(record.error_message.as_deref()),
        );
        self.client.execute(&statement).await
    }
}

#[async_trait]
impl RunStatusStore for SqlControlStore {
    async fn active_slots(&self) -> Result<Vec<RunStatus>> {
        let statement = format!(
            "SELECT scope, label, state, started_at, finished_at FROM {} WHERE state = '{}'",
            control::RUN_STATUS,
            SlotState::Active.as_str(),
        );
        let rows = self.client.query(&statement).await?;
        rows.iter().map(Self::parse_slot_row).collect()
    }

    async fn get_slot(&self, scope: JobScope, label: &str) -> Result<Option<RunStatus>> {
        let statement = format!(
            "SELECT scope, label, state, started_at, finished_at FROM {} \
             WHERE scope = '{}' AND label = {}",
            control::RUN_STATUS,
            scope.as_str(),
            quote_literal(validate_identifier(label)?),
        );
        let rows = self.client.query(&statement).await?;
        rows.first().map(Self::parse_slot_row).transpose()
    }

    async fn insert_slot(&self, slot: &RunStatus) -> Result<()> {
        let statement = format!(
            "INSERT INTO {} (scope, label, state, started_at) VALUES ('{}', {}, '{}', {})",
            control::RUN_STATUS,
            slot.scope.as_str(),
            quote_literal(validate_identifier(&slot.label)?),
            slot.state.as_str(),
            Self::datetime_literal(&slot.started_at),
        );
        self.client.execute(&statement).await
    }

    async fn update_slot(
        &self,
        scope: JobScope,
        label: &str,
        state: SlotState,
        finished_at: NaiveDateTime,
    ) -> Result<()> {
        let statement = format!(
            "UPDATE {} SET state = '{}', finished_at = {} WHERE scope = '{}' AND label = {}",
            control::RUN_STATUS,
            state.as_str(),
            Self::datetime_literal(&finished_at),
            scope.as_str(),
            quote_literal(validate_identifier(label)?),
        );
        self.client.execute(&statement).await
    }
}

#[async_trait]
impl CatalogStore for SqlControlStore {
    async fn changed_partitions(
        &self,
        database: &str,
        table: &str,
        since: NaiveDateTime,
    ) -> Result<Vec<String>> {
        let statement = format!(
            "SELECT PARTITION_NAME FROM information_schema.partitions \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} AND UPDATE_TIME > {} \
             ORDER BY PARTITION_NAME",
            quote_literal(validate_identifier(database)?),
            quote_literal(validate_identifier(table)?),
            Self::datetime_literal(&since),
        );
        let rows = self.client.query(&statement).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).map(str::to_string))
            .collect())
    }

    async fn partitions_updated_since(
        &self,
        database: &str,
        tables: &[String],
        since: NaiveDateTime,
    ) -> Result<Vec<PartitionRef>> {
        if tables.is_empty() {
            return Ok(Vec::new());
        }
        validate_all(tables)?;

        let table_list = tables
            .iter()
            .map(|t| quote_literal(t))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "SELECT TABLE_SCHEMA, TABLE_NAME, PARTITION_NAME FROM information_schema.partitions \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME IN ({}) AND PARTITION_NAME IS NOT NULL \
             AND UPDATE_TIME >= {} ORDER BY TABLE_NAME, PARTITION_NAME",
            quote_literal(validate_identifier(database)?),
            table_list,
            Self::datetime_literal(&since),
        );
        let rows = self.client.query(&statement).await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(PartitionRef {
                    database: row.get(0)?.to_string(),
                    table: row.get(1)?.to_string(),
                    partition_name: row.get(2)?.to_string(),
                })
            })
            .collect())
    }

    async fn table_exists(&self, database: &str, table: &str) -> Result<bool> {
        let statement = format!(
            "SELECT TABLE_NAME FROM information_schema.tables \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
            quote_literal(validate_identifier(database)?),
            quote_literal(validate_identifier(table)?),
        );
        Ok(!self.client.query(&statement).await?.is_empty())
    }

    async fn inventory_tables(&self, group: &str, database: &str) -> Result<Vec<String>> {
        let statement = format!(
            "SELECT table_name FROM {} WHERE inventory_group = {} AND database_name = {} \
             ORDER BY created_at, table_name",
            control::TABLE_INVENTORY,
            quote_literal(validate_identifier(group)?),
            quote_literal(validate_identifier(database)?),
        );
        let rows = self.client.query(&statement).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).map(str::to_string))
            .collect())
    }

    async fn snapshot_timestamp(&self, repository: &str, label: &str) -> Result<Option<String>> {
        let statement = format!(
            "SHOW SNAPSHOT ON {} WHERE SNAPSHOT = {}",
            quote_identifier(repository)?,
            quote_literal(validate_identifier(label)?),
        );
        let rows = self.client.query(&statement).await?;
        Ok(rows
            .first()
            .and_then(|row| row.get_named_or("Timestamp", 1))
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedClient;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_backup_serializes_tables_and_partitions() {
        let client = Arc::new(ScriptedClient::new());
        let store = SqlControlStore::new(client.clone());

        let mut partitions = BTreeMap::new();
        partitions.insert("orders".to_string(), vec!["p1".to_string()]);
        let record = BackupRecord {
            label: "sales_20251015_inc".into(),
            backup_type: BackupType::Incremental,
            status: JobStatus::Running,
            repository: "br_repo".into(),
            database_name: "sales".into(),
            started_at: at(1),
            finished_at: None,
            error_message: None,
            tables: vec!["orders".into()],
            partitions: Some(partitions),
        };
        store.insert_backup(&record).await.unwrap();

        let statements = client.statements();
        assert_eq!(statements.len(), 1);
        let sql = &statements[0];
        assert!(sql.starts_with("INSERT INTO ops.backup_history"));
        assert!(sql.contains("'sales_20251015_inc', 'incremental', 'RUNNING'"));
        assert!(sql.contains("'2025-10-15 01:00:00', NULL, NULL"));
        assert!(sql.contains(r#"'["orders"]'"#));
        assert!(sql.contains(r#"'{"orders":["p1"]}'"#));
    }

    #[tokio::test]
    async fn test_latest_finished_parses_row() {
        let client = Arc::new(ScriptedClient::new());
        client.respond(
            "ORDER BY finished_at DESC LIMIT 1",
            vec![SqlRow::from_values([
                Some("sales_20251014_full"),
                Some("full"),
                Some("FINISHED"),
                Some("br_repo"),
                Some("sales"),
                Some("2025-10-14 01:00:00"),
                Some("2025-10-14 02:00:00"),
                None,
                Some(r#"["orders","customers"]"#),
                None,
            ])],
        );
        let store = SqlControlStore::new(client.clone());

        let record = store
            .latest_finished(&HistoryFilter::database("sales").with_type(BackupType::Full))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.label, "sales_20251014_full");
        assert_eq!(record.tables, vec!["orders", "customers"]);
        assert!(record.partitions.is_none());

        let sql = &client.statements()[0];
        assert!(sql.contains("status = 'FINISHED'"));
        assert!(sql.contains("database_name = 'sales'"));
        assert!(sql.contains("backup_type = 'full'"));
    }

    #[tokio::test]
    async fn test_labels_like_escapes_wildcards() {
        let client = Arc::new(ScriptedClient::new());
        let store = SqlControlStore::new(client.clone());
        store.labels_like("daily_v").await.unwrap();
        assert!(client.statements()[0].ends_with(r"LIKE 'daily\_v%'"));
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_sql() {
        let client = Arc::new(ScriptedClient::new());
        let store = SqlControlStore::new(client.clone());
        let err = store
            .table_exists("sales", "orders; DROP TABLE x")
            .await
            .unwrap_err();
        assert!(matches!(err, BrError::InvalidIdentifier(_)));
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_timestamp_by_column_name() {
        let client = Arc::new(ScriptedClient::new());
        client.respond(
            "SHOW SNAPSHOT ON br_repo",
            vec![SqlRow::named(&[
                ("Snapshot", Some("sales_20251015_full")),
                ("Timestamp", Some("2025-10-15-01-00-00-123")),
                ("Status", Some("OK")),
            ])],
        );
        let store = SqlControlStore::new(client.clone());
        let ts = store
            .snapshot_timestamp("br_repo", "sales_20251015_full")
            .await
            .unwrap();
        assert_eq!(ts.as_deref(), Some("2025-10-15-01-00-00-123"));
    }
}
