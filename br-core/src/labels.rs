use crate::constants::labels::{DATE_FORMAT, RETRY_SUFFIX, VERSION_MARKER, VERSION_PLACEHOLDER};
use crate::sql::validate_identifier;
use crate::store::{BackupType, HistoryStore};
use crate::{BrError, Result};
use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

/// 命令行层面的备份种类，决定标签中的类型段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupKind {
    Incremental,
    Full,
    Weekly,
    Monthly,
}

impl BackupKind {
    /// 标签中的类型段
    pub fn label_part(&self) -> &'static str {
        match self {
            BackupKind::Incremental => "inc",
            BackupKind::Full => "full",
            BackupKind::Weekly => "weekly",
            BackupKind::Monthly => "monthly",
        }
    }

    /// weekly / monthly 都是全量备份
    pub fn backup_type(&self) -> BackupType {
        match self {
            BackupKind::Incremental => BackupType::Incremental,
            _ => BackupType::Full,
        }
    }
}

impl From<BackupType> for BackupKind {
    fn from(backup_type: BackupType) -> Self {
        match backup_type {
            BackupType::Full => BackupKind::Full,
            BackupType::Incremental => BackupKind::Incremental,
        }
    }
}

/// 生成 `{database}_{YYYYMMDD}_{kind}`，与已有标签冲突时追加 `_r1`、`_r2`...
pub fn generate(database: &str, date: NaiveDate, kind: BackupKind, existing: &[String]) -> String {
    let base = format!(
        "{}_{}_{}",
        database,
        date.format(DATE_FORMAT),
        kind.label_part()
    );

    let mut label = base.clone();
    let mut retry = 0u32;
    while existing.iter().any(|l| l == &label) {
        retry += 1;
        label = format!("{base}{RETRY_SUFFIX}{retry}");
    }
    label
}

/// 解析用户提供的名称
///
/// - 空或未提供: None
/// - 不含 `-v#r`: 原样返回
/// - 含 `-v#r`: 替换为 `-v` 得到前缀，取历史中同前缀标签的最大版本号加一
///
/// 历史查询失败只记录警告，按没有已有标签处理。
pub async fn resolve(history: &dyn HistoryStore, provided: Option<&str>) -> Result<Option<String>> {
    let Some(provided) = provided.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    if !provided.contains(VERSION_PLACEHOLDER) {
        validate_identifier(provided)?;
        return Ok(Some(provided.to_string()));
    }

    let prefix = provided.replace(VERSION_PLACEHOLDER, VERSION_MARKER);
    validate_identifier(&prefix)?;

    let existing = match history.labels_like(&prefix).await {
        Ok(labels) => labels,
        Err(e) => {
            warn!("查询已有标签失败，按无历史处理: {}", e);
            Vec::new()
        }
    };

    let pattern = Regex::new(&format!(r"^{}(\d+)$", regex::escape(&prefix)))
        .map_err(|e| BrError::custom(format!("标签版本正则构造失败: {e}")))?;

    let max_version = existing
        .iter()
        .filter_map(|label| pattern.captures(label))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .max()
        .unwrap_or(0);

    let label = format!("{}{}", prefix, max_version + 1);
    debug!("解析版本化标签: {} -> {}", provided, label);
    Ok(Some(label))
}
