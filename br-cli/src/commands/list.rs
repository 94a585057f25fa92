use crate::app::CliApp;
use br_core::error::Result;
use br_core::sql::format_datetime;
use br_core::store::HistoryStore;
use tracing::info;

/// 列出最近的备份记录
pub async fn run_list(app: &CliApp, limit: usize) -> Result<()> {
    let records = app.store.list_backups(limit).await?;

    if records.is_empty() {
        info!("📋 暂无备份记录");
        return Ok(());
    }

    info!("📋 最近 {} 条备份记录:", records.len());
    info!("{}", "=".repeat(80));
    for record in &records {
        let finished = record
            .finished_at
            .as_ref()
            .map(format_datetime)
            .unwrap_or_else(|| "-".to_string());
        info!(
            "{:<40} {:<12} {:<10} {} -> {}",
            record.label,
            record.backup_type.as_str(),
            record.status.as_str(),
            format_datetime(&record.started_at),
            finished
        );
        if let Some(message) = &record.error_message {
            info!("   ❌ {}", message);
        }
    }
    Ok(())
}
