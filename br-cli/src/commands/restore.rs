use crate::app::CliApp;
use br_core::error::{BrError, Result};
use br_core::sql::parse_datetime;
use br_core::workflow::RestoreSelection;
use tracing::{info, warn};

/// 校验恢复参数并转换为恢复目标
pub fn restore_target(
    target_label: Option<String>,
    tables: Vec<String>,
    partitions: Vec<String>,
    timestamp: Option<String>,
) -> Result<RestoreSelection> {
    match (target_label, timestamp) {
        (Some(label), None) => Ok(RestoreSelection::Label {
            label,
            tables,
            partitions,
        }),
        (None, Some(timestamp)) => {
            if !partitions.is_empty() {
                return Err(BrError::configuration("--partition 只能配合 --target-label 使用"));
            }
            let [table] = <[String; 1]>::try_from(tables).map_err(|_| {
                BrError::configuration("按时间点恢复需要且只能指定一个 --table")
            })?;
            let at = parse_datetime(&timestamp)
                .map_err(|e| BrError::configuration(format!("--timestamp 无效: {e}")))?;
            Ok(RestoreSelection::PointInTime { table, at })
        }
        (Some(_), Some(_)) => Err(BrError::configuration(
            "--target-label 与 --timestamp 不能同时使用",
        )),
        (None, None) => Err(BrError::configuration(
            "需要指定 --target-label 或 --timestamp",
        )),
    }
}

/// 执行恢复
pub async fn run_restore(
    app: &CliApp,
    target_label: Option<String>,
    tables: Vec<String>,
    partitions: Vec<String>,
    timestamp: Option<String>,
) -> Result<()> {
    let selection = restore_target(target_label, tables, partitions, timestamp)?;
    match &selection {
        RestoreSelection::Label { label, .. } => info!("♻️ 从快照 {} 恢复...", label),
        RestoreSelection::PointInTime { table, at } => {
            info!("♻️ 将表 {} 恢复到 {}...", table, at);
            warn!("⚠️ 时间点恢复直接覆盖原表");
        }
    }

    let outcome = app.restore_manager.run(selection).await?;

    info!("{}", "=".repeat(60));
    info!("✅ 恢复完成: {}", outcome.job_id);
    info!("   快照链: {}", outcome.chain.join(" -> "));
    if let Some(report) = &outcome.cutover {
        info!("   {}", report);
    }
    Ok(())
}
