use crate::app::CliApp;
use crate::cli::{BackupCommand, FullBackupArgs};
use br_core::error::{BrError, Result};
use br_core::labels::BackupKind;
use br_core::planner::{Baseline, BackupPlan};
use br_core::workflow::PlanSource;
use tracing::info;

/// 把命令行参数转换为计划来源与自定义标签
pub fn plan_source(command: BackupCommand) -> Result<(PlanSource, Option<String>)> {
    let full = |args: FullBackupArgs, kind: BackupKind| {
        (
            PlanSource::Full {
                group: args.group,
                kind,
            },
            args.name,
        )
    };

    match command {
        BackupCommand::Auto { name } => Ok((PlanSource::Auto, name)),
        BackupCommand::Incremental {
            group,
            baseline_backup,
            days,
            name,
        } => {
            let source = match (group, days) {
                (group, Some(days)) => {
                    if baseline_backup.is_some() {
                        return Err(BrError::configuration(
                            "--days 与 --baseline-backup 不能同时使用",
                        ));
                    }
                    PlanSource::Recent { group, days }
                }
                (Some(group), None) => PlanSource::Group {
                    group,
                    baseline: baseline_backup.map_or(Baseline::LatestFull, Baseline::Explicit),
                },
                (None, None) => {
                    return Err(BrError::configuration(
                        "增量备份需要指定 --group 或 --days",
                    ));
                }
            };
            Ok((source, name))
        }
        BackupCommand::Full(args) => Ok(full(args, BackupKind::Full)),
        BackupCommand::Weekly(args) => Ok(full(args, BackupKind::Weekly)),
        BackupCommand::Monthly(args) => Ok(full(args, BackupKind::Monthly)),
    }
}

/// 执行备份
pub async fn run_backup(app: &CliApp, command: BackupCommand) -> Result<()> {
    let (source, name) = plan_source(command)?;
    info!("💾 开始备份 {}...", app.config.connection.database);

    let outcome = app.backup_manager.run(source, name).await?;

    info!("{}", "=".repeat(60));
    info!("✅ 备份完成: {}", outcome.label);
    info!("   类型: {}", outcome.plan.backup_type());
    match &outcome.plan {
        BackupPlan::Full { tables } => {
            info!("   表: {}", tables.join(", "));
        }
        BackupPlan::Incremental { changes } if changes.is_empty() => {
            info!("   没有分区变更，已记录空增量");
        }
        BackupPlan::Incremental { changes } => {
            for change in changes {
                info!(
                    "   {}: {}",
                    change.table(),
                    change.partitions().join(", ")
                );
            }
        }
    }
    Ok(())
}
