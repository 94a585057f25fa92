use crate::app::CliApp;
use br_core::error::Result;
use br_core::health::check_cluster_health;
use tracing::info;

pub async fn run_health(app: &CliApp) -> Result<()> {
    info!("🩺 检查集群状态...");
    let report = check_cluster_health(&app.session).await?;

    for node in &report.frontends {
        info!("   FE {} {}", node.name, if node.alive { "✅" } else { "❌" });
    }
    for node in &report.backends {
        info!("   BE {} {}", node.name, if node.alive { "✅" } else { "❌" });
    }

    let report = report.into_result()?;
    info!("✅ {}", report);
    Ok(())
}
