use crate::app::CliApp;
use br_core::error::Result;
use br_core::repository::{RepositoryStatus, ensure_repository};
use br_core::schema::initialize_ops_schema;
use tracing::{info, warn};

/// 创建 ops 控制表，配置了仓库时一并确保仓库存在
pub async fn run_init(app: &CliApp) -> Result<()> {
    info!("🛠️ 初始化 ops 控制表...");
    initialize_ops_schema(&app.session).await?;
    info!("✅ ops 控制表已就绪");

    let repository = &app.config.backup.repository;
    match &app.config.repository {
        Some(settings) => match ensure_repository(&app.session, repository, settings).await? {
            RepositoryStatus::Existing { location } => {
                info!("📦 仓库 {} 已存在: {}", repository, location);
            }
            RepositoryStatus::Created { location } => {
                info!("📦 已创建仓库 {}: {}", repository, location);
            }
        },
        None => {
            warn!("⚠️ 配置中没有 repository 段，跳过仓库创建");
            info!("   请确认仓库 {} 已在集群中存在", repository);
        }
    }
    Ok(())
}
