use crate::config::RepositoryConfig;
use crate::sql::{SqlClient, quote_identifier, quote_literal};
use crate::{BrError, Result};
use tracing::info;

/// ensure_repository 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryStatus {
    /// 已存在且位置一致
    Existing { location: String },
    Created { location: String },
}

/// 确保仓库存在：不存在时创建，存在时校验位置
pub async fn ensure_repository(
    client: &dyn SqlClient,
    name: &str,
    settings: &RepositoryConfig,
) -> Result<RepositoryStatus> {
    let quoted = quote_identifier(name)?;
    settings.validate()?;
    let expected = settings.location();

    let rows = client.query("SHOW REPOSITORIES").await?;
    let existing = rows
        .iter()
        .find(|row| row.get_named_or("RepoName", 1) == Some(name));

    if let Some(row) = existing {
        let location = row.get_named_or("Location", 4).unwrap_or_default();
        if location.trim_end_matches('/') != expected {
            return Err(BrError::configuration(format!(
                "仓库 {name} 已存在但位置不一致: 现有 {location}，配置为 {expected}"
            )));
        }
        info!("仓库 {} 已存在: {}", name, location);
        return Ok(RepositoryStatus::Existing {
            location: location.to_string(),
        });
    }

    let statement = format!(
        "CREATE REPOSITORY {} WITH BROKER ON LOCATION {} PROPERTIES (\
         \"aws.s3.access_key\" = {}, \"aws.s3.secret_key\" = {}, \"aws.s3.endpoint\" = {})",
        quoted,
        quote_literal(&expected),
        quote_literal(&settings.access_key),
        quote_literal(&settings.secret_key),
        quote_literal(&settings.endpoint),
    );
    client.execute(&statement).await?;
    info!("已创建仓库 {}: {}", name, expected);
    Ok(RepositoryStatus::Created { location: expected })
}
