use crate::sql::{SqlClient, SqlRow};
use crate::{BrError, Result};
use std::fmt;
use tracing::{info, warn};

/// 单个节点的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub name: String,
    pub alive: bool,
}

/// FE/BE 健康报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub frontends: Vec<NodeStatus>,
    pub backends: Vec<NodeStatus>,
}

impl HealthReport {
    pub fn dead_nodes(&self) -> Vec<&NodeStatus> {
        self.frontends
            .iter()
            .chain(self.backends.iter())
            .filter(|n| !n.alive)
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        !self.frontends.is_empty() && !self.backends.is_empty() && self.dead_nodes().is_empty()
    }

    /// 不健康时转换为 HealthCheck 错误
    pub fn into_result(self) -> Result<Self> {
        if self.is_healthy() {
            Ok(self)
        } else {
            Err(BrError::health_check(self.to_string()))
        }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alive = |nodes: &[NodeStatus]| nodes.iter().filter(|n| n.alive).count();
        write!(
            f,
            "FE {}/{} 存活，BE {}/{} 存活",
            alive(&self.frontends),
            self.frontends.len(),
            alive(&self.backends),
            self.backends.len()
        )?;
        let dead = self.dead_nodes();
        if !dead.is_empty() {
            let names: Vec<&str> = dead.iter().map(|n| n.name.as_str()).collect();
            write!(f, "，异常节点: {}", names.join(", "))?;
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "TRUE" | "ALIVE" | "YES" | "1"
    )
}

fn parse_nodes(rows: &[SqlRow], name_columns: &[&str]) -> Result<Vec<NodeStatus>> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let alive = row
                .get_named("Alive")
                .ok_or_else(|| BrError::health_check("节点列表缺少 Alive 列"))?;
            let name = name_columns
                .iter()
                .find_map(|c| row.get_named(c))
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{index}"));
            Ok(NodeStatus {
                name,
                alive: is_truthy(alive),
            })
        })
        .collect()
}

/// 通过 SHOW FRONTENDS / SHOW BACKENDS 检查集群状态
pub async fn check_cluster_health(client: &dyn SqlClient) -> Result<HealthReport> {
    let frontends = client.query("SHOW FRONTENDS").await?;
    let backends = client.query("SHOW BACKENDS").await?;

    let report = HealthReport {
        frontends: parse_nodes(&frontends, &["Name", "IP"])?,
        backends: parse_nodes(&backends, &["BackendId", "IP"])?,
    };

    if report.is_healthy() {
        info!("集群健康: {}", report);
    } else {
        warn!("集群不健康: {}", report);
    }
    Ok(report)
}
