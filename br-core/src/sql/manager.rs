use crate::config::ConnectionConfig;
use crate::{BrError, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::SqlClient;
use super::actor::SqlActor;
use super::messages::SqlMessage;
use super::row::SqlRow;

/// StarRocks 会话句柄，可克隆，所有克隆共享同一个连接 Actor
#[derive(Debug, Clone)]
pub struct StarRocksSession {
    sender: mpsc::Sender<SqlMessage>,
}

impl StarRocksSession {
    /// 建立连接并启动 Actor
    pub async fn connect(settings: &ConnectionConfig) -> Result<Self> {
        let (sender, receiver) = mpsc::channel(32);

        let actor = SqlActor::connect(settings).await?;
        tokio::spawn(actor.run(receiver));

        Ok(Self { sender })
    }

    /// 断开连接
    pub async fn close(&self) -> Result<()> {
        let (respond_to, receiver) = oneshot::channel();

        self.sender
            .send(SqlMessage::Disconnect { respond_to })
            .await
            .map_err(|_| BrError::sql("连接 Actor 已关闭"))?;

        receiver
            .await
            .map_err(|_| BrError::sql("等待连接响应失败"))?
    }
}

#[async_trait]
impl SqlClient for StarRocksSession {
    async fn execute(&self, statement: &str) -> Result<()> {
        let (respond_to, receiver) = oneshot::channel();

        self.sender
            .send(SqlMessage::Execute {
                statement: statement.to_string(),
                respond_to,
            })
            .await
            .map_err(|_| BrError::sql("连接 Actor 已关闭"))?;

        receiver
            .await
            .map_err(|_| BrError::sql("等待连接响应失败"))?
    }

    async fn query(&self, statement: &str) -> Result<Vec<SqlRow>> {
        let (respond_to, receiver) = oneshot::channel();

        self.sender
            .send(SqlMessage::Query {
                statement: statement.to_string(),
                respond_to,
            })
            .await
            .map_err(|_| BrError::sql("连接 Actor 已关闭"))?;

        receiver
            .await
            .map_err(|_| BrError::sql("等待连接响应失败"))?
    }
}
