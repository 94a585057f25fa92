use crate::config::ConnectionConfig;
use crate::{BrError, Result};
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, SslOpts, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::SqlMessage;
use super::row::SqlRow;

/// StarRocks 连接 Actor - 独占一个 MySQL 协议连接，按顺序处理语句
pub struct SqlActor {
    connection: Option<Conn>,
}

impl SqlActor {
    /// 建立连接
    pub async fn connect(settings: &ConnectionConfig) -> Result<Self> {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(settings.host.clone())
            .tcp_port(settings.port)
            .user(Some(settings.user.clone()))
            .pass(Some(settings.password.clone()))
            .db_name(Some(settings.database.clone()));

        if settings.tls.enabled {
            let mut ssl_opts = SslOpts::default()
                .with_danger_accept_invalid_certs(!settings.tls.verify_server_cert);
            if let Some(ca_cert) = &settings.tls.ca_cert {
                ssl_opts = ssl_opts.with_root_certs(vec![PathBuf::from(ca_cert).into()]);
            }
            builder = builder.ssl_opts(Some(ssl_opts));
        }

        let connection = Conn::new(builder).await?;
        info!(
            "已连接 StarRocks: {}:{}/{}",
            settings.host, settings.port, settings.database
        );
        Ok(Self {
            connection: Some(connection),
        })
    }

    /// 运行Actor消息循环
    pub async fn run(mut self, mut receiver: mpsc::Receiver<SqlMessage>) {
        debug!("StarRocks 连接 Actor 已启动");

        while let Some(message) = receiver.recv().await {
            if !self.handle_message(message).await {
                break;
            }
        }

        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.disconnect().await {
                warn!("关闭 StarRocks 连接失败: {}", e);
            }
        }

        debug!("StarRocks 连接 Actor 已关闭");
    }

    /// 处理消息，返回 false 表示停止循环
    async fn handle_message(&mut self, message: SqlMessage) -> bool {
        match message {
            SqlMessage::Execute {
                statement,
                respond_to,
            } => {
                let result = self.execute(&statement).await;
                let _ = respond_to.send(result);
                true
            }
            SqlMessage::Query {
                statement,
                respond_to,
            } => {
                let result = self.query(&statement).await;
                let _ = respond_to.send(result);
                true
            }
            SqlMessage::Disconnect { respond_to } => {
                let result = match self.connection.take() {
                    Some(connection) => connection.disconnect().await.map_err(BrError::from),
                    None => Ok(()),
                };
                let _ = respond_to.send(result);
                false
            }
        }
    }

    fn connection(&mut self) -> Result<&mut Conn> {
        self.connection
            .as_mut()
            .ok_or_else(|| BrError::sql("连接已关闭"))
    }

    async fn execute(&mut self, statement: &str) -> Result<()> {
        debug!(statement = %statement, "执行语句");
        self.connection()?.query_drop(statement).await?;
        Ok(())
    }

    async fn query(&mut self, statement: &str) -> Result<Vec<SqlRow>> {
        debug!(statement = %statement, "执行查询");
        let rows: Vec<mysql_async::Row> = self.connection()?.query(statement).await?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns_ref()
            .iter()
            .map(|c| c.name_str().to_string())
            .collect::<Vec<_>>()
            .into();

        Ok(rows
            .iter()
            .map(|row| {
                let values = (0..row.len())
                    .map(|i| row.as_ref(i).and_then(value_to_string))
                    .collect();
                SqlRow::new(columns.clone(), values)
            })
            .collect())
    }
}

/// 文本协议下的值转换
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(v) => Some(v.to_string()),
        Value::UInt(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
        Value::Double(v) => Some(v.to_string()),
        Value::Date(year, month, day, hour, minute, second, _micros) => Some(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        )),
        Value::Time(negative, days, hours, minutes, seconds, _micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u32::from(*hours) + *days * 24;
            Some(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}
