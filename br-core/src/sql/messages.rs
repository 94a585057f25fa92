use crate::Result;
use tokio::sync::oneshot;

use super::row::SqlRow;

/// StarRocks 连接操作消息
#[derive(Debug)]
pub enum SqlMessage {
    /// 执行不返回结果的语句
    Execute {
        statement: String,
        respond_to: oneshot::Sender<Result<()>>,
    },
    /// 执行查询
    Query {
        statement: String,
        respond_to: oneshot::Sender<Result<Vec<SqlRow>>>,
    },
    /// 断开连接并停止 Actor
    Disconnect {
        respond_to: oneshot::Sender<Result<()>>,
    },
}
