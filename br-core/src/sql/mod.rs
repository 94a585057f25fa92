// StarRocks SQL 访问模块
//
// 核心组件只通过 `SqlClient` 的 execute/query 两个操作访问集群，不关心
// 连接、事务或重试。生产实现 `StarRocksSession` 用 Actor 模式独占一个
// mysql_async 连接，保证同一时刻只有一条语句在执行。
//
// 主要组件：
// - SqlClient: 核心依赖的 SQL 协作者接口
// - StarRocksSession: 对外句柄
// - SqlActor: 内部 Actor，持有实际连接
// - SqlRow / 标识符校验工具

mod actor;
mod ident;
mod manager;
mod messages;
mod row;

use crate::Result;
use async_trait::async_trait;

pub use ident::{
    like_prefix, qualified, quote_identifier, quote_literal, validate_all, validate_identifier,
};
pub use manager::StarRocksSession;
pub use row::{SqlRow, format_datetime, parse_datetime};

/// SQL 协作者
#[async_trait]
pub trait SqlClient: Send + Sync {
    /// 执行不返回结果的语句
    async fn execute(&self, statement: &str) -> Result<()>;

    /// 执行查询并返回有序结果行
    async fn query(&self, statement: &str) -> Result<Vec<SqlRow>>;
}
