use crate::constants::time::{DATETIME_FORMAT, DATETIME_FORMAT_FRACTIONAL};
use crate::{BrError, Result};
use chrono::NaiveDateTime;
use std::sync::Arc;

/// 查询结果行，所有值按文本协议转换为字符串
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlRow {
    columns: Arc<[String]>,
    values: Vec<Option<String>>,
}

impl SqlRow {
    pub fn new(columns: Arc<[String]>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// 无列名的行，只能按下标访问
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            columns: Arc::from(Vec::<String>::new()),
            values: values.into_iter().map(|v| v.map(Into::into)).collect(),
        }
    }

    /// 带列名的行
    pub fn named(pairs: &[(&str, Option<&str>)]) -> Self {
        let columns: Vec<String> = pairs.iter().map(|(name, _)| name.to_string()).collect();
        let values = pairs.iter().map(|(_, v)| v.map(str::to_string)).collect();
        Self {
            columns: Arc::from(columns),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// 列名查找，不区分大小写
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn get_named(&self, name: &str) -> Option<&str> {
        self.column_index(name).and_then(|i| self.get(i))
    }

    /// 优先按列名取值；结果集没有列名时退回到下标
    pub fn get_named_or(&self, name: &str, fallback_index: usize) -> Option<&str> {
        if self.columns.is_empty() {
            self.get(fallback_index)
        } else {
            self.get_named(name)
        }
    }

    pub fn get_datetime(&self, index: usize) -> Result<Option<NaiveDateTime>> {
        self.get(index).map(parse_datetime).transpose()
    }
}

/// 解析 StarRocks DATETIME 文本
pub fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, DATETIME_FORMAT_FRACTIONAL))
        .map_err(|e| BrError::sql(format!("无法解析时间 '{value}': {e}")))
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}
