use crate::constants::polling::{DEFAULT_POLL_INTERVAL_MS, MAX_POLLS};
use crate::sql::{SqlClient, SqlRow, quote_identifier};
use crate::store::JobStatus;
use crate::{BrError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 轮询参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub max_polls: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_polls: MAX_POLLS,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// 轮询间隔的睡眠抽象
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 被监控的任务类型，决定状态查询语句与结果列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Backup,
    Restore,
}

impl JobKind {
    pub fn status_statement(&self, database: &str) -> Result<String> {
        let database = quote_identifier(database)?;
        Ok(match self {
            JobKind::Backup => format!("SHOW BACKUP FROM {database}"),
            JobKind::Restore => format!("SHOW RESTORE FROM {database}"),
        })
    }

    /// (列名, 无列名时的下标)
    fn label_column(&self) -> (&'static str, usize) {
        match self {
            JobKind::Backup => ("SnapshotName", 1),
            JobKind::Restore => ("Label", 1),
        }
    }

    fn state_column(&self) -> (&'static str, usize) {
        match self {
            JobKind::Backup => ("State", 3),
            JobKind::Restore => ("State", 4),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Backup => f.write_str("BACKUP"),
            JobKind::Restore => f.write_str("RESTORE"),
        }
    }
}

/// 任务终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Finished,
    Failed,
    Cancelled,
    Timeout,
    Error,
    Lost,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        self.status().as_str()
    }

    /// 写入历史表的状态
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Finished => JobStatus::Finished,
            JobState::Failed => JobStatus::Failed,
            JobState::Cancelled => JobStatus::Cancelled,
            JobState::Timeout => JobStatus::Timeout,
            JobState::Error => JobStatus::Error,
            JobState::Lost => JobStatus::Lost,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次状态查询看到的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// 没有任何任务
    Empty,
    /// 当前可见的任务
    Job { label: String, state: String },
}

impl Observation {
    pub fn from_rows(kind: JobKind, rows: &[SqlRow]) -> Self {
        let Some(row) = rows.first() else {
            return Observation::Empty;
        };
        let (label_name, label_index) = kind.label_column();
        let (state_name, state_index) = kind.state_column();
        match row.get_named_or(label_name, label_index) {
            Some(label) => Observation::Job {
                label: label.to_string(),
                state: row
                    .get_named_or(state_name, state_index)
                    .unwrap_or_default()
                    .to_string(),
            },
            None => Observation::Empty,
        }
    }
}

/// 单步轮询的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollDecision {
    Continue,
    Done(JobState),
}

/// 轮询状态转移
///
/// 首次轮询（attempt 0）看到其他快照名视为新任务尚未可见，继续等待；之后再看到
/// 其他快照名说明被跟踪的任务已被覆盖，判定为 LOST。
pub fn next_decision(tracked_label: &str, attempt: u32, observation: &Observation) -> PollDecision {
    match observation {
        Observation::Empty => PollDecision::Continue,
        Observation::Job { label, .. } if label != tracked_label => {
            if attempt == 0 {
                PollDecision::Continue
            } else {
                PollDecision::Done(JobState::Lost)
            }
        }
        Observation::Job { state, .. } => match state.trim().to_ascii_uppercase().as_str() {
            "FINISHED" => PollDecision::Done(JobState::Finished),
            "CANCELLED" => PollDecision::Done(JobState::Cancelled),
            "FAILED" => PollDecision::Done(JobState::Failed),
            _ => PollDecision::Continue,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalStatus {
    pub state: JobState,
    pub label: String,
}

/// 任务执行结果，仅 FINISHED 视为成功
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub final_status: FinalStatus,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    fn new(label: &str, state: JobState, error_message: Option<String>) -> Self {
        Self {
            success: state == JobState::Finished,
            final_status: FinalStatus {
                state,
                label: label.to_string(),
            },
            error_message,
        }
    }

    pub fn state(&self) -> JobState {
        self.final_status.state
    }

    /// 失败结果转换为对应的错误类别
    pub fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let label = &self.final_status.label;
        let message = match &self.error_message {
            Some(detail) => format!("{label}: {detail}"),
            None => format!("{label}: 任务以 {} 状态结束", self.final_status.state),
        };
        Err(match self.final_status.state {
            JobState::Lost => BrError::LostTracking(message),
            JobState::Timeout => BrError::Timeout(message),
            _ => BrError::execution(message),
        })
    }
}

/// 提交并轮询 BACKUP / RESTORE 任务，不做任何自动重试
#[derive(Clone)]
pub struct ExecutionMonitor {
    client: Arc<dyn SqlClient>,
    sleeper: Arc<dyn Sleeper>,
    settings: PollSettings,
}

impl ExecutionMonitor {
    pub fn new(client: Arc<dyn SqlClient>, settings: PollSettings) -> Self {
        Self::with_sleeper(client, Arc::new(TokioSleeper), settings)
    }

    pub fn with_sleeper(
        client: Arc<dyn SqlClient>,
        sleeper: Arc<dyn Sleeper>,
        settings: PollSettings,
    ) -> Self {
        Self {
            client,
            sleeper,
            settings,
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// 原样提交语句
    pub async fn submit(&self, statement: &str) -> Result<()> {
        info!("提交任务: {}", statement);
        self.client.execute(statement).await
    }

    /// 轮询直到终态或次数耗尽
    pub async fn poll(&self, kind: JobKind, database: &str, label: &str) -> ExecutionResult {
        let statement = match kind.status_statement(database) {
            Ok(statement) => statement,
            Err(e) => return ExecutionResult::new(label, JobState::Error, Some(e.to_string())),
        };

        for attempt in 0..self.settings.max_polls {
            let rows = match self.client.query(&statement).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("查询 {} 状态失败: {}", kind, e);
                    return ExecutionResult::new(
                        label,
                        JobState::Error,
                        Some(format!("查询任务状态失败: {e}")),
                    );
                }
            };

            let observation = Observation::from_rows(kind, &rows);
            match next_decision(label, attempt, &observation) {
                PollDecision::Done(JobState::Finished) => {
                    info!("{} 任务 {} 已完成", kind, label);
                    return ExecutionResult::new(label, JobState::Finished, None);
                }
                PollDecision::Done(JobState::Lost) => {
                    let seen = match &observation {
                        Observation::Job { label, .. } => label.as_str(),
                        Observation::Empty => "",
                    };
                    warn!("{} 任务 {} 跟踪丢失，当前可见任务为 {}", kind, label, seen);
                    return ExecutionResult::new(
                        label,
                        JobState::Lost,
                        Some(format!(
                            "SHOW {kind} 只显示最近一个任务，当前显示的是 {seen} 而不是 {label}，\
                             说明有其他任务覆盖了被跟踪的快照。任务的真实结果未知，\
                             请检查集群状态，并通过 ops.run_status 并发控制避免同时提交多个任务"
                        )),
                    );
                }
                PollDecision::Done(state) => {
                    warn!("{} 任务 {} 结束，状态 {}", kind, label, state);
                    return ExecutionResult::new(
                        label,
                        state,
                        Some(format!("任务以 {state} 状态结束")),
                    );
                }
                PollDecision::Continue => {
                    debug!("第 {} 次轮询 {}: {:?}", attempt + 1, label, observation);
                }
            }

            if attempt + 1 < self.settings.max_polls {
                self.sleeper.sleep(self.settings.interval).await;
            }
        }

        warn!(
            "{} 任务 {} 轮询 {} 次后仍未结束",
            kind, label, self.settings.max_polls
        );
        ExecutionResult::new(
            label,
            JobState::Timeout,
            Some(format!(
                "轮询 {} 次后任务仍未结束，任务可能仍在集群中运行",
                self.settings.max_polls
            )),
        )
    }

    /// 提交并等待结果；提交失败直接返回 FAILED，不进入轮询
    #[instrument(skip(self, statement), fields(kind = %kind))]
    pub async fn run(
        &self,
        kind: JobKind,
        database: &str,
        label: &str,
        statement: &str,
    ) -> ExecutionResult {
        if let Err(e) = self.submit(statement).await {
            warn!("提交 {} 失败: {}", label, e);
            return ExecutionResult::new(label, JobState::Failed, Some(format!("提交失败: {e}")));
        }
        self.poll(kind, database, label).await
    }
}
