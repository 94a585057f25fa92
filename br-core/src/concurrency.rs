use crate::store::{JobScope, RunStatus, RunStatusStore, SlotState};
use crate::{BrError, Result};
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use tracing::{debug, info};

/// 任务并发闸门，每个作用域同一时刻最多一个 ACTIVE 槽位
///
/// `reserve` 先读取 ACTIVE 行再插入，两步之间没有原子保证：两个进程同时
/// 通过检查时都会插入成功。需要严格互斥时应在调用方之外串行化调度。
#[derive(Clone)]
pub struct JobGate {
    store: Arc<dyn RunStatusStore>,
}

impl JobGate {
    pub fn new(store: Arc<dyn RunStatusStore>) -> Self {
        Self { store }
    }

    /// 预留槽位；同作用域已有 ACTIVE 任务时返回 ConcurrencyConflict，不写入任何数据
    pub async fn reserve(&self, scope: JobScope, label: &str) -> Result<()> {
        self.reserve_at(scope, label, Local::now().naive_local())
            .await
    }

    pub async fn reserve_at(
        &self,
        scope: JobScope,
        label: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        let active = self.store.active_slots().await?;
        if let Some(blocking) = active.iter().find(|slot| slot.scope == scope) {
            return Err(BrError::ConcurrencyConflict {
                scope: scope.to_string(),
                label: blocking.label.clone(),
            });
        }

        self.store
            .insert_slot(&RunStatus {
                scope,
                label: label.to_string(),
                state: SlotState::Active,
                started_at: now,
                finished_at: None,
            })
            .await?;
        info!("已预留任务槽位 {}:{}", scope, label);
        Ok(())
    }

    /// 释放槽位
    ///
    /// 相同终态重复写入是空操作；已结束的槽位不允许改写为另一个终态。
    pub async fn complete(&self, scope: JobScope, label: &str, final_state: SlotState) -> Result<()> {
        if !final_state.is_terminal() {
            return Err(BrError::custom(format!(
                "槽位 {scope}:{label} 只能以终态结束，收到 {final_state}"
            )));
        }

        if let Some(existing) = self.store.get_slot(scope, label).await? {
            if existing.state == final_state {
                debug!("槽位 {}:{} 已是 {}，跳过", scope, label, final_state);
                return Ok(());
            }
            if existing.state.is_terminal() {
                return Err(BrError::SlotAlreadyCompleted {
                    scope: scope.to_string(),
                    label: label.to_string(),
                    existing: existing.state.to_string(),
                    requested: final_state.to_string(),
                });
            }
        }

        self.store
            .update_slot(scope, label, final_state, Local::now().naive_local())
            .await?;
        info!("已释放任务槽位 {}:{} -> {}", scope, label, final_state);
        Ok(())
    }
}
