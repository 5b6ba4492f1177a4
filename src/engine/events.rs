// ==========================================
// 纺纱生产执行系统 - 引擎层事件发布
// ==========================================
// 职责: 定义维修事件发布 trait, 实现依赖倒置
// 说明: 严重停机需要开维修工单, 工单由外部维修协作方创建;
//       核心只发布事件, 不持有维修模块依赖
// ==========================================

use crate::domain::downtime::DowntimeRecord;
use crate::domain::types::DowntimeReason;
use serde::{Deserialize, Serialize};
use std::error::Error;

/// 触发工单申请的停机时长阈值 (分钟)
pub const WORK_ORDER_DURATION_THRESHOLD_MIN: i64 = 120;

// ==========================================
// 维修事件类型
// ==========================================

/// 维修事件触发类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceEventType {
    /// 申请维修工单
    WorkOrderRequested,
}

impl MaintenanceEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            MaintenanceEventType::WorkOrderRequested => "WorkOrderRequested",
        }
    }
}

/// 维修事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceEvent {
    /// 事件类型
    pub event_type: MaintenanceEventType,
    /// 机台代码
    pub machine_code: String,
    /// 停机记录ID
    pub downtime_id: String,
    /// 停机原因分类
    pub reason_category: DowntimeReason,
    /// 停机时长 (分钟, 未闭合为 None)
    pub duration_min: Option<i64>,
}

impl MaintenanceEvent {
    /// 从停机记录构造工单申请事件
    pub fn work_order_requested(record: &DowntimeRecord) -> Self {
        Self {
            event_type: MaintenanceEventType::WorkOrderRequested,
            machine_code: record.machine_code.clone(),
            downtime_id: record.downtime_id.clone(),
            reason_category: record.reason_category,
            duration_min: record.duration_min,
        }
    }
}

/// 停机是否达到开工单的严重程度
///
/// 口径: 已闭合且时长 ≥ 阈值 (计划停机除外)
pub fn should_request_work_order(record: &DowntimeRecord) -> bool {
    if record.reason_category == DowntimeReason::Planned {
        return false;
    }
    record
        .duration_min
        .map(|d| d >= WORK_ORDER_DURATION_THRESHOLD_MIN)
        .unwrap_or(false)
}

// ==========================================
// 事件发布 trait
// ==========================================

/// 维修事件发布接口
///
/// 核心定义 trait, 维修协作方实现适配器
pub trait MaintenanceEventPublisher: Send + Sync {
    fn publish(&self, event: &MaintenanceEvent) -> Result<(), Box<dyn Error>>;
}

/// 空实现 (未接入维修模块时使用)
pub struct NoOpEventPublisher;

impl MaintenanceEventPublisher for NoOpEventPublisher {
    fn publish(&self, _event: &MaintenanceEvent) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}
