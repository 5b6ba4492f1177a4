// ==========================================
// 纺纱生产执行系统 - 停机记录实体
// ==========================================
// 说明: 停机记录独立于批次创建/闭合; 严重停机由事件发布器
//       通知维修协作方开工单 (本核心不创建工单)
// ==========================================

use crate::domain::metadata::MetadataBundle;
use crate::domain::types::DowntimeReason;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 停机记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimeRecord {
    pub downtime_id: String,       // 记录ID (UUID)
    pub machine_code: String,      // 机台代码
    pub line_code: Option<String>, // 生产线
    pub shift_code: String,        // 班次
    pub operator: String,          // 报告人
    pub start_time: NaiveDateTime, // 停机开始
    pub end_time: Option<NaiveDateTime>, // 停机结束 (未闭合为 None)
    pub duration_min: Option<i64>,       // 时长 (分钟)
    pub reason_category: DowntimeReason, // 原因分类
    pub reason_detail: String,           // 原因明细
    pub production_loss: Option<f64>,    // 损失产量 (kg)
    pub notes: String,
    pub metadata: Option<MetadataBundle>, // 滚动30天机台健康摘要
    pub created_at: NaiveDateTime,
}

impl DowntimeRecord {
    pub fn new(
        machine_code: &str,
        shift_code: &str,
        operator: &str,
        start_time: NaiveDateTime,
        reason_category: DowntimeReason,
        reason_detail: &str,
    ) -> Self {
        Self {
            downtime_id: Uuid::new_v4().to_string(),
            machine_code: machine_code.to_string(),
            line_code: None,
            shift_code: shift_code.to_string(),
            operator: operator.to_string(),
            start_time,
            end_time: None,
            duration_min: None,
            reason_category,
            reason_detail: reason_detail.to_string(),
            production_loss: None,
            notes: String::new(),
            metadata: None,
            created_at: chrono::Local::now().naive_local(),
        }
    }

    /// 闭合停机 (补结束时间并折算时长)
    pub fn close(&mut self, end_time: NaiveDateTime) {
        self.end_time = Some(end_time);
        let minutes = (end_time - self.start_time).num_minutes();
        self.duration_min = Some(minutes.max(0));
    }
}
