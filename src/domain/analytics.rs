// ==========================================
// 纺纱生产执行系统 - 分析结果记录
// ==========================================
// 说明: 按需计算, 不落库; 字段名即对外数据契约
//       百分比一律为 [0,100] 的数值, 日期为普通公历日期
// ==========================================

use crate::domain::types::{DowntimeReason, RiskLevel, Stage};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 机台单日 OEE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineDailyOee {
    pub machine_code: String,
    pub date: NaiveDate,
    pub availability: f64,            // 可用率%
    pub performance: f64,             // 表现率% (完成批次效率均值)
    pub quality: f64,                 // 质量率% (按断头率折算)
    pub oee: f64,                     // OEE%
    pub downtime_min: i64,            // 当日停机分钟
    pub breakage_rate_per_1000: f64,  // 千锭断头率
    pub batch_count: i64,             // 当日完成批次数
}

/// 停机原因分组统计 (按总时长降序)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonBreakdown {
    pub reason_category: DowntimeReason,
    pub count: i64,
    pub total_min: i64,
}

/// 周趋势点 (固定7天分桶, 旧→新)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyTrendPoint {
    pub week_start: NaiveDate,
    pub count: i64,
}

/// 停机模式分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimePattern {
    pub machine_code: String,
    pub period_days: i64,
    pub total_failures: i64,
    pub mtbf_hours: f64,   // 平均故障间隔 (小时)
    pub mttr_minutes: f64, // 平均修复时长 (分钟)
    pub risk_level: RiskLevel,
    pub by_reason: Vec<ReasonBreakdown>,
    pub weekly_trend: Vec<WeeklyTrendPoint>,
}

/// 机队健康条目 (排名输出)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetMachineHealth {
    pub machine_code: String,
    pub name: String,
    pub stage: Stage,
    pub line_code: Option<String>,
    pub oee_today: f64,
    pub availability: f64,
    pub risk_level: RiskLevel,
    pub mtbf_hours: f64,
    pub failures_30d: i64,
}

/// 时序数据点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}
