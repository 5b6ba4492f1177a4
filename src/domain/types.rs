// ==========================================
// 纺纱生产执行系统 - 领域类型定义
// ==========================================
// 序列化格式: snake_case (与数据库一致), 异常标志为 SCREAMING_SNAKE_CASE
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 生产工序 (Stage)
// ==========================================
// 纺纱流程: 原料 → 清花 → 梳棉 → 并条(可多道) → 末并 → 细纱
//           → 络筒 → 倍捻 → 定型, 另有染色
// Fiber 仅作为谱系源标签 (原料批次由库存模块管理)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fiber,    // 原料
    Blowroom, // 清花
    Carding,  // 梳棉
    Passage,  // 并条
    Finisher, // 末并
    Spinning, // 细纱
    Winding,  // 络筒
    Tfo,      // 倍捻
    HeatSet,  // 定型
    Dyeing,   // 染色
}

impl Stage {
    /// 数据库标签
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fiber => "fiber",
            Stage::Blowroom => "blowroom",
            Stage::Carding => "carding",
            Stage::Passage => "passage",
            Stage::Finisher => "finisher",
            Stage::Spinning => "spinning",
            Stage::Winding => "winding",
            Stage::Tfo => "tfo",
            Stage::HeatSet => "heatset",
            Stage::Dyeing => "dyeing",
        }
    }

    /// 批次编号前缀
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Fiber => "FB",
            Stage::Blowroom => "BL",
            Stage::Carding => "CR",
            Stage::Passage => "PS",
            Stage::Finisher => "FN",
            Stage::Spinning => "SP",
            Stage::Winding => "WD",
            Stage::Tfo => "TFO",
            Stage::HeatSet => "HS",
            Stage::Dyeing => "DY",
        }
    }

    /// 从数据库标签解析
    pub fn from_tag(tag: &str) -> Option<Stage> {
        match tag {
            "fiber" => Some(Stage::Fiber),
            "blowroom" => Some(Stage::Blowroom),
            "carding" => Some(Stage::Carding),
            "passage" => Some(Stage::Passage),
            "finisher" => Some(Stage::Finisher),
            "spinning" => Some(Stage::Spinning),
            "winding" => Some(Stage::Winding),
            "tfo" => Some(Stage::Tfo),
            "heatset" => Some(Stage::HeatSet),
            "dyeing" => Some(Stage::Dyeing),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 批次状态 (Batch Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,  // 在产
    Completed,   // 完成
    QualityHold, // 质量扣留
    Cancelled,   // 取消
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
            BatchStatus::QualityHold => "quality_hold",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_tag(tag: &str) -> Option<BatchStatus> {
        match tag {
            "in_progress" => Some(BatchStatus::InProgress),
            "completed" => Some(BatchStatus::Completed),
            "quality_hold" => Some(BatchStatus::QualityHold),
            "cancelled" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 停机原因分类 (Downtime Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DowntimeReason {
    Mechanical, // 机械故障
    Electrical, // 电气故障
    Material,   // 原料问题
    Operator,   // 操作问题
    Quality,    // 质量问题
    Planned,    // 计划停机
    Other,      // 其他
}

impl DowntimeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DowntimeReason::Mechanical => "mechanical",
            DowntimeReason::Electrical => "electrical",
            DowntimeReason::Material => "material",
            DowntimeReason::Operator => "operator",
            DowntimeReason::Quality => "quality",
            DowntimeReason::Planned => "planned",
            DowntimeReason::Other => "other",
        }
    }

    pub fn from_tag(tag: &str) -> Option<DowntimeReason> {
        match tag {
            "mechanical" => Some(DowntimeReason::Mechanical),
            "electrical" => Some(DowntimeReason::Electrical),
            "material" => Some(DowntimeReason::Material),
            "operator" => Some(DowntimeReason::Operator),
            "quality" => Some(DowntimeReason::Quality),
            "planned" => Some(DowntimeReason::Planned),
            "other" => Some(DowntimeReason::Other),
            _ => None,
        }
    }
}

impl fmt::Display for DowntimeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 机台状态 (Machine Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Active,      // 运行
    Maintenance, // 检修
    Idle,        // 闲置
    Retired,     // 报废
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Active => "active",
            MachineStatus::Maintenance => "maintenance",
            MachineStatus::Idle => "idle",
            MachineStatus::Retired => "retired",
        }
    }

    pub fn from_tag(tag: &str) -> Option<MachineStatus> {
        match tag {
            "active" => Some(MachineStatus::Active),
            "maintenance" => Some(MachineStatus::Maintenance),
            "idle" => Some(MachineStatus::Idle),
            "retired" => Some(MachineStatus::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 风险等级 (Risk Level)
// ==========================================
// 顺序: Critical < High < Medium < Low (排序权重, 越靠前越危险)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical, // 危急
    High,     // 高
    Medium,   // 中
    Low,      // 低
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    /// 排序权重 (危急在前)
    pub fn rank(&self) -> u8 {
        match self {
            RiskLevel::Critical => 0,
            RiskLevel::High => 1,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 3,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 异常标志 (Anomaly Flag)
// ==========================================
// 派生指标越限时附加到批次 metadata.anomaly_flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyFlag {
    HighWaste,         // 清花落棉超限
    HighNeps,          // 梳棉棉结超限
    HighCv,            // 并条条干CV超限
    LowEfficiency,     // 细纱效率偏低
    HighBreakage,      // 细纱断头超限
    LowOee,            // 细纱OEE偏低
    QualityFail,       // 染色质检不合格
    HighTemperature,   // 染色温度超限
    ExtremePh,         // 染液pH越界
    FrequentDowntime,  // 停机频繁
    ExcessiveDowntime, // 停机时长超限
}

impl AnomalyFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyFlag::HighWaste => "HIGH_WASTE",
            AnomalyFlag::HighNeps => "HIGH_NEPS",
            AnomalyFlag::HighCv => "HIGH_CV",
            AnomalyFlag::LowEfficiency => "LOW_EFFICIENCY",
            AnomalyFlag::HighBreakage => "HIGH_BREAKAGE",
            AnomalyFlag::LowOee => "LOW_OEE",
            AnomalyFlag::QualityFail => "QUALITY_FAIL",
            AnomalyFlag::HighTemperature => "HIGH_TEMPERATURE",
            AnomalyFlag::ExtremePh => "EXTREME_PH",
            AnomalyFlag::FrequentDowntime => "FREQUENT_DOWNTIME",
            AnomalyFlag::ExcessiveDowntime => "EXCESSIVE_DOWNTIME",
        }
    }
}

impl fmt::Display for AnomalyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 时序指标白名单 (Timeseries Metric)
// ==========================================
// 仓储层按枚举映射列名, 杜绝调用方注入任意列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeseriesMetric {
    OutputWeight,  // 产量 (求和)
    EfficiencyPct, // 效率 (求平均)
    BreakageCount, // 断头数 (求和)
}

impl TimeseriesMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeseriesMetric::OutputWeight => "output_weight",
            TimeseriesMetric::EfficiencyPct => "efficiency_pct",
            TimeseriesMetric::BreakageCount => "breakage_count",
        }
    }

    /// 从查询参数解析, 未知指标回退到产量
    pub fn from_key_or_default(key: &str) -> TimeseriesMetric {
        match key {
            "efficiency_pct" => TimeseriesMetric::EfficiencyPct,
            "breakage_count" => TimeseriesMetric::BreakageCount,
            _ => TimeseriesMetric::OutputWeight,
        }
    }
}

impl fmt::Display for TimeseriesMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tag_roundtrip() {
        for stage in [
            Stage::Fiber,
            Stage::Blowroom,
            Stage::Carding,
            Stage::Passage,
            Stage::Finisher,
            Stage::Spinning,
            Stage::Winding,
            Stage::Tfo,
            Stage::HeatSet,
            Stage::Dyeing,
        ] {
            assert_eq!(Stage::from_tag(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::from_tag("unknown"), None);
    }

    #[test]
    fn test_risk_level_rank_order() {
        assert!(RiskLevel::Critical.rank() < RiskLevel::High.rank());
        assert!(RiskLevel::High.rank() < RiskLevel::Medium.rank());
        assert!(RiskLevel::Medium.rank() < RiskLevel::Low.rank());
    }

    #[test]
    fn test_timeseries_metric_fallback() {
        assert_eq!(
            TimeseriesMetric::from_key_or_default("efficiency_pct"),
            TimeseriesMetric::EfficiencyPct
        );
        assert_eq!(
            TimeseriesMetric::from_key_or_default("drop table"),
            TimeseriesMetric::OutputWeight
        );
    }
}
