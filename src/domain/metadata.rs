// ==========================================
// 纺纱生产执行系统 - 派生指标元数据
// ==========================================
// 结构 (序列化为 JSON 存入 metadata 列):
// {
//   "ai_version": "1.0",
//   "computed_at": "2026-08-07T12:00:00",
//   "yield_pct": ..., "waste_pct": ...,
//   "quality_metrics": { ... },
//   "oee": { ... },
//   "process_params": { ... },
//   "machine_health": { ... },
//   "anomaly_flags": [ ... ]
// }
// 缺失指标直接省略字段, 不写 null
// ==========================================

use crate::domain::types::AnomalyFlag;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 质量指标 (按工序择取)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evenness_cv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakage_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakage_per_1000_spindle_hr: Option<f64>,
}

impl QualityMetrics {
    pub fn is_empty(&self) -> bool {
        self.neps.is_none()
            && self.evenness_cv.is_none()
            && self.draft_ratio.is_none()
            && self.breakage_count.is_none()
            && self.breakage_per_1000_spindle_hr.is_none()
    }
}

/// 单批次简化 OEE (细纱)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OeeSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oee_simple: Option<f64>,
}

impl OeeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.performance.is_none() && self.availability.is_none() && self.oee_simple.is_none()
    }
}

/// 染色工艺参数快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquor_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_min: Option<i64>,
}

/// 机台健康摘要 (停机记录滚动30天)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineHealth {
    pub downtime_count_30d: i64,
    pub downtime_total_min_30d: i64,
}

/// 派生指标元数据包
///
/// 每次批次提交后由 MetricsEngine 整体重算并替换旧包;
/// 持久化走独立的 persist_metadata 路径, 不会再次触发重算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataBundle {
    pub ai_version: String,
    pub computed_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waste_pct: Option<f64>,
    #[serde(skip_serializing_if = "QualityMetrics::is_empty", default)]
    pub quality_metrics: QualityMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oee: Option<OeeSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_params: Option<ProcessParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_health: Option<MachineHealth>,
    pub anomaly_flags: Vec<AnomalyFlag>,
}

impl MetadataBundle {
    /// 新建空包 (仅版本与计算时间)
    pub fn new(ai_version: &str, computed_at: NaiveDateTime) -> Self {
        Self {
            ai_version: ai_version.to_string(),
            computed_at,
            yield_pct: None,
            waste_pct: None,
            quality_metrics: QualityMetrics::default(),
            oee: None,
            process_params: None,
            machine_health: None,
            anomaly_flags: Vec::new(),
        }
    }

    /// 指标等价判断 (忽略 computed_at, 用于幂等校验)
    pub fn same_metrics(&self, other: &MetadataBundle) -> bool {
        self.ai_version == other.ai_version
            && self.yield_pct == other.yield_pct
            && self.waste_pct == other.waste_pct
            && self.quality_metrics == other.quality_metrics
            && self.oee == other.oee
            && self.process_params == other.process_params
            && self.machine_health == other.machine_health
            && self.anomaly_flags == other.anomaly_flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_omit_absent_fields() {
        let bundle = MetadataBundle::new("1.0", ts(8));
        let json = serde_json::to_value(&bundle).expect("serialize failed");
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("ai_version"));
        assert!(obj.contains_key("anomaly_flags"));
        assert!(!obj.contains_key("yield_pct"));
        assert!(!obj.contains_key("quality_metrics"));
        assert!(!obj.contains_key("oee"));
    }

    #[test]
    fn test_same_metrics_ignores_computed_at() {
        let mut a = MetadataBundle::new("1.0", ts(8));
        let mut b = MetadataBundle::new("1.0", ts(9));
        a.yield_pct = Some(96.0);
        b.yield_pct = Some(96.0);
        assert!(a.same_metrics(&b));

        b.anomaly_flags.push(AnomalyFlag::HighWaste);
        assert!(!a.same_metrics(&b));
    }

    #[test]
    fn test_flag_serialization() {
        let mut bundle = MetadataBundle::new("1.0", ts(8));
        bundle.anomaly_flags.push(AnomalyFlag::LowEfficiency);
        let json = serde_json::to_string(&bundle).expect("serialize failed");
        assert!(json.contains("\"LOW_EFFICIENCY\""));
    }
}
