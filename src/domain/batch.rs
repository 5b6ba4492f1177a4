// ==========================================
// 纺纱生产执行系统 - 生产批次实体
// ==========================================
// 说明: 各工序批次共享同一实体, 工序专属字段置为可空
//       (清花只用重量字段, 细纱用锭子/断头/效率字段, 染色用工艺参数字段)
// 约束: output_weight + waste_weight ≤ input_weight 为软约束, 写入时不强制
// ==========================================

use crate::domain::metadata::MetadataBundle;
use crate::domain::types::{BatchStatus, Stage};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 生产批次
///
/// 批次在工序开工时创建 (in_progress), 操作工补录字段, 每次提交后
/// 由指标引擎重算 metadata; 完成后核心字段视为稳定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionBatch {
    pub batch_id: String,    // 批次ID (UUID)
    pub batch_number: String, // 批次编号 (如 SP-040929-001, 全局唯一)
    pub stage: Stage,         // 工序
    pub machine_code: String, // 机台代码
    pub operator: String,     // 操作工
    pub shift_code: String,   // 班次 (A/B/C)
    pub line_code: Option<String>, // 生产线
    pub order_no: Option<String>,  // 关联订单号
    pub production_date: NaiveDate, // 生产日期
    pub status: BatchStatus,        // 状态
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,

    // ── 重量 (kg) ─────────────────────────────
    pub input_weight: Option<f64>,
    pub output_weight: Option<f64>,
    pub waste_weight: Option<f64>,

    // ── 并条专属 ──────────────────────────────
    pub passage_number: Option<i64>, // 道次 (1=头并 2=二并)
    pub num_inputs: Option<i64>,     // 喂入条数 (常用 6-8)
    pub draft_ratio: Option<f64>,    // 牵伸倍数
    pub evenness_cv: Option<f64>,    // 条干CV%

    // ── 梳棉专属 ──────────────────────────────
    pub neps_count: Option<i64>, // 棉结数

    // ── 细纱/倍捻专属 ─────────────────────────
    pub spindle_speed_rpm: Option<i64>,    // 锭速
    pub twist_tpm: Option<f64>,            // 捻度 (捻/米)
    pub yarn_count: Option<f64>,           // 纱支
    pub num_spindles_active: Option<i64>,  // 运转锭数
    pub num_spindles_total: Option<i64>,   // 总锭数
    pub breakage_count: Option<i64>,       // 断头数
    pub efficiency_pct: Option<f64>,       // 效率%

    // ── 染色/定型专属 ─────────────────────────
    pub temperature: Option<f64>,     // 温度 (°C)
    pub ph_value: Option<f64>,        // 染液pH
    pub liquor_ratio: Option<f64>,    // 浴比
    pub duration_min: Option<i64>,    // 工艺时长 (分钟)
    pub quality_result: Option<String>, // 质检结果 (pass/fail)

    pub notes: String,
    pub metadata: Option<MetadataBundle>, // 派生指标 (指标引擎写入)
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProductionBatch {
    /// 创建新批次 (编号由 BatchApi 生成后填入)
    pub fn new(
        stage: Stage,
        machine_code: &str,
        operator: &str,
        shift_code: &str,
        production_date: NaiveDate,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            batch_id: Uuid::new_v4().to_string(),
            batch_number: String::new(),
            stage,
            machine_code: machine_code.to_string(),
            operator: operator.to_string(),
            shift_code: shift_code.to_string(),
            line_code: None,
            order_no: None,
            production_date,
            status: BatchStatus::InProgress,
            started_at: Some(now),
            completed_at: None,
            input_weight: None,
            output_weight: None,
            waste_weight: None,
            passage_number: None,
            num_inputs: None,
            draft_ratio: None,
            evenness_cv: None,
            neps_count: None,
            spindle_speed_rpm: None,
            twist_tpm: None,
            yarn_count: None,
            num_spindles_active: None,
            num_spindles_total: None,
            breakage_count: None,
            efficiency_pct: None,
            temperature: None,
            ph_value: None,
            liquor_ratio: None,
            duration_min: None,
            quality_result: None,
            notes: String::new(),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 重量守恒校验 (软约束, 供测试与报表提示使用)
    ///
    /// # 参数
    /// - `epsilon`: 允许的相对误差 (如 0.01 表示 1%)
    pub fn weight_conservation_ok(&self, epsilon: f64) -> bool {
        match (self.input_weight, self.output_weight) {
            (Some(inp), Some(out)) if inp > 0.0 => {
                let waste = self.waste_weight.unwrap_or(0.0);
                out + waste <= inp * (1.0 + epsilon)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_batch_defaults() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let batch = ProductionBatch::new(Stage::Spinning, "SP-01", "op1", "A", d);
        assert_eq!(batch.status, BatchStatus::InProgress);
        assert!(batch.batch_number.is_empty());
        assert!(batch.metadata.is_none());
        assert!(!batch.batch_id.is_empty());
    }

    #[test]
    fn test_weight_conservation_soft_check() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let mut batch = ProductionBatch::new(Stage::Blowroom, "BL-01", "op1", "A", d);
        batch.input_weight = Some(500.0);
        batch.output_weight = Some(480.0);
        batch.waste_weight = Some(20.0);
        assert!(batch.weight_conservation_ok(0.01));

        batch.waste_weight = Some(40.0);
        assert!(!batch.weight_conservation_ok(0.01));

        // 缺字段时不判定
        batch.input_weight = None;
        assert!(batch.weight_conservation_ok(0.01));
    }
}
