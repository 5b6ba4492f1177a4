// ==========================================
// 纺纱生产执行系统 - 工序指标引擎
// ==========================================
// 职责: 批次提交后重算派生指标包 (整包替换旧包)
// 口径: 数值防御性取用 — 源字段缺失/非法时该指标直接省略, 不抛错
// 两段式: compute() 纯计算, 持久化走仓储 persist_metadata 窄更新,
//         写回路径不经过任何重算入口, 不会递归触发
// ==========================================

use crate::domain::batch::ProductionBatch;
use crate::domain::downtime::DowntimeRecord;
use crate::domain::metadata::{MachineHealth, MetadataBundle, OeeSnapshot, ProcessParams};
use crate::domain::types::{AnomalyFlag, Stage};
use crate::repository::downtime_repo::DowntimeWindowStats;
use crate::AI_VERSION;
use tracing::debug;

// ==========================================
// 异常阈值 (与现场既有口径一致)
// ==========================================

/// 清花落棉率上限 (%)
const HIGH_WASTE_PCT: f64 = 8.0;
/// 梳棉棉结上限 (个)
const HIGH_NEPS_COUNT: i64 = 200;
/// 并条条干CV上限 (%)
const HIGH_CV_PCT: f64 = 5.0;
/// 细纱效率下限 (%)
const LOW_EFFICIENCY_PCT: f64 = 70.0;
/// 细纱断头上限 (个)
const HIGH_BREAKAGE_COUNT: i64 = 50;
/// 细纱简化OEE下限 (%)
const LOW_OEE_PCT: f64 = 60.0;
/// 染色温度上限 (°C)
const HIGH_TEMPERATURE_C: f64 = 130.0;
/// 染液pH下限/上限
const PH_LOW: f64 = 3.0;
const PH_HIGH: f64 = 11.0;
/// 停机30天次数上限
const FREQUENT_DOWNTIME_COUNT_30D: i64 = 10;
/// 停机30天总分钟上限
const EXCESSIVE_DOWNTIME_MIN_30D: i64 = 500;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// 正数取用 (0 与缺失一律按缺失处理)
fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

// ==========================================
// MetricsEngine - 工序指标引擎
// ==========================================
pub struct MetricsEngine {
    // 无状态引擎, 不需要注入依赖
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 重算批次派生指标包 (纯计算, 不落库)
    ///
    /// 相同输入两次计算的指标值一致, 仅 computed_at 不同
    pub fn compute(&self, batch: &ProductionBatch) -> MetadataBundle {
        let mut meta = MetadataBundle::new(AI_VERSION, chrono::Local::now().naive_local());

        match batch.stage {
            Stage::Blowroom => self.enrich_blowroom(batch, &mut meta),
            Stage::Carding => self.enrich_carding(batch, &mut meta),
            Stage::Passage => self.enrich_passage(batch, &mut meta),
            Stage::Spinning => self.enrich_spinning(batch, &mut meta),
            Stage::Dyeing => self.enrich_dyeing(batch, &mut meta),
            // 末并与卷纱线各工序只看重量收得率
            Stage::Finisher | Stage::Winding | Stage::Tfo | Stage::HeatSet => {
                self.enrich_yield(batch, &mut meta)
            }
            // 原料批次无派生指标
            Stage::Fiber => {}
        }

        debug!(
            batch_number = %batch.batch_number,
            stage = %batch.stage,
            flags = meta.anomaly_flags.len(),
            "批次指标重算完成"
        );
        meta
    }

    /// 清花: 收得率/落棉率 + 落棉超限标志
    ///
    /// waste_weight 未录入时按 input - output 推算落棉
    fn enrich_blowroom(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        if let Some(inp) = positive(batch.input_weight) {
            if let Some(out) = positive(batch.output_weight) {
                meta.yield_pct = Some(round2(out / inp * 100.0));
            }

            let waste = positive(batch.waste_weight)
                .or_else(|| positive(batch.output_weight).map(|out| (inp - out).max(0.0)));
            if let Some(w) = waste {
                meta.waste_pct = Some(round2(w / inp * 100.0));
            }
        }

        if let Some(waste_pct) = meta.waste_pct {
            if waste_pct > HIGH_WASTE_PCT {
                meta.anomaly_flags.push(AnomalyFlag::HighWaste);
            }
        }
    }

    /// 梳棉: 收得率 + 棉结指标
    fn enrich_carding(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        self.enrich_yield(batch, meta);

        if let Some(neps) = batch.neps_count {
            meta.quality_metrics.neps = Some(neps);
            if neps > HIGH_NEPS_COUNT {
                meta.anomaly_flags.push(AnomalyFlag::HighNeps);
            }
        }
    }

    /// 并条: 条干CV + 牵伸倍数
    fn enrich_passage(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        if let Some(cv) = batch.evenness_cv.filter(|v| v.is_finite()) {
            meta.quality_metrics.evenness_cv = Some(cv);
            if cv > HIGH_CV_PCT {
                meta.anomaly_flags.push(AnomalyFlag::HighCv);
            }
        }

        if let Some(draft) = positive(batch.draft_ratio) {
            meta.quality_metrics.draft_ratio = Some(draft);
        }
    }

    /// 细纱: 收得率 + 单批简化OEE + 断头指标
    fn enrich_spinning(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        self.enrich_yield(batch, meta);

        let eff = positive(batch.efficiency_pct);
        let brk = batch.breakage_count.unwrap_or(0);
        let spindles = batch.num_spindles_active.unwrap_or(0).max(0);

        // 简化OEE: availability 用未舍入值参与 oee_simple 计算
        let mut oee = OeeSnapshot::default();
        if let Some(e) = eff {
            oee.performance = Some(e);
        }
        let mut availability_raw = None;
        if spindles > 0 {
            let total = batch
                .num_spindles_total
                .filter(|t| *t > 0)
                .unwrap_or(spindles);
            let avail = spindles as f64 / total as f64 * 100.0;
            availability_raw = Some(avail);
            oee.availability = Some(round2(avail));
        }
        if let (Some(e), Some(avail)) = (eff, availability_raw) {
            oee.oee_simple = Some(round2(avail * e / 10000.0 * 100.0));
        }
        if !oee.is_empty() {
            meta.oee = Some(oee);
        }

        meta.quality_metrics.breakage_count = Some(brk);
        meta.quality_metrics.breakage_per_1000_spindle_hr =
            Some(round1(brk as f64 / spindles.max(1) as f64 * 1000.0));

        if let Some(e) = eff {
            if e < LOW_EFFICIENCY_PCT {
                meta.anomaly_flags.push(AnomalyFlag::LowEfficiency);
            }
        }
        if brk > HIGH_BREAKAGE_COUNT {
            meta.anomaly_flags.push(AnomalyFlag::HighBreakage);
        }
        if let Some(oee_simple) = meta.oee.as_ref().and_then(|o| o.oee_simple) {
            if oee_simple < LOW_OEE_PCT {
                meta.anomaly_flags.push(AnomalyFlag::LowOee);
            }
        }
    }

    /// 染色: 工艺参数快照 + 质检/温度/pH标志
    fn enrich_dyeing(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        meta.process_params = Some(ProcessParams {
            temperature: batch.temperature.filter(|v| v.is_finite()),
            ph: batch.ph_value.filter(|v| v.is_finite()),
            liquor_ratio: batch.liquor_ratio.filter(|v| v.is_finite()),
            duration_min: batch.duration_min,
        });

        if batch.quality_result.as_deref() == Some("fail") {
            meta.anomaly_flags.push(AnomalyFlag::QualityFail);
        }
        if let Some(temp) = positive(batch.temperature) {
            if temp > HIGH_TEMPERATURE_C {
                meta.anomaly_flags.push(AnomalyFlag::HighTemperature);
            }
        }
        if let Some(ph) = positive(batch.ph_value) {
            if ph < PH_LOW || ph > PH_HIGH {
                meta.anomaly_flags.push(AnomalyFlag::ExtremePh);
            }
        }
    }

    /// 通用重量收得率
    fn enrich_yield(&self, batch: &ProductionBatch, meta: &mut MetadataBundle) {
        if let (Some(inp), Some(out)) = (positive(batch.input_weight), positive(batch.output_weight))
        {
            meta.yield_pct = Some(round2(out / inp * 100.0));
        }
    }

    /// 停机记录指标: 滚动30天机台健康摘要 + 停机频次标志
    ///
    /// 滚动聚合由仓储提供 (同机台 start_time ≥ 今-30天)
    pub fn compute_downtime(
        &self,
        record: &DowntimeRecord,
        window: DowntimeWindowStats,
    ) -> MetadataBundle {
        let mut meta = MetadataBundle::new(AI_VERSION, chrono::Local::now().naive_local());

        meta.machine_health = Some(MachineHealth {
            downtime_count_30d: window.count,
            downtime_total_min_30d: window.total_min,
        });

        if window.count > FREQUENT_DOWNTIME_COUNT_30D {
            meta.anomaly_flags.push(AnomalyFlag::FrequentDowntime);
        }
        if window.total_min > EXCESSIVE_DOWNTIME_MIN_30D {
            meta.anomaly_flags.push(AnomalyFlag::ExcessiveDowntime);
        }

        debug!(
            downtime_id = %record.downtime_id,
            machine_code = %record.machine_code,
            count_30d = window.count,
            total_min_30d = window.total_min,
            "停机指标重算完成"
        );
        meta
    }
}
