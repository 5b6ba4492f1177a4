// ==========================================
// 纺纱生产执行系统 - 机队健康聚合引擎
// ==========================================
// 职责: 全厂/单线机台健康排名 (今日OEE + 30天停机风险)
// 排序: 风险等级优先 (critical → high → medium → low), 同级按机台代码
// 退化: 单机数据异常不阻断整体报表, 对应指标退化为 0/低风险
// ==========================================

use crate::domain::analytics::FleetMachineHealth;
use crate::domain::types::RiskLevel;
use crate::engine::downtime_pattern::DowntimePatternEngine;
use crate::engine::oee::OeeEngine;
use crate::repository::{MachineRepository, RepositoryResult};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

/// 停机风险回看窗口 (天)
const RISK_WINDOW_DAYS: i64 = 30;

pub struct FleetHealthEngine {
    machine_repo: Arc<MachineRepository>,
    oee_engine: OeeEngine,
    pattern_engine: DowntimePatternEngine,
}

impl FleetHealthEngine {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        oee_engine: OeeEngine,
        pattern_engine: DowntimePatternEngine,
    ) -> Self {
        Self {
            machine_repo,
            oee_engine,
            pattern_engine,
        }
    }

    /// 今日机队健康排名 (可选生产线过滤)
    pub fn fleet_health(
        &self,
        line_code: Option<&str>,
    ) -> RepositoryResult<Vec<FleetMachineHealth>> {
        self.fleet_health_as_of(line_code, chrono::Local::now().date_naive())
    }

    /// 指定日期的机队健康排名
    pub fn fleet_health_as_of(
        &self,
        line_code: Option<&str>,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<FleetMachineHealth>> {
        let machines = self.machine_repo.list_active(line_code)?;

        let mut results = Vec::with_capacity(machines.len());
        for machine in machines {
            let (oee_today, availability) = match self.oee_engine.compute_oee(&machine.code, today)
            {
                Ok(oee) => (oee.oee, oee.availability),
                Err(e) => {
                    warn!(machine_code = %machine.code, error = %e, "OEE 计算退化为 0");
                    (0.0, 0.0)
                }
            };

            let (risk_level, mtbf_hours, failures_30d) = match self
                .pattern_engine
                .analyze_as_of(&machine.code, today, RISK_WINDOW_DAYS)
            {
                Ok(pattern) => (
                    pattern.risk_level,
                    pattern.mtbf_hours,
                    pattern.total_failures,
                ),
                Err(e) => {
                    warn!(machine_code = %machine.code, error = %e, "停机分析退化为低风险");
                    (RiskLevel::Low, (RISK_WINDOW_DAYS * 24) as f64, 0)
                }
            };

            results.push(FleetMachineHealth {
                machine_code: machine.code,
                name: machine.name,
                stage: machine.stage,
                line_code: machine.line_code,
                oee_today,
                availability,
                risk_level,
                mtbf_hours,
                failures_30d,
            });
        }

        // 风险等级优先, 同级按机台代码
        results.sort_by(|a, b| {
            a.risk_level
                .rank()
                .cmp(&b.risk_level.rank())
                .then_with(|| a.machine_code.cmp(&b.machine_code))
        });

        Ok(results)
    }
}
