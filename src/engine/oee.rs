// ==========================================
// 纺纱生产执行系统 - OEE 引擎
// ==========================================
// OEE = Availability × Performance × Quality
// Availability = (计划时间 - 停机) / 计划时间
// Performance  = 当日完成细纱批次效率均值
// Quality      = 100 - 千锭断头率 (每 1断头/千锭 扣 1%), 截断在 [0,100]
// 只读计算, 无副作用, 可并发执行
// ==========================================

use crate::domain::analytics::{MachineDailyOee, TimeseriesPoint};
use crate::domain::types::TimeseriesMetric;
use crate::repository::{
    DowntimeLogRepository, MachineRepository, ProductionBatchRepository, RepositoryResult,
};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::debug;

/// 计划生产时间: 一个8小时班次 (分钟)
pub const PLANNED_MINUTES: i64 = 480;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub struct OeeEngine {
    machine_repo: Arc<MachineRepository>,
    batch_repo: Arc<ProductionBatchRepository>,
    downtime_repo: Arc<DowntimeLogRepository>,
}

impl OeeEngine {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        batch_repo: Arc<ProductionBatchRepository>,
        downtime_repo: Arc<DowntimeLogRepository>,
    ) -> Self {
        Self {
            machine_repo,
            batch_repo,
            downtime_repo,
        }
    }

    /// 计算某机台某日 OEE
    ///
    /// # 返回
    /// MachineDailyOee; 机台不存在返回 NotFound
    /// 单批脏数据只会使对应指标退化为 0, 不会使整体计算失败
    pub fn compute_oee(
        &self,
        machine_code: &str,
        date: NaiveDate,
    ) -> RepositoryResult<MachineDailyOee> {
        self.machine_repo.get_by_code(machine_code)?;

        // 1. 可用率
        let downtime_min = self.downtime_repo.sum_duration_on_date(machine_code, date)?;
        let availability =
            ((PLANNED_MINUTES - downtime_min) as f64 / PLANNED_MINUTES as f64 * 100.0).max(0.0);

        // 2. 表现率 (完成批次效率均值)
        let stats = self.batch_repo.spinning_day_stats(machine_code, date)?;
        let performance = stats.avg_efficiency.unwrap_or(0.0);

        // 3. 质量率 (按千锭断头率折算)
        let total_spindles = stats.total_spindles.max(1);
        let breakage_rate = stats.total_breakage as f64 / total_spindles as f64 * 1000.0;
        let quality = (100.0 - breakage_rate).clamp(0.0, 100.0);

        let oee = availability * performance * quality / 10000.0;

        debug!(
            machine_code,
            %date,
            downtime_min,
            oee = round2(oee),
            "OEE 计算完成"
        );

        Ok(MachineDailyOee {
            machine_code: machine_code.to_string(),
            date,
            availability: round2(availability),
            performance: round2(performance),
            quality: round2(quality),
            oee: round2(oee),
            downtime_min,
            breakage_rate_per_1000: round1(breakage_rate),
            batch_count: stats.batch_count,
        })
    }

    /// 计算截至今日的近 days 日 OEE 序列 (惰性, 旧→新)
    pub fn compute_oee_range(
        &self,
        machine_code: &str,
        days: i64,
    ) -> RepositoryResult<OeeRangeIter<'_>> {
        self.compute_oee_range_ending(machine_code, chrono::Local::now().date_naive(), days)
    }

    /// 计算截至 end_date 的近 days 日 OEE 序列 (惰性, 旧→新)
    ///
    /// 按需逐日计算, 消费后不可重放
    pub fn compute_oee_range_ending(
        &self,
        machine_code: &str,
        end_date: NaiveDate,
        days: i64,
    ) -> RepositoryResult<OeeRangeIter<'_>> {
        // 机台存在性只查一次
        self.machine_repo.get_by_code(machine_code)?;
        Ok(OeeRangeIter {
            engine: self,
            machine_code: machine_code.to_string(),
            end_date,
            days: days.max(0),
            offset: 0,
        })
    }

    /// 时序数据 (白名单指标, 仅完成细纱批次, 旧→新)
    pub fn compute_timeseries(
        &self,
        machine_code: &str,
        days: i64,
        metric: TimeseriesMetric,
    ) -> RepositoryResult<Vec<TimeseriesPoint>> {
        self.compute_timeseries_ending(
            machine_code,
            chrono::Local::now().date_naive(),
            days,
            metric,
        )
    }

    /// 时序数据 (显式截止日)
    pub fn compute_timeseries_ending(
        &self,
        machine_code: &str,
        end_date: NaiveDate,
        days: i64,
        metric: TimeseriesMetric,
    ) -> RepositoryResult<Vec<TimeseriesPoint>> {
        self.machine_repo.get_by_code(machine_code)?;
        let since = end_date - Duration::days(days.max(0));
        self.batch_repo.timeseries_rows(machine_code, since, metric)
    }
}

/// 逐日 OEE 惰性迭代器 (旧→新)
pub struct OeeRangeIter<'a> {
    engine: &'a OeeEngine,
    machine_code: String,
    end_date: NaiveDate,
    days: i64,
    offset: i64,
}

impl Iterator for OeeRangeIter<'_> {
    type Item = RepositoryResult<MachineDailyOee>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.days {
            return None;
        }
        // 最旧的日期先产出
        let date = self.end_date - Duration::days(self.days - 1 - self.offset);
        self.offset += 1;
        Some(self.engine.compute_oee(&self.machine_code, date))
    }
}
