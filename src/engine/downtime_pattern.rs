// ==========================================
// 纺纱生产执行系统 - 停机模式分析引擎
// ==========================================
// 职责: MTBF/MTTR/风险等级/周趋势/原因分布
// MTBF = 窗口小时数 / max(停机次数, 1)
// MTTR = 停机总分钟 / max(停机次数, 1)
// 只读计算, 无副作用, 可并发执行
// ==========================================

use crate::domain::analytics::{DowntimePattern, WeeklyTrendPoint};
use crate::domain::types::RiskLevel;
use crate::repository::{DowntimeLogRepository, MachineRepository, RepositoryResult};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::debug;

// 风险等级 MTBF 阈值 (小时)
const MTBF_CRITICAL_HOURS: f64 = 48.0;
const MTBF_HIGH_HOURS: f64 = 120.0;
const MTBF_MEDIUM_HOURS: f64 = 240.0;

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub struct DowntimePatternEngine {
    machine_repo: Arc<MachineRepository>,
    downtime_repo: Arc<DowntimeLogRepository>,
}

impl DowntimePatternEngine {
    pub fn new(
        machine_repo: Arc<MachineRepository>,
        downtime_repo: Arc<DowntimeLogRepository>,
    ) -> Self {
        Self {
            machine_repo,
            downtime_repo,
        }
    }

    /// MTBF → 风险等级
    pub fn risk_level_for_mtbf(mtbf_hours: f64) -> RiskLevel {
        if mtbf_hours < MTBF_CRITICAL_HOURS {
            RiskLevel::Critical
        } else if mtbf_hours < MTBF_HIGH_HOURS {
            RiskLevel::High
        } else if mtbf_hours < MTBF_MEDIUM_HOURS {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// 分析截至今日的近 days 天停机模式
    pub fn analyze(&self, machine_code: &str, days: i64) -> RepositoryResult<DowntimePattern> {
        self.analyze_as_of(machine_code, chrono::Local::now().date_naive(), days)
    }

    /// 分析截至 today 的近 days 天停机模式
    ///
    /// # 返回
    /// DowntimePattern; 机台不存在返回 NotFound
    pub fn analyze_as_of(
        &self,
        machine_code: &str,
        today: NaiveDate,
        days: i64,
    ) -> RepositoryResult<DowntimePattern> {
        self.machine_repo.get_by_code(machine_code)?;

        let days = days.max(1);
        let since = today - Duration::days(days);
        let since_midnight = since.and_hms_opt(0, 0, 0).unwrap_or_default();

        // 窗口总量
        let window = self
            .downtime_repo
            .window_stats_since(machine_code, since_midnight)?;
        let total_failures = window.count;

        let total_hours = (days * 24) as f64;
        let mtbf_hours = round1(total_hours / total_failures.max(1) as f64);
        let mttr_minutes = round1(window.total_min as f64 / total_failures.max(1) as f64);
        let risk_level = Self::risk_level_for_mtbf(mtbf_hours);

        // 原因分布 (总时长降序)
        let by_reason = self.downtime_repo.by_reason_since(machine_code, since)?;

        // 周趋势: 固定7天分桶回溯, 产出旧→新
        let mut weekly = Vec::new();
        for week in 0..(days / 7) {
            let w_start = today - Duration::days((week + 1) * 7);
            let w_end = today - Duration::days(week * 7);
            let count = self
                .downtime_repo
                .count_in_date_range(machine_code, w_start, w_end)?;
            weekly.push(WeeklyTrendPoint {
                week_start: w_start,
                count,
            });
        }
        weekly.reverse();

        debug!(
            machine_code,
            days,
            total_failures,
            mtbf_hours,
            risk = %risk_level,
            "停机模式分析完成"
        );

        Ok(DowntimePattern {
            machine_code: machine_code.to_string(),
            period_days: days,
            total_failures,
            mtbf_hours,
            mttr_minutes,
            risk_level,
            by_reason,
            weekly_trend: weekly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(47.0),
            RiskLevel::Critical
        );
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(48.0),
            RiskLevel::High
        );
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(119.0),
            RiskLevel::High
        );
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(120.0),
            RiskLevel::Medium
        );
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(239.0),
            RiskLevel::Medium
        );
        assert_eq!(
            DowntimePatternEngine::risk_level_for_mtbf(241.0),
            RiskLevel::Low
        );
    }
}
