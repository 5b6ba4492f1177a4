// ==========================================
// 纺纱生产执行系统 - 分析 API
// ==========================================
// 职责: OEE/停机分析/机队健康的对外入口 + 停机记录编排
// 说明: 分析全部只读; 停机记录写入后重算滚动健康摘要,
//       严重停机发布工单申请事件 (发布失败只告警, 不阻断记录)
// ==========================================

use crate::domain::analytics::{
    DowntimePattern, FleetMachineHealth, MachineDailyOee, TimeseriesPoint,
};
use crate::domain::downtime::DowntimeRecord;
use crate::domain::types::TimeseriesMetric;
use crate::engine::downtime_pattern::DowntimePatternEngine;
use crate::engine::events::{
    should_request_work_order, MaintenanceEvent, MaintenanceEventPublisher, NoOpEventPublisher,
};
use crate::engine::fleet_health::FleetHealthEngine;
use crate::engine::metrics::MetricsEngine;
use crate::engine::oee::{OeeEngine, OeeRangeIter};
use crate::repository::{
    DowntimeLogRepository, MachineRepository, ProductionBatchRepository, RepositoryError,
    RepositoryResult,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 机台健康滚动窗口 (天)
const HEALTH_WINDOW_DAYS: i64 = 30;

pub struct AnalyticsApi {
    downtime_repo: Arc<DowntimeLogRepository>,
    oee_engine: OeeEngine,
    pattern_engine: DowntimePatternEngine,
    fleet_engine: FleetHealthEngine,
    metrics: MetricsEngine,
    publisher: Arc<dyn MaintenanceEventPublisher>,
}

impl AnalyticsApi {
    /// 从共享连接组装 (空事件发布器)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let machine_repo = Arc::new(MachineRepository::from_connection(Arc::clone(&conn))?);
        let batch_repo = Arc::new(ProductionBatchRepository::from_connection(Arc::clone(&conn))?);
        let downtime_repo = Arc::new(DowntimeLogRepository::from_connection(conn)?);

        let oee_engine = OeeEngine::new(
            Arc::clone(&machine_repo),
            Arc::clone(&batch_repo),
            Arc::clone(&downtime_repo),
        );
        let pattern_engine =
            DowntimePatternEngine::new(Arc::clone(&machine_repo), Arc::clone(&downtime_repo));
        let fleet_engine = FleetHealthEngine::new(
            Arc::clone(&machine_repo),
            OeeEngine::new(
                Arc::clone(&machine_repo),
                Arc::clone(&batch_repo),
                Arc::clone(&downtime_repo),
            ),
            DowntimePatternEngine::new(Arc::clone(&machine_repo), Arc::clone(&downtime_repo)),
        );

        Ok(Self {
            downtime_repo,
            oee_engine,
            pattern_engine,
            fleet_engine,
            metrics: MetricsEngine::new(),
            publisher: Arc::new(NoOpEventPublisher),
        })
    }

    /// 接入维修事件发布器
    pub fn with_publisher(mut self, publisher: Arc<dyn MaintenanceEventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    // ==========================================
    // 停机记录编排
    // ==========================================

    /// 记录停机 (落库 + 滚动健康摘要 + 严重停机事件)
    pub fn record_downtime(&self, record: DowntimeRecord) -> RepositoryResult<DowntimeRecord> {
        self.downtime_repo.insert(&record)?;
        info!(
            downtime_id = %record.downtime_id,
            machine_code = %record.machine_code,
            reason = %record.reason_category,
            "停机记录已建档"
        );
        self.refresh_downtime_metadata(record)
    }

    /// 闭合停机记录
    pub fn close_downtime(
        &self,
        downtime_id: &str,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<DowntimeRecord> {
        let mut record = self
            .downtime_repo
            .find_by_id(downtime_id)?
            .ok_or_else(|| RepositoryError::not_found("DowntimeRecord", downtime_id))?;

        record.close(end_time);
        self.downtime_repo.close(
            downtime_id,
            end_time,
            record.duration_min.unwrap_or(0),
        )?;
        self.refresh_downtime_metadata(record)
    }

    /// 重算停机记录的滚动健康摘要并发布必要事件
    fn refresh_downtime_metadata(
        &self,
        mut record: DowntimeRecord,
    ) -> RepositoryResult<DowntimeRecord> {
        let since = chrono::Local::now().naive_local() - Duration::days(HEALTH_WINDOW_DAYS);
        let window = self
            .downtime_repo
            .window_stats_since(&record.machine_code, since)?;

        let bundle = self.metrics.compute_downtime(&record, window);
        self.downtime_repo
            .persist_metadata(&record.downtime_id, &bundle)?;
        record.metadata = Some(bundle);

        if should_request_work_order(&record) {
            let event = MaintenanceEvent::work_order_requested(&record);
            if let Err(e) = self.publisher.publish(&event) {
                warn!(
                    downtime_id = %record.downtime_id,
                    error = %e,
                    "维修事件发布失败, 停机记录不受影响"
                );
            }
        }

        Ok(record)
    }

    // ==========================================
    // 只读分析
    // ==========================================

    /// 某机台某日 OEE
    pub fn compute_oee(
        &self,
        machine_code: &str,
        date: NaiveDate,
    ) -> RepositoryResult<MachineDailyOee> {
        self.oee_engine.compute_oee(machine_code, date)
    }

    /// 近 days 日 OEE 序列 (惰性, 旧→新)
    pub fn compute_oee_range(
        &self,
        machine_code: &str,
        days: i64,
    ) -> RepositoryResult<OeeRangeIter<'_>> {
        self.oee_engine.compute_oee_range(machine_code, days)
    }

    /// 时序数据 (指标键走白名单, 未知键回退产量)
    pub fn compute_timeseries(
        &self,
        machine_code: &str,
        days: i64,
        metric_key: &str,
    ) -> RepositoryResult<Vec<TimeseriesPoint>> {
        let metric = TimeseriesMetric::from_key_or_default(metric_key);
        self.oee_engine
            .compute_timeseries(machine_code, days, metric)
    }

    /// 停机模式分析
    pub fn analyze_downtime(
        &self,
        machine_code: &str,
        days: i64,
    ) -> RepositoryResult<DowntimePattern> {
        self.pattern_engine.analyze(machine_code, days)
    }

    /// 机队健康排名 (可选生产线过滤)
    pub fn fleet_health(
        &self,
        line_code: Option<&str>,
    ) -> RepositoryResult<Vec<FleetMachineHealth>> {
        self.fleet_engine.fleet_health(line_code)
    }
}
