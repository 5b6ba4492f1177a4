// ==========================================
// 停机模式分析集成测试
// ==========================================
// 测试目标: MTBF/MTTR/风险等级/原因分布/周趋势 + 滚动30天健康标志
// ==========================================

use chrono::{Duration, NaiveDate, NaiveDateTime};
use spinning_mes::api::AnalyticsApi;
use spinning_mes::db::open_sqlite_connection;
use spinning_mes::domain::downtime::DowntimeRecord;
use spinning_mes::domain::machine::Machine;
use spinning_mes::domain::types::{AnomalyFlag, DowntimeReason, RiskLevel, Stage};
use spinning_mes::engine::{DowntimePatternEngine, MaintenanceEvent, MaintenanceEventPublisher};
use spinning_mes::repository::{DowntimeLogRepository, MachineRepository, RepositoryError};
use std::sync::{Arc, Mutex};

// ==========================================
// 测试辅助函数
// ==========================================

struct TestCtx {
    conn: Arc<Mutex<rusqlite::Connection>>,
    machine_repo: Arc<MachineRepository>,
    downtime_repo: Arc<DowntimeLogRepository>,
}

impl TestCtx {
    fn new() -> Self {
        let conn = Arc::new(Mutex::new(
            open_sqlite_connection(":memory:").expect("打开内存库失败"),
        ));
        let ctx = Self {
            machine_repo: Arc::new(
                MachineRepository::from_connection(Arc::clone(&conn)).expect("建机台仓储失败"),
            ),
            downtime_repo: Arc::new(
                DowntimeLogRepository::from_connection(Arc::clone(&conn))
                    .expect("建停机仓储失败"),
            ),
            conn,
        };
        ctx.machine_repo
            .upsert(&Machine::new("SP-01", "细纱机1号", Stage::Spinning))
            .expect("建机台失败");
        ctx
    }

    fn engine(&self) -> DowntimePatternEngine {
        DowntimePatternEngine::new(Arc::clone(&self.machine_repo), Arc::clone(&self.downtime_repo))
    }

    fn add_downtime(&self, start: NaiveDateTime, minutes: i64, reason: DowntimeReason) {
        let mut rec = DowntimeRecord::new("SP-01", "A", "op1", start, reason, "测试停机");
        rec.close(start + Duration::minutes(minutes));
        self.downtime_repo.insert(&rec).expect("插入停机失败");
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ==========================================
// MTBF / MTTR / 风险
// ==========================================

#[test]
fn test_analyze_mtbf_mttr() {
    let ctx = TestCtx::new();
    let today = d(2026, 8, 7);
    // 90 天窗口内 3 次停机, 共 180 分钟
    ctx.add_downtime(today.and_hms_opt(8, 0, 0).unwrap() - Duration::days(10), 90, DowntimeReason::Mechanical);
    ctx.add_downtime(today.and_hms_opt(8, 0, 0).unwrap() - Duration::days(40), 60, DowntimeReason::Electrical);
    ctx.add_downtime(today.and_hms_opt(8, 0, 0).unwrap() - Duration::days(70), 30, DowntimeReason::Electrical);
    // 窗口外的不计
    ctx.add_downtime(today.and_hms_opt(8, 0, 0).unwrap() - Duration::days(120), 999, DowntimeReason::Other);

    let pattern = ctx
        .engine()
        .analyze_as_of("SP-01", today, 90)
        .expect("分析失败");

    assert_eq!(pattern.period_days, 90);
    assert_eq!(pattern.total_failures, 3);
    // mtbf = 90×24/3 = 720h → low
    assert_eq!(pattern.mtbf_hours, 720.0);
    assert_eq!(pattern.mttr_minutes, 60.0);
    assert_eq!(pattern.risk_level, RiskLevel::Low);
}

#[test]
fn test_analyze_no_failures() {
    let ctx = TestCtx::new();
    let pattern = ctx
        .engine()
        .analyze_as_of("SP-01", d(2026, 8, 7), 90)
        .expect("分析失败");
    assert_eq!(pattern.total_failures, 0);
    // max(n,1) 防零除
    assert_eq!(pattern.mtbf_hours, 2160.0);
    assert_eq!(pattern.mttr_minutes, 0.0);
    assert_eq!(pattern.risk_level, RiskLevel::Low);
}

#[test]
fn test_analyze_critical_when_failures_dense() {
    let ctx = TestCtx::new();
    let today = d(2026, 8, 7);
    // 30 天窗口 16 次停机: mtbf = 720/16 = 45h < 48 → critical
    for i in 0..16 {
        ctx.add_downtime(
            today.and_hms_opt(6, 0, 0).unwrap() - Duration::days(i + 1),
            20,
            DowntimeReason::Mechanical,
        );
    }

    let pattern = ctx
        .engine()
        .analyze_as_of("SP-01", today, 30)
        .expect("分析失败");
    assert_eq!(pattern.total_failures, 16);
    assert_eq!(pattern.mtbf_hours, 45.0);
    assert_eq!(pattern.risk_level, RiskLevel::Critical);
}

#[test]
fn test_analyze_unknown_machine() {
    let ctx = TestCtx::new();
    let err = ctx
        .engine()
        .analyze_as_of("SP-99", d(2026, 8, 7), 30)
        .expect_err("未知机台应报 NotFound");
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

// ==========================================
// 原因分布与周趋势
// ==========================================

#[test]
fn test_by_reason_ordered_desc() {
    let ctx = TestCtx::new();
    let today = d(2026, 8, 7);
    let base = today.and_hms_opt(8, 0, 0).unwrap();
    ctx.add_downtime(base - Duration::days(1), 20, DowntimeReason::Electrical);
    ctx.add_downtime(base - Duration::days(2), 200, DowntimeReason::Mechanical);
    ctx.add_downtime(base - Duration::days(3), 30, DowntimeReason::Electrical);
    ctx.add_downtime(base - Duration::days(4), 10, DowntimeReason::Material);

    let pattern = ctx
        .engine()
        .analyze_as_of("SP-01", today, 30)
        .expect("分析失败");

    assert_eq!(pattern.by_reason.len(), 3);
    assert_eq!(pattern.by_reason[0].reason_category, DowntimeReason::Mechanical);
    assert_eq!(pattern.by_reason[0].total_min, 200);
    assert_eq!(pattern.by_reason[1].reason_category, DowntimeReason::Electrical);
    assert_eq!(pattern.by_reason[1].count, 2);
    assert_eq!(pattern.by_reason[1].total_min, 50);
    assert_eq!(pattern.by_reason[2].reason_category, DowntimeReason::Material);
}

#[test]
fn test_weekly_trend_buckets_oldest_first() {
    let ctx = TestCtx::new();
    let today = d(2026, 8, 7);
    let base = today.and_hms_opt(8, 0, 0).unwrap();
    // 最近一周 (week 0 桶: [today-7, today)) 2 次
    ctx.add_downtime(base - Duration::days(2), 15, DowntimeReason::Mechanical);
    ctx.add_downtime(base - Duration::days(5), 15, DowntimeReason::Mechanical);
    // 第三周前 (week 2 桶: [today-21, today-14)) 1 次
    ctx.add_downtime(base - Duration::days(16), 15, DowntimeReason::Mechanical);

    let pattern = ctx
        .engine()
        .analyze_as_of("SP-01", today, 28)
        .expect("分析失败");

    // 28 天 → 4 个周桶, 旧→新
    assert_eq!(pattern.weekly_trend.len(), 4);
    assert_eq!(pattern.weekly_trend[0].week_start, today - Duration::days(28));
    assert_eq!(pattern.weekly_trend[3].week_start, today - Duration::days(7));
    assert!(pattern.weekly_trend[0].week_start < pattern.weekly_trend[3].week_start);

    assert_eq!(pattern.weekly_trend[3].count, 2);
    assert_eq!(pattern.weekly_trend[1].count, 1);
    assert_eq!(pattern.weekly_trend[0].count, 0);
}

// ==========================================
// 滚动30天机台健康 (AnalyticsApi 编排)
// ==========================================

#[test]
fn test_frequent_downtime_flag_over_threshold() {
    let ctx = TestCtx::new();
    let api = AnalyticsApi::from_connection(Arc::clone(&ctx.conn)).expect("建API失败");
    let now = chrono::Local::now().naive_local();

    // 先记录 10 次历史停机, 第 11 次触发 FREQUENT_DOWNTIME
    for i in 0..10 {
        let rec = DowntimeRecord::new(
            "SP-01",
            "A",
            "op1",
            now - Duration::days(i + 1),
            DowntimeReason::Mechanical,
            "历史停机",
        );
        api.record_downtime(rec).expect("记录失败");
    }

    let mut last = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::hours(1),
        DowntimeReason::Mechanical,
        "第11次",
    );
    last.close(now);
    let last = api.record_downtime(last).expect("记录失败");

    let meta = last.metadata.expect("应有健康摘要");
    let health = meta.machine_health.as_ref().expect("应有机台健康");
    assert_eq!(health.downtime_count_30d, 11);
    assert!(meta.anomaly_flags.contains(&AnomalyFlag::FrequentDowntime));
}

#[test]
fn test_frequent_downtime_flag_under_threshold() {
    let ctx = TestCtx::new();
    let api = AnalyticsApi::from_connection(Arc::clone(&ctx.conn)).expect("建API失败");
    let now = chrono::Local::now().naive_local();

    for i in 0..8 {
        let rec = DowntimeRecord::new(
            "SP-01",
            "A",
            "op1",
            now - Duration::days(i + 1),
            DowntimeReason::Mechanical,
            "历史停机",
        );
        api.record_downtime(rec).expect("记录失败");
    }

    let ninth = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::hours(1),
        DowntimeReason::Mechanical,
        "第9次",
    );
    let ninth = api.record_downtime(ninth).expect("记录失败");

    let meta = ninth.metadata.expect("应有健康摘要");
    assert_eq!(
        meta.machine_health.as_ref().map(|h| h.downtime_count_30d),
        Some(9)
    );
    assert!(!meta.anomaly_flags.contains(&AnomalyFlag::FrequentDowntime));
}

#[test]
fn test_excessive_downtime_flag() {
    let ctx = TestCtx::new();
    let api = AnalyticsApi::from_connection(Arc::clone(&ctx.conn)).expect("建API失败");
    let now = chrono::Local::now().naive_local();

    let mut long_stop = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::minutes(600),
        DowntimeReason::Mechanical,
        "大修",
    );
    long_stop.close(now - Duration::minutes(60)); // 540 分钟 > 500
    let rec = api.record_downtime(long_stop).expect("记录失败");

    let meta = rec.metadata.expect("应有健康摘要");
    assert_eq!(
        meta.machine_health.as_ref().map(|h| h.downtime_total_min_30d),
        Some(540)
    );
    assert!(meta.anomaly_flags.contains(&AnomalyFlag::ExcessiveDowntime));
}

// ==========================================
// 严重停机 → 维修事件
// ==========================================

struct CapturingPublisher {
    events: Mutex<Vec<MaintenanceEvent>>,
}

impl MaintenanceEventPublisher for CapturingPublisher {
    fn publish(&self, event: &MaintenanceEvent) -> Result<(), Box<dyn std::error::Error>> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[test]
fn test_severe_downtime_publishes_work_order_event() {
    let ctx = TestCtx::new();
    let publisher = Arc::new(CapturingPublisher {
        events: Mutex::new(Vec::new()),
    });
    let api = AnalyticsApi::from_connection(Arc::clone(&ctx.conn))
        .expect("建API失败")
        .with_publisher(Arc::clone(&publisher) as Arc<dyn MaintenanceEventPublisher>);
    let now = chrono::Local::now().naive_local();

    // 180 分钟机械停机: 触发工单申请
    let mut severe = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::minutes(180),
        DowntimeReason::Mechanical,
        "主电机烧毁",
    );
    severe.close(now);
    let severe = api.record_downtime(severe).expect("记录失败");

    // 30 分钟短停: 不触发
    let mut minor = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::minutes(30),
        DowntimeReason::Operator,
        "换纱",
    );
    minor.close(now);
    api.record_downtime(minor).expect("记录失败");

    // 计划停机不触发
    let mut planned = DowntimeRecord::new(
        "SP-01",
        "A",
        "op1",
        now - Duration::minutes(480),
        DowntimeReason::Planned,
        "计划检修",
    );
    planned.close(now);
    api.record_downtime(planned).expect("记录失败");

    let events = publisher.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].machine_code, "SP-01");
    assert_eq!(events[0].downtime_id, severe.downtime_id);
    assert_eq!(events[0].duration_min, Some(180));
}
