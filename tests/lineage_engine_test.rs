// ==========================================
// 批次谱系引擎集成测试
// ==========================================
// 测试目标: 挂接校验 (喂入位/来源工序/道次/重量) 与祖先链遍历
// ==========================================

use chrono::NaiveDate;
use spinning_mes::config::{LineageRules, StageLineageRule};
use spinning_mes::db::open_sqlite_connection;
use spinning_mes::domain::batch::ProductionBatch;
use spinning_mes::domain::lineage::SourceRef;
use spinning_mes::domain::types::Stage;
use spinning_mes::engine::LineageEngine;
use spinning_mes::repository::{
    LineageEdgeRepository, ProductionBatchRepository, RepositoryError,
};
use std::sync::{Arc, Mutex};

// ==========================================
// 测试辅助函数
// ==========================================

struct TestCtx {
    batch_repo: Arc<ProductionBatchRepository>,
    lineage_repo: Arc<LineageEdgeRepository>,
}

impl TestCtx {
    fn new() -> Self {
        let conn = Arc::new(Mutex::new(
            open_sqlite_connection(":memory:").expect("打开内存库失败"),
        ));
        Self {
            batch_repo: Arc::new(
                ProductionBatchRepository::from_connection(Arc::clone(&conn))
                    .expect("建批次仓储失败"),
            ),
            lineage_repo: Arc::new(
                LineageEdgeRepository::from_connection(conn).expect("建谱系仓储失败"),
            ),
        }
    }

    fn engine(&self) -> LineageEngine {
        LineageEngine::new(Arc::clone(&self.batch_repo), Arc::clone(&self.lineage_repo))
    }

    /// 建一个批次 (显式编号)
    fn add_batch(&self, number: &str, stage: Stage) -> ProductionBatch {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let mut batch = ProductionBatch::new(stage, "M-01", "op1", "A", date);
        batch.batch_number = number.to_string();
        if stage == Stage::Passage {
            batch.passage_number = Some(1);
        }
        self.batch_repo.insert(&batch).expect("插入批次失败");
        batch
    }
}

fn src(stage: Stage, number: &str) -> SourceRef {
    SourceRef::new(stage, number)
}

// ==========================================
// 挂接校验
// ==========================================

#[test]
fn test_attach_multiple_inputs() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    for i in 1..=6 {
        ctx.add_batch(&format!("CR-040929-{:03}", i), Stage::Carding);
    }

    let engine = ctx.engine();
    for i in 1..=6i64 {
        let edge = engine
            .attach_input(
                "PS-040929-001",
                i,
                &src(Stage::Carding, &format!("CR-040929-{:03}", i)),
                Some(38.0),
            )
            .expect("挂接失败");
        assert_eq!(edge.input_position, i);
    }

    let inputs = engine.list_inputs("PS-040929-001").expect("查询失败");
    assert_eq!(inputs.len(), 6);
}

#[test]
fn test_attach_rejects_duplicate_position() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("CR-040929-001", Stage::Carding);
    ctx.add_batch("CR-040929-002", Stage::Carding);

    let engine = ctx.engine();
    engine
        .attach_input("PS-040929-001", 1, &src(Stage::Carding, "CR-040929-001"), None)
        .expect("首次挂接失败");

    let err = engine
        .attach_input("PS-040929-001", 1, &src(Stage::Carding, "CR-040929-002"), None)
        .expect_err("重复喂入位应被拒绝");
    assert!(matches!(err, RepositoryError::ValidationError(_)));

    // 拒绝后未落库
    assert_eq!(engine.list_inputs("PS-040929-001").expect("查询失败").len(), 1);
}

#[test]
fn test_attach_rejects_position_out_of_range() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("CR-040929-001", Stage::Carding);

    let engine = ctx.engine();

    // 上限 8: 第 9 位拒绝
    let err = engine
        .attach_input("PS-040929-001", 9, &src(Stage::Carding, "CR-040929-001"), None)
        .expect_err("越界喂入位应被拒绝");
    assert!(matches!(err, RepositoryError::FieldValueError { .. }));

    // 0 位拒绝
    let err = engine
        .attach_input("PS-040929-001", 0, &src(Stage::Carding, "CR-040929-001"), None)
        .expect_err("0 号喂入位应被拒绝");
    assert!(matches!(err, RepositoryError::FieldValueError { .. }));
}

#[test]
fn test_attach_rejects_disallowed_source_stage() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("SP-040929-001", Stage::Spinning);

    let engine = ctx.engine();
    let err = engine
        .attach_input("PS-040929-001", 1, &src(Stage::Spinning, "SP-040929-001"), None)
        .expect_err("细纱不能喂入并条");
    assert!(matches!(err, RepositoryError::ValidationError(_)));
}

#[test]
fn test_attach_rejects_self_reference() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);

    let engine = ctx.engine();
    let err = engine
        .attach_input("PS-040929-001", 1, &src(Stage::Passage, "PS-040929-001"), None)
        .expect_err("自引用应被拒绝");
    assert!(matches!(err, RepositoryError::ValidationError(_)));
}

#[test]
fn test_same_stage_requires_earlier_pass() {
    let ctx = TestCtx::new();
    // 二并批次
    let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
    let mut second_pass = ProductionBatch::new(Stage::Passage, "PS-02", "op1", "A", date);
    second_pass.batch_number = "PS-040929-010".to_string();
    second_pass.passage_number = Some(2);
    ctx.batch_repo.insert(&second_pass).expect("插入失败");

    // 头并批次 (passage_number = 1)
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("PS-040929-002", Stage::Passage);

    let engine = ctx.engine();

    // 二并 ← 头并: 允许
    engine
        .attach_input("PS-040929-010", 1, &src(Stage::Passage, "PS-040929-001"), None)
        .expect("二并喂头并应通过");

    // 头并 ← 头并: 道次不早, 拒绝
    let err = engine
        .attach_input("PS-040929-002", 1, &src(Stage::Passage, "PS-040929-001"), None)
        .expect_err("同道次互喂应被拒绝");
    assert!(matches!(err, RepositoryError::ValidationError(_)));
}

#[test]
fn test_attach_rejects_unknown_batches() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);

    let engine = ctx.engine();

    // 下游不存在
    let err = engine
        .attach_input("PS-049999-999", 1, &src(Stage::Carding, "CR-040929-001"), None)
        .expect_err("下游不存在应报 NotFound");
    assert!(matches!(err, RepositoryError::NotFound { .. }));

    // 来源不存在 (非原料工序要求存在)
    let err = engine
        .attach_input("PS-040929-001", 1, &src(Stage::Carding, "CR-049999-999"), None)
        .expect_err("来源不存在应报 NotFound");
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

#[test]
fn test_weight_enforcement() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("PS-040929-002", Stage::Passage);
    let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
    let mut source = ProductionBatch::new(Stage::Carding, "CR-01", "op1", "A", date);
    source.batch_number = "CR-040929-001".to_string();
    source.output_weight = Some(100.0);
    ctx.batch_repo.insert(&source).expect("插入失败");

    let engine = ctx.engine().with_weight_enforcement(true);

    engine
        .attach_input("PS-040929-001", 1, &src(Stage::Carding, "CR-040929-001"), Some(60.0))
        .expect("首笔消耗应通过");

    // 剩余 40kg, 再要 50kg 拒绝
    let err = engine
        .attach_input("PS-040929-002", 1, &src(Stage::Carding, "CR-040929-001"), Some(50.0))
        .expect_err("超量消耗应被拒绝");
    assert!(matches!(err, RepositoryError::FieldValueError { .. }));

    // 40kg 正好用完
    engine
        .attach_input("PS-040929-002", 1, &src(Stage::Carding, "CR-040929-001"), Some(40.0))
        .expect("余量内消耗应通过");
}

#[test]
fn test_custom_rules_cap_inputs() {
    let ctx = TestCtx::new();
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("CR-040929-001", Stage::Carding);

    let mut rules = LineageRules::default();
    rules.set_rule(Stage::Passage, StageLineageRule::new(6, vec![Stage::Carding]));

    let engine = ctx.engine().with_rules(rules);
    let err = engine
        .attach_input("PS-040929-001", 7, &src(Stage::Carding, "CR-040929-001"), None)
        .expect_err("6 喂配置下第 7 位应被拒绝");
    assert!(matches!(err, RepositoryError::FieldValueError { .. }));
}

// ==========================================
// 祖先链遍历
// ==========================================

#[test]
fn test_resolve_lineage_depth_walk() {
    let ctx = TestCtx::new();
    // 链: SP ← FN ← PS ← (CR ×2), CR-001 ← 原料 FB
    ctx.add_batch("SP-040929-001", Stage::Spinning);
    ctx.add_batch("FN-040929-001", Stage::Finisher);
    ctx.add_batch("PS-040929-001", Stage::Passage);
    ctx.add_batch("CR-040929-001", Stage::Carding);
    ctx.add_batch("CR-040929-002", Stage::Carding);
    ctx.add_batch("BL-040929-001", Stage::Blowroom);

    let engine = ctx.engine();
    engine
        .attach_input("SP-040929-001", 1, &src(Stage::Finisher, "FN-040929-001"), None)
        .expect("挂接失败");
    engine
        .attach_input("FN-040929-001", 1, &src(Stage::Passage, "PS-040929-001"), None)
        .expect("挂接失败");
    engine
        .attach_input("PS-040929-001", 1, &src(Stage::Carding, "CR-040929-001"), Some(40.0))
        .expect("挂接失败");
    engine
        .attach_input("PS-040929-001", 2, &src(Stage::Carding, "CR-040929-002"), Some(42.0))
        .expect("挂接失败");
    engine
        .attach_input("CR-040929-001", 1, &src(Stage::Blowroom, "BL-040929-001"), None)
        .expect("挂接失败");
    engine
        .attach_input("BL-040929-001", 1, &src(Stage::Fiber, "PES-040929-001"), Some(500.0))
        .expect("挂接原料失败");

    // 深度 2: 只到末并与并条
    let shallow: Vec<_> = engine
        .resolve_lineage("SP-040929-001", 2)
        .expect("遍历失败")
        .collect::<Result<Vec<_>, _>>()
        .expect("遍历出错");
    assert_eq!(shallow.len(), 2);
    assert_eq!(shallow[0].batch_number, "FN-040929-001");
    assert_eq!(shallow[0].depth, 1);
    assert_eq!(shallow[1].batch_number, "PS-040929-001");
    assert_eq!(shallow[1].depth, 2);

    // 深度 5: 全链到原料批次
    let full: Vec<_> = engine
        .resolve_lineage("SP-040929-001", 5)
        .expect("遍历失败")
        .collect::<Result<Vec<_>, _>>()
        .expect("遍历出错");
    assert_eq!(full.len(), 6);

    let fiber: Vec<_> = full
        .iter()
        .filter(|e| e.stage == Stage::Fiber)
        .collect();
    assert_eq!(fiber.len(), 1);
    assert_eq!(fiber[0].batch_number, "PES-040929-001");
    assert_eq!(fiber[0].depth, 5);

    // 深度 0: 空遍历
    let empty: Vec<_> = engine
        .resolve_lineage("SP-040929-001", 0)
        .expect("遍历失败")
        .collect();
    assert!(empty.is_empty());
}

#[test]
fn test_resolve_lineage_unknown_batch() {
    let ctx = TestCtx::new();
    let engine = ctx.engine();
    let err = engine
        .resolve_lineage("SP-049999-999", 3)
        .err()
        .expect("未知批次应报 NotFound");
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}
