// ==========================================
// 纺纱生产执行系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 生产追溯与派生分析核心 (批次编号/批次谱系/工序指标/OEE/停机分析)
// 外围 (HTTP/界面/排班/报表导出) 由上层调用方负责
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 谱系规则与系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 历法边界 - 批次编号日期段 (波斯历) 唯一换算点
pub mod calendar;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AnomalyFlag, BatchStatus, DowntimeReason, MachineStatus, RiskLevel, Stage, TimeseriesMetric,
};

// 领域实体
pub use domain::{
    DowntimePattern, DowntimeRecord, FleetMachineHealth, LineageEdge, LineageEntry, Machine,
    MachineDailyOee, MetadataBundle, ProductionBatch, ReasonBreakdown, SourceRef, TimeseriesPoint,
    WeeklyTrendPoint,
};

// 引擎
pub use engine::{
    BatchNumberGenerator, DowntimePatternEngine, FleetHealthEngine, LineageEngine, MetricsEngine,
    OeeEngine,
};

// API
pub use api::{AnalyticsApi, BatchApi, TraceApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "纺纱生产执行系统";

// 派生指标算法版本 (写入 metadata.ai_version)
pub const AI_VERSION: &str = "1.0";
