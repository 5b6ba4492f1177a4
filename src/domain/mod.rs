// ==========================================
// 纺纱生产执行系统 - 领域层
// ==========================================
// 职责: 实体与类型定义, 不含数据访问与业务规则
// ==========================================

pub mod analytics;
pub mod batch;
pub mod downtime;
pub mod lineage;
pub mod machine;
pub mod metadata;
pub mod types;

// 重导出核心实体
pub use analytics::{
    DowntimePattern, FleetMachineHealth, MachineDailyOee, ReasonBreakdown, TimeseriesPoint,
    WeeklyTrendPoint,
};
pub use batch::ProductionBatch;
pub use downtime::DowntimeRecord;
pub use lineage::{LineageEdge, LineageEntry, SourceRef};
pub use machine::Machine;
pub use metadata::{MachineHealth, MetadataBundle, OeeSnapshot, ProcessParams, QualityMetrics};
