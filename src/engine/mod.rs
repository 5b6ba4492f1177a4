// ==========================================
// 纺纱生产执行系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎, 不拼 SQL
// 红线: Engine 不拼 SQL, 聚合查询由仓储层提供
// ==========================================

pub mod batch_number;
pub mod downtime_pattern;
pub mod events;
pub mod fleet_health;
pub mod lineage;
pub mod metrics;
pub mod oee;

// 重导出核心引擎
pub use batch_number::{fiber_prefix_from_category, BatchNumberGenerator};
pub use downtime_pattern::DowntimePatternEngine;
pub use events::{
    should_request_work_order, MaintenanceEvent, MaintenanceEventPublisher, MaintenanceEventType,
    NoOpEventPublisher,
};
pub use fleet_health::FleetHealthEngine;
pub use lineage::{LineageEngine, LineageWalker};
pub use metrics::MetricsEngine;
pub use oee::{OeeEngine, OeeRangeIter, PLANNED_MINUTES};
