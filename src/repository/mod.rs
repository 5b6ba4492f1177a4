// ==========================================
// 纺纱生产执行系统 - 数据仓储层
// ==========================================
// 职责: 提供数据访问接口, 屏蔽数据库细节
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化, 防止 SQL 注入
// ==========================================

pub mod batch_repo;
pub mod downtime_repo;
pub mod error;
pub mod lineage_repo;
pub mod machine_repo;
pub mod sequence_repo;

// 重导出核心仓储
pub use batch_repo::{ProductionBatchRepository, SpinningDayStats};
pub use downtime_repo::DowntimeLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lineage_repo::LineageEdgeRepository;
pub use machine_repo::MachineRepository;
pub use sequence_repo::BatchSequenceRepository;
