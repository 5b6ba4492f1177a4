// ==========================================
// 纺纱生产执行系统 - API 层
// ==========================================
// 职责: 组装仓储与引擎, 暴露给上层调用方 (界面/HTTP, 本库范围外)
// 红线: API 只做组装与编排, 业务规则在引擎层
// ==========================================

pub mod analytics_api;
pub mod batch_api;
pub mod trace_api;

// 重导出核心 API
pub use analytics_api::AnalyticsApi;
pub use batch_api::BatchApi;
pub use trace_api::TraceApi;
