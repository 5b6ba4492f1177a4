// ==========================================
// 纺纱生产执行系统 - 谱系追溯 API
// ==========================================
// 职责: 谱系挂接与祖先链查询的对外入口
// 用例: "这批成品纱用了哪些原料批次" 全链路追溯
// ==========================================

use crate::config::LineageRules;
use crate::domain::lineage::{LineageEdge, LineageEntry, SourceRef};
use crate::engine::lineage::{LineageEngine, LineageWalker};
use crate::repository::{
    LineageEdgeRepository, ProductionBatchRepository, RepositoryResult,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct TraceApi {
    engine: LineageEngine,
}

impl TraceApi {
    pub fn new(engine: LineageEngine) -> Self {
        Self { engine }
    }

    /// 从共享连接组装 (默认规则表, 不启用重量追踪)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let batch_repo = Arc::new(ProductionBatchRepository::from_connection(Arc::clone(&conn))?);
        let lineage_repo = Arc::new(LineageEdgeRepository::from_connection(conn)?);
        Ok(Self::new(LineageEngine::new(batch_repo, lineage_repo)))
    }

    /// 从共享连接组装 (自定义规则 + 重量追踪开关)
    pub fn from_connection_with_rules(
        conn: Arc<Mutex<Connection>>,
        rules: LineageRules,
        enforce_weight: bool,
    ) -> RepositoryResult<Self> {
        let batch_repo = Arc::new(ProductionBatchRepository::from_connection(Arc::clone(&conn))?);
        let lineage_repo = Arc::new(LineageEdgeRepository::from_connection(conn)?);
        Ok(Self::new(
            LineageEngine::new(batch_repo, lineage_repo)
                .with_rules(rules)
                .with_weight_enforcement(enforce_weight),
        ))
    }

    /// 挂接一条喂入边
    pub fn attach_input(
        &self,
        downstream_batch_number: &str,
        position: i64,
        source: &SourceRef,
        weight_used: Option<f64>,
    ) -> RepositoryResult<LineageEdge> {
        self.engine
            .attach_input(downstream_batch_number, position, source, weight_used)
    }

    /// 解析祖先链 (惰性遍历, 最多 depth 跳)
    pub fn resolve_lineage(
        &self,
        batch_number: &str,
        depth: u32,
    ) -> RepositoryResult<LineageWalker> {
        self.engine.resolve_lineage(batch_number, depth)
    }

    /// 解析祖先链并收集为列表 (报表便捷入口)
    pub fn resolve_lineage_collected(
        &self,
        batch_number: &str,
        depth: u32,
    ) -> RepositoryResult<Vec<LineageEntry>> {
        self.engine
            .resolve_lineage(batch_number, depth)?
            .collect::<RepositoryResult<Vec<_>>>()
    }

    /// 列出某批次的直接喂入边
    pub fn list_inputs(&self, batch_number: &str) -> RepositoryResult<Vec<LineageEdge>> {
        self.engine.list_inputs(batch_number)
    }
}
