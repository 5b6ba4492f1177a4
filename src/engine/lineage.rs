// ==========================================
// 纺纱生产执行系统 - 批次谱系引擎
// ==========================================
// 职责: 谱系挂接校验 + 祖先链惰性遍历
// 校验口径 (任一不过即拒绝, 不落库):
// - 喂入位在 [1, max_inputs] 且未占用
// - 来源工序在下游工序的允许集内 (规则表按工序标签分派)
// - 禁止自引用; 同工序喂入要求来源道次严格小于下游道次
// - 启用重量追踪时, weight_used 不得超过来源批次剩余可用重量
// ==========================================

use crate::config::LineageRules;
use crate::domain::lineage::{LineageEdge, LineageEntry, SourceRef};
use crate::domain::types::Stage;
use crate::repository::{
    LineageEdgeRepository, ProductionBatchRepository, RepositoryError, RepositoryResult,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

/// 重量比较容差 (kg)
const WEIGHT_EPSILON: f64 = 1e-6;

pub struct LineageEngine {
    batch_repo: Arc<ProductionBatchRepository>,
    lineage_repo: Arc<LineageEdgeRepository>,
    rules: LineageRules,
    enforce_weight: bool,
}

impl LineageEngine {
    pub fn new(
        batch_repo: Arc<ProductionBatchRepository>,
        lineage_repo: Arc<LineageEdgeRepository>,
    ) -> Self {
        Self {
            batch_repo,
            lineage_repo,
            rules: LineageRules::default(),
            enforce_weight: false,
        }
    }

    /// 覆写规则表 (工艺配置)
    pub fn with_rules(mut self, rules: LineageRules) -> Self {
        self.rules = rules;
        self
    }

    /// 启用来源重量追踪校验
    pub fn with_weight_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_weight = enforce;
        self
    }

    /// 挂接一条喂入边
    ///
    /// # 返回
    /// 校验通过并落库的谱系边; 任一校验失败返回 ValidationError, 不落库
    pub fn attach_input(
        &self,
        downstream_batch_number: &str,
        position: i64,
        source: &SourceRef,
        weight_used: Option<f64>,
    ) -> RepositoryResult<LineageEdge> {
        let downstream = self.batch_repo.get_by_batch_number(downstream_batch_number)?;
        let rule = self.rules.rule_for(downstream.stage);

        if rule.max_inputs == 0 {
            return Err(RepositoryError::ValidationError(format!(
                "工序 {} 不接受谱系喂入",
                downstream.stage
            )));
        }
        if position < 1 || position > rule.max_inputs {
            return Err(RepositoryError::FieldValueError {
                field: "input_position".to_string(),
                message: format!("喂入位 {} 超出范围 [1, {}]", position, rule.max_inputs),
            });
        }
        if !rule.allows_source(source.stage) {
            return Err(RepositoryError::ValidationError(format!(
                "工序 {} 不允许来源工序 {}",
                downstream.stage, source.stage
            )));
        }
        if source.batch_number == downstream.batch_number {
            return Err(RepositoryError::ValidationError(format!(
                "批次 {} 不能喂入自身",
                downstream.batch_number
            )));
        }

        // 原料批次由库存协作方管理, 不做存在性校验
        if source.stage != Stage::Fiber {
            let source_batch = self.batch_repo.get_by_batch_number(&source.batch_number)?;

            // 同工序喂入: 来源道次必须严格早于下游道次 (保证无环)
            if source.stage == downstream.stage {
                let src_pass = source_batch.passage_number.unwrap_or(1);
                let dst_pass = downstream.passage_number.unwrap_or(1);
                if src_pass >= dst_pass {
                    return Err(RepositoryError::ValidationError(format!(
                        "同工序喂入要求来源道次小于下游道次: {} >= {}",
                        src_pass, dst_pass
                    )));
                }
            }

            // 重量追踪: 已消耗 + 本次 ≤ 来源产出
            if self.enforce_weight {
                if let (Some(w), Some(out)) = (weight_used, source_batch.output_weight) {
                    let drawn = self.lineage_repo.sum_weight_drawn(&source.batch_number)?;
                    if drawn + w > out + WEIGHT_EPSILON {
                        return Err(RepositoryError::FieldValueError {
                            field: "weight_used".to_string(),
                            message: format!(
                                "来源批次 {} 剩余重量不足: 产出 {:.3}kg, 已耗 {:.3}kg, 本次 {:.3}kg",
                                source.batch_number, out, drawn, w
                            ),
                        });
                    }
                }
            }
        }

        // 占位预检 (并发竞态由 UNIQUE(batch_number, input_position) 兜底)
        if self
            .lineage_repo
            .position_occupied(downstream_batch_number, position)?
        {
            return Err(RepositoryError::ValidationError(format!(
                "批次 {} 喂入位 {} 已占用",
                downstream_batch_number, position
            )));
        }

        let edge = LineageEdge::new(downstream_batch_number, position, source, weight_used);
        match self.lineage_repo.insert(&edge) {
            Ok(()) => {
                debug!(
                    batch = %downstream_batch_number,
                    position,
                    source = %source.batch_number,
                    "谱系边挂接成功"
                );
                Ok(edge)
            }
            // 竞态下后到者: 统一以校验错误口径返回
            Err(e) if e.is_unique_violation() => {
                warn!(
                    batch = %downstream_batch_number,
                    position,
                    "并发挂接冲突, 喂入位已被占用"
                );
                Err(RepositoryError::ValidationError(format!(
                    "批次 {} 喂入位 {} 已占用",
                    downstream_batch_number, position
                )))
            }
            Err(e) => Err(e),
        }
    }

    /// 解析祖先链 (惰性遍历, 最多 depth 跳)
    ///
    /// 广度优先, 按需取边; 迭代器消费后不可重放。
    /// 挂接校验已保证无环, 遍历另持已访问集兜底历史脏数据
    pub fn resolve_lineage(
        &self,
        batch_number: &str,
        depth: u32,
    ) -> RepositoryResult<LineageWalker> {
        // 起点必须存在
        self.batch_repo.get_by_batch_number(batch_number)?;

        let mut visited = HashSet::new();
        visited.insert(batch_number.to_string());

        let mut queue = VecDeque::new();
        if depth > 0 {
            for edge in self.lineage_repo.list_inputs(batch_number)? {
                queue.push_back((edge, 1u32));
            }
        }

        Ok(LineageWalker {
            lineage_repo: Arc::clone(&self.lineage_repo),
            queue,
            visited,
            max_depth: depth,
            failed: false,
        })
    }

    /// 列出某批次的直接喂入边
    pub fn list_inputs(&self, batch_number: &str) -> RepositoryResult<Vec<LineageEdge>> {
        self.lineage_repo.list_inputs(batch_number)
    }
}

/// 祖先链惰性遍历器
///
/// 每次 next() 产出一个祖先条目, 必要时再向仓储取下一层入边
pub struct LineageWalker {
    lineage_repo: Arc<LineageEdgeRepository>,
    queue: VecDeque<(LineageEdge, u32)>,
    visited: HashSet<String>,
    max_depth: u32,
    failed: bool,
}

impl Iterator for LineageWalker {
    type Item = RepositoryResult<LineageEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (edge, edge_depth) = self.queue.pop_front()?;

        // 向下一层展开 (已访问的祖先不重复展开, 终止脏数据成环)
        if edge_depth < self.max_depth && !self.visited.contains(&edge.source_batch_number) {
            self.visited.insert(edge.source_batch_number.clone());
            match self.lineage_repo.list_inputs(&edge.source_batch_number) {
                Ok(edges) => {
                    for upstream in edges {
                        self.queue.push_back((upstream, edge_depth + 1));
                    }
                }
                Err(e) => {
                    self.failed = true;
                    self.queue.clear();
                    return Some(Err(e));
                }
            }
        }

        Some(Ok(LineageEntry {
            batch_number: edge.source_batch_number,
            stage: edge.source_stage,
            depth: edge_depth,
            input_position: edge.input_position,
            weight_used: edge.weight_used,
        }))
    }
}
