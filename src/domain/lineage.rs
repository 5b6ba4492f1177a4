// ==========================================
// 纺纱生产执行系统 - 批次谱系实体
// ==========================================
// 说明: 谱系边记录下游批次与其上游来源批次的喂入关系
//       并条等合并工序一个下游批次可挂 6-8 条入边 (按喂入位)
//       单来源工序 (梳棉/细纱等) 只挂 1 条入边
// 来源引用为"工序标签 + 批次ID"的标签对, 而非按工序分表的强类型外键:
//       同一合并工序可能喂入梳棉条或前道并条, 标签在校验时查规则表分派
// ==========================================

use crate::domain::types::Stage;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 来源引用 (标签对)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub stage: Stage,         // 来源工序标签
    pub batch_number: String, // 来源批次编号
}

impl SourceRef {
    pub fn new(stage: Stage, batch_number: &str) -> Self {
        Self {
            stage,
            batch_number: batch_number.to_string(),
        }
    }
}

/// 谱系边
///
/// (batch_number, input_position) 唯一, 并发挂接同位冲突由数据库约束串行化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEdge {
    pub edge_id: String,             // 边ID (UUID)
    pub batch_number: String,        // 下游批次编号
    pub input_position: i64,         // 喂入位 (1..=max_inputs)
    pub source_stage: Stage,         // 来源工序标签
    pub source_batch_number: String, // 来源批次编号 (冗余副本, 报表免JOIN)
    pub weight_used: Option<f64>,    // 消耗重量 (kg)
    pub created_at: NaiveDateTime,   // 记录时间
}

impl LineageEdge {
    pub fn new(
        batch_number: &str,
        input_position: i64,
        source: &SourceRef,
        weight_used: Option<f64>,
    ) -> Self {
        Self {
            edge_id: Uuid::new_v4().to_string(),
            batch_number: batch_number.to_string(),
            input_position,
            source_stage: source.stage,
            source_batch_number: source.batch_number.clone(),
            weight_used,
            created_at: chrono::Local::now().naive_local(),
        }
    }
}

/// 谱系遍历条目 (resolve_lineage 输出)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEntry {
    pub batch_number: String,        // 祖先批次编号
    pub stage: Stage,                // 祖先工序
    pub depth: u32,                  // 距起点跳数 (1=直接上游)
    pub input_position: i64,         // 在其下游批次中的喂入位
    pub weight_used: Option<f64>,    // 消耗重量
}
