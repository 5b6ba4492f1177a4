// ==========================================
// 纺纱生产执行系统 - 机台实体
// ==========================================
// 说明: 机台台账 (机队健康排名与 NotFound 判定依赖)
// ==========================================

use crate::domain::types::{MachineStatus, Stage};
use serde::{Deserialize, Serialize};

/// 机台
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    pub code: String,              // 机台代码 (如 SP-01, 主键)
    pub name: String,              // 机台名称
    pub stage: Stage,              // 所属工序
    pub line_code: Option<String>, // 生产线
    pub status: MachineStatus,     // 状态
}

impl Machine {
    pub fn new(code: &str, name: &str, stage: Stage) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            stage,
            line_code: None,
            status: MachineStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MachineStatus::Active
    }
}
