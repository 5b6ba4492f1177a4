// ==========================================
// 纺纱生产执行系统 - 配置层
// ==========================================
// 职责: 谱系喂入规则表 + 默认数据库路径
// ==========================================

use crate::domain::types::Stage;
use std::collections::HashMap;

/// 单工序谱系喂入规则
#[derive(Debug, Clone)]
pub struct StageLineageRule {
    pub max_inputs: i64,              // 喂入位上限 (0 = 不接受喂入)
    pub allowed_sources: Vec<Stage>,  // 允许的上游工序标签
}

impl StageLineageRule {
    pub fn new(max_inputs: i64, allowed_sources: Vec<Stage>) -> Self {
        Self {
            max_inputs,
            allowed_sources,
        }
    }

    pub fn allows_source(&self, stage: Stage) -> bool {
        self.allowed_sources.contains(&stage)
    }
}

/// 谱系规则表 (按下游工序分派)
///
/// 合并工序 (清花/并条) 可挂多条入边; 并条既可喂梳棉条也可喂前道并条,
/// 同工序喂入要求来源道次严格小于下游道次
#[derive(Debug, Clone)]
pub struct LineageRules {
    rules: HashMap<Stage, StageLineageRule>,
}

impl Default for LineageRules {
    fn default() -> Self {
        let mut rules = HashMap::new();
        rules.insert(Stage::Fiber, StageLineageRule::new(0, vec![]));
        rules.insert(Stage::Blowroom, StageLineageRule::new(8, vec![Stage::Fiber]));
        rules.insert(Stage::Carding, StageLineageRule::new(1, vec![Stage::Blowroom]));
        rules.insert(
            Stage::Passage,
            StageLineageRule::new(8, vec![Stage::Carding, Stage::Passage]),
        );
        rules.insert(Stage::Finisher, StageLineageRule::new(1, vec![Stage::Passage]));
        rules.insert(Stage::Spinning, StageLineageRule::new(1, vec![Stage::Finisher]));
        rules.insert(Stage::Winding, StageLineageRule::new(1, vec![Stage::Spinning]));
        rules.insert(Stage::Tfo, StageLineageRule::new(1, vec![Stage::Winding]));
        rules.insert(Stage::HeatSet, StageLineageRule::new(1, vec![Stage::Tfo]));
        rules.insert(
            Stage::Dyeing,
            StageLineageRule::new(1, vec![Stage::HeatSet, Stage::Winding]),
        );
        Self { rules }
    }
}

impl LineageRules {
    /// 查某下游工序的规则 (未配置按不接受喂入处理)
    pub fn rule_for(&self, stage: Stage) -> StageLineageRule {
        self.rules
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| StageLineageRule::new(0, vec![]))
    }

    /// 覆写单工序规则 (工艺配置调整, 如并条 6 喂改 8 喂)
    pub fn set_rule(&mut self, stage: Stage, rule: StageLineageRule) {
        self.rules.insert(stage, rule);
    }
}

/// 默认数据库路径 (用户数据目录下 spinning-mes/mes.db)
pub fn get_default_db_path() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
    let dir = base.join("spinning-mes");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!("创建数据目录失败: {}", e);
    }
    dir.join("mes.db").to_string_lossy().to_string()
}
