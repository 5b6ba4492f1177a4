// ==========================================
// 纺纱生产执行系统 - 批次编号生成引擎
// ==========================================
// 编号标准: [前缀]-[波斯历YYMMDD]-[NNN]
// 示例:
//   BL-040929-001   清花批次
//   CR-040929-001   梳棉批次
//   PS-040929-003   当日第3个并条批次
//   SP-040929-001   细纱批次
//   PES-040929-001  涤纶原料入库批次
//   ORD-040929-007  订单号
//   WO-040929-003   维修工单号
// 并发: 序号来自 batch_sequence 原子计数器, 同桶并发不重号;
//       历史库首次使用某桶时按现存最大编号播种
// ==========================================

use crate::calendar;
use crate::repository::{BatchSequenceRepository, ProductionBatchRepository, RepositoryResult};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

/// 订单号前缀
pub const ORDER_PREFIX: &str = "ORD";

/// 维修工单号前缀
pub const WORKORDER_PREFIX: &str = "WO";

/// 原料类别代码 → 批次前缀 (未知类别回退 FB)
pub fn fiber_prefix_from_category(category_code: &str) -> &'static str {
    match category_code.to_ascii_uppercase().as_str() {
        "PES" => "PES", // 涤纶
        "ACR" => "ACR", // 腈纶
        "WOL" => "WOL", // 羊毛
        "VIS" => "VIS", // 粘胶
        "NYL" => "NYL", // 锦纶
        "COT" => "COT", // 棉
        _ => "FB",
    }
}

pub struct BatchNumberGenerator {
    batch_repo: Arc<ProductionBatchRepository>,
    seq_repo: Arc<BatchSequenceRepository>,
}

impl BatchNumberGenerator {
    pub fn new(
        batch_repo: Arc<ProductionBatchRepository>,
        seq_repo: Arc<BatchSequenceRepository>,
    ) -> Self {
        Self {
            batch_repo,
            seq_repo,
        }
    }

    /// 生成今日批次编号
    pub fn generate(&self, prefix: &str) -> RepositoryResult<String> {
        self.generate_for_date(prefix, chrono::Local::now().date_naive())
    }

    /// 生成指定日期的批次编号
    ///
    /// 同一 (prefix, 日期桶) 内序号严格递增且唯一, 从 1 开始
    pub fn generate_for_date(&self, prefix: &str, date: NaiveDate) -> RepositoryResult<String> {
        let bucket = calendar::bucket_short(date);

        // 首次使用该桶: 按现存最大编号播种计数器 (历史库兼容)
        if !self.seq_repo.has_bucket(prefix, &bucket)? {
            self.seed_from_existing(prefix, &bucket)?;
        }

        let n = self.seq_repo.next_number(prefix, &bucket)?;
        let number = format!("{}-{}-{:03}", prefix, bucket, n);
        debug!(prefix, bucket = %bucket, n, "生成批次编号 {}", number);
        Ok(number)
    }

    /// 按现存最大编号播种计数器
    ///
    /// 定宽零填充使字典序最大即数值最大; 末段解析失败按 0 处理
    /// (历史脏编号不阻断生成)
    fn seed_from_existing(&self, prefix: &str, bucket: &str) -> RepositoryResult<()> {
        let pattern = format!("{}-{}-", prefix, bucket);
        let seed = match self.batch_repo.max_batch_number_with_prefix(&pattern)? {
            Some(max) => parse_trailing_number(&max).unwrap_or(0),
            None => 0,
        };
        if seed > 0 {
            debug!(prefix, bucket, seed, "按历史编号播种计数器");
        }
        self.seq_repo.seed_if_absent(prefix, bucket, seed)
    }
}

/// 解析编号末段序号
fn parse_trailing_number(batch_number: &str) -> Option<i64> {
    batch_number.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trailing_number() {
        assert_eq!(parse_trailing_number("SP-040929-007"), Some(7));
        assert_eq!(parse_trailing_number("TFO-040929-123"), Some(123));
        assert_eq!(parse_trailing_number("SP-040929-abc"), None);
        assert_eq!(parse_trailing_number(""), None);
    }

    #[test]
    fn test_fiber_prefix_fallback() {
        assert_eq!(fiber_prefix_from_category("pes"), "PES");
        assert_eq!(fiber_prefix_from_category("WOL"), "WOL");
        assert_eq!(fiber_prefix_from_category("XYZ"), "FB");
    }
}
