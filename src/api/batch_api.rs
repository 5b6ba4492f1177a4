// ==========================================
// 纺纱生产执行系统 - 批次 API
// ==========================================
// 职责: 批次建档/提交/完工的编排
// 流程: 生成编号 → 落库 → 重算指标 → 窄更新写回
// 并发: 编号冲突时有限重试再生成 (唯一约束兜底), 耗尽才上抛
// ==========================================

use crate::domain::batch::ProductionBatch;
use crate::domain::metadata::MetadataBundle;
use crate::domain::types::BatchStatus;
use crate::engine::batch_number::BatchNumberGenerator;
use crate::engine::metrics::MetricsEngine;
use crate::repository::{
    BatchSequenceRepository, ProductionBatchRepository, RepositoryError, RepositoryResult,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 编号冲突重试上限
const MAX_GENERATE_RETRIES: usize = 3;

pub struct BatchApi {
    batch_repo: Arc<ProductionBatchRepository>,
    generator: BatchNumberGenerator,
    metrics: MetricsEngine,
}

impl BatchApi {
    pub fn new(
        batch_repo: Arc<ProductionBatchRepository>,
        seq_repo: Arc<BatchSequenceRepository>,
    ) -> Self {
        let generator = BatchNumberGenerator::new(Arc::clone(&batch_repo), seq_repo);
        Self {
            batch_repo,
            generator,
            metrics: MetricsEngine::new(),
        }
    }

    /// 从共享连接组装
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let batch_repo = Arc::new(ProductionBatchRepository::from_connection(Arc::clone(&conn))?);
        let seq_repo = Arc::new(BatchSequenceRepository::from_connection(conn)?);
        Ok(Self::new(batch_repo, seq_repo))
    }

    /// 生成一个批次编号 (不落批次, 供订单/工单等编号复用)
    pub fn generate_identifier(&self, prefix: &str) -> RepositoryResult<String> {
        self.generator.generate(prefix)
    }

    /// 建档新批次 (编号桶取今日)
    pub fn create_batch(&self, batch: ProductionBatch) -> RepositoryResult<ProductionBatch> {
        self.create_batch_for_date(batch, chrono::Local::now().date_naive())
    }

    /// 建档新批次 (显式编号桶日期)
    ///
    /// 编号插入冲突时重新生成再试, 至多 3 次
    pub fn create_batch_for_date(
        &self,
        mut batch: ProductionBatch,
        bucket_date: NaiveDate,
    ) -> RepositoryResult<ProductionBatch> {
        let prefix = batch.stage.prefix();
        let mut last_err: Option<RepositoryError> = None;

        for attempt in 1..=MAX_GENERATE_RETRIES {
            batch.batch_number = self.generator.generate_for_date(prefix, bucket_date)?;
            match self.batch_repo.insert(&batch) {
                Ok(()) => {
                    let bundle = self.metrics.compute(&batch);
                    self.batch_repo
                        .persist_metadata(&batch.batch_number, &bundle)?;
                    batch.metadata = Some(bundle);
                    info!(
                        batch_number = %batch.batch_number,
                        stage = %batch.stage,
                        "批次建档成功"
                    );
                    return Ok(batch);
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(
                        batch_number = %batch.batch_number,
                        attempt,
                        "批次编号冲突, 重新生成"
                    );
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| RepositoryError::InternalError("编号生成重试耗尽".to_string())))
    }

    /// 提交批次字段变更并重算指标
    pub fn update_batch(&self, batch: &ProductionBatch) -> RepositoryResult<MetadataBundle> {
        self.batch_repo.update(batch)?;
        self.recompute_metrics(&batch.batch_number)
    }

    /// 重算批次派生指标 (幂等: 字段不变时指标值不变, 仅 computed_at 更新)
    pub fn recompute_metrics(&self, batch_number: &str) -> RepositoryResult<MetadataBundle> {
        let batch = self.batch_repo.get_by_batch_number(batch_number)?;
        let bundle = self.metrics.compute(&batch);
        self.batch_repo.persist_metadata(batch_number, &bundle)?;
        Ok(bundle)
    }

    /// 批次完工 (置完成状态 + 重算指标)
    pub fn complete_batch(
        &self,
        batch_number: &str,
        completed_at: NaiveDateTime,
    ) -> RepositoryResult<ProductionBatch> {
        let mut batch = self.batch_repo.get_by_batch_number(batch_number)?;
        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(completed_at);
        self.batch_repo.update(&batch)?;
        batch.metadata = Some(self.recompute_metrics(batch_number)?);
        info!(batch_number, "批次完工");
        Ok(batch)
    }

    /// 按编号取批次
    pub fn get_batch(&self, batch_number: &str) -> RepositoryResult<ProductionBatch> {
        self.batch_repo.get_by_batch_number(batch_number)
    }
}
