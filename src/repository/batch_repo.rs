// ==========================================
// 纺纱生产执行系统 - 生产批次仓储
// ==========================================
// 职责: 管理 production_batch 表 (各工序批次单表存储)
// 说明: metadata 列存 JSON 派生指标包, 写入走独立的
//       persist_metadata 路径 (窄更新), 与业务字段更新分离
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::analytics::TimeseriesPoint;
use crate::domain::batch::ProductionBatch;
use crate::domain::metadata::MetadataBundle;
use crate::domain::types::{BatchStatus, Stage, TimeseriesMetric};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 细纱单机单日聚合 (OEE 引擎输入)
#[derive(Debug, Clone, Default)]
pub struct SpinningDayStats {
    pub avg_efficiency: Option<f64>,
    pub total_breakage: i64,
    pub total_spindles: i64,
    pub batch_count: i64,
}

const BATCH_COLUMNS: &str = r#"
    batch_id, batch_number, stage, machine_code, operator, shift_code,
    line_code, order_no, production_date, status, started_at, completed_at,
    input_weight, output_weight, waste_weight,
    passage_number, num_inputs, draft_ratio, evenness_cv,
    neps_count,
    spindle_speed_rpm, twist_tpm, yarn_count,
    num_spindles_active, num_spindles_total, breakage_count, efficiency_pct,
    temperature, ph_value, liquor_ratio, duration_min, quality_result,
    notes, metadata, created_at, updated_at
"#;

/// 行 → 实体映射
fn map_batch_row(row: &Row<'_>) -> SqliteResult<ProductionBatch> {
    let stage_tag: String = row.get(2)?;
    let stage = Stage::from_tag(&stage_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("未知工序标签: {}", stage_tag).into(),
        )
    })?;

    let status_tag: String = row.get(9)?;
    let status = BatchStatus::from_tag(&status_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("未知批次状态: {}", status_tag).into(),
        )
    })?;

    // metadata 解析失败按缺失处理 (历史脏数据不阻断查询)
    let metadata: Option<MetadataBundle> = row
        .get::<_, Option<String>>(33)?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(ProductionBatch {
        batch_id: row.get(0)?,
        batch_number: row.get(1)?,
        stage,
        machine_code: row.get(3)?,
        operator: row.get(4)?,
        shift_code: row.get(5)?,
        line_code: row.get(6)?,
        order_no: row.get(7)?,
        production_date: row.get(8)?,
        status,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
        input_weight: row.get(12)?,
        output_weight: row.get(13)?,
        waste_weight: row.get(14)?,
        passage_number: row.get(15)?,
        num_inputs: row.get(16)?,
        draft_ratio: row.get(17)?,
        evenness_cv: row.get(18)?,
        neps_count: row.get(19)?,
        spindle_speed_rpm: row.get(20)?,
        twist_tpm: row.get(21)?,
        yarn_count: row.get(22)?,
        num_spindles_active: row.get(23)?,
        num_spindles_total: row.get(24)?,
        breakage_count: row.get(25)?,
        efficiency_pct: row.get(26)?,
        temperature: row.get(27)?,
        ph_value: row.get(28)?,
        liquor_ratio: row.get(29)?,
        duration_min: row.get(30)?,
        quality_result: row.get(31)?,
        notes: row.get(32)?,
        metadata,
        created_at: row.get(34)?,
        updated_at: row.get(35)?,
    })
}

pub struct ProductionBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionBatchRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        let repo = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        repo.ensure_table()?;
        Ok(repo)
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 确保表存在（如果不存在则创建）
    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS production_batch (
              batch_id TEXT PRIMARY KEY,
              batch_number TEXT NOT NULL UNIQUE,
              stage TEXT NOT NULL,
              machine_code TEXT NOT NULL,
              operator TEXT NOT NULL,
              shift_code TEXT NOT NULL,
              line_code TEXT,
              order_no TEXT,
              production_date TEXT NOT NULL,
              status TEXT NOT NULL DEFAULT 'in_progress',
              started_at TEXT,
              completed_at TEXT,
              input_weight REAL,
              output_weight REAL,
              waste_weight REAL,
              passage_number INTEGER,
              num_inputs INTEGER,
              draft_ratio REAL,
              evenness_cv REAL,
              neps_count INTEGER,
              spindle_speed_rpm INTEGER,
              twist_tpm REAL,
              yarn_count REAL,
              num_spindles_active INTEGER,
              num_spindles_total INTEGER,
              breakage_count INTEGER,
              efficiency_pct REAL,
              temperature REAL,
              ph_value REAL,
              liquor_ratio REAL,
              duration_min INTEGER,
              quality_result TEXT,
              notes TEXT NOT NULL DEFAULT '',
              metadata TEXT,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_batch_stage_date
              ON production_batch(stage, production_date);
            CREATE INDEX IF NOT EXISTS idx_batch_machine_date
              ON production_batch(machine_code, production_date);
            CREATE INDEX IF NOT EXISTS idx_batch_status
              ON production_batch(status);
            "#,
        )?;
        Ok(())
    }

    /// 插入批次 (batch_number 重复 → UniqueConstraintViolation)
    pub fn insert(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
        let metadata_json = match &batch.metadata {
            Some(bundle) => Some(
                serde_json::to_string(bundle)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            ),
            None => None,
        };

        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                r#"
                INSERT INTO production_batch ({})
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                        ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22,
                        ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32,
                        ?33, ?34, ?35, ?36)
                "#,
                BATCH_COLUMNS
            ),
            params![
                batch.batch_id,
                batch.batch_number,
                batch.stage.as_str(),
                batch.machine_code,
                batch.operator,
                batch.shift_code,
                batch.line_code,
                batch.order_no,
                batch.production_date,
                batch.status.as_str(),
                batch.started_at,
                batch.completed_at,
                batch.input_weight,
                batch.output_weight,
                batch.waste_weight,
                batch.passage_number,
                batch.num_inputs,
                batch.draft_ratio,
                batch.evenness_cv,
                batch.neps_count,
                batch.spindle_speed_rpm,
                batch.twist_tpm,
                batch.yarn_count,
                batch.num_spindles_active,
                batch.num_spindles_total,
                batch.breakage_count,
                batch.efficiency_pct,
                batch.temperature,
                batch.ph_value,
                batch.liquor_ratio,
                batch.duration_min,
                batch.quality_result,
                batch.notes,
                metadata_json,
                batch.created_at,
                batch.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新批次业务字段 (按 batch_id, 不触碰 metadata 列)
    pub fn update(&self, batch: &ProductionBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE production_batch SET
                machine_code = ?2,
                operator = ?3,
                shift_code = ?4,
                line_code = ?5,
                order_no = ?6,
                production_date = ?7,
                status = ?8,
                started_at = ?9,
                completed_at = ?10,
                input_weight = ?11,
                output_weight = ?12,
                waste_weight = ?13,
                passage_number = ?14,
                num_inputs = ?15,
                draft_ratio = ?16,
                evenness_cv = ?17,
                neps_count = ?18,
                spindle_speed_rpm = ?19,
                twist_tpm = ?20,
                yarn_count = ?21,
                num_spindles_active = ?22,
                num_spindles_total = ?23,
                breakage_count = ?24,
                efficiency_pct = ?25,
                temperature = ?26,
                ph_value = ?27,
                liquor_ratio = ?28,
                duration_min = ?29,
                quality_result = ?30,
                notes = ?31,
                updated_at = ?32
            WHERE batch_id = ?1
            "#,
            params![
                batch.batch_id,
                batch.machine_code,
                batch.operator,
                batch.shift_code,
                batch.line_code,
                batch.order_no,
                batch.production_date,
                batch.status.as_str(),
                batch.started_at,
                batch.completed_at,
                batch.input_weight,
                batch.output_weight,
                batch.waste_weight,
                batch.passage_number,
                batch.num_inputs,
                batch.draft_ratio,
                batch.evenness_cv,
                batch.neps_count,
                batch.spindle_speed_rpm,
                batch.twist_tpm,
                batch.yarn_count,
                batch.num_spindles_active,
                batch.num_spindles_total,
                batch.breakage_count,
                batch.efficiency_pct,
                batch.temperature,
                batch.ph_value,
                batch.liquor_ratio,
                batch.duration_min,
                batch.quality_result,
                batch.notes,
                chrono::Local::now().naive_local(),
            ],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ProductionBatch", &batch.batch_id));
        }
        Ok(())
    }

    /// 按编号查找批次
    pub fn find_by_batch_number(
        &self,
        batch_number: &str,
    ) -> RepositoryResult<Option<ProductionBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM production_batch WHERE batch_number = ?1",
            BATCH_COLUMNS
        ))?;

        let result = stmt.query_row(params![batch_number], map_batch_row);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按编号取批次 (不存在 → NotFound)
    pub fn get_by_batch_number(&self, batch_number: &str) -> RepositoryResult<ProductionBatch> {
        self.find_by_batch_number(batch_number)?
            .ok_or_else(|| RepositoryError::not_found("ProductionBatch", batch_number))
    }

    /// 写回派生指标包 (窄更新, 与业务字段更新路径分离)
    ///
    /// 此路径不经过任何重算入口, 写回不会再次触发指标计算
    pub fn persist_metadata(
        &self,
        batch_number: &str,
        bundle: &MetadataBundle,
    ) -> RepositoryResult<()> {
        let json = serde_json::to_string(bundle)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE production_batch SET metadata = ?2, updated_at = ?3 WHERE batch_number = ?1",
            params![batch_number, json, chrono::Local::now().naive_local()],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ProductionBatch", batch_number));
        }
        Ok(())
    }

    /// 某前缀模式下最大的批次编号 (定宽零填充使字典序即数值序)
    ///
    /// 用于历史库计数器播种
    pub fn max_batch_number_with_prefix(&self, pattern: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            r#"
            SELECT batch_number FROM production_batch
            WHERE batch_number LIKE ?1
            ORDER BY batch_number DESC
            LIMIT 1
            "#,
            params![format!("{}%", pattern)],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 细纱单机单日聚合 (仅完成批次)
    pub fn spinning_day_stats(
        &self,
        machine_code: &str,
        date: NaiveDate,
    ) -> RepositoryResult<SpinningDayStats> {
        let conn = self.get_conn()?;
        let stats = conn.query_row(
            r#"
            SELECT
                AVG(efficiency_pct),
                COALESCE(SUM(breakage_count), 0),
                COALESCE(SUM(num_spindles_active), 0),
                COUNT(*)
            FROM production_batch
            WHERE machine_code = ?1
              AND production_date = ?2
              AND stage = 'spinning'
              AND status = 'completed'
            "#,
            params![machine_code, date],
            |row| {
                Ok(SpinningDayStats {
                    avg_efficiency: row.get(0)?,
                    total_breakage: row.get(1)?,
                    total_spindles: row.get(2)?,
                    batch_count: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// 细纱时序数据 (按日分组, 仅完成批次, 旧→新)
    ///
    /// 指标列由白名单枚举映射, 不接受调用方任意列名
    pub fn timeseries_rows(
        &self,
        machine_code: &str,
        since: NaiveDate,
        metric: TimeseriesMetric,
    ) -> RepositoryResult<Vec<TimeseriesPoint>> {
        let agg = match metric {
            TimeseriesMetric::OutputWeight => "COALESCE(SUM(output_weight), 0)",
            TimeseriesMetric::EfficiencyPct => "COALESCE(AVG(efficiency_pct), 0)",
            TimeseriesMetric::BreakageCount => "COALESCE(SUM(breakage_count), 0)",
        };

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT production_date, {}
            FROM production_batch
            WHERE machine_code = ?1
              AND production_date >= ?2
              AND stage = 'spinning'
              AND status = 'completed'
            GROUP BY production_date
            ORDER BY production_date ASC
            "#,
            agg
        ))?;

        let rows = stmt
            .query_map(params![machine_code, since], |row| {
                Ok(TimeseriesPoint {
                    date: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}
