// ==========================================
// 纺纱生产执行系统 - 批次谱系仓储
// ==========================================
// 职责: 管理 lineage_edge 表 (下游批次 → 上游来源批次)
// 并发: UNIQUE(batch_number, input_position) 串行化同位挂接,
//       后到者收到唯一约束冲突而非静默覆盖
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::lineage::LineageEdge;
use crate::domain::types::Stage;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_edge_row(row: &Row<'_>) -> SqliteResult<LineageEdge> {
    let stage_tag: String = row.get(3)?;
    let source_stage = Stage::from_tag(&stage_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("未知工序标签: {}", stage_tag).into(),
        )
    })?;

    Ok(LineageEdge {
        edge_id: row.get(0)?,
        batch_number: row.get(1)?,
        input_position: row.get(2)?,
        source_stage,
        source_batch_number: row.get(4)?,
        weight_used: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub struct LineageEdgeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LineageEdgeRepository {
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
            CREATE TABLE IF NOT EXISTS lineage_edge (
              edge_id TEXT PRIMARY KEY,
              batch_number TEXT NOT NULL,
              input_position INTEGER NOT NULL,
              source_stage TEXT NOT NULL,
              source_batch_number TEXT NOT NULL,
              weight_used REAL,
              created_at TEXT NOT NULL,
              UNIQUE(batch_number, input_position)
            );

            CREATE INDEX IF NOT EXISTS idx_edge_batch
              ON lineage_edge(batch_number);
            CREATE INDEX IF NOT EXISTS idx_edge_source
              ON lineage_edge(source_stage, source_batch_number);
            "#,
        )?;
        Ok(())
    }

    /// 插入谱系边 (同批次同喂入位重复 → UniqueConstraintViolation)
    pub fn insert(&self, edge: &LineageEdge) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO lineage_edge (
                edge_id, batch_number, input_position,
                source_stage, source_batch_number, weight_used, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                edge.edge_id,
                edge.batch_number,
                edge.input_position,
                edge.source_stage.as_str(),
                edge.source_batch_number,
                edge.weight_used,
                edge.created_at,
            ],
        )?;
        Ok(())
    }

    /// 列出某下游批次的全部入边 (按喂入位升序)
    pub fn list_inputs(&self, batch_number: &str) -> RepositoryResult<Vec<LineageEdge>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT edge_id, batch_number, input_position,
                   source_stage, source_batch_number, weight_used, created_at
            FROM lineage_edge
            WHERE batch_number = ?1
            ORDER BY input_position ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![batch_number], map_edge_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 某喂入位是否已占用
    pub fn position_occupied(
        &self,
        batch_number: &str,
        input_position: i64,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT 1 FROM lineage_edge WHERE batch_number = ?1 AND input_position = ?2",
            params![batch_number, input_position],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 某来源批次已被下游消耗的重量合计
    pub fn sum_weight_drawn(&self, source_batch_number: &str) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let total: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(weight_used), 0)
            FROM lineage_edge
            WHERE source_batch_number = ?1
            "#,
            params![source_batch_number],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
