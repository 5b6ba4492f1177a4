// ==========================================
// 纺纱生产执行系统 - 停机记录仓储
// ==========================================
// 职责: 管理 downtime_log 表, 提供停机分析所需聚合
// 说明: 区间查询一律左闭右开 [start, end)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::analytics::ReasonBreakdown;
use crate::domain::downtime::DowntimeRecord;
use crate::domain::metadata::MetadataBundle;
use crate::domain::types::DowntimeReason;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// 滚动窗口聚合 (次数, 总分钟)
#[derive(Debug, Clone, Copy, Default)]
pub struct DowntimeWindowStats {
    pub count: i64,
    pub total_min: i64,
}

fn map_downtime_row(row: &Row<'_>) -> SqliteResult<DowntimeRecord> {
    let reason_tag: String = row.get(8)?;
    let reason_category = DowntimeReason::from_tag(&reason_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("未知停机原因分类: {}", reason_tag).into(),
        )
    })?;

    let metadata: Option<MetadataBundle> = row
        .get::<_, Option<String>>(12)?
        .and_then(|s| serde_json::from_str(&s).ok());

    Ok(DowntimeRecord {
        downtime_id: row.get(0)?,
        machine_code: row.get(1)?,
        line_code: row.get(2)?,
        shift_code: row.get(3)?,
        operator: row.get(4)?,
        start_time: row.get(5)?,
        end_time: row.get(6)?,
        duration_min: row.get(7)?,
        reason_category,
        reason_detail: row.get(9)?,
        production_loss: row.get(10)?,
        notes: row.get(11)?,
        metadata,
        created_at: row.get(13)?,
    })
}

pub struct DowntimeLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DowntimeLogRepository {
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
            CREATE TABLE IF NOT EXISTS downtime_log (
              downtime_id TEXT PRIMARY KEY,
              machine_code TEXT NOT NULL,
              line_code TEXT,
              shift_code TEXT NOT NULL,
              operator TEXT NOT NULL,
              start_time TEXT NOT NULL,
              end_time TEXT,
              duration_min INTEGER,
              reason_category TEXT NOT NULL,
              reason_detail TEXT NOT NULL,
              production_loss REAL,
              notes TEXT NOT NULL DEFAULT '',
              metadata TEXT,
              created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dt_machine_start
              ON downtime_log(machine_code, start_time);
            CREATE INDEX IF NOT EXISTS idx_dt_reason
              ON downtime_log(reason_category);
            "#,
        )?;
        Ok(())
    }

    /// 插入停机记录
    pub fn insert(&self, record: &DowntimeRecord) -> RepositoryResult<()> {
        let metadata_json = match &record.metadata {
            Some(bundle) => Some(
                serde_json::to_string(bundle)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            ),
            None => None,
        };

        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO downtime_log (
                downtime_id, machine_code, line_code, shift_code, operator,
                start_time, end_time, duration_min,
                reason_category, reason_detail, production_loss,
                notes, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                record.downtime_id,
                record.machine_code,
                record.line_code,
                record.shift_code,
                record.operator,
                record.start_time,
                record.end_time,
                record.duration_min,
                record.reason_category.as_str(),
                record.reason_detail,
                record.production_loss,
                record.notes,
                metadata_json,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// 闭合停机记录 (补结束时间与时长)
    pub fn close(
        &self,
        downtime_id: &str,
        end_time: NaiveDateTime,
        duration_min: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE downtime_log SET end_time = ?2, duration_min = ?3 WHERE downtime_id = ?1",
            params![downtime_id, end_time, duration_min],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("DowntimeRecord", downtime_id));
        }
        Ok(())
    }

    /// 按ID查找
    pub fn find_by_id(&self, downtime_id: &str) -> RepositoryResult<Option<DowntimeRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT downtime_id, machine_code, line_code, shift_code, operator,
                   start_time, end_time, duration_min,
                   reason_category, reason_detail, production_loss,
                   notes, metadata, created_at
            FROM downtime_log
            WHERE downtime_id = ?1
            "#,
        )?;

        let result = stmt.query_row(params![downtime_id], map_downtime_row);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 写回派生指标包 (窄更新)
    pub fn persist_metadata(
        &self,
        downtime_id: &str,
        bundle: &MetadataBundle,
    ) -> RepositoryResult<()> {
        let json = serde_json::to_string(bundle)
            .map_err(|e| RepositoryError::InternalError(e.to_string()))?;

        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE downtime_log SET metadata = ?2 WHERE downtime_id = ?1",
            params![downtime_id, json],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("DowntimeRecord", downtime_id));
        }
        Ok(())
    }

    /// 某机台某日停机分钟合计
    pub fn sum_duration_on_date(
        &self,
        machine_code: &str,
        date: NaiveDate,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(duration_min), 0)
            FROM downtime_log
            WHERE machine_code = ?1 AND date(start_time) = ?2
            "#,
            params![machine_code, date],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 滚动窗口聚合: start_time ≥ since 的次数与总分钟
    pub fn window_stats_since(
        &self,
        machine_code: &str,
        since: NaiveDateTime,
    ) -> RepositoryResult<DowntimeWindowStats> {
        let conn = self.get_conn()?;
        let stats = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(duration_min), 0)
            FROM downtime_log
            WHERE machine_code = ?1 AND start_time >= ?2
            "#,
            params![machine_code, since],
            |row| {
                Ok(DowntimeWindowStats {
                    count: row.get(0)?,
                    total_min: row.get(1)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// 按日区间计数 [start, end)
    pub fn count_in_date_range(
        &self,
        machine_code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM downtime_log
            WHERE machine_code = ?1
              AND date(start_time) >= ?2
              AND date(start_time) < ?3
            "#,
            params![machine_code, start, end],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 按原因分组统计 (date(start_time) ≥ since, 总时长降序)
    pub fn by_reason_since(
        &self,
        machine_code: &str,
        since: NaiveDate,
    ) -> RepositoryResult<Vec<ReasonBreakdown>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reason_category, COUNT(*), COALESCE(SUM(duration_min), 0)
            FROM downtime_log
            WHERE machine_code = ?1 AND date(start_time) >= ?2
            GROUP BY reason_category
            ORDER BY COALESCE(SUM(duration_min), 0) DESC
            "#,
        )?;

        let rows = stmt
            .query_map(params![machine_code, since], |row| {
                let tag: String = row.get(0)?;
                let reason_category = DowntimeReason::from_tag(&tag).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        format!("未知停机原因分类: {}", tag).into(),
                    )
                })?;
                Ok(ReasonBreakdown {
                    reason_category,
                    count: row.get(1)?,
                    total_min: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }
}
