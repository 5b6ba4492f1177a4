// ==========================================
// 纺纱生产执行系统 - 机台台账仓储
// ==========================================
// 职责: 管理 machine 表 (机队健康排名的机台清单来源)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::machine::Machine;
use crate::domain::types::{MachineStatus, Stage};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

fn map_machine_row(row: &Row<'_>) -> SqliteResult<Machine> {
    let stage_tag: String = row.get(2)?;
    let stage = Stage::from_tag(&stage_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("未知工序标签: {}", stage_tag).into(),
        )
    })?;

    let status_tag: String = row.get(4)?;
    let status = MachineStatus::from_tag(&status_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("未知机台状态: {}", status_tag).into(),
        )
    })?;

    Ok(Machine {
        code: row.get(0)?,
        name: row.get(1)?,
        stage,
        line_code: row.get(3)?,
        status,
    })
}

pub struct MachineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MachineRepository {
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
            CREATE TABLE IF NOT EXISTS machine (
              code TEXT PRIMARY KEY,
              name TEXT NOT NULL,
              stage TEXT NOT NULL,
              line_code TEXT,
              status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE INDEX IF NOT EXISTS idx_machine_line
              ON machine(line_code);
            "#,
        )?;
        Ok(())
    }

    /// 创建或更新机台
    pub fn upsert(&self, machine: &Machine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO machine (code, name, stage, line_code, status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                stage = excluded.stage,
                line_code = excluded.line_code,
                status = excluded.status
            "#,
            params![
                machine.code,
                machine.name,
                machine.stage.as_str(),
                machine.line_code,
                machine.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// 按代码查找
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Machine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, stage, line_code, status FROM machine WHERE code = ?1",
        )?;
        let result = stmt.query_row(params![code], map_machine_row);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 按代码取机台 (不存在 → NotFound)
    pub fn get_by_code(&self, code: &str) -> RepositoryResult<Machine> {
        self.find_by_code(code)?
            .ok_or_else(|| RepositoryError::not_found("Machine", code))
    }

    /// 列出运行中机台 (可按生产线过滤, 按代码升序)
    pub fn list_active(&self, line_code: Option<&str>) -> RepositoryResult<Vec<Machine>> {
        let conn = self.get_conn()?;
        let mut stmt;
        let rows = match line_code {
            Some(line) => {
                stmt = conn.prepare(
                    r#"
                    SELECT code, name, stage, line_code, status
                    FROM machine
                    WHERE status = 'active' AND line_code = ?1
                    ORDER BY code ASC
                    "#,
                )?;
                stmt.query_map(params![line], map_machine_row)?
                    .collect::<SqliteResult<Vec<_>>>()?
            }
            None => {
                stmt = conn.prepare(
                    r#"
                    SELECT code, name, stage, line_code, status
                    FROM machine
                    WHERE status = 'active'
                    ORDER BY code ASC
                    "#,
                )?;
                stmt.query_map([], map_machine_row)?
                    .collect::<SqliteResult<Vec<_>>>()?
            }
        };
        Ok(rows)
    }
}
