// ==========================================
// 纺纱生产执行系统 - 批次编号计数器仓储
// ==========================================
// 职责: 管理 batch_sequence 表, 按 (prefix, date_bucket) 分桶计数
// 并发: 自增走单条 UPSERT..RETURNING, 由 SQLite 串行化,
//       同桶并发调用不会产生重复序号 (禁止读后写)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

pub struct BatchSequenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BatchSequenceRepository {
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
            CREATE TABLE IF NOT EXISTS batch_sequence (
              prefix TEXT NOT NULL,
              date_bucket TEXT NOT NULL,
              next_no INTEGER NOT NULL,
              PRIMARY KEY (prefix, date_bucket)
            );
            "#,
        )?;
        Ok(())
    }

    /// 取下一个序号 (原子自增)
    ///
    /// 桶不存在时从 1 开始; 已存在时 next_no + 1
    pub fn next_number(&self, prefix: &str, date_bucket: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            r#"
            INSERT INTO batch_sequence (prefix, date_bucket, next_no)
            VALUES (?1, ?2, 1)
            ON CONFLICT(prefix, date_bucket) DO UPDATE SET
                next_no = next_no + 1
            RETURNING next_no
            "#,
            params![prefix, date_bucket],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// 桶不存在时播种计数器 (历史数据迁移用)
    ///
    /// 已存在则忽略; 两个调用方同时播种只有一方生效, 随后各自原子自增
    pub fn seed_if_absent(
        &self,
        prefix: &str,
        date_bucket: &str,
        value: i64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO batch_sequence (prefix, date_bucket, next_no)
            VALUES (?1, ?2, ?3)
            "#,
            params![prefix, date_bucket, value],
        )?;
        Ok(())
    }

    /// 桶是否已有计数器
    pub fn has_bucket(&self, prefix: &str, date_bucket: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM batch_sequence WHERE prefix = ?1 AND date_bucket = ?2",
                params![prefix, date_bucket],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(exists.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_number_starts_at_one() {
        let repo = BatchSequenceRepository::new(":memory:").expect("create repo failed");
        assert_eq!(repo.next_number("SP", "040929").expect("next failed"), 1);
        assert_eq!(repo.next_number("SP", "040929").expect("next failed"), 2);
        assert_eq!(repo.next_number("SP", "040929").expect("next failed"), 3);
    }

    #[test]
    fn test_buckets_are_independent() {
        let repo = BatchSequenceRepository::new(":memory:").expect("create repo failed");
        assert_eq!(repo.next_number("SP", "040929").expect("next failed"), 1);
        assert_eq!(repo.next_number("CR", "040929").expect("next failed"), 1);
        assert_eq!(repo.next_number("SP", "040930").expect("next failed"), 1);
        assert_eq!(repo.next_number("SP", "040929").expect("next failed"), 2);
    }

    #[test]
    fn test_seed_then_increment() {
        let repo = BatchSequenceRepository::new(":memory:").expect("create repo failed");
        repo.seed_if_absent("BL", "040929", 41).expect("seed failed");
        assert_eq!(repo.next_number("BL", "040929").expect("next failed"), 42);

        // 二次播种不覆盖
        repo.seed_if_absent("BL", "040929", 0).expect("seed failed");
        assert_eq!(repo.next_number("BL", "040929").expect("next failed"), 43);
    }

    #[test]
    fn test_has_bucket() {
        let repo = BatchSequenceRepository::new(":memory:").expect("create repo failed");
        assert!(!repo.has_bucket("SP", "040929").expect("query failed"));
        repo.next_number("SP", "040929").expect("next failed");
        assert!(repo.has_bucket("SP", "040929").expect("query failed"));
    }
}
