//! Shelf 数据库管理模块
//!
//! 文档存储的落地实现：独立 SQLite 数据库（`shelf.db`）+ r2d2 连接池。
//!
//! ## 设计原则
//! - **单一数据库**：所有集合（exams/resources/events/settings/...）在同一个 `shelf.db`
//! - **连接池管理**：使用 r2d2 管理连接池，WAL 模式
//! - **迁移**：打开数据库时执行 Refinery 内嵌迁移（`migrations/` 目录）

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::{ShelfError, ShelfResult};

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// 数据库文件名
const DATABASE_FILENAME: &str = "shelf.db";

/// 默认最大连接数
pub const DEFAULT_POOL_MAX_SIZE: u32 = 8;

/// 默认获取连接超时（秒）
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;

/// SQLite 连接池类型
pub type ShelfPool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type ShelfPooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Shelf 数据库管理器
pub struct ShelfDatabase {
    pool: ShelfPool,
    db_path: PathBuf,
}

impl ShelfDatabase {
    /// 使用默认连接池参数打开数据库
    ///
    /// # Arguments
    /// * `data_dir` - 数据目录，数据库文件位于 `data_dir/databases/shelf.db`
    pub fn new(data_dir: &Path) -> ShelfResult<Self> {
        Self::with_pool_options(
            data_dir,
            DEFAULT_POOL_MAX_SIZE,
            Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        )
    }

    /// 打开数据库并执行迁移
    ///
    /// # Errors
    /// * 目录创建失败
    /// * 连接池构建失败
    /// * 迁移执行失败
    pub fn with_pool_options(
        data_dir: &Path,
        max_size: u32,
        connection_timeout: Duration,
    ) -> ShelfResult<Self> {
        info!(
            "[Shelf::Database] Initializing shelf database in: {}",
            data_dir.display()
        );

        let databases_dir = data_dir.join("databases");
        if let Err(e) = fs::create_dir_all(&databases_dir) {
            error!(
                "[Shelf::Database] Failed to create databases directory: {}",
                e
            );
            return Err(ShelfError::Io(format!(
                "Failed to create databases directory: {}",
                e
            )));
        }

        let db_path = databases_dir.join(DATABASE_FILENAME);
        let pool = Self::build_pool(&db_path, max_size, connection_timeout)?;

        let db = Self { pool, db_path };
        db.run_migrations()?;

        info!(
            "[Shelf::Database] Shelf database ready: {}",
            db.db_path.display()
        );

        Ok(db)
    }

    fn build_pool(
        db_path: &Path,
        max_size: u32,
        connection_timeout: Duration,
    ) -> ShelfResult<ShelfPool> {
        debug!(
            "[Shelf::Database] Building connection pool for: {} (max_size={})",
            db_path.display(),
            max_size
        );

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            // 避免写锁竞争时无界等待
            conn.pragma_update(None, "busy_timeout", 5000i64)?;
            Ok(())
        });

        Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .max_lifetime(Some(Duration::from_secs(1800)))
            .idle_timeout(Some(Duration::from_secs(600)))
            .build(manager)
            .map_err(|e| ShelfError::Pool(format!("Failed to create connection pool: {}", e)))
    }

    fn run_migrations(&self) -> ShelfResult<()> {
        let mut conn = self.get_conn()?;
        let report = embedded::migrations::runner().run(&mut *conn)?;
        let applied = report.applied_migrations().len();
        if applied > 0 {
            info!("[Shelf::Database] Applied {} migration(s)", applied);
        } else {
            debug!("[Shelf::Database] Schema up to date");
        }
        Ok(())
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> ShelfResult<ShelfPooledConnection> {
        self.pool.get().map_err(|e| {
            warn!("[Shelf::Database] Failed to get connection: {}", e);
            ShelfError::Pool(format!("Failed to get connection: {}", e))
        })
    }

    /// 数据库文件路径
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = ShelfDatabase::new(temp_dir.path()).expect("Failed to open database");
        assert!(db.db_path().exists());

        let conn = db.get_conn().unwrap();
        for table in [
            "exams",
            "resources",
            "events",
            "settings",
            "chapter_settings",
            "suggestions",
            "cascade_journal",
        ] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {} should exist", table);
        }
    }

    #[test]
    fn test_pooled_connections_apply_pragmas() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = ShelfDatabase::new(temp_dir.path()).expect("Failed to open database");
        let conn = db.get_conn().unwrap();

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        drop(ShelfDatabase::new(temp_dir.path()).unwrap());
        let db = ShelfDatabase::new(temp_dir.path()).expect("Reopen should succeed");
        assert!(db.get_conn().is_ok());
    }
}
