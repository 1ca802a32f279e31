//! 运行配置
//!
//! 加载顺序（后者覆盖前者）：内置默认值 → `config/exam_shelf.toml`（可选）→
//! `EXAM_SHELF__*` 环境变量。`.env` 文件通过 dotenvy 读入环境。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::shelf::database::{DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_POOL_MAX_SIZE};
use crate::shelf::{ShelfDatabase, ShelfError, ShelfResult};

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "config/exam_shelf.toml";

const ENV_PREFIX: &str = "EXAM_SHELF";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfConfig {
    /// 数据目录，数据库位于 `data_dir/databases/shelf.db`
    pub data_dir: PathBuf,
    /// `RUST_LOG` 未设置时使用的日志过滤器
    pub log_filter: String,
    pub pool_max_size: u32,
    pub connection_timeout_secs: u64,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_filter: "info".to_string(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl ShelfConfig {
    /// 从 `.env`、默认配置文件和环境变量加载
    pub fn load() -> ShelfResult<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// 从指定配置文件（不存在时跳过）和环境变量加载
    pub fn load_from(config_file: &Path) -> ShelfResult<Self> {
        let defaults = Self::default();
        let mut builder = ::config::Config::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().into_owned())?
            .set_default("log_filter", defaults.log_filter)?
            .set_default("pool_max_size", i64::from(defaults.pool_max_size))?
            .set_default(
                "connection_timeout_secs",
                defaults.connection_timeout_secs as i64,
            )?;

        if config_file.exists() {
            debug!("[Shelf::Config] Loading {}", config_file.display());
            builder = builder.add_source(::config::File::from(config_file));
        }
        builder = builder.add_source(::config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        let loaded: ShelfConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> ShelfResult<()> {
        if self.pool_max_size < 1 {
            return Err(ShelfError::Config("pool_max_size must be at least 1".into()));
        }
        if self.connection_timeout_secs < 1 {
            return Err(ShelfError::Config(
                "connection_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// 按配置打开数据库
    pub fn open_database(&self) -> ShelfResult<ShelfDatabase> {
        ShelfDatabase::with_pool_options(
            &self.data_dir,
            self.pool_max_size,
            self.connection_timeout(),
        )
    }
}
