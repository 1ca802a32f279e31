//! Shelf 考试资源库
//!
//! 考试 → 科目 → 年级 → 章节 的结构树，以及挂在章节下的资源记录。
//!
//! ## 核心概念
//! - **名称即标识**：结构树节点没有生成 ID，资源冗余保存路径名称
//! - **两步改名**：结构树事务改名 + 尽力而为的资源批量改写，中间状态记入级联日志
//! - **孤儿扫描**：找出路径在结构树中已不存在的资源，交给调用方修复
//!
//! ## 模块结构
//! ```text
//! shelf/
//! ├── mod.rs             - 模块注册和 re-export
//! ├── types.rs           - 核心类型定义
//! ├── error.rs           - 错误类型
//! ├── database.rs        - ShelfDatabase 连接池管理
//! ├── structure.rs       - 结构树校验与原地改名
//! ├── rename_cascade.rs  - 两步改名服务
//! ├── orphan_scanner.rs  - 孤儿资源扫描
//! ├── handlers.rs        - 命令处理器 + JSON 命令分发
//! └── repos/             - 各表 CRUD
//! ```

pub mod database;
pub mod error;
pub mod handlers;
pub mod orphan_scanner;
pub mod rename_cascade;
pub mod repos;
pub mod structure;
pub mod types;

pub use database::{ShelfDatabase, ShelfPool, ShelfPooledConnection};
pub use error::{ShelfError, ShelfResult};
pub use handlers::{dispatch, ActionResult, ShelfCommand};
pub use orphan_scanner::{OrphanReason, OrphanScanner, OrphanedResource};
pub use rename_cascade::{RenameCascadeService, RenameOutcome, ResumeReport};
pub use repos::{
    CascadeJournalEntry, CascadeJournalRepo, CascadeStatus, EventRepo, ExamRepo, ResourceRepo,
    SettingsRepo, SuggestionRepo,
};
pub use structure::RenameTarget;
pub use types::*;
