//! Shelf 各表 CRUD
//!
//! 所有 Repo 都是无状态的单元结构体，方法接收 `&ShelfDatabase`，
//! 需要参与外部事务的方法另提供 `_with_conn` 版本。

use rusqlite::{Connection, ToSql};

use crate::shelf::error::ShelfResult;

pub mod cascade_journal_repo;
pub mod event_repo;
pub mod exam_repo;
pub mod resource_repo;
pub mod settings_repo;
pub mod suggestion_repo;

pub use cascade_journal_repo::{CascadeJournalEntry, CascadeJournalRepo, CascadeStatus};
pub use event_repo::EventRepo;
pub use exam_repo::ExamRepo;
pub use resource_repo::ResourceRepo;
pub use settings_repo::SettingsRepo;
pub use suggestion_repo::SuggestionRepo;

/// 批量 SQL 操作的最大批次大小（IN 子句中的 ID 数）
pub const MAX_BATCH_SIZE: usize = 100;

/// 分批执行带 IN 子句的写操作
///
/// `sql_template` 中用 `{}` 作为 IN 子句占位符；`leading` 是占位符之前的固定参数，
/// 编号从 `?1` 开始，ID 参数紧随其后。
///
/// ## 返回
/// 总共影响的行数
pub(crate) fn execute_in_batches(
    conn: &Connection,
    ids: &[String],
    sql_template: &str,
    leading: &[&dyn ToSql],
) -> ShelfResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let offset = leading.len();
    let mut total_affected = 0usize;

    for chunk in ids.chunks(MAX_BATCH_SIZE) {
        let placeholders: Vec<String> = (1..=chunk.len())
            .map(|i| format!("?{}", i + offset))
            .collect();
        let sql = sql_template.replace("{}", &placeholders.join(", "));

        let mut params: Vec<&dyn ToSql> = leading.to_vec();
        params.extend(chunk.iter().map(|id| id as &dyn ToSql));

        total_affected += conn.execute(&sql, params.as_slice())?;
    }

    Ok(total_affected)
}
