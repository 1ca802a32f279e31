//! 用户建议表

use chrono::Utc;
use rusqlite::params;
use tracing::info;

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::types::Suggestion;

/// 建议内容最大长度（字符）
pub const MAX_SUGGESTION_LEN: usize = 2000;

pub struct SuggestionRepo;

impl SuggestionRepo {
    pub fn add_suggestion(db: &ShelfDatabase, content: &str) -> ShelfResult<Suggestion> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ShelfError::validation("suggestion cannot be empty"));
        }
        if content.chars().count() > MAX_SUGGESTION_LEN {
            return Err(ShelfError::validation(format!(
                "suggestion exceeds {} characters",
                MAX_SUGGESTION_LEN
            )));
        }

        let suggestion = Suggestion {
            id: Suggestion::generate_id(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let conn = db.get_conn()?;
        conn.execute(
            "INSERT INTO suggestions (id, content, created_at) VALUES (?1, ?2, ?3)",
            params![suggestion.id, suggestion.content, suggestion.created_at],
        )?;

        info!("[Shelf::SuggestionRepo] Added suggestion {}", suggestion.id);
        Ok(suggestion)
    }

    /// 最新的在前
    pub fn list_suggestions(db: &ShelfDatabase) -> ShelfResult<Vec<Suggestion>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, content, created_at FROM suggestions ORDER BY created_at DESC, id DESC",
        )?;
        let suggestions = stmt
            .query_map([], |row| {
                Ok(Suggestion {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(suggestions)
    }

    pub fn delete_suggestion(db: &ShelfDatabase, id: &str) -> ShelfResult<()> {
        let conn = db.get_conn()?;
        let affected = conn.execute("DELETE FROM suggestions WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(ShelfError::SuggestionNotFound(id.to_string()));
        }
        info!("[Shelf::SuggestionRepo] Deleted suggestion {}", id);
        Ok(())
    }
}
