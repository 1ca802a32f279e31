//! 重命名级联日志表
//!
//! 结构树改名（第 1 步）与资源改写（第 2 步）不在同一事务中。
//! 第 1 步在同一事务内写入一条 `pending` 记录，第 2 步结束后标记为 `completed` 或 `failed`，
//! 两步之间崩溃或第 2 步失败都能从这张表中发现并重放。

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::structure::RenameTarget;

/// 级联状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeStatus {
    Pending,
    Completed,
    Failed,
    /// 结构树已被后续编辑改变，第 2 步不再执行
    Superseded,
}

impl CascadeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeStatus::Pending => "pending",
            CascadeStatus::Completed => "completed",
            CascadeStatus::Failed => "failed",
            CascadeStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for CascadeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CascadeStatus {
    type Err = ShelfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CascadeStatus::Pending),
            "completed" => Ok(CascadeStatus::Completed),
            "failed" => Ok(CascadeStatus::Failed),
            "superseded" => Ok(CascadeStatus::Superseded),
            other => Err(ShelfError::Internal(format!(
                "unknown cascade status '{}'",
                other
            ))),
        }
    }
}

/// 第 2 步重放所需的全部信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadePayload {
    pub target: RenameTarget,
    pub new_name: String,
}

/// 日志记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeJournalEntry {
    pub id: String,
    pub exam_id: String,
    /// subject / class / chapter
    pub kind: String,
    pub payload: CascadePayload,
    pub status: CascadeStatus,
    /// 第 2 步已执行次数
    pub attempts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CascadeJournalEntry {
    /// 格式：rc_{nanoid(10)}
    pub fn generate_id() -> String {
        format!("rc_{}", nanoid::nanoid!(10))
    }
}

const JOURNAL_COLUMNS: &str =
    "id, exam_id, kind, payload_json, status, attempts, last_error, created_at, updated_at";

fn map_entry(row: &Row<'_>) -> rusqlite::Result<CascadeJournalEntry> {
    let payload_json: String = row.get(3)?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let status: String = row.get(4)?;
    let status: CascadeStatus = status
        .parse()
        .map_err(|e: ShelfError| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(CascadeJournalEntry {
        id: row.get(0)?,
        exam_id: row.get(1)?,
        kind: row.get(2)?,
        payload,
        status,
        attempts: row.get(5)?,
        last_error: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// 级联日志 Repo
pub struct CascadeJournalRepo;

impl CascadeJournalRepo {
    /// 写入一条 pending 记录（调用方负责事务）
    pub fn insert_with_conn(
        conn: &Connection,
        exam_id: &str,
        target: &RenameTarget,
        new_name: &str,
    ) -> ShelfResult<CascadeJournalEntry> {
        let now = Utc::now();
        let entry = CascadeJournalEntry {
            id: CascadeJournalEntry::generate_id(),
            exam_id: exam_id.to_string(),
            kind: target.kind().to_string(),
            payload: CascadePayload {
                target: target.clone(),
                new_name: new_name.to_string(),
            },
            status: CascadeStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            "INSERT INTO cascade_journal
                (id, exam_id, kind, payload_json, status, attempts, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, ?6)",
            params![
                entry.id,
                entry.exam_id,
                entry.kind,
                serde_json::to_string(&entry.payload)?,
                entry.status.as_str(),
                now,
            ],
        )?;

        debug!(
            "[Shelf::CascadeJournalRepo] Journaled {} rename in {}: {}",
            entry.kind, exam_id, entry.id
        );
        Ok(entry)
    }

    pub fn get(db: &ShelfDatabase, id: &str) -> ShelfResult<Option<CascadeJournalEntry>> {
        let conn = db.get_conn()?;
        let sql = format!("SELECT {} FROM cascade_journal WHERE id = ?1", JOURNAL_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_entry).optional()?)
    }

    /// 第 2 步成功（和资源改写同一事务）
    pub fn mark_completed_with_conn(conn: &Connection, id: &str) -> ShelfResult<()> {
        let affected = conn.execute(
            "UPDATE cascade_journal
             SET status = ?1, attempts = attempts + 1, last_error = NULL, updated_at = ?2
             WHERE id = ?3",
            params![CascadeStatus::Completed.as_str(), Utc::now(), id],
        )?;
        if affected == 0 {
            warn!(
                "[Shelf::CascadeJournalRepo] Journal entry vanished before completion: {}",
                id
            );
        }
        Ok(())
    }

    /// 重放时发现结构树已变化：关闭记录，不再重放
    pub fn mark_superseded_with_conn(conn: &Connection, id: &str, reason: &str) -> ShelfResult<()> {
        conn.execute(
            "UPDATE cascade_journal
             SET status = ?1, last_error = ?2, updated_at = ?3
             WHERE id = ?4",
            params![CascadeStatus::Superseded.as_str(), reason, Utc::now(), id],
        )?;
        Ok(())
    }

    /// 第 2 步失败（事务已回滚，单独写入）
    pub fn mark_failed(db: &ShelfDatabase, id: &str, error: &str) -> ShelfResult<()> {
        let conn = db.get_conn()?;
        conn.execute(
            "UPDATE cascade_journal
             SET status = ?1, attempts = attempts + 1, last_error = ?2, updated_at = ?3
             WHERE id = ?4",
            params![CascadeStatus::Failed.as_str(), error, Utc::now(), id],
        )?;
        Ok(())
    }

    /// 尚未完成的记录（pending + failed），最早的在前
    pub fn list_pending(db: &ShelfDatabase) -> ShelfResult<Vec<CascadeJournalEntry>> {
        let conn = db.get_conn()?;
        let sql = format!(
            "SELECT {} FROM cascade_journal
             WHERE status IN ('pending', 'failed')
             ORDER BY created_at ASC, id ASC",
            JOURNAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], map_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
