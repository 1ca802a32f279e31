//! 考试日历事件 CRUD
//!
//! 事件通过 `exam_id` 弱关联考试，考试改名/删除都不影响事件。

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use tracing::{debug, info};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::structure::validate_name;
use crate::shelf::types::{EventInput, EventType, ExamEvent};

/// 描述最大长度
const MAX_DESCRIPTION_LEN: usize = 2000;

const EVENT_COLUMNS: &str = "id, title, event_date, event_type, description, exam_id, created_at";

fn map_event(row: &Row<'_>) -> rusqlite::Result<ExamEvent> {
    let event_type: String = row.get(3)?;
    let event_type: EventType = event_type.parse().map_err(|e: ShelfError| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ExamEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        date: row.get(2)?,
        event_type,
        description: row.get(4)?,
        exam_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// 校验并清理输入：空白描述/考试 ID 视为未填写
fn normalize_input(input: &EventInput) -> ShelfResult<(String, Option<String>, Option<String>)> {
    validate_name("title", &input.title)?;
    let description = input
        .description
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(d) = &description {
        if d.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ShelfError::validation(format!(
                "description exceeds {} characters",
                MAX_DESCRIPTION_LEN
            )));
        }
    }
    let exam_id = input
        .exam_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok((input.title.trim().to_string(), description, exam_id))
}

/// 日历事件 Repo
pub struct EventRepo;

impl EventRepo {
    pub fn add_event(db: &ShelfDatabase, input: &EventInput) -> ShelfResult<ExamEvent> {
        let (title, description, exam_id) = normalize_input(input)?;
        let now = Utc::now();
        let event = ExamEvent {
            id: ExamEvent::generate_id(),
            title,
            date: input.date,
            event_type: input.event_type,
            description,
            exam_id,
            created_at: now,
        };

        let conn = db.get_conn()?;
        conn.execute(
            "INSERT INTO events (id, title, event_date, event_type, description, exam_id,
                                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                event.id,
                event.title,
                event.date,
                event.event_type.as_str(),
                event.description,
                event.exam_id,
                now,
            ],
        )?;

        info!(
            "[Shelf::EventRepo] Added {} event '{}' on {}",
            event.event_type, event.title, event.date
        );
        Ok(event)
    }

    pub fn update_event(
        db: &ShelfDatabase,
        id: &str,
        input: &EventInput,
    ) -> ShelfResult<ExamEvent> {
        let (title, description, exam_id) = normalize_input(input)?;

        let conn = db.get_conn()?;
        let affected = conn.execute(
            "UPDATE events
             SET title = ?1, event_date = ?2, event_type = ?3, description = ?4, exam_id = ?5,
                 updated_at = ?6
             WHERE id = ?7",
            params![
                title,
                input.date,
                input.event_type.as_str(),
                description,
                exam_id,
                Utc::now(),
                id,
            ],
        )?;
        if affected == 0 {
            return Err(ShelfError::EventNotFound(id.to_string()));
        }

        info!("[Shelf::EventRepo] Updated event {}", id);
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_event)?)
    }

    pub fn get_event(db: &ShelfDatabase, id: &str) -> ShelfResult<Option<ExamEvent>> {
        let conn = db.get_conn()?;
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_event).optional()?)
    }

    pub fn delete_event(db: &ShelfDatabase, id: &str) -> ShelfResult<()> {
        let conn = db.get_conn()?;
        let affected = conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(ShelfError::EventNotFound(id.to_string()));
        }
        info!("[Shelf::EventRepo] Deleted event {}", id);
        Ok(())
    }

    /// 按日期升序列出事件，可按考试过滤
    pub fn list_events(
        db: &ShelfDatabase,
        exam_filter: Option<&str>,
    ) -> ShelfResult<Vec<ExamEvent>> {
        Self::query_events(db, None, None, exam_filter)
    }

    /// `now` 及之后的事件，按日期升序，最多 `limit` 条
    pub fn upcoming_events(
        db: &ShelfDatabase,
        now: DateTime<Utc>,
        limit: usize,
        exam_filter: Option<&str>,
    ) -> ShelfResult<Vec<ExamEvent>> {
        Self::query_events(db, Some(now), Some(limit), exam_filter)
    }

    fn query_events(
        db: &ShelfDatabase,
        from: Option<DateTime<Utc>>,
        limit: Option<usize>,
        exam_filter: Option<&str>,
    ) -> ShelfResult<Vec<ExamEvent>> {
        let conn = db.get_conn()?;

        let mut sql = format!("SELECT {} FROM events WHERE 1 = 1", EVENT_COLUMNS);
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(from) = from {
            params.push(Box::new(from));
            sql.push_str(&format!(" AND event_date >= ?{}", params.len()));
        }
        if let Some(exam_id) = exam_filter {
            params.push(Box::new(exam_id.to_string()));
            sql.push_str(&format!(" AND exam_id = ?{}", params.len()));
        }
        sql.push_str(" ORDER BY event_date ASC, id ASC");
        if let Some(limit) = limit {
            params.push(Box::new(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
        }

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(param_refs.as_slice(), map_event)?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "[Shelf::EventRepo] Listed {} events (exam filter: {:?})",
            events.len(),
            exam_filter
        );
        Ok(events)
    }
}
