//! 考试表 CRUD 操作
//!
//! 每个考试一行，结构树整体存放在 `structure_json` 列。
//!
//! ## 核心方法
//! - `get_structure`: 读取结构树（考试不存在时返回空树）
//! - `save_structure`: 整体写回结构树（合并语义，不覆盖显示名）
//! - `delete_exam`: 删除考试；资源不级联删除，交给孤儿扫描处理

use chrono::Utc;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::structure::{validate_name, validate_structure};
use crate::shelf::types::{Exam, ExamStructure};

/// 考试 ID（slug）最大长度
const MAX_EXAM_ID_LEN: usize = 100;

static EXAM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

/// 校验考试 ID：小写字母、数字、连字符组成的 slug
pub fn validate_exam_id(id: &str) -> ShelfResult<()> {
    if id.is_empty() {
        return Err(ShelfError::validation("exam id cannot be empty"));
    }
    if id.len() > MAX_EXAM_ID_LEN {
        return Err(ShelfError::validation(format!(
            "exam id exceeds {} characters",
            MAX_EXAM_ID_LEN
        )));
    }
    if !EXAM_ID_PATTERN.is_match(id) {
        return Err(ShelfError::validation(format!(
            "exam id '{}' must be a lowercase slug",
            id
        )));
    }
    Ok(())
}

/// 考试表 Repo
pub struct ExamRepo;

impl ExamRepo {
    /// 创建考试（空结构树）
    pub fn create_exam(db: &ShelfDatabase, id: &str, name: &str) -> ShelfResult<Exam> {
        validate_exam_id(id)?;
        validate_name("exam name", name)?;
        let name = name.trim();

        let conn = db.get_conn()?;
        if Self::exists_with_conn(&conn, id)? {
            return Err(ShelfError::validation(format!(
                "exam '{}' already exists",
                id
            )));
        }

        let structure = ExamStructure::default();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO exams (id, name, structure_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![id, name, serde_json::to_string(&structure)?, now],
        )?;

        info!("[Shelf::ExamRepo] Created exam: {} ({})", id, name);
        Ok(Exam {
            id: id.to_string(),
            name: name.to_string(),
            structure,
        })
    }

    pub fn exists_with_conn(conn: &Connection, id: &str) -> ShelfResult<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM exams WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// 获取考试
    pub fn get_exam(db: &ShelfDatabase, id: &str) -> ShelfResult<Option<Exam>> {
        let conn = db.get_conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, structure_json FROM exams WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, name, structure_json)) => Ok(Some(Exam {
                id,
                name,
                structure: serde_json::from_str(&structure_json)?,
            })),
            None => Ok(None),
        }
    }

    /// 列出所有考试，按显示名排序（显示名为空时按 ID）
    pub fn list_exams(db: &ShelfDatabase) -> ShelfResult<Vec<Exam>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name, structure_json FROM exams")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut exams = rows
            .into_iter()
            .map(|(id, name, structure_json)| {
                Ok(Exam {
                    id,
                    name,
                    structure: serde_json::from_str(&structure_json)?,
                })
            })
            .collect::<ShelfResult<Vec<_>>>()?;

        exams.sort_by(|a, b| {
            let key_a = if a.name.is_empty() { &a.id } else { &a.name };
            let key_b = if b.name.is_empty() { &b.id } else { &b.name };
            key_a.cmp(key_b)
        });
        debug!("[Shelf::ExamRepo] Listed {} exams", exams.len());
        Ok(exams)
    }

    /// 列出所有考试 ID
    pub fn list_exam_ids(db: &ShelfDatabase) -> ShelfResult<Vec<String>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare("SELECT id FROM exams ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// 读取结构树；考试不存在时返回空树
    pub fn get_structure(db: &ShelfDatabase, id: &str) -> ShelfResult<ExamStructure> {
        let conn = db.get_conn()?;
        Ok(Self::get_structure_with_conn(&conn, id)?.unwrap_or_default())
    }

    /// 读取结构树（使用现有连接，事务内重读时使用）
    pub fn get_structure_with_conn(
        conn: &Connection,
        id: &str,
    ) -> ShelfResult<Option<ExamStructure>> {
        let json: Option<String> = conn
            .query_row(
                "SELECT structure_json FROM exams WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|s| serde_json::from_str(&s).map_err(ShelfError::from))
            .transpose()
    }

    /// 整体保存结构树
    ///
    /// 考试不存在时以 ID 作为显示名创建；已存在时只替换结构树。
    pub fn save_structure(
        db: &ShelfDatabase,
        id: &str,
        structure: &ExamStructure,
    ) -> ShelfResult<()> {
        validate_exam_id(id)?;
        validate_structure(structure)?;

        let conn = db.get_conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO exams (id, name, structure_json, created_at, updated_at)
             VALUES (?1, ?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET structure_json = excluded.structure_json,
                                           updated_at = excluded.updated_at",
            params![id, serde_json::to_string(structure)?, now],
        )?;

        info!(
            "[Shelf::ExamRepo] Saved structure for exam {} ({} subjects)",
            id,
            structure.subjects.len()
        );
        Ok(())
    }

    /// 覆盖已存在考试的结构树（事务内使用，不做校验）
    pub fn write_structure_with_conn(
        conn: &Connection,
        id: &str,
        structure: &ExamStructure,
    ) -> ShelfResult<()> {
        let affected = conn.execute(
            "UPDATE exams SET structure_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(structure)?, Utc::now(), id],
        )?;
        if affected == 0 {
            return Err(ShelfError::ExamNotFound(id.to_string()));
        }
        Ok(())
    }

    /// 修改显示名（ID 不可变）
    pub fn rename_exam(db: &ShelfDatabase, id: &str, name: &str) -> ShelfResult<()> {
        validate_name("exam name", name)?;
        let conn = db.get_conn()?;
        let affected = conn.execute(
            "UPDATE exams SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name.trim(), Utc::now(), id],
        )?;
        if affected == 0 {
            return Err(ShelfError::ExamNotFound(id.to_string()));
        }
        info!("[Shelf::ExamRepo] Renamed exam {} to '{}'", id, name.trim());
        Ok(())
    }

    /// 删除考试及其章节设置；资源保留（成为孤儿）
    pub fn delete_exam(db: &ShelfDatabase, id: &str) -> ShelfResult<()> {
        let mut conn = db.get_conn()?;
        let tx = conn.transaction()?;
        let affected = tx.execute("DELETE FROM exams WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(ShelfError::ExamNotFound(id.to_string()));
        }
        let settings = tx.execute(
            "DELETE FROM chapter_settings WHERE exam_id = ?1",
            params![id],
        )?;
        tx.commit()?;

        info!(
            "[Shelf::ExamRepo] Deleted exam {} (chapter settings removed: {})",
            id, settings
        );
        Ok(())
    }
}
