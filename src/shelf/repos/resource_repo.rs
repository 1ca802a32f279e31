//! 资源表 CRUD 操作
//!
//! 资源是扁平记录，冗余保存 考试/科目/年级/章节 名称和手动排序值。
//!
//! ## 核心方法
//! - `add_resource`: 上传表单新建资源
//! - `list_chapter_resources`: 公开浏览页按章节列出资源
//! - `update_resource_order`: 拖拽排序（批量）
//! - `move_resource` / `delete_resources`: 孤儿修复
//! - `find_ids_for_target_with_conn` / `rewrite_target_with_conn`: 重命名级联使用

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info, warn};

use crate::shelf::database::ShelfDatabase;
use crate::shelf::error::{ShelfError, ShelfResult};
use crate::shelf::repos::execute_in_batches;
use crate::shelf::structure::{validate_name, RenameTarget, MAX_NAME_LEN};
use crate::shelf::types::{NewResource, Resource, ResourceOrderUpdate, ResourcePath};

/// 链接最大长度
const MAX_URL_LEN: usize = 2048;

/// 只有真题（pyq）保留年份
const YEAR_RESOURCE_TYPE: &str = "pyq";

const RESOURCE_COLUMNS: &str = "id, exam_id, subject, class_name, chapter, type, title, subtitle, \
                                year, file_url, sort_order, created_at";

fn map_resource(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        exam_id: row.get(1)?,
        subject: row.get(2)?,
        class_name: row.get(3)?,
        chapter: row.get(4)?,
        resource_type: row.get(5)?,
        title: row.get(6)?,
        subtitle: row.get(7)?,
        year: row.get(8)?,
        file_url: row.get(9)?,
        order: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Google Drive 的查看链接改为可嵌入的预览链接
pub fn normalize_file_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("drive.google.com") && url.contains("/view") {
        url.replacen("/view", "/preview", 1)
    } else {
        url.to_string()
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 资源路径三个字段都必须非空
pub fn validate_path(path: &ResourcePath) -> ShelfResult<()> {
    validate_name("subject", &path.subject)?;
    validate_name("class", &path.class_name)?;
    validate_name("chapter", &path.chapter)
}

fn validate_new_resource(input: &NewResource) -> ShelfResult<()> {
    validate_name("exam id", &input.exam_id)?;
    validate_name("subject", &input.subject)?;
    validate_name("class", &input.class_name)?;
    validate_name("chapter", &input.chapter)?;
    validate_name("type", &input.resource_type)?;
    validate_name("title", &input.title)?;
    if let Some(subtitle) = &input.subtitle {
        if subtitle.chars().count() > MAX_NAME_LEN {
            return Err(ShelfError::validation(format!(
                "subtitle exceeds {} characters",
                MAX_NAME_LEN
            )));
        }
    }
    let url = input.file_url.trim();
    if url.is_empty() {
        return Err(ShelfError::validation("file url cannot be empty"));
    }
    if url.len() > MAX_URL_LEN {
        return Err(ShelfError::validation(format!(
            "file url exceeds {} characters",
            MAX_URL_LEN
        )));
    }
    Ok(())
}

/// 重命名目标对应的资源列
fn target_column(target: &RenameTarget) -> &'static str {
    match target {
        RenameTarget::Subject { .. } => "subject",
        RenameTarget::Class { .. } => "class_name",
        RenameTarget::Chapter { .. } => "chapter",
    }
}

/// 资源表 Repo
pub struct ResourceRepo;

impl ResourceRepo {
    // ========================================================================
    // 创建 / 读取
    // ========================================================================

    /// 新建资源
    pub fn add_resource(db: &ShelfDatabase, input: &NewResource) -> ShelfResult<Resource> {
        validate_new_resource(input)?;

        let resource_type = input.resource_type.trim().to_string();
        let year = if resource_type == YEAR_RESOURCE_TYPE {
            non_blank(input.year.as_ref())
        } else {
            None
        };

        let resource = Resource {
            id: Resource::generate_id(),
            exam_id: input.exam_id.trim().to_string(),
            subject: input.subject.clone(),
            class_name: input.class_name.clone(),
            chapter: input.chapter.clone(),
            resource_type,
            title: input.title.trim().to_string(),
            subtitle: non_blank(input.subtitle.as_ref()),
            year,
            file_url: normalize_file_url(&input.file_url),
            order: None,
            created_at: Utc::now(),
        };

        let conn = db.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO resources ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RESOURCE_COLUMNS
            ),
            params![
                resource.id,
                resource.exam_id,
                resource.subject,
                resource.class_name,
                resource.chapter,
                resource.resource_type,
                resource.title,
                resource.subtitle,
                resource.year,
                resource.file_url,
                resource.order,
                resource.created_at,
            ],
        )?;

        info!(
            "[Shelf::ResourceRepo] Created resource {} in {}/{}/{}/{} (type: {})",
            resource.id,
            resource.exam_id,
            resource.subject,
            resource.class_name,
            resource.chapter,
            resource.resource_type
        );
        Ok(resource)
    }

    /// 获取单个资源
    pub fn get_resource(db: &ShelfDatabase, id: &str) -> ShelfResult<Option<Resource>> {
        let conn = db.get_conn()?;
        Self::get_resource_with_conn(&conn, id)
    }

    pub fn get_resource_with_conn(conn: &Connection, id: &str) -> ShelfResult<Option<Resource>> {
        let resource = conn
            .query_row(
                &format!("SELECT {} FROM resources WHERE id = ?1", RESOURCE_COLUMNS),
                params![id],
                map_resource,
            )
            .optional()?;
        Ok(resource)
    }

    /// 列出考试下的全部资源（按创建时间）
    pub fn list_exam_resources(db: &ShelfDatabase, exam_id: &str) -> ShelfResult<Vec<Resource>> {
        let conn = db.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM resources WHERE exam_id = ?1 ORDER BY created_at, id",
            RESOURCE_COLUMNS
        ))?;
        let resources = stmt
            .query_map(params![exam_id], map_resource)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "[Shelf::ResourceRepo] Listed {} resources for exam {}",
            resources.len(),
            exam_id
        );
        Ok(resources)
    }

    /// 列出章节下的资源，可按类型过滤
    ///
    /// 排序：手动排序值升序（未设置的排最后），再按创建时间、ID。
    pub fn list_chapter_resources(
        db: &ShelfDatabase,
        exam_id: &str,
        path: &ResourcePath,
        resource_type: Option<&str>,
    ) -> ShelfResult<Vec<Resource>> {
        let conn = db.get_conn()?;
        let mut sql = format!(
            "SELECT {} FROM resources
             WHERE exam_id = ?1 AND subject = ?2 AND class_name = ?3 AND chapter = ?4",
            RESOURCE_COLUMNS
        );
        let mut params: Vec<&dyn ToSql> =
            vec![&exam_id, &path.subject, &path.class_name, &path.chapter];
        if let Some(resource_type) = resource_type.as_ref() {
            sql.push_str(" AND type = ?5");
            params.push(resource_type);
        }
        sql.push_str(" ORDER BY sort_order IS NULL, sort_order, created_at, id");

        let mut stmt = conn.prepare(&sql)?;
        let resources = stmt
            .query_map(params.as_slice(), map_resource)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(resources)
    }

    // ========================================================================
    // 修改
    // ========================================================================

    /// 批量更新手动排序值
    ///
    /// ## 返回
    /// 实际更新的行数（不存在的 ID 被跳过）
    pub fn update_resource_order(
        db: &ShelfDatabase,
        updates: &[ResourceOrderUpdate],
    ) -> ShelfResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut conn = db.get_conn()?;
        let tx = conn.transaction()?;
        let mut affected = 0usize;
        {
            let mut stmt = tx.prepare("UPDATE resources SET sort_order = ?1 WHERE id = ?2")?;
            for update in updates {
                let n = stmt.execute(params![update.order, update.id])?;
                if n == 0 {
                    warn!(
                        "[Shelf::ResourceRepo] Order update skipped, resource missing: {}",
                        update.id
                    );
                }
                affected += n;
            }
        }
        tx.commit()?;

        info!(
            "[Shelf::ResourceRepo] Updated order for {}/{} resources",
            affected,
            updates.len()
        );
        Ok(affected)
    }

    /// 把资源移动到新的 科目/年级/章节（只做非空检查，不校验路径是否存在于结构树）
    pub fn move_resource(
        db: &ShelfDatabase,
        id: &str,
        target: &ResourcePath,
    ) -> ShelfResult<Resource> {
        validate_path(target)?;

        let conn = db.get_conn()?;
        let affected = conn.execute(
            "UPDATE resources SET subject = ?1, class_name = ?2, chapter = ?3 WHERE id = ?4",
            params![target.subject, target.class_name, target.chapter, id],
        )?;
        if affected == 0 {
            return Err(ShelfError::ResourceNotFound(id.to_string()));
        }

        info!(
            "[Shelf::ResourceRepo] Moved resource {} to {}/{}/{}",
            id, target.subject, target.class_name, target.chapter
        );
        Self::get_resource_with_conn(&conn, id)?
            .ok_or_else(|| ShelfError::ResourceNotFound(id.to_string()))
    }

    // ========================================================================
    // 删除
    // ========================================================================

    /// 删除单个资源
    pub fn delete_resource(db: &ShelfDatabase, id: &str) -> ShelfResult<()> {
        let conn = db.get_conn()?;
        let affected = conn.execute("DELETE FROM resources WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(ShelfError::ResourceNotFound(id.to_string()));
        }
        info!("[Shelf::ResourceRepo] Deleted resource {}", id);
        Ok(())
    }

    /// 批量删除资源
    ///
    /// 一次批量写；失败时整体返回一个错误，不报告部分成功。
    ///
    /// ## 返回
    /// 实际删除的行数
    pub fn delete_resources(db: &ShelfDatabase, ids: &[String]) -> ShelfResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = db.get_conn()?;
        let tx = conn.transaction()?;
        let deleted = execute_in_batches(&tx, ids, "DELETE FROM resources WHERE id IN ({})", &[])
            .map_err(|e| {
                ShelfError::Database(format!("Batch delete of {} resources failed: {}", ids.len(), e))
            })?;
        tx.commit()?;

        info!(
            "[Shelf::ResourceRepo] Batch deleted {}/{} resources",
            deleted,
            ids.len()
        );
        Ok(deleted)
    }

    // ========================================================================
    // 级联支持
    // ========================================================================

    /// 查询落在旧名称之下的资源 ID
    pub fn find_ids_for_target_with_conn(
        conn: &Connection,
        exam_id: &str,
        target: &RenameTarget,
    ) -> ShelfResult<Vec<String>> {
        let ids = match target {
            RenameTarget::Subject { name } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM resources WHERE exam_id = ?1 AND subject = ?2 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![exam_id, name], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()?
            }
            RenameTarget::Class { subject, name } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM resources
                     WHERE exam_id = ?1 AND subject = ?2 AND class_name = ?3 ORDER BY id",
                )?;
                let rows = stmt.query_map(params![exam_id, subject, name], |row| row.get(0))?;
                rows.collect::<Result<Vec<String>, _>>()?
            }
            RenameTarget::Chapter {
                subject,
                class_name,
                name,
            } => {
                let mut stmt = conn.prepare(
                    "SELECT id FROM resources
                     WHERE exam_id = ?1 AND subject = ?2 AND class_name = ?3 AND chapter = ?4
                     ORDER BY id",
                )?;
                let rows = stmt.query_map(params![exam_id, subject, class_name, name], |row| {
                    row.get(0)
                })?;
                rows.collect::<Result<Vec<String>, _>>()?
            }
        };
        Ok(ids)
    }

    /// 把一组资源在目标层级上的名称改写为新名称
    pub fn rewrite_target_with_conn(
        conn: &Connection,
        ids: &[String],
        target: &RenameTarget,
        new_name: &str,
    ) -> ShelfResult<usize> {
        let sql = format!(
            "UPDATE resources SET {} = ?1 WHERE id IN ({{}})",
            target_column(target)
        );
        execute_in_batches(conn, ids, &sql, &[&new_name])
    }

    /// 查询某类型的全部资源 ID
    pub fn find_ids_by_type_with_conn(
        conn: &Connection,
        resource_type: &str,
    ) -> ShelfResult<Vec<String>> {
        let mut stmt = conn.prepare("SELECT id FROM resources WHERE type = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![resource_type], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// 批量改写资源类型
    pub fn rewrite_type_with_conn(
        conn: &Connection,
        ids: &[String],
        new_type: &str,
    ) -> ShelfResult<usize> {
        execute_in_batches(
            conn,
            ids,
            "UPDATE resources SET type = ?1 WHERE id IN ({})",
            &[&new_type],
        )
    }
}
